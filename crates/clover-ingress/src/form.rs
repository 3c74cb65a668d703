//! Form field parsing
//!
//! Fields come from the query string and, for urlencoded bodies, from the
//! request body. Body values win over query values of the same name.

use axum::body::{Body, to_bytes};
use axum::http::{HeaderMap, header::CONTENT_TYPE};

use crate::types::ApiError;

/// Largest request body read while parsing form fields
pub const MAX_FORM_BYTES: usize = 1024 * 1024;

/// Form fields of a single request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormFields {
    query: Vec<(String, String)>,
    body: Vec<(String, String)>,
}

impl FormFields {
    /// Parse fields from a raw query string and an already-read body
    pub fn parse(query: Option<&str>, headers: &HeaderMap, body: &[u8]) -> Result<Self, ApiError> {
        let query = match query {
            Some(q) if !q.is_empty() => serde_urlencoded::from_str(q)
                .map_err(|e| ApiError::InvalidBody(format!("malformed query string: {}", e)))?,
            _ => Vec::new(),
        };

        let body = if is_urlencoded(headers) && !body.is_empty() {
            serde_urlencoded::from_bytes(body)
                .map_err(|e| ApiError::InvalidBody(format!("malformed form body: {}", e)))?
        } else {
            Vec::new()
        };

        Ok(Self { query, body })
    }

    /// Read the body (bounded) and parse fields
    pub async fn from_parts(
        query: Option<&str>,
        headers: &HeaderMap,
        body: Body,
    ) -> Result<Self, ApiError> {
        let bytes = to_bytes(body, MAX_FORM_BYTES)
            .await
            .map_err(|e| ApiError::InvalidBody(e.to_string()))?;
        Self::parse(query, headers, &bytes)
    }

    /// First value of `name`, body before query
    pub fn get(&self, name: &str) -> Option<&str> {
        self.body
            .iter()
            .chain(self.query.iter())
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Like [`FormFields::get`] but empty values count as absent
    pub fn non_empty(&self, name: &str) -> Option<&str> {
        self.get(name).filter(|value| !value.is_empty())
    }

    /// Values that arrived in the body, in order
    pub fn body_pairs(&self) -> &[(String, String)] {
        &self.body
    }
}

fn is_urlencoded(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .is_some_and(|mime| {
            mime.trim()
                .eq_ignore_ascii_case("application/x-www-form-urlencoded")
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn form_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded; charset=utf-8"),
        );
        headers
    }

    #[test]
    fn test_query_only() {
        let form = FormFields::parse(Some("sender=555&message=hi+there"), &HeaderMap::new(), b"")
            .unwrap();
        assert_eq!(form.get("sender"), Some("555"));
        assert_eq!(form.get("message"), Some("hi there"));
        assert!(form.body_pairs().is_empty());
    }

    #[test]
    fn test_body_wins_over_query() {
        let form =
            FormFields::parse(Some("sender=111"), &form_headers(), b"sender=555&message=one")
                .unwrap();
        assert_eq!(form.get("sender"), Some("555"));
        assert_eq!(form.body_pairs().len(), 2);
    }

    #[test]
    fn test_body_ignored_without_form_content_type() {
        let form = FormFields::parse(None, &HeaderMap::new(), b"sender=555").unwrap();
        assert_eq!(form.get("sender"), None);
    }

    #[test]
    fn test_empty_value_is_absent_for_non_empty() {
        let form = FormFields::parse(Some("sender="), &HeaderMap::new(), b"").unwrap();
        assert_eq!(form.get("sender"), Some(""));
        assert_eq!(form.non_empty("sender"), None);
    }

    #[tokio::test]
    async fn test_from_parts_reads_body() {
        let form = FormFields::from_parts(None, &form_headers(), Body::from("urn=tel%3A555"))
            .await
            .unwrap();
        assert_eq!(form.get("urn"), Some("tel:555"));
    }
}
