//! Inbound message endpoint

use axum::{
    body::Body,
    extract::{Path, Request, State},
    http::header::CONTENT_TYPE,
    response::Response,
};
use clover_core::{Error as CoreError, InterchangeId};
use clover_egress::InboundRequest;

use crate::form::FormFields;
use crate::server::AppState;
use crate::types::ApiResult;

/// `GET|POST /i/{id}/receive`
///
/// Routes the message to a channel of the interchange and relays the
/// channel's response.
pub async fn receive(
    State(state): State<AppState>,
    Path(id): Path<String>,
    req: Request,
) -> ApiResult<Response> {
    let interchange_id = InterchangeId::from_string(&id)?;

    let (parts, body) = req.into_parts();
    let query = parts.uri.query().map(str::to_string);
    let form = FormFields::from_parts(query.as_deref(), &parts.headers, body).await?;

    let interchange = state.engine.interchange(interchange_id).await?;

    let sender = form
        .non_empty("sender")
        .ok_or(CoreError::MissingField("sender"))?;
    let message = form.get("message").unwrap_or_default();

    let decision = state.engine.decide(&interchange, sender, message).await?;

    let inbound = InboundRequest {
        method: parts.method,
        headers: parts.headers,
        query,
        form: form.body_pairs().to_vec(),
    };
    let forwarded = state.forwarder.forward(&decision.channel, &inbound).await?;

    let mut response = Response::new(Body::from(forwarded.body));
    *response.status_mut() = forwarded.status;
    if let Some(content_type) = forwarded.content_type {
        response.headers_mut().insert(CONTENT_TYPE, content_type);
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use crate::server::build_router;
    use crate::server::testing::*;
    use axum::http::StatusCode;
    use clover_core::{InterchangeId, MappingStore, Urn};
    use http_body_util::BodyExt;
    use std::time::Duration;
    use tower::ServiceExt;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_string_contains, method, path, query_param},
    };

    fn receive_uri(query: &str) -> String {
        format!("/i/{}/receive?{}", INTERCHANGE, query)
    }

    #[tokio::test]
    async fn test_missing_sender_is_bad_request() {
        let (state, _store) = state("https://one.example.com", "https://two.example.com").await;
        let response = build_router(state)
            .oneshot(request("GET", &receive_uri("message=one")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["message"], "missing sender");
    }

    #[tokio::test]
    async fn test_empty_sender_is_missing() {
        let (state, _store) = state("https://one.example.com", "https://two.example.com").await;
        let response = build_router(state)
            .oneshot(request("GET", &receive_uri("sender=&message=one")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_interchange_is_not_found() {
        let (state, _store) = state("https://one.example.com", "https://two.example.com").await;
        let app = build_router(state);

        let unknown = format!("/i/{}/receive?sender=555", InterchangeId::new());
        let response = app.clone().oneshot(request("GET", &unknown)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .oneshot(request("GET", "/i/not-a-uuid/receive?sender=555"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["message"], "interchange not found");
    }

    #[tokio::test]
    async fn test_keyword_routes_and_relays_response() {
        let one = MockServer::start().await;
        let two = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/sms"))
            .and(query_param("ref", "x"))
            .and(body_string_contains("message=TWO"))
            .respond_with(
                ResponseTemplate::new(202)
                    .insert_header("content-type", "text/plain")
                    .set_body_string("queued"),
            )
            .expect(1)
            .mount(&two)
            .await;

        let (state, store) = state(&format!("{}/sms", one.uri()), &format!("{}/sms", two.uri())).await;
        let engine = state.engine.clone();
        let response = build_router(state)
            .oneshot(form_request(
                "POST",
                &receive_uri("ref=x"),
                "sender=555&message=TWO",
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(response.headers()["content-type"], "text/plain");
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"queued");

        let interchange = engine.interchange(INTERCHANGE.parse().unwrap()).await.unwrap();
        let mapped = store
            .get_mapping(&interchange, &Urn::new("tel", "555"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(mapped.id.to_string(), CHANNEL_TWO);
    }

    #[tokio::test]
    async fn test_downstream_failure_is_generic_error() {
        let (state, _store) = state("http://127.0.0.1:1/sms", "http://127.0.0.1:1/sms").await;
        let response = build_router(state)
            .oneshot(request("GET", &receive_uri("sender=555&message=hello")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["message"], "server error");
        assert_eq!(body["error"], "internal error");
    }

    #[tokio::test]
    async fn test_slow_channel_is_gateway_timeout() {
        let slow = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&slow)
            .await;

        let (mut state, _store) = state(&slow.uri(), &slow.uri()).await;
        state.forwarder = std::sync::Arc::new(clover_egress::Forwarder::with_client(
            clover_egress::create_client(&clover_egress::ForwarderConfig::default()).unwrap(),
            Duration::from_millis(200),
        ));

        let response = build_router(state)
            .oneshot(request("GET", &receive_uri("sender=555")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }
}
