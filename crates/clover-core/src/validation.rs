//! Explicit validation of submitted interchange configurations
//!
//! Validation never stops at the first problem: every field-level failure is
//! collected into [`ValidationErrors`] so an administrator can fix a whole
//! submission in one pass.

use std::collections::HashSet;

use url::Url;
use uuid::{Uuid, Version};

use crate::error::ValidationErrors;
use crate::ids::{ChannelId, InterchangeId};
use crate::model::{Channel, ChannelConfig, Interchange, InterchangeConfig};

/// Validate a complete configuration, returning typed interchanges with
/// normalized (lower-cased) keywords on success.
///
/// Identifier uniqueness is checked across the entire submission, not just
/// within one interchange.
pub fn validate_config(
    submitted: &[InterchangeConfig],
) -> std::result::Result<Vec<Interchange>, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let mut seen_interchanges = HashSet::new();
    let mut seen_channels = HashSet::new();
    let mut validated = Vec::with_capacity(submitted.len());

    for (i, config) in submitted.iter().enumerate() {
        let path = format!("interchanges[{}]", i);
        let id = validate_interchange_fields(config, &path, &mut errors);

        if let Some(id) = id
            && !seen_interchanges.insert(id)
        {
            errors.push(format!("{}.id", path), format!("duplicate interchange id: {}", id));
        }

        if config.channels.is_empty() {
            errors.push(
                format!("{}.channels", path),
                "interchange must define at least one channel",
            );
        }

        let mut seen_keywords = HashSet::new();
        let mut channels = Vec::with_capacity(config.channels.len());
        for (j, channel) in config.channels.iter().enumerate() {
            let channel_path = format!("{}.channels[{}]", path, j);
            let channel_id = validate_channel_fields(channel, &channel_path, &mut errors);

            if let Some(channel_id) = channel_id
                && !seen_channels.insert(channel_id)
            {
                errors.push(
                    format!("{}.id", channel_path),
                    format!("duplicate channel id: {}", channel_id),
                );
            }

            let keywords = normalize_keywords(
                &channel.keywords,
                &channel_path,
                &mut seen_keywords,
                &mut errors,
            );

            if let Some(channel_id) = channel_id {
                channels.push(Channel {
                    id: channel_id,
                    name: channel.name.clone(),
                    url: channel.url.clone(),
                    keywords,
                    interchange_id: id,
                });
            }
        }

        if let Some(id) = id {
            validated.push(Interchange {
                id,
                name: config.name.clone(),
                country: config.country.clone(),
                scheme: config.scheme.clone(),
                channels,
            });
        }
    }

    if errors.is_empty() {
        Ok(validated)
    } else {
        Err(errors)
    }
}

fn validate_interchange_fields(
    config: &InterchangeConfig,
    path: &str,
    errors: &mut ValidationErrors,
) -> Option<InterchangeId> {
    require(&config.name, &format!("{}.name", path), errors);
    require(&config.country, &format!("{}.country", path), errors);
    require(&config.scheme, &format!("{}.scheme", path), errors);

    let field = format!("{}.id", path);
    if !require(&config.id, &field, errors) {
        return None;
    }
    match Uuid::parse_str(config.id.trim()) {
        Ok(uuid) if uuid.get_version() == Some(Version::Random) => {
            Some(InterchangeId::from_uuid(uuid))
        }
        _ => {
            errors.push(field, format!("must be a valid v4 UUID, got '{}'", config.id));
            None
        }
    }
}

fn validate_channel_fields(
    channel: &ChannelConfig,
    path: &str,
    errors: &mut ValidationErrors,
) -> Option<ChannelId> {
    require(&channel.name, &format!("{}.name", path), errors);

    let url_field = format!("{}.url", path);
    if require(&channel.url, &url_field, errors) && !is_well_formed_url(&channel.url) {
        errors.push(
            url_field,
            format!("must be a well-formed http(s) URL, got '{}'", channel.url),
        );
    }

    let field = format!("{}.id", path);
    if !require(&channel.id, &field, errors) {
        return None;
    }
    match Uuid::parse_str(channel.id.trim()) {
        Ok(uuid) => Some(ChannelId::from_uuid(uuid)),
        Err(_) => {
            errors.push(field, format!("must be a valid UUID, got '{}'", channel.id));
            None
        }
    }
}

/// Lower-case keywords and check they are alphanumeric and unique within the
/// owning interchange (`seen` spans every channel of that interchange).
fn normalize_keywords(
    keywords: &[String],
    path: &str,
    seen: &mut HashSet<String>,
    errors: &mut ValidationErrors,
) -> Vec<String> {
    let mut normalized = Vec::with_capacity(keywords.len());
    for (k, keyword) in keywords.iter().enumerate() {
        let field = format!("{}.keywords[{}]", path, k);
        let keyword = keyword.to_lowercase();

        if !is_alphanumeric(&keyword) {
            errors.push(field, format!("keywords must be alphanumeric, got '{}'", keyword));
            continue;
        }
        if !seen.insert(keyword.clone()) {
            errors.push(field, format!("duplicate keyword: {}", keyword));
            continue;
        }
        normalized.push(keyword);
    }
    normalized
}

fn require(value: &str, field: &str, errors: &mut ValidationErrors) -> bool {
    if value.trim().is_empty() {
        errors.push(field, "is required");
        false
    } else {
        true
    }
}

/// Unicode letters and digits only, at least one character
pub fn is_alphanumeric(keyword: &str) -> bool {
    !keyword.is_empty() && keyword.chars().all(char::is_alphanumeric)
}

fn is_well_formed_url(raw: &str) -> bool {
    match Url::parse(raw) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.host().is_some(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTERCHANGE: &str = "5fb66333-7f8c-47aa-9aa5-bfee37b79b22";
    const CHANNEL_ONE: &str = "557d3353-6b89-441a-aee5-8c398fd7a61f";
    const CHANNEL_TWO: &str = "3d0cd397-2228-4185-86db-7e3272fc423e";

    fn channel(id: &str, keywords: &[&str]) -> ChannelConfig {
        ChannelConfig {
            id: id.to_string(),
            name: format!("Handler {}", &id[..4]),
            url: "https://handler.example.com/receive".to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }

    fn interchange(id: &str, channels: Vec<ChannelConfig>) -> InterchangeConfig {
        InterchangeConfig {
            id: id.to_string(),
            name: "Nigeria".to_string(),
            country: "NG".to_string(),
            scheme: "tel".to_string(),
            channels,
        }
    }

    #[test]
    fn test_valid_config_normalizes_keywords() {
        let config = vec![interchange(
            INTERCHANGE,
            vec![channel(CHANNEL_ONE, &["ONE", "Uno"]), channel(CHANNEL_TWO, &["two"])],
        )];

        let validated = validate_config(&config).unwrap();
        assert_eq!(validated.len(), 1);
        let interchange = &validated[0];
        assert_eq!(interchange.id.to_string(), INTERCHANGE);
        assert_eq!(interchange.channels[0].keywords, vec!["one", "uno"]);
        assert_eq!(interchange.channels[0].interchange_id, Some(interchange.id));
        assert_eq!(interchange.default_channel().unwrap().id.to_string(), CHANNEL_ONE);
    }

    #[test]
    fn test_empty_config_is_valid() {
        assert!(validate_config(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_missing_fields_are_all_reported() {
        let config = vec![InterchangeConfig {
            channels: vec![ChannelConfig::default()],
            ..Default::default()
        }];

        let errors = validate_config(&config).unwrap_err();
        for field in [
            "interchanges[0].id",
            "interchanges[0].name",
            "interchanges[0].country",
            "interchanges[0].scheme",
            "interchanges[0].channels[0].id",
            "interchanges[0].channels[0].name",
            "interchanges[0].channels[0].url",
        ] {
            assert!(errors.has_field(field), "expected failure on {}", field);
        }
    }

    #[test]
    fn test_interchange_requires_a_channel() {
        let config = vec![interchange(INTERCHANGE, vec![])];
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.to_string().contains("at least one channel"));
    }

    #[test]
    fn test_interchange_id_must_be_v4() {
        // version nibble is 1
        let config = vec![interchange(
            "5fb66333-7f8c-17aa-9aa5-bfee37b79b22",
            vec![channel(CHANNEL_ONE, &[])],
        )];
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.has_field("interchanges[0].id"));
    }

    #[test]
    fn test_duplicate_channel_id_across_interchanges() {
        let config = vec![
            interchange(INTERCHANGE, vec![channel(CHANNEL_ONE, &[])]),
            interchange(
                "0b1c7e88-4d0d-4e1f-9b5a-6b3c2c1d0e9f",
                vec![channel(CHANNEL_ONE, &[])],
            ),
        ];

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.to_string().contains("duplicate channel id"));
        assert!(errors.has_field("interchanges[1].channels[0].id"));
    }

    #[test]
    fn test_duplicate_interchange_id() {
        let config = vec![
            interchange(INTERCHANGE, vec![channel(CHANNEL_ONE, &[])]),
            interchange(INTERCHANGE, vec![channel(CHANNEL_TWO, &[])]),
        ];
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.to_string().contains("duplicate interchange id"));
    }

    #[test]
    fn test_duplicate_keyword_after_normalization() {
        let config = vec![interchange(
            INTERCHANGE,
            vec![channel(CHANNEL_ONE, &["Join"]), channel(CHANNEL_TWO, &["JOIN"])],
        )];
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.to_string().contains("duplicate keyword: join"));
    }

    #[test]
    fn test_same_keyword_in_different_interchanges_is_allowed() {
        let config = vec![
            interchange(INTERCHANGE, vec![channel(CHANNEL_ONE, &["join"])]),
            interchange(
                "0b1c7e88-4d0d-4e1f-9b5a-6b3c2c1d0e9f",
                vec![channel(CHANNEL_TWO, &["join"])],
            ),
        ];
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_keywords_must_be_alphanumeric() {
        let config = vec![interchange(
            INTERCHANGE,
            vec![channel(CHANNEL_ONE, &["stop now", "", "ñandú", "42"])],
        )];
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.has_field("interchanges[0].channels[0].keywords[0]"));
        assert!(errors.has_field("interchanges[0].channels[0].keywords[1]"));
        assert!(!errors.has_field("interchanges[0].channels[0].keywords[2]"));
        assert!(!errors.has_field("interchanges[0].channels[0].keywords[3]"));
    }

    #[test]
    fn test_malformed_url_is_rejected() {
        let mut bad = channel(CHANNEL_ONE, &[]);
        bad.url = "not a url".to_string();
        let config = vec![interchange(INTERCHANGE, vec![bad])];
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.has_field("interchanges[0].channels[0].url"));
    }
}
