//! Typed LTI claims
//!
//! The LTI spec namespaces its claims under long purl.imsglobal.org URLs.
//! They are modeled here as a struct with named optional fields populated by
//! explicit parsing, so a missing or malformed claim is an absent value, not
//! a runtime lookup surprise.

use serde::Deserialize;

pub const MESSAGE_TYPE_RESOURCE_LINK: &str = "LtiResourceLinkRequest";
pub const MESSAGE_TYPE_DEEP_LINKING: &str = "LtiDeepLinkingRequest";
pub const MESSAGE_TYPE_DEEP_LINKING_RESPONSE: &str = "LtiDeepLinkingResponse";
pub const LTI_VERSION: &str = "1.3.0";

/// Claims carried by a platform-issued id_token
#[derive(Debug, Clone, Deserialize)]
pub struct LtiClaims {
    /// Issuer
    pub iss: String,

    /// Audience (can be string or array)
    #[serde(deserialize_with = "deserialize_audience")]
    pub aud: Vec<String>,

    /// Expiration time
    pub exp: u64,

    /// Issued at
    pub iat: u64,

    /// Anti-replay nonce minted at login initiation
    #[serde(default)]
    pub nonce: Option<String>,

    #[serde(
        default,
        rename = "https://purl.imsglobal.org/spec/lti/claim/message_type"
    )]
    pub message_type: Option<String>,

    #[serde(
        default,
        rename = "https://purl.imsglobal.org/spec/lti/claim/deployment_id"
    )]
    pub deployment_id: Option<String>,

    /// The course context this launch is about
    #[serde(default, rename = "https://purl.imsglobal.org/spec/lti/claim/context")]
    pub context: Option<ContextClaim>,

    #[serde(
        default,
        rename = "https://purl.imsglobal.org/spec/lti-dl/claim/deep_linking_settings"
    )]
    pub deep_linking_settings: Option<DeepLinkSettingsClaim>,
}

/// LTI context claim: the course the platform is launching from
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContextClaim {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, rename = "type")]
    pub context_types: Vec<String>,
}

/// Deep-linking settings sent with an LtiDeepLinkingRequest
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeepLinkSettingsClaim {
    #[serde(default)]
    pub accept_types: Vec<String>,
    #[serde(default)]
    pub accept_media_types: Option<String>,
    #[serde(default)]
    pub accept_presentation_document_targets: Vec<String>,
    #[serde(default)]
    pub accept_multiple: Option<bool>,
    #[serde(default)]
    pub auto_create: Option<bool>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    /// Opaque value the platform expects echoed back in the response
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub deep_link_return_url: String,
}

/// Deserialize audience as either string or array
fn deserialize_audience<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::{self, Visitor};

    struct AudienceVisitor;

    impl<'de> Visitor<'de> for AudienceVisitor {
        type Value = Vec<String>;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("string or array of strings")
        }

        fn visit_str<E>(self, value: &str) -> std::result::Result<Vec<String>, E>
        where
            E: de::Error,
        {
            Ok(vec![value.to_string()])
        }

        fn visit_seq<A>(self, mut seq: A) -> std::result::Result<Vec<String>, A::Error>
        where
            A: de::SeqAccess<'de>,
        {
            let mut values = Vec::new();
            while let Some(value) = seq.next_element()? {
                values.push(value);
            }
            Ok(values)
        }
    }

    deserializer.deserialize_any(AudienceVisitor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_resource_link_claims_parse() {
        let json = serde_json::json!({
            "iss": "https://lms.example.edu",
            "aud": "client-1",
            "exp": 1700000600,
            "iat": 1700000000,
            "nonce": "abc123",
            "https://purl.imsglobal.org/spec/lti/claim/message_type": "LtiResourceLinkRequest",
            "https://purl.imsglobal.org/spec/lti/claim/deployment_id": "deployment-1",
            "https://purl.imsglobal.org/spec/lti/claim/context": {
                "id": "ctx-1",
                "label": "CAL101",
                "title": "Calculus 101",
                "type": ["CourseOffering"]
            }
        });

        let claims: LtiClaims = serde_json::from_value(json).expect("claims should parse");

        assert_eq!(claims.aud, vec!["client-1"]);
        assert_eq!(
            claims.message_type.as_deref(),
            Some(MESSAGE_TYPE_RESOURCE_LINK)
        );
        let context = claims.context.expect("context claim expected");
        assert_eq!(context.title.as_deref(), Some("Calculus 101"));
        assert_eq!(context.context_types, vec!["CourseOffering"]);
        assert!(claims.deep_linking_settings.is_none());
    }

    #[test]
    fn test_audience_accepts_array_form() {
        let json = serde_json::json!({
            "iss": "https://lms.example.edu",
            "aud": ["client-1", "client-2"],
            "exp": 1700000600,
            "iat": 1700000000
        });

        let claims: LtiClaims = serde_json::from_value(json).expect("claims should parse");
        assert_eq!(claims.aud, vec!["client-1", "client-2"]);
        assert!(claims.nonce.is_none());
        assert!(claims.message_type.is_none());
    }

    #[test]
    fn test_deep_linking_settings_parse() {
        let json = serde_json::json!({
            "iss": "https://lms.example.edu",
            "aud": "client-1",
            "exp": 1700000600,
            "iat": 1700000000,
            "https://purl.imsglobal.org/spec/lti-dl/claim/deep_linking_settings": {
                "accept_types": ["ltiResourceLink"],
                "accept_presentation_document_targets": ["iframe", "window"],
                "accept_multiple": false,
                "auto_create": true,
                "data": "opaque-value",
                "deep_link_return_url": "https://lms.example.edu/deep_links"
            }
        });

        let claims: LtiClaims = serde_json::from_value(json).expect("claims should parse");
        let settings = claims
            .deep_linking_settings
            .expect("deep linking settings expected");

        assert_eq!(settings.accept_types, vec!["ltiResourceLink"]);
        assert_eq!(settings.data.as_deref(), Some("opaque-value"));
        assert_eq!(
            settings.deep_link_return_url,
            "https://lms.example.edu/deep_links"
        );
    }

    #[test]
    fn test_missing_required_claim_is_a_parse_error() {
        let json = serde_json::json!({
            "iss": "https://lms.example.edu",
            "aud": "client-1",
            "iat": 1700000000
        });

        assert!(serde_json::from_value::<LtiClaims>(json).is_err());
    }
}
