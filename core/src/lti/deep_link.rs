//! Deep Linking response construction
//!
//! Answers an LtiDeepLinkingRequest with a signed JWT embedding one
//! ltiResourceLink content item that points back at this tool's
//! reserves-by-course endpoint.

use jsonwebtoken::{encode, Algorithm, Header};
use serde::Serialize;

use crate::catalog::Platform;
use crate::error::{ApiError, Result};
use crate::platform::Clock;

use super::claims::{
    DeepLinkSettingsClaim, LtiClaims, LTI_VERSION, MESSAGE_TYPE_DEEP_LINKING_RESPONSE,
};
use super::keys::ToolKeys;
use super::{random_token, TOKEN_LENGTH};

/// Lifetime of a signed Deep Linking response
const RESPONSE_EXPIRY_SECS: u64 = 300;

/// A signed response ready to be form-POSTed back to the platform
#[derive(Debug)]
pub struct DeepLinkResponse {
    pub return_url: String,
    pub jwt: String,
}

#[derive(Serialize)]
struct ResponseClaims {
    /// Issuer and audience swap relative to the launch token: the tool
    /// speaks as its client id, addressed to the platform issuer.
    iss: String,
    aud: String,
    iat: u64,
    exp: u64,
    nonce: String,
    #[serde(rename = "https://purl.imsglobal.org/spec/lti/claim/message_type")]
    message_type: &'static str,
    #[serde(rename = "https://purl.imsglobal.org/spec/lti/claim/version")]
    version: &'static str,
    #[serde(
        rename = "https://purl.imsglobal.org/spec/lti/claim/deployment_id",
        skip_serializing_if = "Option::is_none"
    )]
    deployment_id: Option<String>,
    #[serde(rename = "https://purl.imsglobal.org/spec/lti-dl/claim/content_items")]
    content_items: Vec<ContentItem>,
    #[serde(
        rename = "https://purl.imsglobal.org/spec/lti-dl/claim/data",
        skip_serializing_if = "Option::is_none"
    )]
    data: Option<String>,
}

#[derive(Serialize)]
struct ContentItem {
    #[serde(rename = "type")]
    item_type: &'static str,
    title: String,
    url: String,
}

/// Build and sign the Deep Linking response JWT
pub fn build_response(
    claims: &LtiClaims,
    platform: &Platform,
    keys: &ToolKeys,
    content_url: &str,
    content_title: &str,
    clock: &dyn Clock,
) -> Result<DeepLinkResponse> {
    let settings: &DeepLinkSettingsClaim = claims.deep_linking_settings.as_ref().ok_or_else(|| {
        ApiError::invalid_request("deep linking settings are missing from the request")
    })?;

    if settings.deep_link_return_url.is_empty() {
        return Err(ApiError::invalid_request("deep link return URL is missing"));
    }

    let now = clock.now_secs();
    let response_claims = ResponseClaims {
        iss: platform.client_id.clone(),
        aud: platform.issuer.clone(),
        iat: now,
        exp: now + RESPONSE_EXPIRY_SECS,
        nonce: random_token(TOKEN_LENGTH),
        message_type: MESSAGE_TYPE_DEEP_LINKING_RESPONSE,
        version: LTI_VERSION,
        deployment_id: claims.deployment_id.clone(),
        content_items: vec![ContentItem {
            item_type: "ltiResourceLink",
            title: content_title.to_string(),
            url: content_url.to_string(),
        }],
        data: settings.data.clone(),
    };

    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(keys.kid.clone());

    let jwt = encode(&header, &response_claims, keys.encoding_key())
        .map_err(|e| ApiError::internal(format!("failed to sign deep linking response: {}", e)))?;

    Ok(DeepLinkResponse {
        return_url: settings.deep_link_return_url.clone(),
        jwt,
    })
}
