//! Platform JWKS handling
//!
//! Fetches a platform's key set and selects the key a launch token was
//! signed with.

use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::DecodingKey;

use crate::error::{ApiError, Result};
use crate::platform::HttpClient;

/// Fetch the platform's JWKS and return the decoding key for `kid`
pub async fn fetch_platform_key(
    jwks_url: &str,
    kid: &str,
    http: &dyn HttpClient,
) -> Result<DecodingKey> {
    let response = http
        .get(
            jwks_url,
            &[("Accept", "application/json"), ("User-Agent", "lti-courses")],
        )
        .await
        .map_err(|e| ApiError::jwks_fetch(format!("request failed: {}", e)))?;

    if response.status != 200 {
        return Err(ApiError::jwks_fetch(format!(
            "JWKS endpoint returned HTTP {}",
            response.status
        )));
    }

    let jwks: JwkSet = response
        .json()
        .map_err(|e| ApiError::jwks_fetch(format!("invalid JWKS document: {}", e)))?;

    let jwk = jwks
        .find(kid)
        .ok_or_else(|| ApiError::jwt_invalid(format!("key '{}' not found in JWKS", kid)))?;

    DecodingKey::from_jwk(jwk).map_err(|e| ApiError::jwt_invalid(format!("invalid JWK: {}", e)))
}
