//! OIDC login initiation
//!
//! First leg of the LTI launch: resolve the platform, memorize a fresh
//! nonce→state pair, and send the browser to the platform's authorization
//! endpoint.

use log::info;
use url::Url;

use crate::cache::OidcStateCache;
use crate::catalog::{self, CatalogConfig};
use crate::error::{ApiError, Result};
use crate::platform::{Clock, HttpClient};

use super::{random_token, TOKEN_LENGTH};

/// Query parameters of a login-initiation request
pub struct LoginInitRequest {
    pub iss: String,
    pub login_hint: String,
    pub target_link_uri: String,
    pub lti_message_hint: Option<String>,
}

/// Build the authorization redirect for a login initiation
pub async fn initiate_login(
    request: &LoginInitRequest,
    cache: &OidcStateCache,
    http: &dyn HttpClient,
    catalog_config: &CatalogConfig,
    clock: &dyn Clock,
) -> Result<String> {
    for (name, value) in [
        ("iss", &request.iss),
        ("login_hint", &request.login_hint),
        ("target_link_uri", &request.target_link_uri),
    ] {
        if value.is_empty() {
            return Err(ApiError::invalid_request(format!(
                "{} is required and was not found",
                name
            )));
        }
    }

    let platform = catalog::get_platform(&request.iss, http, catalog_config).await?;

    let nonce = random_token(TOKEN_LENGTH);
    let state = random_token(TOKEN_LENGTH);
    cache.put(&nonce, Some(state.clone()), clock);

    let mut url = Url::parse(&platform.oidc_auth_url).map_err(|_| {
        ApiError::internal(format!(
            "platform has an invalid oidcAuthUrl: {}",
            platform.oidc_auth_url
        ))
    })?;

    url.query_pairs_mut()
        .append_pair("client_id", &platform.client_id)
        .append_pair("login_hint", &request.login_hint)
        .append_pair("nonce", &nonce)
        .append_pair("prompt", "none")
        .append_pair("redirect_uri", &request.target_link_uri)
        .append_pair("response_mode", "form_post")
        .append_pair("response_type", "id_token")
        .append_pair("scope", "openid")
        .append_pair("state", &state);

    if let Some(hint) = request
        .lti_message_hint
        .as_deref()
        .filter(|hint| !hint.is_empty())
    {
        url.query_pairs_mut().append_pair("lti_message_hint", hint);
    }

    info!(
        "login initiation for {}: redirecting to authorization endpoint",
        request.iss
    );

    Ok(url.into())
}
