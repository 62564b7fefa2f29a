//! Collaborator traits
//!
//! These traits define the boundary between the core launch/reserves logic
//! and its I/O collaborators (HTTP client, wall clock, process environment).
//! The native server provides the real implementations; tests provide mocks.

use async_trait::async_trait;
use serde::de::DeserializeOwned;

/// HTTP client for outbound requests (platform JWKS, course catalog, file store)
#[async_trait(?Send)]
pub trait HttpClient {
    async fn get(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> crate::error::Result<HttpResponse>;
}

/// HTTP response from an outbound request
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Parse body as UTF-8 string
    pub fn text(&self) -> std::result::Result<String, std::string::FromUtf8Error> {
        String::from_utf8(self.body.clone())
    }

    /// Parse body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> std::result::Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// Clock for current time, in seconds since the Unix epoch
///
/// Injected everywhere time matters (cache expiry, JWT time claims, the
/// reserve window resolver) so every time-dependent path is deterministic
/// under test.
pub trait Clock {
    fn now_secs(&self) -> u64;
}

/// Environment/configuration variable access
pub trait Environment {
    fn get_var(&self, name: &str) -> crate::error::Result<String>;
}
