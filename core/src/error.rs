//! Error types and HTTP response mapping

use serde::Serialize;
use thiserror::Error;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, ApiError>;

/// API error with HTTP status code mapping
///
/// Verification failures are distinct variants internally (for logging and
/// tests) but share a single external key and message, so a caller probing
/// the launch endpoint cannot tell a bad signature from a replayed nonce.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("no LTI platform is configured for issuer '{issuer}'")]
    UnknownPlatform { issuer: String },

    #[error("JWT verification failed: {message}")]
    JwtInvalid { message: String },

    #[error("nonce claim is missing from the id_token")]
    NonceMissing,

    #[error("nonce is unknown, expired, or already consumed")]
    NonceUnknownOrExpired,

    #[error("state does not match the state memorized for this nonce")]
    StateMismatch,

    #[error("unsupported LTI message type: {message_type}")]
    UnsupportedMessageType { message_type: String },

    #[error("failed to fetch platform JWKS: {message}")]
    JwksFetch { message: String },

    #[error("upstream error: {message}")]
    Upstream { message: String },

    #[error("render error: {message}")]
    Render { message: String },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl ApiError {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    pub fn unknown_platform(issuer: impl Into<String>) -> Self {
        Self::UnknownPlatform {
            issuer: issuer.into(),
        }
    }

    pub fn jwt_invalid(message: impl Into<String>) -> Self {
        Self::JwtInvalid {
            message: message.into(),
        }
    }

    pub fn jwks_fetch(message: impl Into<String>) -> Self {
        Self::JwksFetch {
            message: message.into(),
        }
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream {
            message: message.into(),
        }
    }

    pub fn render(message: impl Into<String>) -> Self {
        Self::Render {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// True for any failure of the launch verification pipeline
    pub fn is_launch_rejection(&self) -> bool {
        matches!(
            self,
            Self::JwtInvalid { .. }
                | Self::NonceMissing
                | Self::NonceUnknownOrExpired
                | Self::StateMismatch
                | Self::UnsupportedMessageType { .. }
        )
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidRequest { .. } => 400,
            Self::UnknownPlatform { .. } => 400,
            Self::JwtInvalid { .. } => 401,
            Self::NonceMissing => 401,
            Self::NonceUnknownOrExpired => 401,
            Self::StateMismatch => 401,
            Self::UnsupportedMessageType { .. } => 401,
            Self::JwksFetch { .. } => 502,
            Self::Upstream { .. } => 502,
            Self::Render { .. } => 500,
            Self::Internal { .. } => 500,
        }
    }

    /// Get the error key for this error
    pub fn error_key(&self) -> &'static str {
        match self {
            Self::InvalidRequest { .. } => "invalid_request",
            Self::UnknownPlatform { .. } => "unknown_platform",
            Self::JwtInvalid { .. }
            | Self::NonceMissing
            | Self::NonceUnknownOrExpired
            | Self::StateMismatch
            | Self::UnsupportedMessageType { .. } => "launch_rejected",
            Self::JwksFetch { .. } => "jwks_fetch_error",
            Self::Upstream { .. } => "upstream_error",
            Self::Render { .. } => "render_error",
            Self::Internal { .. } => "internal_error",
        }
    }

    /// Message safe to show to the caller. Launch rejections collapse to a
    /// single generic message; the specific reason is only ever logged.
    pub fn public_message(&self) -> String {
        if self.is_launch_rejection() {
            "The LTI launch could not be verified.".to_string()
        } else {
            self.to_string()
        }
    }
}

/// Error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl From<&ApiError> for ErrorResponse {
    fn from(err: &ApiError) -> Self {
        Self {
            error: err.error_key().to_string(),
            message: err.public_message(),
        }
    }
}
