//! LTI 1.3 launch pipeline
//!
//! OIDC login initiation, id_token verification with nonce/state
//! anti-replay, message-type dispatch, and Deep Linking response signing.

pub mod claims;
pub mod deep_link;
mod jwks;
pub mod keys;
mod launch;
mod login;

pub use launch::{dispatch, verify_launch, LaunchRequest, LtiMessage, VerifiedLaunch};
pub use login::{initiate_login, LoginInitRequest};

use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::Rng;

/// Length of generated nonce and state tokens
pub(crate) const TOKEN_LENGTH: usize = 20;

/// Random alphanumeric token from the OS CSPRNG.
///
/// These tokens function as CSRF/replay tokens, so a non-cryptographic
/// source is not acceptable here.
pub(crate) fn random_token(len: usize) -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
