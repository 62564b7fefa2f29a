//! Mock implementations of collaborator traits for testing

use std::cell::Cell;
use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::{ApiError, Result};
use crate::platform::{Clock, Environment, HttpClient, HttpResponse};

/// Mock HTTP client with pre-configured responses, matched by URL substring
pub struct MockHttp {
    responses: Vec<(String, u16, Vec<u8>)>,
}

impl MockHttp {
    pub fn new(responses: Vec<(String, u16, Vec<u8>)>) -> Self {
        Self { responses }
    }

    pub fn with_json(responses: Vec<(&str, u16, serde_json::Value)>) -> Self {
        Self::new(
            responses
                .into_iter()
                .map(|(pattern, status, body)| {
                    (pattern.to_string(), status, body.to_string().into_bytes())
                })
                .collect(),
        )
    }
}

#[async_trait(?Send)]
impl HttpClient for MockHttp {
    async fn get(&self, url: &str, _headers: &[(&str, &str)]) -> Result<HttpResponse> {
        for (pattern, status, body) in &self.responses {
            if url.contains(pattern.as_str()) {
                return Ok(HttpResponse {
                    status: *status,
                    body: body.clone(),
                });
            }
        }
        Err(ApiError::upstream(format!("no mock response for GET {}", url)))
    }
}

/// Mock clock with a settable timestamp
pub struct MockClock {
    now: Cell<u64>,
}

impl MockClock {
    pub fn new(now: u64) -> Self {
        Self { now: Cell::new(now) }
    }

    pub fn advance(&self, secs: u64) {
        self.now.set(self.now.get() + secs);
    }

    pub fn set(&self, now: u64) {
        self.now.set(now);
    }
}

impl Clock for MockClock {
    fn now_secs(&self) -> u64 {
        self.now.get()
    }
}

/// Mock environment backed by an in-memory map
pub struct MockEnv {
    vars: HashMap<String, String>,
}

impl MockEnv {
    pub fn new(vars: Vec<(&str, &str)>) -> Self {
        Self {
            vars: vars
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

impl Environment for MockEnv {
    fn get_var(&self, name: &str) -> Result<String> {
        self.vars
            .get(name)
            .cloned()
            .ok_or_else(|| ApiError::internal(format!("variable '{}' not found", name)))
    }
}

/// Generate a fresh RSA key pair at runtime (never touches disk)
pub fn generate_rsa_keypair() -> (String, String) {
    use rand::rngs::OsRng;
    use rsa::pkcs1::{EncodeRsaPrivateKey, EncodeRsaPublicKey, LineEnding};
    use rsa::RsaPrivateKey;

    let private_key = RsaPrivateKey::new(&mut OsRng, 2048).expect("key generation failed");
    let private_pem = private_key
        .to_pkcs1_pem(LineEnding::LF)
        .expect("private key PEM export failed")
        .to_string();
    let public_pem = private_key
        .to_public_key()
        .to_pkcs1_pem(LineEnding::LF)
        .expect("public key PEM export failed");
    (private_pem, public_pem)
}

/// Build a JWKS document exposing `public_pem` under `kid`
pub fn jwks_for_public_key(public_pem: &str, kid: &str) -> serde_json::Value {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use rsa::pkcs1::DecodeRsaPublicKey;
    use rsa::traits::PublicKeyParts;
    use rsa::RsaPublicKey;

    let key = RsaPublicKey::from_pkcs1_pem(public_pem).expect("public key should parse");

    serde_json::json!({
        "keys": [{
            "kty": "RSA",
            "kid": kid,
            "alg": "RS256",
            "use": "sig",
            "n": URL_SAFE_NO_PAD.encode(key.n().to_bytes_be()),
            "e": URL_SAFE_NO_PAD.encode(key.e().to_bytes_be()),
        }]
    })
}
