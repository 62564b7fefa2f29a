//! Tool signing keys and JWKS publication
//!
//! The tool holds one RSA keypair: the private half signs Deep Linking
//! response JWTs, the public half is published as a JWKS document so
//! platforms can verify them.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::EncodingKey;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::traits::PublicKeyParts;
use rsa::RsaPublicKey;

use crate::config::{Config, TOOL_JWT_KID};
use crate::error::{ApiError, Result};

pub struct ToolKeys {
    pub kid: String,
    encoding_key: EncodingKey,
    jwks: serde_json::Value,
}

impl ToolKeys {
    pub fn new(kid: &str, private_key_pem: &str, public_key_pem: &str) -> Result<Self> {
        let encoding_key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
            .map_err(|e| ApiError::internal(format!("invalid tool private key: {}", e)))?;

        Ok(Self {
            kid: kid.to_string(),
            encoding_key,
            jwks: jwks_document(public_key_pem, kid)?,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            TOOL_JWT_KID,
            &config.tool_private_key_pem,
            &config.tool_public_key_pem,
        )
    }

    pub fn encoding_key(&self) -> &EncodingKey {
        &self.encoding_key
    }

    /// The JWKS document served at the tool's key endpoint
    pub fn jwks_document(&self) -> &serde_json::Value {
        &self.jwks
    }
}

fn jwks_document(public_key_pem: &str, kid: &str) -> Result<serde_json::Value> {
    let key = parse_public_key(public_key_pem)?;

    Ok(serde_json::json!({
        "keys": [{
            "kty": "RSA",
            "kid": kid,
            "alg": "RS256",
            "use": "sig",
            "n": URL_SAFE_NO_PAD.encode(key.n().to_bytes_be()),
            "e": URL_SAFE_NO_PAD.encode(key.e().to_bytes_be()),
        }]
    }))
}

/// Accept both PKCS#8 ("BEGIN PUBLIC KEY") and PKCS#1 ("BEGIN RSA PUBLIC KEY") PEMs
fn parse_public_key(pem: &str) -> Result<RsaPublicKey> {
    RsaPublicKey::from_public_key_pem(pem)
        .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
        .map_err(|e| ApiError::internal(format!("invalid tool public key: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::generate_rsa_keypair;

    #[test]
    fn test_jwks_document_shape() {
        let (private_pem, public_pem) = generate_rsa_keypair();
        let keys =
            ToolKeys::new("kid-1", &private_pem, &public_pem).expect("keys should construct");

        let jwks = keys.jwks_document();
        let jwk = &jwks["keys"][0];

        assert_eq!(jwk["kty"], "RSA");
        assert_eq!(jwk["kid"], "kid-1");
        assert_eq!(jwk["alg"], "RS256");
        assert_eq!(jwk["use"], "sig");
        assert!(!jwk["n"].as_str().unwrap().is_empty());
        assert!(!jwk["e"].as_str().unwrap().is_empty());
    }

    #[test]
    fn test_published_key_verifies_a_signature() {
        use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, Header, Validation};

        let (private_pem, public_pem) = generate_rsa_keypair();
        let keys =
            ToolKeys::new("kid-1", &private_pem, &public_pem).expect("keys should construct");

        #[derive(serde::Serialize, serde::Deserialize)]
        struct Claims {
            sub: String,
            exp: u64,
        }

        let token = encode(
            &Header::new(Algorithm::RS256),
            &Claims {
                sub: "check".to_string(),
                exp: u64::MAX,
            },
            keys.encoding_key(),
        )
        .expect("signing should succeed");

        let jwk = &keys.jwks_document()["keys"][0];
        let decoding_key = DecodingKey::from_rsa_components(
            jwk["n"].as_str().unwrap(),
            jwk["e"].as_str().unwrap(),
        )
        .expect("components should build a key");

        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = false;
        validation.set_required_spec_claims::<&str>(&[]);

        let decoded =
            decode::<Claims>(&token, &decoding_key, &validation).expect("token should verify");
        assert_eq!(decoded.claims.sub, "check");
    }

    #[test]
    fn test_invalid_private_key_is_rejected() {
        let (_, public_pem) = generate_rsa_keypair();
        assert!(ToolKeys::new("kid-1", "not-a-key", &public_pem).is_err());
    }
}
