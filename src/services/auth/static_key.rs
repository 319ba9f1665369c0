//! Fixed RSA public key verifier.
//!
//! Used when the provider's key is pinned in configuration (`OIDC_PUBLIC_KEY`)
//! instead of discovered. Accepts a PEM document or the bare base64 DER body
//! that identity-provider consoles usually display.

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde_json::{Map, Value};

use super::oidc::DiscoveryError;
use super::verifier::{TokenVerifier, VerifiedToken, VerifyError};

#[derive(Clone)]
pub struct StaticKeyVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for StaticKeyVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Do not print key material
        f.debug_struct("StaticKeyVerifier")
            .field("validation", &self.validation)
            .finish()
    }
}

/// Wraps a bare base64 DER public key into a PEM `PUBLIC KEY` document.
pub fn normalize_public_key(raw: &str) -> Result<String, DiscoveryError> {
    let raw = raw.trim();
    if raw.starts_with("-----BEGIN") {
        return Ok(raw.to_string());
    }

    let body: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD
        .decode(&body)
        .map_err(|e| DiscoveryError::InvalidKey(format!("not base64: {e}")))?;

    let mut pem = String::from("-----BEGIN PUBLIC KEY-----\n");
    for line in body.as_bytes().chunks(64) {
        // chunks of an ASCII string are valid UTF-8
        pem.push_str(&String::from_utf8_lossy(line));
        pem.push('\n');
    }
    pem.push_str("-----END PUBLIC KEY-----\n");
    Ok(pem)
}

impl StaticKeyVerifier {
    pub fn from_rsa_key(
        public_key: &str,
        issuer: Option<&str>,
        audience: &str,
        leeway_seconds: u64,
    ) -> Result<Self, DiscoveryError> {
        let pem = normalize_public_key(public_key)?;
        let decoding_key = DecodingKey::from_rsa_pem(pem.as_bytes())
            .map_err(|e| DiscoveryError::InvalidKey(e.to_string()))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[audience]);
        // jsonwebtoken only checks aud/iss when the token carries them
        match issuer {
            Some(issuer) => {
                validation.set_issuer(&[issuer]);
                validation.set_required_spec_claims(&["exp", "aud", "iss"]);
            }
            None => validation.set_required_spec_claims(&["exp", "aud"]),
        }
        validation.leeway = leeway_seconds;

        Ok(Self {
            decoding_key,
            validation,
        })
    }
}

#[async_trait]
impl TokenVerifier for StaticKeyVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedToken, VerifyError> {
        let data =
            jsonwebtoken::decode::<Map<String, Value>>(token, &self.decoding_key, &self.validation)?;
        Ok(VerifiedToken::new(data.claims))
    }
}
