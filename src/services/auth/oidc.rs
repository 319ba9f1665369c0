//! OIDC-discovered verifier (`<issuer>/.well-known/openid-configuration`).

use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::Validation;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;
use url::Url;

use super::jwks::JwksCache;
use super::verifier::{TokenVerifier, VerifiedToken, VerifyError, ensure_asymmetric};

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("invalid issuer url: {0}")]
    InvalidIssuer(String),
    #[error("discovery request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid jwks_uri in provider metadata: {0}")]
    InvalidJwksUri(String),
    #[error("issuer mismatch: configured {expected}, provider reports {actual}")]
    IssuerMismatch { expected: String, actual: String },
    #[error("invalid static public key: {0}")]
    InvalidKey(String),
}

#[derive(Debug, Clone)]
pub struct OidcOptions {
    pub leeway_seconds: u64,
    pub cache_ttl: Duration,
    pub min_refresh_interval: Duration,
    pub http_timeout: Duration,
}

impl Default for OidcOptions {
    fn default() -> Self {
        Self {
            leeway_seconds: 60,
            cache_ttl: Duration::from_secs(300),
            min_refresh_interval: Duration::from_secs(30),
            http_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProviderMetadata {
    issuer: String,
    jwks_uri: String,
}

#[derive(Debug)]
pub struct OidcVerifier {
    issuer: String,
    audience: String,
    leeway_seconds: u64,
    keys: JwksCache,
}

fn same_issuer(a: &str, b: &str) -> bool {
    a.trim_end_matches('/') == b.trim_end_matches('/')
}

impl OidcVerifier {
    pub async fn discover(
        issuer_url: &str,
        client_id: &str,
        options: OidcOptions,
    ) -> Result<Self, DiscoveryError> {
        let issuer =
            Url::parse(issuer_url).map_err(|e| DiscoveryError::InvalidIssuer(e.to_string()))?;
        if !matches!(issuer.scheme(), "http" | "https") {
            return Err(DiscoveryError::InvalidIssuer(issuer_url.to_string()));
        }

        let http = reqwest::Client::builder()
            .timeout(options.http_timeout)
            .build()?;

        let well_known = format!(
            "{}/.well-known/openid-configuration",
            issuer_url.trim_end_matches('/')
        );

        let metadata: ProviderMetadata = http
            .get(well_known)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if !same_issuer(&metadata.issuer, issuer_url) {
            return Err(DiscoveryError::IssuerMismatch {
                expected: issuer_url.to_string(),
                actual: metadata.issuer,
            });
        }

        let jwks_uri = Url::parse(&metadata.jwks_uri)
            .map_err(|e| DiscoveryError::InvalidJwksUri(format!("{}: {e}", metadata.jwks_uri)))?;

        tracing::info!(
            issuer = %metadata.issuer,
            jwks_uri = %jwks_uri,
            "oidc provider discovered"
        );

        let keys = JwksCache::new(
            http,
            jwks_uri,
            options.cache_ttl,
            options.min_refresh_interval,
        );

        Ok(Self {
            issuer: metadata.issuer,
            audience: client_id.to_string(),
            leeway_seconds: options.leeway_seconds,
            keys,
        })
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn jwks_uri(&self) -> &Url {
        self.keys.jwks_uri()
    }
}

#[async_trait]
impl TokenVerifier for OidcVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedToken, VerifyError> {
        let header = jsonwebtoken::decode_header(token).map_err(VerifyError::Malformed)?;
        ensure_asymmetric(header.alg)?;

        let key = self.keys.key_for(header.kid.as_deref()).await?;

        let mut validation = Validation::new(header.alg);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.set_required_spec_claims(&["exp", "aud", "iss"]);
        validation.leeway = self.leeway_seconds;

        let data = jsonwebtoken::decode::<Map<String, Value>>(token, &key, &validation)?;
        Ok(VerifiedToken::new(data.claims))
    }
}
