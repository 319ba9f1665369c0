//! Token verification capability consumed by the Authenticator.
//!
//! A verifier checks signature, expiry, issuer and audience and hands back the
//! raw claims object. Turning claims into an identity is not its job.

use async_trait::async_trait;
use jsonwebtoken::Algorithm;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("malformed token header: {0}")]
    Malformed(#[source] jsonwebtoken::errors::Error),
    #[error("unsupported signing algorithm {0:?}")]
    UnsupportedAlgorithm(Algorithm),
    #[error("no signing key matches kid {0:?}")]
    UnknownKey(Option<String>),
    #[error("signing key unusable: {0}")]
    InvalidKey(String),
    #[error("signing keys unavailable: {0}")]
    KeySet(String),
    #[error("token rejected: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

/// Claims of a token whose signature and registered claims were validated.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedToken {
    claims: Map<String, Value>,
}

impl VerifiedToken {
    pub fn new(claims: Map<String, Value>) -> Self {
        Self { claims }
    }

    pub fn claims(&self) -> &Map<String, Value> {
        &self.claims
    }

    pub fn into_claims(self) -> Map<String, Value> {
        self.claims
    }
}

#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// May suspend on key-set fetches; callers bound it with a timeout and
    /// cancel it by dropping the future.
    async fn verify(&self, token: &str) -> Result<VerifiedToken, VerifyError>;
}

/// Only asymmetric algorithms are accepted from an identity provider.
pub(crate) fn ensure_asymmetric(alg: Algorithm) -> Result<(), VerifyError> {
    match alg {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
            Err(VerifyError::UnsupportedAlgorithm(alg))
        }
        _ => Ok(()),
    }
}
