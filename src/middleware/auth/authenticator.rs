/*
 * Responsibility
 * - 起動時に 1 度だけ構築され、全リクエストで共有される認証器
 * - token 抽出 → 検証 → claims decode → policy 評価 → identity 生成
 * - 検証器が用意できなかった場合も panic せず、毎回 500 を返す状態で動き続ける
 */
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderMap, header};
use axum::routing::MethodRouter;

use super::access;
use super::claims::IdentityClaims;
use super::error::{AuthError, Unauthenticated};
use super::policy::AccessPolicy;
use crate::api::v1::extractors::AuthenticatedIdentity;
use crate::config::AuthConfig;
use crate::services::auth::{TokenVerifier, build_verifier};

const BEARER_PREFIX: &str = "Bearer ";

enum Mode {
    Verify {
        verifier: Arc<dyn TokenVerifier>,
        audience: String,
        timeout: Duration,
    },
    Unavailable {
        reason: String,
    },
    DevBypass,
}

#[derive(Clone)]
pub struct Authenticator {
    inner: Arc<Mode>,
}

impl fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.as_ref() {
            Mode::Verify {
                audience, timeout, ..
            } => f
                .debug_struct("Authenticator")
                .field("audience", audience)
                .field("timeout", timeout)
                .finish(),
            Mode::Unavailable { reason } => f
                .debug_struct("Authenticator")
                .field("unavailable", reason)
                .finish(),
            Mode::DevBypass => f.write_str("Authenticator(dev bypass)"),
        }
    }
}

impl Authenticator {
    pub fn new(
        verifier: Arc<dyn TokenVerifier>,
        audience: impl Into<String>,
        verify_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Mode::Verify {
                verifier,
                audience: audience.into(),
                timeout: verify_timeout,
            }),
        }
    }

    /// Rejects every protected request with 500.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Mode::Unavailable {
                reason: reason.into(),
            }),
        }
    }

    /// Skips verification and role checks. Local development only; config
    /// validation refuses `DEV_MODE` in production.
    pub fn development() -> Self {
        Self {
            inner: Arc::new(Mode::DevBypass),
        }
    }

    pub async fn from_config(config: &AuthConfig) -> Self {
        if config.dev_mode {
            tracing::warn!("DEV_MODE enabled: token verification and role checks are bypassed");
            return Self::development();
        }

        match build_verifier(config).await {
            Ok(verifier) => {
                tracing::info!(audience = %config.client_id, "token verifier ready");
                Self::new(verifier, config.client_id.clone(), config.verify_timeout)
            }
            Err(err) => {
                tracing::error!(error = %err, "token verifier unavailable, protected routes will fail");
                Self::unavailable(err.to_string())
            }
        }
    }

    pub fn is_dev_bypass(&self) -> bool {
        matches!(self.inner.as_ref(), Mode::DevBypass)
    }

    /// Wraps one route's handlers with authentication and `policy`.
    pub fn guard<S>(&self, policy: impl Into<AccessPolicy>, route: MethodRouter<S>) -> MethodRouter<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        access::guard(self.clone(), policy.into(), route)
    }

    pub async fn authenticate(
        &self,
        headers: &HeaderMap,
        policy: &AccessPolicy,
    ) -> Result<AuthenticatedIdentity, AuthError> {
        let (verifier, audience, timeout) = match self.inner.as_ref() {
            Mode::DevBypass => return Ok(AuthenticatedIdentity::dev_user()),
            Mode::Unavailable { reason } => {
                return Err(AuthError::MisconfiguredAuth(reason.clone()));
            }
            Mode::Verify {
                verifier,
                audience,
                timeout,
            } => (verifier, audience, *timeout),
        };

        let token = bearer_token(headers)?;

        // Dropping this future (client gone, outer timeout) cancels the fetch.
        let verified = tokio::time::timeout(timeout, verifier.verify(token))
            .await
            .map_err(|_| Unauthenticated::Timeout(timeout))?
            .map_err(Unauthenticated::from)?;

        let identity = IdentityClaims::decode(verified.into_claims())?.into_identity(audience);

        policy.evaluate(&identity.roles)?;

        Ok(identity)
    }
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, Unauthenticated> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(Unauthenticated::MissingHeader)?
        .to_str()
        .map_err(|_| Unauthenticated::InvalidHeader)?;

    let token = value.strip_prefix(BEARER_PREFIX).unwrap_or(value).trim();
    if token.is_empty() {
        return Err(Unauthenticated::EmptyToken);
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use axum::http::HeaderValue;
    use serde_json::{Value, json};

    use super::*;
    use crate::services::auth::{VerifiedToken, VerifyError};

    struct Fixed(Value);

    #[async_trait]
    impl TokenVerifier for Fixed {
        async fn verify(&self, token: &str) -> Result<VerifiedToken, VerifyError> {
            if token != "good" {
                return Err(VerifyError::UnknownKey(None));
            }
            match &self.0 {
                Value::Object(m) => Ok(VerifiedToken::new(m.clone())),
                _ => unreachable!(),
            }
        }
    }

    struct Hangs;

    #[async_trait]
    impl TokenVerifier for Hangs {
        async fn verify(&self, _token: &str) -> Result<VerifiedToken, VerifyError> {
            std::future::pending().await
        }
    }

    fn headers(auth: Option<&str>) -> HeaderMap {
        let mut h = HeaderMap::new();
        if let Some(v) = auth {
            h.insert(header::AUTHORIZATION, HeaderValue::from_str(v).unwrap());
        }
        h
    }

    fn authenticator(claims: Value) -> Authenticator {
        Authenticator::new(Arc::new(Fixed(claims)), "product-api", Duration::from_secs(1))
    }

    #[test]
    fn bearer_prefix_is_optional() {
        assert_eq!(bearer_token(&headers(Some("Bearer abc"))).unwrap(), "abc");
        assert_eq!(bearer_token(&headers(Some("abc"))).unwrap(), "abc");
        assert!(matches!(
            bearer_token(&headers(Some("Bearer "))),
            Err(Unauthenticated::EmptyToken)
        ));
        assert!(matches!(
            bearer_token(&headers(None)),
            Err(Unauthenticated::MissingHeader)
        ));
    }

    #[tokio::test]
    async fn builds_identity_from_audience_roles() {
        let auth = authenticator(json!({
            "sub": "u-1",
            "email": "u1@example.com",
            "resource_access": { "product-api": { "roles": ["manager"] } }
        }));

        let identity = auth
            .authenticate(&headers(Some("Bearer good")), &AccessPolicy::any_of(["admin", "manager"]))
            .await
            .unwrap();

        assert_eq!(identity.subject, "u-1");
        assert_eq!(identity.email.as_deref(), Some("u1@example.com"));
        assert!(identity.has_role("manager"));
    }

    #[tokio::test]
    async fn rejected_token_is_unauthenticated() {
        let auth = authenticator(json!({ "sub": "u-1" }));
        let err = auth
            .authenticate(&headers(Some("Bearer forged")), &AccessPolicy::authenticated())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AuthError::Unauthenticated(Unauthenticated::Rejected(_))
        ));
    }

    #[tokio::test]
    async fn policy_denial_is_forbidden() {
        let auth = authenticator(json!({ "sub": "u-1" }));
        let err = auth
            .authenticate(&headers(Some("Bearer good")), &AccessPolicy::all_of(["admin"]))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Forbidden(_)));
    }

    #[tokio::test]
    async fn unreadable_claims_are_server_errors() {
        let auth = authenticator(json!({ "sub": 42 }));
        let err = auth
            .authenticate(&headers(Some("Bearer good")), &AccessPolicy::authenticated())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::ClaimsDecode(_)));
    }

    #[tokio::test]
    async fn unavailable_wins_over_missing_header() {
        let auth = Authenticator::unavailable("discovery failed");
        let err = auth
            .authenticate(&headers(None), &AccessPolicy::authenticated())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::MisconfiguredAuth(_)));
    }

    #[tokio::test]
    async fn dev_bypass_ignores_header_and_roles() {
        let auth = Authenticator::development();
        let identity = auth
            .authenticate(&headers(None), &AccessPolicy::all_of(["admin"]))
            .await
            .unwrap();
        assert_eq!(identity.subject, "dev-user");
        assert!(identity.roles.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_verifier_times_out() {
        let auth = Authenticator::new(Arc::new(Hangs), "product-api", Duration::from_secs(5));
        let err = auth
            .authenticate(&headers(Some("Bearer good")), &AccessPolicy::authenticated())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AuthError::Unauthenticated(Unauthenticated::Timeout(_))
        ));
    }

    #[tokio::test]
    async fn dev_mode_config_builds_bypass() {
        let config = AuthConfig {
            dev_mode: true,
            ..AuthConfig::default()
        };
        assert!(Authenticator::from_config(&config).await.is_dev_bypass());
    }

    #[tokio::test]
    async fn broken_trust_config_degrades_to_unavailable() {
        let config = AuthConfig {
            client_id: "product-api".into(),
            public_key: Some("%%%".into()),
            ..AuthConfig::default()
        };
        let auth = Authenticator::from_config(&config).await;
        let err = auth
            .authenticate(&headers(Some("Bearer good")), &AccessPolicy::authenticated())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::MisconfiguredAuth(_)));
    }
}
