use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::{Extensions, request::Parts};

use super::AuthenticatedIdentity;

/// Identity published by the auth middleware, or `None` on routes it did not guard.
pub fn current_identity(extensions: &Extensions) -> Option<&AuthenticatedIdentity> {
    extensions.get::<AuthenticatedIdentity>()
}

/// Handler で AuthenticatedIdentity を受け取るための extractor
/// 認証されていない経路では `None` になる（エラーにはしない）
#[derive(Debug, Clone)]
pub struct CurrentIdentity(pub Option<AuthenticatedIdentity>);

impl CurrentIdentity {
    /// Subject for audit logs; `"anonymous"` when unauthenticated.
    pub fn subject(&self) -> &str {
        self.0.as_ref().map_or("anonymous", |i| i.subject.as_str())
    }
}

impl<S> FromRequestParts<S> for CurrentIdentity
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(CurrentIdentity(current_identity(&parts.extensions).cloned()))
    }
}
