//! Per-route auth middleware: verify the bearer token, enforce the route's
//! role policy, then publish `AuthenticatedIdentity` into request extensions.
//!
//! Attached with `MethodRouter::route_layer`, so each route carries its own
//! policy and there is no central registry.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::request::Parts,
    middleware::{self, Next},
    response::Response,
    routing::MethodRouter,
};

use super::authenticator::Authenticator;
use super::error::AuthError;
use super::policy::AccessPolicy;

#[derive(Clone)]
pub(super) struct RouteGuard {
    authenticator: Authenticator,
    policy: Arc<AccessPolicy>,
}

pub(super) fn guard<S>(
    authenticator: Authenticator,
    policy: AccessPolicy,
    route: MethodRouter<S>,
) -> MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    let state = RouteGuard {
        authenticator,
        policy: Arc::new(policy),
    };
    // axum 0.8 の from_fn は State extractor を受け取れないため、`from_fn_with_state` で明示的に state を渡す
    route.route_layer(middleware::from_fn_with_state(state, access_middleware))
}

async fn access_middleware(
    State(guard): State<RouteGuard>,
    req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    // Body is not Sync; only the parts are borrowed across the verification await.
    let (mut parts, body) = req.into_parts();

    let identity = match guard
        .authenticator
        .authenticate(&parts.headers, &guard.policy)
        .await
    {
        Ok(identity) => identity,
        Err(err) => {
            log_rejection(&parts, &err);
            return Err(err);
        }
    };

    tracing::debug!(subject = %identity.subject, "request authenticated");

    // middleware → extractor への受け渡し
    parts.extensions.insert(identity);

    Ok(next.run(Request::from_parts(parts, body)).await)
}

fn log_rejection(parts: &Parts, err: &AuthError) {
    let method = parts.method.as_str();
    let path = parts.uri.path();

    match err {
        AuthError::Unauthenticated(reason) => {
            tracing::warn!(%method, %path, reason = %reason, "access token rejected");
        }
        AuthError::Forbidden(denial) => {
            tracing::warn!(
                %method,
                %path,
                mode = %denial.mode,
                required = ?denial.required,
                granted = ?denial.granted,
                missing = ?denial.first_missing,
                "access denied by role policy"
            );
        }
        AuthError::MisconfiguredAuth(_) | AuthError::ClaimsDecode(_) => {
            tracing::error!(%method, %path, error = %err, "authentication failed on server side");
        }
    }
}
