#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, Response, header},
};
use serde_json::{Value, json};
use tower::ServiceExt;

use product_api::app;
use product_api::config::AppEnv;
use product_api::middleware::auth::Authenticator;
use product_api::repos::InMemoryProductRepository;
use product_api::services::auth::{TokenVerifier, VerifiedToken, VerifyError};
use product_api::services::id_codec::IdCodec;
use product_api::state::AppState;

pub const AUDIENCE: &str = "product-api";

/// Accepts `ok:<sub>` or `ok:<sub>:<role>,<role>`; anything else is rejected.
pub struct StubVerifier;

#[async_trait]
impl TokenVerifier for StubVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedToken, VerifyError> {
        let mut parts = token.splitn(3, ':');
        let (Some("ok"), Some(sub)) = (parts.next(), parts.next()) else {
            return Err(VerifyError::UnknownKey(None));
        };
        let roles: Vec<&str> = parts
            .next()
            .map(|r| r.split(',').filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();

        let claims = json!({
            "sub": sub,
            "preferred_username": sub,
            "resource_access": { AUDIENCE: { "roles": roles } },
        });
        match claims {
            Value::Object(map) => Ok(VerifiedToken::new(map)),
            _ => unreachable!(),
        }
    }
}

pub fn token(sub: &str, roles: &[&str]) -> String {
    format!("Bearer ok:{sub}:{}", roles.join(","))
}

pub fn stub_authenticator() -> Authenticator {
    Authenticator::new(Arc::new(StubVerifier), AUDIENCE, Duration::from_secs(2))
}

pub fn state_with(auth: Authenticator) -> AppState {
    let codec = IdCodec::new(
        10,
        "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789",
    )
    .unwrap();
    AppState::new(Arc::new(InMemoryProductRepository::new()), codec, auth)
}

pub fn app_with(auth: Authenticator) -> Router {
    app::router(state_with(auth), AppEnv::Development, &[])
}

pub fn request(method: &str, uri: &str, auth: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn send(app: &Router, req: Request<Body>) -> Response<Body> {
    app.clone().oneshot(req).await.unwrap()
}

pub async fn json_body(res: Response<Body>) -> Value {
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).unwrap()
}
