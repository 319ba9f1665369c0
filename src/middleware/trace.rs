//! Trace id propagation (`X-Trace-Id`).
//!
//! Responsibility:
//! - Reuse the caller's `x-trace-id` verbatim when present, otherwise mint a uuid v4
//! - Expose it to handlers as [`TraceContext`] (request extensions)
//! - Run the rest of the stack inside a `request` span carrying `trace_id`,
//!   which the log fan-out layer picks up for every event
//! - Echo the id on the response
//!
//! Applied outermost so that timeouts and body-limit rejections carry it too.

use axum::{
    Router,
    extract::{FromRequestParts, Request},
    http::{HeaderName, HeaderValue, request::Parts},
    middleware::{self, Next},
    response::Response,
};
use tracing::Instrument;
use uuid::Uuid;

use crate::error::AppError;

pub const TRACE_ID_HEADER: HeaderName = HeaderName::from_static("x-trace-id");

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceContext {
    id: String,
}

impl TraceContext {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    pub fn generate() -> Self {
        Self::new(Uuid::new_v4().to_string())
    }

    /// Inbound value if non-empty, fresh id otherwise.
    pub fn resolve(inbound: Option<&HeaderValue>) -> Self {
        match inbound.filter(|v| !v.is_empty()) {
            // opaque (non-UTF-8) bytes are kept lossily for logs; the header
            // itself is echoed unchanged
            Some(v) => Self::new(String::from_utf8_lossy(v.as_bytes())),
            None => Self::generate(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl<S> FromRequestParts<S> for TraceContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<TraceContext>().cloned().ok_or_else(|| {
            tracing::error!("trace context missing, trace layer not installed");
            AppError::Internal
        })
    }
}

pub fn apply(router: Router) -> Router {
    router.layer(middleware::from_fn(propagate_trace_id))
}

pub async fn propagate_trace_id(mut req: Request, next: Next) -> Response {
    let inbound = req
        .headers()
        .get(&TRACE_ID_HEADER)
        .filter(|v| !v.is_empty())
        .cloned();
    let trace = TraceContext::resolve(inbound.as_ref());

    // a uuid is always a valid header value
    let header_value = inbound.or_else(|| HeaderValue::from_str(trace.id()).ok());

    if let Some(value) = &header_value {
        req.headers_mut().insert(TRACE_ID_HEADER, value.clone());
    }

    let span = tracing::info_span!(
        "request",
        trace_id = %trace.id(),
        method = %req.method(),
        path = %req.uri().path(),
    );
    req.extensions_mut().insert(trace);

    let mut res = next.run(req).instrument(span).await;

    if let Some(value) = header_value {
        res.headers_mut().insert(TRACE_ID_HEADER, value);
    }
    res
}

#[cfg(test)]
mod tests {
    use axum::{body::Body, http::StatusCode, routing::get};
    use tower::ServiceExt;

    use super::*;

    async fn echo_trace(trace: TraceContext) -> String {
        trace.id().to_string()
    }

    fn app() -> Router {
        apply(Router::new().route("/", get(echo_trace)))
    }

    async fn call(app: Router, inbound: Option<HeaderValue>) -> (StatusCode, Option<HeaderValue>, String) {
        let mut req = Request::get("/");
        if let Some(v) = inbound {
            req = req.header(TRACE_ID_HEADER, v);
        }
        let res = app.oneshot(req.body(Body::empty()).unwrap()).await.unwrap();
        let status = res.status();
        let header = res.headers().get(&TRACE_ID_HEADER).cloned();
        let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, header, String::from_utf8(body.to_vec()).unwrap())
    }

    #[test]
    fn keeps_inbound_id_verbatim() {
        for inbound in ["abc123", "req 42", "tenant=a;span=7"] {
            let value = HeaderValue::from_static(inbound);
            assert_eq!(TraceContext::resolve(Some(&value)).id(), inbound);
        }
    }

    #[test]
    fn generates_id_when_absent_or_empty() {
        for inbound in [None, Some(HeaderValue::from_static(""))] {
            let trace = TraceContext::resolve(inbound.as_ref());
            assert!(Uuid::parse_str(trace.id()).is_ok(), "{inbound:?}");
        }
    }

    #[test]
    fn generated_ids_are_unique() {
        let a = TraceContext::generate();
        let b = TraceContext::generate();
        assert_ne!(a, b);
        assert!(!a.id().is_empty());
    }

    #[tokio::test]
    async fn inbound_id_with_space_round_trips() {
        let (status, header, body) = call(app(), Some(HeaderValue::from_static("req 42"))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(header.unwrap(), "req 42");
        assert_eq!(body, "req 42");
    }

    #[tokio::test]
    async fn long_inbound_id_round_trips() {
        let long = "a".repeat(200);
        let (_, header, body) = call(app(), Some(HeaderValue::from_str(&long).unwrap())).await;

        assert_eq!(header.unwrap(), long.as_str());
        assert_eq!(body, long);
    }

    #[tokio::test]
    async fn handler_sees_the_echoed_generated_id() {
        let (_, header, body) = call(app(), None).await;

        assert_eq!(header.unwrap(), body.as_str());
        assert!(Uuid::parse_str(&body).is_ok());
    }

    #[tokio::test]
    async fn extractor_without_layer_is_server_error() {
        let bare = Router::new().route("/", get(echo_trace));
        let (status, header, _) = call(bare, None).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(header.is_none());
    }
}
