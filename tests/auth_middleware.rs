mod common;

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use std::time::Duration;

use axum::{Json, Router, http::StatusCode, routing::get};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::{Value, json};

use common::{AUDIENCE, app_with, json_body, request, send, stub_authenticator, token};
use product_api::api::v1::extractors::CurrentIdentity;
use product_api::middleware::auth::{AccessPolicy, Authenticator};
use product_api::services::auth::StaticKeyVerifier;

const TRUSTED_PUBLIC: &str = include_str!("fixtures/trusted_public.pem");
const TRUSTED_PRIVATE: &str = include_str!("fixtures/trusted_private.pem");
const UNTRUSTED_PRIVATE: &str = include_str!("fixtures/untrusted_private.pem");

async fn whoami(CurrentIdentity(identity): CurrentIdentity) -> Json<Value> {
    Json(json!({
        "subject": identity.as_ref().map(|i| i.subject.clone()),
        "roles": identity.map(|i| i.sorted_roles()).unwrap_or_default(),
    }))
}

/// Routes with one policy each; `hits` counts handler invocations.
fn policy_app(auth: &Authenticator, hits: Arc<AtomicUsize>) -> Router {
    let counted = move |identity: CurrentIdentity| {
        let hits = hits.clone();
        async move {
            hits.fetch_add(1, Ordering::SeqCst);
            whoami(identity).await
        }
    };

    Router::new()
        .route("/open", get(whoami))
        .route(
            "/authenticated",
            auth.guard(AccessPolicy::authenticated(), get(counted.clone())),
        )
        .route(
            "/any",
            auth.guard(AccessPolicy::any_of(["admin", "manager"]), get(counted.clone())),
        )
        .route(
            "/all",
            auth.guard(AccessPolicy::all_of(["admin", "finance"]), get(counted)),
        )
}

fn sign(private_pem: &str, roles: &[&str]) -> String {
    let claims = json!({
        "sub": "user-7",
        "aud": AUDIENCE,
        "exp": chrono::Utc::now().timestamp() + 300,
        "resource_access": { AUDIENCE: { "roles": roles } },
    });
    let key = EncodingKey::from_rsa_pem(private_pem.as_bytes()).unwrap();
    let jwt = jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key).unwrap();
    format!("Bearer {jwt}")
}

#[tokio::test]
async fn missing_header_on_protected_route_is_401() {
    let app = app_with(stub_authenticator());

    for (method, uri) in [
        ("GET", "/api/v1/products"),
        ("POST", "/api/v1/products"),
        ("GET", "/api/v1/products/abcdefghij"),
        ("PUT", "/api/v1/products/abcdefghij"),
        ("DELETE", "/api/v1/products/abcdefghij"),
    ] {
        let res = send(&app, request(method, uri, None, None)).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "{method} {uri}");
        assert_eq!(json_body(res).await, json!({ "error": "missing bearer token" }));
    }
}

#[tokio::test]
async fn health_is_public() {
    let app = app_with(Authenticator::unavailable("not configured"));
    let res = send(&app, request("GET", "/health", None, None)).await;

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json_body(res).await, json!({ "status": "ok" }));
}

#[tokio::test]
async fn any_mode_passes_iff_roles_intersect() {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = policy_app(&stub_authenticator(), hits.clone());

    let cases: [(&[&str], StatusCode); 5] = [
        (&["admin"], StatusCode::OK),
        (&["manager"], StatusCode::OK),
        (&["viewer", "manager"], StatusCode::OK),
        (&["viewer"], StatusCode::FORBIDDEN),
        (&[], StatusCode::FORBIDDEN),
    ];
    for (roles, expected) in cases {
        let res = send(&app, request("GET", "/any", Some(&token("u", roles)), None)).await;
        assert_eq!(res.status(), expected, "{roles:?}");
    }
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn all_mode_requires_every_role() {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = policy_app(&stub_authenticator(), hits.clone());

    let cases: [(&[&str], StatusCode); 4] = [
        (&["admin", "finance"], StatusCode::OK),
        (&["finance", "admin", "viewer"], StatusCode::OK),
        (&["admin"], StatusCode::FORBIDDEN),
        (&["finance"], StatusCode::FORBIDDEN),
    ];
    for (roles, expected) in cases {
        let res = send(&app, request("GET", "/all", Some(&token("u", roles)), None)).await;
        assert_eq!(res.status(), expected, "{roles:?}");
    }

    let res = send(&app, request("GET", "/all", Some(&token("u", &["admin"])), None)).await;
    assert_eq!(json_body(res).await, json!({ "error": "insufficient permissions" }));
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn no_required_roles_accepts_any_verified_token() {
    let app = policy_app(&stub_authenticator(), Arc::new(AtomicUsize::new(0)));

    for roles in [&[][..], &["viewer"], &["admin", "finance"]] {
        let res = send(
            &app,
            request("GET", "/authenticated", Some(&token("u", roles)), None),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK, "{roles:?}");
    }
}

#[tokio::test]
async fn unguarded_route_sees_no_identity() {
    let app = policy_app(&stub_authenticator(), Arc::new(AtomicUsize::new(0)));
    let res = send(&app, request("GET", "/open", Some(&token("u", &["admin"])), None)).await;

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json_body(res).await, json!({ "subject": null, "roles": [] }));
}

#[tokio::test]
async fn dev_bypass_reaches_handler_as_dev_user() {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = policy_app(&Authenticator::development(), hits.clone());

    for auth in [None, Some("Bearer garbage")] {
        for uri in ["/authenticated", "/any", "/all"] {
            let res = send(&app, request("GET", uri, auth, None)).await;
            assert_eq!(res.status(), StatusCode::OK, "{uri} {auth:?}");
            assert_eq!(
                json_body(res).await,
                json!({ "subject": "dev-user", "roles": [] })
            );
        }
    }
    assert_eq!(hits.load(Ordering::SeqCst), 6);
}

#[tokio::test]
async fn unavailable_verifier_is_500_even_with_token() {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = policy_app(&Authenticator::unavailable("discovery failed"), hits.clone());

    for auth in [None, Some(token("u", &["admin"]))] {
        let res = send(&app, request("GET", "/authenticated", auth.as_deref(), None)).await;
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            json_body(res).await,
            json!({ "error": "authentication is not configured" })
        );
    }
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn untrusted_signature_is_401_and_handler_not_invoked() {
    let verifier = StaticKeyVerifier::from_rsa_key(TRUSTED_PUBLIC, None, AUDIENCE, 0).unwrap();
    let auth = Authenticator::new(Arc::new(verifier), AUDIENCE, Duration::from_secs(2));
    let hits = Arc::new(AtomicUsize::new(0));
    let app = policy_app(&auth, hits.clone());

    let forged = sign(UNTRUSTED_PRIVATE, &["admin"]);
    let res = send(&app, request("GET", "/any", Some(&forged), None)).await;

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(res).await, json!({ "error": "invalid token" }));
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn token_without_audience_is_401_even_with_roles() {
    let verifier = StaticKeyVerifier::from_rsa_key(TRUSTED_PUBLIC, None, AUDIENCE, 0).unwrap();
    let auth = Authenticator::new(Arc::new(verifier), AUDIENCE, Duration::from_secs(2));
    let hits = Arc::new(AtomicUsize::new(0));
    let app = policy_app(&auth, hits.clone());

    let claims = json!({
        "sub": "user-7",
        "exp": chrono::Utc::now().timestamp() + 300,
        "resource_access": { AUDIENCE: { "roles": ["admin"] } },
    });
    let key = EncodingKey::from_rsa_pem(TRUSTED_PRIVATE.as_bytes()).unwrap();
    let jwt = jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key).unwrap();

    let res = send(&app, request("GET", "/any", Some(&format!("Bearer {jwt}")), None)).await;

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn trusted_manager_token_passes_any_of_admin_manager() {
    let verifier = StaticKeyVerifier::from_rsa_key(TRUSTED_PUBLIC, None, AUDIENCE, 0).unwrap();
    let auth = Authenticator::new(Arc::new(verifier), AUDIENCE, Duration::from_secs(2));
    let hits = Arc::new(AtomicUsize::new(0));
    let app = policy_app(&auth, hits.clone());

    let res = send(
        &app,
        request("GET", "/any", Some(&sign(TRUSTED_PRIVATE, &["manager"])), None),
    )
    .await;

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        json_body(res).await,
        json!({ "subject": "user-7", "roles": ["manager"] })
    );
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn route_table_enforces_product_roles() {
    let app = app_with(stub_authenticator());
    let create = json!({ "name": "Desk", "price": 120.0 });

    let res = send(
        &app,
        request("POST", "/api/v1/products", Some(&token("m", &["manager"])), Some(create.clone())),
    )
    .await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = send(
        &app,
        request("POST", "/api/v1/products", Some(&token("a", &["admin"])), Some(create)),
    )
    .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let id = json_body(res).await["id"].as_str().unwrap().to_string();

    // rename needs manager, admin alone is not enough
    let rename = json!({ "name": "Standing desk" });
    let uri = format!("/api/v1/products/{id}");
    let res = send(
        &app,
        request("PUT", &uri, Some(&token("a", &["admin"])), Some(rename.clone())),
    )
    .await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = send(
        &app,
        request("PUT", &uri, Some(&token("m", &["manager"])), Some(rename)),
    )
    .await;
    assert_eq!(res.status(), StatusCode::OK);

    // reads only need a verified caller
    let res = send(&app, request("GET", &uri, Some(&token("v", &[])), None)).await;
    assert_eq!(res.status(), StatusCode::OK);

    let res = send(&app, request("DELETE", &uri, Some(&token("m", &["manager"])), None)).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}
