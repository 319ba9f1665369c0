/*
 * Responsibility
 * - Config読み込み → tracing / telemetry 初期化 → 依存生成 → Router 組み立て
 * - Middleware の適用順 (外側から): trace id → security headers → CORS → timeout/limit/access log → route guard
 * - axum::serve() で起動し、SIGINT/SIGTERM で graceful shutdown
 */
use std::{panic, process, sync::Arc};

use anyhow::{Context, Result};
use axum::{Router, routing::get};
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api;
use crate::api::v1::handlers::health::health;
use crate::config::{AppEnv, Config};
use crate::middleware::{auth::Authenticator, cors, http, security_headers, trace};
use crate::repos::{InMemoryProductRepository, PgProductRepository, ProductRepository};
use crate::services::id_codec::IdCodec;
use crate::state::AppState;
use crate::telemetry::{self, FanoutLayer, LogHandlerExt, TelemetryConfig};

fn init_tracing(config: &TelemetryConfig) {
    // Prefer RUST_LOG if set; otherwise use a sensible default.
    // Ex:
    // RUST_LOG=info,product_api=debug,tower_http=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    let handler = telemetry::build_handler(config);
    let sinks = handler.sink_names();
    let handler = handler
        .into_shared()
        .with_attributes([("service", config.service_name.clone())]);

    tracing_subscriber::registry()
        .with(filter)
        .with(FanoutLayer::new(handler))
        .init();

    tracing::info!(service = %config.service_name, ?sinks, "logging initialized");
}

fn init_panic_hook(abort_on_panic: bool) {
    // Keep the default hook as a fallback (prints to stderr with location/payload).
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        // Always surface panics via tracing so they reach every sink.
        tracing::error!(%info, "panic");

        // In development, fail fast so we notice immediately.
        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> Result<()> {
    let config = Config::from_env()?;

    init_tracing(&config.telemetry);
    init_panic_hook(!config.app_env.is_production());

    tracing::info!(
        "starting API in {:?} mode on {}",
        config.app_env,
        config.addr
    );

    let state = build_state(&config).await?;
    let app = build_router(state, &config);

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("binding {}", config.addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn build_repository(config: &Config) -> Result<Arc<dyn ProductRepository>> {
    let Some(database_url) = config.database_url.as_deref() else {
        tracing::warn!("DATABASE_URL not set, using in-memory product storage");
        return Ok(Arc::new(InMemoryProductRepository::new()));
    };

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .context("connecting to postgres")?;

    let repo = PgProductRepository::new(pool);
    repo.migrate().await.context("preparing products table")?;
    tracing::info!("connected to postgres");

    Ok(Arc::new(repo))
}

async fn build_state(config: &Config) -> Result<AppState> {
    let repo = build_repository(config).await?;
    let id_codec = IdCodec::new(config.sqids_min_length, &config.sqids_alphabet)?;

    // Never fails: a broken trust config yields an authenticator that answers 500.
    let auth = Authenticator::from_config(&config.auth).await;

    Ok(AppState::new(repo, id_codec, auth))
}

pub fn build_router(state: AppState, config: &Config) -> Router {
    router(state, config.app_env, &config.cors_allowed_origins)
}

/// Full middleware stack around the API; also used by integration tests.
pub fn router(state: AppState, app_env: AppEnv, cors_allowed_origins: &[String]) -> Router {
    let app = Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api::v1::routes(&state))
        .with_state(state);

    let app = http::apply(app);
    let app = cors::apply(app, app_env, cors_allowed_origins);
    let app = security_headers::apply(app);

    // outermost: every response, including 408/413, carries X-Trace-Id
    trace::apply(app)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received ctrl-c, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
