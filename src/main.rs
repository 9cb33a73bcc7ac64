use std::sync::Arc;

use axum::extract::State;
use axum::http::Method;
use axum::routing::any;
use axum::{Json, Router};
use serde_json::Value;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

use bonifatusd::api::endpoint;
use bonifatusd::api::error::fail_debug;
use bonifatusd::api::AppState;
use bonifatusd::config::Config;
use bonifatusd::db;
use bonifatusd::email::LogMailer;

type SharedState = Arc<Mutex<AppState>>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();
    let conn = db::open_db(&config.database_path)?;
    tracing::info!(path = %config.database_path.display(), "database ready");

    let state: SharedState = Arc::new(Mutex::new(AppState::new(
        conn,
        Box::new(LogMailer),
        config.token_secret.clone(),
    )));

    let app = Router::new()
        .route("/api", any(api_endpoint))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Thin transport adapter: the method/body-to-envelope mapping lives in
/// `api::endpoint::respond`. Store calls are synchronous, so the whole
/// exchange runs on the blocking pool and holds the state lock there.
async fn api_endpoint(
    State(state): State<SharedState>,
    method: Method,
    body: String,
) -> Json<Value> {
    let reply = tokio::task::spawn_blocking(move || {
        let state = state.blocking_lock();
        endpoint::respond(&state, method.as_str(), &body)
    })
    .await;

    match reply {
        Ok(envelope) => Json(envelope),
        Err(e) => Json(fail_debug("Operation failed", e.to_string(), "dispatch")),
    }
}
