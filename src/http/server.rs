use crate::config::Config;
use crate::http::{posts, users, ApiContext};
use crate::models::{DynStore, Store};
use anyhow::Context;
use axum::routing::get;
use axum::{Json, Router};
use sqlx::SqlitePool;
use std::{
    net::{Ipv4Addr, SocketAddr},
    sync::Arc,
};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub async fn serve(config: Config, db: SqlitePool) -> anyhow::Result<()> {
    let port = config.port;

    let api_context = ApiContext {
        config: Arc::new(config),
        store: Arc::new(Store::new(db)) as DynStore,
    };

    let app = api_router(api_context);

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    log::info!("listening on {}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("error running HTTP server")
}

pub fn api_router(api_context: ApiContext) -> Router {
    // Anything the API doesn't claim is looked up in the front end's directory,
    // which also serves `index.html` for `/`.
    let static_files = ServeDir::new(&api_context.config.static_dir);

    Router::new()
        .route("/healthz", get(healthz))
        .merge(users::router())
        .merge(posts::router())
        .fallback_service(static_files)
        // Enables logging. Use `RUST_LOG=tower_http=debug`
        .layer(TraceLayer::new_for_http())
        .with_state(api_context)
}

async fn healthz() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("failed to listen for shutdown signal: {}", e);
        // Without a signal handler the server can only be killed, so keep serving.
        std::future::pending::<()>().await;
    }
    log::info!("shutdown signal received");
}
