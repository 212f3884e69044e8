mod config;
mod watcher;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use convo_api::{AppState, AppStateInner, admin, dispatcher::Dispatcher, webhook};
use convo_db::Database;
use convo_platform::{CompletionClient, PlatformClient};

use crate::config::Config;
use crate::watcher::Watcher;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "convo_server=debug,convo_api=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Init database
    let db = Arc::new(Database::open(&config.db_path)?);

    // Outbound clients
    let platform = Arc::new(PlatformClient::new(config.page_access_token.clone()));
    let completion = config
        .openai_api_key
        .clone()
        .map(|key| Arc::new(CompletionClient::new(key)));
    if completion.is_none() {
        info!("No completion credential configured, /ai runs in demo mode");
    }

    // Shared state
    let dispatcher = Dispatcher::new(db.clone(), platform.clone(), completion);
    let state: AppState = Arc::new(AppStateInner {
        db: db.clone(),
        dispatcher,
        verify_token: config.verify_token.clone(),
    });

    // Name-change watcher
    let cancel = CancellationToken::new();
    let watcher = Watcher::new(db.clone(), platform.clone(), config.admin_psid.clone());
    let watcher_task = tokio::spawn(watcher.run(config.poll_interval, cancel.clone()));
    info!(
        "Name watcher polling every {}s",
        config.poll_interval.as_secs()
    );

    // Routes
    let app = Router::new()
        .route("/", get(health))
        .route("/webhook", get(webhook::verify).post(webhook::receive))
        .route("/admin/locks", get(admin::get_locks))
        .route("/admin/toggle-lock", post(admin::toggle_lock))
        .route("/admin/alerts", get(admin::get_alerts))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Convo bot listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cancel.cancel();
    watcher_task.await?;

    Ok(())
}

async fn health() -> &'static str {
    "Convo bot running"
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
