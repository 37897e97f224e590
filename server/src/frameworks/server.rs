// Framework bootstrap for the hub runtime.

use crate::frameworks::{config, db::GameStore};
use crate::interface_adapters::net::ws_handler;
use crate::interface_adapters::state::AppState;
use crate::use_cases::hub::hub_task;
use crate::use_cases::types::HubEvent;

use axum::{
    Json, Router,
    extract::Request,
    http::{HeaderValue, header},
    middleware::{self, Next},
    response::Response,
    routing::get,
};
use std::io::Result;
use std::net::SocketAddr;
use tokio::sync::mpsc;
use tower_http::services::ServeDir;

fn init_runtime() {
    let _ = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

pub async fn run(listener: tokio::net::TcpListener) -> Result<()> {
    let address = listener.local_addr()?;
    let state = build_state().await;
    let app = build_router(state);

    tracing::info!(%address, "listening");

    // Serve app and report errors rather than panicking
    axum::serve(listener, app).await.inspect_err(|e| {
        tracing::error!(error = %e, "server error");
    })
}

pub async fn run_with_config() -> Result<()> {
    init_runtime();

    let address = SocketAddr::from(([0, 0, 0, 0], config::http_port()));

    // Bind TCP listener with error handling
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .inspect_err(|e| {
            tracing::error!(%address, error = %e, "failed to bind");
        })?;

    run(listener).await
}

async fn build_state() -> AppState {
    // Optional finished-game sink. A broken DATABASE_URL disables persistence
    // instead of refusing to start.
    let store = match config::database_url() {
        Some(url) => match connect_store(&url).await {
            Ok(store) => Some(store),
            Err(e) => {
                tracing::warn!(error = %e, "game store unavailable; persistence disabled");
                None
            }
        },
        None => None,
    };

    // All hub state lives behind this single queue; every other task only
    // ever posts events into it.
    let (hub_tx, hub_rx) = mpsc::channel::<HubEvent>(config::HUB_CHANNEL_CAPACITY);
    tokio::spawn(hub_task(hub_rx, hub_tx.clone(), store));
    tokio::spawn(stale_sweep_ticker(hub_tx.clone()));

    AppState { hub_tx }
}

async fn connect_store(url: &str) -> std::result::Result<GameStore, Box<dyn std::error::Error>> {
    let store = GameStore::connect(url).await?;
    store.run_migrations().await?;
    tracing::info!(database_url = %url, "game store ready");
    Ok(store)
}

fn build_router(state: AppState) -> Router {
    let static_files = ServeDir::new(config::static_dir()).append_index_html_on_directories(true);

    Router::new()
        .route("/ws", get(ws_handler))
        .route(
            "/health",
            get(|| async { Json(serde_json::json!({ "ok": true })) }),
        )
        .fallback_service(static_files)
        .layer(middleware::from_fn(no_cache_for_scripts))
        .with_state(state)
}

/// Browsers must revalidate scripts and stylesheets on every load so UI
/// updates roll out without cache busting.
async fn no_cache_for_scripts(request: Request, next: Next) -> Response {
    let path = request.uri().path().to_owned();
    let mut response = next.run(request).await;
    if path.ends_with(".js") || path.ends_with(".css") {
        response
            .headers_mut()
            .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    }
    response
}

async fn stale_sweep_ticker(hub_tx: mpsc::Sender<HubEvent>) {
    let mut interval = tokio::time::interval(config::STALE_SWEEP_INTERVAL);
    interval.tick().await;
    loop {
        interval.tick().await;
        if hub_tx.send(HubEvent::SweepStale).await.is_err() {
            break;
        }
    }
}
