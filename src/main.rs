//! Bingo Anytime backend entrypoint wiring the save API, the push socket and the save store.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bingo_anytime::{
    dao::save_store::{MemorySaveStore, SaveStore},
    routes,
    state::{AppState, SharedState},
};

/// Environment variable naming the JSON-lines file the save history is journaled to.
const JOURNAL_ENV: &str = "BINGO_ANYTIME_JOURNAL";
const DEFAULT_PORT: u16 = 3200;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let save_store: Arc<dyn SaveStore> = match env::var_os(JOURNAL_ENV) {
        Some(path) if !path.is_empty() => Arc::new(
            MemorySaveStore::with_journal(&path)
                .await
                .context("opening save journal")?,
        ),
        _ => {
            info!("no save journal configured; history is kept in memory only");
            Arc::new(MemorySaveStore::new())
        }
    };

    let app = build_router(AppState::new(save_store));

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(DEFAULT_PORT);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
