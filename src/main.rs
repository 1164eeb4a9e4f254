use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use learnslot::config::Config;
use learnslot::engine::Engine;
use learnslot::server::{create_router, AppState};
use learnslot::store::{FallbackStore, RemoteStore, Store, WalStore};

const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();
    learnslot::observability::init(config.metrics_port)?;

    std::fs::create_dir_all(&config.data_dir)?;
    let local = Arc::new(WalStore::open(&config.wal_path())?);
    if config.seed {
        local.seed_if_empty().await?;
    }
    tokio::spawn(learnslot::compactor::run_compactor(local.clone(), config.compact_threshold));

    let store: Arc<dyn Store> = match &config.upstream_url {
        Some(raw) => {
            let base = if raw.ends_with('/') { raw.clone() } else { format!("{raw}/") };
            let remote = RemoteStore::new(Url::parse(&base)?, UPSTREAM_TIMEOUT)?;
            Arc::new(FallbackStore::new(remote, local.clone()))
        }
        None => local.clone(),
    };

    let calendar = config.calendar();
    let engine = Arc::new(Engine::new(store, calendar));
    let router = create_router(Arc::new(AppState { engine }));

    let addr = config.addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("learnslot listening on {addr}");
    info!("  data_dir: {}", config.data_dir.display());
    info!("  utc_offset: {}", calendar.offset());
    info!("  upstream: {}", config.upstream_url.as_deref().unwrap_or("none"));
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("learnslot stopped");
    Ok(())
}

/// Resolves on ctrl-c or SIGTERM. A handler that cannot be installed never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to register SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutdown signal received, draining requests");
}
