use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use chromelink::{router, BridgeConfig, Dispatcher, ServeState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = BridgeConfig::from_env();
    info!(
        chrome = %format!("{}:{}", config.chrome_host, config.debug_port),
        listen = %config.listen_addr,
        "starting bridge host"
    );

    let dispatcher = Arc::new(Dispatcher::new(&config));
    let app = router(ServeState { dispatcher });

    let listener = TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    info!("bridge ready at ws://{}/ws", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("bridge server exited unexpectedly")?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown requested");
}

/// `CHROMELINK_LOG` wins, then `RUST_LOG`, then `info`.
fn init_tracing() {
    let filter = std::env::var("CHROMELINK_LOG")
        .ok()
        .and_then(|raw| raw.parse::<EnvFilter>().ok())
        .unwrap_or_else(|| EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
