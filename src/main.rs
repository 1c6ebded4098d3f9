use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use emsg_daemon::config::Config;
use emsg_daemon::context::AppContext;
use emsg_daemon::group::InMemoryEventLog;
use emsg_daemon::routes::create_router;
use emsg_daemon::routing::HickoryTxtLookup;
use emsg_daemon::storage::MemoryStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::from_env()?;
    let config = Arc::new(config);

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.rust_log.clone()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("=== EMSG Daemon Starting ===");
    info!("Domain: {}", config.domain);
    info!("Local domains: {}", config.local_domains.len());
    info!("Port: {}", config.port);

    let dns = HickoryTxtLookup::from_system_conf().context("Failed to initialize DNS resolver")?;

    let context = AppContext::new(
        config.clone(),
        Arc::new(MemoryStore::new()),
        Arc::new(InMemoryEventLog::new()),
        Arc::new(dns),
    )?;
    let relay = context.start_background_tasks();

    let app = create_router(Arc::new(context));

    // Start server
    let addr: SocketAddr = format!("[::]:{}", config.port)
        .parse()
        .context("Failed to parse bind address")?;

    info!("EMSG Daemon listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Failed to start server")?;

    if let Some(relay) = relay {
        relay.abort();
    }
    info!("EMSG Daemon stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
