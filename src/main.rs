//! linkwatch daemon
//!
//! Usage: `linkwatch [config.yaml]`. Without a path the built-in defaults are
//! used. SIGHUP requests a handler reload; Ctrl-C stops the loop and prints
//! every analyzer's results as JSON.

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use linkwatch::{Config, HandlerRegistry, Linkwatch, VarianceWindowTracker};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("linkwatch {} starting", env!("CARGO_PKG_VERSION"));

    let config = match std::env::args_os().nth(1) {
        Some(path) => Config::load(&path)
            .with_context(|| format!("can't load {}", path.to_string_lossy()))?,
        None => {
            warn!("No configuration file given; using defaults");
            Config::default()
        }
    };

    let mut registry = HandlerRegistry::from_config(&config.handlers);
    registry
        .install(Box::new(VarianceWindowTracker::default()), &config)
        .context("insufficient handler slots")?;

    let mut transport = Linkwatch::listen(registry, &config).await?;
    info!(vehicle = %config.link.peer_socket(), "Waiting for telemetry");

    #[cfg(unix)]
    linkwatch::transport::spawn_sighup_listener(transport.reload_flag())?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received; shutting down");
            on_interrupt.cancel();
        }
    });

    let stats = transport.run(&cancel).await;
    info!(?stats, "Final transport statistics");

    for report in transport.registry().reports()? {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}
