mod alert;
mod config;
mod error;
mod monitoring;
mod orchestrator;

use anyhow::Result;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::alert::AlertDispatcher;
use crate::config::Config;
use crate::orchestrator::Orchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = Config::from_env()?;
    info!(website = %config.website, ports = ?config.ports, "starting website monitor");

    let dispatcher = AlertDispatcher::from_config(&config)?;
    let orchestrator = Orchestrator::new(config, dispatcher)?;

    tokio::select! {
        result = orchestrator.run() => result,
        _ = signal::ctrl_c() => {
            info!("ctrl-c received, shutting down");
            Ok(())
        }
    }
}

/// `DEBUG=true` raises verbosity to debug; `RUST_LOG` overrides the filter.
fn init_tracing() {
    let debug = std::env::var("DEBUG")
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if debug { "debug" } else { "info" }));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
