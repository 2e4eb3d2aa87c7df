//! Prosoche — adaptive attention daemon for Aletheia. Polls signal
//! collectors, scores them per agent, stages PROSOCHE.md, and wakes agents
//! through the gateway when warranted.

mod config;
mod daemon;
mod prediction;
mod rhythm;
mod scoring;
mod signals;
mod wake;
mod writer;

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use crate::daemon::{install_signal_handlers, ProsocheDaemon};
use crate::signals::calendar::CalendarCollector;
use crate::signals::health::HealthCollector;
use crate::signals::hex::HexCollector;
use crate::signals::memory::MemoryCollector;
use crate::signals::redshift::RedshiftCollector;
use crate::signals::tasks::TasksCollector;
use crate::signals::Collector;

#[derive(Parser)]
#[command(name = "prosoche", version, about = "Adaptive attention daemon for Aletheia")]
struct Cli {
    /// Path to config.yaml. Defaults to $ALETHEIA_ROOT/infrastructure/prosoche/config.yaml.
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    info!("prosoche v{} starting", env!("CARGO_PKG_VERSION"));

    let cfg = match config::load_config(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "failed to load config");
            std::process::exit(1);
        }
    };

    let http = reqwest::Client::new();

    let collectors: Vec<Box<dyn Collector>> = vec![
        Box::new(CalendarCollector),
        Box::new(TasksCollector),
        Box::new(HealthCollector),
        Box::new(MemoryCollector::new(http.clone())),
        Box::new(HexCollector::new(http.clone())),
        Box::new(RedshiftCollector),
    ];

    let mut daemon = ProsocheDaemon::new(cfg, collectors, http);
    install_signal_handlers(daemon.running_flag());

    daemon.run().await;
}
