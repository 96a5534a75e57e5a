// src/main.rs

use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use tracing::info;

use https_posture_scanner::config::ServiceArgs;
use https_posture_scanner::core::publisher::{FindingPublisher, NatsPublisher};
use https_posture_scanner::core::scanner::{Engine, Scanner};
use https_posture_scanner::logging;
use https_posture_scanner::server::{self, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    // --- Setup ---
    let args = ServiceArgs::parse();
    args.validate().wrap_err("invalid configuration")?;
    logging::initialize_logging(&args.log_level, args.log_file)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        listen = %args.listen,
        default_check = ?args.check,
        subject = %args.nats_subject,
        "Starting HTTPS posture scanner."
    );

    let engine = Engine::new(args.engine_config()).wrap_err("failed to build probers")?;
    let bus = NatsPublisher::connect(&args.nats_url, &args.nats_name)
        .await
        .wrap_err_with(|| format!("failed to connect to NATS at {}", args.nats_url))?;
    let publisher = FindingPublisher::new(Arc::new(bus), args.publisher_config());
    let scanner = Arc::new(Scanner::new(engine, publisher));

    // --- Serve ---
    server::serve(args.listen, AppState::new(scanner, args.check))
        .await
        .wrap_err("HTTP listener failed")?;

    info!("Scanner stopped.");
    Ok(())
}
