//! Charge point simulator node
//!
//! Runs one simulated OCPP 1.6 charge point against a central system.
//!
//! # Usage
//!
//! ```bash
//! # Start with defaults
//! cpsim-node
//!
//! # Connect to a specific central system
//! cpsim-node --cp-id CP001 \
//!     --url ws://localhost:8180/steve/websocket/CentralSystemService
//!
//! # TLS endpoint with a private root certificate
//! cpsim-node --url wss://csms.example.com/ocpp --ca-cert /src/AmazonRootCA1.pem
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use cpsim_ocpp::SimulatorConfig;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// Simulated OCPP 1.6 charge point
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Central system WebSocket URL (charge point ID is appended)
    #[arg(long, default_value = "ws://localhost:8180/steve/websocket/CentralSystemService")]
    url: String,

    /// Charge point ID
    #[arg(long, default_value = "cp_test")]
    cp_id: String,

    /// Charge point model
    #[arg(long, default_value = "CHARGE_POINT_MODEL")]
    cp_model: String,

    /// Charge point vendor name
    #[arg(long, default_value = "CHARGE_POINT_VENDOR")]
    cp_vendor: String,

    /// Charge point firmware version
    #[arg(long, default_value = "1.2.3.4")]
    cp_version: String,

    /// Charge point serial number
    #[arg(long, default_value = "CP1234567890A01")]
    cp_serial: String,

    /// PEM root certificate to trust for wss URLs
    #[arg(long)]
    ca_cert: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Setup logging
    let level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to install logger: {}", e);
        return ExitCode::FAILURE;
    }

    let mut config = SimulatorConfig::new(&args.cp_id, &args.url)
        .with_vendor(&args.cp_vendor, &args.cp_model)
        .with_firmware(&args.cp_version)
        .with_serial(&args.cp_serial);

    if let Some(path) = &args.ca_cert {
        config = config.with_ca_cert(path);
    }

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, shutting down");
            on_signal.cancel();
        }
    });

    match cpsim_ocpp::simulator::run(config, cancel).await {
        Ok(()) => {
            info!("{}: stopped", args.cp_id);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}: {}", args.cp_id, e);
            ExitCode::FAILURE
        }
    }
}
