//! Slide-Relay desktop entry point.
//!
//! Wires a software volume, the direction detector, the WebSocket connector
//! and the relay service together, then reads console input until `quit`,
//! end of input, or Ctrl-C.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config() + CLI overrides
//!  └─ RelayService::start()      -- connection worker + direction pump
//!  └─ status printer             -- ChannelStatusSink -> stdout
//!  └─ run_console()              -- "+", "-", "cmd NAME", ...
//! ```
//!
//! # Settings precedence (for beginners)
//!
//! Command-line flags win over `SLIDE_RELAY_*` environment variables (clap
//! reads those for us), which win over the config file, which wins over the
//! built-in defaults.  `RUST_LOG`, when set, replaces the log level entirely.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use tokio::io::BufReader;
use tokio::runtime::Handle;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use relay_client::application::detect_direction::DirectionDetector;
use relay_client::application::relay_service::RelayService;
use relay_client::infrastructure::console::run_console;
use relay_client::infrastructure::host_bridge::ChannelStatusSink;
use relay_client::infrastructure::network::websocket::WebSocketConnector;
use relay_client::infrastructure::storage::config::load_config;
use relay_client::infrastructure::volume::software::SoftwareVolume;
use relay_client::infrastructure::volume::{VolumeController, VolumeSource};

#[derive(Debug, Parser)]
#[command(name = "slide-relay", version, about)]
struct Cli {
    /// Presentation server address (IP or hostname, no scheme).
    #[arg(long, env = "SLIDE_RELAY_HOST")]
    host: Option<String>,

    /// Presentation server port.
    #[arg(long, env = "SLIDE_RELAY_PORT")]
    port: Option<u16>,

    /// Config file to read instead of the platform default.
    #[arg(long, env = "SLIDE_RELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Direction detection strategy: `level` or `keys`.
    #[arg(long, env = "SLIDE_RELAY_STRATEGY")]
    strategy: Option<String>,

    /// Log level used when RUST_LOG is unset.
    #[arg(long, env = "SLIDE_RELAY_LOG_LEVEL")]
    log_level: Option<String>,

    /// Disable automatic reconnection.
    #[arg(long)]
    no_reconnect: bool,

    /// Do not read stdin; run until Ctrl-C.
    #[arg(long)]
    headless: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref()).context("loading configuration")?;
    if let Some(host) = cli.host {
        config.server.host = Some(host);
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(strategy) = cli.strategy {
        config.detector.strategy = strategy;
    }
    if let Some(level) = cli.log_level {
        config.logging.log_level = level;
    }
    if cli.no_reconnect {
        config.reconnect.enabled = false;
    }
    config.validate().context("validating settings")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.log_level)),
        )
        .init();

    let Some(host) = config.server.host.clone() else {
        bail!("no server host configured; pass --host or set [server].host");
    };

    info!("Slide-Relay starting");

    let volume = Arc::new(SoftwareVolume::default());
    let detector = DirectionDetector::new(
        Arc::clone(&volume) as Arc<dyn VolumeSource>,
        Arc::clone(&volume) as Arc<dyn VolumeController>,
        config.detector_options()?,
    );
    let (sink, mut status_rx) = ChannelStatusSink::new();
    let service = RelayService::new(
        Arc::new(WebSocketConnector),
        detector,
        Arc::new(sink),
        config.connection_options()?,
        Handle::current(),
    );

    tokio::spawn(async move {
        while let Some(event) = status_rx.recv().await {
            match event.error {
                Some(error) => println!("status: connected={} error={error}", event.connected),
                None => println!("status: connected={}", event.connected),
            }
        }
    });

    service
        .start(&host, config.server.port)
        .with_context(|| format!("starting relay to {host}:{}", config.server.port))?;

    if cli.headless {
        tokio::signal::ctrl_c().await?;
        info!("shutdown signal received");
    } else {
        let stdin = BufReader::new(tokio::io::stdin());
        let mut stdout = std::io::stdout();
        tokio::select! {
            result = run_console(stdin, &mut stdout, &volume, &service) => {
                if let Err(e) = result {
                    warn!("console input failed: {e}");
                }
            }
            _ = tokio::signal::ctrl_c() => info!("shutdown signal received"),
        }
    }

    service.stop();
    info!("Slide-Relay stopped");
    Ok(())
}
