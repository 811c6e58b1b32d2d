//! Service gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────────────┐
//!                    │                    SERVICE GATEWAY                    │
//!                    │                                                       │
//!   Client Request   │  ┌──────────┐   ┌──────────────────────────────────┐  │
//!   ─────────────────┼─▶│   net    │──▶│ http pipeline                    │  │
//!                    │  │ listener │   │ tls → idle → framing → aggregate │  │
//!                    │  │ (accept  │   └────────────────┬─────────────────┘  │
//!                    │  │ runtime) │                    ▼                    │
//!                    │  └──────────┘           ┌────────────────┐           │
//!                    │                         │   dispatcher   │           │
//!                    │                         │ (worker runtime)│          │
//!                    │                         └───────┬────────┘           │
//!                    │                                 ▼                    │
//!   Client Response  │                         ┌────────────────┐           │
//!   ◀────────────────┼─────────────────────────│ routing        │           │
//!                    │                         │ registry →     │           │
//!                    │                         │ Service        │           │
//!                    │                         └────────────────┘           │
//!                    │                                                       │
//!                    │  Cross-cutting: config, security headers + limits,    │
//!                    │  observability, lifecycle (signals, drain)            │
//!                    └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use service_gateway::config::{load_config, GatewayConfig};
use service_gateway::observability::logging;
use service_gateway::services::{health::HEALTH_SERVICE_NAME, HealthService};
use service_gateway::{Gateway, ServiceRegistry};

#[derive(Parser)]
#[command(name = "service-gateway")]
#[command(about = "HTTP/HTTPS gateway dispatching requests to registered services", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.http_port` (0 disables plaintext).
    #[arg(long)]
    http_port: Option<u16>,

    /// Override `listener.https_port` (0 disables TLS).
    #[arg(long)]
    https_port: Option<u16>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                logging::init("info");
                tracing::error!(path = %path.display(), error = %e, "Failed to load configuration");
                return ExitCode::FAILURE;
            }
        },
        None => GatewayConfig::default(),
    };
    if let Some(port) = cli.http_port {
        config.listener.http_port = port;
    }
    if let Some(port) = cli.https_port {
        config.listener.https_port = port;
    }

    logging::init(&config.observability.log_level);
    tracing::info!("service-gateway v{} starting", env!("CARGO_PKG_VERSION"));

    let mut registry = ServiceRegistry::new();
    if let Err(e) = registry.register(HEALTH_SERVICE_NAME, Arc::new(HealthService::new())) {
        tracing::error!(error = %e, "Failed to register built-in services");
        return ExitCode::FAILURE;
    }

    let gateway = match Gateway::start(config, registry) {
        Ok(gateway) => gateway,
        Err(e) => {
            tracing::error!(error = %e, "Gateway failed to start");
            return ExitCode::FAILURE;
        }
    };

    gateway.shutdown_on_signal();
    gateway.wait_for_shutdown();
    gateway.shutdown();

    tracing::info!("Shutdown complete");
    ExitCode::SUCCESS
}
