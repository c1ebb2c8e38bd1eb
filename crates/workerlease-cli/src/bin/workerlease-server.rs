use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;
use workerlease::transport::{ServerConfig, serve};
use workerlease::{EngineConfig, LeaseEngine, WORKERLEASE_VERSION};
use workerlease_cli::{init_tracing, parse_duration};

#[derive(Parser, Debug)]
#[command(name = "workerlease-server", version, about = "Serve worker-id leases over HTTP")]
struct Cli {
    /// Address to bind
    #[arg(long, env = "WORKERLEASE_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(long, env = "WORKERLEASE_PORT", default_value_t = 8080)]
    port: u16,

    /// How long a lease stays valid without renewal
    #[arg(long, env = "WORKERLEASE_LEASE_DURATION", default_value = "24h", value_parser = parse_duration)]
    lease_duration: Duration,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    info!(version = WORKERLEASE_VERSION, "Starting workerlease-server");
    info!("  Lease duration: {:?}", cli.lease_duration);

    let engine = Arc::new(LeaseEngine::new(
        EngineConfig::default().with_lease_duration(cli.lease_duration),
    ));
    let config = ServerConfig {
        host: cli.host,
        port: cli.port,
    };

    serve(config, engine).await
}
