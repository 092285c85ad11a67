//! Twotter chat server.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin twotter-server -- --port 12345
//! cargo run --bin twotter-server -- --host 0.0.0.0 --ttl 120 --json-events
//! ```

use std::time::Duration;

use clap::Parser;
use twotter::logging::init_logging;
use twotter::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "twotter-server")]
#[command(about = "UDP chat server relaying text between numbered clients", long_about = None)]
struct Args {
    /// Address to bind to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// UDP port to listen on
    #[arg(short, long, default_value_t = twotter::DEFAULT_PORT)]
    port: u16,

    /// Seconds a client may stay silent before it is dropped
    #[arg(long, default_value_t = 300)]
    ttl: u64,

    /// Seconds between status broadcasts and expiry sweeps (0 disables)
    #[arg(long, default_value_t = 60)]
    maintenance_interval: u64,

    /// Print server events to stdout as JSON lines
    #[arg(long)]
    json_events: bool,
}

#[tokio::main]
async fn main() {
    init_logging(env!("CARGO_BIN_NAME"), "info");

    let args = Args::parse();

    let registry_config = RegistryConfig {
        ttl: Duration::from_secs(args.ttl),
        sweep_interval: Duration::from_secs(args.maintenance_interval),
    };

    let builder = ChatServer::builder()
        .bind(&format!("{}:{}", args.host, args.port))
        .registry_config(registry_config);
    let builder = if args.json_events {
        builder.event_sink(JsonLinesSink::stdout())
    } else {
        builder
    };

    let server = match builder.build().await {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(error = %e, "failed to start server");
            std::process::exit(1);
        }
    };

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
        tracing::info!("shutdown requested");
    };

    if let Err(e) = server.run_until(shutdown).await {
        tracing::error!(error = %e, "server error");
        std::process::exit(1);
    }
}
