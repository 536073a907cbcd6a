//! Wireline relay server binary.
//!
//! # Usage
//!
//! ```bash
//! # Listen on the default port with default image directories
//! wireline-server
//!
//! # Custom bind address and directories
//! wireline-server --bind 0.0.0.0:12346 \
//!     --inbound-dir received_images --catalog-dir server_images
//! ```

use std::{path::PathBuf, time::Duration};

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use wireline_server::{RelayConfig, RelayServer};

/// Wireline relay server
#[derive(Parser, Debug)]
#[command(name = "wireline-server")]
#[command(about = "Text and image relay hub over newline-delimited TCP")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = "0.0.0.0:12346")]
    bind: String,

    /// Directory for images uploaded by peers
    #[arg(long, default_value = "received_images")]
    inbound_dir: PathBuf,

    /// Directory of catalog images served on request
    #[arg(long, default_value = "server_images")]
    catalog_dir: PathBuf,

    /// Seconds between keepalive probes
    #[arg(long, default_value = "1")]
    keepalive_secs: u64,

    /// Maximum concurrent connections
    #[arg(long, default_value = "1024")]
    max_connections: usize,

    /// Do not echo relayed chat back to its sender
    #[arg(long)]
    exclude_sender: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Wireline relay starting");

    let config = RelayConfig {
        bind_address: args.bind,
        inbound_dir: args.inbound_dir,
        catalog_dir: args.catalog_dir,
        keepalive_interval: Duration::from_secs(args.keepalive_secs),
        max_connections: args.max_connections,
        chat_exclude_sender: args.exclude_sender,
        ..Default::default()
    };

    let server = RelayServer::bind(config).await?;
    tracing::info!("listening on {}", server.local_addr()?);

    let handle = server.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, shutting down");
            handle.shutdown();
        }
    });

    server.run().await?;

    Ok(())
}
