//! Relay configuration.

use std::{path::PathBuf, time::Duration};

use wireline_proto::CodecConfig;

/// Default keepalive probe interval.
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(1);

/// Default per-read timeout. Bounds the blocking read so reader tasks
/// observe the shutdown flag on the next tick.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Default cap on concurrent connections.
pub const DEFAULT_MAX_CONNECTIONS: usize = 1024;

/// Relay server configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Address to bind to (e.g. "0.0.0.0:12346").
    pub bind_address: String,
    /// Directory for images uploaded by peers.
    pub inbound_dir: PathBuf,
    /// Directory of catalog images served on request.
    pub catalog_dir: PathBuf,
    /// Interval between `ping` probes on each connection.
    pub keepalive_interval: Duration,
    /// Socket read timeout; also the shutdown-flag polling granularity.
    pub read_timeout: Duration,
    /// Maximum concurrent connections; surplus accepts are dropped.
    pub max_connections: usize,
    /// When set, relayed chat is not echoed back to its sender. Off by
    /// default: legacy peers identify their own messages by sender address.
    pub chat_exclude_sender: bool,
    /// Receive buffer bounds for each connection's codec.
    pub codec: CodecConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:12346".to_string(),
            inbound_dir: PathBuf::from("received_images"),
            catalog_dir: PathBuf::from("server_images"),
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
            read_timeout: DEFAULT_READ_TIMEOUT,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            chat_exclude_sender: false,
            codec: CodecConfig::default(),
        }
    }
}
