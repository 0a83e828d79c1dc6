use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Args;

use crate::store::UPDATES_FILE;
use crate::telemetry::logging::{LogConfig, LogLevel};

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_STORAGE_DIR: &str = "storage";
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 1 << 30;
pub const LOG_FILE_NAME: &str = "server.log";

#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    /// Address the editor websocket listens on.
    #[arg(long, env = "PIXEL_BRIDGE_LISTEN_ADDR", default_value = DEFAULT_LISTEN_ADDR)]
    pub listen_addr: String,

    /// Directory holding the update log and server log.
    #[arg(long, env = "PIXEL_BRIDGE_STORAGE_DIR", default_value = DEFAULT_STORAGE_DIR)]
    pub storage_dir: PathBuf,

    /// Largest inbound websocket message accepted, in bytes.
    #[arg(
        long,
        env = "PIXEL_BRIDGE_MAX_MESSAGE_BYTES",
        default_value_t = DEFAULT_MAX_MESSAGE_BYTES
    )]
    pub max_message_bytes: usize,

    #[arg(long, env = "PIXEL_BRIDGE_LOG_LEVEL", value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// Log file path (defaults to `<storage-dir>/server.log`).
    #[arg(long, env = "PIXEL_BRIDGE_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Log to stderr only.
    #[arg(long, conflicts_with = "log_file")]
    pub no_log_file: bool,

    /// Serve only the websocket surface; leave stdin/stdout alone.
    #[arg(long, env = "PIXEL_BRIDGE_NO_TOOLS")]
    pub no_tools: bool,

    /// Install the Prometheus recorder and expose `/metrics`.
    #[arg(long, env = "PIXEL_BRIDGE_METRICS")]
    pub metrics: bool,
}

/// Validated settings for `pixel-bridge serve`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    pub listen_addr: SocketAddr,
    pub storage_dir: PathBuf,
    pub max_message_bytes: usize,
    pub log: LogConfig,
    pub tools_enabled: bool,
    pub metrics_enabled: bool,
}

impl BridgeConfig {
    pub fn updates_path(&self) -> PathBuf {
        self.storage_dir.join(UPDATES_FILE)
    }
}

impl TryFrom<ServeArgs> for BridgeConfig {
    type Error = anyhow::Error;

    fn try_from(args: ServeArgs) -> Result<Self, Self::Error> {
        let listen_addr: SocketAddr = args
            .listen_addr
            .parse()
            .with_context(|| format!("invalid listen address: {}", args.listen_addr))?;
        if args.max_message_bytes == 0 {
            bail!("max message size must be at least one byte");
        }
        let file = if args.no_log_file {
            None
        } else {
            Some(
                args.log_file
                    .unwrap_or_else(|| args.storage_dir.join(LOG_FILE_NAME)),
            )
        };
        Ok(BridgeConfig {
            listen_addr,
            storage_dir: args.storage_dir,
            max_message_bytes: args.max_message_bytes,
            log: LogConfig {
                level: args.log_level,
                file,
            },
            tools_enabled: !args.no_tools,
            metrics_enabled: args.metrics,
        })
    }
}
