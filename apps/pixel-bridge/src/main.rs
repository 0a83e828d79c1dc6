use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use pixel_bridge::cli::{self, Cli, Command};
use pixel_bridge::config::BridgeConfig;
use pixel_bridge::ingest::Ingestor;
use pixel_bridge::mcp::McpServer;
use pixel_bridge::store::UpdateLog;
use pixel_bridge::telemetry::{
    self,
    logging::{self, LogConfig, LogLevel},
};
use pixel_bridge::websocket::{self, SocketState};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    let result = runtime.block_on(run(cli));
    // A blocked stdin read would otherwise hold the runtime open forever.
    runtime.shutdown_timeout(Duration::from_millis(250));
    result
}

async fn run(cli: Cli) -> Result<()> {
    match cli.into_command() {
        Command::Serve(args) => serve(BridgeConfig::try_from(args)?).await,
        Command::Send(args) => {
            init_client_logging()?;
            cli::run_send(args).await
        }
        Command::Show(args) => {
            init_client_logging()?;
            cli::run_show(args).await
        }
    }
}

fn init_client_logging() -> Result<()> {
    logging::init(&LogConfig {
        level: LogLevel::Warn,
        file: None,
    })
    .context("failed to initialise logging")
}

async fn serve(config: BridgeConfig) -> Result<()> {
    tokio::fs::create_dir_all(&config.storage_dir)
        .await
        .with_context(|| {
            format!(
                "failed to create storage directory {}",
                config.storage_dir.display()
            )
        })?;
    logging::init(&config.log).context("failed to initialise logging")?;
    info!(
        listen_addr = %config.listen_addr,
        storage = %config.storage_dir.display(),
        tools = config.tools_enabled,
        metrics = config.metrics_enabled,
        "starting pixel bridge"
    );

    let log = Arc::new(
        UpdateLog::load(config.updates_path())
            .await
            .context("failed to open update log")?,
    );

    let mut state = SocketState::new(Ingestor::new(Arc::clone(&log)), config.max_message_bytes);
    if config.metrics_enabled {
        state = state.with_metrics(telemetry::install_metrics()?);
    }

    let listener = TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    info!(addr = %listener.local_addr()?, "websocket listening");

    let socket = tokio::spawn(websocket::serve(listener, state, shutdown_signal()));

    if config.tools_enabled {
        let tools = McpServer::new(Arc::clone(&log));
        tokio::spawn(async move {
            if let Err(err) = tools.run_stdio().await {
                warn!(error = %err, "tool surface stopped");
            }
        });
    }

    socket.await.context("websocket task panicked")??;
    info!(stored = log.len().await, "pixel bridge stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
