use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use futures_util::{SinkExt, StreamExt};
use pixel_bridge_core::{now_millis, render, CanvasUpdate, Pixel, ServerMessage, PIXEL_UPDATE};
use serde_json::{json, Value};
use tokio::time::{timeout, Duration};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error};

use crate::config::{ServeArgs, DEFAULT_STORAGE_DIR};
use crate::history::DrawingSummary;
use crate::store::{read_updates, UPDATES_FILE};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(name = "pixel-bridge", version)]
#[command(about = "Pixel editor bridge: websocket ingestion, drawing history and stdio tools")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Options for the default `serve` command.
    #[command(flatten)]
    pub serve: ServeArgs,
}

impl Cli {
    /// `serve` with the top-level options when no subcommand was given.
    pub fn into_command(self) -> Command {
        self.command.unwrap_or(Command::Serve(self.serve))
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the websocket listener and the stdio tool surface
    Serve(ServeArgs),

    /// Send one pixel update to a running bridge and print the reply
    Send(SendArgs),

    /// Print a stored drawing in colour
    Show(ShowArgs),
}

#[derive(Args, Debug, Clone)]
pub struct SendArgs {
    /// Bridge websocket URL
    #[arg(short, long, default_value = "ws://127.0.0.1:8080")]
    pub url: String,

    /// JSON file holding a canvas update (pixels, timestamp, width, height)
    #[arg(short, long)]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ShowArgs {
    #[arg(long, env = "PIXEL_BRIDGE_STORAGE_DIR", default_value = DEFAULT_STORAGE_DIR)]
    pub storage_dir: PathBuf,

    /// 1-based drawing number; the newest when omitted
    #[arg(short, long)]
    pub index: Option<usize>,
}

/// Three pixels on a 32x32 canvas.
pub fn sample_update() -> CanvasUpdate {
    CanvasUpdate {
        pixels: vec![
            Pixel::new(12, 8, 0xFF0000),
            Pixel::new(13, 8, 0x00FF00),
            Pixel::new(14, 8, 0x0000FF),
        ],
        timestamp: now_millis(),
        width: 32,
        height: 32,
    }
}

pub async fn run_send(args: SendArgs) -> Result<()> {
    let data = match &args.file {
        Some(path) => {
            let text = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            serde_json::from_str::<Value>(&text)
                .with_context(|| format!("{} is not valid JSON", path.display()))?
        }
        None => serde_json::to_value(sample_update())?,
    };

    match send_update(&args.url, data).await? {
        ServerMessage::Error(message) => bail!("bridge rejected update: {message}"),
        reply => {
            println!("{}", serde_json::to_string_pretty(&reply)?);
            Ok(())
        }
    }
}

/// Wraps `data` in a `pixel_update` envelope, sends it and waits for the
/// single reply.
pub async fn send_update(url: &str, data: Value) -> Result<ServerMessage> {
    debug!(%url, "connecting to bridge");
    let (ws_stream, _) = match timeout(CONNECT_TIMEOUT, connect_async(url)).await {
        Ok(Ok(result)) => result,
        Ok(Err(err)) => {
            error!(%url, error = %err, "failed to connect");
            return Err(anyhow!("connection to {url} failed: {err}"));
        }
        Err(_) => {
            return Err(anyhow!(
                "connection timeout after {}s - is the bridge running?",
                CONNECT_TIMEOUT.as_secs()
            ));
        }
    };
    let (mut write, mut read) = ws_stream.split();

    let envelope = json!({ "type": PIXEL_UPDATE, "data": data });
    write.send(Message::Text(envelope.to_string().into())).await?;

    let reply = timeout(CONNECT_TIMEOUT, async {
        while let Some(frame) = read.next().await {
            match frame? {
                Message::Text(text) => {
                    let reply: ServerMessage = serde_json::from_str(&text)?;
                    return Ok::<_, anyhow::Error>(reply);
                }
                Message::Close(_) => break,
                _ => continue,
            }
        }
        Err(anyhow!("bridge closed the connection without replying"))
    })
    .await
    .map_err(|_| anyhow!("no reply within {}s", CONNECT_TIMEOUT.as_secs()))??;

    let _ = write.send(Message::Close(None)).await;
    Ok(reply)
}

pub async fn run_show(args: ShowArgs) -> Result<()> {
    let path = args.storage_dir.join(UPDATES_FILE);
    let (summary, update) = select_update(&path, args.index).await?;
    println!("{summary}");
    println!("{}", render(&update.pixels, update.width, update.height).to_ansi());
    Ok(())
}

async fn select_update(
    path: &Path,
    index: Option<usize>,
) -> Result<(DrawingSummary, CanvasUpdate)> {
    let mut updates = read_updates(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    if updates.is_empty() {
        bail!("No saved drawings found.");
    }
    let ordinal = index.unwrap_or(updates.len());
    if ordinal == 0 || ordinal > updates.len() {
        bail!(
            "drawing {ordinal} does not exist; {} saved drawings",
            updates.len()
        );
    }
    let update = updates.swap_remove(ordinal - 1);
    Ok((DrawingSummary::from_update(ordinal, &update), update))
}
