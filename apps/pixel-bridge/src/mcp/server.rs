use std::sync::Arc;

use anyhow::Result;
use serde_json::{json, Value};
use tokio::io::{self, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::mcp::protocol::{
    invalid_params, invalid_request, method_not_found, parse_error, JsonRpcRequest,
    JsonRpcResponse, JSONRPC_VERSION,
};
use crate::mcp::tools;
use crate::mcp::{PROTOCOL_VERSION, SERVER_NAME};
use crate::store::UpdateLog;

/// Tool-invocation surface over newline-delimited JSON-RPC.
pub struct McpServer {
    service: Arc<McpService>,
}

impl McpServer {
    pub fn new(log: Arc<UpdateLog>) -> Self {
        Self {
            service: Arc::new(McpService { log }),
        }
    }

    pub fn handle(&self) -> McpServerHandle {
        McpServerHandle {
            service: Arc::clone(&self.service),
        }
    }

    /// Serves requests on stdin/stdout until stdin closes.
    pub async fn run_stdio(self) -> Result<()> {
        info!("tool server listening on stdio");
        handle_connection(io::stdin(), io::stdout(), self.service).await;
        info!("tool host closed stdin");
        Ok(())
    }
}

#[derive(Clone)]
pub struct McpServerHandle {
    service: Arc<McpService>,
}

impl McpServerHandle {
    pub fn spawn_connection<R, W>(&self, reader: R, writer: W) -> JoinHandle<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let service = Arc::clone(&self.service);
        tokio::spawn(async move {
            handle_connection(reader, writer, service).await;
        })
    }
}

async fn handle_connection<R, W>(reader: R, writer: W, service: Arc<McpService>)
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<JsonRpcResponse>(128);
    let writer_task = tokio::spawn(async move {
        write_loop(writer, &mut rx).await;
    });

    let mut lines = BufReader::new(reader).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                warn!(error = %err, "tool connection read error");
                break;
            }
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Value>(trimmed) {
            Ok(value) => match serde_json::from_value::<JsonRpcRequest>(value) {
                Ok(request) if request.jsonrpc != JSONRPC_VERSION => request
                    .id
                    .map(|id| invalid_request_with_id(id, "jsonrpc version must be 2.0")),
                Ok(request) => service.handle_request(request).await,
                Err(err) => {
                    warn!(error = %err, "invalid JSON-RPC request");
                    Some(invalid_request(format!("invalid request: {err}")))
                }
            },
            Err(err) => {
                warn!(error = %err, "failed to parse JSON payload");
                Some(parse_error("invalid json"))
            }
        };

        if let Some(response) = response {
            if tx.send(response).await.is_err() {
                break;
            }
        }
    }

    // Flush pending replies before returning.
    drop(tx);
    let _ = writer_task.await;
}

fn invalid_request_with_id(id: Value, message: &str) -> JsonRpcResponse {
    let mut response = invalid_request(message);
    response.id = id;
    response
}

async fn write_loop<W>(mut writer: W, rx: &mut mpsc::Receiver<JsonRpcResponse>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = rx.recv().await {
        match serde_json::to_string(&message) {
            Ok(mut text) => {
                text.push('\n');
                if writer.write_all(text.as_bytes()).await.is_err() {
                    break;
                }
                if writer.flush().await.is_err() {
                    break;
                }
            }
            Err(err) => {
                error!(error = %err, "failed to serialize json");
            }
        }
    }
}

struct McpService {
    log: Arc<UpdateLog>,
}

impl McpService {
    async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let id = request.id.clone();
        let method = request.method.as_str();
        debug!(method, notification = request.is_notification(), "tool request");

        if request.is_notification() {
            // initialized, cancelled, progress: nothing to answer
            return None;
        }

        let params = request.params.unwrap_or_else(|| json!({}));
        let response = match method {
            "initialize" => JsonRpcResponse::success(
                id,
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": { "tools": {} },
                    "serverInfo": {
                        "name": SERVER_NAME,
                        "version": env!("CARGO_PKG_VERSION"),
                    }
                }),
            ),
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => JsonRpcResponse::success(id, json!({ "tools": tools::list_tools() })),
            "tools/call" => match self.tools_call(&params).await {
                Ok(text) => JsonRpcResponse::success(
                    id,
                    json!({ "content": [{ "type": "text", "text": text }] }),
                ),
                Err(message) => {
                    warn!(error = %message, "tool call rejected");
                    invalid_params(id, message)
                }
            },
            _ => method_not_found(id, method),
        };
        Some(response)
    }

    async fn tools_call(&self, params: &Value) -> Result<String, String> {
        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| "tool name missing".to_string())?;
        let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));
        info!(tool = name, "tool call");
        tools::call_tool(&self.log, name, &arguments)
            .await
            .map_err(|err| err.to_string())
    }
}
