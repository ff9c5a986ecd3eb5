//! Line-delimited JSON-RPC session over a pair of byte streams.

use super::protocol::{
    methods, request_key, CallToolParams, CancelledParams, ErrorCode, InitializeParams,
    JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, ToolDescriptor,
    DEFAULT_PROTOCOL_VERSION,
};
use crate::adapter::ExecutionContext;
use crate::error::ApiError;
use crate::sink::{CapabilitySink, ExposedCapability};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Serialized lines waiting for the writer task
pub type Outbound = mpsc::UnboundedReceiver<String>;

/// Protocol sink that exposes capabilities as tools to one client.
pub struct StdioServer {
    tools: RwLock<BTreeMap<String, ExposedCapability>>,
    outbound: mpsc::UnboundedSender<String>,
    initialized: AtomicBool,
    in_flight: Mutex<HashMap<String, CancellationToken>>,
}

impl StdioServer {
    /// Create a server and the receiving end of its output stream.
    pub fn new() -> (Arc<Self>, Outbound) {
        let (outbound, rx) = mpsc::unbounded_channel();
        let server = Arc::new(Self {
            tools: RwLock::new(BTreeMap::new()),
            outbound,
            initialized: AtomicBool::new(false),
            in_flight: Mutex::new(HashMap::new()),
        });
        (server, rx)
    }

    /// Whether the client has completed the initialize handshake
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Names currently exposed as tools
    pub fn tool_names(&self) -> Vec<String> {
        self.tools.read().keys().cloned().collect()
    }

    /// Serve requests until the input ends or `shutdown` fires.
    ///
    /// All output, including responses from spawned calls and list-changed
    /// notifications, is written by a single writer task.
    pub async fn run<R, W>(
        self: Arc<Self>,
        input: R,
        output: W,
        outbound: Outbound,
        shutdown: CancellationToken,
    ) -> Result<(), ApiError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let writer_done = CancellationToken::new();
        let writer = tokio::spawn(write_lines(output, outbound, writer_done.clone()));

        let mut lines = input.lines();
        let result = loop {
            tokio::select! {
                _ = shutdown.cancelled() => break Ok(()),
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        if let Some(response) = self.handle_message(&line).await {
                            self.send(&response);
                        }
                    }
                    Ok(None) => {
                        info!("Client closed the input stream");
                        break Ok(());
                    }
                    Err(e) => break Err(ApiError::IoError(e)),
                },
            }
        };

        for (_, token) in self.in_flight.lock().drain() {
            token.cancel();
        }
        writer_done.cancel();
        match writer.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(error = %e, "Protocol writer failed"),
            Err(e) => error!(error = %e, "Protocol writer task ended abnormally"),
        }
        result
    }

    /// Handle one incoming line. Returns the response to write, if any;
    /// `tools/call` responds later from its own task.
    pub async fn handle_message(self: &Arc<Self>, line: &str) -> Option<JsonRpcResponse> {
        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Unparsable protocol message");
                return Some(JsonRpcResponse::error(
                    Value::Null,
                    ErrorCode::ParseError,
                    format!("Parse error: {}", e),
                ));
            }
        };
        let id = value.get("id").cloned().unwrap_or(Value::Null);
        let request: JsonRpcRequest = match serde_json::from_value(value) {
            Ok(request) => request,
            Err(e) => {
                return Some(JsonRpcResponse::error(
                    id,
                    ErrorCode::InvalidRequest,
                    format!("Invalid request: {}", e),
                ))
            }
        };

        match request.id.clone() {
            None => {
                self.handle_notification(&request);
                None
            }
            Some(id) => self.handle_request(id, request),
        }
    }

    fn handle_notification(&self, request: &JsonRpcRequest) {
        match request.method.as_str() {
            methods::INITIALIZED => {
                self.initialized.store(true, Ordering::SeqCst);
                info!("Client initialized");
            }
            methods::CANCELLED => {
                let params = request
                    .params
                    .clone()
                    .and_then(|p| serde_json::from_value::<CancelledParams>(p).ok());
                let Some(params) = params else {
                    warn!("Ignoring malformed cancellation");
                    return;
                };
                let key = request_key(&params.request_id);
                if let Some(token) = self.in_flight.lock().remove(&key) {
                    debug!(request_id = %key, reason = ?params.reason, "Cancelling in-flight call");
                    token.cancel();
                }
            }
            other => debug!(method = %other, "Ignoring notification"),
        }
    }

    fn handle_request(
        self: &Arc<Self>,
        id: Value,
        request: JsonRpcRequest,
    ) -> Option<JsonRpcResponse> {
        match request.method.as_str() {
            methods::INITIALIZE => {
                let params: InitializeParams = request
                    .params
                    .and_then(|p| serde_json::from_value(p).ok())
                    .unwrap_or_default();
                let version = params
                    .protocol_version
                    .unwrap_or_else(|| DEFAULT_PROTOCOL_VERSION.to_string());
                Some(JsonRpcResponse::success(
                    id,
                    json!({
                        "protocolVersion": version,
                        "capabilities": { "tools": { "listChanged": true } },
                        "serverInfo": {
                            "name": env!("CARGO_PKG_NAME"),
                            "version": env!("CARGO_PKG_VERSION"),
                        },
                    }),
                ))
            }
            methods::PING => Some(JsonRpcResponse::success(id, json!({}))),
            methods::TOOLS_LIST => Some(JsonRpcResponse::success(
                id,
                json!({ "tools": self.list_tools() }),
            )),
            methods::TOOLS_CALL => self.start_call(id, request.params),
            other => Some(JsonRpcResponse::error(
                id,
                ErrorCode::MethodNotFound,
                format!("Method not found: {}", other),
            )),
        }
    }

    fn list_tools(&self) -> Vec<ToolDescriptor> {
        self.tools
            .read()
            .values()
            .map(|tool| ToolDescriptor {
                name: tool.name.clone(),
                description: tool.description.clone(),
                input_schema: tool
                    .input_schema
                    .clone()
                    .unwrap_or_else(|| json!({ "type": "object" })),
            })
            .collect()
    }

    /// Validate call params and spawn the invocation.
    fn start_call(self: &Arc<Self>, id: Value, params: Option<Value>) -> Option<JsonRpcResponse> {
        let params: CallToolParams = match params.map(serde_json::from_value) {
            Some(Ok(params)) => params,
            Some(Err(e)) => {
                return Some(JsonRpcResponse::error(
                    id,
                    ErrorCode::InvalidParams,
                    format!("Invalid params: {}", e),
                ))
            }
            None => {
                return Some(JsonRpcResponse::error(
                    id,
                    ErrorCode::InvalidParams,
                    "Missing params",
                ))
            }
        };
        let Some(tool) = self.tools.read().get(&params.name).cloned() else {
            return Some(JsonRpcResponse::error(
                id,
                ErrorCode::InvalidParams,
                format!("Unknown tool: {}", params.name),
            ));
        };

        let key = request_key(&id);
        let token = CancellationToken::new();
        self.in_flight.lock().insert(key.clone(), token.clone());
        let ctx = ExecutionContext::new(Some(key.clone()), token.clone());

        let server = Arc::clone(self);
        tokio::spawn(async move {
            let envelope = tool.handler.call(params.arguments, ctx).await;
            server.in_flight.lock().remove(&key);
            if token.is_cancelled() {
                debug!(request_id = %key, "Dropping response for cancelled call");
                return;
            }
            let response = match serde_json::to_value(&envelope) {
                Ok(result) => JsonRpcResponse::success(id, result),
                Err(e) => JsonRpcResponse::error(
                    id,
                    ErrorCode::InternalError,
                    format!("Failed to serialize result: {}", e),
                ),
            };
            if !server.send(&response) {
                debug!(request_id = %key, "Output closed before call completed");
            }
        });
        None
    }

    fn send<T: Serialize>(&self, message: &T) -> bool {
        match serde_json::to_string(message) {
            Ok(line) => self.outbound.send(line).is_ok(),
            Err(e) => {
                error!(error = %e, "Failed to serialize protocol message");
                false
            }
        }
    }
}

async fn write_lines<W>(
    mut output: W,
    mut outbound: Outbound,
    done: CancellationToken,
) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    loop {
        let line = tokio::select! {
            biased;
            line = outbound.recv() => match line {
                Some(line) => line,
                None => break,
            },
            _ = done.cancelled() => {
                while let Ok(line) = outbound.try_recv() {
                    output.write_all(line.as_bytes()).await?;
                    output.write_all(b"\n").await?;
                }
                break;
            }
        };
        output.write_all(line.as_bytes()).await?;
        output.write_all(b"\n").await?;
        output.flush().await?;
    }
    output.flush().await
}

#[async_trait]
impl CapabilitySink for StdioServer {
    fn register(&self, capability: ExposedCapability) {
        self.tools.write().insert(capability.name.clone(), capability);
    }

    fn remove(&self, name: &str) {
        self.tools.write().remove(name);
    }

    async fn notify_list_changed(&self) -> Result<(), ApiError> {
        if !self.is_initialized() {
            debug!("Client not initialized, skipping list-changed notification");
            return Ok(());
        }
        if self.send(&JsonRpcNotification::new(methods::TOOLS_LIST_CHANGED)) {
            Ok(())
        } else {
            Err(ApiError::ProtocolError(
                "protocol output stream is closed".to_string(),
            ))
        }
    }
}
