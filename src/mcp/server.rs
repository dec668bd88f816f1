//! MCP Server Implementation
//!
//! This module provides the core MCP server framework with connection handling,
//! message routing, and protocol compliance.
//!
//! Requests are dispatched on their own tasks so a slow tool call never holds
//! up other requests. Responses are funnelled through a single writer task.

use crate::mcp::errors::{ErrorHandler, McpError};
use crate::mcp::protocol::*;
use crate::mcp::validation::{McpValidator, compile_schema, validate_instance};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use jsonschema::JSONSchema;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::io;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::RwLock;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::task::AbortHandle;
use tracing::{debug, error, info, warn};

/// MCP Server state and configuration
pub struct McpServer {
    /// Server implementation information
    pub server_info: Implementation,
    /// Server capabilities
    pub capabilities: ServerCapabilities,
    /// Usage instructions returned from `initialize`
    pub instructions: Option<String>,
    tools: RwLock<HashMap<String, RegisteredTool>>,
    connection_state: RwLock<ConnectionState>,
    /// Abort handles of requests still being processed, keyed by request id
    in_flight: Mutex<HashMap<RequestId, AbortHandle>>,
    validator: McpValidator,
}

struct RegisteredTool {
    tool: Tool,
    schema: JSONSchema,
    handler: Arc<dyn ToolHandler>,
}

/// Connection state tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Uninitialized,
    Initializing,
    Ready,
    Closed,
}

/// Tool handler trait for implementing tool execution
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn handle(&self, params: CallToolParams) -> Result<CallToolResult>;
}

/// Message handler for processing incoming messages
pub struct MessageHandler {
    server: Arc<McpServer>,
}

impl McpServer {
    /// Create a new MCP server
    #[inline]
    pub fn new(name: String, version: String) -> Result<Self> {
        let server_info = Implementation { name, version };

        let capabilities = ServerCapabilities {
            tools: Some(ToolsCapability {
                list_changed: Some(false),
            }),
        };

        Ok(Self {
            server_info,
            capabilities,
            instructions: None,
            tools: RwLock::new(HashMap::new()),
            connection_state: RwLock::new(ConnectionState::Uninitialized),
            in_flight: Mutex::new(HashMap::new()),
            validator: McpValidator::new()?,
        })
    }

    /// Set the instructions sent to clients on initialization
    #[inline]
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Register a tool with the server
    ///
    /// The tool's input schema is compiled here and every call's arguments
    /// are checked against it before the handler runs.
    #[inline]
    pub async fn register_tool<H>(&self, tool: Tool, handler: H) -> Result<()>
    where
        H: ToolHandler + 'static,
    {
        let tool_name = tool.name.clone();
        let schema = compile_schema(&tool.input_schema)
            .map_err(|e| anyhow!("Invalid input schema for tool '{}': {}", tool_name, e))?;

        self.tools.write().await.insert(
            tool_name.clone(),
            RegisteredTool {
                tool,
                schema,
                handler: Arc::new(handler),
            },
        );

        debug!("Registered tool: {}", tool_name);
        Ok(())
    }

    /// Names of all registered tools, sorted
    #[inline]
    pub async fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Start the server using stdio transport
    #[inline]
    pub async fn serve_stdio(self: Arc<Self>) -> Result<()> {
        info!("Starting MCP server with stdio transport");
        self.serve(io::stdin(), io::stdout()).await
    }

    /// Serve newline-delimited JSON-RPC over an arbitrary reader and writer
    /// until the reader reaches EOF. Requests still running at EOF are allowed
    /// to finish and their responses are written before this returns.
    #[inline]
    pub async fn serve<R, W>(self: Arc<Self>, reader: R, writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = unbounded_channel();
        let writer_task = tokio::spawn(write_messages(writer, rx));

        let mut reader = BufReader::new(reader);
        let mut line = String::new();
        loop {
            line.clear();
            match reader.read_line(&mut line).await {
                Ok(0) => {
                    info!("EOF reached, closing connection");
                    break;
                }
                Ok(_) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    self.dispatch_line(line, &tx).await;
                }
                Err(e) => {
                    error!("Error reading input: {}", e);
                    break;
                }
            }
        }

        *self.connection_state.write().await = ConnectionState::Closed;

        // The writer finishes once every in-flight request drops its sender
        drop(tx);
        writer_task
            .await
            .map_err(|e| anyhow!("Writer task failed: {}", e))??;

        info!("MCP server stopped");
        Ok(())
    }

    async fn dispatch_line(self: &Arc<Self>, line: &str, tx: &UnboundedSender<JsonRpcMessage>) {
        let raw_value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                error!("Failed to parse JSON: {}", e);
                send(
                    tx,
                    JsonRpcMessage::ErrorResponse(JsonRpcErrorResponse::new(
                        JsonRpcError::parse_error(),
                        None,
                    )),
                );
                return;
            }
        };

        let message = match self.validator.validate_raw_message(&raw_value) {
            Ok(message) => message,
            Err(e) => {
                error!("Message validation failed: {}", e);
                let id = raw_value
                    .get("id")
                    .and_then(|id| serde_json::from_value::<RequestId>(id.clone()).ok());
                send(
                    tx,
                    JsonRpcMessage::ErrorResponse(JsonRpcErrorResponse::new(
                        JsonRpcError::invalid_request(),
                        id,
                    )),
                );
                return;
            }
        };

        match message {
            JsonRpcMessage::Request(request) => self.spawn_request(request, tx.clone()),
            JsonRpcMessage::Notification(notification) => {
                let handler = MessageHandler::new(Arc::clone(self));
                if let Err(e) = handler.handle_notification(notification).await {
                    error!("Error processing notification: {}", e);
                }
            }
            JsonRpcMessage::Response(_) | JsonRpcMessage::ErrorResponse(_) => {
                warn!("Received unexpected response message from client");
            }
        }
    }

    fn spawn_request(self: &Arc<Self>, request: JsonRpcRequest, tx: UnboundedSender<JsonRpcMessage>) {
        let id = request.id.clone();
        let server = Arc::clone(self);

        // Hold the lock across the spawn so the task cannot deregister itself
        // before it has been registered.
        let mut in_flight = self.lock_in_flight();
        if in_flight.contains_key(&id) {
            warn!("Rejecting request with id {:?} already in flight", id);
            send(
                &tx,
                JsonRpcMessage::ErrorResponse(JsonRpcErrorResponse::new(
                    JsonRpcError::new(
                        error_codes::INVALID_REQUEST,
                        "Request id is already in use by a pending request".to_string(),
                        None,
                    ),
                    Some(id),
                )),
            );
            return;
        }
        let task = tokio::spawn(async move {
            let request_id = request.id.clone();
            let handler = MessageHandler::new(Arc::clone(&server));
            let response = handler.handle_request(request).await;
            server.lock_in_flight().remove(&request_id);
            send(&tx, response);
        });
        in_flight.insert(id, task.abort_handle());
    }

    /// Abort a request that is still running. No response is sent for it.
    /// Returns whether a matching request was found.
    #[inline]
    pub fn cancel_request(&self, id: &RequestId) -> bool {
        match self.lock_in_flight().remove(id) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Number of requests currently being processed
    #[inline]
    pub fn in_flight_count(&self) -> usize {
        self.lock_in_flight().len()
    }

    fn lock_in_flight(&self) -> std::sync::MutexGuard<'_, HashMap<RequestId, AbortHandle>> {
        // A panic while holding the lock cannot leave the map inconsistent
        self.in_flight
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Get current connection state
    #[inline]
    pub async fn connection_state(&self) -> ConnectionState {
        *self.connection_state.read().await
    }
}

fn send(tx: &UnboundedSender<JsonRpcMessage>, message: JsonRpcMessage) {
    if tx.send(message).is_err() {
        debug!("Output closed, dropping message");
    }
}

async fn write_messages<W>(mut writer: W, mut rx: UnboundedReceiver<JsonRpcMessage>) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = rx.recv().await {
        let json = serde_json::to_string(&message)?;
        writer.write_all(json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }
    Ok(())
}

impl MessageHandler {
    /// Create a new message handler
    #[inline]
    pub fn new(server: Arc<McpServer>) -> Self {
        Self { server }
    }

    /// Handle a JSON-RPC request and produce its response
    #[inline]
    pub async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcMessage {
        debug!("Handling request {}", request.method);

        let response = match request.method.as_str() {
            "initialize" => self.handle_initialize(request.params).await,
            "tools/list" => self.handle_list_tools().await,
            "tools/call" => self.handle_call_tool(request.params).await,
            "ping" => Ok(serde_json::json!({})),
            _ => {
                warn!("Unknown method: {}", request.method);
                return JsonRpcMessage::ErrorResponse(JsonRpcErrorResponse::new(
                    JsonRpcError::method_not_found(),
                    Some(request.id),
                ));
            }
        };

        match response {
            Ok(result) => JsonRpcMessage::Response(JsonRpcResponse::new(result, request.id)),
            Err(e) => {
                error!("Error handling request {}: {}", request.method, e);
                ErrorHandler::handle_error(&e, Some(request.id))
            }
        }
    }

    /// Handle a JSON-RPC notification
    #[inline]
    pub async fn handle_notification(&self, notification: JsonRpcNotification) -> Result<()> {
        match notification.method.as_str() {
            "notifications/initialized" | "initialized" => {
                *self.server.connection_state.write().await = ConnectionState::Ready;
                info!("Server ready to handle requests");
                Ok(())
            }
            "notifications/cancelled" => {
                let params: CancelledParams = serde_json::from_value(
                    notification.params.unwrap_or(Value::Null),
                )?;
                if self.server.cancel_request(&params.request_id) {
                    info!(
                        "Cancelled request {:?}: {}",
                        params.request_id,
                        params.reason.as_deref().unwrap_or("no reason given")
                    );
                } else {
                    debug!(
                        "Cancellation for unknown or finished request {:?}",
                        params.request_id
                    );
                }
                Ok(())
            }
            _ => {
                warn!("Unknown notification method: {}", notification.method);
                Ok(())
            }
        }
    }

    /// Handle initialize request
    #[inline]
    pub async fn handle_initialize(&self, params: Option<Value>) -> Result<Value> {
        let params: InitializeParams = match params {
            Some(p) => serde_json::from_value(p).map_err(|e| McpError::InvalidParameters {
                message: e.to_string(),
            })?,
            None => {
                return Err(McpError::InvalidParameters {
                    message: "Initialize request missing parameters".to_string(),
                }
                .into());
            }
        };

        let validator = &self.server.validator;
        let protocol_version = validator.negotiate_protocol_version(&params.protocol_version);
        if !validator.is_protocol_version_supported(&params.protocol_version) {
            warn!(
                "Client requested unsupported protocol version {}, offering {}",
                params.protocol_version, protocol_version
            );
        }

        *self.server.connection_state.write().await = ConnectionState::Initializing;

        let result = InitializeResult {
            protocol_version: protocol_version.to_string(),
            capabilities: self.server.capabilities.clone(),
            server_info: self.server.server_info.clone(),
            instructions: self.server.instructions.clone(),
        };

        info!("Client initialized: {}", params.client_info.name);
        Ok(serde_json::to_value(result)?)
    }

    /// Handle list tools request
    #[inline]
    pub async fn handle_list_tools(&self) -> Result<Value> {
        let mut tools: Vec<Tool> = self
            .server
            .tools
            .read()
            .await
            .values()
            .map(|registered| registered.tool.clone())
            .collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(serde_json::to_value(ListToolsResult { tools })?)
    }

    /// Handle call tool request
    #[inline]
    pub async fn handle_call_tool(&self, params: Option<Value>) -> Result<Value> {
        let params: CallToolParams = match params {
            Some(p) => serde_json::from_value(p).map_err(|e| McpError::InvalidParameters {
                message: e.to_string(),
            })?,
            None => {
                return Err(McpError::InvalidParameters {
                    message: "Tool call request missing parameters".to_string(),
                }
                .into());
            }
        };

        let handler = {
            let tools = self.server.tools.read().await;
            let registered = tools.get(&params.name).ok_or_else(|| McpError::ToolNotFound {
                name: params.name.clone(),
            })?;

            let arguments = Value::Object(params.arguments.clone().unwrap_or_default());
            validate_instance(&registered.schema, &arguments).map_err(|message| {
                McpError::InvalidToolParameters {
                    tool: params.name.clone(),
                    message,
                }
            })?;

            Arc::clone(&registered.handler)
        };

        let result = handler.handle(params).await?;
        Ok(serde_json::to_value(result)?)
    }
}
