use anyhow::Result;
use std::path::PathBuf;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use super::transport::{LineTransport, StdioTransport};
use super::types::*;
use crate::tools::{
    p7m_inspect_tool::{P7mInspectTool, P7M_INSPECT_TOOL_DEFINITION},
    p7m_open_tool::{P7mOpenTool, P7M_OPEN_TOOL_DEFINITION},
    p7m_reset_tool::{P7mResetTool, P7M_RESET_TOOL_DEFINITION},
    p7m_save_tool::{P7mSaveTool, P7M_SAVE_TOOL_DEFINITION},
};
use crate::utils::content_guard::payload_code;
use crate::utils::p7m_extract::{Extractor, DEFAULT_STRIP_PASSES};
use crate::utils::session::{DocumentSession, DEFAULT_MAX_INPUT_BYTES};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderConfig {
    /// Where p7m-save writes when the call names no directory.
    pub output_dir: Option<PathBuf>,
    pub strip_passes: usize,
    pub max_input_bytes: u64,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            strip_passes: DEFAULT_STRIP_PASSES,
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
        }
    }
}

impl ReaderConfig {
    pub fn extractor(&self) -> Extractor<'static> {
        Extractor::with_passes(self.strip_passes)
    }

    pub fn new_session(&self) -> DocumentSession {
        DocumentSession::new(self.extractor(), self.max_input_bytes)
    }
}

pub struct McpServer<R = tokio::io::Stdin, W = tokio::io::Stdout> {
    transport: LineTransport<R, W>,
    config: ReaderConfig,
    session: DocumentSession,
    initialized: bool,
}

impl McpServer {
    pub fn new(config: ReaderConfig) -> Self {
        Self::with_transport(StdioTransport::stdio(), config)
    }
}

impl<R, W> McpServer<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn with_transport(transport: LineTransport<R, W>, config: ReaderConfig) -> Self {
        Self {
            transport,
            session: config.new_session(),
            config,
            initialized: false,
        }
    }

    pub async fn start(&mut self) -> Result<()> {
        info!("MCP server started and listening on stdio");

        loop {
            match self.transport.read_message().await? {
                Some(McpMessage::Request(request)) => {
                    let response = self.handle_request(request).await;
                    self.transport.write_response(response).await?;
                }
                Some(McpMessage::Notification(notification)) => {
                    self.handle_notification(notification);
                }
                Some(McpMessage::Invalid(err)) => {
                    warn!(code = err.code, "Rejected malformed message: {}", err.message);
                    let response =
                        McpResponse::failure(serde_json::Value::Null, err.code, err.message);
                    self.transport.write_response(response).await?;
                }
                None => {
                    info!("Client disconnected");
                    break;
                }
            }
        }

        Ok(())
    }

    async fn handle_request(&mut self, request: McpRequest) -> McpResponse {
        let id = Self::ensure_valid_id(request.id.clone());

        match request.method.as_str() {
            "initialize" => self.handle_initialize(id, request.params),
            "tools/list" => self.handle_list_tools(id),
            "tools/call" => self.handle_call_tool(id, request.params).await,
            "ping" => McpResponse::success(id, serde_json::json!({})),
            _ => McpResponse::failure(id, METHOD_NOT_FOUND, "Method not found"),
        }
    }

    fn handle_notification(&mut self, notification: McpNotification) {
        debug!("Received notification: {}", notification.method);

        match notification.method.as_str() {
            "notifications/initialized" => {
                info!("Client initialization completed");
                self.initialized = true;
            }
            "notifications/cancelled" => {
                debug!("Request cancelled notification received");
            }
            _ => {
                warn!("Unknown notification method: {}", notification.method);
            }
        }
    }

    fn ensure_valid_id(id: Option<serde_json::Value>) -> serde_json::Value {
        match id {
            Some(serde_json::Value::Null) | None => serde_json::Value::String("0".to_string()),
            Some(value) => value,
        }
    }

    fn handle_initialize(
        &mut self,
        id: serde_json::Value,
        params: Option<serde_json::Value>,
    ) -> McpResponse {
        let Some(params) = params else {
            return McpResponse::failure(id, INVALID_PARAMS, "Missing params");
        };
        if let Err(e) = serde_json::from_value::<InitializeParams>(params) {
            return McpResponse::failure(id, INVALID_PARAMS, format!("Invalid params: {}", e));
        }

        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            server_info: ServerInfo {
                name: "P7M Reader MCP".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                description: Some(
                    "Recover and read the PDF embedded in signed .p7m envelopes".to_string(),
                ),
            },
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: Some(false),
                }),
                logging: Some(serde_json::json!({})),
            },
        };
        McpResponse::success(id, result)
    }

    fn handle_list_tools(&self, id: serde_json::Value) -> McpResponse {
        let tools = vec![
            P7M_OPEN_TOOL_DEFINITION.clone(),
            P7M_SAVE_TOOL_DEFINITION.clone(),
            P7M_RESET_TOOL_DEFINITION.clone(),
            P7M_INSPECT_TOOL_DEFINITION.clone(),
        ];
        McpResponse::success(id, ListToolsResult { tools })
    }

    async fn handle_call_tool(
        &mut self,
        id: serde_json::Value,
        params: Option<serde_json::Value>,
    ) -> McpResponse {
        let Some(params) = params else {
            return McpResponse::failure(id, INVALID_PARAMS, "Missing params");
        };
        if !self.initialized {
            debug!("tools/call received before notifications/initialized");
        }
        match serde_json::from_value::<CallToolParams>(params) {
            Ok(call_params) => {
                let name = call_params.name.clone();
                let result = self.execute_tool(call_params).await;
                if result.is_error() {
                    let code = result.first_text().and_then(payload_code);
                    warn!(tool = %name, code = ?code, "Tool call failed");
                }
                McpResponse::success(id, result)
            }
            Err(e) => McpResponse::failure(id, INVALID_PARAMS, format!("Invalid params: {}", e)),
        }
    }

    async fn execute_tool(&mut self, params: CallToolParams) -> CallToolResult {
        match params.name.as_str() {
            "p7m-open" => {
                let tool = P7mOpenTool::new();
                tool.execute(&mut self.session, params.arguments).await
            }
            "p7m-save" => {
                let tool = P7mSaveTool::new(self.config.output_dir.clone());
                tool.execute(&self.session, params.arguments).await
            }
            "p7m-reset" => P7mResetTool::new().execute(&mut self.session),
            "p7m-inspect" => {
                let tool = P7mInspectTool::new(self.config.extractor(), self.config.max_input_bytes);
                tool.execute(params.arguments).await
            }
            _ => CallToolResult::error(format!("Tool not found: {}", params.name)),
        }
    }
}
