//! MCP method handling: one inbound message in, at most one response out.

use serde_json::{json, Value};
use tm_domain::error::Error;
use tm_domain::tool::{ErrorKind, ToolRequest, ToolResponse};
use tm_tools::{Dispatcher, ResourceProvider};

use crate::protocol::{
    content_item, Implementation, InitializeResult, JsonRpcError, JsonRpcRequest,
    JsonRpcResponse, ResourceReadParams, ToolCallParams, ToolCallResult, INTERNAL_ERROR,
    INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR, RESOURCE_NOT_FOUND,
};

pub struct McpServer {
    dispatcher: Dispatcher,
    resources: ResourceProvider,
    info: Implementation,
}

impl McpServer {
    pub fn new(dispatcher: Dispatcher, resources: ResourceProvider) -> Self {
        Self {
            dispatcher,
            resources,
            info: Implementation {
                name: "tableau-mcp".into(),
                version: env!("CARGO_PKG_VERSION").into(),
            },
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Handle one raw line. `None` for notifications and blank lines.
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let value: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "unparseable message");
                return Some(JsonRpcResponse::failure(
                    Value::Null,
                    JsonRpcError::new(PARSE_ERROR, format!("Parse error: {e}")),
                ));
            }
        };
        let id = value.get("id").cloned().unwrap_or(Value::Null);
        match serde_json::from_value::<JsonRpcRequest>(value) {
            Ok(request) => self.handle(request).await,
            Err(e) => Some(JsonRpcResponse::failure(
                id,
                JsonRpcError::new(INVALID_REQUEST, format!("Invalid request: {e}")),
            )),
        }
    }

    pub async fn handle(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if request.is_notification() {
            tracing::debug!(method = %request.method, "notification");
            return None;
        }
        let JsonRpcRequest {
            id, method, params, ..
        } = request;
        let id = id.unwrap_or(Value::Null);

        tracing::debug!(method = %method, "request");
        let outcome = match method.as_str() {
            "initialize" => Ok(json!(InitializeResult::new(self.info.clone()))),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": self.dispatcher.registry().definitions() })),
            "tools/call" => self.call_tool(params).await,
            "resources/list" => self.list_resources().await,
            "resources/templates/list" => {
                Ok(json!({ "resourceTemplates": self.resources.templates() }))
            }
            "resources/read" => self.read_resource(params).await,
            "prompts/list" => Ok(json!({ "prompts": [] })),
            other => Err(JsonRpcError::new(
                METHOD_NOT_FOUND,
                format!("Method not found: {other}"),
            )),
        };

        Some(match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(error) => JsonRpcResponse::failure(id, error),
        })
    }

    async fn call_tool(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let params: ToolCallParams = parse_params(params)?;
        let response = self
            .dispatcher
            .dispatch(ToolRequest::new(params.name, params.arguments))
            .await;

        let result = match response {
            ToolResponse::Content(blocks) => ToolCallResult {
                content: blocks.iter().map(content_item).collect(),
                is_error: false,
            },
            ToolResponse::Error { kind, message } => ToolCallResult {
                content: vec![json!({ "type": "text", "text": format!("{kind}: {message}") })],
                is_error: true,
            },
        };
        Ok(json!(result))
    }

    async fn list_resources(&self) -> Result<Value, JsonRpcError> {
        let entries = self.resources.list().await.map_err(resource_error)?;
        Ok(json!({ "resources": entries }))
    }

    async fn read_resource(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let params: ResourceReadParams = parse_params(params)?;
        let content = self
            .resources
            .read(&params.uri)
            .await
            .map_err(resource_error)?;
        Ok(json!({ "contents": [content] }))
    }
}

fn parse_params<T: serde::de::DeserializeOwned>(params: Option<Value>) -> Result<T, JsonRpcError> {
    serde_json::from_value(params.unwrap_or(Value::Null))
        .map_err(|e| JsonRpcError::new(INVALID_PARAMS, format!("Invalid params: {e}")))
}

fn resource_error(err: Error) -> JsonRpcError {
    let kind = err.kind();
    let code = match kind {
        ErrorKind::InvalidUri => INVALID_PARAMS,
        ErrorKind::NotFound => RESOURCE_NOT_FOUND,
        _ => INTERNAL_ERROR,
    };
    tracing::warn!(error = %err, "resource request failed");
    JsonRpcError::new(code, err.to_string()).with_data(json!({ "kind": kind }))
}
