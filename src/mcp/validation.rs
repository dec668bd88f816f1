//! MCP Message Validation
//!
//! JSON schema validation for incoming JSON-RPC messages, method parameters
//! and tool arguments.

use crate::mcp::protocol::*;
use anyhow::{Result, anyhow};
use jsonschema::{Draft, JSONSchema};
use serde_json::{Value, json};
use std::collections::HashMap;
use tracing::debug;

/// JSON Schema validator for MCP messages
#[derive(Debug)]
pub struct McpValidator {
    schemas: HashMap<String, JSONSchema>,
}

impl McpValidator {
    /// Create a new MCP validator with built-in schemas
    #[inline]
    pub fn new() -> Result<Self> {
        let mut validator = Self {
            schemas: HashMap::new(),
        };

        validator.load_builtin_schemas()?;

        Ok(validator)
    }

    fn load_builtin_schemas(&mut self) -> Result<()> {
        let request_schema = json!({
            "type": "object",
            "properties": {
                "jsonrpc": {
                    "type": "string",
                    "const": "2.0"
                },
                "method": {"type": "string"},
                "params": {"type": "object"},
                "id": {
                    "oneOf": [
                        {"type": "string"},
                        {"type": "integer"}
                    ]
                }
            },
            "required": ["jsonrpc", "method", "id"]
        });
        self.add_schema("jsonrpc_request", &request_schema)?;

        let notification_schema = json!({
            "type": "object",
            "properties": {
                "jsonrpc": {
                    "type": "string",
                    "const": "2.0"
                },
                "method": {"type": "string"},
                "params": {"type": "object"}
            },
            "required": ["jsonrpc", "method"]
        });
        self.add_schema("jsonrpc_notification", &notification_schema)?;

        let initialize_schema = json!({
            "type": "object",
            "properties": {
                "protocolVersion": {"type": "string"},
                "capabilities": {"type": "object"},
                "clientInfo": {
                    "type": "object",
                    "properties": {
                        "name": {"type": "string"},
                        "version": {"type": "string"}
                    },
                    "required": ["name", "version"]
                }
            },
            "required": ["protocolVersion", "capabilities", "clientInfo"]
        });
        self.add_schema("initialize_params", &initialize_schema)?;

        let tool_call_schema = json!({
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "arguments": {"type": "object"}
            },
            "required": ["name"]
        });
        self.add_schema("call_tool_params", &tool_call_schema)?;

        let cancelled_schema = json!({
            "type": "object",
            "properties": {
                "requestId": {
                    "oneOf": [
                        {"type": "string"},
                        {"type": "integer"}
                    ]
                },
                "reason": {"type": "string"}
            },
            "required": ["requestId"]
        });
        self.add_schema("cancelled_params", &cancelled_schema)?;

        debug!("Loaded {} built-in JSON schemas", self.schemas.len());
        Ok(())
    }

    /// Add a JSON schema to the validator
    #[inline]
    pub fn add_schema(&mut self, name: &str, schema: &Value) -> Result<()> {
        let compiled = compile_schema(schema)
            .map_err(|e| anyhow!("Failed to compile schema '{}': {}", name, e))?;

        self.schemas.insert(name.to_string(), compiled);
        Ok(())
    }

    /// Validate a JSON-RPC request
    #[inline]
    pub fn validate_request(&self, request: &JsonRpcRequest) -> Result<()> {
        let request_value = serde_json::to_value(request)?;
        self.validate_with_schema("jsonrpc_request", &request_value)?;

        if let Some(params) = &request.params {
            self.validate_method_params(&request.method, params)?;
        }

        Ok(())
    }

    /// Validate a JSON-RPC notification
    #[inline]
    pub fn validate_notification(&self, notification: &JsonRpcNotification) -> Result<()> {
        let notification_value = serde_json::to_value(notification)?;
        self.validate_with_schema("jsonrpc_notification", &notification_value)?;

        if let Some(params) = &notification.params {
            self.validate_method_params(&notification.method, params)?;
        }

        Ok(())
    }

    fn validate_method_params(&self, method: &str, params: &Value) -> Result<()> {
        let schema_name = match method {
            "initialize" => "initialize_params",
            "tools/call" => "call_tool_params",
            "notifications/cancelled" => "cancelled_params",
            _ => {
                debug!("No parameter validation schema for method: {}", method);
                return Ok(());
            }
        };

        self.validate_with_schema(schema_name, params)
    }

    /// Validate a value against a named schema
    #[inline]
    pub fn validate_with_schema(&self, schema_name: &str, value: &Value) -> Result<()> {
        let schema = self
            .schemas
            .get(schema_name)
            .ok_or_else(|| anyhow!("Schema '{}' not found", schema_name))?;

        validate_instance(schema, value).map_err(|message| {
            anyhow!(
                "Schema validation failed for '{}': {}",
                schema_name,
                message
            )
        })
    }

    /// Validate a raw JSON value as a JSON-RPC message
    #[inline]
    pub fn validate_raw_message(&self, value: &Value) -> Result<JsonRpcMessage> {
        if value.get("id").is_some() && value.get("method").is_some() {
            let request: JsonRpcRequest = serde_json::from_value(value.clone())?;
            self.validate_request(&request)?;
            return Ok(JsonRpcMessage::Request(request));
        }

        if value.get("method").is_some() {
            let notification: JsonRpcNotification = serde_json::from_value(value.clone())?;
            self.validate_notification(&notification)?;
            return Ok(JsonRpcMessage::Notification(notification));
        }

        if let Ok(response) = serde_json::from_value::<JsonRpcResponse>(value.clone()) {
            return Ok(JsonRpcMessage::Response(response));
        }

        if let Ok(error_response) = serde_json::from_value::<JsonRpcErrorResponse>(value.clone()) {
            return Ok(JsonRpcMessage::ErrorResponse(error_response));
        }

        Err(anyhow!(
            "Value does not match any known JSON-RPC message type"
        ))
    }

    /// Check if a protocol version is supported
    #[inline]
    pub fn is_protocol_version_supported(&self, version: &str) -> bool {
        SUPPORTED_PROTOCOL_VERSIONS.contains(&version)
    }

    /// Protocol version to answer an `initialize` with: the client's version
    /// when supported, otherwise the latest one the server speaks.
    #[inline]
    pub fn negotiate_protocol_version(&self, requested: &str) -> &'static str {
        SUPPORTED_PROTOCOL_VERSIONS
            .iter()
            .copied()
            .find(|v| *v == requested)
            .unwrap_or(MCP_VERSION)
    }
}

/// Compile a Draft 7 schema
#[inline]
pub fn compile_schema(schema: &Value) -> Result<JSONSchema> {
    JSONSchema::options()
        .with_draft(Draft::Draft7)
        .compile(schema)
        .map_err(|e| anyhow!("{}:{}", e.instance_path, e))
}

/// Validate `value`, joining every violation into one message
#[inline]
pub fn validate_instance(schema: &JSONSchema, value: &Value) -> std::result::Result<(), String> {
    if let Err(errors) = schema.validate(value) {
        let error_messages: Vec<String> = errors
            .into_iter()
            .map(|e| {
                let path = e.instance_path.to_string();
                if path.is_empty() {
                    e.to_string()
                } else {
                    format!("{}: {}", path, e)
                }
            })
            .collect();

        return Err(error_messages.join(", "));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validator_creation() {
        let validator = McpValidator::new().expect("validator is ok");
        assert!(!validator.schemas.is_empty());
    }

    #[test]
    fn protocol_version_validation() {
        let validator = McpValidator::new().expect("validator is ok");

        assert!(validator.is_protocol_version_supported(MCP_VERSION));
        assert!(validator.is_protocol_version_supported("2024-11-05"));
        assert!(!validator.is_protocol_version_supported("invalid-version"));
    }

    #[test]
    fn protocol_version_negotiation() {
        let validator = McpValidator::new().expect("validator is ok");

        assert_eq!(
            validator.negotiate_protocol_version("2025-03-26"),
            "2025-03-26"
        );
        assert_eq!(validator.negotiate_protocol_version("1999-01-01"), MCP_VERSION);
    }

    #[test]
    fn request_validation() {
        let validator = McpValidator::new().expect("validator is ok");

        let valid_request = JsonRpcRequest::new(
            "test_method".to_string(),
            Some(json!({"key": "value"})),
            RequestId::String("test-id".to_string()),
        );

        assert!(validator.validate_request(&valid_request).is_ok());
    }

    #[test]
    fn initialize_params_validation() {
        let validator = McpValidator::new().expect("validator is ok");

        let params = json!({
            "protocolVersion": "2025-06-18",
            "capabilities": {
                "experimental": {}
            },
            "clientInfo": {
                "name": "test-client",
                "version": "1.0.0"
            }
        });

        assert!(
            validator
                .validate_with_schema("initialize_params", &params)
                .is_ok()
        );

        let invalid_params = json!({
            "protocolVersion": "2025-06-18"
        });

        assert!(
            validator
                .validate_with_schema("initialize_params", &invalid_params)
                .is_err()
        );
    }

    #[test]
    fn raw_message_classification() {
        let validator = McpValidator::new().expect("validator is ok");

        let request = json!({"jsonrpc": "2.0", "id": 1, "method": "ping"});
        assert!(matches!(
            validator.validate_raw_message(&request),
            Ok(JsonRpcMessage::Request(_))
        ));

        let notification = json!({"jsonrpc": "2.0", "method": "notifications/initialized"});
        assert!(matches!(
            validator.validate_raw_message(&notification),
            Ok(JsonRpcMessage::Notification(_))
        ));

        let response = json!({"jsonrpc": "2.0", "id": 1, "result": {}});
        assert!(matches!(
            validator.validate_raw_message(&response),
            Ok(JsonRpcMessage::Response(_))
        ));
    }

    #[test]
    fn raw_message_rejects_bad_version() {
        let validator = McpValidator::new().expect("validator is ok");

        let request = json!({"jsonrpc": "1.0", "id": 1, "method": "ping"});
        assert!(validator.validate_raw_message(&request).is_err());

        let garbage = json!({"hello": "world"});
        assert!(validator.validate_raw_message(&garbage).is_err());
    }

    #[test]
    fn cancelled_params_require_request_id() {
        let validator = McpValidator::new().expect("validator is ok");

        let notification = json!({
            "jsonrpc": "2.0",
            "method": "notifications/cancelled",
            "params": {"reason": "user aborted"}
        });
        assert!(validator.validate_raw_message(&notification).is_err());
    }

    #[test]
    fn instance_validation_reports_paths() {
        let schema = compile_schema(&json!({
            "type": "object",
            "properties": {"file_path": {"type": "string"}},
            "required": ["file_path"],
            "additionalProperties": false
        }))
        .expect("schema compiles");

        assert!(validate_instance(&schema, &json!({"file_path": "a.jpg"})).is_ok());

        let message =
            validate_instance(&schema, &json!({"file_path": 5})).expect_err("should fail");
        assert!(message.contains("/file_path"));

        assert!(validate_instance(&schema, &json!({"file_path": "a", "x": 1})).is_err());
    }
}
