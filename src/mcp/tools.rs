//! MCP Tools Implementation
//!
//! The `process_document` tool, backed by the Veryfi client.

use crate::mcp::errors::McpError;
use crate::mcp::protocol::*;
use crate::mcp::server::ToolHandler;
use crate::veryfi::{DocumentType, ProcessDocumentArgs, VeryfiClient};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error};

pub const PROCESS_DOCUMENT_TOOL: &str = "process_document";

/// Instructions returned to clients on initialization
pub const SERVER_INSTRUCTIONS: &str = "\
Veryfi is a service to extract data from financial documents. It is fast, accurate, and secure. \
Veryfi has many endpoints. The \"documents\" endpoint is a misnomer: it works with receipts, \
invoices, and purchase orders. For other document types, it's imperative to use Veryfi's other \
API endpoints. The following document types have endpoints with a dedicated ML model and schema:
- bank checks
- bank statements
- W2s
- W8-BEN-E
- W9s
- business cards";

/// Document processing tool handler
pub struct ProcessDocumentHandler {
    client: Arc<VeryfiClient>,
}

impl ProcessDocumentHandler {
    /// Create a new process document handler
    #[inline]
    pub fn new(client: Arc<VeryfiClient>) -> Self {
        Self { client }
    }

    /// Create the process_document tool definition
    #[inline]
    pub fn tool_definition() -> Tool {
        let document_types: Vec<&str> = DocumentType::ALL.iter().map(|t| t.as_str()).collect();

        Tool {
            name: PROCESS_DOCUMENT_TOOL.to_string(),
            description: Some(
                "Extract structured data from images of receipts, invoices, and purchase orders \
                 using Veryfi's OCR technology. Returns JSON with vendor name, amounts, dates, \
                 line items, taxes, and other transaction details. \
                 SUPPORTED: receipts, invoices, purchase orders. \
                 NOT SUPPORTED: bank checks, bank statements, W2s, W8-BEN-E, W9s, business cards \
                 - users must use Veryfi API directly for these."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "file_path": {
                        "type": "string",
                        "description": "Path to the document image file to process (JPG, PNG, PDF, etc.)"
                    },
                    "document_type": {
                        "type": "string",
                        "enum": document_types,
                        "default": DocumentType::default().as_str(),
                        "description": "Type of document (default: receipt)"
                    }
                },
                "required": ["file_path"],
                "additionalProperties": false
            }),
        }
    }
}

#[async_trait]
impl ToolHandler for ProcessDocumentHandler {
    #[inline]
    async fn handle(&self, params: CallToolParams) -> Result<CallToolResult> {
        let args = Value::Object(params.arguments.unwrap_or_default());
        let args: ProcessDocumentArgs =
            serde_json::from_value(args).map_err(|e| McpError::InvalidToolParameters {
                tool: params.name.clone(),
                message: e.to_string(),
            })?;

        debug!(
            "Processing document: file_path='{}', document_type={}",
            args.file_path, args.document_type
        );

        match self
            .client
            .process_document(Path::new(&args.file_path), args.document_type)
            .await
        {
            Ok(result) => Ok(CallToolResult::json(result)?),
            Err(e) => {
                error!("Failed to process {}: {}", args.file_path, e);
                Ok(CallToolResult::error(e.to_string()))
            }
        }
    }
}
