#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

//! MCP Server Integration Tests
//!
//! Drives the fully assembled server through `MessageHandler`, with the
//! Veryfi API replaced by a mock endpoint.

use serde_json::{Value, json};
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;
use veryfi_mcp::commands::build_server;
use veryfi_mcp::config::{ApiConfig, Config, Credentials};
use veryfi_mcp::mcp::tools::{PROCESS_DOCUMENT_TOOL, ProcessDocumentHandler};
use veryfi_mcp::mcp::{
    CallToolParams, JsonRpcMessage, JsonRpcRequest, McpServer, MessageHandler, RequestId,
    ToolContent, ToolHandler,
};
use veryfi_mcp::veryfi::VeryfiClient;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Test helper to assemble the server against a mock Veryfi endpoint
async fn setup_server(mock: &MockServer, credentials: Credentials) -> Arc<McpServer> {
    let api = ApiConfig {
        base_url: format!("{}/api/v8/partner/", mock.uri()),
        timeout_secs: 10,
    };
    let config = Config::new(api, credentials).expect("mock config should be valid");
    Arc::new(build_server(&config).await.expect("Failed to build server"))
}

fn receipt_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(b"receipt bytes")
        .expect("Failed to write temp file");
    file
}

fn call_request(id: i64, arguments: Value) -> JsonRpcRequest {
    JsonRpcRequest::new(
        "tools/call".to_string(),
        Some(json!({"name": PROCESS_DOCUMENT_TOOL, "arguments": arguments})),
        RequestId::Number(id),
    )
}

fn response_value(message: JsonRpcMessage) -> Value {
    serde_json::to_value(message).expect("message serializes")
}

#[tokio::test]
async fn process_document_round_trip() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v8/partner/documents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 123_456,
            "total": 45.67,
            "vendor": {"name": "Test Store"}
        })))
        .expect(1)
        .mount(&mock)
        .await;

    let server = setup_server(&mock, Credentials::new("client", "user", "key")).await;
    let handler = MessageHandler::new(server);
    let file = receipt_file();

    let response = response_value(
        handler
            .handle_request(call_request(
                1,
                json!({
                    "file_path": file.path().to_string_lossy(),
                    "document_type": "invoice"
                }),
            ))
            .await,
    );

    assert_eq!(response["id"], 1);
    let result = &response["result"];
    assert_eq!(result["isError"], false);
    assert_eq!(result["structuredContent"]["total"], 45.67);
    assert_eq!(result["structuredContent"]["vendor"]["name"], "Test Store");

    let text = result["content"][0]["text"].as_str().expect("text content");
    let parsed: Value = serde_json::from_str(text).expect("text content is JSON");
    assert_eq!(parsed, result["structuredContent"]);
}

#[tokio::test]
async fn remote_failure_is_a_tool_error() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad document"))
        .expect(1)
        .mount(&mock)
        .await;

    let server = setup_server(&mock, Credentials::new("client", "user", "key")).await;
    let handler = MessageHandler::new(server);
    let file = receipt_file();

    let response = response_value(
        handler
            .handle_request(call_request(
                2,
                json!({"file_path": file.path().to_string_lossy()}),
            ))
            .await,
    );

    assert_eq!(response["result"]["isError"], true);
    assert_eq!(
        response["result"]["content"][0]["text"],
        "Veryfi API returned HTTP 400: bad document"
    );
    assert!(response["result"].get("structuredContent").is_none());
}

#[tokio::test]
async fn missing_file_is_a_tool_error_without_request() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock)
        .await;

    let server = setup_server(&mock, Credentials::new("client", "user", "key")).await;
    let handler = MessageHandler::new(server);

    let response = response_value(
        handler
            .handle_request(call_request(3, json!({"file_path": "nonexistent.pdf"})))
            .await,
    );

    assert_eq!(response["result"]["isError"], true);
    assert_eq!(
        response["result"]["content"][0]["text"],
        "File not found: nonexistent.pdf"
    );
}

#[tokio::test]
async fn unknown_argument_is_invalid_params() {
    let mock = MockServer::start().await;
    let server = setup_server(&mock, Credentials::new("client", "user", "key")).await;
    let handler = MessageHandler::new(server);

    let response = response_value(
        handler
            .handle_request(call_request(
                4,
                json!({"file_path": "a.jpg", "categories": ["Meals"]}),
            ))
            .await,
    );

    assert_eq!(response["id"], 4);
    assert_eq!(response["error"]["code"], -32602);
}

#[tokio::test]
async fn handler_rejects_bad_arguments_directly() {
    let mock = MockServer::start().await;
    let config = Config::new(
        ApiConfig {
            base_url: mock.uri(),
            timeout_secs: 10,
        },
        Credentials::new("client", "user", "key"),
    )
    .expect("mock config should be valid");
    let client = Arc::new(VeryfiClient::new(&config).expect("Failed to create client"));
    let handler = ProcessDocumentHandler::new(client);

    let mut arguments = serde_json::Map::new();
    arguments.insert("document_type".to_string(), json!("receipt"));
    let params = CallToolParams {
        name: PROCESS_DOCUMENT_TOOL.to_string(),
        arguments: Some(arguments),
    };

    let err = handler
        .handle(params)
        .await
        .expect_err("file_path is required");
    assert!(err.to_string().contains("file_path"));
}

#[tokio::test]
async fn credential_diagnostic_reaches_the_client() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock)
        .await;

    let server = setup_server(&mock, Credentials::default()).await;
    let handler = MessageHandler::new(server);
    let file = receipt_file();

    let response = response_value(
        handler
            .handle_request(call_request(
                5,
                json!({"file_path": file.path().to_string_lossy()}),
            ))
            .await,
    );

    let result: veryfi_mcp::mcp::CallToolResult =
        serde_json::from_value(response["result"].clone()).expect("result is a tool result");
    assert_eq!(result.is_error, Some(true));
    let ToolContent::Text { text } = &result.content[0];
    assert!(text.contains("## Missing Veryfi Credentials"));
    assert!(text.contains("• **VERYFI_CLIENT_ID** - Not found in environment"));
    assert!(text.contains("• **VERYFI_USERNAME** - Not found in environment"));
    assert!(text.contains("• **VERYFI_API_KEY** - Not found in environment"));
    assert!(text.contains("https://app.veryfi.com/api/settings/keys/"));
    assert!(text.contains(".env"));
}
