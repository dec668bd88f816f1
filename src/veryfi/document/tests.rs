use super::*;
use serde_json::json;
use tempfile::TempDir;

#[test]
fn document_type_serializes_snake_case() {
    assert_eq!(
        serde_json::to_value(DocumentType::PurchaseOrder).expect("should serialize"),
        json!("purchase_order")
    );
    for doc_type in DocumentType::ALL {
        assert_eq!(doc_type.to_string(), doc_type.as_str());
        assert_eq!(doc_type.endpoint(), "documents");
    }
}

#[test]
fn args_default_to_receipt() {
    let args: ProcessDocumentArgs =
        serde_json::from_value(json!({"file_path": "/tmp/receipt.jpg"})).expect("should parse");
    assert_eq!(args.file_path, "/tmp/receipt.jpg");
    assert_eq!(args.document_type, DocumentType::Receipt);
}

#[test]
fn args_accept_each_document_type() {
    let args: ProcessDocumentArgs = serde_json::from_value(json!({
        "file_path": "invoice.pdf",
        "document_type": "invoice"
    }))
    .expect("should parse");
    assert_eq!(args.document_type, DocumentType::Invoice);

    let args: ProcessDocumentArgs = serde_json::from_value(json!({
        "file_path": "po.pdf",
        "document_type": "purchase_order"
    }))
    .expect("should parse");
    assert_eq!(args.document_type, DocumentType::PurchaseOrder);
}

#[test]
fn args_reject_unknown_fields() {
    let result = serde_json::from_value::<ProcessDocumentArgs>(json!({
        "file_path": "receipt.jpg",
        "tags": ["travel"]
    }));
    assert!(result.is_err());
}

#[test]
fn args_reject_unsupported_document_type() {
    let result = serde_json::from_value::<ProcessDocumentArgs>(json!({
        "file_path": "check.jpg",
        "document_type": "bank_check"
    }));
    assert!(result.is_err());
}

#[test]
fn args_require_file_path() {
    let result = serde_json::from_value::<ProcessDocumentArgs>(json!({
        "document_type": "receipt"
    }));
    assert!(result.is_err());
}

#[test]
fn payload_wire_format() {
    let payload = DocumentPayload::new(DocumentType::Invoice, b"hello");
    let value = serde_json::to_value(&payload).expect("should serialize");

    assert_eq!(
        value,
        json!({
            "categories": [],
            "tags": [],
            "compute": true,
            "document_type": "invoice",
            "file_data": "aGVsbG8="
        })
    );
}

#[tokio::test]
async fn from_file_preserves_binary_content() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let path = temp_dir.path().join("scan.pdf");
    let content: Vec<u8> = b"%PDF-1.4\n%\xe2\xe3\xcf\xd3\n"
        .iter()
        .copied()
        .chain(0..=255u8)
        .collect();
    std::fs::write(&path, &content).expect("should write file");

    let payload = DocumentPayload::from_file(&path, DocumentType::Receipt)
        .await
        .expect("should read file");

    let decoded = STANDARD
        .decode(&payload.file_data)
        .expect("file_data should be base64");
    assert_eq!(decoded, content);
}

#[tokio::test]
async fn from_file_missing_path() {
    let result =
        DocumentPayload::from_file(Path::new("nonexistent.pdf"), DocumentType::Receipt).await;

    match result {
        Err(err @ VeryfiError::FileNotFound { .. }) => {
            assert_eq!(err.to_string(), "File not found: nonexistent.pdf");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn from_file_rejects_directories() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let result = DocumentPayload::from_file(temp_dir.path(), DocumentType::Receipt).await;
    assert!(matches!(result, Err(VeryfiError::InvalidArguments(_))));
}
