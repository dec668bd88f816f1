#[cfg(test)]
mod tests;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::debug;

use crate::{Result, VeryfiError};

/// Document types served by the Veryfi `documents` endpoint.
///
/// Bank checks, bank statements, tax forms and business cards have dedicated
/// Veryfi endpoints with their own schemas and are not accepted here.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    #[default]
    Receipt,
    Invoice,
    #[value(name = "purchase_order")]
    PurchaseOrder,
}

impl DocumentType {
    pub const ALL: [Self; 3] = [Self::Receipt, Self::Invoice, Self::PurchaseOrder];

    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Receipt => "receipt",
            Self::Invoice => "invoice",
            Self::PurchaseOrder => "purchase_order",
        }
    }

    /// Path segment, relative to the partner API base URL, that accepts this
    /// document type.
    #[inline]
    pub fn endpoint(self) -> &'static str {
        match self {
            Self::Receipt | Self::Invoice | Self::PurchaseOrder => "documents",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Arguments accepted by the `process_document` tool.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessDocumentArgs {
    pub file_path: String,
    #[serde(default)]
    pub document_type: DocumentType,
}

/// JSON body posted to Veryfi.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentPayload {
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    /// Ask Veryfi to compute derived fields (totals, tax lines) server side.
    pub compute: bool,
    pub document_type: DocumentType,
    pub file_data: String,
}

impl DocumentPayload {
    #[inline]
    pub fn new(document_type: DocumentType, content: &[u8]) -> Self {
        Self {
            categories: Vec::new(),
            tags: Vec::new(),
            compute: true,
            document_type,
            file_data: STANDARD.encode(content),
        }
    }

    /// Read `path` fully and encode it.
    ///
    /// Fails with [`VeryfiError::FileNotFound`] when nothing exists at `path`.
    #[inline]
    pub async fn from_file(path: &Path, document_type: DocumentType) -> Result<Self> {
        let metadata = match tokio::fs::metadata(path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(VeryfiError::FileNotFound {
                    path: path.display().to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        if !metadata.is_file() {
            return Err(VeryfiError::InvalidArguments(format!(
                "Not a regular file: {}",
                path.display()
            )));
        }

        let content = tokio::fs::read(path).await?;
        debug!("Read {} bytes from {}", content.len(), path.display());

        Ok(Self::new(document_type, &content))
    }
}
