// Veryfi API integration
// Typed document requests and the HTTP client that submits them

pub mod client;
pub mod document;

pub use client::VeryfiClient;
pub use document::{DocumentPayload, DocumentType, ProcessDocumentArgs};
