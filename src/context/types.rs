//! Conversation and document types shared by the usage, selection and
//! compression code.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::compression::CompressionStrategy;
use super::token_estimator::estimate_token_count;

/// Author of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

/// A single chat message.
///
/// Message storage belongs to the caller. The compression engine rewrites
/// `content` in place and records the strategy in `compression`, which is
/// how already-compressed messages are skipped on later passes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Cached token estimate for `content`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<u32>,
    pub timestamp: DateTime<Utc>,
    /// Strategy that last rewrote `content`, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression: Option<CompressionStrategy>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            role,
            content: content.into(),
            tokens: None,
            timestamp,
            compression: None,
        }
    }

    pub fn user(content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self::new(Role::User, content, timestamp)
    }

    pub fn assistant(content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self::new(Role::Assistant, content, timestamp)
    }

    pub fn system(content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self::new(Role::System, content, timestamp)
    }

    /// Cached token count, or a fresh estimate when none is cached
    pub fn token_count(&self) -> u32 {
        self.tokens
            .unwrap_or_else(|| estimate_token_count(&self.content))
    }

    pub fn is_compressed(&self) -> bool {
        self.compression.is_some()
    }
}

/// Kind of an attached reference document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Pdf,
    Docx,
    Txt,
    Md,
    Csv,
    Json,
    Xml,
}

impl DocumentType {
    /// Map a file extension (with or without the dot) to a document type
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "pdf" => Some(DocumentType::Pdf),
            "docx" => Some(DocumentType::Docx),
            "txt" | "text" => Some(DocumentType::Txt),
            "md" | "markdown" => Some(DocumentType::Md),
            "csv" => Some(DocumentType::Csv),
            "json" => Some(DocumentType::Json),
            "xml" => Some(DocumentType::Xml),
            _ => None,
        }
    }
}

/// A document attached to the conversation as retrieval context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentContext {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub doc_type: DocumentType,
    pub content: String,
    /// Token estimate taken when the document was ingested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_count: Option<u32>,
    /// Size of the source file in bytes
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
}

impl DocumentContext {
    /// Ingest a document, estimating its tokens once
    pub fn new(name: impl Into<String>, doc_type: DocumentType, content: impl Into<String>) -> Self {
        let content = content.into();
        let token_count = estimate_token_count(&content);
        let size = content.len() as u64;

        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            doc_type,
            content,
            token_count: Some(token_count),
            size,
            uploaded_at: Utc::now(),
        }
    }

    /// Precomputed token count, estimated only when missing
    pub fn tokens(&self) -> u32 {
        self.token_count
            .unwrap_or_else(|| estimate_token_count(&self.content))
    }

    /// Replace the content and refresh the token count
    pub fn set_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
        self.size = self.content.len() as u64;
        self.token_count = Some(estimate_token_count(&self.content));
    }
}
