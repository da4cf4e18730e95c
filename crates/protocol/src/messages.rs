use serde::{Deserialize, Serialize};

use crate::types::FileId;

// ---------------------------------------------------------------------------
// Sender -> receiver
// ---------------------------------------------------------------------------

/// Announces a file. Sent exactly once per transfer, before any chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub file_id: FileId,
    pub name: String,
    pub size: u64,
    pub content_type: String,
    /// `ceil(size / chunk_size)`; the receiver sizes its buffer from it.
    pub total_chunks: u32,
    pub sender_name: String,
    /// SHA-256 hex digest of the whole file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

/// One encoded slice of a file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    pub file_id: FileId,
    /// Zero-based position of this chunk.
    pub index: u32,
    /// Base64-encoded chunk bytes.
    pub data: String,
    pub is_last: bool,
}

// ---------------------------------------------------------------------------
// Receiver -> sender
// ---------------------------------------------------------------------------

/// Answer to a [`Metadata`]. Exactly one is sent per metadata received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Acknowledgement {
    pub file_id: FileId,
    pub accepted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Acknowledgement {
    pub fn accepted(file_id: FileId) -> Self {
        Self {
            file_id,
            accepted: true,
            reason: None,
        }
    }

    pub fn rejected(file_id: FileId, reason: impl Into<String>) -> Self {
        Self {
            file_id,
            accepted: false,
            reason: Some(reason.into()),
        }
    }
}
