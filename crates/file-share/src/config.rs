//! Transfer configuration.
//!
//! Stored as camelCase JSON. Every field is optional in the file; missing
//! fields take their defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use roomdrop_protocol::constants::{
    DEFAULT_BATCH_PAUSE, DEFAULT_BATCH_SIZE, DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE,
};
use serde::{Deserialize, Serialize};

use crate::ShareError;

/// Default upper bound on an inbound file, 1 GiB.
const DEFAULT_MAX_FILE_SIZE: u64 = 1 << 30;

/// Default grace window for missing chunks once the last marker arrived.
const DEFAULT_REASSEMBLY_GRACE_MS: u64 = 2000;

/// Tunables for sending and receiving.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransferConfig {
    /// Raw bytes per chunk before encoding.
    pub chunk_size: usize,

    /// Chunks sent back-to-back before pausing.
    pub batch_size: usize,

    /// Pause after each batch, in milliseconds.
    pub batch_pause_ms: u64,

    /// How long to wait for missing chunks after the last chunk arrived.
    /// Zero fails the transfer as soon as a hole is detected.
    pub reassembly_grace_ms: u64,

    /// Fail outbound transfers still unanswered after this long.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ack_timeout_ms: Option<u64>,

    /// Where completed downloads are written.
    pub download_dir: PathBuf,

    /// Name announced to peers as the sender of a file.
    pub display_name: String,

    /// Inbound files declaring more bytes than this are rejected before any
    /// buffer is reserved.
    pub max_file_size: u64,

    /// Largest inbound file accepted by the CLI's receive policy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_accept_bytes: Option<u64>,
}

fn default_display_name() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "roomdrop".into())
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
            batch_pause_ms: DEFAULT_BATCH_PAUSE.as_millis() as u64,
            reassembly_grace_ms: DEFAULT_REASSEMBLY_GRACE_MS,
            ack_timeout_ms: None,
            download_dir: PathBuf::from("./downloads"),
            display_name: default_display_name(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_accept_bytes: None,
        }
    }
}

impl TransferConfig {
    /// Loads configuration from a JSON file.
    ///
    /// A missing file yields the defaults. A file that fails to parse is
    /// logged and also yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ShareError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        match serde_json::from_str::<Self>(&content) {
            Ok(config) => Ok(config),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse transfer config, using defaults"
                );
                Ok(Self::default())
            }
        }
    }

    /// Writes the configuration as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<(), ShareError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        tracing::debug!(path = %path.display(), "transfer config saved");
        Ok(())
    }

    /// Chunk size clamped so an encoded chunk always fits in one message.
    pub fn effective_chunk_size(&self) -> usize {
        self.chunk_size.clamp(1, MAX_CHUNK_SIZE)
    }

    /// Batch size, at least one chunk.
    pub fn effective_batch_size(&self) -> usize {
        self.batch_size.max(1)
    }

    pub fn batch_pause(&self) -> Duration {
        Duration::from_millis(self.batch_pause_ms)
    }

    pub fn reassembly_grace(&self) -> Duration {
        Duration::from_millis(self.reassembly_grace_ms)
    }

    pub fn ack_timeout(&self) -> Option<Duration> {
        self.ack_timeout_ms.map(Duration::from_millis)
    }
}
