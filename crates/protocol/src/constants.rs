use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default chunk size (16 KiB).
///
/// Base64 inflates a chunk by 4/3, so an encoded default chunk plus its
/// JSON envelope stays well under [`MAX_MESSAGE_SIZE`].
pub const DEFAULT_CHUNK_SIZE: usize = 16 * 1024;

/// Chunks sent back-to-back before the sender pauses.
pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Pause inserted after every batch so the channel send buffer can drain.
pub const DEFAULT_BATCH_PAUSE: Duration = Duration::from_millis(50);

/// Per-message ceiling of the underlying peer channel (64 KiB).
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Largest raw chunk whose base64 form still fits in [`MAX_MESSAGE_SIZE`]
/// with 1 KiB left over for the envelope.
pub const MAX_CHUNK_SIZE: usize = (MAX_MESSAGE_SIZE - 1024) / 4 * 3;

/// Number of chunks needed for `size` bytes: `ceil(size / chunk_size)`.
///
/// Returns 0 for an empty file or a zero chunk size.
pub fn total_chunks(size: u64, chunk_size: usize) -> u32 {
    if chunk_size == 0 {
        return 0;
    }
    size.div_ceil(chunk_size as u64) as u32
}

/// Named action a message travels on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    #[serde(rename = "metadata")]
    Metadata,
    #[serde(rename = "chunk")]
    Chunk,
    #[serde(rename = "ack")]
    Ack,

    /// Forward compatibility: unknown action names deserialize here.
    #[serde(other)]
    Unknown,
}

impl Action {
    /// Wire name of the action.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Metadata => "metadata",
            Self::Chunk => "chunk",
            Self::Ack => "ack",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
