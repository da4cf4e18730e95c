//! Chunk codec, receive-side chunk buffer, and the transfer record store.

pub mod codec;
mod file;
mod progress;
mod slots;
pub mod store;
mod types;
mod validation;

pub use file::{LocalFile, checksum_bytes, detect_content_type};
pub use progress::percent;
pub use slots::ChunkSlots;
pub use store::TransferStore;
pub use types::{Direction, TransferRecord, TransferStatus};
pub use validation::{unique_destination, validate_file_name, validate_layout};

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,

    #[error("missing chunk {0}")]
    MissingChunk(u32),

    #[error("chunk {index} is not valid base64: {source}")]
    InvalidEncoding {
        index: u32,
        #[source]
        source: base64::DecodeError,
    },

    #[error("chunk index {index} out of range (total {total})")]
    IndexOutOfRange { index: u32, total: u32 },

    #[error("checksum mismatch")]
    ChecksumMismatch,

    #[error("invalid file name: {0}")]
    InvalidName(String),

    #[error("file too large ({size} > {max} bytes)")]
    TooLarge { size: u64, max: u64 },

    #[error("{total_chunks} chunks cannot carry {size} bytes")]
    InvalidChunkCount { size: u64, total_chunks: u32 },

    #[error("size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: u64, actual: u64 },
}
