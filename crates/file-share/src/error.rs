//! File-share error types.

use roomdrop_protocol::ProtocolError;
use roomdrop_room::ChannelError;
use roomdrop_transfer::TransferError;

/// Errors returned by local coordinator operations.
///
/// Failures of a transfer in flight are never returned; they are recorded
/// on its [`TransferRecord`](roomdrop_transfer::TransferRecord).
#[derive(Debug, thiserror::Error)]
pub enum ShareError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),

    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("not attached to a room")]
    NotAttached,

    #[error("no connected peer")]
    NoPeer,
}
