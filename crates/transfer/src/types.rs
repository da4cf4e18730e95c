use std::sync::Arc;

use roomdrop_protocol::{FileId, Metadata, PeerId};
use serde::Serialize;

/// Which side of the transfer this node is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Send,
    Receive,
}

/// Lifecycle of a transfer: `pending -> transferring -> completed | failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Pending,
    Transferring,
    Completed,
    Failed,
}

impl TransferStatus {
    /// Completed and failed are final.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// One logical transfer as seen by this node.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRecord {
    pub id: FileId,
    pub name: String,
    pub size: u64,
    pub content_type: String,
    pub direction: Direction,
    pub status: TransferStatus,
    /// Percentage 0-100, never decreasing.
    pub progress: u8,
    pub peer_id: PeerId,
    pub peer_name: String,
    /// Reassembled file, set on completed receive records only.
    #[serde(skip)]
    pub payload: Option<Arc<[u8]>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TransferRecord {
    /// Creates the pending record for an outbound transfer.
    pub fn outbound(metadata: &Metadata, peer_id: PeerId, peer_name: impl Into<String>) -> Self {
        Self::from_metadata(metadata, Direction::Send, peer_id, peer_name.into())
    }

    /// Creates the pending record for an inbound transfer.
    pub fn inbound(metadata: &Metadata, from: PeerId) -> Self {
        let peer_name = metadata.sender_name.clone();
        Self::from_metadata(metadata, Direction::Receive, from, peer_name)
    }

    fn from_metadata(
        metadata: &Metadata,
        direction: Direction,
        peer_id: PeerId,
        peer_name: String,
    ) -> Self {
        Self {
            id: metadata.file_id.clone(),
            name: metadata.name.clone(),
            size: metadata.size,
            content_type: metadata.content_type.clone(),
            direction,
            status: TransferStatus::Pending,
            progress: 0,
            peer_id,
            peer_name,
            payload: None,
            error: None,
        }
    }

    /// Moves to `transferring`.
    pub fn start(&mut self) {
        self.status = TransferStatus::Transferring;
    }

    /// Raises progress; lower values are ignored.
    pub fn advance(&mut self, progress: u8) {
        self.progress = self.progress.max(progress.min(100));
    }

    /// Moves to `completed` at 100%.
    pub fn complete(&mut self, payload: Option<Arc<[u8]>>) {
        self.status = TransferStatus::Completed;
        self.progress = 100;
        self.payload = payload;
    }

    /// Moves to `failed` with a reason.
    pub fn fail(&mut self, reason: impl Into<String>) {
        self.status = TransferStatus::Failed;
        self.error = Some(reason.into());
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
