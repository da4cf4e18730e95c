//! Peer-to-peer file sharing over a room.
//!
//! [`TransferCoordinator`] is the entry point: it owns the record store,
//! the send and receive pipelines, and the dispatch task that routes the
//! `metadata`, `chunk` and `ack` actions arriving from the room.

mod config;
mod coordinator;
mod decision;
mod dispatch;
mod error;
mod link;
mod receive;
mod send;
#[cfg(test)]
mod testing;

pub use config::TransferConfig;
pub use coordinator::TransferCoordinator;
pub use decision::{ReceiveDecision, ReceiveRequestHandler};
pub use error::ShareError;

pub use roomdrop_transfer::{Direction, LocalFile, TransferRecord, TransferStatus};
