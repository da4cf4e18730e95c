//! Wire protocol for roomdrop file transfers.
//!
//! Three actions travel over the room's peer channels: `metadata`
//! (sender announces a file), `ack` (receiver accepts or rejects it) and
//! `chunk` (one encoded slice of the file). Every message is wrapped in a
//! [`Message`] envelope tagged with its [`Action`].

pub mod constants;
pub mod envelope;
pub mod messages;
pub mod types;

pub use constants::{Action, total_chunks};
pub use envelope::{Message, ProtocolError};
pub use messages::{Acknowledgement, Chunk, Metadata};
pub use types::{FileId, PeerId, Target};
