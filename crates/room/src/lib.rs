//! Room membership and peer channels.
//!
//! A room is a set of peers that can exchange [`Message`]s. The transfer
//! logic only sees the [`PeerChannel`] trait; [`MemoryRoom`] is an
//! in-process implementation used by the CLI and tests.
//!
//! [`Message`]: roomdrop_protocol::Message

mod channel;
mod memory;

pub use channel::{ChannelError, Inbound, PeerChannel, PeerInfo, SendFuture};
pub use memory::{MemoryRoom, RoomMember};
