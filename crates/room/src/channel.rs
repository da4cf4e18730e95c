use std::fmt;
use std::future::Future;
use std::pin::Pin;

use roomdrop_protocol::{Message, PeerId, Target};

/// Errors returned by a peer channel.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("unknown peer: {0}")]
    UnknownPeer(PeerId),

    #[error("peer {0} is no longer reachable")]
    PeerGone(PeerId),

    #[error("channel closed")]
    Closed,

    #[error("message too large ({size} bytes, max {max})")]
    TooLarge { size: usize, max: usize },
}

/// A member of the room as seen by other members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerInfo {
    pub id: PeerId,
    pub name: String,
}

impl fmt::Display for PeerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// A message received from another peer.
#[derive(Debug, Clone)]
pub struct Inbound {
    pub from: PeerInfo,
    pub message: Message,
}

/// Boxed future returned by [`PeerChannel::send`].
pub type SendFuture<'a> = Pin<Box<dyn Future<Output = Result<(), ChannelError>> + Send + 'a>>;

/// Abstract connection to the other members of a room.
///
/// Transports implement this trait; the transfer pipelines only depend on
/// it, which keeps them testable with in-memory or mock channels.
pub trait PeerChannel: Send + Sync {
    /// Returns this node's identity in the room.
    fn local_peer(&self) -> PeerInfo;

    /// Returns the other connected peers, in join order.
    fn peers(&self) -> Vec<PeerInfo>;

    /// Sends a message to one peer or to every other peer.
    ///
    /// Delivery to a single peer is FIFO.
    fn send(&self, target: Target, message: Message) -> SendFuture<'_>;
}
