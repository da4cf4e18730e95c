//! In-process room backed by unbounded mpsc channels.

use std::sync::{Arc, PoisonError, RwLock};

use roomdrop_protocol::constants::MAX_MESSAGE_SIZE;
use roomdrop_protocol::{Message, PeerId, Target};
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use crate::channel::{ChannelError, Inbound, PeerChannel, PeerInfo, SendFuture};

/// A room whose members live in the same process.
#[derive(Clone, Default)]
pub struct MemoryRoom {
    inner: Arc<RoomInner>,
}

#[derive(Default)]
struct RoomInner {
    /// Members in join order.
    members: RwLock<Vec<(PeerInfo, mpsc::UnboundedSender<Inbound>)>>,
}

impl MemoryRoom {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a member named `name`. Returns its channel and inbound stream.
    pub fn join(&self, name: impl Into<String>) -> (RoomMember, mpsc::UnboundedReceiver<Inbound>) {
        let info = PeerInfo {
            id: PeerId::new(uuid::Uuid::new_v4().to_string()),
            name: name.into(),
        };
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .members
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((info.clone(), tx));
        info!(peer = %info.id, name = %info.name, "peer joined room");

        let member = RoomMember {
            room: self.clone(),
            info,
        };
        (member, rx)
    }

    /// Returns every current member in join order.
    pub fn members(&self) -> Vec<PeerInfo> {
        self.inner
            .members
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(info, _)| info.clone())
            .collect()
    }

    fn remove(&self, id: &PeerId) -> bool {
        let mut members = self
            .inner
            .members
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = members.len();
        members.retain(|(info, _)| &info.id != id);
        members.len() != before
    }

    fn contains(&self, id: &PeerId) -> bool {
        self.inner
            .members
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|(info, _)| &info.id == id)
    }

    fn deliver(&self, from: &PeerInfo, target: Target, message: Message) -> Result<(), ChannelError> {
        let members = self
            .inner
            .members
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        match target {
            Target::Peer(id) => {
                let (_, tx) = members
                    .iter()
                    .find(|(info, _)| info.id == id)
                    .ok_or_else(|| ChannelError::UnknownPeer(id.clone()))?;
                trace!(from = %from.id, to = %id, action = %message.action, "deliver");
                tx.send(Inbound {
                    from: from.clone(),
                    message,
                })
                .map_err(|_| ChannelError::PeerGone(id))
            }
            Target::Broadcast => {
                for (info, tx) in members.iter().filter(|(info, _)| info.id != from.id) {
                    let inbound = Inbound {
                        from: from.clone(),
                        message: message.clone(),
                    };
                    if tx.send(inbound).is_err() {
                        debug!(to = %info.id, "broadcast receiver dropped");
                    }
                }
                Ok(())
            }
        }
    }
}

/// One member's handle on a [`MemoryRoom`]. Leaves the room when dropped.
pub struct RoomMember {
    room: MemoryRoom,
    info: PeerInfo,
}

impl RoomMember {
    /// Removes this member from the room. Later sends fail with
    /// [`ChannelError::Closed`].
    pub fn leave(&self) {
        if self.room.remove(&self.info.id) {
            info!(peer = %self.info.id, name = %self.info.name, "peer left room");
        }
    }
}

impl Drop for RoomMember {
    fn drop(&mut self) {
        self.leave();
    }
}

impl PeerChannel for RoomMember {
    fn local_peer(&self) -> PeerInfo {
        self.info.clone()
    }

    fn peers(&self) -> Vec<PeerInfo> {
        self.room
            .members()
            .into_iter()
            .filter(|p| p.id != self.info.id)
            .collect()
    }

    fn send(&self, target: Target, message: Message) -> SendFuture<'_> {
        Box::pin(async move {
            if !self.room.contains(&self.info.id) {
                return Err(ChannelError::Closed);
            }
            let size = message.encoded_len();
            if size > MAX_MESSAGE_SIZE {
                return Err(ChannelError::TooLarge {
                    size,
                    max: MAX_MESSAGE_SIZE,
                });
            }
            self.room.deliver(&self.info, target, message)
        })
    }
}
