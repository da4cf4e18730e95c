use std::sync::{Arc, PoisonError, RwLock};

use roomdrop_room::PeerChannel;

/// Slot holding the channel of the current room connection.
#[derive(Default)]
pub(crate) struct Link {
    channel: RwLock<Option<Arc<dyn PeerChannel>>>,
}

impl Link {
    pub(crate) fn get(&self) -> Option<Arc<dyn PeerChannel>> {
        self.channel
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn set(&self, channel: Arc<dyn PeerChannel>) {
        *self.channel.write().unwrap_or_else(PoisonError::into_inner) = Some(channel);
    }

    pub(crate) fn clear(&self) -> Option<Arc<dyn PeerChannel>> {
        self.channel
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}
