//! Recording channel for unit tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use roomdrop_protocol::{Action, Message, PeerId, Target};
use roomdrop_room::{ChannelError, PeerChannel, PeerInfo, SendFuture};

pub(crate) struct MockChannel {
    local: PeerInfo,
    peers: Vec<PeerInfo>,
    sent: Mutex<Vec<(Target, Message)>>,
    fail: AtomicBool,
}

impl MockChannel {
    /// Creates a channel whose peers have ids equal to their names.
    pub(crate) fn new(peers: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            local: info("me"),
            peers: peers.iter().map(|p| info(p)).collect(),
            sent: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        })
    }

    pub(crate) fn peer(&self, name: &str) -> PeerInfo {
        info(name)
    }

    pub(crate) fn sent(&self) -> Vec<(Target, Message)> {
        self.sent.lock().unwrap().clone()
    }

    pub(crate) fn count(&self, action: Action) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, m)| m.action == action)
            .count()
    }

    pub(crate) fn fail_sends(&self, fail: bool) {
        self.fail.store(fail, Ordering::Relaxed);
    }
}

fn info(name: &str) -> PeerInfo {
    PeerInfo {
        id: PeerId::new(name),
        name: name.to_string(),
    }
}

impl PeerChannel for MockChannel {
    fn local_peer(&self) -> PeerInfo {
        self.local.clone()
    }

    fn peers(&self) -> Vec<PeerInfo> {
        self.peers.clone()
    }

    fn send(&self, target: Target, message: Message) -> SendFuture<'_> {
        Box::pin(async move {
            if self.fail.load(Ordering::Relaxed) {
                return Err(ChannelError::Closed);
            }
            self.sent.lock().unwrap().push((target, message));
            Ok(())
        })
    }
}
