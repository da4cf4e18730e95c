//! Outbound transfers: announce, wait for the answer, then stream chunks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use roomdrop_protocol::{
    Acknowledgement, Chunk, FileId, Message, Metadata, PeerId, Target, total_chunks,
};
use roomdrop_room::{PeerChannel, PeerInfo};
use roomdrop_transfer::{
    Direction, LocalFile, TransferRecord, TransferStatus, TransferStore, checksum_bytes, codec,
    percent,
};
use tracing::{debug, info, trace, warn};

use crate::ShareError;
use crate::config::TransferConfig;
use crate::link::Link;

/// Reason recorded when the peer never answers within the ack timeout.
const NO_RESPONSE: &str = "no response from peer";

/// Reason recorded when the peer rejects without saying why.
const REJECTED: &str = "rejected by peer";

/// Encoded file waiting for, or being streamed after, acceptance.
struct Outgoing {
    peer: PeerId,
    chunks: Arc<[String]>,
    streaming: bool,
}

#[derive(Clone)]
pub(crate) struct SendPipeline {
    inner: Arc<SendInner>,
}

struct SendInner {
    store: TransferStore,
    link: Arc<Link>,
    config: TransferConfig,
    outbox: Mutex<HashMap<FileId, Outgoing>>,
}

impl SendPipeline {
    pub(crate) fn new(store: TransferStore, link: Arc<Link>, config: TransferConfig) -> Self {
        Self {
            inner: Arc::new(SendInner {
                store,
                link,
                config,
                outbox: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Creates a pending record for `file`, queues its chunks and announces
    /// it to `to`, or to the first connected peer when `to` is `None`.
    ///
    /// Failures are recorded on the transfer record.
    pub(crate) async fn initiate(&self, file: LocalFile, to: Option<PeerId>) -> FileId {
        let chunk_size = self.inner.config.effective_chunk_size();
        let metadata = Metadata {
            file_id: FileId::generate(),
            name: file.name.clone(),
            size: file.size(),
            content_type: file.content_type.clone(),
            total_chunks: total_chunks(file.size(), chunk_size),
            sender_name: self.inner.config.display_name.clone(),
            checksum: Some(checksum_bytes(&file.data)),
        };
        let id = metadata.file_id.clone();

        let Some(channel) = self.inner.link.get() else {
            self.record_unsent(&metadata, to, ShareError::NotAttached);
            return id;
        };
        let Some(peer) = resolve_target(channel.as_ref(), to.clone()) else {
            self.record_unsent(&metadata, to, ShareError::NoPeer);
            return id;
        };

        self.inner
            .store
            .upsert(TransferRecord::outbound(&metadata, peer.id.clone(), peer.name.clone()));

        let chunks = match codec::encode(&file.data, chunk_size) {
            Ok(chunks) => chunks,
            Err(e) => {
                self.fail(&id, e.to_string());
                return id;
            }
        };
        self.outbox().insert(
            id.clone(),
            Outgoing {
                peer: peer.id.clone(),
                chunks: chunks.into(),
                streaming: false,
            },
        );

        let message = match Message::metadata(&metadata) {
            Ok(m) => m,
            Err(e) => {
                self.abort(&id, e.to_string());
                return id;
            }
        };
        if let Err(e) = channel.send(Target::Peer(peer.id.clone()), message).await {
            warn!(file_id = %id, peer = %peer.id, error = %e, "failed to send metadata");
            self.abort(&id, e.to_string());
            return id;
        }

        info!(
            file_id = %id,
            peer = %peer.id,
            name = %metadata.name,
            size = metadata.size,
            chunks = metadata.total_chunks,
            "metadata sent"
        );

        if let Some(timeout) = self.inner.config.ack_timeout() {
            let this = self.clone();
            let id = id.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                this.expire(&id);
            });
        }

        id
    }

    /// Applies the receiver's answer to a queued transfer.
    pub(crate) fn handle_ack(&self, from: &PeerInfo, ack: Acknowledgement) {
        let id = ack.file_id;
        let mut outbox = self.outbox();
        let Some(entry) = outbox.get_mut(&id) else {
            trace!(file_id = %id, "ack for unknown transfer, dropping");
            return;
        };
        if entry.peer != from.id {
            warn!(file_id = %id, from = %from.id, expected = %entry.peer, "ack from unexpected peer, ignoring");
            return;
        }
        if entry.streaming {
            warn!(file_id = %id, "duplicate ack, ignoring");
            return;
        }

        if !ack.accepted {
            outbox.remove(&id);
            drop(outbox);
            let reason = ack.reason.unwrap_or_else(|| REJECTED.into());
            info!(file_id = %id, peer = %from.id, reason = %reason, "transfer rejected");
            self.fail(&id, reason);
            return;
        }

        entry.streaming = true;
        drop(outbox);
        info!(file_id = %id, peer = %from.id, "transfer accepted");
        self.inner
            .store
            .patch(&id, Direction::Send, TransferRecord::start);

        let this = self.clone();
        tokio::spawn(async move { this.stream(id).await });
    }

    /// Sends every queued chunk in index order, pausing between batches.
    ///
    /// Exits silently once the queue entry has been removed.
    async fn stream(&self, id: FileId) {
        let Some((peer, chunks)) = self
            .outbox()
            .get(&id)
            .map(|e| (e.peer.clone(), e.chunks.clone()))
        else {
            return;
        };

        let total = chunks.len();
        let batch_size = self.inner.config.effective_batch_size();
        let batch_pause = self.inner.config.batch_pause();

        for (index, data) in chunks.iter().enumerate() {
            if !self.is_queued(&id) {
                debug!(file_id = %id, chunk = index, "transfer cancelled, stopping");
                return;
            }
            let Some(channel) = self.inner.link.get() else {
                self.abort(&id, ShareError::NotAttached.to_string());
                return;
            };

            let chunk = Chunk {
                file_id: id.clone(),
                index: index as u32,
                data: data.clone(),
                is_last: index + 1 == total,
            };
            let message = match Message::chunk(&chunk) {
                Ok(m) => m,
                Err(e) => {
                    self.abort(&id, e.to_string());
                    return;
                }
            };
            if let Err(e) = channel.send(Target::Peer(peer.clone()), message).await {
                warn!(file_id = %id, chunk = index, error = %e, "failed to send chunk");
                self.abort(&id, e.to_string());
                return;
            }
            trace!(file_id = %id, chunk = index, total, "chunk sent");

            let sent = index + 1;
            self.inner.store.patch(&id, Direction::Send, |r| {
                r.advance(percent(sent as u64, total as u64));
            });

            if sent % batch_size == 0 && sent < total {
                tokio::time::sleep(batch_pause).await;
            }
        }

        if self.outbox().remove(&id).is_some() {
            self.inner
                .store
                .patch(&id, Direction::Send, |r| r.complete(None));
            info!(file_id = %id, peer = %peer, chunks = total, "transfer sent");
        }
    }

    /// Drops the queue entry for `id`. Returns whether one existed.
    pub(crate) fn cancel(&self, id: &FileId) -> bool {
        self.outbox().remove(id).is_some()
    }

    /// Drops every queue entry.
    pub(crate) fn clear(&self) {
        self.outbox().clear();
    }

    fn is_queued(&self, id: &FileId) -> bool {
        self.outbox().contains_key(id)
    }

    /// Fails a transfer that is still waiting for its answer.
    fn expire(&self, id: &FileId) {
        let still_pending = self
            .inner
            .store
            .get(id, Direction::Send)
            .is_some_and(|r| r.status == TransferStatus::Pending);
        if still_pending && self.cancel(id) {
            warn!(file_id = %id, "no acknowledgement before timeout");
            self.fail(id, NO_RESPONSE);
        }
    }

    /// Records a transfer that could not be addressed to anyone.
    fn record_unsent(&self, metadata: &Metadata, to: Option<PeerId>, reason: ShareError) {
        let peer = to.unwrap_or_else(|| PeerId::new(""));
        let peer_name = peer.to_string();
        let mut record = TransferRecord::outbound(metadata, peer, peer_name);
        warn!(file_id = %metadata.file_id, reason = %reason, "cannot send file");
        record.fail(reason.to_string());
        self.inner.store.upsert(record);
    }

    fn abort(&self, id: &FileId, reason: String) {
        self.cancel(id);
        self.fail(id, reason);
    }

    fn fail(&self, id: &FileId, reason: impl Into<String>) {
        self.inner
            .store
            .patch(id, Direction::Send, |r| r.fail(reason));
    }

    fn outbox(&self) -> std::sync::MutexGuard<'_, HashMap<FileId, Outgoing>> {
        self.inner
            .outbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Picks the peer a new transfer is addressed to.
fn resolve_target(channel: &dyn PeerChannel, to: Option<PeerId>) -> Option<PeerInfo> {
    let peers = channel.peers();
    match to {
        Some(id) => Some(
            peers
                .into_iter()
                .find(|p| p.id == id)
                .unwrap_or_else(|| PeerInfo {
                    name: id.to_string(),
                    id,
                }),
        ),
        None => {
            if peers.len() > 1 {
                warn!(
                    peers = peers.len(),
                    "several peers connected and no target given, sending to the first"
                );
            }
            peers.into_iter().next()
        }
    }
}
