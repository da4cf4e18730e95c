//! Inbound transfers: decide, collect chunks by index, reassemble.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use roomdrop_protocol::{Acknowledgement, Chunk, FileId, Message, Metadata, PeerId, Target};
use roomdrop_room::PeerInfo;
use roomdrop_transfer::{
    ChunkSlots, Direction, TransferError, TransferRecord, TransferStore, checksum_bytes, percent,
    validate_file_name, validate_layout,
};
use tracing::{debug, info, trace, warn};

use crate::ShareError;
use crate::config::TransferConfig;
use crate::decision::{DECLINED, Decision, ReceiveDecision, ReceiveRequestHandler};
use crate::link::Link;

/// Reason sent back when the reservation vanished before the decision.
const CANCELLED: &str = "cancelled";

/// Receive buffer for one announced file.
struct Reservation {
    from: PeerId,
    size: u64,
    checksum: Option<String>,
    slots: ChunkSlots,
    accepted: bool,
    /// Set once the chunk carrying the last marker has been written.
    last_seen: bool,
}

#[derive(Clone)]
pub(crate) struct ReceivePipeline {
    inner: Arc<ReceiveInner>,
}

struct ReceiveInner {
    store: TransferStore,
    link: Arc<Link>,
    config: TransferConfig,
    reservations: Mutex<HashMap<FileId, Reservation>>,
    handler: RwLock<Option<ReceiveRequestHandler>>,
}

impl ReceivePipeline {
    pub(crate) fn new(store: TransferStore, link: Arc<Link>, config: TransferConfig) -> Self {
        Self {
            inner: Arc::new(ReceiveInner {
                store,
                link,
                config,
                reservations: Mutex::new(HashMap::new()),
                handler: RwLock::new(None),
            }),
        }
    }

    pub(crate) fn set_handler(&self, handler: Option<ReceiveRequestHandler>) {
        *self
            .inner
            .handler
            .write()
            .unwrap_or_else(PoisonError::into_inner) = handler;
    }

    /// Reserves a buffer for an announced file and resolves the decision.
    ///
    /// Exactly one acknowledgement is sent back to `from`.
    pub(crate) async fn handle_metadata(&self, from: PeerInfo, metadata: Metadata) {
        let id = metadata.file_id.clone();
        {
            let mut reservations = self.reservations();
            if reservations.contains_key(&id) {
                warn!(file_id = %id, from = %from.id, "duplicate metadata, ignoring");
                return;
            }
            reservations.insert(
                id.clone(),
                Reservation {
                    from: from.id.clone(),
                    size: metadata.size,
                    checksum: metadata.checksum.clone(),
                    slots: ChunkSlots::new(metadata.total_chunks),
                    accepted: false,
                    last_seen: false,
                },
            );
        }
        self.inner
            .store
            .upsert(TransferRecord::inbound(&metadata, from.id.clone()));
        info!(
            file_id = %id,
            from = %from.id,
            name = %metadata.name,
            size = metadata.size,
            chunks = metadata.total_chunks,
            "incoming transfer"
        );

        let checked = validate_file_name(&metadata.name).and_then(|()| {
            validate_layout(
                metadata.size,
                metadata.total_chunks,
                self.inner.config.max_file_size,
            )
        });
        if let Err(e) = checked {
            warn!(file_id = %id, error = %e, "rejecting transfer");
            self.resolve(id, from.id, Decision::Reject(e.to_string()))
                .await;
            return;
        }

        let handler = self
            .inner
            .handler
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match handler {
            None => self.resolve(id, from.id, Decision::Accept).await,
            Some(handler) => {
                let (decision, rx) = ReceiveDecision::new();
                handler(metadata, decision);
                let this = self.clone();
                tokio::spawn(async move {
                    let decision = rx
                        .await
                        .unwrap_or_else(|_| Decision::Reject(DECLINED.into()));
                    this.resolve(id, from.id, decision).await;
                });
            }
        }
    }

    /// Applies a decision and answers the sender.
    async fn resolve(&self, id: FileId, to: PeerId, decision: Decision) {
        let mut zero_chunks = false;
        let ack = {
            let mut reservations = self.reservations();
            match decision {
                _ if !reservations.contains_key(&id) => {
                    Acknowledgement::rejected(id.clone(), CANCELLED)
                }
                Decision::Accept => {
                    if let Some(reservation) = reservations.get_mut(&id) {
                        reservation.accepted = true;
                        zero_chunks = reservation.slots.total() == 0;
                    }
                    Acknowledgement::accepted(id.clone())
                }
                Decision::Reject(reason) => {
                    reservations.remove(&id);
                    Acknowledgement::rejected(id.clone(), reason)
                }
            }
        };

        if ack.accepted {
            info!(file_id = %id, "transfer accepted");
            self.inner
                .store
                .patch(&id, Direction::Receive, TransferRecord::start);
        } else if let Some(reason) = &ack.reason {
            info!(file_id = %id, reason = %reason, "transfer rejected");
            self.fail(&id, reason.clone());
        }

        let result = match self.inner.link.get() {
            Some(channel) => match Message::ack(&ack) {
                Ok(message) => channel
                    .send(Target::Peer(to.clone()), message)
                    .await
                    .map_err(ShareError::from),
                Err(e) => Err(e.into()),
            },
            None => Err(ShareError::NotAttached),
        };
        if let Err(e) = result {
            warn!(file_id = %id, peer = %to, error = %e, "failed to send acknowledgement");
            if ack.accepted {
                self.abort(&id, e.to_string());
            }
            return;
        }

        if zero_chunks {
            self.finish(&id);
        }
    }

    /// Writes a chunk into its reservation.
    ///
    /// Chunks for unknown transfers are dropped silently.
    pub(crate) fn handle_chunk(&self, from: &PeerInfo, chunk: Chunk) {
        let id = chunk.file_id;
        let index = chunk.index;
        let mut reservations = self.reservations();
        let Some(reservation) = reservations.get_mut(&id) else {
            trace!(file_id = %id, chunk = index, "chunk for unknown transfer, dropping");
            return;
        };
        if reservation.from != from.id {
            warn!(file_id = %id, from = %from.id, "chunk from unexpected peer, dropping");
            return;
        }
        if !reservation.accepted {
            warn!(file_id = %id, chunk = index, "chunk before acceptance, dropping");
            return;
        }
        if let Err(e) = reservation.slots.write(index, chunk.data) {
            warn!(file_id = %id, error = %e, "dropping chunk");
            return;
        }
        let arm_grace = chunk.is_last && !reservation.last_seen;
        reservation.last_seen |= chunk.is_last;

        let filled = reservation.slots.filled();
        let total = reservation.slots.total();
        let full = reservation.slots.is_full();
        drop(reservations);

        trace!(file_id = %id, chunk = index, filled, total, "chunk received");
        self.inner.store.patch(&id, Direction::Receive, |r| {
            r.advance(percent(filled.into(), total.into()));
        });

        if full {
            self.finish(&id);
        } else if arm_grace {
            self.arm_grace(id);
        }
    }

    /// Starts the window in which missing chunks may still arrive.
    fn arm_grace(&self, id: FileId) {
        let grace = self.inner.config.reassembly_grace();
        if grace.is_zero() {
            self.finish(&id);
            return;
        }
        debug!(file_id = %id, grace_ms = grace.as_millis() as u64, "last chunk arrived early, waiting for the rest");
        let this = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            this.finish(&id);
        });
    }

    /// Reassembles the reservation and records the outcome.
    fn finish(&self, id: &FileId) {
        let Some(reservation) = self.reservations().remove(id) else {
            return;
        };

        let result = reservation.slots.reassemble().and_then(|bytes| {
            if bytes.len() as u64 != reservation.size {
                return Err(TransferError::SizeMismatch {
                    expected: reservation.size,
                    actual: bytes.len() as u64,
                });
            }
            match &reservation.checksum {
                Some(expected) if *expected != checksum_bytes(&bytes) => {
                    Err(TransferError::ChecksumMismatch)
                }
                _ => Ok(bytes),
            }
        });

        match result {
            Ok(bytes) => {
                let size = bytes.len();
                let payload: Arc<[u8]> = bytes.into();
                self.inner
                    .store
                    .patch(id, Direction::Receive, |r| r.complete(Some(payload)));
                info!(file_id = %id, size, "transfer received");
            }
            Err(e @ TransferError::ChecksumMismatch) => {
                warn!(file_id = %id, "checksum mismatch");
                self.fail(id, e.to_string());
            }
            Err(e) => {
                let reason = format!("reassembly failed: {e}");
                warn!(
                    file_id = %id,
                    filled = reservation.slots.filled(),
                    total = reservation.slots.total(),
                    "{reason}"
                );
                self.fail(id, reason);
            }
        }
    }

    /// Drops the reservation for `id`. Returns whether one existed.
    pub(crate) fn cancel(&self, id: &FileId) -> bool {
        self.reservations().remove(id).is_some()
    }

    /// Drops every reservation.
    pub(crate) fn clear(&self) {
        self.reservations().clear();
    }

    fn abort(&self, id: &FileId, reason: String) {
        self.cancel(id);
        self.fail(id, reason);
    }

    fn fail(&self, id: &FileId, reason: String) {
        self.inner
            .store
            .patch(id, Direction::Receive, |r| r.fail(reason));
    }

    fn reservations(&self) -> MutexGuard<'_, HashMap<FileId, Reservation>> {
        self.inner
            .reservations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
