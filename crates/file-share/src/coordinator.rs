//! Transfer coordinator: public surface of file sharing in a room.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use roomdrop_protocol::{FileId, PeerId};
use roomdrop_room::{Inbound, PeerChannel, PeerInfo};
use roomdrop_transfer::{
    Direction, LocalFile, TransferRecord, TransferStatus, TransferStore, unique_destination,
    validate_file_name,
};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::ShareError;
use crate::config::TransferConfig;
use crate::decision::ReceiveRequestHandler;
use crate::dispatch::dispatch_loop;
use crate::link::Link;
use crate::receive::ReceivePipeline;
use crate::send::SendPipeline;

/// Sends and receives files over one room connection at a time.
///
/// All transfer state lives in memory. Progress and outcomes are observed
/// through [`transfers`](Self::transfers) or [`subscribe`](Self::subscribe).
pub struct TransferCoordinator {
    config: TransferConfig,
    store: TransferStore,
    link: Arc<Link>,
    send: SendPipeline,
    receive: ReceivePipeline,
    /// Cancels the dispatch task of the current connection.
    dispatch: Mutex<Option<CancellationToken>>,
}

impl TransferCoordinator {
    pub fn new(config: TransferConfig) -> Self {
        let store = TransferStore::new();
        let link = Arc::new(Link::default());
        Self {
            send: SendPipeline::new(store.clone(), link.clone(), config.clone()),
            receive: ReceivePipeline::new(store.clone(), link.clone(), config.clone()),
            config,
            store,
            link,
            dispatch: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Installs the accept/reject callback for inbound transfers. Without
    /// one, every inbound transfer is accepted.
    pub fn set_receive_handler(&self, handler: Option<ReceiveRequestHandler>) {
        self.receive.set_handler(handler);
    }

    /// Wires a room connection to the pipelines.
    ///
    /// Attaching again replaces the previous connection and stops its
    /// dispatch task, so each action is handled by exactly one loop.
    /// Must be called from within a Tokio runtime.
    pub fn attach(&self, channel: Arc<dyn PeerChannel>, inbound: mpsc::UnboundedReceiver<Inbound>) {
        let local = channel.local_peer();
        let cancel = CancellationToken::new();
        if let Some(previous) = self.dispatch_slot().replace(cancel.clone()) {
            debug!("replacing previous room connection");
            previous.cancel();
        }
        self.link.set(channel);

        tokio::spawn(dispatch_loop(
            inbound,
            self.send.clone(),
            self.receive.clone(),
            cancel,
        ));
        info!(peer = %local.id, name = %local.name, "attached to room");
    }

    /// Stops dispatching and forgets the room connection.
    pub fn detach(&self) {
        if let Some(cancel) = self.dispatch_slot().take() {
            cancel.cancel();
        }
        if let Some(channel) = self.link.clear() {
            info!(peer = %channel.local_peer().id, "detached from room");
        }
    }

    /// This node's identity in the attached room.
    pub fn local_peer(&self) -> Result<PeerInfo, ShareError> {
        self.link
            .get()
            .map(|c| c.local_peer())
            .ok_or(ShareError::NotAttached)
    }

    /// Other peers in the attached room.
    pub fn peers(&self) -> Vec<PeerInfo> {
        self.link.get().map(|c| c.peers()).unwrap_or_default()
    }

    /// Offers `file` to `to`, or to the first connected peer.
    ///
    /// Returns once the file has been announced. The outcome is tracked on
    /// the send record with the returned id.
    pub async fn send_file(&self, file: LocalFile, to: Option<PeerId>) -> FileId {
        self.send.initiate(file, to).await
    }

    /// Reads `path` from disk and offers it like [`send_file`](Self::send_file).
    pub async fn send_path(&self, path: &Path, to: Option<PeerId>) -> Result<FileId, ShareError> {
        let file = LocalFile::read(path).await?;
        Ok(self.send_file(file, to).await)
    }

    /// Saves a completed inbound file into the download directory.
    ///
    /// Returns `Ok(None)` when there is no completed receive record for `id`.
    /// Existing files are never overwritten; a numbered name is picked
    /// instead.
    pub async fn download_file(&self, id: &FileId) -> Result<Option<PathBuf>, ShareError> {
        let Some(record) = self.store.get(id, Direction::Receive) else {
            return Ok(None);
        };
        let Some(payload) = record
            .payload
            .filter(|_| record.status == TransferStatus::Completed)
        else {
            return Ok(None);
        };
        validate_file_name(&record.name)?;

        let dir = &self.config.download_dir;
        tokio::fs::create_dir_all(dir).await?;
        let dest = unique_destination(dir, &record.name);
        tokio::fs::write(&dest, &payload).await?;

        info!(file_id = %id, path = %dest.display(), size = payload.len(), "download saved");
        Ok(Some(dest))
    }

    /// Removes every record for `id` and stops any work still pending for it.
    ///
    /// Returns whether anything was removed.
    pub fn remove_transfer(&self, id: &FileId) -> bool {
        let queued = self.send.cancel(id);
        let reserved = self.receive.cancel(id);
        let removed = !self.store.remove(id).is_empty();
        if removed || queued || reserved {
            info!(file_id = %id, "transfer removed");
        }
        removed
    }

    /// Removes every record and stops all pending work.
    pub fn clear_transfers(&self) {
        self.send.clear();
        self.receive.clear();
        let removed = self.store.clear();
        info!(count = removed.len(), "transfers cleared");
    }

    /// Snapshot of all transfers in creation order.
    pub fn transfers(&self) -> Vec<TransferRecord> {
        self.store.list()
    }

    pub fn transfer(&self, id: &FileId, direction: Direction) -> Option<TransferRecord> {
        self.store.get(id, direction)
    }

    /// Receiver that observes the transfer list after every change.
    pub fn subscribe(&self) -> watch::Receiver<Vec<TransferRecord>> {
        self.store.subscribe()
    }

    fn dispatch_slot(&self) -> std::sync::MutexGuard<'_, Option<CancellationToken>> {
        self.dispatch.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for TransferCoordinator {
    fn drop(&mut self) {
        if let Some(cancel) = self.dispatch_slot().take() {
            cancel.cancel();
        }
    }
}
