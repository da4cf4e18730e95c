//! Accept/reject decisions for inbound transfers.

use std::sync::Arc;

use roomdrop_protocol::Metadata;
use tokio::sync::oneshot;

/// Reason sent when a decision handle is dropped without an answer.
pub(crate) const DECLINED: &str = "declined";

/// Called once for every announced file. The handler decides now or later
/// by consuming the [`ReceiveDecision`].
pub type ReceiveRequestHandler = Arc<dyn Fn(Metadata, ReceiveDecision) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Decision {
    Accept,
    Reject(String),
}

/// One-shot answer to an inbound transfer request.
///
/// Dropping it without calling [`accept`](Self::accept) or
/// [`reject`](Self::reject) rejects the transfer with reason `declined`.
#[derive(Debug)]
pub struct ReceiveDecision {
    tx: Option<oneshot::Sender<Decision>>,
}

impl ReceiveDecision {
    pub(crate) fn new() -> (Self, oneshot::Receiver<Decision>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// Accepts the transfer.
    pub fn accept(mut self) {
        self.resolve(Decision::Accept);
    }

    /// Rejects the transfer; `reason` is sent to the sender.
    pub fn reject(mut self, reason: impl Into<String>) {
        self.resolve(Decision::Reject(reason.into()));
    }

    fn resolve(&mut self, decision: Decision) {
        if let Some(tx) = self.tx.take() {
            // The receive side may already be gone after removal.
            let _ = tx.send(decision);
        }
    }
}

impl Drop for ReceiveDecision {
    fn drop(&mut self) {
        self.resolve(Decision::Reject(DECLINED.into()));
    }
}
