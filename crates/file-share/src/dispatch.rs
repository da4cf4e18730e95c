//! Inbound dispatch loop: routes room messages to the pipelines.

use roomdrop_protocol::{Acknowledgement, Action, Chunk, Metadata};
use roomdrop_room::Inbound;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::receive::ReceivePipeline;
use crate::send::SendPipeline;

/// Reads inbound messages until cancelled or the room closes the stream.
pub(crate) async fn dispatch_loop(
    mut inbound: mpsc::UnboundedReceiver<Inbound>,
    send: SendPipeline,
    receive: ReceivePipeline,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("dispatch loop cancelled");
                break;
            }

            msg = inbound.recv() => {
                match msg {
                    Some(inbound) => dispatch(inbound, &send, &receive).await,
                    None => {
                        debug!("inbound stream ended");
                        break;
                    }
                }
            }
        }
    }
}

/// Handles one inbound message. Malformed payloads and unknown actions
/// are logged and dropped.
async fn dispatch(inbound: Inbound, send: &SendPipeline, receive: &ReceivePipeline) {
    let Inbound { from, message } = inbound;
    trace!(from = %from.id, action = %message.action, "inbound message");

    match message.action {
        Action::Metadata => match message.parse_payload::<Metadata>() {
            Ok(metadata) => receive.handle_metadata(from, metadata).await,
            Err(e) => warn!(from = %from.id, error = %e, "malformed metadata, dropping"),
        },
        Action::Chunk => match message.parse_payload::<Chunk>() {
            Ok(chunk) => receive.handle_chunk(&from, chunk),
            Err(e) => warn!(from = %from.id, error = %e, "malformed chunk, dropping"),
        },
        Action::Ack => match message.parse_payload::<Acknowledgement>() {
            Ok(ack) => send.handle_ack(&from, ack),
            Err(e) => warn!(from = %from.id, error = %e, "malformed ack, dropping"),
        },
        Action::Unknown => {
            warn!(from = %from.id, "message with unknown action, dropping");
        }
    }
}
