use serde::{Deserialize, Serialize};

use crate::constants::Action;
use crate::messages::{Acknowledgement, Chunk, Metadata};

/// Errors produced while building or reading an envelope.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("message has no payload")]
    MissingPayload,

    #[error("unexpected action: expected {expected}, got {got}")]
    UnexpectedAction { expected: Action, got: Action },
}

/// Envelope for every message exchanged between peers.
///
/// The `payload` field uses `serde_json::value::RawValue` to defer
/// deserialization until the action has been routed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub action: Action,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Box<serde_json::value::RawValue>>,
}

impl Message {
    /// Creates a new message with the given action and payload.
    pub fn new<T: Serialize>(action: Action, payload: &T) -> Result<Self, ProtocolError> {
        let json = serde_json::to_string(payload)?;
        Ok(Self {
            action,
            payload: Some(serde_json::value::RawValue::from_string(json)?),
        })
    }

    pub fn metadata(metadata: &Metadata) -> Result<Self, ProtocolError> {
        Self::new(Action::Metadata, metadata)
    }

    pub fn chunk(chunk: &Chunk) -> Result<Self, ProtocolError> {
        Self::new(Action::Chunk, chunk)
    }

    pub fn ack(ack: &Acknowledgement) -> Result<Self, ProtocolError> {
        Self::new(Action::Ack, ack)
    }

    /// Deserializes the payload into the given type.
    pub fn parse_payload<T: for<'de> Deserialize<'de>>(&self) -> Result<T, ProtocolError> {
        match &self.payload {
            Some(raw) => Ok(serde_json::from_str(raw.get())?),
            None => Err(ProtocolError::MissingPayload),
        }
    }

    /// Deserializes the payload after checking the action matches.
    pub fn expect_payload<T: for<'de> Deserialize<'de>>(
        &self,
        expected: Action,
    ) -> Result<T, ProtocolError> {
        if self.action != expected {
            return Err(ProtocolError::UnexpectedAction {
                expected,
                got: self.action,
            });
        }
        self.parse_payload()
    }

    /// Serialized size in bytes, used to enforce the channel's message ceiling.
    pub fn encoded_len(&self) -> usize {
        // {"action":"...","payload":...}
        let payload = self.payload.as_ref().map_or(0, |p| p.get().len() + 11);
        13 + self.action.as_str().len() + payload
    }
}
