//! Splits payloads into fixed-size chunks and encodes each as base64 text.
//!
//! Base64 keeps every chunk safe for text-only message channels. Decoding
//! is only defined once every index has a slot; holes are an error.

use base64::{Engine, engine::general_purpose::STANDARD};

use crate::TransferError;

/// Encodes `bytes` into an ordered list of base64 chunks of at most
/// `chunk_size` raw bytes each. An empty payload yields no chunks.
pub fn encode(bytes: &[u8], chunk_size: usize) -> Result<Vec<String>, TransferError> {
    if chunk_size == 0 {
        return Err(TransferError::InvalidChunkSize);
    }
    Ok(bytes
        .chunks(chunk_size)
        .map(|chunk| STANDARD.encode(chunk))
        .collect())
}

/// Decodes a single encoded chunk.
pub fn decode_chunk(index: u32, data: &str) -> Result<Vec<u8>, TransferError> {
    STANDARD
        .decode(data)
        .map_err(|source| TransferError::InvalidEncoding { index, source })
}

/// Decodes chunks in index order and concatenates them.
///
/// Every slot must be present and non-empty.
pub fn decode<S: AsRef<str>>(slots: &[Option<S>]) -> Result<Vec<u8>, TransferError> {
    let mut out = Vec::new();
    for (index, slot) in slots.iter().enumerate() {
        let index = index as u32;
        let data = match slot {
            Some(data) if !data.as_ref().is_empty() => data.as_ref(),
            _ => return Err(TransferError::MissingChunk(index)),
        };
        out.extend_from_slice(&decode_chunk(index, data)?);
    }
    Ok(out)
}
