use std::collections::BTreeMap;

use crate::{TransferError, codec};

/// Index-addressable buffer of encoded chunks for one inbound transfer.
///
/// Only received chunks take memory; the declared count bounds the valid
/// indices. Writing an index twice overwrites the slot without changing
/// the filled count.
#[derive(Debug, Clone)]
pub struct ChunkSlots {
    slots: BTreeMap<u32, String>,
    total: u32,
}

impl ChunkSlots {
    /// Creates an empty buffer expecting `total` chunks.
    pub fn new(total: u32) -> Self {
        Self {
            slots: BTreeMap::new(),
            total,
        }
    }

    /// Stores `data` at `index`. Returns `true` if the slot was previously empty.
    ///
    /// Empty data leaves the slot missing.
    pub fn write(&mut self, index: u32, data: String) -> Result<bool, TransferError> {
        if index >= self.total {
            return Err(TransferError::IndexOutOfRange {
                index,
                total: self.total,
            });
        }
        if data.is_empty() {
            self.slots.remove(&index);
            return Ok(false);
        }
        Ok(self.slots.insert(index, data).is_none())
    }

    /// Number of populated slots.
    #[inline]
    pub fn filled(&self) -> u32 {
        self.slots.len() as u32
    }

    /// Declared number of slots.
    #[inline]
    pub fn total(&self) -> u32 {
        self.total
    }

    /// Returns true once every slot is populated.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.filled() >= self.total
    }

    /// Lowest index not yet populated.
    pub fn first_missing(&self) -> Option<u32> {
        (0..self.total).find(|i| !self.slots.contains_key(i))
    }

    /// Collect indices of all empty slots.
    pub fn missing(&self) -> Vec<u32> {
        (0..self.total)
            .filter(|i| !self.slots.contains_key(i))
            .collect()
    }

    /// Decodes every slot in index order into the file bytes.
    pub fn reassemble(&self) -> Result<Vec<u8>, TransferError> {
        if let Some(index) = self.first_missing() {
            return Err(TransferError::MissingChunk(index));
        }
        let mut bytes = Vec::new();
        for (&index, data) in &self.slots {
            bytes.extend(codec::decode_chunk(index, data)?);
        }
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_filled_slots() {
        let mut slots = ChunkSlots::new(3);
        assert!(!slots.is_full());
        assert_eq!(slots.missing(), vec![0, 1, 2]);

        assert!(slots.write(1, "QQ==".into()).unwrap());
        assert_eq!(slots.filled(), 1);
        assert_eq!(slots.missing(), vec![0, 2]);

        assert!(slots.write(0, "QQ==".into()).unwrap());
        assert!(slots.write(2, "QQ==".into()).unwrap());
        assert!(slots.is_full());
        assert!(slots.missing().is_empty());
    }

    #[test]
    fn overwrite_does_not_double_count() {
        let mut slots = ChunkSlots::new(2);
        assert!(slots.write(0, "QQ==".into()).unwrap());
        assert!(!slots.write(0, "Qg==".into()).unwrap());
        assert_eq!(slots.filled(), 1);

        assert!(slots.write(1, "Qw==".into()).unwrap());
        // Last write wins.
        assert_eq!(slots.reassemble().unwrap(), b"BC");
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let mut slots = ChunkSlots::new(2);
        assert!(matches!(
            slots.write(2, "QQ==".into()),
            Err(TransferError::IndexOutOfRange { index: 2, total: 2 })
        ));
        assert_eq!(slots.filled(), 0);
    }

    #[test]
    fn empty_data_leaves_slot_missing() {
        let mut slots = ChunkSlots::new(1);
        assert!(!slots.write(0, String::new()).unwrap());
        assert_eq!(slots.filled(), 0);
        assert_eq!(slots.missing(), vec![0]);

        slots.write(0, "QQ==".into()).unwrap();
        slots.write(0, String::new()).unwrap();
        assert_eq!(slots.filled(), 0);
    }

    #[test]
    fn reassemble_with_hole_fails() {
        let mut slots = ChunkSlots::new(2);
        slots.write(1, "QQ==".into()).unwrap();
        assert!(matches!(
            slots.reassemble(),
            Err(TransferError::MissingChunk(0))
        ));
    }

    #[test]
    fn huge_declared_count_allocates_nothing_up_front() {
        let mut slots = ChunkSlots::new(u32::MAX);
        assert_eq!(slots.total(), u32::MAX);
        assert!(slots.write(u32::MAX - 1, "QQ==".into()).unwrap());
        assert_eq!(slots.filled(), 1);
        assert_eq!(slots.first_missing(), Some(0));
    }

    #[test]
    fn zero_slots_is_full() {
        let slots = ChunkSlots::new(0);
        assert!(slots.is_full());
        assert!(slots.reassemble().unwrap().is_empty());
    }
}
