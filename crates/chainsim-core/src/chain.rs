use crate::constants::ZERO_HASH;
use crate::pow::meets_difficulty;
use crate::{Block, SimError};
use serde::{Deserialize, Serialize};

/// One participant's ordered, append-only sequence of blocks.
///
/// Chains never shrink and are never reordered; consensus reconciliation
/// replaces blocks in place, it never removes them.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerChain {
    blocks: Vec<Block>,
}

impl LedgerChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn get(&self, index: usize) -> Option<&Block> {
        self.blocks.get(index)
    }

    /// Hash the next block must link to: the tail's hash, or the zero
    /// sentinel for an empty chain.
    pub fn tail_hash(&self) -> &str {
        self.blocks.last().map_or(ZERO_HASH, |b| b.hash.as_str())
    }

    /// Append a mined block. The block must link to the current tail and
    /// carry the next index.
    pub fn append(&mut self, block: Block) -> Result<(), SimError> {
        if block.previous_hash != self.tail_hash() || block.index != self.blocks.len() as u64 {
            return Err(SimError::ChainLinkage { index: block.index });
        }
        self.blocks.push(block);
        Ok(())
    }

    /// Overwrite the block at `index` wholesale, preserving its position.
    ///
    /// Used only by consensus reconciliation. The incoming block's
    /// `invalid` flag is cleared and the immediate successor's
    /// `previous_hash` is repaired to the new hash. The successor is NOT
    /// rehashed; a later verify pass surfaces any remaining mismatch.
    pub fn replace_at(&mut self, index: usize, mut block: Block) {
        block.index = index as u64;
        block.invalid = false;
        self.blocks[index] = block;
        if index + 1 < self.blocks.len() {
            self.blocks[index + 1].previous_hash = self.blocks[index].hash.clone();
        }
    }

    /// Point the block at `index` back at its current predecessor's stored
    /// hash, without rehashing. No-op at index 0 or past the tail.
    pub fn relink_at(&mut self, index: usize) {
        if index == 0 || index >= self.blocks.len() {
            return;
        }
        let prev = self.blocks[index - 1].hash.clone();
        self.blocks[index].previous_hash = prev;
    }

    /// The simulated tamper: rewrite a committed block's payload text
    /// without remining. Returns false if the index is out of range.
    pub fn edit_payload(&mut self, index: usize, payload: &str) -> bool {
        match self.blocks.get_mut(index) {
            Some(block) => {
                block.payload = payload.to_string();
                true
            }
            None => false,
        }
    }

    /// Check every block (genesis included) against the validity invariant:
    /// stored hash equals the recomputed digest, the hash carries the
    /// difficulty prefix, and `previous_hash` matches the predecessor's
    /// stored hash (the zero sentinel at index 0).
    ///
    /// Sets each block's `invalid` flag and returns `(index, is_valid)`
    /// per block. Mutates only the flags, never the hashes; running it
    /// twice without other mutation yields identical results.
    pub fn verify(&mut self, prefix: &str) -> Vec<(u64, bool)> {
        let mut report = Vec::with_capacity(self.blocks.len());
        for i in 0..self.blocks.len() {
            let expected_prev = if i == 0 {
                ZERO_HASH.to_string()
            } else {
                self.blocks[i - 1].hash.clone()
            };
            let block = &mut self.blocks[i];
            let is_valid = block.compute_hash() == block.hash
                && meets_difficulty(&block.hash, prefix)
                && block.previous_hash == expected_prev;
            block.invalid = !is_valid;
            report.push((block.index, is_valid));
        }
        report
    }
}
