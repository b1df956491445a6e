pub mod chain;
pub mod consensus;
pub mod constants;
pub mod error;
pub mod miner;
pub mod pool;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

pub use chain::LedgerChain;
pub use consensus::{ConsensusState, Coordinator, RoundState, SimConfig};
pub use error::SimError;
pub use pool::{BatchOutcome, TransactionPool};

/// One of the three simulated ledger participants.
///
/// The variant order is the canonical iteration order everywhere a
/// participant-order rule applies (candidate collection, tie-breaks).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Participant {
    A,
    B,
    C,
}

impl Participant {
    pub const ALL: [Participant; 3] = [Participant::A, Participant::B, Participant::C];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Participant::A => "A",
            Participant::B => "B",
            Participant::C => "C",
        }
    }

    pub fn from_symbol(s: &str) -> Option<Participant> {
        match s {
            "A" => Some(Participant::A),
            "B" => Some(Participant::B),
            "C" => Some(Participant::C),
            _ => None,
        }
    }
}

impl fmt::Display for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A transfer instruction between two participants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub from: Participant,
    pub to: Participant,
    pub amount: u64,
}

impl fmt::Display for Transfer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} : {}", self.from, self.to, self.amount)
    }
}

/// Parse a pool line of the form `"A -> B : 30"`.
///
/// Whitespace around the participant symbols and the amount is tolerated,
/// matching the pattern the pool text format accepts.
pub fn parse_transfer(line: &str) -> Result<Transfer, SimError> {
    let malformed = || SimError::MalformedTransaction(line.to_string());
    let (from_s, rest) = line.split_once("->").ok_or_else(malformed)?;
    let (to_s, amount_s) = rest.split_once(':').ok_or_else(malformed)?;
    let from = Participant::from_symbol(from_s.trim()).ok_or_else(malformed)?;
    let to = Participant::from_symbol(to_s.trim()).ok_or_else(malformed)?;
    let amount: u64 = amount_s.trim().parse().map_err(|_| malformed())?;
    Ok(Transfer { from, to, amount })
}

/// Per-participant committed balances. Mutated only after a full mining
/// round succeeds for all participants; never partially updated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balances([u64; 3]);

impl Balances {
    pub fn new(starting: u64) -> Self {
        Self([starting; 3])
    }

    pub fn get(&self, p: Participant) -> u64 {
        self.0[p.index()]
    }

    /// Sum over all participants. Transfers conserve this total.
    pub fn total(&self) -> u64 {
        self.0.iter().sum()
    }

    /// Apply a single transfer, debiting the sender first.
    pub fn apply(&mut self, t: &Transfer) -> Result<(), SimError> {
        let from = self
            .0[t.from.index()]
            .checked_sub(t.amount)
            .ok_or(SimError::InsufficientBalance(t.from))?;
        self.0[t.from.index()] = from;
        self.0[t.to.index()] += t.amount;
        Ok(())
    }
}

/// SHA-256 of the input's UTF-8 bytes, as a 64-char lowercase hex string.
pub fn digest(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

/// The hash preimage of a block: previous hash, payload, timestamp and the
/// decimal nonce, concatenated with no separators.
pub fn preimage(previous_hash: &str, payload: &str, timestamp: &str, nonce: u64) -> String {
    format!("{previous_hash}{payload}{timestamp}{nonce}")
}

pub(crate) fn timestamp_now() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_secs()
        .to_string()
}

/// One block of a participant's chain.
///
/// `invalid` is bookkeeping written by verification; it is not part of the
/// hash preimage and never affects the stored hash.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub previous_hash: String,
    pub payload: String,
    pub timestamp: String,
    pub nonce: u64,
    pub hash: String,
    #[serde(default)]
    pub invalid: bool,
}

impl Block {
    /// Recompute the digest from the block's own fields.
    pub fn compute_hash(&self) -> String {
        digest(&preimage(
            &self.previous_hash,
            &self.payload,
            &self.timestamp,
            self.nonce,
        ))
    }
}

pub mod pow {
    use super::{digest, preimage};

    /// A solved proof of work: the winning nonce and its digest.
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub struct Mined {
        pub nonce: u64,
        pub hash: String,
    }

    pub fn meets_difficulty(hash: &str, prefix: &str) -> bool {
        hash.starts_with(prefix)
    }

    /// Sequential minimal-nonce search: try nonce 0, 1, 2, ... and return
    /// the first digest carrying the difficulty prefix.
    ///
    /// The batched miner in [`crate::miner`] must agree with this function
    /// on every input; it is the brute-force reference.
    pub fn mine(previous_hash: &str, payload: &str, timestamp: &str, prefix: &str) -> Mined {
        let mut nonce = 0u64;
        loop {
            let hash = digest(&preimage(previous_hash, payload, timestamp, nonce));
            if meets_difficulty(&hash, prefix) {
                return Mined { nonce, hash };
            }
            nonce += 1;
        }
    }
}
