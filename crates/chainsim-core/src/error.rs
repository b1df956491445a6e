use crate::Participant;
use thiserror::Error;

/// Errors surfaced to the caller. Hash and linkage mismatches discovered by
/// verification are never raised through this enum; they are recorded as
/// per-block `invalid` flags and healed by reconciliation.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SimError {
    #[error("amount must be a positive integer")]
    InvalidAmount,

    #[error("insufficient balance for {0}")]
    InsufficientBalance(Participant),

    #[error("malformed transaction: {0:?}")]
    MalformedTransaction(String),

    #[error("transaction pool is empty")]
    EmptyPool,

    #[error("block {index} does not link to the chain tip")]
    ChainLinkage { index: u64 },

    #[error("mining round superseded")]
    RoundSuperseded,
}
