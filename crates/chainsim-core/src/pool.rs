use crate::{parse_transfer, Balances, Participant, SimError};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Result of committing the pending pool against a balance snapshot: the
/// replayed balances and the single payload text for the round's block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchOutcome {
    pub balances: Balances,
    pub payload: String,
}

/// Shared queue of pending transfer lines in the text format
/// `"<FROM> -> <TO> : <AMOUNT>"`.
///
/// Submission checks the committed balances only; nothing is debited until
/// a round commits, so concurrent pending transfers are re-validated
/// together in [`TransactionPool::commit_batch`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionPool {
    pending: Vec<String>,
}

impl TransactionPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> &[String] {
        &self.pending
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Queue a transfer after checking the amount and the sender's current
    /// committed balance. The balance is not debited here.
    pub fn submit(
        &mut self,
        from: Participant,
        to: Participant,
        amount: u64,
        balances: &Balances,
    ) -> Result<(), SimError> {
        if amount == 0 {
            return Err(SimError::InvalidAmount);
        }
        if balances.get(from) < amount {
            return Err(SimError::InsufficientBalance(from));
        }
        let line = format!("{from} -> {to} : {amount}");
        debug!(%line, "transfer queued");
        self.pending.push(line);
        Ok(())
    }

    /// Queue raw pool text without validation, as if the mempool had been
    /// edited by hand. Malformed text surfaces at commit time.
    pub fn submit_line(&mut self, line: impl Into<String>) {
        self.pending.push(line.into());
    }

    /// Replay every pending line from scratch against `balances`.
    ///
    /// All-or-nothing: the first malformed line or shortfall fails the
    /// whole batch and nothing is applied — the pool and the caller's
    /// balances are left untouched. On success the concatenated payload
    /// and the updated balances are returned; the caller clears the pool
    /// only after the round fully commits.
    pub fn commit_batch(&self, balances: &Balances) -> Result<BatchOutcome, SimError> {
        if self.pending.is_empty() {
            return Err(SimError::EmptyPool);
        }
        let mut next = balances.clone();
        for line in &self.pending {
            let transfer = parse_transfer(line)?;
            next.apply(&transfer)?;
        }
        Ok(BatchOutcome {
            balances: next,
            payload: self.pending.join(" | "),
        })
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
