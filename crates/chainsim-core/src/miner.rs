use crate::pow::{meets_difficulty, Mined};
use crate::{digest, preimage};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Abort handle for an in-flight mining search.
///
/// Cancellation is ignore-on-completion: the search observes the flag at
/// batch boundaries and returns `None`, it is never interrupted mid-hash.
/// A round that starts while an older one is still mining cancels the old
/// token so the stale result can never be applied.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Batched nonce search over `digest(prev ‖ payload ‖ timestamp ‖ nonce)`.
///
/// Each batch of `batch` consecutive nonces is hashed in parallel, then the
/// results are scanned in nonce order, so the returned nonce is the minimal
/// satisfying one regardless of batch size. Yields to the scheduler between
/// batches; returns `None` if the token was cancelled.
pub async fn mine(
    previous_hash: &str,
    payload: &str,
    timestamp: &str,
    prefix: &str,
    batch: u64,
    cancel: &CancelToken,
) -> Option<Mined> {
    debug_assert!(batch > 0);
    let mut nonce = 0u64;
    loop {
        if cancel.is_cancelled() {
            debug!(nonce, "mining cancelled, discarding search");
            return None;
        }
        let hashes: Vec<String> = (nonce..nonce + batch)
            .into_par_iter()
            .map(|n| digest(&preimage(previous_hash, payload, timestamp, n)))
            .collect();
        for (i, hash) in hashes.iter().enumerate() {
            if meets_difficulty(hash, prefix) {
                let nonce = nonce + i as u64;
                info!(nonce, %hash, "mined block");
                return Some(Mined {
                    nonce,
                    hash: hash.clone(),
                });
            }
        }
        nonce += batch;
        tokio::task::yield_now().await;
    }
}
