use crate::constants::{
    BASE_BATCH, BATCH_MULTIPLIER, DIFFICULTY, GENESIS_PAYLOAD, STARTING_BALANCE, ZERO_HASH,
};
use crate::miner::{self, CancelToken};
use crate::{pow, timestamp_now, Balances, Block, LedgerChain, Participant, SimError, TransactionPool};
use serde::Serialize;
use tracing::{info, warn};

/// Tunable knobs for a simulation, defaulted from [`crate::constants`].
#[derive(Clone, Debug)]
pub struct SimConfig {
    pub difficulty: String,
    pub base_batch: u64,
    pub batch_multiplier: u64,
    pub starting_balance: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            difficulty: DIFFICULTY.to_string(),
            base_batch: BASE_BATCH,
            batch_multiplier: BATCH_MULTIPLIER,
            starting_balance: STARTING_BALANCE,
        }
    }
}

impl SimConfig {
    /// Nonces hashed per round-mining batch. A throughput knob, not a
    /// correctness constant.
    pub fn round_batch(&self) -> u64 {
        self.base_batch * self.batch_multiplier
    }
}

/// Lifecycle of the most recent mining round.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum RoundState {
    #[default]
    Idle,
    Mining,
    Committed,
    Aborted,
}

/// The shared mutable state of the simulation: one chain per participant
/// over a single pool and balance map. All mutation goes through
/// [`Coordinator`] commands.
#[derive(Clone, Debug, Serialize)]
pub struct ConsensusState {
    chains: [LedgerChain; 3],
    balances: Balances,
    pool: TransactionPool,
}

impl ConsensusState {
    /// Build the initial state: every participant starts from an identical
    /// mined genesis block and the configured starting balance.
    fn with_genesis(config: &SimConfig) -> Self {
        let timestamp = timestamp_now();
        let mined = pow::mine(ZERO_HASH, GENESIS_PAYLOAD, &timestamp, &config.difficulty);
        info!(nonce = mined.nonce, hash = %mined.hash, "mined genesis block");
        let genesis = Block {
            index: 0,
            previous_hash: ZERO_HASH.to_string(),
            payload: GENESIS_PAYLOAD.to_string(),
            timestamp,
            nonce: mined.nonce,
            hash: mined.hash,
            invalid: false,
        };
        let chains = std::array::from_fn(|_| {
            let mut chain = LedgerChain::new();
            chain
                .append(genesis.clone())
                .expect("genesis links to the zero sentinel");
            chain
        });
        Self {
            chains,
            balances: Balances::new(config.starting_balance),
            pool: TransactionPool::new(),
        }
    }

    pub fn chain(&self, p: Participant) -> &LedgerChain {
        &self.chains[p.index()]
    }

    pub fn balances(&self) -> &Balances {
        &self.balances
    }

    pub fn pool(&self) -> &TransactionPool {
        &self.pool
    }
}

/// Orchestrates mining rounds, verification and majority reconciliation
/// over the three participant chains.
#[derive(Debug)]
pub struct Coordinator {
    state: ConsensusState,
    config: SimConfig,
    round: RoundState,
    cancel: Option<CancelToken>,
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new(SimConfig::default())
    }
}

impl Coordinator {
    pub fn new(config: SimConfig) -> Self {
        Self {
            state: ConsensusState::with_genesis(&config),
            config,
            round: RoundState::Idle,
            cancel: None,
        }
    }

    pub fn state(&self) -> &ConsensusState {
        &self.state
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn round(&self) -> RoundState {
        self.round
    }

    /// Queue a transfer against the current committed balances.
    pub fn submit_transfer(
        &mut self,
        from: Participant,
        to: Participant,
        amount: u64,
    ) -> Result<(), SimError> {
        self.state.pool.submit(from, to, amount, &self.state.balances)
    }

    /// Queue raw pool text, bypassing validation (a hand-edited mempool).
    pub fn submit_raw_line(&mut self, line: impl Into<String>) {
        self.state.pool.submit_line(line);
    }

    /// The simulated tamper: edit a committed block's payload in place on
    /// one participant's chain, without remining.
    pub fn edit_payload(&mut self, p: Participant, index: usize, payload: &str) -> bool {
        self.state.chains[p.index()].edit_payload(index, payload)
    }

    /// Mine one round: commit the pending batch, then mine the same
    /// payload and timestamp for all three chains concurrently, each
    /// against its own tail hash.
    ///
    /// Atomic across chains: no block is appended and no balance moves
    /// unless every participant's mine succeeds. Starting a new round
    /// cancels any still-pending older search; a superseded round aborts
    /// and applies nothing.
    pub async fn mine_round(&mut self) -> Result<(), SimError> {
        self.round = RoundState::Mining;
        let outcome = match self.state.pool.commit_batch(&self.state.balances) {
            Ok(outcome) => outcome,
            Err(e) => {
                self.round = RoundState::Aborted;
                warn!(error = %e, "round aborted before mining");
                return Err(e);
            }
        };

        if let Some(stale) = self.cancel.take() {
            stale.cancel();
        }
        let token = CancelToken::new();
        self.cancel = Some(token.clone());

        let timestamp = timestamp_now();
        let batch = self.config.round_batch();
        let prefix = self.config.difficulty.as_str();
        let tails: [String; 3] =
            std::array::from_fn(|i| self.state.chains[i].tail_hash().to_string());

        let (a, b, c) = tokio::join!(
            miner::mine(&tails[0], &outcome.payload, &timestamp, prefix, batch, &token),
            miner::mine(&tails[1], &outcome.payload, &timestamp, prefix, batch, &token),
            miner::mine(&tails[2], &outcome.payload, &timestamp, prefix, batch, &token),
        );
        let seals = match (a, b, c) {
            (Some(a), Some(b), Some(c)) => [a, b, c],
            _ => {
                self.round = RoundState::Aborted;
                warn!("round superseded, discarding partial mining results");
                return Err(SimError::RoundSuperseded);
            }
        };

        for (p, seal) in Participant::ALL.into_iter().zip(seals) {
            let chain = &mut self.state.chains[p.index()];
            let block = Block {
                index: chain.len() as u64,
                previous_hash: tails[p.index()].clone(),
                payload: outcome.payload.clone(),
                timestamp: timestamp.clone(),
                nonce: seal.nonce,
                hash: seal.hash,
                invalid: false,
            };
            chain.append(block)?;
        }
        self.state.balances = outcome.balances;
        self.state.pool.clear();
        self.round = RoundState::Committed;
        info!(payload = %outcome.payload, "round committed on all chains");
        Ok(())
    }

    /// Run integrity verification on every chain. Side effects are limited
    /// to the per-block `invalid` flags.
    pub fn verify_all(&mut self) -> [Vec<(u64, bool)>; 3] {
        let prefix = self.config.difficulty.clone();
        std::array::from_fn(|i| self.state.chains[i].verify(&prefix))
    }

    /// Majority reconciliation over the `invalid` flags left by the last
    /// verification pass.
    ///
    /// Per index: candidates are the non-invalid blocks across chains in
    /// participant order; with no candidates the index is skipped and the
    /// divergence persists. The majority is the most frequent
    /// `(hash, payload)` pair, ties going to the first-encountered
    /// candidate. Invalid blocks are overwritten with a copy of the
    /// majority block, then every chain's block at the index is relinked
    /// to its own predecessor's stored hash. Nothing is rehashed, so a
    /// relinked successor can stay hash-inconsistent until the next
    /// verification pass.
    pub fn reconcile(&mut self) {
        let chains = &mut self.state.chains;
        let max_len = chains.iter().map(|c| c.len()).max().unwrap_or(0);
        for i in 0..max_len {
            let mut tally: Vec<((String, String), usize)> = Vec::new();
            for chain in chains.iter() {
                let Some(block) = chain.get(i).filter(|b| !b.invalid) else {
                    continue;
                };
                let key = (block.hash.clone(), block.payload.clone());
                match tally.iter_mut().find(|(k, _)| *k == key) {
                    Some((_, count)) => *count += 1,
                    None => tally.push((key, 1)),
                }
            }
            if tally.is_empty() {
                continue;
            }
            // strictly-greater keeps the first-encountered pair on ties
            let mut majority_key = &tally[0].0;
            let mut majority_count = tally[0].1;
            for (key, count) in &tally[1..] {
                if *count > majority_count {
                    majority_key = key;
                    majority_count = *count;
                }
            }
            let majority = chains
                .iter()
                .find_map(|c| {
                    c.get(i)
                        .filter(|b| !b.invalid && b.hash == majority_key.0 && b.payload == majority_key.1)
                })
                .cloned()
                .expect("majority key was tallied from a live candidate");

            for (p, chain) in Participant::ALL.into_iter().zip(chains.iter_mut()) {
                if chain.get(i).is_some_and(|b| b.invalid) {
                    info!(participant = %p, index = i, "overwriting invalid block with majority");
                    chain.replace_at(i, majority.clone());
                }
                chain.relink_at(i);
            }
        }
    }
}
