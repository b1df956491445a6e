/// Genesis sentinel previous-hash: 64 zero characters.
pub const ZERO_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Difficulty prefix for consensus-chain mining.
pub const DIFFICULTY: &str = "000";
/// Difficulty prefix for the standalone single-block mining demo.
pub const DEMO_DIFFICULTY: &str = "0000";

/// Nonces hashed per batch before checking results.
pub const BASE_BATCH: u64 = 1000;
/// Round mining uses BASE_BATCH * BATCH_MULTIPLIER nonces per batch.
pub const BATCH_MULTIPLIER: u64 = 50;

pub const STARTING_BALANCE: u64 = 100;
pub const GENESIS_PAYLOAD: &str = "Genesis Block: 100 coins";
