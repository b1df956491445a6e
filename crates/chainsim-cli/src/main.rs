use anyhow::{anyhow, bail, Context, Result};
use chainsim_core::constants::{BASE_BATCH, DEMO_DIFFICULTY, DIFFICULTY, ZERO_HASH};
use chainsim_core::miner::{self, CancelToken};
use chainsim_core::{digest, parse_transfer, Coordinator, Participant, SimConfig};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "chainsim")]
#[command(about = "Blockchain mechanics simulator: hashing, proof of work, multi-party consensus")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Hash a piece of text and show its leading-zero count
    Hash {
        /// Text to digest
        text: String,
    },
    /// Mine a single demo block over the given payload
    Mine {
        /// Block payload
        payload: String,
        /// Previous block hash
        #[arg(long, default_value = ZERO_HASH)]
        prev: String,
        /// Required hash prefix
        #[arg(long, default_value = DEMO_DIFFICULTY)]
        difficulty: String,
        /// Nonces hashed per batch
        #[arg(long, default_value_t = BASE_BATCH)]
        batch: u64,
    },
    /// Run a consensus scenario: genesis, transfers, a mining round,
    /// optional tampering, verification and majority reconciliation
    Demo {
        /// Transfer to queue, e.g. "A -> B : 30" (repeatable)
        #[arg(long = "tx")]
        transfers: Vec<String>,
        /// Tamper with a committed block: <PARTICIPANT>:<INDEX>:<PAYLOAD>
        #[arg(long)]
        tamper: Option<String>,
        /// Required hash prefix for consensus mining
        #[arg(long, default_value = DIFFICULTY)]
        difficulty: String,
        /// Dump the final state as JSON instead of tables
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Hash { text } => {
            let hash = digest(&text);
            let zeros = hash.chars().take_while(|c| *c == '0').count();
            println!("sha256 : {hash}");
            println!("leading zero hex digits: {zeros}");
        }
        Command::Mine {
            payload,
            prev,
            difficulty,
            batch,
        } => {
            let timestamp = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)?
                .as_secs()
                .to_string();
            let start = std::time::Instant::now();
            let mined = miner::mine(&prev, &payload, &timestamp, &difficulty, batch, &CancelToken::new())
                .await
                .ok_or_else(|| anyhow!("mining cancelled"))?;
            println!("nonce : {}", mined.nonce);
            println!("hash  : {}", mined.hash);
            println!("took  : {:.3}s", start.elapsed().as_secs_f64());
        }
        Command::Demo {
            transfers,
            tamper,
            difficulty,
            json,
        } => {
            let config = SimConfig {
                difficulty,
                ..SimConfig::default()
            };
            let mut coordinator = Coordinator::new(config);

            for line in &transfers {
                let t = parse_transfer(line)?;
                coordinator
                    .submit_transfer(t.from, t.to, t.amount)
                    .with_context(|| format!("submitting {line:?}"))?;
            }
            if !transfers.is_empty() {
                coordinator.mine_round().await.context("mining round")?;
            }

            if let Some(spec) = &tamper {
                let (p, index, payload) = parse_tamper(spec)?;
                if !coordinator.edit_payload(p, index, payload) {
                    bail!("no block at index {index} on chain {p}");
                }
                println!("tampered chain {p} block {index}");
            }

            coordinator.verify_all();
            print_validity("after verify", &coordinator);
            coordinator.reconcile();
            coordinator.verify_all();
            print_validity("after reconcile", &coordinator);

            if json {
                println!("{}", serde_json::to_string_pretty(coordinator.state())?);
            } else {
                print_state(&coordinator);
            }
        }
    }
    Ok(())
}

fn parse_tamper(spec: &str) -> Result<(Participant, usize, &str)> {
    let mut parts = spec.splitn(3, ':');
    let (Some(p), Some(index), Some(payload)) = (parts.next(), parts.next(), parts.next()) else {
        bail!("tamper spec must be <PARTICIPANT>:<INDEX>:<PAYLOAD>");
    };
    let p = Participant::from_symbol(p).ok_or_else(|| anyhow!("unknown participant {p:?}"))?;
    let index: usize = index.parse().context("tamper index")?;
    Ok((p, index, payload))
}

fn print_validity(label: &str, coordinator: &Coordinator) {
    for p in Participant::ALL {
        let flags: Vec<String> = coordinator
            .state()
            .chain(p)
            .blocks()
            .iter()
            .map(|b| format!("#{} {}", b.index, if b.invalid { "INVALID" } else { "ok" }))
            .collect();
        println!("{label} chain {p}: {}", flags.join(", "));
    }
}

fn print_state(coordinator: &Coordinator) {
    println!("balances:");
    for p in Participant::ALL {
        println!("  {p}: {}", coordinator.state().balances().get(p));
    }
    for p in Participant::ALL {
        println!("chain {p}:");
        for b in coordinator.state().chain(p).blocks() {
            println!(
                "  #{} nonce={} hash={}... prev={}... payload={:?}",
                b.index,
                b.nonce,
                &b.hash[..16.min(b.hash.len())],
                &b.previous_hash[..16.min(b.previous_hash.len())],
                b.payload
            );
        }
    }
}
