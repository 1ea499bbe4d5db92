//! Health probes for the relay's upstream daemons.
//!
//! Exit codes: `0` ok, `-1` configuration or connection failure, `-2` ledger
//! not caught up, `-3` block lag or count threshold violated, `-4` composition
//! failed.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use serde::Serialize;

use tx_relay::blockchain::BitcoinNode;
use tx_relay::config::{load_config, RelayConfig};
use tx_relay::ledger::{CounterpartyClient, SendParams, TransactionComposer};
use tx_relay::resilience::RetryPolicy;

const EXIT_OK: i32 = 0;
const EXIT_UNAVAILABLE: i32 = -1;
const EXIT_NOT_CAUGHT_UP: i32 = -2;
const EXIT_THRESHOLD: i32 = -3;
const EXIT_COMPOSE_FAILED: i32 = -4;

#[derive(Parser)]
#[command(name = "relay-monitor")]
#[command(about = "Probe the ledger and bitcoin daemons used by the relay", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "relay.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the ledger is caught up with bitcoin
    RunningInfo {
        /// Maximum tolerated distance between bitcoin and ledger tips
        #[arg(long, default_value_t = 1)]
        max_lag: u64,
    },
    /// Check the bitcoin node block height
    BlockCount {
        #[arg(long, default_value_t = 0)]
        min: u64,
    },
    /// Compose (but never sign) a send to prove the ledger can build transactions
    ComposeCheck {
        #[arg(long)]
        source: String,
        #[arg(long)]
        destination: String,
        #[arg(long)]
        asset: String,
        #[arg(long)]
        quantity: u64,
        #[arg(long)]
        pubkey: String,
    },
    /// Print the ledger balances of an address
    Balances { address: String },
    /// Print the node wallet balance
    NodeBalance,
    /// Ask the node wallet for a fresh receive address
    NewAddress,
}

#[derive(Serialize)]
struct Report<'a, T: Serialize> {
    check: &'a str,
    ok: bool,
    detail: T,
}

fn print_report<T: Serialize>(check: &str, ok: bool, detail: T) {
    let report = Report { check, ok, detail };
    match serde_json::to_string_pretty(&report) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("Failed to render report: {}", e),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {}: {}", cli.config.display(), e);
            process::exit(EXIT_UNAVAILABLE);
        }
    };

    process::exit(run(cli.command, &config).await);
}

async fn run(command: Commands, config: &RelayConfig) -> i32 {
    // Probes report the first failure rather than retrying through it
    let ledger = CounterpartyClient::new(&config.ledger, RetryPolicy::none());
    let node = BitcoinNode::new(&config.bitcoin, RetryPolicy::none());

    match command {
        Commands::RunningInfo { max_lag } => {
            let info = match ledger.get_running_info().await {
                Ok(info) => info,
                Err(e) => return unavailable("running-info", e),
            };
            if !info.db_caught_up {
                print_report("running-info", false, &info);
                return EXIT_NOT_CAUGHT_UP;
            }
            let lag = info.block_lag().unwrap_or(0);
            if lag > max_lag {
                print_report("running-info", false, serde_json::json!({ "lag": lag, "max_lag": max_lag }));
                return EXIT_THRESHOLD;
            }
            print_report("running-info", true, &info);
            EXIT_OK
        }
        Commands::BlockCount { min } => {
            let count = match node.get_block_count().await {
                Ok(count) => count,
                Err(e) => return unavailable("block-count", e),
            };
            let ok = count >= min;
            print_report("block-count", ok, serde_json::json!({ "count": count, "min": min }));
            if ok {
                EXIT_OK
            } else {
                EXIT_THRESHOLD
            }
        }
        Commands::ComposeCheck {
            source,
            destination,
            asset,
            quantity,
            pubkey,
        } => {
            let params = SendParams {
                source,
                destination,
                asset,
                quantity,
                pubkey,
            };
            match ledger.compose_send(&params).await {
                Ok(unsigned) => {
                    print_report("compose-check", true, serde_json::json!({ "bytes": unsigned.len() / 2 }));
                    EXIT_OK
                }
                Err(e) => {
                    print_report(
                        "compose-check",
                        false,
                        serde_json::json!({ "failure": e.failure().as_str(), "error": e.to_string() }),
                    );
                    EXIT_COMPOSE_FAILED
                }
            }
        }
        Commands::Balances { address } => match ledger.get_balances(&address).await {
            Ok(balances) => {
                print_report("balances", true, balances);
                EXIT_OK
            }
            Err(e) => unavailable("balances", e),
        },
        Commands::NodeBalance => match node.get_balance().await {
            Ok(amount) => {
                print_report("node-balance", true, serde_json::json!({ "satoshis": amount.to_sat() }));
                EXIT_OK
            }
            Err(e) => unavailable("node-balance", e),
        },
        Commands::NewAddress => match node.get_new_address().await {
            Ok(address) => {
                print_report("new-address", true, address);
                EXIT_OK
            }
            Err(e) => unavailable("new-address", e),
        },
    }
}

fn unavailable(check: &str, error: impl std::fmt::Display) -> i32 {
    print_report(check, false, error.to_string());
    EXIT_UNAVAILABLE
}
