//! powledger command-line front end.
//!
//! Creates a chain, queries balances, sends value between addresses and
//! prints the chain from tip to genesis.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use powledger::utils::{format_hash, format_opt_hash, init_logging};
use powledger::{Block, Blockchain, Config, PersistentStorage, Transaction};
use serde::Serialize;
use std::path::PathBuf;
use tracing::debug;

#[derive(Parser)]
#[command(version, about = "Proof-of-work ledger on an embedded database")]
struct Args {
    /// JSON configuration file; `LEDGER_*` environment variables still apply on top.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Database directory, overriding the configured one.
    #[arg(long)]
    db_path: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a blockchain and send the genesis block reward to ADDRESS
    #[command(name = "createblockchain")]
    CreateBlockchain {
        #[arg(long)]
        address: String,
    },
    /// Get the balance of ADDRESS
    #[command(name = "getbalance")]
    GetBalance {
        #[arg(long)]
        address: String,
    },
    /// Send AMOUNT from FROM to TO and mine the transfer into a block
    Send {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        amount: u64,
    },
    /// Print every block from tip to genesis
    #[command(name = "printchain")]
    PrintChain {
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

#[derive(Serialize)]
struct BlockView {
    hash: String,
    prev_hash: String,
    nonce: u64,
    pow: bool,
    transactions: Vec<TransactionView>,
}

#[derive(Serialize)]
struct TransactionView {
    id: String,
    coinbase: bool,
    inputs: Vec<InputView>,
    outputs: Vec<OutputView>,
}

#[derive(Serialize)]
struct InputView {
    source_tx: String,
    output_index: i64,
    unlock_token: String,
}

#[derive(Serialize)]
struct OutputView {
    value: u64,
    lock_token: String,
}

impl BlockView {
    fn new(block: &Block, pow: bool) -> Self {
        Self {
            hash: block.hash.to_hex(),
            prev_hash: format_opt_hash(block.prev_hash.as_ref()),
            nonce: block.nonce,
            pow,
            transactions: block.transactions.iter().map(TransactionView::new).collect(),
        }
    }
}

impl TransactionView {
    fn new(tx: &Transaction) -> Self {
        Self {
            id: tx.id.to_hex(),
            coinbase: tx.is_coinbase(),
            inputs: tx
                .inputs
                .iter()
                .map(|input| InputView {
                    source_tx: format_opt_hash(input.source_tx.as_ref()),
                    output_index: input.output_index,
                    unlock_token: input.unlock_token.clone(),
                })
                .collect(),
            outputs: tx
                .outputs
                .iter()
                .map(|output| OutputView {
                    value: output.value,
                    lock_token: output.lock_token.clone(),
                })
                .collect(),
        }
    }
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    if let Some(db_path) = &args.db_path {
        config.storage.db_path = db_path.clone();
    }
    Ok(config)
}

fn open_storage(config: &Config) -> Result<PersistentStorage> {
    let path = &config.storage.db_path;
    PersistentStorage::new(path)
        .with_context(|| format!("failed to open database at {}", path.display()))
}

fn resume(config: &Config) -> Result<Blockchain<PersistentStorage>> {
    let path = &config.storage.db_path;
    let storage = PersistentStorage::open_existing(path)
        .context("no blockchain found, create one first")?;
    Blockchain::resume(storage, &config.ledger).context("no blockchain found, create one first")
}

fn print_chain(chain: &Blockchain<PersistentStorage>, json: bool) -> Result<()> {
    let mut views = Vec::new();
    for block in chain.iter()? {
        let block = block?;
        let view = BlockView::new(&block, chain.validate_block(&block));
        if json {
            views.push(view);
            continue;
        }

        println!("Previous hash: {}", view.prev_hash);
        println!("Hash: {}", format_hash(&block.hash, false));
        println!("Nonce: {}", view.nonce);
        for tx in &view.transactions {
            println!("  Transaction {}", tx.id);
            for input in &tx.inputs {
                println!(
                    "    Input  {}:{} ({})",
                    input.source_tx, input.output_index, input.unlock_token
                );
            }
            for output in &tx.outputs {
                println!("    Output {} -> {}", output.value, output.lock_token);
            }
        }
        println!("PoW: {}", view.pow);
        println!();
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&views)?);
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;
    init_logging(&config.logging);
    debug!(?config, "loaded configuration");

    match args.command {
        Command::CreateBlockchain { address } => {
            let storage = open_storage(&config)?;
            let chain = Blockchain::create(storage, &address, &config.ledger)?;
            println!("Genesis block {}", chain.tip()?);
            println!("Finished!");
        }
        Command::GetBalance { address } => {
            let chain = resume(&config)?;
            let balance = chain.balance(&address)?;
            println!("Balance of {} is {}", address, balance);
        }
        Command::Send { from, to, amount } => {
            let chain = resume(&config)?;
            let tx = Transaction::transfer(&from, &to, amount, &chain)?;
            let block = chain.append(vec![tx])?;
            println!("Block {}", block.hash);
            println!("Success!");
        }
        Command::PrintChain { json } => {
            let chain = resume(&config)?;
            print_chain(&chain, json)?;
        }
    }

    Ok(())
}
