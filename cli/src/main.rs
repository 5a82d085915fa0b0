//! ledgerscan CLI — inspect ingester databases.
//!
//! Usage:
//! ```bash
//! ledgerscan status ./ledgerscan.db
//! ledgerscan info
//! ```

use std::env;
use std::process;

use ledgerscan_core::chunker::CHUNK_SIZE;
use ledgerscan_core::checkpoint::BOOTSTRAP_LOOKBACK;
use ledgerscan_storage::sqlite::SqliteStore;

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    match args[1].as_str() {
        "info" => cmd_info(),
        "status" => {
            let Some(path) = args.get(2) else {
                eprintln!("status requires a database path");
                print_usage();
                process::exit(1);
            };
            if let Err(e) = cmd_status(path) {
                eprintln!("status failed: {e}");
                process::exit(1);
            }
        }
        "version" | "--version" | "-V" => {
            println!("ledgerscan {}", env!("CARGO_PKG_VERSION"));
        }
        "help" | "--help" | "-h" => print_usage(),
        other => {
            eprintln!("Unknown command: {other}");
            print_usage();
            process::exit(1);
        }
    }
}

fn print_usage() {
    println!("ledgerscan {}", env!("CARGO_PKG_VERSION"));
    println!("Chain event ingester for token transfers and quiz stakes\n");
    println!("USAGE:");
    println!("    ledgerscan <COMMAND>\n");
    println!("COMMANDS:");
    println!("    info             Show LedgerScan configuration info");
    println!("    status <db>      Summarize an ingester SQLite database");
    println!("    version          Print version");
    println!("    help             Print this help");
}

fn cmd_info() {
    println!("LedgerScan v{}", env!("CARGO_PKG_VERSION"));
    println!("  Default chunk size: {CHUNK_SIZE} blocks/call");
    println!("  Default poll interval: 30s");
    println!("  Bootstrap lookback: {BOOTSTRAP_LOOKBACK} blocks behind head");
    println!("  Event kinds: Token Transfer, Quiz Stake");
    println!("  Storage backends: memory, SQLite (feature: sqlite), Postgres (feature: postgres)");
}

fn cmd_status(path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let store = SqliteStore::open(path).await?;
        let stats = store.stats().await?;

        println!("Database: {path}");
        println!("  Records: {}", stats.total);
        println!("    Token Transfers: {}", stats.transfers);
        println!("    Quiz Stakes:     {}", stats.quiz_stakes);
        match stats.latest_block {
            Some(block) => println!("  Latest block: {block}"),
            None => println!("  Latest block: (empty)"),
        }
        println!("  Unique senders: {}", stats.unique_senders);

        for record in store.recent(5).await? {
            println!(
                "  {} block={} type={} value={}",
                record.tx_hash, record.block_number, record.tx_type, record.value
            );
        }
        Ok(())
    })
}
