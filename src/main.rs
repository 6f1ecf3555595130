//! Rental Ledger Engine CLI
//!
//! Offline reconciliation tool for the wallet ledger.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- pending.csv callbacks.csv > wallets.csv
//! cargo run -- --batch-size 2000 --max-concurrent 8 pending.csv callbacks.csv > wallets.csv
//! ```
//!
//! The program loads the pending deposit dump, replays the gateway
//! settlement export through the webhook processor, and writes the resulting
//! wallet statement to stdout. The run summary goes to the log on stderr;
//! set `RUST_LOG` to control verbosity.
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error (missing arguments, file not found, file not readable, etc.)

use rental_ledger_engine::cli;
use rental_ledger_engine::reconcile::Reconciler;
use std::process;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = cli::parse_args();
    let reconciler = Reconciler::new(args.to_reconcile_config());

    // Statement goes to stdout; logs and the summary stay on stderr
    let mut output = std::io::stdout();
    if let Err(e) = reconciler.run(&args.pending_file, &args.callbacks_file, &mut output) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
