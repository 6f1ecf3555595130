use crate::reconcile::ReconcileConfig;
use clap::Parser;
use std::path::PathBuf;

/// Replay gateway settlement callbacks against a pending deposit dump
#[derive(Parser, Debug)]
#[command(name = "rental-ledger-engine")]
#[command(about = "Reconcile pending wallet deposits against a gateway settlement export", long_about = None)]
pub struct CliArgs {
    /// Pending deposit dump (CSV: user, order_code, amount)
    #[arg(value_name = "PENDING", help = "Path to the pending deposit dump CSV")]
    pub pending_file: PathBuf,

    /// Gateway settlement export (CSV: order_code, amount, status)
    #[arg(value_name = "CALLBACKS", help = "Path to the gateway settlement export CSV")]
    pub callbacks_file: PathBuf,

    /// Number of callbacks per replay batch
    #[arg(
        long = "batch-size",
        value_name = "SIZE",
        help = "Number of callbacks per batch (default: 1000)"
    )]
    pub batch_size: Option<usize>,

    /// Worker threads for the replay runtime
    #[arg(
        long = "max-concurrent",
        value_name = "COUNT",
        help = "Maximum number of order codes replaying concurrently (default: CPU cores)"
    )]
    pub max_concurrent_batches: Option<usize>,
}

impl CliArgs {
    /// Create a ReconcileConfig from CLI arguments
    ///
    /// Uses the provided values where given and falls back to the defaults
    /// otherwise; zero values are corrected by [`ReconcileConfig::new`].
    pub fn to_reconcile_config(&self) -> ReconcileConfig {
        if self.batch_size.is_some() || self.max_concurrent_batches.is_some() {
            let default = ReconcileConfig::default();
            ReconcileConfig::new(
                self.batch_size.unwrap_or(default.batch_size),
                self.max_concurrent_batches
                    .unwrap_or(default.max_concurrent_batches),
            )
        } else {
            ReconcileConfig::default()
        }
    }
}
