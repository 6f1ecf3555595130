//! Offline replay of gateway settlement callbacks
//!
//! The manual reconciliation job: when webhooks were missed or a settlement
//! export needs to be re-applied, this module loads a dump of pending deposit
//! ledger entries and a gateway settlement file of callbacks (both CSV),
//! replays the callbacks through the [`PaymentWebhookProcessor`], and writes
//! a wallet statement CSV.
//!
//! # Order-code partitioning
//!
//! Batches are replayed sequentially, and within a batch callbacks are
//! partitioned by order code: different codes run concurrently on the tokio
//! runtime while callbacks for the same code stay in file order. Combined
//! with the processor's idempotency boundary this makes the replay safe to
//! run against an export containing duplicates, unknown codes, or a mix of
//! success and failure rows.
//!
//! # Architecture
//!
//! ```text
//! Reconciler
//!     ├── ReconcileConfig   (batch_size, max_concurrent_batches)
//!     ├── PendingReader     (pending deposit dump, streamed)
//!     ├── CallbackReader    (settlement export, streamed in batches)
//!     └── CallbackReplayer  (order-code partitioning + tokio tasks)
//!         └── PaymentWebhookProcessor
//! ```

use crate::config::EngineConfig;
use crate::core::ledger_store::LedgerStore;
use crate::core::wallet_ledger::WalletLedger;
use crate::core::webhook::{GatewayCallback, PaymentWebhookProcessor, WebhookOutcome};
use crate::io::csv_format::write_wallets_csv;
use crate::io::reader::{CallbackReader, PendingReader};
use crate::types::{EngineError, ErrorKind};
use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Configuration for the callback replay
#[derive(Clone, Debug)]
pub struct ReconcileConfig {
    /// Number of callbacks per batch
    pub batch_size: usize,
    /// Worker threads for the replay runtime
    pub max_concurrent_batches: usize,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            max_concurrent_batches: num_cpus::get(),
        }
    }
}

impl ReconcileConfig {
    /// Create a config with custom values
    ///
    /// Zero values fall back to the defaults with a logged warning.
    pub fn new(batch_size: usize, max_concurrent_batches: usize) -> Self {
        let default = Self::default();

        let batch_size = if batch_size == 0 {
            warn!(
                fallback = default.batch_size,
                "invalid batch_size 0, using default"
            );
            default.batch_size
        } else {
            batch_size
        };

        let max_concurrent_batches = if max_concurrent_batches == 0 {
            warn!(
                fallback = default.max_concurrent_batches,
                "invalid max_concurrent_batches 0, using default"
            );
            default.max_concurrent_batches
        } else {
            max_concurrent_batches
        };

        Self {
            batch_size,
            max_concurrent_batches,
        }
    }
}

/// Tally of one reconciliation run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    /// Pending deposits loaded into the ledger
    pub pending_imported: usize,
    /// Pending rows whose order code was already registered
    pub import_conflicts: usize,
    /// Input rows that failed to parse or validate
    pub malformed_rows: usize,
    /// Callbacks that credited a wallet
    pub credited: usize,
    /// Callbacks that marked a deposit failed
    pub marked_failed: usize,
    /// Duplicate deliveries ignored by the idempotency boundary
    pub duplicates: usize,
    /// Callbacks whose order code matched no ledger entry
    pub unknown: usize,
    /// Callbacks that failed with an internal error
    pub errors: usize,
}

impl ReconcileSummary {
    fn record(&mut self, result: &Result<WebhookOutcome, EngineError>) {
        match result {
            Ok(WebhookOutcome::Credited(_)) => self.credited += 1,
            Ok(WebhookOutcome::MarkedFailed(_)) => self.marked_failed += 1,
            Ok(WebhookOutcome::Duplicate) => self.duplicates += 1,
            Ok(WebhookOutcome::Unknown) => self.unknown += 1,
            Err(_) => self.errors += 1,
        }
    }
}

impl fmt::Display for ReconcileSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "imported {} pending deposits ({} duplicate codes, {} malformed rows); \
             callbacks: {} credited, {} marked failed, {} duplicates, {} unknown, {} errors",
            self.pending_imported,
            self.import_conflicts,
            self.malformed_rows,
            self.credited,
            self.marked_failed,
            self.duplicates,
            self.unknown,
            self.errors
        )
    }
}

/// Replays callback batches with order-code partitioning
///
/// Cloneable and shared across tokio tasks; all state lives in the webhook
/// processor's stores.
#[derive(Debug, Clone)]
pub struct CallbackReplayer {
    processor: PaymentWebhookProcessor,
}

impl CallbackReplayer {
    /// Create a replayer over the given webhook processor
    pub fn new(processor: PaymentWebhookProcessor) -> Self {
        Self { processor }
    }

    /// Partition a batch of callbacks by order code
    ///
    /// Each callback lands in exactly one sub-batch, and callbacks for one
    /// code keep their original order. Sub-batches can then replay
    /// concurrently without reordering any single code's deliveries.
    pub fn partition_by_code(
        &self,
        batch: Vec<GatewayCallback>,
    ) -> HashMap<String, Vec<GatewayCallback>> {
        let mut code_batches: HashMap<String, Vec<GatewayCallback>> = HashMap::new();

        for callback in batch {
            code_batches
                .entry(callback.order_code.clone())
                .or_default()
                .push(callback);
        }

        code_batches
    }

    /// Replay all callbacks for one order code sequentially
    async fn replay_code(
        &self,
        callbacks: Vec<GatewayCallback>,
    ) -> Vec<Result<WebhookOutcome, EngineError>> {
        let mut results = Vec::with_capacity(callbacks.len());

        for callback in callbacks {
            let result = self.processor.handle(&callback);
            if let Err(e) = &result {
                if e.kind() == ErrorKind::Internal {
                    error!(
                        order_code = %callback.order_code,
                        error = %e,
                        "callback replay failed"
                    );
                }
            }
            results.push(result);
        }

        results
    }

    /// Replay one batch, different order codes concurrently
    ///
    /// Spawns a tokio task per order code and waits for all of them; results
    /// may interleave across codes but stay ordered within one code.
    pub async fn replay_batch(
        &self,
        batch: Vec<GatewayCallback>,
    ) -> Vec<Result<WebhookOutcome, EngineError>> {
        let code_batches = self.partition_by_code(batch);

        let mut tasks = Vec::with_capacity(code_batches.len());
        for (_code, callbacks) in code_batches {
            let replayer = self.clone();
            tasks.push(tokio::spawn(async move {
                replayer.replay_code(callbacks).await
            }));
        }

        let mut results = Vec::new();
        for task in tasks {
            match task.await {
                Ok(code_results) => results.extend(code_results),
                Err(e) => error!(error = %e, "replay task panicked"),
            }
        }

        results
    }
}

/// The offline reconciliation pipeline
///
/// Owns a fresh ledger per run: import the pending dump, replay the
/// settlement export batch by batch, then write the resulting wallet
/// statement.
#[derive(Debug, Clone)]
pub struct Reconciler {
    config: ReconcileConfig,
}

impl Reconciler {
    /// Create a reconciler with the given replay configuration
    pub fn new(config: ReconcileConfig) -> Self {
        Self { config }
    }

    /// Run the full pipeline
    ///
    /// Malformed input rows and duplicate order codes are logged and tallied,
    /// never fatal; the stream continues with the next row. Fatal errors are
    /// limited to unreadable input files, runtime construction, and output
    /// I/O.
    pub fn run(
        &self,
        pending_path: &Path,
        callbacks_path: &Path,
        output: &mut dyn Write,
    ) -> Result<ReconcileSummary, String> {
        let store = Arc::new(LedgerStore::new());
        let ledger = Arc::new(WalletLedger::new(
            Arc::clone(&store),
            EngineConfig::default(),
        ));
        let processor = PaymentWebhookProcessor::new(Arc::clone(&ledger), store);
        let replayer = CallbackReplayer::new(processor);

        let mut summary = ReconcileSummary::default();

        // Load the pending dump first so every callback can resolve its code
        for row in PendingReader::new(pending_path)? {
            match row {
                Ok(pending) => {
                    match ledger.import_pending_deposit(
                        pending.user,
                        &pending.order_code,
                        pending.amount,
                    ) {
                        Ok(_) => summary.pending_imported += 1,
                        Err(EngineError::DuplicateOrderCode { order_code }) => {
                            warn!(%order_code, "pending dump repeats an order code, skipping");
                            summary.import_conflicts += 1;
                        }
                        Err(e) => {
                            warn!(error = %e, "pending row rejected");
                            summary.malformed_rows += 1;
                        }
                    }
                }
                Err(message) => {
                    warn!(%message, "skipping malformed pending row");
                    summary.malformed_rows += 1;
                }
            }
        }

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.config.max_concurrent_batches)
            .build()
            .map_err(|e| format!("Failed to create tokio runtime: {}", e))?;

        let mut callbacks = CallbackReader::new(callbacks_path)?;
        runtime.block_on(async {
            // Sequential batches keep per-code ordering across the whole file
            loop {
                let batch = next_batch(&mut callbacks, self.config.batch_size, &mut summary);
                if batch.is_empty() {
                    break;
                }
                for result in replayer.replay_batch(batch).await {
                    summary.record(&result);
                }
            }
        });

        write_wallets_csv(&ledger.wallets(), output)?;

        info!(%summary, "reconciliation finished");
        Ok(summary)
    }
}

/// Pull up to `size` parseable callbacks from the reader
///
/// Malformed rows are tallied and skipped without consuming a batch slot.
fn next_batch(
    reader: &mut CallbackReader,
    size: usize,
    summary: &mut ReconcileSummary,
) -> Vec<GatewayCallback> {
    let mut batch = Vec::with_capacity(size);

    while batch.len() < size {
        match reader.next() {
            Some(Ok(callback)) => batch.push(callback),
            Some(Err(message)) => {
                warn!(%message, "skipping malformed callback row");
                summary.malformed_rows += 1;
            }
            None => break,
        }
    }

    batch
}
