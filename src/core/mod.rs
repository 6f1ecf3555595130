//! Business logic components
//!
//! The engine is built from small thread-safe services over `DashMap`-backed
//! stores. Correctness under concurrency comes from narrow atomic units, not
//! coarse locks: every multi-record mutation runs its guards and writes
//! while holding the entry locks of exactly the records it touches.
//!
//! # Lock order
//!
//! Nested units always acquire entry locks in a fixed order:
//!
//! - order before item (lifecycle transitions that move inventory)
//! - ledger entry before wallet (settlement paths)
//! - dispute before order (dispute resolution)
//!
//! No component acquires in the reverse direction, so the nested units
//! cannot deadlock.

pub mod dispute;
pub mod inventory;
pub mod ledger_store;
pub mod order_lifecycle;
pub mod order_store;
pub mod wallet_ledger;
pub mod webhook;
pub mod withdrawal;

pub use dispute::{Dispute, DisputeResolver, DisputeStatus};
pub use inventory::InventoryCoordinator;
pub use ledger_store::LedgerStore;
pub use order_lifecycle::OrderLifecycleManager;
pub use order_store::OrderStore;
pub use wallet_ledger::WalletLedger;
pub use webhook::{GatewayCallback, PaymentWebhookProcessor, WebhookOutcome, SUCCESS_STATUS_CODE};
pub use withdrawal::WithdrawalWorkflow;
