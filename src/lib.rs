//! Rental Ledger Engine Library
//! # Overview
//!
//! This library implements the order lifecycle and wallet ledger core of a
//! rental marketplace: the state machine that drives a rental order from
//! creation to completion, the inventory reservation it must keep
//! consistent, and the wallet ledger that records deposits, withdrawals, and
//! order-related money movement with idempotent gateway reconciliation.
//!
//! # Architecture
//!
//! The system is organized into several key components:
//!
//! - [`types`] - Core data types (Order, Item, Wallet, WalletTransaction, errors)
//! - [`config`] - Engine-wide settings (currency, service fee rate)
//! - [`core`] - Business logic components:
//!   - [`core::order_lifecycle`] - The order state machine
//!   - [`core::inventory`] - Atomic reserve/release/write-off of item availability
//!   - [`core::wallet_ledger`] - Balance mutation plus ledger-entry settlement
//!   - [`core::webhook`] - Exactly-once processing of gateway callbacks
//!   - [`core::withdrawal`] - Request/review/complete withdrawal workflow
//!   - [`core::dispute`] - One-shot dispute arbitration
//! - [`gateway`] - External collaborator seams (payment gateway, notifier, tax)
//! - [`io`] - CSV handling for the offline reconciliation tool
//! - [`reconcile`] - Batch replay of gateway settlement exports
//! - [`cli`] - CLI argument parsing
//!
//! # Order States
//!
//! An order moves through `pending → confirmed → progress → returned →
//! completed`, with `cancelled` and `disputed` reachable from the active
//! states. Inventory is reserved at confirmation (not creation) by a guarded
//! decrement, and every transition runs its guards and writes inside one
//! atomic unit.
//!
//! # Money Movement
//!
//! Money flows independently of the order lifecycle:
//!
//! - **Deposits** are requested against the payment gateway and settled
//!   exactly once by the webhook processor, keyed by order code
//! - **Withdrawals** pass through request, operator review, and completion;
//!   only completion debits the wallet
//! - **Refunds and damage fees** settle immediately through the ledger
//!
//! Every settled [`types::WalletTransaction`] carries the wallet balance
//! after its application, giving operators a reconstructible history.

// Module declarations
pub mod cli;
pub mod config;
pub mod core;
pub mod gateway;
pub mod io;
pub mod reconcile;
pub mod types;

pub use config::EngineConfig;
pub use core::{
    DisputeResolver, InventoryCoordinator, LedgerStore, OrderLifecycleManager, OrderStore,
    PaymentWebhookProcessor, WalletLedger, WithdrawalWorkflow,
};
pub use io::write_wallets_csv;
pub use reconcile::{ReconcileConfig, ReconcileSummary, Reconciler};
pub use types::{
    Actor, EngineError, ErrorKind, Item, ItemId, Order, OrderId, OrderStatus, TransactionId,
    UserId, Wallet, WalletTransaction,
};
