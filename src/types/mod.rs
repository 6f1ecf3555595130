//! Core data types for the rental ledger engine
//!
//! This module defines the domain records (orders, items, wallets, ledger
//! entries), caller identity, and the engine-wide error type.

pub mod error;
pub mod identity;
pub mod item;
pub mod order;
pub mod wallet;

/// User identifier resolved by the external identity service
pub type UserId = u64;

/// Catalog item identifier
pub type ItemId = u64;

/// Internal order identifier
pub type OrderId = u64;

/// Ledger entry identifier
pub type TransactionId = u64;

/// Dispute identifier
pub type DisputeId = u64;

pub use error::{EngineError, ErrorKind};
pub use identity::{Actor, Role};
pub use item::{Item, ItemStatus, PriceUnit};
pub use order::{
    ItemCondition, ItemSnapshot, Order, OrderRequest, OrderStatus, PaymentMethod, PaymentStatus,
    ReturnInfo,
};
pub use wallet::{TransactionKind, TransactionStatus, Wallet, WalletTransaction};
