//! Error types for the rental ledger engine
//!
//! This module defines all error types that can occur while driving rental
//! orders, inventory reservations, and wallet ledger operations.
//!
//! # Error Categories
//!
//! - **Validation**: malformed input (non-positive amounts, inverted rental
//!   periods, missing shipping address). Rejected before any record is touched.
//! - **Authorization**: the acting user is not a party to the order or lacks
//!   the operator role. Never retried.
//! - **StateConflict**: a guarded transition found the record in the wrong
//!   state (wrong order status, item out of stock, withdrawal already
//!   reviewed). The caller must re-read before retrying.
//! - **InsufficientFunds**: a wallet debit exceeds the balance. Surfaced
//!   separately from state conflicts because the remedy differs.
//! - **NotFound**: the referenced order/item/transaction does not exist.
//! - **ExternalDependency**: the payment gateway was unreachable or errored.
//! - **Internal**: unexpected failures (arithmetic overflow and similar).

use crate::types::order::OrderStatus;
use crate::types::wallet::TransactionStatus;
use crate::types::{DisputeId, ItemId, OrderId, TransactionId, UserId};
use rust_decimal::Decimal;
use thiserror::Error;

/// Coarse error classification used by callers that route on the taxonomy
/// rather than on individual variants (HTTP mapping, retry policy, logging).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Authorization,
    StateConflict,
    InsufficientFunds,
    NotFound,
    ExternalDependency,
    Internal,
}

/// Main error type for the rental ledger engine
///
/// Each variant carries enough context to diagnose the rejection without a
/// second lookup. Guard failures are detected inside the same atomic update
/// as the write they protect, so a returned `StateConflict` reflects the
/// record state at the moment the operation ran.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// Amount is zero or negative where a positive amount is required
    #[error("Invalid amount {amount}: must be greater than zero")]
    InvalidAmount {
        /// The rejected amount
        amount: Decimal,
    },

    /// Withdrawal amounts must be whole currency units
    #[error("Invalid withdrawal amount {amount}: must be a whole number")]
    FractionalWithdrawal {
        /// The rejected amount
        amount: Decimal,
    },

    /// Rental period end is not strictly after its start
    #[error("Invalid rental period: end {end} is not after start {start}")]
    InvalidRentalPeriod {
        /// Requested start of the rental window (RFC 3339)
        start: String,
        /// Requested end of the rental window (RFC 3339)
        end: String,
    },

    /// Unit count must be at least one
    #[error("Invalid unit count {count}: must be at least 1")]
    InvalidUnitCount {
        /// The rejected unit count
        count: u32,
    },

    /// Orders cannot be created without a shipping address
    #[error("Shipping address is required")]
    MissingShippingAddress,

    /// The acting user is not allowed to perform the operation
    ///
    /// Returned when the actor is not the order's renter/owner, or tries to
    /// act on the wrong side of the agreement.
    #[error("User {user} is not allowed to {operation}")]
    Forbidden {
        /// The acting user
        user: UserId,
        /// The rejected operation
        operation: String,
    },

    /// The operation requires the operator role
    #[error("User {user} requires the operator role to {operation}")]
    OperatorRequired {
        /// The acting user
        user: UserId,
        /// The rejected operation
        operation: String,
    },

    /// The order is not in a state that permits the transition
    #[error("Order {order} is {current}: cannot {operation}")]
    InvalidOrderState {
        /// The order being transitioned
        order: OrderId,
        /// Status observed inside the guarded update
        current: OrderStatus,
        /// The rejected transition
        operation: String,
    },

    /// No available quantity left to reserve
    ///
    /// This is the losing side of two confirmations racing on the same item.
    #[error("Item {item} is out of stock")]
    OutOfStock {
        /// The item that could not be reserved
        item: ItemId,
    },

    /// The item is deleted or not listed as available
    #[error("Item {item} is not rentable")]
    ItemNotRentable {
        /// The item that cannot be rented
        item: ItemId,
    },

    /// The rental window has not opened yet
    #[error("Order {order} rental period starts at {start}")]
    RentalPeriodNotStarted {
        /// The order being started
        order: OrderId,
        /// Agreed start of the rental window (RFC 3339)
        start: String,
    },

    /// Completion requires a reported return
    #[error("Order {order} has no reported return")]
    ReturnNotReported {
        /// The order missing its return report
        order: OrderId,
    },

    /// The withdrawal has already been approved or rejected
    #[error("Transaction {tx} was already reviewed ({status})")]
    TransactionAlreadyReviewed {
        /// The withdrawal transaction
        tx: TransactionId,
        /// Status observed inside the guarded update
        status: TransactionStatus,
    },

    /// Completion is only valid for approved withdrawals
    #[error("Transaction {tx} is {status}: only approved withdrawals can be completed")]
    WithdrawalNotApproved {
        /// The withdrawal transaction
        tx: TransactionId,
        /// Status observed inside the guarded update
        status: TransactionStatus,
    },

    /// The referenced ledger entry is not a withdrawal
    #[error("Transaction {tx} is not a withdrawal")]
    NotAWithdrawal {
        /// The ledger entry
        tx: TransactionId,
    },

    /// The ledger entry has already been applied to its wallet
    ///
    /// `balance_after` is written exactly once; seeing it set means the money
    /// movement already happened and must not be applied again.
    #[error("Transaction {tx} is already settled")]
    AlreadySettled {
        /// The settled ledger entry
        tx: TransactionId,
    },

    /// Order codes are globally unique idempotency keys
    #[error("Order code '{order_code}' is already registered")]
    DuplicateOrderCode {
        /// The colliding code
        order_code: String,
    },

    /// Disputes are resolved exactly once
    #[error("Dispute {dispute} is already resolved")]
    DisputeAlreadyResolved {
        /// The dispute
        dispute: DisputeId,
    },

    /// Wallet balance is lower than the requested debit
    #[error("Insufficient funds for user {user}: available {available}, requested {requested}")]
    InsufficientFunds {
        /// Wallet owner
        user: UserId,
        /// Balance at the moment of the guarded debit
        available: Decimal,
        /// Requested debit amount
        requested: Decimal,
    },

    /// Referenced order does not exist (or is soft-deleted)
    #[error("Order {order} not found")]
    OrderNotFound {
        /// The missing order
        order: OrderId,
    },

    /// Referenced item does not exist
    #[error("Item {item} not found")]
    ItemNotFound {
        /// The missing item
        item: ItemId,
    },

    /// Referenced ledger entry does not exist
    #[error("Transaction {tx} not found")]
    TransactionNotFound {
        /// The missing ledger entry
        tx: TransactionId,
    },

    /// Referenced dispute does not exist
    #[error("Dispute {dispute} not found")]
    DisputeNotFound {
        /// The missing dispute
        dispute: DisputeId,
    },

    /// The payment gateway was unreachable or returned an error
    ///
    /// The triggering operation fails without persisting any pending ledger
    /// entry; callers may retry later.
    #[error("Payment gateway unavailable: {message}")]
    GatewayUnavailable {
        /// Gateway-facing description, safe to log
        message: String,
    },

    /// Arithmetic overflow would occur
    #[error("Arithmetic overflow in {operation} for user {user}")]
    ArithmeticOverflow {
        /// Operation that would overflow
        operation: String,
        /// Wallet owner
        user: UserId,
    },

    /// Arithmetic underflow would occur
    #[error("Arithmetic underflow in {operation} for user {user}")]
    ArithmeticUnderflow {
        /// Operation that would underflow
        operation: String,
        /// Wallet owner
        user: UserId,
    },

    /// Unexpected internal failure
    #[error("Internal error: {message}")]
    Internal {
        /// Description for operator follow-up
        message: String,
    },
}

impl EngineError {
    /// Classify this error onto the coarse taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::InvalidAmount { .. }
            | EngineError::FractionalWithdrawal { .. }
            | EngineError::InvalidRentalPeriod { .. }
            | EngineError::InvalidUnitCount { .. }
            | EngineError::MissingShippingAddress => ErrorKind::Validation,

            EngineError::Forbidden { .. } | EngineError::OperatorRequired { .. } => {
                ErrorKind::Authorization
            }

            EngineError::InvalidOrderState { .. }
            | EngineError::OutOfStock { .. }
            | EngineError::ItemNotRentable { .. }
            | EngineError::RentalPeriodNotStarted { .. }
            | EngineError::ReturnNotReported { .. }
            | EngineError::TransactionAlreadyReviewed { .. }
            | EngineError::WithdrawalNotApproved { .. }
            | EngineError::NotAWithdrawal { .. }
            | EngineError::AlreadySettled { .. }
            | EngineError::DuplicateOrderCode { .. }
            | EngineError::DisputeAlreadyResolved { .. } => ErrorKind::StateConflict,

            EngineError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,

            EngineError::OrderNotFound { .. }
            | EngineError::ItemNotFound { .. }
            | EngineError::TransactionNotFound { .. }
            | EngineError::DisputeNotFound { .. } => ErrorKind::NotFound,

            EngineError::GatewayUnavailable { .. } => ErrorKind::ExternalDependency,

            EngineError::ArithmeticOverflow { .. }
            | EngineError::ArithmeticUnderflow { .. }
            | EngineError::Internal { .. } => ErrorKind::Internal,
        }
    }
}

// Helper functions for creating common errors

impl EngineError {
    /// Create an InvalidAmount error
    pub fn invalid_amount(amount: Decimal) -> Self {
        EngineError::InvalidAmount { amount }
    }

    /// Create a Forbidden error
    pub fn forbidden(user: UserId, operation: &str) -> Self {
        EngineError::Forbidden {
            user,
            operation: operation.to_string(),
        }
    }

    /// Create an OperatorRequired error
    pub fn operator_required(user: UserId, operation: &str) -> Self {
        EngineError::OperatorRequired {
            user,
            operation: operation.to_string(),
        }
    }

    /// Create an InvalidOrderState error
    pub fn invalid_order_state(order: OrderId, current: OrderStatus, operation: &str) -> Self {
        EngineError::InvalidOrderState {
            order,
            current,
            operation: operation.to_string(),
        }
    }

    /// Create an OutOfStock error
    pub fn out_of_stock(item: ItemId) -> Self {
        EngineError::OutOfStock { item }
    }

    /// Create an InsufficientFunds error
    pub fn insufficient_funds(user: UserId, available: Decimal, requested: Decimal) -> Self {
        EngineError::InsufficientFunds {
            user,
            available,
            requested,
        }
    }

    /// Create an AlreadySettled error
    pub fn already_settled(tx: TransactionId) -> Self {
        EngineError::AlreadySettled { tx }
    }

    /// Create a DuplicateOrderCode error
    pub fn duplicate_order_code(order_code: &str) -> Self {
        EngineError::DuplicateOrderCode {
            order_code: order_code.to_string(),
        }
    }

    /// Create a GatewayUnavailable error
    pub fn gateway_unavailable(message: &str) -> Self {
        EngineError::GatewayUnavailable {
            message: message.to_string(),
        }
    }

    /// Create an ArithmeticOverflow error
    pub fn arithmetic_overflow(operation: &str, user: UserId) -> Self {
        EngineError::ArithmeticOverflow {
            operation: operation.to_string(),
            user,
        }
    }

    /// Create an ArithmeticUnderflow error
    pub fn arithmetic_underflow(operation: &str, user: UserId) -> Self {
        EngineError::ArithmeticUnderflow {
            operation: operation.to_string(),
            user,
        }
    }

    /// Create an Internal error
    pub fn internal(message: &str) -> Self {
        EngineError::Internal {
            message: message.to_string(),
        }
    }
}
