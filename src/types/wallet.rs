//! Wallet and ledger entry types
//!
//! A wallet holds one user's spendable balance; every balance-affecting
//! operation leaves behind an immutable [`WalletTransaction`] so an operator
//! can reconstruct the balance history independently of the live field.

use crate::types::{OrderId, TransactionId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction and purpose of a ledger entry
///
/// Amounts are always stored positive; the kind disambiguates direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Gateway-funded credit
    Deposit,
    /// Bank-transfer debit, driven by the withdrawal workflow
    Withdraw,
    /// Credit issued on dispute resolution
    Refund,
    /// Credit to an owner for damage recorded at order completion
    DamageFee,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionKind::Deposit => "deposit",
            TransactionKind::Withdraw => "withdraw",
            TransactionKind::Refund => "refund",
            TransactionKind::DamageFee => "damage_fee",
        };
        f.write_str(s)
    }
}

/// Processing status of a ledger entry
///
/// Deposits move `Pending -> Completed` (or `Failed` on a failure callback).
/// Withdrawals move `Pending -> Approved/Rejected` at review and
/// `Approved -> Completed` at completion, the only step that debits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Approved,
    Rejected,
    Completed,
    Failed,
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Approved => "approved",
            TransactionStatus::Rejected => "rejected",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One user's wallet; created lazily on first access
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    pub user: UserId,

    /// Spendable balance; never negative
    pub balance: Decimal,

    pub currency: String,
    pub created_at: DateTime<Utc>,
}

impl Wallet {
    /// Create an empty wallet for the given user
    pub fn new(user: UserId, currency: &str) -> Self {
        Wallet {
            user,
            balance: Decimal::ZERO,
            currency: currency.to_string(),
            created_at: Utc::now(),
        }
    }
}

/// A ledger entry; immutable once settled
///
/// `order_code` is globally unique and doubles as the idempotency key for
/// gateway callbacks. `balance_after` is written exactly once, at the moment
/// the entry's effect is applied to the wallet; while it is `None` the money
/// movement has not happened yet and must not be double-applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub id: TransactionId,
    pub user: UserId,

    /// Order this entry settles, when the movement is order-related
    pub order: Option<OrderId>,

    /// Globally unique code; idempotency key for gateway callbacks
    pub order_code: String,

    pub kind: TransactionKind,

    /// Always positive; `kind` carries the direction
    pub amount: Decimal,

    /// Wallet balance after this entry was applied; `None` while pending
    pub balance_after: Option<Decimal>,

    pub status: TransactionStatus,

    /// Destination account for withdrawals
    pub bank_account: Option<String>,

    pub reviewed_by: Option<UserId>,
    pub reviewed_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

impl WalletTransaction {
    /// Whether this entry's effect has been applied to its wallet
    pub fn is_settled(&self) -> bool {
        self.balance_after.is_some()
    }
}
