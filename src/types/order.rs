//! Order types for the rental ledger engine
//!
//! This module defines the rental order record, its status state machine,
//! and the immutable item snapshot captured at creation time.
//!
//! # Order States
//!
//! ```text
//! pending ──▶ confirmed ──▶ progress ──▶ returned ──▶ completed
//!    │             │            │             │
//!    ├─▶ cancelled ┘            │             │
//!    └─────────▶ disputed ◀─────┴─────────────┘ ──▶ completed
//! ```
//!
//! `completed` and `cancelled` are terminal. `disputed` is terminal for the
//! lifecycle manager and is driven to `completed` by dispute resolution.

use crate::types::item::PriceUnit;
use crate::types::{ItemId, OrderId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Lifecycle status of a rental order
///
/// Transitions are validated against [`OrderStatus::can_transition_to`]; any
/// transition not in the table is rejected at the boundary rather than by
/// scattered status comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Created by the renter; no inventory held yet
    Pending,
    /// Accepted by the owner; one unit of availability reserved
    Confirmed,
    /// Rental period running
    Progress,
    /// Renter reported the item returned; awaiting owner inspection
    Returned,
    /// Terminal: inspected and settled, or closed by dispute resolution
    Completed,
    /// Terminal: abandoned before the rental ran; reservation undone
    Cancelled,
    /// Escalated; owned by the dispute resolver from here on
    Disputed,
}

impl OrderStatus {
    /// Whether this status permits no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    /// The transition table of the order state machine
    ///
    /// Disputes are reachable from every active state; resolution is the only
    /// path out of `Disputed`.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Pending, Disputed)
                | (Confirmed, Progress)
                | (Confirmed, Cancelled)
                | (Confirmed, Disputed)
                | (Progress, Returned)
                | (Progress, Completed)
                | (Progress, Disputed)
                | (Returned, Completed)
                | (Returned, Disputed)
                | (Disputed, Completed)
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Progress => "progress",
            OrderStatus::Returned => "returned",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Disputed => "disputed",
        };
        f.write_str(s)
    }
}

/// Payment state of an order, tracked independently of the lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    NotPaid,
    /// Settled with a damage fee withheld
    Partial,
    Paid,
    Refunded,
    Failed,
}

/// How the renter pays for the order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    /// Internal wallet balance
    Wallet,
    /// External payment gateway checkout
    Gateway,
}

/// Condition recorded by the owner when completing an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemCondition {
    Good,
    SlightlyDamaged,
    HeavilyDamaged,
    /// Permanently reduces the item's total quantity
    Lost,
}

/// Item fields frozen at order creation
///
/// Later catalog edits must not retroactively change a live order, so the
/// order carries its own copy of the fields that price and describe it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemSnapshot {
    pub title: String,
    pub image_url: Option<String>,
    pub base_price: Decimal,
    pub price_unit: PriceUnit,
}

/// Return details, first written when the renter reports the return and
/// finalized when the owner inspects and completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnInfo {
    /// When the renter reported the item returned
    pub returned_at: DateTime<Utc>,

    /// Owner who confirmed the return at completion
    pub confirmed_by: Option<UserId>,

    /// Condition recorded at completion
    pub condition: Option<ItemCondition>,

    pub notes: Option<String>,

    /// Fee withheld for damage; zero when the item came back clean
    pub damage_fee: Decimal,
}

/// One rental agreement between a renter and an owner for one catalog item
///
/// Orders are created by the renter-facing creation operation and mutated
/// only by the lifecycle manager and the dispute resolver. Lifecycle
/// timestamps are append-only: each transition sets its own timestamp and
/// never clears another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Internal identifier
    pub id: OrderId,

    /// Opaque identifier exposed to external collaborators
    pub guid: Uuid,

    pub renter: UserId,
    pub owner: UserId,
    pub item: ItemId,

    /// Item fields captured at creation time
    pub snapshot: ItemSnapshot,

    pub unit_count: u32,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub shipping_address: String,

    pub total_amount: Decimal,
    pub deposit_amount: Decimal,
    pub service_fee: Decimal,
    pub currency: String,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,

    pub status: OrderStatus,
    pub return_info: Option<ReturnInfo>,

    /// Set only by the cancel transition
    pub cancel_reason: Option<String>,
    /// Set only by the dispute transition
    pub dispute_reason: Option<String>,

    // Lifecycle timestamps, one per transition
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub canceled_at: Option<DateTime<Utc>>,
    pub disputed_at: Option<DateTime<Utc>>,

    /// Soft-delete flag; deleted orders are excluded from all queries
    pub is_deleted: bool,
}

impl Order {
    /// Whether the given user is the renter or the owner of this order
    pub fn is_party(&self, user: UserId) -> bool {
        self.renter == user || self.owner == user
    }
}

/// Renter-supplied input for order creation
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OrderRequest {
    pub item_id: ItemId,
    pub unit_count: u32,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub shipping_address: String,
    pub payment_method: PaymentMethod,
}
