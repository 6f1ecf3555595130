//! Catalog item view consumed by the engine
//!
//! The catalog itself is an external collaborator; the engine only reads the
//! fields below and mutates the two inventory counters through the
//! [`InventoryCoordinator`](crate::core::InventoryCoordinator).

use crate::types::{ItemId, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Listing status of a catalog item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    /// Listed and rentable
    Available,
    /// Hidden by its owner; existing orders keep running
    Unlisted,
}

/// Billing unit the base price applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceUnit {
    Hour,
    Day,
    Week,
    Month,
}

/// Catalog item as seen by the order and inventory components
///
/// `quantity` is the total owned count; `available_quantity` is the count
/// currently rentable. `available_quantity <= quantity` holds at all times;
/// the InventoryCoordinator maintains it through clamped mutations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub owner: UserId,
    pub title: String,
    pub image_url: Option<String>,

    /// Rental price per unit per price-unit period
    pub base_price: Decimal,

    /// Security deposit per unit
    pub deposit_amount: Decimal,

    pub price_unit: PriceUnit,
    pub status: ItemStatus,
    pub is_deleted: bool,

    /// Total owned count; reduced only by a write-off
    pub quantity: u32,

    /// Currently rentable count
    pub available_quantity: u32,
}

impl Item {
    /// Whether new orders may be created against this item
    pub fn is_rentable(&self) -> bool {
        self.status == ItemStatus::Available && !self.is_deleted
    }
}
