//! Inventory reservation for catalog items
//!
//! This module provides the `InventoryCoordinator`, which owns the two
//! availability counters of every item and exposes the three mutations the
//! order lifecycle needs: reserve, release, and write-off.
//!
//! # Atomicity
//!
//! Items live in a `DashMap`; every mutation runs inside a closure that holds
//! the item's entry lock, so the guard check and the counter write are one
//! atomic unit. Two confirmations racing on the last unit of an item both
//! serialize on that lock and exactly one passes the `available_quantity >= 1`
//! guard.
//!
//! Callers that must couple an inventory mutation with an order write invoke
//! these methods while holding the order's entry lock; the engine-wide lock
//! order (order before item) keeps those nested units deadlock-free.

use crate::types::{EngineError, Item, ItemId};
use dashmap::DashMap;
use tracing::debug;

/// Thread-safe owner of item availability counters
///
/// The coordinator maintains the invariant `available_quantity <= quantity`
/// across any sequence of reserve/release/write-off calls: releases clamp to
/// the total, write-offs clamp availability down to the reduced total.
#[derive(Debug, Default)]
pub struct InventoryCoordinator {
    /// Items by id; per-entry locking via DashMap sharding
    items: DashMap<ItemId, Item>,
}

impl InventoryCoordinator {
    /// Create an empty coordinator
    pub fn new() -> Self {
        Self {
            items: DashMap::new(),
        }
    }

    /// Register or replace a catalog item
    ///
    /// Seeding happens when the catalog (an external collaborator) publishes
    /// an item to the engine.
    pub fn upsert(&self, item: Item) {
        self.items.insert(item.id, item);
    }

    /// Get a snapshot of an item
    ///
    /// The returned value is a clone taken at call time; concurrent mutations
    /// are not reflected in it.
    pub fn get(&self, item_id: ItemId) -> Option<Item> {
        self.items.get(&item_id).map(|entry| entry.value().clone())
    }

    /// Update an item using a closure
    ///
    /// The closure runs while the entry lock is held, so the guard checks and
    /// writes inside it are atomic with respect to every other mutation of
    /// the same item.
    ///
    /// # Errors
    ///
    /// * [`EngineError::ItemNotFound`] if the item does not exist
    /// * Any error returned by the closure; the item is left as the closure
    ///   left it, so closures must not partially apply their effect before
    ///   failing
    pub fn update<F>(&self, item_id: ItemId, f: F) -> Result<Item, EngineError>
    where
        F: FnOnce(&mut Item) -> Result<(), EngineError>,
    {
        let mut entry = self
            .items
            .get_mut(&item_id)
            .ok_or(EngineError::ItemNotFound { item: item_id })?;
        f(entry.value_mut())?;
        Ok(entry.value().clone())
    }

    /// Reserve one unit of availability
    ///
    /// Decrements `available_quantity` by 1, guarded by
    /// `available_quantity >= 1` inside the same entry lock.
    ///
    /// # Errors
    ///
    /// * [`EngineError::ItemNotFound`] if the item does not exist
    /// * [`EngineError::OutOfStock`] if no availability is left; the counters
    ///   are untouched
    pub fn reserve(&self, item_id: ItemId) -> Result<(), EngineError> {
        self.update(item_id, |item| {
            if item.available_quantity < 1 {
                return Err(EngineError::out_of_stock(item_id));
            }
            item.available_quantity -= 1;
            debug!(
                item = item_id,
                available = item.available_quantity,
                "reserved one unit"
            );
            Ok(())
        })?;
        Ok(())
    }

    /// Return one reserved unit to availability
    ///
    /// Increments `available_quantity` by 1, clamped to `quantity`.
    ///
    /// # Errors
    ///
    /// * [`EngineError::ItemNotFound`] if the item does not exist
    pub fn release(&self, item_id: ItemId) -> Result<(), EngineError> {
        self.update(item_id, |item| {
            item.available_quantity = (item.available_quantity + 1).min(item.quantity);
            debug!(
                item = item_id,
                available = item.available_quantity,
                "released one unit"
            );
            Ok(())
        })?;
        Ok(())
    }

    /// Permanently remove one unit from the owned total
    ///
    /// Used when a rented unit is lost. Decrements `quantity` by 1 and clamps
    /// `available_quantity` to the new total; the unit never returns to the
    /// rentable pool.
    ///
    /// # Errors
    ///
    /// * [`EngineError::ItemNotFound`] if the item does not exist
    pub fn write_off(&self, item_id: ItemId) -> Result<(), EngineError> {
        self.update(item_id, |item| {
            item.quantity = item.quantity.saturating_sub(1);
            item.available_quantity = item.available_quantity.min(item.quantity);
            debug!(
                item = item_id,
                quantity = item.quantity,
                available = item.available_quantity,
                "wrote off one unit"
            );
            Ok(())
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ItemStatus, PriceUnit};
    use rust_decimal::Decimal;

    fn seed_item(id: ItemId, quantity: u32, available: u32) -> Item {
        Item {
            id,
            owner: 10,
            title: "Cargo bike".to_string(),
            image_url: None,
            base_price: Decimal::new(20_000, 0),
            deposit_amount: Decimal::new(100_000, 0),
            price_unit: PriceUnit::Day,
            status: ItemStatus::Available,
            is_deleted: false,
            quantity,
            available_quantity: available,
        }
    }

    #[test]
    fn test_reserve_decrements_availability() {
        let inventory = InventoryCoordinator::new();
        inventory.upsert(seed_item(1, 3, 3));

        inventory.reserve(1).unwrap();

        let item = inventory.get(1).unwrap();
        assert_eq!(item.available_quantity, 2);
        assert_eq!(item.quantity, 3);
    }

    #[test]
    fn test_reserve_fails_when_out_of_stock() {
        let inventory = InventoryCoordinator::new();
        inventory.upsert(seed_item(1, 2, 0));

        let result = inventory.reserve(1);

        assert!(matches!(result.unwrap_err(), EngineError::OutOfStock { item: 1 }));
        let item = inventory.get(1).unwrap();
        assert_eq!(item.available_quantity, 0);
        assert_eq!(item.quantity, 2);
    }

    #[test]
    fn test_reserve_unknown_item() {
        let inventory = InventoryCoordinator::new();
        let result = inventory.reserve(99);
        assert!(matches!(
            result.unwrap_err(),
            EngineError::ItemNotFound { item: 99 }
        ));
    }

    #[test]
    fn test_release_restores_availability() {
        let inventory = InventoryCoordinator::new();
        inventory.upsert(seed_item(1, 3, 3));

        inventory.reserve(1).unwrap();
        inventory.release(1).unwrap();

        assert_eq!(inventory.get(1).unwrap().available_quantity, 3);
    }

    #[test]
    fn test_release_is_clamped_to_quantity() {
        let inventory = InventoryCoordinator::new();
        inventory.upsert(seed_item(1, 3, 3));

        // Releasing without a prior reservation must not exceed the total
        inventory.release(1).unwrap();

        let item = inventory.get(1).unwrap();
        assert_eq!(item.available_quantity, 3);
        assert_eq!(item.quantity, 3);
    }

    #[test]
    fn test_write_off_reduces_total_and_clamps_availability() {
        let inventory = InventoryCoordinator::new();
        inventory.upsert(seed_item(1, 3, 3));

        inventory.write_off(1).unwrap();

        let item = inventory.get(1).unwrap();
        assert_eq!(item.quantity, 2);
        assert_eq!(item.available_quantity, 2);
    }

    #[test]
    fn test_write_off_at_zero_quantity_saturates() {
        let inventory = InventoryCoordinator::new();
        inventory.upsert(seed_item(1, 0, 0));

        inventory.write_off(1).unwrap();

        let item = inventory.get(1).unwrap();
        assert_eq!(item.quantity, 0);
        assert_eq!(item.available_quantity, 0);
    }

    #[test]
    fn test_invariant_holds_over_mixed_sequences() {
        let inventory = InventoryCoordinator::new();
        inventory.upsert(seed_item(1, 5, 5));

        let ops: &[fn(&InventoryCoordinator) -> Result<(), EngineError>] = &[
            |inv| inv.reserve(1),
            |inv| inv.reserve(1),
            |inv| inv.release(1),
            |inv| inv.write_off(1),
            |inv| inv.reserve(1),
            |inv| inv.release(1),
            |inv| inv.release(1),
            |inv| inv.write_off(1),
            |inv| inv.release(1),
        ];

        for op in ops {
            let _ = op(&inventory);
            let item = inventory.get(1).unwrap();
            assert!(
                item.available_quantity <= item.quantity,
                "available {} exceeded quantity {}",
                item.available_quantity,
                item.quantity
            );
        }
    }

    #[test]
    fn test_concurrent_reserves_never_oversell() {
        use std::sync::Arc;
        use std::thread;

        let inventory = Arc::new(InventoryCoordinator::new());
        inventory.upsert(seed_item(1, 4, 4));

        let mut handles = vec![];
        for _ in 0..16 {
            let inventory = Arc::clone(&inventory);
            handles.push(thread::spawn(move || inventory.reserve(1)));
        }

        let mut successes = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.join().unwrap() {
                Ok(()) => successes += 1,
                Err(EngineError::OutOfStock { .. }) => conflicts += 1,
                Err(e) => panic!("Unexpected error: {e:?}"),
            }
        }

        assert_eq!(successes, 4);
        assert_eq!(conflicts, 12);
        assert_eq!(inventory.get(1).unwrap().available_quantity, 0);
    }
}
