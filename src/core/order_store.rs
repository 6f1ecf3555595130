//! Order storage with soft deletion and dashboard queries
//!
//! Orders live in a `DashMap` keyed by internal id. Guarded lifecycle
//! transitions run through [`OrderStore::update`], which executes the guard
//! and the write inside the order's entry lock; queries return sorted
//! snapshots for deterministic listings.
//!
//! Soft-deleted orders stay in the map but are invisible to every read and
//! rejected by every update.

use crate::types::{EngineError, Order, OrderId, OrderStatus, UserId};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe order store
#[derive(Debug, Default)]
pub struct OrderStore {
    orders: DashMap<OrderId, Order>,
    next_id: AtomicU64,
}

impl OrderStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            orders: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Allocate the next internal order id
    pub fn allocate_id(&self) -> OrderId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Persist a freshly created order
    ///
    /// The caller builds the order with an id from [`OrderStore::allocate_id`];
    /// ids are process-unique so this never overwrites.
    pub fn insert(&self, order: Order) -> Order {
        self.orders.insert(order.id, order.clone());
        order
    }

    /// Get a snapshot of an order
    ///
    /// Returns `None` for unknown ids and for soft-deleted orders.
    pub fn get(&self, id: OrderId) -> Option<Order> {
        self.orders
            .get(&id)
            .filter(|entry| !entry.is_deleted)
            .map(|entry| entry.value().clone())
    }

    /// Update an order using a closure
    ///
    /// The closure runs while the order's entry lock is held: every guard it
    /// evaluates and every field it writes belong to one atomic unit, and a
    /// concurrent update of the same order either observes the full effect or
    /// runs first.
    ///
    /// # Errors
    ///
    /// * [`EngineError::OrderNotFound`] for unknown or soft-deleted orders
    /// * Any error returned by the closure
    pub fn update<F>(&self, id: OrderId, f: F) -> Result<Order, EngineError>
    where
        F: FnOnce(&mut Order) -> Result<(), EngineError>,
    {
        let mut entry = self
            .orders
            .get_mut(&id)
            .ok_or(EngineError::OrderNotFound { order: id })?;
        if entry.is_deleted {
            return Err(EngineError::OrderNotFound { order: id });
        }
        f(entry.value_mut())?;
        Ok(entry.value().clone())
    }

    /// Mark an order deleted; it disappears from reads but is never removed
    pub fn soft_delete(&self, id: OrderId) -> Result<(), EngineError> {
        let mut entry = self
            .orders
            .get_mut(&id)
            .ok_or(EngineError::OrderNotFound { order: id })?;
        entry.value_mut().is_deleted = true;
        Ok(())
    }

    /// Orders where the given user is the renter, sorted by id
    pub fn list_for_renter(&self, user: UserId) -> Vec<Order> {
        self.filtered(|order| order.renter == user)
    }

    /// Orders where the given user is the owner, sorted by id
    pub fn list_for_owner(&self, user: UserId) -> Vec<Order> {
        self.filtered(|order| order.owner == user)
    }

    /// Orders in the given status, sorted by id
    ///
    /// Backs the operator dashboards (disputed orders, pending requests).
    pub fn list_by_status(&self, status: OrderStatus) -> Vec<Order> {
        self.filtered(|order| order.status == status)
    }

    fn filtered<F>(&self, predicate: F) -> Vec<Order>
    where
        F: Fn(&Order) -> bool,
    {
        let mut orders: Vec<Order> = self
            .orders
            .iter()
            .filter(|entry| !entry.is_deleted && predicate(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        orders.sort_by_key(|order| order.id);
        orders
    }
}
