//! The order state machine
//!
//! This module provides the `OrderLifecycleManager`, which drives a rental
//! order from creation to completion, cancellation, or dispute. Every
//! transition is guarded by the actor check and the status check of the
//! transition table, evaluated inside the order's entry lock together with
//! the writes they protect.
//!
//! # Inventory coupling
//!
//! Inventory is reserved as late as possible: creation never touches the
//! counters, confirmation performs the guarded decrement. Transitions that
//! move inventory call the [`InventoryCoordinator`] while still holding the
//! order's entry lock, so the order write and the counter write form one
//! atomic unit. The engine-wide lock order is order before item.
//!
//! # Notifications
//!
//! After each committed transition the counterparty is notified. Delivery is
//! fire and forget; a failure is logged and the transition stands.

use crate::config::EngineConfig;
use crate::core::inventory::InventoryCoordinator;
use crate::core::order_store::OrderStore;
use crate::core::wallet_ledger::WalletLedger;
use crate::gateway::tax;
use crate::gateway::{Notification, Notifier};
use crate::types::{
    Actor, EngineError, ItemCondition, ItemSnapshot, Order, OrderId, OrderRequest, OrderStatus,
    PaymentStatus, ReturnInfo, TransactionKind, UserId,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Driver of the rental order state machine
///
/// Cloneable via `Arc`; all state lives in the shared stores, and every
/// transition serializes on the order's entry lock.
pub struct OrderLifecycleManager {
    orders: Arc<OrderStore>,
    inventory: Arc<InventoryCoordinator>,
    ledger: Arc<WalletLedger>,
    notifier: Arc<dyn Notifier>,
    config: EngineConfig,
}

impl OrderLifecycleManager {
    /// Create a manager over the given stores and collaborator seams
    pub fn new(
        orders: Arc<OrderStore>,
        inventory: Arc<InventoryCoordinator>,
        ledger: Arc<WalletLedger>,
        notifier: Arc<dyn Notifier>,
        config: EngineConfig,
    ) -> Self {
        Self {
            orders,
            inventory,
            ledger,
            notifier,
            config,
        }
    }

    /// Create a pending order
    ///
    /// Validates the request, prices the order against the current catalog
    /// fields, and captures the immutable item snapshot. No inventory is
    /// reserved here; the availability check is advisory and re-run with a
    /// guard at confirmation.
    ///
    /// # Errors
    ///
    /// * [`EngineError::InvalidUnitCount`], [`EngineError::InvalidRentalPeriod`],
    ///   [`EngineError::MissingShippingAddress`] on malformed input
    /// * [`EngineError::ItemNotFound`] / [`EngineError::ItemNotRentable`] when
    ///   the item cannot be rented
    /// * [`EngineError::Forbidden`] when the renter owns the item
    /// * [`EngineError::OutOfStock`] when fewer units are available than
    ///   requested
    pub fn create(&self, actor: Actor, request: OrderRequest) -> Result<Order, EngineError> {
        if request.unit_count < 1 {
            return Err(EngineError::InvalidUnitCount {
                count: request.unit_count,
            });
        }
        if request.end_at <= request.start_at {
            return Err(EngineError::InvalidRentalPeriod {
                start: request.start_at.to_rfc3339(),
                end: request.end_at.to_rfc3339(),
            });
        }
        if request.shipping_address.trim().is_empty() {
            return Err(EngineError::MissingShippingAddress);
        }

        let item = self
            .inventory
            .get(request.item_id)
            .ok_or(EngineError::ItemNotFound {
                item: request.item_id,
            })?;
        if !item.is_rentable() {
            return Err(EngineError::ItemNotRentable { item: item.id });
        }
        if item.owner == actor.user {
            return Err(EngineError::forbidden(actor.user, "rent their own item"));
        }
        if item.available_quantity < request.unit_count {
            return Err(EngineError::out_of_stock(item.id));
        }

        let units = Decimal::from(request.unit_count);
        let rental = item.base_price * units;
        let service_fee = (rental * self.config.service_fee_rate).round_dp(2);
        let total_amount = rental + service_fee + tax::tax_on(rental);
        let deposit_amount = item.deposit_amount * units;

        let now = Utc::now();
        let order = self.orders.insert(Order {
            id: self.orders.allocate_id(),
            guid: Uuid::new_v4(),
            renter: actor.user,
            owner: item.owner,
            item: item.id,
            snapshot: ItemSnapshot {
                title: item.title.clone(),
                image_url: item.image_url.clone(),
                base_price: item.base_price,
                price_unit: item.price_unit,
            },
            unit_count: request.unit_count,
            start_at: request.start_at,
            end_at: request.end_at,
            shipping_address: request.shipping_address,
            total_amount,
            deposit_amount,
            service_fee,
            currency: self.config.currency.clone(),
            payment_method: request.payment_method,
            payment_status: PaymentStatus::NotPaid,
            status: OrderStatus::Pending,
            return_info: None,
            cancel_reason: None,
            dispute_reason: None,
            created_at: now,
            confirmed_at: None,
            started_at: None,
            completed_at: None,
            canceled_at: None,
            disputed_at: None,
            is_deleted: false,
        });

        info!(order = order.id, renter = actor.user, owner = order.owner, "order created");
        self.notify(
            order.owner,
            "New rental request",
            format!("{} requested for rent", order.snapshot.title),
            &order,
        );
        Ok(order)
    }

    /// Confirm a pending order (owner)
    ///
    /// Performs the guarded inventory decrement inside the order's atomic
    /// unit. When two confirmations race on an item's last unit, the losing
    /// side gets [`EngineError::OutOfStock`] and its order stays pending.
    pub fn confirm(&self, actor: Actor, order_id: OrderId) -> Result<Order, EngineError> {
        let order = self.orders.update(order_id, |o| {
            if o.owner != actor.user {
                return Err(EngineError::forbidden(actor.user, "confirm this order"));
            }
            if o.status != OrderStatus::Pending {
                return Err(EngineError::invalid_order_state(o.id, o.status, "confirm"));
            }
            self.inventory.reserve(o.item)?;
            o.status = OrderStatus::Confirmed;
            o.confirmed_at = Some(Utc::now());
            Ok(())
        })?;

        info!(order = order.id, "order confirmed");
        self.notify(
            order.renter,
            "Order confirmed",
            format!("The owner confirmed your order for {}", order.snapshot.title),
            &order,
        );
        Ok(order)
    }

    /// Start the rental (owner)
    ///
    /// Timestamp-only transition; valid once the agreed start has passed.
    pub fn start(&self, actor: Actor, order_id: OrderId) -> Result<Order, EngineError> {
        let order = self.orders.update(order_id, |o| {
            if o.owner != actor.user {
                return Err(EngineError::forbidden(actor.user, "start this order"));
            }
            if o.status != OrderStatus::Confirmed {
                return Err(EngineError::invalid_order_state(o.id, o.status, "start"));
            }
            let now = Utc::now();
            if o.start_at > now {
                return Err(EngineError::RentalPeriodNotStarted {
                    order: o.id,
                    start: o.start_at.to_rfc3339(),
                });
            }
            o.status = OrderStatus::Progress;
            o.started_at = Some(now);
            Ok(())
        })?;

        info!(order = order.id, "rental started");
        self.notify(
            order.renter,
            "Rental started",
            format!("Your rental of {} is underway", order.snapshot.title),
            &order,
        );
        Ok(order)
    }

    /// Report the item returned (renter)
    ///
    /// Records the return timestamp and the renter's notes; the owner
    /// inspects and completes afterwards.
    pub fn renter_return(
        &self,
        actor: Actor,
        order_id: OrderId,
        notes: Option<String>,
    ) -> Result<Order, EngineError> {
        let order = self.orders.update(order_id, |o| {
            if o.renter != actor.user {
                return Err(EngineError::forbidden(actor.user, "report this return"));
            }
            if o.status != OrderStatus::Progress {
                return Err(EngineError::invalid_order_state(o.id, o.status, "return"));
            }
            o.return_info = Some(ReturnInfo {
                returned_at: Utc::now(),
                confirmed_by: None,
                condition: None,
                notes,
                damage_fee: Decimal::ZERO,
            });
            o.status = OrderStatus::Returned;
            Ok(())
        })?;

        info!(order = order.id, "return reported");
        self.notify(
            order.owner,
            "Item returned",
            format!("{} was reported returned", order.snapshot.title),
            &order,
        );
        Ok(order)
    }

    /// Inspect the returned item and complete the order (owner)
    ///
    /// Writes the final condition and damage fee, settles the payment status
    /// (`Partial` when a fee is withheld, `Paid` otherwise), and applies the
    /// inventory effect: a lost unit is written off the owned total, any
    /// other condition returns the unit to availability. The damage fee, if
    /// any, is credited to the owner's wallet as a follow-up ledger entry
    /// once the order/inventory unit has committed.
    ///
    /// # Errors
    ///
    /// * [`EngineError::ReturnNotReported`] when no return was recorded
    /// * [`EngineError::InvalidOrderState`] outside progress/returned
    /// * [`EngineError::Forbidden`] for non-owners
    pub fn owner_complete(
        &self,
        actor: Actor,
        order_id: OrderId,
        condition: ItemCondition,
        damage_fee: Decimal,
    ) -> Result<Order, EngineError> {
        if damage_fee.is_sign_negative() {
            return Err(EngineError::invalid_amount(damage_fee));
        }

        let order = self.orders.update(order_id, |o| {
            if o.owner != actor.user {
                return Err(EngineError::forbidden(actor.user, "complete this order"));
            }
            if !matches!(o.status, OrderStatus::Progress | OrderStatus::Returned) {
                return Err(EngineError::invalid_order_state(o.id, o.status, "complete"));
            }
            let Some(return_info) = o.return_info.as_mut() else {
                return Err(EngineError::ReturnNotReported { order: o.id });
            };

            match condition {
                ItemCondition::Lost => self.inventory.write_off(o.item)?,
                _ => self.inventory.release(o.item)?,
            }

            return_info.condition = Some(condition);
            return_info.damage_fee = damage_fee;
            return_info.confirmed_by = Some(actor.user);
            o.payment_status = if damage_fee > Decimal::ZERO {
                PaymentStatus::Partial
            } else {
                PaymentStatus::Paid
            };
            o.status = OrderStatus::Completed;
            o.completed_at = Some(Utc::now());
            Ok(())
        })?;

        info!(order = order.id, condition = ?condition, "order completed");

        if damage_fee > Decimal::ZERO {
            match self.ledger.credit(
                order.owner,
                damage_fee,
                TransactionKind::DamageFee,
                Some(order.id),
            ) {
                Ok(tx) => info!(order = order.id, tx = tx.id, "damage fee settled"),
                Err(e) => warn!(
                    order = order.id,
                    error = %e,
                    "damage fee settlement failed, flagged for manual reconciliation"
                ),
            }
        }

        self.notify(
            order.renter,
            "Order completed",
            format!("Your rental of {} was completed", order.snapshot.title),
            &order,
        );
        Ok(order)
    }

    /// Cancel an order
    ///
    /// Pending orders can be cancelled by either party and carry no
    /// reservation to undo. Confirmed orders can only be cancelled by the
    /// owner; the confirmation's reservation is released inside the same
    /// atomic unit. Any later state is a conflict.
    pub fn cancel(
        &self,
        actor: Actor,
        order_id: OrderId,
        reason: &str,
    ) -> Result<Order, EngineError> {
        let order = self.orders.update(order_id, |o| {
            match o.status {
                OrderStatus::Pending => {
                    if !o.is_party(actor.user) {
                        return Err(EngineError::forbidden(actor.user, "cancel this order"));
                    }
                }
                OrderStatus::Confirmed => {
                    if o.owner != actor.user {
                        return Err(EngineError::forbidden(
                            actor.user,
                            "cancel a confirmed order",
                        ));
                    }
                    self.inventory.release(o.item)?;
                }
                current => {
                    return Err(EngineError::invalid_order_state(o.id, current, "cancel"));
                }
            }
            o.status = OrderStatus::Cancelled;
            o.canceled_at = Some(Utc::now());
            o.cancel_reason = Some(reason.to_string());
            Ok(())
        })?;

        info!(order = order.id, by = actor.user, "order cancelled");
        let counterparty = if actor.user == order.renter {
            order.owner
        } else {
            order.renter
        };
        self.notify(
            counterparty,
            "Order cancelled",
            format!("Order for {} was cancelled", order.snapshot.title),
            &order,
        );
        Ok(order)
    }

    /// Escalate an order to dispute (either party)
    ///
    /// Valid from every active state; completed and cancelled orders cannot
    /// be disputed. From here the order belongs to the dispute resolver.
    pub fn dispute(
        &self,
        actor: Actor,
        order_id: OrderId,
        reason: &str,
    ) -> Result<Order, EngineError> {
        let order = self.orders.update(order_id, |o| {
            if !o.is_party(actor.user) {
                return Err(EngineError::forbidden(actor.user, "dispute this order"));
            }
            if !o.status.can_transition_to(OrderStatus::Disputed) {
                return Err(EngineError::invalid_order_state(o.id, o.status, "dispute"));
            }
            o.status = OrderStatus::Disputed;
            o.disputed_at = Some(Utc::now());
            o.dispute_reason = Some(reason.to_string());
            Ok(())
        })?;

        info!(order = order.id, by = actor.user, "order disputed");
        let counterparty = if actor.user == order.renter {
            order.owner
        } else {
            order.renter
        };
        self.notify(
            counterparty,
            "Order disputed",
            format!("Order for {} was escalated to a dispute", order.snapshot.title),
            &order,
        );
        Ok(order)
    }

    /// Drive a disputed order to completion after arbitration
    ///
    /// Called by the dispute resolver with its one-shot decision; sets the
    /// payment status to refunded or paid depending on the awarded amount.
    pub(crate) fn close_disputed(
        &self,
        order_id: OrderId,
        refunded: bool,
    ) -> Result<Order, EngineError> {
        self.orders.update(order_id, |o| {
            if o.status != OrderStatus::Disputed {
                return Err(EngineError::invalid_order_state(
                    o.id,
                    o.status,
                    "settle dispute",
                ));
            }
            o.status = OrderStatus::Completed;
            o.completed_at = Some(Utc::now());
            o.payment_status = if refunded {
                PaymentStatus::Refunded
            } else {
                PaymentStatus::Paid
            };
            Ok(())
        })
    }

    /// Get an order, visible to its parties and to operators
    pub fn get(&self, actor: Actor, order_id: OrderId) -> Result<Order, EngineError> {
        let order = self
            .orders
            .get(order_id)
            .ok_or(EngineError::OrderNotFound { order: order_id })?;
        if !order.is_party(actor.user) && !actor.is_operator() {
            return Err(EngineError::forbidden(actor.user, "view this order"));
        }
        Ok(order)
    }

    /// Orders the user rents, sorted by id
    pub fn orders_rented_by(&self, user: UserId) -> Vec<Order> {
        self.orders.list_for_renter(user)
    }

    /// Orders the user owns, sorted by id
    pub fn orders_owned_by(&self, user: UserId) -> Vec<Order> {
        self.orders.list_for_owner(user)
    }

    /// Disputed orders for the operator dashboard
    pub fn disputed_orders(&self) -> Vec<Order> {
        self.orders.list_by_status(OrderStatus::Disputed)
    }

    /// Hide a finished order from the caller's listings
    ///
    /// Soft delete only; the record stays in the store. Active orders cannot
    /// be deleted.
    pub fn delete(&self, actor: Actor, order_id: OrderId) -> Result<(), EngineError> {
        self.orders.update(order_id, |o| {
            if !o.is_party(actor.user) {
                return Err(EngineError::forbidden(actor.user, "delete this order"));
            }
            if !o.status.is_terminal() {
                return Err(EngineError::invalid_order_state(o.id, o.status, "delete"));
            }
            o.is_deleted = true;
            Ok(())
        })?;
        Ok(())
    }

    fn notify(&self, user: UserId, title: &str, body: String, order: &Order) {
        let notification = Notification {
            user,
            title: title.to_string(),
            body,
            metadata: json!({
                "order": order.id,
                "guid": order.guid,
                "status": order.status,
            }),
        };
        if let Err(e) = self.notifier.notify(notification) {
            warn!(user, error = %e, "notification delivery failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ledger_store::LedgerStore;
    use crate::gateway::RecordingNotifier;
    use crate::types::{Item, ItemStatus, PaymentMethod, PriceUnit};
    use chrono::Duration;

    struct Harness {
        inventory: Arc<InventoryCoordinator>,
        ledger: Arc<WalletLedger>,
        notifier: Arc<RecordingNotifier>,
        manager: Arc<OrderLifecycleManager>,
    }

    const OWNER: u64 = 10;
    const RENTER: u64 = 20;

    fn setup() -> Harness {
        let orders = Arc::new(OrderStore::new());
        let inventory = Arc::new(InventoryCoordinator::new());
        let store = Arc::new(LedgerStore::new());
        let ledger = Arc::new(WalletLedger::new(store, EngineConfig::default()));
        let notifier = Arc::new(RecordingNotifier::new());
        let manager = Arc::new(OrderLifecycleManager::new(
            orders,
            Arc::clone(&inventory),
            Arc::clone(&ledger),
            Arc::clone(&notifier) as Arc<dyn Notifier>,
            EngineConfig::default(),
        ));
        Harness {
            inventory,
            ledger,
            notifier,
            manager,
        }
    }

    fn seed_item(harness: &Harness, quantity: u32) -> Item {
        let item = Item {
            id: 1,
            owner: OWNER,
            title: "Camping tent".to_string(),
            image_url: Some("https://img.example.test/tent.jpg".to_string()),
            base_price: Decimal::new(20_000, 0),
            deposit_amount: Decimal::new(100_000, 0),
            price_unit: PriceUnit::Day,
            status: ItemStatus::Available,
            is_deleted: false,
            quantity,
            available_quantity: quantity,
        };
        harness.inventory.upsert(item.clone());
        item
    }

    fn request(start_offset_hours: i64) -> OrderRequest {
        let now = Utc::now();
        OrderRequest {
            item_id: 1,
            unit_count: 1,
            start_at: now + Duration::hours(start_offset_hours),
            end_at: now + Duration::hours(start_offset_hours) + Duration::days(3),
            shipping_address: "25 Ly Thuong Kiet".to_string(),
            payment_method: PaymentMethod::Gateway,
        }
    }

    fn create_order(harness: &Harness) -> Order {
        harness
            .manager
            .create(Actor::renter(RENTER), request(-1))
            .unwrap()
    }

    fn confirmed_order(harness: &Harness) -> Order {
        let order = create_order(harness);
        harness
            .manager
            .confirm(Actor::owner(OWNER), order.id)
            .unwrap()
    }

    fn progressed_order(harness: &Harness) -> Order {
        let order = confirmed_order(harness);
        harness.manager.start(Actor::owner(OWNER), order.id).unwrap()
    }

    fn returned_order(harness: &Harness) -> Order {
        let order = progressed_order(harness);
        harness
            .manager
            .renter_return(Actor::renter(RENTER), order.id, Some("left at the door".into()))
            .unwrap()
    }

    #[test]
    fn test_create_prices_order_and_snapshots_item() {
        let harness = setup();
        seed_item(&harness, 3);

        let mut req = request(1);
        req.unit_count = 2;
        let order = harness.manager.create(Actor::renter(RENTER), req).unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.payment_status, PaymentStatus::NotPaid);
        // rental 40,000 + 5% fee 2,000 + 8% tax 3,200
        assert_eq!(order.service_fee, Decimal::new(2_000, 0));
        assert_eq!(order.total_amount, Decimal::new(45_200, 0));
        assert_eq!(order.deposit_amount, Decimal::new(200_000, 0));
        assert_eq!(order.snapshot.title, "Camping tent");
        assert_eq!(order.snapshot.base_price, Decimal::new(20_000, 0));

        // Creation holds no stock
        assert_eq!(harness.inventory.get(1).unwrap().available_quantity, 3);
        // Owner got notified
        assert_eq!(harness.notifier.sent().len(), 1);
        assert_eq!(harness.notifier.sent()[0].user, OWNER);
    }

    #[test]
    fn test_create_snapshot_survives_catalog_edits() {
        let harness = setup();
        let mut item = seed_item(&harness, 3);
        let order = create_order(&harness);

        item.base_price = Decimal::new(99_000, 0);
        item.title = "Renamed".to_string();
        harness.inventory.upsert(item);

        let fetched = harness.manager.get(Actor::renter(RENTER), order.id).unwrap();
        assert_eq!(fetched.snapshot.base_price, Decimal::new(20_000, 0));
        assert_eq!(fetched.snapshot.title, "Camping tent");
    }

    #[test]
    fn test_create_validation_failures() {
        let harness = setup();
        seed_item(&harness, 3);
        let actor = Actor::renter(RENTER);

        let mut bad_units = request(1);
        bad_units.unit_count = 0;
        assert!(matches!(
            harness.manager.create(actor, bad_units).unwrap_err(),
            EngineError::InvalidUnitCount { count: 0 }
        ));

        let mut bad_period = request(1);
        bad_period.end_at = bad_period.start_at;
        assert!(matches!(
            harness.manager.create(actor, bad_period).unwrap_err(),
            EngineError::InvalidRentalPeriod { .. }
        ));

        let mut bad_address = request(1);
        bad_address.shipping_address = "   ".to_string();
        assert!(matches!(
            harness.manager.create(actor, bad_address).unwrap_err(),
            EngineError::MissingShippingAddress
        ));
    }

    #[test]
    fn test_create_rejects_missing_or_unrentable_items() {
        let harness = setup();
        let mut item = seed_item(&harness, 3);
        let actor = Actor::renter(RENTER);

        let mut unknown = request(1);
        unknown.item_id = 99;
        assert!(matches!(
            harness.manager.create(actor, unknown).unwrap_err(),
            EngineError::ItemNotFound { item: 99 }
        ));

        item.is_deleted = true;
        harness.inventory.upsert(item.clone());
        assert!(matches!(
            harness.manager.create(actor, request(1)).unwrap_err(),
            EngineError::ItemNotRentable { item: 1 }
        ));

        item.is_deleted = false;
        item.status = ItemStatus::Unlisted;
        harness.inventory.upsert(item);
        assert!(matches!(
            harness.manager.create(actor, request(1)).unwrap_err(),
            EngineError::ItemNotRentable { item: 1 }
        ));
    }

    #[test]
    fn test_create_rejects_owner_renting_own_item() {
        let harness = setup();
        seed_item(&harness, 3);

        let result = harness.manager.create(Actor::renter(OWNER), request(1));

        assert!(matches!(result.unwrap_err(), EngineError::Forbidden { .. }));
    }

    #[test]
    fn test_create_rejects_insufficient_availability() {
        let harness = setup();
        seed_item(&harness, 1);

        let mut req = request(1);
        req.unit_count = 2;
        let result = harness.manager.create(Actor::renter(RENTER), req);

        assert!(matches!(result.unwrap_err(), EngineError::OutOfStock { item: 1 }));
    }

    #[test]
    fn test_confirm_reserves_one_unit() {
        let harness = setup();
        seed_item(&harness, 3);
        let order = create_order(&harness);

        let confirmed = harness
            .manager
            .confirm(Actor::owner(OWNER), order.id)
            .unwrap();

        assert_eq!(confirmed.status, OrderStatus::Confirmed);
        assert!(confirmed.confirmed_at.is_some());
        assert_eq!(harness.inventory.get(1).unwrap().available_quantity, 2);
    }

    #[test]
    fn test_confirm_requires_owner() {
        let harness = setup();
        seed_item(&harness, 3);
        let order = create_order(&harness);

        let result = harness.manager.confirm(Actor::owner(RENTER), order.id);

        assert!(matches!(result.unwrap_err(), EngineError::Forbidden { .. }));
        assert_eq!(harness.inventory.get(1).unwrap().available_quantity, 3);
    }

    #[test]
    fn test_confirm_requires_pending_status() {
        let harness = setup();
        seed_item(&harness, 3);
        let order = confirmed_order(&harness);

        let result = harness.manager.confirm(Actor::owner(OWNER), order.id);

        assert!(matches!(
            result.unwrap_err(),
            EngineError::InvalidOrderState {
                current: OrderStatus::Confirmed,
                ..
            }
        ));
        // No double reservation
        assert_eq!(harness.inventory.get(1).unwrap().available_quantity, 2);
    }

    #[test]
    fn test_confirm_race_on_last_unit_admits_exactly_one() {
        use std::thread;

        let harness = setup();
        seed_item(&harness, 1);
        let first = create_order(&harness);
        let second = harness
            .manager
            .create(Actor::renter(30), request(-1))
            .unwrap();

        let manager_a = Arc::clone(&harness.manager);
        let manager_b = Arc::clone(&harness.manager);
        let handle_a = thread::spawn(move || manager_a.confirm(Actor::owner(OWNER), first.id));
        let handle_b = thread::spawn(move || manager_b.confirm(Actor::owner(OWNER), second.id));

        let results = [handle_a.join().unwrap(), handle_b.join().unwrap()];
        let confirmed = results.iter().filter(|r| r.is_ok()).count();
        let conflicts = results
            .iter()
            .filter(|r| matches!(r, Err(EngineError::OutOfStock { .. })))
            .count();

        assert_eq!(confirmed, 1);
        assert_eq!(conflicts, 1);
        assert_eq!(harness.inventory.get(1).unwrap().available_quantity, 0);
    }

    #[test]
    fn test_start_requires_window_open() {
        let harness = setup();
        seed_item(&harness, 3);
        let order = harness
            .manager
            .create(Actor::renter(RENTER), request(2))
            .unwrap();
        harness
            .manager
            .confirm(Actor::owner(OWNER), order.id)
            .unwrap();

        let result = harness.manager.start(Actor::owner(OWNER), order.id);

        assert!(matches!(
            result.unwrap_err(),
            EngineError::RentalPeriodNotStarted { .. }
        ));
    }

    #[test]
    fn test_start_transitions_to_progress() {
        let harness = setup();
        seed_item(&harness, 3);
        let order = confirmed_order(&harness);

        let started = harness.manager.start(Actor::owner(OWNER), order.id).unwrap();

        assert_eq!(started.status, OrderStatus::Progress);
        assert!(started.started_at.is_some());
    }

    #[test]
    fn test_renter_return_records_timestamp_and_notes() {
        let harness = setup();
        seed_item(&harness, 3);
        let order = progressed_order(&harness);

        let returned = harness
            .manager
            .renter_return(Actor::renter(RENTER), order.id, Some("scratched lens".into()))
            .unwrap();

        assert_eq!(returned.status, OrderStatus::Returned);
        let info = returned.return_info.unwrap();
        assert_eq!(info.notes.as_deref(), Some("scratched lens"));
        assert!(info.condition.is_none());
        assert_eq!(info.damage_fee, Decimal::ZERO);
    }

    #[test]
    fn test_renter_return_requires_renter_and_progress() {
        let harness = setup();
        seed_item(&harness, 3);
        let order = confirmed_order(&harness);

        assert!(matches!(
            harness
                .manager
                .renter_return(Actor::renter(RENTER), order.id, None)
                .unwrap_err(),
            EngineError::InvalidOrderState { .. }
        ));

        let order = harness.manager.start(Actor::owner(OWNER), order.id).unwrap();
        assert!(matches!(
            harness
                .manager
                .renter_return(Actor::renter(OWNER), order.id, None)
                .unwrap_err(),
            EngineError::Forbidden { .. }
        ));
    }

    #[test]
    fn test_owner_complete_good_condition_restores_inventory() {
        let harness = setup();
        seed_item(&harness, 3);
        let order = returned_order(&harness);

        let completed = harness
            .manager
            .owner_complete(Actor::owner(OWNER), order.id, ItemCondition::Good, Decimal::ZERO)
            .unwrap();

        assert_eq!(completed.status, OrderStatus::Completed);
        assert_eq!(completed.payment_status, PaymentStatus::Paid);
        assert!(completed.completed_at.is_some());
        let info = completed.return_info.unwrap();
        assert_eq!(info.condition, Some(ItemCondition::Good));
        assert_eq!(info.confirmed_by, Some(OWNER));

        let item = harness.inventory.get(1).unwrap();
        assert_eq!(item.quantity, 3);
        assert_eq!(item.available_quantity, 3);
        // No damage fee, no ledger entry
        assert!(harness.ledger.transactions_for(OWNER).is_empty());
    }

    #[test]
    fn test_owner_complete_lost_writes_off_inventory() {
        let harness = setup();
        seed_item(&harness, 3);
        let order = returned_order(&harness);

        let completed = harness
            .manager
            .owner_complete(Actor::owner(OWNER), order.id, ItemCondition::Lost, Decimal::ZERO)
            .unwrap();

        assert_eq!(completed.status, OrderStatus::Completed);
        assert_eq!(completed.payment_status, PaymentStatus::Paid);

        let item = harness.inventory.get(1).unwrap();
        assert_eq!(item.quantity, 2);
        assert!(item.available_quantity <= 2);
    }

    #[test]
    fn test_owner_complete_with_damage_fee_settles_partial_and_credits_owner() {
        let harness = setup();
        seed_item(&harness, 3);
        let order = returned_order(&harness);
        let fee = Decimal::new(25_000, 0);

        let completed = harness
            .manager
            .owner_complete(
                Actor::owner(OWNER),
                order.id,
                ItemCondition::SlightlyDamaged,
                fee,
            )
            .unwrap();

        assert_eq!(completed.payment_status, PaymentStatus::Partial);
        assert_eq!(completed.return_info.unwrap().damage_fee, fee);

        let txs = harness.ledger.transactions_for(OWNER);
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].kind, TransactionKind::DamageFee);
        assert_eq!(txs[0].amount, fee);
        assert_eq!(txs[0].order, Some(order.id));
        assert_eq!(harness.ledger.wallet(OWNER).balance, fee);
    }

    #[test]
    fn test_owner_complete_requires_reported_return() {
        let harness = setup();
        seed_item(&harness, 3);
        let order = progressed_order(&harness);

        let result = harness.manager.owner_complete(
            Actor::owner(OWNER),
            order.id,
            ItemCondition::Good,
            Decimal::ZERO,
        );

        assert!(matches!(
            result.unwrap_err(),
            EngineError::ReturnNotReported { .. }
        ));
        // Inventory untouched by the failed completion
        assert_eq!(harness.inventory.get(1).unwrap().available_quantity, 2);
    }

    #[test]
    fn test_owner_complete_rejects_negative_fee() {
        let harness = setup();
        seed_item(&harness, 3);
        let order = returned_order(&harness);

        let result = harness.manager.owner_complete(
            Actor::owner(OWNER),
            order.id,
            ItemCondition::Good,
            Decimal::new(-1, 0),
        );

        assert!(matches!(result.unwrap_err(), EngineError::InvalidAmount { .. }));
    }

    #[test]
    fn test_cancel_pending_by_either_party_leaves_inventory_alone() {
        let harness = setup();
        seed_item(&harness, 3);

        let by_renter = create_order(&harness);
        let cancelled = harness
            .manager
            .cancel(Actor::renter(RENTER), by_renter.id, "changed my mind")
            .unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(cancelled.cancel_reason.as_deref(), Some("changed my mind"));

        let by_owner = create_order(&harness);
        harness
            .manager
            .cancel(Actor::owner(OWNER), by_owner.id, "item damaged in storage")
            .unwrap();

        assert_eq!(harness.inventory.get(1).unwrap().available_quantity, 3);
    }

    #[test]
    fn test_cancel_confirmed_owner_only_and_restores_inventory() {
        let harness = setup();
        seed_item(&harness, 3);
        let order = confirmed_order(&harness);
        assert_eq!(harness.inventory.get(1).unwrap().available_quantity, 2);

        let by_renter = harness
            .manager
            .cancel(Actor::renter(RENTER), order.id, "too slow");
        assert!(matches!(by_renter.unwrap_err(), EngineError::Forbidden { .. }));

        let cancelled = harness
            .manager
            .cancel(Actor::owner(OWNER), order.id, "cannot fulfil")
            .unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(harness.inventory.get(1).unwrap().available_quantity, 3);
    }

    #[test]
    fn test_cancel_rejected_once_rental_started() {
        let harness = setup();
        seed_item(&harness, 3);
        let order = progressed_order(&harness);

        let result = harness.manager.cancel(Actor::owner(OWNER), order.id, "late");

        assert!(matches!(
            result.unwrap_err(),
            EngineError::InvalidOrderState {
                current: OrderStatus::Progress,
                ..
            }
        ));
    }

    #[test]
    fn test_dispute_reachable_from_active_states_only() {
        let harness = setup();
        seed_item(&harness, 4);

        let pending = create_order(&harness);
        let disputed = harness
            .manager
            .dispute(Actor::renter(RENTER), pending.id, "owner unresponsive")
            .unwrap();
        assert_eq!(disputed.status, OrderStatus::Disputed);
        assert!(disputed.disputed_at.is_some());
        assert_eq!(
            disputed.dispute_reason.as_deref(),
            Some("owner unresponsive")
        );

        let cancelled = create_order(&harness);
        harness
            .manager
            .cancel(Actor::renter(RENTER), cancelled.id, "n/a")
            .unwrap();
        assert!(matches!(
            harness
                .manager
                .dispute(Actor::renter(RENTER), cancelled.id, "x")
                .unwrap_err(),
            EngineError::InvalidOrderState { .. }
        ));
    }

    #[test]
    fn test_dispute_requires_a_party() {
        let harness = setup();
        seed_item(&harness, 3);
        let order = create_order(&harness);

        let result = harness.manager.dispute(Actor::renter(77), order.id, "not mine");

        assert!(matches!(result.unwrap_err(), EngineError::Forbidden { .. }));
    }

    #[test]
    fn test_terminal_states_reject_all_transitions() {
        let harness = setup();
        seed_item(&harness, 3);
        let order = returned_order(&harness);
        harness
            .manager
            .owner_complete(Actor::owner(OWNER), order.id, ItemCondition::Good, Decimal::ZERO)
            .unwrap();

        let owner = Actor::owner(OWNER);
        let renter = Actor::renter(RENTER);
        assert!(harness.manager.confirm(owner, order.id).is_err());
        assert!(harness.manager.start(owner, order.id).is_err());
        assert!(harness.manager.renter_return(renter, order.id, None).is_err());
        assert!(harness.manager.cancel(owner, order.id, "late").is_err());
        assert!(harness.manager.dispute(renter, order.id, "x").is_err());
        assert!(harness
            .manager
            .owner_complete(owner, order.id, ItemCondition::Good, Decimal::ZERO)
            .is_err());
    }

    #[test]
    fn test_full_flow_inventory_scenario() {
        let harness = setup();
        seed_item(&harness, 3);

        // create: no stock held
        let order = create_order(&harness);
        assert_eq!(harness.inventory.get(1).unwrap().available_quantity, 3);

        // confirm: one unit reserved
        harness
            .manager
            .confirm(Actor::owner(OWNER), order.id)
            .unwrap();
        assert_eq!(harness.inventory.get(1).unwrap().available_quantity, 2);

        // owner cancel: reservation undone
        let cancelled = harness
            .manager
            .cancel(Actor::owner(OWNER), order.id, "cannot fulfil")
            .unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(harness.inventory.get(1).unwrap().available_quantity, 3);
    }

    #[test]
    fn test_delete_hides_terminal_orders_only() {
        let harness = setup();
        seed_item(&harness, 3);
        let active = create_order(&harness);

        assert!(matches!(
            harness
                .manager
                .delete(Actor::renter(RENTER), active.id)
                .unwrap_err(),
            EngineError::InvalidOrderState { .. }
        ));

        harness
            .manager
            .cancel(Actor::renter(RENTER), active.id, "n/a")
            .unwrap();
        harness.manager.delete(Actor::renter(RENTER), active.id).unwrap();

        assert!(harness.manager.orders_rented_by(RENTER).is_empty());
        assert!(matches!(
            harness
                .manager
                .get(Actor::renter(RENTER), active.id)
                .unwrap_err(),
            EngineError::OrderNotFound { .. }
        ));
    }

    #[test]
    fn test_get_is_limited_to_parties_and_operators() {
        let harness = setup();
        seed_item(&harness, 3);
        let order = create_order(&harness);

        assert!(harness.manager.get(Actor::renter(RENTER), order.id).is_ok());
        assert!(harness.manager.get(Actor::owner(OWNER), order.id).is_ok());
        assert!(harness.manager.get(Actor::operator(99), order.id).is_ok());
        assert!(matches!(
            harness.manager.get(Actor::renter(77), order.id).unwrap_err(),
            EngineError::Forbidden { .. }
        ));
    }

    #[test]
    fn test_transitions_notify_the_counterparty() {
        let harness = setup();
        seed_item(&harness, 3);
        let order = create_order(&harness);
        harness
            .manager
            .confirm(Actor::owner(OWNER), order.id)
            .unwrap();

        let sent = harness.notifier.sent();
        assert_eq!(sent.len(), 2);
        // create notifies the owner, confirm notifies the renter
        assert_eq!(sent[0].user, OWNER);
        assert_eq!(sent[1].user, RENTER);
        assert_eq!(sent[1].metadata["order"], order.id);
    }
}
