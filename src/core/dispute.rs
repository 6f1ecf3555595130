//! Dispute arbitration
//!
//! This module provides the `DisputeResolver`, the owner of dispute records
//! and the component that turns an operator's one-shot decision into the
//! order's final settlement. Resolution drives the disputed order to
//! `completed` with its payment status set to refunded or paid depending on
//! the awarded amount.
//!
//! The resolver records the decision; it does not move wallet funds itself.
//! Refund execution is delegated to the [`WalletLedger`] by the caller using
//! the awarded amount, which keeps arbitration a pure decision record.
//!
//! [`WalletLedger`]: crate::core::WalletLedger

use crate::core::order_lifecycle::OrderLifecycleManager;
use crate::types::{Actor, DisputeId, EngineError, Order, OrderId, UserId};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

/// State of a dispute record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisputeStatus {
    /// Awaiting an operator decision
    Pending,
    /// Decided; the associated order was settled
    Resolved,
}

/// One escalated order awaiting (or carrying) an arbitration decision
#[derive(Debug, Clone, PartialEq)]
pub struct Dispute {
    pub id: DisputeId,
    pub order: OrderId,
    pub opened_by: UserId,
    pub reason: String,
    pub status: DisputeStatus,

    /// Operator's written decision, set at resolution
    pub decision: Option<String>,

    /// Amount awarded back to the renter; zero means no refund
    pub refund_amount: Option<Decimal>,

    pub opened_at: DateTime<Utc>,
    pub resolved_by: Option<UserId>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Arbiter of disputed orders
///
/// Each dispute is resolved exactly once: the pending-status guard runs
/// while the dispute's entry lock is held, and the order transition happens
/// under that same lock (dispute before order in the engine-wide lock
/// order).
pub struct DisputeResolver {
    disputes: DashMap<DisputeId, Dispute>,
    next_id: AtomicU64,
    lifecycle: Arc<OrderLifecycleManager>,
}

impl DisputeResolver {
    /// Create a resolver over the given lifecycle manager
    pub fn new(lifecycle: Arc<OrderLifecycleManager>) -> Self {
        Self {
            disputes: DashMap::new(),
            next_id: AtomicU64::new(1),
            lifecycle,
        }
    }

    /// Escalate an order and open its dispute record
    ///
    /// Delegates the state transition (party check, active-state guard) to
    /// the lifecycle manager; the record is created only if the transition
    /// committed.
    pub fn open(
        &self,
        actor: Actor,
        order_id: OrderId,
        reason: &str,
    ) -> Result<Dispute, EngineError> {
        let order = self.lifecycle.dispute(actor, order_id, reason)?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let dispute = Dispute {
            id,
            order: order.id,
            opened_by: actor.user,
            reason: reason.to_string(),
            status: DisputeStatus::Pending,
            decision: None,
            refund_amount: None,
            opened_at: Utc::now(),
            resolved_by: None,
            resolved_at: None,
        };
        self.disputes.insert(id, dispute.clone());

        info!(dispute = id, order = order.id, by = actor.user, "dispute opened");
        Ok(dispute)
    }

    /// Record the arbitration decision and settle the order
    ///
    /// Callable once per dispute. Drives the order to `completed` with
    /// payment status `refunded` when `refund_amount > 0`, `paid` otherwise.
    /// The caller executes the refund itself through the wallet ledger.
    ///
    /// # Errors
    ///
    /// * [`EngineError::OperatorRequired`] if the actor lacks the role
    /// * [`EngineError::InvalidAmount`] for negative refund amounts
    /// * [`EngineError::DisputeNotFound`] for unknown disputes
    /// * [`EngineError::DisputeAlreadyResolved`] on a second resolution
    pub fn resolve(
        &self,
        operator: Actor,
        dispute_id: DisputeId,
        decision: &str,
        refund_amount: Decimal,
    ) -> Result<Dispute, EngineError> {
        if !operator.is_operator() {
            return Err(EngineError::operator_required(
                operator.user,
                "resolve disputes",
            ));
        }
        if refund_amount.is_sign_negative() {
            return Err(EngineError::invalid_amount(refund_amount));
        }

        let mut entry = self
            .disputes
            .get_mut(&dispute_id)
            .ok_or(EngineError::DisputeNotFound {
                dispute: dispute_id,
            })?;
        let dispute = entry.value_mut();
        if dispute.status != DisputeStatus::Pending {
            return Err(EngineError::DisputeAlreadyResolved {
                dispute: dispute_id,
            });
        }

        let refunded = refund_amount > Decimal::ZERO;
        self.lifecycle.close_disputed(dispute.order, refunded)?;

        dispute.status = DisputeStatus::Resolved;
        dispute.decision = Some(decision.to_string());
        dispute.refund_amount = Some(refund_amount);
        dispute.resolved_by = Some(operator.user);
        dispute.resolved_at = Some(Utc::now());

        info!(
            dispute = dispute_id,
            order = dispute.order,
            refund = %refund_amount,
            "dispute resolved"
        );
        Ok(dispute.clone())
    }

    /// Get a snapshot of a dispute
    pub fn get(&self, dispute_id: DisputeId) -> Option<Dispute> {
        self.disputes
            .get(&dispute_id)
            .map(|entry| entry.value().clone())
    }

    /// Unresolved disputes for the operator dashboard, oldest first
    pub fn pending(&self) -> Vec<Dispute> {
        let mut disputes: Vec<Dispute> = self
            .disputes
            .iter()
            .filter(|entry| entry.status == DisputeStatus::Pending)
            .map(|entry| entry.value().clone())
            .collect();
        disputes.sort_by_key(|dispute| dispute.id);
        disputes
    }

    /// Disputed orders paired with the dashboard listing
    pub fn disputed_orders(&self) -> Vec<Order> {
        self.lifecycle.disputed_orders()
    }
}
