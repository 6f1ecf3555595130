//! Two-phase withdrawal workflow
//!
//! Withdrawals move through three steps:
//!
//! 1. **request** (user) creates a pending ledger entry; no balance effect
//! 2. **review** (operator) approves or rejects; still no balance effect,
//!    the approval is a policy decision taken before funds move
//! 3. **complete** (operator) re-checks the balance and debits the wallet;
//!    this is the only irreversible financial step
//!
//! Time passes between approval and completion, so completion re-evaluates
//! `balance >= amount` inside the same atomic unit as the debit; an approval
//! is never a reservation.

use crate::core::ledger_store::LedgerStore;
use crate::core::wallet_ledger::{require_positive, WalletLedger};
use crate::types::{
    Actor, EngineError, TransactionId, TransactionKind, TransactionStatus, WalletTransaction,
};
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;

/// Driver of the request/review/complete withdrawal process
#[derive(Debug, Clone)]
pub struct WithdrawalWorkflow {
    ledger: Arc<WalletLedger>,
    store: Arc<LedgerStore>,
}

impl WithdrawalWorkflow {
    /// Create a workflow over the given ledger and entry store
    pub fn new(ledger: Arc<WalletLedger>, store: Arc<LedgerStore>) -> Self {
        Self { ledger, store }
    }

    /// Request a withdrawal to the given bank account
    ///
    /// Creates a pending withdrawal entry. The wallet is untouched; the
    /// balance check happens at completion, not here.
    ///
    /// # Errors
    ///
    /// * [`EngineError::InvalidAmount`] for non-positive amounts
    /// * [`EngineError::FractionalWithdrawal`] for non-integer amounts;
    ///   bank transfers are made in whole currency units
    pub fn request(
        &self,
        actor: Actor,
        amount: Decimal,
        bank_account: &str,
    ) -> Result<WalletTransaction, EngineError> {
        require_positive(amount)?;
        if amount != amount.trunc() {
            return Err(EngineError::FractionalWithdrawal { amount });
        }

        let order_code = self.ledger.next_order_code();
        let tx = self.store.insert(|id| WalletTransaction {
            id,
            user: actor.user,
            order: None,
            order_code: order_code.clone(),
            kind: TransactionKind::Withdraw,
            amount,
            balance_after: None,
            status: TransactionStatus::Pending,
            bank_account: Some(bank_account.to_string()),
            reviewed_by: None,
            reviewed_at: None,
            created_at: Utc::now(),
            settled_at: None,
        })?;

        info!(
            user = actor.user,
            tx = tx.id,
            amount = %amount,
            "withdrawal requested"
        );
        Ok(tx)
    }

    /// Approve or reject a pending withdrawal
    ///
    /// A policy decision with no balance effect. Each withdrawal is reviewed
    /// exactly once: the pending-status guard runs inside the entry's atomic
    /// unit, so two racing reviews cannot both pass.
    ///
    /// # Errors
    ///
    /// * [`EngineError::OperatorRequired`] if the actor lacks the role
    /// * [`EngineError::TransactionNotFound`] for unknown entries
    /// * [`EngineError::NotAWithdrawal`] if the entry is not a withdrawal
    /// * [`EngineError::TransactionAlreadyReviewed`] if already reviewed
    pub fn review(
        &self,
        operator: Actor,
        tx_id: TransactionId,
        approve: bool,
    ) -> Result<WalletTransaction, EngineError> {
        if !operator.is_operator() {
            return Err(EngineError::operator_required(
                operator.user,
                "review withdrawals",
            ));
        }

        let tx = self.store.update(tx_id, |tx| {
            if tx.kind != TransactionKind::Withdraw {
                return Err(EngineError::NotAWithdrawal { tx: tx.id });
            }
            if tx.status != TransactionStatus::Pending {
                return Err(EngineError::TransactionAlreadyReviewed {
                    tx: tx.id,
                    status: tx.status,
                });
            }
            tx.status = if approve {
                TransactionStatus::Approved
            } else {
                TransactionStatus::Rejected
            };
            tx.reviewed_by = Some(operator.user);
            tx.reviewed_at = Some(Utc::now());
            Ok(())
        })?;

        info!(tx = tx.id, status = %tx.status, "withdrawal reviewed");
        Ok(tx)
    }

    /// Execute an approved withdrawal
    ///
    /// The only step that touches the wallet. Runs entirely inside the
    /// entry's atomic unit: the approved-status guard, the fresh
    /// `balance >= amount` check, the debit, and the `balance_after` write
    /// all commit together or not at all.
    ///
    /// # Errors
    ///
    /// * [`EngineError::OperatorRequired`] if the actor lacks the role
    /// * [`EngineError::TransactionNotFound`] for unknown entries
    /// * [`EngineError::NotAWithdrawal`] if the entry is not a withdrawal
    /// * [`EngineError::WithdrawalNotApproved`] unless status is approved
    /// * [`EngineError::InsufficientFunds`] if the balance dropped since
    ///   approval
    pub fn complete(
        &self,
        operator: Actor,
        tx_id: TransactionId,
    ) -> Result<WalletTransaction, EngineError> {
        if !operator.is_operator() {
            return Err(EngineError::operator_required(
                operator.user,
                "complete withdrawals",
            ));
        }

        let tx = self.store.update(tx_id, |tx| {
            if tx.kind != TransactionKind::Withdraw {
                return Err(EngineError::NotAWithdrawal { tx: tx.id });
            }
            if tx.status != TransactionStatus::Approved {
                return Err(EngineError::WithdrawalNotApproved {
                    tx: tx.id,
                    status: tx.status,
                });
            }
            if tx.is_settled() {
                return Err(EngineError::already_settled(tx.id));
            }
            let balance = self.ledger.debit_balance(tx.user, tx.amount)?;
            tx.balance_after = Some(balance);
            tx.status = TransactionStatus::Completed;
            tx.settled_at = Some(Utc::now());
            Ok(())
        })?;

        info!(
            tx = tx.id,
            balance_after = ?tx.balance_after,
            "withdrawal completed"
        );
        Ok(tx)
    }

    /// Withdrawals awaiting review, oldest first
    ///
    /// Backs the operator dashboard.
    pub fn pending(&self) -> Vec<WalletTransaction> {
        self.withdrawals_in(TransactionStatus::Pending)
    }

    /// Withdrawals approved but not yet executed, oldest first
    pub fn approved(&self) -> Vec<WalletTransaction> {
        self.withdrawals_in(TransactionStatus::Approved)
    }

    fn withdrawals_in(&self, status: TransactionStatus) -> Vec<WalletTransaction> {
        self.store
            .list_by_status(status)
            .into_iter()
            .filter(|tx| tx.kind == TransactionKind::Withdraw)
            .collect()
    }
}
