//! Wallet balance mutation and ledger entry settlement
//!
//! This module provides the `WalletLedger`, the only component that touches
//! wallet balances. Every mutation leaves behind a [`WalletTransaction`] and
//! writes its `balance_after` at the moment the effect is applied, giving
//! operators a reconstructible balance history.
//!
//! # Atomicity and lock order
//!
//! Settlement paths hold the ledger entry's lock (via
//! [`LedgerStore::update`]) and take the wallet's entry lock inside it.
//! That fixed order, entry before wallet, is shared with the withdrawal
//! workflow and the webhook processor and keeps nested units deadlock-free.
//! The "already settled" guard therefore runs inside the same atomic unit as
//! the balance write it protects.

use crate::config::EngineConfig;
use crate::core::ledger_store::LedgerStore;
use crate::gateway::{CheckoutSession, PaymentGateway, PaymentRequest};
use crate::types::{
    Actor, EngineError, OrderId, TransactionId, TransactionKind, TransactionStatus, UserId,
    Wallet, WalletTransaction,
};
use chrono::Utc;
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Thread-safe owner of wallet balances
///
/// Wallets are created lazily on first access. The ledger is cheap to share:
/// wrap it in an `Arc` and hand clones to the webhook processor and the
/// withdrawal workflow.
#[derive(Debug)]
pub struct WalletLedger {
    wallets: DashMap<UserId, Wallet>,
    store: Arc<LedgerStore>,
    config: EngineConfig,
    code_seq: AtomicU64,
}

impl WalletLedger {
    /// Create a ledger over the given entry store
    pub fn new(store: Arc<LedgerStore>, config: EngineConfig) -> Self {
        Self {
            wallets: DashMap::new(),
            store,
            config,
            code_seq: AtomicU64::new(1),
        }
    }

    /// Get a snapshot of a user's wallet, creating it on first access
    pub fn wallet(&self, user: UserId) -> Wallet {
        self.wallets
            .entry(user)
            .or_insert_with(|| Wallet::new(user, &self.config.currency))
            .clone()
    }

    /// All wallets, sorted by user id
    pub fn wallets(&self) -> Vec<Wallet> {
        let mut wallets: Vec<Wallet> = self
            .wallets
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        wallets.sort_by_key(|wallet| wallet.user);
        wallets
    }

    /// Ledger entries of one user, sorted by id
    pub fn transactions_for(&self, user: UserId) -> Vec<WalletTransaction> {
        self.store.list_for_user(user)
    }

    /// Request a gateway-funded deposit
    ///
    /// Calls the gateway first; only a successful gateway registration leaves
    /// a pending ledger entry behind, so a gateway failure has no partial
    /// state to clean up. The returned entry stays pending (`balance_after`
    /// unset) until the corresponding webhook callback settles it.
    ///
    /// # Errors
    ///
    /// * [`EngineError::InvalidAmount`] for non-positive amounts
    /// * [`EngineError::GatewayUnavailable`] when the gateway call fails
    pub fn request_deposit(
        &self,
        actor: Actor,
        amount: Decimal,
        gateway: &dyn PaymentGateway,
    ) -> Result<(WalletTransaction, CheckoutSession), EngineError> {
        require_positive(amount)?;

        let order_code = self.next_order_code();
        let request = PaymentRequest {
            order_code: order_code.clone(),
            amount,
            currency: self.config.currency.clone(),
            description: self.config.deposit_description.clone(),
            buyer: actor.user,
        };
        let session = gateway.create_payment_request(&request)?;

        let tx =
            self.insert_pending(actor.user, &order_code, amount, TransactionKind::Deposit, None)?;
        info!(
            user = actor.user,
            order_code = %order_code,
            amount = %amount,
            "deposit requested, awaiting gateway callback"
        );
        Ok((tx, session))
    }

    /// Register a pending deposit that was created elsewhere
    ///
    /// Used by the offline reconciliation tool to load a dump of pending
    /// entries before replaying gateway callbacks against them.
    ///
    /// # Errors
    ///
    /// * [`EngineError::InvalidAmount`] for non-positive amounts
    /// * [`EngineError::DuplicateOrderCode`] if the code is already taken
    pub fn import_pending_deposit(
        &self,
        user: UserId,
        order_code: &str,
        amount: Decimal,
    ) -> Result<WalletTransaction, EngineError> {
        require_positive(amount)?;
        self.insert_pending(user, order_code, amount, TransactionKind::Deposit, None)
    }

    /// Credit a wallet and settle the ledger entry immediately
    ///
    /// Used for refunds and damage fees, where no external confirmation is
    /// involved. The entry is created pending and settled under its own
    /// entry lock; if settlement fails the entry is removed again.
    ///
    /// # Errors
    ///
    /// * [`EngineError::InvalidAmount`] for non-positive amounts
    /// * [`EngineError::ArithmeticOverflow`] if the balance would overflow
    pub fn credit(
        &self,
        user: UserId,
        amount: Decimal,
        kind: TransactionKind,
        order: Option<OrderId>,
    ) -> Result<WalletTransaction, EngineError> {
        require_positive(amount)?;

        let code = self.next_order_code();
        let tx = self.insert_pending(user, &code, amount, kind, order)?;
        let id = tx.id;

        match self.settle_credit(id) {
            Ok(settled) => Ok(settled),
            Err(e) => {
                self.store.remove(id);
                Err(e)
            }
        }
    }

    /// Debit a wallet and settle the ledger entry immediately
    ///
    /// The insufficient-funds guard and the balance write run inside the
    /// wallet's entry lock, under the ledger entry's lock. If the debit
    /// fails the entry is removed again and the wallet is untouched.
    ///
    /// # Errors
    ///
    /// * [`EngineError::InvalidAmount`] for non-positive amounts
    /// * [`EngineError::InsufficientFunds`] if the balance is too low
    pub fn debit(
        &self,
        user: UserId,
        amount: Decimal,
        kind: TransactionKind,
        order: Option<OrderId>,
    ) -> Result<WalletTransaction, EngineError> {
        require_positive(amount)?;

        let code = self.next_order_code();
        let tx = self.insert_pending(user, &code, amount, kind, order)?;
        let id = tx.id;

        let result = self.store.update(id, |entry| {
            let balance = self.debit_balance(entry.user, entry.amount)?;
            entry.balance_after = Some(balance);
            entry.status = TransactionStatus::Completed;
            entry.settled_at = Some(Utc::now());
            Ok(())
        });

        match result {
            Ok(settled) => Ok(settled),
            Err(e) => {
                self.store.remove(id);
                Err(e)
            }
        }
    }

    /// Apply a pending credit to its wallet
    ///
    /// The idempotency boundary of the payment pipeline: an entry whose
    /// `balance_after` is already set, or that is no longer pending, is
    /// rejected with [`EngineError::AlreadySettled`] before the wallet is
    /// touched. Guard and balance write share the entry's atomic unit.
    pub(crate) fn settle_credit(
        &self,
        tx_id: TransactionId,
    ) -> Result<WalletTransaction, EngineError> {
        self.store.update(tx_id, |tx| {
            if tx.is_settled() || tx.status != TransactionStatus::Pending {
                return Err(EngineError::already_settled(tx.id));
            }
            let balance = self.credit_balance(tx.user, tx.amount)?;
            tx.balance_after = Some(balance);
            tx.status = TransactionStatus::Completed;
            tx.settled_at = Some(Utc::now());
            debug!(tx = tx.id, balance = %balance, "credit settled");
            Ok(())
        })
    }

    /// Mark a pending deposit as failed without any balance effect
    ///
    /// Same idempotency boundary as [`WalletLedger::settle_credit`]: settled
    /// or non-pending entries are rejected.
    pub(crate) fn mark_deposit_failed(
        &self,
        tx_id: TransactionId,
    ) -> Result<WalletTransaction, EngineError> {
        self.store.update(tx_id, |tx| {
            if tx.is_settled() || tx.status != TransactionStatus::Pending {
                return Err(EngineError::already_settled(tx.id));
            }
            tx.status = TransactionStatus::Failed;
            Ok(())
        })
    }

    /// Add to a wallet balance inside its entry lock
    pub(crate) fn credit_balance(
        &self,
        user: UserId,
        amount: Decimal,
    ) -> Result<Decimal, EngineError> {
        let mut entry = self
            .wallets
            .entry(user)
            .or_insert_with(|| Wallet::new(user, &self.config.currency));
        let wallet = entry.value_mut();
        wallet.balance = wallet
            .balance
            .checked_add(amount)
            .ok_or_else(|| EngineError::arithmetic_overflow("credit", user))?;
        Ok(wallet.balance)
    }

    /// Subtract from a wallet balance inside its entry lock
    ///
    /// The `balance >= amount` guard is evaluated under the same lock as the
    /// subtraction; concurrent debits of one wallet serialize here.
    pub(crate) fn debit_balance(
        &self,
        user: UserId,
        amount: Decimal,
    ) -> Result<Decimal, EngineError> {
        let mut entry = self
            .wallets
            .entry(user)
            .or_insert_with(|| Wallet::new(user, &self.config.currency));
        let wallet = entry.value_mut();
        if wallet.balance < amount {
            return Err(EngineError::insufficient_funds(
                user,
                wallet.balance,
                amount,
            ));
        }
        wallet.balance = wallet
            .balance
            .checked_sub(amount)
            .ok_or_else(|| EngineError::arithmetic_underflow("debit", user))?;
        Ok(wallet.balance)
    }

    fn insert_pending(
        &self,
        user: UserId,
        order_code: &str,
        amount: Decimal,
        kind: TransactionKind,
        order: Option<OrderId>,
    ) -> Result<WalletTransaction, EngineError> {
        self.store.insert(|id| WalletTransaction {
            id,
            user,
            order,
            order_code: order_code.to_string(),
            kind,
            amount,
            balance_after: None,
            status: TransactionStatus::Pending,
            bank_account: None,
            reviewed_by: None,
            reviewed_at: None,
            created_at: Utc::now(),
            settled_at: None,
        })
    }

    /// Generate the next globally unique order code
    ///
    /// Second-resolution timestamp plus a process-wide sequence; the store's
    /// code index is the final uniqueness arbiter.
    pub(crate) fn next_order_code(&self) -> String {
        let seq = self.code_seq.fetch_add(1, Ordering::Relaxed);
        format!("{}{:03}", Utc::now().format("%y%m%d%H%M%S"), seq % 1000)
    }
}

/// Reject zero and negative amounts before any record is touched
pub(crate) fn require_positive(amount: Decimal) -> Result<(), EngineError> {
    if amount <= Decimal::ZERO {
        return Err(EngineError::invalid_amount(amount));
    }
    Ok(())
}
