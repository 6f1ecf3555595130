//! Ledger entry storage with order-code lookup
//!
//! This module provides the `LedgerStore`, the home of every
//! [`WalletTransaction`]. Beside the primary id index it maintains a
//! secondary index from `order_code` to id: the webhook processor resolves
//! callbacks through it, which is what makes the order code an idempotency
//! key for the whole payment-confirmation pipeline.
//!
//! # Duplicate Handling
//!
//! Order codes are globally unique. Registering an entry under a code that
//! is already taken fails with a structured conflict before anything is
//! stored.

use crate::types::{EngineError, TransactionId, TransactionStatus, UserId, WalletTransaction};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe ledger entry store
#[derive(Debug, Default)]
pub struct LedgerStore {
    transactions: DashMap<TransactionId, WalletTransaction>,
    by_code: DashMap<String, TransactionId>,
    next_id: AtomicU64,
}

impl LedgerStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            transactions: DashMap::new(),
            by_code: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Insert a new ledger entry
    ///
    /// The closure receives the freshly allocated id and returns the complete
    /// entry. The entry's `order_code` is registered in the lookup index
    /// first; a collision aborts the insert.
    ///
    /// # Errors
    ///
    /// * [`EngineError::DuplicateOrderCode`] if the code is already taken
    pub fn insert<F>(&self, make: F) -> Result<WalletTransaction, EngineError>
    where
        F: FnOnce(TransactionId) -> WalletTransaction,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let tx = make(id);

        // First registration of a code wins; racing inserts serialize on the
        // index entry
        let registered = *self.by_code.entry(tx.order_code.clone()).or_insert(id);
        if registered != id {
            return Err(EngineError::duplicate_order_code(&tx.order_code));
        }

        self.transactions.insert(id, tx.clone());
        Ok(tx)
    }

    /// Get a snapshot of a ledger entry
    pub fn get(&self, id: TransactionId) -> Option<WalletTransaction> {
        self.transactions
            .get(&id)
            .map(|entry| entry.value().clone())
    }

    /// Resolve an order code to its ledger entry id
    pub fn find_by_code(&self, order_code: &str) -> Option<TransactionId> {
        self.by_code.get(order_code).map(|entry| *entry.value())
    }

    /// Update a ledger entry using a closure
    ///
    /// The closure runs while the entry lock is held. Settlement paths rely
    /// on this: the "already settled" check and the balance write they guard
    /// are one atomic unit, never a read followed by a later write.
    ///
    /// # Errors
    ///
    /// * [`EngineError::TransactionNotFound`] for unknown ids
    /// * Any error returned by the closure
    pub fn update<F>(&self, id: TransactionId, f: F) -> Result<WalletTransaction, EngineError>
    where
        F: FnOnce(&mut WalletTransaction) -> Result<(), EngineError>,
    {
        let mut entry = self
            .transactions
            .get_mut(&id)
            .ok_or(EngineError::TransactionNotFound { tx: id })?;
        f(entry.value_mut())?;
        Ok(entry.value().clone())
    }

    /// Remove an entry that never took effect
    ///
    /// Compensation for an immediate settlement that failed after the entry
    /// was inserted; also unregisters the order code.
    pub(crate) fn remove(&self, id: TransactionId) {
        if let Some((_, tx)) = self.transactions.remove(&id) {
            self.by_code.remove(&tx.order_code);
        }
    }

    /// Ledger entries of one user, sorted by id
    pub fn list_for_user(&self, user: UserId) -> Vec<WalletTransaction> {
        self.filtered(|tx| tx.user == user)
    }

    /// Ledger entries in the given status, sorted by id
    ///
    /// Backs the operator dashboards (pending withdrawals, failed deposits).
    pub fn list_by_status(&self, status: TransactionStatus) -> Vec<WalletTransaction> {
        self.filtered(|tx| tx.status == status)
    }

    fn filtered<F>(&self, predicate: F) -> Vec<WalletTransaction>
    where
        F: Fn(&WalletTransaction) -> bool,
    {
        let mut txs: Vec<WalletTransaction> = self
            .transactions
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        txs.sort_by_key(|tx| tx.id);
        txs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TransactionKind;
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn pending_deposit(id: TransactionId, user: UserId, code: &str) -> WalletTransaction {
        WalletTransaction {
            id,
            user,
            order: None,
            order_code: code.to_string(),
            kind: TransactionKind::Deposit,
            amount: Decimal::new(50_000, 0),
            balance_after: None,
            status: TransactionStatus::Pending,
            bank_account: None,
            reviewed_by: None,
            reviewed_at: None,
            created_at: Utc::now(),
            settled_at: None,
        }
    }

    #[test]
    fn test_insert_assigns_ids_and_indexes_code() {
        let store = LedgerStore::new();

        let tx = store.insert(|id| pending_deposit(id, 1, "171234")).unwrap();

        assert_eq!(store.find_by_code("171234"), Some(tx.id));
        assert_eq!(store.get(tx.id).unwrap().order_code, "171234");
    }

    #[test]
    fn test_duplicate_order_code_is_rejected() {
        let store = LedgerStore::new();
        store.insert(|id| pending_deposit(id, 1, "171234")).unwrap();

        let result = store.insert(|id| pending_deposit(id, 2, "171234"));

        assert!(matches!(
            result.unwrap_err(),
            EngineError::DuplicateOrderCode { .. }
        ));
        // First registration wins
        let id = store.find_by_code("171234").unwrap();
        assert_eq!(store.get(id).unwrap().user, 1);
    }

    #[test]
    fn test_update_propagates_closure_error_without_commit() {
        let store = LedgerStore::new();
        let tx = store.insert(|id| pending_deposit(id, 1, "a1")).unwrap();

        let result = store.update(tx.id, |t| Err(EngineError::already_settled(t.id)));

        assert!(result.is_err());
        assert_eq!(
            store.get(tx.id).unwrap().status,
            TransactionStatus::Pending
        );
    }

    #[test]
    fn test_update_unknown_transaction() {
        let store = LedgerStore::new();
        let result = store.update(99, |_| Ok(()));
        assert!(matches!(
            result.unwrap_err(),
            EngineError::TransactionNotFound { tx: 99 }
        ));
    }

    #[test]
    fn test_remove_unregisters_order_code() {
        let store = LedgerStore::new();
        let tx = store.insert(|id| pending_deposit(id, 1, "a1")).unwrap();

        store.remove(tx.id);

        assert!(store.get(tx.id).is_none());
        assert!(store.find_by_code("a1").is_none());
        // Code becomes reusable after compensation
        assert!(store.insert(|id| pending_deposit(id, 2, "a1")).is_ok());
    }

    #[test]
    fn test_listings_filter_and_sort() {
        let store = LedgerStore::new();
        let a = store.insert(|id| pending_deposit(id, 1, "a1")).unwrap();
        let _b = store.insert(|id| pending_deposit(id, 2, "b1")).unwrap();
        let c = store.insert(|id| pending_deposit(id, 1, "c1")).unwrap();

        let mine = store.list_for_user(1);
        assert_eq!(
            mine.iter().map(|t| t.id).collect::<Vec<_>>(),
            vec![a.id, c.id]
        );

        store
            .update(c.id, |t| {
                t.status = TransactionStatus::Failed;
                Ok(())
            })
            .unwrap();
        let failed = store.list_by_status(TransactionStatus::Failed);
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].id, c.id);
    }
}
