//! Exactly-once processing of payment gateway callbacks
//!
//! The gateway delivers callbacks at least once and possibly out of order.
//! This module provides the `PaymentWebhookProcessor`, which resolves each
//! callback through the ledger's order-code index and applies its effect at
//! most once:
//!
//! - unknown order code, or a code naming a non-deposit entry: logged no-op
//!   (gateways retry on errors, so such callbacks must still be acknowledged
//!   as processed)
//! - entry already settled or already failed: duplicate delivery, no-op
//! - otherwise: the credit (or failure mark) is applied, with the
//!   already-processed check running inside the same atomic unit as the
//!   balance write

use crate::core::ledger_store::LedgerStore;
use crate::core::wallet_ledger::WalletLedger;
use crate::types::{EngineError, ErrorKind, TransactionKind, WalletTransaction};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};

/// Gateway status code that signals a successful payment
pub const SUCCESS_STATUS_CODE: &str = "00";

/// Inbound gateway notification
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayCallback {
    /// Code assigned when the payment request was created
    pub order_code: String,
    /// Amount the gateway reports as paid
    pub amount_paid: Decimal,
    /// Gateway status code; [`SUCCESS_STATUS_CODE`] means paid
    pub status_code: String,
}

impl GatewayCallback {
    /// Build a success callback
    pub fn success(order_code: &str, amount_paid: Decimal) -> Self {
        Self {
            order_code: order_code.to_string(),
            amount_paid,
            status_code: SUCCESS_STATUS_CODE.to_string(),
        }
    }

    /// Build a failure callback with the given gateway status code
    pub fn failure(order_code: &str, status_code: &str) -> Self {
        Self {
            order_code: order_code.to_string(),
            amount_paid: Decimal::ZERO,
            status_code: status_code.to_string(),
        }
    }

    /// Whether the gateway reports the payment as successful
    pub fn is_success(&self) -> bool {
        self.status_code == SUCCESS_STATUS_CODE
    }
}

/// What handling a callback did
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookOutcome {
    /// The pending deposit was credited to its wallet
    Credited(WalletTransaction),
    /// The pending deposit was marked failed; no balance effect
    MarkedFailed(WalletTransaction),
    /// Duplicate delivery of an already-processed callback; no-op
    Duplicate,
    /// The order code matches no ledger entry; no-op
    Unknown,
}

/// Consumer of asynchronous gateway notifications
#[derive(Debug, Clone)]
pub struct PaymentWebhookProcessor {
    ledger: Arc<WalletLedger>,
    store: Arc<LedgerStore>,
}

impl PaymentWebhookProcessor {
    /// Create a processor over the given ledger and entry store
    pub fn new(ledger: Arc<WalletLedger>, store: Arc<LedgerStore>) -> Self {
        Self { ledger, store }
    }

    /// Process one gateway callback
    ///
    /// Never fails for unknown codes or duplicate deliveries; both are
    /// ordinary outcomes the caller acknowledges with success. The only
    /// error path is an internal failure applying the credit.
    ///
    /// # Errors
    ///
    /// Returns an error only for [`ErrorKind::Internal`]-class failures;
    /// state conflicts are folded into [`WebhookOutcome::Duplicate`].
    pub fn handle(&self, callback: &GatewayCallback) -> Result<WebhookOutcome, EngineError> {
        let Some(tx_id) = self.store.find_by_code(&callback.order_code) else {
            info!(
                order_code = %callback.order_code,
                "callback references unknown order code, ignoring"
            );
            return Ok(WebhookOutcome::Unknown);
        };

        // Only deposit requests are ever registered with the gateway; a
        // callback carrying some other entry's code must not settle it.
        // The kind is immutable after insert, so this check needs no lock.
        let Some(tx) = self.store.get(tx_id).filter(|tx| tx.kind == TransactionKind::Deposit)
        else {
            warn!(
                order_code = %callback.order_code,
                "callback references a non-deposit ledger entry, ignoring"
            );
            return Ok(WebhookOutcome::Unknown);
        };

        if !callback.is_success() {
            return match self.ledger.mark_deposit_failed(tx_id) {
                Ok(tx) => {
                    warn!(
                        order_code = %callback.order_code,
                        status = %callback.status_code,
                        "gateway reported payment failure"
                    );
                    Ok(WebhookOutcome::MarkedFailed(tx))
                }
                Err(e) if e.kind() == ErrorKind::StateConflict => {
                    info!(
                        order_code = %callback.order_code,
                        "duplicate failure callback, ignoring"
                    );
                    Ok(WebhookOutcome::Duplicate)
                }
                Err(e) => Err(e),
            };
        }

        if tx.amount != callback.amount_paid {
            warn!(
                order_code = %callback.order_code,
                requested = %tx.amount,
                paid = %callback.amount_paid,
                "callback amount differs from requested amount, crediting requested amount"
            );
        }

        match self.ledger.settle_credit(tx_id) {
            Ok(tx) => {
                info!(
                    order_code = %callback.order_code,
                    balance_after = ?tx.balance_after,
                    "deposit settled"
                );
                Ok(WebhookOutcome::Credited(tx))
            }
            Err(e) if e.kind() == ErrorKind::StateConflict => {
                info!(
                    order_code = %callback.order_code,
                    "duplicate success callback, ignoring"
                );
                Ok(WebhookOutcome::Duplicate)
            }
            Err(e) => Err(e),
        }
    }
}
