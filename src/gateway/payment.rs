//! Payment gateway seam
//!
//! The engine never talks HTTP itself; it calls a [`PaymentGateway`]
//! implementation supplied by the host. The outbound call happens before any
//! ledger entry is persisted, so a gateway failure leaves no partial state.
//! Implementations are expected to bound the call with their own timeout and
//! map transport errors to [`EngineError::GatewayUnavailable`].

use crate::types::{EngineError, UserId};
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tracing::info;
use uuid::Uuid;

/// Outbound request to create a gateway checkout
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRequest {
    /// Globally unique code the gateway echoes back in its callback
    pub order_code: String,
    pub amount: Decimal,
    pub currency: String,
    pub description: String,
    pub buyer: UserId,
}

/// Checkout handles returned by the gateway
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutSession {
    pub checkout_url: String,
    pub qr_code: String,
}

/// Outbound payment gateway interface
pub trait PaymentGateway: Send + Sync {
    /// Register a payment request and obtain checkout handles
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::GatewayUnavailable`] when the gateway is
    /// unreachable or rejects the request.
    fn create_payment_request(
        &self,
        request: &PaymentRequest,
    ) -> Result<CheckoutSession, EngineError>;
}

/// In-memory gateway for tests and the offline reconciliation tool
///
/// Records every request it sees and can be switched into a failing mode to
/// exercise the external-dependency error path.
#[derive(Debug, Default)]
pub struct MockGateway {
    fail: AtomicBool,
    requests: Mutex<Vec<PaymentRequest>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with a gateway error
    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }

    /// Requests seen so far, in call order
    pub fn requests(&self) -> Vec<PaymentRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl PaymentGateway for MockGateway {
    fn create_payment_request(
        &self,
        request: &PaymentRequest,
    ) -> Result<CheckoutSession, EngineError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(EngineError::gateway_unavailable("simulated gateway outage"));
        }

        info!(
            order_code = %request.order_code,
            amount = %request.amount,
            "mock gateway accepted payment request"
        );
        self.requests.lock().unwrap().push(request.clone());

        let reference = Uuid::new_v4().simple().to_string();
        Ok(CheckoutSession {
            checkout_url: format!("https://pay.example.test/checkout/{reference}"),
            qr_code: format!("QR:{reference}"),
        })
    }
}
