//! External collaborator seams
//!
//! The engine consumes three collaborators: the payment gateway (outbound
//! checkout creation), the notification service (fire-and-forget delivery),
//! and the tax-rate lookup. Each is a trait or pure function so hosts can
//! wire real transports while tests use the in-memory implementations.

pub mod notify;
pub mod payment;
pub mod tax;

pub use notify::{Notification, Notifier, NullNotifier, RecordingNotifier};
pub use payment::{CheckoutSession, MockGateway, PaymentGateway, PaymentRequest};
