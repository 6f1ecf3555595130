//! Notification seam
//!
//! Delivery is an external collaborator. The lifecycle components fire one
//! notification after each state transition; a delivery failure is logged
//! and never rolls back the transition that triggered it.

use crate::types::{EngineError, UserId};
use serde_json::Value;
use std::sync::Mutex;
use tracing::info;

/// One outbound notification
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub user: UserId,
    pub title: String,
    pub body: String,
    /// Free-form payload for the delivery channel (order ids, statuses)
    pub metadata: Value,
}

/// Fire-and-forget notification delivery
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification) -> Result<(), EngineError>;
}

/// Discards every notification; useful for offline tooling
#[derive(Debug, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _notification: Notification) -> Result<(), EngineError> {
        Ok(())
    }
}

/// Records notifications in memory for assertions in tests
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifications delivered so far, in call order
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) -> Result<(), EngineError> {
        info!(
            user = notification.user,
            title = %notification.title,
            "recording notification"
        );
        self.sent.lock().unwrap().push(notification);
        Ok(())
    }
}
