//! Outbound notification contract.
//!
//! The email / in-app renderer lives outside this service; the reconciler
//! only consumes this `notify(user, event, payload)` interface. Delivery is
//! best-effort: a failed notification never affects payment state.

use serde_json::Value;

pub trait Notifier: Send + Sync {
    fn notify(&self, user_id: i64, event: &str, payload: &Value);
}

/// Default collaborator: logs the event and drops it. Stands in until a
/// real renderer is wired up, and keeps tests free of delivery plumbing.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, user_id: i64, event: &str, payload: &Value) {
        tracing::info!(user_id, event, %payload, "notify");
    }
}
