//! User-facing notification sink.

use log::info;

/// Fire-and-forget channel for short user-facing messages. Delivery is best
/// effort; a failing sink must never affect engine state.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, title: &str, body: &str);
}

/// Default sink that writes notifications to the log.
pub struct LogNotifier;

impl NotificationSink for LogNotifier {
    fn notify(&self, title: &str, body: &str) {
        info!("notification: {} - {}", title, body);
    }
}
