// User-facing notification surface

use tracing::error;

/// Shown once when the reconnection sequence gives up
pub const RECONNECT_EXHAUSTED_MESSAGE: &str =
    "Realtime connection failed, please refresh the page and try again";

/// Where terminal channel failures are surfaced to the user.
///
/// Only failures the user must act on go here; everything recoverable stays
/// in the logs.
pub trait Notifier: Send + Sync {
    fn notify_error(&self, message: &str);
}

/// Default notifier for headless use: logs at error level
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify_error(&self, message: &str) {
        error!(notification = %message, "User notification");
    }
}
