use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

pub const DEFAULT_TOAST_INTERVAL: Duration = Duration::from_millis(2000);

/// Source of "now" for rate limiting.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Tokio's clock, so paused test time drives it too.
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A user-visible notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Toast {
    Saved { document: String },
    SaveFailed { document: String, message: String },
}

impl Toast {
    pub fn text(&self) -> String {
        match self {
            Toast::Saved { document } => format!("Saved {}", document),
            Toast::SaveFailed { document, message } => {
                format!("Could not save {}: {}", document, message)
            }
        }
    }
}

/// Where toasts are shown.
pub trait ToastSink: Send + Sync {
    fn show(&self, toast: Toast);
}

/// Suppresses "Saved" toasts fired within `min_interval` of the previous one.
/// Failures are never suppressed. One instance is shared by every session.
pub struct SaveNotifier {
    min_interval: Duration,
    clock: Arc<dyn Clock>,
    last_fired: Mutex<Option<Instant>>,
}

impl SaveNotifier {
    pub fn new(min_interval: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            min_interval,
            clock,
            last_fired: Mutex::new(None),
        }
    }

    pub fn with_interval(min_interval: Duration) -> Self {
        Self::new(min_interval, Arc::new(TokioClock))
    }

    /// Show a success toast unless one fired recently. Returns whether it was shown.
    pub fn notify_saved(&self, sink: &dyn ToastSink, toast: Toast) -> bool {
        let now = self.clock.now();
        {
            let mut last = self.last_fired.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(prev) = *last {
                if now.duration_since(prev) < self.min_interval {
                    debug!(toast = ?toast, "save toast suppressed");
                    return false;
                }
            }
            *last = Some(now);
        }
        sink.show(toast);
        true
    }

    pub fn notify_failed(&self, sink: &dyn ToastSink, toast: Toast) {
        sink.show(toast);
    }
}

impl Default for SaveNotifier {
    fn default() -> Self {
        Self::with_interval(DEFAULT_TOAST_INTERVAL)
    }
}

/// Collects toasts in memory.
#[cfg(test)]
#[derive(Default)]
pub struct RecordedToasts {
    toasts: Mutex<Vec<Toast>>,
}

#[cfg(test)]
impl RecordedToasts {
    pub fn all(&self) -> Vec<Toast> {
        self.toasts.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl ToastSink for RecordedToasts {
    fn show(&self, toast: Toast) {
        self.toasts.lock().unwrap().push(toast);
    }
}
