use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use tracing::{debug, warn};

use super::machine::SaveState;

pub const DEFAULT_UNSAVED_MESSAGE: &str =
    "You have unsaved changes. Are you sure you want to leave?";

struct Entry {
    label: String,
    state: watch::Receiver<SaveState>,
}

/// Process-wide set of documents that must not be left with unsaved edits.
///
/// Subscriptions are scoped: each [`UnsavedGuard`] removes its entry when dropped.
pub struct UnloadGuards {
    message: Mutex<String>,
    entries: Mutex<BTreeMap<u64, Entry>>,
    next_id: AtomicU64,
}

/// Confirmation to present before leaving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnloadPrompt {
    pub message: String,
    pub documents: Vec<String>,
}

impl UnloadGuards {
    pub fn new(message: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            message: Mutex::new(message.into()),
            entries: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn subscribe(self: &Arc<Self>, label: impl Into<String>, state: watch::Receiver<SaveState>) -> UnsavedGuard {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let label = label.into();
        debug!(guard = id, doc = %label, "unload guard subscribed");
        self.lock_entries().insert(id, Entry { label, state });
        UnsavedGuard {
            id,
            registry: Arc::clone(self),
        }
    }

    pub fn set_message(&self, message: impl Into<String>) {
        *self.message.lock().unwrap_or_else(PoisonError::into_inner) = message.into();
    }

    pub fn message(&self) -> String {
        self.message.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// `Some` while any subscribed document has unsaved edits.
    pub fn before_unload(&self) -> Option<UnloadPrompt> {
        let documents: Vec<String> = self
            .lock_entries()
            .values()
            .filter(|entry| entry.state.borrow().is_dirty())
            .map(|entry| entry.label.clone())
            .collect();
        if documents.is_empty() {
            return None;
        }
        let prompt = UnloadPrompt {
            message: self.message(),
            documents,
        };
        warn!(documents = ?prompt.documents, "unsaved changes pending");
        Some(prompt)
    }

    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    fn prompt_for(&self, id: u64) -> Option<UnloadPrompt> {
        let entries = self.lock_entries();
        let entry = entries.get(&id)?;
        if !entry.state.borrow().is_dirty() {
            return None;
        }
        Some(UnloadPrompt {
            message: self.message(),
            documents: vec![entry.label.clone()],
        })
    }

    fn lock_entries(&self) -> std::sync::MutexGuard<'_, BTreeMap<u64, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Subscription held by one open document. Unsubscribes on drop.
pub struct UnsavedGuard {
    id: u64,
    registry: Arc<UnloadGuards>,
}

impl UnsavedGuard {
    /// Confirmation needed before leaving this document, if it is dirty.
    pub fn confirm_leave(&self) -> Option<UnloadPrompt> {
        self.registry.prompt_for(self.id)
    }
}

impl Drop for UnsavedGuard {
    fn drop(&mut self) {
        self.registry.lock_entries().remove(&self.id);
        debug!(guard = self.id, "unload guard released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn clean_documents_need_no_confirmation() {
        let guards = UnloadGuards::new(DEFAULT_UNSAVED_MESSAGE);
        let (_tx, rx) = watch::channel(SaveState::Clean);
        let guard = guards.subscribe("SIPOC #1", rx);
        assert!(guards.before_unload().is_none());
        assert!(guard.confirm_leave().is_none());
    }

    #[test]
    fn dirty_documents_prompt_with_the_configured_message() {
        let guards = UnloadGuards::new("Leave anyway?");
        let (clean_tx, clean_rx) = watch::channel(SaveState::Clean);
        let (dirty_tx, dirty_rx) = watch::channel(SaveState::Clean);
        let _a = guards.subscribe("SIPOC #1", clean_rx);
        let b = guards.subscribe("Findings #2", dirty_rx);

        dirty_tx.send_replace(SaveState::SaveFailed);
        assert_eq!(
            guards.before_unload(),
            Some(UnloadPrompt {
                message: "Leave anyway?".to_string(),
                documents: vec!["Findings #2".to_string()],
            })
        );
        assert!(b.confirm_leave().is_some());

        dirty_tx.send_replace(SaveState::Clean);
        clean_tx.send_replace(SaveState::Saving { queued: false });
        assert_eq!(guards.before_unload().unwrap().documents, vec!["SIPOC #1"]);
    }

    #[test]
    fn dropping_the_guard_unsubscribes() {
        let guards = UnloadGuards::new(DEFAULT_UNSAVED_MESSAGE);
        let (_tx, rx) = watch::channel(SaveState::Dirty);
        let guard = guards.subscribe("SIPOC #1", rx);
        assert_eq!(guards.len(), 1);
        assert!(guards.before_unload().is_some());

        drop(guard);
        assert_eq!(guards.len(), 0);
        assert!(guards.before_unload().is_none());
    }

    #[test]
    fn message_can_be_changed_at_runtime() {
        let guards = UnloadGuards::new(DEFAULT_UNSAVED_MESSAGE);
        guards.set_message("Unsaved audit edits");
        let (_tx, rx) = watch::channel(SaveState::Dirty);
        let guard = guards.subscribe("SIPOC #1", rx);
        assert_eq!(guard.confirm_leave().unwrap().message, "Unsaved audit edits");
    }
}
