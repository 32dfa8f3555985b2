use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::warn;

use crate::api::DocumentApi;
use crate::autosave::guard::{UnloadGuards, DEFAULT_UNSAVED_MESSAGE};
use crate::autosave::notifier::SaveNotifier;
use crate::docs::types::{DebounceClass, DocKind};
use crate::sessions::SessionRegistry;

/// Autosave parameters (admins can modify the debounce windows at runtime).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorConfig {
    /// Debounce for documents with many list fields.
    pub list_debounce_ms: u64,
    /// Debounce for single-answer documents.
    pub answer_debounce_ms: u64,
    pub toast_interval_ms: u64,
    pub unsaved_message: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            list_debounce_ms: 1500,
            answer_debounce_ms: 1000,
            toast_interval_ms: 2000,
            unsaved_message: DEFAULT_UNSAVED_MESSAGE.to_string(),
        }
    }
}

impl EditorConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let millis = |key: &str, default: u64| match lookup(key) {
            Some(raw) => raw.trim().parse::<u64>().unwrap_or_else(|_| {
                warn!(key, value = %raw, "ignoring invalid millisecond setting");
                default
            }),
            None => default,
        };

        Self {
            list_debounce_ms: millis("AUTOSAVE_LIST_DEBOUNCE_MS", defaults.list_debounce_ms),
            answer_debounce_ms: millis("AUTOSAVE_ANSWER_DEBOUNCE_MS", defaults.answer_debounce_ms),
            toast_interval_ms: millis("SAVE_TOAST_INTERVAL_MS", defaults.toast_interval_ms),
            unsaved_message: lookup("UNSAVED_CHANGES_MESSAGE")
                .filter(|m| !m.trim().is_empty())
                .unwrap_or(defaults.unsaved_message),
        }
    }

    pub fn delay_for(&self, kind: DocKind) -> Duration {
        match kind.debounce_class() {
            DebounceClass::MultiField => Duration::from_millis(self.list_debounce_ms),
            DebounceClass::SingleAnswer => Duration::from_millis(self.answer_debounce_ms),
        }
    }

    pub fn toast_interval(&self) -> Duration {
        Duration::from_millis(self.toast_interval_ms)
    }
}

pub struct AppState {
    pub api: Arc<dyn DocumentApi>,
    pub sessions: Arc<SessionRegistry>,
    pub notifier: Arc<SaveNotifier>,
    pub guards: Arc<UnloadGuards>,
    pub admin_ids: HashSet<u64>,
    pub config: Arc<RwLock<EditorConfig>>,
}

impl AppState {
    pub fn is_admin(&self, user_id: u64) -> bool {
        self.admin_ids.contains(&user_id)
    }
}

pub type Context<'a> = poise::Context<'a, AppState, anyhow::Error>;
