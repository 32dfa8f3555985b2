use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use poise::serenity_prelude as serenity;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::api::ApiError;
use crate::autosave::guard::{UnloadGuards, UnloadPrompt, UnsavedGuard};
use crate::autosave::notifier::{Toast, ToastSink};
use crate::autosave::{AutosaveController, AutosaveOptions, SaveOutcome};
use crate::docs::types::{DocId, DocKind};
use crate::state::AppState;

/// One open document, owned by a chat user.
pub struct EditorSession {
    pub controller: AutosaveController,
    guard: UnsavedGuard,
    pub opened_at: DateTime<Utc>,
}

impl EditorSession {
    /// Load the document and subscribe it to the unsaved-changes guard.
    pub async fn open(
        state: &AppState,
        kind: DocKind,
        id: DocId,
        toasts: Arc<dyn ToastSink>,
    ) -> Result<Self, ApiError> {
        let delay = state.config.read().await.delay_for(kind);
        let options = AutosaveOptions {
            delay,
            notifier: state.notifier.clone(),
            toasts,
        };
        let controller = AutosaveController::load(state.api.clone(), kind, id, options).await?;
        let guard = state
            .guards
            .subscribe(controller.label().to_string(), controller.subscribe());
        Ok(Self {
            controller,
            guard,
            opened_at: Utc::now(),
        })
    }

    pub fn confirm_leave(&self) -> Option<UnloadPrompt> {
        self.guard.confirm_leave()
    }

    pub async fn close(self) {
        let Self { controller, guard, .. } = self;
        drop(guard);
        controller.close().await;
    }
}

/// Open sessions keyed by chat user id. A user edits one document at a time.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<u64, Arc<EditorSession>>>,
}

impl SessionRegistry {
    pub async fn get(&self, user: u64) -> Option<Arc<EditorSession>> {
        self.sessions.read().await.get(&user).cloned()
    }

    /// Register `session` for `user`, closing whatever it replaces.
    pub async fn insert(&self, user: u64, session: EditorSession) {
        let label = session.controller.label().to_string();
        let previous = self.sessions.write().await.insert(user, Arc::new(session));
        info!(user, doc = %label, "editor session opened");
        if let Some(previous) = previous {
            close_shared(previous).await;
        }
    }

    /// Remove and close the session of `user`. Returns the closed document's label.
    pub async fn close(&self, user: u64) -> Option<String> {
        let session = self.sessions.write().await.remove(&user)?;
        let label = session.controller.label().to_string();
        close_shared(session).await;
        info!(user, doc = %label, "editor session closed");
        Some(label)
    }

    /// Save every document with unsaved edits, e.g. before shutdown.
    pub async fn flush_all(&self) -> Vec<(String, SaveOutcome)> {
        let open: Vec<Arc<EditorSession>> = self.sessions.read().await.values().cloned().collect();
        let saves = open
            .iter()
            .filter(|s| s.controller.state().is_dirty())
            .map(|s| async move {
                let outcome = s.controller.save_now().await;
                (s.controller.label().to_string(), outcome)
            });
        futures::future::join_all(saves).await
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Warn about unsaved documents and flush them. Runs from the Ctrl-C task.
    pub async fn shutdown(&self, guards: &UnloadGuards) -> Vec<(String, SaveOutcome)> {
        let open = self.len().await;
        info!(sessions = open, guarded = guards.len(), "Shutdown requested");
        let Some(prompt) = guards.before_unload() else {
            return Vec::new();
        };
        warn!(documents = ?prompt.documents, "{}", prompt.message);
        let flushed = self.flush_all().await;
        for (doc, outcome) in &flushed {
            info!(doc = %doc, outcome = ?outcome, "flushed on shutdown");
        }
        flushed
    }
}

async fn close_shared(session: Arc<EditorSession>) {
    match Arc::try_unwrap(session) {
        Ok(session) => session.close().await,
        // a command still holds it; the autosave task stops when that handle drops
        Err(shared) => debug!(doc = %shared.controller.label(), "session still in use, closing on release"),
    }
}

/// Posts toasts into the channel the document was opened from.
pub struct ChannelToasts {
    http: Arc<serenity::Http>,
    channel: serenity::ChannelId,
}

impl ChannelToasts {
    pub fn new(http: Arc<serenity::Http>, channel: serenity::ChannelId) -> Self {
        Self { http, channel }
    }
}

impl ToastSink for ChannelToasts {
    fn show(&self, toast: Toast) {
        let text = match &toast {
            Toast::Saved { .. } => format!("✅ {}", toast.text()),
            Toast::SaveFailed { .. } => format!("⚠️ {}", toast.text()),
        };
        let http = self.http.clone();
        let channel = self.channel;
        tokio::spawn(async move {
            if let Err(e) = channel.say(&http, text).await {
                warn!(channel = %channel, "failed to post toast: {}", e);
            }
        });
    }
}
