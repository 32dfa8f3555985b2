pub mod guard;
pub mod machine;
pub mod notifier;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, OptionFuture};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::api::{ApiError, DocumentApi};
use crate::docs::types::{DocId, DocKind};
use crate::docs::Document;
use crate::error::EditError;

use machine::{Effect, SaveEvent, SaveState};
use notifier::{SaveNotifier, Toast, ToastSink};

/// Per-document settings for a controller.
#[derive(Clone)]
pub struct AutosaveOptions {
    /// Quiet period after the latest mutation before a save fires.
    pub delay: Duration,
    pub notifier: Arc<SaveNotifier>,
    pub toasts: Arc<dyn ToastSink>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved { fingerprint: String },
    Failed { message: String },
    NothingToSave,
    Closed,
}

/// Point-in-time view of an open document.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub document: Document,
    pub state: SaveState,
    pub revision: u64,
    pub last_saved_at: Option<DateTime<Utc>>,
}

/// Delivers a mutation's result to its caller.
type Reply = Box<dyn FnOnce() + Send>;
type Job = Box<dyn FnOnce(&mut Document) -> (bool, Reply) + Send>;

enum Request {
    Mutate(Job),
    Save(oneshot::Sender<SaveOutcome>),
    Snapshot(oneshot::Sender<Snapshot>),
}

/// Handle to an open document that saves itself after edits settle.
///
/// The document lives on a dedicated task; every call is a message to it, so
/// mutations apply in the order they are made and at most one PUT is ever in
/// flight. Dropping the handle (or [`AutosaveController::close`]) stops the
/// task, cancelling the pending timer and any in-flight request.
pub struct AutosaveController {
    kind: DocKind,
    label: String,
    tx: mpsc::UnboundedSender<Request>,
    state: watch::Receiver<SaveState>,
    task: JoinHandle<()>,
}

impl AutosaveController {
    /// Fetch the document and start its autosave task. A failed fetch is
    /// terminal for the caller; nothing retries.
    pub async fn load(
        api: Arc<dyn DocumentApi>,
        kind: DocKind,
        id: DocId,
        options: AutosaveOptions,
    ) -> Result<Self, ApiError> {
        let doc = api.fetch(kind, id).await?;
        let label = doc.label();
        info!(doc = %label, fingerprint = %doc.short_fingerprint(), "document loaded");

        let (state_tx, state_rx) = watch::channel(SaveState::Clean);
        let (tx, rx) = mpsc::unbounded_channel();

        let worker = Autosaver {
            api,
            doc,
            label: label.clone(),
            state: SaveState::Clean,
            state_tx,
            revision: 0,
            deadline: None,
            delay: options.delay,
            in_flight: None,
            waiters: Vec::new(),
            notifier: options.notifier,
            toasts: options.toasts,
            last_saved_at: None,
        };
        let task = tokio::spawn(worker.run(rx));

        Ok(Self {
            kind,
            label,
            tx,
            state: state_rx,
            task,
        })
    }

    pub fn kind(&self) -> DocKind {
        self.kind
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn state(&self) -> SaveState {
        *self.state.borrow()
    }

    /// Watch the save state, e.g. for an unsaved-changes guard.
    pub fn subscribe(&self) -> watch::Receiver<SaveState> {
        self.state.clone()
    }

    /// Apply `f` to the local document. On success the document is dirty and
    /// the debounce window restarts; on error nothing changes.
    pub async fn mutate<R, F>(&self, f: F) -> Result<R, EditError>
    where
        F: FnOnce(&mut Document) -> Result<R, EditError> + Send + 'static,
        R: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job: Job = Box::new(move |doc: &mut Document| {
            let result = f(doc);
            let applied = result.is_ok();
            let reply: Reply = Box::new(move || {
                let _ = reply_tx.send(result);
            });
            (applied, reply)
        });
        self.tx
            .send(Request::Mutate(job))
            .map_err(|_| EditError::Closed)?;
        reply_rx.await.map_err(|_| EditError::Closed)?
    }

    /// Save immediately instead of waiting for the debounce window. Waits for
    /// the outcome; a save already in flight is followed by a queued one.
    pub async fn save_now(&self) -> SaveOutcome {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.tx.send(Request::Save(reply_tx)).is_err() {
            return SaveOutcome::Closed;
        }
        reply_rx.await.unwrap_or(SaveOutcome::Closed)
    }

    pub async fn snapshot(&self) -> Result<Snapshot, EditError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Request::Snapshot(reply_tx))
            .map_err(|_| EditError::Closed)?;
        reply_rx.await.map_err(|_| EditError::Closed)
    }

    /// Stop the autosave task. Unsaved edits are discarded.
    pub async fn close(self) {
        let Self { tx, task, label, .. } = self;
        drop(tx);
        if let Err(e) = task.await {
            warn!(doc = %label, "autosave task ended abnormally: {}", e);
        }
        debug!(doc = %label, "editor closed");
    }
}

struct InFlight {
    revision: u64,
    request: BoxFuture<'static, Result<Document, ApiError>>,
}

struct Autosaver {
    api: Arc<dyn DocumentApi>,
    doc: Document,
    label: String,
    state: SaveState,
    state_tx: watch::Sender<SaveState>,
    /// Incremented on every applied mutation.
    revision: u64,
    deadline: Option<Instant>,
    delay: Duration,
    in_flight: Option<InFlight>,
    waiters: Vec<oneshot::Sender<SaveOutcome>>,
    notifier: Arc<SaveNotifier>,
    toasts: Arc<dyn ToastSink>,
    last_saved_at: Option<DateTime<Utc>>,
}

impl Autosaver {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Request>) {
        loop {
            let deadline = self.deadline;
            tokio::select! {
                req = rx.recv() => match req {
                    Some(req) => self.handle(req),
                    None => break,
                },
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.deadline = None;
                    debug!(doc = %self.label, revision = self.revision, "debounce window elapsed");
                    self.apply(SaveEvent::SaveRequested);
                }
                Some(result) = OptionFuture::from(self.in_flight.as_mut().map(|f| &mut f.request)),
                    if self.in_flight.is_some() => {
                    self.finish_save(result);
                }
            }
        }

        if self.in_flight.take().is_some() {
            debug!(doc = %self.label, "in-flight save abandoned");
        }
        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(SaveOutcome::Closed);
        }
    }

    fn handle(&mut self, req: Request) {
        match req {
            Request::Mutate(job) => {
                let (applied, reply) = job(&mut self.doc);
                if applied {
                    self.revision += 1;
                    self.deadline = Some(Instant::now() + self.delay);
                    debug!(doc = %self.label, revision = self.revision, "document mutated");
                    self.apply(SaveEvent::Mutated);
                }
                reply();
            }
            Request::Save(reply) => {
                if self.state == SaveState::Clean {
                    let _ = reply.send(SaveOutcome::NothingToSave);
                    return;
                }
                self.deadline = None;
                self.waiters.push(reply);
                self.apply(SaveEvent::SaveRequested);
            }
            Request::Snapshot(reply) => {
                let _ = reply.send(Snapshot {
                    document: self.doc.clone(),
                    state: self.state,
                    revision: self.revision,
                    last_saved_at: self.last_saved_at,
                });
            }
        }
    }

    fn apply(&mut self, event: SaveEvent) {
        match self.state.on(event) {
            Ok((next, effect)) => {
                if next != self.state {
                    debug!(doc = %self.label, from = %self.state, to = %next, "save state changed");
                }
                self.state = next;
                self.state_tx.send_replace(next);
                if effect == Effect::StartSave {
                    self.start_save();
                }
            }
            Err(e) => warn!(doc = %self.label, "{}", e),
        }
    }

    fn start_save(&mut self) {
        // this save covers every edit made so far
        self.deadline = None;
        let api = Arc::clone(&self.api);
        let snapshot = self.doc.clone();
        info!(doc = %self.label, revision = self.revision, "saving document");
        self.in_flight = Some(InFlight {
            revision: self.revision,
            request: Box::pin(async move { api.replace(&snapshot).await }),
        });
    }

    fn finish_save(&mut self, result: Result<Document, ApiError>) {
        let Some(flight) = self.in_flight.take() else {
            return;
        };
        let stale = flight.revision != self.revision;

        match result {
            Ok(saved) => {
                let fingerprint = saved.fingerprint();
                if stale {
                    info!(
                        doc = %self.label,
                        saved_revision = flight.revision,
                        revision = self.revision,
                        "save response is stale, keeping newer local edits"
                    );
                } else {
                    self.doc = saved;
                }
                self.last_saved_at = Some(Utc::now());
                info!(doc = %self.label, fingerprint = %fingerprint, revision = flight.revision, "document saved");
                // only confirm once every local edit is on the server
                if !stale {
                    self.notifier.notify_saved(
                        self.toasts.as_ref(),
                        Toast::Saved {
                            document: self.label.clone(),
                        },
                    );
                }
                self.apply(SaveEvent::SaveSucceeded { stale });
                if !self.state.is_saving() {
                    self.resolve(SaveOutcome::Saved { fingerprint });
                }
            }
            Err(e) => {
                let message = e.to_string();
                warn!(doc = %self.label, status = ?e.status(), "save failed: {}", message);
                self.notifier.notify_failed(
                    self.toasts.as_ref(),
                    Toast::SaveFailed {
                        document: self.label.clone(),
                        message: message.clone(),
                    },
                );
                self.apply(SaveEvent::SaveFailed { stale });
                if !self.state.is_saving() {
                    self.resolve(SaveOutcome::Failed { message });
                }
            }
        }
    }

    fn resolve(&mut self, outcome: SaveOutcome) {
        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(outcome.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docs::types::Priority;
    use async_trait::async_trait;
    use super::notifier::RecordedToasts;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use tokio::time::sleep;

    /// In-memory API that records every PUT body.
    #[derive(Default)]
    struct FakeApi {
        bodies: Mutex<Vec<Value>>,
        fail_puts: AtomicBool,
        stamp: AtomicBool,
        /// Lock this to hold PUTs in flight.
        hold: tokio::sync::Mutex<()>,
    }

    impl FakeApi {
        fn puts(&self) -> Vec<Value> {
            self.bodies.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DocumentApi for FakeApi {
        async fn fetch(&self, kind: DocKind, id: DocId) -> Result<Document, ApiError> {
            match (kind, id) {
                (DocKind::Sipoc, 12) => Document::from_value(
                    kind,
                    id,
                    json!({ "process_json": ["step1", "step2"] }),
                ),
                (DocKind::Findings, 4) => Document::from_value(
                    kind,
                    id,
                    json!({ "findings_json": ["A"], "priority_json": { "A": "High" } }),
                ),
                _ => Err(ApiError::Status {
                    status: 404,
                    message: "Not found".to_string(),
                }),
            }
        }

        async fn replace(&self, doc: &Document) -> Result<Document, ApiError> {
            self.bodies.lock().unwrap().push(doc.to_value());
            let _held = self.hold.lock().await;
            if self.fail_puts.load(Ordering::SeqCst) {
                return Err(ApiError::Status {
                    status: 503,
                    message: "Service unavailable".to_string(),
                });
            }
            let mut saved = doc.clone();
            if self.stamp.load(Ordering::SeqCst) {
                saved.set_field("updated_at", json!("2024-05-01T10:00:00Z"));
            }
            Ok(saved)
        }
    }

    fn options(delay_ms: u64, notifier: Arc<SaveNotifier>) -> (AutosaveOptions, Arc<RecordedToasts>) {
        let toasts = Arc::new(RecordedToasts::default());
        let options = AutosaveOptions {
            delay: Duration::from_millis(delay_ms),
            notifier,
            toasts: toasts.clone(),
        };
        (options, toasts)
    }

    async fn open(api: &Arc<FakeApi>, kind: DocKind, id: DocId) -> (AutosaveController, Arc<RecordedToasts>) {
        let (options, toasts) = options(1500, Arc::new(SaveNotifier::default()));
        let ctl = AutosaveController::load(api.clone(), kind, id, options).await.unwrap();
        (ctl, toasts)
    }

    async fn wait_until(ctl: &AutosaveController, want: SaveState) {
        let mut rx = ctl.subscribe();
        rx.wait_for(|s| *s == want).await.map(|_| ()).unwrap();
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[tokio::test(start_paused = true)]
    async fn sipoc_row_edit_saves_once_after_the_window() {
        let api = Arc::new(FakeApi::default());
        let (ctl, toasts) = open(&api, DocKind::Sipoc, 12).await;

        let index = ctl.mutate(|doc| doc.add_row("process_json")).await.unwrap();
        assert_eq!(index, 2);
        let snap = ctl.snapshot().await.unwrap();
        assert_eq!(snap.document.list("process_json"), vec!["step1", "step2", ""]);
        assert!(snap.state.is_dirty());

        ctl.mutate(|doc| doc.change_row("process_json", 2, "step3"))
            .await
            .unwrap();
        sleep(ms(1499)).await;
        assert!(api.puts().is_empty());

        wait_until(&ctl, SaveState::Clean).await;
        assert_eq!(api.puts(), vec![json!({ "process_json": ["step1", "step2", "step3"] })]);
        assert_eq!(
            ctl.snapshot().await.unwrap().document.list("process_json"),
            vec!["step1", "step2", "step3"]
        );
        assert_eq!(
            toasts.all(),
            vec![Toast::Saved {
                document: "SIPOC #12".to_string()
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn every_mutation_restarts_the_window() {
        let api = Arc::new(FakeApi::default());
        let (ctl, _) = open(&api, DocKind::Sipoc, 12).await;

        for i in 0..5 {
            ctl.mutate(move |doc| doc.change_row("process_json", 0, &format!("edit {}", i)))
                .await
                .unwrap();
            sleep(ms(1000)).await;
        }
        assert!(api.puts().is_empty());

        wait_until(&ctl, SaveState::Clean).await;
        sleep(ms(5000)).await;
        let puts = api.puts();
        assert_eq!(puts.len(), 1);
        assert_eq!(puts[0]["process_json"][0], "edit 4");
    }

    #[tokio::test(start_paused = true)]
    async fn server_copy_replaces_local_state() {
        let api = Arc::new(FakeApi::default());
        api.stamp.store(true, Ordering::SeqCst);
        let (ctl, _) = open(&api, DocKind::Sipoc, 12).await;

        ctl.mutate(|doc| doc.add_row("outputs_json")).await.unwrap();
        wait_until(&ctl, SaveState::Clean).await;

        let snap = ctl.snapshot().await.unwrap();
        assert_eq!(snap.document.field("updated_at"), Some(&json!("2024-05-01T10:00:00Z")));
        assert!(snap.last_saved_at.is_some());
        assert_eq!(snap.revision, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_save_keeps_edits_and_waits_for_the_next_one() {
        let api = Arc::new(FakeApi::default());
        api.fail_puts.store(true, Ordering::SeqCst);
        let (ctl, toasts) = open(&api, DocKind::Sipoc, 12).await;

        ctl.mutate(|doc| doc.change_row("process_json", 0, "kept"))
            .await
            .unwrap();
        wait_until(&ctl, SaveState::SaveFailed).await;

        let snap = ctl.snapshot().await.unwrap();
        assert!(snap.state.is_dirty());
        assert_eq!(snap.document.list("process_json"), vec!["kept", "step2"]);
        assert_eq!(
            toasts.all(),
            vec![Toast::SaveFailed {
                document: "SIPOC #12".to_string(),
                message: "Service unavailable (HTTP 503)".to_string(),
            }]
        );

        // no retry on its own
        sleep(ms(30_000)).await;
        assert_eq!(api.puts().len(), 1);

        api.fail_puts.store(false, Ordering::SeqCst);
        ctl.mutate(|doc| doc.add_row("process_json")).await.unwrap();
        wait_until(&ctl, SaveState::Clean).await;
        assert_eq!(api.puts().len(), 2);
        assert_eq!(api.puts()[1], json!({ "process_json": ["kept", "step2", ""] }));
    }

    #[tokio::test(start_paused = true)]
    async fn edits_made_during_a_save_are_not_clobbered() {
        let api = Arc::new(FakeApi::default());
        let (ctl, _) = open(&api, DocKind::Sipoc, 12).await;
        let held = api.hold.lock().await;

        ctl.mutate(|doc| doc.change_row("process_json", 0, "first"))
            .await
            .unwrap();
        wait_until(&ctl, SaveState::Saving { queued: false }).await;

        ctl.mutate(|doc| doc.change_row("process_json", 1, "second"))
            .await
            .unwrap();
        drop(held);
        wait_until(&ctl, SaveState::Dirty).await;
        assert_eq!(
            ctl.snapshot().await.unwrap().document.list("process_json"),
            vec!["first", "second"]
        );

        wait_until(&ctl, SaveState::Clean).await;
        let puts = api.puts();
        assert_eq!(puts.len(), 2);
        assert_eq!(puts[0], json!({ "process_json": ["first", "step2"] }));
        assert_eq!(puts[1], json!({ "process_json": ["first", "second"] }));
    }

    #[tokio::test(start_paused = true)]
    async fn saved_toast_waits_for_the_newest_edit() {
        let api = Arc::new(FakeApi::default());
        let (ctl, toasts) = open(&api, DocKind::Sipoc, 12).await;
        let held = api.hold.lock().await;

        ctl.mutate(|doc| doc.change_row("process_json", 0, "x"))
            .await
            .unwrap();
        wait_until(&ctl, SaveState::Saving { queued: false }).await;
        ctl.mutate(|doc| doc.change_row("process_json", 0, "y"))
            .await
            .unwrap();
        drop(held);

        wait_until(&ctl, SaveState::Dirty).await;
        assert!(toasts.all().is_empty());

        wait_until(&ctl, SaveState::Clean).await;
        assert_eq!(api.puts().len(), 2);
        assert_eq!(api.puts()[1]["process_json"][0], "y");
        assert_eq!(
            toasts.all(),
            vec![Toast::Saved {
                document: "SIPOC #12".to_string()
            }]
        );
    }

    /// Keeps the last PUT body and serves it on the next GET.
    struct StoringApi {
        stored: Mutex<Value>,
    }

    #[async_trait]
    impl DocumentApi for StoringApi {
        async fn fetch(&self, kind: DocKind, id: DocId) -> Result<Document, ApiError> {
            let body = self.stored.lock().unwrap().clone();
            Document::from_value(kind, id, body)
        }

        async fn replace(&self, doc: &Document) -> Result<Document, ApiError> {
            *self.stored.lock().unwrap() = doc.to_value();
            Ok(doc.clone())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn unchanged_save_reloads_the_same_fields() {
        let api = Arc::new(StoringApi {
            stored: Mutex::new(json!({
                "suppliers_json": ["Vendor"],
                "inputs_json": "[\"parts\",\"forms\"]",
                "process_json": ["step1", "step2"],
                "outputs_json": null,
                "customers_json": []
            })),
        });
        let load = |api: &Arc<StoringApi>| {
            let (options, _) = options(1500, Arc::new(SaveNotifier::default()));
            AutosaveController::load(api.clone(), DocKind::Sipoc, 9, options)
        };

        let ctl = load(&api).await.unwrap();
        let before = ctl.snapshot().await.unwrap().document;
        ctl.mutate(|doc| doc.change_row("process_json", 0, "step1"))
            .await
            .unwrap();
        assert!(matches!(ctl.save_now().await, SaveOutcome::Saved { .. }));
        ctl.close().await;

        let reloaded = load(&api).await.unwrap().snapshot().await.unwrap().document;
        for field in DocKind::Sipoc.list_fields() {
            assert_eq!(reloaded.list(field), before.list(field), "{}", field);
        }
        assert_eq!(reloaded.list("inputs_json"), vec!["parts", "forms"]);
        assert_eq!(reloaded.field("inputs_json"), before.field("inputs_json"));
    }

    #[tokio::test(start_paused = true)]
    async fn unchanged_answer_save_reloads_the_same_answers() {
        let api = Arc::new(StoringApi {
            stored: Mutex::new(json!({
                "answers_json": "{\"q1\":\"Weekly\",\"q2\":\"Manual\"}"
            })),
        });
        let load = |api: &Arc<StoringApi>| {
            let (options, _) = options(1000, Arc::new(SaveNotifier::default()));
            AutosaveController::load(api.clone(), DocKind::InterviewQa, 3, options)
        };

        let ctl = load(&api).await.unwrap();
        let before = ctl.snapshot().await.unwrap().document.map("answers_json");
        ctl.mutate(|doc| doc.set_answer("q1", "Weekly")).await.unwrap();
        assert!(matches!(ctl.save_now().await, SaveOutcome::Saved { .. }));
        ctl.close().await;

        let reloaded = load(&api).await.unwrap().snapshot().await.unwrap().document;
        assert_eq!(reloaded.map("answers_json"), before);
    }

    #[tokio::test(start_paused = true)]
    async fn manual_save_during_a_save_is_queued_not_raced() {
        let api = Arc::new(FakeApi::default());
        let (ctl, _) = open(&api, DocKind::Sipoc, 12).await;
        let ctl = Arc::new(ctl);
        let held = api.hold.lock().await;

        ctl.mutate(|doc| doc.change_row("process_json", 0, "a"))
            .await
            .unwrap();
        let first = tokio::spawn({
            let ctl = ctl.clone();
            async move { ctl.save_now().await }
        });
        wait_until(&ctl, SaveState::Saving { queued: false }).await;

        ctl.mutate(|doc| doc.change_row("process_json", 0, "b"))
            .await
            .unwrap();
        let second = tokio::spawn({
            let ctl = ctl.clone();
            async move { ctl.save_now().await }
        });
        wait_until(&ctl, SaveState::Saving { queued: true }).await;
        assert_eq!(api.puts().len(), 1);

        drop(held);
        let first = first.await.unwrap();
        let second = second.await.unwrap();
        assert!(matches!(first, SaveOutcome::Saved { .. }));
        assert_eq!(first, second);

        let puts = api.puts();
        assert_eq!(puts.len(), 2);
        assert_eq!(puts[1]["process_json"][0], "b");
        assert_eq!(ctl.state(), SaveState::Clean);
    }

    #[tokio::test(start_paused = true)]
    async fn manual_save_reports_outcomes() {
        let api = Arc::new(FakeApi::default());
        let (ctl, _) = open(&api, DocKind::Sipoc, 12).await;

        assert_eq!(ctl.save_now().await, SaveOutcome::NothingToSave);

        ctl.mutate(|doc| doc.add_row("process_json")).await.unwrap();
        let expected = ctl.snapshot().await.unwrap().document.fingerprint();
        assert_eq!(
            ctl.save_now().await,
            SaveOutcome::Saved {
                fingerprint: expected
            }
        );

        // the debounce timer was cancelled by the manual save
        sleep(ms(5000)).await;
        assert_eq!(api.puts().len(), 1);

        api.fail_puts.store(true, Ordering::SeqCst);
        ctl.mutate(|doc| doc.add_row("process_json")).await.unwrap();
        assert_eq!(
            ctl.save_now().await,
            SaveOutcome::Failed {
                message: "Service unavailable (HTTP 503)".to_string()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_edits_leave_the_document_clean() {
        let api = Arc::new(FakeApi::default());
        let (ctl, _) = open(&api, DocKind::Sipoc, 12).await;

        let err = ctl
            .mutate(|doc| doc.remove_row("process_json", 9))
            .await
            .unwrap_err();
        assert!(matches!(err, EditError::RowOutOfRange { index: 9, len: 2, .. }));
        assert_eq!(ctl.state(), SaveState::Clean);

        sleep(ms(5000)).await;
        assert!(api.puts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn findings_priority_follows_the_renamed_text() {
        let api = Arc::new(FakeApi::default());
        let (ctl, _) = open(&api, DocKind::Findings, 4).await;

        ctl.mutate(|doc| doc.change_row("findings_json", 0, "B"))
            .await
            .unwrap();
        wait_until(&ctl, SaveState::Clean).await;
        assert_eq!(
            api.puts()[0],
            json!({ "findings_json": ["B"], "priority_json": { "B": "High" } })
        );

        ctl.mutate(|doc| doc.add_row("findings_json")).await.unwrap();
        ctl.mutate(|doc| doc.change_row("findings_json", 1, "C"))
            .await
            .unwrap();
        ctl.mutate(|doc| crate::docs::priority::set_priority(doc, 1, Priority::Low))
            .await
            .unwrap();
        ctl.mutate(|doc| doc.remove_row("findings_json", 0))
            .await
            .unwrap();
        wait_until(&ctl, SaveState::Clean).await;
        assert_eq!(
            api.puts()[1],
            json!({ "findings_json": ["C"], "priority_json": { "C": "Low" } })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn save_toasts_are_shared_across_documents() {
        let api = Arc::new(FakeApi::default());
        let notifier = Arc::new(SaveNotifier::default());
        let (opts_a, toasts_a) = options(1500, notifier.clone());
        let (opts_b, toasts_b) = options(1000, notifier.clone());
        let sipoc = AutosaveController::load(api.clone(), DocKind::Sipoc, 12, opts_a)
            .await
            .unwrap();
        let findings = AutosaveController::load(api.clone(), DocKind::Findings, 4, opts_b)
            .await
            .unwrap();

        findings.mutate(|doc| doc.add_row("recommendations_json")).await.unwrap();
        sipoc.mutate(|doc| doc.add_row("process_json")).await.unwrap();
        wait_until(&findings, SaveState::Clean).await;
        wait_until(&sipoc, SaveState::Clean).await;

        assert_eq!(api.puts().len(), 2);
        assert_eq!(toasts_a.all().len() + toasts_b.all().len(), 1);
        assert_eq!(toasts_b.all().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn closing_cancels_the_pending_save() {
        let api = Arc::new(FakeApi::default());
        let (ctl, toasts) = open(&api, DocKind::Sipoc, 12).await;

        ctl.mutate(|doc| doc.add_row("process_json")).await.unwrap();
        ctl.close().await;
        sleep(ms(5000)).await;
        assert!(api.puts().is_empty());
        assert!(toasts.all().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn closing_abandons_an_in_flight_save() {
        let api = Arc::new(FakeApi::default());
        let (ctl, toasts) = open(&api, DocKind::Sipoc, 12).await;
        let held = api.hold.lock().await;

        ctl.mutate(|doc| doc.add_row("process_json")).await.unwrap();
        wait_until(&ctl, SaveState::Saving { queued: false }).await;
        let mut state = ctl.subscribe();

        ctl.close().await;
        drop(held);
        sleep(ms(5000)).await;

        assert_eq!(api.puts().len(), 1);
        assert!(toasts.all().is_empty());
        assert_eq!(*state.borrow_and_update(), SaveState::Saving { queued: false });
    }

    #[tokio::test]
    async fn load_failure_is_returned() {
        let api: Arc<dyn DocumentApi> = Arc::new(FakeApi::default());
        let (options, _) = options(1500, Arc::new(SaveNotifier::default()));
        let err = AutosaveController::load(api, DocKind::InterviewQa, 77, options)
            .await
            .err()
            .unwrap();
        assert_eq!(err.status(), Some(404));
    }
}
