//! Debounced autosave for an open document.
//!
//! Title and content settle independently; whenever either settles, the
//! latest settled pair is written as one patch. Saves are fire-and-forget
//! from the editor's point of view. Writes reach the store one at a time in
//! the order they settled, and only the newest one sets the status back to
//! saved.

pub mod debounce;

pub use debounce::{debounce, DEFAULT_QUIET_MS};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::docs::content::ContentTree;
use crate::docs::types::DocumentPatch;
use crate::notify::Notifier;
use crate::store::DocumentStore;

/// Save indicator state.
///
/// `Saved` → edit → `Pending` → quiet interval → `Saving` → `Saved` or `Failed`.
/// A failed save keeps the edits in memory; a new edit or [`Autosaver::retry`]
/// starts over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "error", rename_all = "lowercase")]
pub enum SaveStatus {
    Saved,
    Pending,
    Saving,
    Failed(String),
}

/// SHA-256 over title and serialized content
fn snapshot_digest(title: &str, content: &ContentTree) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update([0u8]);
    hasher.update(content.to_json_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

struct SaveJob {
    generation: u64,
    digest: String,
    patch: DocumentPatch,
}

/// Bookkeeping shared by the coordinator and the writer task
struct SaveLedger {
    /// Digest of the newest snapshot sent to the writer, cleared when it fails
    dispatched_digest: Option<String>,
    dispatched: u64,
    finished: u64,
}

/// Queues settled snapshots for a single writer task, so writes reach the
/// store in the order they settled.
struct SaveWorker {
    doc_id: String,
    status: Arc<watch::Sender<SaveStatus>>,
    ledger: Arc<Mutex<SaveLedger>>,
    queue: mpsc::UnboundedSender<SaveJob>,
}

impl SaveWorker {
    fn new(
        store: Arc<dyn DocumentStore>,
        notifier: Arc<Notifier>,
        doc_id: String,
        status: Arc<watch::Sender<SaveStatus>>,
        persisted_digest: String,
    ) -> Self {
        let ledger = Arc::new(Mutex::new(SaveLedger {
            dispatched_digest: Some(persisted_digest),
            dispatched: 0,
            finished: 0,
        }));
        let (queue, jobs) = mpsc::unbounded_channel();

        tokio::spawn(write_jobs(
            jobs,
            store,
            notifier,
            doc_id.clone(),
            status.clone(),
            ledger.clone(),
        ));

        Self {
            doc_id,
            status,
            ledger,
            queue,
        }
    }

    /// Queue a write of `title` and `content` unless that exact snapshot is
    /// already stored or on its way. `force` skips that check.
    fn save(&self, title: &str, content: &ContentTree, force: bool) {
        let digest = snapshot_digest(title, content);
        let mut ledger = self.ledger.lock().unwrap_or_else(|e| e.into_inner());

        if !force && ledger.dispatched_digest.as_deref() == Some(digest.as_str()) {
            let settled = if ledger.finished == ledger.dispatched {
                SaveStatus::Saved
            } else {
                SaveStatus::Saving
            };
            self.status.send_replace(settled);
            return;
        }

        ledger.dispatched += 1;
        ledger.dispatched_digest = Some(digest.clone());
        let job = SaveJob {
            generation: ledger.dispatched,
            digest,
            patch: DocumentPatch {
                title: Some(title.to_string()),
                content: Some(content.clone()),
                status: None,
            },
        };
        drop(ledger);

        self.status.send_replace(SaveStatus::Saving);
        if self.queue.send(job).is_err() {
            tracing::warn!(doc_id = %self.doc_id, "save writer stopped");
        }
    }
}

/// Runs until every queued job is written, even after the editor closes
async fn write_jobs(
    mut jobs: mpsc::UnboundedReceiver<SaveJob>,
    store: Arc<dyn DocumentStore>,
    notifier: Arc<Notifier>,
    doc_id: String,
    status: Arc<watch::Sender<SaveStatus>>,
    ledger: Arc<Mutex<SaveLedger>>,
) {
    while let Some(job) = jobs.recv().await {
        let result = store.update(&doc_id, &job.patch).await;

        let mut state = ledger.lock().unwrap_or_else(|e| e.into_inner());
        state.finished = job.generation;
        match result {
            Ok(_) => {
                tracing::debug!(doc_id = %doc_id, generation = job.generation, "autosaved");
                if job.generation == state.dispatched {
                    status.send_replace(SaveStatus::Saved);
                }
            }
            Err(e) => {
                if state.dispatched_digest.as_deref() == Some(job.digest.as_str()) {
                    state.dispatched_digest = None;
                }
                tracing::error!(doc_id = %doc_id, error = %e, "autosave failed");
                notifier.error(format!("Could not save your changes: {}", e));
                status.send_replace(SaveStatus::Failed(e.to_string()));
            }
        }
    }
}

/// Handle held by an open editor page. Dropping it stops autosaving; an edit
/// still inside its quiet interval is not written.
pub struct Autosaver {
    content_tx: mpsc::UnboundedSender<ContentTree>,
    title_tx: mpsc::UnboundedSender<String>,
    retry_tx: mpsc::UnboundedSender<()>,
    status_tx: Arc<watch::Sender<SaveStatus>>,
    status_rx: watch::Receiver<SaveStatus>,
    task: JoinHandle<()>,
}

impl Autosaver {
    /// Start autosaving `doc_id`, whose persisted state is `title` and `content`
    pub fn spawn(
        store: Arc<dyn DocumentStore>,
        notifier: Arc<Notifier>,
        doc_id: impl Into<String>,
        title: String,
        content: ContentTree,
        quiet: Duration,
    ) -> Self {
        let (content_tx, mut settled_content) = debounce::<ContentTree>(quiet);
        let (title_tx, mut settled_title) = debounce::<String>(quiet);
        let (retry_tx, mut retry_rx) = mpsc::unbounded_channel::<()>();
        let (status_tx, status_rx) = watch::channel(SaveStatus::Saved);
        let status_tx = Arc::new(status_tx);

        let worker = SaveWorker::new(
            store,
            notifier,
            doc_id.into(),
            status_tx.clone(),
            snapshot_digest(&title, &content),
        );

        let task = tokio::spawn(async move {
            let mut title = title;
            let mut content = content;

            loop {
                let force = tokio::select! {
                    Some(next) = settled_content.recv() => {
                        content = next;
                        false
                    }
                    Some(next) = settled_title.recv() => {
                        title = next;
                        false
                    }
                    Some(()) = retry_rx.recv() => {
                        tracing::info!(doc_id = %worker.doc_id, "retrying save");
                        true
                    }
                    else => break,
                };
                worker.save(&title, &content, force);
            }
        });

        Self {
            content_tx,
            title_tx,
            retry_tx,
            status_tx,
            status_rx,
            task,
        }
    }

    pub fn set_content(&self, content: ContentTree) {
        self.status_tx.send_replace(SaveStatus::Pending);
        let _ = self.content_tx.send(content);
    }

    pub fn set_title(&self, title: impl Into<String>) {
        self.status_tx.send_replace(SaveStatus::Pending);
        let _ = self.title_tx.send(title.into());
    }

    /// Resend the latest settled title and content, typically after a failure
    pub fn retry(&self) {
        let _ = self.retry_tx.send(());
    }

    pub fn status(&self) -> SaveStatus {
        self.status_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SaveStatus> {
        self.status_rx.clone()
    }

    /// Forward every change an editor surface emits
    pub fn follow(self: &Arc<Self>, mut changes: mpsc::UnboundedReceiver<ContentTree>) -> JoinHandle<()> {
        let saver = Arc::downgrade(self);
        tokio::spawn(async move {
            while let Some(content) = changes.recv().await {
                match saver.upgrade() {
                    Some(saver) => saver.set_content(content),
                    None => break,
                }
            }
        })
    }
}

impl Drop for Autosaver {
    fn drop(&mut self) {
        // In-flight saves keep running; only the coordinator stops
        self.task.abort();
    }
}
