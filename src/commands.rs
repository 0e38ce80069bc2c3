use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::autosave::{Autosaver, SaveStatus};
use crate::clipboard::{Clipboard, SystemClipboard};
use crate::config::{AppConfig, Backend};
use crate::database::{default_database_path, Database, DbError};
use crate::docs::{
    check_visibility, share_url, DashboardFilter, Document, DocumentPatch, DocumentStatus,
    DocumentSummary, StoredDocument,
};
use crate::editor::{Command, EditError, EditorSurface};
use crate::error::{AppError, CommandError};
use crate::notify::Notifier;
use crate::routes::Route;
use crate::session::{AuthError, AuthProvider, RestAuth, SessionContext, StaticAuth};
use crate::store::{DocumentStore, RestStore, SqliteStore, StoreError};

/// Owner id used when documents live in a local database
pub const LOCAL_OWNER: &str = "local";

#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Config error: {0}")]
    Config(#[from] crate::config::ConfigError),
    #[error("Database error: {0}")]
    Database(#[from] DbError),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),
}

pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub auth: Arc<dyn AuthProvider>,
    pub clipboard: Arc<dyn Clipboard>,
    pub notifier: Arc<Notifier>,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        auth: Arc<dyn AuthProvider>,
        clipboard: Arc<dyn Clipboard>,
        config: AppConfig,
    ) -> Self {
        Self {
            store,
            auth,
            clipboard,
            notifier: Arc::new(Notifier::new(config.notification_capacity)),
            config,
        }
    }

    /// Wire collaborators for the configured backend
    pub fn from_config(config: AppConfig) -> Result<Self, StartupError> {
        let (store, auth): (Arc<dyn DocumentStore>, Arc<dyn AuthProvider>) = match &config.backend {
            Backend::Sqlite { path } => {
                let path = path.clone().unwrap_or_else(default_database_path);
                let db = Arc::new(Database::open(&path)?);
                (
                    Arc::new(SqliteStore::new(db)),
                    Arc::new(StaticAuth::signed_in(LOCAL_OWNER)),
                )
            }
            Backend::Rest { url, api_key } => {
                tracing::info!(url = %url, "using hosted document store");
                (
                    Arc::new(RestStore::new(url.as_str(), api_key.as_str())?),
                    Arc::new(RestAuth::new(url.as_str(), api_key.as_str())?),
                )
            }
        };

        Ok(Self::new(store, auth, Arc::new(SystemClipboard), config))
    }

    /// Log a failure, show it to the user and turn it into the command result
    fn report(&self, err: AppError) -> CommandError {
        match &err {
            AppError::WriteFailed(_) | AppError::ReadFailed(_) => {
                tracing::error!(kind = ?err.kind(), error = %err, "command failed")
            }
            _ => tracing::warn!(kind = ?err.kind(), error = %err, "command failed"),
        }
        self.notifier.error(err.to_string());
        err.into()
    }

    /// Fetch a document the signed-in user owns; anything else reads as not found
    async fn owned(&self, session: &SessionContext, id: &str) -> Result<StoredDocument, AppError> {
        let user = session.require_user()?;
        let stored = self
            .store
            .fetch(id)
            .await
            .map_err(|e| AppError::from_fetch(id, e))?;

        if stored.owner != user.id {
            tracing::warn!(doc_id = id, user_id = %user.id, "document owned by someone else");
            return Err(AppError::NotFound(id.to_string()));
        }
        Ok(stored)
    }

    async fn fetched(&self, id: &str) -> Result<StoredDocument, AppError> {
        self.store
            .fetch(id)
            .await
            .map_err(|e| AppError::from_fetch(id, e))
    }
}

fn decode(stored: StoredDocument) -> Result<Document, AppError> {
    let id = stored.id.clone();
    stored
        .into_document()
        .map_err(|source| AppError::ParseFailed { id, source })
}

/// An open `/document/<id>` page
pub struct EditorPage {
    pub document: Document,
    pub editor: EditorSurface,
    autosaver: Arc<Autosaver>,
}

impl EditorPage {
    pub fn apply(&mut self, command: Command) -> Result<bool, EditError> {
        self.editor.apply(command)
    }

    pub fn rename(&mut self, title: impl Into<String>) {
        let title = title.into();
        self.document.title = title.clone();
        self.autosaver.set_title(title);
    }

    pub fn save_status(&self) -> SaveStatus {
        self.autosaver.status()
    }

    pub fn retry_save(&self) {
        self.autosaver.retry();
    }

    pub fn autosaver(&self) -> &Autosaver {
        &self.autosaver
    }
}

/// An open `/document/<id>/view` page
pub struct ViewerPage {
    pub document: Document,
    pub editor: EditorSurface,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

// Session commands
pub async fn sign_in(state: &AppState, request: &SignInRequest) -> Result<SessionContext, CommandError> {
    match state.auth.sign_in(&request.email, &request.password).await {
        Ok(user) => {
            tracing::info!(user_id = %user.id, "signed in");
            Ok(SessionContext::signed_in(user))
        }
        Err(e) => {
            tracing::warn!(error = %e, "sign in failed");
            Err(state.report(AppError::Unauthenticated))
        }
    }
}

pub async fn sign_out(state: &AppState, session: &mut SessionContext) -> Route {
    if let Err(e) = state.auth.sign_out().await {
        tracing::warn!(error = %e, "sign out failed at the provider");
    }
    session.end();
    Route::SignIn
}

// Document commands
pub async fn create_document(state: &AppState, session: &SessionContext) -> Result<Route, CommandError> {
    let result: Result<String, AppError> = async {
        let user = session.require_user()?;
        state.store.create(&user.id).await.map_err(AppError::from_write)
    }
    .await;

    let id = result.map_err(|e| state.report(e))?;
    tracing::info!(doc_id = %id, "document created");
    Ok(Route::Editor(id))
}

pub async fn open_editor(
    state: &AppState,
    session: &SessionContext,
    id: &str,
) -> Result<EditorPage, CommandError> {
    let document = async { decode(state.owned(session, id).await?) }
        .await
        .map_err(|e| state.report(e))?;

    let autosaver = Arc::new(Autosaver::spawn(
        state.store.clone(),
        state.notifier.clone(),
        document.id.clone(),
        document.title.clone(),
        document.content.clone(),
        state.config.autosave_quiet(),
    ));
    let (changes_tx, changes_rx) = tokio::sync::mpsc::unbounded_channel();
    autosaver.follow(changes_rx);

    let editor = EditorSurface::new(document.content.clone()).with_change_sink(changes_tx);
    tracing::debug!(doc_id = id, "editor opened");

    Ok(EditorPage {
        document,
        editor,
        autosaver,
    })
}

/// Read-only view; open to anyone once published, closed to everyone before
pub async fn open_viewer(state: &AppState, id: &str) -> Result<ViewerPage, CommandError> {
    let document = async {
        let stored = state.fetched(id).await?;
        check_visibility(&stored.id, stored.status)?;
        decode(stored)
    }
    .await
    .map_err(|e| state.report(e))?;

    let editor = EditorSurface::read_only(document.content.clone());
    Ok(ViewerPage { document, editor })
}

pub async fn load_dashboard(
    state: &AppState,
    session: &SessionContext,
    filter: &DashboardFilter,
) -> Result<Vec<DocumentSummary>, CommandError> {
    let result: Result<Vec<DocumentSummary>, AppError> = async {
        let user = session.require_user()?;
        let documents = state
            .store
            .list(&user.id)
            .await
            .map_err(|e| AppError::ReadFailed(e.to_string()))?;
        let summaries: Vec<DocumentSummary> = documents.iter().map(StoredDocument::summary).collect();
        Ok(filter.apply(&summaries))
    }
    .await;

    result.map_err(|e| state.report(e))
}

async fn update_owned(
    state: &AppState,
    session: &SessionContext,
    id: &str,
    patch: DocumentPatch,
) -> Result<DocumentSummary, CommandError> {
    let result: Result<StoredDocument, AppError> = async {
        state.owned(session, id).await?;
        state.store.update(id, &patch).await.map_err(AppError::from_write)
    }
    .await;

    let updated = result.map_err(|e| state.report(e))?;
    Ok(updated.summary())
}

pub async fn rename_document(
    state: &AppState,
    session: &SessionContext,
    id: &str,
    title: &str,
) -> Result<DocumentSummary, CommandError> {
    update_owned(state, session, id, DocumentPatch::title(title)).await
}

pub async fn set_status(
    state: &AppState,
    session: &SessionContext,
    id: &str,
    status: DocumentStatus,
) -> Result<DocumentSummary, CommandError> {
    let summary = update_owned(state, session, id, DocumentPatch::status(status)).await?;
    match status {
        DocumentStatus::Published => state.notifier.success("Document published"),
        DocumentStatus::Draft => state.notifier.info("Document moved back to drafts"),
    }
    tracing::info!(doc_id = id, status = %status, "status changed");
    Ok(summary)
}

pub async fn delete_document(
    state: &AppState,
    session: &SessionContext,
    id: &str,
) -> Result<(), CommandError> {
    let result: Result<(), AppError> = async {
        state.owned(session, id).await?;
        state.store.delete(id).await.map_err(AppError::from_write)
    }
    .await;

    result.map_err(|e| state.report(e))?;
    tracing::info!(doc_id = id, "document deleted");
    state.notifier.success("Document deleted");
    Ok(())
}

/// Copy the public link of a published document
pub async fn share_document(
    state: &AppState,
    session: &SessionContext,
    id: &str,
) -> Result<String, CommandError> {
    let result: Result<String, AppError> = async {
        let stored = state.owned(session, id).await?;
        check_visibility(&stored.id, stored.status)?;
        Ok(share_url(&state.config.origin, &stored.id))
    }
    .await;
    let url = result.map_err(|e| state.report(e))?;

    let clipboard = state.clipboard.clone();
    let link = url.clone();
    let copied = tokio::task::spawn_blocking(move || clipboard.write_text(&link))
        .await
        .map_err(|e| e.to_string())
        .and_then(|written| written.map_err(|e| e.to_string()));

    match copied {
        Ok(()) => state.notifier.success("Link copied to clipboard"),
        Err(e) => {
            tracing::warn!(doc_id = id, error = %e, "could not copy share link");
            state.notifier.info(format!("Share link: {}", url));
        }
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipboard::{ClipboardError, MemoryClipboard};
    use crate::docs::ContentTree;
    use crate::editor::Selection;
    use crate::error::ErrorKind;
    use crate::notify::NotificationLevel;
    use async_trait::async_trait;
    use std::time::Duration;

    struct Harness {
        state: AppState,
        db: Arc<Database>,
        clipboard: Arc<MemoryClipboard>,
        session: SessionContext,
    }

    async fn harness() -> Harness {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let clipboard = Arc::new(MemoryClipboard::new());
        let auth = Arc::new(StaticAuth::signed_in("owner-1"));
        let config = AppConfig {
            origin: "https://docs.example.com/".into(),
            autosave_quiet_ms: 20,
            ..AppConfig::default()
        };
        let state = AppState::new(
            Arc::new(SqliteStore::new(db.clone())),
            auth.clone(),
            clipboard.clone(),
            config,
        );
        let session = SessionContext::start(auth.as_ref()).await;
        Harness {
            state,
            db,
            clipboard,
            session,
        }
    }

    async fn new_document(h: &Harness) -> String {
        match create_document(&h.state, &h.session).await.unwrap() {
            Route::Editor(id) => id,
            other => panic!("unexpected route {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_opens_editor_on_placeholder() {
        let h = harness().await;
        let id = new_document(&h).await;

        let page = open_editor(&h.state, &h.session, &id).await.unwrap();
        assert_eq!(page.document.title, "Untitled Document");
        assert_eq!(page.document.status, DocumentStatus::Draft);
        assert_eq!(page.editor.content(), &ContentTree::empty());
        assert_eq!(page.save_status(), SaveStatus::Saved);
    }

    #[tokio::test]
    async fn test_signed_out_user_is_sent_to_sign_in() {
        let h = harness().await;
        let err = create_document(&h.state, &SessionContext::default()).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unauthenticated);
        assert_eq!(err.redirect, Some(Route::SignIn));
    }

    #[tokio::test]
    async fn test_draft_is_unreachable_by_view_link_even_for_owner() {
        let h = harness().await;
        let id = new_document(&h).await;

        let err = open_viewer(&h.state, &id).await.err().unwrap();
        assert_eq!(err.kind, ErrorKind::AccessDenied);
        assert_eq!(err.redirect, Some(Route::SignIn));
        assert_eq!(h.state.notifier.latest().unwrap().level, NotificationLevel::Error);

        set_status(&h.state, &h.session, &id, DocumentStatus::Published).await.unwrap();
        let page = open_viewer(&h.state, &id).await.unwrap();
        assert!(page.editor.is_read_only());
        assert_eq!(page.document.id, id);
    }

    #[tokio::test]
    async fn test_share_only_published() {
        let h = harness().await;
        let id = new_document(&h).await;

        let err = share_document(&h.state, &h.session, &id).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::AccessDenied);
        assert_eq!(h.clipboard.contents(), None);

        set_status(&h.state, &h.session, &id, DocumentStatus::Published).await.unwrap();
        let url = share_document(&h.state, &h.session, &id).await.unwrap();
        assert_eq!(url, format!("https://docs.example.com/document/{}/view", id));
        assert_eq!(h.clipboard.contents(), Some(url));
    }

    #[tokio::test]
    async fn test_delete_is_final() {
        let h = harness().await;
        let id = new_document(&h).await;
        let keep = new_document(&h).await;

        delete_document(&h.state, &h.session, &id).await.unwrap();

        let err = open_editor(&h.state, &h.session, &id).await.err().unwrap();
        assert_eq!(err.kind, ErrorKind::NotFound);
        assert_eq!(err.redirect, Some(Route::Dashboard));

        let listed = load_dashboard(&h.state, &h.session, &DashboardFilter::default())
            .await
            .unwrap();
        let ids: Vec<&str> = listed.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec![keep.as_str()]);
    }

    #[tokio::test]
    async fn test_dashboard_filter_by_title_and_status() {
        let h = harness().await;
        for (title, status) in [
            ("Plan A", DocumentStatus::Draft),
            ("Plan B", DocumentStatus::Published),
            ("Notes", DocumentStatus::Draft),
        ] {
            let id = new_document(&h).await;
            rename_document(&h.state, &h.session, &id, title).await.unwrap();
            set_status(&h.state, &h.session, &id, status).await.unwrap();
        }

        let filter = DashboardFilter::new("Plan", None).with_status_choice("draft").unwrap();
        let rows = load_dashboard(&h.state, &h.session, &filter).await.unwrap();
        let titles: Vec<&str> = rows.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Plan A"]);

        let all = DashboardFilter::default().with_status_choice("all").unwrap();
        assert_eq!(load_dashboard(&h.state, &h.session, &all).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_other_owners_documents_are_not_found() {
        let h = harness().await;
        let id = new_document(&h).await;
        let stranger = SessionContext::signed_in(crate::session::User {
            id: "owner-2".into(),
            email: None,
        });

        let err = open_editor(&h.state, &stranger, &id).await.err().unwrap();
        assert_eq!(err.kind, ErrorKind::NotFound);
        assert!(delete_document(&h.state, &stranger, &id).await.is_err());
        assert!(open_editor(&h.state, &h.session, &id).await.is_ok());
    }

    #[tokio::test]
    async fn test_unreadable_content_is_not_rendered() {
        let h = harness().await;
        let id = new_document(&h).await;
        h.db.conn
            .lock()
            .unwrap()
            .execute(
                "UPDATE documents SET content = ?1 WHERE id = ?2",
                rusqlite::params![r#"{"type":"doc","content":[{"type":"video"}]}"#, id],
            )
            .unwrap();

        let err = open_editor(&h.state, &h.session, &id).await.err().unwrap();
        assert_eq!(err.kind, ErrorKind::ParseFailed);
        assert_eq!(err.redirect, Some(Route::Dashboard));
    }

    #[tokio::test]
    async fn test_unreadable_draft_is_denied_before_decoding() {
        let h = harness().await;
        let id = new_document(&h).await;
        h.db.conn
            .lock()
            .unwrap()
            .execute(
                "UPDATE documents SET content = ?1 WHERE id = ?2",
                rusqlite::params![r#"{"type":"doc","content":[{"type":"video"}]}"#, id],
            )
            .unwrap();

        let err = open_viewer(&h.state, &id).await.err().unwrap();
        assert_eq!(err.kind, ErrorKind::AccessDenied);
        assert_eq!(err.redirect, Some(Route::SignIn));
    }

    struct RefusingClipboard;

    impl Clipboard for RefusingClipboard {
        fn write_text(&self, _text: &str) -> Result<(), ClipboardError> {
            Err(ClipboardError::Unavailable)
        }
    }

    #[tokio::test]
    async fn test_share_without_clipboard_shows_link() {
        let auth = Arc::new(StaticAuth::signed_in("owner-1"));
        let state = AppState::new(
            Arc::new(SqliteStore::in_memory().unwrap()),
            auth.clone(),
            Arc::new(RefusingClipboard),
            AppConfig::default(),
        );
        let session = SessionContext::start(auth.as_ref()).await;
        let id = match create_document(&state, &session).await.unwrap() {
            Route::Editor(id) => id,
            other => panic!("unexpected route {other:?}"),
        };
        set_status(&state, &session, &id, DocumentStatus::Published).await.unwrap();

        let url = share_document(&state, &session, &id).await.unwrap();

        let shown = state.notifier.latest().unwrap();
        assert_eq!(shown.level, NotificationLevel::Info);
        assert!(shown.message.contains(&url));
    }

    struct ReadOnlyStore(SqliteStore);

    #[async_trait]
    impl DocumentStore for ReadOnlyStore {
        async fn create(&self, owner: &str) -> Result<String, StoreError> {
            self.0.create(owner).await
        }

        async fn fetch(&self, id: &str) -> Result<StoredDocument, StoreError> {
            self.0.fetch(id).await
        }

        async fn update(&self, _id: &str, _patch: &DocumentPatch) -> Result<StoredDocument, StoreError> {
            Err(StoreError::Backend("read-only replica".into()))
        }

        async fn delete(&self, _id: &str) -> Result<(), StoreError> {
            Err(StoreError::Backend("read-only replica".into()))
        }

        async fn list(&self, owner: &str) -> Result<Vec<StoredDocument>, StoreError> {
            self.0.list(owner).await
        }
    }

    #[tokio::test]
    async fn test_write_failure_keeps_the_page() {
        let mut h = harness().await;
        h.state.store = Arc::new(ReadOnlyStore(SqliteStore::new(h.db.clone())));
        let id = new_document(&h).await;

        let err = rename_document(&h.state, &h.session, &id, "Plan C").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::WriteFailed);
        assert_eq!(err.redirect, None);
        assert!(err.message.contains("read-only replica"));

        let err = delete_document(&h.state, &h.session, &id).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::WriteFailed);
        assert!(open_editor(&h.state, &h.session, &id).await.is_ok());
    }

    #[tokio::test]
    async fn test_editor_edits_are_autosaved() {
        let h = harness().await;
        let id = new_document(&h).await;

        let mut page = open_editor(&h.state, &h.session, &id).await.unwrap();
        page.editor.select(Selection::cursor(0, 0));
        page.apply(Command::InsertText("Hello".into())).unwrap();
        page.rename("Greeting");

        let mut status = page.autosaver().subscribe();
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let stored = h.state.store.fetch(&id).await.unwrap();
                if stored.title == "Greeting" && stored.into_document().unwrap().content.plain_text() == "Hello" {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        tokio::time::timeout(Duration::from_secs(5), status.wait_for(|s| *s == SaveStatus::Saved))
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_sign_in_and_out() {
        let auth = Arc::new(StaticAuth::signed_out().with_password("hunter2"));
        let state = AppState::new(
            Arc::new(SqliteStore::in_memory().unwrap()),
            auth,
            Arc::new(MemoryClipboard::new()),
            AppConfig::default(),
        );

        let bad = SignInRequest {
            email: "ada@example.com".into(),
            password: "nope".into(),
        };
        assert_eq!(sign_in(&state, &bad).await.unwrap_err().redirect, Some(Route::SignIn));

        let good = SignInRequest {
            password: "hunter2".into(),
            ..bad
        };
        let mut session = sign_in(&state, &good).await.unwrap();
        assert!(session.user_id().is_some());

        assert_eq!(sign_out(&state, &mut session).await, Route::SignIn);
        assert!(session.user.is_none());
    }
}
