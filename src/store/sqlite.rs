use async_trait::async_trait;
use std::sync::Arc;

use super::{DocumentStore, StoreError};
use crate::database::{Database, DbError};
use crate::docs::types::{DocumentPatch, StoredDocument};

/// Local store backed by the SQLite `documents` table
#[derive(Clone)]
pub struct SqliteStore {
    db: Arc<Database>,
}

impl SqliteStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn in_memory() -> Result<Self, DbError> {
        Ok(Self::new(Arc::new(Database::open_in_memory()?)))
    }

    /// rusqlite is blocking; keep it off the async workers
    async fn blocking<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> Result<T, StoreError> + Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || op(&db))
            .await
            .map_err(|e| StoreError::Backend(format!("store task failed: {}", e)))?
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn create(&self, owner: &str) -> Result<String, StoreError> {
        let owner = owner.to_string();
        self.blocking(move |db| Ok(db.create_document(&owner)?.id)).await
    }

    async fn fetch(&self, id: &str) -> Result<StoredDocument, StoreError> {
        let id = id.to_string();
        self.blocking(move |db| {
            db.get_document(&id)?
                .ok_or_else(|| StoreError::NotFound(id.clone()))
        })
        .await
    }

    async fn update(&self, id: &str, patch: &DocumentPatch) -> Result<StoredDocument, StoreError> {
        let id = id.to_string();
        let patch = patch.clone();
        self.blocking(move |db| {
            db.update_document(&id, &patch)?
                .ok_or_else(|| StoreError::NotFound(id.clone()))
        })
        .await
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let id = id.to_string();
        self.blocking(move |db| {
            if db.delete_document(&id)? {
                Ok(())
            } else {
                Err(StoreError::NotFound(id.clone()))
            }
        })
        .await
    }

    async fn list(&self, owner: &str) -> Result<Vec<StoredDocument>, StoreError> {
        let owner = owner.to_string();
        self.blocking(move |db| Ok(db.list_documents(&owner)?)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docs::content::{Block, ContentTree, Inline};
    use crate::docs::types::{DocumentStatus, DEFAULT_TITLE};

    #[tokio::test]
    async fn test_create_fetch_update() {
        let store = SqliteStore::in_memory().unwrap();
        let id = store.create("user-1").await.unwrap();

        let fetched = store.fetch(&id).await.unwrap();
        assert_eq!(fetched.title, DEFAULT_TITLE);
        assert_eq!(fetched.status, DocumentStatus::Draft);

        let content = ContentTree::new(vec![Block::heading(2, vec![Inline::text("Agenda")])]);
        let patch = DocumentPatch {
            content: Some(content.clone()),
            ..DocumentPatch::default()
        };
        let updated = store.update(&id, &patch).await.unwrap();
        assert_eq!(updated.into_document().unwrap().content, content);
    }

    #[tokio::test]
    async fn test_delete_is_final() {
        let store = SqliteStore::in_memory().unwrap();
        let id = store.create("user-1").await.unwrap();
        let kept = store.create("user-1").await.unwrap();

        store.delete(&id).await.unwrap();

        assert_eq!(store.fetch(&id).await.unwrap_err(), StoreError::NotFound(id.clone()));
        let listed = store.list("user-1").await.unwrap();
        assert!(listed.iter().all(|d| d.id != id));
        assert!(listed.iter().any(|d| d.id == kept));
        assert!(matches!(store.delete(&id).await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let store = SqliteStore::in_memory().unwrap();
        let err = store.update("nope", &DocumentPatch::title("x")).await.unwrap_err();
        assert_eq!(err, StoreError::NotFound("nope".to_string()));
    }
}
