//! Record store collaborators for the `documents` collection.

pub mod rest;
pub mod sqlite;

pub use rest::RestStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::docs::types::{DocumentPatch, StoredDocument};

/// Stores only tell "not found" apart from everything else
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Document not found: {0}")]
    NotFound(String),
    #[error("Store failure: {0}")]
    Backend(String),
}

impl From<crate::database::DbError> for StoreError {
    fn from(e: crate::database::DbError) -> Self {
        StoreError::Backend(e.to_string())
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a draft with placeholder title and content, returning its id
    async fn create(&self, owner: &str) -> Result<String, StoreError>;

    async fn fetch(&self, id: &str) -> Result<StoredDocument, StoreError>;

    /// Partial update; `updated_at` is always refreshed
    async fn update(&self, id: &str, patch: &DocumentPatch) -> Result<StoredDocument, StoreError>;

    async fn delete(&self, id: &str) -> Result<(), StoreError>;

    /// Owner's documents, most recently updated first
    async fn list(&self, owner: &str) -> Result<Vec<StoredDocument>, StoreError>;
}
