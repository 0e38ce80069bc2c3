use super::content::ContentTree;
use super::types::{DocumentPatch, DocumentStatus, StoredDocument, DEFAULT_TITLE};
use crate::database::{Database, DbError};
use rusqlite::Row;

const DOCUMENT_COLUMNS: &str = "id, title, content, status, owner, created_at, updated_at";

impl Database {
    /// Create the documents table
    pub fn create_docs_table(&self) -> Result<(), DbError> {
        let conn = self.conn.lock().map_err(|_| DbError::Lock)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                content TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'draft',
                owner TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_documents_owner_updated_at
             ON documents(owner, updated_at DESC)",
            [],
        )?;

        Ok(())
    }

    /// Create a new draft document with placeholder title and content
    pub fn create_document(&self, owner: &str) -> Result<StoredDocument, DbError> {
        let conn = self.conn.lock().map_err(|_| DbError::Lock)?;
        let now = chrono::Utc::now().timestamp_millis();
        let id = uuid::Uuid::new_v4().to_string();
        let content = ContentTree::empty().to_json_string();
        let status = DocumentStatus::Draft;

        conn.execute(
            "INSERT INTO documents (id, title, content, status, owner, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![id, DEFAULT_TITLE, content, status.as_str(), owner, now, now],
        )?;

        Ok(StoredDocument {
            id,
            title: DEFAULT_TITLE.to_string(),
            content: serde_json::Value::String(content),
            status,
            owner: owner.to_string(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Get a document by ID
    pub fn get_document(&self, id: &str) -> Result<Option<StoredDocument>, DbError> {
        let conn = self.conn.lock().map_err(|_| DbError::Lock)?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM documents WHERE id = ?1",
            DOCUMENT_COLUMNS
        ))?;

        let mut rows = stmt.query([id])?;

        if let Some(row) = rows.next()? {
            Ok(Some(document_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    /// Update a document. `updated_at` is refreshed even when the patch is empty.
    pub fn update_document(&self, id: &str, patch: &DocumentPatch) -> Result<Option<StoredDocument>, DbError> {
        let now = chrono::Utc::now().timestamp_millis();

        {
            let conn = self.conn.lock().map_err(|_| DbError::Lock)?;

            // Build dynamic update query
            let mut updates = Vec::new();
            let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
            let mut param_idx = 1;

            if let Some(title) = &patch.title {
                updates.push(format!("title = ?{}", param_idx));
                params.push(Box::new(title.clone()));
                param_idx += 1;
            }

            if let Some(content) = patch.serialized_content() {
                updates.push(format!("content = ?{}", param_idx));
                params.push(Box::new(content));
                param_idx += 1;
            }

            if let Some(status) = patch.status {
                updates.push(format!("status = ?{}", param_idx));
                params.push(Box::new(status.as_str()));
                param_idx += 1;
            }

            updates.push(format!("updated_at = ?{}", param_idx));
            params.push(Box::new(now));
            param_idx += 1;

            let sql = format!(
                "UPDATE documents SET {} WHERE id = ?{}",
                updates.join(", "),
                param_idx
            );
            params.push(Box::new(id.to_string()));

            let params_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
            let affected = conn.execute(&sql, params_refs.as_slice())?;

            if affected == 0 {
                return Ok(None);
            }
        }

        self.get_document(id)
    }

    /// List an owner's documents, most recently updated first
    pub fn list_documents(&self, owner: &str) -> Result<Vec<StoredDocument>, DbError> {
        let conn = self.conn.lock().map_err(|_| DbError::Lock)?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM documents
             WHERE owner = ?1
             ORDER BY updated_at DESC, rowid DESC",
            DOCUMENT_COLUMNS
        ))?;

        let rows = stmt.query_map([owner], document_from_row)?;

        let mut documents = Vec::new();
        for row in rows {
            documents.push(row?);
        }

        Ok(documents)
    }

    /// Delete a document by ID
    pub fn delete_document(&self, id: &str) -> Result<bool, DbError> {
        let conn = self.conn.lock().map_err(|_| DbError::Lock)?;

        let affected = conn.execute("DELETE FROM documents WHERE id = ?1", [id])?;

        Ok(affected > 0)
    }
}

fn document_from_row(row: &Row<'_>) -> rusqlite::Result<StoredDocument> {
    let id: String = row.get(0)?;
    let raw_content: String = row.get(2)?;
    let raw_status: String = row.get(3)?;

    let status = match raw_status.parse() {
        Ok(status) => status,
        Err(_) => {
            tracing::warn!(doc_id = %id, status = %raw_status, "unknown document status, treating as draft");
            DocumentStatus::default()
        }
    };

    // Text that is not JSON at all stays a string and fails later as corrupt content
    let content = serde_json::from_str(&raw_content)
        .unwrap_or(serde_json::Value::String(raw_content));

    Ok(StoredDocument {
        id,
        title: row.get(1)?,
        content,
        status,
        owner: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}
