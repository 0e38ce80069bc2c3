use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::content::{ContentError, ContentTree};

pub const DEFAULT_TITLE: &str = "Untitled Document";

/// Publication state; a document is readable through its share link only when published
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    #[default]
    Draft,
    Published,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Draft => "draft",
            DocumentStatus::Published => "published",
        }
    }

    pub fn is_published(&self) -> bool {
        matches!(self, DocumentStatus::Published)
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "draft" => Ok(DocumentStatus::Draft),
            "published" => Ok(DocumentStatus::Published),
            other => Err(format!("unknown document status: {}", other)),
        }
    }
}

/// A document record as a store returns it.
///
/// `content` is kept raw: it may be the serialized tree inside a JSON string
/// or the JSON object itself. Call [`StoredDocument::into_document`] before
/// handing it to anything that reads content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredDocument {
    pub id: String,
    pub title: String,
    pub content: serde_json::Value,
    pub status: DocumentStatus,
    pub owner: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl StoredDocument {
    pub fn into_document(self) -> Result<Document, ContentError> {
        let content = ContentTree::from_stored(&self.content)?;
        Ok(Document {
            id: self.id,
            title: self.title,
            content,
            status: self.status,
            owner: self.owner,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }

    pub fn summary(&self) -> DocumentSummary {
        DocumentSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            status: self.status,
            updated_at: self.updated_at,
        }
    }
}

/// A document with content decoded to its tree form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub content: ContentTree,
    pub status: DocumentStatus,
    pub owner: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Document {
    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.owner == user_id
    }
}

/// Dashboard row; listing never decodes content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub id: String,
    pub title: String,
    pub status: DocumentStatus,
    pub updated_at: i64,
}

/// Partial update; absent fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentPatch {
    pub title: Option<String>,
    pub content: Option<ContentTree>,
    pub status: Option<DocumentStatus>,
}

impl DocumentPatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn status(status: DocumentStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none() && self.status.is_none()
    }

    /// Content in the text form stores persist
    pub fn serialized_content(&self) -> Option<String> {
        self.content.as_ref().map(ContentTree::to_json_string)
    }
}
