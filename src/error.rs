use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::docs::content::ContentError;
use crate::routes::Route;
use crate::store::StoreError;

/// Failures a user can see. None of them ends the session.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Document not found: {0}")]
    NotFound(String),
    #[error("Access denied: document {0} is not published")]
    AccessDenied(String),
    #[error("Could not save changes: {0}")]
    WriteFailed(String),
    #[error("Could not load documents: {0}")]
    ReadFailed(String),
    #[error("Document {id} could not be opened: {source}")]
    ParseFailed {
        id: String,
        #[source]
        source: ContentError,
    },
    #[error("Sign in required")]
    Unauthenticated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    AccessDenied,
    WriteFailed,
    ReadFailed,
    ParseFailed,
    Unauthenticated,
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::AccessDenied(_) => ErrorKind::AccessDenied,
            AppError::WriteFailed(_) => ErrorKind::WriteFailed,
            AppError::ReadFailed(_) => ErrorKind::ReadFailed,
            AppError::ParseFailed { .. } => ErrorKind::ParseFailed,
            AppError::Unauthenticated => ErrorKind::Unauthenticated,
        }
    }

    /// Where the UI goes after this error; `None` keeps the current page and its state
    pub fn redirect(&self) -> Option<Route> {
        match self {
            AppError::NotFound(_) | AppError::ParseFailed { .. } => Some(Route::Dashboard),
            AppError::AccessDenied(_) | AppError::Unauthenticated => Some(Route::SignIn),
            AppError::WriteFailed(_) | AppError::ReadFailed(_) => None,
        }
    }

    /// Map a read failure; a missing record and any other backend error both read as not found
    pub fn from_fetch(id: &str, err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => AppError::NotFound(id.to_string()),
            other => {
                tracing::warn!(doc_id = id, error = %other, "fetch failed");
                AppError::NotFound(id.to_string())
            }
        }
    }

    pub fn from_write(err: StoreError) -> Self {
        AppError::WriteFailed(err.to_string())
    }
}

/// Serializable error handed to the presentation layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandError {
    pub kind: ErrorKind,
    pub message: String,
    pub redirect: Option<Route>,
}

impl From<AppError> for CommandError {
    fn from(e: AppError) -> Self {
        CommandError {
            kind: e.kind(),
            message: e.to_string(),
            redirect: e.redirect(),
        }
    }
}
