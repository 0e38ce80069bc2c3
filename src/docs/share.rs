use super::types::DocumentStatus;
use crate::error::AppError;
use crate::routes::Route;

/// Public read-only link for a document
pub fn share_url(origin: &str, id: &str) -> String {
    format!("{}{}", origin.trim_end_matches('/'), Route::Viewer(id.to_string()).path())
}

/// The read-only view only renders published documents.
///
/// Owners get no exception here: a draft is unreachable through its share
/// link for every requester, owners included.
pub fn check_visibility(id: &str, status: DocumentStatus) -> Result<(), AppError> {
    if status.is_published() {
        Ok(())
    } else {
        Err(AppError::AccessDenied(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_share_url() {
        assert_eq!(share_url("https://inkpad.app", "abc"), "https://inkpad.app/document/abc/view");
        assert_eq!(share_url("https://inkpad.app/", "abc"), "https://inkpad.app/document/abc/view");
    }

    #[test]
    fn test_visibility_gate() {
        assert!(check_visibility("abc", DocumentStatus::Published).is_ok());
        assert!(matches!(
            check_visibility("abc", DocumentStatus::Draft),
            Err(AppError::AccessDenied(id)) if id == "abc"
        ));
    }
}
