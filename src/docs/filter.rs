use serde::{Deserialize, Serialize};

use super::types::{DocumentStatus, DocumentSummary};

/// Dashboard search: free-text title match plus an optional status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardFilter {
    #[serde(default)]
    pub text: String,
    /// `None` shows every status
    #[serde(default)]
    pub status: Option<DocumentStatus>,
}

impl DashboardFilter {
    pub fn new(text: impl Into<String>, status: Option<DocumentStatus>) -> Self {
        Self {
            text: text.into(),
            status,
        }
    }

    /// Parse the dashboard's status selector, where `all` means no status filter
    pub fn with_status_choice(mut self, choice: &str) -> Result<Self, String> {
        self.status = match choice.trim() {
            "" | "all" => None,
            other => Some(other.parse()?),
        };
        Ok(self)
    }

    pub fn matches(&self, summary: &DocumentSummary) -> bool {
        let needle = self.text.trim().to_lowercase();
        let text_ok = needle.is_empty() || summary.title.to_lowercase().contains(&needle);
        let status_ok = self.status.map_or(true, |status| summary.status == status);
        text_ok && status_ok
    }

    /// Keep matching rows in their original order
    pub fn apply(&self, summaries: &[DocumentSummary]) -> Vec<DocumentSummary> {
        summaries.iter().filter(|s| self.matches(s)).cloned().collect()
    }
}
