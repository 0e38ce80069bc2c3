use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical page addresses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "page", content = "id", rename_all = "snake_case")]
pub enum Route {
    SignIn,
    Dashboard,
    Editor(String),
    Viewer(String),
}

impl Route {
    pub fn path(&self) -> String {
        match self {
            Route::SignIn => "/".to_string(),
            Route::Dashboard => "/dashboard".to_string(),
            Route::Editor(id) => format!("/document/{}", id),
            Route::Viewer(id) => format!("/document/{}/view", id),
        }
    }

    pub fn parse(path: &str) -> Option<Route> {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        match segments.as_slice() {
            [] => Some(Route::SignIn),
            ["dashboard"] => Some(Route::Dashboard),
            ["document", id] => Some(Route::Editor(id.to_string())),
            ["document", id, "view"] => Some(Route::Viewer(id.to_string())),
            _ => None,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}
