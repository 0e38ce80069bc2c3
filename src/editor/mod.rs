pub mod commands;
pub mod inline;
pub mod selection;
pub mod toolbar;

pub use commands::{apply, normalize_href, Command, Edit, EditError};
pub use selection::{Selection, TextPos};
pub use toolbar::ToolbarState;

use tokio::sync::mpsc;

use crate::docs::content::ContentTree;

/// Editing surface over one document's content.
///
/// Commands run through the pure functions in [`commands`]; every change is
/// sent to the change sink. The surface never persists anything itself.
pub struct EditorSurface {
    tree: ContentTree,
    selection: Selection,
    read_only: bool,
    changes: Option<mpsc::UnboundedSender<ContentTree>>,
}

impl EditorSurface {
    pub fn new(mut tree: ContentTree) -> Self {
        tree.normalize();
        Self {
            tree,
            selection: Selection::default(),
            read_only: false,
            changes: None,
        }
    }

    /// View pages: content renders, commands and toolbar are disabled
    pub fn read_only(tree: ContentTree) -> Self {
        Self {
            read_only: true,
            ..Self::new(tree)
        }
    }

    pub fn with_change_sink(mut self, sink: mpsc::UnboundedSender<ContentTree>) -> Self {
        self.changes = Some(sink);
        self
    }

    pub fn content(&self) -> &ContentTree {
        &self.tree
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn select(&mut self, selection: Selection) {
        self.selection = selection.clamp(&self.tree);
    }

    /// Run a command; returns whether the content changed
    pub fn apply(&mut self, command: Command) -> Result<bool, EditError> {
        if self.read_only {
            return Err(EditError::ReadOnly);
        }

        let edit = commands::apply(&self.tree, self.selection, &command)?;
        self.selection = edit.selection;
        if edit.tree == self.tree {
            return Ok(false);
        }

        self.tree = edit.tree;
        tracing::trace!(?command, "content changed");
        if let Some(sink) = &self.changes {
            // A closed sink means nobody is saving anymore; editing carries on
            let _ = sink.send(self.tree.clone());
        }
        Ok(true)
    }

    pub fn toolbar(&self) -> Option<ToolbarState> {
        if self.read_only {
            None
        } else {
            Some(ToolbarState::compute(&self.tree, self.selection))
        }
    }

    pub fn serialized(&self) -> String {
        self.tree.to_json_string()
    }
}
