//! # Manual Editor
//!
//! Ties the history, the latest-content cell and accepted AI proposals
//! together for one open manual.
//!
//! Every edit goes through the history and writes the cell in the same
//! call, so readers on the other side of an await always see the newest
//! content.

use crate::autosave::{AutosaveHandle, SaveFn};
use crate::errors::SaveError;
use crate::history::{Command, CommandType, HistoryOptions, UndoHistory};
use crate::shortcuts::{Action, EditorActions};
use crate::suggestions::{AppliedChanges, ApplyResult, ProposedChange};
use futures::FutureExt;
use manualdesk_common::{Clock, ContentCell, SnapshotStore};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

/// Editor shared between shortcut actions and async save callbacks
pub type SharedEditor = Arc<Mutex<ManualEditor>>;

pub struct ManualEditor {
    history: UndoHistory,
    content: ContentCell,
    applied: AppliedChanges,
}

impl ManualEditor {
    pub fn open(
        manual_id: impl Into<String>,
        original_content: impl Into<String>,
        store: Arc<dyn SnapshotStore>,
        clock: Arc<dyn Clock>,
        options: HistoryOptions,
    ) -> Self {
        let history = UndoHistory::open(manual_id, original_content, store, clock, options);
        let content = ContentCell::new(history.current_content());

        Self {
            history,
            content,
            applied: AppliedChanges::new(),
        }
    }

    pub fn into_shared(self) -> SharedEditor {
        Arc::new(Mutex::new(self))
    }

    /// Handle to the live content, for autosave and async readers
    pub fn content_cell(&self) -> ContentCell {
        self.content.clone()
    }

    pub fn content(&self) -> &str {
        self.history.current_content()
    }

    pub fn history(&self) -> &UndoHistory {
        &self.history
    }

    /// Replace the document content; `false` when nothing changed
    pub fn edit(&mut self, new_content: impl Into<String>, description: impl Into<String>) -> bool {
        self.edit_as(CommandType::TextReplace, new_content, description)
    }

    pub fn edit_as(
        &mut self,
        command_type: CommandType,
        new_content: impl Into<String>,
        description: impl Into<String>,
    ) -> bool {
        let changed = self
            .history
            .record_change_as(command_type, new_content, description)
            .is_some();
        if changed {
            self.sync_cell();
        }
        changed
    }

    pub fn undo(&mut self) -> Option<Command> {
        let command = self.history.undo()?;
        self.sync_cell();
        Some(command)
    }

    pub fn redo(&mut self) -> Option<Command> {
        let command = self.history.redo()?;
        self.sync_cell();
        Some(command)
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn mark_as_saved(&mut self) {
        self.history.mark_as_saved();
    }

    /// Apply an accepted AI proposal on top of the latest content
    pub fn apply_suggestion(&mut self, change: &ProposedChange) -> ApplyResult {
        if self.applied.contains(&change.id) {
            tracing::debug!(change_id = %change.id, "Proposal already applied");
            return ApplyResult::Duplicate;
        }

        let Some(updated) = self.content.with(|current| change.op.apply(current)) else {
            tracing::info!(change_id = %change.id, "Proposal no longer matches the document");
            return ApplyResult::NotFound;
        };

        let description = if change.description.is_empty() {
            "Apply AI suggestion".to_string()
        } else {
            change.description.clone()
        };

        self.applied.insert(&change.id);
        if self.edit_as(change.op.command_type(), updated, description) {
            ApplyResult::Applied
        } else {
            ApplyResult::Unchanged
        }
    }

    pub fn is_applied(&self, change_id: &str) -> bool {
        self.applied.contains(change_id)
    }

    fn sync_cell(&self) {
        self.content.set(self.history.current_content());
    }
}

fn lock(editor: &Mutex<ManualEditor>) -> MutexGuard<'_, ManualEditor> {
    editor.lock().unwrap_or_else(|e| e.into_inner())
}

/// Wrap a save collaborator so successful saves also move the history's
/// save marker to the content that was written
pub fn tracking_save(editor: &SharedEditor, on_save: SaveFn) -> SaveFn {
    let editor: Weak<Mutex<ManualEditor>> = Arc::downgrade(editor);
    Arc::new(move |content: String| {
        let editor = editor.clone();
        let on_save = on_save.clone();
        async move {
            on_save(content.clone()).await?;
            if let Some(editor) = editor.upgrade() {
                lock(&editor).history.mark_saved_as(content);
            }
            Ok::<(), SaveError>(())
        }
        .boxed()
    })
}

/// Undo/redo/save handlers for [`editor_shortcuts`](crate::editor_shortcuts)
///
/// The save action spawns onto the current tokio runtime; it does nothing
/// when called outside one.
pub fn editor_actions(editor: &SharedEditor, autosave: Option<AutosaveHandle>) -> EditorActions {
    let undo: Action = {
        let editor = editor.clone();
        Arc::new(move || {
            lock(&editor).undo();
        })
    };
    let redo: Action = {
        let editor = editor.clone();
        Arc::new(move || {
            lock(&editor).redo();
        })
    };
    let save = autosave.map(|handle| -> Action {
        Arc::new(move || {
            let handle = handle.clone();
            match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    runtime.spawn(async move {
                        if let Err(e) = handle.save_now(false).await {
                            tracing::warn!("Manual save failed: {}", e);
                        }
                    });
                }
                Err(_) => tracing::warn!("Save shortcut fired outside a runtime"),
            }
        })
    });

    EditorActions {
        undo: Some(undo),
        redo: Some(redo),
        save,
    }
}
