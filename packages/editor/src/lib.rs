//! # Manualdesk Editor
//!
//! Client-side editing core for a manual: history, autosave and keyboard
//! shortcuts.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ key events → ShortcutDispatcher             │
//! └─────────────────────────────────────────────┘
//!                     ↓  undo / redo / save
//! ┌─────────────────────────────────────────────┐
//! │ ManualEditor                                │
//! │  - UndoHistory (bounded, persisted)         │
//! │  - ContentCell (latest content)             │
//! │  - AppliedChanges (AI proposal dedup)       │
//! └─────────────────────────────────────────────┘
//!                     ↓  live content
//! ┌─────────────────────────────────────────────┐
//! │ Autosave: interval + save_now → on_save     │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use manualdesk_editor::*;
//!
//! let editor = ManualEditor::open("42", "# Initial", store, clock.clone(), HistoryOptions::default())
//!     .into_shared();
//! let content = editor.lock().unwrap().content_cell();
//!
//! let autosave = Autosave::start(
//!     content,
//!     "# Initial",
//!     AutosaveOptions::default(),
//!     tracking_save(&editor, put_manual),
//!     clock,
//! );
//!
//! let shortcuts = ShortcutDispatcher::new(editor_shortcuts(editor_actions(
//!     &editor,
//!     Some(autosave.handle()),
//! )));
//! shortcuts.dispatch(&KeyEvent::new("z").with_ctrl());
//! ```

mod autosave;
mod editor;
mod errors;
mod history;
mod shortcuts;
mod suggestions;

pub use autosave::{
    format_elapsed, save_fn, Autosave, AutosaveHandle, AutosaveOptions, AutosaveState, SaveFn,
    SaveFuture, SaveOutcome, DEFAULT_AUTOSAVE_INTERVAL,
};
pub use editor::{editor_actions, tracking_save, ManualEditor, SharedEditor};
pub use errors::SaveError;
pub use history::{
    load_snapshot, snapshot_key, Command, CommandType, HistoryOptions, HistorySnapshot,
    UndoHistory, DEFAULT_HISTORY_LIMIT, DEFAULT_MAX_AGE_HOURS, SNAPSHOT_KEY_PREFIX,
};
pub use shortcuts::{
    editor_shortcuts, Action, Dispatch, EditorActions, FocusTarget, KeyEvent, Shortcut,
    ShortcutDispatcher,
};
pub use suggestions::{AppliedChanges, ApplyResult, ChangeOp, ProposedChange};

// Re-export common types for convenience
pub use manualdesk_common::{Clock, ContentCell, SnapshotStore};
