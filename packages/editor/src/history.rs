//! # Undo/Redo History
//!
//! Linear command history for a manual's markdown content.
//!
//! ## Design
//!
//! - Each command stores full before/after snapshots of the document
//! - Undo restores `before` and moves the command to the redo stack
//! - Redo restores `after` and moves it back
//! - New commands clear the redo stack (no branching)
//! - The undo stack is bounded; the oldest entries are evicted first
//! - Every mutation re-persists a snapshot keyed by manual id so an
//!   interrupted session can be recovered within the freshness window
//!
//! ## Example
//!
//! ```rust,ignore
//! let mut history = UndoHistory::open("42", "# Initial", store, clock, HistoryOptions::default());
//!
//! history.record_change("# Changed", "Edit heading");
//! history.undo();   // content is "# Initial" again
//! history.redo();   // content is "# Changed"
//! ```

use chrono::{DateTime, Duration, Utc};
use manualdesk_common::{Clock, CommonResult, SnapshotStore};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;

/// Default maximum number of undo levels
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Default freshness window for persisted snapshots
pub const DEFAULT_MAX_AGE_HOURS: i64 = 24;

/// Prefix of the per-manual snapshot key
pub const SNAPSHOT_KEY_PREFIX: &str = "manual_editor_undo_";

/// Storage key of a manual's persisted history
pub fn snapshot_key(manual_id: &str) -> String {
    format!("{SNAPSHOT_KEY_PREFIX}{manual_id}")
}

/// Kind of edit a command represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandType {
    TextReplace,
    TextInsert,
    TextDelete,
    CaptionUpdate,
    ImagePlaceholder,
}

/// One undoable change
///
/// Immutable once created; fields are read through accessors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    id: String,
    timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    command_type: CommandType,
    before: String,
    after: String,
    description: String,
}

impl Command {
    fn new(
        command_type: CommandType,
        before: String,
        after: String,
        description: String,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp,
            command_type,
            before,
            after,
            description,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn command_type(&self) -> CommandType {
        self.command_type
    }

    /// Document content before the edit
    pub fn before(&self) -> &str {
        &self.before
    }

    /// Document content after the edit
    pub fn after(&self) -> &str {
        &self.after
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

/// History limits
#[derive(Debug, Clone)]
pub struct HistoryOptions {
    /// Maximum number of undo levels (0 = unlimited)
    pub limit: usize,

    /// Persisted snapshots older than this are discarded on open
    pub max_age: Duration,
}

impl Default for HistoryOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_HISTORY_LIMIT,
            max_age: Duration::hours(DEFAULT_MAX_AGE_HOURS),
        }
    }
}

/// Persisted form of a history, stored as JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistorySnapshot {
    pub manual_id: String,
    pub undo_stack: Vec<Command>,
    pub redo_stack: Vec<Command>,
    pub last_saved_content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_content: Option<String>,
    #[serde(default)]
    pub unsaved_changes: usize,
    pub saved_at: DateTime<Utc>,
}

impl HistorySnapshot {
    /// Whether the snapshot is still within `max_age` at `now`
    ///
    /// A snapshot stamped after `now` is never fresh.
    pub fn is_fresh(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        self.saved_at <= now && now - self.saved_at <= max_age
    }
}

/// Borrowed view used when writing, so persisting never clones the stacks
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotRef<'a> {
    manual_id: &'a str,
    undo_stack: &'a VecDeque<Command>,
    redo_stack: &'a [Command],
    last_saved_content: &'a str,
    current_content: &'a str,
    unsaved_changes: usize,
    saved_at: DateTime<Utc>,
}

/// Read a manual's persisted snapshot without opening a history
pub fn load_snapshot(
    store: &dyn SnapshotStore,
    manual_id: &str,
) -> CommonResult<Option<HistorySnapshot>> {
    match store.load(&snapshot_key(manual_id))? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// Undo/redo history for one manual
pub struct UndoHistory {
    manual_id: String,

    current_content: String,

    /// Applied commands (most recent last)
    undo_stack: VecDeque<Command>,

    /// Undone commands (most recent last)
    redo_stack: Vec<Command>,

    last_saved_content: String,

    /// Changes applied since the last save marker
    changes_since_save: usize,

    options: HistoryOptions,
    store: Arc<dyn SnapshotStore>,
    clock: Arc<dyn Clock>,
}

impl UndoHistory {
    /// Open the history for a manual, recovering a fresh persisted session
    /// if one exists
    pub fn open(
        manual_id: impl Into<String>,
        original_content: impl Into<String>,
        store: Arc<dyn SnapshotStore>,
        clock: Arc<dyn Clock>,
        options: HistoryOptions,
    ) -> Self {
        let original_content = original_content.into();
        let mut history = Self {
            manual_id: manual_id.into(),
            current_content: original_content.clone(),
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            last_saved_content: original_content,
            changes_since_save: 0,
            options,
            store,
            clock,
        };

        if let Some(snapshot) = history.take_fresh_snapshot() {
            history.restore(snapshot);
        }

        history
    }

    fn take_fresh_snapshot(&self) -> Option<HistorySnapshot> {
        let snapshot = match load_snapshot(self.store.as_ref(), &self.manual_id) {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(manual_id = %self.manual_id, "Discarding unreadable undo snapshot: {}", e);
                self.remove_persisted();
                return None;
            }
        };

        if snapshot.manual_id != self.manual_id {
            tracing::warn!(
                manual_id = %self.manual_id,
                stored = %snapshot.manual_id,
                "Undo snapshot belongs to another manual, ignoring"
            );
            return None;
        }

        if !snapshot.is_fresh(self.clock.now(), self.options.max_age) {
            tracing::debug!(manual_id = %self.manual_id, saved_at = %snapshot.saved_at, "Undo snapshot expired");
            self.remove_persisted();
            return None;
        }

        Some(snapshot)
    }

    fn restore(&mut self, snapshot: HistorySnapshot) {
        let mut undo_stack: VecDeque<Command> = snapshot.undo_stack.into();
        while self.options.limit > 0 && undo_stack.len() > self.options.limit {
            undo_stack.pop_front();
        }

        let current = snapshot
            .current_content
            .or_else(|| undo_stack.back().map(|c| c.after.clone()))
            .unwrap_or_else(|| self.current_content.clone());

        self.changes_since_save = if current == snapshot.last_saved_content {
            0
        } else {
            snapshot.unsaved_changes.max(1)
        };
        self.current_content = current;
        self.undo_stack = undo_stack;
        self.redo_stack = snapshot.redo_stack;
        self.last_saved_content = snapshot.last_saved_content;

        tracing::info!(
            manual_id = %self.manual_id,
            undo = self.undo_stack.len(),
            redo = self.redo_stack.len(),
            "Restored editing session"
        );
    }

    /// Push a command and make its `after` the current content
    pub fn push_command(
        &mut self,
        command_type: CommandType,
        before: impl Into<String>,
        after: impl Into<String>,
        description: impl Into<String>,
    ) -> &Command {
        let before = before.into();
        if before != self.current_content {
            tracing::debug!(manual_id = %self.manual_id, "Command base differs from current content");
        }

        let command = Command::new(
            command_type,
            before,
            after.into(),
            description.into(),
            self.clock.now(),
        );
        self.current_content = command.after.clone();
        self.undo_stack.push_back(command);

        // Trim if exceeded max levels
        while self.options.limit > 0 && self.undo_stack.len() > self.options.limit {
            self.undo_stack.pop_front();
        }

        // New action invalidates the future
        self.redo_stack.clear();

        self.note_change();
        self.persist();

        // Just pushed, the stack is never empty here
        &self.undo_stack[self.undo_stack.len() - 1]
    }

    /// Record a full-content replacement; a no-op when nothing changed
    pub fn record_change(
        &mut self,
        new_content: impl Into<String>,
        description: impl Into<String>,
    ) -> Option<&Command> {
        self.record_change_as(CommandType::TextReplace, new_content, description)
    }

    /// Like [`record_change`](Self::record_change) with an explicit command type
    pub fn record_change_as(
        &mut self,
        command_type: CommandType,
        new_content: impl Into<String>,
        description: impl Into<String>,
    ) -> Option<&Command> {
        let new_content = new_content.into();
        if new_content == self.current_content {
            return None;
        }

        let before = self.current_content.clone();
        Some(self.push_command(command_type, before, new_content, description))
    }

    /// Undo the most recent command
    pub fn undo(&mut self) -> Option<Command> {
        let command = self.undo_stack.pop_back()?;
        self.current_content = command.before.clone();
        self.redo_stack.push(command.clone());

        self.note_change();
        self.persist();
        Some(command)
    }

    /// Redo the most recently undone command
    pub fn redo(&mut self) -> Option<Command> {
        let command = self.redo_stack.pop()?;
        self.current_content = command.after.clone();
        self.undo_stack.push_back(command.clone());

        self.note_change();
        self.persist();
        Some(command)
    }

    /// Drop all history and the persisted snapshot
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.remove_persisted();
    }

    /// Treat the current content as persisted
    pub fn mark_as_saved(&mut self) {
        self.last_saved_content = self.current_content.clone();
        self.changes_since_save = 0;
        self.persist();
    }

    /// Move the save marker to `content`, which may lag behind the current
    /// content when edits landed while the save was in flight
    pub fn mark_saved_as(&mut self, content: impl Into<String>) {
        self.last_saved_content = content.into();
        if !self.has_unsaved_changes() {
            self.changes_since_save = 0;
        }
        self.persist();
    }

    pub fn manual_id(&self) -> &str {
        &self.manual_id
    }

    pub fn current_content(&self) -> &str {
        &self.current_content
    }

    pub fn last_saved_content(&self) -> &str {
        &self.last_saved_content
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.current_content != self.last_saved_content
    }

    /// Number of changes applied since the last save
    pub fn unsaved_changes_count(&self) -> usize {
        self.changes_since_save
    }

    pub fn undo_levels(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_levels(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn undo_stack(&self) -> impl Iterator<Item = &Command> {
        self.undo_stack.iter()
    }

    pub fn redo_stack(&self) -> &[Command] {
        &self.redo_stack
    }

    /// Description of the next undo operation
    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack.back().map(|c| c.description.as_str())
    }

    /// Description of the next redo operation
    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack.last().map(|c| c.description.as_str())
    }

    fn note_change(&mut self) {
        if self.has_unsaved_changes() {
            self.changes_since_save += 1;
        } else {
            self.changes_since_save = 0;
        }
    }

    fn persist(&self) {
        let snapshot = SnapshotRef {
            manual_id: &self.manual_id,
            undo_stack: &self.undo_stack,
            redo_stack: &self.redo_stack,
            last_saved_content: &self.last_saved_content,
            current_content: &self.current_content,
            unsaved_changes: self.changes_since_save,
            saved_at: self.clock.now(),
        };

        let result = serde_json::to_string(&snapshot)
            .map_err(Into::into)
            .and_then(|json| self.store.store(&snapshot_key(&self.manual_id), &json));

        if let Err(e) = result {
            tracing::warn!(manual_id = %self.manual_id, "Failed to persist undo history: {}", e);
        }
    }

    fn remove_persisted(&self) {
        if let Err(e) = self.store.remove(&snapshot_key(&self.manual_id)) {
            tracing::warn!(manual_id = %self.manual_id, "Failed to remove undo snapshot: {}", e);
        }
    }
}

impl std::fmt::Debug for UndoHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UndoHistory")
            .field("manual_id", &self.manual_id)
            .field("undo_levels", &self.undo_stack.len())
            .field("redo_levels", &self.redo_stack.len())
            .field("has_unsaved_changes", &self.has_unsaved_changes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use manualdesk_common::{ManualClock, MemorySnapshotStore};

    fn open_with(
        content: &str,
        store: &Arc<MemorySnapshotStore>,
        clock: &ManualClock,
    ) -> UndoHistory {
        UndoHistory::open(
            "manual-1",
            content,
            store.clone(),
            Arc::new(clock.clone()),
            HistoryOptions::default(),
        )
    }

    fn fresh(content: &str) -> UndoHistory {
        open_with(content, &Arc::new(MemorySnapshotStore::new()), &ManualClock::default())
    }

    #[test]
    fn test_history_creation() {
        let history = fresh("# Initial");
        assert_eq!(history.current_content(), "# Initial");
        assert_eq!(history.undo_levels(), 0);
        assert!(!history.can_undo());
        assert!(!history.can_redo());
        assert!(!history.has_unsaved_changes());
    }

    #[test]
    fn test_push_undo_redo_inverse() {
        let mut history = fresh("# Initial");

        history.record_change("# Changed", "edit");
        assert_eq!(history.current_content(), "# Changed");

        let undone = history.undo().unwrap();
        assert_eq!(undone.description(), "edit");
        assert_eq!(history.current_content(), "# Initial");
        assert!(history.can_redo());

        history.redo().unwrap();
        assert_eq!(history.current_content(), "# Changed");
        assert!(!history.can_redo());
    }

    #[test]
    fn test_record_change_skips_unchanged_content() {
        let mut history = fresh("same");
        assert!(history.record_change("same", "noop").is_none());
        assert_eq!(history.undo_levels(), 0);
    }

    #[test]
    fn test_empty_stacks_return_none() {
        let mut history = fresh("x");
        assert!(history.undo().is_none());
        assert!(history.redo().is_none());
        assert_eq!(history.current_content(), "x");
    }

    #[test]
    fn test_max_levels_enforced() {
        let mut history = fresh("0");
        for i in 1..=105 {
            history.record_change(i.to_string(), format!("edit {i}"));
        }

        assert_eq!(history.undo_levels(), 100);
        // Oldest five were evicted, so the first remaining command starts at 5
        assert_eq!(history.undo_stack().next().unwrap().before(), "5");
        assert_eq!(history.current_content(), "105");
    }

    #[test]
    fn test_new_command_clears_redo() {
        let mut history = fresh("a");
        history.record_change("b", "b");
        history.undo();
        assert_eq!(history.redo_levels(), 1);

        history.record_change("c", "c");
        assert_eq!(history.redo_levels(), 0);
        assert_eq!(history.current_content(), "c");
    }

    #[test]
    fn test_command_chain_keeps_before_consistent() {
        let mut history = fresh("a");
        history.record_change("b", "1");
        history.record_change("c", "2");

        let commands: Vec<_> = history.undo_stack().cloned().collect();
        assert_eq!(commands[0].before(), "a");
        assert_eq!(commands[1].before(), commands[0].after());
        assert_ne!(commands[0].id(), commands[1].id());
    }

    #[test]
    fn test_mark_as_saved_and_counts() {
        let mut history = fresh("a");
        history.record_change("b", "1");
        history.record_change("c", "2");
        assert!(history.has_unsaved_changes());
        assert_eq!(history.unsaved_changes_count(), 2);

        history.mark_as_saved();
        assert!(!history.has_unsaved_changes());
        assert_eq!(history.unsaved_changes_count(), 0);
        assert_eq!(history.undo_levels(), 2);

        history.undo();
        assert!(history.has_unsaved_changes());
        assert_eq!(history.unsaved_changes_count(), 1);

        // Back at the saved content
        history.redo();
        assert_eq!(history.unsaved_changes_count(), 0);
    }

    #[test]
    fn test_descriptions() {
        let mut history = fresh("a");
        history.record_change_as(CommandType::CaptionUpdate, "b", "Update caption");
        assert_eq!(history.undo_description(), Some("Update caption"));
        assert_eq!(history.redo_description(), None);

        let command = history.undo().unwrap();
        assert_eq!(command.command_type(), CommandType::CaptionUpdate);
        assert_eq!(history.redo_description(), Some("Update caption"));
    }

    #[test]
    fn test_restores_fresh_snapshot() {
        let store = Arc::new(MemorySnapshotStore::new());
        let clock = ManualClock::default();

        {
            let mut history = open_with("# Initial", &store, &clock);
            history.record_change("# One", "1");
            history.record_change("# Two", "2");
            history.undo();
        }

        clock.advance(Duration::hours(23));
        let history = open_with("# Initial", &store, &clock);
        assert_eq!(history.current_content(), "# One");
        assert_eq!(history.undo_levels(), 1);
        assert_eq!(history.redo_levels(), 1);
        assert!(history.has_unsaved_changes());
    }

    #[test]
    fn test_discards_expired_snapshot() {
        let store = Arc::new(MemorySnapshotStore::new());
        let clock = ManualClock::default();

        {
            let mut history = open_with("# Initial", &store, &clock);
            history.record_change("# Stale", "1");
        }

        clock.advance(Duration::hours(25));
        let history = open_with("# Fresh", &store, &clock);
        assert_eq!(history.current_content(), "# Fresh");
        assert!(!history.can_undo());
        assert!(!store.contains(&snapshot_key("manual-1")));
    }

    #[test]
    fn test_discards_snapshot_from_the_future() {
        let store = Arc::new(MemorySnapshotStore::new());
        let clock = ManualClock::default();

        {
            let mut history = open_with("# Initial", &store, &clock);
            history.record_change("# Ahead", "1");
        }

        clock.advance(Duration::hours(-1));
        let history = open_with("# Initial", &store, &clock);
        assert_eq!(history.current_content(), "# Initial");
        assert!(!history.can_undo());
        assert!(!store.contains(&snapshot_key("manual-1")));
    }

    #[test]
    fn test_discards_corrupt_snapshot() {
        let store = Arc::new(MemorySnapshotStore::new());
        store.store(&snapshot_key("manual-1"), "{not json").unwrap();

        let history = open_with("# Initial", &store, &ManualClock::default());
        assert_eq!(history.current_content(), "# Initial");
        assert!(!history.can_undo());
    }

    #[test]
    fn test_clear_removes_snapshot() {
        let store = Arc::new(MemorySnapshotStore::new());
        let mut history = open_with("a", &store, &ManualClock::default());
        history.record_change("b", "1");
        assert!(store.contains(&snapshot_key("manual-1")));

        history.clear();
        assert!(!history.can_undo());
        assert!(!history.can_redo());
        assert_eq!(history.current_content(), "b");
        assert!(!store.contains(&snapshot_key("manual-1")));
    }

    #[test]
    fn test_persistence_failure_keeps_memory_state() {
        let store = Arc::new(MemorySnapshotStore::new());
        store.set_fail_writes(true);

        let mut history = open_with("a", &store, &ManualClock::default());
        history.record_change("b", "1");
        history.undo();
        history.redo();
        history.clear();

        assert_eq!(history.current_content(), "b");
        assert!(store.is_empty());
    }

    #[test]
    fn test_snapshot_wire_format() {
        let store = Arc::new(MemorySnapshotStore::new());
        let mut history = open_with("a", &store, &ManualClock::default());
        history.record_change("b", "edit");

        let raw = store.load(&snapshot_key("manual-1")).unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["manualId"], "manual-1");
        assert_eq!(value["lastSavedContent"], "a");
        assert_eq!(value["undoStack"][0]["type"], "text_replace");
        assert_eq!(value["undoStack"][0]["after"], "b");
        assert!(value["savedAt"].is_string());
    }
}
