//! # Keyboard Shortcuts
//!
//! Maps key chords to actions with exact modifier matching and focus-aware
//! gating. Ctrl and Meta (Cmd) are interchangeable so the same bindings work
//! on every platform.

use std::fmt;
use std::sync::Arc;

/// Callback bound to a shortcut
pub type Action = Arc<dyn Fn() + Send + Sync>;

/// What kind of element had focus when the key went down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FocusTarget {
    /// Page body or a non-editable element
    #[default]
    Document,
    /// Plain text input or textarea
    TextInput,
    /// Rich content-editable element
    ContentEditable,
}

/// A key-down event
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyEvent {
    pub key: String,
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    pub meta: bool,
    pub target: FocusTarget,
}

impl KeyEvent {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Default::default()
        }
    }

    pub fn with_ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    pub fn with_meta(mut self) -> Self {
        self.meta = true;
        self
    }

    pub fn with_shift(mut self) -> Self {
        self.shift = true;
        self
    }

    pub fn with_alt(mut self) -> Self {
        self.alt = true;
        self
    }

    pub fn in_target(mut self, target: FocusTarget) -> Self {
        self.target = target;
        self
    }
}

/// A key chord bound to an action
///
/// Modifiers not set are required to be released.
#[derive(Clone)]
pub struct Shortcut {
    pub key: String,
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    pub action: Action,
    /// Suppress the host's default handling when fired (default true)
    pub prevent_default: bool,
}

impl Shortcut {
    pub fn new(key: impl Into<String>, action: Action) -> Self {
        Self {
            key: key.into(),
            ctrl: false,
            shift: false,
            alt: false,
            action,
            prevent_default: true,
        }
    }

    pub fn ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    pub fn shift(mut self) -> Self {
        self.shift = true;
        self
    }

    pub fn alt(mut self) -> Self {
        self.alt = true;
        self
    }

    /// Let the host's default behaviour run after the action
    pub fn allow_default(mut self) -> Self {
        self.prevent_default = false;
        self
    }

    fn matches(&self, event: &KeyEvent) -> bool {
        if self.key.is_empty() {
            return false;
        }
        let ctrl_held = event.ctrl || event.meta;
        self.key.to_lowercase() == event.key.to_lowercase()
            && self.ctrl == ctrl_held
            && self.shift == event.shift
            && self.alt == event.alt
    }
}

impl fmt::Debug for Shortcut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shortcut")
            .field("key", &self.key)
            .field("ctrl", &self.ctrl)
            .field("shift", &self.shift)
            .field("alt", &self.alt)
            .field("prevent_default", &self.prevent_default)
            .finish()
    }
}

/// Result of dispatching one key event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// An action ran
    Handled { prevent_default: bool },
    /// Nothing matched, or shortcuts are disabled for this event
    Ignored,
}

/// Routes key events to the first matching shortcut
#[derive(Debug, Clone)]
pub struct ShortcutDispatcher {
    shortcuts: Vec<Shortcut>,
    enabled: bool,
}

impl ShortcutDispatcher {
    pub fn new(shortcuts: Vec<Shortcut>) -> Self {
        Self {
            shortcuts,
            enabled: true,
        }
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    pub fn disable(&mut self) {
        self.enabled = false;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn shortcuts(&self) -> &[Shortcut] {
        &self.shortcuts
    }

    pub fn dispatch(&self, event: &KeyEvent) -> Dispatch {
        if !self.enabled || event.target == FocusTarget::ContentEditable {
            return Dispatch::Ignored;
        }

        let in_text_input = event.target == FocusTarget::TextInput;
        let shortcut = self
            .shortcuts
            .iter()
            // Bare keys would interfere with typing
            .filter(|s| !in_text_input || s.ctrl)
            .find(|s| s.matches(event));

        match shortcut {
            Some(shortcut) => {
                tracing::trace!(key = %shortcut.key, "Shortcut fired");
                (shortcut.action)();
                Dispatch::Handled {
                    prevent_default: shortcut.prevent_default,
                }
            }
            None => Dispatch::Ignored,
        }
    }
}

/// Handlers for the conventional editor bindings
#[derive(Default, Clone)]
pub struct EditorActions {
    pub undo: Option<Action>,
    pub redo: Option<Action>,
    pub save: Option<Action>,
}

/// Undo (Ctrl+Z), redo (Ctrl+Shift+Z, Ctrl+Y) and save (Ctrl+S), skipping
/// handlers that were not supplied
pub fn editor_shortcuts(actions: EditorActions) -> Vec<Shortcut> {
    let mut shortcuts = Vec::new();

    if let Some(undo) = actions.undo {
        shortcuts.push(Shortcut::new("z", undo).ctrl());
    }
    if let Some(redo) = actions.redo {
        shortcuts.push(Shortcut::new("z", redo.clone()).ctrl().shift());
        shortcuts.push(Shortcut::new("y", redo).ctrl());
    }
    if let Some(save) = actions.save {
        shortcuts.push(Shortcut::new("s", save).ctrl());
    }

    shortcuts
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Action, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let action: Action = Arc::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        (action, count)
    }

    #[test]
    fn test_case_insensitive_key() {
        let (action, count) = counter();
        let dispatcher = ShortcutDispatcher::new(vec![Shortcut::new("s", action).ctrl()]);

        let result = dispatcher.dispatch(&KeyEvent::new("S").with_ctrl());
        assert_eq!(result, Dispatch::Handled { prevent_default: true });
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_exact_modifier_matching() {
        let (redo, redo_count) = counter();
        let (save, save_count) = counter();
        let dispatcher = ShortcutDispatcher::new(vec![
            Shortcut::new("z", redo).ctrl().shift(),
            Shortcut::new("s", save).ctrl(),
        ]);

        assert_eq!(dispatcher.dispatch(&KeyEvent::new("z").with_ctrl()), Dispatch::Ignored);
        assert_eq!(
            dispatcher.dispatch(&KeyEvent::new("s").with_ctrl().with_shift()),
            Dispatch::Ignored
        );
        assert_eq!(
            dispatcher.dispatch(&KeyEvent::new("s").with_ctrl().with_alt()),
            Dispatch::Ignored
        );
        assert_eq!(redo_count.load(Ordering::SeqCst), 0);
        assert_eq!(save_count.load(Ordering::SeqCst), 0);

        dispatcher.dispatch(&KeyEvent::new("Z").with_ctrl().with_shift());
        assert_eq!(redo_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_bare_shortcut_rejects_modifiers() {
        let (action, count) = counter();
        let dispatcher = ShortcutDispatcher::new(vec![Shortcut::new("Escape", action)]);

        assert_eq!(dispatcher.dispatch(&KeyEvent::new("Escape").with_ctrl()), Dispatch::Ignored);
        assert!(matches!(
            dispatcher.dispatch(&KeyEvent::new("escape")),
            Dispatch::Handled { .. }
        ));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_meta_counts_as_ctrl() {
        let (action, count) = counter();
        let dispatcher = ShortcutDispatcher::new(vec![Shortcut::new("z", action).ctrl()]);

        dispatcher.dispatch(&KeyEvent::new("z").with_meta());
        dispatcher.dispatch(&KeyEvent::new("z").with_ctrl().with_meta());
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_text_input_only_allows_ctrl_shortcuts() {
        let (escape, escape_count) = counter();
        let (save, save_count) = counter();
        let dispatcher = ShortcutDispatcher::new(vec![
            Shortcut::new("Escape", escape),
            Shortcut::new("s", save).ctrl(),
        ]);

        let typing = KeyEvent::new("Escape").in_target(FocusTarget::TextInput);
        assert_eq!(dispatcher.dispatch(&typing), Dispatch::Ignored);

        let save_in_input = KeyEvent::new("s").with_ctrl().in_target(FocusTarget::TextInput);
        assert!(matches!(dispatcher.dispatch(&save_in_input), Dispatch::Handled { .. }));

        assert_eq!(escape_count.load(Ordering::SeqCst), 0);
        assert_eq!(save_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_content_editable_suppresses_everything() {
        let (save, count) = counter();
        let dispatcher = ShortcutDispatcher::new(vec![Shortcut::new("s", save).ctrl()]);

        let event = KeyEvent::new("s")
            .with_ctrl()
            .in_target(FocusTarget::ContentEditable);
        assert_eq!(dispatcher.dispatch(&event), Dispatch::Ignored);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_empty_key_is_skipped() {
        let (action, count) = counter();
        let dispatcher = ShortcutDispatcher::new(vec![Shortcut::new("", action)]);

        assert_eq!(dispatcher.dispatch(&KeyEvent::new("")), Dispatch::Ignored);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_allow_default() {
        let (action, _) = counter();
        let dispatcher =
            ShortcutDispatcher::new(vec![Shortcut::new("k", action).ctrl().allow_default()]);

        assert_eq!(
            dispatcher.dispatch(&KeyEvent::new("k").with_ctrl()),
            Dispatch::Handled { prevent_default: false }
        );
    }

    #[test]
    fn test_disabled_dispatcher_fires_nothing() {
        let (action, count) = counter();
        let mut dispatcher = ShortcutDispatcher::new(vec![Shortcut::new("s", action).ctrl()]);

        dispatcher.disable();
        assert_eq!(dispatcher.dispatch(&KeyEvent::new("s").with_ctrl()), Dispatch::Ignored);

        dispatcher.enable();
        dispatcher.dispatch(&KeyEvent::new("s").with_ctrl());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_editor_shortcuts_builder() {
        let (undo, undo_count) = counter();
        let (redo, redo_count) = counter();

        let shortcuts = editor_shortcuts(EditorActions {
            undo: Some(undo),
            redo: Some(redo),
            save: None,
        });
        assert_eq!(shortcuts.len(), 3);

        let dispatcher = ShortcutDispatcher::new(shortcuts);
        dispatcher.dispatch(&KeyEvent::new("z").with_ctrl());
        dispatcher.dispatch(&KeyEvent::new("Z").with_ctrl().with_shift());
        dispatcher.dispatch(&KeyEvent::new("y").with_meta());
        assert_eq!(dispatcher.dispatch(&KeyEvent::new("s").with_ctrl()), Dispatch::Ignored);

        assert_eq!(undo_count.load(Ordering::SeqCst), 1);
        assert_eq!(redo_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_editor_shortcuts_empty() {
        assert!(editor_shortcuts(EditorActions::default()).is_empty());
    }
}
