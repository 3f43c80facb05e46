//! AI-proposed edits and their de-duplication.
//!
//! A proposal can be delivered more than once (re-sent by the compiler,
//! accepted twice from a fast double click). Each carries a stable id and
//! an id is applied at most once.

use crate::history::CommandType;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One edit proposed by the compiler copilot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedChange {
    pub id: String,
    #[serde(flatten)]
    pub op: ChangeOp,
    #[serde(default)]
    pub description: String,
}

/// How a proposal rewrites the document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ChangeOp {
    /// Replace the first occurrence of `find`
    Replace { find: String, replace: String },
    /// Append text at the end of the document
    Append { text: String },
    /// Replace the whole document
    Overwrite { content: String },
}

impl ChangeOp {
    /// Apply to `content`, `None` if the change no longer fits
    pub fn apply(&self, content: &str) -> Option<String> {
        match self {
            ChangeOp::Replace { find, replace } => {
                if find.is_empty() {
                    return None;
                }
                content.find(find.as_str()).map(|start| {
                    let mut out = String::with_capacity(content.len() + replace.len());
                    out.push_str(&content[..start]);
                    out.push_str(replace);
                    out.push_str(&content[start + find.len()..]);
                    out
                })
            }
            ChangeOp::Append { text } => {
                let mut out = content.to_string();
                if !out.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
                out.push_str(text);
                Some(out)
            }
            ChangeOp::Overwrite { content } => Some(content.clone()),
        }
    }

    pub fn command_type(&self) -> CommandType {
        match self {
            ChangeOp::Append { .. } => CommandType::TextInsert,
            ChangeOp::Replace { .. } | ChangeOp::Overwrite { .. } => CommandType::TextReplace,
        }
    }
}

/// Outcome of applying a proposal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyResult {
    /// Pushed as a new history command
    Applied,
    /// The id was applied before
    Duplicate,
    /// The target text is gone from the current document
    NotFound,
    /// The change would not alter the document
    Unchanged,
}

/// Ids of proposals already applied
#[derive(Debug, Clone, Default)]
pub struct AppliedChanges {
    ids: HashSet<String>,
}

impl AppliedChanges {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an id; `false` if it was already present
    pub fn insert(&mut self, id: &str) -> bool {
        self.ids.insert(id.to_string())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
