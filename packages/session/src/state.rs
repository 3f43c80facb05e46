use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Lifecycle of a streaming session
///
/// ```text
/// idle → processing → complete
///            ↓  ↑   ↘ error
///        hitl_pending
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Idle,
    Processing,
    HitlPending,
    Complete,
    Error,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Complete | SessionStatus::Error)
    }
}

/// State reduced from a session's inbound events
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionState {
    pub status: SessionStatus,
    pub job_id: Option<String>,
    pub current_node: Option<String>,
    pub node_index: Option<u32>,
    pub total_nodes: Option<u32>,
    pub node_details: BTreeMap<String, Value>,
    /// Accumulated LLM token stream
    pub streamed_text: String,
    pub error: Option<String>,
    pub result: Option<Value>,
    pub pending_hitl: Option<Value>,
    /// Bumped once per published update
    pub version: u64,
}

impl SessionState {
    /// Fraction of nodes started, when the server reports totals
    pub fn progress(&self) -> Option<f32> {
        match (self.node_index, self.total_nodes) {
            (Some(index), Some(total)) if total > 0 => {
                Some((index as f32 / total as f32).clamp(0.0, 1.0))
            }
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Back to idle; the version counter is kept
    pub(crate) fn reset(&mut self) {
        *self = Self {
            version: self.version,
            ..Self::default()
        };
    }
}
