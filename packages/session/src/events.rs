//! # Wire Events
//!
//! Inbound frames are `{"event_type": ..., "data": {...}}`; outbound frames
//! are flat JSON objects carrying an `action` discriminator.
//!
//! Payload field names vary a little between the processing and compiler
//! backends, so decoding accepts the known aliases.

use crate::errors::EventError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Event received from the session endpoint
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// The server accepted the start request (`job_created` / `session_created`)
    JobCreated { job_id: String },
    NodeStarted {
        node: String,
        node_index: Option<u32>,
        total_nodes: Option<u32>,
    },
    NodeCompleted { node: String, details: Value },
    ToolCall { tool: String, details: Value },
    LlmToken { token: String },
    /// Generation paused awaiting a user decision
    HitlRequired { prompt: Value },
    Error { message: String },
    Complete { result: Value },
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    event_type: String,
    #[serde(default)]
    data: Value,
}

impl InboundEvent {
    /// Decode one text frame
    pub fn decode(text: &str) -> Result<Self, EventError> {
        let raw: RawFrame = serde_json::from_str(text)?;
        Self::from_parts(&raw.event_type, raw.data)
    }

    pub fn from_parts(event_type: &str, data: Value) -> Result<Self, EventError> {
        let event = match event_type {
            "job_created" | "session_created" => InboundEvent::JobCreated {
                job_id: string_field(&data, &["job_id", "session_id", "id"])
                    .ok_or(EventError::MissingField {
                        event_type: "job_created",
                        field: "job_id",
                    })?,
            },
            "node_started" => InboundEvent::NodeStarted {
                node: string_field(&data, &["node", "node_name", "name"]).ok_or(
                    EventError::MissingField {
                        event_type: "node_started",
                        field: "node",
                    },
                )?,
                node_index: u32_field(&data, &["node_index", "index"]),
                total_nodes: u32_field(&data, &["total_nodes", "total"]),
            },
            "node_completed" => {
                let node = string_field(&data, &["node", "node_name", "name"]).ok_or(
                    EventError::MissingField {
                        event_type: "node_completed",
                        field: "node",
                    },
                )?;
                InboundEvent::NodeCompleted {
                    node,
                    details: details_of(data, &["node", "node_name", "name"]),
                }
            }
            "tool_call" => {
                let tool = string_field(&data, &["tool", "tool_name", "name"]).ok_or(
                    EventError::MissingField {
                        event_type: "tool_call",
                        field: "tool",
                    },
                )?;
                InboundEvent::ToolCall {
                    tool,
                    details: details_of(data, &["tool", "tool_name", "name"]),
                }
            }
            "llm_token" => InboundEvent::LlmToken {
                token: string_field(&data, &["token", "content", "text"]).ok_or(
                    EventError::MissingField {
                        event_type: "llm_token",
                        field: "token",
                    },
                )?,
            },
            "hitl_required" => InboundEvent::HitlRequired { prompt: data },
            "error" => InboundEvent::Error {
                message: string_field(&data, &["message", "error", "detail"])
                    .unwrap_or_else(|| "Unknown error".to_string()),
            },
            "complete" => InboundEvent::Complete { result: data },
            other => return Err(EventError::UnknownType(other.to_string())),
        };
        Ok(event)
    }

    /// Wire name of the event
    pub fn event_type(&self) -> &'static str {
        match self {
            InboundEvent::JobCreated { .. } => "job_created",
            InboundEvent::NodeStarted { .. } => "node_started",
            InboundEvent::NodeCompleted { .. } => "node_completed",
            InboundEvent::ToolCall { .. } => "tool_call",
            InboundEvent::LlmToken { .. } => "llm_token",
            InboundEvent::HitlRequired { .. } => "hitl_required",
            InboundEvent::Error { .. } => "error",
            InboundEvent::Complete { .. } => "complete",
        }
    }
}

fn string_field(data: &Value, keys: &[&str]) -> Option<String> {
    if let Value::String(s) = data {
        return Some(s.clone());
    }
    keys.iter()
        .find_map(|key| data.get(*key))
        .and_then(|value| match value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

fn u32_field(data: &Value, keys: &[&str]) -> Option<u32> {
    keys.iter()
        .find_map(|key| data.get(*key))
        .and_then(Value::as_u64)
        .and_then(|n| u32::try_from(n).ok())
}

/// Explicit `details` if present, otherwise the payload minus its name key
fn details_of(data: Value, name_keys: &[&str]) -> Value {
    match data {
        Value::Object(mut map) => {
            if let Some(details) = map.remove("details") {
                return details;
            }
            for key in name_keys {
                map.remove(*key);
            }
            Value::Object(map)
        }
        _ => Value::Null,
    }
}

/// Action discriminator of outbound frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboundAction {
    Start,
    Decision,
    Message,
}

impl OutboundAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboundAction::Start => "start",
            OutboundAction::Decision => "decision",
            OutboundAction::Message => "message",
        }
    }

    /// Key used when a non-object payload has to be wrapped
    fn payload_key(&self) -> &'static str {
        match self {
            OutboundAction::Start => "payload",
            OutboundAction::Decision => "decision",
            OutboundAction::Message => "message",
        }
    }
}

/// Frame sent to the session endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundFrame {
    pub action: OutboundAction,
    pub payload: Map<String, Value>,
}

impl OutboundFrame {
    pub fn new(action: OutboundAction, payload: Value) -> Self {
        let payload = match payload {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert(action.payload_key().to_string(), other);
                map
            }
        };
        Self { action, payload }
    }

    /// `{action, ...payload}`; the frame's action wins over a payload key
    pub fn to_value(&self) -> Value {
        let mut map = self.payload.clone();
        map.insert(
            "action".to_string(),
            Value::String(self.action.as_str().to_string()),
        );
        Value::Object(map)
    }

    pub fn to_json(&self) -> String {
        self.to_value().to_string()
    }
}
