//! # Manualdesk Session
//!
//! Streaming sessions against the backend's duplex endpoints: video
//! processing and the AI compiler copilot.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ start(payload) → Connector → Connection     │
//! └─────────────────────────────────────────────┘
//!                     ↓  {event_type, data}
//! ┌─────────────────────────────────────────────┐
//! │ pump                                        │
//! │  - InboundEvent::decode                     │
//! │  - token batching (FRAME_INTERVAL)          │
//! │  - SessionPolicy::reduce                    │
//! └─────────────────────────────────────────────┘
//!                     ↓  watch
//! ┌─────────────────────────────────────────────┐
//! │ SessionState { status, nodes, text, ... }   │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use manualdesk_session::*;
//!
//! let endpoint = SessionEndpoint::new("ws://localhost:8000/api").with_user_id(user_id);
//! let session = CompilerSession::compiler(Arc::new(WebSocketConnector), endpoint);
//!
//! let session_id = session.start(json!({ "manual_id": 42 })).await?;
//! let mut updates = session.subscribe();
//! while updates.changed().await.is_ok() {
//!     let state = updates.borrow().clone();
//!     if state.status == SessionStatus::HitlPending {
//!         session.submit_decision(json!({ "approved": true }));
//!     }
//! }
//! ```

mod endpoint;
mod errors;
mod events;
mod jobs;
mod policy;
mod session;
mod state;
mod transport;

pub use endpoint::{SessionEndpoint, USER_ID_COOKIE};
pub use errors::{EventError, SessionError, TransportError};
pub use events::{InboundEvent, OutboundAction, OutboundFrame};
pub use jobs::{InMemoryJobStore, JobRecord, JobStatus, JobStore, JobUpdate};
pub use policy::{reduce_event, CompilerPolicy, ProcessingPolicy, SessionPolicy};
pub use session::{
    CompilerSession, ProcessingSession, StreamingSession, CONNECTION_ERROR_MESSAGE,
    FRAME_INTERVAL,
};
pub use state::{SessionState, SessionStatus};
pub use transport::{
    Connection, Connector, MockConnector, MockPeer, TransportEvent, WebSocketConnector,
};
