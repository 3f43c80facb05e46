//! # Streaming Session
//!
//! One duplex connection per run. `start` connects, sends the start frame
//! and waits for the server to acknowledge creation; a spawned pump then
//! folds inbound events into a `watch`ed [`SessionState`].
//!
//! Every run gets a generation number. Resetting or dropping the session
//! bumps it, and any pump from an older generation stops mutating state.

use crate::endpoint::SessionEndpoint;
use crate::errors::{EventError, SessionError, TransportError};
use crate::events::{InboundEvent, OutboundAction, OutboundFrame};
use crate::jobs::{JobRecord, JobStore, JobUpdate};
use crate::policy::{CompilerPolicy, ProcessingPolicy, SessionPolicy};
use crate::state::{SessionState, SessionStatus};
use crate::transport::{Connection, Connector, TransportEvent};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use std::time::Duration;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Token batches are published at most once per frame
pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Status message for transport-level failures
pub const CONNECTION_ERROR_MESSAGE: &str = "Connection error. Please try again.";

pub type ProcessingSession = StreamingSession<ProcessingPolicy>;
pub type CompilerSession = StreamingSession<CompilerPolicy>;

type StartResult = Result<String, SessionError>;

enum LinkState {
    Closed,
    Connecting,
    Open(Link),
}

struct Link {
    generation: u64,
    outbound: UnboundedSender<String>,
    pump: JoinHandle<()>,
}

struct Shared<P> {
    policy: P,
    state: watch::Sender<SessionState>,
    jobs: OnceLock<Arc<dyn JobStore>>,
    alive: AtomicBool,
    generation: AtomicU64,
    link: Mutex<LinkState>,
}

impl<P: SessionPolicy> Shared<P> {
    fn lock_link(&self) -> MutexGuard<'_, LinkState> {
        self.link.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.alive.load(Ordering::SeqCst) && self.current_generation() == generation
    }

    /// Apply `f` unless the run is stale; publishes only on change
    fn update(&self, generation: u64, f: impl FnOnce(&mut SessionState) -> bool) -> bool {
        self.state.send_if_modified(|state| {
            if !self.is_current(generation) {
                return false;
            }
            let changed = f(state);
            if changed {
                state.version += 1;
            }
            changed
        })
    }

    fn jobs(&self) -> Option<&Arc<dyn JobStore>> {
        if P::TRACKS_JOBS {
            self.jobs.get()
        } else {
            None
        }
    }

    fn known_job_id(&self) -> Option<String> {
        self.state.borrow().job_id.clone()
    }

    fn fail(&self, generation: u64, message: &str) -> bool {
        self.update(generation, |state| {
            if state.is_terminal() {
                return false;
            }
            state.status = SessionStatus::Error;
            state.error = Some(message.to_string());
            true
        })
    }

    fn flush_tokens(&self, generation: u64, tokens: &mut String) {
        if tokens.is_empty() {
            return;
        }
        let event = InboundEvent::LlmToken {
            token: std::mem::take(tokens),
        };
        self.update(generation, |state| self.policy.reduce(state, &event));
    }

    fn handle_event(
        &self,
        generation: u64,
        event: &InboundEvent,
        created: &mut Option<oneshot::Sender<StartResult>>,
    ) {
        let changed = self.update(generation, |state| self.policy.reduce(state, event));
        if !self.is_current(generation) {
            return;
        }

        match event {
            InboundEvent::JobCreated { job_id } => {
                tracing::info!(session = P::LABEL, %job_id, "Session created");
                if changed {
                    if let Some(jobs) = self.jobs() {
                        jobs.add_job(JobRecord::new(job_id.clone()));
                    }
                }
                if let Some(created) = created.take() {
                    let _ = created.send(Ok(job_id.clone()));
                }
            }
            InboundEvent::NodeStarted {
                node,
                node_index,
                total_nodes,
            } => {
                tracing::debug!(session = P::LABEL, %node, "Node started");
                if let (true, Some(jobs), Some(id)) = (changed, self.jobs(), self.known_job_id()) {
                    jobs.update_job(&id, JobUpdate::progress(node, *node_index, *total_nodes));
                }
            }
            InboundEvent::Error { message } => {
                tracing::warn!(session = P::LABEL, %message, "Session reported an error");
                if let (true, Some(jobs), Some(id)) = (changed, self.jobs(), self.known_job_id()) {
                    jobs.update_job(&id, JobUpdate::failed(message));
                }
                if let Some(created) = created.take() {
                    let _ = created.send(Err(SessionError::Server(message.clone())));
                }
            }
            InboundEvent::Complete { result } => {
                tracing::info!(session = P::LABEL, "Session complete");
                if let (true, Some(jobs), Some(id)) = (changed, self.jobs(), self.known_job_id()) {
                    jobs.update_job(&id, JobUpdate::completed(result.clone()));
                }
            }
            _ => {}
        }
    }

    /// Forget the link if it still belongs to `generation`
    fn clear_link(&self, generation: u64) {
        let mut link = self.lock_link();
        if let LinkState::Open(open) = &*link {
            if open.generation == generation {
                *link = LinkState::Closed;
            }
        }
    }

    fn teardown(&self) -> Option<Link> {
        self.generation.fetch_add(1, Ordering::SeqCst);
        match std::mem::replace(&mut *self.lock_link(), LinkState::Closed) {
            LinkState::Open(link) => {
                link.pump.abort();
                Some(link)
            }
            _ => None,
        }
    }
}

/// Releases a `Connecting` claim if `start` bails out or is dropped
struct PendingStart<'a, P: SessionPolicy> {
    shared: &'a Shared<P>,
    generation: u64,
    armed: bool,
}

impl<P: SessionPolicy> Drop for PendingStart<'_, P> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut link = self.shared.lock_link();
        if matches!(*link, LinkState::Connecting)
            && self.shared.current_generation() == self.generation
        {
            *link = LinkState::Closed;
        }
    }
}

pub struct StreamingSession<P: SessionPolicy> {
    shared: Arc<Shared<P>>,
    connector: Arc<dyn Connector>,
    endpoint: SessionEndpoint,
}

impl StreamingSession<ProcessingPolicy> {
    pub fn processing(connector: Arc<dyn Connector>, endpoint: SessionEndpoint) -> Self {
        Self::new(ProcessingPolicy, connector, endpoint)
    }
}

impl StreamingSession<CompilerPolicy> {
    pub fn compiler(connector: Arc<dyn Connector>, endpoint: SessionEndpoint) -> Self {
        Self::new(CompilerPolicy, connector, endpoint)
    }
}

impl<P: SessionPolicy> StreamingSession<P> {
    pub fn new(policy: P, connector: Arc<dyn Connector>, endpoint: SessionEndpoint) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        Self {
            shared: Arc::new(Shared {
                policy,
                state,
                jobs: OnceLock::new(),
                alive: AtomicBool::new(true),
                generation: AtomicU64::new(0),
                link: Mutex::new(LinkState::Closed),
            }),
            connector,
            endpoint,
        }
    }

    /// Report job lifecycle into `jobs` (processing sessions only)
    pub fn with_job_store(self, jobs: Arc<dyn JobStore>) -> Self {
        if self.shared.jobs.set(jobs).is_err() {
            tracing::warn!(session = P::LABEL, "Job store already set");
        }
        self
    }

    /// Open a run and wait for the server to create it
    ///
    /// Resolves with the job or session id. Fails immediately with
    /// [`SessionError::AlreadyOpen`] while another run is connecting or open.
    pub async fn start(&self, payload: Value) -> StartResult {
        let generation = {
            let mut link = self.shared.lock_link();
            if !matches!(*link, LinkState::Closed) {
                return Err(SessionError::AlreadyOpen);
            }
            *link = LinkState::Connecting;
            self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1
        };
        let mut pending = PendingStart {
            shared: &*self.shared,
            generation,
            armed: true,
        };

        self.shared.update(generation, |state| {
            state.reset();
            true
        });

        let url = self.endpoint.url_for(P::PATH);
        tracing::info!(session = P::LABEL, %url, "Opening session");

        let connection = match self.connector.connect(&url).await {
            Ok(connection) => connection,
            Err(e) => {
                tracing::error!(session = P::LABEL, "Failed to connect: {}", e);
                self.shared.fail(generation, CONNECTION_ERROR_MESSAGE);
                return Err(e.into());
            }
        };
        let Connection { outbound, inbound } = connection;

        let (created_tx, created_rx) = oneshot::channel();
        {
            let mut link = self.shared.lock_link();
            if !self.shared.is_current(generation) {
                return Err(SessionError::Cancelled);
            }

            let start = OutboundFrame::new(OutboundAction::Start, payload);
            if outbound.send(start.to_json()).is_err() {
                return Err(SessionError::ClosedBeforeStart);
            }

            let pump = tokio::spawn(pump(self.shared.clone(), generation, inbound, created_tx));
            *link = LinkState::Open(Link {
                generation,
                outbound,
                pump,
            });
            pending.armed = false;
        }

        created_rx.await.unwrap_or(Err(SessionError::Cancelled))
    }

    /// Send `{action, ...payload}`; `false` without an open connection
    pub fn send(&self, action: OutboundAction, payload: Value) -> bool {
        let link = self.shared.lock_link();
        let LinkState::Open(open) = &*link else {
            tracing::debug!(session = P::LABEL, action = action.as_str(), "Not connected, dropping frame");
            return false;
        };
        open.outbound
            .send(OutboundFrame::new(action, payload).to_json())
            .is_ok()
    }

    /// Answer a HITL prompt and resume processing
    pub fn submit_decision(&self, decision: Value) -> bool {
        if !self.send(OutboundAction::Decision, decision) {
            return false;
        }
        let generation = self.shared.current_generation();
        self.shared
            .update(generation, |state| self.shared.policy.on_decision(state));
        true
    }

    pub fn send_message(&self, text: &str) -> bool {
        self.send(OutboundAction::Message, json!({ "message": text }))
    }

    /// Close any connection and return to idle
    pub fn reset(&self) {
        if self.shared.teardown().is_some() {
            tracing::debug!(session = P::LABEL, "Session connection closed by reset");
        }
        let generation = self.shared.current_generation();
        self.shared.update(generation, |state| {
            state.reset();
            true
        });
    }

    pub fn is_connected(&self) -> bool {
        matches!(*self.shared.lock_link(), LinkState::Open(_))
    }

    pub fn state(&self) -> SessionState {
        self.shared.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.shared.state.subscribe()
    }

    pub fn policy(&self) -> &P {
        &self.shared.policy
    }
}

impl<P: SessionPolicy> Drop for StreamingSession<P> {
    fn drop(&mut self) {
        self.shared.alive.store(false, Ordering::SeqCst);
        self.shared.teardown();
    }
}

async fn pump<P: SessionPolicy>(
    shared: Arc<Shared<P>>,
    generation: u64,
    mut inbound: UnboundedReceiver<TransportEvent>,
    created: oneshot::Sender<StartResult>,
) {
    let mut created = Some(created);
    let mut tokens = String::new();
    let mut flush_at: Option<Instant> = None;

    loop {
        let next = match flush_at {
            Some(deadline) => tokio::select! {
                next = inbound.recv() => next,
                _ = tokio::time::sleep_until(deadline) => {
                    shared.flush_tokens(generation, &mut tokens);
                    flush_at = None;
                    continue;
                }
            },
            None => inbound.recv().await,
        };

        if !shared.is_current(generation) {
            break;
        }

        match next {
            Some(TransportEvent::Message(text)) => match InboundEvent::decode(&text) {
                Ok(InboundEvent::LlmToken { token }) => {
                    if flush_at.is_none() {
                        flush_at = Some(Instant::now() + FRAME_INTERVAL);
                    }
                    tokens.push_str(&token);
                }
                Ok(event) => {
                    shared.flush_tokens(generation, &mut tokens);
                    flush_at = None;
                    shared.handle_event(generation, &event, &mut created);
                }
                Err(EventError::UnknownType(event_type)) => {
                    tracing::debug!(session = P::LABEL, %event_type, "Ignoring unknown event");
                }
                Err(e) => {
                    tracing::warn!(session = P::LABEL, "Dropping inbound frame: {}", e);
                }
            },
            Some(TransportEvent::Error(message)) => {
                shared.flush_tokens(generation, &mut tokens);
                flush_at = None;
                tracing::error!(session = P::LABEL, %message, "Connection error");
                shared.fail(generation, CONNECTION_ERROR_MESSAGE);
                if let Some(created) = created.take() {
                    let _ = created.send(Err(TransportError::Connection(message).into()));
                }
            }
            Some(TransportEvent::Closed) | None => {
                shared.flush_tokens(generation, &mut tokens);
                tracing::debug!(session = P::LABEL, "Connection closed");
                shared.clear_link(generation);
                if let Some(created) = created.take() {
                    let _ = created.send(Err(SessionError::ClosedBeforeStart));
                }
                break;
            }
        }
    }
}
