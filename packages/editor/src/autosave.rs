//! # Autosave
//!
//! Periodically persists the live document content through an injected save
//! callback and tracks `last_saved_at` / `is_saving` / `last_error`.
//!
//! The timer and [`AutosaveHandle::save_now`] share one save path with an
//! in-flight guard, so at most one `on_save` call runs at a time. After
//! [`Autosave::shutdown`] (or drop) the timer is gone and a save that
//! resolves late leaves the state untouched.

use crate::errors::SaveError;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;
use manualdesk_common::{Clock, ContentCell};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Default time between autosave ticks
pub const DEFAULT_AUTOSAVE_INTERVAL: Duration = Duration::from_millis(120_000);

pub type SaveFuture = BoxFuture<'static, Result<(), SaveError>>;

/// Save collaborator: persists the given content
pub type SaveFn = Arc<dyn Fn(String) -> SaveFuture + Send + Sync>;

/// Build a [`SaveFn`] from an async closure
pub fn save_fn<F, Fut>(f: F) -> SaveFn
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), SaveError>> + Send + 'static,
{
    Arc::new(move |content| f(content).boxed())
}

#[derive(Debug, Clone)]
pub struct AutosaveOptions {
    pub interval: Duration,
    pub enabled: bool,
}

impl Default for AutosaveOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_AUTOSAVE_INTERVAL,
            enabled: true,
        }
    }
}

/// Observable autosave status
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AutosaveState {
    pub last_saved_at: Option<DateTime<Utc>>,
    pub is_saving: bool,
    pub last_error: Option<SaveError>,
}

/// Successful outcome of a save request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// `on_save` ran and resolved
    Saved,
    /// Content matched the baseline, nothing to do
    Unchanged,
    /// Another save was already running; this request was skipped
    InFlight,
    /// Autosave has been shut down
    Stopped,
}

struct Shared {
    content: ContentCell,
    baseline: Mutex<String>,
    state: Mutex<AutosaveState>,
    enabled: AtomicBool,
    alive: AtomicBool,
    on_save: SaveFn,
    clock: Arc<dyn Clock>,
}

impl Shared {
    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn state(&self) -> MutexGuard<'_, AutosaveState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn baseline(&self) -> MutexGuard<'_, String> {
        self.baseline.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn is_dirty(&self) -> bool {
        let baseline = self.baseline();
        !self.content.matches(&baseline)
    }

    async fn save(&self, force: bool) -> Result<SaveOutcome, SaveError> {
        if !self.is_alive() {
            return Ok(SaveOutcome::Stopped);
        }

        let content = self.content.get();
        if !force && *self.baseline() == content {
            return Ok(SaveOutcome::Unchanged);
        }

        {
            let mut state = self.state();
            if state.is_saving {
                return Ok(SaveOutcome::InFlight);
            }
            state.is_saving = true;
        }
        let _saving = SavingGuard { shared: self };

        let result = match AssertUnwindSafe((self.on_save)(content.clone()))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(payload) => Err(SaveError::from_panic(payload)),
        };

        if !self.is_alive() {
            tracing::debug!("Save resolved after autosave shut down, ignoring result");
            return result.map(|_| SaveOutcome::Saved);
        }

        match result {
            Ok(()) => {
                *self.baseline() = content;
                let mut state = self.state();
                state.last_saved_at = Some(self.clock.now());
                state.last_error = None;
                Ok(SaveOutcome::Saved)
            }
            Err(e) => {
                self.state().last_error = Some(e.clone());
                Err(e)
            }
        }
    }
}

/// Clears `is_saving` however the save future finishes
struct SavingGuard<'a> {
    shared: &'a Shared,
}

impl Drop for SavingGuard<'_> {
    fn drop(&mut self) {
        if self.shared.is_alive() {
            self.shared.state().is_saving = false;
        }
    }
}

/// Cloneable handle for triggering saves and reading status from other tasks
#[derive(Clone)]
pub struct AutosaveHandle {
    shared: Arc<Shared>,
}

impl AutosaveHandle {
    /// Save immediately
    ///
    /// Without `force`, unchanged content resolves to
    /// [`SaveOutcome::Unchanged`] and `on_save` is not called.
    pub async fn save_now(&self, force: bool) -> Result<SaveOutcome, SaveError> {
        self.shared.save(force).await
    }

    /// Record a save that happened through another path
    pub fn mark_as_saved(&self) {
        if !self.shared.is_alive() {
            return;
        }
        *self.shared.baseline() = self.shared.content.get();
        self.shared.state().last_saved_at = Some(self.shared.clock.now());
    }

    /// Replace the last-known persisted content
    pub fn set_baseline(&self, baseline: impl Into<String>) {
        *self.shared.baseline() = baseline.into();
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.shared.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.shared.enabled.load(Ordering::SeqCst)
    }

    /// Whether live content differs from the baseline
    pub fn is_dirty(&self) -> bool {
        self.shared.is_dirty()
    }

    pub fn state(&self) -> AutosaveState {
        self.shared.state().clone()
    }

    /// Human readable age of the last save, `None` if never saved
    pub fn time_since_last_save(&self) -> Option<String> {
        let last = self.shared.state().last_saved_at?;
        let elapsed = self.shared.clock.now() - last;
        Some(format_elapsed(elapsed.num_seconds()))
    }
}

/// Autosave engine owning the interval timer
pub struct Autosave {
    handle: AutosaveHandle,
    timer: Option<JoinHandle<()>>,
}

impl Autosave {
    /// Start autosaving `content` against `baseline`
    ///
    /// Must be called from within a tokio runtime. A zero interval starts
    /// no timer; `save_now` still works.
    pub fn start(
        content: ContentCell,
        baseline: impl Into<String>,
        options: AutosaveOptions,
        on_save: SaveFn,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let shared = Arc::new(Shared {
            content,
            baseline: Mutex::new(baseline.into()),
            state: Mutex::new(AutosaveState::default()),
            enabled: AtomicBool::new(options.enabled),
            alive: AtomicBool::new(true),
            on_save,
            clock,
        });

        let timer = if options.interval.is_zero() {
            tracing::debug!("Autosave interval is zero, timer not started");
            None
        } else {
            Some(spawn_timer(shared.clone(), options.interval))
        };

        Self {
            handle: AutosaveHandle { shared },
            timer,
        }
    }

    pub fn handle(&self) -> AutosaveHandle {
        self.handle.clone()
    }

    pub async fn save_now(&self, force: bool) -> Result<SaveOutcome, SaveError> {
        self.handle.save_now(force).await
    }

    pub fn mark_as_saved(&self) {
        self.handle.mark_as_saved();
    }

    pub fn set_baseline(&self, baseline: impl Into<String>) {
        self.handle.set_baseline(baseline);
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.handle.set_enabled(enabled);
    }

    pub fn is_dirty(&self) -> bool {
        self.handle.is_dirty()
    }

    pub fn state(&self) -> AutosaveState {
        self.handle.state()
    }

    pub fn time_since_last_save(&self) -> Option<String> {
        self.handle.time_since_last_save()
    }

    /// Stop the timer and freeze the state
    ///
    /// A save already running completes, but its result is discarded.
    pub fn shutdown(&mut self) {
        self.handle.shared.alive.store(false, Ordering::SeqCst);
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

impl Drop for Autosave {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn spawn_timer(shared: Arc<Shared>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if !shared.is_alive() {
                break;
            }
            if !shared.enabled.load(Ordering::SeqCst) || !shared.is_dirty() {
                continue;
            }

            // Saves run to completion even if the timer is aborted mid-flight
            let shared = shared.clone();
            tokio::spawn(async move {
                match shared.save(false).await {
                    Ok(SaveOutcome::Saved) => tracing::debug!("Autosaved"),
                    Ok(SaveOutcome::InFlight) => tracing::debug!("Autosave skipped, save in flight"),
                    Ok(_) => {}
                    Err(e) => tracing::warn!("Autosave failed: {}", e),
                }
            });
        }
    })
}

/// Format an elapsed number of seconds as "just now", "5 mins ago", ...
pub fn format_elapsed(seconds: i64) -> String {
    fn plural(n: i64, unit: &str) -> String {
        if n == 1 {
            format!("1 {unit} ago")
        } else {
            format!("{n} {unit}s ago")
        }
    }

    if seconds < 60 {
        return "just now".to_string();
    }
    let minutes = seconds / 60;
    if minutes < 60 {
        return plural(minutes, "min");
    }
    let hours = minutes / 60;
    if hours < 24 {
        return plural(hours, "hour");
    }
    plural(hours / 24, "day")
}
