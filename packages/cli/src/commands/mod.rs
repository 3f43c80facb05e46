pub mod compile;
pub mod history;
pub mod process;

pub use compile::{compile, CompileArgs};
pub use history::{history, HistoryArgs};
pub use process::{process, ProcessArgs};

use anyhow::{bail, Result};
use manualdesk_session::{SessionPolicy, SessionState, StreamingSession};
use std::time::Duration;
use tokio::sync::watch;

const CONNECTION_POLL: Duration = Duration::from_millis(500);

/// Wait for the next published state
///
/// `None` once the connection is gone. Ctrl-C resets the session.
pub(crate) async fn next_update<P: SessionPolicy>(
    session: &StreamingSession<P>,
    updates: &mut watch::Receiver<SessionState>,
) -> Result<Option<SessionState>> {
    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    return Ok(None);
                }
                return Ok(Some(updates.borrow_and_update().clone()));
            }
            _ = tokio::time::sleep(CONNECTION_POLL) => {
                if !session.is_connected() {
                    return Ok(None);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                session.reset();
                bail!("Interrupted");
            }
        }
    }
}

pub(crate) fn pretty(value: &serde_json::Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
