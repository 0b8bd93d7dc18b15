//! Run-state of the consumption loop.
//!
//! `Running → Draining → Stopped`, one way. The cancellation signal is a
//! `watch` channel flipped to `true` by the process entry point; the loop only
//! looks at it between batches.

use serde::Serialize;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Running,
    /// Cancellation observed; the in-flight batch finishes, no new polls.
    Draining,
    Stopped,
}

pub struct ShutdownController {
    state: RunState,
    signal: watch::Receiver<bool>,
}

impl ShutdownController {
    pub fn new(signal: watch::Receiver<bool>) -> Self {
        Self {
            state: RunState::Running,
            signal,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Check the cancellation signal and return the resulting state.
    pub fn observe(&mut self) -> RunState {
        if self.state == RunState::Running && *self.signal.borrow() {
            self.begin_draining();
        }
        self.state
    }

    pub fn begin_draining(&mut self) {
        if self.state == RunState::Running {
            info!("Cancellation received; draining CDC bridge");
            self.state = RunState::Draining;
        }
    }

    pub fn stop(&mut self) {
        if self.state != RunState::Stopped {
            info!(previous = ?self.state, "CDC bridge stopped");
            self.state = RunState::Stopped;
        }
    }

    /// Sleep for `duration`, returning early if cancellation arrives.
    pub async fn pause(&mut self, duration: Duration) {
        if duration.is_zero() || self.observe() != RunState::Running {
            return;
        }

        let sleep = tokio::time::sleep(duration);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = &mut sleep => return,
                changed = self.signal.changed() => match changed {
                    Ok(()) => {
                        if *self.signal.borrow() {
                            self.begin_draining();
                            return;
                        }
                    }
                    Err(_) => {
                        // Sender gone: nobody can cancel any more
                        (&mut sleep).await;
                        return;
                    }
                }
            }
        }
    }
}
