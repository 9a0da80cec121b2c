//! One-shot readiness signal with an async, time-limited wait.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateState {
    Pending,
    Ready,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadyError {
    #[error("not ready after {0:?}")]
    Timeout(Duration),
    #[error("closed before becoming ready")]
    Closed,
}

/// Flips once from pending to ready (or closed). Any number of tasks can
/// wait on it; they all wake on the transition.
pub struct ReadinessGate {
    state: watch::Sender<GateState>,
}

impl ReadinessGate {
    pub fn new() -> Self {
        let (state, _) = watch::channel(GateState::Pending);
        Self { state }
    }

    /// Marks the gate ready. Has no effect once closed.
    pub fn mark_ready(&self) {
        let changed = self.state.send_if_modified(|state| {
            if *state == GateState::Pending {
                *state = GateState::Ready;
                true
            } else {
                false
            }
        });
        if changed {
            info!("Voice session ready");
        }
    }

    /// Closes the gate. Pending and future waits fail with
    /// [`ReadyError::Closed`].
    pub fn close(&self) {
        self.state.send_if_modified(|state| {
            if *state == GateState::Closed {
                false
            } else {
                *state = GateState::Closed;
                true
            }
        });
    }

    pub fn is_ready(&self) -> bool {
        *self.state.borrow() == GateState::Ready
    }

    pub fn is_closed(&self) -> bool {
        *self.state.borrow() == GateState::Closed
    }

    /// Resolves once the gate is ready, or fails when `timeout` elapses or the
    /// gate is closed first.
    pub async fn wait(&self, timeout: Duration) -> Result<(), ReadyError> {
        let mut rx = self.state.subscribe();
        let waited = tokio::time::timeout(timeout, async {
            // The sender lives in `self`, so the channel cannot close while
            // this future is alive.
            rx.wait_for(|state| *state != GateState::Pending)
                .await
                .map(|state| *state)
                .unwrap_or(GateState::Closed)
        })
        .await;

        match waited {
            Ok(GateState::Ready) => Ok(()),
            Ok(_) => Err(ReadyError::Closed),
            Err(_) => {
                debug!("Readiness wait timed out after {:?}", timeout);
                Err(ReadyError::Timeout(timeout))
            }
        }
    }
}

impl Default for ReadinessGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_wait_after_ready_resolves_immediately() {
        let gate = ReadinessGate::new();
        gate.mark_ready();
        assert!(gate.is_ready());
        assert_eq!(gate.wait(Duration::from_millis(10)).await, Ok(()));
    }

    #[tokio::test]
    async fn test_wait_times_out() {
        let gate = ReadinessGate::new();
        let timeout = Duration::from_millis(20);
        assert_eq!(gate.wait(timeout).await, Err(ReadyError::Timeout(timeout)));
        assert!(!gate.is_ready());
    }

    #[tokio::test]
    async fn test_waiter_wakes_on_mark_ready() {
        let gate = Arc::new(ReadinessGate::new());
        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.wait(Duration::from_secs(5)).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        gate.mark_ready();

        assert_eq!(waiter.await.unwrap(), Ok(()));
    }

    #[tokio::test]
    async fn test_close_fails_waiters() {
        let gate = Arc::new(ReadinessGate::new());
        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.wait(Duration::from_secs(5)).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        gate.close();

        assert_eq!(waiter.await.unwrap(), Err(ReadyError::Closed));
        assert!(gate.is_closed());
    }

    #[tokio::test]
    async fn test_ready_after_close_is_ignored() {
        let gate = ReadinessGate::new();
        gate.close();
        gate.mark_ready();
        assert!(!gate.is_ready());
        assert_eq!(
            gate.wait(Duration::from_millis(10)).await,
            Err(ReadyError::Closed)
        );
    }
}
