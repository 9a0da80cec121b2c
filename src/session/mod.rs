//! Voice session: one bridge per remote participant.
//!
//! ```text
//! participant "alice" ──► VoiceBridge ──┐
//!                                       ├──► AudioEngine (one event + ring each)
//! participant "bob"   ──► VoiceBridge ──┘
//! ```
//!
//! The session owns the engine handle, a [`TapRegistry`] of bridges keyed by
//! participant id, and a [`ReadinessGate`] that callers await instead of
//! polling for the voice service and the engine to come up.

pub mod ready;
pub mod registry;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::bridge::{BridgeStats, FillOutcome, VoiceBridge};
use crate::config::BridgeConfig;
use crate::engine::AudioEngine;

pub use ready::{ReadinessGate, ReadyError};
pub use registry::TapRegistry;

pub struct VoiceSession<E: AudioEngine> {
    engine: Arc<E>,
    config: BridgeConfig,
    ready: ReadinessGate,
    taps: TapRegistry<E>,
    closed: AtomicBool,
}

impl<E: AudioEngine> VoiceSession<E> {
    pub fn new(engine: Arc<E>, config: BridgeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            engine,
            config,
            ready: ReadinessGate::new(),
            taps: TapRegistry::new(),
            closed: AtomicBool::new(false),
        })
    }

    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn mark_ready(&self) {
        self.ready.mark_ready();
    }

    pub fn is_ready(&self) -> bool {
        self.ready.is_ready()
    }

    pub async fn wait_ready(&self, timeout: Duration) -> Result<(), ReadyError> {
        self.ready.wait(timeout).await
    }

    /// Creates a bridge for `id`. An existing bridge for the same id is torn
    /// down and replaced.
    pub fn add_participant(&self, id: &str) -> Result<Arc<VoiceBridge<E>>> {
        if self.closed.load(Ordering::Acquire) {
            anyhow::bail!("Voice session is closed");
        }
        let bridge = Arc::new(
            VoiceBridge::new(self.engine.clone(), self.config.clone())
                .with_context(|| format!("Failed to create voice bridge for {id}"))?,
        );

        if let Some(old) = self.taps.insert(id, bridge.clone()) {
            info!("Replacing voice tap for {}", id);
            old.teardown();
        } else {
            info!("Voice tap added for {}", id);
        }
        Ok(bridge)
    }

    /// Tears down and forgets the bridge for `id`. Returns false if there was
    /// none.
    pub fn remove_participant(&self, id: &str) -> bool {
        match self.taps.remove(id) {
            Some(bridge) => {
                bridge.teardown();
                info!("Voice tap removed for {}", id);
                true
            }
            None => false,
        }
    }

    pub fn participant(&self, id: &str) -> Option<Arc<VoiceBridge<E>>> {
        self.taps.get(id)
    }

    pub fn participants(&self) -> Vec<String> {
        self.taps.ids()
    }

    /// Sets the local playback gain for `id`. Returns false if `id` has no
    /// tap.
    pub fn set_gain(&self, id: &str, gain: f32) -> bool {
        if !gain.is_finite() || gain < 0.0 {
            warn!("Ignoring invalid gain {} for {}", gain, id);
            return false;
        }
        match self.taps.get(id) {
            Some(bridge) => {
                bridge.set_gain(gain);
                true
            }
            None => false,
        }
    }

    /// Runs one update step on every bridge.
    pub fn process_all(&self) -> Vec<(String, FillOutcome)> {
        self.taps
            .snapshot()
            .into_iter()
            .map(|(id, bridge)| {
                let outcome = bridge.process();
                (id, outcome)
            })
            .collect()
    }

    pub fn stats(&self) -> Vec<(String, BridgeStats)> {
        self.taps
            .snapshot()
            .into_iter()
            .map(|(id, bridge)| {
                let stats = bridge.stats();
                (id, stats)
            })
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Tears down every bridge and fails pending readiness waits. Later calls
    /// do nothing.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.ready.close();
        let taps = self.taps.drain();
        for (_, bridge) in &taps {
            bridge.teardown();
        }
        info!("Voice session closed ({} taps torn down)", taps.len());
    }
}

impl<E: AudioEngine> Drop for VoiceSession<E> {
    fn drop(&mut self) {
        self.close();
    }
}
