//! The engine-side half of the bridge.
//!
//! A [`PlaybackChannel`] owns one looping streaming sound and the channel
//! playing it. Each fill cycle it asks the engine how far playback has read,
//! and refills exactly the stretch of ring behind the read cursor, never the
//! part still ahead of it.
//!
//! ```text
//!              last_write            cursor
//!                  │                    │
//! ring: [ ........ ▼ ==== fill ======== ▼ ..... not yet played ..... ]
//! ```

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::audio::{DriftEstimator, SampleQueue};
use crate::engine::{AudioEngine, BYTES_PER_SAMPLE, ChannelId, EventId, SoundId, SoundInfo};

use super::error::BridgeError;

const SOUND_NAME: &str = "voice";

/// Lifecycle phase of a [`PlaybackChannel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelPhase {
    NoChannel,
    Active,
    Destroyed,
}

/// Why a fill cycle wrote nothing. None of these are faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoChannel,
    Destroyed,
    /// The read cursor has not moved since the last write.
    NothingToFill,
    InsufficientQueuedSamples { needed: usize, queued: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub enum FillOutcome {
    /// Samples copied into the ring.
    Written(usize),
    Skipped(SkipReason),
    Failed(BridgeError),
}

struct ActiveChannel {
    sound: SoundId,
    channel: ChannelId,
    ring_bytes: u32,
    last_write_cursor: u32,
    applied_frequency: Option<u32>,
}

enum ChannelState {
    NoChannel,
    Active(ActiveChannel),
    Destroyed,
}

/// Owns the streaming sound and channel for one voice.
pub struct PlaybackChannel<E: AudioEngine> {
    engine: Arc<E>,
    latency_ms: u32,
    state: ChannelState,
}

impl<E: AudioEngine> PlaybackChannel<E> {
    pub fn new(engine: Arc<E>, latency_ms: u32) -> Self {
        Self {
            engine,
            latency_ms,
            state: ChannelState::NoChannel,
        }
    }

    pub fn phase(&self) -> ChannelPhase {
        match self.state {
            ChannelState::NoChannel => ChannelPhase::NoChannel,
            ChannelState::Active(_) => ChannelPhase::Active,
            ChannelState::Destroyed => ChannelPhase::Destroyed,
        }
    }

    pub fn channel_id(&self) -> Option<ChannelId> {
        match &self.state {
            ChannelState::Active(active) => Some(active.channel),
            _ => None,
        }
    }

    pub fn sound_id(&self) -> Option<SoundId> {
        match &self.state {
            ChannelState::Active(active) => Some(active.sound),
            _ => None,
        }
    }

    pub fn applied_frequency(&self) -> Option<u32> {
        match &self.state {
            ChannelState::Active(active) => active.applied_frequency,
            _ => None,
        }
    }

    pub fn last_write_cursor(&self) -> Option<u32> {
        match &self.state {
            ChannelState::Active(active) => Some(active.last_write_cursor),
            _ => None,
        }
    }

    /// Creates the streaming sound and starts it on a fresh channel.
    ///
    /// A no-op while already active. On failure the controller stays in
    /// [`ChannelPhase::NoChannel`] so a later speech onset can retry.
    pub fn activate(&mut self, event: Option<EventId>) -> Result<(), BridgeError> {
        match self.state {
            ChannelState::Active(_) => return Ok(()),
            ChannelState::Destroyed => return Err(BridgeError::Destroyed),
            ChannelState::NoChannel => {}
        }

        let rate = self.engine.output_sample_rate();
        let info = SoundInfo::voice_ring(SOUND_NAME, rate, self.latency_ms);
        let sound = self
            .engine
            .create_streaming_sound(&info)
            .map_err(BridgeError::ResourceCreationFailed)?;

        let channel = match self.engine.play_sound(sound, event, false) {
            Ok(channel) => channel,
            Err(e) => {
                if let Err(release_err) = self.engine.release_sound(sound) {
                    warn!("Failed to release unplayed sound {}: {}", sound, release_err);
                }
                return Err(BridgeError::ResourceCreationFailed(e));
            }
        };

        if let Some(event) = event {
            if let Err(e) = self.engine.set_event_paused(event, false) {
                warn!("Failed to unpause voice event {}: {}", event, e);
            }
        }

        info!(
            "Playback channel {} active on {} ({} bytes, {} Hz)",
            channel, sound, info.length_bytes, rate
        );
        self.state = ChannelState::Active(ActiveChannel {
            sound,
            channel,
            ring_bytes: info.length_bytes,
            last_write_cursor: 0,
            applied_frequency: None,
        });
        Ok(())
    }

    /// Sets the channel's playback frequency. Failures are logged.
    pub fn apply_frequency(&mut self, hz: u32) -> Result<(), BridgeError> {
        let ChannelState::Active(active) = &mut self.state else {
            return Ok(());
        };
        match self.engine.set_frequency(active.channel, hz as f32) {
            Ok(()) => {
                if active.applied_frequency != Some(hz) {
                    debug!("Channel {} frequency -> {} Hz", active.channel, hz);
                }
                active.applied_frequency = Some(hz);
                Ok(())
            }
            Err(e) => {
                warn!("Failed to set frequency on {}: {}", active.channel, e);
                Err(BridgeError::ChannelControlFailed(e))
            }
        }
    }

    /// Tops up the ring from `queue`, up to the engine's read cursor.
    pub fn fill(&mut self, queue: &SampleQueue, drift: &DriftEstimator) -> FillOutcome {
        let active = match &mut self.state {
            ChannelState::Active(active) => active,
            ChannelState::NoChannel => return FillOutcome::Skipped(SkipReason::NoChannel),
            ChannelState::Destroyed => return FillOutcome::Skipped(SkipReason::Destroyed),
        };

        let cursor = match self.engine.read_cursor_bytes(active.channel) {
            Ok(cursor) => cursor,
            Err(e) => {
                warn!("Failed to read cursor of {}: {}", active.channel, e);
                return FillOutcome::Failed(BridgeError::ChannelControlFailed(e));
            }
        };

        let available_bytes =
            (cursor + active.ring_bytes - active.last_write_cursor) % active.ring_bytes;
        if available_bytes == 0 {
            return FillOutcome::Skipped(SkipReason::NothingToFill);
        }

        let needed = (available_bytes / BYTES_PER_SAMPLE) as usize;
        let queued = queue.len();
        if queued < needed {
            return FillOutcome::Skipped(SkipReason::InsufficientQueuedSamples { needed, queued });
        }

        let mut window =
            match self
                .engine
                .lock(active.sound, active.last_write_cursor, available_bytes)
            {
                Ok(window) => window,
                Err(e) => {
                    error!(
                        "Failed to lock {} bytes at {} of {}: {}",
                        available_bytes, active.last_write_cursor, active.sound, e
                    );
                    return FillOutcome::Failed(BridgeError::LockUnlockFailed(e));
                }
            };

        let samples = match queue.drain(needed) {
            Ok(samples) => samples,
            Err(e) => {
                debug!("Queue shrank under the fill cycle: {}", e);
                if let Err(unlock_err) = self.engine.unlock(window) {
                    error!("Failed to unlock {}: {}", active.sound, unlock_err);
                }
                return FillOutcome::Skipped(SkipReason::InsufficientQueuedSamples {
                    needed,
                    queued: queue.len(),
                });
            }
        };
        window.copy_from(&samples);
        // The samples have left the queue whether or not the unlock succeeds.
        drift.record_read(needed as u64);

        if let Err(e) = self.engine.unlock(window) {
            error!("Failed to unlock {}: {}", active.sound, e);
            return FillOutcome::Failed(BridgeError::LockUnlockFailed(e));
        }

        active.last_write_cursor = cursor;
        FillOutcome::Written(needed)
    }

    /// Releases the sound. Safe to call repeatedly; only the first call
    /// touches the engine.
    ///
    /// Returns whether a sound was released by this call.
    pub fn destroy(&mut self) -> bool {
        let previous = std::mem::replace(&mut self.state, ChannelState::Destroyed);
        let ChannelState::Active(active) = previous else {
            return false;
        };
        match self.engine.release_sound(active.sound) {
            Ok(()) => info!("Released voice sound {}", active.sound),
            Err(e) => error!("Failed to release voice sound {}: {}", active.sound, e),
        }
        true
    }
}
