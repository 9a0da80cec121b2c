//! An in-process streaming engine.
//!
//! Sounds are plain `f32` rings. Each channel keeps a fractional read position
//! that advances by `frequency / output_rate` per rendered frame, so a channel
//! told to run at 47760 Hz against a 48000 Hz mix consumes its ring 0.5%
//! slower than real time. Samples between ring positions are linearly
//! interpolated.
//!
//! [`SoftwareEngine::render`] mixes every audible channel into an interleaved
//! block. The device layer calls it from the output callback; tests call it
//! directly to move playback forward by an exact number of frames.

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::{debug, info, warn};

use super::{
    AudioEngine, BYTES_PER_SAMPLE, ChannelId, EngineError, EventId, LockedWindow, SoundFormat,
    SoundId, SoundInfo, StopMode,
};

/// The region handed out by the outstanding [`AudioEngine::lock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LockedRegion {
    offset_bytes: u32,
    first_samples: usize,
    second_samples: usize,
}

struct SoundData {
    name: String,
    ring: Vec<f32>,
    looping: bool,
    locked: Option<LockedRegion>,
}

struct ChannelState {
    sound: SoundId,
    event: Option<EventId>,
    /// Read position in ring samples.
    position: f64,
    frequency: f32,
    paused: bool,
}

struct EventState {
    path: String,
    started: bool,
    paused: bool,
}

impl EventState {
    fn audible(&self) -> bool {
        self.started && !self.paused
    }
}

#[derive(Default)]
struct EngineState {
    sounds: HashMap<SoundId, SoundData>,
    channels: HashMap<ChannelId, ChannelState>,
    events: HashMap<EventId, EventState>,
    next_handle: u64,
}

impl EngineState {
    fn next_handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    fn sound_mut(&mut self, sound: SoundId) -> Result<&mut SoundData, EngineError> {
        self.sounds
            .get_mut(&sound)
            .ok_or_else(|| EngineError::InvalidHandle(sound.to_string()))
    }

    fn channel_mut(&mut self, channel: ChannelId) -> Result<&mut ChannelState, EngineError> {
        self.channels
            .get_mut(&channel)
            .ok_or_else(|| EngineError::InvalidHandle(channel.to_string()))
    }

    fn event_mut(&mut self, event: EventId) -> Result<&mut EventState, EngineError> {
        self.events
            .get_mut(&event)
            .ok_or_else(|| EngineError::InvalidHandle(event.to_string()))
    }
}

/// A software mixer implementing [`AudioEngine`].
pub struct SoftwareEngine {
    output_rate: u32,
    state: Mutex<EngineState>,
}

impl SoftwareEngine {
    pub fn new(output_rate: u32) -> Self {
        Self {
            output_rate,
            state: Mutex::new(EngineState::default()),
        }
    }

    /// Mixes all audible channels into `out`, interleaved `out_channels` wide.
    ///
    /// Mono voice is written to every output channel. `out` is overwritten.
    pub fn render(&self, out: &mut [f32], out_channels: usize) {
        out.fill(0.0);
        if out_channels == 0 {
            return;
        }

        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        let mut finished = Vec::new();

        for (id, channel) in state.channels.iter_mut() {
            if channel.paused {
                continue;
            }
            if let Some(event) = channel.event {
                match state.events.get(&event) {
                    Some(event) if event.audible() => {}
                    _ => continue,
                }
            }
            let Some(sound) = state.sounds.get(&channel.sound) else {
                continue;
            };
            let ring = &sound.ring;
            if ring.is_empty() {
                continue;
            }

            let len = ring.len() as f64;
            let step = channel.frequency as f64 / self.output_rate as f64;

            for frame in out.chunks_exact_mut(out_channels) {
                let index = channel.position.floor();
                let frac = (channel.position - index) as f32;
                let i = index as usize % ring.len();
                let j = (i + 1) % ring.len();
                let sample = ring[i] * (1.0 - frac) + ring[j] * frac;
                for slot in frame.iter_mut() {
                    *slot += sample;
                }

                channel.position += step;
                if channel.position >= len {
                    if sound.looping {
                        channel.position -= len;
                    } else {
                        finished.push(*id);
                        break;
                    }
                }
            }
        }

        for id in finished {
            debug!("SoftwareEngine: {} reached end of sound", id);
            state.channels.remove(&id);
        }
    }

    /// Number of live sounds.
    pub fn sound_count(&self) -> usize {
        self.state.lock().unwrap().sounds.len()
    }

    /// Number of live channels.
    pub fn channel_count(&self) -> usize {
        self.state.lock().unwrap().channels.len()
    }

    /// Number of live event instances.
    pub fn event_count(&self) -> usize {
        self.state.lock().unwrap().events.len()
    }

    /// Current frequency of `channel`, if it is live.
    pub fn channel_frequency(&self, channel: ChannelId) -> Option<f32> {
        let state = self.state.lock().unwrap();
        state.channels.get(&channel).map(|c| c.frequency)
    }

    /// Whether `event` is started and not paused.
    pub fn event_audible(&self, event: EventId) -> Option<bool> {
        let state = self.state.lock().unwrap();
        state.events.get(&event).map(|e| e.audible())
    }

    /// A copy of the ring behind `sound`.
    pub fn sound_data(&self, sound: SoundId) -> Option<Vec<f32>> {
        let state = self.state.lock().unwrap();
        state.sounds.get(&sound).map(|s| s.ring.clone())
    }
}

impl AudioEngine for SoftwareEngine {
    fn output_sample_rate(&self) -> u32 {
        self.output_rate
    }

    fn create_event_instance(&self, path: &str) -> Result<EventId, EngineError> {
        let mut state = self.state.lock().unwrap();
        let id = EventId::new(state.next_handle());
        state.events.insert(
            id,
            EventState {
                path: path.to_string(),
                started: false,
                paused: false,
            },
        );
        info!("SoftwareEngine: created event {} for '{}'", id, path);
        Ok(id)
    }

    fn start_event(&self, event: EventId) -> Result<(), EngineError> {
        let mut state = self.state.lock().unwrap();
        state.event_mut(event)?.started = true;
        Ok(())
    }

    fn set_event_paused(&self, event: EventId, paused: bool) -> Result<(), EngineError> {
        let mut state = self.state.lock().unwrap();
        state.event_mut(event)?.paused = paused;
        Ok(())
    }

    fn stop_event(&self, event: EventId, mode: StopMode) -> Result<(), EngineError> {
        let mut state = self.state.lock().unwrap();
        let entry = state.event_mut(event)?;
        entry.started = false;
        let path = entry.path.clone();
        // No fade stage is modelled, both modes cut the event's channels.
        state.channels.retain(|_, c| c.event != Some(event));
        debug!("SoftwareEngine: stopped event '{}' ({:?})", path, mode);
        Ok(())
    }

    fn release_event(&self, event: EventId) -> Result<(), EngineError> {
        let mut state = self.state.lock().unwrap();
        let entry = state
            .events
            .remove(&event)
            .ok_or_else(|| EngineError::InvalidHandle(event.to_string()))?;
        state.channels.retain(|_, c| c.event != Some(event));
        info!("SoftwareEngine: released event '{}'", entry.path);
        Ok(())
    }

    fn create_streaming_sound(&self, info: &SoundInfo) -> Result<SoundId, EngineError> {
        if info.channels != 1 {
            return Err(EngineError::UnsupportedSound(format!(
                "{} channels (only mono is supported)",
                info.channels
            )));
        }
        if info.format != SoundFormat::PcmFloat {
            return Err(EngineError::UnsupportedSound(format!("{:?}", info.format)));
        }
        if info.length_bytes == 0 || info.length_bytes % BYTES_PER_SAMPLE != 0 {
            return Err(EngineError::UnsupportedSound(format!(
                "ring of {} bytes",
                info.length_bytes
            )));
        }
        if info.sample_rate != self.output_rate {
            warn!(
                "SoftwareEngine: sound '{}' declared at {} Hz, engine mixes at {} Hz",
                info.name, info.sample_rate, self.output_rate
            );
        }

        let mut state = self.state.lock().unwrap();
        let id = SoundId::new(state.next_handle());
        state.sounds.insert(
            id,
            SoundData {
                name: info.name.clone(),
                ring: vec![0.0; info.length_samples()],
                looping: info.looping,
                locked: None,
            },
        );
        info!(
            "SoftwareEngine: created sound {} '{}' ({} bytes)",
            id, info.name, info.length_bytes
        );
        Ok(id)
    }

    fn release_sound(&self, sound: SoundId) -> Result<(), EngineError> {
        let mut state = self.state.lock().unwrap();
        let data = state
            .sounds
            .remove(&sound)
            .ok_or_else(|| EngineError::InvalidHandle(sound.to_string()))?;
        state.channels.retain(|_, c| c.sound != sound);
        info!("SoftwareEngine: released sound '{}'", data.name);
        Ok(())
    }

    fn play_sound(
        &self,
        sound: SoundId,
        event: Option<EventId>,
        paused: bool,
    ) -> Result<ChannelId, EngineError> {
        let mut state = self.state.lock().unwrap();
        state.sound_mut(sound)?;
        if let Some(event) = event {
            state.event_mut(event)?;
        }
        let id = ChannelId::new(state.next_handle());
        let frequency = self.output_rate as f32;
        state.channels.insert(
            id,
            ChannelState {
                sound,
                event,
                position: 0.0,
                frequency,
                paused,
            },
        );
        Ok(id)
    }

    fn set_frequency(&self, channel: ChannelId, hz: f32) -> Result<(), EngineError> {
        if !(hz.is_finite() && hz > 0.0) {
            return Err(EngineError::UnsupportedSound(format!("frequency {}", hz)));
        }
        let mut state = self.state.lock().unwrap();
        state.channel_mut(channel)?.frequency = hz;
        Ok(())
    }

    fn read_cursor_bytes(&self, channel: ChannelId) -> Result<u32, EngineError> {
        let state = self.state.lock().unwrap();
        let entry = state
            .channels
            .get(&channel)
            .ok_or_else(|| EngineError::InvalidHandle(channel.to_string()))?;
        let ring_len = state
            .sounds
            .get(&entry.sound)
            .map(|s| s.ring.len())
            .unwrap_or(0);
        if ring_len == 0 {
            return Ok(0);
        }
        let sample = entry.position.floor() as usize % ring_len;
        Ok(sample as u32 * BYTES_PER_SAMPLE)
    }

    fn lock(
        &self,
        sound: SoundId,
        offset_bytes: u32,
        length_bytes: u32,
    ) -> Result<LockedWindow, EngineError> {
        let mut state = self.state.lock().unwrap();
        let data = state.sound_mut(sound)?;
        let ring_bytes = data.ring.len() as u32 * BYTES_PER_SAMPLE;

        if offset_bytes >= ring_bytes
            || length_bytes > ring_bytes
            || offset_bytes % BYTES_PER_SAMPLE != 0
            || length_bytes % BYTES_PER_SAMPLE != 0
        {
            return Err(EngineError::WindowOutOfRange {
                offset: offset_bytes,
                length: length_bytes,
                ring: ring_bytes,
            });
        }
        if data.locked.is_some() {
            return Err(EngineError::AlreadyLocked(sound));
        }

        let first_bytes = length_bytes.min(ring_bytes - offset_bytes);
        let second_bytes = length_bytes - first_bytes;
        let region = LockedRegion {
            offset_bytes,
            first_samples: (first_bytes / BYTES_PER_SAMPLE) as usize,
            second_samples: (second_bytes / BYTES_PER_SAMPLE) as usize,
        };
        data.locked = Some(region);

        Ok(LockedWindow::new(
            sound,
            offset_bytes,
            region.first_samples,
            region.second_samples,
        ))
    }

    fn unlock(&self, window: LockedWindow) -> Result<(), EngineError> {
        let mut state = self.state.lock().unwrap();
        let sound = window.sound();
        let data = state.sound_mut(sound)?;
        let Some(region) = data.locked else {
            return Err(EngineError::NotLocked(sound));
        };

        let (first, second) = window.spans();
        let presented = LockedRegion {
            offset_bytes: window.offset_bytes(),
            first_samples: first.len(),
            second_samples: second.len(),
        };
        // The lock stays held so the window actually handed out can still
        // be committed.
        if presented != region {
            return Err(EngineError::WindowOutOfRange {
                offset: window.offset_bytes(),
                length: window.len1_bytes() + window.len2_bytes(),
                ring: data.ring.len() as u32 * BYTES_PER_SAMPLE,
            });
        }

        let start = (region.offset_bytes / BYTES_PER_SAMPLE) as usize;
        data.ring[start..start + first.len()].copy_from_slice(first);
        data.ring[..second.len()].copy_from_slice(second);
        data.locked = None;
        Ok(())
    }
}
