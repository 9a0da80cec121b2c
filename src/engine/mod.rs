//! The audio engine seen from the relay.
//!
//! The relay never talks to a device directly. It needs an engine that can
//! host a looping, application-fed sound, play it on a channel whose
//! frequency can be changed on the fly, report how far playback has read, and
//! hand out exclusive write windows into the sound's ring.
//!
//! - [`AudioEngine`] - The contract
//! - [`SoftwareEngine`] - An in-process implementation, rendered by
//!   [`AudioOutput`](crate::io::AudioOutput) or directly by tests

pub mod software;

use thiserror::Error;

use crate::audio::drift::ms_to_samples;

pub use software::SoftwareEngine;

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u64);

        impl $name {
            pub fn new(raw: u64) -> Self {
                Self(raw)
            }

            pub fn raw(&self) -> u64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}#{}", stringify!($name), self.0)
            }
        }
    };
}

handle!(
    /// A streaming sound resource.
    SoundId
);
handle!(
    /// A voice playing a sound.
    ChannelId
);
handle!(
    /// An event instance grouping channels under one start/stop/pause control.
    EventId
);

pub const BYTES_PER_SAMPLE: u32 = std::mem::size_of::<f32>() as u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundFormat {
    PcmFloat,
}

/// Parameters for [`AudioEngine::create_streaming_sound`].
#[derive(Debug, Clone, PartialEq)]
pub struct SoundInfo {
    pub name: String,
    pub channels: u16,
    pub sample_rate: u32,
    pub length_bytes: u32,
    pub format: SoundFormat,
    pub looping: bool,
}

impl SoundInfo {
    /// A looping mono float ring holding `latency_ms` of audio at `sample_rate`.
    pub fn voice_ring(name: impl Into<String>, sample_rate: u32, latency_ms: u32) -> Self {
        Self {
            name: name.into(),
            channels: 1,
            sample_rate,
            length_bytes: ms_to_samples(sample_rate, latency_ms) * BYTES_PER_SAMPLE,
            format: SoundFormat::PcmFloat,
            looping: true,
        }
    }

    pub fn length_samples(&self) -> usize {
        (self.length_bytes / BYTES_PER_SAMPLE) as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopMode {
    Immediate,
    AllowFadeout,
}

/// An exclusive write window into a sound's ring.
///
/// A window that wraps the end of the ring is split in two spans: the first
/// runs from the lock offset to the end of the ring, the second from the
/// start of the ring onwards. The engine commits both spans on
/// [`AudioEngine::unlock`].
#[derive(Debug)]
pub struct LockedWindow {
    sound: SoundId,
    offset_bytes: u32,
    first: Vec<f32>,
    second: Vec<f32>,
}

impl LockedWindow {
    pub fn new(sound: SoundId, offset_bytes: u32, first_samples: usize, second_samples: usize) -> Self {
        Self {
            sound,
            offset_bytes,
            first: vec![0.0; first_samples],
            second: vec![0.0; second_samples],
        }
    }

    pub fn sound(&self) -> SoundId {
        self.sound
    }

    pub fn offset_bytes(&self) -> u32 {
        self.offset_bytes
    }

    pub fn len1_bytes(&self) -> u32 {
        self.first.len() as u32 * BYTES_PER_SAMPLE
    }

    pub fn len2_bytes(&self) -> u32 {
        self.second.len() as u32 * BYTES_PER_SAMPLE
    }

    pub fn len_samples(&self) -> usize {
        self.first.len() + self.second.len()
    }

    pub fn spans(&self) -> (&[f32], &[f32]) {
        (&self.first, &self.second)
    }

    pub fn spans_mut(&mut self) -> (&mut [f32], &mut [f32]) {
        (&mut self.first, &mut self.second)
    }

    /// Copies `samples` across both spans, first span first.
    ///
    /// `samples` must be exactly [`len_samples`](Self::len_samples) long.
    pub fn copy_from(&mut self, samples: &[f32]) {
        let (first, second) = self.spans_mut();
        let split = first.len();
        first.copy_from_slice(&samples[..split]);
        second.copy_from_slice(&samples[split..]);
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error("{0} is not a live handle")]
    InvalidHandle(String),
    #[error("unsupported sound: {0}")]
    UnsupportedSound(String),
    #[error("{0} is already locked")]
    AlreadyLocked(SoundId),
    #[error("{0} is not locked")]
    NotLocked(SoundId),
    #[error("window {offset}+{length} bytes exceeds ring of {ring} bytes")]
    WindowOutOfRange { offset: u32, length: u32, ring: u32 },
    #[error("audio device error: {0}")]
    Device(String),
}

/// What the relay needs from an audio engine.
///
/// Every call may come from the update thread while the engine mixes on its
/// own thread, so implementations synchronize internally.
pub trait AudioEngine: Send + Sync {
    /// The rate the engine mixes at. Voice rings are sized against it.
    fn output_sample_rate(&self) -> u32;

    fn create_event_instance(&self, path: &str) -> Result<EventId, EngineError>;

    fn start_event(&self, event: EventId) -> Result<(), EngineError>;

    fn set_event_paused(&self, event: EventId, paused: bool) -> Result<(), EngineError>;

    fn stop_event(&self, event: EventId, mode: StopMode) -> Result<(), EngineError>;

    fn release_event(&self, event: EventId) -> Result<(), EngineError>;

    fn create_streaming_sound(&self, info: &SoundInfo) -> Result<SoundId, EngineError>;

    fn release_sound(&self, sound: SoundId) -> Result<(), EngineError>;

    /// Starts `sound` on a fresh channel, optionally grouped under `event`.
    fn play_sound(
        &self,
        sound: SoundId,
        event: Option<EventId>,
        paused: bool,
    ) -> Result<ChannelId, EngineError>;

    fn set_frequency(&self, channel: ChannelId, hz: f32) -> Result<(), EngineError>;

    /// Byte offset in the sound's ring the channel will read next.
    fn read_cursor_bytes(&self, channel: ChannelId) -> Result<u32, EngineError>;

    fn lock(
        &self,
        sound: SoundId,
        offset_bytes: u32,
        length_bytes: u32,
    ) -> Result<LockedWindow, EngineError>;

    fn unlock(&self, window: LockedWindow) -> Result<(), EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_ring_size() {
        let info = SoundInfo::voice_ring("voice", 48000, 50);
        assert_eq!(info.length_bytes, 9600);
        assert_eq!(info.length_samples(), 2400);
        assert!(info.looping);
    }

    #[test]
    fn test_voice_ring_holds_whole_samples() {
        for latency_ms in [3, 5, 7, 25, 50] {
            let info = SoundInfo::voice_ring("voice", 44100, latency_ms);
            assert_eq!(info.length_bytes % BYTES_PER_SAMPLE, 0);
        }
        assert_eq!(SoundInfo::voice_ring("voice", 44100, 25).length_samples(), 1102);
    }

    #[test]
    fn test_window_copy_across_spans() {
        let mut window = LockedWindow::new(SoundId::new(1), 8, 2, 3);
        window.copy_from(&[1.0, 2.0, 3.0, 4.0, 5.0]);

        let (first, second) = window.spans();
        assert_eq!(first, &[1.0, 2.0]);
        assert_eq!(second, &[3.0, 4.0, 5.0]);
        assert_eq!(window.len1_bytes(), 8);
        assert_eq!(window.len2_bytes(), 12);
    }

    #[test]
    fn test_handle_display() {
        assert_eq!(ChannelId::new(7).to_string(), "ChannelId#7");
    }
}
