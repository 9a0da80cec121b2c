//! The voice-to-engine bridge.
//!
//! Two independent triggers drive a [`VoiceBridge`]:
//!
//! ```text
//!  capture thread                          update thread
//!  ──────────────                          ─────────────
//!  on_voice_frame(buf)                     process()
//!    │                                       │
//!    ├─► VoiceActivityGate ─(silent)─► drop  ├─► create channel on speech onset
//!    ├─► Gain                                ├─► apply commanded frequency
//!    ├─► SampleQueue.push ◄──────────────────┼── fill: drain into engine ring
//!    └─► DriftEstimator.record_write         └─► DriftEstimator.record_read
//! ```
//!
//! The engine's mixer drains the ring on its own schedule. The bridge only
//! writes the region the mixer has already played.

pub mod channel;
pub mod error;

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use tracing::{debug, error, info, warn};

use crate::audio::drift::{DriftParams, LatencyState, ms_to_samples};
use crate::audio::sample::downmix_to_mono;
use crate::audio::{
    DriftEstimator, Gain, SampleFrame, SampleQueue, VoiceActivityGate, calculate_rms_level,
};
use crate::config::BridgeConfig;
use crate::engine::{AudioEngine, EventId, StopMode};
use crate::pipeline::{Node, Pushable};

pub use channel::{ChannelPhase, FillOutcome, PlaybackChannel, SkipReason};
pub use error::BridgeError;

/// A point-in-time view of a bridge, for logging and debug displays.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeStats {
    pub phase: ChannelPhase,
    pub speaking: bool,
    pub queued_samples: usize,
    pub dropped_samples: u64,
    pub latency: LatencyState,
    pub commanded_frequency: u32,
    pub applied_frequency: Option<u32>,
    /// RMS level (0-100) of the last queued frame.
    pub audio_level: u32,
    pub channel_creations: u64,
}

/// Relays one participant's voice into the audio engine.
pub struct VoiceBridge<E: AudioEngine> {
    engine: Arc<E>,
    config: BridgeConfig,
    queue: SampleQueue,
    drift: DriftEstimator,
    gate: VoiceActivityGate,
    gain: Gain,
    gain_factor: Arc<Mutex<f32>>,
    speaking: Arc<AtomicBool>,
    /// Set by the capture thread on speech without a channel, consumed by
    /// [`process`](Self::process).
    speech_onset: AtomicBool,
    channel_active: AtomicBool,
    destroyed: AtomicBool,
    channel: Mutex<PlaybackChannel<E>>,
    event: Mutex<Option<EventId>>,
    audio_level: AtomicU32,
    channel_creations: AtomicU64,
}

impl<E: AudioEngine> VoiceBridge<E> {
    /// Creates the bridge and its event instance.
    ///
    /// The event is started paused; it is unpaused when the first channel
    /// goes live. An event that cannot be created is logged and the bridge
    /// plays its channel ungrouped.
    pub fn new(engine: Arc<E>, config: BridgeConfig) -> Result<Self> {
        config.validate()?;

        let rate = engine.output_sample_rate();
        info!("Voice bridge starting, engine sample rate: {}", rate);

        let params = DriftParams::from_millis(
            rate,
            config.latency_ms,
            config.drift_ms,
            config.drift_correction_percent,
        );
        let capacity = config
            .max_queue_ms
            .map(|ms| ms_to_samples(rate, ms) as usize);

        let event = Self::setup_event(engine.as_ref(), &config.event_path);

        let speaking = Arc::new(AtomicBool::new(false));
        let gain_factor = Arc::new(Mutex::new(config.initial_gain));

        Ok(Self {
            channel: Mutex::new(PlaybackChannel::new(engine.clone(), config.latency_ms)),
            engine,
            queue: SampleQueue::with_capacity(capacity),
            drift: DriftEstimator::new(params),
            gate: VoiceActivityGate::new(speaking.clone()),
            gain: Gain::new(gain_factor.clone()),
            gain_factor,
            speaking,
            speech_onset: AtomicBool::new(false),
            channel_active: AtomicBool::new(false),
            destroyed: AtomicBool::new(false),
            event: Mutex::new(event),
            audio_level: AtomicU32::new(0),
            channel_creations: AtomicU64::new(0),
            config,
        })
    }

    fn setup_event(engine: &E, path: &str) -> Option<EventId> {
        let event = match engine.create_event_instance(path) {
            Ok(event) => event,
            Err(e) => {
                error!("Failed to create voice event instance '{}': {}", path, e);
                return None;
            }
        };
        if let Err(e) = engine.start_event(event) {
            error!("Failed to start voice event {}: {}", event, e);
        }
        // Held paused until there is audio to play.
        if let Err(e) = engine.set_event_paused(event, true) {
            warn!("Failed to pause voice event {}: {}", event, e);
        }
        info!("Voice event {} started and paused", event);
        Some(event)
    }

    /// Capture-side entry point, called once per voice callback.
    ///
    /// Silent frames are dropped. Speaking frames are scaled by the gain,
    /// queued, and accounted in the drift estimator. Multi-channel input is
    /// averaged down to mono first. When configured, `samples` is zeroed
    /// before returning whatever the outcome.
    pub fn on_voice_frame(&self, samples: &mut [f32], channels: u16) {
        if !self.destroyed.load(Ordering::Acquire) {
            self.handle_frame(samples, channels);
        }
        if self.config.zero_capture_buffer {
            samples.fill(0.0);
        }
    }

    fn handle_frame(&self, samples: &[f32], channels: u16) {
        let frame = match SampleFrame::new(samples.to_vec(), channels) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Dropping malformed voice frame: {}", e);
                return;
            }
        };
        let frame = if channels > 1 {
            SampleFrame::mono(downmix_to_mono(frame.data(), channels as usize))
        } else {
            frame
        };

        let Some(frame) = self.gate.process(frame) else {
            return;
        };
        let Some(frame) = self.gain.process(frame) else {
            return;
        };

        self.audio_level
            .store(calculate_rms_level(frame.data()), Ordering::Relaxed);

        let dropped = self.queue.push_samples(frame.data());
        if dropped > 0 {
            self.drift.record_read(dropped as u64);
        }

        let channel_active = self.channel_active.load(Ordering::Acquire);
        self.drift.record_write(frame.len() as u32, channel_active);
        if !channel_active {
            self.speech_onset.store(true, Ordering::Release);
        }
    }

    /// Update-side entry point, called once per periodic tick.
    ///
    /// Creates the channel on a pending speech onset, applies the drift
    /// estimator's frequency, and tops up the engine's ring.
    pub fn process(&self) -> FillOutcome {
        if self.destroyed.load(Ordering::Acquire) {
            return FillOutcome::Skipped(SkipReason::Destroyed);
        }
        let mut channel = self.channel.lock().unwrap();

        if channel.phase() == ChannelPhase::NoChannel && self.speech_onset.swap(false, Ordering::AcqRel) {
            let event = *self.event.lock().unwrap();
            match channel.activate(event) {
                Ok(()) => {
                    self.channel_active.store(true, Ordering::Release);
                    self.channel_creations.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    error!("Voice channel not created, retrying on next speech: {}", e);
                    return FillOutcome::Failed(e);
                }
            }
        }

        if channel.phase() != ChannelPhase::Active {
            return FillOutcome::Skipped(SkipReason::NoChannel);
        }

        channel
            .apply_frequency(self.drift.commanded_frequency())
            .ok();

        let outcome = channel.fill(&self.queue, &self.drift);
        if let FillOutcome::Written(samples) = outcome {
            debug!(
                "Wrote {} samples, {} still queued",
                samples,
                self.queue.len()
            );
        }
        outcome
    }

    /// Releases the sound and the event instance and discards queued audio.
    ///
    /// Only the first call does anything.
    pub fn teardown(&self) {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("Tearing down voice bridge");

        self.channel.lock().unwrap().destroy();
        self.channel_active.store(false, Ordering::Release);

        if let Some(event) = self.event.lock().unwrap().take() {
            match self.engine.stop_event(event, StopMode::Immediate) {
                Ok(()) => info!("Voice event {} stopped", event),
                Err(e) => error!("Failed to stop voice event {}: {}", event, e),
            }
            match self.engine.release_event(event) {
                Ok(()) => info!("Voice event {} released", event),
                Err(e) => error!("Failed to release voice event {}: {}", event, e),
            }
        }
        self.queue.clear();
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    pub fn phase(&self) -> ChannelPhase {
        self.channel.lock().unwrap().phase()
    }

    pub fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::Acquire)
    }

    pub fn set_gain(&self, gain: f32) {
        *self.gain_factor.lock().unwrap() = gain;
    }

    pub fn gain(&self) -> f32 {
        self.gain.factor()
    }

    pub fn event(&self) -> Option<EventId> {
        *self.event.lock().unwrap()
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn stats(&self) -> BridgeStats {
        let channel = self.channel.lock().unwrap();
        BridgeStats {
            phase: channel.phase(),
            speaking: self.is_speaking(),
            queued_samples: self.queue.len(),
            dropped_samples: self.queue.dropped(),
            latency: self.drift.latency_state(),
            commanded_frequency: self.drift.commanded_frequency(),
            applied_frequency: channel.applied_frequency(),
            audio_level: self.audio_level.load(Ordering::Relaxed),
            channel_creations: self.channel_creations.load(Ordering::Relaxed),
        }
    }
}

impl<E: AudioEngine> Pushable<SampleFrame> for VoiceBridge<E> {
    fn push(&self, input: SampleFrame) {
        let channels = input.channels();
        let mut data = input.into_inner();
        self.on_voice_frame(&mut data, channels);
    }
}

impl<E: AudioEngine> Drop for VoiceBridge<E> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{
        ChannelId, EngineError, LockedWindow, SoftwareEngine, SoundId, SoundInfo,
    };
    use std::sync::atomic::AtomicUsize;

    const RATE: u32 = 48000;

    /// Wraps [`SoftwareEngine`], counting releases and injecting failures.
    struct RecordingEngine {
        inner: SoftwareEngine,
        fail_create: AtomicBool,
        fail_unlock: AtomicBool,
        sound_creations: AtomicUsize,
        sound_releases: AtomicUsize,
        event_stops: AtomicUsize,
        event_releases: AtomicUsize,
    }

    impl RecordingEngine {
        fn new() -> Self {
            Self {
                inner: SoftwareEngine::new(RATE),
                fail_create: AtomicBool::new(false),
                fail_unlock: AtomicBool::new(false),
                sound_creations: AtomicUsize::new(0),
                sound_releases: AtomicUsize::new(0),
                event_stops: AtomicUsize::new(0),
                event_releases: AtomicUsize::new(0),
            }
        }

        fn advance(&self, frames: usize) {
            let mut out = vec![0.0; frames];
            self.inner.render(&mut out, 1);
        }
    }

    impl AudioEngine for RecordingEngine {
        fn output_sample_rate(&self) -> u32 {
            self.inner.output_sample_rate()
        }

        fn create_event_instance(&self, path: &str) -> Result<EventId, EngineError> {
            self.inner.create_event_instance(path)
        }

        fn start_event(&self, event: EventId) -> Result<(), EngineError> {
            self.inner.start_event(event)
        }

        fn set_event_paused(&self, event: EventId, paused: bool) -> Result<(), EngineError> {
            self.inner.set_event_paused(event, paused)
        }

        fn stop_event(&self, event: EventId, mode: StopMode) -> Result<(), EngineError> {
            self.event_stops.fetch_add(1, Ordering::SeqCst);
            self.inner.stop_event(event, mode)
        }

        fn release_event(&self, event: EventId) -> Result<(), EngineError> {
            self.event_releases.fetch_add(1, Ordering::SeqCst);
            self.inner.release_event(event)
        }

        fn create_streaming_sound(&self, info: &SoundInfo) -> Result<SoundId, EngineError> {
            if self.fail_create.load(Ordering::SeqCst) {
                return Err(EngineError::Device("out of sounds".to_string()));
            }
            self.sound_creations.fetch_add(1, Ordering::SeqCst);
            self.inner.create_streaming_sound(info)
        }

        fn release_sound(&self, sound: SoundId) -> Result<(), EngineError> {
            self.sound_releases.fetch_add(1, Ordering::SeqCst);
            self.inner.release_sound(sound)
        }

        fn play_sound(
            &self,
            sound: SoundId,
            event: Option<EventId>,
            paused: bool,
        ) -> Result<ChannelId, EngineError> {
            self.inner.play_sound(sound, event, paused)
        }

        fn set_frequency(&self, channel: ChannelId, hz: f32) -> Result<(), EngineError> {
            self.inner.set_frequency(channel, hz)
        }

        fn read_cursor_bytes(&self, channel: ChannelId) -> Result<u32, EngineError> {
            self.inner.read_cursor_bytes(channel)
        }

        fn lock(
            &self,
            sound: SoundId,
            offset_bytes: u32,
            length_bytes: u32,
        ) -> Result<LockedWindow, EngineError> {
            self.inner.lock(sound, offset_bytes, length_bytes)
        }

        fn unlock(&self, window: LockedWindow) -> Result<(), EngineError> {
            let result = self.inner.unlock(window);
            if self.fail_unlock.load(Ordering::SeqCst) {
                return Err(EngineError::Device("unlock rejected".to_string()));
            }
            result
        }
    }

    fn bridge() -> (Arc<RecordingEngine>, VoiceBridge<RecordingEngine>) {
        let engine = Arc::new(RecordingEngine::new());
        let bridge = VoiceBridge::new(engine.clone(), BridgeConfig::default()).unwrap();
        (engine, bridge)
    }

    fn voice(len: usize) -> Vec<f32> {
        (0..len).map(|i| ((i % 50) as f32 + 1.0) / 100.0).collect()
    }

    #[test]
    fn test_event_starts_paused() {
        let (engine, bridge) = bridge();
        let event = bridge.event().unwrap();
        assert_eq!(engine.inner.event_audible(event), Some(false));
        assert_eq!(bridge.phase(), ChannelPhase::NoChannel);
    }

    #[test]
    fn test_silence_never_queued_or_creates_channel() {
        let (engine, bridge) = bridge();

        for _ in 0..10 {
            let mut frame = vec![0.0; 480];
            bridge.on_voice_frame(&mut frame, 1);
            bridge.process();
        }

        let stats = bridge.stats();
        assert_eq!(stats.queued_samples, 0);
        assert_eq!(stats.latency.total_samples_written, 0);
        assert_eq!(stats.phase, ChannelPhase::NoChannel);
        assert_eq!(engine.sound_creations.load(Ordering::SeqCst), 0);
        assert!(!bridge.is_speaking());
    }

    #[test]
    fn test_channel_created_at_44100_with_odd_latency() {
        let engine = Arc::new(SoftwareEngine::new(44100));
        let config = BridgeConfig {
            latency_ms: 25,
            ..BridgeConfig::default()
        };
        let bridge = VoiceBridge::new(engine.clone(), config).unwrap();

        for _ in 0..5 {
            bridge.on_voice_frame(&mut voice(441), 1);
            assert!(!matches!(bridge.process(), FillOutcome::Failed(_)));
            let mut out = vec![0.0; 441];
            engine.render(&mut out, 1);
        }

        assert_eq!(bridge.phase(), ChannelPhase::Active);
        let sound = bridge.channel.lock().unwrap().sound_id().unwrap();
        assert_eq!(engine.sound_data(sound).unwrap().len(), 1102);
    }

    #[test]
    fn test_speech_onset_creates_channel_once() {
        let (engine, bridge) = bridge();

        for _ in 0..20 {
            let mut frame = voice(480);
            bridge.on_voice_frame(&mut frame, 1);
            bridge.process();
            engine.advance(480);
        }

        let stats = bridge.stats();
        assert_eq!(stats.phase, ChannelPhase::Active);
        assert_eq!(stats.channel_creations, 1);
        assert_eq!(engine.sound_creations.load(Ordering::SeqCst), 1);
        let event = bridge.event().unwrap();
        assert_eq!(engine.inner.event_audible(event), Some(true));
    }

    #[test]
    fn test_silence_after_speech_keeps_channel() {
        let (engine, bridge) = bridge();
        let mut frame = voice(480);
        bridge.on_voice_frame(&mut frame, 1);
        bridge.process();

        for _ in 0..5 {
            let mut silent = vec![0.0; 480];
            bridge.on_voice_frame(&mut silent, 1);
            bridge.process();
        }
        let mut frame = voice(480);
        bridge.on_voice_frame(&mut frame, 1);
        bridge.process();

        assert_eq!(bridge.phase(), ChannelPhase::Active);
        assert_eq!(engine.sound_creations.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_capture_buffer_zeroed() {
        let (_engine, bridge) = bridge();
        let mut frame = voice(64);
        bridge.on_voice_frame(&mut frame, 1);
        assert!(frame.iter().all(|&s| s == 0.0));
        assert_eq!(bridge.stats().queued_samples, 64);
    }

    #[test]
    fn test_capture_buffer_kept_when_configured() {
        let engine = Arc::new(RecordingEngine::new());
        let config = BridgeConfig {
            zero_capture_buffer: false,
            ..BridgeConfig::default()
        };
        let bridge = VoiceBridge::new(engine, config).unwrap();

        let original = voice(64);
        let mut frame = original.clone();
        bridge.on_voice_frame(&mut frame, 1);
        assert_eq!(frame, original);
    }

    #[test]
    fn test_samples_reach_engine_ring_in_order() {
        let (engine, bridge) = bridge();
        let f1 = voice(300);
        let f2: Vec<f32> = voice(180).iter().map(|s| -s).collect();

        bridge.on_voice_frame(&mut f1.clone(), 1);
        bridge.on_voice_frame(&mut f2.clone(), 1);
        assert_eq!(bridge.process(), FillOutcome::Skipped(SkipReason::NothingToFill));

        engine.advance(480);
        assert_eq!(bridge.process(), FillOutcome::Written(480));

        let sound = bridge.channel.lock().unwrap().sound_id().unwrap();
        let ring = engine.inner.sound_data(sound).unwrap();
        let expected: Vec<f32> = f1.iter().chain(f2.iter()).copied().collect();
        assert_eq!(&ring[..480], expected.as_slice());
        assert_eq!(bridge.stats().latency.total_samples_read, 480);
    }

    #[test]
    fn test_gain_applied_before_queue() {
        let (engine, bridge) = bridge();
        bridge.set_gain(0.5);
        assert_eq!(bridge.gain(), 0.5);

        let mut frame = vec![0.8; 480];
        bridge.on_voice_frame(&mut frame, 1);
        bridge.process();
        engine.advance(480);
        assert_eq!(bridge.process(), FillOutcome::Written(480));

        let sound = bridge.channel.lock().unwrap().sound_id().unwrap();
        let ring = engine.inner.sound_data(sound).unwrap();
        assert!(ring[..480].iter().all(|&s| s == 0.4));
    }

    #[test]
    fn test_stereo_frames_are_downmixed() {
        let (_engine, bridge) = bridge();
        let mut frame = vec![0.5, 0.25, 0.5, 0.25];
        bridge.on_voice_frame(&mut frame, 2);
        assert_eq!(bridge.stats().queued_samples, 2);
    }

    #[test]
    fn test_malformed_frame_dropped() {
        let (_engine, bridge) = bridge();
        let mut frame = vec![0.5; 3];
        bridge.on_voice_frame(&mut frame, 2);
        assert_eq!(bridge.stats().queued_samples, 0);
        assert!(frame.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_creation_failure_retried_on_next_onset() {
        let (engine, bridge) = bridge();
        engine.fail_create.store(true, Ordering::SeqCst);

        bridge.on_voice_frame(&mut voice(480), 1);
        assert!(matches!(
            bridge.process(),
            FillOutcome::Failed(BridgeError::ResourceCreationFailed(_))
        ));
        assert_eq!(bridge.phase(), ChannelPhase::NoChannel);

        // No new onset, no retry.
        engine.fail_create.store(false, Ordering::SeqCst);
        assert_eq!(bridge.process(), FillOutcome::Skipped(SkipReason::NoChannel));

        bridge.on_voice_frame(&mut voice(480), 1);
        bridge.process();
        assert_eq!(bridge.phase(), ChannelPhase::Active);
        assert_eq!(bridge.stats().channel_creations, 1);
    }

    #[test]
    fn test_unlock_failure_is_absorbed() {
        let (engine, bridge) = bridge();
        bridge.on_voice_frame(&mut voice(960), 1);
        bridge.process();
        engine.advance(480);

        engine.fail_unlock.store(true, Ordering::SeqCst);
        assert!(matches!(
            bridge.process(),
            FillOutcome::Failed(BridgeError::LockUnlockFailed(_))
        ));

        engine.fail_unlock.store(false, Ordering::SeqCst);
        assert_eq!(bridge.process(), FillOutcome::Written(480));
        assert_eq!(bridge.phase(), ChannelPhase::Active);
    }

    #[test]
    fn test_drift_frequency_applied_to_channel() {
        let (engine, bridge) = bridge();
        bridge.on_voice_frame(&mut voice(480), 1);
        bridge.process();

        // The channel is live, so this write produces a decision. The backlog
        // is far below target, so playback is slowed.
        bridge.on_voice_frame(&mut voice(480), 1);
        bridge.process();

        let stats = bridge.stats();
        assert_eq!(stats.commanded_frequency, 47760);
        assert_eq!(stats.applied_frequency, Some(47760));
        let channel = bridge.channel.lock().unwrap().channel_id().unwrap();
        assert_eq!(engine.inner.channel_frequency(channel), Some(47760.0));
    }

    #[test]
    fn test_teardown_releases_once() {
        let (engine, bridge) = bridge();
        bridge.on_voice_frame(&mut voice(480), 1);
        bridge.process();
        assert_eq!(bridge.phase(), ChannelPhase::Active);

        bridge.teardown();
        bridge.teardown();
        drop(bridge);

        assert_eq!(engine.sound_releases.load(Ordering::SeqCst), 1);
        assert_eq!(engine.event_stops.load(Ordering::SeqCst), 1);
        assert_eq!(engine.event_releases.load(Ordering::SeqCst), 1);
        assert_eq!(engine.inner.sound_count(), 0);
        assert_eq!(engine.inner.event_count(), 0);
    }

    #[test]
    fn test_teardown_without_channel_releases_event_only() {
        let (engine, bridge) = bridge();
        bridge.teardown();

        assert_eq!(engine.sound_releases.load(Ordering::SeqCst), 0);
        assert_eq!(engine.event_releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_no_reactivation_after_teardown() {
        let (engine, bridge) = bridge();
        bridge.teardown();

        let mut frame = voice(480);
        bridge.on_voice_frame(&mut frame, 1);
        assert_eq!(bridge.process(), FillOutcome::Skipped(SkipReason::Destroyed));
        assert!(frame.iter().all(|&s| s == 0.0));
        assert_eq!(bridge.stats().queued_samples, 0);
        assert_eq!(engine.sound_creations.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_queue_cap_counts_drops_as_read() {
        let engine = Arc::new(RecordingEngine::new());
        let config = BridgeConfig {
            latency_ms: 10,
            max_queue_ms: Some(10),
            ..BridgeConfig::default()
        };
        let bridge = VoiceBridge::new(engine, config).unwrap();

        for _ in 0..3 {
            bridge.on_voice_frame(&mut voice(480), 1);
        }
        let stats = bridge.stats();
        assert_eq!(stats.queued_samples, 480);
        assert_eq!(stats.dropped_samples, 960);
        assert_eq!(stats.latency.instantaneous_latency(), 480);
    }

    #[test]
    fn test_concurrent_capture_and_update() {
        let engine = Arc::new(RecordingEngine::new());
        let bridge = Arc::new(VoiceBridge::new(engine.clone(), BridgeConfig::default()).unwrap());

        let producer = bridge.clone();
        let capture = std::thread::spawn(move || {
            for _ in 0..200 {
                let mut frame = voice(480);
                producer.on_voice_frame(&mut frame, 1);
            }
        });

        for _ in 0..200 {
            bridge.process();
            engine.advance(480);
        }
        capture.join().unwrap();

        let stats = bridge.stats();
        assert_eq!(stats.channel_creations, 1);
        assert_eq!(stats.latency.total_samples_written, 200 * 480);
        assert!(stats.latency.total_samples_read <= stats.latency.total_samples_written);
    }
}
