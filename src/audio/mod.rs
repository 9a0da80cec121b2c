//! Audio data types, buffers and processing stages.
//!
//! # Data Types
//! - [`AudioSample`] - Device sample formats and their conversion to `f32`
//! - [`SampleFrame`] - One voice callback's worth of PCM
//!
//! # Buffers
//! - [`SampleQueue`] - FIFO jitter buffer between voice source and engine
//!
//! # Drift
//! - [`DriftEstimator`] - Written/read accounting and playback-rate correction
//!
//! # Effects
//! - [`effects::gate`] - Voice activity gate
//! - [`effects::gain`] - Per-participant volume
//! - [`effects::level_meter`] - Audio level metering

pub mod buffers;
pub mod drift;
pub mod effects;
pub mod frame;
pub mod sample;

pub use buffers::{QueueError, SampleQueue};
pub use drift::{DriftEstimator, DriftParams, LatencyState};
pub use effects::{Gain, VoiceActivityGate, calculate_rms_level, is_speaking};
pub use frame::SampleFrame;
pub use sample::AudioSample;
