//! Hardware I/O.
//!
//! - [`AudioInput`] - Microphone capture via cpal, feeding any [`Pushable`](crate::pipeline::Pushable)
//! - [`AudioOutput`] - Speaker playback of a [`SoftwareEngine`](crate::engine::software::SoftwareEngine) mix via cpal

pub mod audio;

pub use audio::{AudioInput, AudioOutput, DeviceList, list_devices, output_sample_rate};
