//! Device sample formats and their conversion to the relay's `f32` PCM.
//!
//! The voice path is mono `f32` end to end, but capture devices deliver
//! whatever format they were opened with.

use std::fmt::Debug;

use num_traits::{Bounded, ToPrimitive};

pub trait AudioSample: Copy + Send + Sync + PartialOrd + ToPrimitive + Bounded + Debug + 'static {
    /// The value that encodes silence (mid-scale for unsigned formats).
    fn silence() -> Self;

    /// Normalized value in `-1.0..=1.0`.
    fn to_voice(self) -> f32;

    fn from_voice(value: f32) -> Self;
}

impl AudioSample for f32 {
    fn silence() -> Self {
        0.0
    }

    fn to_voice(self) -> f32 {
        self
    }

    fn from_voice(value: f32) -> Self {
        value.clamp(-1.0, 1.0)
    }
}

impl AudioSample for i16 {
    fn silence() -> Self {
        0
    }

    fn to_voice(self) -> f32 {
        self as f32 / i16::MAX as f32
    }

    fn from_voice(value: f32) -> Self {
        (value.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
    }
}

impl AudioSample for i32 {
    fn silence() -> Self {
        0
    }

    fn to_voice(self) -> f32 {
        (self as f64 / i32::MAX as f64) as f32
    }

    fn from_voice(value: f32) -> Self {
        (value.clamp(-1.0, 1.0) as f64 * i32::MAX as f64) as i32
    }
}

impl AudioSample for u16 {
    fn silence() -> Self {
        32768
    }

    fn to_voice(self) -> f32 {
        (self as f32 - 32768.0) / 32768.0
    }

    fn from_voice(value: f32) -> Self {
        ((value.clamp(-1.0, 1.0) * 32767.0) + 32768.0) as u16
    }
}

/// Averages interleaved `channels`-wide samples down to mono `f32`.
pub fn downmix_to_mono<Sample: AudioSample>(data: &[Sample], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return data.iter().map(|s| s.to_voice()).collect();
    }
    data.chunks_exact(channels)
        .map(|frame| frame.iter().map(|s| s.to_voice()).sum::<f32>() / channels as f32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_maps_to_zero() {
        assert_eq!(f32::silence().to_voice(), 0.0);
        assert_eq!(i16::silence().to_voice(), 0.0);
        assert_eq!(u16::silence().to_voice(), 0.0);
    }

    #[test]
    fn test_i16_full_scale() {
        assert_eq!(i16::MAX.to_voice(), 1.0);
        assert_eq!(i16::from_voice(2.0), i16::MAX);
    }

    #[test]
    fn test_downmix_stereo() {
        let stereo = [0.5f32, -0.5, 1.0, 0.0];
        assert_eq!(downmix_to_mono(&stereo, 2), vec![0.0, 0.5]);
    }

    #[test]
    fn test_downmix_mono_passthrough() {
        let mono = [0i16, i16::MAX];
        assert_eq!(downmix_to_mono(&mono, 1), vec![0.0, 1.0]);
    }
}
