//! Per-participant gain.

use std::sync::{Arc, Mutex};

use crate::audio::frame::SampleFrame;
use crate::pipeline::Node;

/// Scales a participant's voice before it is queued.
///
/// The factor lives behind an `Arc<Mutex<f32>>` shared with the owning
/// bridge, so the session can change one participant's volume mid-sentence
/// and the next frame picks it up. A factor of exactly 1.0 leaves the frame
/// untouched.
pub struct Gain {
    factor: Arc<Mutex<f32>>,
}

impl Gain {
    pub fn new(factor: Arc<Mutex<f32>>) -> Self {
        Self { factor }
    }

    pub fn factor(&self) -> f32 {
        *self.factor.lock().unwrap()
    }
}

impl Node for Gain {
    type Input = SampleFrame;
    type Output = SampleFrame;

    fn process(&self, mut input: Self::Input) -> Option<Self::Output> {
        let factor = self.factor();
        if factor != 1.0 {
            for sample in input.data_mut() {
                *sample *= factor;
            }
        }
        Some(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gain_scales_samples() {
        let factor = Arc::new(Mutex::new(0.5f32));
        let gain = Gain::new(factor.clone());

        let out = gain.process(SampleFrame::mono(vec![1.0, -0.5])).unwrap();
        assert_eq!(out.data(), &[0.5, -0.25]);

        *factor.lock().unwrap() = 2.0;
        let out = gain.process(SampleFrame::mono(vec![0.25])).unwrap();
        assert_eq!(out.data(), &[0.5]);
    }
}
