//! Voice activity gate.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::audio::frame::SampleFrame;
use crate::pipeline::Node;

/// True if any sample is non-zero.
///
/// Voice SDKs hand out exact zeros while a participant is silent, so no energy
/// threshold is needed.
pub fn is_speaking(samples: &[f32]) -> bool {
    samples.iter().any(|&s| s != 0.0)
}

/// Passes speaking frames and swallows silent ones.
///
/// The speech flag of the most recent frame is published through the shared
/// `AtomicBool` so the orchestrator can read it without holding the frame.
pub struct VoiceActivityGate {
    speaking: Arc<AtomicBool>,
}

impl VoiceActivityGate {
    pub fn new(speaking: Arc<AtomicBool>) -> Self {
        Self { speaking }
    }

    pub fn is_open(&self) -> bool {
        self.speaking.load(Ordering::Acquire)
    }
}

impl Node for VoiceActivityGate {
    type Input = SampleFrame;
    type Output = SampleFrame;

    fn process(&self, input: Self::Input) -> Option<Self::Output> {
        let speaking = is_speaking(input.data());
        self.speaking.store(speaking, Ordering::Release);
        speaking.then_some(input)
    }
}
