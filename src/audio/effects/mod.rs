//! Frame processing stages.
//!
//! These implement [`Node`](crate::pipeline::Node) and run on the capture
//! thread, before a frame reaches the sample queue.

pub mod gain;
pub mod gate;
pub mod level_meter;

pub use gain::Gain;
pub use gate::{VoiceActivityGate, is_speaking};
pub use level_meter::calculate_rms_level;
