//! Audio buffer implementations.
//!
//! - [`SampleQueue`] - The jitter buffer between the voice source and the playback channel

pub mod sample_queue;

pub use sample_queue::{QueueError, SampleQueue};
