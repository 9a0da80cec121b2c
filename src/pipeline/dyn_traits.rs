//! Object-safe push trait.
//!
//! Capture devices hold an `Arc<dyn Pushable<SampleFrame>>` and hand every
//! callback buffer to it without knowing what sits behind: a
//! [`VoiceBridge`](crate::bridge::VoiceBridge), a bare
//! [`SampleQueue`](crate::audio::SampleQueue), or a test recorder.

use std::sync::Arc;

/// Passive receiver - can receive pushed data.
///
/// When data is pushed, the implementation decides what to do with it:
/// - Gate, scale and queue it (for [`VoiceBridge`](crate::bridge::VoiceBridge))
/// - Store it in a buffer (for [`SampleQueue`](crate::audio::SampleQueue))
pub trait Pushable<T>: Send + Sync {
    fn push(&self, input: T);
}

impl<T: Send + Sync> Pushable<T> for Arc<dyn Pushable<T>> {
    fn push(&self, input: T) {
        (**self).push(input)
    }
}
