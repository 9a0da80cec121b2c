//! Core processing traits.
//!
//! - [`Node`] - A stage that transforms a voice frame on its way to the relay queue
//!
//! For the push side see [`Pushable`](super::Pushable).

/// A processing stage that transforms input to output.
///
/// Stages sit between the capture callback and the sample queue: they receive
/// a frame, optionally rewrite it, and either hand it on or swallow it.
pub trait Node: Send + Sync {
    type Input;
    type Output;

    /// Process input data and optionally produce output.
    ///
    /// Returns `None` if the stage decided the input should go no further
    /// (for example a silent frame reaching the voice activity gate).
    fn process(&self, input: Self::Input) -> Option<Self::Output>;
}
