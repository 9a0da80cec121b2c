//! Relays decoded voice-chat audio into a game audio engine.
//!
//! Each remote participant gets a [`bridge::VoiceBridge`] that queues their
//! speech, streams it into a looping engine sound, and nudges the sound's
//! playback rate so the voice clock and the engine clock never drift apart.

pub mod audio;
pub mod bridge;
pub mod config;
pub mod engine;
pub mod io;
pub mod pipeline;
pub mod session;
pub mod sim;
