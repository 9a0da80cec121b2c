//! Clock drift estimation between the voice source and the playback engine.
//!
//! The two sides run on independent clocks. Rather than sharing one, the
//! estimator counts samples in and out, low-pass filters the difference, and
//! commands the playback channel to run a fraction of a percent fast or slow
//! until the backlog re-centres on the target latency.

use std::sync::atomic::{AtomicI32, AtomicU32, AtomicU64, Ordering};

use crossbeam::utils::CachePadded;
use tracing::debug;

const SMOOTHING_KEEP: f32 = 0.93;
const SMOOTHING_GAIN: f32 = 0.03;

/// Sentinel for "no write observed yet".
pub const NO_MINIMUM: u32 = u32::MAX;

/// Fixed parameters of one estimator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriftParams {
    /// Nominal playback rate in Hz.
    pub base_rate: u32,
    pub target_latency_samples: u32,
    pub drift_threshold_samples: u32,
    /// Rate nudge applied outside the dead band, in percent of `base_rate`.
    pub correction_percent: f64,
}

impl DriftParams {
    /// Derives sample counts from millisecond settings at `base_rate`.
    pub fn from_millis(base_rate: u32, latency_ms: u32, drift_ms: u32, correction_percent: f64) -> Self {
        Self {
            base_rate,
            target_latency_samples: ms_to_samples(base_rate, latency_ms),
            drift_threshold_samples: ms_to_samples(base_rate, drift_ms),
            correction_percent,
        }
    }
}

pub fn ms_to_samples(rate: u32, ms: u32) -> u32 {
    (rate as u64 * ms as u64 / 1000) as u32
}

/// A point-in-time copy of the estimator's bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencyState {
    pub total_samples_written: u64,
    pub total_samples_read: u64,
    /// [`NO_MINIMUM`] until the first non-empty write.
    pub minimum_samples_written_per_callback: u32,
    pub target_latency_samples: u32,
    pub adjusted_latency_samples: u32,
    pub smoothed_actual_latency: i32,
    pub drift_threshold_samples: u32,
}

impl LatencyState {
    pub fn minimum_written(&self) -> Option<u32> {
        (self.minimum_samples_written_per_callback != NO_MINIMUM)
            .then_some(self.minimum_samples_written_per_callback)
    }

    /// Samples written but not yet read. Negative after an underrun.
    pub fn instantaneous_latency(&self) -> i64 {
        self.total_samples_written as i64 - self.total_samples_read as i64
    }
}

/// Picks the playback frequency for a given smoothed backlog.
///
/// Below the dead band the channel is slowed so the backlog can build up;
/// above it the channel is sped up to drain it.
pub fn playback_frequency(
    base_rate: u32,
    smoothed_latency: i32,
    adjusted_latency: u32,
    threshold: u32,
    correction_percent: f64,
) -> u32 {
    let correction = (base_rate as f64 * (correction_percent / 100.0)) as u32;
    let smoothed = smoothed_latency as i64;
    let low = adjusted_latency as i64 - threshold as i64;
    let high = adjusted_latency as i64 + threshold as i64;

    if smoothed < low {
        base_rate.saturating_sub(correction)
    } else if smoothed > high {
        base_rate.saturating_add(correction)
    } else {
        base_rate
    }
}

/// Tracks cumulative samples written vs. read and decides rate correction.
///
/// The write side is driven from the capture callback and the read side from
/// the update loop; every field is an atomic so the two never contend on a
/// lock. Each field has a single writer.
pub struct DriftEstimator {
    params: DriftParams,
    total_written: CachePadded<AtomicU64>,
    total_read: CachePadded<AtomicU64>,
    minimum_written: AtomicU32,
    adjusted_latency: AtomicU32,
    smoothed_latency: AtomicI32,
    commanded_frequency: AtomicU32,
}

impl DriftEstimator {
    pub fn new(params: DriftParams) -> Self {
        Self {
            params,
            total_written: CachePadded::new(AtomicU64::new(0)),
            total_read: CachePadded::new(AtomicU64::new(0)),
            minimum_written: AtomicU32::new(NO_MINIMUM),
            adjusted_latency: AtomicU32::new(params.target_latency_samples),
            smoothed_latency: AtomicI32::new(0),
            commanded_frequency: AtomicU32::new(params.base_rate),
        }
    }

    pub fn params(&self) -> &DriftParams {
        &self.params
    }

    /// Accounts for `samples` freshly queued.
    ///
    /// When `channel_active` is set the playback frequency is re-decided and
    /// returned; otherwise the previous command stands.
    pub fn record_write(&self, samples: u32, channel_active: bool) -> Option<u32> {
        let written = self.total_written.fetch_add(samples as u64, Ordering::AcqRel) + samples as u64;

        if samples != 0 && samples < self.minimum_written.load(Ordering::Acquire) {
            self.minimum_written.store(samples, Ordering::Release);
            let adjusted = samples.max(self.params.target_latency_samples);
            self.adjusted_latency.store(adjusted, Ordering::Release);
            debug!(
                "DriftEstimator: minimum write {} -> adjusted latency {}",
                samples, adjusted
            );
        }

        let read = self.total_read.load(Ordering::Acquire);
        let latency = written as i64 - read as i64;
        let previous = self.smoothed_latency.load(Ordering::Acquire);
        let smoothed = (SMOOTHING_KEEP * previous as f32 + SMOOTHING_GAIN * latency as f32) as i32;
        self.smoothed_latency.store(smoothed, Ordering::Release);

        if !channel_active {
            return None;
        }

        let frequency = playback_frequency(
            self.params.base_rate,
            smoothed,
            self.adjusted_latency.load(Ordering::Acquire),
            self.params.drift_threshold_samples,
            self.params.correction_percent,
        );
        let previous_frequency = self.commanded_frequency.swap(frequency, Ordering::AcqRel);
        if previous_frequency != frequency {
            debug!(
                "DriftEstimator: frequency {} -> {} (smoothed latency {})",
                previous_frequency, frequency, smoothed
            );
        }
        Some(frequency)
    }

    /// Accounts for `samples` that left the queue (played or dropped).
    pub fn record_read(&self, samples: u64) {
        self.total_read.fetch_add(samples, Ordering::AcqRel);
    }

    /// The frequency last decided while a channel existed, or the base rate.
    pub fn commanded_frequency(&self) -> u32 {
        self.commanded_frequency.load(Ordering::Acquire)
    }

    pub fn latency_state(&self) -> LatencyState {
        LatencyState {
            total_samples_written: self.total_written.load(Ordering::Acquire),
            total_samples_read: self.total_read.load(Ordering::Acquire),
            minimum_samples_written_per_callback: self.minimum_written.load(Ordering::Acquire),
            target_latency_samples: self.params.target_latency_samples,
            adjusted_latency_samples: self.adjusted_latency.load(Ordering::Acquire),
            smoothed_actual_latency: self.smoothed_latency.load(Ordering::Acquire),
            drift_threshold_samples: self.params.drift_threshold_samples,
        }
    }
}
