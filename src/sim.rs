//! Offline relay simulation.
//!
//! Feeds a [`VoiceBridge`] from a synthetic talker whose clock runs slightly
//! off the engine's and whose frames arrive with random delay, while a
//! [`SoftwareEngine`] plays the ring back in virtual time. Useful for seeing
//! how the drift correction holds the backlog without any audio hardware.

use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::audio::drift::ms_to_samples;
use crate::bridge::{FillOutcome, VoiceBridge};
use crate::config::BridgeConfig;
use crate::engine::SoftwareEngine;

const TONE_HZ: f64 = 220.0;
const TONE_AMPLITUDE: f64 = 0.25;

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationParams {
    /// Mix rate of the simulated engine.
    pub engine_rate: u32,
    pub duration_ms: u32,
    /// Length of one voice callback.
    pub frame_ms: u32,
    /// Period of the update loop.
    pub tick_ms: u32,
    /// Talker clock relative to the engine clock. `1.002` delivers 0.2% more
    /// audio per second than the engine plays at its base rate.
    pub clock_ratio: f64,
    /// Upper bound of the random delivery delay of each frame.
    pub jitter_ms: u32,
    pub seed: u64,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            engine_rate: 48000,
            duration_ms: 30_000,
            frame_ms: 20,
            tick_ms: 10,
            clock_ratio: 1.0,
            jitter_ms: 0,
            seed: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationReport {
    pub ticks: u64,
    pub frames_delivered: u64,
    pub samples_written: u64,
    pub written_cycles: u64,
    pub skipped_cycles: u64,
    pub failed_cycles: u64,
    pub max_queue_samples: usize,
    pub mean_queue_samples: f64,
    pub final_queue_samples: usize,
    pub dropped_samples: u64,
    pub min_frequency: u32,
    pub max_frequency: u32,
    pub final_frequency: u32,
    pub smoothed_latency: i32,
}

impl fmt::Display for SimulationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ticks:              {}", self.ticks)?;
        writeln!(f, "frames delivered:   {}", self.frames_delivered)?;
        writeln!(
            f,
            "fill cycles:        {} written, {} skipped, {} failed",
            self.written_cycles, self.skipped_cycles, self.failed_cycles
        )?;
        writeln!(f, "samples written:    {}", self.samples_written)?;
        writeln!(
            f,
            "queue depth:        max {}, mean {:.1}, final {}",
            self.max_queue_samples, self.mean_queue_samples, self.final_queue_samples
        )?;
        writeln!(f, "dropped samples:    {}", self.dropped_samples)?;
        writeln!(
            f,
            "frequency:          min {} Hz, max {} Hz, final {} Hz",
            self.min_frequency, self.max_frequency, self.final_frequency
        )?;
        write!(f, "smoothed latency:   {} samples", self.smoothed_latency)
    }
}

/// Produces tone frames on the talker's clock with jittered, in-order
/// delivery times, measured in engine samples.
struct Talker {
    rng: StdRng,
    frame_samples: usize,
    interval: f64,
    jitter_samples: u32,
    next_nominal: f64,
    next_delivery: f64,
    phase: f64,
    phase_step: f64,
}

impl Talker {
    fn new(params: &SimulationParams) -> Self {
        let frame_samples = ms_to_samples(params.engine_rate, params.frame_ms) as usize;
        let mut talker = Self {
            rng: StdRng::seed_from_u64(params.seed),
            frame_samples,
            interval: frame_samples as f64 / params.clock_ratio,
            jitter_samples: ms_to_samples(params.engine_rate, params.jitter_ms),
            next_nominal: 0.0,
            next_delivery: 0.0,
            phase: 0.0,
            phase_step: std::f64::consts::TAU * TONE_HZ / params.engine_rate as f64,
        };
        talker.next_delivery = talker.delay(0.0);
        talker
    }

    fn delay(&mut self, nominal: f64) -> f64 {
        if self.jitter_samples == 0 {
            nominal
        } else {
            nominal + self.rng.gen_range(0..=self.jitter_samples) as f64
        }
    }

    /// The next frame if it has arrived by `now`.
    fn poll(&mut self, now: f64) -> Option<Vec<f32>> {
        if self.next_delivery > now {
            return None;
        }
        let frame = (0..self.frame_samples)
            .map(|_| {
                let sample = (TONE_AMPLITUDE * self.phase.sin()) as f32;
                self.phase = (self.phase + self.phase_step) % std::f64::consts::TAU;
                sample
            })
            .collect();

        self.next_nominal += self.interval;
        let delivery = self.delay(self.next_nominal);
        self.next_delivery = delivery.max(self.next_delivery);
        Some(frame)
    }
}

/// Runs the bridge against a virtual-time engine for `params.duration_ms`.
pub fn run_simulation(config: BridgeConfig, params: &SimulationParams) -> Result<SimulationReport> {
    if params.engine_rate == 0 || params.frame_ms == 0 || params.tick_ms == 0 {
        anyhow::bail!("engine_rate, frame_ms and tick_ms must be greater than zero");
    }
    if !(params.clock_ratio.is_finite() && params.clock_ratio > 0.0) {
        anyhow::bail!("clock_ratio must be positive, got {}", params.clock_ratio);
    }

    let engine = Arc::new(SoftwareEngine::new(params.engine_rate));
    let bridge = VoiceBridge::new(engine.clone(), config)?;
    let mut talker = Talker::new(params);

    let tick_samples = ms_to_samples(params.engine_rate, params.tick_ms) as usize;
    let total_ticks = (params.duration_ms / params.tick_ms) as u64;
    let mut output = vec![0.0f32; tick_samples];

    info!(
        "Simulating {} ticks (clock ratio {}, jitter {} ms)",
        total_ticks, params.clock_ratio, params.jitter_ms
    );

    let mut report = SimulationReport {
        ticks: total_ticks,
        frames_delivered: 0,
        samples_written: 0,
        written_cycles: 0,
        skipped_cycles: 0,
        failed_cycles: 0,
        max_queue_samples: 0,
        mean_queue_samples: 0.0,
        final_queue_samples: 0,
        dropped_samples: 0,
        min_frequency: u32::MAX,
        max_frequency: 0,
        final_frequency: params.engine_rate,
        smoothed_latency: 0,
    };
    let mut queue_sum = 0u64;

    for tick in 0..total_ticks {
        let now = (tick * tick_samples as u64) as f64;
        while let Some(mut frame) = talker.poll(now) {
            bridge.on_voice_frame(&mut frame, 1);
            report.frames_delivered += 1;
        }

        match bridge.process() {
            FillOutcome::Written(samples) => {
                report.written_cycles += 1;
                report.samples_written += samples as u64;
            }
            FillOutcome::Skipped(reason) => {
                debug!("Tick {}: skipped ({:?})", tick, reason);
                report.skipped_cycles += 1;
            }
            FillOutcome::Failed(_) => report.failed_cycles += 1,
        }

        let stats = bridge.stats();
        report.max_queue_samples = report.max_queue_samples.max(stats.queued_samples);
        queue_sum += stats.queued_samples as u64;
        if let Some(frequency) = stats.applied_frequency {
            report.min_frequency = report.min_frequency.min(frequency);
            report.max_frequency = report.max_frequency.max(frequency);
        }

        engine.render(&mut output, 1);
    }

    let stats = bridge.stats();
    report.final_queue_samples = stats.queued_samples;
    report.dropped_samples = stats.dropped_samples;
    report.final_frequency = stats.applied_frequency.unwrap_or(params.engine_rate);
    report.smoothed_latency = stats.latency.smoothed_actual_latency;
    if report.min_frequency == u32::MAX {
        report.min_frequency = report.final_frequency;
        report.max_frequency = report.final_frequency;
    }
    if total_ticks > 0 {
        report.mean_queue_samples = queue_sum as f64 / total_ticks as f64;
    }

    bridge.teardown();
    info!("Simulation finished: {} samples written", report.samples_written);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(duration_ms: u32, clock_ratio: f64, jitter_ms: u32) -> SimulationParams {
        SimulationParams {
            duration_ms,
            clock_ratio,
            jitter_ms,
            seed: 7,
            ..SimulationParams::default()
        }
    }

    #[test]
    fn test_matched_clocks_run_clean() {
        let report = run_simulation(BridgeConfig::default(), &params(5_000, 1.0, 0)).unwrap();

        assert_eq!(report.ticks, 500);
        assert_eq!(report.frames_delivered, 250);
        assert_eq!(report.failed_cycles, 0);
        assert_eq!(report.dropped_samples, 0);
        assert!(report.samples_written > 0);
        assert!(report.max_queue_samples < 48000);
    }

    #[test]
    fn test_fast_talker_is_held_back() {
        let report = run_simulation(BridgeConfig::default(), &params(60_000, 1.002, 0)).unwrap();

        assert_eq!(report.max_frequency, 48240);
        assert_eq!(report.dropped_samples, 0);
        assert!(report.max_queue_samples < 24000);
    }

    #[test]
    fn test_slow_channel_builds_backlog_first() {
        let report = run_simulation(BridgeConfig::default(), &params(2_000, 1.0, 0)).unwrap();

        assert_eq!(report.min_frequency, 47760);
        assert!(report.final_queue_samples > 0);
    }

    #[test]
    fn test_jitter_is_absorbed() {
        let report = run_simulation(BridgeConfig::default(), &params(20_000, 1.0, 15)).unwrap();

        assert_eq!(report.failed_cycles, 0);
        assert_eq!(report.dropped_samples, 0);
        assert!(report.written_cycles > report.skipped_cycles);
    }

    #[test]
    fn test_same_seed_same_report() {
        let a = run_simulation(BridgeConfig::default(), &params(3_000, 1.001, 10)).unwrap();
        let b = run_simulation(BridgeConfig::default(), &params(3_000, 1.001, 10)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_invalid_params_rejected() {
        let mut bad = SimulationParams::default();
        bad.tick_ms = 0;
        assert!(run_simulation(BridgeConfig::default(), &bad).is_err());

        let mut bad = SimulationParams::default();
        bad.clock_ratio = -1.0;
        assert!(run_simulation(BridgeConfig::default(), &bad).is_err());
    }
}
