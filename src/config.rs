//! Configuration for the voice relay.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Tuning for one [`VoiceBridge`](crate::bridge::VoiceBridge).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Length of the engine-side ring, and the backlog the drift correction
    /// aims for.
    pub latency_ms: u32,
    /// Half-width of the dead band around the target backlog.
    pub drift_ms: u32,
    /// How far the playback rate is nudged outside the dead band, in percent.
    pub drift_correction_percent: f64,
    /// Cap on queued audio. `None` leaves the queue unbounded.
    pub max_queue_ms: Option<u32>,
    /// Zero the capture buffer after each voice callback.
    pub zero_capture_buffer: bool,
    pub event_path: String,
    pub initial_gain: f32,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            latency_ms: 50,
            drift_ms: 1,
            drift_correction_percent: 0.5,
            max_queue_ms: Some(1000),
            zero_capture_buffer: true,
            event_path: "event:/Voice/Voice".to_string(),
            initial_gain: 1.0,
        }
    }
}

impl BridgeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.latency_ms == 0 {
            anyhow::bail!("latency_ms must be greater than zero");
        }
        if !self.drift_correction_percent.is_finite() || self.drift_correction_percent < 0.0 {
            anyhow::bail!(
                "drift_correction_percent must be a non-negative number, got {}",
                self.drift_correction_percent
            );
        }
        if self.drift_correction_percent >= 100.0 {
            anyhow::bail!(
                "drift_correction_percent must be below 100, got {}",
                self.drift_correction_percent
            );
        }
        if let Some(max) = self.max_queue_ms {
            if max < self.latency_ms {
                anyhow::bail!(
                    "max_queue_ms ({}) must be at least latency_ms ({})",
                    max,
                    self.latency_ms
                );
            }
        }
        if !self.initial_gain.is_finite() || self.initial_gain < 0.0 {
            anyhow::bail!("initial_gain must be a non-negative number");
        }
        Ok(())
    }
}

/// Top-level configuration for the relay binary.
#[derive(Clone, Default, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Output device name; the host default when unset.
    pub output_device: Option<String>,
    /// Input device name; the host default when unset.
    pub input_device: Option<String>,
    pub bridge: BridgeConfig,
}

impl RelayConfig {
    /// Loads a JSON config file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.bridge.validate()?;
        Ok(config)
    }
}
