//! Audio device I/O using cpal.
//!
//! Provides:
//! - [`AudioInput`] for microphone capture into a [`Pushable`] sink
//! - [`AudioOutput`] for rendering a [`SoftwareEngine`] to the speakers
//!
//! cpal streams are not `Send` on every platform, so each stream is built and
//! kept alive on its own thread. Dropping the handle stops the stream.

use std::sync::Arc;
use std::thread::JoinHandle;

use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, Device, SampleFormat, StreamConfig};
use crossbeam::channel::{Receiver, Sender, bounded};
use tracing::{debug, error, info, warn};

use crate::audio::{AudioSample, SampleFrame};
use crate::engine::AudioEngine;
use crate::engine::software::SoftwareEngine;
use crate::pipeline::Pushable;

const OUTPUT_BUFFER_FRAMES: u32 = 256;

#[allow(deprecated)]
fn device_display_name(device: &Device) -> String {
    match device.description() {
        Ok(desc) => desc.name().to_string(),
        Err(_) => String::from("Unknown"),
    }
}

fn get_input_device(name: Option<&str>) -> Result<Device> {
    let host = cpal::default_host();
    match name {
        Some(name) => host
            .input_devices()
            .context("Failed to enumerate input devices")?
            .find(|d| device_display_name(d) == name)
            .with_context(|| format!("Input device {name:?} not found")),
        None => host
            .default_input_device()
            .context("No default input device available"),
    }
}

fn get_output_device(name: Option<&str>) -> Result<Device> {
    let host = cpal::default_host();
    match name {
        Some(name) => host
            .output_devices()
            .context("Failed to enumerate output devices")?
            .find(|d| device_display_name(d) == name)
            .with_context(|| format!("Output device {name:?} not found")),
        None => host
            .default_output_device()
            .context("No default output device available"),
    }
}

/// Names of the available input and output devices.
#[derive(Debug, Clone, Default)]
pub struct DeviceList {
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
}

pub fn list_devices() -> Result<DeviceList> {
    let host = cpal::default_host();
    let inputs = host
        .input_devices()
        .context("Failed to enumerate input devices")?
        .map(|d| device_display_name(&d))
        .collect();
    let outputs = host
        .output_devices()
        .context("Failed to enumerate output devices")?
        .map(|d| device_display_name(&d))
        .collect();
    Ok(DeviceList { inputs, outputs })
}

/// The rate the output device mixes at. This is the rate a
/// [`SoftwareEngine`] for that device should be created with.
pub fn output_sample_rate(device: Option<&str>) -> Result<u32> {
    let device = get_output_device(device)?;
    let config = device
        .default_output_config()
        .context("Failed to query default output config")?;
    Ok(config.sample_rate())
}

fn buffer_size(supported: &cpal::SupportedBufferSize) -> BufferSize {
    match supported {
        cpal::SupportedBufferSize::Range { min, max } => {
            let size = OUTPUT_BUFFER_FRAMES.clamp(*min, *max);
            debug!("Using buffer size: {} (min={}, max={})", size, min, max);
            BufferSize::Fixed(size)
        }
        cpal::SupportedBufferSize::Unknown => {
            warn!("Supported buffer size range unknown, using default");
            BufferSize::Default
        }
    }
}

/// Owns the thread that keeps a cpal stream alive.
struct StreamThread {
    shutdown: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl StreamThread {
    /// Runs `build` on a new thread and waits for it to report. The stream
    /// it returns lives until the handle is dropped.
    fn spawn<F>(name: &str, build: F) -> Result<(Self, StreamConfig)>
    where
        F: FnOnce() -> Result<(cpal::Stream, StreamConfig)> + Send + 'static,
    {
        let (ready_tx, ready_rx) = bounded::<Result<StreamConfig>>(1);
        let (shutdown_tx, shutdown_rx): (Sender<()>, Receiver<()>) = bounded(1);

        let handle = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || match build() {
                Ok((stream, config)) => {
                    let _ = ready_tx.send(Ok(config));
                    // Blocks until a shutdown message or the sender is dropped.
                    let _ = shutdown_rx.recv();
                    drop(stream);
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            })
            .context("Failed to spawn audio stream thread")?;

        let config = ready_rx
            .recv()
            .context("Audio stream thread exited before reporting")??;

        Ok((
            Self {
                shutdown: shutdown_tx,
                handle: Some(handle),
            },
            config,
        ))
    }
}

impl Drop for StreamThread {
    fn drop(&mut self) {
        let _ = self.shutdown.send(());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Audio stream thread panicked");
            }
        }
    }
}

/// Plays a [`SoftwareEngine`]'s mix on an output device.
pub struct AudioOutput {
    config: StreamConfig,
    _thread: StreamThread,
}

impl AudioOutput {
    pub fn start(engine: Arc<SoftwareEngine>, device: Option<&str>) -> Result<Self> {
        let device = device.map(str::to_string);
        let (thread, config) = StreamThread::spawn("voice-relay-output", move || {
            build_output(engine, device.as_deref())
        })?;
        info!(
            "Audio output started: {} channels at {} Hz",
            config.channels, config.sample_rate
        );
        Ok(Self {
            config,
            _thread: thread,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.config.channels
    }
}

fn build_output(
    engine: Arc<SoftwareEngine>,
    device: Option<&str>,
) -> Result<(cpal::Stream, StreamConfig)> {
    let output_device = get_output_device(device)?;
    let output_config = output_device.default_output_config()?;
    debug!("Output config: {output_config:#?}");

    let rate = engine.output_sample_rate();
    if output_config.sample_rate() != rate {
        warn!(
            "Engine mixes at {} Hz but the device prefers {} Hz",
            rate,
            output_config.sample_rate()
        );
    }

    let config = StreamConfig {
        channels: output_config.channels(),
        sample_rate: rate,
        buffer_size: buffer_size(output_config.buffer_size()),
    };

    let stream = match output_config.sample_format() {
        SampleFormat::F32 => output_stream::<f32>(&output_device, &config, engine)?,
        SampleFormat::I16 => output_stream::<i16>(&output_device, &config, engine)?,
        SampleFormat::I32 => output_stream::<i32>(&output_device, &config, engine)?,
        SampleFormat::U16 => output_stream::<u16>(&output_device, &config, engine)?,
        other => anyhow::bail!("Unsupported output sample format {:?}", other),
    };
    stream.play()?;
    info!(
        "Playback stream running on {}",
        device_display_name(&output_device)
    );
    Ok((stream, config))
}

fn output_stream<Sample: AudioSample + cpal::SizedSample>(
    device: &Device,
    config: &StreamConfig,
    engine: Arc<SoftwareEngine>,
) -> Result<cpal::Stream> {
    let channels = config.channels as usize;
    let mut scratch = Vec::<f32>::new();
    let stream = device.build_output_stream(
        config,
        move |data: &mut [Sample], _: &cpal::OutputCallbackInfo| {
            scratch.resize(data.len(), 0.0);
            engine.render(&mut scratch, channels);
            for (dst, src) in data.iter_mut().zip(scratch.iter()) {
                *dst = Sample::from_voice(*src);
            }
        },
        |err| error!("An error occurred on the output audio stream: {}", err),
        None,
    )?;
    Ok(stream)
}

/// Captures audio from an input device and pushes each callback's buffer
/// to a sink as one [`SampleFrame`].
pub struct AudioInput {
    config: StreamConfig,
    _thread: StreamThread,
}

impl AudioInput {
    pub fn start(
        sink: Arc<dyn Pushable<SampleFrame>>,
        device: Option<&str>,
        sample_rate: Option<u32>,
    ) -> Result<Self> {
        let device = device.map(str::to_string);
        let (thread, config) = StreamThread::spawn("voice-relay-input", move || {
            build_input(sink, device.as_deref(), sample_rate)
        })?;
        info!(
            "Audio input started: {} channels at {} Hz",
            config.channels, config.sample_rate
        );
        Ok(Self {
            config,
            _thread: thread,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.config.channels
    }
}

fn build_input(
    sink: Arc<dyn Pushable<SampleFrame>>,
    device: Option<&str>,
    sample_rate: Option<u32>,
) -> Result<(cpal::Stream, StreamConfig)> {
    let input_device = get_input_device(device)?;
    let input_config = input_device.default_input_config()?;
    debug!("Input config: {input_config:#?}");

    let config = StreamConfig {
        channels: input_config.channels(),
        sample_rate: sample_rate.unwrap_or(input_config.sample_rate()),
        buffer_size: buffer_size(input_config.buffer_size()),
    };

    let stream = match input_config.sample_format() {
        SampleFormat::F32 => input_stream::<f32>(&input_device, &config, sink)?,
        SampleFormat::I16 => input_stream::<i16>(&input_device, &config, sink)?,
        SampleFormat::I32 => input_stream::<i32>(&input_device, &config, sink)?,
        SampleFormat::U16 => input_stream::<u16>(&input_device, &config, sink)?,
        other => anyhow::bail!("Unsupported input sample format {:?}", other),
    };
    stream.play()?;
    info!(
        "Microphone capture running on {}",
        device_display_name(&input_device)
    );
    Ok((stream, config))
}

fn input_stream<Sample: AudioSample + cpal::SizedSample>(
    device: &Device,
    config: &StreamConfig,
    sink: Arc<dyn Pushable<SampleFrame>>,
) -> Result<cpal::Stream> {
    let channels = config.channels;
    let stream = device.build_input_stream(
        config,
        move |data: &[Sample], _: &cpal::InputCallbackInfo| {
            let samples: Vec<f32> = data.iter().map(|s| s.to_voice()).collect();
            match SampleFrame::new(samples, channels) {
                Ok(frame) => sink.push(frame),
                Err(e) => warn!("Dropping capture buffer: {}", e),
            }
        },
        |err| error!("An error occurred on the input audio stream: {}", err),
        None,
    )?;
    Ok(stream)
}
