use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use voice_relay::audio::SampleFrame;
use voice_relay::config::RelayConfig;
use voice_relay::engine::SoftwareEngine;
use voice_relay::io::{AudioInput, AudioOutput, list_devices, output_sample_rate};
use voice_relay::pipeline::Pushable;
use voice_relay::session::{ReadyError, VoiceSession};
use voice_relay::sim::{SimulationParams, run_simulation};

const UPDATE_INTERVAL: Duration = Duration::from_millis(10);
const STATS_INTERVAL: Duration = Duration::from_secs(5);
const READY_TIMEOUT: Duration = Duration::from_secs(5);
const LOCAL_PARTICIPANT: &str = "local";

/// Relays microphone audio through a drift-corrected streaming engine
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON config file
    #[arg(short, long, env = "VOICE_RELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Print the available audio devices and exit
    #[arg(long, default_value = "false")]
    list_devices: bool,

    /// Output device name (overrides the config file)
    #[arg(long)]
    output_device: Option<String>,

    /// Input device name (overrides the config file)
    #[arg(long)]
    input_device: Option<String>,

    /// Run an offline simulation for this many seconds instead of opening devices
    #[arg(long, value_name = "SECONDS")]
    simulate: Option<u32>,

    /// Talker clock relative to the engine clock, for --simulate
    #[arg(long, default_value_t = 1.0)]
    clock_ratio: f64,

    /// Maximum random frame delay in milliseconds, for --simulate
    #[arg(long, default_value_t = 0)]
    jitter_ms: u32,

    /// Random seed, for --simulate
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run(Args::parse()).await {
        error!("Application error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    if args.list_devices {
        let devices = list_devices()?;
        println!("Input devices:");
        for name in &devices.inputs {
            println!("  {name}");
        }
        println!("Output devices:");
        for name in &devices.outputs {
            println!("  {name}");
        }
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => RelayConfig::load(path)?,
        None => RelayConfig::default(),
    };
    if args.output_device.is_some() {
        config.output_device = args.output_device.clone();
    }
    if args.input_device.is_some() {
        config.input_device = args.input_device.clone();
    }

    if let Some(seconds) = args.simulate {
        let params = SimulationParams {
            duration_ms: seconds.saturating_mul(1000),
            clock_ratio: args.clock_ratio,
            jitter_ms: args.jitter_ms,
            seed: args.seed,
            ..SimulationParams::default()
        };
        let report = run_simulation(config.bridge, &params)?;
        println!("{report}");
        return Ok(());
    }

    run_live(config).await
}

async fn run_live(config: RelayConfig) -> Result<()> {
    info!("Starting voice relay...");

    let rate = output_sample_rate(config.output_device.as_deref())?;
    let engine = Arc::new(SoftwareEngine::new(rate));
    let session = Arc::new(VoiceSession::new(engine.clone(), config.bridge.clone())?);

    // The session becomes ready once the output stream is playing, and is
    // closed if the device cannot be opened.
    let starting = {
        let session = session.clone();
        let device = config.output_device.clone();
        tokio::task::spawn_blocking(move || -> Result<AudioOutput> {
            match AudioOutput::start(engine, device.as_deref()) {
                Ok(output) => {
                    session.mark_ready();
                    Ok(output)
                }
                Err(e) => {
                    session.close();
                    Err(e).context("Failed to start audio output")
                }
            }
        })
    };

    if let Err(e) = session.wait_ready(READY_TIMEOUT).await {
        session.close();
        if e == ReadyError::Closed {
            starting.await.context("Audio output task failed")??;
        }
        return Err(e).context("Voice session did not become ready");
    }
    let _output = starting.await.context("Audio output task failed")??;

    let bridge = session.add_participant(LOCAL_PARTICIPANT)?;
    let sink: Arc<dyn Pushable<SampleFrame>> = bridge;
    let _input = AudioInput::start(sink, config.input_device.as_deref(), Some(rate))
        .context("Failed to start audio input")?;

    info!("Relaying at {} Hz, press Ctrl-C to stop", rate);

    let mut ticker = tokio::time::interval(UPDATE_INTERVAL);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut last_stats = Instant::now();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                session.process_all();
                if last_stats.elapsed() >= STATS_INTERVAL {
                    last_stats = Instant::now();
                    for (id, stats) in session.stats() {
                        info!(
                            "{}: {:?}, queued {}, smoothed latency {}, {} Hz",
                            id,
                            stats.phase,
                            stats.queued_samples,
                            stats.latency.smoothed_actual_latency,
                            stats.commanded_frequency
                        );
                    }
                }
            }
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl-C")?;
                info!("Shutting down");
                break;
            }
        }
    }

    session.close();
    Ok(())
}
