//! Tonearm demo player - main entry point
//!
//! A minimal owning service around the playback engine: loads a file list,
//! preloads the next track for gapless/crossfade transitions, and polls
//! `check_if_ended` the way any embedding queue service would.

use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tonearm::config::PlayerConfig;
use tonearm::playback::{
    AudioEngine, EndReason, EngineFactory, PlaybackEndInfo, PlaybackState, PRIORITY_ORDER,
};

/// Poll interval for the end-of-track check
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Command-line arguments for tonearm
#[derive(Parser, Debug)]
#[command(name = "tonearm")]
#[command(about = "Gapless, crossfading audio player")]
#[command(version)]
struct Args {
    /// Audio files to play, in order
    files: Vec<PathBuf>,

    /// Audio backend (cpal, rodio); overrides the config file
    #[arg(short, long, env = "TONEARM_BACKEND")]
    backend: Option<String>,

    /// Path to a TOML configuration file
    #[arg(short, long, env = "TONEARM_CONFIG")]
    config: Option<PathBuf>,

    /// Playback volume (0.0 - 1.0); overrides the config file
    #[arg(long)]
    volume: Option<f32>,

    /// Crossfade duration in milliseconds; overrides the config file
    #[arg(long)]
    crossfade_ms: Option<u64>,

    /// List available backends with their capabilities, then exit
    #[arg(long)]
    list_backends: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tonearm=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    if args.list_backends {
        return list_backends();
    }

    if args.files.is_empty() {
        bail!("no files given (try --help)");
    }

    let mut config = match args.config.as_deref() {
        Some(path) => PlayerConfig::load(path).context("failed to load configuration")?,
        None => PlayerConfig::default(),
    };
    if let Some(volume) = args.volume {
        config.volume = volume;
    }
    if let Some(crossfade_ms) = args.crossfade_ms {
        config.crossfade_ms = crossfade_ms;
    }

    let backend = args.backend.as_deref().or(config.backend.as_deref());
    let mut engine = match backend {
        Some(name) => EngineFactory::create(name),
        None => EngineFactory::create_best_available(&[]),
    }
    .context("failed to create audio engine")?;
    info!("audio backend: {}", engine.name());

    config.apply(engine.as_mut());

    // End-of-track events flow back through a channel so the poll loop
    // below stays the single place that drives queue advancement.
    let (end_tx, end_rx) = mpsc::channel::<PlaybackEndInfo>();
    engine.set_on_end(Box::new(move |info| {
        let _ = end_tx.send(info.clone());
    }));
    engine.set_on_error(Box::new(|message| {
        warn!("engine error: {}", message);
    }));

    let result = run_queue(engine.as_mut(), &args.files, &end_rx);
    engine.cleanup();
    result
}

/// Print each registered backend with its capability flags.
fn list_backends() -> Result<()> {
    for &name in PRIORITY_ORDER {
        match EngineFactory::backend_info(name) {
            Some(caps) => {
                let caps_json =
                    serde_json::to_string(&caps).context("failed to serialize capabilities")?;
                println!("{}: {}", name, caps_json);
            }
            None => println!("{}: unavailable", name),
        }
    }
    Ok(())
}

/// Play the file list front to back, preloading the upcoming track
/// whenever the engine supports gapless transitions.
fn run_queue(
    engine: &mut dyn AudioEngine,
    files: &[PathBuf],
    end_rx: &mpsc::Receiver<PlaybackEndInfo>,
) -> Result<()> {
    let gapless = engine.capabilities().gapless;
    let mut index = 0usize;

    if !engine.load(&files[index]) {
        bail!("failed to load {}", files[index].display());
    }
    if gapless {
        preload_next(engine, files, index);
    }
    if !engine.play() {
        bail!("failed to start playback of {}", files[index].display());
    }
    info!("playing {}", files[index].display());

    loop {
        thread::sleep(POLL_INTERVAL);
        engine.check_if_ended();

        while let Ok(event) = end_rx.try_recv() {
            match event.reason {
                EndReason::AutoAdvance => {
                    index += 1;
                    info!(
                        "auto-advanced to {}",
                        event
                            .next_path
                            .as_deref()
                            .map(|p| p.display().to_string())
                            .unwrap_or_default()
                    );
                    preload_next(engine, files, index);
                }
                EndReason::Ended => {
                    index += 1;
                    if index >= files.len() {
                        info!("queue finished");
                        return Ok(());
                    }
                    if !engine.load(&files[index]) {
                        bail!("failed to load {}", files[index].display());
                    }
                    if gapless {
                        preload_next(engine, files, index);
                    }
                    if !engine.play() {
                        bail!("failed to start playback of {}", files[index].display());
                    }
                    info!("playing {}", files[index].display());
                }
            }
        }

        if engine.state() == PlaybackState::Error {
            bail!("engine entered error state");
        }
    }
}

/// Hand the engine the track after `index`, or clear the slot at the end
/// of the queue.
fn preload_next(engine: &mut dyn AudioEngine, files: &[PathBuf], index: usize) {
    let next = files.get(index + 1);
    match next {
        Some(path) => {
            if !engine.set_next_track(Some(path)) {
                warn!("failed to preload {}", path.display());
            }
        }
        None => {
            let _ = engine.set_next_track(None);
        }
    }
}
