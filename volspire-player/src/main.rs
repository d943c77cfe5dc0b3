//! Volspire Player demo
//!
//! Runs the playback engine against the simulated output and sample tap:
//! plays a queue of tracks, feeds a test tone into the spectrum analyzer and
//! logs what a transport surface and a visualizer would receive.

use std::collections::HashMap;
use std::f32::consts::TAU;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use volspire_common::{EngineConfig, MediaMeta, PlayerEvent, TrackId};
use volspire_player::audio::{SimulatedOutput, SimulatedOutputHandle, SimulatedTap, SimulatedTapHandle};
use volspire_player::transport::LoggingSurface;
use volspire_player::{HostBindings, MediaCatalog, PlayerEngine, PlayerHandle};

const SAMPLE_RATE: f32 = 44_100.0;
const FRAMES_PER_BUFFER: usize = 2048;

/// Command-line arguments for volspire-player
#[derive(Parser, Debug)]
#[command(name = "volspire-player")]
#[command(about = "Queue playback engine demo on a simulated audio output")]
#[command(version)]
struct Args {
    /// Configuration file (overrides VOLSPIRE_CONFIG and the platform default)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Track to queue, as ID=URL (repeatable)
    #[arg(short, long = "track", value_parser = parse_track)]
    tracks: Vec<(String, String)>,

    /// Length of each simulated track in seconds
    #[arg(long, default_value = "8")]
    track_seconds: f64,

    /// How long to run before shutting down
    #[arg(short, long, default_value = "20")]
    seconds: u64,

    /// Speed multiplier applied after the first track starts
    #[arg(long, default_value = "1.0")]
    speed: f32,

    /// Pitch shift in cents applied after the first track starts
    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    pitch: f32,
}

fn parse_track(value: &str) -> std::result::Result<(String, String), String> {
    match value.split_once('=') {
        Some((id, url)) if !id.is_empty() && !url.is_empty() => {
            Ok((id.to_string(), url.to_string()))
        }
        _ => Err(format!("expected ID=URL, got '{}'", value)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = EngineConfig::resolve(args.config.as_deref())
        .context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "volspire_player={0},volspire_common={0}",
                    config.logging.level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let tracks = if args.tracks.is_empty() {
        vec![
            ("intro".to_string(), "sim://intro".to_string()),
            ("theme".to_string(), "sim://theme".to_string()),
            ("outro".to_string(), "sim://outro".to_string()),
        ]
    } else {
        args.tracks.clone()
    };

    info!("Starting Volspire Player with {} tracks", tracks.len());

    let catalog = MediaCatalog::new();
    let (output, output_handle) = SimulatedOutput::new();
    let (taps, tap_handle) = SimulatedTap::new();
    let mut durations = HashMap::new();
    for (id, url) in &tracks {
        catalog.insert(
            id.as_str(),
            MediaMeta::new(id.clone())
                .with_artist("Volspire")
                .with_audio_url(url.clone()),
        );
        output_handle.set_duration(url.clone(), args.track_seconds);
        durations.insert(url.clone(), args.track_seconds);
    }

    let handle = PlayerEngine::spawn(
        config,
        HostBindings {
            output: Box::new(output),
            taps: Box::new(taps),
            surface: Box::new(LoggingSurface::new()),
            media: Arc::new(catalog),
        },
    )
    .context("Failed to start playback engine")?;

    let events = tokio::spawn(log_events(handle.clone()));
    let host = tokio::spawn(simulate_host(output_handle, tap_handle, durations));

    let queue: Vec<TrackId> = tracks.iter().map(|(id, _)| TrackId::new(id.clone())).collect();
    handle
        .play(queue[0].clone(), queue.clone())
        .await
        .context("Failed to start playback")?;

    if args.speed != 1.0 || args.pitch != 0.0 {
        handle
            .apply_effects(volspire_common::AudioEffects::new(args.speed, args.pitch))
            .await
            .context("Failed to apply effects")?;
    }

    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(args.seconds)) => {
            info!("Demo time elapsed");
        }
        _ = shutdown_signal() => {}
    }

    handle.shutdown().await.context("Engine shutdown failed")?;
    host.abort();
    events.abort();

    let snapshot = handle.snapshot();
    info!(
        "Final state: {}\n{}",
        snapshot.state,
        serde_json::to_string_pretty(&snapshot).context("Failed to serialize snapshot")?
    );
    Ok(())
}

/// Play the host's part: feed a tone into the tap and end tracks on time
async fn simulate_host(
    output: SimulatedOutputHandle,
    tap: SimulatedTapHandle,
    durations: HashMap<String, f64>,
) {
    let mut interval = tokio::time::interval(Duration::from_millis(20));
    let mut phase = 0.0f32;
    let mut buffer = vec![0.0f32; FRAMES_PER_BUFFER * 2];
    let mut finished_url: Option<String> = None;

    loop {
        interval.tick().await;

        if output.rate() != 0.0 {
            let step = TAU * 440.0 * output.rate() / SAMPLE_RATE;
            for frame in buffer.chunks_exact_mut(2) {
                let sample = 0.5 * phase.sin();
                frame[0] = sample;
                frame[1] = sample;
                phase = (phase + step) % TAU;
            }
            tap.push(&buffer, 2);
        }

        let Some(url) = output.url() else {
            continue;
        };
        let duration = durations.get(&url).copied().unwrap_or(f64::INFINITY);
        if output.elapsed() >= duration && finished_url.as_deref() != Some(url.as_str()) {
            debug!("Simulated source {} reached its end", url);
            finished_url = Some(url);
            output.finish();
        } else if output.elapsed() < duration {
            finished_url = None;
        }
    }
}

async fn log_events(handle: PlayerHandle) {
    let mut events = handle.subscribe_events();
    loop {
        match events.recv().await {
            Ok(PlayerEvent::PlaybackStateChanged { state, .. }) => info!("State: {}", state),
            Ok(PlayerEvent::TrackFinished { track, .. }) => info!("Finished {}", track),
            Ok(PlayerEvent::SourceFailed { url, message, .. }) => {
                warn!("Source {} failed: {}", url, message)
            }
            Ok(PlayerEvent::SpectrumUpdated { indicator, .. }) => {
                debug!("Indicator {:.2?}", indicator)
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => warn!("Event log skipped {} events", skipped),
            Err(RecvError::Closed) => break,
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
