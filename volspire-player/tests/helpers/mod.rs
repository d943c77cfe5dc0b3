//! Test helpers for volspire-player integration tests
//!
//! - `Harness`: a controller wired to simulated host facilities, driven
//!   synchronously without the engine task
//! - `RecordingSurface`: transport surface that keeps everything pushed to it
//! - `catalog`: tracks named `x` resolving to `sim://x`

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use volspire_common::{CommandProfile, EngineConfig, MediaMeta, NowPlayingInfo, TrackId};
use volspire_player::audio::{
    SimulatedOutput, SimulatedOutputHandle, SimulatedTap, SimulatedTapHandle,
};
use volspire_player::playback::PipelineMessage;
use volspire_player::transport::TransportSurface;
use volspire_player::{HostBindings, MediaCatalog, PlaybackController, SharedState};

#[derive(Debug, Default)]
pub struct SurfaceLog {
    pub profiles: Vec<CommandProfile>,
    pub now_playing: Vec<NowPlayingInfo>,
}

/// Transport surface that records what it receives
#[derive(Debug, Clone, Default)]
pub struct RecordingSurface {
    log: Arc<Mutex<SurfaceLog>>,
}

impl RecordingSurface {
    pub fn last_profile(&self) -> Option<CommandProfile> {
        self.log.lock().unwrap().profiles.last().copied()
    }

    pub fn last_now_playing(&self) -> Option<NowPlayingInfo> {
        self.log.lock().unwrap().now_playing.last().cloned()
    }

    pub fn now_playing_count(&self) -> usize {
        self.log.lock().unwrap().now_playing.len()
    }
}

impl TransportSurface for RecordingSurface {
    fn set_command_profile(&mut self, profile: &CommandProfile) {
        self.log.lock().unwrap().profiles.push(*profile);
    }

    fn set_now_playing(&mut self, info: &NowPlayingInfo) {
        self.log.lock().unwrap().now_playing.push(info.clone());
    }
}

pub fn url_of(name: &str) -> String {
    format!("sim://{}", name)
}

pub fn ids(names: &[&str]) -> Vec<TrackId> {
    names.iter().map(|n| TrackId::new(*n)).collect()
}

/// Catalog where each name resolves to `sim://<name>` with title and artist
pub fn catalog(names: &[&str]) -> MediaCatalog {
    let catalog = MediaCatalog::new();
    for name in names {
        catalog.insert(
            *name,
            MediaMeta::new(format!("Title {}", name))
                .with_artist(format!("Artist {}", name))
                .with_audio_url(url_of(name)),
        );
    }
    catalog
}

pub struct Harness {
    pub controller: PlaybackController,
    pub pipeline_rx: mpsc::UnboundedReceiver<PipelineMessage>,
    pub output: SimulatedOutputHandle,
    pub tap: SimulatedTapHandle,
    pub surface: RecordingSurface,
    pub catalog: Arc<MediaCatalog>,
    pub shared: Arc<SharedState>,
}

impl Harness {
    pub fn new(names: &[&str]) -> Self {
        Self::with_config(names, EngineConfig::default())
    }

    pub fn with_config(names: &[&str], config: EngineConfig) -> Self {
        let (output, output_handle) = SimulatedOutput::new();
        let (taps, tap_handle) = SimulatedTap::new();
        let surface = RecordingSurface::default();
        let catalog = Arc::new(catalog(names));
        let shared = Arc::new(SharedState::new(&config.analyzer));

        let (controller, pipeline_rx) = PlaybackController::from_host(
            &config,
            HostBindings {
                output: Box::new(output),
                taps: Box::new(taps),
                surface: Box::new(surface.clone()),
                media: catalog.clone(),
            },
            Arc::clone(&shared),
        );

        Self {
            controller,
            pipeline_rx,
            output: output_handle,
            tap: tap_handle,
            surface,
            catalog,
            shared,
        }
    }

    /// Deliver every queued pipeline message to the controller
    pub fn pump(&mut self) {
        while let Ok(message) = self.pipeline_rx.try_recv() {
            self.controller.handle_pipeline_message(message);
        }
    }

    pub fn current(&self) -> Option<String> {
        self.controller
            .state()
            .current()
            .map(|t| t.as_str().to_string())
    }

    pub fn is_playing(&self) -> bool {
        self.controller.state().is_playing()
    }

    /// Let the loaded source run to its end and process the fallout
    pub fn finish_track(&mut self) {
        self.pump();
        self.output.finish();
        self.pump();
    }
}
