//! Shared player state
//!
//! The engine task is the only writer. Observers either read the latest
//! [`PlayerSnapshot`] through a watch channel or subscribe to the
//! [`PlayerEvent`] stream.

use serde::Serialize;
use tokio::sync::{broadcast, watch};
use volspire_common::config::AnalyzerConfig;
use volspire_common::{
    AudioEffects, CommandProfile, NowPlayingInfo, PlaybackProgress, PlaybackState, PlayerEvent,
    SpectrumFrame, TrackId,
};

/// Events buffered per subscriber before the slowest one starts lagging
const EVENT_CAPACITY: usize = 256;

/// Everything an observer needs to render the player
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerSnapshot {
    pub state: PlaybackState,
    pub queue: Vec<TrackId>,
    pub command_profile: CommandProfile,
    /// None until the first progress tick of the current track
    pub progress: Option<PlaybackProgress>,
    pub spectrum: SpectrumFrame,
    pub effects: AudioEffects,
    /// Output rate the effects translate to
    pub playback_rate: f32,
    pub now_playing: Option<NowPlayingInfo>,
    /// Track remembered across an ongoing interruption
    pub interrupted: Option<TrackId>,
}

impl PlayerSnapshot {
    fn initial(analyzer: &AnalyzerConfig) -> Self {
        Self {
            state: PlaybackState::default(),
            queue: Vec::new(),
            command_profile: CommandProfile::for_queue_len(0),
            progress: None,
            spectrum: SpectrumFrame::zeroed(analyzer.band_count, analyzer.indicator_band_count),
            effects: AudioEffects::default(),
            playback_rate: 1.0,
            now_playing: None,
            interrupted: None,
        }
    }
}

pub struct SharedState {
    snapshot_tx: watch::Sender<PlayerSnapshot>,
    event_tx: broadcast::Sender<PlayerEvent>,
}

impl SharedState {
    pub fn new(analyzer: &AnalyzerConfig) -> Self {
        let (snapshot_tx, _) = watch::channel(PlayerSnapshot::initial(analyzer));
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            snapshot_tx,
            event_tx,
        }
    }

    /// Broadcast an event to all subscribers
    pub fn broadcast_event(&self, event: PlayerEvent) {
        // No receivers is fine
        let _ = self.event_tx.send(event);
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<PlayerEvent> {
        self.event_tx.subscribe()
    }

    pub fn subscribe_snapshots(&self) -> watch::Receiver<PlayerSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    /// Modify the snapshot in place and notify watchers
    pub fn update(&self, modify: impl FnOnce(&mut PlayerSnapshot)) {
        self.snapshot_tx.send_modify(modify);
    }
}
