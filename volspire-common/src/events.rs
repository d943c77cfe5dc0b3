//! Event types for the Volspire event stream
//!
//! Every observable change in the playback engine is broadcast as a
//! [`PlayerEvent`]. Consumers that only need the latest values should read
//! snapshots instead; events are for logging, UI animation triggers and tests.

use serde::{Deserialize, Serialize};

use crate::types::{
    AudioEffects, CommandProfile, NowPlayingInfo, PlaybackState, TrackId,
};

/// Volspire event types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PlayerEvent {
    /// Playback state changed
    PlaybackStateChanged {
        state: PlaybackState,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Queue replaced (command profile recomputed with it)
    QueueChanged {
        queue: Vec<TrackId>,
        command_profile: CommandProfile,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Periodic progress of the active source
    PlaybackProgress {
        track: Option<TrackId>,
        elapsed: f64,
        duration: f64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Spectrum tick (all-zero while paused or failed)
    SpectrumUpdated {
        visual: Vec<f32>,
        indicator: Vec<f32>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Snapshot pushed to the system transport surface
    NowPlayingChanged {
        info: NowPlayingInfo,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Effects stored (rate is the resulting output rate)
    EffectsChanged {
        effects: AudioEffects,
        rate: f32,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Active source played to completion
    TrackFinished {
        track: TrackId,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Audio output reported an error on the active source
    SourceFailed {
        url: String,
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// External interruption started
    InterruptionBegan {
        remembered: Option<TrackId>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// External interruption ended
    InterruptionEnded {
        should_resume: bool,
        resumed: Option<TrackId>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl PlayerEvent {
    /// Event name as it appears in the serialized `type` tag
    pub fn event_type(&self) -> &'static str {
        match self {
            PlayerEvent::PlaybackStateChanged { .. } => "PlaybackStateChanged",
            PlayerEvent::QueueChanged { .. } => "QueueChanged",
            PlayerEvent::PlaybackProgress { .. } => "PlaybackProgress",
            PlayerEvent::SpectrumUpdated { .. } => "SpectrumUpdated",
            PlayerEvent::NowPlayingChanged { .. } => "NowPlayingChanged",
            PlayerEvent::EffectsChanged { .. } => "EffectsChanged",
            PlayerEvent::TrackFinished { .. } => "TrackFinished",
            PlayerEvent::SourceFailed { .. } => "SourceFailed",
            PlayerEvent::InterruptionBegan { .. } => "InterruptionBegan",
            PlayerEvent::InterruptionEnded { .. } => "InterruptionEnded",
        }
    }
}
