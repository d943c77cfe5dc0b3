//! Playback data model
//!
//! Value types shared between the playback engine and its observers. None of
//! these carry behavior beyond small derived accessors; the engine owns all
//! mutation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of a playable item
///
/// Equality is by value. The engine never interprets the contents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(String);

impl TrackId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrackId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for TrackId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Playback state machine value
///
/// `Playing` always names a track; `Paused` may not (nothing selected yet).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", content = "track", rename_all = "lowercase")]
pub enum PlaybackState {
    Playing(TrackId),
    Paused(Option<TrackId>),
}

impl PlaybackState {
    /// Track the state refers to, playing or not
    pub fn current(&self) -> Option<&TrackId> {
        match self {
            PlaybackState::Playing(track) => Some(track),
            PlaybackState::Paused(track) => track.as_ref(),
        }
    }

    pub fn is_playing(&self) -> bool {
        matches!(self, PlaybackState::Playing(_))
    }
}

impl Default for PlaybackState {
    fn default() -> Self {
        PlaybackState::Paused(None)
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackState::Playing(track) => write!(f, "playing({})", track),
            PlaybackState::Paused(Some(track)) => write!(f, "paused({})", track),
            PlaybackState::Paused(None) => write!(f, "paused(-)"),
        }
    }
}

/// Position within the active source, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PlaybackProgress {
    pub elapsed: f64,
    /// Zero until the source reports ready
    pub duration: f64,
}

/// Speed and pitch settings applied to the output rate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AudioEffects {
    /// Playback speed multiplier
    pub speed: f32,
    /// Pitch shift in cents
    pub pitch: f32,
}

impl AudioEffects {
    pub const MIN_SPEED: f32 = 0.25;
    pub const MAX_SPEED: f32 = 2.0;
    pub const MIN_PITCH_CENTS: f32 = -1200.0;
    pub const MAX_PITCH_CENTS: f32 = 1200.0;

    pub fn new(speed: f32, pitch: f32) -> Self {
        Self { speed, pitch }
    }

    /// Copy with both fields forced into their supported ranges
    ///
    /// Non-finite values fall back to the neutral setting.
    pub fn clamped(self) -> Self {
        let speed = if self.speed.is_finite() {
            self.speed.clamp(Self::MIN_SPEED, Self::MAX_SPEED)
        } else {
            1.0
        };
        let pitch = if self.pitch.is_finite() {
            self.pitch.clamp(Self::MIN_PITCH_CENTS, Self::MAX_PITCH_CENTS)
        } else {
            0.0
        };
        Self { speed, pitch }
    }
}

impl Default for AudioEffects {
    fn default() -> Self {
        Self {
            speed: 1.0,
            pitch: 0.0,
        }
    }
}

/// Which transport commands the external surface should offer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CommandProfile {
    pub is_live_stream: bool,
    pub is_switch_track_enabled: bool,
}

impl CommandProfile {
    /// Profile for a queue of `len` tracks
    pub fn for_queue_len(len: usize) -> Self {
        Self {
            is_live_stream: false,
            is_switch_track_enabled: len > 1,
        }
    }
}

/// Latest visual and indicator spectra
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SpectrumFrame {
    pub visual: Vec<f32>,
    pub indicator: Vec<f32>,
}

impl SpectrumFrame {
    pub fn zeroed(visual_bands: usize, indicator_bands: usize) -> Self {
        Self {
            visual: vec![0.0; visual_bands],
            indicator: vec![0.0; indicator_bands],
        }
    }

    pub fn is_silent(&self) -> bool {
        self.visual.iter().chain(self.indicator.iter()).all(|v| *v == 0.0)
    }
}

/// Metadata resolved for a track by the media library
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MediaMeta {
    pub title: String,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub artist: Option<String>,
    pub genre: Option<String>,
    /// Artwork reference (URL or asset key), loaded by the surface
    pub artwork: Option<String>,
    pub audio_url: Option<String>,
    pub duration: Option<f64>,
}

impl MediaMeta {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    pub fn with_audio_url(mut self, url: impl Into<String>) -> Self {
        self.audio_url = Some(url.into());
        self
    }

    pub fn with_artwork(mut self, artwork: impl Into<String>) -> Self {
        self.artwork = Some(artwork.into());
        self
    }
}

/// Snapshot pushed to the system "now playing" surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NowPlayingInfo {
    pub title: String,
    pub artist: String,
    pub artwork: Option<String>,
    pub is_playing: bool,
    /// Effective rate while playing, 0 while paused
    pub playback_rate: f32,
    pub queue_index: usize,
    pub queue_count: usize,
    pub elapsed: Option<f64>,
    pub duration: Option<f64>,
}

impl NowPlayingInfo {
    pub const UNKNOWN: &'static str = "Unknown";
}

/// Transport command received from the system surface
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum RemoteCommand {
    Play,
    Pause,
    Stop,
    TogglePlayPause,
    NextTrack,
    PreviousTrack,
    ChangePlaybackPosition { position: f64 },
}

/// Audio session interruption signal from the host OS
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum InterruptionEvent {
    Began,
    Ended { should_resume: bool },
}
