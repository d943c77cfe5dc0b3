//! # Volspire Common Library
//!
//! Shared code for the Volspire playback engine including:
//! - Data model (track identifiers, playback state, effects, spectra)
//! - Event types (PlayerEvent enum)
//! - Engine configuration loading
//! - Common error type

pub mod config;
pub mod error;
pub mod events;
pub mod types;

pub use config::EngineConfig;
pub use error::{Error, Result};
pub use events::PlayerEvent;
pub use types::{
    AudioEffects, CommandProfile, InterruptionEvent, MediaMeta, NowPlayingInfo, PlaybackProgress,
    PlaybackState, RemoteCommand, SpectrumFrame, TrackId,
};
