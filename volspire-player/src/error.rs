//! Error types for volspire-player
//!
//! None of these are fatal: the engine logs them, leaves its state as it was
//! and keeps serving transport commands.

use thiserror::Error;
use volspire_common::TrackId;

/// Main error type for the playback engine
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Caller asked for something the current queue cannot satisfy
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Track has no resolvable audio URL
    #[error("No audio URL for track {0}")]
    UnresolvedMedia(TrackId),

    /// Audio output reported an error on the active source
    #[error("Source failure for {url}: {message}")]
    SourceFailure { url: String, message: String },

    /// Sample tap could not be attached to the source
    #[error("Sample tap install failed: {0}")]
    TapInstallFailure(String),

    /// Audio output facility rejected a request
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// Engine task is gone (shut down or panicked)
    #[error("Playback engine is not running")]
    EngineClosed,

    /// Configuration errors from volspire-common
    #[error("{0}")]
    Config(String),
}

impl From<volspire_common::Error> for Error {
    fn from(e: volspire_common::Error) -> Self {
        Error::Config(e.to_string())
    }
}

/// Convenience Result type using volspire-player Error
pub type Result<T> = std::result::Result<T, Error>;
