//! # Volspire Player
//!
//! Queue-driven audio playback engine with speed/pitch effects, a live
//! spectrum feed and system transport integration.
//!
//! Platform specifics (decoding and output, sample taps, the lock-screen
//! surface, metadata lookup) enter through traits; the crate ships simulated
//! implementations for tests and the demo binary.
//!
//! **Architecture:**
//! - [`PlayerEngine`] task owns the [`PlaybackController`]
//! - [`PlayerHandle`] sends commands and exposes snapshots and events
//! - [`playback::AudioPipeline`] manages the active source and its timers
//! - [`audio::SpectrumAnalyzer`] turns tapped samples into band levels

pub mod audio;
pub mod error;
pub mod media;
pub mod playback;
pub mod state;
pub mod transport;

pub use error::{Error, Result};
pub use media::{MediaCatalog, MediaResolver};
pub use playback::{HostBindings, PlaybackController, PlayerCommand, PlayerEngine, PlayerHandle};
pub use state::{PlayerSnapshot, SharedState};
pub use transport::TransportSurface;
