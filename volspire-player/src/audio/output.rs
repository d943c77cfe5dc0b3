//! Audio output capability
//!
//! The engine never decodes audio itself. A host implements [`AudioOutput`]
//! on top of whatever platform player it has; the pipeline drives it and
//! receives the source's asynchronous lifecycle signals through
//! [`SourceEvents`].

use tokio::sync::mpsc;
use tracing::trace;

use crate::error::Result;
use crate::playback::pipeline::PipelineMessage;

/// Host audio player holding at most one loaded source
pub trait AudioOutput: Send {
    /// Load `url` as the active source, replacing any previous one
    ///
    /// The source starts paused. Readiness, errors and completion are
    /// reported later through `events`, from any thread.
    fn load(&mut self, url: &str, events: SourceEvents) -> Result<()>;

    /// Start or continue output at the neutral rate (1.0)
    fn play(&mut self);

    fn pause(&mut self);

    fn seek(&mut self, seconds: f64);

    /// Current output rate; 0.0 while paused
    fn rate(&self) -> f32;

    fn set_rate(&mut self, rate: f32);

    /// Seconds played in the active source
    fn elapsed(&self) -> f64;

    /// True once the active source has failed
    fn has_error(&self) -> bool;

    /// Release the active source
    fn unload(&mut self);

    /// Activate or deactivate the platform audio session
    fn set_session_active(&mut self, _active: bool) {}
}

/// Lifecycle signal of a loaded source
#[derive(Debug, Clone, PartialEq)]
pub enum SourceSignal {
    /// Source can play; duration may be NaN when unknown
    Ready { duration: f64 },
    Failed { message: String },
    /// Played to completion
    Finished,
}

/// Sender for one source's lifecycle signals
///
/// Each sender is bound to the source generation it was created for, so
/// signals from a source that has since been replaced are discarded by the
/// pipeline.
#[derive(Debug, Clone)]
pub struct SourceEvents {
    generation: u64,
    tx: mpsc::UnboundedSender<PipelineMessage>,
}

impl SourceEvents {
    pub(crate) fn new(generation: u64, tx: mpsc::UnboundedSender<PipelineMessage>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn ready(&self, duration: f64) {
        self.send(SourceSignal::Ready { duration });
    }

    pub fn failed(&self, message: impl Into<String>) {
        self.send(SourceSignal::Failed {
            message: message.into(),
        });
    }

    pub fn finished(&self) {
        self.send(SourceSignal::Finished);
    }

    fn send(&self, signal: SourceSignal) {
        let message = PipelineMessage::Source {
            generation: self.generation,
            signal,
        };
        if self.tx.send(message).is_err() {
            trace!("Pipeline gone, dropping source signal");
        }
    }
}
