//! Playback engine
//!
//! - `controller`: transport state machine over the queue
//! - `pipeline`: one source at a time, with its timers and tap
//! - `scheduler`: cancellable periodic tickers
//! - `engine`: the task that owns the controller, and its handle

pub mod controller;
pub mod engine;
pub mod pipeline;
pub mod scheduler;

pub use controller::PlaybackController;
pub use engine::{HostBindings, PlayerCommand, PlayerEngine, PlayerHandle};
pub use pipeline::{AudioPipeline, PipelineEvent, PipelineMessage, TickKind};
pub use scheduler::Ticker;
