//! Audio subsystem
//!
//! Host capability traits, spectrum analysis, sample tap plumbing and the
//! speed/pitch effects processor.

pub mod analyzer;
pub mod effects;
pub mod output;
pub mod simulated;
pub mod tap;

pub use analyzer::{downsample, SpectrumAnalyzer};
pub use effects::{effective_rate, EffectsProcessor};
pub use output::{AudioOutput, SourceEvents, SourceSignal};
pub use simulated::{SimulatedOutput, SimulatedOutputHandle, SimulatedTap, SimulatedTapHandle};
pub use tap::{SampleSource, TapProcessor, TapSink};
