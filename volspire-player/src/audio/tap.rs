//! Sample tap plumbing
//!
//! A host installs a tap on the live audio path and pushes raw sample buffers
//! from its real-time callback through a [`TapSink`]. The sink holds a single
//! pending buffer: a newer push overwrites an unconsumed one, and a push that
//! would have to wait for the lock is dropped. Only the most recent audio
//! matters for visualization.
//!
//! [`TapProcessor`] is the consumer side, owned by the pipeline. It swaps the
//! pending buffer out and runs the [`SpectrumAnalyzer`] on it.

use std::sync::{Arc, Mutex};
use tracing::{debug, trace};
use volspire_common::config::AnalyzerConfig;

use super::analyzer::SpectrumAnalyzer;
use crate::error::Result;

/// Host facility that can attach a tap to a loaded source
pub trait SampleSource: Send {
    /// Start delivering samples of the source at `url` into `sink`
    ///
    /// Failure leaves playback unaffected; the spectrum stays at zero.
    fn install(&mut self, url: &str, sink: TapSink) -> Result<()>;

    /// Stop delivering samples for the current source
    fn remove(&mut self);
}

#[derive(Debug, Default)]
struct PendingBuffer {
    samples: Vec<f32>,
    channel_count: usize,
    fresh: bool,
}

/// Producer handle for the tap callback thread
#[derive(Debug, Clone)]
pub struct TapSink {
    slot: Arc<Mutex<PendingBuffer>>,
}

impl TapSink {
    /// Offer a buffer; returns false if it was dropped
    ///
    /// Never blocks. Reuses the slot's allocation once it has grown to the
    /// callback's buffer size.
    pub fn push(&self, samples: &[f32], channel_count: usize) -> bool {
        match self.slot.try_lock() {
            Ok(mut pending) => {
                pending.samples.clear();
                pending.samples.extend_from_slice(samples);
                pending.channel_count = channel_count;
                pending.fresh = true;
                true
            }
            Err(_) => false,
        }
    }
}

/// Consumer side of the tap: pending buffer in, smoothed spectrum out
pub struct TapProcessor {
    analyzer: SpectrumAnalyzer,
    slot: Option<Arc<Mutex<PendingBuffer>>>,
    work: Vec<f32>,
}

impl TapProcessor {
    pub fn new(config: &AnalyzerConfig) -> Self {
        Self {
            analyzer: SpectrumAnalyzer::new(config),
            slot: None,
            work: Vec::with_capacity(config.fft_size * 2),
        }
    }

    pub fn band_count(&self) -> usize {
        self.analyzer.band_count()
    }

    /// Create a fresh sink for a new source, abandoning any previous one
    pub fn attach(&mut self) -> TapSink {
        let slot = Arc::new(Mutex::new(PendingBuffer {
            samples: Vec::with_capacity(self.work.capacity()),
            ..Default::default()
        }));
        self.slot = Some(Arc::clone(&slot));
        debug!("Sample tap attached");
        TapSink { slot }
    }

    /// Stop consuming; buffers pushed to the old sink are ignored from now on
    pub fn detach(&mut self) {
        if self.slot.take().is_some() {
            debug!("Sample tap detached");
        }
    }

    pub fn is_attached(&self) -> bool {
        self.slot.is_some()
    }

    /// Analyze the newest pending buffer, if any, and return the spectrum
    ///
    /// Without a new buffer the previous spectrum is returned unchanged.
    pub fn refresh(&mut self) -> &[f32] {
        let mut channel_count = 0;
        if let Some(slot) = &self.slot {
            if let Ok(mut pending) = slot.lock() {
                if pending.fresh {
                    std::mem::swap(&mut pending.samples, &mut self.work);
                    channel_count = pending.channel_count;
                    pending.fresh = false;
                }
            }
        }

        if channel_count > 0 {
            trace!("Analyzing {} tap samples", self.work.len());
            self.analyzer.analyze(&self.work, channel_count);
        }
        self.analyzer.spectrum()
    }

    #[cfg(test)]
    pub(crate) fn spectrum(&self) -> &[f32] {
        self.analyzer.spectrum()
    }

    pub fn reset(&mut self) {
        self.analyzer.reset();
    }
}
