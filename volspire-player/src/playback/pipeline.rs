//! Audio pipeline
//!
//! Owns the host output, the sample tap, the effects processor and the two
//! periodic updates (progress and spectrum) for a single source at a time.
//!
//! **Source generations:** every `play` bumps a generation counter. Ticks and
//! host signals carry the generation they were created for and are dropped
//! when it no longer matches, so nothing from a torn-down source can reach
//! the controller after `stop` returns.
//!
//! The pipeline never calls back into its owner. Results are queued as
//! [`PipelineEvent`]s and collected with [`AudioPipeline::take_events`].

use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};
use volspire_common::config::TimingConfig;
use volspire_common::{AudioEffects, EngineConfig, PlaybackProgress, SpectrumFrame};

use crate::audio::analyzer::downsample;
use crate::audio::effects::EffectsProcessor;
use crate::audio::output::{AudioOutput, SourceEvents, SourceSignal};
use crate::audio::tap::{SampleSource, TapProcessor};
use crate::error::{Error, Result};

use super::scheduler::Ticker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickKind {
    Progress,
    Spectrum,
}

/// Message delivered to the engine task on behalf of the pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineMessage {
    Tick { generation: u64, kind: TickKind },
    Source { generation: u64, signal: SourceSignal },
}

/// Outcome of pipeline activity, for the controller
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    Progress(PlaybackProgress),
    Spectrum(SpectrumFrame),
    Finished,
    SourceFailed { url: String, message: String },
}

pub struct AudioPipeline {
    output: Box<dyn AudioOutput>,
    taps: Box<dyn SampleSource>,
    tap: TapProcessor,
    effects: EffectsProcessor,
    timing: TimingConfig,
    indicator_band_count: usize,
    tx: mpsc::UnboundedSender<PipelineMessage>,

    generation: u64,
    current_url: Option<String>,
    duration: f64,
    elapsed: f64,
    source_error: Option<String>,

    progress_ticker: Option<Ticker>,
    spectrum_ticker: Option<Ticker>,
    outbox: Vec<PipelineEvent>,
}

impl AudioPipeline {
    /// Create a pipeline and the receiver its messages arrive on
    ///
    /// Everything received must be handed back through
    /// [`handle_message`](Self::handle_message).
    pub fn new(
        config: &EngineConfig,
        output: Box<dyn AudioOutput>,
        taps: Box<dyn SampleSource>,
    ) -> (Self, mpsc::UnboundedReceiver<PipelineMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let pipeline = Self {
            output,
            taps,
            tap: TapProcessor::new(&config.analyzer),
            effects: EffectsProcessor::new(),
            timing: config.timing.clone(),
            indicator_band_count: config.analyzer.indicator_band_count,
            tx,
            generation: 0,
            current_url: None,
            duration: 0.0,
            elapsed: 0.0,
            source_error: None,
            progress_ticker: None,
            spectrum_ticker: None,
            outbox: Vec::new(),
        };
        (pipeline, rx)
    }

    /// Load and start `url`
    ///
    /// No-op if `url` is already the active source and running. Otherwise the
    /// previous source is torn down first. A failing tap install is logged and
    /// playback continues without a spectrum.
    pub fn play(&mut self, url: &str) -> Result<()> {
        if self.current_url.as_deref() == Some(url) && self.output.rate() != 0.0 {
            debug!("Already playing {}", url);
            return Ok(());
        }

        self.stop();
        self.generation += 1;
        let generation = self.generation;
        info!("Loading source {} (generation {})", url, generation);

        let events = SourceEvents::new(generation, self.tx.clone());
        if let Err(e) = self.output.load(url, events) {
            error!("Failed to load {}: {}", url, e);
            return Err(Error::SourceFailure {
                url: url.to_string(),
                message: e.to_string(),
            });
        }
        self.current_url = Some(url.to_string());

        let sink = self.tap.attach();
        if let Err(e) = self.taps.install(url, sink) {
            warn!("{}; spectrum stays silent for {}", e, url);
            self.tap.detach();
        }

        self.output.play();
        self.effects.reapply(self.output.as_mut());
        self.start_progress_updates();
        self.start_spectrum_updates();
        Ok(())
    }

    /// Continue the loaded source at the current effects rate
    pub fn resume(&mut self) {
        if self.current_url.is_none() {
            debug!("Resume without a loaded source");
            return;
        }
        self.output.play();
        self.effects.reapply(self.output.as_mut());
        self.start_spectrum_updates();
    }

    /// Pause output; spectrum updates stop and a silent frame is emitted
    ///
    /// Progress updates keep running so the paused position stays visible.
    pub fn pause(&mut self) {
        self.output.pause();
        self.spectrum_ticker = None;
        self.tap.reset();
        self.emit_silence();
    }

    /// Tear down the active source
    ///
    /// Cancels both updates, removes the tap, unloads the output and emits a
    /// silent frame. Idempotent.
    pub fn stop(&mut self) {
        self.progress_ticker = None;
        self.spectrum_ticker = None;

        if let Some(url) = self.current_url.take() {
            self.taps.remove();
            self.output.pause();
            self.output.unload();
            debug!("Stopped source {}", url);
        }

        self.tap.detach();
        self.tap.reset();
        self.duration = 0.0;
        self.elapsed = 0.0;
        self.source_error = None;
        self.emit_silence();
    }

    pub fn seek(&mut self, seconds: f64) {
        if self.current_url.is_none() {
            debug!("Seek without a loaded source");
            return;
        }
        self.output.seek(seconds.max(0.0));
    }

    /// Store effects and retune the output if it is running
    pub fn apply_effects(&mut self, effects: AudioEffects) {
        let output: Option<&mut dyn AudioOutput> = if self.current_url.is_some() {
            Some(self.output.as_mut())
        } else {
            None
        };
        self.effects.apply(effects, output);
    }

    pub fn set_session_active(&mut self, active: bool) {
        debug!("Audio session {}", if active { "active" } else { "inactive" });
        self.output.set_session_active(active);
    }

    /// Process a tick or host signal; stale generations are ignored
    pub fn handle_message(&mut self, message: PipelineMessage) {
        match message {
            PipelineMessage::Tick { generation, kind } => {
                if !self.is_current(generation) {
                    trace!("Dropping stale {:?} tick (generation {})", kind, generation);
                    return;
                }
                match kind {
                    TickKind::Progress => self.emit_progress(),
                    TickKind::Spectrum => self.emit_spectrum(),
                }
            }
            PipelineMessage::Source { generation, signal } => {
                if !self.is_current(generation) {
                    debug!(
                        "Ignoring {:?} from replaced source (generation {})",
                        signal, generation
                    );
                    return;
                }
                self.handle_signal(signal);
            }
        }
    }

    /// Drain queued events
    pub fn take_events(&mut self) -> Vec<PipelineEvent> {
        std::mem::take(&mut self.outbox)
    }

    pub fn has_source(&self) -> bool {
        self.current_url.is_some()
    }

    pub fn current_url(&self) -> Option<&str> {
        self.current_url.as_deref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Duration reported by the source once ready; 0 when unknown
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Live playhead of the active source
    pub fn elapsed(&self) -> f64 {
        if self.current_url.is_some() {
            self.output.elapsed()
        } else {
            0.0
        }
    }

    pub fn is_running(&self) -> bool {
        self.current_url.is_some() && self.output.rate() != 0.0
    }

    pub fn effects(&self) -> AudioEffects {
        self.effects.current()
    }

    pub fn playback_rate(&self) -> f32 {
        self.effects.playback_rate()
    }

    pub fn is_updating_spectrum(&self) -> bool {
        self.spectrum_ticker.is_some()
    }

    pub fn is_updating_progress(&self) -> bool {
        self.progress_ticker.is_some()
    }

    fn is_current(&self, generation: u64) -> bool {
        generation == self.generation && self.current_url.is_some()
    }

    fn handle_signal(&mut self, signal: SourceSignal) {
        match signal {
            SourceSignal::Ready { duration } => {
                self.duration = if duration.is_finite() {
                    duration.max(0.0)
                } else {
                    0.0
                };
                info!("Source ready, duration {:.1}s", self.duration);
            }
            SourceSignal::Failed { message } => {
                let url = self.current_url.clone().unwrap_or_default();
                let failure = Error::SourceFailure {
                    url: url.clone(),
                    message: message.clone(),
                };
                error!("{}", failure);
                self.source_error = Some(message.clone());
                self.outbox.push(PipelineEvent::SourceFailed { url, message });
            }
            SourceSignal::Finished => {
                info!("Source played to end");
                self.outbox.push(PipelineEvent::Finished);
            }
        }
    }

    fn emit_progress(&mut self) {
        self.elapsed = self.output.elapsed();
        self.outbox.push(PipelineEvent::Progress(PlaybackProgress {
            elapsed: self.elapsed,
            duration: self.duration,
        }));
    }

    fn emit_spectrum(&mut self) {
        let healthy = self.source_error.is_none() && !self.output.has_error();
        if !healthy || self.output.rate() == 0.0 {
            self.emit_silence();
            return;
        }

        let visual = self.tap.refresh().to_vec();
        let indicator = downsample(&visual, self.indicator_band_count);
        self.outbox
            .push(PipelineEvent::Spectrum(SpectrumFrame { visual, indicator }));
    }

    fn emit_silence(&mut self) {
        self.outbox.push(PipelineEvent::Spectrum(SpectrumFrame::zeroed(
            self.tap.band_count(),
            self.indicator_band_count,
        )));
    }

    fn start_progress_updates(&mut self) {
        let tx = self.tx.clone();
        let generation = self.generation;
        self.progress_ticker = Some(Ticker::spawn(
            "progress",
            self.timing.progress_interval(),
            move || {
                tx.send(PipelineMessage::Tick {
                    generation,
                    kind: TickKind::Progress,
                })
                .is_ok()
            },
        ));
    }

    fn start_spectrum_updates(&mut self) {
        let tx = self.tx.clone();
        let generation = self.generation;
        self.spectrum_ticker = Some(Ticker::spawn(
            "spectrum",
            self.timing.spectrum_interval(),
            move || {
                tx.send(PipelineMessage::Tick {
                    generation,
                    kind: TickKind::Spectrum,
                })
                .is_ok()
            },
        ));
    }
}
