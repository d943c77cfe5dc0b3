//! Simulated host audio facilities
//!
//! [`SimulatedOutput`] and [`SimulatedTap`] stand in for a platform player and
//! its sample tap. They keep time with the tokio clock, so tests running on a
//! paused runtime can advance playback deterministically, and the demo binary
//! can run without audio hardware.
//!
//! Each facility comes with a cloneable handle that plays the role of the
//! host side: it observes what the engine asked for and can raise the
//! asynchronous signals a real source would (finish, failure, late readiness).

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::time::Instant;
use tracing::debug;

use super::output::{AudioOutput, SourceEvents};
use super::tap::{SampleSource, TapSink};
use crate::error::{Error, Result};

/// Duration reported for sources without a configured one
pub const DEFAULT_SOURCE_DURATION: f64 = 180.0;

#[derive(Debug)]
struct OutputState {
    url: Option<String>,
    events: Option<SourceEvents>,
    rate: f32,
    /// Elapsed seconds at `since`
    position: f64,
    since: Instant,
    error: Option<String>,
    session_active: bool,
    durations: HashMap<String, f64>,
    defer_ready: bool,
    fail_loads: bool,
    load_count: usize,
    seeks: Vec<f64>,
}

impl OutputState {
    fn elapsed(&self) -> f64 {
        let running = self.since.elapsed().as_secs_f64() * f64::from(self.rate);
        self.position + running
    }

    /// Fold running time into `position` before the rate or position changes
    fn settle(&mut self) {
        self.position = self.elapsed();
        self.since = Instant::now();
    }
}

fn lock(state: &Mutex<OutputState>) -> MutexGuard<'_, OutputState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// In-process [`AudioOutput`] with a virtual clock
#[derive(Debug)]
pub struct SimulatedOutput {
    state: Arc<Mutex<OutputState>>,
}

/// Host-side view of a [`SimulatedOutput`]
#[derive(Debug, Clone)]
pub struct SimulatedOutputHandle {
    state: Arc<Mutex<OutputState>>,
}

impl SimulatedOutput {
    pub fn new() -> (Self, SimulatedOutputHandle) {
        let state = Arc::new(Mutex::new(OutputState {
            url: None,
            events: None,
            rate: 0.0,
            position: 0.0,
            since: Instant::now(),
            error: None,
            session_active: false,
            durations: HashMap::new(),
            defer_ready: false,
            fail_loads: false,
            load_count: 0,
            seeks: Vec::new(),
        }));
        (
            Self {
                state: Arc::clone(&state),
            },
            SimulatedOutputHandle { state },
        )
    }
}

impl AudioOutput for SimulatedOutput {
    fn load(&mut self, url: &str, events: SourceEvents) -> Result<()> {
        let mut state = lock(&self.state);
        if state.fail_loads {
            return Err(Error::AudioOutput(format!("cannot open {}", url)));
        }

        state.url = Some(url.to_string());
        state.rate = 0.0;
        state.position = 0.0;
        state.since = Instant::now();
        state.error = None;
        state.load_count += 1;

        if !state.defer_ready {
            let duration = state
                .durations
                .get(url)
                .copied()
                .unwrap_or(DEFAULT_SOURCE_DURATION);
            events.ready(duration);
        }
        state.events = Some(events);
        debug!("Simulated output loaded {}", url);
        Ok(())
    }

    fn play(&mut self) {
        self.set_rate(1.0);
    }

    fn pause(&mut self) {
        self.set_rate(0.0);
    }

    fn seek(&mut self, seconds: f64) {
        let mut state = lock(&self.state);
        state.position = seconds;
        state.since = Instant::now();
        state.seeks.push(seconds);
    }

    fn rate(&self) -> f32 {
        lock(&self.state).rate
    }

    fn set_rate(&mut self, rate: f32) {
        let mut state = lock(&self.state);
        state.settle();
        state.rate = rate;
    }

    fn elapsed(&self) -> f64 {
        lock(&self.state).elapsed()
    }

    fn has_error(&self) -> bool {
        lock(&self.state).error.is_some()
    }

    fn unload(&mut self) {
        let mut state = lock(&self.state);
        state.url = None;
        state.events = None;
        state.rate = 0.0;
        state.position = 0.0;
        state.error = None;
    }

    fn set_session_active(&mut self, active: bool) {
        lock(&self.state).session_active = active;
    }
}

impl SimulatedOutputHandle {
    pub fn url(&self) -> Option<String> {
        lock(&self.state).url.clone()
    }

    pub fn rate(&self) -> f32 {
        lock(&self.state).rate
    }

    pub fn elapsed(&self) -> f64 {
        lock(&self.state).elapsed()
    }

    pub fn session_active(&self) -> bool {
        lock(&self.state).session_active
    }

    /// Number of successful loads so far
    pub fn load_count(&self) -> usize {
        lock(&self.state).load_count
    }

    /// Seek targets requested so far, oldest first
    pub fn seeks(&self) -> Vec<f64> {
        lock(&self.state).seeks.clone()
    }

    /// Duration to report when `url` becomes ready
    pub fn set_duration(&self, url: impl Into<String>, seconds: f64) {
        lock(&self.state).durations.insert(url.into(), seconds);
    }

    /// Make subsequent loads fail synchronously
    pub fn set_fail_loads(&self, fail: bool) {
        lock(&self.state).fail_loads = fail;
    }

    /// Hold back readiness until [`ready`](Self::ready) is called
    pub fn set_defer_ready(&self, defer: bool) {
        lock(&self.state).defer_ready = defer;
    }

    /// Jump the playhead without recording a seek
    pub fn set_elapsed(&self, seconds: f64) {
        let mut state = lock(&self.state);
        state.position = seconds;
        state.since = Instant::now();
    }

    /// Events sender of the loaded source, if any
    ///
    /// Keeping a clone across a reload lets tests deliver signals from a
    /// replaced source.
    pub fn source_events(&self) -> Option<SourceEvents> {
        lock(&self.state).events.clone()
    }

    /// Report readiness of the loaded source
    pub fn ready(&self, duration: f64) {
        if let Some(events) = self.source_events() {
            events.ready(duration);
        }
    }

    /// Play the loaded source to its end
    pub fn finish(&self) {
        let events = {
            let mut state = lock(&self.state);
            state.settle();
            state.rate = 0.0;
            state.events.clone()
        };
        if let Some(events) = events {
            events.finished();
        }
    }

    /// Fail the loaded source
    pub fn fail(&self, message: &str) {
        let events = {
            let mut state = lock(&self.state);
            state.settle();
            state.rate = 0.0;
            state.error = Some(message.to_string());
            state.events.clone()
        };
        if let Some(events) = events {
            events.failed(message);
        }
    }
}

#[derive(Debug, Default)]
struct TapState {
    url: Option<String>,
    sink: Option<TapSink>,
    fail_install: bool,
}

/// In-process [`SampleSource`]; samples are pushed through its handle
#[derive(Debug)]
pub struct SimulatedTap {
    state: Arc<Mutex<TapState>>,
}

/// Host-side view of a [`SimulatedTap`]
#[derive(Debug, Clone)]
pub struct SimulatedTapHandle {
    state: Arc<Mutex<TapState>>,
}

fn lock_tap(state: &Mutex<TapState>) -> MutexGuard<'_, TapState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl SimulatedTap {
    pub fn new() -> (Self, SimulatedTapHandle) {
        let state = Arc::new(Mutex::new(TapState::default()));
        (
            Self {
                state: Arc::clone(&state),
            },
            SimulatedTapHandle { state },
        )
    }
}

impl SampleSource for SimulatedTap {
    fn install(&mut self, url: &str, sink: TapSink) -> Result<()> {
        let mut state = lock_tap(&self.state);
        if state.fail_install {
            return Err(Error::TapInstallFailure(format!(
                "{} has no audio track to tap",
                url
            )));
        }
        state.url = Some(url.to_string());
        state.sink = Some(sink);
        Ok(())
    }

    fn remove(&mut self) {
        let mut state = lock_tap(&self.state);
        state.url = None;
        state.sink = None;
    }
}

impl SimulatedTapHandle {
    /// Deliver a buffer as the tap callback would; false if nothing took it
    pub fn push(&self, samples: &[f32], channel_count: usize) -> bool {
        let sink = lock_tap(&self.state).sink.clone();
        sink.map_or(false, |sink| sink.push(samples, channel_count))
    }

    pub fn is_installed(&self) -> bool {
        lock_tap(&self.state).sink.is_some()
    }

    pub fn installed_url(&self) -> Option<String> {
        lock_tap(&self.state).url.clone()
    }

    pub fn set_fail_install(&self, fail: bool) {
        lock_tap(&self.state).fail_install = fail;
    }
}
