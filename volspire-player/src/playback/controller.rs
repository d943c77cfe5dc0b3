//! Playback controller
//!
//! The transport state machine: queue, current track, play/pause,
//! forward/backward with wraparound, end-of-track advance and interruption
//! handling. It drives the [`AudioPipeline`], keeps the system transport
//! surface in sync and publishes snapshots and events through
//! [`SharedState`].
//!
//! All methods run on the engine task. None of them block or await.

use std::sync::Arc;
use tracing::{debug, info, warn};
use volspire_common::{
    AudioEffects, CommandProfile, EngineConfig, InterruptionEvent, MediaMeta, NowPlayingInfo,
    PlaybackProgress, PlaybackState, PlayerEvent, RemoteCommand, TrackId,
};

use crate::error::{Error, Result};
use crate::media::MediaResolver;
use crate::state::SharedState;
use crate::transport::{is_command_enabled, TransportSurface};

use super::engine::{HostBindings, PlayerCommand};
use super::pipeline::{AudioPipeline, PipelineEvent, PipelineMessage};

pub struct PlaybackController {
    pipeline: AudioPipeline,
    media: Arc<dyn MediaResolver>,
    surface: Box<dyn TransportSurface>,
    shared: Arc<SharedState>,
    restart_threshold_secs: f64,

    state: PlaybackState,
    queue: Vec<TrackId>,
    command_profile: CommandProfile,
    progress: Option<PlaybackProgress>,
    current_meta: Option<MediaMeta>,
    now_playing: Option<NowPlayingInfo>,
    interrupted: Option<TrackId>,
}

impl PlaybackController {
    pub fn new(
        config: &EngineConfig,
        pipeline: AudioPipeline,
        media: Arc<dyn MediaResolver>,
        surface: Box<dyn TransportSurface>,
        shared: Arc<SharedState>,
    ) -> Self {
        let mut controller = Self {
            pipeline,
            media,
            surface,
            shared,
            restart_threshold_secs: config.timing.restart_threshold_secs,
            state: PlaybackState::default(),
            queue: Vec::new(),
            command_profile: CommandProfile::for_queue_len(0),
            progress: None,
            current_meta: None,
            now_playing: None,
            interrupted: None,
        };
        controller.update_command_profile();
        controller
    }

    /// Build a controller and its pipeline from host facilities
    ///
    /// Messages on the returned receiver must be fed back through
    /// [`handle_pipeline_message`](Self::handle_pipeline_message).
    pub fn from_host(
        config: &EngineConfig,
        host: HostBindings,
        shared: Arc<SharedState>,
    ) -> (Self, tokio::sync::mpsc::UnboundedReceiver<PipelineMessage>) {
        let (pipeline, rx) = AudioPipeline::new(config, host.output, host.taps);
        let controller = Self::new(config, pipeline, host.media, host.surface, shared);
        (controller, rx)
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn queue(&self) -> &[TrackId] {
        &self.queue
    }

    pub fn command_profile(&self) -> CommandProfile {
        self.command_profile
    }

    pub fn progress(&self) -> Option<PlaybackProgress> {
        self.progress
    }

    pub fn interrupted(&self) -> Option<&TrackId> {
        self.interrupted.as_ref()
    }

    pub fn effects(&self) -> AudioEffects {
        self.pipeline.effects()
    }

    pub fn pipeline(&self) -> &AudioPipeline {
        &self.pipeline
    }

    /// Run one command
    pub fn execute(&mut self, command: PlayerCommand) -> Result<()> {
        match command {
            PlayerCommand::Play { track, queue } => self.play(track, queue),
            PlayerCommand::TogglePlayPause => self.toggle_play_pause(),
            PlayerCommand::Resume => self.resume(),
            PlayerCommand::Pause => self.pause(),
            PlayerCommand::Stop => self.stop(),
            PlayerCommand::Forward => self.forward(),
            PlayerCommand::Backward => self.backward(),
            PlayerCommand::Seek(seconds) => self.seek(seconds),
            PlayerCommand::ApplyEffects(effects) => self.apply_effects(effects),
            PlayerCommand::Remote(command) => self.remote_command(command),
            PlayerCommand::Interruption(event) => self.interruption(event),
        }
    }

    /// Replace the queue with `queue` and play `track` from it
    ///
    /// `track` must be in `queue` and must resolve to an audio URL; otherwise
    /// nothing changes. Playing the track that is already playing only
    /// replaces the queue.
    pub fn play(&mut self, track: TrackId, queue: Vec<TrackId>) -> Result<()> {
        let result = self.play_inner(track, queue);
        self.settle(result)
    }

    pub fn toggle_play_pause(&mut self) -> Result<()> {
        let result = if self.state.is_playing() {
            self.pause_inner();
            Ok(())
        } else {
            self.resume_inner()
        };
        self.settle(result)
    }

    /// Continue the paused track, or start the queue head if none
    pub fn resume(&mut self) -> Result<()> {
        let result = self.resume_inner();
        self.settle(result)
    }

    pub fn pause(&mut self) -> Result<()> {
        self.pause_inner();
        self.settle(Ok(()))
    }

    /// Tear down the active source, keeping the current track
    pub fn stop(&mut self) -> Result<()> {
        self.pipeline.stop();
        if let Some(track) = self.state.current().cloned() {
            self.set_state(PlaybackState::Paused(Some(track)));
        }
        self.progress = None;
        self.push_now_playing();
        self.settle(Ok(()))
    }

    /// Next queue entry, wrapping from last to first
    pub fn forward(&mut self) -> Result<()> {
        let result = self.forward_inner();
        self.settle(result)
    }

    /// Previous queue entry, wrapping from first to last
    ///
    /// Past the restart threshold the current track is restarted instead.
    pub fn backward(&mut self) -> Result<()> {
        let result = self.backward_inner();
        self.settle(result)
    }

    pub fn seek(&mut self, seconds: f64) -> Result<()> {
        let result = if seconds.is_finite() {
            self.pipeline.seek(seconds);
            self.push_now_playing();
            Ok(())
        } else {
            Err(Error::InvalidRequest(format!(
                "seek target {} is not a position",
                seconds
            )))
        };
        self.settle(result)
    }

    /// Store effects (clamped to their ranges) for this and later tracks
    pub fn apply_effects(&mut self, effects: AudioEffects) -> Result<()> {
        let effects = effects.clamped();
        self.pipeline.apply_effects(effects);
        info!(
            "Effects set to speed {:.2}, pitch {:.0} cents (rate {:.3})",
            effects.speed,
            effects.pitch,
            self.pipeline.playback_rate()
        );
        self.shared.broadcast_event(PlayerEvent::EffectsChanged {
            effects,
            rate: self.pipeline.playback_rate(),
            timestamp: chrono::Utc::now(),
        });
        self.push_now_playing();
        self.settle(Ok(()))
    }

    /// Command from the system transport surface
    ///
    /// Stop is treated as pause so the surface keeps the track.
    pub fn remote_command(&mut self, command: RemoteCommand) -> Result<()> {
        debug!("Remote command {:?}", command);
        if !is_command_enabled(&self.command_profile, &command) {
            warn!("Remote command {:?} is disabled", command);
            return Err(Error::InvalidRequest(format!(
                "remote command {:?} is disabled",
                command
            )));
        }
        match command {
            RemoteCommand::Play => self.resume(),
            RemoteCommand::Pause | RemoteCommand::Stop => self.pause(),
            RemoteCommand::TogglePlayPause => self.toggle_play_pause(),
            RemoteCommand::NextTrack => self.forward(),
            RemoteCommand::PreviousTrack => self.backward(),
            RemoteCommand::ChangePlaybackPosition { position } => self.seek(position),
        }
    }

    pub fn interruption(&mut self, event: InterruptionEvent) -> Result<()> {
        let result = match event {
            InterruptionEvent::Began => {
                self.interruption_began();
                Ok(())
            }
            InterruptionEvent::Ended { should_resume } => self.interruption_ended(should_resume),
        };
        self.settle(result)
    }

    /// Feed a pipeline tick or host signal through
    pub fn handle_pipeline_message(&mut self, message: PipelineMessage) {
        self.pipeline.handle_message(message);
        // End-of-track failures are logged where they happen
        let _ = self.settle(Ok(()));
    }

    /// Stop playback for good; used when the engine shuts down
    pub fn shutdown(&mut self) {
        info!("Shutting down playback");
        self.pipeline.stop();
        self.pipeline.set_session_active(false);
        if let Some(track) = self.state.current().cloned() {
            self.set_state(PlaybackState::Paused(Some(track)));
        }
        let _ = self.settle(Ok(()));
    }

    fn play_inner(&mut self, track: TrackId, queue: Vec<TrackId>) -> Result<()> {
        let Some(index) = queue.iter().position(|t| *t == track) else {
            warn!("Play request for {} which is not in its queue", track);
            return Err(Error::InvalidRequest(format!(
                "track {} is not in the queue",
                track
            )));
        };
        if self.media.audio_url(&track).is_none() {
            warn!("No audio URL found for {}", track);
            return Err(Error::UnresolvedMedia(track));
        }

        info!("Playing {} ({} of {})", track, index + 1, queue.len());
        self.replace_queue(queue);
        self.start_track(index, false)
    }

    fn pause_inner(&mut self) {
        match self.state.clone() {
            PlaybackState::Playing(track) => {
                self.pipeline.pause();
                self.set_state(PlaybackState::Paused(Some(track)));
                self.push_now_playing();
            }
            PlaybackState::Paused(_) => debug!("Pause while not playing"),
        }
    }

    fn resume_inner(&mut self) -> Result<()> {
        let Some(track) = self.state.current().cloned() else {
            let Some(first) = self.queue.first().cloned() else {
                debug!("Resume with an empty queue, nothing to play");
                return Ok(());
            };
            let queue = self.queue.clone();
            return self.play_inner(first, queue);
        };

        if self.pipeline.has_source() {
            self.pipeline.set_session_active(true);
            self.pipeline.resume();
            self.set_state(PlaybackState::Playing(track));
            self.update_command_profile();
            self.push_now_playing();
            return Ok(());
        }

        // Source was stopped or failed to load: start over
        match self.index_of(&track) {
            Some(index) => self.start_track(index, true),
            None => {
                warn!("Cannot resume {}: not in queue", track);
                Err(Error::InvalidRequest(format!(
                    "track {} is not in the queue",
                    track
                )))
            }
        }
    }

    fn forward_inner(&mut self) -> Result<()> {
        let index = self.navigable_index()?;
        let next = (index + 1) % self.queue.len();
        self.start_track(next, true)
    }

    fn backward_inner(&mut self) -> Result<()> {
        let index = self.navigable_index()?;

        let elapsed = self.pipeline.elapsed();
        if elapsed > self.restart_threshold_secs {
            info!("Restarting current track ({:.1}s elapsed)", elapsed);
            self.pipeline.seek(0.0);
            self.push_now_playing();
            return Ok(());
        }

        let len = self.queue.len();
        let previous = (index + len - 1) % len;
        self.start_track(previous, true)
    }

    /// Queue index of the current track, if the queue allows switching
    fn navigable_index(&self) -> Result<usize> {
        if self.queue.len() < 2 {
            debug!("Track switching needs at least two queued tracks");
            return Err(Error::InvalidRequest(
                "queue has fewer than two tracks".to_string(),
            ));
        }
        let Some(track) = self.state.current() else {
            return Err(Error::InvalidRequest("no current track".to_string()));
        };
        self.index_of(track).ok_or_else(|| {
            warn!("Current track {} is not in the queue", track);
            Error::InvalidRequest(format!("track {} is not in the queue", track))
        })
    }

    /// Advance after the active source played to its end
    fn track_finished(&mut self) -> Result<()> {
        let finished = self.state.current().cloned();
        if let Some(track) = &finished {
            info!("Finished {}", track);
            self.shared.broadcast_event(PlayerEvent::TrackFinished {
                track: track.clone(),
                timestamp: chrono::Utc::now(),
            });
        }

        let mut result = Ok(());
        if self.queue.len() > 1 {
            if let Some(index) = finished.as_ref().and_then(|t| self.index_of(t)) {
                // Forced: the next entry may be the same track again
                result = self.start_track((index + 1) % self.queue.len(), true);
                if result.is_ok() {
                    return result;
                }
            }
        }

        // Nothing to advance to, or the next track could not start. The
        // ended source is torn down even if a pause raced the finish.
        if self.state.current() == finished.as_ref() {
            self.pipeline.stop();
            if let Some(track) = finished {
                self.set_state(PlaybackState::Paused(Some(track)));
            }
        }
        self.push_now_playing();
        result
    }

    fn interruption_began(&mut self) {
        let remembered = match self.state.clone() {
            PlaybackState::Playing(track) => {
                info!("Interruption began, pausing {}", track);
                self.pause_inner();
                Some(track)
            }
            PlaybackState::Paused(_) => {
                info!("Interruption began while paused");
                None
            }
        };
        if remembered.is_some() {
            self.interrupted = remembered.clone();
        }
        self.pipeline.set_session_active(false);
        self.shared.broadcast_event(PlayerEvent::InterruptionBegan {
            remembered,
            timestamp: chrono::Utc::now(),
        });
    }

    fn interruption_ended(&mut self, should_resume: bool) -> Result<()> {
        self.pipeline.set_session_active(true);
        let remembered = self.interrupted.take();

        let mut resumed = None;
        let result = match remembered {
            Some(track) if should_resume => match self.index_of(&track) {
                Some(index) => {
                    info!("Interruption ended, resuming {}", track);
                    resumed = Some(track);
                    self.start_track(index, true)
                }
                None => {
                    warn!("Interrupted track {} left the queue", track);
                    Ok(())
                }
            },
            Some(track) => {
                info!("Interruption ended, not resuming {}", track);
                Ok(())
            }
            None => {
                debug!("Interruption ended with nothing to resume");
                Ok(())
            }
        };

        self.shared.broadcast_event(PlayerEvent::InterruptionEnded {
            should_resume,
            resumed,
            timestamp: chrono::Utc::now(),
        });
        result
    }

    /// Start the queue entry at `index`
    ///
    /// Unless `restart` is set, a track that is already playing is left
    /// alone. The previous source is always torn down before the new one
    /// loads. A load failure leaves the track current but paused.
    fn start_track(&mut self, index: usize, restart: bool) -> Result<()> {
        let Some(track) = self.queue.get(index).cloned() else {
            return Err(Error::InvalidRequest(format!(
                "no queue entry at index {}",
                index
            )));
        };

        if !restart && self.state == PlaybackState::Playing(track.clone()) {
            debug!("{} is already playing", track);
            self.update_command_profile();
            self.push_now_playing();
            return Ok(());
        }

        let meta = self.media.resolve(&track);
        let Some(url) = meta.as_ref().and_then(|m| m.audio_url.clone()) else {
            warn!("No audio URL found for {}", track);
            return Err(Error::UnresolvedMedia(track));
        };

        self.pipeline.stop();
        self.pipeline.set_session_active(true);
        self.progress = None;
        self.current_meta = meta;

        let result = self.pipeline.play(&url);
        match &result {
            Ok(()) => self.set_state(PlaybackState::Playing(track)),
            Err(e) => {
                warn!("Could not start {}: {}", track, e);
                self.set_state(PlaybackState::Paused(Some(track)));
            }
        }
        self.update_command_profile();
        self.push_now_playing();
        result
    }

    fn replace_queue(&mut self, queue: Vec<TrackId>) {
        self.queue = queue;
        self.update_command_profile();
        self.shared.broadcast_event(PlayerEvent::QueueChanged {
            queue: self.queue.clone(),
            command_profile: self.command_profile,
            timestamp: chrono::Utc::now(),
        });
    }

    fn index_of(&self, track: &TrackId) -> Option<usize> {
        self.queue.iter().position(|t| t == track)
    }

    fn set_state(&mut self, state: PlaybackState) {
        if self.state == state {
            return;
        }
        info!("Playback state: {} -> {}", self.state, state);
        if state.is_playing() {
            self.interrupted = None;
        }
        self.state = state.clone();
        self.shared.broadcast_event(PlayerEvent::PlaybackStateChanged {
            state,
            timestamp: chrono::Utc::now(),
        });
    }

    fn update_command_profile(&mut self) {
        let profile = CommandProfile::for_queue_len(self.queue.len());
        if profile != self.command_profile {
            debug!(
                "Track switching {}",
                if profile.is_switch_track_enabled {
                    "enabled"
                } else {
                    "disabled"
                }
            );
        }
        self.command_profile = profile;
        self.surface.set_command_profile(&profile);
    }

    /// Push the current track's snapshot to the transport surface
    ///
    /// Missing metadata degrades to "Unknown" fields.
    fn push_now_playing(&mut self) {
        let Some(track) = self.state.current() else {
            return;
        };
        let Some(queue_index) = self.index_of(track) else {
            return;
        };

        let meta = self.current_meta.as_ref();
        let title = meta
            .map(|m| m.title.clone())
            .filter(|title| !title.is_empty())
            .unwrap_or_else(|| NowPlayingInfo::UNKNOWN.to_string());
        let artist = meta
            .and_then(|m| m.artist.clone())
            .unwrap_or_else(|| NowPlayingInfo::UNKNOWN.to_string());

        let info = NowPlayingInfo {
            title,
            artist,
            artwork: meta.and_then(|m| m.artwork.clone()),
            is_playing: self.state.is_playing(),
            playback_rate: if self.state.is_playing() {
                self.pipeline.playback_rate()
            } else {
                0.0
            },
            queue_index,
            queue_count: self.queue.len(),
            elapsed: self.progress.map(|p| p.elapsed),
            duration: self
                .progress
                .map(|p| p.duration)
                .filter(|d| *d > 0.0)
                .or_else(|| meta.and_then(|m| m.duration)),
        };

        self.surface.set_now_playing(&info);
        self.shared.broadcast_event(PlayerEvent::NowPlayingChanged {
            info: info.clone(),
            timestamp: chrono::Utc::now(),
        });
        self.now_playing = Some(info);
    }

    /// Drain pipeline events, then publish the snapshot
    fn settle(&mut self, result: Result<()>) -> Result<()> {
        loop {
            let events = self.pipeline.take_events();
            if events.is_empty() {
                break;
            }
            for event in events {
                self.apply_pipeline_event(event);
            }
        }
        self.publish_snapshot();
        result
    }

    fn apply_pipeline_event(&mut self, event: PipelineEvent) {
        match event {
            PipelineEvent::Progress(progress) => {
                self.progress = Some(progress);
                self.shared.broadcast_event(PlayerEvent::PlaybackProgress {
                    track: self.state.current().cloned(),
                    elapsed: progress.elapsed,
                    duration: progress.duration,
                    timestamp: chrono::Utc::now(),
                });
                self.push_now_playing();
            }
            PipelineEvent::Spectrum(frame) => {
                self.shared.broadcast_event(PlayerEvent::SpectrumUpdated {
                    visual: frame.visual.clone(),
                    indicator: frame.indicator.clone(),
                    timestamp: chrono::Utc::now(),
                });
                self.shared.update(|snapshot| snapshot.spectrum = frame);
            }
            PipelineEvent::Finished => {
                if let Err(e) = self.track_finished() {
                    warn!("Advancing after end of track failed: {}", e);
                }
            }
            PipelineEvent::SourceFailed { url, message } => {
                self.shared.broadcast_event(PlayerEvent::SourceFailed {
                    url,
                    message,
                    timestamp: chrono::Utc::now(),
                });
            }
        }
    }

    fn publish_snapshot(&self) {
        let effects = self.pipeline.effects();
        let playback_rate = self.pipeline.playback_rate();
        self.shared.update(|snapshot| {
            snapshot.state = self.state.clone();
            if snapshot.queue != self.queue {
                snapshot.queue = self.queue.clone();
            }
            snapshot.command_profile = self.command_profile;
            snapshot.progress = self.progress;
            snapshot.effects = effects;
            snapshot.playback_rate = playback_rate;
            snapshot.now_playing = self.now_playing.clone();
            snapshot.interrupted = self.interrupted.clone();
        });
    }
}
