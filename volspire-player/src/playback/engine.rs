//! Engine task and its handle
//!
//! A single tokio task owns the [`PlaybackController`]. Commands from any
//! number of [`PlayerHandle`] clones and messages from the pipeline (timer
//! ticks, host source signals) are multiplexed onto that task, so every state
//! change happens in one place and in arrival order.

use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use volspire_common::{
    AudioEffects, EngineConfig, InterruptionEvent, PlayerEvent, RemoteCommand, TrackId,
};

use crate::audio::output::AudioOutput;
use crate::audio::tap::SampleSource;
use crate::error::{Error, Result};
use crate::media::MediaResolver;
use crate::state::{PlayerSnapshot, SharedState};
use crate::transport::TransportSurface;

use super::controller::PlaybackController;
use super::pipeline::PipelineMessage;

/// Host facilities the engine runs on
pub struct HostBindings {
    pub output: Box<dyn AudioOutput>,
    pub taps: Box<dyn SampleSource>,
    pub surface: Box<dyn TransportSurface>,
    pub media: Arc<dyn MediaResolver>,
}

/// Transport command accepted by the engine
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerCommand {
    Play { track: TrackId, queue: Vec<TrackId> },
    TogglePlayPause,
    Resume,
    Pause,
    Stop,
    Forward,
    Backward,
    Seek(f64),
    ApplyEffects(AudioEffects),
    Remote(RemoteCommand),
    Interruption(InterruptionEvent),
}

enum EngineMessage {
    Command {
        command: PlayerCommand,
        reply: Option<oneshot::Sender<Result<()>>>,
    },
    Shutdown,
}

pub struct PlayerEngine {
    controller: PlaybackController,
    commands: mpsc::UnboundedReceiver<EngineMessage>,
    pipeline_rx: mpsc::UnboundedReceiver<PipelineMessage>,
}

impl PlayerEngine {
    /// Validate `config`, build the engine on `host` and start its task
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(config: EngineConfig, host: HostBindings) -> Result<PlayerHandle> {
        config.validate()?;

        let shared = Arc::new(SharedState::new(&config.analyzer));
        let (controller, pipeline_rx) =
            PlaybackController::from_host(&config, host, Arc::clone(&shared));
        let (tx, commands) = mpsc::unbounded_channel();

        let engine = Self {
            controller,
            commands,
            pipeline_rx,
        };
        let task = tokio::spawn(engine.run());

        Ok(PlayerHandle {
            tx,
            shared,
            task: Arc::new(Mutex::new(Some(task))),
        })
    }

    async fn run(self) {
        let Self {
            mut controller,
            mut commands,
            mut pipeline_rx,
        } = self;
        info!("Playback engine started");

        loop {
            tokio::select! {
                biased;
                message = commands.recv() => match message {
                    Some(EngineMessage::Command { command, reply }) => {
                        let result = controller.execute(command.clone());
                        if let Err(e) = &result {
                            warn!("{:?} failed: {}", command, e);
                        }
                        if let Some(reply) = reply {
                            // Caller may have stopped waiting
                            let _ = reply.send(result);
                        }
                    }
                    Some(EngineMessage::Shutdown) | None => break,
                },
                Some(message) = pipeline_rx.recv() => {
                    controller.handle_pipeline_message(message);
                }
            }
        }

        controller.shutdown();
        info!("Playback engine stopped");
    }
}

/// Cloneable handle to a running engine
#[derive(Clone)]
pub struct PlayerHandle {
    tx: mpsc::UnboundedSender<EngineMessage>,
    shared: Arc<SharedState>,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl PlayerHandle {
    /// Replace the queue and play `track` from it
    pub async fn play(&self, track: impl Into<TrackId>, queue: Vec<TrackId>) -> Result<()> {
        self.request(PlayerCommand::Play {
            track: track.into(),
            queue,
        })
        .await
    }

    pub async fn toggle_play_pause(&self) -> Result<()> {
        self.request(PlayerCommand::TogglePlayPause).await
    }

    pub async fn resume(&self) -> Result<()> {
        self.request(PlayerCommand::Resume).await
    }

    pub async fn pause(&self) -> Result<()> {
        self.request(PlayerCommand::Pause).await
    }

    pub async fn stop(&self) -> Result<()> {
        self.request(PlayerCommand::Stop).await
    }

    pub async fn forward(&self) -> Result<()> {
        self.request(PlayerCommand::Forward).await
    }

    pub async fn backward(&self) -> Result<()> {
        self.request(PlayerCommand::Backward).await
    }

    pub async fn seek(&self, seconds: f64) -> Result<()> {
        self.request(PlayerCommand::Seek(seconds)).await
    }

    pub async fn apply_effects(&self, effects: AudioEffects) -> Result<()> {
        self.request(PlayerCommand::ApplyEffects(effects)).await
    }

    /// Deliver a transport surface command without waiting for its outcome
    pub fn send_remote(&self, command: RemoteCommand) -> Result<()> {
        self.send(PlayerCommand::Remote(command), None)
    }

    /// Deliver an audio session interruption without waiting for its outcome
    pub fn send_interruption(&self, event: InterruptionEvent) -> Result<()> {
        self.send(PlayerCommand::Interruption(event), None)
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        self.shared.snapshot()
    }

    pub fn subscribe_snapshots(&self) -> watch::Receiver<PlayerSnapshot> {
        self.shared.subscribe_snapshots()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<PlayerEvent> {
        self.shared.subscribe_events()
    }

    /// Stop playback and wait for the engine task to exit
    ///
    /// Commands sent after this fail with [`Error::EngineClosed`].
    pub async fn shutdown(&self) -> Result<()> {
        // Already gone is fine
        let _ = self.tx.send(EngineMessage::Shutdown);

        let task = self.task.lock().await.take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!("Engine task ended abnormally: {}", e);
                return Err(Error::EngineClosed);
            }
        }
        Ok(())
    }

    async fn request(&self, command: PlayerCommand) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(command, Some(reply))?;
        rx.await.map_err(|_| Error::EngineClosed)?
    }

    fn send(
        &self,
        command: PlayerCommand,
        reply: Option<oneshot::Sender<Result<()>>>,
    ) -> Result<()> {
        self.tx
            .send(EngineMessage::Command { command, reply })
            .map_err(|_| Error::EngineClosed)
    }
}
