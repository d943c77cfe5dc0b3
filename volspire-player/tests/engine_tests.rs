//! Engine task tests through the public handle
//!
//! Commands and host signals arrive from other tasks; the engine serializes
//! them and publishes snapshots and events.

mod helpers;

use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use volspire_common::{
    EngineConfig, InterruptionEvent, PlaybackState, PlayerEvent, RemoteCommand, TrackId,
};
use volspire_player::audio::{SimulatedOutput, SimulatedOutputHandle, SimulatedTap};
use volspire_player::{Error, HostBindings, PlayerEngine, PlayerHandle};

use helpers::{catalog, ids, url_of, RecordingSurface};

fn start(names: &[&str]) -> (PlayerHandle, SimulatedOutputHandle) {
    let (output, output_handle) = SimulatedOutput::new();
    let (taps, _tap_handle) = SimulatedTap::new();
    let handle = PlayerEngine::spawn(
        EngineConfig::default(),
        HostBindings {
            output: Box::new(output),
            taps: Box::new(taps),
            surface: Box::new(RecordingSurface::default()),
            media: Arc::new(catalog(names)),
        },
    )
    .unwrap();
    (handle, output_handle)
}

/// Wait until the snapshot satisfies `done`
async fn wait_for(handle: &PlayerHandle, done: impl Fn(&PlaybackState) -> bool) -> PlaybackState {
    let mut snapshots = handle.subscribe_snapshots();
    timeout(Duration::from_secs(5), async {
        loop {
            let state = snapshots.borrow_and_update().state.clone();
            if done(&state) {
                return state;
            }
            snapshots.changed().await.unwrap();
        }
    })
    .await
    .expect("snapshot condition not reached")
}

#[tokio::test(start_paused = true)]
async fn test_commands_round_trip() {
    let (handle, output) = start(&["a", "b", "c"]);

    handle.play("a", ids(&["a", "b", "c"])).await.unwrap();
    assert_eq!(
        handle.snapshot().state,
        PlaybackState::Playing(TrackId::new("a"))
    );
    assert_eq!(output.url(), Some(url_of("a")));

    handle.forward().await.unwrap();
    handle.forward().await.unwrap();
    assert_eq!(
        handle.snapshot().state,
        PlaybackState::Playing(TrackId::new("c"))
    );

    handle.pause().await.unwrap();
    assert_eq!(output.rate(), 0.0);
    handle.toggle_play_pause().await.unwrap();
    assert_eq!(output.rate(), 1.0);

    handle.seek(12.0).await.unwrap();
    assert_eq!(output.seeks(), vec![12.0]);

    handle.stop().await.unwrap();
    assert_eq!(output.url(), None);

    handle.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_errors_are_returned_to_caller() {
    let (handle, _output) = start(&["a"]);

    let err = handle.play("x", ids(&["x"])).await.unwrap_err();
    assert_eq!(err, Error::UnresolvedMedia("x".into()));

    handle.play("a", ids(&["a"])).await.unwrap();
    assert!(matches!(
        handle.forward().await,
        Err(Error::InvalidRequest(_))
    ));

    // Engine keeps serving after a failed command
    handle.pause().await.unwrap();
    assert_eq!(
        handle.snapshot().state,
        PlaybackState::Paused(Some(TrackId::new("a")))
    );
    handle.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_host_finish_advances_queue() {
    let (handle, output) = start(&["a", "b"]);
    let mut events = handle.subscribe_events();
    handle.play("a", ids(&["a", "b"])).await.unwrap();

    output.finish();
    let state = wait_for(&handle, |s| *s == PlaybackState::Playing(TrackId::new("b"))).await;
    assert!(state.is_playing());
    assert_eq!(output.url(), Some(url_of("b")));

    let finished = timeout(Duration::from_secs(1), async {
        loop {
            if let PlayerEvent::TrackFinished { track, .. } = events.recv().await.unwrap() {
                return track;
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(finished.as_str(), "a");

    handle.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_remote_and_interruption_signals() {
    let (handle, output) = start(&["a", "b"]);
    handle.play("a", ids(&["a", "b"])).await.unwrap();

    handle.send_remote(RemoteCommand::NextTrack).unwrap();
    wait_for(&handle, |s| *s == PlaybackState::Playing(TrackId::new("b"))).await;

    handle.send_interruption(InterruptionEvent::Began).unwrap();
    wait_for(&handle, |s| !s.is_playing()).await;
    assert_eq!(handle.snapshot().interrupted, Some(TrackId::new("b")));
    assert!(!output.session_active());

    handle
        .send_interruption(InterruptionEvent::Ended {
            should_resume: true,
        })
        .unwrap();
    wait_for(&handle, |s| s.is_playing()).await;
    assert_eq!(handle.snapshot().interrupted, None);

    handle.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_progress_ticks_reach_subscribers() {
    let (handle, _output) = start(&["a"]);
    let mut events = handle.subscribe_events();
    handle.play("a", ids(&["a"])).await.unwrap();

    let progress = timeout(Duration::from_secs(2), async {
        loop {
            if let PlayerEvent::PlaybackProgress {
                track,
                elapsed,
                duration,
                ..
            } = events.recv().await.unwrap()
            {
                return (track, elapsed, duration);
            }
        }
    })
    .await
    .unwrap();

    assert_eq!(progress.0, Some(TrackId::new("a")));
    assert!(progress.1 >= 0.5 - 1e-9);
    assert_eq!(progress.2, 180.0);
    handle.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_playback_and_closes() {
    let (handle, output) = start(&["a"]);
    handle.play("a", ids(&["a"])).await.unwrap();

    handle.shutdown().await.unwrap();
    assert_eq!(output.url(), None);
    assert_eq!(output.rate(), 0.0);
    assert!(!output.session_active());
    assert_eq!(
        handle.snapshot().state,
        PlaybackState::Paused(Some(TrackId::new("a")))
    );

    assert_eq!(handle.resume().await, Err(Error::EngineClosed));
    assert_eq!(
        handle.send_remote(RemoteCommand::Play),
        Err(Error::EngineClosed)
    );
    // Second shutdown is harmless
    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let mut config = EngineConfig::default();
    config.analyzer.band_count = 0;

    let (output, _) = SimulatedOutput::new();
    let (taps, _) = SimulatedTap::new();
    let result = PlayerEngine::spawn(
        config,
        HostBindings {
            output: Box::new(output),
            taps: Box::new(taps),
            surface: Box::new(RecordingSurface::default()),
            media: Arc::new(catalog(&["a"])),
        },
    );
    assert!(matches!(result, Err(Error::Config(_))));
}
