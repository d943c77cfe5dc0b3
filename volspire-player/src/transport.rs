//! System transport surface
//!
//! The lock-screen / media-key surface of the host OS. The engine pushes the
//! now-playing snapshot and the command profile to it; commands coming back
//! from it enter the engine as [`RemoteCommand`]s through the player handle.

use tracing::{debug, info};
use volspire_common::{CommandProfile, NowPlayingInfo, RemoteCommand};

pub trait TransportSurface: Send {
    /// Enable or disable commands to match `profile`
    fn set_command_profile(&mut self, profile: &CommandProfile);

    /// Replace the displayed now-playing information
    fn set_now_playing(&mut self, info: &NowPlayingInfo);
}

/// Whether a surface honouring `profile` offers `command`
///
/// Track switching is only offered for queues of more than one track; all
/// other commands are always available.
pub fn is_command_enabled(profile: &CommandProfile, command: &RemoteCommand) -> bool {
    match command {
        RemoteCommand::NextTrack | RemoteCommand::PreviousTrack => profile.is_switch_track_enabled,
        RemoteCommand::ChangePlaybackPosition { .. } => !profile.is_live_stream,
        _ => true,
    }
}

/// Surface that only logs what it is given
#[derive(Debug, Default)]
pub struct LoggingSurface {
    profile: Option<CommandProfile>,
}

impl LoggingSurface {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TransportSurface for LoggingSurface {
    fn set_command_profile(&mut self, profile: &CommandProfile) {
        if self.profile.as_ref() != Some(profile) {
            info!(
                "Transport commands: track switching {}",
                if profile.is_switch_track_enabled {
                    "enabled"
                } else {
                    "disabled"
                }
            );
            self.profile = Some(*profile);
        }
    }

    fn set_now_playing(&mut self, info: &NowPlayingInfo) {
        debug!(
            "Now playing: {} - {} [{}/{}] {} {:.1}/{:.1}s",
            info.artist,
            info.title,
            info.queue_index + 1,
            info.queue_count,
            if info.is_playing { "playing" } else { "paused" },
            info.elapsed.unwrap_or(0.0),
            info.duration.unwrap_or(0.0)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_switching_follows_queue_length() {
        let single = CommandProfile::for_queue_len(1);
        let many = CommandProfile::for_queue_len(3);

        assert!(!is_command_enabled(&single, &RemoteCommand::NextTrack));
        assert!(!is_command_enabled(&single, &RemoteCommand::PreviousTrack));
        assert!(is_command_enabled(&many, &RemoteCommand::NextTrack));
        assert!(is_command_enabled(&many, &RemoteCommand::PreviousTrack));
    }

    #[test]
    fn test_basic_commands_always_enabled() {
        let empty = CommandProfile::for_queue_len(0);
        for command in [
            RemoteCommand::Play,
            RemoteCommand::Pause,
            RemoteCommand::Stop,
            RemoteCommand::TogglePlayPause,
            RemoteCommand::ChangePlaybackPosition { position: 1.0 },
        ] {
            assert!(is_command_enabled(&empty, &command));
        }
    }
}
