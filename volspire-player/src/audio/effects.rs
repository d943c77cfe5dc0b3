//! Speed and pitch effects
//!
//! Both effects are realized through a single output rate (varispeed): raising
//! the rate raises tempo and pitch together, like a turntable. Independent
//! pitch shifting is not supported.

use tracing::debug;
use volspire_common::AudioEffects;

use super::output::AudioOutput;

/// Output rate for a speed multiplier and a pitch shift in cents
///
/// `speed × 2^(cents / 1200)`
pub fn effective_rate(speed: f32, pitch_cents: f32) -> f32 {
    speed * 2f32.powf(pitch_cents / 1200.0)
}

/// Holds the current effects and pushes their rate to the output
#[derive(Debug, Default)]
pub struct EffectsProcessor {
    current: AudioEffects,
}

impl EffectsProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> AudioEffects {
        self.current
    }

    /// Rate the output should run at while playing
    pub fn playback_rate(&self) -> f32 {
        effective_rate(self.current.speed, self.current.pitch)
    }

    /// Store `effects`; if the output is running, retune it immediately
    ///
    /// A paused output keeps rate 0 and picks the new rate up on the next
    /// resume or play.
    pub fn apply(&mut self, effects: AudioEffects, output: Option<&mut dyn AudioOutput>) {
        self.current = effects;
        let rate = self.playback_rate();

        match output {
            Some(output) if output.rate() != 0.0 => {
                debug!("Applying effective rate {:.3} to running output", rate);
                output.set_rate(rate);
            }
            _ => debug!("Stored effective rate {:.3} for next resume", rate),
        }
    }

    /// Re-tune a freshly started output if the stored rate is not neutral
    pub fn reapply(&self, output: &mut dyn AudioOutput) {
        let rate = self.playback_rate();
        if rate != 1.0 {
            output.set_rate(rate);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::simulated::SimulatedOutput;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_effective_rate_reference_points() {
        assert!(approx(effective_rate(1.0, 0.0), 1.0));
        assert!(approx(effective_rate(1.0, 1200.0), 2.0));
        assert!(approx(effective_rate(1.0, -1200.0), 0.5));
        assert!(approx(effective_rate(0.5, 0.0), 0.5));
    }

    #[test]
    fn test_effective_rate_combines_speed_and_pitch() {
        assert!(approx(effective_rate(1.5, 1200.0), 3.0));
        // A semitone up is 2^(1/12)
        assert!(approx(effective_rate(1.0, 100.0), 2f32.powf(1.0 / 12.0)));
    }

    #[test]
    fn test_apply_to_running_output_sets_rate() {
        let (mut output, handle) = SimulatedOutput::new();
        output.play();

        let mut effects = EffectsProcessor::new();
        effects.apply(AudioEffects::new(1.5, 0.0), Some(&mut output));

        assert!(approx(handle.rate(), 1.5));
        assert!(approx(effects.playback_rate(), 1.5));
    }

    #[test]
    fn test_apply_to_paused_output_only_stores() {
        let (mut output, handle) = SimulatedOutput::new();
        output.pause();

        let mut effects = EffectsProcessor::new();
        effects.apply(AudioEffects::new(0.5, 0.0), Some(&mut output));

        assert_eq!(handle.rate(), 0.0);
        assert_eq!(effects.current(), AudioEffects::new(0.5, 0.0));

        output.play();
        effects.reapply(&mut output);
        assert!(approx(handle.rate(), 0.5));
    }

    #[test]
    fn test_apply_without_output() {
        let mut effects = EffectsProcessor::new();
        effects.apply(AudioEffects::new(2.0, -1200.0), None);
        assert!(approx(effects.playback_rate(), 1.0));
    }
}
