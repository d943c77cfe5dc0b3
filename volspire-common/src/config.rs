//! Engine configuration loading
//!
//! Configuration is a TOML file with three tables: `[analyzer]`, `[timing]`
//! and `[logging]`. Every field has a default, so an empty file (or no file)
//! yields the stock engine tuning.
//!
//! Config file resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. Platform config directory (`<config_dir>/volspire/config.toml`)
//! 4. Compiled defaults (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "VOLSPIRE_CONFIG";

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub analyzer: AnalyzerConfig,
    pub timing: TimingConfig,
    pub logging: LoggingConfig,
}

/// Spectrum analyzer tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// FFT frame size in samples
    pub fft_size: usize,
    /// Bands in the visual spectrum
    pub band_count: usize,
    /// Bands in the indicator spectrum (downsampled from the visual one)
    pub indicator_band_count: usize,
    /// Weight of the previous output when smoothing (0 = none, towards 1 = frozen)
    pub smoothing: f32,
    /// Level mapped to 0.0
    pub min_db: f32,
    /// Level mapped to 1.0
    pub max_db: f32,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            fft_size: 2048,
            band_count: 64,
            indicator_band_count: 5,
            smoothing: 0.7,
            min_db: -80.0,
            max_db: 0.0,
        }
    }
}

/// Timer cadences and transport thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub progress_interval_ms: u64,
    pub spectrum_interval_ms: u64,
    /// `backward` restarts the current track instead of changing track past this point
    pub restart_threshold_secs: f64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            progress_interval_ms: 500,
            spectrum_interval_ms: 100,
            restart_threshold_secs: 3.0,
        }
    }
}

impl TimingConfig {
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    pub fn spectrum_interval(&self) -> Duration {
        Duration::from_millis(self.spectrum_interval_ms)
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when RUST_LOG is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading engine config from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Resolve the config file location and load it, or fall back to defaults
    ///
    /// An explicitly requested file (argument or environment variable) must
    /// exist; the platform default file is optional.
    pub fn resolve(cli_arg: Option<&Path>) -> Result<Self> {
        match resolve_config_path(cli_arg, CONFIG_ENV_VAR) {
            Some(path) => {
                info!("Using config file: {}", path.display());
                Self::load(&path)
            }
            None => {
                info!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Check value ranges that would break the engine
    pub fn validate(&self) -> Result<()> {
        let a = &self.analyzer;
        if a.fft_size < 2 || a.fft_size % 2 != 0 {
            return Err(Error::Config(format!(
                "analyzer.fft_size must be an even number >= 2 (got {})",
                a.fft_size
            )));
        }
        if a.band_count == 0 || a.indicator_band_count == 0 {
            return Err(Error::Config(
                "analyzer band counts must be greater than zero".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&a.smoothing) {
            return Err(Error::Config(format!(
                "analyzer.smoothing must be in [0, 1) (got {})",
                a.smoothing
            )));
        }
        if !(a.min_db < a.max_db) {
            return Err(Error::Config(format!(
                "analyzer.min_db ({}) must be below analyzer.max_db ({})",
                a.min_db, a.max_db
            )));
        }

        let t = &self.timing;
        if t.progress_interval_ms == 0 || t.spectrum_interval_ms == 0 {
            return Err(Error::Config(
                "timing intervals must be greater than zero".to_string(),
            ));
        }
        if !(t.restart_threshold_secs >= 0.0) {
            return Err(Error::Config(format!(
                "timing.restart_threshold_secs must be >= 0 (got {})",
                t.restart_threshold_secs
            )));
        }
        Ok(())
    }
}

/// Locate the config file following the priority order above
///
/// Returns `None` when neither an explicit path nor the platform file exists.
pub fn resolve_config_path(cli_arg: Option<&Path>, env_var_name: &str) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Platform config directory
    default_config_path().filter(|path| path.exists())
}

/// Platform config file path (`~/.config/volspire/config.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("volspire").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.analyzer.fft_size, 2048);
        assert_eq!(config.analyzer.band_count, 64);
        assert_eq!(config.analyzer.indicator_band_count, 5);
        assert_eq!(config.analyzer.smoothing, 0.7);
        assert_eq!(config.analyzer.min_db, -80.0);
        assert_eq!(config.analyzer.max_db, 0.0);
        assert_eq!(config.timing.progress_interval(), Duration::from_millis(500));
        assert_eq!(config.timing.spectrum_interval(), Duration::from_millis(100));
        assert_eq!(config.timing.restart_threshold_secs, 3.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_toml_is_default() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            [analyzer]
            band_count = 32

            [timing]
            restart_threshold_secs = 5.0
            "#,
        )
        .unwrap();
        assert_eq!(config.analyzer.band_count, 32);
        assert_eq!(config.analyzer.fft_size, 2048);
        assert_eq!(config.timing.restart_threshold_secs, 5.0);
        assert_eq!(config.timing.progress_interval_ms, 500);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = EngineConfig::default();
        config.analyzer.fft_size = 1023;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = EngineConfig::default();
        config.analyzer.smoothing = 1.0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.analyzer.min_db = 0.0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.timing.spectrum_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.timing.restart_threshold_secs = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let result = EngineConfig::from_toml_str("[analyzer\nfft_size = ");
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
