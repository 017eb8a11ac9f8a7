// Blink settings
// Loaded from ~/.config/cellblink/settings.toml

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

/// Where pending diff highlights are persisted between mounts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryBackend {
    /// Process memory only (survives remounts, not restarts)
    #[default]
    Memory,
    /// One JSON file per view/column under the recovery directory
    File,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoverySettings {
    pub backend: RecoveryBackend,

    /// Override for the file backend directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

impl Default for RecoverySettings {
    fn default() -> Self {
        Self {
            backend: RecoveryBackend::Memory,
            dir: None,
        }
    }
}

impl RecoverySettings {
    /// Directory used by the file backend
    pub fn effective_dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(|| {
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("cellblink")
                .join("recovery")
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlinkSettings {
    /// How often a highlighted cell flips on/off
    pub toggle_interval_ms: u64,

    /// How long a compare-with-previous highlight lasts
    pub diff_blink_minutes: f64,

    pub recovery: RecoverySettings,
}

impl Default for BlinkSettings {
    fn default() -> Self {
        Self {
            toggle_interval_ms: 1000,
            diff_blink_minutes: 10.0,
            recovery: RecoverySettings::default(),
        }
    }
}

impl BlinkSettings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cellblink")
            .join("settings.toml")
    }

    pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
        let settings: BlinkSettings =
            toml::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.toggle_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "toggle_interval_ms must be greater than 0".to_string(),
            ));
        }
        if !self.diff_blink_minutes.is_finite() || self.diff_blink_minutes <= 0.0 {
            return Err(ConfigError::Validation(format!(
                "diff_blink_minutes must be a positive number, got {}",
                self.diff_blink_minutes
            )));
        }
        if self.diff_blink_minutes > MAX_MINUTES {
            return Err(ConfigError::Validation(format!(
                "diff_blink_minutes must be at most {}, got {}",
                MAX_MINUTES, self.diff_blink_minutes
            )));
        }
        Ok(())
    }

    /// Load settings from disk, falling back to defaults
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Load settings from a specific file, falling back to defaults
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(contents) => match Self::from_toml(&contents) {
                Ok(settings) => settings,
                Err(e) => {
                    log::warn!("{} in {}, using defaults", e, path.display());
                    Self::default()
                }
            },
            Err(e) => {
                log::warn!("Error reading {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Save current settings to disk
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io(e.to_string()))?;
        }
        let text = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))?;
        fs::write(path, text).map_err(|e| ConfigError::Io(e.to_string()))
    }

    pub fn toggle_interval(&self) -> Duration {
        Duration::from_millis(self.toggle_interval_ms)
    }

    pub fn diff_duration(&self) -> Duration {
        minutes(self.diff_blink_minutes)
    }
}

/// Longest highlight or threshold window accepted anywhere (one year)
pub const MAX_MINUTES: f64 = 525_600.0;

/// Convert fractional minutes to a `Duration`. Negative, NaN or infinite input
/// is zero; anything past [`MAX_MINUTES`] is clamped to it.
pub fn minutes(m: f64) -> Duration {
    if !(m.is_finite() && m > 0.0) {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(m.min(MAX_MINUTES) * 60.0).unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = BlinkSettings::default();
        assert_eq!(s.toggle_interval(), Duration::from_secs(1));
        assert_eq!(s.diff_duration(), Duration::from_secs(600));
        assert_eq!(s.recovery.backend, RecoveryBackend::Memory);
    }

    #[test]
    fn test_parse_partial_toml() {
        let s = BlinkSettings::from_toml(
            r#"
diff_blink_minutes = 2.5

[recovery]
backend = "file"
dir = "/tmp/blinks"
"#,
        )
        .unwrap();
        assert_eq!(s.toggle_interval_ms, 1000);
        assert_eq!(s.diff_duration(), Duration::from_secs(150));
        assert_eq!(s.recovery.backend, RecoveryBackend::File);
        assert_eq!(s.recovery.effective_dir(), PathBuf::from("/tmp/blinks"));
    }

    #[test]
    fn test_rejects_zero_interval() {
        let err = BlinkSettings::from_toml("toggle_interval_ms = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_rejects_negative_duration() {
        let err = BlinkSettings::from_toml("diff_blink_minutes = -1.0").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_rejects_unknown_backend() {
        let err = BlinkSettings::from_toml("[recovery]\nbackend = \"redis\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_minutes_conversion() {
        assert_eq!(minutes(3.0), Duration::from_secs(180));
        assert_eq!(minutes(0.5), Duration::from_secs(30));
        assert_eq!(minutes(-1.0), Duration::ZERO);
        assert_eq!(minutes(f64::NAN), Duration::ZERO);
    }

    #[test]
    fn test_minutes_clamps_huge_values() {
        assert_eq!(minutes(1e300), Duration::from_secs(525_600 * 60));
        assert_eq!(minutes(MAX_MINUTES), minutes(MAX_MINUTES * 2.0));
        assert_eq!(minutes(f64::INFINITY), Duration::ZERO);
    }

    #[test]
    fn test_rejects_huge_duration() {
        let err = BlinkSettings::from_toml("diff_blink_minutes = 1e300").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));

        // Built in code, skipping validation: still no panic
        let s = BlinkSettings { diff_blink_minutes: 1e300, ..BlinkSettings::default() };
        assert_eq!(s.diff_duration(), minutes(MAX_MINUTES));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.toml");

        let mut s = BlinkSettings::default();
        s.toggle_interval_ms = 250;
        s.recovery.backend = RecoveryBackend::File;
        s.save_to(&path).unwrap();

        assert_eq!(BlinkSettings::load_from(&path), s);
    }

    #[test]
    fn test_load_falls_back_on_bad_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "toggle_interval_ms = \"fast\"").unwrap();
        assert_eq!(BlinkSettings::load_from(&path), BlinkSettings::default());

        let missing = dir.path().join("missing.toml");
        assert_eq!(BlinkSettings::load_from(&missing), BlinkSettings::default());
    }
}
