//! Configuration and run parameters.
//!
//! Static settings load from config.json next to the executable, with
//! defaults for anything missing. Run parameters (target stat, press
//! duration, sample interval) come from the control surface as text and are
//! validated before the engine is allowed to start.

use anyhow::{Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::logging::LogSink;
use crate::region::RegionConfig;

/// Stat names the training screen can display, in classification priority
/// order.
pub const STAT_NAMES: &[&str] = &["STAMINA", "STRENGTH", "AGILITY", "DURABILITY", "MUSCLE"];

/// Key glyphs the training bar can display, in classification priority order.
pub const KEY_GLYPHS: &[&str] = &["Q", "W", "E", "A", "S", "D", "Z", "X", "C"];

/// Key the operator presses once to open the training interaction.
pub const TRIGGER_KEY: &str = "E";

/// Key the operator holds at the end of every cycle.
pub const HOLD_KEY: &str = "W";

/// Template-match score gates per call site. The word stage runs slightly
/// looser than the general default and the key stage looser still; small
/// glyph crops score lower than full stat-name crops.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct MatchThresholds {
    #[serde(default = "default_general_threshold")]
    pub general: f32,
    #[serde(default = "default_word_threshold")]
    pub word: f32,
    #[serde(default = "default_key_threshold")]
    pub key: f32,
}

fn default_general_threshold() -> f32 {
    0.75
}

fn default_word_threshold() -> f32 {
    0.72
}

fn default_key_threshold() -> f32 {
    0.70
}

impl Default for MatchThresholds {
    fn default() -> Self {
        Self {
            general: default_general_threshold(),
            word: default_word_threshold(),
            key: default_key_threshold(),
        }
    }
}

/// Complete static configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    /// Capture rectangle size and offset from screen center.
    #[serde(default)]
    pub region: RegionConfig,
    /// Template-match score gates.
    #[serde(default)]
    pub thresholds: MatchThresholds,
    /// Luminance cutoff for OCR binarization (pixels above become white).
    #[serde(default = "default_ocr_cutoff")]
    pub ocr_luminance_cutoff: u8,
    /// Whether to fall back to OCR when template matching decides nothing.
    #[serde(default = "default_true")]
    pub ocr_fallback: bool,
    /// Directory of stat-name reference images, relative to the executable.
    #[serde(default = "default_words_dir")]
    pub words_dir: String,
    /// Directory of key-glyph reference images, relative to the executable.
    #[serde(default = "default_keys_dir")]
    pub keys_dir: String,
    /// Default target stat when none is given on the command line.
    #[serde(default = "default_target")]
    pub target_stat: String,
    /// Default manual press window length in seconds.
    #[serde(default = "default_hold_seconds")]
    pub hold_seconds: f64,
    /// Default press-window sample interval in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: f64,
}

fn default_ocr_cutoff() -> u8 {
    180
}

fn default_true() -> bool {
    true
}

fn default_words_dir() -> String {
    "words".to_string()
}

fn default_keys_dir() -> String {
    "keys".to_string()
}

fn default_target() -> String {
    "STAMINA".to_string()
}

fn default_hold_seconds() -> f64 {
    60.0
}

fn default_interval_ms() -> f64 {
    100.0
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            region: RegionConfig::default(),
            thresholds: MatchThresholds::default(),
            ocr_luminance_cutoff: default_ocr_cutoff(),
            ocr_fallback: true,
            words_dir: default_words_dir(),
            keys_dir: default_keys_dir(),
            target_stat: default_target(),
            hold_seconds: default_hold_seconds(),
            interval_ms: default_interval_ms(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from the given path or returns defaults.
    pub fn load_or_default(path: &Path, log: &dyn LogSink) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(contents) => match serde_json::from_str(&contents) {
                    Ok(config) => {
                        log.append(&format!("Config loaded from {}", path.display()));
                        return config;
                    }
                    Err(e) => {
                        log.append(&format!(
                            "Failed to parse {}: {}. Using defaults.",
                            path.display(),
                            e
                        ));
                    }
                },
                Err(e) => {
                    log.append(&format!(
                        "Failed to read {}: {}. Using defaults.",
                        path.display(),
                        e
                    ));
                }
            }
        } else {
            log.append(&format!("{} not found. Using default config.", path.display()));
        }

        AppConfig::default()
    }
}

/// Parses a numeric field from operator input, rejecting non-numeric text
/// with the field name in the message.
pub fn parse_numeric(name: &str, raw: &str) -> Result<f64> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| anyhow!("{} must be numeric, got '{}'", name, raw))
}

/// Validated per-run parameters. The engine never starts with an invalid set.
#[derive(Clone, Debug)]
pub struct RunParams {
    /// Uppercase stat name the operator wants to train.
    pub target_stat: String,
    /// Length of the manual press window in seconds.
    pub hold_seconds: f64,
    /// Press interval in milliseconds; used as the press-window sample tick.
    pub interval_ms: f64,
    /// Optional bound on the number of cycles. `None` loops until stopped.
    pub max_cycles: Option<u32>,
}

impl RunParams {
    pub fn validate(
        target_stat: &str,
        hold_seconds: f64,
        interval_ms: f64,
        max_cycles: Option<u32>,
    ) -> Result<Self> {
        let target = target_stat.trim().to_uppercase();
        if !STAT_NAMES.contains(&target.as_str()) {
            bail!(
                "unknown target stat '{}', expected one of {}",
                target_stat,
                STAT_NAMES.join(", ")
            );
        }
        if !hold_seconds.is_finite() || hold_seconds <= 0.0 {
            bail!("press duration must be a positive number of seconds");
        }
        if hold_seconds > 3600.0 {
            bail!("press duration must be at most 3600 seconds");
        }
        if !interval_ms.is_finite() || interval_ms <= 0.0 {
            bail!("press interval must be a positive number of milliseconds");
        }
        if max_cycles == Some(0) {
            bail!("cycle bound must be at least 1");
        }
        Ok(Self {
            target_stat: target,
            hold_seconds,
            interval_ms,
            max_cycles,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::NullLog;

    #[test]
    fn test_validate_accepts_known_stat() {
        let params = RunParams::validate("STRENGTH", 60.0, 100.0, None).unwrap();
        assert_eq!(params.target_stat, "STRENGTH");
        assert_eq!(params.max_cycles, None);
    }

    #[test]
    fn test_validate_uppercases_target() {
        let params = RunParams::validate(" stamina ", 5.0, 250.0, Some(3)).unwrap();
        assert_eq!(params.target_stat, "STAMINA");
        assert_eq!(params.max_cycles, Some(3));
    }

    #[test]
    fn test_validate_rejects_unknown_stat() {
        assert!(RunParams::validate("MANA", 60.0, 100.0, None).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_durations() {
        assert!(RunParams::validate("STAMINA", 0.0, 100.0, None).is_err());
        assert!(RunParams::validate("STAMINA", -3.0, 100.0, None).is_err());
        assert!(RunParams::validate("STAMINA", f64::NAN, 100.0, None).is_err());
        assert!(RunParams::validate("STAMINA", 1e9, 100.0, None).is_err());
        assert!(RunParams::validate("STAMINA", 60.0, 0.0, None).is_err());
        assert!(RunParams::validate("STAMINA", 60.0, f64::INFINITY, None).is_err());
        assert!(RunParams::validate("STAMINA", 60.0, 100.0, Some(0)).is_err());
    }

    #[test]
    fn test_parse_numeric() {
        assert_eq!(parse_numeric("press duration", " 60 ").unwrap(), 60.0);
        assert_eq!(parse_numeric("press duration", "0.5").unwrap(), 0.5);
        let err = parse_numeric("press duration", "abc").unwrap_err();
        assert!(err.to_string().contains("press duration"));
    }

    #[test]
    fn test_load_missing_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_or_default(&dir.path().join("config.json"), &NullLog);
        assert_eq!(config.region.width, 420);
        assert_eq!(config.thresholds.word, 0.72);
        assert!(config.ocr_fallback);
    }

    #[test]
    fn test_load_partial_config_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"ocr_fallback": false, "hold_seconds": 30.0}"#).unwrap();

        let config = AppConfig::load_or_default(&path, &NullLog);
        assert!(!config.ocr_fallback);
        assert_eq!(config.hold_seconds, 30.0);
        assert_eq!(config.region.height, 220);
        assert_eq!(config.thresholds.key, 0.70);
    }

    #[test]
    fn test_load_malformed_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();

        let config = AppConfig::load_or_default(&path, &NullLog);
        assert_eq!(config.target_stat, "STAMINA");
    }
}
