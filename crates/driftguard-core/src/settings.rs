//! TOML-based user settings.
//!
//! Stores the knobs the decision engine consults on every evaluation:
//! - Intervention frequency (how eager the engine is to flag)
//! - Quiet hours (ranges may wrap past midnight)
//! - Whitelist of never-flagged sites
//! - Preferred challenge types
//! - Learning mode and streak goal
//!
//! Settings are stored at `~/.config/driftguard/settings.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::challenge::ChallengeType;
use crate::error::ConfigError;
use crate::storage::data_dir;

/// How eager the engine is to intervene. Maps to the fused-score threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterventionFrequency {
    Aggressive,
    Moderate,
    Minimal,
}

impl InterventionFrequency {
    /// Fused-score threshold at or above which an intervention is flagged.
    pub fn threshold(&self) -> f64 {
        match self {
            InterventionFrequency::Aggressive => 0.4,
            InterventionFrequency::Moderate => 0.6,
            InterventionFrequency::Minimal => 0.8,
        }
    }
}

/// An hour range; `start_hour > end_hour` wraps past midnight.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QuietHours {
    pub start_hour: u8,
    pub end_hour: u8,
}

impl QuietHours {
    /// Membership test, wraparound-aware: {22, 6} contains 23 and 2 but
    /// not 12.
    pub fn contains(&self, hour: u8) -> bool {
        if self.start_hour <= self.end_hour {
            (self.start_hour..self.end_hour).contains(&hour)
        } else {
            hour >= self.start_hour || hour < self.end_hour
        }
    }
}

/// User settings consulted by the decision engine.
///
/// Serialized to/from TOML at `~/.config/driftguard/settings.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSettings {
    #[serde(default = "default_frequency")]
    pub intervention_frequency: InterventionFrequency,
    #[serde(default)]
    pub quiet_hours: Vec<QuietHours>,
    /// Domain substrings that are never flagged.
    #[serde(default)]
    pub whitelist: Vec<String>,
    #[serde(default = "default_challenge_types")]
    pub preferred_challenge_types: Vec<ChallengeType>,
    /// Observe and learn, never intervene.
    #[serde(default)]
    pub learning_mode: bool,
    #[serde(default = "default_streak_goal")]
    pub streak_goal: u32,
}

fn default_frequency() -> InterventionFrequency {
    InterventionFrequency::Moderate
}

fn default_challenge_types() -> Vec<ChallengeType> {
    vec![
        ChallengeType::Reflection,
        ChallengeType::Intention,
        ChallengeType::QuickTask,
        ChallengeType::Breathing,
    ]
}

fn default_streak_goal() -> u32 {
    10
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            intervention_frequency: default_frequency(),
            quiet_hours: Vec::new(),
            whitelist: Vec::new(),
            preferred_challenge_types: default_challenge_types(),
            learning_mode: false,
            streak_goal: default_streak_goal(),
        }
    }
}

impl UserSettings {
    fn path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("~/.config/driftguard"),
            message: e.to_string(),
        })?;
        Ok(dir.join("settings.toml"))
    }

    /// Load settings from the default location, falling back to defaults if
    /// the file does not exist yet.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let settings: Self = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        self.validate()?;
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        std::fs::write(path, content).map_err(|e| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.streak_goal == 0 {
            return Err(ConfigError::InvalidValue {
                key: "streak_goal".into(),
                message: "must be a positive integer".into(),
            });
        }
        if self.preferred_challenge_types.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "preferred_challenge_types".into(),
                message: "must name at least one challenge type".into(),
            });
        }
        for range in &self.quiet_hours {
            if range.start_hour > 23 || range.end_hour > 23 {
                return Err(ConfigError::InvalidValue {
                    key: "quiet_hours".into(),
                    message: format!(
                        "hours must be 0-23, got {}-{}",
                        range.start_hour, range.end_hour
                    ),
                });
            }
        }
        Ok(())
    }

    /// True when the given hour falls inside any configured quiet range.
    pub fn in_quiet_hours(&self, hour: u8) -> bool {
        self.quiet_hours.iter().any(|r| r.contains(hour))
    }

    /// Whitelist membership is a substring match in either direction, so an
    /// entry of `docs.example.com` matches `https://docs.example.com/page`
    /// and an entry of `https://wiki.internal/home` matches `wiki.internal`.
    pub fn is_whitelisted(&self, url: &str) -> bool {
        self.whitelist
            .iter()
            .any(|entry| url.contains(entry.as_str()) || entry.contains(url))
    }
}
