//! TOML-based engine configuration.
//!
//! Holds the tunable numbers of the economy:
//! - starting balances and the daily life refill
//! - lesson, quiz and gate rewards
//! - life prices in the shop
//! - leaderboard unlock threshold and size
//!
//! Configuration is stored at `~/.config/wordgate/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EconomyConfig {
    /// Lives restored by the first reconcile of each day.
    #[serde(default = "default_daily_refill")]
    pub daily_refill: u32,
    #[serde(default = "default_starting_currency")]
    pub starting_currency: u32,
    #[serde(default = "default_starting_lives")]
    pub starting_lives: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardsConfig {
    /// Minimum percentage of correct answers for a quiz pass.
    #[serde(default = "default_quiz_pass_percent")]
    pub quiz_pass_percent: u8,
    /// Currency paid when a lesson is completed.
    #[serde(default = "default_lesson_currency")]
    pub lesson_currency: u32,
    #[serde(default = "default_gate_bonus_currency")]
    pub gate_bonus_currency: u32,
    #[serde(default = "default_gate_bonus_xp")]
    pub gate_bonus_xp: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopConfig {
    #[serde(default = "default_xp_per_life")]
    pub xp_per_life: u32,
    #[serde(default = "default_currency_per_life")]
    pub currency_per_life: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardConfig {
    /// Units a learner must complete before seeing the leaderboard.
    #[serde(default = "default_unlock_after_units")]
    pub unlock_after_units: u32,
    #[serde(default = "default_leaderboard_size")]
    pub size: u32,
}

/// Engine configuration.
///
/// Serialized to/from TOML at `~/.config/wordgate/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub economy: EconomyConfig,
    #[serde(default)]
    pub rewards: RewardsConfig,
    #[serde(default)]
    pub shop: ShopConfig,
    #[serde(default)]
    pub leaderboard: LeaderboardConfig,
}

fn default_daily_refill() -> u32 {
    2
}
fn default_starting_currency() -> u32 {
    500
}
fn default_starting_lives() -> u32 {
    5
}
fn default_quiz_pass_percent() -> u8 {
    70
}
fn default_lesson_currency() -> u32 {
    10
}
fn default_gate_bonus_currency() -> u32 {
    50
}
fn default_gate_bonus_xp() -> u32 {
    100
}
fn default_xp_per_life() -> u32 {
    10
}
fn default_currency_per_life() -> u32 {
    200
}
fn default_unlock_after_units() -> u32 {
    10
}
fn default_leaderboard_size() -> u32 {
    10
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            daily_refill: default_daily_refill(),
            starting_currency: default_starting_currency(),
            starting_lives: default_starting_lives(),
        }
    }
}

impl Default for RewardsConfig {
    fn default() -> Self {
        Self {
            quiz_pass_percent: default_quiz_pass_percent(),
            lesson_currency: default_lesson_currency(),
            gate_bonus_currency: default_gate_bonus_currency(),
            gate_bonus_xp: default_gate_bonus_xp(),
        }
    }
}

impl Default for ShopConfig {
    fn default() -> Self {
        Self {
            xp_per_life: default_xp_per_life(),
            currency_per_life: default_currency_per_life(),
        }
    }
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        Self {
            unlock_after_units: default_unlock_after_units(),
            size: default_leaderboard_size(),
        }
    }
}

fn unknown_key(key: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: "unknown config key".into(),
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }
        key.split('.').try_fold(root, |current, part| current.get(part))
    }

    /// Only existing leaves can be set, and only to a value of the same
    /// JSON type.
    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let (parent, leaf) = match key.rsplit_once('.') {
            Some((parent, leaf)) => (Some(parent), leaf),
            None => (None, key),
        };
        if leaf.is_empty() {
            return Err(unknown_key(key));
        }

        let mut current = root;
        if let Some(parent) = parent {
            for part in parent.split('.') {
                current = current.get_mut(part).ok_or_else(|| unknown_key(key))?;
            }
        }
        let obj = current.as_object_mut().ok_or_else(|| unknown_key(key))?;
        let existing = obj.get(leaf).ok_or_else(|| unknown_key(key))?;

        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let new_value = match existing {
            serde_json::Value::Bool(_) => serde_json::Value::Bool(
                value
                    .parse::<bool>()
                    .map_err(|e| invalid(e.to_string()))?,
            ),
            serde_json::Value::Number(_) => {
                let n = value
                    .parse::<u64>()
                    .map_err(|_| invalid(format!("cannot parse '{value}' as a whole number")))?;
                serde_json::Value::Number(n.into())
            }
            _ => serde_json::Value::String(value.into()),
        };
        obj.insert(leaf.to_string(), new_value);
        Ok(())
    }

    /// `<data_dir>/config.toml`.
    pub fn path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("config.toml"),
            message: e.to_string(),
        })?;
        Ok(dir.join("config.toml"))
    }

    /// Load from the data directory, writing the default file if none
    /// exists yet.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(toml::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to the data directory.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a value by dot-separated key without saving.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json =
            serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Reject values that would break the economy's invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let bad = |key: &str, message: &str| {
            Err(ConfigError::InvalidValue {
                key: key.to_string(),
                message: message.to_string(),
            })
        };
        if self.rewards.quiz_pass_percent > 100 {
            return bad("rewards.quiz_pass_percent", "must be at most 100");
        }
        if self.economy.starting_lives > crate::economy::MAX_LIVES {
            return bad("economy.starting_lives", "must not exceed the life cap");
        }
        if self.shop.xp_per_life == 0 || self.shop.currency_per_life == 0 {
            return bad("shop", "life prices must be positive");
        }
        Ok(())
    }

    /// Load from disk, returning default on error.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn config_default_values() {
        let cfg = Config::default();
        assert_eq!(cfg.economy.daily_refill, 2);
        assert_eq!(cfg.economy.starting_currency, 500);
        assert_eq!(cfg.economy.starting_lives, 5);
        assert_eq!(cfg.rewards.quiz_pass_percent, 70);
        assert_eq!(cfg.rewards.gate_bonus_currency, 50);
        assert_eq!(cfg.rewards.gate_bonus_xp, 100);
        assert_eq!(cfg.shop.xp_per_life, 10);
        assert_eq!(cfg.shop.currency_per_life, 200);
        assert_eq!(cfg.leaderboard.unlock_after_units, 10);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let cfg: Config = toml::from_str("[shop]\nxp_per_life = 25\n").unwrap();
        assert_eq!(cfg.shop.xp_per_life, 25);
        assert_eq!(cfg.shop.currency_per_life, 200);
        assert_eq!(cfg.economy, EconomyConfig::default());
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("economy.daily_refill").as_deref(), Some("2"));
        assert_eq!(cfg.get("rewards.gate_bonus_xp").as_deref(), Some("100"));
        assert!(cfg.get("economy.missing_key").is_none());
        assert!(cfg.get("").is_none());
    }

    #[test]
    fn set_updates_nested_number() {
        let mut cfg = Config::default();
        cfg.set("shop.currency_per_life", "150").unwrap();
        assert_eq!(cfg.shop.currency_per_life, 150);
    }

    #[test]
    fn set_rejects_unknown_key() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.set("shop.nonexistent", "1"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(cfg.set("nope", "1").is_err());
    }

    #[test]
    fn set_rejects_invalid_type() {
        let mut cfg = Config::default();
        assert!(cfg.set("economy.daily_refill", "lots").is_err());
        assert!(cfg.set("economy.daily_refill", "-1").is_err());
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn set_rejects_values_that_fail_validation() {
        let mut cfg = Config::default();
        assert!(cfg.set("rewards.quiz_pass_percent", "101").is_err());
        assert!(cfg.set("economy.starting_lives", "9").is_err());
        assert!(cfg.set("shop.xp_per_life", "0").is_err());
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn load_from_writes_default_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg, Config::default());
        assert!(path.exists());

        let mut changed = cfg.clone();
        changed.set("leaderboard.size", "5").unwrap();
        changed.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap().leaderboard.size, 5);
    }

    #[test]
    fn load_from_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[economy\n").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::ParseFailed(_))
        ));
    }
}
