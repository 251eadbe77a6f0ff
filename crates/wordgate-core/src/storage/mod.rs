mod config;
pub mod database;
pub mod migrations;

pub use config::{Config, EconomyConfig, LeaderboardConfig, RewardsConfig, ShopConfig};
pub use database::{Database, ImportSummary, Store};

use std::path::PathBuf;

/// Returns the data directory, creating it if needed.
///
/// `WORDGATE_DATA_DIR` overrides the location outright. Otherwise this is
/// `~/.config/wordgate/`, or `~/.config/wordgate-dev/` when
/// `WORDGATE_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> std::io::Result<PathBuf> {
    let dir = match std::env::var_os("WORDGATE_DATA_DIR") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("WORDGATE_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("wordgate-dev")
            } else {
                base_dir.join("wordgate")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
