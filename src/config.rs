//! Game Configuration
//!
//! Board size, seed, match length and local players. Passed explicitly into
//! the world and session controller.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::grid::Geometry;
use crate::{DEFAULT_COLS, DEFAULT_MATCH_DURATION_MS, DEFAULT_RNG_SEED, DEFAULT_ROWS, DEFAULT_TICK_RATE_HZ};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Board too small for a 2-cell spawn.
    #[error("Invalid board size {cols}x{rows}: need at least 2x1")]
    InvalidBoard {
        /// Configured columns
        cols: i32,
        /// Configured rows
        rows: i32,
    },

    /// Tick rate outside 1..=1000 Hz.
    #[error("Tick rate must be between 1 and 1000 Hz, got {0}")]
    InvalidTickRate(u32),

    /// Match duration of zero.
    #[error("Match duration must be non-zero")]
    ZeroDuration,

    /// Two local players share an id.
    #[error("Duplicate local player id: {0}")]
    DuplicateLocalPlayer(String),

    /// Malformed JSON.
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A player controlled from this instance when no session is active.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalPlayer {
    /// Snake id
    pub id: String,
    /// Display name
    pub name: String,
    /// Display color
    pub color: String,
}

impl LocalPlayer {
    /// Create a local player.
    pub fn new(id: impl Into<String>, name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            color: color.into(),
        }
    }
}

/// Simulation configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Board columns
    pub cols: i32,
    /// Board rows
    pub rows: i32,
    /// Seed for spawn and food placement
    pub rng_seed: u32,
    /// Match length in milliseconds
    pub match_duration_ms: u64,
    /// Simulation steps per second
    pub tick_rate_hz: u32,
    /// Players simulated in local mode
    pub local_players: Vec<LocalPlayer>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            cols: DEFAULT_COLS,
            rows: DEFAULT_ROWS,
            rng_seed: DEFAULT_RNG_SEED,
            match_duration_ms: DEFAULT_MATCH_DURATION_MS,
            tick_rate_hz: DEFAULT_TICK_RATE_HZ,
            local_players: vec![
                LocalPlayer::new("local-1", "P1", "#7cf7c2"),
                LocalPlayer::new("local-2", "P2", "#788cff"),
            ],
        }
    }
}

impl GameConfig {
    /// Board geometry.
    pub fn geometry(&self) -> Geometry {
        Geometry::new(self.cols, self.rows)
    }

    /// Duration of one simulation step in milliseconds.
    pub fn tick_ms(&self) -> u64 {
        1000 / u64::from(self.tick_rate_hz.max(1))
    }

    /// Check the configuration is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // A 2-cell spawn needs two horizontally adjacent cells.
        if self.cols < 2 || self.rows < 1 {
            return Err(ConfigError::InvalidBoard {
                cols: self.cols,
                rows: self.rows,
            });
        }
        if self.tick_rate_hz == 0 || self.tick_rate_hz > 1000 {
            return Err(ConfigError::InvalidTickRate(self.tick_rate_hz));
        }
        if self.match_duration_ms == 0 {
            return Err(ConfigError::ZeroDuration);
        }

        let mut seen = std::collections::HashSet::new();
        for player in &self.local_players {
            if !seen.insert(player.id.as_str()) {
                return Err(ConfigError::DuplicateLocalPlayer(player.id.clone()));
            }
        }
        Ok(())
    }

    /// Load from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: GameConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GameConfig::default();
        assert_eq!(config.geometry(), Geometry::new(24, 16));
        assert_eq!(config.rng_seed, 123456789);
        assert_eq!(config.match_duration_ms, 60_000);
        assert_eq!(config.tick_ms(), 100);
        assert_eq!(config.local_players.len(), 2);
        assert_eq!(config.local_players[0].color, "#7cf7c2");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json() {
        let config = GameConfig::from_json_str(r#"{"cols": 10, "rows": 8, "tick_rate_hz": 20}"#).unwrap();
        assert_eq!(config.cols, 10);
        assert_eq!(config.rows, 8);
        assert_eq!(config.tick_ms(), 50);
        assert_eq!(config.rng_seed, 123456789);
    }

    #[test]
    fn test_invalid_configs() {
        let bad_board = GameConfig { cols: 1, ..GameConfig::default() };
        assert!(matches!(bad_board.validate(), Err(ConfigError::InvalidBoard { .. })));

        let bad_rate = GameConfig { tick_rate_hz: 0, ..GameConfig::default() };
        assert!(matches!(bad_rate.validate(), Err(ConfigError::InvalidTickRate(0))));

        let bad_duration = GameConfig { match_duration_ms: 0, ..GameConfig::default() };
        assert!(matches!(bad_duration.validate(), Err(ConfigError::ZeroDuration)));

        let mut dup = GameConfig::default();
        dup.local_players[1].id = "local-1".into();
        assert!(matches!(dup.validate(), Err(ConfigError::DuplicateLocalPlayer(_))));

        assert!(matches!(GameConfig::from_json_str("{not json"), Err(ConfigError::Parse(_))));
    }
}
