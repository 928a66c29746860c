use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{
    DEFAULT_ACTOR_RADIUS, DEFAULT_BONUS_THRESHOLD, DEFAULT_BOOST_TICKS, DEFAULT_COUNTDOWN_MS,
    DEFAULT_DISABLE_TICKS, DEFAULT_ENCOUNTER_SLACK, DEFAULT_MIN_SPAWN_SEPARATION,
    DEFAULT_MOVE_STEP, DEFAULT_ROUND_PAUSE_MS, DEFAULT_SPAWN_RETRY_BUDGET, DEFAULT_WIN_SCORE,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("moveStep must be in (0, 0.5], got {0}")]
    MoveStep(f32),
    #[error("actorRadius must be in (0, 0.5), got {0}")]
    ActorRadius(f32),
    #[error("winScore must be at least 1")]
    WinScore,
    #[error("minSpawnSeparation must be finite and non-negative, got {0}")]
    SpawnSeparation(f32),
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Match configuration supplied when a match is created. Durations measured
/// in ticks only advance while a round is being played; the `*_ms` fields are
/// wall-clock.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MatchConfig {
    pub win_score: u32,
    pub countdown_ms: u64,
    pub round_pause_ms: u64,
    pub boost_ticks: u32,
    pub disable_ticks: u32,
    pub min_spawn_separation: f32,
    pub spawn_retry_budget: u32,
    pub move_step: f32,
    pub actor_radius: f32,
    pub encounter_slack: f32,
    pub bonus_threshold: u32,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            win_score: DEFAULT_WIN_SCORE,
            countdown_ms: DEFAULT_COUNTDOWN_MS,
            round_pause_ms: DEFAULT_ROUND_PAUSE_MS,
            boost_ticks: DEFAULT_BOOST_TICKS,
            disable_ticks: DEFAULT_DISABLE_TICKS,
            min_spawn_separation: DEFAULT_MIN_SPAWN_SEPARATION,
            spawn_retry_budget: DEFAULT_SPAWN_RETRY_BUDGET,
            move_step: DEFAULT_MOVE_STEP,
            actor_radius: DEFAULT_ACTOR_RADIUS,
            encounter_slack: DEFAULT_ENCOUNTER_SLACK,
            bonus_threshold: DEFAULT_BONUS_THRESHOLD,
        }
    }
}

impl MatchConfig {
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: MatchConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.move_step > 0.0 && self.move_step <= 0.5) {
            return Err(ConfigError::MoveStep(self.move_step));
        }
        if !(self.actor_radius > 0.0 && self.actor_radius < 0.5) {
            return Err(ConfigError::ActorRadius(self.actor_radius));
        }
        if self.win_score == 0 {
            return Err(ConfigError::WinScore);
        }
        if !self.min_spawn_separation.is_finite() || self.min_spawn_separation < 0.0 {
            return Err(ConfigError::SpawnSeparation(self.min_spawn_separation));
        }
        Ok(())
    }

    /// Center distance below which the two actors count as touching.
    pub fn tag_distance(&self) -> f32 {
        (self.actor_radius * 2.0 - self.encounter_slack).max(0.0)
    }
}
