//! Engine configuration. Every section has working defaults; a JSON file may
//! override any subset of fields.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::betting::MAX_GROSS_SCORE;
use crate::error::{WgpError, WgpResult};
use crate::wager::MAX_WAGER;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub game: GameConfig,
    pub probability: ProbabilityConfig,
    pub odds: OddsConfig,
    pub monte_carlo: MonteCarloConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Quarters at stake on a hole before any escalation.
    pub base_wager: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig { base_wager: 1 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbabilityConfig {
    /// Scores below par covered by completion distributions.
    pub window_below_par: u8,
    /// Scores above par covered by completion distributions.
    pub window_above_par: u8,
    pub cache_ttl_secs: u64,
    pub cache_capacity: usize,
}

impl Default for ProbabilityConfig {
    fn default() -> Self {
        ProbabilityConfig {
            window_below_par: 2,
            window_above_par: 3,
            cache_ttl_secs: 300,
            cache_capacity: 4096,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OddsConfig {
    pub cache_ttl_secs: u64,
    pub cache_capacity: usize,
    /// Soft compute budget per odds query.
    pub budget_ms: u64,
    /// Pseudo sample size used for closed-form confidence intervals.
    pub calibration_samples: u32,
}

impl Default for OddsConfig {
    fn default() -> Self {
        OddsConfig {
            cache_ttl_secs: 30,
            cache_capacity: 256,
            budget_ms: 50,
            calibration_samples: 400,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonteCarloConfig {
    /// Fixed worker count. Results depend on this, not on the thread pool size.
    pub workers: usize,
    /// Simulations run per worker between convergence checks.
    pub batch_per_worker: usize,
    pub early_stopping: bool,
    pub min_simulations_for_convergence: usize,
    pub convergence_threshold: f64,
    pub stroke_cap: u32,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        MonteCarloConfig {
            workers: 8,
            batch_per_worker: 250,
            early_stopping: false,
            min_simulations_for_convergence: 1000,
            convergence_threshold: 0.10,
            stroke_cap: 10,
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> WgpResult<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> WgpResult<Self> {
        let json = std::fs::read_to_string(path)?;
        log::info!("loaded engine config from {}", path.display());
        Self::from_json(&json)
    }

    pub fn validate(&self) -> WgpResult<()> {
        if !(1..=MAX_WAGER).contains(&self.game.base_wager) {
            return Err(WgpError::Validation(format!(
                "base_wager must be within 1-{}",
                MAX_WAGER
            )));
        }
        if self.monte_carlo.workers == 0 || self.monte_carlo.batch_per_worker == 0 {
            return Err(WgpError::Validation(
                "monte_carlo workers and batch_per_worker must be positive".to_string(),
            ));
        }
        if !(1..=MAX_GROSS_SCORE).contains(&self.monte_carlo.stroke_cap) {
            return Err(WgpError::Validation(format!(
                "stroke_cap must be within 1-{}",
                MAX_GROSS_SCORE
            )));
        }
        if !(0.0..=1.0).contains(&self.monte_carlo.convergence_threshold) {
            return Err(WgpError::Validation(
                "convergence_threshold must be within 0-1".to_string(),
            ));
        }
        Ok(())
    }
}
