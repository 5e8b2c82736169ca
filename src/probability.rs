//! Shot-level success probabilities and hole score distributions.
//!
//! A shot's success probability is a distance-bucket base rate scaled by
//! handicap, lie and hole-difficulty multipliers, then clamped to
//! [`MIN_PROBABILITY`, `MAX_PROBABILITY`]. Every multiplier is independent of
//! distance, so the result is non-increasing in distance.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::cache::TtlCache;
use crate::config::ProbabilityConfig;
use crate::error::{WgpError, WgpResult};
use crate::model::{Hole, MAX_HANDICAP};

pub const MIN_PROBABILITY: f64 = 0.05;
pub const MAX_PROBABILITY: f64 = 0.95;

/// (upper bound in yards, base success rate). Rates never increase.
const DISTANCE_BUCKETS: &[(f64, f64)] = &[
    (1.0, 0.99),
    (3.0, 0.90),
    (8.0, 0.78),
    (20.0, 0.72),
    (50.0, 0.68),
    (100.0, 0.62),
    (150.0, 0.55),
    (200.0, 0.45),
    (250.0, 0.35),
    (f64::INFINITY, 0.25),
];

static HANDICAP_MULTIPLIERS: Lazy<[f64; 37]> = Lazy::new(|| {
    let mut table = [0.0; 37];
    for (h, slot) in table.iter_mut().enumerate() {
        *slot = (1.05 - 0.012 * h as f64).clamp(0.6, 1.05);
    }
    table
});

static DIFFICULTY_MULTIPLIERS: Lazy<[f64; 101]> = Lazy::new(|| {
    let mut table = [0.0; 101];
    for (i, slot) in table.iter_mut().enumerate() {
        *slot = (1.1 - 0.2 * i as f64 / 100.0).clamp(0.9, 1.1);
    }
    table
});

static DEFAULT_CALCULATOR: Lazy<ProbabilityCalculator> =
    Lazy::new(|| ProbabilityCalculator::new(ProbabilityConfig::default()));

// ---------------------------------------------------------------------------
// Lie
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lie {
    Tee,
    Fairway,
    FirstCut,
    Rough,
    Bunker,
    Trees,
    Green,
}

impl Lie {
    pub const ALL: [Lie; 7] = [
        Lie::Tee,
        Lie::Fairway,
        Lie::FirstCut,
        Lie::Rough,
        Lie::Bunker,
        Lie::Trees,
        Lie::Green,
    ];

    pub fn multiplier(self) -> f64 {
        match self {
            Lie::Tee | Lie::Fairway | Lie::Green => 1.0,
            Lie::FirstCut => 0.92,
            Lie::Rough => 0.8,
            Lie::Bunker => 0.7,
            Lie::Trees => 0.55,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Lie::Tee => "tee",
            Lie::Fairway => "fairway",
            Lie::FirstCut => "first_cut",
            Lie::Rough => "rough",
            Lie::Bunker => "bunker",
            Lie::Trees => "trees",
            Lie::Green => "green",
        }
    }
}

impl fmt::Display for Lie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Lie {
    type Err = WgpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase().replace('-', "_");
        Lie::ALL
            .iter()
            .copied()
            .find(|lie| lie.as_str() == lower)
            .ok_or_else(|| WgpError::Validation(format!("unknown lie: {}", s)))
    }
}

// ---------------------------------------------------------------------------
// Multipliers
// ---------------------------------------------------------------------------

pub fn distance_base(distance_yards: f64) -> f64 {
    DISTANCE_BUCKETS
        .iter()
        .find(|(limit, _)| distance_yards <= *limit)
        .map(|(_, p)| *p)
        .unwrap_or(DISTANCE_BUCKETS[DISTANCE_BUCKETS.len() - 1].1)
}

pub fn handicap_multiplier(handicap: f64) -> f64 {
    let idx = handicap.clamp(0.0, MAX_HANDICAP).round() as usize;
    HANDICAP_MULTIPLIERS[idx]
}

pub fn difficulty_multiplier(hole_difficulty: f64) -> f64 {
    let idx = (hole_difficulty.clamp(0.0, 1.0) * 100.0).round() as usize;
    DIFFICULTY_MULTIPLIERS[idx]
}

/// Difficulty in [0, 1] from stroke index; the number one handicap hole is 1.0.
pub fn hole_difficulty(stroke_index: u8) -> f64 {
    let si = f64::from(stroke_index.clamp(1, 18));
    (18.0 - si) / 17.0
}

/// Typical full-shot carry in yards for a handicap.
pub fn full_shot_carry(handicap: f64) -> f64 {
    (245.0 - 3.0 * handicap.clamp(0.0, MAX_HANDICAP)).max(130.0)
}

// ---------------------------------------------------------------------------
// Input checks
// ---------------------------------------------------------------------------

/// Reports the first out-of-domain input. Calculators clamp instead of
/// failing; this is for callers that want to degrade explicitly.
pub fn validate_inputs(handicap: f64, distance_yards: f64, hole_difficulty: f64) -> WgpResult<()> {
    if !handicap.is_finite() || !(0.0..=MAX_HANDICAP).contains(&handicap) {
        return Err(WgpError::NumericDegenerateInput(format!("handicap {}", handicap)));
    }
    if !distance_yards.is_finite() || distance_yards < 0.0 {
        return Err(WgpError::NumericDegenerateInput(format!("distance {}", distance_yards)));
    }
    if !hole_difficulty.is_finite() || !(0.0..=1.0).contains(&hole_difficulty) {
        return Err(WgpError::NumericDegenerateInput(format!(
            "hole difficulty {}",
            hole_difficulty
        )));
    }
    Ok(())
}

fn sanitize(handicap: f64, distance_yards: f64, hole_difficulty: f64) -> (f64, f64, f64) {
    if let Err(e) = validate_inputs(handicap, distance_yards, hole_difficulty) {
        log::warn!("clamping probability inputs: {}", e);
    }
    let handicap = if handicap.is_nan() {
        MAX_HANDICAP / 2.0
    } else {
        handicap.clamp(0.0, MAX_HANDICAP)
    };
    let distance = if distance_yards.is_nan() {
        0.0
    } else {
        distance_yards.max(0.0)
    };
    let difficulty = if hole_difficulty.is_nan() {
        0.5
    } else {
        hole_difficulty.clamp(0.0, 1.0)
    };
    (handicap, distance, difficulty)
}

/// Table lookups only, no cache. Inputs are assumed to be in domain; used on
/// the simulation hot path where distances rarely repeat.
pub fn shot_probability_uncached(handicap: f64, distance_yards: f64, lie: Lie, hole_difficulty: f64) -> f64 {
    let p = distance_base(distance_yards)
        * handicap_multiplier(handicap)
        * lie.multiplier()
        * difficulty_multiplier(hole_difficulty);
    p.clamp(MIN_PROBABILITY, MAX_PROBABILITY)
}

// ---------------------------------------------------------------------------
// Calculator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ShotKey {
    handicap_tenths: i32,
    distance_tenths: i64,
    lie: Lie,
    difficulty_pct: i32,
}

pub struct ProbabilityCalculator {
    config: ProbabilityConfig,
    cache: TtlCache<ShotKey, f64>,
}

impl ProbabilityCalculator {
    pub fn new(config: ProbabilityConfig) -> Self {
        let cache = TtlCache::new(Duration::from_secs(config.cache_ttl_secs), config.cache_capacity);
        ProbabilityCalculator { config, cache }
    }

    pub fn config(&self) -> &ProbabilityConfig {
        &self.config
    }

    pub fn shot_success_probability(
        &self,
        handicap: f64,
        distance_yards: f64,
        lie: Lie,
        hole_difficulty: f64,
    ) -> f64 {
        let (handicap, distance, difficulty) = sanitize(handicap, distance_yards, hole_difficulty);
        let key = ShotKey {
            handicap_tenths: (handicap * 10.0).round() as i32,
            distance_tenths: (distance.min(1.0e6) * 10.0).round() as i64,
            lie,
            difficulty_pct: (difficulty * 100.0).round() as i32,
        };
        self.cache.get_or_insert_with(key, || {
            shot_probability_uncached(
                key.handicap_tenths as f64 / 10.0,
                key.distance_tenths as f64 / 10.0,
                lie,
                key.difficulty_pct as f64 / 100.0,
            )
        })
    }

    /// Expected gross strokes still needed from a position on the hole.
    pub fn expected_strokes_remaining(
        &self,
        handicap: f64,
        distance_yards: f64,
        lie: Lie,
        hole_difficulty: f64,
    ) -> f64 {
        let (handicap, distance, difficulty) = sanitize(handicap, distance_yards, hole_difficulty);
        let p = self.shot_success_probability(handicap, distance, lie, difficulty);
        if lie == Lie::Green {
            return 1.0 + (1.0 - p) * 1.1;
        }
        let carry = full_shot_carry(handicap);
        let shots_to_green = (distance / carry).ceil().max(1.0);
        let putts = 1.8 + handicap / MAX_HANDICAP * 0.4;
        shots_to_green + (1.0 - p) * 0.9 * shots_to_green + putts
    }

    /// Gross-score distribution for a player starting the hole, over the
    /// configured window around par. Sums to 1.
    pub fn hole_completion_distribution(&self, handicap: f64, hole: &Hole) -> BTreeMap<i32, f64> {
        let handicap = if handicap.is_finite() {
            handicap.clamp(0.0, MAX_HANDICAP)
        } else {
            MAX_HANDICAP / 2.0
        };
        let par = i32::from(hole.par);
        let hardness = f64::from(18 - hole.stroke_index.clamp(1, 18)) / 17.0;
        let over_par = 0.15 + handicap / 18.0 * (0.85 + 0.3 * hardness);
        let mean = f64::from(hole.par) + over_par;
        self.score_distribution_from(mean, score_spread(handicap), par)
    }

    /// Discretised normal around `mean`, limited to the window around `par`.
    pub fn score_distribution_from(&self, mean: f64, spread: f64, par: i32) -> BTreeMap<i32, f64> {
        let lo = (par - i32::from(self.config.window_below_par)).max(1);
        let hi = par + i32::from(self.config.window_above_par);
        score_distribution(mean, spread, lo, hi)
    }
}

pub fn score_spread(handicap: f64) -> f64 {
    0.75 + handicap.clamp(0.0, MAX_HANDICAP) / MAX_HANDICAP * 0.5
}

/// Normalised discrete weights over `lo..=hi`.
pub fn score_distribution(mean: f64, spread: f64, lo: i32, hi: i32) -> BTreeMap<i32, f64> {
    let spread = if spread.is_finite() && spread > 0.05 { spread } else { 0.05 };
    let mean = if mean.is_finite() { mean } else { f64::from(lo + hi) / 2.0 };
    let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
    let weights: Vec<(i32, f64)> = (lo..=hi)
        .map(|s| {
            let z = (f64::from(s) - mean) / spread;
            (s, (-0.5 * z * z).exp())
        })
        .collect();
    let total: f64 = weights.iter().map(|(_, w)| w).sum();
    if total <= f64::MIN_POSITIVE {
        let uniform = 1.0 / weights.len() as f64;
        return weights.into_iter().map(|(s, _)| (s, uniform)).collect();
    }
    weights.into_iter().map(|(s, w)| (s, w / total)).collect()
}

pub fn expected_score(distribution: &BTreeMap<i32, f64>) -> f64 {
    distribution.iter().map(|(&s, &p)| f64::from(s) * p).sum()
}

// ---------------------------------------------------------------------------
// Default-configured free functions
// ---------------------------------------------------------------------------

pub fn default_calculator() -> &'static ProbabilityCalculator {
    &DEFAULT_CALCULATOR
}

pub fn shot_success_probability(
    handicap: f64,
    distance_yards: f64,
    lie: Lie,
    hole_difficulty: f64,
) -> f64 {
    DEFAULT_CALCULATOR.shot_success_probability(handicap, distance_yards, lie, hole_difficulty)
}

pub fn hole_completion_distribution(handicap: f64, hole: &Hole) -> BTreeMap<i32, f64> {
    DEFAULT_CALCULATOR.hole_completion_distribution(handicap, hole)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buckets_never_increase() {
        for pair in DISTANCE_BUCKETS.windows(2) {
            assert!(pair[0].0 < pair[1].0);
            assert!(pair[0].1 >= pair[1].1);
        }
    }

    #[test]
    fn tables_are_bounded() {
        assert!(HANDICAP_MULTIPLIERS.iter().all(|m| (0.6..=1.05).contains(m)));
        assert!(DIFFICULTY_MULTIPLIERS.iter().all(|m| (0.9..=1.1).contains(m)));
    }

    #[test]
    fn hardest_hole_is_most_difficult() {
        assert_eq!(hole_difficulty(1), 1.0);
        assert_eq!(hole_difficulty(18), 0.0);
    }
}
