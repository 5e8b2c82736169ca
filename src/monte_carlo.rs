//! Monte Carlo estimation of hole and full-round outcomes.
//!
//! Work is split over a fixed number of workers. Worker `i` draws from
//! `StdRng::seed_from_u64(base_seed + i)` and keeps its own tally, so a seeded
//! run gives the same answer whatever the size of the rayon pool. Tallies are
//! merged after every round of batches, which is also where convergence and
//! cancellation are checked.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::betting::{BettingStateMachine, MAX_GROSS_SCORE};
use crate::config::MonteCarloConfig;
use crate::error::WgpResult;
use crate::model::{validate_players, Course, Hole, Player, PlayerId};
use crate::probability::{full_shot_carry, hole_difficulty, shot_probability_uncached, Lie};
use crate::teams::{Side, TeamConfiguration};

/// Captain goes solo under the fixed policy when every opponent's handicap is
/// at least this much higher.
const FIXED_POLICY_SOLO_MARGIN: f64 = 4.0;

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntrantResult {
    pub label: String,
    pub members: Vec<PlayerId>,
    pub wins: u64,
    pub win_probability: f64,
    pub confidence_interval: (f64, f64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub hole_number: u8,
    pub entrants: Vec<EntrantResult>,
    pub ties: u64,
    pub tie_probability: f64,
    pub simulations: u64,
    pub seed: u64,
    pub convergence_achieved: bool,
    pub cancelled: bool,
    pub degraded: bool,
    pub elapsed_ms: f64,
}

impl SimulationResult {
    pub fn win_probabilities(&self) -> Vec<f64> {
        self.entrants.iter().map(|e| e.win_probability).collect()
    }

    pub fn max_interval_width(&self) -> f64 {
        self.entrants
            .iter()
            .map(|e| e.confidence_interval.1 - e.confidence_interval.0)
            .fold(0.0, f64::max)
    }
}

impl fmt::Display for SimulationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .entrants
            .iter()
            .map(|e| format!("{} {:.1}%", e.label, e.win_probability * 100.0))
            .collect();
        write!(
            f,
            "{} | Halved {:.1}% ({} sims)",
            parts.join(" | "),
            self.tie_probability * 100.0,
            self.simulations
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerGameStats {
    pub player: PlayerId,
    pub name: String,
    /// Games won, with shared wins split evenly.
    pub wins: f64,
    pub win_rate: f64,
    pub average_points: f64,
    pub min_points: i32,
    pub max_points: i32,
    pub points_distribution: BTreeMap<i32, u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSimulationResult {
    pub games: u64,
    pub players: Vec<PlayerGameStats>,
    pub seed: u64,
    pub cancelled: bool,
    pub degraded: bool,
    pub elapsed_ms: f64,
}

#[derive(Debug, Clone)]
pub enum MonteCarloTarget {
    Hole {
        hole: Hole,
        teams: TeamConfiguration,
    },
    FullGame {
        course: Course,
    },
}

#[derive(Debug, Clone)]
pub enum MonteCarloReport {
    Hole(SimulationResult),
    Game(GameSimulationResult),
}

/// 95% normal-approximation interval; fully wide for 30 samples or fewer.
pub fn confidence_interval(p: f64, n: u64) -> (f64, f64) {
    if n <= 30 {
        return (0.0, 1.0);
    }
    let half = 1.96 * (p * (1.0 - p) / n as f64).sqrt();
    ((p - half).max(0.0), (p + half).min(1.0))
}

// ---------------------------------------------------------------------------
// Shot-by-shot hole play
// ---------------------------------------------------------------------------

/// Plays one hole stroke by stroke and returns the gross score, capped at
/// `stroke_cap` and never above a recordable score.
pub fn play_hole<R: Rng>(rng: &mut R, handicap: f64, hole: &Hole, stroke_cap: u32) -> u32 {
    let stroke_cap = stroke_cap.clamp(1, MAX_GROSS_SCORE);
    let difficulty = hole_difficulty(hole.stroke_index);
    let carry = full_shot_carry(handicap);
    let mut distance = f64::from(hole.yards);
    let mut lie = Lie::Tee;
    let mut strokes = 0;

    while strokes < stroke_cap {
        strokes += 1;
        let p = shot_probability_uncached(handicap, distance, lie, difficulty);
        let success = rng.gen::<f64>() < p;

        if lie == Lie::Green {
            if success {
                return strokes;
            }
            distance = (distance * 0.3).max(0.5);
            continue;
        }

        if distance <= carry {
            if success {
                lie = Lie::Green;
                distance = 2.0 + distance * 0.03 + rng.gen::<f64>() * 8.0;
            } else {
                distance = 8.0 + distance * 0.15 * rng.gen::<f64>();
                lie = match rng.gen_range(0..3) {
                    0 => Lie::FirstCut,
                    1 => Lie::Rough,
                    _ => Lie::Bunker,
                };
            }
        } else if success {
            distance -= carry;
            lie = Lie::Fairway;
        } else {
            distance = (distance - carry * (0.5 + 0.3 * rng.gen::<f64>())).max(10.0);
            lie = if rng.gen_bool(0.8) { Lie::Rough } else { Lie::Trees };
        }
    }
    stroke_cap
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MonteCarloEngine {
    config: MonteCarloConfig,
}

struct Entrant {
    label: String,
    ids: Vec<PlayerId>,
    members: Vec<usize>,
}

impl Entrant {
    fn new(label: String, ids: Vec<PlayerId>, players: &[Player]) -> Self {
        let members = ids
            .iter()
            .filter_map(|id| players.iter().position(|p| p.id == *id))
            .collect();
        Entrant { label, ids, members }
    }
}

#[derive(Clone, Default)]
struct Tally {
    wins: Vec<u64>,
    ties: u64,
    sims: u64,
}

impl Tally {
    fn merge(&mut self, other: &Tally) {
        if self.wins.len() < other.wins.len() {
            self.wins.resize(other.wins.len(), 0);
        }
        for (w, o) in self.wins.iter_mut().zip(&other.wins) {
            *w += o;
        }
        self.ties += other.ties;
        self.sims += other.sims;
    }
}

struct Worker<T> {
    rng: StdRng,
    remaining: usize,
    tally: T,
}

fn split_work(total: usize, workers: usize) -> Vec<usize> {
    let workers = workers.max(1);
    (0..workers)
        .map(|i| total / workers + usize::from(i < total % workers))
        .collect()
}

fn resolve_seed(seed: Option<u64>) -> u64 {
    seed.unwrap_or_else(|| rand::thread_rng().gen())
}

impl MonteCarloEngine {
    pub fn new(config: MonteCarloConfig) -> Self {
        MonteCarloEngine { config }
    }

    pub fn config(&self) -> &MonteCarloConfig {
        &self.config
    }

    fn entrants(players: &[Player], teams: &TeamConfiguration) -> Vec<Entrant> {
        let name = |id: PlayerId| {
            players
                .iter()
                .find(|p| p.id == id)
                .map(|p| p.name.clone())
                .unwrap_or_else(|| id.to_string())
        };
        match teams {
            TeamConfiguration::Pending => players
                .iter()
                .map(|p| Entrant::new(p.name.clone(), vec![p.id], players))
                .collect(),
            TeamConfiguration::Solo { captain, .. } => vec![
                Entrant::new(
                    format!("{} (solo)", name(*captain)),
                    teams.members(Side::Team1),
                    players,
                ),
                Entrant::new("Field".to_string(), teams.members(Side::Team2), players),
            ],
            TeamConfiguration::Partners { team1, team2 } => vec![
                Entrant::new(
                    format!("{} & {}", name(team1[0]), name(team1[1])),
                    team1.to_vec(),
                    players,
                ),
                Entrant::new(
                    format!("{} & {}", name(team2[0]), name(team2[1])),
                    team2.to_vec(),
                    players,
                ),
            ],
        }
    }

    pub fn simulate_hole(
        &self,
        players: &[Player],
        hole: &Hole,
        teams: &TeamConfiguration,
        simulations: usize,
        seed: Option<u64>,
    ) -> SimulationResult {
        self.simulate_hole_with_cancel(players, hole, teams, simulations, seed, &CancellationToken::new())
    }

    pub fn simulate_hole_with_cancel(
        &self,
        players: &[Player],
        hole: &Hole,
        teams: &TeamConfiguration,
        simulations: usize,
        seed: Option<u64>,
        cancel: &CancellationToken,
    ) -> SimulationResult {
        let start = Instant::now();
        let seed = resolve_seed(seed);
        let entrants = Self::entrants(players, teams);

        if let Err(e) = validate_players(players).and_then(|_| hole.validate()) {
            log::warn!("monte carlo skipped: {}", e);
            return self.hole_result(hole, &entrants, &Tally::default(), seed, false, false, true, start);
        }
        if simulations == 0 {
            log::warn!("monte carlo skipped: zero simulations requested");
            return self.hole_result(hole, &entrants, &Tally::default(), seed, false, false, true, start);
        }

        let handicaps: Vec<f64> = players.iter().map(|p| p.handicap).collect();
        let strokes: Vec<i32> = players.iter().map(|p| p.strokes_on(hole) as i32).collect();
        let stroke_cap = self.config.stroke_cap;
        let member_sets: Vec<Vec<usize>> = entrants.iter().map(|e| e.members.clone()).collect();

        let mut workers: Vec<Worker<Tally>> = split_work(simulations, self.config.workers)
            .into_iter()
            .enumerate()
            .map(|(i, remaining)| Worker {
                rng: StdRng::seed_from_u64(seed.wrapping_add(i as u64)),
                remaining,
                tally: Tally {
                    wins: vec![0; entrants.len()],
                    ..Tally::default()
                },
            })
            .collect();

        log::debug!(
            "simulating hole {} x{} over {} workers (seed {})",
            hole.number,
            simulations,
            workers.len(),
            seed
        );

        let batch = self.config.batch_per_worker.max(1);
        let mut converged = false;
        let mut total = Tally::default();
        loop {
            workers.par_iter_mut().for_each(|w| {
                let n = w.remaining.min(batch);
                let mut net = vec![0i32; handicaps.len()];
                for _ in 0..n {
                    if cancel.is_cancelled() {
                        break;
                    }
                    for (i, score) in net.iter_mut().enumerate() {
                        *score = play_hole(&mut w.rng, handicaps[i], hole, stroke_cap) as i32 - strokes[i];
                    }
                    let best: Vec<i32> = member_sets
                        .iter()
                        .map(|m| m.iter().map(|&i| net[i]).min().unwrap_or(i32::MAX))
                        .collect();
                    let low = best.iter().copied().min().unwrap_or(i32::MAX);
                    let mut leaders = best.iter().enumerate().filter(|(_, &b)| b == low);
                    match (leaders.next(), leaders.next()) {
                        (Some((i, _)), None) => w.tally.wins[i] += 1,
                        _ => w.tally.ties += 1,
                    }
                    w.tally.sims += 1;
                    w.remaining -= 1;
                }
            });

            total = Tally::default();
            for w in &workers {
                total.merge(&w.tally);
            }

            if cancel.is_cancelled() {
                log::info!("monte carlo cancelled after {} simulations", total.sims);
                break;
            }
            converged = self.has_converged(&total);
            if converged && self.config.early_stopping {
                log::debug!("converged after {} simulations", total.sims);
                break;
            }
            if workers.iter().all(|w| w.remaining == 0) {
                break;
            }
        }

        let cancelled = cancel.is_cancelled();
        self.hole_result(hole, &entrants, &total, seed, converged, cancelled, false, start)
    }

    fn has_converged(&self, tally: &Tally) -> bool {
        if tally.sims < self.config.min_simulations_for_convergence as u64 {
            return false;
        }
        let width = tally
            .wins
            .iter()
            .map(|&w| {
                let (lo, hi) = confidence_interval(w as f64 / tally.sims as f64, tally.sims);
                hi - lo
            })
            .fold(0.0, f64::max);
        width < self.config.convergence_threshold
    }

    #[allow(clippy::too_many_arguments)]
    fn hole_result(
        &self,
        hole: &Hole,
        entrants: &[Entrant],
        tally: &Tally,
        seed: u64,
        convergence_achieved: bool,
        cancelled: bool,
        degraded: bool,
        start: Instant,
    ) -> SimulationResult {
        let n = tally.sims;
        let rate = |count: u64| if n == 0 { 0.0 } else { count as f64 / n as f64 };
        let entrants = entrants
            .iter()
            .enumerate()
            .map(|(i, e)| {
                let wins = tally.wins.get(i).copied().unwrap_or(0);
                let p = if degraded || n == 0 {
                    1.0 / entrants.len().max(1) as f64
                } else {
                    rate(wins)
                };
                EntrantResult {
                    label: e.label.clone(),
                    members: e.ids.clone(),
                    wins,
                    win_probability: p,
                    confidence_interval: confidence_interval(p, n),
                }
            })
            .collect();
        SimulationResult {
            hole_number: hole.number,
            entrants,
            ties: tally.ties,
            tie_probability: rate(tally.ties),
            simulations: n,
            seed,
            convergence_achieved,
            cancelled,
            degraded,
            elapsed_ms: start.elapsed().as_secs_f64() * 1000.0,
        }
    }

    // -- Full rounds ----------------------------------------------------------

    pub fn simulate_game(
        &self,
        players: &[Player],
        course: &Course,
        games: usize,
        seed: Option<u64>,
    ) -> GameSimulationResult {
        self.simulate_game_with_cancel(players, course, games, seed, &CancellationToken::new())
    }

    pub fn simulate_game_with_cancel(
        &self,
        players: &[Player],
        course: &Course,
        games: usize,
        seed: Option<u64>,
        cancel: &CancellationToken,
    ) -> GameSimulationResult {
        let start = Instant::now();
        let seed = resolve_seed(seed);
        let fresh: Vec<Player> = players.iter().map(Player::fresh_copy).collect();

        let empty = |degraded: bool| GameSimulationResult {
            games: 0,
            players: fresh
                .iter()
                .map(|p| PlayerGameStats {
                    player: p.id,
                    name: p.name.clone(),
                    wins: 0.0,
                    win_rate: 0.0,
                    average_points: 0.0,
                    min_points: 0,
                    max_points: 0,
                    points_distribution: BTreeMap::new(),
                })
                .collect(),
            seed,
            cancelled: false,
            degraded,
            elapsed_ms: start.elapsed().as_secs_f64() * 1000.0,
        };
        if let Err(e) = validate_players(&fresh) {
            log::warn!("game simulation skipped: {}", e);
            return empty(true);
        }
        if games == 0 {
            log::warn!("game simulation skipped: zero games requested");
            return empty(true);
        }

        let stroke_cap = self.config.stroke_cap;
        let mut workers: Vec<Worker<Vec<Vec<i32>>>> = split_work(games, self.config.workers)
            .into_iter()
            .enumerate()
            .map(|(i, remaining)| Worker {
                rng: StdRng::seed_from_u64(seed.wrapping_add(i as u64)),
                remaining,
                tally: Vec::new(),
            })
            .collect();

        log::info!("simulating {} full games over {} workers (seed {})", games, workers.len(), seed);

        let abandoned = AtomicUsize::new(0);
        workers.par_iter_mut().for_each(|w| {
            while w.remaining > 0 && !cancel.is_cancelled() {
                w.remaining -= 1;
                match play_fixed_policy_game(&mut w.rng, &fresh, course, stroke_cap) {
                    Ok(finals) => w.tally.push(finals),
                    Err(e) => {
                        abandoned.fetch_add(1, Ordering::Relaxed);
                        log::warn!("simulated game abandoned: {}", e);
                    }
                }
            }
        });

        let finals: Vec<&Vec<i32>> = workers.iter().flat_map(|w| w.tally.iter()).collect();
        let played = finals.len() as u64;
        let abandoned = abandoned.into_inner();
        if abandoned > 0 {
            log::warn!("{} of {} simulated games abandoned", abandoned, games);
        }
        let mut stats: Vec<PlayerGameStats> = empty(false).players;
        for game in &finals {
            let top = game.iter().copied().max().unwrap_or(0);
            let winners = game.iter().filter(|&&p| p == top).count() as f64;
            for (i, &points) in game.iter().enumerate() {
                let s = &mut stats[i];
                if points == top {
                    s.wins += 1.0 / winners;
                }
                s.average_points += f64::from(points);
                *s.points_distribution.entry(points).or_insert(0) += 1;
            }
        }
        for s in stats.iter_mut() {
            if played > 0 {
                s.win_rate = s.wins / played as f64;
                s.average_points /= played as f64;
            }
            s.min_points = s.points_distribution.keys().next().copied().unwrap_or(0);
            s.max_points = s.points_distribution.keys().next_back().copied().unwrap_or(0);
        }

        GameSimulationResult {
            games: played,
            players: stats,
            seed,
            cancelled: cancel.is_cancelled(),
            degraded: abandoned > 0,
            elapsed_ms: start.elapsed().as_secs_f64() * 1000.0,
        }
    }
}

/// One round under a fixed, deterministic betting policy: the captain goes
/// solo against a clearly weaker field and otherwise partners the lowest
/// handicap, who always accepts. A wager at the table limit forces the
/// partner route. Returns final points by seat.
pub fn play_fixed_policy_game<R: Rng>(
    rng: &mut R,
    players: &[Player],
    course: &Course,
    stroke_cap: u32,
) -> WgpResult<Vec<i32>> {
    let mut machine = BettingStateMachine::new(players.to_vec(), course.clone(), 1)?;
    while !machine.is_complete() {
        let captain = machine.captain();
        let captain_handicap = machine.player(captain)?.handicap;
        let mut others: Vec<&Player> = machine.players().iter().filter(|p| p.id != captain).collect();
        others.sort_by(|a, b| a.handicap.partial_cmp(&b.handicap).unwrap_or(std::cmp::Ordering::Equal));

        if others
            .iter()
            .all(|o| o.handicap - captain_handicap >= FIXED_POLICY_SOLO_MARGIN)
            && machine.wager().can_double()
        {
            machine.go_solo(captain)?;
        } else {
            let partner = others[0].id;
            machine.request_partner(captain, partner)?;
            machine.accept_partner(partner)?;
        }

        let hole = *machine.hole();
        let entries: Vec<(PlayerId, f64)> = machine.players().iter().map(|p| (p.id, p.handicap)).collect();
        for (id, handicap) in entries {
            let gross = play_hole(rng, handicap, &hole, stroke_cap);
            machine.record_net_score(id, gross)?;
        }
        machine.settle_hole()?;
        machine.advance_hole()?;
    }
    Ok(machine.players().iter().map(|p| p.points()).collect())
}

/// Single entry point for external callers.
pub fn run_monte_carlo(
    engine: &MonteCarloEngine,
    players: &[Player],
    target: &MonteCarloTarget,
    simulations: usize,
    seed: Option<u64>,
) -> MonteCarloReport {
    match target {
        MonteCarloTarget::Hole { hole, teams } => {
            MonteCarloReport::Hole(engine.simulate_hole(players, hole, teams, simulations, seed))
        }
        MonteCarloTarget::FullGame { course } => {
            MonteCarloReport::Game(engine.simulate_game(players, course, simulations, seed))
        }
    }
}
