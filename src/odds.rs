//! Real-time odds: team win probabilities and the expected value of every
//! betting action open to a player, computed in closed form from per-player
//! net score distributions.
//!
//! The calculator is advisory. It never returns an error; any failure yields
//! an equal-probability result flagged `degraded`.

use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::betting::{BettingStateMachine, DoubleOffer};
use crate::cache::TtlCache;
use crate::config::{OddsConfig, ProbabilityConfig};
use crate::error::{WgpError, WgpResult};
use crate::model::{validate_players, Hole, Player, PlayerId};
use crate::probability::{hole_difficulty, score_spread, Lie, ProbabilityCalculator};
use crate::teams::{Side, TeamConfiguration};

type Distribution = BTreeMap<i32, f64>;

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Where a player's ball lies mid-hole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerPosition {
    pub player: PlayerId,
    pub distance_yards: f64,
    pub lie: Lie,
    pub strokes_taken: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OddsContext {
    pub captain: PlayerId,
    /// Player the scenarios are evaluated for; the captain when unset.
    pub perspective: Option<PlayerId>,
    pub teams: TeamConfiguration,
    pub wager: u32,
    pub doubled: bool,
    pub pending_request: Option<PlayerId>,
    pub pending_double: Option<DoubleOffer>,
    pub float_available: bool,
    pub positions: Vec<PlayerPosition>,
    pub holes_remaining: usize,
}

impl OddsContext {
    /// Context for the start of a hole with nothing decided yet.
    pub fn pre_hole(captain: PlayerId, wager: u32) -> Self {
        OddsContext {
            captain,
            perspective: None,
            teams: TeamConfiguration::Pending,
            wager,
            doubled: false,
            pending_request: None,
            pending_double: None,
            float_available: false,
            positions: Vec::new(),
            holes_remaining: 18,
        }
    }

    pub fn from_machine(machine: &BettingStateMachine) -> Self {
        let captain = machine.captain();
        let float_available = machine
            .player(captain)
            .map(|p| !p.float_used() && !machine.wager().is_floated())
            .unwrap_or(false)
            && machine.net_scores().is_empty();
        OddsContext {
            captain,
            perspective: None,
            teams: machine.teams().clone(),
            wager: machine.wager().current(),
            doubled: machine.wager().is_doubled(),
            pending_request: machine.pending_request(),
            pending_double: machine.pending_double(),
            float_available,
            positions: Vec::new(),
            holes_remaining: machine.holes_remaining(),
        }
    }

    pub fn with_perspective(mut self, player: PlayerId) -> Self {
        self.perspective = Some(player);
        self
    }

    pub fn focal(&self) -> PlayerId {
        self.perspective.unwrap_or(self.captain)
    }
}

// ---------------------------------------------------------------------------
// Outputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Low needs a favourite with positive EV; high is an underdog or an EV
    /// worse than losing the whole stake.
    pub fn classify(win_probability: f64, expected_value: f64, stake: f64) -> RiskLevel {
        if win_probability >= 0.6 && expected_value > 0.0 {
            RiskLevel::Low
        } else if win_probability < 0.4 || expected_value < -stake {
            RiskLevel::High
        } else {
            RiskLevel::Medium
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "partner", rename_all = "snake_case")]
pub enum ScenarioKind {
    Hold,
    GoSolo,
    RequestPartner(PlayerId),
    AcceptPartnership,
    DeclinePartnership,
    OfferDouble,
    AcceptDouble,
    DeclineDouble,
    InvokeFloat,
}

impl fmt::Display for ScenarioKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScenarioKind::Hold => write!(f, "hold"),
            ScenarioKind::GoSolo => write!(f, "go_solo"),
            ScenarioKind::RequestPartner(p) => write!(f, "request_partner:{}", p),
            ScenarioKind::AcceptPartnership => write!(f, "accept_partnership"),
            ScenarioKind::DeclinePartnership => write!(f, "decline_partnership"),
            ScenarioKind::OfferDouble => write!(f, "offer_double"),
            ScenarioKind::AcceptDouble => write!(f, "accept_double"),
            ScenarioKind::DeclineDouble => write!(f, "decline_double"),
            ScenarioKind::InvokeFloat => write!(f, "invoke_float"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BettingScenario {
    pub scenario_type: ScenarioKind,
    pub win_probability: f64,
    pub expected_value: f64,
    pub risk_level: RiskLevel,
    pub confidence_interval: (f64, f64),
    pub recommendation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerOdds {
    pub player: PlayerId,
    pub name: String,
    pub strokes_received: u32,
    pub expected_net: f64,
    /// Probability of the outright lowest net score in the group.
    pub win_probability: f64,
    pub shot_success: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TeamOdds {
    pub team1_win: f64,
    pub team2_win: f64,
    pub tie: f64,
}

impl TeamOdds {
    pub fn for_side(&self, side: Side) -> (f64, f64, f64) {
        match side {
            Side::Team1 => (self.team1_win, self.tie, self.team2_win),
            Side::Team2 => (self.team2_win, self.tie, self.team1_win),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OddsResult {
    pub hole_number: u8,
    pub player_odds: Vec<PlayerOdds>,
    pub team_odds: Option<TeamOdds>,
    pub scenarios: Vec<BettingScenario>,
    pub recommended_action: Option<ScenarioKind>,
    pub rationale: Vec<String>,
    pub confidence: f64,
    pub degraded: bool,
    pub computation_ms: f64,
}

impl OddsResult {
    pub fn scenario(&self, kind: &ScenarioKind) -> Option<&BettingScenario> {
        self.scenarios.iter().find(|s| &s.scenario_type == kind)
    }

    pub fn player(&self, id: PlayerId) -> Option<&PlayerOdds> {
        self.player_odds.iter().find(|p| p.player == id)
    }
}

// ---------------------------------------------------------------------------
// Distribution arithmetic
// ---------------------------------------------------------------------------

fn survival(dist: &Distribution, s: i32) -> f64 {
    dist.range(s + 1..).map(|(_, p)| p).sum()
}

/// Distribution of the minimum of independent scores (best ball).
fn best_ball(dists: &[&Distribution]) -> Distribution {
    let lo = dists.iter().filter_map(|d| d.keys().next()).min().copied();
    let hi = dists.iter().filter_map(|d| d.keys().next_back()).max().copied();
    let (lo, hi) = match (lo, hi) {
        (Some(lo), Some(hi)) => (lo, hi),
        _ => return Distribution::new(),
    };
    let surv = |s: i32| dists.iter().map(|d| survival(d, s)).product::<f64>();
    (lo..=hi)
        .map(|s| (s, (surv(s - 1) - surv(s)).max(0.0)))
        .filter(|(_, p)| *p > 0.0)
        .collect()
}

/// (P(a < b), P(a == b), P(a > b)) for independent scores.
fn compare(a: &Distribution, b: &Distribution) -> (f64, f64, f64) {
    let mut win = 0.0;
    let mut tie = 0.0;
    for (&s, &p) in a {
        win += p * survival(b, s);
        tie += p * b.get(&s).copied().unwrap_or(0.0);
    }
    let lose = (1.0 - win - tie).max(0.0);
    (win, tie, lose)
}

fn shift(dist: &Distribution, by: i32) -> Distribution {
    dist.iter().map(|(&s, &p)| (s - by, p)).collect()
}

fn confidence_interval(p: f64, samples: u32) -> (f64, f64) {
    let n = f64::from(samples.max(1));
    let half = 1.96 * (p * (1.0 - p) / n).sqrt();
    ((p - half).max(0.0), (p + half).min(1.0))
}

// ---------------------------------------------------------------------------
// Calculator
// ---------------------------------------------------------------------------

pub struct OddsCalculator {
    config: OddsConfig,
    probability: ProbabilityCalculator,
    cache: TtlCache<String, OddsResult>,
}

impl Default for OddsCalculator {
    fn default() -> Self {
        OddsCalculator::new(OddsConfig::default(), ProbabilityConfig::default())
    }
}

struct Evaluation<'a> {
    players: &'a [Player],
    context: &'a OddsContext,
    net: BTreeMap<PlayerId, Distribution>,
}

impl<'a> Evaluation<'a> {
    fn dists(&self, ids: &[PlayerId]) -> Vec<&Distribution> {
        ids.iter().filter_map(|id| self.net.get(id)).collect()
    }

    fn matchup(&self, side: &[PlayerId], others: &[PlayerId]) -> (f64, f64, f64) {
        compare(&best_ball(&self.dists(side)), &best_ball(&self.dists(others)))
    }

    fn others(&self, side: &[PlayerId]) -> Vec<PlayerId> {
        self.players
            .iter()
            .map(|p| p.id)
            .filter(|id| !side.contains(id))
            .collect()
    }

    fn name(&self, id: PlayerId) -> String {
        self.players
            .iter()
            .find(|p| p.id == id)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| id.to_string())
    }
}

/// Expected quarters for one member of a side with `side_size` players facing
/// `opponents`, at stake `wager`. Winners split the losers' payments.
fn side_ev(win: f64, lose: f64, side_size: usize, opponents: usize, wager: f64) -> f64 {
    let gain = wager * opponents as f64 / side_size.max(1) as f64;
    win * gain - lose * wager
}

impl OddsCalculator {
    pub fn new(config: OddsConfig, probability: ProbabilityConfig) -> Self {
        let cache = TtlCache::new(Duration::from_secs(config.cache_ttl_secs), config.cache_capacity);
        OddsCalculator {
            config,
            probability: ProbabilityCalculator::new(probability),
            cache,
        }
    }

    pub fn probability(&self) -> &ProbabilityCalculator {
        &self.probability
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn calculate_real_time_odds(
        &self,
        players: &[Player],
        hole: &Hole,
        context: &OddsContext,
    ) -> OddsResult {
        let start = Instant::now();
        let key = serde_json::to_string(&(players, hole, context)).ok();
        if let Some(cached) = key.as_ref().and_then(|k| self.cache.get(k)) {
            return cached;
        }

        let mut result = match self.try_calculate(players, hole, context) {
            Ok(result) => result,
            Err(e) => {
                log::warn!("odds calculation degraded on hole {}: {}", hole.number, e);
                fallback(players, hole, context, &e)
            }
        };
        result.computation_ms = start.elapsed().as_secs_f64() * 1000.0;
        if result.computation_ms > self.config.budget_ms as f64 {
            log::debug!(
                "odds for hole {} took {:.1}ms (budget {}ms)",
                hole.number,
                result.computation_ms,
                self.config.budget_ms
            );
        }
        if let (Some(k), false) = (key, result.degraded) {
            self.cache.insert(k, result.clone());
        }
        result
    }

    fn try_calculate(
        &self,
        players: &[Player],
        hole: &Hole,
        context: &OddsContext,
    ) -> WgpResult<OddsResult> {
        validate_players(players)?;
        hole.validate()?;
        for id in [context.captain, context.focal()] {
            if !players.iter().any(|p| p.id == id) {
                return Err(WgpError::Validation(format!("{} is not in this group", id)));
            }
        }
        if context.wager == 0 {
            return Err(WgpError::Validation("wager must be positive".to_string()));
        }

        let difficulty = hole_difficulty(hole.stroke_index);
        let mut net = BTreeMap::new();
        let mut shot_success = BTreeMap::new();
        for player in players {
            let strokes = player.strokes_on(hole) as i32;
            let gross = match context.positions.iter().find(|pos| pos.player == player.id) {
                Some(pos) => {
                    shot_success.insert(
                        player.id,
                        self.probability.shot_success_probability(
                            player.handicap,
                            pos.distance_yards,
                            pos.lie,
                            difficulty,
                        ),
                    );
                    self.position_distribution(player.handicap, hole, pos, difficulty)
                }
                None => self.probability.hole_completion_distribution(player.handicap, hole),
            };
            net.insert(player.id, shift(&gross, strokes));
        }

        let eval = Evaluation {
            players,
            context,
            net,
        };

        let player_odds = self.player_odds(&eval, hole, &shot_success);
        let team_odds = if context.teams.is_formed() {
            let t1 = context.teams.members(Side::Team1);
            let t2 = context.teams.members(Side::Team2);
            let (w, t, l) = eval.matchup(&t1, &t2);
            Some(TeamOdds {
                team1_win: w,
                team2_win: l,
                tie: t,
            })
        } else {
            None
        };

        let scenarios = self.scenarios(&eval, team_odds.as_ref());
        if scenarios
            .iter()
            .any(|s| !s.win_probability.is_finite() || !s.expected_value.is_finite())
        {
            return Err(WgpError::NumericDegenerateInput(
                "non-finite scenario value".to_string(),
            ));
        }

        let recommended = scenarios
            .iter()
            .sorted_by(|a, b| {
                b.expected_value
                    .partial_cmp(&a.expected_value)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.risk_level.cmp(&b.risk_level))
            })
            .next()
            .map(|s| s.scenario_type.clone());

        let mut rationale = Vec::new();
        if let Some(leader) = player_odds.iter().max_by(|a, b| {
            a.win_probability
                .partial_cmp(&b.win_probability)
                .unwrap_or(std::cmp::Ordering::Equal)
        }) {
            rationale.push(format!(
                "{} is most likely to post the low net ({:.1}%)",
                leader.name,
                leader.win_probability * 100.0
            ));
        }
        if let Some(team) = &team_odds {
            rationale.push(format!(
                "Team 1 wins {:.1}%, team 2 wins {:.1}%, halved {:.1}%",
                team.team1_win * 100.0,
                team.team2_win * 100.0,
                team.tie * 100.0
            ));
        }
        if let Some(best) = recommended
            .as_ref()
            .and_then(|kind| scenarios.iter().find(|s| &s.scenario_type == kind))
        {
            rationale.push(format!(
                "Best option for {}: {} (EV {:+.2} quarters, {} risk)",
                eval.name(context.focal()),
                best.scenario_type,
                best.expected_value,
                best.risk_level
            ));
        }

        Ok(OddsResult {
            hole_number: hole.number,
            player_odds,
            team_odds,
            scenarios,
            recommended_action: recommended,
            rationale,
            confidence: 1.0,
            degraded: false,
            computation_ms: 0.0,
        })
    }

    fn position_distribution(
        &self,
        handicap: f64,
        hole: &Hole,
        pos: &PlayerPosition,
        difficulty: f64,
    ) -> Distribution {
        let remaining =
            self.probability
                .expected_strokes_remaining(handicap, pos.distance_yards, pos.lie, difficulty);
        let mean = f64::from(pos.strokes_taken) + remaining;
        let spread = score_spread(handicap) * (remaining / f64::from(hole.par)).sqrt().clamp(0.3, 1.0);
        let par = i32::from(hole.par);
        let cfg = self.probability.config();
        let lo = (par - i32::from(cfg.window_below_par)).max(pos.strokes_taken as i32 + 1);
        let hi = (par + i32::from(cfg.window_above_par)).max(lo + 2);
        crate::probability::score_distribution(mean, spread, lo, hi)
    }

    fn player_odds(
        &self,
        eval: &Evaluation<'_>,
        hole: &Hole,
        shot_success: &BTreeMap<PlayerId, f64>,
    ) -> Vec<PlayerOdds> {
        eval.players
            .iter()
            .map(|player| {
                let mine = &eval.net[&player.id];
                let win_probability = mine
                    .iter()
                    .map(|(&s, &p)| {
                        p * eval
                            .players
                            .iter()
                            .filter(|o| o.id != player.id)
                            .map(|o| survival(&eval.net[&o.id], s))
                            .product::<f64>()
                    })
                    .sum();
                PlayerOdds {
                    player: player.id,
                    name: player.name.clone(),
                    strokes_received: player.strokes_on(hole),
                    expected_net: crate::probability::expected_score(mine),
                    win_probability,
                    shot_success: shot_success.get(&player.id).copied(),
                }
            })
            .collect()
    }

    fn scenario(&self, kind: ScenarioKind, win: f64, ev: f64, stake: f64) -> BettingScenario {
        let risk_level = RiskLevel::classify(win, ev, stake);
        let recommendation = match (ev > 0.0, risk_level) {
            (true, RiskLevel::Low) => "Strongly favourable".to_string(),
            (true, _) => "Favourable, but variance is real".to_string(),
            (false, RiskLevel::High) => "Avoid".to_string(),
            (false, _) => "Marginal".to_string(),
        };
        BettingScenario {
            scenario_type: kind,
            win_probability: win,
            expected_value: ev,
            risk_level,
            confidence_interval: confidence_interval(win, self.config.calibration_samples),
            recommendation,
        }
    }

    fn scenarios(&self, eval: &Evaluation<'_>, team_odds: Option<&TeamOdds>) -> Vec<BettingScenario> {
        let ctx = eval.context;
        let focal = ctx.focal();
        let wager = f64::from(ctx.wager);
        let mut out = Vec::new();

        match (&ctx.teams, team_odds) {
            (TeamConfiguration::Pending, _) if focal == ctx.captain => {
                let solo_stake = wager * 2.0;
                let (w, _, l) = eval.matchup(&[focal], &eval.others(&[focal]));
                out.push(self.scenario(ScenarioKind::GoSolo, w, side_ev(w, l, 1, 3, solo_stake), solo_stake));
                for partner in eval.others(&[focal]) {
                    let side = [focal, partner];
                    let (w, _, l) = eval.matchup(&side, &eval.others(&side));
                    out.push(self.scenario(
                        ScenarioKind::RequestPartner(partner),
                        w,
                        side_ev(w, l, 2, 2, wager),
                        wager,
                    ));
                }
                if ctx.float_available {
                    if let Some(best) = out.iter().max_by(|a, b| {
                        a.expected_value
                            .partial_cmp(&b.expected_value)
                            .unwrap_or(std::cmp::Ordering::Equal)
                    }) {
                        let (w, ev) = (best.win_probability, best.expected_value * 2.0);
                        out.push(self.scenario(ScenarioKind::InvokeFloat, w, ev, wager * 2.0));
                    }
                }
            }
            (TeamConfiguration::Pending, _) => {
                if ctx.pending_request == Some(focal) {
                    let side = [ctx.captain, focal];
                    let (w, _, l) = eval.matchup(&side, &eval.others(&side));
                    out.push(self.scenario(
                        ScenarioKind::AcceptPartnership,
                        w,
                        side_ev(w, l, 2, 2, wager),
                        wager,
                    ));
                    // A refused captain is assumed to go solo against us.
                    let field = eval.others(&[ctx.captain]);
                    let (w, _, l) = eval.matchup(&field, &[ctx.captain]);
                    out.push(self.scenario(
                        ScenarioKind::DeclinePartnership,
                        w,
                        side_ev(w, l, 3, 1, wager * 2.0),
                        wager * 2.0,
                    ));
                } else {
                    out.push(self.scenario(ScenarioKind::Hold, 0.5, 0.0, wager));
                }
            }
            (teams, Some(odds)) => {
                let side = match teams.side_of(focal) {
                    Some(side) => side,
                    None => return out,
                };
                let mine = teams.members(side).len();
                let theirs = teams.members(side.opponent()).len();
                let (w, _, l) = odds.for_side(side);
                let hold_ev = side_ev(w, l, mine, theirs, wager);
                out.push(self.scenario(ScenarioKind::Hold, w, hold_ev, wager));

                match ctx.pending_double {
                    Some(offer) if offer.target == side => {
                        let doubled = wager * 2.0;
                        out.push(self.scenario(
                            ScenarioKind::AcceptDouble,
                            w,
                            side_ev(w, l, mine, theirs, doubled),
                            doubled,
                        ));
                        out.push(self.scenario(ScenarioKind::DeclineDouble, 0.0, -wager, wager));
                    }
                    Some(_) => {}
                    None if !ctx.doubled => {
                        let doubled = wager * 2.0;
                        // Opponents decline when accepting costs more than conceding.
                        let their_ev = side_ev(l, w, theirs, mine, doubled);
                        let ev = if their_ev < -wager {
                            wager * theirs as f64 / mine.max(1) as f64
                        } else {
                            side_ev(w, l, mine, theirs, doubled)
                        };
                        out.push(self.scenario(ScenarioKind::OfferDouble, w, ev, doubled));
                    }
                    None => {}
                }
            }
            (_, None) => {}
        }
        out
    }
}

fn fallback(players: &[Player], hole: &Hole, context: &OddsContext, error: &WgpError) -> OddsResult {
    let share = 1.0 / players.len().max(1) as f64;
    let player_odds = players
        .iter()
        .map(|p| PlayerOdds {
            player: p.id,
            name: p.name.clone(),
            strokes_received: 0,
            expected_net: f64::from(hole.par),
            win_probability: share,
            shot_success: None,
        })
        .collect();
    let team_odds = context.teams.is_formed().then_some(TeamOdds {
        team1_win: 0.5,
        team2_win: 0.5,
        tie: 0.0,
    });
    let wager = f64::from(context.wager.max(1));
    OddsResult {
        hole_number: hole.number,
        player_odds,
        team_odds,
        scenarios: vec![BettingScenario {
            scenario_type: ScenarioKind::Hold,
            win_probability: 0.5,
            expected_value: 0.0,
            risk_level: RiskLevel::classify(0.5, 0.0, wager),
            confidence_interval: (0.0, 1.0),
            recommendation: "Insufficient data; no edge assumed".to_string(),
        }],
        recommended_action: Some(ScenarioKind::Hold),
        rationale: vec![format!("Simplified equal-probability estimate ({})", error)],
        confidence: 0.25,
        degraded: true,
        computation_ms: 0.0,
    }
}
