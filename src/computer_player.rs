//! Computer-controlled players.
//!
//! Every decision compares an advantage metric against a threshold supplied by
//! the player's `DecisionPolicy`. Odds from the calculator are used when the
//! caller has them; otherwise win chances are estimated from expected net
//! scores. The only randomness is an occasional bluff drawn from a seeded RNG.

use std::fmt;
use std::str::FromStr;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::betting::BettingStateMachine;
use crate::error::{WgpError, WgpResult};
use crate::model::{Hole, Player, PlayerId};
use crate::odds::{OddsResult, ScenarioKind};
use crate::probability::{expected_score, hole_completion_distribution};
use crate::teams::{Side, TeamConfiguration};

/// Logistic slope turning an expected net-stroke edge into a win chance.
const EDGE_SLOPE: f64 = 1.6;

// ---------------------------------------------------------------------------
// Personalities
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Personality {
    Aggressive,
    Conservative,
    Strategic,
    Balanced,
}

impl Personality {
    pub const ALL: [Personality; 4] = [
        Personality::Aggressive,
        Personality::Conservative,
        Personality::Strategic,
        Personality::Balanced,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Personality::Aggressive => "aggressive",
            Personality::Conservative => "conservative",
            Personality::Strategic => "strategic",
            Personality::Balanced => "balanced",
        }
    }

    pub fn policy(self) -> Box<dyn DecisionPolicy> {
        match self {
            Personality::Aggressive => Box::new(Aggressive),
            Personality::Conservative => Box::new(Conservative),
            Personality::Strategic => Box::new(Strategic),
            Personality::Balanced => Box::new(Balanced),
        }
    }
}

impl fmt::Display for Personality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Personality {
    type Err = WgpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Personality::ALL
            .iter()
            .copied()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| WgpError::Validation(format!("unknown personality '{}'", s)))
    }
}

/// Situation numbers every policy reasons about. Stroke figures are expected
/// net strokes on the current hole, positive when they favour this player.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdvantageMetrics {
    /// Edge over the best of the other three players.
    pub stroke_advantage: f64,
    /// Edge of this player's side over the other side. Zero while teams are
    /// unformed.
    pub team_differential: f64,
    /// Points behind the leader, zero when leading.
    pub point_deficit: i32,
    pub holes_remaining: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Minimum stroke advantage to go solo.
    pub solo_edge: f64,
    /// Minimum team differential to accept a partnership request.
    pub accept_partner_edge: f64,
    /// Minimum team win chance to offer a double.
    pub offer_double: f64,
    /// Minimum team win chance to accept a double.
    pub accept_double: f64,
    /// Minimum side win chance to spend the float.
    pub float: f64,
}

pub trait DecisionPolicy: Send + Sync {
    fn personality(&self) -> Personality;

    fn thresholds(&self, metrics: &AdvantageMetrics) -> Thresholds;

    /// Chance of taking an aggressive action the numbers do not support.
    fn bluff_rate(&self) -> f64 {
        0.0
    }
}

pub struct Aggressive;
pub struct Conservative;
pub struct Strategic;
pub struct Balanced;

const BALANCED: Thresholds = Thresholds {
    solo_edge: 0.7,
    accept_partner_edge: -0.2,
    offer_double: 0.60,
    accept_double: 0.45,
    float: 0.58,
};

impl DecisionPolicy for Aggressive {
    fn personality(&self) -> Personality {
        Personality::Aggressive
    }

    fn thresholds(&self, _metrics: &AdvantageMetrics) -> Thresholds {
        Thresholds {
            solo_edge: 0.3,
            accept_partner_edge: -0.6,
            offer_double: 0.52,
            accept_double: 0.38,
            float: 0.50,
        }
    }

    fn bluff_rate(&self) -> f64 {
        0.10
    }
}

impl DecisionPolicy for Conservative {
    fn personality(&self) -> Personality {
        Personality::Conservative
    }

    fn thresholds(&self, _metrics: &AdvantageMetrics) -> Thresholds {
        Thresholds {
            solo_edge: 1.2,
            accept_partner_edge: 0.0,
            offer_double: 0.68,
            accept_double: 0.55,
            float: 0.70,
        }
    }
}

impl DecisionPolicy for Balanced {
    fn personality(&self) -> Personality {
        Personality::Balanced
    }

    fn thresholds(&self, _metrics: &AdvantageMetrics) -> Thresholds {
        BALANCED
    }

    fn bluff_rate(&self) -> f64 {
        0.03
    }
}

/// Balanced by default, pressing when behind late and protecting a lead.
impl DecisionPolicy for Strategic {
    fn personality(&self) -> Personality {
        Personality::Strategic
    }

    fn thresholds(&self, metrics: &AdvantageMetrics) -> Thresholds {
        let holes = metrics.holes_remaining.max(1) as f64;
        let pressure = if metrics.point_deficit > 0 {
            (f64::from(metrics.point_deficit) / (holes * 2.0)).min(1.0)
        } else if metrics.holes_remaining <= 6 {
            -0.5
        } else {
            0.0
        };
        Thresholds {
            solo_edge: BALANCED.solo_edge - 0.6 * pressure,
            accept_partner_edge: BALANCED.accept_partner_edge - 0.3 * pressure,
            offer_double: BALANCED.offer_double - 0.10 * pressure,
            accept_double: BALANCED.accept_double - 0.10 * pressure,
            float: BALANCED.float - 0.12 * pressure,
        }
    }
}

// ---------------------------------------------------------------------------
// Decision context
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct DecisionContext<'a> {
    pub me: PlayerId,
    pub players: &'a [Player],
    pub hole: &'a Hole,
    pub captain: PlayerId,
    pub teams: &'a TeamConfiguration,
    pub wager: u32,
    pub holes_remaining: usize,
    pub odds: Option<&'a OddsResult>,
}

impl<'a> DecisionContext<'a> {
    pub fn from_machine(
        machine: &'a BettingStateMachine,
        me: PlayerId,
        odds: Option<&'a OddsResult>,
    ) -> Self {
        DecisionContext {
            me,
            players: machine.players(),
            hole: machine.hole(),
            captain: machine.captain(),
            teams: machine.teams(),
            wager: machine.wager().current(),
            holes_remaining: machine.holes_remaining(),
            odds,
        }
    }

    fn player(&self, id: PlayerId) -> WgpResult<&'a Player> {
        self.players
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| WgpError::Validation(format!("unknown player {}", id)))
    }

    /// Expected net score on this hole.
    pub fn expected_net(&self, id: PlayerId) -> WgpResult<f64> {
        let player = self.player(id)?;
        let gross = expected_score(&hole_completion_distribution(player.handicap, self.hole));
        Ok(gross - f64::from(player.strokes_on(self.hole)))
    }

    fn best_net(&self, ids: &[PlayerId]) -> WgpResult<f64> {
        let mut best = f64::INFINITY;
        for &id in ids {
            best = best.min(self.expected_net(id)?);
        }
        Ok(best)
    }

    fn others(&self, ids: &[PlayerId]) -> Vec<PlayerId> {
        self.players
            .iter()
            .map(|p| p.id)
            .filter(|id| !ids.contains(id))
            .collect()
    }

    pub fn metrics(&self) -> WgpResult<AdvantageMetrics> {
        let mine = self.expected_net(self.me)?;
        let stroke_advantage = self.best_net(&self.others(&[self.me]))? - mine;
        let team_differential = match self.teams.side_of(self.me) {
            Some(side) => {
                let ours = self.teams.members(side);
                let theirs = self.teams.members(side.opponent());
                self.best_net(&theirs)? - self.best_net(&ours)?
            }
            None => 0.0,
        };
        let me = self.player(self.me)?;
        let leader = self.players.iter().map(|p| p.points()).max().unwrap_or(0);
        Ok(AdvantageMetrics {
            stroke_advantage,
            team_differential,
            point_deficit: (leader - me.points()).max(0),
            holes_remaining: self.holes_remaining,
        })
    }

    /// Win chance of `side`, from odds when present.
    fn side_win_chance(&self, side: Side, metrics: &AdvantageMetrics) -> f64 {
        if let Some(team) = self.odds.filter(|o| !o.degraded).and_then(|o| o.team_odds) {
            let (win, tie, _) = team.for_side(side);
            return win + tie / 2.0;
        }
        let edge = if self.teams.side_of(self.me) == Some(side) {
            metrics.team_differential
        } else {
            -metrics.team_differential
        };
        edge_to_probability(edge)
    }
}

pub fn edge_to_probability(edge: f64) -> f64 {
    1.0 / (1.0 + (-EDGE_SLOPE * edge).exp())
}

// ---------------------------------------------------------------------------
// Computer player
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "choice", content = "partner", rename_all = "snake_case")]
pub enum PartnershipChoice {
    GoSolo,
    Request(PlayerId),
}

pub struct ComputerPlayer {
    pub player_id: PlayerId,
    policy: Box<dyn DecisionPolicy>,
    rng: StdRng,
}

impl fmt::Debug for ComputerPlayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputerPlayer")
            .field("player_id", &self.player_id)
            .field("personality", &self.policy.personality())
            .finish()
    }
}

impl ComputerPlayer {
    pub fn new(player_id: PlayerId, personality: Personality, seed: u64) -> Self {
        Self::with_policy(player_id, personality.policy(), seed)
    }

    pub fn with_policy(player_id: PlayerId, policy: Box<dyn DecisionPolicy>, seed: u64) -> Self {
        ComputerPlayer {
            player_id,
            policy,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn personality(&self) -> Personality {
        self.policy.personality()
    }

    fn bluff(&mut self) -> bool {
        let rate = self.policy.bluff_rate();
        rate > 0.0 && self.rng.gen_bool(rate.min(1.0))
    }

    fn context_for<'a>(&self, ctx: &DecisionContext<'a>) -> DecisionContext<'a> {
        DecisionContext { me: self.player_id, ..*ctx }
    }

    /// As captain: go solo or pick a partner to ask.
    pub fn choose_partnership(
        &mut self,
        ctx: &DecisionContext<'_>,
        excluded: &[PlayerId],
    ) -> WgpResult<PartnershipChoice> {
        let ctx = self.context_for(ctx);
        let metrics = ctx.metrics()?;
        let thresholds = self.policy.thresholds(&metrics);

        let candidates: Vec<PlayerId> = ctx
            .others(&[self.player_id])
            .into_iter()
            .filter(|id| !excluded.contains(id))
            .collect();

        let solo_edge = metrics.stroke_advantage;
        if candidates.is_empty() || solo_edge >= thresholds.solo_edge || (solo_edge > 0.0 && self.bluff()) {
            log::debug!(
                "{} ({}) goes solo: edge {:.2} vs threshold {:.2}",
                self.player_id,
                self.personality(),
                solo_edge,
                thresholds.solo_edge
            );
            return Ok(PartnershipChoice::GoSolo);
        }

        let mut best: Option<(PlayerId, f64)> = None;
        for id in candidates {
            let score = match ctx.odds.and_then(|o| o.scenario(&ScenarioKind::RequestPartner(id))) {
                Some(s) => s.expected_value,
                None => -ctx.expected_net(id)?,
            };
            if best.map_or(true, |(_, b)| score > b) {
                best = Some((id, score));
            }
        }
        match best {
            Some((id, _)) => Ok(PartnershipChoice::Request(id)),
            None => Ok(PartnershipChoice::GoSolo),
        }
    }

    /// Answer a captain's request to partner.
    pub fn accept_partnership(&mut self, ctx: &DecisionContext<'_>) -> WgpResult<bool> {
        let ctx = self.context_for(ctx);
        let metrics = ctx.metrics()?;
        let thresholds = self.policy.thresholds(&metrics);
        let ours = [ctx.captain, self.player_id];
        let edge = ctx.best_net(&ctx.others(&ours))? - ctx.best_net(&ours)?;
        Ok(edge >= thresholds.accept_partner_edge)
    }

    pub fn offer_double(&mut self, ctx: &DecisionContext<'_>) -> WgpResult<bool> {
        let ctx = self.context_for(ctx);
        let side = match ctx.teams.side_of(self.player_id) {
            Some(side) => side,
            None => return Ok(false),
        };
        let metrics = ctx.metrics()?;
        let thresholds = self.policy.thresholds(&metrics);
        let p = ctx.side_win_chance(side, &metrics);
        Ok(p >= thresholds.offer_double || (p >= 0.5 && self.bluff()))
    }

    pub fn accept_double(&mut self, ctx: &DecisionContext<'_>) -> WgpResult<bool> {
        let ctx = self.context_for(ctx);
        let side = match ctx.teams.side_of(self.player_id) {
            Some(side) => side,
            None => return Ok(false),
        };
        let metrics = ctx.metrics()?;
        let thresholds = self.policy.thresholds(&metrics);
        Ok(ctx.side_win_chance(side, &metrics) >= thresholds.accept_double)
    }

    /// Whether to spend the once-per-game float on this hole. Only the
    /// captain can float, and only once teams are known.
    pub fn invoke_float(&mut self, ctx: &DecisionContext<'_>) -> WgpResult<bool> {
        let ctx = self.context_for(ctx);
        if ctx.captain != self.player_id || ctx.player(self.player_id)?.float_used() {
            return Ok(false);
        }
        let side = match ctx.teams.side_of(self.player_id) {
            Some(side) => side,
            None => return Ok(false),
        };
        let metrics = ctx.metrics()?;
        let thresholds = self.policy.thresholds(&metrics);
        Ok(ctx.side_win_chance(side, &metrics) >= thresholds.float)
    }
}
