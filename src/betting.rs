//! Hole-by-hole betting rules: captain rotation, team formation, wager
//! escalation and zero-sum settlement.
//!
//! The machine owns the players and is the only writer of their point totals.
//! Every call outside its legal state is rejected with a typed error and the
//! state is left untouched. Nothing advances without an explicit call.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{WgpError, WgpResult};
use crate::model::{validate_players, Course, Hole, Player, PlayerId};
use crate::teams::{Side, TeamConfiguration};
use crate::wager::{Wager, MAX_WAGER};

/// Highest gross score a player may record on one hole.
pub const MAX_GROSS_SCORE: u32 = 20;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    AwaitingTeams,
    Solo,
    Partners,
    Scored,
    GameComplete,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::AwaitingTeams => "awaiting teams",
            Phase::Solo => "captain is solo",
            Phase::Partners => "partners are set",
            Phase::Scored => "hole is scored",
            Phase::GameComplete => "game is complete",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoubleOffer {
    pub offering: Side,
    pub target: Side,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HoleOutcome {
    Won {
        winners: Vec<PlayerId>,
        losers: Vec<PlayerId>,
    },
    Halved {
        carried: u32,
    },
    DoubleDeclined {
        winners: Vec<PlayerId>,
        losers: Vec<PlayerId>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoleResult {
    pub hole_number: u8,
    pub captain: PlayerId,
    pub teams: TeamConfiguration,
    /// Quarters at stake when the hole was decided.
    pub wager: u32,
    pub outcome: HoleOutcome,
    pub net_scores: BTreeMap<PlayerId, i32>,
    pub deltas: BTreeMap<PlayerId, i32>,
}

impl HoleResult {
    pub fn delta_for(&self, player: PlayerId) -> i32 {
        self.deltas.get(&player).copied().unwrap_or(0)
    }

    pub fn delta_sum(&self) -> i32 {
        self.deltas.values().sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standing {
    pub player: PlayerId,
    pub name: String,
    pub points: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSummary {
    pub course: String,
    pub standings: Vec<Standing>,
    pub holes: Vec<HoleResult>,
    /// Carry-over still unresolved after the last hole played.
    pub unresolved_carry: u32,
}

#[derive(Debug, Clone)]
struct HoleState {
    hole: Hole,
    captain: PlayerId,
    teams: TeamConfiguration,
    wager: Wager,
    pending_request: Option<PlayerId>,
    pending_double: Option<DoubleOffer>,
    net_scores: BTreeMap<PlayerId, i32>,
    result: Option<HoleResult>,
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct BettingStateMachine {
    players: Vec<Player>,
    course: Course,
    base_wager: u32,
    hole_index: usize,
    carry_over: u32,
    state: HoleState,
    history: Vec<HoleResult>,
    complete: bool,
}

impl BettingStateMachine {
    pub fn new(players: Vec<Player>, course: Course, base_wager: u32) -> WgpResult<Self> {
        validate_players(&players)?;
        if base_wager == 0 || base_wager > MAX_WAGER {
            return Err(WgpError::Validation(format!(
                "base wager must be between 1 and {} quarters",
                MAX_WAGER
            )));
        }
        let first = course
            .holes
            .first()
            .copied()
            .ok_or_else(|| WgpError::Validation(format!("course {} has no holes", course.name)))?;
        let captain = players[0].id;
        Ok(BettingStateMachine {
            state: HoleState::new(first, captain, Wager::new(base_wager, 0)),
            players,
            course,
            base_wager,
            hole_index: 0,
            carry_over: 0,
            history: Vec::new(),
            complete: false,
        })
    }

    // -- Accessors ----------------------------------------------------------

    pub fn phase(&self) -> Phase {
        if self.complete {
            return Phase::GameComplete;
        }
        if self.state.result.is_some() {
            return Phase::Scored;
        }
        match self.state.teams {
            TeamConfiguration::Pending => Phase::AwaitingTeams,
            TeamConfiguration::Solo { .. } => Phase::Solo,
            TeamConfiguration::Partners { .. } => Phase::Partners,
        }
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player(&self, id: PlayerId) -> WgpResult<&Player> {
        self.players
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| WgpError::Validation(format!("unknown player {}", id)))
    }

    pub fn course(&self) -> &Course {
        &self.course
    }

    pub fn hole(&self) -> &Hole {
        &self.state.hole
    }

    pub fn captain(&self) -> PlayerId {
        self.state.captain
    }

    pub fn teams(&self) -> &TeamConfiguration {
        &self.state.teams
    }

    pub fn wager(&self) -> &Wager {
        &self.state.wager
    }

    pub fn pending_request(&self) -> Option<PlayerId> {
        self.state.pending_request
    }

    pub fn pending_double(&self) -> Option<DoubleOffer> {
        self.state.pending_double
    }

    pub fn net_scores(&self) -> &BTreeMap<PlayerId, i32> {
        &self.state.net_scores
    }

    pub fn current_result(&self) -> Option<&HoleResult> {
        self.state.result.as_ref()
    }

    pub fn history(&self) -> &[HoleResult] {
        &self.history
    }

    /// Quarters that will be added to the next hole's wager.
    pub fn carry_over(&self) -> u32 {
        self.carry_over
    }

    /// Holes still to be settled, including the current one if open.
    pub fn holes_remaining(&self) -> usize {
        if self.complete {
            return 0;
        }
        let open = usize::from(self.state.result.is_none());
        self.course.holes.len().saturating_sub(self.hole_index + 1) + open
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn standings(&self) -> Vec<Standing> {
        let mut standings: Vec<Standing> = self
            .players
            .iter()
            .map(|p| Standing {
                player: p.id,
                name: p.name.clone(),
                points: p.points(),
            })
            .collect();
        standings.sort_by(|a, b| b.points.cmp(&a.points));
        standings
    }

    pub fn summary(&self) -> GameSummary {
        GameSummary {
            course: self.course.name.clone(),
            standings: self.standings(),
            holes: self.history.clone(),
            unresolved_carry: self.carry_over,
        }
    }

    fn seat(&self, id: PlayerId) -> Option<usize> {
        self.players.iter().position(|p| p.id == id)
    }

    fn ensure_player(&self, id: PlayerId) -> WgpResult<()> {
        self.seat(id)
            .map(|_| ())
            .ok_or_else(|| WgpError::Validation(format!("unknown player {}", id)))
    }

    fn ensure_open(&self, action: &'static str) -> WgpResult<()> {
        match self.phase() {
            Phase::Scored | Phase::GameComplete => {
                Err(WgpError::invalid_state(action, self.phase().to_string()))
            }
            _ => Ok(()),
        }
    }

    fn ensure_captain(&self, action: &'static str, id: PlayerId) -> WgpResult<()> {
        if id != self.state.captain {
            return Err(WgpError::invalid_state(
                action,
                format!("{} is not captain on hole {}", id, self.state.hole.number),
            ));
        }
        Ok(())
    }

    fn ensure_scoring_not_started(&self, action: &'static str) -> WgpResult<()> {
        if !self.state.net_scores.is_empty() {
            return Err(WgpError::invalid_state(action, "scoring has started"));
        }
        Ok(())
    }

    // -- Team formation -----------------------------------------------------

    pub fn request_partner(&mut self, captain: PlayerId, partner: PlayerId) -> WgpResult<()> {
        const ACTION: &str = "request a partner";
        self.ensure_open(ACTION)?;
        if self.state.teams.is_formed() {
            return Err(WgpError::invalid_state(ACTION, self.phase().to_string()));
        }
        self.ensure_captain(ACTION, captain)?;
        if let Some(pending) = self.state.pending_request {
            return Err(WgpError::invalid_state(
                ACTION,
                format!("a request to {} is awaiting an answer", pending),
            ));
        }
        self.ensure_scoring_not_started(ACTION)?;
        self.ensure_player(partner)?;
        if partner == captain {
            return Err(WgpError::Validation("captain cannot partner with themselves".to_string()));
        }
        log::debug!("hole {}: {} asks {} to partner", self.state.hole.number, captain, partner);
        self.state.pending_request = Some(partner);
        Ok(())
    }

    pub fn accept_partner(&mut self, partner: PlayerId) -> WgpResult<()> {
        const ACTION: &str = "accept a partnership";
        self.ensure_open(ACTION)?;
        let requested = self.answerable_request(ACTION, partner)?;
        let captain = self.state.captain;
        let others: Vec<PlayerId> = self
            .players
            .iter()
            .map(|p| p.id)
            .filter(|&id| id != captain && id != requested)
            .collect();
        self.state.teams = TeamConfiguration::Partners {
            team1: [captain, requested],
            team2: [others[0], others[1]],
        };
        self.state.pending_request = None;
        log::debug!("hole {}: {}", self.state.hole.number, self.state.teams);
        Ok(())
    }

    pub fn decline_partner(&mut self, partner: PlayerId) -> WgpResult<()> {
        const ACTION: &str = "decline a partnership";
        self.ensure_open(ACTION)?;
        self.answerable_request(ACTION, partner)?;
        self.state.pending_request = None;
        log::debug!("hole {}: {} declined", self.state.hole.number, partner);
        Ok(())
    }

    fn answerable_request(&self, action: &'static str, partner: PlayerId) -> WgpResult<PlayerId> {
        match self.state.pending_request {
            None => Err(WgpError::invalid_state(action, "no partner request is pending")),
            Some(requested) if requested != partner => Err(WgpError::invalid_state(
                action,
                format!("the pending request was made to {}, not {}", requested, partner),
            )),
            Some(requested) => Ok(requested),
        }
    }

    pub fn go_solo(&mut self, captain: PlayerId) -> WgpResult<()> {
        const ACTION: &str = "go solo";
        self.ensure_open(ACTION)?;
        if self.state.teams.is_formed() {
            return Err(WgpError::invalid_state(ACTION, self.phase().to_string()));
        }
        self.ensure_captain(ACTION, captain)?;
        self.ensure_scoring_not_started(ACTION)?;
        self.state.wager.double_for_solo()?;
        let opponents: Vec<PlayerId> = self
            .players
            .iter()
            .map(|p| p.id)
            .filter(|&id| id != captain)
            .collect();
        self.state.teams = TeamConfiguration::Solo {
            captain,
            opponents: [opponents[0], opponents[1], opponents[2]],
        };
        self.state.pending_request = None;
        log::debug!(
            "hole {}: {} goes solo, wager now {}",
            self.state.hole.number,
            captain,
            self.state.wager.current()
        );
        Ok(())
    }

    // -- Wager escalation ---------------------------------------------------

    pub fn offer_double(&mut self, offering: Side, target: Side) -> WgpResult<()> {
        const ACTION: &str = "offer a double";
        self.ensure_open(ACTION)?;
        if !self.state.teams.is_formed() {
            return Err(WgpError::invalid_state(ACTION, "teams are not formed"));
        }
        if offering == target {
            return Err(WgpError::Validation("a side cannot double itself".to_string()));
        }
        if self.state.wager.is_doubled() {
            return Err(WgpError::invalid_state(ACTION, "the hole is already doubled"));
        }
        if self.state.pending_double.is_some() {
            return Err(WgpError::invalid_state(ACTION, "a double is awaiting an answer"));
        }
        if !self.state.wager.can_double() {
            return Err(WgpError::PreconditionNotMet(format!(
                "the wager of {} quarters is at the table limit",
                self.state.wager.current()
            )));
        }
        self.state.pending_double = Some(DoubleOffer { offering, target });
        log::debug!("hole {}: {} offers a double to {}", self.state.hole.number, offering, target);
        Ok(())
    }

    pub fn accept_double(&mut self) -> WgpResult<()> {
        const ACTION: &str = "accept a double";
        self.ensure_open(ACTION)?;
        if self.state.pending_double.is_none() {
            return Err(WgpError::invalid_state(ACTION, "no double has been offered"));
        }
        self.state.wager.apply_accepted_double()?;
        self.state.pending_double = None;
        log::debug!(
            "hole {}: double accepted, wager now {}",
            self.state.hole.number,
            self.state.wager.current()
        );
        Ok(())
    }

    /// Declining concedes the hole at the pre-double wager.
    pub fn decline_double(&mut self) -> WgpResult<HoleResult> {
        const ACTION: &str = "decline a double";
        self.ensure_open(ACTION)?;
        let offer = match self.state.pending_double {
            Some(offer) => offer,
            None => return Err(WgpError::invalid_state(ACTION, "no double has been offered")),
        };
        let winners = self.state.teams.members(offer.offering);
        let losers = self.state.teams.members(offer.target);
        let wager = self.state.wager.current();
        let deltas = distribute_payout(&self.players, &winners, &losers, wager)?;
        self.state.pending_double = None;
        let outcome = HoleOutcome::DoubleDeclined { winners, losers };
        Ok(self.finish_hole(outcome, deltas))
    }

    pub fn invoke_float(&mut self, captain: PlayerId) -> WgpResult<()> {
        const ACTION: &str = "invoke a float";
        let seat = self
            .seat(captain)
            .ok_or_else(|| WgpError::Validation(format!("unknown player {}", captain)))?;
        if self.players[seat].float_used() {
            return Err(WgpError::AlreadyUsed { player: captain });
        }
        self.ensure_open(ACTION)?;
        self.ensure_captain(ACTION, captain)?;
        self.ensure_scoring_not_started(ACTION)?;
        if self.state.wager.is_floated() {
            return Err(WgpError::invalid_state(ACTION, "this hole is already floated"));
        }
        self.state.wager.apply_float()?;
        self.players[seat].mark_float_used();
        log::debug!(
            "hole {}: {} floats, wager now {}",
            self.state.hole.number,
            captain,
            self.state.wager.current()
        );
        Ok(())
    }

    // -- Scoring ------------------------------------------------------------

    pub fn record_net_score(&mut self, player: PlayerId, gross: u32) -> WgpResult<i32> {
        const ACTION: &str = "record a score";
        self.ensure_open(ACTION)?;
        let seat = self
            .seat(player)
            .ok_or_else(|| WgpError::Validation(format!("unknown player {}", player)))?;
        if !(1..=MAX_GROSS_SCORE).contains(&gross) {
            return Err(WgpError::Validation(format!(
                "gross score must be 1-{}, got {}",
                MAX_GROSS_SCORE, gross
            )));
        }
        if self.state.pending_double.is_some() {
            return Err(WgpError::PreconditionNotMet(
                "the pending double must be answered before scoring".to_string(),
            ));
        }
        if self.state.net_scores.contains_key(&player) {
            return Err(WgpError::invalid_state(
                ACTION,
                format!("{} already has a score on this hole", player),
            ));
        }
        let strokes = self.players[seat].strokes_on(&self.state.hole);
        let net = gross as i32 - strokes as i32;
        self.state.net_scores.insert(player, net);
        Ok(net)
    }

    pub fn settle_hole(&mut self) -> WgpResult<HoleResult> {
        const ACTION: &str = "settle the hole";
        self.ensure_open(ACTION)?;
        if !self.state.teams.is_formed() {
            return Err(WgpError::PreconditionNotMet("teams have not been formed".to_string()));
        }
        if self.state.pending_double.is_some() {
            return Err(WgpError::PreconditionNotMet(
                "the pending double must be answered first".to_string(),
            ));
        }
        let missing: Vec<String> = self
            .players
            .iter()
            .filter(|p| !self.state.net_scores.contains_key(&p.id))
            .map(|p| p.name.clone())
            .collect();
        if !missing.is_empty() {
            return Err(WgpError::PreconditionNotMet(format!(
                "missing scores for {}",
                missing.join(", ")
            )));
        }

        let team1 = self.state.teams.members(Side::Team1);
        let team2 = self.state.teams.members(Side::Team2);
        let best1 = self.best_ball(&team1);
        let best2 = self.best_ball(&team2);
        let wager = self.state.wager.current();

        let (outcome, deltas) = match best1.cmp(&best2) {
            std::cmp::Ordering::Equal => {
                let deltas = self.players.iter().map(|p| (p.id, 0)).collect();
                (HoleOutcome::Halved { carried: wager }, deltas)
            }
            std::cmp::Ordering::Less => {
                let deltas = distribute_payout(&self.players, &team1, &team2, wager)?;
                (HoleOutcome::Won { winners: team1, losers: team2 }, deltas)
            }
            std::cmp::Ordering::Greater => {
                let deltas = distribute_payout(&self.players, &team2, &team1, wager)?;
                (HoleOutcome::Won { winners: team2, losers: team1 }, deltas)
            }
        };
        Ok(self.finish_hole(outcome, deltas))
    }

    fn best_ball(&self, members: &[PlayerId]) -> i32 {
        members
            .iter()
            .filter_map(|id| self.state.net_scores.get(id))
            .copied()
            .min()
            .unwrap_or(i32::MAX)
    }

    fn finish_hole(&mut self, outcome: HoleOutcome, deltas: BTreeMap<PlayerId, i32>) -> HoleResult {
        debug_assert_eq!(deltas.values().sum::<i32>(), 0);
        self.carry_over = match outcome {
            HoleOutcome::Halved { carried } => carried,
            _ => 0,
        };
        for player in self.players.iter_mut() {
            player.apply_delta(deltas.get(&player.id).copied().unwrap_or(0));
        }
        let result = HoleResult {
            hole_number: self.state.hole.number,
            captain: self.state.captain,
            teams: self.state.teams.clone(),
            wager: self.state.wager.current(),
            outcome,
            net_scores: self.state.net_scores.clone(),
            deltas,
        };
        log::info!(
            "hole {} settled at {} quarters: {:?}",
            result.hole_number,
            result.wager,
            result.outcome
        );
        self.history.push(result.clone());
        self.state.result = Some(result.clone());
        result
    }

    /// Moves from a scored hole to the next hole, or completes the game after
    /// the last one.
    pub fn advance_hole(&mut self) -> WgpResult<Phase> {
        const ACTION: &str = "advance to the next hole";
        if self.phase() != Phase::Scored {
            return Err(WgpError::invalid_state(ACTION, self.phase().to_string()));
        }
        if self.hole_index + 1 >= self.course.holes.len() {
            self.complete = true;
            log::info!("game complete on {}", self.course.name);
            return Ok(Phase::GameComplete);
        }
        self.hole_index += 1;
        let hole = self.course.holes[self.hole_index];
        let captain = self.players[self.hole_index % self.players.len()].id;
        let wager = Wager::new(self.base_wager, self.carry_over);
        self.carry_over = 0;
        self.state = HoleState::new(hole, captain, wager);
        Ok(Phase::AwaitingTeams)
    }
}

impl HoleState {
    fn new(hole: Hole, captain: PlayerId, wager: Wager) -> Self {
        HoleState {
            hole,
            captain,
            teams: TeamConfiguration::Pending,
            wager,
            pending_request: None,
            pending_double: None,
            net_scores: BTreeMap::new(),
            result: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Settlement arithmetic
// ---------------------------------------------------------------------------

/// Every loser pays `wager`; the pot is split evenly among the winners. Any
/// remainder goes one quarter at a time to the winners furthest behind on
/// points, ties broken by seating order. The result always sums to zero.
pub fn distribute_payout(
    players: &[Player],
    winners: &[PlayerId],
    losers: &[PlayerId],
    wager: u32,
) -> WgpResult<BTreeMap<PlayerId, i32>> {
    let mut deltas: BTreeMap<PlayerId, i32> = players.iter().map(|p| (p.id, 0)).collect();
    if winners.is_empty() || losers.is_empty() {
        return Ok(deltas);
    }
    let overflow = || WgpError::Validation(format!("a {} quarter wager cannot be paid out", wager));
    let wager = i32::try_from(wager).map_err(|_| overflow())?;
    let pot = i32::try_from(losers.len())
        .ok()
        .and_then(|n| wager.checked_mul(n))
        .ok_or_else(overflow)?;
    for loser in losers {
        *deltas.entry(*loser).or_insert(0) -= wager;
    }

    let share = pot / winners.len() as i32;
    let remainder = (pot % winners.len() as i32) as usize;

    let seat = |id: &PlayerId| players.iter().position(|p| p.id == *id).unwrap_or(usize::MAX);
    let points = |id: &PlayerId| {
        players
            .iter()
            .find(|p| p.id == *id)
            .map(|p| p.points())
            .unwrap_or(0)
    };
    let mut by_need: Vec<PlayerId> = winners.to_vec();
    by_need.sort_by_key(|id| (points(id), seat(id)));

    for (i, winner) in by_need.iter().enumerate() {
        let bonus = i32::from(i < remainder);
        *deltas.entry(*winner).or_insert(0) += share + bonus;
    }
    Ok(deltas)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{default_course, players_from_handicaps};

    fn machine() -> BettingStateMachine {
        let players = players_from_handicaps(&[8.0, 12.0, 15.0, 20.0]).unwrap();
        BettingStateMachine::new(players, default_course().clone(), 1).unwrap()
    }

    #[test]
    fn starts_awaiting_teams_with_first_seat_captain() {
        let m = machine();
        assert_eq!(m.phase(), Phase::AwaitingTeams);
        assert_eq!(m.captain(), PlayerId(1));
        assert_eq!(m.wager().current(), 1);
        assert_eq!(m.holes_remaining(), 18);
    }

    #[test]
    fn karl_marx_remainder_goes_to_trailing_winner() {
        let players = players_from_handicaps(&[8.0, 12.0, 15.0, 20.0]).unwrap();
        let winners = [PlayerId(2), PlayerId(3), PlayerId(4)];
        let deltas = distribute_payout(&players, &winners, &[PlayerId(1)], 4).unwrap();
        assert_eq!(deltas[&PlayerId(1)], -4);
        assert_eq!(deltas[&PlayerId(2)], 2);
        assert_eq!(deltas[&PlayerId(3)], 1);
        assert_eq!(deltas[&PlayerId(4)], 1);
        assert_eq!(deltas.values().sum::<i32>(), 0);
    }

    #[test]
    fn advance_requires_scored_hole() {
        let mut m = machine();
        assert!(matches!(
            m.advance_hole(),
            Err(WgpError::InvalidStateTransition { .. })
        ));
    }
}
