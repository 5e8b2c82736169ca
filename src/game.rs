//! Game sessions and the registry that routes actions to them.
//!
//! `GameRegistry::apply_action` is the single mutation entry point. Each
//! session owns its state machine exclusively; sessions share only the
//! read-mostly odds calculator. Settled holes and finished games are handed
//! to an optional `ResultSink` so persistence stays outside the core.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::betting::{BettingStateMachine, DoubleOffer, GameSummary, HoleResult, Phase, Standing};
use crate::config::EngineConfig;
use crate::error::{WgpError, WgpResult};
use crate::model::{Course, Hole, Player, PlayerId};
use crate::odds::{OddsCalculator, OddsContext, OddsResult};
use crate::teams::{Side, TeamConfiguration};

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action_type", content = "payload", rename_all = "snake_case")]
pub enum GameAction {
    RequestPartner { captain: PlayerId, partner: PlayerId },
    AcceptPartner { partner: PlayerId },
    DeclinePartner { partner: PlayerId },
    GoSolo { captain: PlayerId },
    OfferDouble { offering: Side, target: Side },
    AcceptDouble,
    DeclineDouble,
    InvokeFloat { captain: PlayerId },
    RecordNetScore { player: PlayerId, gross: u32 },
    SettleHole,
    AdvanceHole,
}

pub const ACTION_TYPES: [&str; 11] = [
    "request_partner",
    "accept_partner",
    "decline_partner",
    "go_solo",
    "offer_double",
    "accept_double",
    "decline_double",
    "invoke_float",
    "record_net_score",
    "settle_hole",
    "advance_hole",
];

const UNIT_ACTIONS: [&str; 4] = ["accept_double", "decline_double", "settle_hole", "advance_hole"];

impl GameAction {
    /// Parses an action from its type name and a JSON payload. Actions without
    /// arguments ignore the payload.
    pub fn from_parts(action_type: &str, payload: Value) -> WgpResult<GameAction> {
        if !ACTION_TYPES.contains(&action_type) {
            return Err(WgpError::Validation(format!(
                "unknown action type '{}'",
                action_type
            )));
        }
        let tagged = if UNIT_ACTIONS.contains(&action_type) {
            json!({ "action_type": action_type })
        } else {
            json!({ "action_type": action_type, "payload": payload })
        };
        serde_json::from_value(tagged).map_err(|e| {
            WgpError::Validation(format!("bad payload for {}: {}", action_type, e))
        })
    }

    pub fn action_type(&self) -> &'static str {
        match self {
            GameAction::RequestPartner { .. } => "request_partner",
            GameAction::AcceptPartner { .. } => "accept_partner",
            GameAction::DeclinePartner { .. } => "decline_partner",
            GameAction::GoSolo { .. } => "go_solo",
            GameAction::OfferDouble { .. } => "offer_double",
            GameAction::AcceptDouble => "accept_double",
            GameAction::DeclineDouble => "decline_double",
            GameAction::InvokeFloat { .. } => "invoke_float",
            GameAction::RecordNetScore { .. } => "record_net_score",
            GameAction::SettleHole => "settle_hole",
            GameAction::AdvanceHole => "advance_hole",
        }
    }
}

// ---------------------------------------------------------------------------
// State view
// ---------------------------------------------------------------------------

/// Serializable snapshot handed back after every action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameStateView {
    pub game_id: String,
    pub phase: Phase,
    pub hole: Hole,
    pub captain: PlayerId,
    pub teams: TeamConfiguration,
    pub wager: u32,
    pub doubled: bool,
    pub floated: bool,
    pub carry_over: u32,
    pub pending_request: Option<PlayerId>,
    pub pending_double: Option<DoubleOffer>,
    pub net_scores: BTreeMap<PlayerId, i32>,
    pub standings: Vec<Standing>,
    pub holes_remaining: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub state: GameStateView,
    /// Present when the action settled a hole.
    pub point_delta: Option<HoleResult>,
}

// ---------------------------------------------------------------------------
// Persistence callback
// ---------------------------------------------------------------------------

pub trait ResultSink: Send {
    fn record_hole(&mut self, game_id: &str, result: &HoleResult);
    fn record_game(&mut self, game_id: &str, summary: &GameSummary);
}

#[derive(Debug, Default)]
struct MemoryRecords {
    holes: Vec<(String, HoleResult)>,
    games: Vec<(String, GameSummary)>,
}

/// Keeps everything in memory. Clones share the same records, so a caller can
/// keep one handle and give another to a session.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<MemoryRecords>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn holes(&self) -> Vec<(String, HoleResult)> {
        self.records.lock().holes.clone()
    }

    pub fn games(&self) -> Vec<(String, GameSummary)> {
        self.records.lock().games.clone()
    }
}

impl ResultSink for MemorySink {
    fn record_hole(&mut self, game_id: &str, result: &HoleResult) {
        self.records.lock().holes.push((game_id.to_string(), result.clone()));
    }

    fn record_game(&mut self, game_id: &str, summary: &GameSummary) {
        self.records.lock().games.push((game_id.to_string(), summary.clone()));
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

pub struct GameSession {
    id: String,
    machine: BettingStateMachine,
    odds: Arc<OddsCalculator>,
    sink: Option<Box<dyn ResultSink>>,
}

impl GameSession {
    pub fn new(
        id: &str,
        players: Vec<Player>,
        course: Course,
        base_wager: u32,
        odds: Arc<OddsCalculator>,
    ) -> WgpResult<Self> {
        Ok(GameSession {
            id: id.to_string(),
            machine: BettingStateMachine::new(players, course, base_wager)?,
            odds,
            sink: None,
        })
    }

    pub fn with_sink(mut self, sink: Box<dyn ResultSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn machine(&self) -> &BettingStateMachine {
        &self.machine
    }

    pub fn state(&self) -> GameStateView {
        let m = &self.machine;
        GameStateView {
            game_id: self.id.clone(),
            phase: m.phase(),
            hole: *m.hole(),
            captain: m.captain(),
            teams: m.teams().clone(),
            wager: m.wager().current(),
            doubled: m.wager().is_doubled(),
            floated: m.wager().is_floated(),
            carry_over: m.carry_over(),
            pending_request: m.pending_request(),
            pending_double: m.pending_double(),
            net_scores: m.net_scores().clone(),
            standings: m.standings(),
            holes_remaining: m.holes_remaining(),
        }
    }

    pub fn apply(&mut self, action: GameAction) -> WgpResult<ActionOutcome> {
        log::debug!("{}: {:?}", self.id, action);
        let m = &mut self.machine;
        let settled = match action {
            GameAction::RequestPartner { captain, partner } => m.request_partner(captain, partner).map(|_| None),
            GameAction::AcceptPartner { partner } => m.accept_partner(partner).map(|_| None),
            GameAction::DeclinePartner { partner } => m.decline_partner(partner).map(|_| None),
            GameAction::GoSolo { captain } => m.go_solo(captain).map(|_| None),
            GameAction::OfferDouble { offering, target } => m.offer_double(offering, target).map(|_| None),
            GameAction::AcceptDouble => m.accept_double().map(|_| None),
            GameAction::DeclineDouble => m.decline_double().map(Some),
            GameAction::InvokeFloat { captain } => m.invoke_float(captain).map(|_| None),
            GameAction::RecordNetScore { player, gross } => m.record_net_score(player, gross).map(|_| None),
            GameAction::SettleHole => m.settle_hole().map(Some),
            GameAction::AdvanceHole => m.advance_hole().map(|_| None),
        };
        let settled = settled.map_err(|e| {
            log::debug!("{}: rejected: {}", self.id, e);
            e
        })?;

        if let Some(sink) = self.sink.as_mut() {
            if let Some(result) = &settled {
                sink.record_hole(&self.id, result);
            }
            if matches!(action, GameAction::AdvanceHole) && self.machine.is_complete() {
                sink.record_game(&self.id, &self.machine.summary());
            }
        }

        Ok(ActionOutcome {
            state: self.state(),
            point_delta: settled,
        })
    }

    /// Odds for the current hole from the captain's point of view.
    pub fn odds(&self) -> OddsResult {
        self.odds_for(self.machine.captain())
    }

    pub fn odds_for(&self, player: PlayerId) -> OddsResult {
        let context = OddsContext::from_machine(&self.machine).with_perspective(player);
        self.odds
            .calculate_real_time_odds(self.machine.players(), self.machine.hole(), &context)
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

pub struct GameRegistry {
    config: EngineConfig,
    odds: Arc<OddsCalculator>,
    games: HashMap<String, GameSession>,
    next_id: u64,
}

impl Default for GameRegistry {
    fn default() -> Self {
        GameRegistry::new(EngineConfig::default())
    }
}

impl GameRegistry {
    pub fn new(config: EngineConfig) -> Self {
        let odds = OddsCalculator::new(config.odds.clone(), config.probability.clone());
        GameRegistry {
            config,
            odds: Arc::new(odds),
            games: HashMap::new(),
            next_id: 1,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn create_game(&mut self, players: Vec<Player>, course: Course) -> WgpResult<String> {
        self.insert_game(players, course, None)
    }

    pub fn create_game_with_sink(
        &mut self,
        players: Vec<Player>,
        course: Course,
        sink: Box<dyn ResultSink>,
    ) -> WgpResult<String> {
        self.insert_game(players, course, Some(sink))
    }

    fn insert_game(
        &mut self,
        players: Vec<Player>,
        course: Course,
        sink: Option<Box<dyn ResultSink>>,
    ) -> WgpResult<String> {
        let id = format!("game-{}", self.next_id);
        let mut session = GameSession::new(
            &id,
            players,
            course,
            self.config.game.base_wager,
            Arc::clone(&self.odds),
        )?;
        if let Some(sink) = sink {
            session = session.with_sink(sink);
        }
        self.next_id += 1;
        log::info!("created {} on {}", id, session.machine().course().name);
        self.games.insert(id.clone(), session);
        Ok(id)
    }

    pub fn session(&self, game_id: &str) -> WgpResult<&GameSession> {
        self.games
            .get(game_id)
            .ok_or_else(|| WgpError::UnknownGame(game_id.to_string()))
    }

    pub fn remove_game(&mut self, game_id: &str) -> WgpResult<GameSession> {
        self.games
            .remove(game_id)
            .ok_or_else(|| WgpError::UnknownGame(game_id.to_string()))
    }

    pub fn game_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.games.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn apply_action(&mut self, game_id: &str, action: GameAction) -> WgpResult<ActionOutcome> {
        self.games
            .get_mut(game_id)
            .ok_or_else(|| WgpError::UnknownGame(game_id.to_string()))?
            .apply(action)
    }

    pub fn apply_raw(
        &mut self,
        game_id: &str,
        action_type: &str,
        payload: Value,
    ) -> WgpResult<ActionOutcome> {
        let action = GameAction::from_parts(action_type, payload)?;
        self.apply_action(game_id, action)
    }

    /// Read-only; never changes game state.
    pub fn get_odds(&self, game_id: &str) -> WgpResult<OddsResult> {
        Ok(self.session(game_id)?.odds())
    }

    pub fn get_odds_for(&self, game_id: &str, player: PlayerId) -> WgpResult<OddsResult> {
        Ok(self.session(game_id)?.odds_for(player))
    }
}
