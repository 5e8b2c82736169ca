//! Players, holes and the course they are played on.

use std::collections::HashSet;
use std::fmt;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::{WgpError, WgpResult};

static COURSE_DEFAULT_JSON: &str = include_str!("../data/course_default.json");

pub const PLAYERS_PER_GAME: usize = 4;
pub const HOLES_PER_ROUND: usize = 18;
pub const MAX_HANDICAP: f64 = 36.0;

// ---------------------------------------------------------------------------
// Players
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u32);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub handicap: f64,
    /// Running total in quarters. Only settlement writes this.
    #[serde(default)]
    points: i32,
    #[serde(default)]
    float_used: bool,
}

impl Player {
    pub fn new(id: u32, name: &str, handicap: f64) -> WgpResult<Self> {
        if !handicap.is_finite() || !(0.0..=MAX_HANDICAP).contains(&handicap) {
            return Err(WgpError::Validation(format!(
                "handicap for {} must be within 0-36, got {}",
                name, handicap
            )));
        }
        if name.trim().is_empty() {
            return Err(WgpError::Validation("player name must not be empty".to_string()));
        }
        Ok(Player {
            id: PlayerId(id),
            name: name.to_string(),
            handicap,
            points: 0,
            float_used: false,
        })
    }

    /// Same identity and handicap with game state cleared.
    pub fn fresh_copy(&self) -> Player {
        Player {
            points: 0,
            float_used: false,
            ..self.clone()
        }
    }

    pub fn points(&self) -> i32 {
        self.points
    }

    pub fn float_used(&self) -> bool {
        self.float_used
    }

    /// Whole strokes received on a hole of the given stroke index.
    pub fn strokes_on(&self, hole: &Hole) -> u32 {
        handicap_strokes(self.handicap, hole.stroke_index)
    }

    pub(crate) fn apply_delta(&mut self, delta: i32) {
        self.points += delta;
    }

    pub(crate) fn mark_float_used(&mut self) {
        self.float_used = true;
    }
}

/// Strokes a player receives on a hole: one per full 18 of course handicap,
/// plus one more on the hardest `handicap % 18` holes.
pub fn handicap_strokes(handicap: f64, stroke_index: u8) -> u32 {
    let course = handicap.clamp(0.0, MAX_HANDICAP).round() as u32;
    let base = course / HOLES_PER_ROUND as u32;
    let extra = u32::from(u32::from(stroke_index) <= course % HOLES_PER_ROUND as u32);
    base + extra
}

/// Builds four players from handicaps, named "Player 1".."Player 4".
pub fn players_from_handicaps(handicaps: &[f64]) -> WgpResult<Vec<Player>> {
    if handicaps.len() != PLAYERS_PER_GAME {
        return Err(WgpError::Validation(format!(
            "need exactly {} handicaps, got {}",
            PLAYERS_PER_GAME,
            handicaps.len()
        )));
    }
    handicaps
        .iter()
        .enumerate()
        .map(|(i, &h)| Player::new(i as u32 + 1, &format!("Player {}", i + 1), h))
        .collect()
}

pub fn validate_players(players: &[Player]) -> WgpResult<()> {
    if players.len() != PLAYERS_PER_GAME {
        return Err(WgpError::Validation(format!(
            "a game needs exactly {} players, got {}",
            PLAYERS_PER_GAME,
            players.len()
        )));
    }
    let ids: HashSet<PlayerId> = players.iter().map(|p| p.id).collect();
    if ids.len() != players.len() {
        return Err(WgpError::Validation("player ids must be unique".to_string()));
    }
    for p in players {
        if !p.handicap.is_finite() || !(0.0..=MAX_HANDICAP).contains(&p.handicap) {
            return Err(WgpError::Validation(format!(
                "handicap for {} out of range: {}",
                p.name, p.handicap
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Holes and courses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hole {
    pub number: u8,
    pub par: u8,
    pub stroke_index: u8,
    pub yards: u32,
}

impl Hole {
    pub fn new(number: u8, par: u8, stroke_index: u8, yards: u32) -> WgpResult<Self> {
        let hole = Hole {
            number,
            par,
            stroke_index,
            yards,
        };
        hole.validate()?;
        Ok(hole)
    }

    pub fn validate(&self) -> WgpResult<()> {
        if !(1..=18).contains(&self.number) {
            return Err(WgpError::Validation(format!(
                "hole number must be 1-18, got {}",
                self.number
            )));
        }
        if !(3..=6).contains(&self.par) {
            return Err(WgpError::Validation(format!(
                "par must be 3-6 on hole {}, got {}",
                self.number, self.par
            )));
        }
        if !(1..=18).contains(&self.stroke_index) {
            return Err(WgpError::Validation(format!(
                "stroke index must be 1-18 on hole {}, got {}",
                self.number, self.stroke_index
            )));
        }
        if self.yards == 0 {
            return Err(WgpError::Validation(format!(
                "hole {} has zero length",
                self.number
            )));
        }
        Ok(())
    }
}

impl fmt::Display for Hole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Hole {} (par {}, SI {}, {} yds)",
            self.number, self.par, self.stroke_index, self.yards
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub name: String,
    pub holes: Vec<Hole>,
}

impl Course {
    pub fn new(name: &str, mut holes: Vec<Hole>) -> WgpResult<Self> {
        if holes.len() != HOLES_PER_ROUND {
            return Err(WgpError::Validation(format!(
                "a course needs {} holes, got {}",
                HOLES_PER_ROUND,
                holes.len()
            )));
        }
        let mut numbers = HashSet::new();
        let mut indexes = HashSet::new();
        for hole in &holes {
            hole.validate()?;
            if !numbers.insert(hole.number) {
                return Err(WgpError::Validation(format!(
                    "duplicate hole number {}",
                    hole.number
                )));
            }
            if !indexes.insert(hole.stroke_index) {
                return Err(WgpError::Validation(format!(
                    "duplicate stroke index {}",
                    hole.stroke_index
                )));
            }
        }
        holes.sort_by_key(|h| h.number);
        Ok(Course {
            name: name.to_string(),
            holes,
        })
    }

    pub fn from_json(json: &str) -> WgpResult<Self> {
        let raw: Course = serde_json::from_str(json)?;
        Course::new(&raw.name, raw.holes)
    }

    /// Hole by number (1-18).
    pub fn hole(&self, number: u8) -> WgpResult<&Hole> {
        self.holes
            .iter()
            .find(|h| h.number == number)
            .ok_or_else(|| WgpError::Validation(format!("no hole {} on {}", number, self.name)))
    }

    pub fn total_par(&self) -> u32 {
        self.holes.iter().map(|h| u32::from(h.par)).sum()
    }
}

static DEFAULT_COURSE: Lazy<Course> = Lazy::new(|| {
    Course::from_json(COURSE_DEFAULT_JSON).expect("Failed to parse default course")
});

pub fn default_course() -> &'static Course {
    &DEFAULT_COURSE
}
