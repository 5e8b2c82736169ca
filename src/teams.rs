use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::PlayerId;

/// Which side of a formed hole a player is on. In a solo hole `Team1` is the
/// captain alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Team1,
    Team2,
}

impl Side {
    pub fn opponent(self) -> Side {
        match self {
            Side::Team1 => Side::Team2,
            Side::Team2 => Side::Team1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Team1 => "team1",
            Side::Team2 => "team2",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TeamConfiguration {
    Pending,
    Solo {
        captain: PlayerId,
        opponents: [PlayerId; 3],
    },
    Partners {
        /// Always holds the captain first.
        team1: [PlayerId; 2],
        team2: [PlayerId; 2],
    },
}

impl TeamConfiguration {
    pub fn is_formed(&self) -> bool {
        !matches!(self, TeamConfiguration::Pending)
    }

    pub fn members(&self, side: Side) -> Vec<PlayerId> {
        match (self, side) {
            (TeamConfiguration::Pending, _) => Vec::new(),
            (TeamConfiguration::Solo { captain, .. }, Side::Team1) => vec![*captain],
            (TeamConfiguration::Solo { opponents, .. }, Side::Team2) => opponents.to_vec(),
            (TeamConfiguration::Partners { team1, .. }, Side::Team1) => team1.to_vec(),
            (TeamConfiguration::Partners { team2, .. }, Side::Team2) => team2.to_vec(),
        }
    }

    pub fn side_of(&self, player: PlayerId) -> Option<Side> {
        [Side::Team1, Side::Team2]
            .into_iter()
            .find(|&side| self.members(side).contains(&player))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TeamConfiguration::Pending => "pending",
            TeamConfiguration::Solo { .. } => "solo",
            TeamConfiguration::Partners { .. } => "partners",
        }
    }
}

impl fmt::Display for TeamConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TeamConfiguration::Pending => write!(f, "teams pending"),
            TeamConfiguration::Solo { captain, .. } => write!(f, "{} solo vs the field", captain),
            TeamConfiguration::Partners { team1, team2 } => write!(
                f,
                "{} & {} vs {} & {}",
                team1[0], team1[1], team2[0], team2[1]
            ),
        }
    }
}
