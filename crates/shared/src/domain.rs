use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::{UnknownGodCard, UnknownPhase};

/// Width and height of the square board.
pub const BOARD_SIZE: usize = 5;

/// Highest tower level a cell can reach before only a dome fits.
pub const MAX_LEVEL: u8 = 3;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

id_newtype!(PlayerId);
id_newtype!(WorkerId);

impl WorkerId {
    /// Worker ids encode their owner as a prefix (`A1` belongs to `A`).
    pub fn is_owned_by(&self, player: &PlayerId) -> bool {
        !player.0.is_empty() && self.0.starts_with(player.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coordinate {
    pub x: usize,
    pub y: usize,
}

impl Coordinate {
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }

    pub fn in_bounds(&self) -> bool {
        self.x < BOARD_SIZE && self.y < BOARD_SIZE
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Named stage of a turn, as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Initialize,
    PlaceWorker,
    Move,
    SecondMove,
    Build,
    SecondBuild,
    #[serde(alias = "GAME_OVER")]
    End,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Initialize => "INITIALIZE",
            Phase::PlaceWorker => "PLACE_WORKER",
            Phase::Move => "MOVE",
            Phase::SecondMove => "SECOND_MOVE",
            Phase::Build => "BUILD",
            Phase::SecondBuild => "SECOND_BUILD",
            Phase::End => "END",
        }
    }

    /// Phases in which the engine reports move and build targets.
    pub fn carries_targets(&self) -> bool {
        matches!(self, Phase::Move | Phase::Build | Phase::SecondBuild)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = UnknownPhase;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "INITIALIZE" => Ok(Phase::Initialize),
            "PLACE_WORKER" => Ok(Phase::PlaceWorker),
            "MOVE" => Ok(Phase::Move),
            "SECOND_MOVE" => Ok(Phase::SecondMove),
            "BUILD" => Ok(Phase::Build),
            "SECOND_BUILD" => Ok(Phase::SecondBuild),
            "END" | "GAME_OVER" => Ok(Phase::End),
            other => Err(UnknownPhase(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GodCard {
    #[default]
    #[serde(rename = "None")]
    Unassigned,
    Demeter,
    Hephaestus,
    Minotaur,
    Pan,
    Apollo,
}

impl GodCard {
    pub const ALL: [GodCard; 6] = [
        GodCard::Unassigned,
        GodCard::Demeter,
        GodCard::Hephaestus,
        GodCard::Minotaur,
        GodCard::Pan,
        GodCard::Apollo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GodCard::Unassigned => "None",
            GodCard::Demeter => "Demeter",
            GodCard::Hephaestus => "Hephaestus",
            GodCard::Minotaur => "Minotaur",
            GodCard::Pan => "Pan",
            GodCard::Apollo => "Apollo",
        }
    }
}

impl fmt::Display for GodCard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GodCard {
    type Err = UnknownGodCard;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        GodCard::ALL
            .into_iter()
            .find(|card| card.as_str().eq_ignore_ascii_case(raw.trim()))
            .ok_or_else(|| UnknownGodCard(raw.to_string()))
    }
}

/// One board square. `worker_id` is set iff `occupied`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub occupied: bool,
    pub owner_id: Option<PlayerId>,
    pub worker_id: Option<WorkerId>,
    pub level: u8,
    pub dome: bool,
}

impl Cell {
    /// A capped tower accepts no further building.
    pub fn is_complete(&self) -> bool {
        self.dome
    }

    pub fn worker_owned_by(&self, player: &PlayerId) -> Option<&WorkerId> {
        let worker = self.worker_id.as_ref().filter(|_| self.occupied)?;
        let owned = match &self.owner_id {
            Some(owner) => owner == player,
            None => worker.is_owned_by(player),
        };
        owned.then_some(worker)
    }
}
