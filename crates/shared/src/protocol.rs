use serde::{Deserialize, Serialize};

use crate::domain::{Coordinate, GodCard, PlayerId, WorkerId};

/// String the engine writes in `winner` while the game is undecided.
pub const NO_WINNER_SENTINEL: &str = "null";

pub fn new_game_route() -> &'static str {
    "/newgame"
}

pub fn select_god_card_route() -> &'static str {
    "/selectgodcard"
}

pub fn place_worker_route() -> &'static str {
    "/placeworker"
}

pub fn select_worker_route() -> &'static str {
    "/selectworker"
}

pub fn move_route() -> &'static str {
    "/move"
}

pub fn build_route() -> &'static str {
    "/build"
}

pub fn skip_second_build_route() -> &'static str {
    "/skipSecondBuild"
}

/// Engine response body. Every field is optional on the wire; the board is
/// kept raw so a malformed grid degrades instead of failing the whole decode.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SnapshotPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub board: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_player: Option<PlayerId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_worker: Option<WorkerId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_phase: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub possible_moves: Option<Vec<Coordinate>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub possible_builds: Option<Vec<Coordinate>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SnapshotPayload {
    pub fn winner_id(&self) -> Option<PlayerId> {
        self.winner
            .as_deref()
            .filter(|winner| !winner.is_empty() && *winner != NO_WINNER_SENTINEL)
            .map(PlayerId::from)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CellPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<usize>,
    pub level: u8,
    pub dome: bool,
    pub occupied: bool,
    #[serde(rename = "workerID", skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<WorkerId>,
    #[serde(rename = "ownerID", skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<PlayerId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectGodCardRequest {
    pub player_id: PlayerId,
    pub god_card: GodCard,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerTargetQuery {
    pub worker_id: WorkerId,
    pub x: usize,
    pub y: usize,
}

impl WorkerTargetQuery {
    pub fn new(worker_id: WorkerId, at: Coordinate) -> Self {
        Self {
            worker_id,
            x: at.x,
            y: at.y,
        }
    }

    pub fn target(&self) -> Coordinate {
        Coordinate::new(self.x, self.y)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectWorkerQuery {
    pub worker_id: WorkerId,
    pub player_id: PlayerId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkipSecondBuildRequest {
    pub worker_id: WorkerId,
}
