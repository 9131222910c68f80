//! Maps a board click to the engine operation it stands for, if any.

use shared::domain::{Coordinate, Phase, WorkerId};

use crate::{board::Board, engine::Operation, turn::invalid_selection, turn::TurnState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    PlaceWorker { worker: WorkerId, at: Coordinate },
    SelectWorker { worker: WorkerId },
    Move { worker: WorkerId, to: Coordinate },
    Build { worker: WorkerId, at: Coordinate },
    SkipSecondBuild { worker: WorkerId },
}

impl Intent {
    pub fn operation(&self) -> Operation {
        match self {
            Intent::PlaceWorker { .. } => Operation::PlaceWorker,
            Intent::SelectWorker { .. } => Operation::SelectWorker,
            Intent::Move { .. } => Operation::Move,
            Intent::Build { .. } => Operation::Build,
            Intent::SkipSecondBuild { .. } => Operation::SkipSecondBuild,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Intent(Intent),
    NoOp { advisory: Option<String> },
}

impl Dispatch {
    fn ignore() -> Self {
        Dispatch::NoOp { advisory: None }
    }
}

/// Pure decision over the current phase, selection and board.
///
/// Movement is not pre-filtered against the possible moves; the engine
/// judges it. Builds are. In `SECOND_BUILD` the selected worker's own cell
/// means "skip", since it can never be a build target.
pub fn handle_click(turn: &TurnState, board: &Board, at: Coordinate) -> Dispatch {
    if !at.in_bounds() {
        return Dispatch::ignore();
    }
    let worker = turn.current_worker.clone();

    match turn.phase {
        Some(Phase::PlaceWorker) => match worker {
            Some(worker) => Dispatch::Intent(Intent::PlaceWorker { worker, at }),
            None => Dispatch::ignore(),
        },
        Some(Phase::Move) => match worker {
            Some(worker) => Dispatch::Intent(Intent::Move { worker, to: at }),
            None => select_own_worker(turn, board, at),
        },
        Some(Phase::SecondMove | Phase::Build) => match worker {
            Some(worker) if turn.possible_builds.contains(&at) => {
                Dispatch::Intent(Intent::Build { worker, at })
            }
            _ => Dispatch::ignore(),
        },
        Some(Phase::SecondBuild) => match worker {
            Some(worker) if board.position_of(&worker) == Some(at) => {
                Dispatch::Intent(Intent::SkipSecondBuild { worker })
            }
            Some(worker) if turn.possible_builds.contains(&at) => {
                Dispatch::Intent(Intent::Build { worker, at })
            }
            _ => Dispatch::ignore(),
        },
        Some(Phase::Initialize | Phase::End) | None => Dispatch::ignore(),
    }
}

fn select_own_worker(turn: &TurnState, board: &Board, at: Coordinate) -> Dispatch {
    let Some(player) = turn.current_player.as_ref() else {
        return Dispatch::ignore();
    };
    match board.cell(at).and_then(|cell| cell.worker_owned_by(player)) {
        Some(worker) => Dispatch::Intent(Intent::SelectWorker {
            worker: worker.clone(),
        }),
        None => Dispatch::NoOp {
            advisory: Some(invalid_selection(player).to_string()),
        },
    }
}
