//! Phase state machine. Sole owner of the board, the turn state and the
//! god-card selection; every transition is driven by an engine snapshot.

use std::collections::BTreeSet;

use shared::{
    domain::{Coordinate, GodCard, Phase, PlayerId, WorkerId},
    error::UnknownPhase,
    protocol::SnapshotPayload,
};
use tracing::{info, warn};

use crate::{
    board::Board,
    engine::Operation,
    error::{ClientError, RESTART_NOTICE},
};

pub const WELCOME_NOTICE: &str = "Welcome to Santorini! Click 'Start New Game' to begin.";
pub const PLAYER_A: &str = "A";
pub const PLAYER_B: &str = "B";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnState {
    pub current_player: Option<PlayerId>,
    pub current_worker: Option<WorkerId>,
    /// `None` until a game has been started.
    pub phase: Option<Phase>,
    pub possible_moves: BTreeSet<Coordinate>,
    pub possible_builds: BTreeSet<Coordinate>,
    pub worker_available: bool,
}

impl Default for TurnState {
    fn default() -> Self {
        Self {
            current_player: None,
            current_worker: None,
            phase: None,
            possible_moves: BTreeSet::new(),
            possible_builds: BTreeSet::new(),
            worker_available: true,
        }
    }
}

impl TurnState {
    pub fn is_phase(&self, phase: Phase) -> bool {
        self.phase == Some(phase)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GodCardSelection {
    pub a: GodCard,
    pub b: GodCard,
}

impl GodCardSelection {
    pub fn get(&self, player: &PlayerId) -> Option<GodCard> {
        match player.as_str() {
            PLAYER_A => Some(self.a),
            PLAYER_B => Some(self.b),
            _ => None,
        }
    }

    fn slot_mut(&mut self, player: &PlayerId) -> Option<&mut GodCard> {
        match player.as_str() {
            PLAYER_A => Some(&mut self.a),
            PLAYER_B => Some(&mut self.b),
            _ => None,
        }
    }
}

/// Engine response with the phase already resolved to the closed enum.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineSnapshot {
    pub board: Option<serde_json::Value>,
    pub current_player: Option<PlayerId>,
    pub current_worker: Option<WorkerId>,
    pub phase: Option<Phase>,
    pub possible_moves: Option<Vec<Coordinate>>,
    pub possible_builds: Option<Vec<Coordinate>>,
    pub winner: Option<PlayerId>,
}

impl TryFrom<SnapshotPayload> for EngineSnapshot {
    type Error = UnknownPhase;

    fn try_from(payload: SnapshotPayload) -> Result<Self, Self::Error> {
        let winner = payload.winner_id();
        let phase = payload
            .game_phase
            .as_deref()
            .map(str::parse::<Phase>)
            .transpose()?;
        Ok(Self {
            board: payload.board,
            current_player: payload.current_player,
            current_worker: payload.current_worker,
            phase,
            possible_moves: payload.possible_moves,
            possible_builds: payload.possible_builds,
            winner,
        })
    }
}

/// Owned copy of everything a front end needs to draw the game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameView {
    pub board: Board,
    pub turn: TurnState,
    pub god_cards: GodCardSelection,
    pub notice: String,
}

#[derive(Debug, Clone)]
pub struct TurnMachine {
    board: Board,
    turn: TurnState,
    god_cards: GodCardSelection,
    notice: String,
}

impl Default for TurnMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl TurnMachine {
    pub fn new() -> Self {
        Self {
            board: Board::empty(),
            turn: TurnState::default(),
            god_cards: GodCardSelection::default(),
            notice: WELCOME_NOTICE.to_string(),
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn turn(&self) -> &TurnState {
        &self.turn
    }

    pub fn god_cards(&self) -> GodCardSelection {
        self.god_cards
    }

    pub fn notice(&self) -> &str {
        &self.notice
    }

    pub fn view(&self) -> GameView {
        GameView {
            board: self.board.clone(),
            turn: self.turn.clone(),
            god_cards: self.god_cards,
            notice: self.notice.clone(),
        }
    }

    /// Where the selected worker currently stands.
    pub fn current_worker_position(&self) -> Option<Coordinate> {
        self.turn
            .current_worker
            .as_ref()
            .and_then(|worker| self.board.position_of(worker))
    }

    /// Drops every trace of the previous session.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Records an advisory without touching board or turn state.
    pub fn advise(&mut self, notice: impl Into<String>) {
        self.notice = notice.into();
    }

    pub fn record_failure(&mut self, error: &ClientError) {
        self.notice = error.to_string();
    }

    /// Installs the engine's fresh-game snapshot; the phase is always
    /// `INITIALIZE` whatever the payload says.
    pub fn begin_new_game(&mut self, snapshot: &EngineSnapshot) -> Result<(), ClientError> {
        self.reset();
        let applied = self.apply_engine_snapshot(snapshot, Operation::NewGame);
        self.set_phase(Some(Phase::Initialize));
        self.turn.possible_moves.clear();
        self.turn.possible_builds.clear();
        self.turn.worker_available = true;
        applied?;
        self.notice = "Please select god cards for both players.".to_string();
        Ok(())
    }

    pub fn ensure_god_card_phase(&self) -> Result<(), ClientError> {
        if self.turn.is_phase(Phase::Initialize) {
            Ok(())
        } else {
            Err(ClientError::IllegalSelection(
                "God card selection is not allowed right now.".to_string(),
            ))
        }
    }

    pub fn choose_god_card(&mut self, player: &PlayerId, card: GodCard) -> Result<(), ClientError> {
        self.ensure_god_card_phase()?;
        let slot = self.god_cards.slot_mut(player).ok_or_else(|| {
            ClientError::IllegalSelection(format!("Unknown player '{player}'."))
        })?;
        *slot = card;
        Ok(())
    }

    pub fn complete_god_cards(&mut self, snapshot: &EngineSnapshot) -> Result<(), ClientError> {
        self.apply_engine_snapshot(snapshot, Operation::SelectGodCard)?;
        if self.turn.phase.is_none() || self.turn.is_phase(Phase::Initialize) {
            self.set_phase(Some(Phase::PlaceWorker));
        }
        if self.turn.is_phase(Phase::End) {
            return Ok(());
        }
        self.notice = "God cards selected. Please place your workers.".to_string();
        Ok(())
    }

    /// Replaces board and turn state with exactly what `snapshot` carries.
    ///
    /// A missing or malformed board degrades to an empty board and a
    /// protocol error; the turn state is then left as it was.
    pub fn apply_engine_snapshot(
        &mut self,
        snapshot: &EngineSnapshot,
        operation: Operation,
    ) -> Result<(), ClientError> {
        let parsed = Board::parse(snapshot.board.as_ref());
        self.board = parsed.board;
        if let Some(issue) = parsed.issue {
            warn!(%operation, %issue, "snapshot without usable board");
            let error = ClientError::Protocol {
                operation,
                message: RESTART_NOTICE.to_string(),
            };
            self.record_failure(&error);
            return Err(error);
        }

        self.turn.current_player = snapshot.current_player.clone();
        self.turn.current_worker = snapshot.current_worker.clone();
        self.turn.possible_moves.clear();
        self.turn.possible_builds.clear();
        self.turn.worker_available = true;

        if let Some(winner) = &snapshot.winner {
            self.set_phase(Some(Phase::End));
            self.notice = format!(
                "Game over. Winner is Player {winner}. Click 'Start New Game' to play again."
            );
            return Ok(());
        }

        self.set_phase(snapshot.phase);
        self.notice = self.phase_notice();

        if snapshot.phase.is_some_and(|phase| phase.carries_targets()) {
            self.turn.possible_moves = collect_targets(snapshot.possible_moves.as_deref());
            self.turn.possible_builds = collect_targets(snapshot.possible_builds.as_deref());
            if snapshot
                .possible_moves
                .as_ref()
                .is_some_and(|moves| moves.is_empty())
            {
                self.turn.worker_available = false;
                if self.turn.current_worker.is_some() {
                    self.notice = "This worker is not available, click undo and select another one."
                        .to_string();
                }
            }
        }
        Ok(())
    }

    /// Local pre-filter before asking the engine about a worker. Yields the
    /// player the worker would be selected for.
    pub fn check_worker_selectable(&self, worker: &WorkerId) -> Result<PlayerId, ClientError> {
        if !self.turn.is_phase(Phase::Move) || self.turn.current_worker.is_some() {
            return Err(ClientError::IllegalSelection(
                "A worker can only be selected at the start of a move.".to_string(),
            ));
        }
        let Some(player) = self.turn.current_player.as_ref() else {
            return Err(ClientError::IllegalSelection(
                "No player is on turn yet.".to_string(),
            ));
        };
        let owned = self
            .board
            .position_of(worker)
            .and_then(|at| self.board.cell(at))
            .and_then(|cell| cell.worker_owned_by(player))
            .is_some();
        if owned {
            Ok(player.clone())
        } else {
            Err(invalid_selection(player))
        }
    }

    /// Folds the engine's answer to a worker selection into the machine.
    /// A worker without moves is still shown as selected but flagged
    /// unavailable.
    pub fn confirm_worker_selection(
        &mut self,
        worker: &WorkerId,
        snapshot: &EngineSnapshot,
    ) -> Result<(), ClientError> {
        let parsed = Board::parse(snapshot.board.as_ref());
        self.board = parsed.board;
        if let Some(issue) = parsed.issue {
            warn!(%worker, %issue, "worker selection without usable board");
            let error = ClientError::Protocol {
                operation: Operation::SelectWorker,
                message: RESTART_NOTICE.to_string(),
            };
            self.record_failure(&error);
            return Err(error);
        }

        self.turn.current_worker = Some(worker.clone());
        self.turn.possible_moves = collect_targets(snapshot.possible_moves.as_deref());
        self.turn.possible_builds = collect_targets(snapshot.possible_builds.as_deref());
        let stuck = snapshot
            .possible_moves
            .as_ref()
            .is_some_and(|moves| moves.is_empty());
        self.turn.worker_available = !stuck;
        self.notice = if stuck {
            format!("Worker {worker} cannot move. Please select another worker.")
        } else {
            format!("Worker {worker} selected. Now move.")
        };
        Ok(())
    }

    pub fn deselect_worker(&mut self) -> Result<(), ClientError> {
        if !self.turn.is_phase(Phase::Move) || self.turn.current_worker.is_none() {
            return Err(ClientError::IllegalSelection(
                "There is no selected worker to undo.".to_string(),
            ));
        }
        self.turn.current_worker = None;
        self.turn.possible_moves.clear();
        self.turn.possible_builds.clear();
        self.turn.worker_available = true;
        let player = self
            .turn
            .current_player
            .as_ref()
            .map(PlayerId::to_string)
            .unwrap_or_default();
        self.notice = format!("Worker deselected. Player {player}, please select a worker.");
        Ok(())
    }

    fn phase_notice(&self) -> String {
        let phase = self.turn.phase.map(|phase| phase.as_str()).unwrap_or("none");
        let player = self
            .turn
            .current_player
            .as_ref()
            .map(PlayerId::to_string)
            .unwrap_or_default();
        format!("Current Phase: {phase}. Player {player}'s turn.")
    }

    fn set_phase(&mut self, phase: Option<Phase>) {
        if self.turn.phase != phase {
            info!(
                from = ?self.turn.phase,
                to = ?phase,
                player = ?self.turn.current_player,
                "phase transition"
            );
        }
        self.turn.phase = phase;
    }
}

pub(crate) fn invalid_selection(player: &PlayerId) -> ClientError {
    ClientError::IllegalSelection(format!(
        "Invalid selection. Please select one of your workers. Current Player: {player}."
    ))
}

fn collect_targets(targets: Option<&[Coordinate]>) -> BTreeSet<Coordinate> {
    targets
        .unwrap_or_default()
        .iter()
        .copied()
        .filter(Coordinate::in_bounds)
        .collect()
}

#[cfg(test)]
#[path = "tests/turn_tests.rs"]
mod tests;
