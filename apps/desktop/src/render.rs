//! Plain-text board dump for the terminal.

use std::fmt;

use client_core::GameView;
use shared::domain::{Cell, Coordinate, Phase, BOARD_SIZE};

const CELL_WIDTH: usize = 16;

pub fn render_view(view: &GameView) -> String {
    BoardDump(view).to_string()
}

struct BoardDump<'a>(&'a GameView);

impl fmt::Display for BoardDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let view = self.0;
        let turn = &view.turn;
        writeln!(f, "{}", view.notice)?;

        if turn.is_phase(Phase::Initialize) {
            return writeln!(
                f,
                "god cards -> A: {}  B: {}  (use 'god', then 'confirm')",
                view.god_cards.a, view.god_cards.b
            );
        }

        let phase = turn.phase.map(|phase| phase.as_str()).unwrap_or("-");
        let player = turn
            .current_player
            .as_ref()
            .map(|player| player.to_string())
            .unwrap_or_else(|| "-".into());
        writeln!(
            f,
            "phase: {phase}  player: {player}  god cards A: {}  B: {}",
            view.god_cards.a, view.god_cards.b
        )?;

        write!(f, "   ")?;
        for x in 0..BOARD_SIZE {
            write!(f, "{:^width$}", x, width = CELL_WIDTH)?;
        }
        writeln!(f)?;
        for (y, row) in view.board.rows().enumerate() {
            write!(f, "{y:>2} ")?;
            for (x, cell) in row.iter().enumerate() {
                let text = cell_text(view, Coordinate::new(x, y), cell.as_ref());
                write!(f, "{:^width$}", text, width = CELL_WIDTH)?;
            }
            writeln!(f)?;
        }

        if turn.is_phase(Phase::SecondBuild) {
            writeln!(f, "* you can click the selected worker's cell to skip the second build *")?;
        }
        if turn.is_phase(Phase::Move) && turn.current_worker.is_some() {
            writeln!(f, "type 'undo' to pick a different worker")?;
        }
        Ok(())
    }
}

fn cell_text(view: &GameView, at: Coordinate, cell: Option<&Cell>) -> String {
    let Some(cell) = cell else {
        return ".".to_string();
    };
    let turn = &view.turn;
    let level = usize::from(cell.level);

    let mut content = match cell.worker_id.as_ref().filter(|_| cell.occupied) {
        _ if cell.dome => "[ [ [ o ] ] ]".to_string(),
        Some(worker) => format!("{}{worker}{}", "[ ".repeat(level), " ]".repeat(level)),
        None if level > 0 => format!("{}{}", "[ ".repeat(level), " ]".repeat(level)),
        None => "_".to_string(),
    };

    let selected = cell.occupied && cell.worker_id.is_some() && cell.worker_id == turn.current_worker;
    let choosable = turn.is_phase(Phase::Move)
        && turn.current_worker.is_none()
        && turn
            .current_player
            .as_ref()
            .is_some_and(|player| cell.worker_owned_by(player).is_some());
    let marker = if selected {
        Some('*')
    } else if turn.current_worker.is_some()
        && turn.is_phase(Phase::Move)
        && turn.possible_moves.contains(&at)
    {
        Some('m')
    } else if turn.current_worker.is_some()
        && (turn.is_phase(Phase::Build) || turn.is_phase(Phase::SecondBuild))
        && turn.possible_builds.contains(&at)
    {
        Some('b')
    } else if choosable {
        Some('?')
    } else {
        None
    };
    if let Some(marker) = marker {
        content = format!("{marker}{content}");
    }
    content
}
