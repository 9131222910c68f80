//! Board model: an immutable 5x5 grid rebuilt from every engine snapshot.

use std::{array, fmt};

use serde_json::Value;
use shared::{
    domain::{Cell, Coordinate, WorkerId, BOARD_SIZE, MAX_LEVEL},
    protocol::CellPayload,
};

type Grid = [[Option<Cell>; BOARD_SIZE]; BOARD_SIZE];

/// Row-major grid (`cells[y][x]`). `None` marks a cell the engine sent as null
/// or a board that has not been loaded yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    cells: Grid,
}

/// Why a snapshot's board could not be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissingBoardData {
    Absent,
    Malformed(String),
}

impl fmt::Display for MissingBoardData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingBoardData::Absent => f.write_str("board data is missing"),
            MissingBoardData::Malformed(detail) => write!(f, "board data is malformed: {detail}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedBoard {
    pub board: Board,
    pub issue: Option<MissingBoardData>,
}

impl Default for Board {
    fn default() -> Self {
        Self::empty()
    }
}

impl Board {
    pub fn empty() -> Self {
        Self {
            cells: array::from_fn(|_| array::from_fn(|_| None)),
        }
    }

    /// Never fails: absent or malformed input yields an empty board and an issue.
    pub fn parse(raw: Option<&Value>) -> ParsedBoard {
        let issue = match raw {
            None | Some(Value::Null) => MissingBoardData::Absent,
            Some(value) => match parse_grid(value) {
                Ok(cells) => {
                    return ParsedBoard {
                        board: Self { cells },
                        issue: None,
                    }
                }
                Err(detail) => MissingBoardData::Malformed(detail),
            },
        };
        ParsedBoard {
            board: Self::empty(),
            issue: Some(issue),
        }
    }

    pub fn cell(&self, at: Coordinate) -> Option<&Cell> {
        if !at.in_bounds() {
            return None;
        }
        self.cells[at.y][at.x].as_ref()
    }

    pub fn worker_at(&self, at: Coordinate) -> Option<&WorkerId> {
        self.cell(at)
            .filter(|cell| cell.occupied)
            .and_then(|cell| cell.worker_id.as_ref())
    }

    /// Scans the grid for the cell holding `worker`.
    pub fn position_of(&self, worker: &WorkerId) -> Option<Coordinate> {
        self.iter()
            .find(|(_, cell)| {
                cell.is_some_and(|cell| cell.occupied && cell.worker_id.as_ref() == Some(worker))
            })
            .map(|(at, _)| at)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Coordinate, Option<&Cell>)> + '_ {
        self.cells.iter().enumerate().flat_map(|(y, row)| {
            row.iter()
                .enumerate()
                .map(move |(x, cell)| (Coordinate::new(x, y), cell.as_ref()))
        })
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Option<Cell>; BOARD_SIZE]> + '_ {
        self.cells.iter()
    }

    pub fn is_blank(&self) -> bool {
        self.iter().all(|(_, cell)| cell.is_none())
    }
}

fn parse_grid(value: &Value) -> Result<Grid, String> {
    let rows = value
        .as_array()
        .ok_or_else(|| "expected an array of rows".to_string())?;
    if rows.len() != BOARD_SIZE {
        return Err(format!("expected {BOARD_SIZE} rows, got {}", rows.len()));
    }

    let mut cells: Grid = array::from_fn(|_| array::from_fn(|_| None));
    for (y, row) in rows.iter().enumerate() {
        let row = row
            .as_array()
            .ok_or_else(|| format!("row {y} is not an array"))?;
        if row.len() != BOARD_SIZE {
            return Err(format!(
                "row {y} has {} cells, expected {BOARD_SIZE}",
                row.len()
            ));
        }
        for (x, raw_cell) in row.iter().enumerate() {
            cells[y][x] = parse_cell(raw_cell).map_err(|detail| format!("cell ({x}, {y}): {detail}"))?;
        }
    }
    Ok(cells)
}

fn parse_cell(raw: &Value) -> Result<Option<Cell>, String> {
    if raw.is_null() {
        return Ok(None);
    }
    let payload: CellPayload =
        serde_json::from_value(raw.clone()).map_err(|error| error.to_string())?;
    if payload.level > MAX_LEVEL {
        return Err(format!("level {} exceeds {MAX_LEVEL}", payload.level));
    }
    if payload.dome && payload.level != MAX_LEVEL {
        return Err(format!("dome on level {}", payload.level));
    }

    let worker_id = payload.worker_id.filter(|_| payload.occupied);
    let owner_id = payload.owner_id.filter(|_| worker_id.is_some());
    Ok(Some(Cell {
        occupied: worker_id.is_some(),
        owner_id,
        worker_id,
        level: payload.level,
        dome: payload.dome,
    }))
}
