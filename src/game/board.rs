//! Board value type and win/draw evaluation

use serde::{Deserialize, Serialize};

/// Side length of the board
pub const BOARD_SIZE: usize = 3;

/// Marker a player is assigned in a game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Symbol {
    /// Moves first
    X,
    O,
}

impl Symbol {
    /// The symbol that moves after this one
    pub fn opponent(self) -> Self {
        match self {
            Symbol::X => Symbol::O,
            Symbol::O => Symbol::X,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Symbol::X => "X",
            Symbol::O => "O",
        }
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single board cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cell {
    #[default]
    Empty,
    Taken(Symbol),
}

impl Cell {
    pub fn symbol(self) -> Option<Symbol> {
        match self {
            Cell::Empty => None,
            Cell::Taken(symbol) => Some(symbol),
        }
    }
}

/// Result of evaluating a board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "symbol", rename_all = "snake_case")]
pub enum Outcome {
    /// Game can continue
    Undecided,
    /// Three in a row for the symbol
    Win(Symbol),
    /// Board full with no line
    Draw,
}

/// Rejected placement
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BoardError {
    #[error("Position ({x}, {y}) is outside the board")]
    OutOfBounds { x: usize, y: usize },

    #[error("Cell ({x}, {y}) is already occupied")]
    CellOccupied { x: usize, y: usize },
}

/// Every winning line as (x, y) coordinates
const LINES: [[(usize, usize); 3]; 8] = [
    // Rows
    [(0, 0), (1, 0), (2, 0)],
    [(0, 1), (1, 1), (2, 1)],
    [(0, 2), (1, 2), (2, 2)],
    // Columns
    [(0, 0), (0, 1), (0, 2)],
    [(1, 0), (1, 1), (1, 2)],
    [(2, 0), (2, 1), (2, 2)],
    // Diagonals
    [(0, 0), (1, 1), (2, 2)],
    [(2, 0), (1, 1), (0, 2)],
];

/// 3x3 grid. `x` selects the column, `y` the row.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Board {
    cells: [[Cell; BOARD_SIZE]; BOARD_SIZE],
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cell at (x, y), or None when out of bounds
    pub fn cell(&self, x: usize, y: usize) -> Option<Cell> {
        if x < BOARD_SIZE && y < BOARD_SIZE {
            Some(self.cells[y][x])
        } else {
            None
        }
    }

    /// Write a symbol into an empty cell
    pub fn place(&mut self, symbol: Symbol, x: usize, y: usize) -> Result<(), BoardError> {
        match self.cell(x, y) {
            None => Err(BoardError::OutOfBounds { x, y }),
            Some(Cell::Taken(_)) => Err(BoardError::CellOccupied { x, y }),
            Some(Cell::Empty) => {
                self.cells[y][x] = Cell::Taken(symbol);
                Ok(())
            }
        }
    }

    pub fn is_full(&self) -> bool {
        self.cells.iter().flatten().all(|c| *c != Cell::Empty)
    }

    /// Check all lines for a winner, then the draw condition
    pub fn evaluate(&self) -> Outcome {
        for line in &LINES {
            let [a, b, c] = line.map(|(x, y)| self.cells[y][x]);
            if let Cell::Taken(symbol) = a {
                if a == b && b == c {
                    return Outcome::Win(symbol);
                }
            }
        }

        if self.is_full() {
            Outcome::Draw
        } else {
            Outcome::Undecided
        }
    }

    /// Row-major cell contents: "X", "O" or "" for empty
    pub fn snapshot(&self) -> Vec<String> {
        self.cells
            .iter()
            .flatten()
            .map(|c| c.symbol().map(|s| s.as_str()).unwrap_or("").to_string())
            .collect()
    }
}
