//! The playing grid and the rules that only depend on it.
//!
//! Coordinates are `(row, column)` with row 0 at the **top**, so a disc
//! dropped into an empty column lands on row `ROWS - 1`.
//!
//! ```text
//!          col 0 1 2 3 4 5 6
//!   row 0      . . . . . . .
//!   row 1      . . . . . . .
//!   ...
//!   row 5      . . . X O . .   ← discs settle here first
//! ```

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::{MoveError, ParseBoardError};

/// Number of rows on the board.
pub const ROWS: usize = 6;

/// Number of columns on the board.
pub const COLUMNS: usize = 7;

/// The four line axes as `(row step, column step)`: horizontal,
/// vertical, and the two diagonals. Each axis is walked both ways.
pub const DIRECTIONS: [(isize, isize); 4] = [(0, 1), (1, 0), (1, 1), (1, -1)];

/// Length of a winning line.
const CONNECT: usize = 4;

// ---------------------------------------------------------------------------
// Seat
// ---------------------------------------------------------------------------

/// One of the two positions in a game. Seat one always moves first.
///
/// On the wire a seat is its number: `1` or `2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "u8")]
pub enum Seat {
    One,
    Two,
}

impl Seat {
    /// Both seats, in turn order.
    pub const BOTH: [Seat; 2] = [Seat::One, Seat::Two];

    /// The other seat.
    pub fn opponent(self) -> Self {
        match self {
            Self::One => Self::Two,
            Self::Two => Self::One,
        }
    }

    /// `0` for seat one, `1` for seat two. Handy for `[T; 2]` lookups.
    pub fn index(self) -> usize {
        match self {
            Self::One => 0,
            Self::Two => 1,
        }
    }

    /// The wire number of this seat.
    pub fn number(self) -> u8 {
        self.index() as u8 + 1
    }
}

impl From<Seat> for u8 {
    fn from(seat: Seat) -> Self {
        seat.number()
    }
}

impl fmt::Display for Seat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seat{}", self.number())
    }
}

// ---------------------------------------------------------------------------
// Board
// ---------------------------------------------------------------------------

/// A 6×7 grid of cells, each empty or holding one seat's disc.
///
/// `Board` is `Copy`: simulations (the bot's lookahead) work on their own
/// copy and can never disturb the real game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Board {
    cells: [[Option<Seat>; COLUMNS]; ROWS],
}

impl Board {
    /// Creates an empty board.
    pub fn new() -> Self {
        Self::default()
    }

    /// The disc at `(row, column)`, or `None` for empty or off-board.
    pub fn cell(&self, row: usize, column: usize) -> Option<Seat> {
        self.cells.get(row)?.get(column).copied().flatten()
    }

    /// A column is full iff its top cell is taken. Out-of-range columns
    /// count as full so they never show up as playable.
    pub fn is_column_full(&self, column: usize) -> bool {
        column >= COLUMNS || self.cells[0][column].is_some()
    }

    /// `true` once all 42 cells are taken.
    pub fn is_full(&self) -> bool {
        (0..COLUMNS).all(|c| self.is_column_full(c))
    }

    /// Columns that can still take a disc, left to right.
    pub fn valid_columns(&self) -> impl Iterator<Item = usize> + '_ {
        (0..COLUMNS).filter(|&c| !self.is_column_full(c))
    }

    /// The row a disc dropped into `column` would land on.
    pub fn drop_row(&self, column: usize) -> Option<usize> {
        if column >= COLUMNS {
            return None;
        }
        (0..ROWS).rev().find(|&row| self.cells[row][column].is_none())
    }

    /// Drops a disc into `column` and returns the row it landed on.
    ///
    /// # Errors
    /// `InvalidColumn` for `column >= COLUMNS`, `ColumnFull` if the top
    /// cell is taken. The board is untouched on error.
    pub fn drop_disc(
        &mut self,
        column: usize,
        seat: Seat,
    ) -> Result<usize, MoveError> {
        if column >= COLUMNS {
            return Err(MoveError::InvalidColumn);
        }
        let row = self.drop_row(column).ok_or(MoveError::ColumnFull)?;
        self.cells[row][column] = Some(seat);
        Ok(row)
    }

    /// Number of discs on the board.
    pub fn disc_count(&self) -> usize {
        self.cells.iter().flatten().filter(|c| c.is_some()).count()
    }

    /// Cells on the same seat's contiguous run through `(row, column)`
    /// along one axis, looking at most three cells each way.
    ///
    /// The starting cell comes first. Returns just the start cell if it
    /// is empty.
    pub fn line_through(
        &self,
        row: usize,
        column: usize,
        direction: (isize, isize),
    ) -> Vec<(usize, usize)> {
        let mut cells = vec![(row, column)];
        let Some(seat) = self.cell(row, column) else {
            return cells;
        };

        for sign in [1, -1] {
            let dir = (direction.0 * sign, direction.1 * sign);
            for distance in 1..CONNECT as isize {
                match neighbor(row, column, dir, distance) {
                    Some((r, c)) if self.cell(r, c) == Some(seat) => {
                        cells.push((r, c));
                    }
                    _ => break,
                }
            }
        }
        cells
    }

    /// If the disc at `(row, column)` is part of four or more in a row,
    /// returns every cell of that run (first matching axis only).
    pub fn winning_line(
        &self,
        row: usize,
        column: usize,
    ) -> Option<Vec<(usize, usize)>> {
        self.cell(row, column)?;
        DIRECTIONS
            .iter()
            .map(|&dir| self.line_through(row, column, dir))
            .find(|line| line.len() >= CONNECT)
    }

    /// The board as nested rows of `0`/`1`/`2`, as sent to clients.
    pub fn to_rows(&self) -> Vec<Vec<u8>> {
        self.cells
            .iter()
            .map(|row| {
                row.iter().map(|cell| cell.map_or(0, Seat::number)).collect()
            })
            .collect()
    }
}

/// The cell `distance` steps from `(row, column)` along `direction`, if
/// it's on the board.
pub fn neighbor(
    row: usize,
    column: usize,
    direction: (isize, isize),
    distance: isize,
) -> Option<(usize, usize)> {
    let r = row.checked_add_signed(direction.0 * distance)?;
    let c = column.checked_add_signed(direction.1 * distance)?;
    (r < ROWS && c < COLUMNS).then_some((r, c))
}

/// Parses a diagram with one line per row, top row first. `.` is empty,
/// `X`/`1` is seat one, `O`/`2` is seat two. Blank lines and
/// surrounding whitespace are ignored.
///
/// ```rust
/// use fourfold_engine::{Board, Seat};
///
/// let board: Board = "
///     .......
///     .......
///     .......
///     .......
///     .......
///     ...XO..
/// ".parse().unwrap();
///
/// assert_eq!(board.cell(5, 3), Some(Seat::One));
/// assert_eq!(board.cell(5, 4), Some(Seat::Two));
/// ```
impl FromStr for Board {
    type Err = ParseBoardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lines: Vec<&str> = s
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();
        if lines.len() != ROWS {
            return Err(ParseBoardError::RowCount {
                expected: ROWS,
                found: lines.len(),
            });
        }

        let mut board = Board::new();
        for (row, line) in lines.iter().enumerate() {
            let width = line.chars().count();
            if width != COLUMNS {
                return Err(ParseBoardError::RowWidth {
                    row,
                    expected: COLUMNS,
                    found: width,
                });
            }
            for (column, ch) in line.chars().enumerate() {
                board.cells[row][column] = match ch {
                    '.' | '0' => None,
                    'X' | 'x' | '1' => Some(Seat::One),
                    'O' | 'o' | '2' => Some(Seat::Two),
                    cell => return Err(ParseBoardError::Cell { row, cell }),
                };
            }
        }
        Ok(board)
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in &self.cells {
            for cell in row {
                let ch = match cell {
                    None => '.',
                    Some(Seat::One) => 'X',
                    Some(Seat::Two) => 'O',
                };
                write!(f, "{ch}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
