//! Error types for the engine.

/// Why a move was refused. The `Display` text is the `reason` sent to
/// the client in `invalid_move`, so it must stay stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MoveError {
    /// The game is finished or waiting on a disconnected seat.
    #[error("game is not in progress")]
    NotInProgress,

    /// The other seat is to move.
    #[error("not your turn")]
    NotYourTurn,

    /// The column index is outside `0..COLUMNS`.
    #[error("invalid column")]
    InvalidColumn,

    /// The column's top cell is already taken.
    #[error("column is full")]
    ColumnFull,
}

/// A board diagram that couldn't be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseBoardError {
    #[error("expected {expected} rows, found {found}")]
    RowCount { expected: usize, found: usize },

    #[error("row {row}: expected {expected} cells, found {found}")]
    RowWidth {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("row {row}: unexpected cell {cell:?}")]
    Cell { row: usize, cell: char },
}
