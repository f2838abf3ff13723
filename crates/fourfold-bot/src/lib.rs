//! Heuristic bot opponent for Fourfold.
//!
//! The bot looks exactly one move ahead. It never searches deeper; each
//! call costs at most a few board copies per column, so it is cheap
//! enough to run inline and the caller adds an artificial delay for
//! pacing.
//!
//! # Decision cascade
//!
//! The first rule that yields a column wins. Within a rule, columns are
//! scanned left to right unless noted.
//!
//! | # | Rule |
//! |---|------|
//! | 1 | Complete our own four |
//! | 2 | Block the opponent's immediate four |
//! | 3 | Make three-with-an-opening for us, unless it hands over a win |
//! | 4 | Take the cell where the opponent would make three-with-an-opening, same filter |
//! | 5 | Center-out preference (3, 2, 4, 1, 5, 0, 6), same filter |
//! | 6 | Center-out, filter ignored |
//! | 7 | Leftmost legal column |
//!
//! "Hands over a win" only checks the single cell directly above the
//! bot's new disc. Other columns are not examined.

use std::fmt;

use fourfold_engine::{Board, DIRECTIONS, Seat, neighbor};

/// Center-first column preference.
pub const CENTER_OUT: [usize; 7] = [3, 2, 4, 1, 5, 0, 6];

/// Which rule of the cascade produced a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    Win,
    BlockWin,
    BuildThree,
    BlockThree,
    Center,
    CenterUnfiltered,
    FirstLegal,
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Win => "win",
            Self::BlockWin => "block_win",
            Self::BuildThree => "build_three",
            Self::BlockThree => "block_three",
            Self::Center => "center",
            Self::CenterUnfiltered => "center_unfiltered",
            Self::FirstLegal => "first_legal",
        };
        f.write_str(name)
    }
}

/// A chosen column and the rule that picked it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub column: usize,
    pub rule: Rule,
}

/// Picks the bot's column. `None` only when the board is full.
///
/// Pure: the same board always gives the same answer, and `board` is
/// never modified.
pub fn select_move(board: &Board, bot: Seat) -> Option<usize> {
    decide(board, bot).map(|d| d.column)
}

/// Like [`select_move`], but also reports which rule fired.
pub fn decide(board: &Board, bot: Seat) -> Option<Decision> {
    let opponent = bot.opponent();
    let playable: Vec<usize> = board.valid_columns().collect();
    let legal = || playable.iter().copied();
    let open = |c: &usize| !board.is_column_full(*c);
    let safe = |c: &usize| !hands_opponent_win(board, bot, *c);

    first(Rule::Win, legal().filter(|&c| wins(board, bot, c)))
        .or_else(|| {
            first(Rule::BlockWin, legal().filter(|&c| wins(board, opponent, c)))
        })
        .or_else(|| {
            first(
                Rule::BuildThree,
                legal().filter(|&c| open_three(board, bot, c)).filter(safe),
            )
        })
        .or_else(|| {
            first(
                Rule::BlockThree,
                legal().filter(|&c| open_three(board, opponent, c)).filter(safe),
            )
        })
        .or_else(|| {
            first(Rule::Center, CENTER_OUT.into_iter().filter(open).filter(safe))
        })
        .or_else(|| {
            first(Rule::CenterUnfiltered, CENTER_OUT.into_iter().filter(open))
        })
        .or_else(|| first(Rule::FirstLegal, legal()))
}

fn first(
    rule: Rule,
    mut columns: impl Iterator<Item = usize>,
) -> Option<Decision> {
    columns.next().map(|column| Decision { column, rule })
}

/// Would `seat` complete four by dropping into `column`?
fn wins(board: &Board, seat: Seat, column: usize) -> bool {
    let mut sim = *board;
    match sim.drop_disc(column, seat) {
        Ok(row) => sim.winning_line(row, column).is_some(),
        Err(_) => false,
    }
}

/// Would dropping `seat` into `column` make at least three in a line with
/// an empty cell at one end or both?
///
/// Each way along an axis is scanned for up to three cells: own discs
/// extend the run, the first empty cell marks that end open, and
/// anything else (the edge or an enemy disc) closes it.
fn open_three(board: &Board, seat: Seat, column: usize) -> bool {
    let mut sim = *board;
    let Ok(row) = sim.drop_disc(column, seat) else {
        return false;
    };

    DIRECTIONS.iter().any(|&(dr, dc)| {
        let mut count = 1;
        let mut open_ends = 0;
        for dir in [(dr, dc), (-dr, -dc)] {
            for distance in 1..4 {
                let Some((r, c)) = neighbor(row, column, dir, distance) else {
                    break;
                };
                match sim.cell(r, c) {
                    Some(s) if s == seat => count += 1,
                    None => {
                        open_ends += 1;
                        break;
                    }
                    Some(_) => break,
                }
            }
        }
        count >= 3 && open_ends >= 1
    })
}

/// After the bot drops into `column`, could the opponent win by playing
/// on top of it?
fn hands_opponent_win(board: &Board, bot: Seat, column: usize) -> bool {
    let mut sim = *board;
    if sim.drop_disc(column, bot).is_err() {
        return false;
    }
    match sim.drop_disc(column, bot.opponent()) {
        Ok(row) => sim.winning_line(row, column).is_some(),
        Err(_) => false,
    }
}
