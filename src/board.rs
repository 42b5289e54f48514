//! Clue boards and the question source they draw from
//!
//! A board is a grid of categories by dollar values. Cells are filled
//! from an injected [`QuestionSource`]; a cell whose fetch failed
//! stays empty and is retried on selection, so a flaky source never
//! wedges the board. Daily doubles are placed at random cells during
//! generation and revealed only on selection.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants;

/// Which of the two regular rounds a board belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Round {
    /// First round, lower values, one daily double
    One,
    /// Second round, doubled values, two daily doubles
    Two,
}

impl Round {
    /// The dollar values of one category column in this round
    pub fn values(self) -> &'static [u32] {
        match self {
            Round::One => &constants::board::ROUND_ONE_VALUES,
            Round::Two => &constants::board::ROUND_TWO_VALUES,
        }
    }

    /// Number of daily doubles hidden on this round's board
    pub fn daily_doubles(self) -> usize {
        match self {
            Round::One => constants::board::ROUND_ONE_DAILY_DOUBLES,
            Round::Two => constants::board::ROUND_TWO_DAILY_DOUBLES,
        }
    }
}

/// A single clue as fetched from the source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clue {
    /// The category this clue belongs to
    pub category: String,
    /// Dollar value of the clue (0 for the final clue)
    pub value: u32,
    /// The prompt read to the players
    pub prompt: String,
    /// The canonical answer used for judging
    pub answer: String,
}

/// An error produced by a question source
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("question source failure: {0}")]
pub struct SourceError(pub String);

/// Provider of categories and clues, injected by the caller.
///
/// The engine never assumes where clues come from; a source may wrap
/// a database, an HTTP API, or a fixture file.
pub trait QuestionSource {
    /// The category names to use for a round's board
    ///
    /// # Errors
    ///
    /// Returns a [`SourceError`] when categories cannot be produced.
    fn round_categories(&self, round: Round) -> Result<Vec<String>, SourceError>;

    /// Fetches the clue for one cell
    ///
    /// # Errors
    ///
    /// Returns a [`SourceError`] when the clue cannot be produced.
    fn fetch(&self, category: &str, value: u32) -> Result<Clue, SourceError>;

    /// Fetches the final round's single clue
    ///
    /// # Errors
    ///
    /// Returns a [`SourceError`] when the clue cannot be produced.
    fn final_clue(&self) -> Result<Clue, SourceError>;
}

/// One cell of the board
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CellSlot {
    /// The fetched clue, or `None` if the fetch failed
    clue: Option<Clue>,

    /// Whether the cell has been played and closed
    answered: bool,

    /// Whether this cell hides a daily double
    daily_double: bool,
}

/// Errors from selecting or closing board cells
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Error {
    /// The (category, value) pair does not exist on this board
    #[error("no such cell on the board")]
    NotFound,
    /// The cell has already been played
    #[error("cell has already been answered")]
    AlreadyAnswered,
    /// The source failed to produce the clue, including on retry
    #[error("clue is not available")]
    NotAvailable,
}

/// Public view of one cell, with the daily double flag withheld
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellView {
    /// Dollar value of the cell
    pub value: u32,
    /// Whether the cell has been played and closed
    pub answered: bool,
}

/// Public snapshot of a board for state sync
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardSnapshot {
    /// Category names, one per column
    pub categories: Vec<String>,
    /// Cells per column, in ascending value order
    pub cells: Vec<Vec<CellView>>,
}

/// A round's grid of clue cells
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Board {
    /// Category names, one per column
    categories: Vec<String>,

    /// Dollar values of each column, ascending
    values: Vec<u32>,

    /// Cells per category column, aligned with `values`
    columns: Vec<Vec<CellSlot>>,
}

impl Board {
    /// Generates a board for a round, fetching every cell's clue and
    /// placing the round's daily doubles at random cells.
    ///
    /// Cells whose fetch fails are left empty and retried on
    /// selection.
    ///
    /// # Errors
    ///
    /// Returns a [`SourceError`] when the source cannot produce the
    /// round's categories.
    pub fn generate(source: &impl QuestionSource, round: Round) -> Result<Self, SourceError> {
        let categories = source.round_categories(round)?;
        let values = round.values().to_vec();

        let mut columns = categories
            .iter()
            .map(|category| {
                values
                    .iter()
                    .map(|value| CellSlot {
                        clue: source.fetch(category, *value).ok(),
                        answered: false,
                        daily_double: false,
                    })
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();

        let cell_count = categories.len() * values.len();
        let mut placed = 0;
        while placed < round.daily_doubles().min(cell_count) {
            let index = fastrand::usize(..cell_count);
            let slot = &mut columns[index / values.len()][index % values.len()];
            if !slot.daily_double {
                slot.daily_double = true;
                placed += 1;
            }
        }

        Ok(Self {
            categories,
            values,
            columns,
        })
    }

    fn indices(&self, category: &str, value: u32) -> Option<(usize, usize)> {
        let column = self.categories.iter().position(|c| c == category)?;
        let row = self.values.iter().position(|v| *v == value)?;
        Some((column, row))
    }

    /// Selects a cell for play, returning its clue and whether it is
    /// a daily double. The cell stays open until [`Self::mark_answered`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for a cell not on the board,
    /// [`Error::AlreadyAnswered`] for a closed cell, and
    /// [`Error::NotAvailable`] when the clue fetch fails again.
    pub fn select(
        &mut self,
        category: &str,
        value: u32,
        source: &impl QuestionSource,
    ) -> Result<(Clue, bool), Error> {
        let (column, row) = self.indices(category, value).ok_or(Error::NotFound)?;
        let slot = &mut self.columns[column][row];
        if slot.answered {
            return Err(Error::AlreadyAnswered);
        }
        if slot.clue.is_none() {
            slot.clue = source.fetch(category, value).ok();
        }
        match &slot.clue {
            Some(clue) => Ok((clue.clone(), slot.daily_double)),
            None => Err(Error::NotAvailable),
        }
    }

    /// Closes a cell so it can never be selected again.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for a cell not on the board.
    pub fn mark_answered(&mut self, category: &str, value: u32) -> Result<(), Error> {
        let (column, row) = self.indices(category, value).ok_or(Error::NotFound)?;
        self.columns[column][row].answered = true;
        Ok(())
    }

    /// Whether every cell on the board has been played
    pub fn is_complete(&self) -> bool {
        self.columns
            .iter()
            .all(|column| column.iter().all(|slot| slot.answered))
    }

    /// The highest dollar value still defined on this board
    pub fn top_value(&self) -> u32 {
        self.values.iter().copied().max().unwrap_or_default()
    }

    /// A snapshot of the board suitable for broadcasting; daily
    /// double locations are withheld
    pub fn snapshot(&self) -> BoardSnapshot {
        BoardSnapshot {
            categories: self.categories.clone(),
            cells: self
                .columns
                .iter()
                .map(|column| {
                    column
                        .iter()
                        .zip(self.values.iter())
                        .map(|(slot, value)| CellView {
                            value: *value,
                            answered: slot.answered,
                        })
                        .collect()
                })
                .collect(),
        }
    }
}
