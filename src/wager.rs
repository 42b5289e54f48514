//! Wager validation
//!
//! Checks a proposed wager against the rules of the phase it was made
//! in. Out-of-range wagers are rejected with an error carrying the
//! allowed range; the engine never silently clamps a wager.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The phase-specific rules a wager is checked against
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum WagerContext {
    /// A Daily Double wager by the selecting player
    DailyDouble {
        /// Smallest allowed wager, regardless of score
        floor: i64,
        /// The selector's current score (may be negative)
        score: i64,
        /// Highest cell value on the current board
        top_board_value: u32,
    },
    /// A Final Jeopardy wager
    FinalJeopardy {
        /// The player's current score (may be negative)
        score: i64,
    },
}

impl WagerContext {
    /// The inclusive range of wagers this context allows.
    ///
    /// Daily Double: `floor ..= max(score, top board value)`, so a
    /// player in the red can still wager the floor. Final Jeopardy:
    /// `0 ..= score`, with non-positive scores limited to exactly 0.
    pub fn bounds(&self) -> (i64, i64) {
        match *self {
            Self::DailyDouble {
                floor,
                score,
                top_board_value,
            } => (floor, score.max(i64::from(top_board_value))),
            Self::FinalJeopardy { score } => (0, score.max(0)),
        }
    }
}

/// Rejection of an out-of-range wager
#[derive(Error, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[error("wager {amount} outside allowed range [{min}, {max}]")]
pub struct InvalidWager {
    /// The rejected amount
    pub amount: i64,
    /// Smallest allowed wager
    pub min: i64,
    /// Largest allowed wager
    pub max: i64,
}

/// Validates a proposed wager against the current context.
///
/// # Errors
///
/// Returns [`InvalidWager`] with the allowed range when the amount
/// falls outside it.
pub fn validate(amount: i64, context: &WagerContext) -> Result<(), InvalidWager> {
    let (min, max) = context.bounds();
    if (min..=max).contains(&amount) {
        Ok(())
    } else {
        Err(InvalidWager { amount, min, max })
    }
}
