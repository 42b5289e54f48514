//! Configuration constants for the session engine
//!
//! This module contains the fixed shape of the game (board dimensions,
//! value tiers) and the default values for every tunable policy knob
//! (timing windows, similarity thresholds, wager floor). The tunables
//! are only defaults: operators override them through [`crate::game::Options`].

/// Board shape and value tiers
pub mod board {
    /// Number of categories on every board
    pub const CATEGORY_COUNT: usize = 6;
    /// Cell values for the first round
    pub const ROUND_ONE_VALUES: [u32; 5] = [200, 400, 600, 800, 1000];
    /// Cell values for the second round
    pub const ROUND_TWO_VALUES: [u32; 5] = [400, 800, 1200, 1600, 2000];
    /// Daily Doubles hidden on the first-round board
    pub const ROUND_ONE_DAILY_DOUBLES: usize = 1;
    /// Daily Doubles hidden on the second-round board
    pub const ROUND_TWO_DAILY_DOUBLES: usize = 2;
}

/// Session membership limits
pub mod session {
    /// Maximum number of participants in a single session
    pub const MAX_PARTICIPANT_COUNT: usize = 100;
    /// Minimum number of players required before the host may start
    pub const MIN_PLAYERS_TO_START: usize = 2;
    /// Maximum length of a player display name in bytes
    pub const MAX_NAME_LENGTH: usize = 30;
}

/// Default timing windows, in seconds
pub mod timing {
    /// Time to read a clue before buzzing opens (the lockout window)
    pub const DEFAULT_READ_WINDOW: u64 = 10;
    /// Time the buzzers stay open before the clue resolves unanswered
    pub const DEFAULT_BUZZ_WINDOW: u64 = 10;
    /// Time the floor holder has to submit an answer
    pub const DEFAULT_ANSWER_TIME: u64 = 15;
    /// Time the Daily Double selector has to place a wager
    pub const DEFAULT_WAGER_TIME: u64 = 10;
    /// Time every player has to place a Final Jeopardy wager
    pub const DEFAULT_FINAL_WAGER_TIME: u64 = 30;
    /// Time every player has to answer Final Jeopardy
    pub const DEFAULT_FINAL_ANSWER_TIME: u64 = 30;
    /// Minimum accepted value for any timing window
    pub const MIN_WINDOW: u64 = 1;
    /// Maximum accepted value for any timing window
    pub const MAX_WINDOW: u64 = 240;
}

/// Wager rules
pub mod wager {
    /// Smallest wager a Daily Double selector may place
    pub const DEFAULT_FLOOR: i64 = 5;
}

/// Answer matching thresholds
pub mod matching {
    /// Similarity required for a whole-string fuzzy match
    pub const DEFAULT_FULL_THRESHOLD: f64 = 0.80;
    /// Similarity required for a partial (substring) fuzzy match
    pub const DEFAULT_PARTIAL_THRESHOLD: f64 = 0.90;
}
