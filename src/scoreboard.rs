//! Signed score tracking across the whole game
//!
//! Scores are signed; wrong answers and lost wagers push players
//! below zero. Every adjustment flows through [`Scoreboard::apply`]
//! so the board stays the single authority on totals.

use std::collections::HashMap;

use itertools::Itertools;
use once_cell_serde::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::participant::Id;

/// One entry of a standings listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Standing {
    /// The player
    pub player: Id,
    /// The player's current total
    pub score: i64,
}

/// Authoritative score totals for every seated player
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Scoreboard {
    /// Current totals by player
    scores: HashMap<Id, i64>,

    /// Standings frozen when the game completes
    final_standings: OnceCell<Vec<Standing>>,
}

impl Scoreboard {
    /// Registers a player with a zero total if not yet present
    pub fn ensure(&mut self, player: Id) {
        self.scores.entry(player).or_insert(0);
    }

    /// Removes a player's total (lobby departures only)
    pub fn remove(&mut self, player: Id) {
        self.scores.remove(&player);
    }

    /// Current total for a player; unseated players read as zero
    pub fn score(&self, player: Id) -> i64 {
        self.scores.get(&player).copied().unwrap_or_default()
    }

    /// Applies a signed delta and returns the new total
    pub fn apply(&mut self, player: Id, delta: i64) -> i64 {
        let total = self.scores.entry(player).or_insert(0);
        *total += delta;
        *total
    }

    /// Standings sorted highest total first, ties broken by id for a
    /// stable order
    pub fn standings_descending(&self) -> Vec<Standing> {
        self.scores
            .iter()
            .map(|(player, score)| Standing {
                player: *player,
                score: *score,
            })
            .sorted_by_key(|standing| (std::cmp::Reverse(standing.score), standing.player))
            .collect_vec()
    }

    /// Standings sorted lowest total first, the reveal order of the
    /// final round
    pub fn standings_ascending(&self) -> Vec<Standing> {
        self.scores
            .iter()
            .map(|(player, score)| Standing {
                player: *player,
                score: *score,
            })
            .sorted_by_key(|standing| (standing.score, standing.player))
            .collect_vec()
    }

    /// Freezes and returns the end-of-game standings; later score
    /// changes no longer affect the frozen listing
    pub fn freeze(&self) -> &Vec<Standing> {
        self.final_standings
            .get_or_init(|| self.standings_descending())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_deltas_accumulate_and_go_negative() {
        let mut scoreboard = Scoreboard::default();
        let player = Id::new();

        assert_eq!(scoreboard.apply(player, 200), 200);
        assert_eq!(scoreboard.apply(player, -600), -400);
        assert_eq!(scoreboard.score(player), -400);
    }

    #[test]
    fn test_unseated_player_reads_zero() {
        let scoreboard = Scoreboard::default();
        assert_eq!(scoreboard.score(Id::new()), 0);
    }

    #[test]
    fn test_standings_orders() {
        let mut scoreboard = Scoreboard::default();
        let (a, b, c) = (Id::new(), Id::new(), Id::new());
        scoreboard.apply(a, 400);
        scoreboard.apply(b, -200);
        scoreboard.ensure(c);

        let descending = scoreboard.standings_descending();
        assert_eq!(descending[0].player, a);
        assert_eq!(descending[2].player, b);

        let ascending = scoreboard.standings_ascending();
        assert_eq!(ascending[0].player, b);
        assert_eq!(ascending[2].player, a);
    }

    #[test]
    fn test_frozen_standings_ignore_later_changes() {
        let mut scoreboard = Scoreboard::default();
        let player = Id::new();
        scoreboard.apply(player, 1000);

        let frozen = scoreboard.freeze().clone();
        scoreboard.apply(player, -1000);

        assert_eq!(scoreboard.freeze(), &frozen);
        assert_eq!(frozen[0].score, 1000);
    }
}
