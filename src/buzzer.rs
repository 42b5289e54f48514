//! Buzzer arbitration for the active clue
//!
//! Every buzz attempt receives a monotonically increasing sequence
//! number in arrival order. While the window is open the earliest
//! eligible attempt wins; attempts arriving before the window opens
//! lock that player out for the remainder of the clue. Queued
//! attempts survive a wrong answer, so the floor passes to the next
//! earliest eligible buzzer without a new window.

use std::collections::HashSet;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::participant::Id;

/// The result of a single buzz attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BuzzOutcome {
    /// The attempt won the floor
    Floor,
    /// The attempt was recorded but an earlier one holds the floor
    Queued,
    /// The player buzzed before the window opened and is locked out
    LockedOut,
    /// The player already has an attempt recorded for this clue
    AlreadyBuzzed,
    /// The player already answered this clue wrong
    Ineligible,
}

/// Serialization helper; sets are stored as sorted lists
#[derive(Serialize, Deserialize)]
struct BuzzerSerde {
    next_seq: u64,
    open: bool,
    attempts: Vec<(Id, u64)>,
    locked_out: Vec<Id>,
    wrong: Vec<Id>,
    winner: Option<Id>,
}

/// Arbiter for buzz attempts on one clue
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(into = "BuzzerSerde", from = "BuzzerSerde")]
pub struct Buzzer {
    /// Next sequence number to assign
    next_seq: u64,

    /// Whether the buzz window is currently open
    open: bool,

    /// Recorded attempts in arrival order, as (player, sequence)
    attempts: Vec<(Id, u64)>,

    /// Players locked out for buzzing before the window opened
    locked_out: HashSet<Id>,

    /// Players who already answered this clue wrong
    wrong: HashSet<Id>,

    /// Current holder of the floor
    winner: Option<Id>,
}

impl From<Buzzer> for BuzzerSerde {
    fn from(buzzer: Buzzer) -> Self {
        Self {
            next_seq: buzzer.next_seq,
            open: buzzer.open,
            attempts: buzzer.attempts,
            locked_out: buzzer.locked_out.into_iter().sorted().collect_vec(),
            wrong: buzzer.wrong.into_iter().sorted().collect_vec(),
            winner: buzzer.winner,
        }
    }
}

impl From<BuzzerSerde> for Buzzer {
    fn from(serde: BuzzerSerde) -> Self {
        Self {
            next_seq: serde.next_seq,
            open: serde.open,
            attempts: serde.attempts,
            locked_out: serde.locked_out.into_iter().collect(),
            wrong: serde.wrong.into_iter().collect(),
            winner: serde.winner,
        }
    }
}

impl Buzzer {
    /// Opens the buzz window
    pub fn open_window(&mut self) {
        self.open = true;
    }

    /// Records a buzz attempt and reports its outcome.
    ///
    /// An attempt before the window opens locks the player out for the
    /// remainder of the clue. Within the window each player gets one
    /// attempt; the earliest eligible attempt holds the floor.
    pub fn submit(&mut self, player: Id) -> BuzzOutcome {
        if self.wrong.contains(&player) {
            return BuzzOutcome::Ineligible;
        }
        if self.locked_out.contains(&player) {
            return BuzzOutcome::LockedOut;
        }
        if !self.open {
            self.locked_out.insert(player);
            return BuzzOutcome::LockedOut;
        }
        if self.attempts.iter().any(|(id, _)| *id == player) {
            return BuzzOutcome::AlreadyBuzzed;
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.attempts.push((player, seq));

        if self.winner.is_none() {
            self.resolve();
        }

        match self.winner {
            Some(winner) if winner == player => BuzzOutcome::Floor,
            _ => BuzzOutcome::Queued,
        }
    }

    /// Assigns the floor to the earliest eligible queued attempt
    fn resolve(&mut self) {
        self.winner = self
            .attempts
            .iter()
            .filter(|(id, _)| !self.wrong.contains(id) && !self.locked_out.contains(id))
            .min_by_key(|(_, seq)| *seq)
            .map(|(id, _)| *id);
    }

    /// Marks the current floor holder's answer wrong and releases the
    /// floor
    pub fn mark_wrong(&mut self, player: Id) {
        self.wrong.insert(player);
        if self.winner == Some(player) {
            self.winner = None;
        }
    }

    /// Passes the floor to the next earliest eligible queued attempt,
    /// if one exists
    pub fn next_floor(&mut self) -> Option<Id> {
        self.resolve();
        self.winner
    }

    /// Players from `players` still able to buzz on this clue
    pub fn eligible_remaining<'a>(&self, players: impl Iterator<Item = &'a Id>) -> Vec<Id> {
        players
            .filter(|id| {
                !self.wrong.contains(id)
                    && !self.locked_out.contains(id)
                    && !self.attempts.iter().any(|(a, _)| a == *id)
            })
            .copied()
            .collect_vec()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_earliest_attempt_wins() {
        let mut buzzer = Buzzer::default();
        let (a, b, c) = (Id::new(), Id::new(), Id::new());

        buzzer.open_window();
        assert_eq!(buzzer.submit(a), BuzzOutcome::Floor);
        assert_eq!(buzzer.submit(b), BuzzOutcome::Queued);
        assert_eq!(buzzer.submit(c), BuzzOutcome::Queued);
        assert_eq!(buzzer.next_floor(), Some(a));
    }

    #[test]
    fn test_early_buzz_locks_out_for_the_clue() {
        let mut buzzer = Buzzer::default();
        let early = Id::new();
        let patient = Id::new();

        assert_eq!(buzzer.submit(early), BuzzOutcome::LockedOut);

        buzzer.open_window();
        assert_eq!(buzzer.submit(early), BuzzOutcome::LockedOut);
        assert_eq!(buzzer.submit(patient), BuzzOutcome::Floor);
    }

    #[test]
    fn test_double_buzz_is_rejected() {
        let mut buzzer = Buzzer::default();
        let a = Id::new();

        buzzer.open_window();
        assert_eq!(buzzer.submit(a), BuzzOutcome::Floor);
        assert_eq!(buzzer.submit(a), BuzzOutcome::AlreadyBuzzed);
    }

    #[test]
    fn test_floor_passes_to_next_queued_attempt() {
        let mut buzzer = Buzzer::default();
        let (a, b, c) = (Id::new(), Id::new(), Id::new());

        buzzer.open_window();
        buzzer.submit(a);
        buzzer.submit(b);
        buzzer.submit(c);

        buzzer.mark_wrong(a);
        assert_eq!(buzzer.next_floor(), Some(b));

        buzzer.mark_wrong(b);
        assert_eq!(buzzer.next_floor(), Some(c));

        buzzer.mark_wrong(c);
        assert_eq!(buzzer.next_floor(), None);
    }

    #[test]
    fn test_wrong_answerer_cannot_rebuzz() {
        let mut buzzer = Buzzer::default();
        let a = Id::new();

        buzzer.open_window();
        buzzer.submit(a);
        buzzer.mark_wrong(a);

        assert_eq!(buzzer.submit(a), BuzzOutcome::Ineligible);
    }

    #[test]
    fn test_eligible_remaining_excludes_everyone_involved() {
        let mut buzzer = Buzzer::default();
        let (a, b, c, d) = (Id::new(), Id::new(), Id::new(), Id::new());

        buzzer.submit(a); // locked out
        buzzer.open_window();
        buzzer.submit(b);
        buzzer.mark_wrong(b);
        buzzer.submit(c); // queued

        let players = [a, b, c, d];
        assert_eq!(buzzer.eligible_remaining(players.iter()), vec![d]);
    }

    #[test]
    fn test_serde_round_trip_preserves_state() {
        let mut buzzer = Buzzer::default();
        let (a, b) = (Id::new(), Id::new());

        buzzer.open_window();
        buzzer.submit(a);
        buzzer.submit(b);
        buzzer.mark_wrong(a);

        let serialized = serde_json::to_string(&buzzer).unwrap();
        let mut restored: Buzzer = serde_json::from_str(&serialized).unwrap();

        assert_eq!(restored.next_floor(), Some(b));
        assert_eq!(restored.submit(a), BuzzOutcome::Ineligible);
    }
}
