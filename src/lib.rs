//! # Clueboard Game Library
//!
//! This library provides the core session logic for a board-style
//! trivia game: a lobby, two board rounds with buzzer arbitration and
//! Daily Double wagers, a final wagering round, and a frozen summary.
//! The engine is authoritative and transport-agnostic; clients connect
//! through tunnels, receive granular updates and full state syncs, and
//! every timed transition runs through scheduled alarms.

#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::similar_names)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::ignored_unit_patterns)]
#![allow(clippy::struct_field_names)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::wildcard_imports)]
use derive_where::derive_where;
use itertools::Itertools;
use serde::Serialize;

pub mod constants;

pub mod answer;
pub mod board;
pub mod buzzer;
pub mod game;
pub mod names;
pub mod participant;
pub mod registry;
pub mod scoreboard;
pub mod session;
pub mod wager;

/// A truncated vector that maintains the exact count while limiting
/// displayed items
///
/// Useful for rosters: show the first few names while still reporting
/// the true total.
#[derive(Debug, Clone, Serialize)]
#[derive_where(Default)]
pub struct TruncatedVec<T> {
    /// The exact total count of items
    exact_count: usize,
    /// The truncated list of items (up to the limit)
    items: Vec<T>,
}

impl<T: Clone> TruncatedVec<T> {
    /// Creates a new truncated vector holding up to `limit` items from
    /// the iterator while remembering the exact total
    pub fn new<I: Iterator<Item = T>>(list: I, limit: usize, exact_count: usize) -> Self {
        let items = list.take(limit).collect_vec();
        Self { exact_count, items }
    }

    /// Maps a function over the retained items
    pub fn map<F, U>(self, f: F) -> TruncatedVec<U>
    where
        F: Fn(T) -> U,
    {
        TruncatedVec {
            exact_count: self.exact_count,
            items: self.items.into_iter().map(f).collect_vec(),
        }
    }

    /// Returns the exact count of items
    pub fn exact_count(&self) -> usize {
        self.exact_count
    }

    /// Returns the truncated items
    pub fn items(&self) -> &[T] {
        &self.items
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_truncated_vec_keeps_exact_count() {
        let data = vec![1, 2, 3, 4, 5];
        let truncated = TruncatedVec::new(data.into_iter(), 3, 5);

        assert_eq!(truncated.exact_count(), 5);
        assert_eq!(truncated.items(), &[1, 2, 3]);
    }

    #[test]
    fn test_truncated_vec_limit_larger_than_items() {
        let data = vec![1, 2, 3];
        let truncated = TruncatedVec::new(data.into_iter(), 5, 3);

        assert_eq!(truncated.exact_count(), 3);
        assert_eq!(truncated.items(), &[1, 2, 3]);
    }

    #[test]
    fn test_truncated_vec_map() {
        let data = vec!["a", "b", "c"];
        let truncated = TruncatedVec::new(data.into_iter(), 2, 3).map(str::to_uppercase);

        assert_eq!(truncated.exact_count(), 3);
        assert_eq!(truncated.items(), &["A".to_owned(), "B".to_owned()]);
    }

    #[test]
    fn test_truncated_vec_serializes_both_fields() {
        let truncated = TruncatedVec::new([1, 2].into_iter(), 2, 4);
        let json = serde_json::to_string(&truncated).unwrap();

        assert_eq!(json, r#"{"exact_count":4,"items":[1,2]}"#);
    }
}
