use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A ballot value other than +1 or -1 was offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("vote value must be 1 or -1")]
pub struct InvalidDirection;

/// A vote being cast: up or down. Toggling off is expressed by casting the
/// same direction twice, not by a third variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn value(self) -> i8 {
        match self {
            Direction::Up => 1,
            Direction::Down => -1,
        }
    }
}

impl TryFrom<i8> for Direction {
    type Error = InvalidDirection;

    fn try_from(v: i8) -> Result<Self, InvalidDirection> {
        match v {
            1 => Ok(Direction::Up),
            -1 => Ok(Direction::Down),
            _ => Err(InvalidDirection),
        }
    }
}

/// Per-entity vote state: a running total plus every user's recorded ballot.
/// Embedded in posts, comments, and replies alike.
///
/// Invariant: `total == sum(ballots.values())` after every `apply`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VoteLedger {
    pub total: i64,
    #[serde(default)]
    pub ballots: BTreeMap<String, i8>,
}

impl VoteLedger {
    /// Apply one vote. Returns the user's new ballot, or `None` when the
    /// vote toggled off (same direction cast twice in a row).
    pub fn apply(&mut self, user_id: &str, direction: Direction) -> Option<i8> {
        let prior = self.ballot(user_id);
        let value = direction.value();

        if prior == value {
            // Same vote again: toggle off.
            self.ballots.insert(user_id.to_string(), 0);
            self.total -= i64::from(value);
            None
        } else {
            self.total -= i64::from(prior);
            self.total += i64::from(value);
            self.ballots.insert(user_id.to_string(), value);
            Some(value)
        }
    }

    /// The user's recorded ballot; an absent entry counts as 0.
    pub fn ballot(&self, user_id: &str) -> i8 {
        self.ballots.get(user_id).copied().unwrap_or(0)
    }

    pub fn is_consistent(&self) -> bool {
        self.total == self.ballots.values().map(|&v| i64::from(v)).sum::<i64>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_vote_counts() {
        let mut ledger = VoteLedger::default();
        assert_eq!(ledger.apply("u1", Direction::Up), Some(1));
        assert_eq!(ledger.total, 1);
        assert_eq!(ledger.ballot("u1"), 1);
        assert!(ledger.is_consistent());
    }

    #[test]
    fn same_direction_twice_toggles_off() {
        let mut ledger = VoteLedger::default();
        ledger.apply("u1", Direction::Down);
        assert_eq!(ledger.apply("u1", Direction::Down), None);
        assert_eq!(ledger.total, 0);
        assert_eq!(ledger.ballot("u1"), 0);
        assert!(ledger.is_consistent());
    }

    #[test]
    fn switching_direction_swings_by_two() {
        let mut ledger = VoteLedger::default();
        ledger.apply("u1", Direction::Up);
        assert_eq!(ledger.apply("u1", Direction::Down), Some(-1));
        assert_eq!(ledger.total, -1);
        assert!(ledger.is_consistent());
    }

    #[test]
    fn reducer_algebra_holds_for_every_prior() {
        // total_after == total_before - prior + (prior == direction ? 0 : direction)
        for direction in [Direction::Up, Direction::Down] {
            for prior in [-1i8, 0, 1] {
                let mut ledger = VoteLedger::default();
                ledger.ballots.insert("u1".into(), prior);
                ledger.total = i64::from(prior);

                ledger.apply("u1", direction);

                let expected = if prior == direction.value() {
                    0
                } else {
                    i64::from(direction.value())
                };
                assert_eq!(ledger.total, expected, "direction {direction:?}, prior {prior}");
                assert!(ledger.is_consistent());
            }
        }
    }

    #[test]
    fn out_of_range_ballot_values_are_rejected() {
        assert_eq!(Direction::try_from(1), Ok(Direction::Up));
        assert_eq!(Direction::try_from(-1), Ok(Direction::Down));
        for bad in [0i8, 2, -2, 127] {
            let err = Direction::try_from(bad).unwrap_err();
            assert_eq!(err.to_string(), "vote value must be 1 or -1");
        }
    }

    #[test]
    fn independent_voters_accumulate() {
        let mut ledger = VoteLedger::default();
        ledger.apply("u1", Direction::Up);
        ledger.apply("u2", Direction::Up);
        ledger.apply("u3", Direction::Down);
        assert_eq!(ledger.total, 1);
        assert_eq!(ledger.ballots.len(), 3);
        assert!(ledger.is_consistent());
    }
}
