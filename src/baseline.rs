//! Most-frequent-entity baseline.
//!
//! Ignores context and relatedness entirely: each mention goes to the
//! candidate its surface form links to most often in the corpus. Useful as a
//! floor when comparing the collective algorithms.

use crate::solution::{select_best, Assignment};
use referent_core::{CandidateIndex, Mention, Result};

/// Assigns every mention its most frequently linked candidate.
pub struct MostFrequent<'a> {
    candidates: &'a dyn CandidateIndex,
}

impl<'a> MostFrequent<'a> {
    /// Create a baseline over a candidate index.
    pub fn new(candidates: &'a dyn CandidateIndex) -> Self {
        Self { candidates }
    }

    /// Pick the highest-frequency candidate per mention.
    ///
    /// The score of an assignment is its candidate probability. Ties go to
    /// the lowest entity id; mentions whose surface form is no longer in the
    /// index fall back to zero for every candidate.
    pub fn solve(&self, mentions: &[Mention]) -> Result<Vec<Assignment>> {
        let entries = mentions
            .iter()
            .map(|m| self.candidates.lookup(&m.normalized))
            .collect::<Result<Vec<_>>>()?;
        Ok(select_best(mentions, |i, entity, _| {
            entries[i]
                .as_ref()
                .map_or(0.0, |entry| entry.candidate_probability(entity))
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use referent_core::{CandidateEntry, EntityId, InMemoryIndex};
    use rust_decimal::Decimal;

    #[test]
    fn test_picks_most_frequent_candidate() {
        let index = InMemoryIndex::new().with_candidates(
            "mercury",
            CandidateEntry::new(
                4,
                9,
                vec![(EntityId(7), 2), (EntityId(3), 5), (EntityId(9), 1)],
            ),
        );
        let mentions = vec![Mention::new("mercury", 0, 7)
            .with_candidate(EntityId(3), Decimal::ZERO)
            .with_candidate(EntityId(7), Decimal::ONE)
            .with_candidate(EntityId(9), Decimal::ONE)];

        let solution = MostFrequent::new(&index).solve(&mentions).unwrap();
        assert_eq!(solution[0].entity, Some(EntityId(3)));
        assert!((solution[0].score - 0.625).abs() < 1e-12);
    }

    #[test]
    fn test_equal_frequencies_go_to_lowest_id() {
        let index = InMemoryIndex::new().with_candidates(
            "paris",
            CandidateEntry::new(1, 2, vec![(EntityId(8), 3), (EntityId(2), 3)]),
        );
        let mentions = vec![Mention::new("paris", 0, 5)
            .with_candidate(EntityId(8), Decimal::ONE)
            .with_candidate(EntityId(2), Decimal::ONE)];
        let solution = MostFrequent::new(&index).solve(&mentions).unwrap();
        assert_eq!(solution[0].entity, Some(EntityId(2)));
    }

    #[test]
    fn test_unknown_surface_still_assigned() {
        let index = InMemoryIndex::new();
        let mentions = vec![Mention::new("atlantis", 0, 8).with_candidate(EntityId(1), Decimal::ONE)];
        let solution = MostFrequent::new(&index).solve(&mentions).unwrap();
        assert_eq!(solution[0].entity, Some(EntityId(1)));
        assert_eq!(solution[0].score, 0.0);
    }
}
