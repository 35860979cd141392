//! Per-mention arg-max over candidate scores.

use referent_core::{Compatibility, EntityId, Mention};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The entity chosen for one mention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    /// The disambiguated mention.
    pub mention: Mention,
    /// Chosen entity; `None` when the mention had no candidates.
    pub entity: Option<EntityId>,
    /// Score of the chosen entity under the algorithm that chose it.
    pub score: f64,
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.entity {
            Some(entity) => write!(f, "{:?} -> {} ({:.6})", self.mention.original, entity, self.score),
            None => write!(f, "{:?} -> <none>", self.mention.original),
        }
    }
}

/// Pick, for every mention, the candidate with the highest score.
///
/// `score` receives the mention index, the entity and its compatibility.
/// Candidates are visited in ascending entity id and only a strictly greater
/// score replaces the current best, so ties go to the lowest id. NaN scores
/// never win.
pub fn select_best<F>(mentions: &[Mention], mut score: F) -> Vec<Assignment>
where
    F: FnMut(usize, EntityId, Compatibility) -> f64,
{
    mentions
        .iter()
        .enumerate()
        .map(|(i, mention)| {
            let mut best: Option<(EntityId, f64)> = None;
            for (entity, compatibility) in mention.candidates() {
                let s = score(i, entity, compatibility);
                let s = if s.is_nan() { f64::NEG_INFINITY } else { s };
                match best {
                    Some((_, current)) if s <= current => {}
                    _ => best = Some((entity, s)),
                }
            }
            if best.is_none() {
                log::debug!("No candidates for {mention}");
            }
            Assignment {
                mention: mention.clone(),
                entity: best.map(|(e, _)| e),
                score: best.map_or(0.0, |(_, s)| s),
            }
        })
        .collect()
}
