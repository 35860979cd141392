//! Dense message storage for loopy belief propagation.
//!
//! Candidates are addressed by *slot*: the candidates of mention `i` occupy
//! slots `offsets[i]..offsets[i + 1]` in ascending entity id. A message
//! `(from, to, k)` lives at `from * slots + offsets[to] + k`, so every map
//! lookup is an index computation.
//!
//! ```text
//!           to = 0        to = 1          to = 2
//! from 0 | (unused) | m(0→1, ·) ... | m(0→2, ·) |
//! from 1 | m(1→0,·) | (unused)      | m(1→2, ·) |
//! ```
//!
//! After a sweep, [`MessagesMap::seal`] sums every slot's incoming messages
//! once; excluding a single sender is then one subtraction.

use referent_core::{Compatibility, EntityId, Mention};
use rust_decimal::prelude::ToPrimitive;

/// Slot layout of a document's mentions and candidates.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateLayout {
    offsets: Vec<usize>,
    entities: Vec<EntityId>,
    compatibility: Vec<f64>,
}

impl CandidateLayout {
    /// Lay out the candidates of `mentions` in mention, then entity id order.
    #[must_use]
    pub fn new(mentions: &[Mention]) -> Self {
        let mut offsets = Vec::with_capacity(mentions.len() + 1);
        let mut entities = Vec::new();
        let mut compatibility = Vec::new();
        offsets.push(0);
        for mention in mentions {
            for (entity, score) in mention.candidates() {
                entities.push(entity);
                compatibility.push(to_f64(score));
            }
            offsets.push(entities.len());
        }
        Self {
            offsets,
            entities,
            compatibility,
        }
    }

    /// Number of mentions.
    #[must_use]
    pub fn mention_count(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Total number of candidate slots.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.entities.len()
    }

    /// Number of candidates of a mention.
    #[must_use]
    pub fn candidate_count(&self, mention: usize) -> usize {
        self.offsets[mention + 1] - self.offsets[mention]
    }

    /// Slot of the `k`-th candidate of a mention.
    #[must_use]
    pub fn slot(&self, mention: usize, k: usize) -> usize {
        self.offsets[mention] + k
    }

    /// Candidate entities of a mention, ascending.
    #[must_use]
    pub fn candidates(&self, mention: usize) -> &[EntityId] {
        &self.entities[self.offsets[mention]..self.offsets[mention + 1]]
    }

    /// Entity held by a slot.
    #[must_use]
    pub fn entity(&self, slot: usize) -> EntityId {
        self.entities[slot]
    }

    /// Local compatibility of a slot.
    #[must_use]
    pub fn compatibility(&self, slot: usize) -> f64 {
        self.compatibility[slot]
    }

    /// Every entity id appearing as a candidate, with repeats.
    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.iter().copied()
    }
}

fn to_f64(score: Compatibility) -> f64 {
    score.to_f64().unwrap_or(0.0)
}

/// All messages of one sweep, in log domain.
#[derive(Debug, Clone)]
pub struct MessagesMap {
    mention_count: usize,
    offsets: Vec<usize>,
    values: Vec<f64>,
    incoming: Vec<f64>,
    sealed: bool,
}

impl MessagesMap {
    /// All messages at the additive identity.
    #[must_use]
    pub fn new(layout: &CandidateLayout) -> Self {
        let slots = layout.slot_count();
        Self {
            mention_count: layout.mention_count(),
            offsets: layout.offsets.clone(),
            values: vec![0.0; layout.mention_count() * slots],
            incoming: vec![0.0; slots],
            sealed: true,
        }
    }

    fn slots(&self) -> usize {
        self.incoming.len()
    }

    fn index(&self, from: usize, to: usize, k: usize) -> usize {
        from * self.slots() + self.offsets[to] + k
    }

    /// Message from mention `from` to candidate `k` of mention `to`.
    #[must_use]
    pub fn get(&self, from: usize, to: usize, k: usize) -> f64 {
        self.values[self.index(from, to, k)]
    }

    /// Messages from `from` to every candidate of `to`.
    #[must_use]
    pub fn batch(&self, from: usize, to: usize) -> &[f64] {
        let start = self.index(from, to, 0);
        &self.values[start..start + (self.offsets[to + 1] - self.offsets[to])]
    }

    /// Mutable messages from `from` to every candidate of `to`.
    ///
    /// Unseals the map until [`Self::seal`] is called again.
    pub fn batch_mut(&mut self, from: usize, to: usize) -> &mut [f64] {
        self.sealed = false;
        let start = self.index(from, to, 0);
        let len = self.offsets[to + 1] - self.offsets[to];
        &mut self.values[start..start + len]
    }

    /// Recompute the incoming sum of every slot.
    pub fn seal(&mut self) {
        let slots = self.slots();
        self.incoming.iter_mut().for_each(|s| *s = 0.0);
        for from in 0..self.mention_count {
            let row = &self.values[from * slots..(from + 1) * slots];
            for to in 0..self.mention_count {
                if from == to {
                    continue;
                }
                for slot in self.offsets[to]..self.offsets[to + 1] {
                    self.incoming[slot] += row[slot];
                }
            }
        }
        self.sealed = true;
    }

    /// Sum of all messages received by candidate `k` of `mention`.
    #[must_use]
    pub fn incoming(&self, mention: usize, k: usize) -> f64 {
        debug_assert!(self.sealed, "incoming sums read from an unsealed map");
        self.incoming[self.offsets[mention] + k]
    }

    /// Incoming sum without the message sent by `excluded`.
    #[must_use]
    pub fn incoming_excluding(&self, mention: usize, k: usize, excluded: usize) -> f64 {
        let all = self.incoming(mention, k);
        if excluded == mention {
            all
        } else {
            all - self.get(excluded, mention, k)
        }
    }
}
