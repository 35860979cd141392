//! Entity, token and mention types shared across the disambiguation pipeline.
//!
//! # Type Hierarchy
//!
//! ```text
//! text ──tokenize──> Token ──gather──> Ngram ──lookup──> Mention
//!                                                          │
//!                                   candidates: EntityId -> Compatibility
//! ```
//!
//! Offsets and lengths are measured in characters of the original text, not
//! bytes, so that spans line up with annotations produced by other tools.
//!
//! Mentions are created once per document by the extractor and treated as
//! read-only by the graph builder and both inference algorithms.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Local compatibility between a mention's context and a candidate entity.
///
/// Kept as a fixed-precision decimal so that normalising a mention's scores
/// by their sum stays exact.
pub type Compatibility = Decimal;

/// Sparse TF-IDF vector: term -> weight, in term order.
pub type TermVector = BTreeMap<String, f64>;

// ============================================================================
// Entity identifiers
// ============================================================================

/// Identifier of a knowledge-base entity (an article of the catalogue).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub u32);

impl EntityId {
    /// Raw numeric id.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl From<u32> for EntityId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}", self.0)
    }
}

// ============================================================================
// Tokens and n-grams
// ============================================================================

/// A single normalized (lowercased) token of the input text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Token {
    /// Lowercased token text.
    pub text: String,
    /// Character offset in the original text.
    pub offset: usize,
    /// Length in characters of the original (un-lowercased) token.
    pub length: usize,
}

impl Token {
    /// Create a token from its raw surface form; the stored text is lowercased.
    #[must_use]
    pub fn new(raw: &str, offset: usize) -> Self {
        Self {
            text: raw.to_lowercase(),
            offset,
            length: raw.chars().count(),
        }
    }

    /// Character offset one past the end of the token.
    #[must_use]
    pub fn end(&self) -> usize {
        self.offset + self.length
    }
}

/// A contiguous run of tokens with its span in the original text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ngram {
    /// Tokens joined by single spaces.
    pub normalized: String,
    /// The exact substring of the original text covered by the span.
    pub original: String,
    /// Character offset of the first token.
    pub offset: usize,
    /// Character length from the first token's start to the last token's end.
    pub length: usize,
}

impl Ngram {
    /// Start an n-gram from a single token.
    #[must_use]
    pub fn from_token(token: &Token) -> Self {
        Self {
            normalized: token.text.clone(),
            original: String::new(),
            offset: token.offset,
            length: token.length,
        }
    }

    /// Extend the n-gram by one token to the right.
    pub fn append(&mut self, token: &Token) {
        self.normalized.push(' ');
        self.normalized.push_str(&token.text);
        self.length = token.end() - self.offset;
    }

    /// Number of tokens in the n-gram.
    #[must_use]
    pub fn token_count(&self) -> usize {
        self.normalized.split(' ').count()
    }
}

// ============================================================================
// Mentions
// ============================================================================

/// A candidate textual span proposed as referring to a knowledge-base entity.
///
/// Identity is `(normalized, offset, length)`: two mentions with the same
/// surface at the same position are the same mention regardless of their
/// scores.
///
/// Candidates are kept in a `BTreeMap`, so iteration is in ascending entity
/// id order. Arg-max selections that only replace on a strictly greater score
/// therefore break ties towards the lowest id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mention {
    /// Normalized n-gram used as the Candidate Index key.
    pub normalized: String,
    /// Unnormalized surface form as it appears in the text.
    pub original: String,
    /// Character offset in the original text.
    pub offset: usize,
    /// Character length in the original text.
    pub length: usize,
    /// `linked_docs / total_docs` for the surface form.
    pub keyphraseness: f64,
    /// Number of corpus documents containing the surface form.
    pub document_frequency: u64,
    candidates: BTreeMap<EntityId, Compatibility>,
    /// Prior used by the random walk; normalized to sum to 1 per document.
    pub importance: Decimal,
}

impl Mention {
    /// Create a mention from an n-gram, with no candidates yet.
    #[must_use]
    pub fn from_ngram(ngram: &Ngram) -> Self {
        Self {
            normalized: ngram.normalized.clone(),
            original: ngram.original.clone(),
            offset: ngram.offset,
            length: ngram.length,
            keyphraseness: 0.0,
            document_frequency: 0,
            candidates: BTreeMap::new(),
            importance: Decimal::ZERO,
        }
    }

    /// Create a bare mention; the original surface defaults to the normalized one.
    #[must_use]
    pub fn new(normalized: impl Into<String>, offset: usize, length: usize) -> Self {
        let normalized = normalized.into();
        Self {
            original: normalized.clone(),
            normalized,
            offset,
            length,
            keyphraseness: 0.0,
            document_frequency: 0,
            candidates: BTreeMap::new(),
            importance: Decimal::ZERO,
        }
    }

    /// Set the unnormalized surface form.
    #[must_use]
    pub fn with_original(mut self, original: impl Into<String>) -> Self {
        self.original = original.into();
        self
    }

    /// Add a candidate with its compatibility score.
    #[must_use]
    pub fn with_candidate(mut self, entity: EntityId, score: Compatibility) -> Self {
        self.candidates.insert(entity, score);
        self
    }

    /// Set the importance prior.
    #[must_use]
    pub fn with_importance(mut self, importance: Decimal) -> Self {
        self.importance = importance;
        self
    }

    /// Set (or overwrite) the compatibility score of a candidate.
    pub fn set_compatibility(&mut self, entity: EntityId, score: Compatibility) {
        self.candidates.insert(entity, score);
    }

    /// Compatibility score of a candidate, if it is one.
    #[must_use]
    pub fn compatibility(&self, entity: EntityId) -> Option<Compatibility> {
        self.candidates.get(&entity).copied()
    }

    /// Candidate entities and their scores, in ascending entity id order.
    pub fn candidates(&self) -> impl Iterator<Item = (EntityId, Compatibility)> + '_ {
        self.candidates.iter().map(|(e, s)| (*e, *s))
    }

    /// Candidate entity ids in ascending order.
    pub fn candidate_ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.candidates.keys().copied()
    }

    /// Number of candidate entities.
    #[must_use]
    pub fn candidate_count(&self) -> usize {
        self.candidates.len()
    }

    /// Whether the mention has the given candidate.
    #[must_use]
    pub fn has_candidate(&self, entity: EntityId) -> bool {
        self.candidates.contains_key(&entity)
    }

    /// Sum of compatibility scores over all candidates.
    #[must_use]
    pub fn total_compatibility(&self) -> Compatibility {
        self.candidates.values().copied().sum()
    }

    /// True when every candidate has zero compatibility (or there are none).
    #[must_use]
    pub fn has_zero_compatibility_mass(&self) -> bool {
        self.total_compatibility().is_zero()
    }

    /// Character span `(offset, offset + length)`.
    #[must_use]
    pub fn span(&self) -> (usize, usize) {
        (self.offset, self.offset + self.length)
    }
}

impl PartialEq for Mention {
    fn eq(&self, other: &Self) -> bool {
        self.normalized == other.normalized
            && self.offset == other.offset
            && self.length == other.length
    }
}

impl Eq for Mention {}

impl Hash for Mention {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.normalized.hash(state);
        self.offset.hash(state);
        self.length.hash(state);
    }
}

impl fmt::Display for Mention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?}@{}+{} ({} candidates, keyphraseness {:.4})",
            self.original,
            self.offset,
            self.length,
            self.candidates.len(),
            self.keyphraseness
        )
    }
}

// ============================================================================
// Candidate Index entries
// ============================================================================

/// What the Candidate Index knows about a surface form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateEntry {
    /// Documents in which the surface form appears as a link.
    pub linked_docs: u64,
    /// Documents in which the surface form appears at all.
    pub total_docs: u64,
    /// Candidate entities with the number of times the form links to each.
    pub candidates: Vec<(EntityId, u32)>,
}

impl CandidateEntry {
    /// Create an entry.
    #[must_use]
    pub fn new(linked_docs: u64, total_docs: u64, candidates: Vec<(EntityId, u32)>) -> Self {
        Self {
            linked_docs,
            total_docs,
            candidates,
        }
    }

    /// Fraction of the form's occurrences that are hyperlinked.
    ///
    /// Returns 0.0 when `total_docs` is zero.
    #[must_use]
    pub fn keyphraseness(&self) -> f64 {
        if self.total_docs == 0 {
            0.0
        } else {
            self.linked_docs as f64 / self.total_docs as f64
        }
    }

    /// Candidate entity ids, in index order.
    pub fn entity_ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.candidates.iter().map(|(e, _)| *e)
    }

    /// Number of candidates.
    #[must_use]
    pub fn candidate_count(&self) -> usize {
        self.candidates.len()
    }

    /// Total link frequency across candidates.
    #[must_use]
    pub fn total_frequency(&self) -> u64 {
        self.candidates.iter().map(|(_, f)| u64::from(*f)).sum()
    }

    /// Link frequency of a candidate (0 if it is not one).
    #[must_use]
    pub fn frequency(&self, entity: EntityId) -> u32 {
        self.candidates
            .iter()
            .find(|(e, _)| *e == entity)
            .map_or(0, |(_, f)| *f)
    }

    /// `frequency(entity) / total_frequency`, or 0.0 when nothing is linked.
    #[must_use]
    pub fn candidate_probability(&self, entity: EntityId) -> f64 {
        let total = self.total_frequency();
        if total == 0 {
            return 0.0;
        }
        f64::from(self.frequency(entity)) / total as f64
    }

    /// Most frequently linked candidate; ties go to the lowest entity id.
    #[must_use]
    pub fn most_frequent(&self) -> Option<EntityId> {
        self.candidates
            .iter()
            .max_by(|(ea, fa), (eb, fb)| fa.cmp(fb).then_with(|| eb.cmp(ea)))
            .map(|(e, _)| *e)
    }
}
