//! # referent
//!
//! Collective named-entity disambiguation for Rust.
//!
//! Given a document and a knowledge base of entities, `referent` finds the
//! spans that look like links, proposes candidate entities for each, and
//! resolves all of them jointly so that mutually related entities reinforce
//! each other.
//!
//! - **Extraction**: tokenization, n-grams, keyphraseness pruning, local
//!   compatibility (TF-IDF cosine) and importance priors
//! - **Referent graph**: mention and candidate vertices, compatibility and
//!   relatedness edges
//! - **Inference**: personalized PageRank, or loopy belief propagation with a
//!   Basic, Full or MaxEnt scorer
//! - **Baseline**: most frequently linked candidate
//!
//! ## Quick Start
//!
//! ```rust
//! use referent::{
//!     Algorithm, CandidateEntry, DisambiguationConfig, Disambiguator, EntityId,
//!     InMemoryIndex, KnowledgeBase,
//! };
//!
//! let index = InMemoryIndex::new()
//!     .with_candidates("apollo", CandidateEntry::new(8, 10, vec![(EntityId(1), 3)]))
//!     .with_vector(EntityId(1), [("apollo", 1.0), ("moon", 0.5)]);
//! let kb = KnowledgeBase::in_memory(index);
//!
//! let disambiguator = Disambiguator::new(kb, DisambiguationConfig::default());
//! let assignments = disambiguator.disambiguate("Apollo went to the Moon.", Algorithm::RandomWalk)?;
//! assert_eq!(assignments[0].entity, Some(EntityId(1)));
//! # Ok::<(), referent::Error>(())
//! ```
//!
//! ## Algorithms
//!
//! | Algorithm | Evidence | Iterative |
//! |-----------|----------|-----------|
//! | `RandomWalk` | compatibility, relatedness, importance | yes |
//! | `LoopyBelief(Basic)` | compatibility, relatedness | yes |
//! | `LoopyBelief(Full)` | compatibility, popularity, candidate probability, cocitation | yes |
//! | `LoopyBelief(MaxEnt)` | popularity, cocitation | yes |
//! | `MostFrequent` | anchor frequency | no |
//!
//! ## Numeric domains
//!
//! Compatibility scores, priors and graph edge weights are
//! [`rust_decimal::Decimal`] so that normalized weights sum to exactly one.
//! Log-domain messages, relatedness and ranks are `f64`.
//!
//! ## Concurrency
//!
//! A [`Disambiguator`] is `Send + Sync` and keeps no per-document state;
//! share it across threads to process documents in parallel.

#![warn(missing_docs)]

pub mod baseline;
pub mod belief;
pub mod config;
pub mod diagnostics;
pub mod extract;
pub mod graph;
pub mod pipeline;
pub mod similarity;
pub mod solution;
pub mod walk;

// Re-exports for convenience
pub use belief::{LoopyBeliefPropagation, Scorer, ScorerKind};
pub use config::{
    BeliefConfig, CorpusStats, DisambiguationConfig, ExtractionConfig, GraphConfig,
    MentionSelection, WalkConfig,
};
pub use diagnostics::Diagnostic;
pub use extract::MentionExtractor;
pub use graph::{GraphBuilder, ReferentGraph};
pub use pipeline::{Algorithm, DisambiguationReport, Disambiguator, RunOutcome};
pub use referent_core::{
    CandidateEntry, CandidateIndex, Compatibility, EntityId, EntityRelatednessIndex,
    EntityVectorIndex, Error, InMemoryIndex, KnowledgeBase, Mention, Ngram, Result, TermFrequencyIndex,
    TermVector, Token,
};
pub use solution::Assignment;
pub use walk::RandomWalkRanker;

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_disambiguator_is_send_sync() {
        assert_send_sync::<Disambiguator>();
        assert_send_sync::<KnowledgeBase>();
        assert_send_sync::<Scorer>();
    }
}
