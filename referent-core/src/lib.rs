//! # referent-core
//!
//! Core types for collective entity disambiguation: shared data structures and
//! the read-only lookup contracts the engine runs against.
//!
//! This crate provides:
//! - **Entity types**: `EntityId`, `Token`, `Ngram`, `Mention`, `CandidateEntry`
//! - **Lookup services**: `CandidateIndex`, `EntityRelatednessIndex`,
//!   `EntityVectorIndex`, `TermFrequencyIndex`, bundled as `KnowledgeBase`
//! - **In-memory backend**: `InMemoryIndex`, loadable from JSON
//!
//! The `referent` crate depends on `referent-core` so that alternative index
//! backends can be written without pulling in the inference engine.

pub mod entity;
pub mod error;
pub mod index;

// Re-exports for convenience
pub use entity::{CandidateEntry, Compatibility, EntityId, Mention, Ngram, TermVector, Token};
pub use error::{Error, Result};
pub use index::{
    CandidateIndex, EntityRelatednessIndex, EntityVectorIndex, InMemoryIndex, KnowledgeBase,
    TermFrequencyIndex,
};
