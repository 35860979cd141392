//! Read-only lookup services consumed by the disambiguation engine.
//!
//! The knowledge base is built offline from a Wikipedia dump; the engine only
//! needs four read contracts over it:
//!
//! | Service                  | Key        | Value                                   |
//! |--------------------------|------------|-----------------------------------------|
//! | [`CandidateIndex`]       | surface    | keyphraseness counts + candidate ids    |
//! | [`EntityRelatednessIndex`]| entity    | sorted inbound-link entity ids          |
//! | [`EntityVectorIndex`]    | entity     | TF-IDF term vector                      |
//! | [`TermFrequencyIndex`]   | term       | document frequency                      |
//!
//! All traits are `Send + Sync` so one knowledge base can serve many
//! documents concurrently. Every method returns [`Result`]: a failing backend
//! is fatal for the document being disambiguated.
//!
//! [`InMemoryIndex`] implements all four contracts and is what tests and
//! small deployments use.

use crate::entity::{CandidateEntry, EntityId, TermVector};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

/// Surface form -> keyphraseness counts and candidate entities.
pub trait CandidateIndex: Send + Sync {
    /// Look up a normalized n-gram. `Ok(None)` means the form is unknown.
    fn lookup(&self, normalized: &str) -> Result<Option<Cow<'_, CandidateEntry>>>;

    /// Check if the index contains this exact form.
    fn contains(&self, normalized: &str) -> Result<bool> {
        Ok(self.lookup(normalized)?.is_some())
    }
}

/// Entity -> sorted set of entities whose pages link to it.
pub trait EntityRelatednessIndex: Send + Sync {
    /// Sorted, deduplicated inlink ids. Unknown entities have no inlinks.
    fn inlinks(&self, entity: EntityId) -> Result<Cow<'_, [EntityId]>>;

    /// `1 + |inlinks(entity)|`; never zero.
    fn popularity(&self, entity: EntityId) -> Result<u64> {
        Ok(1 + self.inlinks(entity)?.len() as u64)
    }
}

/// Entity -> precomputed TF-IDF vector of its article.
pub trait EntityVectorIndex: Send + Sync {
    /// TF-IDF vector of the entity; empty for unknown entities.
    fn vector(&self, entity: EntityId) -> Result<Cow<'_, TermVector>>;
}

/// Term -> number of corpus documents containing it.
pub trait TermFrequencyIndex: Send + Sync {
    /// Raw (unsmoothed) document frequency, `None` if the term is unknown.
    ///
    /// Callers apply +1 smoothing.
    fn document_frequency(&self, term: &str) -> Result<Option<u64>>;
}

/// The four lookup services bundled for the engine.
///
/// Cheap to clone; all services are shared behind `Arc`.
#[derive(Clone)]
pub struct KnowledgeBase {
    /// Candidate Index.
    pub candidates: Arc<dyn CandidateIndex>,
    /// Entity Relatedness Index.
    pub links: Arc<dyn EntityRelatednessIndex>,
    /// Entity Vector Index.
    pub vectors: Arc<dyn EntityVectorIndex>,
    /// Term Frequency Index.
    pub terms: Arc<dyn TermFrequencyIndex>,
}

impl KnowledgeBase {
    /// Bundle four independent services.
    pub fn new(
        candidates: Arc<dyn CandidateIndex>,
        links: Arc<dyn EntityRelatednessIndex>,
        vectors: Arc<dyn EntityVectorIndex>,
        terms: Arc<dyn TermFrequencyIndex>,
    ) -> Self {
        Self {
            candidates,
            links,
            vectors,
            terms,
        }
    }

    /// Use one in-memory index for all four services.
    pub fn in_memory(index: InMemoryIndex) -> Self {
        let shared = Arc::new(index);
        Self {
            candidates: shared.clone(),
            links: shared.clone(),
            vectors: shared.clone(),
            terms: shared,
        }
    }
}

impl std::fmt::Debug for KnowledgeBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeBase").finish_non_exhaustive()
    }
}

// =============================================================================
// In-memory implementation
// =============================================================================

/// HashMap-backed implementation of every lookup service.
///
/// Suitable for tests and for knowledge bases that fit in memory. Inlink
/// lists are kept sorted and deduplicated so intersections can be merged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InMemoryIndex {
    #[serde(default)]
    candidates: HashMap<String, CandidateEntry>,
    #[serde(default)]
    inlinks: HashMap<EntityId, Vec<EntityId>>,
    #[serde(default)]
    vectors: HashMap<EntityId, TermVector>,
    #[serde(default)]
    document_frequencies: HashMap<String, u64>,
}

impl InMemoryIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a surface form.
    #[must_use]
    pub fn with_candidates(mut self, normalized: impl Into<String>, entry: CandidateEntry) -> Self {
        self.insert_candidates(normalized, entry);
        self
    }

    /// Register the inlinks of an entity.
    #[must_use]
    pub fn with_inlinks<I>(mut self, entity: EntityId, inlinks: I) -> Self
    where
        I: IntoIterator<Item = EntityId>,
    {
        self.insert_inlinks(entity, inlinks);
        self
    }

    /// Register the TF-IDF vector of an entity.
    #[must_use]
    pub fn with_vector<I, S>(mut self, entity: EntityId, weights: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        self.vectors
            .insert(entity, weights.into_iter().map(|(t, w)| (t.into(), w)).collect());
        self
    }

    /// Register the document frequency of a term.
    #[must_use]
    pub fn with_document_frequency(mut self, term: impl Into<String>, df: u64) -> Self {
        self.document_frequencies.insert(term.into(), df);
        self
    }

    /// Insert a surface form in place.
    pub fn insert_candidates(&mut self, normalized: impl Into<String>, entry: CandidateEntry) {
        self.candidates.insert(normalized.into(), entry);
    }

    /// Insert inlinks in place, sorting and deduplicating them.
    pub fn insert_inlinks<I>(&mut self, entity: EntityId, inlinks: I)
    where
        I: IntoIterator<Item = EntityId>,
    {
        let mut list: Vec<EntityId> = inlinks.into_iter().collect();
        list.sort_unstable();
        list.dedup();
        self.inlinks.insert(entity, list);
    }

    /// Number of known surface forms.
    #[must_use]
    pub fn surface_count(&self) -> usize {
        self.candidates.len()
    }

    /// Load an index from JSON.
    pub fn from_json_reader<R: Read>(reader: R) -> Result<Self> {
        let mut index: Self = serde_json::from_reader(reader)?;
        index.normalize_inlinks();
        Ok(index)
    }

    /// Load an index from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        let index = Self::from_json_reader(std::io::BufReader::new(file))?;
        log::info!(
            "Loaded knowledge base from {}: {} surface forms, {} linked entities",
            path.as_ref().display(),
            index.candidates.len(),
            index.inlinks.len()
        );
        Ok(index)
    }

    fn normalize_inlinks(&mut self) {
        for list in self.inlinks.values_mut() {
            list.sort_unstable();
            list.dedup();
        }
    }
}

impl CandidateIndex for InMemoryIndex {
    fn lookup(&self, normalized: &str) -> Result<Option<Cow<'_, CandidateEntry>>> {
        Ok(self.candidates.get(normalized).map(Cow::Borrowed))
    }
}

impl EntityRelatednessIndex for InMemoryIndex {
    fn inlinks(&self, entity: EntityId) -> Result<Cow<'_, [EntityId]>> {
        Ok(match self.inlinks.get(&entity) {
            Some(list) => Cow::Borrowed(list.as_slice()),
            None => Cow::Owned(Vec::new()),
        })
    }
}

impl EntityVectorIndex for InMemoryIndex {
    fn vector(&self, entity: EntityId) -> Result<Cow<'_, TermVector>> {
        Ok(match self.vectors.get(&entity) {
            Some(vector) => Cow::Borrowed(vector),
            None => Cow::Owned(TermVector::new()),
        })
    }
}

impl TermFrequencyIndex for InMemoryIndex {
    fn document_frequency(&self, term: &str) -> Result<Option<u64>> {
        Ok(self.document_frequencies.get(term).copied())
    }
}
