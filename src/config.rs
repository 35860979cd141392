//! Tunables for every stage of disambiguation.
//!
//! All constants of the engine live here and are passed to constructors
//! explicitly; nothing is read from global state. Every struct derives
//! `Serialize`/`Deserialize` with `#[serde(default)]`, so a JSON file only
//! needs to name the values it overrides:
//!
//! ```json
//! { "walk": { "alpha": 0.15 }, "belief": { "max_iterations": 40 } }
//! ```

use referent_core::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;

// =============================================================================
// Corpus statistics
// =============================================================================

/// Size constants of the corpus the knowledge base was built from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusStats {
    /// Number of documents the Term Frequency Index counted over (idf numerator).
    pub document_count: u64,
    /// Number of entity articles (relatedness and cocitation baseline).
    pub article_count: u64,
}

impl Default for CorpusStats {
    fn default() -> Self {
        Self {
            document_count: 4_532_295,
            article_count: 4_399_390,
        }
    }
}

// =============================================================================
// Extraction
// =============================================================================

/// How many scored mentions survive keyphraseness pruning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MentionSelection {
    /// Keep the best `max(1, ceil(tokens * fraction))` mentions.
    TopFraction(f64),
    /// Keep every mention whose keyphraseness is at least the value.
    Threshold(f64),
}

impl Default for MentionSelection {
    fn default() -> Self {
        Self::TopFraction(0.06)
    }
}

/// Configuration of the mention extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Longest n-gram, in tokens, looked up in the Candidate Index.
    pub max_ngram_len: usize,
    /// Pruning policy.
    pub selection: MentionSelection,
    /// Surface forms with more candidates than this are skipped.
    pub max_candidates: Option<usize>,
    /// Context window, in tokens, used for local compatibility.
    pub context_window: usize,
    /// Drop mentions whose candidates all score zero compatibility.
    pub drop_zero_compatibility: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_ngram_len: 11,
            selection: MentionSelection::default(),
            max_candidates: Some(2000),
            context_window: 50,
            drop_zero_compatibility: false,
        }
    }
}

impl ExtractionConfig {
    /// Set the longest n-gram length.
    #[must_use]
    pub fn with_max_ngram_len(mut self, len: usize) -> Self {
        self.max_ngram_len = len;
        self
    }

    /// Set the pruning policy.
    #[must_use]
    pub fn with_selection(mut self, selection: MentionSelection) -> Self {
        self.selection = selection;
        self
    }

    /// Set (or lift, with `None`) the candidate cap.
    #[must_use]
    pub fn with_max_candidates(mut self, cap: Option<usize>) -> Self {
        self.max_candidates = cap;
        self
    }

    /// Set the context window size.
    #[must_use]
    pub fn with_context_window(mut self, window: usize) -> Self {
        self.context_window = window;
        self
    }

    /// Enable or disable zero-compatibility pruning.
    #[must_use]
    pub fn with_drop_zero_compatibility(mut self, drop: bool) -> Self {
        self.drop_zero_compatibility = drop;
        self
    }
}

// =============================================================================
// Graph
// =============================================================================

/// Configuration of the referent graph builder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Entity-entity edges with relatedness at or below this are omitted.
    pub relatedness_epsilon: f64,
    /// Relatedness is memoized only below this many candidate vertices.
    pub cache_vertex_limit: usize,
    /// Allowed drift when checking prior and out-weight sums.
    pub invariant_tolerance: f64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            relatedness_epsilon: 1e-5,
            cache_vertex_limit: 18_000,
            invariant_tolerance: 1e-5,
        }
    }
}

impl GraphConfig {
    /// Set the relatedness cutoff.
    #[must_use]
    pub fn with_relatedness_epsilon(mut self, epsilon: f64) -> Self {
        self.relatedness_epsilon = epsilon;
        self
    }

    /// Set the vertex count below which relatedness is cached.
    #[must_use]
    pub fn with_cache_vertex_limit(mut self, limit: usize) -> Self {
        self.cache_vertex_limit = limit;
        self
    }
}

// =============================================================================
// Random walk
// =============================================================================

/// Configuration of the personalized PageRank ranker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkConfig {
    /// Teleport probability back to the prior vector.
    pub alpha: f64,
    /// L1 change between iterations below which the walk has converged.
    pub tolerance: f64,
    /// Hard cap on power iterations.
    pub max_iterations: usize,
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            alpha: 0.1,
            tolerance: 1e-5,
            max_iterations: 1000,
        }
    }
}

impl WalkConfig {
    /// Set the teleport probability.
    #[must_use]
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Set the convergence tolerance.
    #[must_use]
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Set the iteration cap.
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }
}

// =============================================================================
// Loopy belief propagation
// =============================================================================

/// Parameters of the Basic scorer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BasicParams {
    /// Weight of the relatedness term.
    pub beta: f64,
}

impl Default for BasicParams {
    fn default() -> Self {
        Self { beta: 1.0 }
    }
}

/// Parameters of a cocitation log-odds term.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CocitationParams {
    /// Added to the cocitation count before taking its log.
    pub smoothing: f64,
    /// Cocitation counts at or below this use the fallback.
    pub threshold: u64,
    /// Log-odds value used for weak or anti-correlated pairs.
    pub fallback: f64,
}

impl CocitationParams {
    /// Defaults of the Full scorer.
    #[must_use]
    pub fn full() -> Self {
        Self {
            smoothing: 1e-10,
            threshold: 0,
            fallback: 1e-10_f64.ln(),
        }
    }

    /// Defaults of the MaxEnt scorer for a corpus of `article_count` articles.
    #[must_use]
    pub fn max_ent(article_count: u64) -> Self {
        Self {
            smoothing: 1e-7,
            threshold: 0,
            fallback: -(article_count.max(1) as f64).ln(),
        }
    }
}

impl Default for CocitationParams {
    fn default() -> Self {
        Self::full()
    }
}

/// Fields of a JSON `max_ent` section; absent ones keep the MaxEnt defaults.
#[derive(Deserialize)]
struct CocitationOverrides {
    smoothing: Option<f64>,
    threshold: Option<u64>,
    fallback: Option<f64>,
}

fn max_ent_params<'de, D>(deserializer: D) -> std::result::Result<CocitationParams, D::Error>
where
    D: Deserializer<'de>,
{
    let overrides = CocitationOverrides::deserialize(deserializer)?;
    let base = CocitationParams::max_ent(CorpusStats::default().article_count);
    Ok(CocitationParams {
        smoothing: overrides.smoothing.unwrap_or(base.smoothing),
        threshold: overrides.threshold.unwrap_or(base.threshold),
        fallback: overrides.fallback.unwrap_or(base.fallback),
    })
}

/// Configuration of the loopy belief propagation engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BeliefConfig {
    /// Sweep cap; reaching it is reported, not an error.
    pub max_iterations: usize,
    /// Largest aggregate-score change below which the engine has converged.
    pub tolerance: f64,
    /// Basic scorer parameters.
    pub basic: BasicParams,
    /// Full scorer parameters.
    pub full: CocitationParams,
    /// MaxEnt scorer parameters.
    #[serde(deserialize_with = "max_ent_params")]
    pub max_ent: CocitationParams,
}

impl Default for BeliefConfig {
    fn default() -> Self {
        Self {
            max_iterations: 75,
            tolerance: 1e-5,
            basic: BasicParams::default(),
            full: CocitationParams::full(),
            max_ent: CocitationParams::max_ent(CorpusStats::default().article_count),
        }
    }
}

impl BeliefConfig {
    /// Set the sweep cap.
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the convergence tolerance.
    #[must_use]
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Set the Basic scorer's relatedness weight.
    #[must_use]
    pub fn with_beta(mut self, beta: f64) -> Self {
        self.basic.beta = beta;
        self
    }
}

// =============================================================================
// Aggregate
// =============================================================================

/// Everything a [`crate::Disambiguator`] needs besides its knowledge base.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DisambiguationConfig {
    /// Corpus size constants.
    pub corpus: CorpusStats,
    /// Mention extraction.
    pub extraction: ExtractionConfig,
    /// Referent graph construction.
    pub graph: GraphConfig,
    /// Random-walk ranking.
    pub walk: WalkConfig,
    /// Loopy belief propagation.
    pub belief: BeliefConfig,
}

impl DisambiguationConfig {
    /// Parse a (possibly partial) JSON configuration.
    ///
    /// Unless the MaxEnt fallback is given explicitly, it follows the
    /// configured article count.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let explicit_fallback = value.pointer("/belief/max_ent/fallback").is_some();
        let mut config: Self = serde_json::from_value(value)?;
        if !explicit_fallback {
            config.belief.max_ent.fallback =
                CocitationParams::max_ent(config.corpus.article_count).fallback;
        }
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Reject values no stage can work with.
    pub fn validate(&self) -> Result<()> {
        if self.extraction.max_ngram_len == 0 {
            return Err(Error::config("max_ngram_len must be at least 1"));
        }
        if self.extraction.context_window == 0 {
            return Err(Error::config("context_window must be at least 1"));
        }
        match self.extraction.selection {
            MentionSelection::TopFraction(f) if !(f > 0.0 && f <= 1.0) => {
                return Err(Error::config(format!(
                    "top fraction must be in (0, 1], got {f}"
                )));
            }
            MentionSelection::Threshold(t) if !t.is_finite() => {
                return Err(Error::config("keyphraseness threshold must be finite"));
            }
            _ => {}
        }
        if !(self.walk.alpha > 0.0 && self.walk.alpha <= 1.0) {
            return Err(Error::config(format!(
                "walk alpha must be in (0, 1], got {}",
                self.walk.alpha
            )));
        }
        if self.walk.max_iterations == 0 || self.belief.max_iterations == 0 {
            return Err(Error::config("iteration caps must be at least 1"));
        }
        if self.corpus.document_count == 0 || self.corpus.article_count == 0 {
            return Err(Error::config("corpus sizes must be positive"));
        }
        Ok(())
    }

    /// Set the corpus statistics, keeping the MaxEnt fallback consistent.
    #[must_use]
    pub fn with_corpus(mut self, corpus: CorpusStats) -> Self {
        self.corpus = corpus;
        self.belief.max_ent.fallback = CocitationParams::max_ent(corpus.article_count).fallback;
        self
    }

    /// Set the extraction configuration.
    #[must_use]
    pub fn with_extraction(mut self, extraction: ExtractionConfig) -> Self {
        self.extraction = extraction;
        self
    }

    /// Set the graph configuration.
    #[must_use]
    pub fn with_graph(mut self, graph: GraphConfig) -> Self {
        self.graph = graph;
        self
    }

    /// Set the random-walk configuration.
    #[must_use]
    pub fn with_walk(mut self, walk: WalkConfig) -> Self {
        self.walk = walk;
        self
    }

    /// Set the belief propagation configuration.
    #[must_use]
    pub fn with_belief(mut self, belief: BeliefConfig) -> Self {
        self.belief = belief;
        self
    }
}
