//! End-to-end disambiguation of one document.
//!
//! ```text
//! text ─► MentionExtractor ─► mentions ─┬─► GraphBuilder ─► RandomWalkRanker ─┐
//!                                       ├─► Scorer ─► LoopyBeliefPropagation ─┼─► assignments
//!                                       └─► MostFrequent ─────────────────────┘
//! ```
//!
//! A [`Disambiguator`] holds only shared read-only state. Every call builds
//! its own graph, caches and messages, so distinct documents can be
//! disambiguated concurrently from one instance.

use crate::baseline::MostFrequent;
use crate::belief::{LoopyBeliefPropagation, Scorer, ScorerKind};
use crate::config::DisambiguationConfig;
use crate::diagnostics::Diagnostic;
use crate::extract::MentionExtractor;
use crate::graph::GraphBuilder;
use crate::solution::Assignment;
use crate::walk::RandomWalkRanker;
use referent_core::{KnowledgeBase, Mention, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Collective inference algorithm.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    /// Personalized PageRank over the referent graph.
    #[default]
    RandomWalk,
    /// Max-product loopy belief propagation with the given scorer.
    LoopyBelief(ScorerKind),
    /// Most frequently linked candidate, no inference.
    MostFrequent,
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RandomWalk => write!(f, "random-walk"),
            Self::LoopyBelief(kind) => write!(f, "lbp-{kind}"),
            Self::MostFrequent => write!(f, "most-frequent"),
        }
    }
}

/// How the inference step ended.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome {
    /// Algorithm that produced the assignments.
    pub algorithm: Algorithm,
    /// Iterations or sweeps performed (0 for the baseline).
    pub iterations: usize,
    /// False only when an iteration cap was hit.
    pub converged: bool,
}

/// Everything one call produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisambiguationReport {
    /// Selected mentions, in text order.
    pub mentions: Vec<Mention>,
    /// One assignment per mention, in the same order.
    pub assignments: Vec<Assignment>,
    /// Soft failures observed along the way.
    pub diagnostics: Vec<Diagnostic>,
    /// Inference outcome.
    pub outcome: RunOutcome,
}

/// Disambiguates documents against a knowledge base.
///
/// # Example
///
/// ```rust
/// use referent::{Algorithm, DisambiguationConfig, Disambiguator, InMemoryIndex, KnowledgeBase};
///
/// let kb = KnowledgeBase::in_memory(InMemoryIndex::new());
/// let disambiguator = Disambiguator::new(kb, DisambiguationConfig::default());
/// let assignments = disambiguator.disambiguate("Nothing to link here.", Algorithm::RandomWalk)?;
/// assert!(assignments.is_empty());
/// # Ok::<(), referent::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct Disambiguator {
    kb: KnowledgeBase,
    config: DisambiguationConfig,
    extractor: MentionExtractor,
}

impl Disambiguator {
    /// Create a disambiguator.
    pub fn new(kb: KnowledgeBase, config: DisambiguationConfig) -> Self {
        let extractor = MentionExtractor::new(kb.clone(), config.extraction.clone(), config.corpus);
        Self {
            kb,
            config,
            extractor,
        }
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &DisambiguationConfig {
        &self.config
    }

    /// The mention extractor.
    #[must_use]
    pub fn extractor(&self) -> &MentionExtractor {
        &self.extractor
    }

    /// Resolve every mention of `text` to an entity.
    ///
    /// Only lookup-service failures are errors.
    pub fn disambiguate(&self, text: &str, algorithm: Algorithm) -> Result<Vec<Assignment>> {
        Ok(self.disambiguate_with_report(text, algorithm)?.assignments)
    }

    /// Like [`Self::disambiguate`], also returning mentions, diagnostics and
    /// the inference outcome.
    pub fn disambiguate_with_report(
        &self,
        text: &str,
        algorithm: Algorithm,
    ) -> Result<DisambiguationReport> {
        let extraction = self.extractor.extract(text)?;
        let mut report = self.disambiguate_mentions(extraction.mentions, algorithm)?;
        let mut diagnostics = extraction.diagnostics;
        diagnostics.append(&mut report.diagnostics);
        report.diagnostics = diagnostics;
        Ok(report)
    }

    /// Run inference on mentions produced elsewhere.
    ///
    /// Mentions must already carry compatibility and importance.
    pub fn disambiguate_mentions(
        &self,
        mentions: Vec<Mention>,
        algorithm: Algorithm,
    ) -> Result<DisambiguationReport> {
        let mut diagnostics = Vec::new();
        let (assignments, iterations, converged) = match algorithm {
            Algorithm::RandomWalk => {
                let graph = GraphBuilder::new(
                    self.kb.links.as_ref(),
                    self.config.graph,
                    self.config.corpus.article_count,
                )
                .build(&mentions)?;
                diagnostics.extend(graph.verify(self.config.graph.invariant_tolerance));

                let ranker = RandomWalkRanker::new(self.config.walk);
                let result = ranker.rank(&graph);
                diagnostics.extend(ranker.verify(&result));
                let assignments = ranker.solution(&graph, &mentions, &result);
                (assignments, result.iterations(), result.converged())
            }
            Algorithm::LoopyBelief(kind) => {
                let scorer = Scorer::new(
                    kind,
                    &mentions,
                    &self.kb,
                    &self.config.belief,
                    &self.config.corpus,
                )?;
                let engine = LoopyBeliefPropagation::new(scorer, self.config.belief);
                let (assignments, result) = engine.solve(&mentions);
                diagnostics.extend(result.diagnostic());
                (assignments, result.state.iterations(), result.converged())
            }
            Algorithm::MostFrequent => {
                let assignments = MostFrequent::new(self.kb.candidates.as_ref()).solve(&mentions)?;
                (assignments, 0, true)
            }
        };

        log::info!(
            "Disambiguated {} mentions with {algorithm}: {} assigned, {} iterations{}",
            mentions.len(),
            assignments.iter().filter(|a| a.entity.is_some()).count(),
            iterations,
            if converged { "" } else { " (cap reached)" }
        );
        for assignment in &assignments {
            log::debug!("{assignment}");
        }

        Ok(DisambiguationReport {
            mentions,
            assignments,
            diagnostics,
            outcome: RunOutcome {
                algorithm,
                iterations,
                converged,
            },
        })
    }
}
