//! Soft failures observed while disambiguating a document.
//!
//! None of these abort a run. Each is logged at `warn` when it is recorded
//! and returned to the caller in the run report.

use referent_core::EntityId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A numeric drift, pruning decision or non-convergence event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Diagnostic {
    /// A surface form had more candidates than the configured cap.
    CandidatesSkipped {
        /// Normalized surface form.
        surface: String,
        /// Number of candidates it had.
        candidates: usize,
    },
    /// Priors over all graph vertices do not sum to 1.
    PriorSumDrift {
        /// Observed sum.
        sum: Decimal,
    },
    /// A vertex's outgoing edge weights do not sum to 1.
    OutWeightDrift {
        /// Mention index of the vertex.
        mention: usize,
        /// Entity of a candidate vertex, `None` for a mention vertex.
        entity: Option<EntityId>,
        /// Observed sum.
        sum: Decimal,
    },
    /// Stationary scores do not sum to 1.
    RankSumDrift {
        /// Observed sum.
        sum: f64,
    },
    /// A stationary score fell outside `[0, 1]`.
    RankOutOfRange {
        /// Vertex index in the referent graph.
        vertex: usize,
        /// Offending score.
        score: f64,
    },
    /// An iterative algorithm stopped at its cap without converging.
    IterationCapReached {
        /// Which algorithm.
        algorithm: String,
        /// Iterations performed.
        iterations: usize,
        /// Last observed change.
        delta: f64,
    },
}

impl Diagnostic {
    /// Log the diagnostic and hand it back.
    pub fn emit(self) -> Self {
        log::warn!("{self}");
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CandidatesSkipped {
                surface,
                candidates,
            } => write!(f, "skipped {surface:?}: {candidates} candidates"),
            Self::PriorSumDrift { sum } => write!(f, "vertex priors sum to {sum}, expected 1"),
            Self::OutWeightDrift {
                mention,
                entity: Some(entity),
                sum,
            } => write!(
                f,
                "candidate vertex ({mention}, {entity}) out-weights sum to {sum}, expected 1"
            ),
            Self::OutWeightDrift {
                mention,
                entity: None,
                sum,
            } => write!(
                f,
                "mention vertex {mention} out-weights sum to {sum}, expected 1"
            ),
            Self::RankSumDrift { sum } => {
                write!(f, "stationary scores sum to {sum}, expected 1")
            }
            Self::RankOutOfRange { vertex, score } => {
                write!(f, "stationary score {score} of vertex {vertex} outside [0, 1]")
            }
            Self::IterationCapReached {
                algorithm,
                iterations,
                delta,
            } => write!(
                f,
                "{algorithm} stopped after {iterations} iterations without converging (delta {delta})"
            ),
        }
    }
}
