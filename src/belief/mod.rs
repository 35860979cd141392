//! Loopy belief propagation for collective disambiguation.
//!
//! Max-product message passing in log space over the complete graph of
//! mentions. One sweep visits every ordered pair of distinct mentions:
//!
//! ```text
//! m'(from → to, eTo) = max_{eFrom} pair_score(from, to, eFrom, eTo, m)
//! ```
//!
//! after which each `(from, to)` batch is shifted so its maximum is exactly
//! zero. The aggregate score of a candidate is its local evidence plus all
//! incoming messages; a run converges when no aggregate score moves by more
//! than the tolerance between two sweeps.
//!
//! # States
//!
//! ```text
//! Initialized ──sweep──► Iterating ──sweep──► Converged
//!                          │  ▲
//!                          └──┘ (delta ≥ tolerance)
//!                          │
//!                          └──cap reached──► IterationCapReached
//! ```
//!
//! Reaching the cap is not an error: the latest messages still yield a
//! solution.

mod messages;
mod scorer;

pub use messages::{CandidateLayout, MessagesMap};
pub use scorer::{BasicScorer, CocitationCache, FullScorer, MaxEntScorer, Scorer, ScorerKind};

use crate::config::BeliefConfig;
use crate::diagnostics::Diagnostic;
use crate::solution::Assignment;
use referent_core::Mention;
use serde::{Deserialize, Serialize};

/// Where a run is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BeliefState {
    /// All messages at zero; no sweep performed.
    Initialized,
    /// At least one sweep done, not yet stopped.
    Iterating {
        /// Sweeps performed so far.
        iteration: usize,
        /// Largest aggregate-score change of the last sweep.
        delta: f64,
    },
    /// Aggregate scores stopped moving.
    Converged {
        /// Sweeps performed.
        iterations: usize,
        /// Final change.
        delta: f64,
    },
    /// The sweep cap was hit first.
    IterationCapReached {
        /// Sweeps performed.
        iterations: usize,
        /// Last observed change.
        delta: f64,
    },
}

impl BeliefState {
    /// Whether no further sweep will run.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Converged { .. } | Self::IterationCapReached { .. }
        )
    }

    /// Sweeps performed.
    #[must_use]
    pub fn iterations(&self) -> usize {
        match self {
            Self::Initialized => 0,
            Self::Iterating { iteration, .. } => *iteration,
            Self::Converged { iterations, .. } | Self::IterationCapReached { iterations, .. } => {
                *iterations
            }
        }
    }
}

/// Final state and scores of a finished run.
#[derive(Debug, Clone)]
pub struct BeliefResult {
    /// `Converged` or `IterationCapReached`.
    pub state: BeliefState,
    /// Aggregate score per candidate slot.
    pub scores: Vec<f64>,
    /// Messages of the last sweep.
    pub messages: MessagesMap,
}

impl BeliefResult {
    /// Whether the run converged.
    #[must_use]
    pub fn converged(&self) -> bool {
        matches!(self.state, BeliefState::Converged { .. })
    }

    /// Cap diagnostic, if the run did not converge.
    #[must_use]
    pub fn diagnostic(&self) -> Option<Diagnostic> {
        match self.state {
            BeliefState::IterationCapReached { iterations, delta } => Some(
                Diagnostic::IterationCapReached {
                    algorithm: "loopy belief propagation".to_string(),
                    iterations,
                    delta,
                }
                .emit(),
            ),
            _ => None,
        }
    }
}

/// Shift a message batch so its maximum is exactly zero.
///
/// Empty batches and batches without a finite maximum are left alone.
pub fn normalize_batch(batch: &mut [f64]) {
    let max = batch.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return;
    }
    for value in batch.iter_mut() {
        *value -= max;
    }
}

// =============================================================================
// Engine
// =============================================================================

/// Loopy belief propagation over one document, with a fixed scorer.
#[derive(Debug, Clone)]
pub struct LoopyBeliefPropagation {
    scorer: Scorer,
    config: BeliefConfig,
}

impl LoopyBeliefPropagation {
    /// Create an engine; the scorer decides the strategy for the whole run.
    #[must_use]
    pub fn new(scorer: Scorer, config: BeliefConfig) -> Self {
        Self { scorer, config }
    }

    /// The scorer in use.
    #[must_use]
    pub fn scorer(&self) -> &Scorer {
        &self.scorer
    }

    /// Start a run with every message at zero.
    #[must_use]
    pub fn initialize(&self) -> BeliefRun<'_> {
        BeliefRun {
            engine: self,
            state: BeliefState::Initialized,
            messages: MessagesMap::new(self.scorer.layout()),
            scores: Vec::new(),
        }
    }

    /// Sweep until convergence or the cap.
    #[must_use]
    pub fn run(&self) -> BeliefResult {
        let layout = self.scorer.layout();
        log::debug!(
            "Loopy belief propagation: {} mentions, {} candidates, scorer {}, cap {}",
            layout.mention_count(),
            layout.slot_count(),
            self.scorer.kind(),
            self.config.max_iterations
        );
        let mut run = self.initialize();
        while !run.state().is_terminal() {
            run.sweep();
        }
        let result = run.finish();
        log::info!(
            "Loopy belief propagation ({}): {:?}",
            self.scorer.kind(),
            result.state
        );
        result
    }

    /// Run to the end and pick the best candidate per mention.
    pub fn solve(&self, mentions: &[Mention]) -> (Vec<Assignment>, BeliefResult) {
        let result = self.run();
        let assignments = self.scorer.solution(mentions, &result.messages);
        (assignments, result)
    }
}

/// A run in progress.
#[derive(Debug)]
pub struct BeliefRun<'a> {
    engine: &'a LoopyBeliefPropagation,
    state: BeliefState,
    messages: MessagesMap,
    scores: Vec<f64>,
}

impl BeliefRun<'_> {
    /// Current state.
    #[must_use]
    pub fn state(&self) -> BeliefState {
        self.state
    }

    /// Messages of the last completed sweep.
    #[must_use]
    pub fn messages(&self) -> &MessagesMap {
        &self.messages
    }

    /// Perform one sweep and return the new state.
    ///
    /// A terminal run is left untouched.
    pub fn sweep(&mut self) -> BeliefState {
        if self.state.is_terminal() {
            return self.state;
        }
        let scorer = &self.engine.scorer;
        let config = &self.engine.config;
        let layout = scorer.layout();
        let m = layout.mention_count();
        let iteration = self.state.iterations() + 1;

        let mut next = MessagesMap::new(layout);
        for from in 0..m {
            let senders = layout.candidate_count(from);
            for to in 0..m {
                if from == to {
                    continue;
                }
                let batch = next.batch_mut(from, to);
                for (k_to, slot) in batch.iter_mut().enumerate() {
                    *slot = if senders == 0 {
                        0.0
                    } else {
                        (0..senders)
                            .map(|k_from| {
                                scorer.pair_score(from, to, k_from, k_to, &self.messages)
                            })
                            .fold(f64::NEG_INFINITY, f64::max)
                    };
                }
                normalize_batch(batch);
                log::trace!("messages {from} -> {to}: {batch:?}");
            }
        }
        next.seal();

        let scores = scorer.aggregate_scores(&next);
        let delta = if iteration == 1 {
            f64::INFINITY
        } else {
            scores
                .iter()
                .zip(&self.scores)
                .map(|(a, b)| (a - b).abs())
                .fold(0.0, f64::max)
        };
        self.messages = next;
        self.scores = scores;
        log::debug!("Sweep {iteration}: delta {delta:.3e}");

        self.state = if m < 2 || delta < config.tolerance {
            // Fewer than two mentions exchange no messages
            BeliefState::Converged {
                iterations: iteration,
                delta: if m < 2 { 0.0 } else { delta },
            }
        } else if iteration >= config.max_iterations {
            BeliefState::IterationCapReached {
                iterations: iteration,
                delta,
            }
        } else {
            BeliefState::Iterating { iteration, delta }
        };
        self.state
    }

    /// Consume the run.
    #[must_use]
    pub fn finish(self) -> BeliefResult {
        BeliefResult {
            state: self.state,
            scores: self.scores,
            messages: self.messages,
        }
    }
}
