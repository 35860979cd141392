//! Personalized PageRank over the referent graph.
//!
//! # Update
//!
//! ```text
//! r'(v) = α·p(v) + (1 - α)·( Σ_{u→v} r(u)·w(u,v) + D·p(v) )
//! ```
//!
//! where `p` is the prior (importance) vector, `α` the teleport probability
//! and `D` the rank mass sitting on dangling vertices. Dangling mass is sent
//! back through the prior instead of being dropped, so `Σ r = 1` holds at
//! every iteration when the out-weights are normalized.
//!
//! Iteration stops when the L1 change drops below the tolerance or at the
//! iteration cap.

use crate::config::WalkConfig;
use crate::diagnostics::Diagnostic;
use crate::graph::ReferentGraph;
use crate::solution::{select_best, Assignment};
use petgraph::graph::NodeIndex;
use referent_core::Mention;
use rust_decimal::prelude::ToPrimitive;

/// Stationary scores of one walk.
#[derive(Debug, Clone, PartialEq)]
pub struct WalkResult {
    scores: Vec<f64>,
    iterations: usize,
    converged: bool,
    delta: f64,
}

impl WalkResult {
    /// Score of a vertex (0.0 for unknown vertices).
    #[must_use]
    pub fn score(&self, node: NodeIndex) -> f64 {
        self.scores.get(node.index()).copied().unwrap_or(0.0)
    }

    /// All scores, indexed by `NodeIndex::index()`.
    #[must_use]
    pub fn scores(&self) -> &[f64] {
        &self.scores
    }

    /// Power iterations performed.
    #[must_use]
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Whether the L1 change fell below the tolerance.
    #[must_use]
    pub fn converged(&self) -> bool {
        self.converged
    }

    /// L1 change of the last iteration.
    #[must_use]
    pub fn delta(&self) -> f64 {
        self.delta
    }
}

/// Random-walk ranker with priors.
#[derive(Debug, Clone, Default)]
pub struct RandomWalkRanker {
    config: WalkConfig,
}

impl RandomWalkRanker {
    /// Create a ranker.
    #[must_use]
    pub fn new(config: WalkConfig) -> Self {
        Self { config }
    }

    /// Compute stationary scores.
    #[must_use]
    pub fn rank(&self, graph: &ReferentGraph) -> WalkResult {
        let n = graph.vertex_count();
        if n == 0 {
            return WalkResult {
                scores: Vec::new(),
                iterations: 0,
                converged: true,
                delta: 0.0,
            };
        }

        let prior = teleport_vector(graph);
        let adjacency: Vec<Vec<(usize, f64)>> = graph
            .graph()
            .node_indices()
            .map(|u| {
                graph
                    .out_edges(u)
                    .map(|(v, w)| (v.index(), w.to_f64().unwrap_or(0.0)))
                    .collect()
            })
            .collect();

        let alpha = self.config.alpha;
        let mut rank = prior.clone();
        let mut next = vec![0.0; n];
        let mut iterations = 0;
        let mut delta = f64::INFINITY;

        while iterations < self.config.max_iterations {
            iterations += 1;

            let dangling: f64 = adjacency
                .iter()
                .zip(&rank)
                .filter(|(edges, _)| edges.is_empty())
                .map(|(_, r)| r)
                .sum();
            let teleport = alpha + (1.0 - alpha) * dangling;
            for (slot, p) in next.iter_mut().zip(&prior) {
                *slot = teleport * p;
            }
            for (u, edges) in adjacency.iter().enumerate() {
                let mass = (1.0 - alpha) * rank[u];
                for &(v, w) in edges {
                    next[v] += mass * w;
                }
            }

            delta = next.iter().zip(&rank).map(|(a, b)| (a - b).abs()).sum();
            std::mem::swap(&mut rank, &mut next);
            log::debug!("Random walk iteration {iterations}: delta {delta:.3e}");
            if delta < self.config.tolerance {
                break;
            }
        }

        let converged = delta < self.config.tolerance;
        log::info!(
            "Random walk over {n} vertices: {iterations} iterations, {}",
            if converged { "converged" } else { "iteration cap reached" }
        );
        WalkResult {
            scores: rank,
            iterations,
            converged,
            delta,
        }
    }

    /// Check that scores form a distribution.
    pub fn verify(&self, result: &WalkResult) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        if result.scores.is_empty() {
            return diagnostics;
        }
        let sum: f64 = result.scores.iter().sum();
        if (sum - 1.0).abs() > self.config.tolerance {
            diagnostics.push(Diagnostic::RankSumDrift { sum }.emit());
        }
        for (vertex, &score) in result.scores.iter().enumerate() {
            if !(0.0..=1.0).contains(&score) {
                diagnostics.push(Diagnostic::RankOutOfRange { vertex, score }.emit());
            }
        }
        if !result.converged {
            diagnostics.push(
                Diagnostic::IterationCapReached {
                    algorithm: "random walk".to_string(),
                    iterations: result.iterations,
                    delta: result.delta,
                }
                .emit(),
            );
        }
        diagnostics
    }

    /// Pick `compatibility × stationary score` per mention.
    pub fn solution(
        &self,
        graph: &ReferentGraph,
        mentions: &[Mention],
        result: &WalkResult,
    ) -> Vec<Assignment> {
        select_best(mentions, |i, entity, compatibility| {
            let rank = graph
                .candidate_vertex(i, entity)
                .map_or(0.0, |node| result.score(node));
            compatibility.to_f64().unwrap_or(0.0) * rank
        })
    }
}

/// Priors as a probability vector; uniform when they carry no mass.
fn teleport_vector(graph: &ReferentGraph) -> Vec<f64> {
    let mut prior: Vec<f64> = graph
        .priors()
        .iter()
        .map(|p| p.to_f64().unwrap_or(0.0).max(0.0))
        .collect();
    let total: f64 = prior.iter().sum();
    if total > 0.0 {
        for p in &mut prior {
            *p /= total;
        }
    } else {
        log::warn!("Referent graph has no prior mass, teleporting uniformly");
        let uniform = 1.0 / prior.len() as f64;
        prior.iter_mut().for_each(|p| *p = uniform);
    }
    prior
}
