//! Referent graph: mentions, their candidates, and how they support each other.
//!
//! # Structure
//!
//! ```text
//!   [Apollo] ──0.8──► (Apollo, E1) ◄──1.0──► (Moon, E4) ◄──0.9── [Moon]
//!       │                                                           │
//!       └────0.2──► (Apollo, E2)                   (Moon, E3) ◄─0.1─┘
//! ```
//!
//! - **Mention vertices** carry the mention's importance as prior.
//! - **Candidate vertices** are keyed by `(mention index, entity)`: the same
//!   entity proposed by two mentions is two vertices. Their prior is zero.
//! - **Mention → candidate** edges hold normalized local compatibility.
//! - **Candidate → candidate** edges only join candidates of different
//!   mentions and hold normalized relatedness.
//!
//! Vertices live in a `petgraph` arena; their `NodeIndex` is the only key
//! used by the ranker. The graph is never mutated after [`GraphBuilder::build`].

use crate::config::GraphConfig;
use crate::diagnostics::Diagnostic;
use crate::similarity::entity_relatedness;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use referent_core::{EntityId, EntityRelatednessIndex, Mention, Result};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// A vertex of the referent graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vertex {
    /// A mention, with its importance prior.
    Mention {
        /// Index of the mention in the document's mention list.
        mention: usize,
        /// Importance prior.
        prior: Decimal,
    },
    /// A candidate entity of one mention.
    Candidate {
        /// Index of the proposing mention.
        mention: usize,
        /// Candidate entity.
        entity: EntityId,
    },
}

impl Vertex {
    /// Prior mass of the vertex; zero for candidates.
    #[must_use]
    pub fn prior(&self) -> Decimal {
        match self {
            Self::Mention { prior, .. } => *prior,
            Self::Candidate { .. } => Decimal::ZERO,
        }
    }

    /// Index of the mention this vertex belongs to.
    #[must_use]
    pub fn mention(&self) -> usize {
        match self {
            Self::Mention { mention, .. } | Self::Candidate { mention, .. } => *mention,
        }
    }

    /// Entity of a candidate vertex.
    #[must_use]
    pub fn entity(&self) -> Option<EntityId> {
        match self {
            Self::Mention { .. } => None,
            Self::Candidate { entity, .. } => Some(*entity),
        }
    }
}

/// The weighted directed graph of one document.
#[derive(Debug, Clone, Default)]
pub struct ReferentGraph {
    graph: DiGraph<Vertex, Decimal>,
    mention_vertices: Vec<NodeIndex>,
    candidate_vertices: HashMap<(usize, EntityId), NodeIndex>,
}

impl ReferentGraph {
    /// Underlying petgraph arena.
    pub fn graph(&self) -> &DiGraph<Vertex, Decimal> {
        &self.graph
    }

    /// Total number of vertices.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Total number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Number of mention vertices.
    #[must_use]
    pub fn mention_count(&self) -> usize {
        self.mention_vertices.len()
    }

    /// Number of candidate vertices.
    #[must_use]
    pub fn candidate_count(&self) -> usize {
        self.candidate_vertices.len()
    }

    /// Vertex of the `i`-th mention.
    #[must_use]
    pub fn mention_vertex(&self, mention: usize) -> Option<NodeIndex> {
        self.mention_vertices.get(mention).copied()
    }

    /// Vertex of a mention's candidate.
    #[must_use]
    pub fn candidate_vertex(&self, mention: usize, entity: EntityId) -> Option<NodeIndex> {
        self.candidate_vertices.get(&(mention, entity)).copied()
    }

    /// Vertex payload.
    #[must_use]
    pub fn vertex(&self, node: NodeIndex) -> Option<&Vertex> {
        self.graph.node_weight(node)
    }

    /// Weight of the edge `from -> to`, if present.
    #[must_use]
    pub fn edge_weight(&self, from: NodeIndex, to: NodeIndex) -> Option<Decimal> {
        self.graph
            .find_edge(from, to)
            .and_then(|e| self.graph.edge_weight(e))
            .copied()
    }

    /// Outgoing edges of a vertex as `(target, weight)`.
    pub fn out_edges(&self, node: NodeIndex) -> impl Iterator<Item = (NodeIndex, Decimal)> + '_ {
        self.graph.edges(node).map(|e| (e.target(), *e.weight()))
    }

    /// Sum of outgoing edge weights.
    #[must_use]
    pub fn out_weight(&self, node: NodeIndex) -> Decimal {
        self.out_edges(node).map(|(_, w)| w).sum()
    }

    /// Priors indexed by `NodeIndex::index()`.
    #[must_use]
    pub fn priors(&self) -> Vec<Decimal> {
        self.graph
            .node_indices()
            .map(|n| self.graph[n].prior())
            .collect()
    }

    /// Number of candidate -> candidate edges.
    #[must_use]
    pub fn entity_edge_count(&self) -> usize {
        self.graph
            .edge_references()
            .filter(|e| matches!(self.graph[e.source()], Vertex::Candidate { .. }))
            .count()
    }

    /// Number of weakly connected components.
    #[must_use]
    pub fn component_count(&self) -> usize {
        petgraph::algo::connected_components(&self.graph)
    }

    /// Check the prior and out-weight sums.
    ///
    /// Drift beyond `tolerance` is reported, never corrected.
    pub fn verify(&self, tolerance: f64) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        if self.graph.node_count() == 0 {
            return diagnostics;
        }
        let tolerance = Decimal::from_f64_retain(tolerance).unwrap_or_default();

        let prior_sum: Decimal = self.priors().into_iter().sum();
        if (prior_sum - Decimal::ONE).abs() > tolerance {
            diagnostics.push(Diagnostic::PriorSumDrift { sum: prior_sum }.emit());
        }

        for node in self.graph.node_indices() {
            if self.graph.edges(node).next().is_none() {
                continue;
            }
            let sum = self.out_weight(node);
            if (sum - Decimal::ONE).abs() > tolerance {
                let vertex = &self.graph[node];
                diagnostics.push(
                    Diagnostic::OutWeightDrift {
                        mention: vertex.mention(),
                        entity: vertex.entity(),
                        sum,
                    }
                    .emit(),
                );
            }
        }
        diagnostics
    }
}

// =============================================================================
// Relatedness cache
// =============================================================================

/// Memoized relatedness per unordered entity pair, scoped to one document.
#[derive(Debug, Clone, Default)]
pub struct RelatednessCache {
    scores: HashMap<(EntityId, EntityId), f64>,
}

impl RelatednessCache {
    fn key(x: EntityId, y: EntityId) -> (EntityId, EntityId) {
        if x <= y {
            (x, y)
        } else {
            (y, x)
        }
    }

    /// Cached relatedness of an unordered pair.
    #[must_use]
    pub fn get(&self, x: EntityId, y: EntityId) -> Option<f64> {
        self.scores.get(&Self::key(x, y)).copied()
    }

    /// Store the relatedness of an unordered pair.
    pub fn insert(&mut self, x: EntityId, y: EntityId, score: f64) {
        self.scores.insert(Self::key(x, y), score);
    }

    /// Number of cached pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    /// Whether nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builds a [`ReferentGraph`] from a document's mentions.
pub struct GraphBuilder<'a> {
    links: &'a dyn EntityRelatednessIndex,
    config: GraphConfig,
    article_count: u64,
}

impl<'a> GraphBuilder<'a> {
    /// Create a builder over a link index.
    pub fn new(
        links: &'a dyn EntityRelatednessIndex,
        config: GraphConfig,
        article_count: u64,
    ) -> Self {
        Self {
            links,
            config,
            article_count,
        }
    }

    /// Build the graph. Only lookup failures are errors.
    pub fn build(&self, mentions: &[Mention]) -> Result<ReferentGraph> {
        let mut out = ReferentGraph::default();

        // Vertices
        for (i, mention) in mentions.iter().enumerate() {
            let node = out.graph.add_node(Vertex::Mention {
                mention: i,
                prior: mention.importance,
            });
            out.mention_vertices.push(node);
            for entity in mention.candidate_ids() {
                let node = out.graph.add_node(Vertex::Candidate { mention: i, entity });
                out.candidate_vertices.insert((i, entity), node);
            }
        }

        // Mention -> candidate
        for (i, mention) in mentions.iter().enumerate() {
            let source = out.mention_vertices[i];
            let total = mention.total_compatibility();
            let uniform = Decimal::ONE
                .checked_div(Decimal::from(mention.candidate_count().max(1)))
                .unwrap_or_default();
            if total.is_zero() && mention.candidate_count() > 0 {
                log::debug!("{mention} has zero compatibility mass, using uniform weights");
            }
            for (entity, compatibility) in mention.candidates() {
                let weight = if total.is_zero() {
                    uniform
                } else {
                    compatibility.checked_div(total).unwrap_or_default()
                };
                if let Some(&target) = out.candidate_vertices.get(&(i, entity)) {
                    out.graph.add_edge(source, target, weight);
                }
            }
        }

        // Candidate -> candidate
        let mut cache = (out.candidate_count() < self.config.cache_vertex_limit)
            .then(RelatednessCache::default);
        for (i, mention) in mentions.iter().enumerate() {
            for entity in mention.candidate_ids() {
                let mut neighbors: Vec<(NodeIndex, Decimal)> = Vec::new();
                for (j, other) in mentions.iter().enumerate() {
                    if i == j {
                        continue;
                    }
                    for other_entity in other.candidate_ids() {
                        let score = self.relatedness(cache.as_mut(), entity, other_entity)?;
                        if score <= self.config.relatedness_epsilon {
                            continue;
                        }
                        if let Some(&target) = out.candidate_vertices.get(&(j, other_entity)) {
                            let score = Decimal::from_f64_retain(score).unwrap_or_default();
                            neighbors.push((target, score));
                        }
                    }
                }

                let total: Decimal = neighbors.iter().map(|(_, s)| *s).sum();
                if total.is_zero() {
                    continue;
                }
                let source = out.candidate_vertices[&(i, entity)];
                for (target, score) in neighbors {
                    let weight = score.checked_div(total).unwrap_or_default();
                    log::trace!("Edge ({i}, {entity}) -> {target:?}: {weight}");
                    out.graph.add_edge(source, target, weight);
                }
            }
        }

        log::info!(
            "Referent graph: {} vertices ({} mentions, {} candidates), {} edges ({} entity-entity), {} components, relatedness cache {}",
            out.vertex_count(),
            out.mention_count(),
            out.candidate_count(),
            out.edge_count(),
            out.entity_edge_count(),
            out.component_count(),
            cache.as_ref().map_or_else(|| "off".to_string(), |c| format!("{} pairs", c.len()))
        );
        Ok(out)
    }

    fn relatedness(
        &self,
        cache: Option<&mut RelatednessCache>,
        x: EntityId,
        y: EntityId,
    ) -> Result<f64> {
        match cache {
            Some(cache) => {
                if let Some(score) = cache.get(x, y) {
                    return Ok(score);
                }
                let score = entity_relatedness(self.links, x, y, self.article_count)?;
                cache.insert(x, y, score);
                Ok(score)
            }
            None => entity_relatedness(self.links, x, y, self.article_count),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CorpusStats;
    use referent_core::InMemoryIndex;

    fn ids(raw: &[u32]) -> Vec<EntityId> {
        raw.iter().copied().map(EntityId).collect()
    }

    fn apollo_moon() -> (InMemoryIndex, Vec<Mention>) {
        let index = InMemoryIndex::new()
            .with_inlinks(EntityId(1), ids(&[100, 101]))
            .with_inlinks(EntityId(2), ids(&[200]))
            .with_inlinks(EntityId(3), ids(&[300]))
            .with_inlinks(EntityId(4), ids(&[100, 102]));
        let mentions = vec![
            Mention::new("apollo", 0, 6)
                .with_candidate(EntityId(1), Decimal::new(8, 1))
                .with_candidate(EntityId(2), Decimal::new(2, 1))
                .with_importance(Decimal::new(5, 1)),
            Mention::new("moon", 11, 4)
                .with_candidate(EntityId(3), Decimal::new(1, 1))
                .with_candidate(EntityId(4), Decimal::new(9, 1))
                .with_importance(Decimal::new(5, 1)),
        ];
        (index, mentions)
    }

    fn build(index: &InMemoryIndex, mentions: &[Mention], config: GraphConfig) -> ReferentGraph {
        GraphBuilder::new(index, config, CorpusStats::default().article_count)
            .build(mentions)
            .unwrap()
    }

    #[test]
    fn test_apollo_moon_edge_weights() {
        let (index, mentions) = apollo_moon();
        let g = build(&index, &mentions, GraphConfig::default());

        let apollo = g.mention_vertex(0).unwrap();
        let moon = g.mention_vertex(1).unwrap();
        let e1 = g.candidate_vertex(0, EntityId(1)).unwrap();
        let e2 = g.candidate_vertex(0, EntityId(2)).unwrap();
        let e3 = g.candidate_vertex(1, EntityId(3)).unwrap();
        let e4 = g.candidate_vertex(1, EntityId(4)).unwrap();

        assert_eq!(g.edge_weight(apollo, e1), Some(Decimal::new(8, 1)));
        assert_eq!(g.edge_weight(apollo, e2), Some(Decimal::new(2, 1)));
        assert_eq!(g.edge_weight(moon, e3), Some(Decimal::new(1, 1)));
        assert_eq!(g.edge_weight(moon, e4), Some(Decimal::new(9, 1)));
        assert_eq!(g.edge_weight(e1, e4), Some(Decimal::ONE));
        assert_eq!(g.edge_weight(e4, e1), Some(Decimal::ONE));
        assert_eq!(g.edge_weight(e2, e3), None);
        assert_eq!(g.entity_edge_count(), 2);
        assert!(g.verify(1e-5).is_empty());
    }

    #[test]
    fn test_zero_compatibility_mass_gets_uniform_edges() {
        let index = InMemoryIndex::new();
        let mentions = vec![Mention::new("mercury", 0, 7)
            .with_candidate(EntityId(1), Decimal::ZERO)
            .with_candidate(EntityId(2), Decimal::ZERO)
            .with_candidate(EntityId(3), Decimal::ZERO)
            .with_importance(Decimal::ONE)];
        let g = build(&index, &mentions, GraphConfig::default());
        let m = g.mention_vertex(0).unwrap();
        let total = g.out_weight(m);
        assert!((total - Decimal::ONE).abs() < Decimal::new(1, 9));
        let third = Decimal::ONE / Decimal::from(3);
        for e in ids(&[1, 2, 3]) {
            let v = g.candidate_vertex(0, e).unwrap();
            assert_eq!(g.edge_weight(m, v), Some(third));
        }
    }

    #[test]
    fn test_same_entity_under_two_mentions_is_two_vertices() {
        let index = InMemoryIndex::new();
        let mentions = vec![
            Mention::new("a", 0, 1).with_candidate(EntityId(5), Decimal::ONE),
            Mention::new("b", 2, 1).with_candidate(EntityId(5), Decimal::ONE),
        ];
        let g = build(&index, &mentions, GraphConfig::default());
        let a = g.candidate_vertex(0, EntityId(5)).unwrap();
        let b = g.candidate_vertex(1, EntityId(5)).unwrap();
        assert_ne!(a, b);
        // Identical entities are fully related
        assert_eq!(g.edge_weight(a, b), Some(Decimal::ONE));
    }

    #[test]
    fn test_candidates_of_one_mention_are_not_linked() {
        let index = InMemoryIndex::new()
            .with_inlinks(EntityId(1), ids(&[9]))
            .with_inlinks(EntityId(2), ids(&[9]));
        let mentions = vec![Mention::new("a", 0, 1)
            .with_candidate(EntityId(1), Decimal::ONE)
            .with_candidate(EntityId(2), Decimal::ONE)];
        let g = build(&index, &mentions, GraphConfig::default());
        assert_eq!(g.entity_edge_count(), 0);
        assert_eq!(g.component_count(), 1);
    }

    #[test]
    fn test_cache_does_not_change_weights() {
        let (index, mentions) = apollo_moon();
        let cached = build(&index, &mentions, GraphConfig::default());
        let uncached = build(
            &index,
            &mentions,
            GraphConfig::default().with_cache_vertex_limit(0),
        );
        for (a, b) in cached.graph().edge_references().zip(uncached.graph().edge_references()) {
            assert_eq!(a.weight(), b.weight());
        }
    }

    #[test]
    fn test_verify_reports_prior_drift() {
        let (index, mut mentions) = apollo_moon();
        mentions[1].importance = Decimal::ZERO;
        let g = build(&index, &mentions, GraphConfig::default());
        let diagnostics = g.verify(1e-5);
        assert!(matches!(diagnostics.as_slice(), [Diagnostic::PriorSumDrift { .. }]));
    }

    #[test]
    fn test_relatedness_cache_is_symmetric() {
        let mut cache = RelatednessCache::default();
        cache.insert(EntityId(4), EntityId(1), 0.5);
        assert_eq!(cache.get(EntityId(1), EntityId(4)), Some(0.5));
        assert_eq!(cache.len(), 1);
    }
}
