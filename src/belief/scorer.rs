//! Scoring strategies for loopy belief propagation.
//!
//! Every strategy answers the same three questions:
//!
//! - **pair score**: how much candidate `eFrom` of mention `from` supports
//!   candidate `eTo` of mention `to`, given the messages `from` received from
//!   everyone except `to`;
//! - **aggregate score**: local evidence plus all incoming messages of one
//!   candidate;
//! - **solution**: the arg-max aggregate candidate per mention.
//!
//! | Strategy | Pair score                                               | Local evidence             |
//! |----------|----------------------------------------------------------|----------------------------|
//! | Basic    | `h/l + 2β·rel/(l(l-1))`                                  | `h/l`                      |
//! | Full     | `-ln pop(eFrom) + ln P(eFrom|from) + λ(eFrom, eTo)`      | `h - ln pop + ln P`        |
//! | MaxEnt   | `ln pop(eTo) + λ(eFrom, eTo)`                            | `ln pop`                   |
//!
//! with `h` the local compatibility, `l` the mention count and `λ` the
//! cocitation log-odds. All pairwise statistics are computed once, when the
//! scorer is built, into a [`CocitationCache`].

use super::messages::{CandidateLayout, MessagesMap};
use crate::config::{BeliefConfig, CocitationParams, CorpusStats};
use crate::similarity::{cocitation, popularity, relatedness};
use crate::solution::{select_best, Assignment};
use referent_core::{EntityId, KnowledgeBase, Mention, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Which scoring strategy to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScorerKind {
    /// Compatibility plus link relatedness.
    Basic,
    /// Rarity prior, candidate probability and cocitation log-odds.
    Full,
    /// Popularity and cocitation log-odds.
    MaxEnt,
}

impl fmt::Display for ScorerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Basic => "basic",
            Self::Full => "full",
            Self::MaxEnt => "max-ent",
        })
    }
}

// =============================================================================
// Cocitation cache
// =============================================================================

/// Pairwise link statistics of one document's candidates.
#[derive(Debug, Clone, Copy, PartialEq)]
struct PairStats {
    cocitation: u64,
    relatedness: f64,
}

/// Cocitation counts, relatedness and popularity of every candidate pair
/// across different mentions, memoized per unordered pair.
#[derive(Debug, Clone, Default)]
pub struct CocitationCache {
    popularity: HashMap<EntityId, u64>,
    pairs: HashMap<(EntityId, EntityId), PairStats>,
}

impl CocitationCache {
    /// Fetch inlinks once per entity and fill every cross-mention pair.
    pub fn build(
        layout: &CandidateLayout,
        kb: &KnowledgeBase,
        article_count: u64,
    ) -> Result<Self> {
        let distinct: BTreeSet<EntityId> = layout.entities().collect();
        let mut inlinks: HashMap<EntityId, Vec<EntityId>> =
            HashMap::with_capacity(distinct.len());
        for entity in distinct {
            inlinks.insert(entity, kb.links.inlinks(entity)?.into_owned());
        }

        let mut cache = Self {
            popularity: inlinks.iter().map(|(e, l)| (*e, popularity(l))).collect(),
            pairs: HashMap::new(),
        };
        let m = layout.mention_count();
        for a in 0..m {
            for b in (a + 1)..m {
                for &x in layout.candidates(a) {
                    for &y in layout.candidates(b) {
                        let key = Self::key(x, y);
                        if cache.pairs.contains_key(&key) {
                            continue;
                        }
                        let (lx, ly) = (&inlinks[&x], &inlinks[&y]);
                        cache.pairs.insert(
                            key,
                            PairStats {
                                cocitation: cocitation(x, y, lx, ly),
                                relatedness: relatedness(x, y, lx, ly, article_count),
                            },
                        );
                    }
                }
            }
        }
        log::debug!(
            "Cocitation cache: {} entities, {} pairs",
            cache.popularity.len(),
            cache.pairs.len()
        );
        Ok(cache)
    }

    fn key(x: EntityId, y: EntityId) -> (EntityId, EntityId) {
        if x <= y {
            (x, y)
        } else {
            (y, x)
        }
    }

    /// Popularity of a candidate; 1 for entities outside the document.
    #[must_use]
    pub fn popularity(&self, entity: EntityId) -> u64 {
        self.popularity.get(&entity).copied().unwrap_or(1)
    }

    /// Cocitation of two candidates of different mentions.
    #[must_use]
    pub fn cocitation(&self, x: EntityId, y: EntityId) -> u64 {
        self.pairs.get(&Self::key(x, y)).map_or(0, |p| p.cocitation)
    }

    /// Relatedness of two candidates of different mentions.
    #[must_use]
    pub fn relatedness(&self, x: EntityId, y: EntityId) -> f64 {
        self.pairs.get(&Self::key(x, y)).map_or(0.0, |p| p.relatedness)
    }

    /// Number of memoized pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether no pair is memoized.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Cocitation log-odds of a pair.
    ///
    /// Pairs cocited at most `threshold` times, or no more often than two
    /// independent entities would be, get the fallback value.
    #[must_use]
    pub fn log_odds(
        &self,
        params: &CocitationParams,
        x: EntityId,
        y: EntityId,
        article_count: u64,
    ) -> f64 {
        let c = self.cocitation(x, y);
        let px = self.popularity(x) as f64;
        let py = self.popularity(y) as f64;
        let expected = px * py / article_count.max(1) as f64;
        if c <= params.threshold || (c as f64) <= expected {
            return params.fallback;
        }
        (params.smoothing + c as f64).ln() - px.ln() - py.ln()
    }
}

// =============================================================================
// Strategies
// =============================================================================

/// Compatibility plus relatedness.
#[derive(Debug, Clone)]
pub struct BasicScorer {
    layout: CandidateLayout,
    cache: CocitationCache,
    beta: f64,
}

/// Rarity prior, candidate probability and cocitation.
#[derive(Debug, Clone)]
pub struct FullScorer {
    layout: CandidateLayout,
    cache: CocitationCache,
    params: CocitationParams,
    article_count: u64,
    /// `ln P(entity | mention)` per slot.
    log_probability: Vec<f64>,
}

/// Popularity and cocitation.
#[derive(Debug, Clone)]
pub struct MaxEntScorer {
    layout: CandidateLayout,
    cache: CocitationCache,
    params: CocitationParams,
    article_count: u64,
}

/// A scoring strategy with its precomputed per-document state.
#[derive(Debug, Clone)]
pub enum Scorer {
    /// See [`BasicScorer`].
    Basic(BasicScorer),
    /// See [`FullScorer`].
    Full(FullScorer),
    /// See [`MaxEntScorer`].
    MaxEnt(MaxEntScorer),
}

impl Scorer {
    /// Build a scorer for one document.
    ///
    /// Looks up inlinks for every candidate and, for [`ScorerKind::Full`],
    /// the candidate frequencies of every mention.
    pub fn new(
        kind: ScorerKind,
        mentions: &[Mention],
        kb: &KnowledgeBase,
        config: &BeliefConfig,
        corpus: &CorpusStats,
    ) -> Result<Self> {
        let layout = CandidateLayout::new(mentions);
        let cache = CocitationCache::build(&layout, kb, corpus.article_count)?;
        let article_count = corpus.article_count;

        Ok(match kind {
            ScorerKind::Basic => Self::Basic(BasicScorer {
                layout,
                cache,
                beta: config.basic.beta,
            }),
            ScorerKind::Full => {
                let floor = config.full.smoothing;
                let mut log_probability = Vec::with_capacity(layout.slot_count());
                for mention in mentions {
                    let entry = kb.candidates.lookup(&mention.normalized)?;
                    for entity in mention.candidate_ids() {
                        let p = entry.as_ref().map_or(0.0, |e| e.candidate_probability(entity));
                        log_probability.push(p.max(floor).ln());
                    }
                }
                Self::Full(FullScorer {
                    layout,
                    cache,
                    params: config.full,
                    article_count,
                    log_probability,
                })
            }
            ScorerKind::MaxEnt => Self::MaxEnt(MaxEntScorer {
                layout,
                cache,
                params: config.max_ent,
                article_count,
            }),
        })
    }

    /// Strategy of this scorer.
    #[must_use]
    pub fn kind(&self) -> ScorerKind {
        match self {
            Self::Basic(_) => ScorerKind::Basic,
            Self::Full(_) => ScorerKind::Full,
            Self::MaxEnt(_) => ScorerKind::MaxEnt,
        }
    }

    /// Slot layout the scorer was built for.
    #[must_use]
    pub fn layout(&self) -> &CandidateLayout {
        match self {
            Self::Basic(s) => &s.layout,
            Self::Full(s) => &s.layout,
            Self::MaxEnt(s) => &s.layout,
        }
    }

    /// Precomputed pairwise statistics.
    #[must_use]
    pub fn cache(&self) -> &CocitationCache {
        match self {
            Self::Basic(s) => &s.cache,
            Self::Full(s) => &s.cache,
            Self::MaxEnt(s) => &s.cache,
        }
    }

    /// Support of candidate `k_from` of `from` for candidate `k_to` of `to`.
    #[must_use]
    pub fn pair_score(
        &self,
        from: usize,
        to: usize,
        k_from: usize,
        k_to: usize,
        messages: &MessagesMap,
    ) -> f64 {
        let layout = self.layout();
        let slot_from = layout.slot(from, k_from);
        let e_from = layout.entity(slot_from);
        let e_to = layout.entity(layout.slot(to, k_to));
        let neighbors = messages.incoming_excluding(from, k_from, to);

        let local = match self {
            Self::Basic(s) => {
                let l = layout.mention_count() as f64;
                let related = s.cache.relatedness(e_from, e_to);
                layout.compatibility(slot_from) / l + 2.0 * s.beta * related / (l * (l - 1.0))
            }
            Self::Full(s) => {
                let rarity = -(s.cache.popularity(e_from) as f64).ln();
                let lambda = s.cache.log_odds(&s.params, e_from, e_to, s.article_count);
                rarity + s.log_probability[slot_from] + lambda
            }
            Self::MaxEnt(s) => {
                let rho = (s.cache.popularity(e_to) as f64).ln();
                rho + s.cache.log_odds(&s.params, e_from, e_to, s.article_count)
            }
        };
        log::trace!("pair score {e_from}@{from} -> {e_to}@{to}: {local} + {neighbors}");
        local + neighbors
    }

    /// Local evidence of one slot.
    #[must_use]
    pub fn local_evidence(&self, slot: usize) -> f64 {
        let layout = self.layout();
        let entity = layout.entity(slot);
        match self {
            Self::Basic(_) => layout.compatibility(slot) / layout.mention_count() as f64,
            Self::Full(s) => {
                layout.compatibility(slot) - (s.cache.popularity(entity) as f64).ln()
                    + s.log_probability[slot]
            }
            Self::MaxEnt(s) => (s.cache.popularity(entity) as f64).ln(),
        }
    }

    /// Local evidence plus every incoming message of candidate `k` of `mention`.
    #[must_use]
    pub fn aggregate_score(&self, mention: usize, k: usize, messages: &MessagesMap) -> f64 {
        let slot = self.layout().slot(mention, k);
        self.local_evidence(slot) + messages.incoming(mention, k)
    }

    /// Aggregate scores of every slot.
    #[must_use]
    pub fn aggregate_scores(&self, messages: &MessagesMap) -> Vec<f64> {
        let layout = self.layout();
        let mut scores = Vec::with_capacity(layout.slot_count());
        for mention in 0..layout.mention_count() {
            for k in 0..layout.candidate_count(mention) {
                scores.push(self.aggregate_score(mention, k, messages));
            }
        }
        scores
    }

    /// Arg-max aggregate candidate per mention.
    #[must_use]
    pub fn solution(&self, mentions: &[Mention], messages: &MessagesMap) -> Vec<Assignment> {
        let layout = self.layout();
        select_best(mentions, |i, entity, _| {
            layout
                .candidates(i)
                .binary_search(&entity)
                .map_or(f64::NEG_INFINITY, |k| self.aggregate_score(i, k, messages))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use referent_core::{CandidateEntry, InMemoryIndex};
    use rust_decimal::Decimal;

    fn kb() -> KnowledgeBase {
        KnowledgeBase::in_memory(
            InMemoryIndex::new()
                .with_candidates(
                    "apollo",
                    CandidateEntry::new(5, 10, vec![(EntityId(1), 3), (EntityId(2), 1)]),
                )
                .with_inlinks(EntityId(1), [EntityId(100), EntityId(101)])
                .with_inlinks(EntityId(2), [EntityId(200)])
                .with_inlinks(EntityId(3), [EntityId(300)])
                .with_inlinks(EntityId(4), [EntityId(100), EntityId(102)]),
        )
    }

    fn mentions() -> Vec<Mention> {
        vec![
            Mention::new("apollo", 0, 6)
                .with_candidate(EntityId(1), Decimal::new(8, 1))
                .with_candidate(EntityId(2), Decimal::new(2, 1)),
            Mention::new("moon", 11, 4)
                .with_candidate(EntityId(3), Decimal::new(1, 1))
                .with_candidate(EntityId(4), Decimal::new(9, 1)),
        ]
    }

    fn scorer(kind: ScorerKind) -> Scorer {
        Scorer::new(
            kind,
            &mentions(),
            &kb(),
            &BeliefConfig::default(),
            &CorpusStats::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_cache_covers_cross_mention_pairs_only() {
        let s = scorer(ScorerKind::Basic);
        let cache = s.cache();
        assert_eq!(cache.len(), 4);
        assert_eq!(cache.cocitation(EntityId(1), EntityId(4)), 1);
        assert_eq!(cache.cocitation(EntityId(4), EntityId(1)), 1);
        assert_eq!(cache.cocitation(EntityId(2), EntityId(3)), 0);
        assert_eq!(cache.popularity(EntityId(1)), 3);
        assert!(cache.relatedness(EntityId(1), EntityId(4)) > 0.0);
        // Same mention: never paired
        assert_eq!(cache.relatedness(EntityId(1), EntityId(2)), 0.0);
    }

    #[test]
    fn test_basic_pair_score_on_zero_messages() {
        let s = scorer(ScorerKind::Basic);
        let messages = MessagesMap::new(s.layout());
        // l = 2: compat / 2 + rel
        let rel = s.cache().relatedness(EntityId(1), EntityId(4));
        let score = s.pair_score(0, 1, 0, 1, &messages);
        assert!((score - (0.4 + rel)).abs() < 1e-12);
        assert!((s.pair_score(0, 1, 1, 0, &messages) - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_log_odds_fallback_for_uncited_pairs() {
        let s = scorer(ScorerKind::MaxEnt);
        let params = CocitationParams::max_ent(CorpusStats::default().article_count);
        let n = CorpusStats::default().article_count;
        assert_eq!(s.cache().log_odds(&params, EntityId(2), EntityId(3), n), params.fallback);
        let cited = s.cache().log_odds(&params, EntityId(1), EntityId(4), n);
        assert!((cited - ((1e-7 + 1.0_f64).ln() - 3f64.ln() - 3f64.ln())).abs() < 1e-12);
    }

    #[test]
    fn test_full_uses_candidate_probability() {
        let s = scorer(ScorerKind::Full);
        let Scorer::Full(full) = &s else {
            panic!("expected the full scorer");
        };
        assert!((full.log_probability[0] - 0.75_f64.ln()).abs() < 1e-12);
        assert!((full.log_probability[1] - 0.25_f64.ln()).abs() < 1e-12);
        // "moon" is not in the candidate index: floored at the smoothing constant
        assert!((full.log_probability[2] - 1e-10_f64.ln()).abs() < 1e-9);
    }

    #[test]
    fn test_max_ent_local_evidence_is_log_popularity() {
        let s = scorer(ScorerKind::MaxEnt);
        assert!((s.local_evidence(0) - 3f64.ln()).abs() < 1e-12);
        assert!((s.local_evidence(1) - 2f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_solution_on_zero_messages_follows_local_evidence() {
        let s = scorer(ScorerKind::Basic);
        let messages = MessagesMap::new(s.layout());
        let solution = s.solution(&mentions(), &messages);
        assert_eq!(solution[0].entity, Some(EntityId(1)));
        assert_eq!(solution[1].entity, Some(EntityId(4)));
    }
}
