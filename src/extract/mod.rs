//! Mention extraction: from raw text to scored candidate mentions.
//!
//! # Pipeline
//!
//! ```text
//! text ─► tokenize ─► gather_ngrams ─► extract_mentions ─► compatibilities ─► importance
//!                                        │    (Candidate      (Entity Vector   (occurrences
//!                                        │     Index)          + Term Freq)     × idf)
//!                                        ▼
//!                          keyphraseness pruning (top-K or threshold)
//! ```
//!
//! Only the Candidate Index is consulted for every n-gram; the vector and
//! term-frequency services are only hit for mentions that survive pruning.

mod tokenize;

pub use tokenize::{gather_ngrams, tokenize};

use crate::config::{CorpusStats, ExtractionConfig, MentionSelection};
use crate::diagnostics::Diagnostic;
use crate::similarity::cosine;
use referent_core::{
    Compatibility, EntityId, KnowledgeBase, Mention, Ngram, Result, TermVector, Token,
};
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Tokens and selected mentions of one document.
#[derive(Debug, Clone)]
pub struct Extraction {
    /// Tokens of the document, in text order.
    pub tokens: Vec<Token>,
    /// Selected mentions with compatibility and importance set, in text order.
    pub mentions: Vec<Mention>,
    /// Pruning decisions worth reporting.
    pub diagnostics: Vec<Diagnostic>,
}

// =============================================================================
// Keyphraseness ranking
// =============================================================================

/// Ordering key of the best-of-K structure: keyphraseness, then offset, then
/// normalized form.
#[derive(Debug, Clone)]
struct RankKey {
    keyphraseness: f64,
    offset: usize,
    normalized: String,
}

impl RankKey {
    fn of(mention: &Mention) -> Self {
        Self {
            keyphraseness: mention.keyphraseness,
            offset: mention.offset,
            normalized: mention.normalized.clone(),
        }
    }
}

impl PartialEq for RankKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for RankKey {}

impl PartialOrd for RankKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RankKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.keyphraseness
            .total_cmp(&other.keyphraseness)
            .then_with(|| self.offset.cmp(&other.offset))
            .then_with(|| self.normalized.cmp(&other.normalized))
    }
}

// =============================================================================
// Extractor
// =============================================================================

/// Finds mentions in a document and scores their candidates.
///
/// Holds only shared read-only handles, so one extractor can serve many
/// threads.
#[derive(Debug, Clone)]
pub struct MentionExtractor {
    kb: KnowledgeBase,
    config: ExtractionConfig,
    corpus: CorpusStats,
}

impl MentionExtractor {
    /// Create an extractor over a knowledge base.
    pub fn new(kb: KnowledgeBase, config: ExtractionConfig, corpus: CorpusStats) -> Self {
        Self { kb, config, corpus }
    }

    /// Extraction configuration in use.
    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Run the full extraction pipeline on one document.
    pub fn extract(&self, text: &str) -> Result<Extraction> {
        let tokens = tokenize(text);
        let ngrams = gather_ngrams(text, &tokens, self.config.max_ngram_len);
        let mut diagnostics = Vec::new();

        let selected = self.extract_mentions(ngrams, tokens.len(), &mut diagnostics)?;
        let mut mentions = self.compute_compatibilities(selected, &tokens)?;
        self.compute_importance(&mut mentions, text);

        log::info!(
            "Extracted {} mentions from {} tokens ({} candidates)",
            mentions.len(),
            tokens.len(),
            mentions.iter().map(Mention::candidate_count).sum::<usize>()
        );
        Ok(Extraction {
            tokens,
            mentions,
            diagnostics,
        })
    }

    /// Look n-grams up in the Candidate Index and keep the most keyphrase-like.
    ///
    /// Returned mentions carry their candidates with zero compatibility and
    /// are sorted by position in the text.
    pub fn extract_mentions(
        &self,
        ngrams: Vec<Ngram>,
        token_count: usize,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<Vec<Mention>> {
        let mut ranked: BTreeMap<RankKey, Mention> = BTreeMap::new();

        for mut ngram in ngrams {
            let mut entry = self.kb.candidates.lookup(&ngram.normalized)?;
            if entry.is_none() && ngram.normalized.contains(" - ") {
                ngram.normalized = ngram.normalized.replace(" - ", " ");
                entry = self.kb.candidates.lookup(&ngram.normalized)?;
            }
            let Some(entry) = entry else {
                continue;
            };

            if let Some(cap) = self.config.max_candidates {
                if entry.candidate_count() > cap {
                    diagnostics.push(
                        Diagnostic::CandidatesSkipped {
                            surface: ngram.normalized.clone(),
                            candidates: entry.candidate_count(),
                        }
                        .emit(),
                    );
                    continue;
                }
            }

            let mut mention = Mention::from_ngram(&ngram);
            mention.keyphraseness = entry.keyphraseness();
            mention.document_frequency = entry.total_docs;
            for entity in entry.entity_ids() {
                mention.set_compatibility(entity, Decimal::ZERO);
            }

            match self.config.selection {
                MentionSelection::TopFraction(fraction) => {
                    let k = top_k(token_count, fraction);
                    rank_top_k(&mut ranked, mention, k);
                }
                MentionSelection::Threshold(threshold) => {
                    if mention.keyphraseness >= threshold {
                        ranked.entry(RankKey::of(&mention)).or_insert(mention);
                    }
                }
            }
        }

        let mut mentions: Vec<Mention> = ranked.into_values().collect();
        mentions.sort_by(|a, b| {
            a.offset
                .cmp(&b.offset)
                .then_with(|| a.length.cmp(&b.length))
                .then_with(|| a.normalized.cmp(&b.normalized))
        });
        Ok(mentions)
    }

    /// Score every candidate of every mention against its context.
    ///
    /// With `drop_zero_compatibility`, mentions whose candidates all score
    /// zero are removed.
    pub fn compute_compatibilities(
        &self,
        mentions: Vec<Mention>,
        tokens: &[Token],
    ) -> Result<Vec<Mention>> {
        let mut result = Vec::with_capacity(mentions.len());
        for mut mention in mentions {
            let context = self.context_vector(&mention, tokens)?;
            let entities: Vec<EntityId> = mention.candidate_ids().collect();
            for entity in entities {
                let vector = self.kb.vectors.vector(entity)?;
                mention.set_compatibility(entity, to_compatibility(cosine(&context, &vector)));
            }
            if self.config.drop_zero_compatibility && mention.has_zero_compatibility_mass() {
                log::debug!("Dropping {mention}: zero compatibility mass");
                continue;
            }
            result.push(mention);
        }
        Ok(result)
    }

    /// Cosine similarity between a mention's context window and an entity.
    pub fn compute_local_compatibility(
        &self,
        mention: &Mention,
        entity: EntityId,
        tokens: &[Token],
    ) -> Result<Compatibility> {
        let context = self.context_vector(mention, tokens)?;
        let vector = self.kb.vectors.vector(entity)?;
        Ok(to_compatibility(cosine(&context, &vector)))
    }

    /// TF-IDF vector of the tokens around a mention.
    pub fn context_vector(&self, mention: &Mention, tokens: &[Token]) -> Result<TermVector> {
        let mut tf: BTreeMap<&str, u32> = BTreeMap::new();
        for token in context_window(tokens, mention.offset, self.config.context_window) {
            *tf.entry(token.text.as_str()).or_insert(0) += 1;
        }

        let mut vector = TermVector::new();
        for (term, count) in tf {
            let weight = f64::from(count) * self.idf(term)?;
            vector.insert(term.to_string(), weight);
        }
        Ok(vector)
    }

    /// `log10(N / (df + 1))`; unknown terms have `df = 0`.
    pub fn idf(&self, term: &str) -> Result<f64> {
        let smoothed = self.kb.terms.document_frequency(term)?.unwrap_or(0) + 1;
        if smoothed >= self.corpus.document_count {
            return Ok(0.0);
        }
        Ok((self.corpus.document_count as f64 / smoothed as f64).log10())
    }

    /// Set each mention's importance prior.
    ///
    /// Importance is proportional to `occurrences(original, text) *
    /// ln(N / df)` and normalized so the priors sum to exactly 1. When every
    /// weight is zero the prior is uniform.
    pub fn compute_importance(&self, mentions: &mut [Mention], text: &str) {
        if mentions.is_empty() {
            return;
        }

        let weights: Vec<Decimal> = mentions
            .iter()
            .map(|m| {
                let occurrences = count_occurrences(&m.original, text) as f64;
                let df = m.document_frequency.max(1) as f64;
                let idf = (self.corpus.document_count as f64 / df).ln().max(0.0);
                Decimal::from_f64_retain(occurrences * idf).unwrap_or_default()
            })
            .collect();
        let total: Decimal = weights.iter().sum();

        let priors: Vec<Decimal> = if total.is_zero() {
            log::debug!("All importance weights are zero, using a uniform prior");
            let uniform = Decimal::ONE
                .checked_div(Decimal::from(mentions.len()))
                .unwrap_or_default();
            vec![uniform; mentions.len()]
        } else {
            weights
                .iter()
                .map(|w| w.checked_div(total).unwrap_or_default())
                .collect()
        };

        // The last prior absorbs rounding so the sum is exactly one
        let last = mentions.len() - 1;
        let mut assigned = Decimal::ZERO;
        for (i, (mention, prior)) in mentions.iter_mut().zip(&priors).enumerate() {
            mention.importance = if i == last {
                (Decimal::ONE - assigned).max(Decimal::ZERO)
            } else {
                assigned += *prior;
                *prior
            };
            log::debug!("Importance of {:?}: {}", mention.normalized, mention.importance);
        }
    }
}

/// Number of mentions kept by a top-fraction policy: `max(1, ceil(tokens * fraction))`.
fn top_k(token_count: usize, fraction: f64) -> usize {
    ((token_count as f64 * fraction).ceil() as usize).max(1)
}

/// Insert into a best-of-`k` structure, evicting the weakest entry when full.
fn rank_top_k(ranked: &mut BTreeMap<RankKey, Mention>, mention: Mention, k: usize) {
    if ranked.len() < k {
        ranked.entry(RankKey::of(&mention)).or_insert(mention);
        return;
    }
    let weakest = ranked.keys().next().map(|key| key.keyphraseness);
    if let Some(weakest) = weakest {
        if weakest < mention.keyphraseness {
            ranked.pop_first();
            ranked.entry(RankKey::of(&mention)).or_insert(mention);
        }
    }
}

/// The `window` tokens around the token starting at `offset`.
///
/// Near either end of the document the window slides inward instead of
/// shrinking.
pub fn context_window(tokens: &[Token], offset: usize, window: usize) -> &[Token] {
    if tokens.is_empty() || window == 0 {
        return &[];
    }
    let n = tokens.len();
    let middle = tokens.partition_point(|t| t.offset <= offset).saturating_sub(1);
    let half = window / 2;

    let (from, to) = if middle < half {
        (0, n.min(window))
    } else if middle + half >= n {
        (n.saturating_sub(window), n)
    } else {
        (middle - half, middle - half + window)
    };
    &tokens[from..to]
}

/// Non-overlapping occurrences of `needle` in `haystack`.
fn count_occurrences(needle: &str, haystack: &str) -> usize {
    if needle.is_empty() {
        0
    } else {
        haystack.matches(needle).count()
    }
}

fn to_compatibility(similarity: f64) -> Compatibility {
    Decimal::from_f64_retain(similarity).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use referent_core::{CandidateEntry, InMemoryIndex};

    fn extractor(index: InMemoryIndex, config: ExtractionConfig) -> MentionExtractor {
        MentionExtractor::new(KnowledgeBase::in_memory(index), config, CorpusStats::default())
    }

    fn entry(linked: u64, total: u64, ids: &[u32]) -> CandidateEntry {
        CandidateEntry::new(linked, total, ids.iter().map(|&e| (EntityId(e), 1)).collect())
    }

    fn forms(mentions: &[Mention]) -> Vec<&str> {
        mentions.iter().map(|m| m.normalized.as_str()).collect()
    }

    #[test]
    fn test_context_window_clamps_at_edges() {
        let tokens = tokenize("a b c d e f g h i j");
        let texts = |w: &[Token]| w.iter().map(|t| t.text.clone()).collect::<Vec<_>>();

        assert_eq!(texts(context_window(&tokens, 0, 4)), ["a", "b", "c", "d"]);
        assert_eq!(texts(context_window(&tokens, 18, 4)), ["g", "h", "i", "j"]);
        // 'e' is token 4 at offset 8
        assert_eq!(texts(context_window(&tokens, 8, 4)), ["c", "d", "e", "f"]);
        assert_eq!(context_window(&tokens, 8, 50).len(), 10);
    }

    #[test]
    fn test_hyphen_fallback_retries_once() {
        let index = InMemoryIndex::new().with_candidates("apollo 11", entry(5, 10, &[1]));
        let ex = extractor(
            index,
            ExtractionConfig::default().with_selection(MentionSelection::Threshold(0.0)),
        );
        let text = "Apollo - 11";
        let tokens = tokenize(text);
        let ngrams = gather_ngrams(text, &tokens, 3);
        let mut diagnostics = Vec::new();
        let mentions = ex.extract_mentions(ngrams, tokens.len(), &mut diagnostics).unwrap();
        assert_eq!(forms(&mentions), ["apollo 11"]);
        assert_eq!(mentions[0].original, "Apollo - 11");
    }

    #[test]
    fn test_oversized_candidate_lists_are_skipped() {
        let index = InMemoryIndex::new()
            .with_candidates("paris", entry(5, 10, &[1, 2, 3]))
            .with_candidates("texas", entry(5, 10, &[4]));
        let ex = extractor(
            index,
            ExtractionConfig::default()
                .with_selection(MentionSelection::Threshold(0.0))
                .with_max_candidates(Some(2)),
        );
        let text = "Paris Texas";
        let tokens = tokenize(text);
        let mut diagnostics = Vec::new();
        let mentions = ex
            .extract_mentions(gather_ngrams(text, &tokens, 2), tokens.len(), &mut diagnostics)
            .unwrap();
        assert_eq!(forms(&mentions), ["texas"]);
        assert!(matches!(
            diagnostics.as_slice(),
            [Diagnostic::CandidatesSkipped { candidates: 3, .. }]
        ));
    }

    #[test]
    fn test_top_k_keeps_highest_keyphraseness() {
        let index = InMemoryIndex::new()
            .with_candidates("a", entry(1, 10, &[1]))
            .with_candidates("b", entry(9, 10, &[2]))
            .with_candidates("c", entry(5, 10, &[3]));
        // 3 tokens * 0.3 -> K = 1
        let ex = extractor(
            index,
            ExtractionConfig::default().with_selection(MentionSelection::TopFraction(0.3)),
        );
        let text = "a b c";
        let tokens = tokenize(text);
        let mut diagnostics = Vec::new();
        let mentions = ex
            .extract_mentions(gather_ngrams(text, &tokens, 1), tokens.len(), &mut diagnostics)
            .unwrap();
        assert_eq!(forms(&mentions), ["b"]);
    }

    #[test]
    fn test_top_fraction_rounds_up() {
        assert_eq!(top_k(3, 0.5), 2);
        assert_eq!(top_k(20, 0.06), 2);
        assert_eq!(top_k(10, 0.0), 1);

        let index = InMemoryIndex::new()
            .with_candidates("a", entry(1, 2, &[1]))
            .with_candidates("b", entry(1, 2, &[2]));
        // 20 tokens * 0.06 = 1.2 -> K = 2
        let ex = extractor(
            index,
            ExtractionConfig::default().with_selection(MentionSelection::TopFraction(0.06)),
        );
        let text = format!("a b{}", " x".repeat(18));
        let tokens = tokenize(&text);
        assert_eq!(tokens.len(), 20);
        let mut diagnostics = Vec::new();
        let mentions = ex
            .extract_mentions(gather_ngrams(&text, &tokens, 1), tokens.len(), &mut diagnostics)
            .unwrap();
        assert_eq!(forms(&mentions), ["a", "b"]);
    }

    #[test]
    fn test_threshold_selection_in_text_order() {
        let index = InMemoryIndex::new()
            .with_candidates("a", entry(1, 10, &[1]))
            .with_candidates("b", entry(9, 10, &[2]))
            .with_candidates("c", entry(5, 10, &[3]));
        let ex = extractor(
            index,
            ExtractionConfig::default().with_selection(MentionSelection::Threshold(0.5)),
        );
        let text = "c a b";
        let tokens = tokenize(text);
        let mut diagnostics = Vec::new();
        let mentions = ex
            .extract_mentions(gather_ngrams(text, &tokens, 1), tokens.len(), &mut diagnostics)
            .unwrap();
        assert_eq!(forms(&mentions), ["c", "b"]);
        assert!((mentions[1].keyphraseness - 0.9).abs() < 1e-12);
        assert_eq!(mentions[1].document_frequency, 10);
    }

    #[test]
    fn test_missing_document_frequency_is_smoothed() {
        let ex = extractor(
            InMemoryIndex::new().with_document_frequency("moon", 99),
            ExtractionConfig::default(),
        );
        let n = CorpusStats::default().document_count as f64;
        assert!((ex.idf("moon").unwrap() - (n / 100.0).log10()).abs() < 1e-12);
        assert!((ex.idf("unseen").unwrap() - n.log10()).abs() < 1e-12);
    }

    #[test]
    fn test_local_compatibility_prefers_matching_context() {
        let index = InMemoryIndex::new()
            .with_vector(EntityId(1), [("rocket", 1.0), ("launch", 1.0)])
            .with_vector(EntityId(2), [("greek", 1.0), ("god", 1.0)]);
        let ex = extractor(index, ExtractionConfig::default());
        let text = "Apollo rocket launch";
        let tokens = tokenize(text);
        let mention = Mention::new("apollo", 0, 6);

        let rocket = ex.compute_local_compatibility(&mention, EntityId(1), &tokens).unwrap();
        let god = ex.compute_local_compatibility(&mention, EntityId(2), &tokens).unwrap();
        let unknown = ex.compute_local_compatibility(&mention, EntityId(3), &tokens).unwrap();
        assert!(rocket > Decimal::ZERO);
        assert!(rocket <= Decimal::ONE);
        assert_eq!(god, Decimal::ZERO);
        assert_eq!(unknown, Decimal::ZERO);
    }

    #[test]
    fn test_drop_zero_compatibility_is_opt_in() {
        let index = InMemoryIndex::new().with_vector(EntityId(1), [("rocket", 1.0)]);
        let text = "Apollo Zeus rocket";
        let tokens = tokenize(text);
        let mentions = vec![
            Mention::new("apollo", 0, 6).with_candidate(EntityId(1), Decimal::ZERO),
            Mention::new("zeus", 7, 4).with_candidate(EntityId(2), Decimal::ZERO),
        ];

        let keep = extractor(index.clone(), ExtractionConfig::default());
        assert_eq!(keep.compute_compatibilities(mentions.clone(), &tokens).unwrap().len(), 2);

        let drop = extractor(
            index,
            ExtractionConfig::default().with_drop_zero_compatibility(true),
        );
        let kept = drop.compute_compatibilities(mentions, &tokens).unwrap();
        assert_eq!(forms(&kept), ["apollo"]);
    }

    #[test]
    fn test_importance_sums_to_exactly_one() {
        let ex = extractor(InMemoryIndex::new(), ExtractionConfig::default());
        let text = "Moon Apollo Moon Saturn";
        let mut a = Mention::new("moon", 0, 4).with_original("Moon");
        a.document_frequency = 1000;
        let mut b = Mention::new("apollo", 5, 6).with_original("Apollo");
        b.document_frequency = 300;
        let mut c = Mention::new("saturn", 17, 6).with_original("Saturn");
        c.document_frequency = 7;
        let mut mentions = vec![a, b, c];

        ex.compute_importance(&mut mentions, text);
        let total: Decimal = mentions.iter().map(|m| m.importance).sum();
        assert_eq!(total, Decimal::ONE);
        assert!(mentions.iter().all(|m| m.importance > Decimal::ZERO));
    }

    #[test]
    fn test_importance_uniform_fallback() {
        let ex = extractor(InMemoryIndex::new(), ExtractionConfig::default());
        // Surface forms that never occur in the text
        let mut mentions = vec![
            Mention::new("x", 0, 1).with_original("X"),
            Mention::new("y", 2, 1).with_original("Y"),
        ];
        ex.compute_importance(&mut mentions, "nothing here");
        assert_eq!(mentions[0].importance, Decimal::new(5, 1));
        assert_eq!(mentions[1].importance, Decimal::new(5, 1));
    }

    #[test]
    fn test_count_occurrences_non_overlapping() {
        assert_eq!(count_occurrences("aa", "aaaa"), 2);
        assert_eq!(count_occurrences("", "abc"), 0);
        assert_eq!(count_occurrences("Moon", "Moon moon Moon"), 2);
    }
}
