//! Property-based tests for tokenization, n-grams and mention extraction.

use proptest::prelude::*;
use referent::extract::{context_window, gather_ngrams, tokenize};
use referent::{
    CandidateEntry, CorpusStats, EntityId, ExtractionConfig, InMemoryIndex, KnowledgeBase,
    MentionExtractor, MentionSelection,
};
use rust_decimal::Decimal;

fn char_slice(text: &str, offset: usize, length: usize) -> String {
    text.chars().skip(offset).take(length).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    /// Every token is the lowercased text at its character span
    #[test]
    fn tokens_point_into_text(text in "[A-Za-zé0-9 .,!:()'-]{0,80}") {
        let tokens = tokenize(&text);
        for token in &tokens {
            let raw = char_slice(&text, token.offset, token.length);
            prop_assert_eq!(raw.to_lowercase(), token.text.clone());
            prop_assert!(!token.text.contains(' '));
        }
        prop_assert!(tokens.windows(2).all(|w| w[0].end() <= w[1].offset));
    }

    /// N-grams cover 1..=max_len tokens and carry their exact surface
    #[test]
    fn ngrams_match_their_spans(text in "[A-Za-z .-]{0,60}", max_len in 1usize..5) {
        let tokens = tokenize(&text);
        let ngrams = gather_ngrams(&text, &tokens, max_len);
        let expected: usize = (1..=max_len)
            .map(|n| tokens.len().saturating_sub(n - 1))
            .sum();
        prop_assert_eq!(ngrams.len(), expected);
        for ngram in &ngrams {
            prop_assert!(ngram.token_count() <= max_len);
            prop_assert_eq!(char_slice(&text, ngram.offset, ngram.length), ngram.original.clone());
        }
    }

    /// The context window never exceeds its size and always contains the center
    #[test]
    fn context_window_is_bounded(
        words in prop::collection::vec("[a-z]{1,6}", 1..120),
        pick in any::<prop::sample::Index>(),
        window in 1usize..60,
    ) {
        let text = words.join(" ");
        let tokens = tokenize(&text);
        let center = &tokens[pick.index(tokens.len())];
        let slice = context_window(&tokens, center.offset, window);
        prop_assert!(slice.len() <= window.max(1));
        prop_assert!(slice.iter().any(|t| t.offset == center.offset));
        if slice.len() < tokens.len() {
            prop_assert_eq!(slice.len(), window);
        }
    }

    /// Importance always sums to exactly one over the selected mentions
    #[test]
    fn importance_sums_to_one(
        counts in prop::collection::vec(1usize..4, 1..4),
        fraction in 0.05f64..1.0,
    ) {
        let surfaces = ["apollo", "moon", "saturn"];
        let mut index = InMemoryIndex::new();
        let mut words = Vec::new();
        for (i, &count) in counts.iter().enumerate() {
            index.insert_candidates(
                surfaces[i],
                CandidateEntry::new(5, 10 + i as u64, vec![(EntityId(i as u32 + 1), 1)]),
            );
            for _ in 0..count {
                words.push(surfaces[i]);
                words.push("and");
            }
        }
        let text = words.join(" ");
        let extractor = MentionExtractor::new(
            KnowledgeBase::in_memory(index),
            ExtractionConfig::default().with_selection(MentionSelection::TopFraction(fraction)),
            CorpusStats::default(),
        );
        let extraction = extractor.extract(&text).unwrap();
        prop_assert!(!extraction.mentions.is_empty());
        let total: Decimal = extraction.mentions.iter().map(|m| m.importance).sum();
        prop_assert_eq!(total, Decimal::ONE);
        prop_assert!(extraction
            .mentions
            .windows(2)
            .all(|w| w[0].offset <= w[1].offset));
    }
}
