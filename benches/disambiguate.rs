//! End-to-end disambiguation benchmarks.
//!
//! Builds a synthetic knowledge base of overlapping surface forms and
//! measures each algorithm on the same document.
//!
//! # Usage
//!
//! ```bash
//! cargo bench --bench disambiguate
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use referent::belief::ScorerKind;
use referent::{
    Algorithm, CandidateEntry, DisambiguationConfig, Disambiguator, EntityId, ExtractionConfig,
    InMemoryIndex, KnowledgeBase, MentionSelection,
};

const SURFACES: [&str; 12] = [
    "apollo", "moon", "mercury", "venus", "saturn", "jupiter", "mars", "gemini", "orion",
    "eagle", "columbia", "houston",
];

const VOCABULARY: [&str; 16] = [
    "mission", "crew", "orbit", "launch", "rocket", "planet", "god", "album", "band", "city",
    "shuttle", "capsule", "landing", "temple", "myth", "song",
];

fn knowledge_base(candidates_per_surface: u32) -> KnowledgeBase {
    let mut index = InMemoryIndex::new();
    for (s, surface) in SURFACES.iter().enumerate() {
        let candidates: Vec<(EntityId, u32)> = (0..candidates_per_surface)
            .map(|c| (EntityId(s as u32 * 100 + c), c + 1))
            .collect();
        index.insert_candidates(*surface, CandidateEntry::new(60, 100, candidates));

        for c in 0..candidates_per_surface {
            let entity = EntityId(s as u32 * 100 + c);
            let terms = (0..4).map(|k| {
                let term = VOCABULARY[(s + c as usize * 3 + k) % VOCABULARY.len()];
                (term, 1.0 + k as f64)
            });
            let mut vector: Vec<(&str, f64)> = terms.collect();
            vector.push((surface, 2.0));
            // Shared inlink pools make same-index candidates related
            let inlinks = (0..8).map(|k| EntityId(10_000 + c * 50 + (s as u32 + k) % 20));
            index = index.with_vector(entity, vector).with_inlinks(entity, inlinks);
        }
    }
    for (i, term) in VOCABULARY.iter().enumerate() {
        index = index.with_document_frequency(*term, 1_000 * (i as u64 + 1));
    }
    KnowledgeBase::in_memory(index)
}

fn document() -> String {
    let mut words = Vec::new();
    for (i, surface) in SURFACES.iter().enumerate() {
        words.push(*surface);
        words.push(VOCABULARY[i % VOCABULARY.len()]);
        words.push(VOCABULARY[(i * 7) % VOCABULARY.len()]);
        words.push(".");
    }
    words.join(" ")
}

fn bench_algorithms(c: &mut Criterion) {
    let config = DisambiguationConfig::default().with_extraction(
        ExtractionConfig::default().with_selection(MentionSelection::Threshold(0.5)),
    );
    let text = document();
    let mut group = c.benchmark_group("disambiguate");

    for candidates in [2u32, 8] {
        let d = Disambiguator::new(knowledge_base(candidates), config.clone());
        for algorithm in [
            Algorithm::RandomWalk,
            Algorithm::LoopyBelief(ScorerKind::Basic),
            Algorithm::LoopyBelief(ScorerKind::Full),
            Algorithm::LoopyBelief(ScorerKind::MaxEnt),
            Algorithm::MostFrequent,
        ] {
            group.bench_with_input(
                BenchmarkId::new(algorithm.to_string(), candidates),
                &text,
                |b, text| b.iter(|| d.disambiguate(black_box(text), algorithm).unwrap()),
            );
        }
    }
    group.finish();
}

fn bench_extraction(c: &mut Criterion) {
    let d = Disambiguator::new(knowledge_base(8), DisambiguationConfig::default());
    let text = document().repeat(8);
    c.bench_function("extract_mentions", |b| {
        b.iter(|| d.extractor().extract(black_box(&text)).unwrap())
    });
}

criterion_group!(benches, bench_algorithms, bench_extraction);
criterion_main!(benches);
