//! Similarity measures between term vectors and between entities.
//!
//! Two families live here:
//!
//! - **Context similarity**: cosine of sparse TF-IDF vectors, used for local
//!   mention/candidate compatibility.
//! - **Link-based relatedness**: computed from the sorted inlink lists of
//!   the Entity Relatedness Index.
//!
//! ```text
//!                    log(max(|A|,|B|)) - log(|A ∩ B|)
//! rel(x, y) = 1 - ------------------------------------
//!                    log(N)            - log(min(|A|,|B|))
//! ```
//!
//! where `A`, `B` are the inlink sets of `x`, `y` and `N` the article count.

use referent_core::{EntityId, EntityRelatednessIndex, Result, TermVector};

/// Cosine similarity of two sparse vectors.
///
/// Returns 0.0 when either vector is empty or has zero norm, never NaN.
///
/// # Examples
///
/// ```
/// use referent::similarity::cosine;
/// use referent::TermVector;
///
/// let a: TermVector = [("moon".to_string(), 1.0)].into_iter().collect();
/// let b: TermVector = [("moon".to_string(), 3.0)].into_iter().collect();
/// assert!((cosine(&a, &b) - 1.0).abs() < 1e-12);
/// assert_eq!(cosine(&a, &TermVector::new()), 0.0);
/// ```
#[must_use]
pub fn cosine(a: &TermVector, b: &TermVector) -> f64 {
    // Iterate the smaller map for the dot product
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let dot: f64 = small
        .iter()
        .filter_map(|(term, w)| large.get(term).map(|v| w * v))
        .sum();
    if dot == 0.0 {
        return 0.0;
    }

    let norm_a = a.values().map(|w| w * w).sum::<f64>().sqrt();
    let norm_b = b.values().map(|w| w * w).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(0.0, 1.0)
}

/// Size of the intersection of two sorted, deduplicated id lists.
///
/// Linear merge; both inputs must be ascending.
#[must_use]
pub fn intersect_count(a: &[EntityId], b: &[EntityId]) -> usize {
    let (mut i, mut j, mut count) = (0, 0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                count += 1;
                i += 1;
                j += 1;
            }
        }
    }
    count
}

/// Link-based relatedness of two entities given their inlink lists.
///
/// - `x == y` is 1.0.
/// - Disjoint inlinks give 0.0.
/// - Otherwise the normalized link distance, clamped to `[0, 1]`. A
///   non-positive denominator (an entity linked from every article) gives 0.0.
///
/// Symmetric in its arguments.
#[must_use]
pub fn relatedness(
    x: EntityId,
    y: EntityId,
    inlinks_x: &[EntityId],
    inlinks_y: &[EntityId],
    article_count: u64,
) -> f64 {
    if x == y {
        return 1.0;
    }
    let common = intersect_count(inlinks_x, inlinks_y);
    if common == 0 {
        return 0.0;
    }

    let larger = inlinks_x.len().max(inlinks_y.len()) as f64;
    let smaller = inlinks_x.len().min(inlinks_y.len()) as f64;
    let denominator = (article_count as f64).ln() - smaller.ln();
    if denominator <= 0.0 {
        return 0.0;
    }
    let score = 1.0 - (larger.ln() - (common as f64).ln()) / denominator;
    score.clamp(0.0, 1.0)
}

/// Relatedness of two entities looked up in a link index.
pub fn entity_relatedness(
    links: &dyn EntityRelatednessIndex,
    x: EntityId,
    y: EntityId,
    article_count: u64,
) -> Result<f64> {
    if x == y {
        return Ok(1.0);
    }
    let a = links.inlinks(x)?;
    let b = links.inlinks(y)?;
    Ok(relatedness(x, y, &a, &b, article_count))
}

/// Popularity of an entity: `1 + |inlinks|`.
#[must_use]
pub fn popularity(inlinks: &[EntityId]) -> u64 {
    1 + inlinks.len() as u64
}

/// Number of pages linking to both entities.
///
/// An entity is cocited with itself as often as it is popular, so that
/// `cocitation(x, x) == popularity(x)`.
#[must_use]
pub fn cocitation(x: EntityId, y: EntityId, inlinks_x: &[EntityId], inlinks_y: &[EntityId]) -> u64 {
    if x == y {
        popularity(inlinks_x)
    } else {
        intersect_count(inlinks_x, inlinks_y) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[u32]) -> Vec<EntityId> {
        raw.iter().copied().map(EntityId).collect()
    }

    fn vector(pairs: &[(&str, f64)]) -> TermVector {
        pairs.iter().map(|(t, w)| ((*t).to_string(), *w)).collect()
    }

    #[test]
    fn test_cosine_orthogonal_and_identical() {
        let a = vector(&[("apollo", 1.0), ("moon", 2.0)]);
        let b = vector(&[("sun", 4.0)]);
        assert_eq!(cosine(&a, &b), 0.0);
        assert!((cosine(&a, &a) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_cosine_empty_is_zero_not_nan() {
        let empty = TermVector::new();
        assert_eq!(cosine(&empty, &empty), 0.0);
        let zeros = vector(&[("moon", 0.0)]);
        assert_eq!(cosine(&zeros, &zeros), 0.0);
    }

    #[test]
    fn test_cosine_partial_overlap() {
        let a = vector(&[("a", 1.0), ("b", 1.0)]);
        let b = vector(&[("a", 1.0)]);
        assert!((cosine(&a, &b) - 1.0 / 2f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_intersect_count_sorted_merge() {
        assert_eq!(intersect_count(&ids(&[1, 3, 5, 7]), &ids(&[2, 3, 7, 9])), 2);
        assert_eq!(intersect_count(&ids(&[]), &ids(&[1])), 0);
    }

    #[test]
    fn test_relatedness_identity_and_disjoint() {
        let a = ids(&[1, 2]);
        let b = ids(&[3, 4]);
        assert_eq!(relatedness(EntityId(7), EntityId(7), &a, &a, 1000), 1.0);
        assert_eq!(relatedness(EntityId(7), EntityId(8), &a, &b, 1000), 0.0);
    }

    #[test]
    fn test_relatedness_known_value() {
        // |A| = 4, |B| = 2, |A ∩ B| = 2, N = 100
        let a = ids(&[1, 2, 3, 4]);
        let b = ids(&[2, 3]);
        let expected = 1.0 - (4f64.ln() - 2f64.ln()) / (100f64.ln() - 2f64.ln());
        let got = relatedness(EntityId(10), EntityId(11), &a, &b, 100);
        assert!((got - expected).abs() < 1e-12);
        assert_eq!(got, relatedness(EntityId(11), EntityId(10), &b, &a, 100));
    }

    #[test]
    fn test_relatedness_degenerate_denominator() {
        // Smaller set as large as the corpus
        let a = ids(&[1, 2]);
        assert_eq!(relatedness(EntityId(1), EntityId(2), &a, &a, 2), 0.0);
    }

    #[test]
    fn test_cocitation_and_popularity() {
        let a = ids(&[1, 2, 3]);
        let b = ids(&[2, 3, 4]);
        assert_eq!(popularity(&a), 4);
        assert_eq!(popularity(&[]), 1);
        assert_eq!(cocitation(EntityId(5), EntityId(6), &a, &b), 2);
        assert_eq!(cocitation(EntityId(5), EntityId(5), &a, &a), 4);
    }
}
