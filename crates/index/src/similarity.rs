//! Similarity scoring helpers.
//!
//! Pure-Rust implementations of:
//! - Tokenization with light suffix folding
//! - BM25 term weighting
//! - Cosine similarity
//! - Reciprocal Rank Fusion (RRF) for merging ranked result lists

use std::collections::HashMap;

const STOPWORDS: &[&str] = &[
    "a", "about", "an", "and", "are", "as", "at", "be", "by", "can", "do", "does", "for", "from",
    "how", "in", "into", "is", "it", "its", "of", "on", "or", "so", "that", "the", "their", "then",
    "there", "these", "this", "to", "was", "we", "what", "when", "where", "which", "who", "why",
    "will", "with", "you",
];

/// Split text into lowercase index terms.
///
/// Drops stopwords and single characters and folds common English suffixes
/// so that "converts" and "convert" share a term.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .filter(|w| w.chars().count() > 1 && !STOPWORDS.contains(&w.as_str()))
        .map(|w| fold_suffix(&w))
        .collect()
}

fn fold_suffix(word: &str) -> String {
    let folded = word
        .strip_suffix("ing")
        .filter(|s| s.len() >= 3)
        .or_else(|| word.strip_suffix("ed").filter(|s| s.len() >= 3))
        .or_else(|| {
            word.strip_suffix("es").filter(|s| {
                s.len() >= 3 && ["ss", "sh", "ch", "x"].iter().any(|end| s.ends_with(*end))
            })
        })
        .or_else(|| {
            word.strip_suffix('s')
                .filter(|s| s.len() >= 3 && !s.ends_with(['s', 'i', 'u']))
        });
    folded.unwrap_or(word).to_string()
}

/// Count weighted term frequencies.
pub fn term_frequencies(terms: &[String], weight: f64, into: &mut HashMap<String, f64>) {
    for term in terms {
        *into.entry(term.clone()).or_insert(0.0) += weight;
    }
}

/// BM25 inverse document frequency. Always positive.
pub fn bm25_idf(doc_count: usize, doc_freq: usize) -> f64 {
    let n = doc_count as f64;
    let df = doc_freq as f64;
    (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
}

/// BM25 contribution of one term to one document.
pub fn bm25_term(tf: f64, idf: f64, doc_len: f64, avg_len: f64, k1: f64, b: f64) -> f64 {
    if tf <= 0.0 {
        return 0.0;
    }
    let norm = if avg_len > 0.0 { doc_len / avg_len } else { 1.0 };
    idf * (tf * (k1 + 1.0)) / (tf + k1 * (1.0 - b + b * norm))
}

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 = identical, 0 = orthogonal, -1 = opposite.
/// Returns 0.0 if the vectors differ in length or either is empty or zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom) as f32
}

/// Reciprocal Rank Fusion over ranked lists of segment positions.
///
/// Each position's fused score is the sum of `1/(k + rank)` across the lists
/// it appears in (rank is 1-based). Results are sorted by fused score
/// descending, ties broken by lower position (earlier start).
pub fn reciprocal_rank_fusion(rankings: &[Vec<usize>], k: f64) -> Vec<(usize, f64)> {
    let mut scores: HashMap<usize, f64> = HashMap::new();

    for ranking in rankings {
        for (rank, &pos) in ranking.iter().enumerate() {
            *scores.entry(pos).or_insert(0.0) += 1.0 / (k + rank as f64 + 1.0);
        }
    }

    let mut fused: Vec<(usize, f64)> = scores.into_iter().collect();
    sort_ranked(&mut fused);
    fused
}

/// Sort `(position, score)` pairs by score descending, then position ascending.
pub fn sort_ranked(items: &mut [(usize, f64)]) {
    items.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
}
