//! The knowledge index over one normalized lecture.
//!
//! Built once per lecture and read-only afterwards, so any number of
//! selectors can share it behind an `Arc` without locking.
//!
//! - Time queries binary-search the sorted start/end columns.
//! - Similarity queries score a shortlist drawn from an inverted index
//!   (BM25 over spoken text plus down-weighted slide text) and optionally
//!   fuse in embedding similarity with Reciprocal Rank Fusion.

use std::collections::{BTreeMap, HashMap};

use lectern_config::IndexConfig;
use lectern_core::{Lecture, LectureId, Segment, Slide};
use tracing::debug;

use crate::similarity::{
    bm25_idf, bm25_term, cosine_similarity, reciprocal_rank_fusion, sort_ranked,
    term_frequencies, tokenize,
};

#[derive(Debug, Clone, Copy)]
struct Posting {
    segment: usize,
    tf: f64,
}

/// A read-only index over one lecture.
#[derive(Debug)]
pub struct Index {
    lecture: Lecture,
    starts: Vec<f64>,
    ends: Vec<f64>,
    postings: HashMap<String, Vec<Posting>>,
    doc_len: Vec<f64>,
    avg_len: f64,
    positions: HashMap<String, usize>,
    by_slide: BTreeMap<usize, Vec<usize>>,
    config: IndexConfig,
}

/// Build an index over a normalized lecture.
///
/// Segments must be ordered and non-overlapping, as the normalizer produces them.
pub fn build_index(lecture: Lecture, config: &IndexConfig) -> Index {
    let n = lecture.segments.len();
    let mut postings: HashMap<String, Vec<Posting>> = HashMap::new();
    let mut doc_len = Vec::with_capacity(n);
    let mut positions = HashMap::with_capacity(n);
    let mut by_slide: BTreeMap<usize, Vec<usize>> = BTreeMap::new();

    let slide_terms: HashMap<usize, Vec<String>> = lecture
        .slides
        .iter()
        .map(|s| (s.index, tokenize(&s.text)))
        .collect();

    for (i, seg) in lecture.segments.iter().enumerate() {
        let mut tf: HashMap<String, f64> = HashMap::new();
        term_frequencies(&tokenize(&seg.text), 1.0, &mut tf);
        if let Some(terms) = seg.slide_reference.and_then(|s| slide_terms.get(&s)) {
            term_frequencies(terms, config.slide_text_weight, &mut tf);
        }

        doc_len.push(tf.values().sum());
        // Sorted so posting lists are built in a deterministic order
        let mut terms: Vec<(String, f64)> = tf.into_iter().filter(|(_, w)| *w > 0.0).collect();
        terms.sort_by(|a, b| a.0.cmp(&b.0));
        for (term, weight) in terms {
            postings
                .entry(term)
                .or_default()
                .push(Posting { segment: i, tf: weight });
        }

        positions.insert(seg.id.clone(), i);
        if let Some(slide) = seg.slide_reference {
            by_slide.entry(slide).or_default().push(i);
        }
    }

    let avg_len = if n > 0 {
        doc_len.iter().sum::<f64>() / n as f64
    } else {
        0.0
    };

    debug!(
        lecture_id = %lecture.id,
        segments = n,
        terms = postings.len(),
        "Built lecture index"
    );

    Index {
        starts: lecture.segments.iter().map(|s| s.start_time).collect(),
        ends: lecture.segments.iter().map(|s| s.end_time).collect(),
        lecture,
        postings,
        doc_len,
        avg_len,
        positions,
        by_slide,
        config: config.clone(),
    }
}

impl Index {
    pub fn lecture(&self) -> &Lecture {
        &self.lecture
    }

    pub fn id(&self) -> &LectureId {
        &self.lecture.id
    }

    pub fn segments(&self) -> &[Segment] {
        &self.lecture.segments
    }

    pub fn len(&self) -> usize {
        self.lecture.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lecture.segments.is_empty()
    }

    pub fn slide(&self, index: usize) -> Option<&Slide> {
        self.lecture.slide(index)
    }

    /// Position of a segment in start order.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.positions.get(id).copied()
    }

    pub fn get(&self, position: usize) -> Option<&Segment> {
        self.lecture.segments.get(position)
    }

    pub fn get_by_id(&self, id: &str) -> Option<&Segment> {
        self.position(id).and_then(|i| self.get(i))
    }

    /// The segments immediately before and after `position`.
    pub fn neighbours(&self, position: usize) -> (Option<&Segment>, Option<&Segment>) {
        let before = position.checked_sub(1).and_then(|i| self.get(i));
        (before, self.get(position + 1))
    }

    /// Positions of the segments linked to slide `index`, in start order.
    pub fn positions_for_slide(&self, index: usize) -> &[usize] {
        self.by_slide.get(&index).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn segments_for_slide(&self, index: usize) -> Vec<&Segment> {
        self.positions_for_slide(index)
            .iter()
            .filter_map(|&i| self.get(i))
            .collect()
    }

    /// Position range of the segments touching `[start, end)`.
    ///
    /// When `start == end`, the segments containing that instant.
    pub fn positions_by_time(&self, start: f64, end: f64) -> std::ops::Range<usize> {
        if !start.is_finite() || !end.is_finite() || end < start {
            return 0..0;
        }
        let lo = self.ends.partition_point(|&e| e <= start);
        let hi = if start == end {
            self.starts.partition_point(|&s| s <= start)
        } else {
            self.starts.partition_point(|&s| s < end)
        };
        lo..hi.max(lo)
    }

    /// Segments overlapping `[start, end)`, in start order.
    pub fn query_by_time(&self, start: f64, end: f64) -> Vec<&Segment> {
        self.lecture.segments[self.positions_by_time(start, end)]
            .iter()
            .collect()
    }

    /// Lexically similar segments, best first. Ties go to the earlier segment.
    pub fn query_by_similarity(&self, text: &str, k: usize) -> Vec<(&Segment, f64)> {
        self.query_hybrid(text, None, k)
    }

    /// Similarity search fusing BM25 with embedding similarity when available.
    ///
    /// Scores are strictly positive; segments matching neither signal are excluded.
    pub fn query_hybrid(
        &self,
        text: &str,
        embedding: Option<&[f32]>,
        k: usize,
    ) -> Vec<(&Segment, f64)> {
        if k == 0 || self.is_empty() {
            return Vec::new();
        }

        let lexical = self.bm25(text);
        let vector = embedding
            .map(|q| self.vector_ranking(q, &lexical))
            .unwrap_or_default();

        let ranked: Vec<(usize, f64)> = if vector.is_empty() {
            lexical
        } else {
            let lexical_order: Vec<usize> = lexical.iter().map(|(i, _)| *i).collect();
            let vector_order: Vec<usize> = vector.iter().map(|(i, _)| *i).collect();
            reciprocal_rank_fusion(&[lexical_order, vector_order], self.config.rrf_k)
        };

        ranked
            .into_iter()
            .take(k)
            .filter_map(|(i, score)| self.get(i).map(|s| (s, score)))
            .collect()
    }

    /// BM25 over the union of posting lists of the query terms.
    fn bm25(&self, text: &str) -> Vec<(usize, f64)> {
        let mut terms = tokenize(text);
        terms.sort();
        terms.dedup();

        let n = self.len();
        let mut scores: HashMap<usize, f64> = HashMap::new();
        for term in &terms {
            let Some(list) = self.postings.get(term) else {
                continue;
            };
            let idf = bm25_idf(n, list.len());
            for p in list {
                let s = bm25_term(
                    p.tf,
                    idf,
                    self.doc_len[p.segment],
                    self.avg_len,
                    self.config.bm25_k1,
                    self.config.bm25_b,
                );
                *scores.entry(p.segment).or_insert(0.0) += s;
            }
        }

        let mut ranked: Vec<(usize, f64)> = scores.into_iter().filter(|(_, s)| *s > 0.0).collect();
        sort_ranked(&mut ranked);
        ranked
    }

    /// Cosine ranking over the lexical shortlist, or every segment while the
    /// lecture is small.
    fn vector_ranking(&self, query: &[f32], lexical: &[(usize, f64)]) -> Vec<(usize, f64)> {
        let candidates: Vec<usize> = if self.len() < self.config.shortlist_threshold {
            (0..self.len()).collect()
        } else {
            lexical.iter().map(|(i, _)| *i).collect()
        };

        let mut ranked: Vec<(usize, f64)> = candidates
            .into_iter()
            .filter_map(|i| {
                let emb = self.get(i)?.embedding.as_ref()?;
                let sim = cosine_similarity(emb, query) as f64;
                (sim > 0.0).then_some((i, sim))
            })
            .collect();
        sort_ranked(&mut ranked);
        ranked
    }
}
