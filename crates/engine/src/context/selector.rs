//! Context selection — the minimal sufficient slice of a lecture for one query.
//!
//! # Algorithm
//!
//! 1. Gather anchor candidates (a window around a time, a range, or a slide)
//! 2. Union with similarity candidates, scores normalised to `(0, 1]`
//! 3. Relevance = anchor score + similarity score
//! 4. Accept greedily by relevance, pulling in adjacent same-slide segments
//! 5. Stop when the budget is spent or candidates run out
//!
//! If nothing matched at all, the lecture is walked from the start instead.
//! Selection is deterministic: identical inputs give identical bundles.

use std::collections::{BTreeSet, HashMap, HashSet};

use lectern_config::ContextConfig;
use lectern_core::{Anchor, ContextBundle, Error, Query, Result};
use lectern_index::Index;
use tracing::debug;

use crate::context::token::{segment_cost, slide_cost};

/// Picks context bundles under a token budget. Stateless; create one and reuse it.
#[derive(Debug, Clone)]
pub struct ContextSelector {
    anchor_window: f64,
    similarity_k: usize,
}

impl ContextSelector {
    pub fn new(config: &ContextConfig) -> Self {
        Self {
            anchor_window: config.anchor_window_secs,
            similarity_k: config.similarity_k,
        }
    }

    /// Select a bundle for `query`. Never exceeds `query.token_budget`.
    pub fn select(&self, index: &Index, query: &Query) -> Result<ContextBundle> {
        if index.is_empty() {
            return Err(Error::EmptyContext(format!(
                "lecture {} has no segments",
                index.id()
            )));
        }
        if query.token_budget == 0 {
            return Err(Error::EmptyContext("token budget is zero".into()));
        }

        let ranked = self.rank_candidates(index, query);
        let mut fill = Fill::new(index, query.token_budget);

        for &(pos, _) in &ranked {
            if fill.try_accept(pos) {
                fill.extend_slide_run(pos);
            }
        }

        if fill.accepted.is_empty() {
            debug!(
                lecture_id = %index.id(),
                candidates = ranked.len(),
                "No candidate fit, walking lecture from the start"
            );
            for pos in 0..index.len() {
                if !fill.try_accept(pos) {
                    break;
                }
            }
        }

        if fill.accepted.is_empty() {
            return Err(Error::EmptyContext(format!(
                "token budget {} is too small for any segment",
                query.token_budget
            )));
        }

        let bundle = fill.into_bundle();
        debug!(
            lecture_id = %index.id(),
            segments = bundle.segments.len(),
            slides = bundle.slides.len(),
            tokens = bundle.token_estimate,
            budget = bundle.budget,
            "Selected context"
        );
        Ok(bundle)
    }

    /// Candidate positions with relevance, best first (ties: earlier start).
    fn rank_candidates(&self, index: &Index, query: &Query) -> Vec<(usize, f64)> {
        let mut relevance: HashMap<usize, f64> = HashMap::new();

        if let Some(anchor) = &query.anchor {
            for (pos, score) in self.anchor_candidates(index, anchor) {
                *relevance.entry(pos).or_insert(0.0) += score;
            }
        }

        if !query.text.trim().is_empty() {
            let hits = index.query_hybrid(&query.text, query.embedding.as_deref(), self.similarity_k);
            let top = hits.first().map(|(_, s)| *s).unwrap_or(0.0);
            if top > 0.0 {
                for (segment, score) in hits {
                    if let Some(pos) = index.position(&segment.id) {
                        *relevance.entry(pos).or_insert(0.0) += score / top;
                    }
                }
            }
        }

        let mut ranked: Vec<(usize, f64)> = relevance.into_iter().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked
    }

    fn anchor_candidates(&self, index: &Index, anchor: &Anchor) -> Vec<(usize, f64)> {
        match *anchor {
            Anchor::Time { at } => {
                let w = self.anchor_window;
                index
                    .positions_by_time(at - w, at + w)
                    .filter_map(|pos| {
                        let seg = index.get(pos)?;
                        let distance = if seg.start_time <= at && at <= seg.end_time {
                            0.0
                        } else {
                            (seg.start_time - at).abs().min((seg.end_time - at).abs())
                        };
                        Some((pos, (1.0 - distance / w).max(0.0)))
                    })
                    .collect()
            }
            Anchor::Range { start, end } => index
                .positions_by_time(start, end)
                .map(|pos| (pos, 1.0))
                .collect(),
            Anchor::Slide { index: slide } => index
                .positions_for_slide(slide)
                .iter()
                .map(|&pos| (pos, 1.0))
                .collect(),
        }
    }
}

/// Running state of one greedy fill.
struct Fill<'a> {
    index: &'a Index,
    budget: usize,
    used: usize,
    accepted: BTreeSet<usize>,
    slides: HashSet<usize>,
}

impl<'a> Fill<'a> {
    fn new(index: &'a Index, budget: usize) -> Self {
        Self {
            index,
            budget,
            used: 0,
            accepted: BTreeSet::new(),
            slides: HashSet::new(),
        }
    }

    /// Cost of adding `pos`, including its slide header the first time the slide appears.
    fn cost(&self, pos: usize) -> Option<usize> {
        let seg = self.index.get(pos)?;
        let header = match seg.slide_reference {
            Some(n) if !self.slides.contains(&n) => {
                self.index.slide(n).map(slide_cost).unwrap_or(0)
            }
            _ => 0,
        };
        Some(segment_cost(seg) + header)
    }

    /// Accept `pos` if it fits. Already-accepted positions count as accepted.
    fn try_accept(&mut self, pos: usize) -> bool {
        if self.accepted.contains(&pos) {
            return true;
        }
        let Some(cost) = self.cost(pos) else {
            return false;
        };
        if self.used + cost > self.budget {
            return false;
        }
        self.used += cost;
        self.accepted.insert(pos);
        if let Some(n) = self.index.get(pos).and_then(|s| s.slide_reference) {
            self.slides.insert(n);
        }
        true
    }

    /// Grow outward from `pos` over neighbours that share its slide.
    fn extend_slide_run(&mut self, pos: usize) {
        let Some(slide) = self.index.get(pos).and_then(|s| s.slide_reference) else {
            return;
        };
        let index = self.index;
        let same_slide = |i: usize| index.get(i).and_then(|s| s.slide_reference) == Some(slide);

        let (mut left, mut right) = (Some(pos), Some(pos));
        while left.is_some() || right.is_some() {
            if let Some(l) = left {
                left = l
                    .checked_sub(1)
                    .filter(|&i| same_slide(i))
                    .filter(|&i| self.try_accept(i));
            }
            if let Some(r) = right {
                right = Some(r + 1)
                    .filter(|&i| same_slide(i))
                    .filter(|&i| self.try_accept(i));
            }
        }
    }

    fn into_bundle(self) -> ContextBundle {
        let segments: Vec<_> = self
            .accepted
            .iter()
            .filter_map(|&pos| self.index.get(pos).cloned())
            .collect();

        let mut slide_numbers: Vec<usize> = self.slides.into_iter().collect();
        slide_numbers.sort_unstable();
        let slides = slide_numbers
            .into_iter()
            .filter_map(|n| self.index.slide(n).cloned())
            .collect();

        let mut image_refs: Vec<String> = Vec::new();
        for seg in &segments {
            let refs = seg
                .image_refs
                .iter()
                .chain(seg.frame_reference.iter().map(|f| &f.image));
            for r in refs {
                if !image_refs.contains(r) {
                    image_refs.push(r.clone());
                }
            }
        }

        ContextBundle {
            segments,
            slides,
            image_refs,
            token_estimate: self.used,
            budget: self.budget,
        }
    }
}
