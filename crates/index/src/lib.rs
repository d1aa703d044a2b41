//! # Lectern Index
//!
//! Turns raw lecture assets into a time-aligned, searchable index.
//!
//! - [`normalize`]: raw transcript/slides/frames into a [`lectern_core::Lecture`]
//! - [`index`]: time and similarity queries over one lecture
//! - [`similarity`]: BM25, cosine and rank-fusion helpers
//! - [`store`]: copy-and-swap snapshots of every ingested lecture

pub mod normalize;
pub mod index;
pub mod similarity;
pub mod store;

pub use normalize::{lecture_id, normalize, parse_transcript, segment_id};
pub use index::{Index, build_index};
pub use store::LectureStore;
