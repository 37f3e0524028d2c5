use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// One retrieved chunk and its score: a cosine similarity per variant, a sum once aggregated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
	pub chunk_id: String,
	pub score: f64,
}
impl ScoredChunk {
	pub fn new(chunk_id: impl Into<String>, score: f64) -> Self {
		Self { chunk_id: chunk_id.into(), score }
	}
}

/// Scored chunks ordered by descending score.
pub type RankedEvidence = Vec<ScoredChunk>;

/// Descending comparison that sorts NaN last.
pub fn cmp_score_desc(a: f64, b: f64) -> Ordering {
	match (a.is_nan(), b.is_nan()) {
		(true, true) => Ordering::Equal,
		(true, false) => Ordering::Greater,
		(false, true) => Ordering::Less,
		(false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
	}
}
