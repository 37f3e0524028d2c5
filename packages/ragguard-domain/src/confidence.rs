use crate::evidence::ScoredChunk;

/// Rejects evidence too weak to answer from. Thresholds depend on the embedding model and
/// corpus, so they are always supplied by configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceGate {
	pub min_top_score: f64,
	pub min_chunk_count: usize,
}
impl ConfidenceGate {
	pub fn new(min_top_score: f64, min_chunk_count: usize) -> Self {
		Self { min_top_score, min_chunk_count }
	}

	pub fn from_config(cfg: &ragguard_config::Gate) -> Self {
		Self::new(cfg.min_top_score, cfg.min_chunk_count as usize)
	}

	pub fn is_confident(&self, evidence: &[ScoredChunk]) -> bool {
		is_confident(evidence, self.min_top_score, self.min_chunk_count)
	}
}

pub fn is_confident(evidence: &[ScoredChunk], min_top_score: f64, min_chunk_count: usize) -> bool {
	let Some(top_score) = top_score(evidence) else { return false };

	if top_score.is_nan() || top_score < min_top_score {
		return false;
	}
	if evidence.len() < min_chunk_count {
		return false;
	}

	true
}

/// Highest score in the evidence. Equal to the first entry for ranked input.
pub fn top_score(evidence: &[ScoredChunk]) -> Option<f64> {
	evidence.iter().map(|chunk| chunk.score).reduce(f64::max)
}
