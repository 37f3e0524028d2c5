use ragguard_domain::{
	access::PermittedChunks,
	evidence::{self, ScoredChunk},
};

use crate::{Result, VectorIndex};

/// Top `top_k` permitted chunks by cosine similarity to `query_embedding`.
///
/// Only ids in `permitted` are ever scored; anything else the index returns is ignored. Ids the
/// index has no embedding for are skipped. Equal scores keep the order of `permitted`.
pub async fn retrieve(
	query_embedding: &[f32],
	permitted: &PermittedChunks,
	index: &dyn VectorIndex,
	top_k: usize,
) -> Result<Vec<ScoredChunk>> {
	if permitted.is_empty() || top_k == 0 {
		return Ok(Vec::new());
	}

	let embeddings = index.lookup(permitted.as_slice()).await?;
	let mut scored = Vec::with_capacity(embeddings.len().min(permitted.len()));
	let mut missing = 0_usize;

	for chunk_id in permitted.iter() {
		let Some(embedding) = embeddings.get(chunk_id) else {
			missing += 1;

			continue;
		};
		let Some(score) = cosine_similarity(query_embedding, embedding) else {
			tracing::warn!(
				chunk_id,
				query_dim = query_embedding.len(),
				chunk_dim = embedding.len(),
				"Skipping chunk with incomparable embedding."
			);

			continue;
		};

		scored.push(ScoredChunk::new(chunk_id, score));
	}

	if missing > 0 {
		tracing::debug!(missing, "Permitted chunks without an indexed embedding.");
	}

	scored.sort_by(|a, b| evidence::cmp_score_desc(a.score, b.score));
	scored.truncate(top_k);

	Ok(scored)
}

/// Cosine similarity in `[-1, 1]`, or `None` for empty, mismatched or zero-norm vectors.
pub fn cosine_similarity(lhs: &[f32], rhs: &[f32]) -> Option<f64> {
	if lhs.is_empty() || lhs.len() != rhs.len() {
		return None;
	}

	let mut dot = 0.0_f64;
	let mut lhs_norm = 0.0_f64;
	let mut rhs_norm = 0.0_f64;

	for (l, r) in lhs.iter().zip(rhs.iter()) {
		let (l, r) = (f64::from(*l), f64::from(*r));

		dot += l * r;
		lhs_norm += l * l;
		rhs_norm += r * r;
	}

	if lhs_norm <= f64::EPSILON || rhs_norm <= f64::EPSILON {
		return None;
	}

	let similarity = dot / (lhs_norm.sqrt() * rhs_norm.sqrt());

	if similarity.is_nan() {
		return None;
	}

	Some(similarity.clamp(-1.0, 1.0))
}
