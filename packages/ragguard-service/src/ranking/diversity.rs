use std::collections::HashSet;

use ragguard_domain::evidence::{RankedEvidence, ScoredChunk};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiversityPolicy {
	pub max_chunks: usize,
	pub drop_unmapped_chunks: bool,
}
impl DiversityPolicy {
	pub fn from_config(cfg: &ragguard_config::Diversity) -> Self {
		Self {
			max_chunks: cfg.max_chunks as usize,
			drop_unmapped_chunks: cfg.drop_unmapped_chunks,
		}
	}
}

/// Keeps at most one chunk per document, walking `ranked` from the top.
///
/// Chunks `document_of` cannot place are only deduplicated by chunk id unless the policy drops
/// them.
pub fn diversify<F>(
	ranked: &[ScoredChunk],
	document_of: F,
	policy: DiversityPolicy,
) -> RankedEvidence
where
	F: Fn(&str) -> Option<String>,
{
	let mut seen_chunks = HashSet::new();
	let mut seen_documents = HashSet::new();
	let mut out = Vec::with_capacity(policy.max_chunks.min(ranked.len()));

	for candidate in ranked {
		if out.len() >= policy.max_chunks {
			break;
		}
		if seen_chunks.contains(candidate.chunk_id.as_str()) {
			continue;
		}

		match document_of(&candidate.chunk_id) {
			Some(document_id) => {
				if !seen_documents.insert(document_id) {
					continue;
				}
			},
			None if policy.drop_unmapped_chunks => {
				tracing::debug!(chunk_id = %candidate.chunk_id, "Dropping chunk without document.");

				continue;
			},
			None => {},
		}

		seen_chunks.insert(candidate.chunk_id.as_str());
		out.push(candidate.clone());
	}

	out
}

#[cfg(test)]
mod tests {
	use std::collections::HashMap;

	use super::*;

	fn policy(max_chunks: usize) -> DiversityPolicy {
		DiversityPolicy { max_chunks, drop_unmapped_chunks: false }
	}

	fn documents(entries: &[(&str, &str)]) -> HashMap<String, String> {
		entries.iter().map(|(chunk, doc)| (chunk.to_string(), doc.to_string())).collect()
	}

	fn ranked(entries: &[(&str, f64)]) -> Vec<ScoredChunk> {
		entries.iter().map(|(chunk_id, score)| ScoredChunk::new(*chunk_id, *score)).collect()
	}

	#[test]
	fn keeps_best_chunk_per_document() {
		let docs = documents(&[("C1", "A"), ("C2", "A"), ("C3", "B")]);
		let out = diversify(
			&ranked(&[("C1", 0.9), ("C2", 0.8), ("C3", 0.7)]),
			|chunk_id| docs.get(chunk_id).cloned(),
			policy(5),
		);

		assert_eq!(out, ranked(&[("C1", 0.9), ("C3", 0.7)]));
	}

	#[test]
	fn stops_at_budget() {
		let out = diversify(&ranked(&[("C1", 0.9), ("C2", 0.8), ("C3", 0.7)]), |_| None, policy(2));

		assert_eq!(out.len(), 2);
	}

	#[test]
	fn unmapped_chunks_are_only_deduplicated_by_id() {
		let out =
			diversify(&ranked(&[("C1", 0.9), ("C1", 0.9), ("C2", 0.5)]), |_| None, policy(5));

		assert_eq!(out, ranked(&[("C1", 0.9), ("C2", 0.5)]));
	}

	#[test]
	fn strict_policy_drops_unmapped_chunks() {
		let docs = documents(&[("C2", "A")]);
		let strict = DiversityPolicy { max_chunks: 5, drop_unmapped_chunks: true };
		let out = diversify(
			&ranked(&[("C1", 0.9), ("C2", 0.5)]),
			|chunk_id| docs.get(chunk_id).cloned(),
			strict,
		);

		assert_eq!(out, ranked(&[("C2", 0.5)]));
	}
}
