use std::collections::HashMap;

use ragguard_domain::evidence::{self, RankedEvidence, ScoredChunk};

#[derive(Debug, Default)]
struct Contributions {
	scores: Vec<f64>,
	best_rank: usize,
}
impl Contributions {
	// Summing in a canonical order makes the total independent of arrival order.
	fn total(&mut self) -> f64 {
		self.scores.sort_by(f64::total_cmp);

		self.scores.iter().sum()
	}
}

/// Merges per-variant result lists by summing every occurrence of a chunk's score.
///
/// The output does not depend on the order of `per_variant`. Equal totals are ordered by how
/// many occurrences a chunk has, then by its best rank within any list, then by chunk id.
pub fn aggregate(per_variant: &[Vec<ScoredChunk>]) -> RankedEvidence {
	let mut by_chunk: HashMap<&str, Contributions> = HashMap::new();

	for results in per_variant {
		for (rank, hit) in results.iter().enumerate() {
			let entry = by_chunk
				.entry(hit.chunk_id.as_str())
				.or_insert_with(|| Contributions { scores: Vec::new(), best_rank: rank });

			entry.scores.push(hit.score);
			entry.best_rank = entry.best_rank.min(rank);
		}
	}

	let mut merged: Vec<(ScoredChunk, usize, usize)> = by_chunk
		.into_iter()
		.map(|(chunk_id, mut contributions)| {
			let total = contributions.total();

			(ScoredChunk::new(chunk_id, total), contributions.scores.len(), contributions.best_rank)
		})
		.collect();

	merged.sort_by(|(a, a_hits, a_rank), (b, b_hits, b_rank)| {
		evidence::cmp_score_desc(a.score, b.score)
			.then_with(|| b_hits.cmp(a_hits))
			.then_with(|| a_rank.cmp(b_rank))
			.then_with(|| a.chunk_id.cmp(&b.chunk_id))
	});

	merged.into_iter().map(|(chunk, _, _)| chunk).collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn hits(entries: &[(&str, f64)]) -> Vec<ScoredChunk> {
		entries.iter().map(|(chunk_id, score)| ScoredChunk::new(*chunk_id, *score)).collect()
	}

	#[test]
	fn sums_across_variants() {
		let ranked = aggregate(&[hits(&[("C1", 0.5)]), hits(&[("C1", 0.4)])]);

		assert_eq!(ranked, vec![ScoredChunk::new("C1", 0.9)]);
	}

	#[test]
	fn corroborated_chunk_outranks_single_peak() {
		let ranked = aggregate(&[
			hits(&[("PEAK", 0.95), ("AGREED", 0.6)]),
			hits(&[("AGREED", 0.55)]),
			hits(&[("AGREED", 0.5)]),
		]);

		assert_eq!(ranked[0].chunk_id, "AGREED");
		assert_eq!(ranked[1].chunk_id, "PEAK");
	}

	#[test]
	fn repeated_hits_in_one_list_all_count() {
		let ranked = aggregate(&[hits(&[("C1", 0.25), ("C1", 0.25)])]);

		assert_eq!(ranked, vec![ScoredChunk::new("C1", 0.5)]);
	}

	#[test]
	fn equal_totals_prefer_better_rank_then_id() {
		let by_rank = aggregate(&[hits(&[("B", 0.5), ("A", 0.5)]), hits(&[("C", 1.0)])]);
		let by_id = aggregate(&[hits(&[("B", 0.5)]), hits(&[("A", 0.5)])]);
		let ids = |ranked: &RankedEvidence| -> Vec<String> {
			ranked.iter().map(|chunk| chunk.chunk_id.clone()).collect()
		};

		assert_eq!(ids(&by_rank), vec!["C", "B", "A"]);
		assert_eq!(ids(&by_id), vec!["A", "B"]);
	}

	#[test]
	fn list_order_does_not_matter() {
		let lists = [
			hits(&[("C1", 0.1), ("C2", 0.7), ("C3", 0.3)]),
			hits(&[("C2", 0.2), ("C3", 0.6)]),
			hits(&[("C3", 0.1), ("C1", 0.7)]),
		];
		let reference = aggregate(&lists);

		for rotation in 1..lists.len() {
			let mut rotated = lists.to_vec();

			rotated.rotate_left(rotation);

			assert_eq!(aggregate(&rotated), reference);
		}
	}

	#[test]
	fn empty_input_yields_empty_evidence() {
		assert!(aggregate(&[]).is_empty());
		assert!(aggregate(&[Vec::new(), Vec::new()]).is_empty());
	}
}
