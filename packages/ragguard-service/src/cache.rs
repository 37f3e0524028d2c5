use std::{
	collections::{HashMap, VecDeque},
	sync::{Arc, Mutex},
};

use ragguard_domain::access::PermittedChunks;

#[derive(Debug, Default)]
struct CacheState {
	policy_version: String,
	corpus_version: String,
	entries: HashMap<String, Arc<PermittedChunks>>,
	order: VecDeque<String>,
}
impl CacheState {
	fn matches(&self, policy_version: &str, corpus_version: &str) -> bool {
		self.policy_version == policy_version && self.corpus_version == corpus_version
	}
}

/// Permitted chunk sets keyed by canonical role, valid for exactly one
/// (policy version, corpus version) pair.
///
/// Storing an entry under a different pair drops everything cached for the old one, so a set
/// computed under a replaced policy is never served.
#[derive(Debug)]
pub struct PermittedCache {
	max_entries: usize,
	state: Mutex<CacheState>,
}
impl PermittedCache {
	pub fn new(max_entries: usize) -> Self {
		Self { max_entries: max_entries.max(1), state: Mutex::new(CacheState::default()) }
	}

	pub fn get(
		&self,
		policy_version: &str,
		corpus_version: &str,
		role: &str,
	) -> Option<Arc<PermittedChunks>> {
		let state = self.state.lock().unwrap_or_else(|err| err.into_inner());

		if !state.matches(policy_version, corpus_version) {
			return None;
		}

		state.entries.get(role).cloned()
	}

	pub fn insert(
		&self,
		policy_version: &str,
		corpus_version: &str,
		role: &str,
		permitted: Arc<PermittedChunks>,
	) {
		let mut state = self.state.lock().unwrap_or_else(|err| err.into_inner());

		if !state.matches(policy_version, corpus_version) {
			if !state.entries.is_empty() {
				tracing::info!(
					evicted = state.entries.len(),
					policy_version,
					corpus_version,
					"Permitted cache invalidated."
				);
			}

			*state = CacheState {
				policy_version: policy_version.to_string(),
				corpus_version: corpus_version.to_string(),
				..CacheState::default()
			};
		}
		if state.entries.insert(role.to_string(), permitted).is_none() {
			state.order.push_back(role.to_string());
		}

		while state.entries.len() > self.max_entries {
			let Some(oldest) = state.order.pop_front() else { break };

			state.entries.remove(&oldest);
		}
	}

	pub fn len(&self) -> usize {
		self.state.lock().unwrap_or_else(|err| err.into_inner()).entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn permitted(ids: &[&str]) -> Arc<PermittedChunks> {
		Arc::new(ids.iter().copied().collect())
	}

	#[test]
	fn serves_only_matching_versions() {
		let cache = PermittedCache::new(8);

		cache.insert("p1", "c1", "intern", permitted(&["HR_1"]));

		assert!(cache.get("p1", "c1", "intern").is_some());
		assert!(cache.get("p2", "c1", "intern").is_none());
		assert!(cache.get("p1", "c2", "intern").is_none());
		assert!(cache.get("p1", "c1", "admin").is_none());
	}

	#[test]
	fn new_version_evicts_old_entries() {
		let cache = PermittedCache::new(8);

		cache.insert("p1", "c1", "intern", permitted(&["HR_1"]));
		cache.insert("p1", "c1", "admin", permitted(&["HR_1", "FINANCE_1"]));
		cache.insert("p2", "c1", "intern", permitted(&[]));

		assert_eq!(cache.len(), 1);
		assert!(cache.get("p1", "c1", "admin").is_none());
		assert_eq!(cache.get("p2", "c1", "intern").map(|set| set.len()), Some(0));
	}

	#[test]
	fn bounded_by_max_entries() {
		let cache = PermittedCache::new(2);

		cache.insert("p", "c", "a", permitted(&["1"]));
		cache.insert("p", "c", "b", permitted(&["2"]));
		cache.insert("p", "c", "c", permitted(&["3"]));

		assert_eq!(cache.len(), 2);
		assert!(cache.get("p", "c", "a").is_none());
		assert!(cache.get("p", "c", "c").is_some());
	}
}
