use std::collections::{BTreeSet, HashSet};

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "match", content = "pattern", rename_all = "snake_case")]
pub enum ChunkMatcher {
	Exact(String),
	Prefix(String),
	Contains(String),
}
impl ChunkMatcher {
	/// Builds a matcher from its config spelling. Patterns are compared case-insensitively.
	pub fn parse(kind: &str, pattern: &str) -> Option<Self> {
		let pattern = pattern.trim().to_lowercase();

		match kind {
			"exact" => Some(Self::Exact(pattern)),
			"prefix" => Some(Self::Prefix(pattern)),
			"contains" => Some(Self::Contains(pattern)),
			_ => None,
		}
	}

	pub fn matches(&self, chunk_id: &str) -> bool {
		let chunk_id = chunk_id.to_lowercase();

		match self {
			Self::Exact(pattern) => chunk_id == *pattern,
			Self::Prefix(pattern) => chunk_id.starts_with(pattern.as_str()),
			Self::Contains(pattern) => chunk_id.contains(pattern.as_str()),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessRule {
	pub matcher: ChunkMatcher,
	/// Any one of these roles satisfies the rule.
	pub required_roles: BTreeSet<String>,
}

/// Role requirements per chunk. A chunk is readable when every rule matching it is satisfied by
/// at least one effective role; chunks matched by no rule are readable by everyone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AccessPolicy {
	rules: Vec<AccessRule>,
}
impl AccessPolicy {
	pub fn new(rules: Vec<AccessRule>) -> Self {
		Self { rules }
	}

	/// Rules with an unknown match kind are skipped; config validation rejects them earlier.
	pub fn from_config(cfg: &ragguard_config::Access) -> Self {
		let rules = cfg
			.rules
			.iter()
			.filter_map(|rule| {
				let matcher = ChunkMatcher::parse(&rule.match_kind, &rule.pattern)?;
				let required_roles =
					rule.required_roles.iter().map(|role| role.trim().to_string()).collect();

				Some(AccessRule { matcher, required_roles })
			})
			.collect();

		Self::new(rules)
	}

	pub fn rules(&self) -> &[AccessRule] {
		&self.rules
	}

	pub fn is_permitted(&self, effective_roles: &BTreeSet<String>, chunk_id: &str) -> bool {
		self.rules.iter().filter(|rule| rule.matcher.matches(chunk_id)).all(|rule| {
			rule.required_roles.iter().any(|role| effective_roles.contains(role))
		})
	}

	/// The readable subset of `chunk_ids`, in input order and without duplicates.
	pub fn permitted_chunks<'a, I>(
		&self,
		effective_roles: &BTreeSet<String>,
		chunk_ids: I,
	) -> PermittedChunks
	where
		I: IntoIterator<Item = &'a str>,
	{
		let mut out = PermittedChunks::default();

		for chunk_id in chunk_ids {
			if self.is_permitted(effective_roles, chunk_id) {
				out.insert(chunk_id);
			}
		}

		out
	}
}

/// A set of chunk ids that remembers insertion order, so retrieval can break ties
/// deterministically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermittedChunks {
	ids: Vec<String>,
	members: HashSet<String>,
}
impl PermittedChunks {
	pub fn insert(&mut self, chunk_id: &str) -> bool {
		if !self.members.insert(chunk_id.to_string()) {
			return false;
		}

		self.ids.push(chunk_id.to_string());

		true
	}

	pub fn contains(&self, chunk_id: &str) -> bool {
		self.members.contains(chunk_id)
	}

	pub fn len(&self) -> usize {
		self.ids.len()
	}

	pub fn is_empty(&self) -> bool {
		self.ids.is_empty()
	}

	pub fn as_slice(&self) -> &[String] {
		&self.ids
	}

	pub fn iter(&self) -> impl Iterator<Item = &str> {
		self.ids.iter().map(String::as_str)
	}
}
impl<'a> FromIterator<&'a str> for PermittedChunks {
	fn from_iter<T: IntoIterator<Item = &'a str>>(iter: T) -> Self {
		let mut out = Self::default();

		for chunk_id in iter {
			out.insert(chunk_id);
		}

		out
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn roles(names: &[&str]) -> BTreeSet<String> {
		names.iter().map(|name| name.to_string()).collect()
	}

	fn reference_policy() -> AccessPolicy {
		AccessPolicy::new(vec![
			AccessRule {
				matcher: ChunkMatcher::Contains("finance".to_string()),
				required_roles: roles(&["finance_manager"]),
			},
			AccessRule {
				matcher: ChunkMatcher::Contains("engineering".to_string()),
				required_roles: roles(&["admin"]),
			},
		])
	}

	const CHUNKS: [&str; 4] =
		["FINANCE_CHUNK_12", "ENGINEERING_CHUNK_10", "HR_CHUNK_1", "FINANCE_ENGINEERING_CHUNK_3"];

	#[test]
	fn unmatched_chunks_are_default_permit() {
		let permitted = reference_policy().permitted_chunks(&roles(&["intern"]), CHUNKS);

		assert_eq!(permitted.as_slice(), &["HR_CHUNK_1".to_string()]);
	}

	#[test]
	fn matching_is_case_insensitive() {
		let permitted = reference_policy()
			.permitted_chunks(&roles(&["finance_manager"]), ["finance_q3", "Finance_Q4"]);

		assert_eq!(permitted.len(), 2);
	}

	#[test]
	fn every_matching_rule_must_be_satisfied() {
		let policy = reference_policy();
		let finance_only = policy.permitted_chunks(&roles(&["finance_manager"]), CHUNKS);
		let both = policy.permitted_chunks(&roles(&["finance_manager", "admin"]), CHUNKS);

		assert!(!finance_only.contains("FINANCE_ENGINEERING_CHUNK_3"));
		assert!(both.contains("FINANCE_ENGINEERING_CHUNK_3"));
		assert_eq!(both.len(), 4);
	}

	#[test]
	fn duplicates_collapse_in_first_seen_order() {
		let permitted = AccessPolicy::default().permitted_chunks(&roles(&[]), ["b", "a", "b"]);

		assert_eq!(permitted.as_slice(), &["b".to_string(), "a".to_string()]);
	}

	#[test]
	fn prefix_and_exact_matchers() {
		let policy = AccessPolicy::new(vec![
			AccessRule {
				matcher: ChunkMatcher::Prefix("legal_".to_string()),
				required_roles: roles(&["counsel"]),
			},
			AccessRule {
				matcher: ChunkMatcher::Exact("board_minutes".to_string()),
				required_roles: roles(&["admin"]),
			},
		]);
		let permitted = policy
			.permitted_chunks(&roles(&["counsel"]), ["legal_1", "paralegal_1", "board_minutes"]);

		assert_eq!(permitted.as_slice(), &["legal_1".to_string(), "paralegal_1".to_string()]);
	}

	#[test]
	fn parses_config_spelling() {
		assert_eq!(
			ChunkMatcher::parse("prefix", " Legal_ "),
			Some(ChunkMatcher::Prefix("legal_".to_string()))
		);
		assert_eq!(ChunkMatcher::parse("regex", "x"), None);
	}
}
