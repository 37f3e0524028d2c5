use ragguard_config::Config;
use ragguard_domain::{access::AccessPolicy, roles::RoleGraph};

use crate::{Error, Result};

/// Role graph and access rules compiled from one config load. Requests hold an `Arc` to a single
/// snapshot for their whole lifetime; reloads swap in a new one.
#[derive(Debug, Clone)]
pub struct PolicySnapshot {
	version: String,
	roles: RoleGraph,
	access: AccessPolicy,
}
impl PolicySnapshot {
	pub fn from_config(cfg: &Config) -> Result<Self> {
		let roles = RoleGraph::from_config(cfg);
		let access = AccessPolicy::from_config(&cfg.access);
		let payload = serde_json::json!({
			"roles": cfg.roles,
			"role_aliases": cfg.role_aliases,
			"access": access,
		});
		let version = hash_policy_snapshot(&payload)?;

		Ok(Self { version, roles, access })
	}

	pub fn version(&self) -> &str {
		&self.version
	}

	pub fn roles(&self) -> &RoleGraph {
		&self.roles
	}

	pub fn access(&self) -> &AccessPolicy {
		&self.access
	}
}

pub fn hash_policy_snapshot(payload: &serde_json::Value) -> Result<String> {
	let raw = serde_json::to_vec(payload).map_err(|err| Error::InvalidConfig {
		message: format!("Failed to encode policy snapshot: {err}"),
	})?;

	Ok(blake3::hash(&raw).to_hex().to_string())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn version_tracks_policy_tables_only() {
		let cfg = ragguard_testkit::sample_config().expect("sample config loads");
		let base = PolicySnapshot::from_config(&cfg).expect("snapshot builds");
		let mut retuned = cfg.clone();

		retuned.retrieval.top_k += 1;

		let same = PolicySnapshot::from_config(&retuned).expect("snapshot builds");
		let mut restricted = cfg;

		restricted.access.rules.push(ragguard_config::AccessRule {
			match_kind: "prefix".to_string(),
			pattern: "legal_".to_string(),
			required_roles: vec!["admin".to_string()],
		});

		let changed = PolicySnapshot::from_config(&restricted).expect("snapshot builds");

		assert_eq!(base.version(), same.version());
		assert_ne!(base.version(), changed.version());
		assert_eq!(base.version().len(), 64);
	}
}
