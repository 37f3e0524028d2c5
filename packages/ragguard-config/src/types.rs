use std::{
	collections::{BTreeMap, BTreeSet},
	path::PathBuf,
};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	pub retrieval: Retrieval,
	pub diversity: Diversity,
	pub gate: Gate,
	pub normalizer: Option<Normalizer>,
	pub roles: BTreeMap<String, RoleDefinition>,
	#[serde(default)]
	pub role_aliases: BTreeMap<String, String>,
	#[serde(default)]
	pub access: Access,
	#[serde(default)]
	pub cache: Cache,
	#[serde(default)]
	pub security: Security,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub admin_bind: String,
	#[serde(default = "default_log_level")]
	pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
	pub corpus_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Retrieval {
	pub top_k: u32,
	pub timeout_ms: u64,
	#[serde(default = "default_max_concurrency")]
	pub max_concurrency: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Diversity {
	pub max_chunks: u32,
	/// Drop chunks that have no document mapping instead of keeping them unconstrained.
	#[serde(default)]
	pub drop_unmapped_chunks: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Gate {
	pub min_top_score: f64,
	pub min_chunk_count: u32,
}

/// Query rewriting tables. Every table is optional; an absent `[normalizer]` section disables
/// all rewriting except cleaning.
#[derive(Debug, Clone, Deserialize)]
pub struct Normalizer {
	#[serde(default)]
	pub abbreviations: BTreeMap<String, String>,
	#[serde(default)]
	pub synonyms: BTreeMap<String, String>,
	#[serde(default)]
	pub important_terms: BTreeSet<String>,
	#[serde(default = "default_stop_words")]
	pub stop_words: BTreeSet<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RoleDefinition {
	#[serde(default)]
	pub inherits: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Access {
	#[serde(default)]
	pub rules: Vec<AccessRule>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccessRule {
	#[serde(rename = "match")]
	pub match_kind: String,
	pub pattern: String,
	pub required_roles: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Cache {
	pub enabled: bool,
	pub max_entries: u32,
}
impl Default for Cache {
	fn default() -> Self {
		Self { enabled: true, max_entries: 256 }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Security {
	pub bind_localhost_only: bool,
	pub admin_auth_token: Option<String>,
}
impl Default for Security {
	fn default() -> Self {
		Self { bind_localhost_only: true, admin_auth_token: None }
	}
}

pub fn default_stop_words() -> BTreeSet<String> {
	[
		"the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "is", "are",
		"was", "were",
	]
	.into_iter()
	.map(str::to_string)
	.collect()
}

fn default_log_level() -> String {
	"info".to_string()
}

fn default_max_concurrency() -> u32 {
	4
}
