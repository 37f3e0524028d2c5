mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Access, AccessRule, Cache, Config, Diversity, EmbeddingProviderConfig, Gate, Normalizer,
	Providers, Retrieval, RoleDefinition, Security, Service, Storage, default_stop_words,
};

use std::{fs, path::Path};

pub const ACCESS_MATCH_KINDS: [&str; 3] = ["exact", "prefix", "contains"];

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;
	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::invalid("service.http_bind", "must be non-empty."));
	}
	if cfg.service.admin_bind.trim().is_empty() {
		return Err(Error::invalid("service.admin_bind", "must be non-empty."));
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::invalid("providers.embedding.dimensions", "must be greater than zero."));
	}
	if cfg.providers.embedding.api_key.trim().is_empty() {
		return Err(Error::invalid("providers.embedding.api_key", "must be non-empty."));
	}
	if cfg.retrieval.top_k == 0 {
		return Err(Error::invalid("retrieval.top_k", "must be greater than zero."));
	}
	if cfg.retrieval.timeout_ms == 0 {
		return Err(Error::invalid("retrieval.timeout_ms", "must be greater than zero."));
	}
	if cfg.retrieval.max_concurrency == 0 {
		return Err(Error::invalid("retrieval.max_concurrency", "must be greater than zero."));
	}
	if cfg.diversity.max_chunks == 0 {
		return Err(Error::invalid("diversity.max_chunks", "must be greater than zero."));
	}
	if !cfg.gate.min_top_score.is_finite() {
		return Err(Error::invalid("gate.min_top_score", "must be a finite number."));
	}
	if cfg.gate.min_top_score < 0.0 {
		return Err(Error::invalid("gate.min_top_score", "must be zero or greater."));
	}
	if cfg.cache.enabled && cfg.cache.max_entries == 0 {
		return Err(Error::invalid(
			"cache.max_entries",
			"must be greater than zero when the cache is enabled.",
		));
	}

	validate_roles(cfg)?;
	validate_access(cfg)?;

	if let Some(normalizer) = cfg.normalizer.as_ref() {
		for (abbreviation, expansion) in &normalizer.abbreviations {
			if abbreviation.trim().is_empty() || expansion.trim().is_empty() {
				return Err(Error::invalid(
					"normalizer.abbreviations",
					"must not contain blank keys or values.",
				));
			}
		}
		for (term, replacement) in &normalizer.synonyms {
			if term.split_whitespace().count() != 1 || replacement.trim().is_empty() {
				return Err(Error::invalid(
					"normalizer.synonyms",
					"keys must be single words and values must be non-empty.",
				));
			}
		}
	}

	Ok(())
}

fn validate_roles(cfg: &Config) -> Result<()> {
	if cfg.roles.is_empty() {
		return Err(Error::invalid("roles", "must define at least one role."));
	}

	for (name, definition) in &cfg.roles {
		if name.trim().is_empty() {
			return Err(Error::invalid("roles", "must not contain a blank role name."));
		}
		if definition.inherits.iter().any(|parent| parent.trim().is_empty()) {
			return Err(Error::invalid(
				format!("roles.{name}.inherits"),
				"must not contain blank role names.",
			));
		}
	}
	for (alias, canonical) in &cfg.role_aliases {
		if cfg.roles.contains_key(alias) {
			return Err(Error::invalid(
				format!("role_aliases.{alias}"),
				"must not shadow a defined role.",
			));
		}
		if cfg.role_aliases.contains_key(canonical) {
			return Err(Error::invalid(
				format!("role_aliases.{alias}"),
				format!("points at another alias {canonical:?}."),
			));
		}
		if !cfg.roles.contains_key(canonical) {
			return Err(Error::invalid(
				format!("role_aliases.{alias}"),
				format!("points at undefined role {canonical:?}."),
			));
		}
	}

	Ok(())
}

fn validate_access(cfg: &Config) -> Result<()> {
	for (idx, rule) in cfg.access.rules.iter().enumerate() {
		let field = format!("access.rules[{idx}]");

		if !ACCESS_MATCH_KINDS.contains(&rule.match_kind.as_str()) {
			return Err(Error::invalid(
				format!("{field}.match"),
				"must be one of exact, prefix, or contains.",
			));
		}
		if rule.pattern.trim().is_empty() {
			return Err(Error::invalid(format!("{field}.pattern"), "must be non-empty."));
		}
		if rule.required_roles.is_empty() {
			return Err(Error::invalid(
				format!("{field}.required_roles"),
				"must name at least one role.",
			));
		}
		if rule.required_roles.iter().any(|role| role.trim().is_empty()) {
			return Err(Error::invalid(
				format!("{field}.required_roles"),
				"must not contain blank role names.",
			));
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg
		.security
		.admin_auth_token
		.as_deref()
		.map(|token| token.trim().is_empty())
		.unwrap_or(false)
	{
		cfg.security.admin_auth_token = None;
	}

	if let Some(normalizer) = cfg.normalizer.as_mut() {
		normalizer.abbreviations = normalizer
			.abbreviations
			.iter()
			.map(|(key, value)| (key.trim().to_lowercase(), value.trim().to_lowercase()))
			.collect();
		normalizer.synonyms = normalizer
			.synonyms
			.iter()
			.map(|(key, value)| (key.trim().to_lowercase(), value.trim().to_lowercase()))
			.collect();
		normalizer.important_terms =
			normalizer.important_terms.iter().map(|term| term.trim().to_lowercase()).collect();
		normalizer.stop_words =
			normalizer.stop_words.iter().map(|word| word.trim().to_lowercase()).collect();
	}
}
