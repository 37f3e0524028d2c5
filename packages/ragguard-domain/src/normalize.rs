use std::{
	collections::{BTreeMap, BTreeSet, HashSet},
	sync::LazyLock,
};

use regex::{Captures, Regex};
use unicode_normalization::UnicodeNormalization;

static VERSUS: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\bvs\b\.?").ok());
static QUARTER_DASH: LazyLock<Option<Regex>> =
	LazyLock::new(|| Regex::new(r"\bq(\d)\s*-\s*q(\d)\b").ok());
static QUARTER_RANGE: LazyLock<Option<Regex>> =
	LazyLock::new(|| Regex::new(r"\bq([1-4]) to q([1-4])\b").ok());

/// Rewriting tables for [`QueryNormalizer`]. Keys and values are expected lowercase.
#[derive(Debug, Clone, Default)]
pub struct NormalizerTables {
	pub abbreviations: BTreeMap<String, String>,
	pub synonyms: BTreeMap<String, String>,
	pub important_terms: BTreeSet<String>,
	pub stop_words: BTreeSet<String>,
}
impl NormalizerTables {
	pub fn from_config(cfg: Option<&ragguard_config::Normalizer>) -> Self {
		let Some(cfg) = cfg else { return Self::default() };

		Self {
			abbreviations: cfg.abbreviations.clone(),
			synonyms: cfg.synonyms.clone(),
			important_terms: cfg.important_terms.clone(),
			stop_words: cfg.stop_words.clone(),
		}
	}
}

#[derive(Debug, Clone)]
pub struct QueryNormalizer {
	tables: NormalizerTables,
	// Cleaned abbreviation keys split into words, longest first.
	abbreviations: Vec<(Vec<String>, String)>,
}
impl QueryNormalizer {
	pub fn new(tables: NormalizerTables) -> Self {
		let mut abbreviations: Vec<(Vec<String>, String)> = tables
			.abbreviations
			.iter()
			.filter_map(|(key, expansion)| {
				let words: Vec<String> =
					clean_text(key).split_whitespace().map(str::to_string).collect();
				let expansion = clean_text(expansion);

				if words.is_empty() || expansion.is_empty() {
					return None;
				}

				Some((words, expansion))
			})
			.collect();

		abbreviations.sort_by(|left, right| right.0.len().cmp(&left.0.len()));

		Self { tables, abbreviations }
	}

	/// Returns the cleaned query first, followed by the stop-word, key-term and synonym
	/// variants. Never empty; a query that cleans to nothing yields a single empty variant.
	pub fn normalize(&self, raw: &str) -> Vec<String> {
		let cleaned = clean_text(raw);
		let expanded = self.expand_abbreviations(&cleaned);
		let query = expand_quarter_ranges(&expanded);
		let candidates = [
			self.remove_stop_words(&query),
			self.extract_key_terms(&query),
			self.expand_synonyms(&query),
		];
		let mut out = Vec::with_capacity(candidates.len() + 1);
		let mut seen = HashSet::new();

		push_variant(&mut out, &mut seen, query);

		for candidate in candidates {
			push_variant(&mut out, &mut seen, candidate);
		}

		if out.is_empty() {
			out.push(String::new());
		}

		out
	}

	pub fn expand_abbreviations(&self, query: &str) -> String {
		if self.abbreviations.is_empty() {
			return query.to_string();
		}

		let words: Vec<&str> = query.split_whitespace().collect();
		let mut out: Vec<&str> = Vec::with_capacity(words.len());
		let mut idx = 0;

		while idx < words.len() {
			let matched = self.abbreviations.iter().find(|(key, _)| {
				words.len() - idx >= key.len()
					&& key.iter().zip(&words[idx..]).all(|(lhs, rhs)| lhs == rhs)
			});

			match matched {
				Some((key, expansion)) => {
					out.push(expansion.as_str());

					idx += key.len();
				},
				None => {
					out.push(words[idx]);

					idx += 1;
				},
			}
		}

		out.join(" ")
	}

	pub fn remove_stop_words(&self, query: &str) -> String {
		query
			.split_whitespace()
			.filter(|word| !self.tables.stop_words.contains(*word))
			.collect::<Vec<_>>()
			.join(" ")
	}

	pub fn extract_key_terms(&self, query: &str) -> String {
		query
			.split_whitespace()
			.filter(|word| self.tables.important_terms.contains(*word))
			.collect::<Vec<_>>()
			.join(" ")
	}

	pub fn expand_synonyms(&self, query: &str) -> String {
		query
			.split_whitespace()
			.map(|word| self.tables.synonyms.get(word).map(String::as_str).unwrap_or(word))
			.collect::<Vec<_>>()
			.join(" ")
	}
}
impl Default for QueryNormalizer {
	fn default() -> Self {
		Self::new(NormalizerTables::default())
	}
}

/// Lowercases, folds compatibility characters, spells out `&`, `%`, `/` and `vs`, strips
/// punctuation and collapses whitespace.
pub fn clean_text(raw: &str) -> String {
	let folded: String = raw.nfkc().collect::<String>().to_lowercase();
	let mut text = folded.replace('&', " and ").replace('%', " percent ").replace('/', " or ");

	if let Some(re) = VERSUS.as_ref() {
		text = re.replace_all(&text, " versus ").into_owned();
	}
	if let Some(re) = QUARTER_DASH.as_ref() {
		text = re.replace_all(&text, "q${1} to q${2}").into_owned();
	}

	let mut stripped = String::with_capacity(text.len());

	for ch in text.chars() {
		if ch.is_alphanumeric() || ch == '_' || ch.is_whitespace() {
			stripped.push(ch);
		} else {
			stripped.push(' ');
		}
	}

	stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Rewrites `q1 to q3` as `q1 q2 q3`. Descending ranges are left untouched.
pub fn expand_quarter_ranges(query: &str) -> String {
	let Some(re) = QUARTER_RANGE.as_ref() else { return query.to_string() };

	re.replace_all(query, |caps: &Captures| {
		let start = caps[1].parse::<u8>().unwrap_or(0);
		let end = caps[2].parse::<u8>().unwrap_or(0);

		if start == 0 || start > end {
			return caps[0].to_string();
		}

		(start..=end).map(|quarter| format!("q{quarter}")).collect::<Vec<_>>().join(" ")
	})
	.into_owned()
}

fn push_variant(out: &mut Vec<String>, seen: &mut HashSet<String>, value: String) {
	if value.is_empty() {
		return;
	}
	if seen.insert(value.clone()) {
		out.push(value);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn tables() -> NormalizerTables {
		NormalizerTables {
			abbreviations: [
				("hr", "human resources"),
				("fin", "finance"),
				("p&l", "profit and loss"),
			]
			.into_iter()
			.map(|(k, v)| (k.to_string(), v.to_string()))
			.collect(),
			synonyms: [("revenue", "revenue income earnings"), ("intern", "intern trainee")]
				.into_iter()
				.map(|(k, v)| (k.to_string(), v.to_string()))
				.collect(),
			important_terms: ["revenue", "leave", "policy"]
				.into_iter()
				.map(str::to_string)
				.collect(),
			stop_words: ["the", "for", "of"].into_iter().map(str::to_string).collect(),
		}
	}

	#[test]
	fn cleans_symbols_and_spacing() {
		assert_eq!(
			clean_text("  Profit & Loss /  Margin 10%!! "),
			"profit and loss or margin 10 percent"
		);
		assert_eq!(clean_text("Sales vs. Marketing"), "sales versus marketing");
		assert_eq!(clean_text("Q1 - Q3 revenue"), "q1 to q3 revenue");
	}

	#[test]
	fn versus_is_only_replaced_as_a_word() {
		assert_eq!(clean_text("vsphere vs paint"), "vsphere versus paint");
	}

	#[test]
	fn expands_quarter_ranges() {
		assert_eq!(expand_quarter_ranges("q1 to q3 revenue"), "q1 q2 q3 revenue");
		assert_eq!(expand_quarter_ranges("q3 to q1 revenue"), "q3 to q1 revenue");
		assert_eq!(expand_quarter_ranges("q2 to q2"), "q2");
	}

	#[test]
	fn abbreviations_respect_word_boundaries() {
		let normalizer = QueryNormalizer::new(tables());

		assert_eq!(normalizer.expand_abbreviations("hr leave"), "human resources leave");
		assert_eq!(normalizer.expand_abbreviations("three chrome"), "three chrome");
		assert_eq!(normalizer.expand_abbreviations("final fin report"), "final finance report");
	}

	#[test]
	fn multi_word_abbreviation_keys_are_cleaned_first() {
		let normalizer = QueryNormalizer::new(tables());

		assert_eq!(normalizer.normalize("P&L summary")[0], "profit and loss summary");
	}

	#[test]
	fn produces_ordered_variants() {
		let normalizer = QueryNormalizer::new(tables());
		let variants = normalizer.normalize("The revenue policy for Q1-Q2");

		assert_eq!(
			variants,
			vec![
				"the revenue policy for q1 q2".to_string(),
				"revenue policy q1 q2".to_string(),
				"revenue policy".to_string(),
				"the revenue income earnings policy for q1 q2".to_string(),
			]
		);
	}

	#[test]
	fn missing_tables_yield_only_cleaned_query() {
		let normalizer = QueryNormalizer::default();

		assert_eq!(normalizer.normalize("HR Leave Policy"), vec!["hr leave policy".to_string()]);
	}

	#[test]
	fn empty_input_yields_single_empty_variant() {
		let normalizer = QueryNormalizer::new(tables());

		assert_eq!(normalizer.normalize(""), vec![String::new()]);
		assert_eq!(normalizer.normalize(" ?! "), vec![String::new()]);
	}

	#[test]
	fn stop_word_only_query_drops_empty_variants() {
		let normalizer = QueryNormalizer::new(tables());

		assert_eq!(normalizer.normalize("the of"), vec!["the of".to_string()]);
	}
}
