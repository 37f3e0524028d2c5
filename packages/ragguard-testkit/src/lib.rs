mod error;

pub use error::{Error, Result};

use std::{
	env, fs,
	path::{Path, PathBuf},
	sync::atomic::{AtomicU64, Ordering},
	time::{SystemTime, UNIX_EPOCH},
};

use ragguard_config::Config;
use ragguard_storage::corpus::{ChunkRecord, CorpusFile};

pub const SAMPLE_CONFIG_TOML: &str = include_str!("../fixtures/sample_config.toml");

/// Keyword groups behind [`KeywordEmbedder::sample`], one embedding axis each.
pub const SAMPLE_AXES: [&[&str]; 4] = [
	&["human resources", "leave", "holiday pay"],
	&["finance", "revenue", "profit", "income"],
	&["engineering", "deploy", "incident"],
	&["office", "parking", "cafeteria"],
];

/// Deterministic embedder for tests: one axis per keyword group plus a constant baseline axis,
/// so no text embeds to the zero vector.
#[derive(Debug, Clone)]
pub struct KeywordEmbedder {
	axes: Vec<Vec<String>>,
}
impl KeywordEmbedder {
	pub fn new(axes: &[&[&str]]) -> Self {
		let axes = axes
			.iter()
			.map(|group| group.iter().map(|keyword| keyword.to_lowercase()).collect())
			.collect();

		Self { axes }
	}

	pub fn sample() -> Self {
		Self::new(&SAMPLE_AXES)
	}

	pub fn dimensions(&self) -> usize {
		self.axes.len() + 1
	}

	pub fn embed(&self, text: &str) -> Vec<f32> {
		let text = text.to_lowercase();
		let mut vector: Vec<f32> = self
			.axes
			.iter()
			.map(|group| {
				if group.iter().any(|keyword| text.contains(keyword.as_str())) { 1.0 } else { 0.0 }
			})
			.collect();

		vector.push(0.1);

		vector
	}
}

/// A file in the temp directory that is removed on drop.
#[derive(Debug)]
pub struct TempFile {
	path: PathBuf,
}
impl TempFile {
	pub fn new(prefix: &str, extension: &str, contents: &str) -> Result<Self> {
		static COUNTER: AtomicU64 = AtomicU64::new(0);

		let nanos = SystemTime::now()
			.duration_since(UNIX_EPOCH)
			.map_err(|err| Error::Message(format!("System time is before the epoch: {err}.")))?
			.as_nanos();
		let ordinal = COUNTER.fetch_add(1, Ordering::SeqCst);
		let pid = std::process::id();
		let mut path = env::temp_dir();

		path.push(format!("{prefix}_{nanos}_{pid}_{ordinal}.{extension}"));

		fs::write(&path, contents)?;

		Ok(Self { path })
	}

	pub fn path(&self) -> &Path {
		&self.path
	}
}
impl Drop for TempFile {
	fn drop(&mut self) {
		let _ = fs::remove_file(&self.path);
	}
}

/// The sample config with `storage.corpus_path` left as in the fixture.
pub fn sample_config() -> Result<Config> {
	let cfg: Config = toml::from_str(SAMPLE_CONFIG_TOML)?;

	ragguard_config::validate(&cfg)?;

	Ok(cfg)
}

/// Chunks embedded along [`SAMPLE_AXES`]. `HR_CHUNK_1` and `HR_CHUNK_2` share a document.
pub fn sample_corpus() -> CorpusFile {
	let chunk = |chunk_id: &str, document_id: &str, embedding: [f32; 5]| ChunkRecord {
		chunk_id: chunk_id.to_string(),
		document_id: document_id.to_string(),
		embedding: embedding.to_vec(),
	};

	CorpusFile {
		version: Some("sample-v1".to_string()),
		chunks: vec![
			chunk("HR_CHUNK_1", "hr_handbook", [1.0, 0.0, 0.0, 0.0, 0.1]),
			chunk("HR_CHUNK_2", "hr_handbook", [0.9, 0.0, 0.0, 0.2, 0.1]),
			chunk("HR_CHUNK_7", "hr_faq", [0.7, 0.0, 0.0, 0.3, 0.1]),
			chunk("FINANCE_CHUNK_12", "fin_q3", [0.0, 1.0, 0.0, 0.0, 0.1]),
			chunk("FINANCE_CHUNK_14", "fin_q4", [0.0, 0.9, 0.0, 0.1, 0.1]),
			chunk("ENGINEERING_CHUNK_10", "eng_runbook", [0.0, 0.0, 1.0, 0.0, 0.1]),
			chunk("GENERAL_CHUNK_3", "office_guide", [0.0, 0.0, 0.0, 1.0, 0.1]),
		],
	}
}

pub fn write_corpus(corpus: &CorpusFile) -> Result<TempFile> {
	let payload = serde_json::to_string_pretty(corpus)?;

	TempFile::new("ragguard_corpus", "json", &payload)
}

/// Writes `corpus` and a config pointing at it. Both files live as long as the returned guards.
pub fn write_sample_files(corpus: &CorpusFile) -> Result<(TempFile, TempFile)> {
	let corpus_file = write_corpus(corpus)?;
	let mut value: toml::Value = toml::from_str(SAMPLE_CONFIG_TOML)?;
	let storage = value
		.get_mut("storage")
		.and_then(toml::Value::as_table_mut)
		.ok_or_else(|| Error::Message("Sample config is missing [storage].".to_string()))?;

	storage.insert(
		"corpus_path".to_string(),
		toml::Value::String(corpus_file.path().display().to_string()),
	);

	let payload = toml::to_string(&value)
		.map_err(|err| Error::Message(format!("Failed to render sample config: {err}.")))?;
	let config_file = TempFile::new("ragguard_config", "toml", &payload)?;

	Ok((config_file, corpus_file))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn sample_config_is_valid() {
		let cfg = sample_config().expect("sample config loads");

		let dimensions = cfg.providers.embedding.dimensions as usize;

		assert_eq!(dimensions, KeywordEmbedder::sample().dimensions());
	}

	#[test]
	fn keyword_embedder_never_returns_zero_vector() {
		let embedder = KeywordEmbedder::sample();

		assert_eq!(embedder.embed("nothing relevant"), vec![0.0, 0.0, 0.0, 0.0, 0.1]);
		assert_eq!(embedder.embed("HR Leave"), vec![1.0, 0.0, 0.0, 0.0, 0.1]);
	}

	#[test]
	fn sample_files_load_through_config() {
		let (config_file, corpus_file) =
			write_sample_files(&sample_corpus()).expect("sample files written");
		let cfg = ragguard_config::load(config_file.path()).expect("config loads");

		assert_eq!(cfg.storage.corpus_path, corpus_file.path());
	}
}
