use std::{collections::HashSet, fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusFile {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub version: Option<String>,
	pub chunks: Vec<ChunkRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
	pub chunk_id: String,
	pub document_id: String,
	pub embedding: Vec<f32>,
}

/// Reads and checks a corpus file. A file without `version` is versioned by its content hash.
pub fn load(path: &Path) -> Result<CorpusFile> {
	let raw = fs::read(path).map_err(|err| Error::Read { path: path.to_path_buf(), source: err })?;

	parse(&raw)
}

pub fn parse(raw: &[u8]) -> Result<CorpusFile> {
	let mut corpus: CorpusFile = serde_json::from_slice(raw)?;

	if corpus.version.as_deref().map(|version| version.trim().is_empty()).unwrap_or(true) {
		corpus.version = Some(blake3::hash(raw).to_hex().to_string());
	}

	validate(&corpus)?;

	Ok(corpus)
}

pub fn validate(corpus: &CorpusFile) -> Result<()> {
	let mut seen = HashSet::with_capacity(corpus.chunks.len());
	let mut dimension: Option<usize> = None;

	for chunk in &corpus.chunks {
		if chunk.chunk_id.trim().is_empty() {
			return Err(Error::InvalidCorpus("chunk_id must be non-empty.".to_string()));
		}
		if chunk.document_id.trim().is_empty() {
			return Err(Error::InvalidCorpus(format!(
				"chunk {} has an empty document_id.",
				chunk.chunk_id
			)));
		}
		if !seen.insert(chunk.chunk_id.as_str()) {
			return Err(Error::InvalidCorpus(format!("duplicate chunk_id {}.", chunk.chunk_id)));
		}
		if chunk.embedding.is_empty() {
			continue;
		}

		match dimension {
			None => dimension = Some(chunk.embedding.len()),
			Some(expected) if expected != chunk.embedding.len() => {
				return Err(Error::InvalidCorpus(format!(
					"chunk {} has {} dimensions, expected {expected}.",
					chunk.chunk_id,
					chunk.embedding.len()
				)));
			},
			Some(_) => {},
		}
	}

	Ok(())
}
