use std::{collections::HashMap, path::Path};

use crate::{
	Result,
	corpus::{self, CorpusFile},
};

#[derive(Debug, Clone)]
struct StoredChunk {
	document_id: String,
	embedding: Vec<f32>,
}

/// Read-only, in-memory view of a corpus file. Chunk ids keep file order.
#[derive(Debug, Clone, Default)]
pub struct MemoryIndex {
	version: String,
	order: Vec<String>,
	chunks: HashMap<String, StoredChunk>,
}
impl MemoryIndex {
	pub fn open(path: &Path) -> Result<Self> {
		let corpus = corpus::load(path)?;
		let index = Self::from_corpus(corpus);

		tracing::info!(
			path = %path.display(),
			chunks = index.len(),
			version = %index.version,
			"Corpus loaded."
		);

		Ok(index)
	}

	/// Expects a corpus that already passed [`corpus::validate`].
	pub fn from_corpus(corpus: CorpusFile) -> Self {
		let version = corpus.version.unwrap_or_default();
		let mut order = Vec::with_capacity(corpus.chunks.len());
		let mut chunks = HashMap::with_capacity(corpus.chunks.len());

		for record in corpus.chunks {
			order.push(record.chunk_id.clone());
			chunks.insert(
				record.chunk_id,
				StoredChunk { document_id: record.document_id, embedding: record.embedding },
			);
		}

		Self { version, order, chunks }
	}

	pub fn version(&self) -> &str {
		&self.version
	}

	pub fn len(&self) -> usize {
		self.order.len()
	}

	pub fn is_empty(&self) -> bool {
		self.order.is_empty()
	}

	pub fn chunk_ids(&self) -> &[String] {
		&self.order
	}

	pub fn document_id(&self, chunk_id: &str) -> Option<&str> {
		self.chunks.get(chunk_id).map(|chunk| chunk.document_id.as_str())
	}

	pub fn embedding(&self, chunk_id: &str) -> Option<&[f32]> {
		self.chunks
			.get(chunk_id)
			.map(|chunk| chunk.embedding.as_slice())
			.filter(|embedding| !embedding.is_empty())
	}

	/// Embeddings for the requested ids. Unknown ids and chunks without an embedding are
	/// omitted.
	pub fn lookup<'a, I>(&self, chunk_ids: I) -> HashMap<String, Vec<f32>>
	where
		I: IntoIterator<Item = &'a str>,
	{
		let mut out = HashMap::new();

		for chunk_id in chunk_ids {
			if let Some(embedding) = self.embedding(chunk_id) {
				out.insert(chunk_id.to_string(), embedding.to_vec());
			}
		}

		out
	}
}
