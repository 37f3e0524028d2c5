pub mod cache;
pub mod cancel;
pub mod pipeline;
pub mod ranking;
pub mod retrieval;
pub mod snapshot;

mod error;

pub use cancel::Cancellation;
pub use error::{Error, Result};
pub use pipeline::{
	NotAnswerableReason, PipelineOutcome, PipelineReport, PipelineResult, Stage, VariantReport,
	VariantStatus,
};
pub use snapshot::PolicySnapshot;

use std::{
	collections::HashMap,
	future::Future,
	pin::Pin,
	sync::{Arc, RwLock},
};

use ragguard_config::{Config, EmbeddingProviderConfig};
use ragguard_domain::{
	confidence::ConfidenceGate,
	normalize::{NormalizerTables, QueryNormalizer},
};
use ragguard_providers::embedding;
use ragguard_storage::memory::MemoryIndex;

use crate::{cache::PermittedCache, ranking::DiversityPolicy};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait Embedder
where
	Self: Send + Sync,
{
	fn embed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>>>;
}

pub trait VectorIndex
where
	Self: Send + Sync,
{
	/// Embeddings for whichever of `chunk_ids` the index holds.
	fn lookup<'a>(
		&'a self,
		chunk_ids: &'a [String],
	) -> BoxFuture<'a, Result<HashMap<String, Vec<f32>>>>;
}

pub trait ChunkDocumentIndex
where
	Self: Send + Sync,
{
	/// Changes whenever the chunk set changes.
	fn version(&self) -> &str;

	fn chunk_ids(&self) -> &[String];

	fn document_id(&self, chunk_id: &str) -> Option<&str>;
}

/// Adapts a plain embedding function.
pub struct EmbedFn<F>(pub F);
impl<F> EmbedFn<F>
where
	F: Fn(&str) -> Result<Vec<f32>> + Send + Sync,
{
	pub fn new(embed: F) -> Self {
		Self(embed)
	}
}
impl<F> Embedder for EmbedFn<F>
where
	F: Fn(&str) -> Result<Vec<f32>> + Send + Sync,
{
	fn embed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>>> {
		let result = (self.0)(text);

		Box::pin(async move { result })
	}
}

pub struct HttpEmbedder {
	cfg: EmbeddingProviderConfig,
}
impl HttpEmbedder {
	pub fn new(cfg: EmbeddingProviderConfig) -> Self {
		Self { cfg }
	}

	async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
		let texts = [text.to_string()];
		let vector = embedding::embed(&self.cfg, &texts).await?.into_iter().next().ok_or_else(
			|| Error::Provider { message: "Embedding provider returned no vectors.".to_string() },
		)?;

		if vector.len() != self.cfg.dimensions as usize {
			return Err(Error::Provider {
				message: format!(
					"Embedding has {} dimensions, expected {}.",
					vector.len(),
					self.cfg.dimensions
				),
			});
		}

		Ok(vector)
	}
}
impl Embedder for HttpEmbedder {
	fn embed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>>> {
		Box::pin(self.embed_one(text))
	}
}

impl VectorIndex for MemoryIndex {
	fn lookup<'a>(
		&'a self,
		chunk_ids: &'a [String],
	) -> BoxFuture<'a, Result<HashMap<String, Vec<f32>>>> {
		let found = MemoryIndex::lookup(self, chunk_ids.iter().map(String::as_str));

		Box::pin(async move { Ok(found) })
	}
}

impl ChunkDocumentIndex for MemoryIndex {
	fn version(&self) -> &str {
		MemoryIndex::version(self)
	}

	fn chunk_ids(&self) -> &[String] {
		MemoryIndex::chunk_ids(self)
	}

	fn document_id(&self, chunk_id: &str) -> Option<&str> {
		MemoryIndex::document_id(self, chunk_id)
	}
}

#[derive(Clone)]
pub struct Providers {
	pub embedder: Arc<dyn Embedder>,
	pub vectors: Arc<dyn VectorIndex>,
	pub documents: Arc<dyn ChunkDocumentIndex>,
}
impl Providers {
	pub fn new(
		embedder: Arc<dyn Embedder>,
		vectors: Arc<dyn VectorIndex>,
		documents: Arc<dyn ChunkDocumentIndex>,
	) -> Self {
		Self { embedder, vectors, documents }
	}

	/// One in-memory index serves both vector lookups and chunk ownership.
	pub fn with_memory_index(embedder: Arc<dyn Embedder>, index: Arc<MemoryIndex>) -> Self {
		Self { embedder, vectors: index.clone(), documents: index }
	}

	/// The HTTP embedder plus the corpus file named by `storage.corpus_path`.
	pub fn from_config(cfg: &Config) -> Result<Self> {
		let index = Arc::new(MemoryIndex::open(&cfg.storage.corpus_path)?);
		let embedder = Arc::new(HttpEmbedder::new(cfg.providers.embedding.clone()));

		Ok(Self::with_memory_index(embedder, index))
	}
}

pub struct RagService {
	pub cfg: Config,
	pub providers: Providers,
	normalizer: QueryNormalizer,
	gate: ConfidenceGate,
	diversity: DiversityPolicy,
	policy: RwLock<Arc<PolicySnapshot>>,
	cache: Option<PermittedCache>,
}
impl RagService {
	pub fn new(cfg: Config, providers: Providers) -> Result<Self> {
		let policy = PolicySnapshot::from_config(&cfg)?;
		let tables = NormalizerTables::from_config(cfg.normalizer.as_ref());
		let normalizer = QueryNormalizer::new(tables);
		let gate = ConfidenceGate::from_config(&cfg.gate);
		let diversity = DiversityPolicy::from_config(&cfg.diversity);
		let cache = cfg.cache.enabled.then(|| PermittedCache::new(cfg.cache.max_entries as usize));

		tracing::info!(
			policy_version = policy.version(),
			corpus_version = providers.documents.version(),
			chunks = providers.documents.chunk_ids().len(),
			"Service ready."
		);

		Ok(Self {
			cfg,
			providers,
			normalizer,
			gate,
			diversity,
			policy: RwLock::new(Arc::new(policy)),
			cache,
		})
	}

	/// The snapshot in force right now. Callers keep it for the rest of the request.
	pub fn policy(&self) -> Arc<PolicySnapshot> {
		self.policy.read().unwrap_or_else(|err| err.into_inner()).clone()
	}

	/// Swaps in the role graph and access rules from `cfg` and returns the new policy version.
	/// Requests already running finish on the snapshot they started with.
	pub fn replace_policy(&self, cfg: &Config) -> Result<String> {
		let next = Arc::new(PolicySnapshot::from_config(cfg)?);
		let version = next.version().to_string();
		let previous = {
			let mut current = self.policy.write().unwrap_or_else(|err| err.into_inner());

			std::mem::replace(&mut *current, next)
		};

		tracing::info!(
			previous_version = previous.version(),
			policy_version = %version,
			"Policy snapshot replaced."
		);

		Ok(version)
	}

	pub fn normalizer(&self) -> &QueryNormalizer {
		&self.normalizer
	}
}
