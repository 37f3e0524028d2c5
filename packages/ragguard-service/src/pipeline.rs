use std::{
	collections::{BTreeSet, HashMap},
	fmt,
	sync::Arc,
	time::Duration,
};

use serde::{Serialize, Serializer, ser::SerializeStruct};
use tokio::{sync::Semaphore, task::JoinSet};
use tracing::Instrument;
use uuid::Uuid;

use ragguard_domain::{
	access::PermittedChunks,
	confidence,
	evidence::{RankedEvidence, ScoredChunk},
};

use crate::{
	Cancellation, Embedder, PolicySnapshot, RagService, Result, VectorIndex, ranking, retrieval,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
	Normalizing,
	RoleExpanding,
	AccessFiltering,
	Retrieving,
	Aggregating,
	Diversifying,
	Gating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotAnswerableReason {
	NoAccessibleData,
	LowConfidence,
	RetrievalUnavailable,
}
impl NotAnswerableReason {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::NoAccessibleData => "No accessible data for this role",
			Self::LowConfidence => "Low confidence retrieval",
			Self::RetrievalUnavailable => "Retrieval unavailable",
		}
	}
}
impl fmt::Display for NotAnswerableReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// The caller-visible outcome. Serializes as `{"answerable": false, "reason": ...}` or
/// `{"answerable": true, "chunks": [...]}`.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineResult {
	NotAnswerable { reason: NotAnswerableReason },
	Answerable { evidence: RankedEvidence },
}
impl PipelineResult {
	pub fn is_answerable(&self) -> bool {
		matches!(self, Self::Answerable { .. })
	}

	pub fn evidence(&self) -> &[ScoredChunk] {
		match self {
			Self::Answerable { evidence } => evidence,
			Self::NotAnswerable { .. } => &[],
		}
	}

	pub fn reason(&self) -> Option<NotAnswerableReason> {
		match self {
			Self::NotAnswerable { reason } => Some(*reason),
			Self::Answerable { .. } => None,
		}
	}
}
impl Serialize for PipelineResult {
	fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		let mut state = serializer.serialize_struct("PipelineResult", 2)?;

		match self {
			Self::NotAnswerable { reason } => {
				state.serialize_field("answerable", &false)?;
				state.serialize_field("reason", reason.as_str())?;
			},
			Self::Answerable { evidence } => {
				state.serialize_field("answerable", &true)?;
				state.serialize_field("chunks", evidence)?;
			},
		}

		state.end()
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantStatus {
	/// The request ended before this variant was retrieved.
	Skipped,
	Ok,
	Failed,
	TimedOut,
	Cancelled,
}
impl VariantStatus {
	/// Whether the variant was attempted but produced no usable hits.
	pub fn is_degraded(self) -> bool {
		matches!(self, Self::Failed | Self::TimedOut | Self::Cancelled)
	}
}

#[derive(Debug, Clone, Serialize)]
pub struct VariantReport {
	pub query: String,
	pub status: VariantStatus,
	pub hits: usize,
}

/// Per-request diagnostics. Not part of the caller-visible result.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
	pub request_id: Uuid,
	pub policy_version: String,
	pub corpus_version: String,
	pub role: String,
	pub effective_roles: Vec<String>,
	pub permitted: usize,
	pub permitted_cache_hit: bool,
	pub variants: Vec<VariantReport>,
	pub aggregated: usize,
	pub diversified: usize,
	pub stopped_at: Stage,
}

#[derive(Debug, Clone)]
pub struct PipelineOutcome {
	pub result: PipelineResult,
	pub report: PipelineReport,
}

enum VariantAttempt {
	Hits(Vec<ScoredChunk>),
	Failed(String),
	TimedOut,
}

impl RagService {
	pub async fn process(&self, raw_query: &str, role: &str) -> Result<PipelineOutcome> {
		self.process_with_cancellation(raw_query, role, &Cancellation::none()).await
	}

	/// Runs one query for one role.
	///
	/// An unknown role is the only error; every expected business outcome, including all
	/// retrieval calls failing, comes back as a [`PipelineResult`].
	pub async fn process_with_cancellation(
		&self,
		raw_query: &str,
		role: &str,
		cancel: &Cancellation,
	) -> Result<PipelineOutcome> {
		let request_id = Uuid::new_v4();
		let span = tracing::info_span!("pipeline", %request_id, role);

		self.run(request_id, raw_query, role, cancel).instrument(span).await
	}

	async fn run(
		&self,
		request_id: Uuid,
		raw_query: &str,
		role: &str,
		cancel: &Cancellation,
	) -> Result<PipelineOutcome> {
		tracing::debug!(stage = ?Stage::Normalizing);

		let variants = self.normalizer().normalize(raw_query);
		let policy = self.policy();
		let mut report = PipelineReport {
			request_id,
			policy_version: policy.version().to_string(),
			corpus_version: self.providers.documents.version().to_string(),
			role: role.to_string(),
			effective_roles: Vec::new(),
			permitted: 0,
			permitted_cache_hit: false,
			variants: variants
				.iter()
				.map(|query| VariantReport {
					query: query.clone(),
					status: VariantStatus::Skipped,
					hits: 0,
				})
				.collect(),
			aggregated: 0,
			diversified: 0,
			stopped_at: Stage::Normalizing,
		};

		tracing::debug!(stage = ?Stage::RoleExpanding, variants = variants.len());

		let canonical = policy.roles().canonical(role).into_owned();
		let effective = policy.roles().expand(&canonical)?;

		report.role = canonical.clone();
		report.effective_roles = effective.iter().cloned().collect();

		tracing::debug!(stage = ?Stage::AccessFiltering, effective_roles = effective.len());

		let (permitted, cache_hit) = self.permitted_chunks(&policy, &canonical, &effective);

		report.permitted = permitted.len();
		report.permitted_cache_hit = cache_hit;

		if permitted.is_empty() {
			let reason = NotAnswerableReason::NoAccessibleData;

			return Ok(finish(report, Stage::AccessFiltering, reason));
		}

		tracing::debug!(stage = ?Stage::Retrieving, permitted = permitted.len());

		let per_variant =
			self.retrieve_variants(&variants, permitted, cancel, &mut report.variants).await;
		let any_ok = report.variants.iter().any(|variant| variant.status == VariantStatus::Ok);
		let any_failed = report.variants.iter().any(|variant| {
			matches!(variant.status, VariantStatus::Failed | VariantStatus::TimedOut)
		});

		if !any_ok && any_failed {
			return Ok(finish(report, Stage::Retrieving, NotAnswerableReason::RetrievalUnavailable));
		}

		tracing::debug!(stage = ?Stage::Aggregating);

		let ranked = ranking::aggregate(&per_variant);

		report.aggregated = ranked.len();

		tracing::debug!(stage = ?Stage::Diversifying, aggregated = ranked.len());

		let documents = self.providers.documents.as_ref();
		let evidence = ranking::diversify(
			&ranked,
			|chunk_id| documents.document_id(chunk_id).map(str::to_string),
			self.diversity,
		);

		report.diversified = evidence.len();

		tracing::debug!(stage = ?Stage::Gating, diversified = evidence.len());

		if !self.gate.is_confident(&evidence) {
			tracing::info!(
				top_score = confidence::top_score(&evidence),
				chunks = evidence.len(),
				"Evidence rejected by confidence gate."
			);

			return Ok(finish(report, Stage::Gating, NotAnswerableReason::LowConfidence));
		}

		report.stopped_at = Stage::Gating;

		tracing::info!(
			chunks = evidence.len(),
			top_score = confidence::top_score(&evidence),
			"Query answerable."
		);

		Ok(PipelineOutcome { result: PipelineResult::Answerable { evidence }, report })
	}

	fn permitted_chunks(
		&self,
		policy: &PolicySnapshot,
		role: &str,
		effective: &BTreeSet<String>,
	) -> (Arc<PermittedChunks>, bool) {
		let documents = self.providers.documents.as_ref();

		if let Some(cache) = self.cache.as_ref()
			&& let Some(hit) = cache.get(policy.version(), documents.version(), role)
		{
			return (hit, true);
		}

		let permitted = Arc::new(
			policy
				.access()
				.permitted_chunks(effective, documents.chunk_ids().iter().map(String::as_str)),
		);

		if let Some(cache) = self.cache.as_ref() {
			cache.insert(policy.version(), documents.version(), role, permitted.clone());
		}

		(permitted, false)
	}

	/// Retrieves every variant concurrently, bounded by `retrieval.max_concurrency`, with
	/// `retrieval.timeout_ms` per variant. Variants that fail, time out or are cancelled
	/// contribute an empty list. Results are indexed like `variants`.
	async fn retrieve_variants(
		&self,
		variants: &[String],
		permitted: Arc<PermittedChunks>,
		cancel: &Cancellation,
		reports: &mut [VariantReport],
	) -> Vec<Vec<ScoredChunk>> {
		let top_k = self.cfg.retrieval.top_k as usize;
		let timeout = Duration::from_millis(self.cfg.retrieval.timeout_ms);
		let semaphore = Arc::new(Semaphore::new(self.cfg.retrieval.max_concurrency as usize));
		let mut tasks = JoinSet::new();
		let mut task_variants = HashMap::new();

		for (idx, variant) in variants.iter().enumerate() {
			let embedder = self.providers.embedder.clone();
			let vectors = self.providers.vectors.clone();
			let permitted = permitted.clone();
			let semaphore = semaphore.clone();
			let variant = variant.clone();
			let handle = tasks.spawn(
				async move {
					let Ok(_permit) = semaphore.acquire_owned().await else {
						return (idx, VariantAttempt::Failed("Retrieval pool closed.".to_string()));
					};
					let attempt = tokio::time::timeout(
						timeout,
						retrieve_variant(
							embedder.as_ref(),
							vectors.as_ref(),
							&variant,
							&permitted,
							top_k,
						),
					)
					.await;

					match attempt {
						Ok(Ok(hits)) => (idx, VariantAttempt::Hits(hits)),
						Ok(Err(err)) => (idx, VariantAttempt::Failed(err.to_string())),
						Err(_) => (idx, VariantAttempt::TimedOut),
					}
				}
				.in_current_span(),
			);

			task_variants.insert(handle.id(), idx);
		}

		let mut results = vec![Vec::new(); variants.len()];

		loop {
			tokio::select! {
				biased;
				_ = cancel.cancelled() => {
					for report in reports.iter_mut() {
						if report.status == VariantStatus::Skipped {
							report.status = VariantStatus::Cancelled;
						}
					}

					tracing::warn!(
						in_flight = tasks.len(),
						"Retrieval cancelled. Continuing with completed variants."
					);

					tasks.abort_all();

					break;
				},
				joined = tasks.join_next_with_id() => {
					let Some(joined) = joined else { break };

					match joined {
						Ok((_, (idx, VariantAttempt::Hits(hits)))) => {
							reports[idx].status = VariantStatus::Ok;
							reports[idx].hits = hits.len();
							results[idx] = hits;
						},
						Ok((_, (idx, VariantAttempt::Failed(message)))) => {
							tracing::warn!(
								variant = %reports[idx].query,
								error = %message,
								"Variant retrieval failed."
							);

							reports[idx].status = VariantStatus::Failed;
						},
						Ok((_, (idx, VariantAttempt::TimedOut))) => {
							tracing::warn!(
								variant = %reports[idx].query,
								timeout_ms = timeout.as_millis() as u64,
								"Variant retrieval timed out."
							);

							reports[idx].status = VariantStatus::TimedOut;
						},
						Err(err) => {
							tracing::warn!(error = %err, "Variant retrieval task did not finish.");

							if let Some(idx) = task_variants.get(&err.id()) {
								reports[*idx].status = VariantStatus::Failed;
							}
						},
					}
				},
			}
		}

		results
	}
}

async fn retrieve_variant(
	embedder: &dyn Embedder,
	vectors: &dyn VectorIndex,
	variant: &str,
	permitted: &PermittedChunks,
	top_k: usize,
) -> Result<Vec<ScoredChunk>> {
	let embedding = embedder.embed(variant).await?;

	retrieval::retrieve(&embedding, permitted, vectors, top_k).await
}

fn finish(
	mut report: PipelineReport,
	stage: Stage,
	reason: NotAnswerableReason,
) -> PipelineOutcome {
	report.stopped_at = stage;

	tracing::info!(stage = ?stage, %reason, "Query not answerable.");

	PipelineOutcome { result: PipelineResult::NotAnswerable { reason }, report }
}
