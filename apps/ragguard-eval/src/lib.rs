use std::{
	collections::HashSet,
	fs,
	path::{Path, PathBuf},
	time::Instant,
};

use clap::Parser;
use color_eyre::eyre;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use ragguard_service::{Providers, RagService};

#[derive(Debug, Parser)]
#[command(
	version = ragguard_cli::VERSION,
	rename_all = "kebab",
	styles = ragguard_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	#[arg(long, short = 'd', value_name = "FILE")]
	pub dataset: PathBuf,
	/// Role for queries that name none, overriding the dataset default.
	#[arg(long, value_name = "ROLE")]
	pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EvalDataset {
	pub name: Option<String>,
	pub defaults: Option<EvalDefaults>,
	pub queries: Vec<EvalQuery>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EvalDefaults {
	pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EvalQuery {
	pub id: Option<String>,
	pub query: String,
	pub role: Option<String>,
	#[serde(default)]
	pub expected_chunk_ids: Vec<String>,
	pub expect_answerable: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct EvalOutput {
	pub dataset: EvalDatasetInfo,
	pub settings: EvalSettings,
	pub summary: EvalSummary,
	pub queries: Vec<QueryReport>,
}

#[derive(Debug, Serialize)]
pub struct EvalDatasetInfo {
	pub name: String,
	pub query_count: usize,
}

#[derive(Debug, Serialize)]
pub struct EvalSettings {
	pub config_path: String,
	pub policy_version: String,
	pub top_k: u32,
	pub max_chunks: u32,
	pub min_top_score: f64,
	pub min_chunk_count: u32,
}

#[derive(Debug, Serialize)]
pub struct EvalSummary {
	pub avg_recall_at_k: f64,
	pub avg_precision_at_k: f64,
	pub mean_rr: f64,
	pub mean_ndcg: f64,
	pub answerable_rate: f64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub answerability_accuracy: Option<f64>,
	pub degraded_queries: usize,
	pub errors: usize,
	pub latency_ms_p50: f64,
	pub latency_ms_p95: f64,
}

#[derive(Debug, Serialize)]
pub struct QueryReport {
	pub id: String,
	pub query: String,
	pub role: String,
	pub answerable: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub reason: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub expect_answerable: Option<bool>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
	pub variant_count: usize,
	/// Variants that failed, timed out or were cancelled.
	pub degraded_variants: usize,
	pub expected_count: usize,
	pub retrieved_count: usize,
	pub relevant_count: usize,
	pub recall_at_k: f64,
	pub precision_at_k: f64,
	pub rr: f64,
	pub ndcg: f64,
	pub latency_ms: f64,
	pub expected_chunk_ids: Vec<String>,
	pub retrieved_chunk_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Metrics {
	recall_at_k: f64,
	precision_at_k: f64,
	rr: f64,
	ndcg: f64,
	relevant_count: usize,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = ragguard_config::load(&args.config)?;
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

	let mut dataset = load_dataset(&args.dataset)?;

	if let Some(role) = args.role.as_ref() {
		dataset.defaults.get_or_insert_with(EvalDefaults::default).role = Some(role.clone());
	}

	let providers = Providers::from_config(&config)?;
	let service = RagService::new(config, providers)?;
	let output = evaluate(&service, &dataset, &args.config.display().to_string()).await?;
	let json = serde_json::to_string_pretty(&output)?;

	println!("{json}");

	Ok(())
}

pub fn load_dataset(path: &Path) -> color_eyre::Result<EvalDataset> {
	let raw = fs::read_to_string(path)?;
	let dataset: EvalDataset = serde_json::from_str(&raw)?;

	if dataset.queries.is_empty() {
		return Err(eyre::eyre!("Dataset must include at least one query."));
	}

	Ok(dataset)
}

/// Runs every dataset query through `service`. Unknown roles are recorded per query rather than
/// aborting the run.
pub async fn evaluate(
	service: &RagService,
	dataset: &EvalDataset,
	config_path: &str,
) -> color_eyre::Result<EvalOutput> {
	let default_role = dataset.defaults.as_ref().and_then(|defaults| defaults.role.clone());
	let mut reports = Vec::with_capacity(dataset.queries.len());
	let mut latencies_ms = Vec::with_capacity(dataset.queries.len());

	for (idx, item) in dataset.queries.iter().enumerate() {
		let id = item.id.clone().unwrap_or_else(|| format!("q{}", idx + 1));
		let Some(role) = item.role.clone().or_else(|| default_role.clone()) else {
			return Err(eyre::eyre!("Query {id} has no role and the dataset sets no default."));
		};
		let expected: HashSet<String> = item.expected_chunk_ids.iter().cloned().collect();
		let started = Instant::now();
		let processed = service.process(&item.query, &role).await;
		let latency_ms = started.elapsed().as_secs_f64() * 1_000.0;
		let mut report = QueryReport {
			id,
			query: item.query.clone(),
			role,
			answerable: false,
			reason: None,
			expect_answerable: item.expect_answerable,
			error: None,
			variant_count: 0,
			degraded_variants: 0,
			expected_count: expected.len(),
			retrieved_count: 0,
			relevant_count: 0,
			recall_at_k: 0.0,
			precision_at_k: 0.0,
			rr: 0.0,
			ndcg: 0.0,
			latency_ms,
			expected_chunk_ids: item.expected_chunk_ids.clone(),
			retrieved_chunk_ids: Vec::new(),
		};

		match processed {
			Ok(outcome) => {
				let retrieved: Vec<String> = outcome
					.result
					.evidence()
					.iter()
					.map(|chunk| chunk.chunk_id.clone())
					.collect();
				let metrics = compute_metrics(&retrieved, &expected);

				report.answerable = outcome.result.is_answerable();
				report.reason = outcome.result.reason().map(|reason| reason.to_string());
				report.variant_count = outcome.report.variants.len();
				report.degraded_variants = outcome
					.report
					.variants
					.iter()
					.filter(|variant| variant.status.is_degraded())
					.count();
				report.retrieved_count = retrieved.len();
				report.relevant_count = metrics.relevant_count;
				report.recall_at_k = metrics.recall_at_k;
				report.precision_at_k = metrics.precision_at_k;
				report.rr = metrics.rr;
				report.ndcg = metrics.ndcg;
				report.retrieved_chunk_ids = retrieved;
			},
			Err(err) => {
				tracing::warn!(query_id = %report.id, error = %err, "Query failed.");

				report.error = Some(err.to_string());
			},
		}

		latencies_ms.push(latency_ms);
		reports.push(report);
	}

	let cfg = &service.cfg;

	Ok(EvalOutput {
		dataset: EvalDatasetInfo {
			name: dataset.name.clone().unwrap_or_else(|| "dataset".to_string()),
			query_count: dataset.queries.len(),
		},
		settings: EvalSettings {
			config_path: config_path.to_string(),
			policy_version: service.policy().version().to_string(),
			top_k: cfg.retrieval.top_k,
			max_chunks: cfg.diversity.max_chunks,
			min_top_score: cfg.gate.min_top_score,
			min_chunk_count: cfg.gate.min_chunk_count,
		},
		summary: summarize(&reports, &latencies_ms),
		queries: reports,
	})
}

fn compute_metrics(retrieved: &[String], expected: &HashSet<String>) -> Metrics {
	let expected_count = expected.len();
	let mut relevant_count = 0_usize;
	let mut dcg = 0.0_f64;
	let mut first_hit: Option<usize> = None;

	for (idx, chunk_id) in retrieved.iter().enumerate() {
		if !expected.contains(chunk_id) {
			continue;
		}

		let rank = idx + 1;

		relevant_count += 1;
		dcg += 1.0 / (rank as f64 + 1.0).log2();

		if first_hit.is_none() {
			first_hit = Some(rank);
		}
	}

	let rr = first_hit.map(|rank| 1.0 / rank as f64).unwrap_or(0.0);
	let idcg: f64 = (1..=expected_count.min(retrieved.len()))
		.map(|rank| 1.0 / (rank as f64 + 1.0).log2())
		.sum();
	let ndcg = if idcg > 0.0 { dcg / idcg } else { 0.0 };
	let precision_at_k =
		if retrieved.is_empty() { 0.0 } else { relevant_count as f64 / retrieved.len() as f64 };
	let recall_at_k =
		if expected_count == 0 { 0.0 } else { relevant_count as f64 / expected_count as f64 };

	Metrics { recall_at_k, precision_at_k, rr, ndcg, relevant_count }
}

fn summarize(reports: &[QueryReport], latencies_ms: &[f64]) -> EvalSummary {
	let count = reports.len().max(1) as f64;
	let avg_recall_at_k = reports.iter().map(|r| r.recall_at_k).sum::<f64>() / count;
	let avg_precision_at_k = reports.iter().map(|r| r.precision_at_k).sum::<f64>() / count;
	let mean_rr = reports.iter().map(|r| r.rr).sum::<f64>() / count;
	let mean_ndcg = reports.iter().map(|r| r.ndcg).sum::<f64>() / count;
	let answerable_rate = reports.iter().filter(|r| r.answerable).count() as f64 / count;
	let judged: Vec<bool> = reports
		.iter()
		.filter_map(|r| r.expect_answerable.map(|expected| expected == r.answerable))
		.collect();
	let answerability_accuracy = (!judged.is_empty())
		.then(|| judged.iter().filter(|correct| **correct).count() as f64 / judged.len() as f64);
	let mut sorted = latencies_ms.to_vec();

	sorted.sort_by(f64::total_cmp);

	EvalSummary {
		avg_recall_at_k,
		avg_precision_at_k,
		mean_rr,
		mean_ndcg,
		answerable_rate,
		answerability_accuracy,
		degraded_queries: reports.iter().filter(|r| r.degraded_variants > 0).count(),
		errors: reports.iter().filter(|r| r.error.is_some()).count(),
		latency_ms_p50: percentile(&sorted, 0.50),
		latency_ms_p95: percentile(&sorted, 0.95),
	}
}

fn percentile(values: &[f64], percentile: f64) -> f64 {
	if values.is_empty() {
		return 0.0;
	}

	let clamped = percentile.clamp(0.0, 1.0);
	let pos = clamped * (values.len() as f64 - 1.0);
	let lower = pos.floor() as usize;
	let upper = pos.ceil() as usize;

	if lower == upper {
		values[lower]
	} else {
		let weight = pos - lower as f64;

		values[lower] * (1.0 - weight) + values[upper] * weight
	}
}
