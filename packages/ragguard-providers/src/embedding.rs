use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;

use crate::{Error, Result};

/// Embeds `texts` with an OpenAI-compatible endpoint. Output order matches `texts`.
pub async fn embed(
	cfg: &ragguard_config::EmbeddingProviderConfig,
	texts: &[String],
) -> Result<Vec<Vec<f32>>> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base.trim_end_matches('/'), cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"input": texts,
		"dimensions": cfg.dimensions,
	});
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let raw = res.error_for_status()?.bytes().await?;
	let vectors = parse_embedding_response(&raw)?;

	if vectors.len() != texts.len() {
		return Err(Error::InvalidResponse {
			message: format!(
				"Embedding response has {} vectors for {} inputs.",
				vectors.len(),
				texts.len()
			),
		});
	}

	Ok(vectors)
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
	data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
	index: Option<usize>,
	embedding: Vec<f32>,
}

/// Decodes a `/embeddings` body into one vector per input, ordered by `index`. Items without an
/// index keep their position. Every input position must be filled exactly once.
fn parse_embedding_response(body: &[u8]) -> Result<Vec<Vec<f32>>> {
	let response: EmbeddingResponse = serde_json::from_slice(body).map_err(|err| {
		Error::InvalidResponse { message: format!("Malformed embedding response: {err}") }
	})?;
	let count = response.data.len();
	let mut slots: Vec<Option<Vec<f32>>> = vec![None; count];

	for (position, item) in response.data.into_iter().enumerate() {
		let index = item.index.unwrap_or(position);
		let Some(slot) = slots.get_mut(index) else {
			return Err(Error::InvalidResponse {
				message: format!("Embedding index {index} is out of range for {count} items."),
			});
		};

		if slot.replace(item.embedding).is_some() {
			return Err(Error::InvalidResponse {
				message: format!("Embedding index {index} appears more than once."),
			});
		}
	}

	Ok(slots.into_iter().flatten().collect())
}
