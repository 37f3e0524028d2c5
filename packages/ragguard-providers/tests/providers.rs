use axum::{Json, Router, http::HeaderMap, routing::post};
use reqwest::header::AUTHORIZATION;
use serde_json::{Map, Value};
use tokio::net::TcpListener;

use ragguard_config::EmbeddingProviderConfig;

fn provider_config(api_base: String) -> EmbeddingProviderConfig {
	let mut default_headers = Map::new();

	default_headers.insert("x-tenant".to_string(), Value::String("docs".to_string()));

	EmbeddingProviderConfig {
		provider_id: "local".to_string(),
		api_base,
		api_key: "secret".to_string(),
		path: "/v1/embeddings".to_string(),
		model: "test-embed".to_string(),
		dimensions: 2,
		timeout_ms: 2_000,
		default_headers,
	}
}

async fn fake_embeddings(headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
	let authorized = headers.get("authorization").and_then(|v| v.to_str().ok())
		== Some("Bearer secret")
		&& headers.get("x-tenant").and_then(|v| v.to_str().ok()) == Some("docs");
	let inputs = body.get("input").and_then(Value::as_array).cloned().unwrap_or_default();
	let data: Vec<Value> = inputs
		.iter()
		.enumerate()
		.rev()
		.map(|(index, input)| {
			let len = input.as_str().map(str::len).unwrap_or(0) as f64;
			let flag = if authorized { 1.0 } else { 0.0 };

			serde_json::json!({ "index": index, "embedding": [len, flag] })
		})
		.collect();

	Json(serde_json::json!({ "data": data }))
}

#[test]
fn builds_bearer_auth_header() {
	let headers =
		ragguard_providers::auth_headers("secret", &Map::new()).expect("Failed to build headers.");
	let value = headers.get(AUTHORIZATION).expect("Missing authorization header.");

	assert_eq!(value, "Bearer secret");
}

#[test]
fn non_string_default_header_is_rejected() {
	let mut default_headers = Map::new();

	default_headers.insert("x-retries".to_string(), Value::from(3));

	assert!(matches!(
		ragguard_providers::auth_headers("secret", &default_headers),
		Err(ragguard_providers::Error::InvalidConfig { .. })
	));
}

#[tokio::test]
async fn embeds_against_openai_compatible_endpoint() {
	let listener = TcpListener::bind("127.0.0.1:0").await.expect("Failed to bind listener.");
	let addr = listener.local_addr().expect("Listener must have an address.");
	let app = Router::new().route("/v1/embeddings", post(fake_embeddings));

	tokio::spawn(async move {
		let _ = axum::serve(listener, app).await;
	});

	let cfg = provider_config(format!("http://{addr}"));
	let texts = vec!["leave".to_string(), "hr".to_string()];
	let vectors =
		ragguard_providers::embedding::embed(&cfg, &texts).await.expect("Embedding must succeed.");

	assert_eq!(vectors, vec![vec![5.0, 1.0], vec![2.0, 1.0]]);
}
