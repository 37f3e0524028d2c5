use axum::{
	Json, Router,
	extract::State,
	http::{HeaderMap, StatusCode, header::AUTHORIZATION},
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::{Deserialize, Serialize};

use ragguard_service::{Error as ServiceError, PipelineResult};

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
	pub query: String,
	pub role: String,
}

#[derive(Debug, Serialize)]
pub struct ReloadPolicyResponse {
	pub policy_version: String,
}

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/query", post(query))
		.with_state(state)
}

pub fn admin_router(state: AppState) -> Router {
	Router::new().route("/v1/admin/reload_policy", post(reload_policy)).with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn query(
	State(state): State<AppState>,
	Json(payload): Json<QueryRequest>,
) -> Result<Json<PipelineResult>, ApiError> {
	if payload.role.trim().is_empty() {
		return Err(json_error(
			StatusCode::BAD_REQUEST,
			"invalid_request",
			"role must be non-empty.",
			Some(vec!["$.role".to_string()]),
		));
	}

	let outcome = state.service.process(&payload.query, payload.role.trim()).await?;

	tracing::debug!(report = ?outcome.report, "Query processed.");

	Ok(Json(outcome.result))
}

async fn reload_policy(
	State(state): State<AppState>,
	headers: HeaderMap,
) -> Result<Json<ReloadPolicyResponse>, ApiError> {
	authorize_admin(&state, &headers)?;

	let Some(path) = state.config_path.as_ref() else {
		return Err(json_error(
			StatusCode::CONFLICT,
			"reload_unavailable",
			"The service was started without a config file.",
			None,
		));
	};
	let config = ragguard_config::load(path).map_err(|err| {
		json_error(StatusCode::UNPROCESSABLE_ENTITY, "invalid_config", err.to_string(), None)
	})?;
	let policy_version = state.service.replace_policy(&config)?;

	Ok(Json(ReloadPolicyResponse { policy_version }))
}

fn authorize_admin(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
	let Some(expected) = state.service.cfg.security.admin_auth_token.as_deref() else {
		return Ok(());
	};
	let provided = headers
		.get(AUTHORIZATION)
		.and_then(|value| value.to_str().ok())
		.and_then(|value| value.strip_prefix("Bearer "))
		.map(str::trim);

	if provided != Some(expected) {
		return Err(json_error(
			StatusCode::UNAUTHORIZED,
			"unauthorized",
			"A valid admin bearer token is required.",
			None,
		));
	}

	Ok(())
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
	fields: Option<Vec<String>>,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
	fields: Option<Vec<String>>,
}
impl ApiError {
	fn new(
		status: StatusCode,
		error_code: impl Into<String>,
		message: impl Into<String>,
		fields: Option<Vec<String>>,
	) -> Self {
		Self { status, error_code: error_code.into(), message: message.into(), fields }
	}
}
impl From<ServiceError> for ApiError {
	fn from(err: ServiceError) -> Self {
		let message = err.to_string();

		match err {
			ServiceError::UnknownRole { .. } => json_error(
				StatusCode::BAD_REQUEST,
				"unknown_role",
				message,
				Some(vec!["$.role".to_string()]),
			),
			ServiceError::InvalidConfig { .. } => {
				json_error(StatusCode::INTERNAL_SERVER_ERROR, "invalid_config", message, None)
			},
			ServiceError::Provider { .. } => {
				json_error(StatusCode::BAD_GATEWAY, "provider_error", message, None)
			},
			ServiceError::Index { .. } => {
				json_error(StatusCode::BAD_GATEWAY, "index_error", message, None)
			},
			ServiceError::Storage { .. } => {
				json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", message, None)
			},
		}
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body =
			ErrorBody { error_code: self.error_code, message: self.message, fields: self.fields };

		(self.status, Json(body)).into_response()
	}
}

pub fn json_error(
	status: StatusCode,
	code: &str,
	message: impl Into<String>,
	fields: Option<Vec<String>>,
) -> ApiError {
	ApiError::new(status, code, message, fields)
}
