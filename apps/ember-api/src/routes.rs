use axum::{
	Json, Router,
	extract::{Path, Request, State},
	http::{StatusCode, header::AUTHORIZATION},
	middleware::{self, Next},
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::Serialize;

use crate::state::AppState;
use ember_service::{RagOverride, RetrieveRequest, RetrieveResponse};

pub fn router(state: AppState) -> Router {
	let protected = Router::new()
		.route("/v1/context/retrieve", post(retrieve))
		.route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

	Router::new().route("/health", get(health)).merge(protected).with_state(state)
}

pub fn admin_router(state: AppState) -> Router {
	Router::new()
		.route(
			"/v1/admin/rag_config/{knowledge_base_id}",
			get(get_rag_config).put(put_rag_config).delete(delete_rag_config),
		)
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn require_auth(
	State(state): State<AppState>,
	req: Request,
	next: Next,
) -> Result<Response, ApiError> {
	let Some(expected) = state.service.cfg.service.api_auth_token.as_deref() else {
		return Ok(next.run(req).await);
	};
	let provided = req
		.headers()
		.get(AUTHORIZATION)
		.and_then(|value| value.to_str().ok())
		.and_then(|value| value.strip_prefix("Bearer "));

	if provided == Some(expected) {
		return Ok(next.run(req).await);
	}

	Err(ApiError::new(
		StatusCode::UNAUTHORIZED,
		"unauthorized",
		"Missing or invalid API token.",
	))
}

async fn retrieve(
	State(state): State<AppState>,
	Json(payload): Json<RetrieveRequest>,
) -> Result<Json<RetrieveResponse>, ApiError> {
	let response = state.service.retrieve(payload).await?;

	Ok(Json(response))
}

async fn get_rag_config(
	State(state): State<AppState>,
	Path(knowledge_base_id): Path<String>,
) -> Result<Json<RagOverride>, ApiError> {
	let overrides = state.service.get_rag_config(&knowledge_base_id).await?;
	let Some(overrides) = overrides else {
		return Err(ApiError::new(
			StatusCode::NOT_FOUND,
			"not_found",
			"No stored rag config for that knowledge base.",
		));
	};

	Ok(Json(overrides))
}

async fn put_rag_config(
	State(state): State<AppState>,
	Path(knowledge_base_id): Path<String>,
	Json(payload): Json<RagOverride>,
) -> Result<StatusCode, ApiError> {
	state.service.put_rag_config(&knowledge_base_id, payload).await?;

	Ok(StatusCode::NO_CONTENT)
}

async fn delete_rag_config(
	State(state): State<AppState>,
	Path(knowledge_base_id): Path<String>,
) -> Result<StatusCode, ApiError> {
	let deleted = state.service.delete_rag_config(&knowledge_base_id).await?;

	if deleted { Ok(StatusCode::NO_CONTENT) } else { Ok(StatusCode::NOT_FOUND) }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
}
impl ApiError {
	fn new(status: StatusCode, error_code: impl Into<String>, message: impl Into<String>) -> Self {
		Self { status, error_code: error_code.into(), message: message.into() }
	}
}

impl From<ember_service::Error> for ApiError {
	fn from(err: ember_service::Error) -> Self {
		match &err {
			ember_service::Error::InvalidRequest { .. } =>
				Self::new(StatusCode::BAD_REQUEST, "invalid_request", err.to_string()),
			ember_service::Error::NotFound { .. } =>
				Self::new(StatusCode::NOT_FOUND, "not_found", err.to_string()),
			ember_service::Error::Provider { .. } =>
				Self::new(StatusCode::BAD_GATEWAY, "provider_error", err.to_string()),
			ember_service::Error::Storage { .. } | ember_service::Error::Qdrant { .. } =>
				Self::new(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", err.to_string()),
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { error_code: self.error_code, message: self.message };

		(self.status, Json(body)).into_response()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn service_errors_map_to_http_statuses() {
		let cases = [
			(
				ember_service::Error::InvalidRequest { message: "bad".to_string() },
				StatusCode::BAD_REQUEST,
			),
			(
				ember_service::Error::NotFound { message: "missing".to_string() },
				StatusCode::NOT_FOUND,
			),
			(
				ember_service::Error::Provider { message: "down".to_string() },
				StatusCode::BAD_GATEWAY,
			),
			(
				ember_service::Error::Storage { message: "broken".to_string() },
				StatusCode::INTERNAL_SERVER_ERROR,
			),
		];

		for (err, expected) in cases {
			let api_err = ApiError::from(err);

			assert_eq!(api_err.status, expected);
		}
	}
}
