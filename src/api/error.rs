use crate::archive::ArchiveError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Failure of the primary archive request of an endpoint.
///
/// Rendered as `{"error": "<message>"}` with `500 Internal Server Error`.
#[derive(Debug, Error)]
pub enum ApiError {
	#[error("could not obtain the list of studies: {0}")]
	Studies(#[source] ArchiveError),
	#[error("could not obtain study instances: {0}")]
	StudyInstances(#[source] ArchiveError),
	#[error("could not obtain study metadata: {0}")]
	StudyMetadata(#[source] ArchiveError),
	#[error("could not obtain the rendered image: {0}")]
	RenderedInstance(#[source] ArchiveError),
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		error!("{self}");
		(
			StatusCode::INTERNAL_SERVER_ERROR,
			Json(json!({ "error": self.to_string() })),
		)
			.into_response()
	}
}
