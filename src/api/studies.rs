use crate::api::ApiError;
use crate::archive::{Archive, ArchiveError};
use crate::types::ResourceId;
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{instrument, warn};

pub fn routes() -> Router<AppState> {
	Router::new()
		.route("/studies", get(all_studies))
		.route("/studies/{study}/metadata", get(study_metadata))
}

#[derive(Debug, Default, Deserialize)]
struct StudiesParameters {
	expand: Option<String>,
}

impl StudiesParameters {
	fn expand(&self) -> bool {
		self.expand
			.as_deref()
			.is_some_and(|expand| expand.eq_ignore_ascii_case("true"))
	}
}

/// Lists the identifiers of all studies, or their details with `?expand=true`.
#[instrument(skip(state))]
async fn all_studies(
	State(state): State<AppState>,
	Query(parameters): Query<StudiesParameters>,
) -> Result<Json<Vec<Value>>, ApiError> {
	let studies = state.archive.studies().await.map_err(ApiError::Studies)?;

	if !parameters.expand() {
		return Ok(Json(studies.into_iter().map(Value::String).collect()));
	}

	Ok(Json(expand_studies(state.archive.as_ref(), &studies).await))
}

/// Fetches the details of every study in turn. Studies whose details cannot be fetched are
/// left out.
async fn expand_studies(archive: &dyn Archive, studies: &[ResourceId]) -> Vec<Value> {
	let mut detailed = Vec::with_capacity(studies.len());
	for study in studies {
		match archive.study(study).await {
			Ok(details) => detailed.push(details),
			Err(err) => warn!("Omitting study {study} from expanded list: {err}"),
		}
	}
	detailed
}

#[instrument(skip(state))]
async fn study_metadata(
	State(state): State<AppState>,
	Path(study): Path<ResourceId>,
) -> Result<Json<Value>, ApiError> {
	merged_metadata(state.archive.as_ref(), &study).await.map(Json)
}

/// The study resource with its shared tags under `SharedTags`.
///
/// Shared tags are optional: if they cannot be fetched, `SharedTags` is an empty object.
async fn merged_metadata(archive: &dyn Archive, study: &str) -> Result<Value, ApiError> {
	let mut metadata = archive
		.study(study)
		.await
		.map_err(ApiError::StudyMetadata)?;

	let Some(object) = metadata.as_object_mut() else {
		return Err(ApiError::StudyMetadata(ArchiveError::DataShape {
			path: format!("/studies/{study}"),
			reason: String::from("expected a JSON object"),
		}));
	};

	let shared_tags = archive.shared_tags(study).await.unwrap_or_else(|err| {
		warn!("Shared tags of study {study} are unavailable: {err}");
		Value::Object(Map::new())
	});
	object.insert(String::from("SharedTags"), shared_tags);

	Ok(metadata)
}
