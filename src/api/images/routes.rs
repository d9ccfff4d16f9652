use crate::api::images::{ImageListingService, StudyImages};
use crate::api::{ApiError, QualityParameter};
use crate::types::{ImageQuality, ResourceId};
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use tracing::instrument;

pub fn routes() -> Router<AppState> {
	Router::new().route("/studies/{study}/images", get(study_images))
}

#[instrument(skip(state))]
async fn study_images(
	State(state): State<AppState>,
	Path(study): Path<ResourceId>,
	Query(parameters): Query<QualityParameter>,
) -> Result<Json<StudyImages>, ApiError> {
	let listing = &state.config.listing;
	let quality = ImageQuality::from_param(parameters.quality.as_deref(), listing.default_quality());

	ImageListingService::new(state.archive.as_ref(), listing.mode)
		.list(&study, quality)
		.await
		.map(Json)
}
