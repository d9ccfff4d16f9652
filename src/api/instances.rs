use crate::api::{ApiError, QualityParameter};
use crate::types::{ImageQuality, ResourceId};
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tracing::instrument;

const RENDERED_CACHE_CONTROL: &str = "public, max-age=86400";

pub fn routes() -> Router<AppState> {
	Router::new().route("/instances/{instance}/rendered", get(rendered_instance))
}

#[instrument(skip(state))]
async fn rendered_instance(
	State(state): State<AppState>,
	Path(instance): Path<ResourceId>,
	Query(parameters): Query<QualityParameter>,
) -> Result<impl IntoResponse, ApiError> {
	let quality = ImageQuality::from_param(
		parameters.quality.as_deref(),
		state.config.rendering.default_quality,
	);

	let content = state
		.archive
		.rendered_instance(&instance, quality)
		.await
		.map_err(ApiError::RenderedInstance)?;

	Ok((
		[
			(CONTENT_TYPE, mime::IMAGE_JPEG.to_string()),
			(
				CONTENT_DISPOSITION,
				format!("inline; filename=instance-{instance}.jpg"),
			),
			(CACHE_CONTROL, RENDERED_CACHE_CONTROL.to_owned()),
		],
		content,
	))
}
