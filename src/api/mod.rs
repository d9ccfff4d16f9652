use crate::AppState;
use axum::Router;
use serde::Deserialize;

mod error;
mod home;
pub mod images;
mod instances;
mod studies;

pub use error::ApiError;

pub fn routes(base_path: &str) -> Router<AppState> {
	let router = Router::new().merge(home::routes()).nest(
		"/api",
		Router::new()
			.merge(studies::routes())
			.merge(images::routes())
			.merge(instances::routes()),
	);

	// axum no longer supports nesting at the root
	match base_path {
		"/" | "" => router,
		base_path => Router::new().nest(base_path, router),
	}
}

/// The `quality` query parameter, kept as text so that malformed values can fall back to the
/// endpoint's default instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct QualityParameter {
	pub quality: Option<String>,
}
