use crate::api::ApiError;
use crate::archive::{Archive, ArchiveInstance};
use crate::config::ListingMode;
use crate::types::{parse_integer_string, ImageQuality, ResourceId};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, instrument, warn};

/// Response body of `/api/studies/{study}/images`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyImages {
	pub study_id: ResourceId,
	pub image_count: usize,
	pub images: Vec<RenderedImage>,
}

/// A renderable instance of a study.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedImage {
	pub instance_id: ResourceId,
	pub image_url: String,
	/// Only present for [`ListingMode::Sorted`].
	#[serde(skip_serializing_if = "Option::is_none")]
	pub series_number: Option<i64>,
	/// Only present for [`ListingMode::Sorted`].
	#[serde(skip_serializing_if = "Option::is_none")]
	pub instance_number: Option<i64>,
}

/// An instance together with the keys used to put it into display order.
#[derive(Debug, Clone, PartialEq, Eq)]
struct OrderedInstance {
	id: ResourceId,
	series_number: i64,
	instance_number: i64,
}

/// Lists the images of a study as URLs of rendered frames on the archive.
pub struct ImageListingService<'a> {
	archive: &'a dyn Archive,
	mode: ListingMode,
}

impl<'a> ImageListingService<'a> {
	pub fn new(archive: &'a dyn Archive, mode: ListingMode) -> Self {
		Self { archive, mode }
	}

	#[instrument(skip(self))]
	pub async fn list(&self, study: &str, quality: ImageQuality) -> Result<StudyImages, ApiError> {
		let instances = self
			.archive
			.study_instances(study)
			.await
			.map_err(ApiError::StudyInstances)?;

		let images: Vec<RenderedImage> = match self.mode {
			ListingMode::Sorted => {
				let series_numbers = self.series_numbers(&instances).await;
				display_order(&instances, &series_numbers)
					.into_iter()
					.map(|instance| RenderedImage {
						image_url: self.archive.rendered_frame_url(&instance.id, quality),
						instance_id: instance.id,
						series_number: Some(instance.series_number),
						instance_number: Some(instance.instance_number),
					})
					.collect()
			}
			ListingMode::Archive => instances
				.into_iter()
				.map(|instance| RenderedImage {
					image_url: self.archive.rendered_frame_url(&instance.id, quality),
					instance_id: instance.id,
					series_number: None,
					instance_number: None,
				})
				.collect(),
		};

		debug!("Listed {} images of study {study}", images.len());
		Ok(StudyImages {
			study_id: study.to_owned(),
			image_count: images.len(),
			images,
		})
	}

	/// Looks up the SeriesNumber of every series referenced by `instances`, one request at a time.
	///
	/// Series whose lookup fails are left out of the map. A series without a parsable
	/// SeriesNumber maps to 0.
	async fn series_numbers(&self, instances: &[ArchiveInstance]) -> HashMap<ResourceId, i64> {
		let mut series_numbers = HashMap::new();
		for series in distinct_series(instances) {
			match self.archive.series(series).await {
				Ok(response) => {
					let number =
						parse_integer_string(response.main_dicom_tags.series_number.as_deref());
					series_numbers.insert(series.to_owned(), number);
				}
				Err(err) => warn!("Cannot order series {series} by SeriesNumber: {err}"),
			}
		}
		series_numbers
	}
}

/// Parent series of `instances` without duplicates, in order of first appearance.
fn distinct_series(instances: &[ArchiveInstance]) -> Vec<&str> {
	let mut seen = HashSet::new();
	instances
		.iter()
		.map(|instance| instance.parent_series.as_str())
		.filter(|series| seen.insert(*series))
		.collect()
}

/// Sorts instances by (SeriesNumber, InstanceNumber).
///
/// Unknown series and missing or malformed InstanceNumbers count as 0. The sort is stable, so
/// ties keep the archive's order.
fn display_order(
	instances: &[ArchiveInstance],
	series_numbers: &HashMap<ResourceId, i64>,
) -> Vec<OrderedInstance> {
	let mut ordered: Vec<OrderedInstance> = instances
		.iter()
		.map(|instance| OrderedInstance {
			id: instance.id.clone(),
			series_number: series_numbers
				.get(&instance.parent_series)
				.copied()
				.unwrap_or(0),
			instance_number: parse_integer_string(
				instance.main_dicom_tags.instance_number.as_deref(),
			),
		})
		.collect();

	ordered.sort_by_key(|instance| (instance.series_number, instance.instance_number));
	ordered
}
