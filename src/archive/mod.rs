mod client;

pub use client::ArchiveClient;

use crate::types::{ImageQuality, ResourceId};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use serde::{Deserialize, Deserializer};
use thiserror::Error;

/// Read access to the image archive.
///
/// [`ArchiveClient`] implements this over the archive's REST API. Every method issues exactly
/// one request and never retries.
#[async_trait]
pub trait Archive: Send + Sync {
	/// `GET /studies`
	async fn studies(&self) -> Result<Vec<ResourceId>, ArchiveError>;

	/// `GET /studies/{study}`
	async fn study(&self, study: &str) -> Result<serde_json::Value, ArchiveError>;

	/// `GET /studies/{study}/shared-tags`
	async fn shared_tags(&self, study: &str) -> Result<serde_json::Value, ArchiveError>;

	/// `GET /studies/{study}/instances`
	async fn study_instances(&self, study: &str) -> Result<Vec<ArchiveInstance>, ArchiveError>;

	/// `GET /series/{series}`
	async fn series(&self, series: &str) -> Result<ArchiveSeries, ArchiveError>;

	/// `GET /instances/{instance}/rendered?quality={quality}`
	async fn rendered_instance(
		&self,
		instance: &str,
		quality: ImageQuality,
	) -> Result<Bytes, ArchiveError>;

	/// Absolute URL of the first rendered frame of an instance, suitable for handing to a browser.
	fn rendered_frame_url(&self, instance: &str, quality: ImageQuality) -> String;
}

#[derive(Debug, Error)]
pub enum ArchiveError {
	#[error("archive is unreachable: {source}")]
	Unreachable {
		#[source]
		source: reqwest::Error,
	},
	#[error("archive responded with {status} for {path}")]
	ErrorStatus { status: StatusCode, path: String },
	#[error("unexpected archive response for {path}: {reason}")]
	DataShape { path: String, reason: String },
}

/// An entry of `GET /studies/{study}/instances`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ArchiveInstance {
	#[serde(rename = "ID")]
	pub id: ResourceId,
	pub parent_series: ResourceId,
	#[serde(default)]
	pub main_dicom_tags: MainDicomTags,
}

/// The subset of `GET /series/{series}` that is used for ordering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ArchiveSeries {
	#[serde(default)]
	pub main_dicom_tags: MainDicomTags,
}

/// Tags the archive indexes for every resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MainDicomTags {
	#[serde(default, deserialize_with = "deserialize_tag_value")]
	pub series_number: Option<String>,
	#[serde(default, deserialize_with = "deserialize_tag_value")]
	pub instance_number: Option<String>,
}

/// Tag values are normally strings, but numbers are accepted too. Any other JSON type is
/// treated as a missing value.
fn deserialize_tag_value<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
	D: Deserializer<'de>,
{
	Ok(match serde_json::Value::deserialize(deserializer)? {
		serde_json::Value::String(value) => Some(value),
		serde_json::Value::Number(value) => Some(value.to_string()),
		_ => None,
	})
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;
	use std::collections::HashMap;
	use std::sync::Mutex;

	/// In-memory archive used by the route and service tests.
	///
	/// Lookups of unknown resources fail with `404 Not Found`. Every call is recorded in
	/// `requests` in the order it was made.
	#[derive(Default)]
	pub struct FakeArchive {
		pub base_url: String,
		pub studies: Option<Vec<ResourceId>>,
		pub study_details: HashMap<ResourceId, serde_json::Value>,
		pub shared_tags: HashMap<ResourceId, serde_json::Value>,
		pub instances: HashMap<ResourceId, Vec<ArchiveInstance>>,
		pub series: HashMap<ResourceId, ArchiveSeries>,
		pub rendered: HashMap<ResourceId, Bytes>,
		pub requests: Mutex<Vec<String>>,
	}

	impl FakeArchive {
		pub fn new() -> Self {
			Self {
				base_url: String::from("http://archive.test"),
				..Default::default()
			}
		}

		pub fn with_series(mut self, series: &str, number: Option<&str>) -> Self {
			self.series.insert(
				series.to_owned(),
				ArchiveSeries {
					main_dicom_tags: MainDicomTags {
						series_number: number.map(str::to_owned),
						instance_number: None,
					},
				},
			);
			self
		}

		pub fn with_instances(mut self, study: &str, instances: Vec<ArchiveInstance>) -> Self {
			self.instances.insert(study.to_owned(), instances);
			self
		}

		pub fn requests(&self) -> Vec<String> {
			self.requests.lock().unwrap().clone()
		}

		fn record(&self, path: String) -> String {
			self.requests.lock().unwrap().push(path.clone());
			path
		}
	}

	pub fn instance(id: &str, series: &str, number: Option<&str>) -> ArchiveInstance {
		ArchiveInstance {
			id: id.to_owned(),
			parent_series: series.to_owned(),
			main_dicom_tags: MainDicomTags {
				series_number: None,
				instance_number: number.map(str::to_owned),
			},
		}
	}

	fn not_found(path: String) -> ArchiveError {
		ArchiveError::ErrorStatus {
			status: StatusCode::NOT_FOUND,
			path,
		}
	}

	#[async_trait]
	impl Archive for FakeArchive {
		async fn studies(&self) -> Result<Vec<ResourceId>, ArchiveError> {
			let path = self.record(String::from("/studies"));
			self.studies.clone().ok_or_else(|| not_found(path))
		}

		async fn study(&self, study: &str) -> Result<serde_json::Value, ArchiveError> {
			let path = self.record(format!("/studies/{study}"));
			self.study_details
				.get(study)
				.cloned()
				.ok_or_else(|| not_found(path))
		}

		async fn shared_tags(&self, study: &str) -> Result<serde_json::Value, ArchiveError> {
			let path = self.record(format!("/studies/{study}/shared-tags"));
			self.shared_tags
				.get(study)
				.cloned()
				.ok_or_else(|| not_found(path))
		}

		async fn study_instances(&self, study: &str) -> Result<Vec<ArchiveInstance>, ArchiveError> {
			let path = self.record(format!("/studies/{study}/instances"));
			self.instances
				.get(study)
				.cloned()
				.ok_or_else(|| not_found(path))
		}

		async fn series(&self, series: &str) -> Result<ArchiveSeries, ArchiveError> {
			let path = self.record(format!("/series/{series}"));
			self.series
				.get(series)
				.cloned()
				.ok_or_else(|| not_found(path))
		}

		async fn rendered_instance(
			&self,
			instance: &str,
			quality: ImageQuality,
		) -> Result<Bytes, ArchiveError> {
			let path = self.record(format!("/instances/{instance}/rendered?quality={quality}"));
			self.rendered
				.get(instance)
				.cloned()
				.ok_or_else(|| not_found(path))
		}

		fn rendered_frame_url(&self, instance: &str, quality: ImageQuality) -> String {
			format!(
				"{}/instances/{instance}/frames/0/rendered?quality={quality}",
				self.base_url
			)
		}
	}

	#[test]
	fn deserialize_study_instances() {
		let json = serde_json::json!([
			{
				"ID": "a",
				"ParentSeries": "s1",
				"Type": "Instance",
				"MainDicomTags": { "InstanceNumber": "3", "SOPInstanceUID": "1.2.3" }
			},
			{ "ID": "b", "ParentSeries": "s2" }
		]);

		let instances: Vec<ArchiveInstance> = serde_json::from_value(json).unwrap();
		assert_eq!(instances[0].id, "a");
		assert_eq!(instances[0].parent_series, "s1");
		assert_eq!(
			instances[0].main_dicom_tags.instance_number.as_deref(),
			Some("3")
		);
		assert_eq!(instances[1].main_dicom_tags, MainDicomTags::default());
	}

	#[test]
	fn numeric_tag_values_are_accepted() {
		let json = serde_json::json!([
			{ "ID": "a", "ParentSeries": "s1", "MainDicomTags": { "InstanceNumber": 3 } }
		]);
		let instances: Vec<ArchiveInstance> = serde_json::from_value(json).unwrap();
		assert_eq!(
			instances[0].main_dicom_tags.instance_number.as_deref(),
			Some("3")
		);

		let json = serde_json::json!({ "ID": "s1", "MainDicomTags": { "SeriesNumber": 2 } });
		let series: ArchiveSeries = serde_json::from_value(json).unwrap();
		assert_eq!(series.main_dicom_tags.series_number.as_deref(), Some("2"));
	}

	#[test]
	fn other_tag_value_types_count_as_missing() {
		let json = serde_json::json!({
			"MainDicomTags": { "SeriesNumber": null, "InstanceNumber": ["1"] }
		});
		let series: ArchiveSeries = serde_json::from_value(json).unwrap();
		assert_eq!(series.main_dicom_tags, MainDicomTags::default());
	}

	#[test]
	fn instance_without_parent_series_is_rejected() {
		let json = serde_json::json!([{ "ID": "a" }]);
		assert!(serde_json::from_value::<Vec<ArchiveInstance>>(json).is_err());
	}
}
