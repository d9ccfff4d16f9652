use super::{Archive, ArchiveError, ArchiveInstance, ArchiveSeries};
use crate::config::ArchiveConfig;
use crate::types::{ImageQuality, ResourceId};
use crate::SERVER_NAME;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Method, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{error, info, instrument, trace};
use url::Url;

/// HTTP client for the archive's REST API.
#[derive(Debug, Clone)]
pub struct ArchiveClient {
	http: reqwest::Client,
	base_url: Url,
}

impl ArchiveClient {
	pub fn new(config: &ArchiveConfig) -> anyhow::Result<Self> {
		anyhow::ensure!(
			!config.url.cannot_be_a_base(),
			"archive URL {} cannot have a path appended",
			config.url
		);

		info!("Using archive at {}", &config.url);
		let mut builder = reqwest::Client::builder().user_agent(SERVER_NAME);
		if let Some(timeout) = config.timeout {
			builder = builder.timeout(Duration::from_millis(timeout));
		}

		Ok(Self {
			http: builder.build()?,
			base_url: config.url.clone(),
		})
	}

	/// Appends percent-encoded path segments to the base URL, keeping any path prefix of the
	/// base URL (e.g. `http://host/orthanc`).
	fn endpoint(&self, segments: &[&str]) -> Url {
		let mut url = self.base_url.clone();
		if let Ok(mut path) = url.path_segments_mut() {
			path.pop_if_empty().extend(segments);
		}
		url
	}

	/// Sends a request to an archive route such as `/tools/find`.
	///
	/// Transport failures, timeouts and non-2xx responses are all turned into an [`ArchiveError`],
	/// so a returned [`Response`] always carries a success status.
	#[instrument(skip(self, body, query), level = "debug")]
	pub async fn request(
		&self,
		path: &str,
		method: Method,
		body: Option<&serde_json::Value>,
		query: &[(&str, String)],
	) -> Result<Response, ArchiveError> {
		let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
		self.send(self.endpoint(&segments), method, body, query)
			.await
	}

	async fn send(
		&self,
		url: Url,
		method: Method,
		body: Option<&serde_json::Value>,
		query: &[(&str, String)],
	) -> Result<Response, ArchiveError> {
		let path = url.path().to_owned();
		let mut request = self.http.request(method, url);
		if let Some(body) = body {
			request = request.json(body);
		}
		if !query.is_empty() {
			request = request.query(query);
		}

		let response = request.send().await.map_err(|err| {
			error!("Archive request to {path} failed: {err}");
			ArchiveError::Unreachable { source: err }
		})?;

		let status = response.status();
		if !status.is_success() {
			error!("Archive request to {path} failed with status {status}");
			return Err(ArchiveError::ErrorStatus { status, path });
		}

		trace!("Archive responded with {status} for {path}");
		Ok(response)
	}

	async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, ArchiveError> {
		let url = self.endpoint(segments);
		let path = url.path().to_owned();
		let response = self.send(url, Method::GET, None, &[]).await?;
		response.json().await.map_err(|err| {
			error!("Failed to decode archive response for {path}: {err}");
			ArchiveError::DataShape {
				path,
				reason: err.to_string(),
			}
		})
	}
}

#[async_trait]
impl Archive for ArchiveClient {
	async fn studies(&self) -> Result<Vec<ResourceId>, ArchiveError> {
		self.get_json(&["studies"]).await
	}

	async fn study(&self, study: &str) -> Result<serde_json::Value, ArchiveError> {
		self.get_json(&["studies", study]).await
	}

	async fn shared_tags(&self, study: &str) -> Result<serde_json::Value, ArchiveError> {
		self.get_json(&["studies", study, "shared-tags"]).await
	}

	async fn study_instances(&self, study: &str) -> Result<Vec<ArchiveInstance>, ArchiveError> {
		self.get_json(&["studies", study, "instances"]).await
	}

	async fn series(&self, series: &str) -> Result<ArchiveSeries, ArchiveError> {
		self.get_json(&["series", series]).await
	}

	async fn rendered_instance(
		&self,
		instance: &str,
		quality: ImageQuality,
	) -> Result<Bytes, ArchiveError> {
		let url = self.endpoint(&["instances", instance, "rendered"]);
		let response = self
			.send(url, Method::GET, None, &[("quality", quality.to_string())])
			.await?;

		response.bytes().await.map_err(|err| {
			error!("Failed to read rendered instance {instance}: {err}");
			ArchiveError::Unreachable { source: err }
		})
	}

	fn rendered_frame_url(&self, instance: &str, quality: ImageQuality) -> String {
		let mut url = self.endpoint(&["instances", instance, "frames", "0", "rendered"]);
		url.query_pairs_mut()
			.append_pair("quality", &quality.to_string());
		url.into()
	}
}
