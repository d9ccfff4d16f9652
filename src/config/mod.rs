use crate::types::ImageQuality;
use serde::{Deserialize, Deserializer};
use std::net::IpAddr;
use std::str::FromStr;
use url::Url;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
	pub telemetry: TelemetryConfig,
	pub server: ServerConfig,
	pub archive: ArchiveConfig,
	pub listing: ListingConfig,
	pub rendering: RenderingConfig,
}

impl AppConfig {
	/// Loads the configuration from the embedded defaults, an optional `config.toml` in the
	/// working directory and `IMAGE_PROXY__*` environment variables (in that order).
	pub fn new() -> Result<Self, config::ConfigError> {
		Self::builder()
			.add_source(config::File::with_name("config.toml").required(false))
			.add_source(
				config::Environment::with_prefix("IMAGE_PROXY")
					.prefix_separator("__")
					.separator("__"),
			)
			.build()?
			.try_deserialize()
	}

	fn builder() -> config::ConfigBuilder<config::builder::DefaultState> {
		config::Config::builder().add_source(config::File::from_str(
			include_str!("defaults.toml"),
			config::FileFormat::Toml,
		))
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
	/// Default log level. Can be overridden with `RUST_LOG`.
	#[serde(deserialize_with = "deserialize_level")]
	pub level: tracing::Level,
	/// Sentry DSN. Error reporting is disabled if absent.
	pub sentry: Option<String>,
}

fn deserialize_level<'de, D>(deserializer: D) -> Result<tracing::Level, D::Error>
where
	D: Deserializer<'de>,
{
	let s = String::deserialize(deserializer)?;
	tracing::Level::from_str(&s).map_err(serde::de::Error::custom)
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
	pub http: HttpServerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpServerConfig {
	/// The interface the proxy will be listening on
	pub interface: IpAddr,
	/// The port the proxy will be listening on
	pub port: u16,
	/// Path prefix for all routes
	pub base_path: String,
	/// Seconds until an inbound request is aborted
	pub request_timeout: u64,
	pub graceful_shutdown: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveConfig {
	/// Base URL of the archive's REST API.
	pub url: Url,
	/// Optional timeout in milliseconds for outbound archive requests.
	/// The HTTP client's defaults apply if unset.
	pub timeout: Option<u64>,
}

/// Controls how study images are ordered by `/api/studies/{study}/images`.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingMode {
	/// Sort by (SeriesNumber, InstanceNumber) for clinical display order.
	#[default]
	Sorted,
	/// Keep the order returned by the archive. No per-series lookups are made.
	Archive,
}

impl ListingMode {
	pub const fn default_quality(self) -> ImageQuality {
		match self {
			Self::Sorted => ImageQuality::LISTING,
			Self::Archive => ImageQuality::RENDERED,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListingConfig {
	#[serde(default)]
	pub mode: ListingMode,
	/// Overrides the default quality of the listing mode.
	pub default_quality: Option<ImageQuality>,
}

impl ListingConfig {
	pub fn default_quality(&self) -> ImageQuality {
		self.default_quality
			.unwrap_or_else(|| self.mode.default_quality())
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenderingConfig {
	pub default_quality: ImageQuality,
}
