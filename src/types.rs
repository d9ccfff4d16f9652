use serde::Deserialize;
use std::fmt::{Display, Formatter};
use std::num::ParseIntError;
use std::str::FromStr;
use thiserror::Error;

/// Archive-assigned identifier of a study, series or instance.
///
/// These are the archive's own resource identifiers, not DICOM UIDs.
pub type ResourceId = String;

/// JPEG quality passed through to the archive's renderer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "u8")]
pub struct ImageQuality(u8);

impl ImageQuality {
	/// Default for display-ordered study listings.
	pub const LISTING: Self = Self(50);
	/// Default for rendered instances and archive-ordered study listings.
	pub const RENDERED: Self = Self(90);

	pub const fn new(value: u8) -> Result<Self, ParseImageQualityError> {
		match value {
			0..=100 => Ok(Self(value)),
			_ => Err(ParseImageQualityError::OutOfRange { value }),
		}
	}

	pub const fn as_u8(self) -> u8 {
		self.0
	}

	/// Parses an optional `quality` query parameter.
	///
	/// Absent, non-numeric and out-of-range values fall back to `default`.
	pub fn from_param(param: Option<&str>, default: Self) -> Self {
		param
			.and_then(|value| value.trim().parse().ok())
			.unwrap_or(default)
	}
}

impl From<ImageQuality> for u8 {
	fn from(quality: ImageQuality) -> Self {
		quality.0
	}
}

impl TryFrom<u8> for ImageQuality {
	type Error = ParseImageQualityError;

	fn try_from(value: u8) -> Result<Self, Self::Error> {
		Self::new(value)
	}
}

impl Display for ImageQuality {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

#[derive(Debug, Error)]
pub enum ParseImageQualityError {
	#[error(transparent)]
	ParseInt(#[from] ParseIntError),
	#[error("{value} is outside of the range 0..=100")]
	OutOfRange { value: u8 },
}

impl FromStr for ImageQuality {
	type Err = ParseImageQualityError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let value: u8 = s.parse()?;
		Self::new(value)
	}
}

/// Parses an IS (Integer String) value the way the archive reports it in `MainDicomTags`.
///
/// Returns 0 for empty or unparsable values.
pub fn parse_integer_string(value: Option<&str>) -> i64 {
	value
		.map(str::trim)
		.and_then(|value| value.parse().ok())
		.unwrap_or(0)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_quality_range() {
		assert!(ImageQuality::new(0).is_ok());
		assert!(ImageQuality::new(100).is_ok());
		assert!(ImageQuality::new(101).is_err());

		assert!("foobar".parse::<ImageQuality>().is_err());
		assert!("-1".parse::<ImageQuality>().is_err());
		assert_eq!(
			"75".parse::<ImageQuality>().unwrap(),
			ImageQuality::new(75).unwrap()
		);
	}

	#[test]
	fn deserialize_checks_range() {
		assert_eq!(
			serde_json::from_str::<ImageQuality>("90").unwrap(),
			ImageQuality::RENDERED
		);
		assert!(serde_json::from_str::<ImageQuality>("101").is_err());
	}

	#[test]
	fn quality_param_falls_back_to_default() {
		let default = ImageQuality::new(50).unwrap();

		assert_eq!(ImageQuality::from_param(None, default), default);
		assert_eq!(ImageQuality::from_param(Some("abc"), default), default);
		assert_eq!(ImageQuality::from_param(Some("250"), default), default);
		assert_eq!(ImageQuality::from_param(Some(""), default), default);
		assert_eq!(ImageQuality::from_param(Some("75"), default).as_u8(), 75);
	}

	#[test]
	fn integer_strings() {
		assert_eq!(parse_integer_string(Some("12")), 12);
		assert_eq!(parse_integer_string(Some(" 7 ")), 7);
		assert_eq!(parse_integer_string(Some("-3")), -3);
		assert_eq!(parse_integer_string(Some("")), 0);
		assert_eq!(parse_integer_string(Some("1.5")), 0);
		assert_eq!(parse_integer_string(Some("abc")), 0);
		assert_eq!(parse_integer_string(None), 0);
	}
}
