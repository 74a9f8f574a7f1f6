use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
	#[error("{field} must be non-empty.")]
	Empty { field: &'static str },
	#[error("{field} must not contain ':'.")]
	Separator { field: &'static str },
	#[error("region must contain only lowercase letters, digits, and '-'.")]
	InvalidRegion,
	#[error("{field} must not be a '.' or '..' path segment.")]
	DotSegment { field: &'static str },
	#[error("Unknown lookup kind {0:?}; expected character or guild.")]
	UnknownKind(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupKind {
	Character,
	Guild,
}
impl LookupKind {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Character => "character",
			Self::Guild => "guild",
		}
	}
}
impl fmt::Display for LookupKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
impl FromStr for LookupKind {
	type Err = LookupError;

	fn from_str(raw: &str) -> Result<Self, Self::Err> {
		match raw.trim().to_lowercase().as_str() {
			"character" => Ok(Self::Character),
			"guild" => Ok(Self::Guild),
			_ => Err(LookupError::UnknownKind(raw.to_string())),
		}
	}
}

/// Identity of one lookup. Fields are trimmed and lower-cased on construction, so two keys that
/// differ only in case are the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LookupKey {
	kind: LookupKind,
	region: String,
	realm: String,
	name: String,
}
impl LookupKey {
	pub fn new(
		kind: LookupKind,
		region: &str,
		realm: &str,
		name: &str,
	) -> Result<Self, LookupError> {
		Ok(Self {
			kind,
			region: normalize_region(region)?,
			realm: normalize_segment("realm", realm)?,
			name: normalize_segment("name", name)?,
		})
	}

	pub fn kind(&self) -> LookupKind {
		self.kind
	}

	pub fn region(&self) -> &str {
		&self.region
	}

	pub fn realm(&self) -> &str {
		&self.realm
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	/// `kind:region:realm:name`, the ledger's key for this lookup.
	pub fn identifier(&self) -> String {
		format!("{}:{}:{}:{}", self.kind, self.region, self.realm, self.name)
	}
}
impl fmt::Display for LookupKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}:{}:{}", self.kind, self.region, self.realm, self.name)
	}
}

fn normalize(field: &'static str, raw: &str) -> Result<String, LookupError> {
	let value = raw.trim().to_lowercase();

	if value.is_empty() {
		return Err(LookupError::Empty { field });
	}
	if value.contains(':') {
		return Err(LookupError::Separator { field });
	}

	Ok(value)
}

fn normalize_region(raw: &str) -> Result<String, LookupError> {
	let value = normalize("region", raw)?;

	if !value.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-') {
		return Err(LookupError::InvalidRegion);
	}

	Ok(value)
}

// Realm and name are percent-encoded into URLs, which leaves dot segments intact.
fn normalize_segment(field: &'static str, raw: &str) -> Result<String, LookupError> {
	let value = normalize(field, raw)?;

	if value == "." || value == ".." {
		return Err(LookupError::DotSegment { field });
	}

	Ok(value)
}
