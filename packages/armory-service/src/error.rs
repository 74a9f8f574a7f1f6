use crate::lookup::LookupError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Fetch(#[from] FetchError),
	#[error(transparent)]
	Ledger(#[from] LedgerError),
	#[error("Failed to obtain an access token: {0}")]
	Token(#[source] armory_providers::Error),
	#[error("Invalid argument: {message}")]
	InvalidArgument { message: String },
}
impl From<LookupError> for Error {
	fn from(err: LookupError) -> Self {
		Self::InvalidArgument { message: err.to_string() }
	}
}

/// Failure of a whole aggregation. Only surfaced when no endpoint succeeded.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
	#[error("Invalid argument: {message}")]
	InvalidArgument { message: String },
	#[error("Endpoint {endpoint} rejected the credentials with status {status}.")]
	AuthFailure { endpoint: String, status: u16 },
	#[error("Endpoint {endpoint} failed: {message}")]
	UpstreamFailure { endpoint: String, status: Option<u16>, message: String },
	#[error("Endpoint {endpoint} returned an unusable body: {message}")]
	DecodeFailure { endpoint: String, message: String },
	#[error("Endpoint {endpoint} did not answer before the deadline.")]
	Timeout { endpoint: String },
}
impl FetchError {
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::AuthFailure { status, .. } => Some(*status),
			Self::UpstreamFailure { status, .. } => *status,
			_ => None,
		}
	}

	pub fn is_not_found(&self) -> bool {
		matches!(self, Self::UpstreamFailure { status: Some(404), .. })
	}
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
	#[error("Recent-search store is unavailable during {operation}: {message}")]
	StoreUnavailable { operation: &'static str, message: String },
	#[error("Recent-search entry {identifier} is corrupt: {message}")]
	CorruptEntry { identifier: String, message: String },
	#[error("Failed to remove stale recent-search entry {identifier}: {message}")]
	CleanupFailed { identifier: String, message: String },
}
