#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Redis(#[from] redis::RedisError),
	#[error("Backing store operation {operation} timed out.")]
	Timeout { operation: &'static str },
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),
	#[error("Backing store is unavailable: {0}")]
	Unavailable(String),
}
