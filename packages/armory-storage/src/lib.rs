pub mod batch;
pub mod rank;
pub mod redis_store;

mod error;

pub use batch::{Batch, Command};
pub use error::Error;
pub use redis_store::RedisStore;

pub type Result<T, E = Error> = std::result::Result<T, E>;

use std::{future::Future, pin::Pin};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Remote key/value store with sorted sets, per-key expiration and batched submission.
///
/// A submitted [`Batch`] is one network round trip. Unless the batch is marked atomic, later
/// commands may be applied even if earlier ones failed, and a crash mid-batch can leave any
/// prefix applied.
pub trait BackingStore
where
	Self: Send + Sync,
{
	fn ping(&self) -> BoxFuture<'_, Result<()>>;

	/// Values for `keys` in order, `None` where the key is absent or expired.
	fn get_many<'a>(&'a self, keys: &'a [String]) -> BoxFuture<'a, Result<Vec<Option<String>>>>;

	/// Members of a sorted set by descending score, Redis rank semantics for `start`/`stop`.
	fn rev_range<'a>(
		&'a self,
		key: &'a str,
		start: isize,
		stop: isize,
	) -> BoxFuture<'a, Result<Vec<String>>>;

	fn cardinality<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<usize>>;

	/// Returns whether the key existed.
	fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<bool>>;

	/// Returns whether the member existed.
	fn remove_member<'a>(&'a self, key: &'a str, member: &'a str) -> BoxFuture<'a, Result<bool>>;

	fn submit(&self, batch: Batch) -> BoxFuture<'_, Result<()>>;
}
