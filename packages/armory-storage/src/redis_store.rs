use std::time::Duration;

use redis::{Client, aio::ConnectionManager};

use crate::{BackingStore, Batch, BoxFuture, Command, Error, Result};

/// Redis-backed store over a multiplexed, auto-reconnecting connection.
///
/// Clones share the same connection, so one instance serves every concurrent caller.
#[derive(Clone)]
pub struct RedisStore {
	conn: ConnectionManager,
}
impl RedisStore {
	pub async fn connect(cfg: &armory_config::Redis) -> Result<Self> {
		let client = Client::open(cfg.url.as_str())?;
		let timeout = Duration::from_millis(cfg.connect_timeout_ms);
		let conn = tokio::time::timeout(timeout, ConnectionManager::new(client))
			.await
			.map_err(|_| Error::Timeout { operation: "connect" })??;
		let store = Self { conn };

		tokio::time::timeout(timeout, store.ping())
			.await
			.map_err(|_| Error::Timeout { operation: "ping" })??;

		tracing::info!("Connected to Redis.");

		Ok(store)
	}

	fn connection(&self) -> ConnectionManager {
		self.conn.clone()
	}
}
impl BackingStore for RedisStore {
	fn ping(&self) -> BoxFuture<'_, Result<()>> {
		Box::pin(async move {
			let mut conn = self.connection();
			let pong: String = redis::cmd("PING").query_async(&mut conn).await?;

			if pong != "PONG" {
				return Err(Error::Unavailable(format!("unexpected PING reply {pong:?}")));
			}

			Ok(())
		})
	}

	fn get_many<'a>(&'a self, keys: &'a [String]) -> BoxFuture<'a, Result<Vec<Option<String>>>> {
		Box::pin(async move {
			if keys.is_empty() {
				return Ok(Vec::new());
			}

			let mut cmd = redis::cmd("MGET");

			for key in keys {
				cmd.arg(key.as_str());
			}

			let mut conn = self.connection();
			let values: Vec<Option<String>> = cmd.query_async(&mut conn).await?;

			Ok(values)
		})
	}

	fn rev_range<'a>(
		&'a self,
		key: &'a str,
		start: isize,
		stop: isize,
	) -> BoxFuture<'a, Result<Vec<String>>> {
		Box::pin(async move {
			let mut conn = self.connection();
			let members: Vec<String> = redis::cmd("ZREVRANGE")
				.arg(key)
				.arg(start)
				.arg(stop)
				.query_async(&mut conn)
				.await?;

			Ok(members)
		})
	}

	fn cardinality<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<usize>> {
		Box::pin(async move {
			let mut conn = self.connection();
			let count: usize = redis::cmd("ZCARD").arg(key).query_async(&mut conn).await?;

			Ok(count)
		})
	}

	fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move {
			let mut conn = self.connection();
			let removed: i64 = redis::cmd("DEL").arg(key).query_async(&mut conn).await?;

			Ok(removed > 0)
		})
	}

	fn remove_member<'a>(&'a self, key: &'a str, member: &'a str) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move {
			let mut conn = self.connection();
			let removed: i64 =
				redis::cmd("ZREM").arg(key).arg(member).query_async(&mut conn).await?;

			Ok(removed > 0)
		})
	}

	fn submit(&self, batch: Batch) -> BoxFuture<'_, Result<()>> {
		Box::pin(async move {
			if batch.is_empty() {
				return Ok(());
			}

			let mut pipe = redis::pipe();

			if batch.is_atomic() {
				pipe.atomic();
			}

			for command in batch.into_commands() {
				match command {
					Command::SetWithTtl { key, value, ttl } => {
						pipe.cmd("SET").arg(key).arg(value).arg("EX").arg(ttl_secs(ttl)?).ignore();
					},
					Command::AddMember { key, member, score } => {
						pipe.cmd("ZADD").arg(key).arg(score).arg(member).ignore();
					},
					Command::RemoveRankRange { key, start, stop } => {
						pipe.cmd("ZREMRANGEBYRANK").arg(key).arg(start).arg(stop).ignore();
					},
					Command::Expire { key, ttl } => {
						pipe.cmd("EXPIRE").arg(key).arg(ttl_secs(ttl)?).ignore();
					},
				}
			}

			let mut conn = self.connection();
			let _: () = pipe.query_async(&mut conn).await?;

			Ok(())
		})
	}
}

fn ttl_secs(ttl: Duration) -> Result<u64> {
	let secs = ttl.as_secs();

	if secs == 0 {
		return Err(Error::InvalidArgument("TTL must be at least one second.".to_string()));
	}

	Ok(secs)
}
