//! Bounded, deduplicated, self-expiring record of recent lookups.
//!
//! Two structures live in the backing store: one expiring value per lookup identifier, and a
//! sorted index of identifiers scored by recording time. They are written in one batch but are
//! not kept consistent by the store; readers repair the index lazily.

use std::{future::Future, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::time::Instant;

use crate::{
	error::LedgerError,
	lookup::{LookupKey, LookupKind},
};
use armory_config::LEDGER_MODE_TRANSACTIONAL;
use armory_storage::{BackingStore, Batch, rank};

const SECONDS_PER_HOUR: u64 = 3_600;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchEntry {
	#[serde(rename = "type")]
	pub kind: LookupKind,
	pub name: String,
	pub realm: String,
	pub region: String,
	#[serde(with = "time::serde::rfc3339")]
	pub timestamp: OffsetDateTime,
}
impl SearchEntry {
	pub fn new(key: &LookupKey, timestamp: OffsetDateTime) -> Self {
		Self {
			kind: key.kind(),
			name: key.name().to_string(),
			realm: key.realm().to_string(),
			region: key.region().to_string(),
			timestamp,
		}
	}

	pub fn identifier(&self) -> String {
		format!("{}:{}:{}:{}", self.kind, self.region, self.realm, self.name)
	}
}

pub trait Clock
where
	Self: Send + Sync,
{
	fn now(&self) -> OffsetDateTime;
}

pub struct SystemClock;
impl Clock for SystemClock {
	fn now(&self) -> OffsetDateTime {
		OffsetDateTime::now_utc()
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerMode {
	/// One pipelined batch; any prefix of it may apply.
	BestEffort,
	/// The batch is applied all-or-nothing where the store supports it.
	Transactional,
}

#[derive(Debug, Clone)]
pub struct LedgerSettings {
	pub index_key: String,
	pub max_entries: usize,
	pub retention: Duration,
	pub timeout: Duration,
	pub mode: LedgerMode,
}
impl LedgerSettings {
	pub fn from_config(cfg: &armory_config::Ledger) -> Self {
		let mode = if cfg.mode == LEDGER_MODE_TRANSACTIONAL {
			LedgerMode::Transactional
		} else {
			LedgerMode::BestEffort
		};

		Self {
			index_key: cfg.index_key.clone(),
			max_entries: (cfg.max_entries as usize).max(1),
			retention: Duration::from_secs(u64::from(cfg.retention_hours) * SECONDS_PER_HOUR),
			timeout: Duration::from_millis(cfg.timeout_ms),
			mode,
		}
	}
}

pub struct RecencyLedger {
	store: Arc<dyn BackingStore>,
	clock: Arc<dyn Clock>,
	settings: LedgerSettings,
}
impl RecencyLedger {
	pub fn new(store: Arc<dyn BackingStore>, settings: LedgerSettings) -> Self {
		Self::with_clock(store, settings, Arc::new(SystemClock))
	}

	/// A `max_entries` of zero is raised to one; the index always keeps the newest entry.
	pub fn with_clock(
		store: Arc<dyn BackingStore>,
		mut settings: LedgerSettings,
		clock: Arc<dyn Clock>,
	) -> Self {
		settings.max_entries = settings.max_entries.max(1);

		Self { store, clock, settings }
	}

	pub fn settings(&self) -> &LedgerSettings {
		&self.settings
	}

	pub async fn record(&self, key: &LookupKey) -> Result<(), LedgerError> {
		self.record_until(key, self.default_deadline()).await
	}

	/// Writes the entry, refreshes its index position, trims the index and renews its TTL.
	pub async fn record_until(
		&self,
		key: &LookupKey,
		deadline: Instant,
	) -> Result<(), LedgerError> {
		let now = self.clock.now();
		let identifier = key.identifier();
		let entry = SearchEntry::new(key, now);
		let value = serde_json::to_string(&entry).map_err(|err| LedgerError::CorruptEntry {
			identifier: identifier.clone(),
			message: err.to_string(),
		})?;
		let index = self.settings.index_key.as_str();
		let retention = self.settings.retention;
		let (start, stop) = rank::excess_beyond(self.settings.max_entries);
		let batch = Batch::new()
			.atomic(self.settings.mode == LedgerMode::Transactional)
			.set_with_ttl(identifier.as_str(), value, retention)
			.add_member(index, identifier.as_str(), score(now))
			.remove_rank_range(index, start, stop)
			.expire(index, retention);

		bounded("record", deadline, self.store.submit(batch)).await?;

		tracing::debug!(%identifier, "Recorded recent search.");

		Ok(())
	}

	pub async fn list_recent(&self) -> Result<Vec<SearchEntry>, LedgerError> {
		self.list_recent_until(self.default_deadline()).await
	}

	/// Most recent first. Missing or expired entries are removed from both structures on the way
	/// and left out of the result.
	pub async fn list_recent_until(
		&self,
		deadline: Instant,
	) -> Result<Vec<SearchEntry>, LedgerError> {
		let index = self.settings.index_key.as_str();
		let stop = self.settings.max_entries as isize - 1;
		let identifiers =
			bounded("list_recent", deadline, self.store.rev_range(index, 0, stop)).await?;

		if identifiers.is_empty() {
			return Ok(Vec::new());
		}

		let values = bounded("list_recent", deadline, self.store.get_many(&identifiers)).await?;
		let cutoff = self.clock.now() - self.settings.retention;
		let mut entries = Vec::with_capacity(identifiers.len());
		let mut cleanup_error = None;

		for (identifier, raw) in identifiers.iter().zip(values) {
			if let Some(raw) = raw {
				let entry: SearchEntry =
					serde_json::from_str(&raw).map_err(|err| LedgerError::CorruptEntry {
						identifier: identifier.clone(),
						message: err.to_string(),
					})?;

				if entry.timestamp >= cutoff {
					entries.push(entry);

					continue;
				}
			}

			if let Err(err) = self.evict(identifier, deadline).await {
				tracing::warn!(%identifier, error = %err, "Failed to remove stale recent search.");

				cleanup_error.get_or_insert(err);
			}
		}

		match cleanup_error {
			Some(err) => Err(err),
			None => Ok(entries),
		}
	}

	pub async fn index_len(&self) -> Result<usize, LedgerError> {
		let index = self.settings.index_key.as_str();

		bounded("index_len", self.default_deadline(), self.store.cardinality(index)).await
	}

	pub async fn ping(&self) -> Result<(), LedgerError> {
		bounded("ping", self.default_deadline(), self.store.ping()).await
	}

	// Both removals are attempted even if the first fails.
	async fn evict(&self, identifier: &str, deadline: Instant) -> Result<(), LedgerError> {
		let index = self.settings.index_key.as_str();
		let value = bounded("cleanup", deadline, self.store.delete(identifier)).await;
		let member =
			bounded("cleanup", deadline, self.store.remove_member(index, identifier)).await;

		match (value, member) {
			(Ok(_), Ok(_)) => {
				tracing::debug!(%identifier, "Removed stale recent search.");

				Ok(())
			},
			(Err(err), _) | (_, Err(err)) => Err(LedgerError::CleanupFailed {
				identifier: identifier.to_string(),
				message: err.to_string(),
			}),
		}
	}

	fn default_deadline(&self) -> Instant {
		Instant::now() + self.settings.timeout
	}
}

/// Fractional seconds keep recordings within the same second in order.
fn score(at: OffsetDateTime) -> f64 {
	at.unix_timestamp_nanos() as f64 / 1e9
}

async fn bounded<T, F>(operation: &'static str, deadline: Instant, fut: F) -> Result<T, LedgerError>
where
	F: Future<Output = armory_storage::Result<T>>,
{
	match tokio::time::timeout_at(deadline, fut).await {
		Ok(Ok(value)) => Ok(value),
		Ok(Err(err)) => Err(LedgerError::StoreUnavailable { operation, message: err.to_string() }),
		Err(_) => Err(LedgerError::StoreUnavailable {
			operation,
			message: "Deadline elapsed before the store answered.".to_string(),
		}),
	}
}
