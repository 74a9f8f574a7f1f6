use std::{
	sync::{Arc, Mutex},
	time::Duration,
};

use time::OffsetDateTime;
use tokio::time::Instant;

use armory_service::{
	Clock, LedgerError, LedgerMode, LedgerSettings, LookupKey, LookupKind, RecencyLedger,
};
use armory_storage::Command;
use armory_testkit::MemoryStore;

const INDEX: &str = "recent_searches";

struct ManualClock {
	now: Mutex<OffsetDateTime>,
}
impl ManualClock {
	fn new() -> Self {
		Self { now: Mutex::new(time::macros::datetime!(2024-05-01 12:00:00 UTC)) }
	}

	fn advance(&self, by: time::Duration) {
		*self.now.lock().expect("clock lock") += by;
	}
}
impl Clock for ManualClock {
	fn now(&self) -> OffsetDateTime {
		*self.now.lock().expect("clock lock")
	}
}

struct Harness {
	store: Arc<MemoryStore>,
	clock: Arc<ManualClock>,
	ledger: RecencyLedger,
}

fn settings(max_entries: usize, mode: LedgerMode) -> LedgerSettings {
	LedgerSettings {
		index_key: INDEX.to_string(),
		max_entries,
		retention: Duration::from_secs(24 * 3_600),
		timeout: Duration::from_secs(2),
		mode,
	}
}

fn harness_with(settings: LedgerSettings) -> Harness {
	let store = Arc::new(MemoryStore::new());
	let clock = Arc::new(ManualClock::new());
	let ledger = RecencyLedger::with_clock(store.clone(), settings, clock.clone());

	Harness { store, clock, ledger }
}

fn harness() -> Harness {
	harness_with(settings(50, LedgerMode::BestEffort))
}

fn character(region: &str, realm: &str, name: &str) -> LookupKey {
	LookupKey::new(LookupKind::Character, region, realm, name).expect("valid key")
}

fn names(entries: &[armory_service::SearchEntry]) -> Vec<&str> {
	entries.iter().map(|entry| entry.name.as_str()).collect()
}

impl Harness {
	async fn record(&self, key: &LookupKey) {
		self.ledger.record(key).await.expect("Expected record to succeed.");
		self.clock.advance(time::Duration::seconds(1));
	}
}

#[tokio::test]
async fn most_recent_search_lists_first() {
	let h = harness();

	h.record(&character("eu", "darkspear", "thrall")).await;
	h.record(&character("us", "illidan", "arthas")).await;

	let entries = h.ledger.list_recent().await.expect("Expected entries.");

	assert_eq!(names(&entries), vec!["arthas", "thrall"]);
	assert_eq!(entries[1].region, "eu");
	assert_eq!(entries[1].realm, "darkspear");
	assert_eq!(entries[1].kind, LookupKind::Character);
}

#[tokio::test]
async fn zero_capacity_still_keeps_the_newest_search() {
	let h = harness_with(settings(0, LedgerMode::BestEffort));

	assert_eq!(h.ledger.settings().max_entries, 1);

	for name in ["a", "b", "c"] {
		h.record(&character("eu", "darkspear", name)).await;
	}

	let entries = h.ledger.list_recent().await.expect("Expected entries.");

	assert_eq!(names(&entries), vec!["c"]);
	assert_eq!(h.ledger.index_len().await.expect("len"), 1);
}

#[tokio::test]
async fn searches_within_one_second_keep_their_order() {
	let h = harness();

	for name in ["a", "b", "c"] {
		h.ledger.record(&character("eu", "darkspear", name)).await.expect("record");
		h.clock.advance(time::Duration::milliseconds(5));
	}

	let entries = h.ledger.list_recent().await.expect("Expected entries.");

	assert_eq!(names(&entries), vec!["c", "b", "a"]);
}

#[tokio::test]
async fn recording_the_same_key_refreshes_instead_of_duplicating() {
	let h = harness();
	let thrall = character("eu", "darkspear", "thrall");

	h.record(&thrall).await;
	h.record(&character("us", "illidan", "arthas")).await;
	h.record(&character("EU", "Darkspear", "Thrall")).await;

	let entries = h.ledger.list_recent().await.expect("Expected entries.");

	assert_eq!(names(&entries), vec!["thrall", "arthas"]);
	assert_eq!(h.ledger.index_len().await.expect("len"), 2);
}

#[tokio::test]
async fn index_keeps_only_the_most_recent_entries() {
	let h = harness_with(settings(3, LedgerMode::BestEffort));

	for name in ["a", "b", "c", "d", "e"] {
		h.record(&character("eu", "darkspear", name)).await;
	}

	let entries = h.ledger.list_recent().await.expect("Expected entries.");

	assert_eq!(names(&entries), vec!["e", "d", "c"]);
	assert_eq!(h.ledger.index_len().await.expect("len"), 3);
}

#[tokio::test]
async fn batch_writes_value_index_trim_and_ttl_in_order() {
	let h = harness();
	let key = character("eu", "darkspear", "thrall");

	h.record(&key).await;

	let batches = h.store.submitted_batches();

	assert_eq!(batches.len(), 1);
	assert!(!batches[0].is_atomic());

	match batches[0].commands() {
		[
			Command::SetWithTtl { key: value_key, ttl, .. },
			Command::AddMember { key: index, member, .. },
			Command::RemoveRankRange { start: 0, stop: -51, .. },
			Command::Expire { key: expired, ttl: index_ttl },
		] => {
			assert_eq!(value_key, "character:eu:darkspear:thrall");
			assert_eq!(member, value_key);
			assert_eq!(index, INDEX);
			assert_eq!(expired, INDEX);
			assert_eq!(*ttl, Duration::from_secs(86_400));
			assert_eq!(*index_ttl, Duration::from_secs(86_400));
		},
		other => panic!("Unexpected batch: {other:?}"),
	}

	assert!(h.store.value_ttl(&key.identifier()).expect("value ttl") > Duration::from_secs(86_000));
	assert!(h.store.set_ttl(INDEX).expect("index ttl") > Duration::from_secs(86_000));
}

#[tokio::test]
async fn transactional_mode_submits_an_atomic_batch() {
	let h = harness_with(settings(50, LedgerMode::Transactional));

	h.record(&character("eu", "darkspear", "thrall")).await;

	assert!(h.store.submitted_batches().iter().all(|batch| batch.is_atomic()));
	assert_eq!(h.ledger.list_recent().await.expect("entries").len(), 1);
}

#[tokio::test]
async fn expired_entries_are_removed_by_the_read_that_finds_them() {
	let h = harness();
	let thrall = character("eu", "darkspear", "thrall");

	h.record(&thrall).await;
	h.clock.advance(time::Duration::hours(23));
	h.record(&character("us", "illidan", "arthas")).await;
	h.clock.advance(time::Duration::hours(2));

	let entries = h.ledger.list_recent().await.expect("Expected entries.");

	assert_eq!(names(&entries), vec!["arthas"]);
	assert_eq!(h.ledger.index_len().await.expect("len"), 1);
	assert_eq!(h.store.value(&thrall.identifier()), None);
	assert_eq!(h.store.delete_calls(), 1);

	let again = h.ledger.list_recent().await.expect("Expected entries.");

	assert_eq!(names(&again), vec!["arthas"]);
	assert_eq!(h.store.delete_calls(), 1);
}

#[tokio::test]
async fn evicted_values_are_dropped_from_the_index() {
	let h = harness();
	let thrall = character("eu", "darkspear", "thrall");

	h.record(&thrall).await;
	h.record(&character("us", "illidan", "arthas")).await;
	h.store.evict_value(&thrall.identifier());

	let entries = h.ledger.list_recent().await.expect("Expected entries.");

	assert_eq!(names(&entries), vec!["arthas"]);
	assert_eq!(h.ledger.index_len().await.expect("len"), 1);
}

#[tokio::test]
async fn lost_value_writes_heal_on_read() {
	let h = harness();

	h.store.set_drop_value_writes(true);
	h.record(&character("eu", "darkspear", "thrall")).await;

	assert_eq!(h.ledger.index_len().await.expect("len"), 1);
	assert!(h.ledger.list_recent().await.expect("Expected entries.").is_empty());
	assert_eq!(h.ledger.index_len().await.expect("len"), 0);
}

#[tokio::test]
async fn failed_cleanup_is_reported_and_corrected_by_a_later_read() {
	let h = harness();
	let thrall = character("eu", "darkspear", "thrall");

	h.record(&thrall).await;
	h.record(&character("us", "illidan", "arthas")).await;
	h.store.evict_value(&thrall.identifier());
	h.store.set_fail_member_removals(true);

	let err = h.ledger.list_recent().await.expect_err("Expected a cleanup failure.");

	assert!(
		matches!(err, LedgerError::CleanupFailed { ref identifier, .. }
			if identifier == "character:eu:darkspear:thrall"),
		"Unexpected error: {err}"
	);
	assert_eq!(h.ledger.index_len().await.expect("len"), 2);

	h.store.set_fail_member_removals(false);

	let entries = h.ledger.list_recent().await.expect("Expected entries.");

	assert_eq!(names(&entries), vec!["arthas"]);
	assert_eq!(h.ledger.index_len().await.expect("len"), 1);
}

#[tokio::test]
async fn value_delete_failure_still_removes_the_index_member() {
	let h = harness();
	let thrall = character("eu", "darkspear", "thrall");

	h.record(&thrall).await;
	h.clock.advance(time::Duration::hours(25));
	h.store.set_fail_deletes(true);

	let err = h.ledger.list_recent().await.expect_err("Expected a cleanup failure.");

	assert!(matches!(err, LedgerError::CleanupFailed { .. }), "Unexpected error: {err}");
	assert_eq!(h.ledger.index_len().await.expect("len"), 0);
	assert!(h.store.value(&thrall.identifier()).is_some());
}

#[tokio::test]
async fn unparsable_values_are_corrupt_entries() {
	let h = harness();
	let thrall = character("eu", "darkspear", "thrall");

	h.record(&thrall).await;
	h.store.put_value(&thrall.identifier(), "{not json");

	let err = h.ledger.list_recent().await.expect_err("Expected a corrupt entry.");

	assert!(matches!(err, LedgerError::CorruptEntry { .. }), "Unexpected error: {err}");
}

#[tokio::test]
async fn unavailable_store_surfaces_on_both_operations() {
	let h = harness();

	h.store.set_unavailable(true);

	let write = h.ledger.record(&character("eu", "darkspear", "thrall")).await;
	let read = h.ledger.list_recent().await;

	assert!(matches!(write, Err(LedgerError::StoreUnavailable { operation: "record", .. })));
	assert!(matches!(read, Err(LedgerError::StoreUnavailable { operation: "list_recent", .. })));
}

#[tokio::test]
async fn deadlines_turn_slow_stores_into_unavailable_errors() {
	let h = harness();

	h.store.set_latency(Some(Duration::from_millis(500)));

	let started = Instant::now();
	let deadline = started + Duration::from_millis(20);
	let write = h.ledger.record_until(&character("eu", "darkspear", "thrall"), deadline).await;
	let read = h.ledger.list_recent_until(Instant::now() + Duration::from_millis(20)).await;

	assert!(matches!(write, Err(LedgerError::StoreUnavailable { .. })));
	assert!(matches!(read, Err(LedgerError::StoreUnavailable { .. })));
	assert!(started.elapsed() < Duration::from_millis(400));
}

#[tokio::test]
async fn concurrent_records_of_distinct_keys_all_land() {
	let h = Arc::new(harness());
	let mut tasks = tokio::task::JoinSet::new();

	for i in 0..10 {
		let h = h.clone();

		tasks.spawn(async move {
			h.ledger.record(&character("eu", "darkspear", &format!("hero{i}"))).await
		});
	}

	while let Some(joined) = tasks.join_next().await {
		joined.expect("task").expect("record");
	}

	assert_eq!(h.ledger.list_recent().await.expect("entries").len(), 10);
}

#[tokio::test]
#[ignore = "Requires external Redis. Set ARMORY_REDIS_URL to run."]
async fn records_and_lists_against_redis() {
	let Some(url) = armory_testkit::env_redis_url() else {
		eprintln!("Skipping records_and_lists_against_redis; set ARMORY_REDIS_URL to run.");

		return;
	};
	let cfg = armory_config::Redis { url, connect_timeout_ms: 2_000 };
	let store = armory_storage::RedisStore::connect(&cfg).await.expect("Failed to connect.");
	let mut settings = settings(50, LedgerMode::Transactional);

	settings.index_key = format!("armory_test_{}", std::process::id());

	let ledger = RecencyLedger::new(Arc::new(store), settings);

	ledger.record(&character("eu", "darkspear", "thrall")).await.expect("record");
	ledger.record(&character("us", "illidan", "arthas")).await.expect("record");

	let entries = ledger.list_recent().await.expect("entries");

	assert_eq!(names(&entries), vec!["arthas", "thrall"]);
}
