use std::{
	cmp::Ordering as CmpOrdering,
	collections::HashMap,
	sync::{
		Mutex, MutexGuard,
		atomic::{AtomicBool, AtomicUsize, Ordering},
	},
	time::{Duration, Instant},
};

use armory_storage::{BackingStore, Batch, BoxFuture, Command, Error, Result, rank};

#[derive(Default)]
struct State {
	values: HashMap<String, Expiring<String>>,
	sets: HashMap<String, Expiring<HashMap<String, f64>>>,
	latency: Option<Duration>,
	batches: Vec<Batch>,
}

struct Expiring<T> {
	data: T,
	expires_at: Option<Instant>,
}
impl<T> Expiring<T> {
	fn live(&self, now: Instant) -> bool {
		self.expires_at.map(|at| at > now).unwrap_or(true)
	}
}

/// In-process [`BackingStore`] with Redis ordering semantics and switchable faults.
#[derive(Default)]
pub struct MemoryStore {
	state: Mutex<State>,
	unavailable: AtomicBool,
	fail_deletes: AtomicBool,
	fail_member_removals: AtomicBool,
	drop_value_writes: AtomicBool,
	delete_calls: AtomicUsize,
}
impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Every operation fails as if the connection were down.
	pub fn set_unavailable(&self, on: bool) {
		self.unavailable.store(on, Ordering::SeqCst);
	}

	pub fn set_fail_deletes(&self, on: bool) {
		self.fail_deletes.store(on, Ordering::SeqCst);
	}

	pub fn set_fail_member_removals(&self, on: bool) {
		self.fail_member_removals.store(on, Ordering::SeqCst);
	}

	/// Batches apply their index commands but silently lose value writes, like a partial batch.
	pub fn set_drop_value_writes(&self, on: bool) {
		self.drop_value_writes.store(on, Ordering::SeqCst);
	}

	/// Delays every operation, for deadline tests.
	pub fn set_latency(&self, latency: Option<Duration>) {
		self.lock().latency = latency;
	}

	pub fn value(&self, key: &str) -> Option<String> {
		let now = Instant::now();

		self.lock().values.get(key).filter(|entry| entry.live(now)).map(|entry| entry.data.clone())
	}

	pub fn value_ttl(&self, key: &str) -> Option<Duration> {
		let now = Instant::now();

		self.lock()
			.values
			.get(key)
			.and_then(|entry| entry.expires_at)
			.map(|at| at.saturating_duration_since(now))
	}

	pub fn set_ttl(&self, key: &str) -> Option<Duration> {
		let now = Instant::now();

		self.lock()
			.sets
			.get(key)
			.and_then(|set| set.expires_at)
			.map(|at| at.saturating_duration_since(now))
	}

	/// Writes a raw value, bypassing the ledger, e.g. to plant a corrupt entry.
	pub fn put_value(&self, key: &str, value: &str) {
		self.lock()
			.values
			.insert(key.to_string(), Expiring { data: value.to_string(), expires_at: None });
	}

	/// Drops a value as the store's own eviction would.
	pub fn evict_value(&self, key: &str) {
		self.lock().values.remove(key);
	}

	/// Members by descending score.
	pub fn members(&self, key: &str) -> Vec<(String, f64)> {
		let state = self.lock();
		let Some(set) = state.sets.get(key).filter(|set| set.live(Instant::now())) else {
			return Vec::new();
		};
		let mut members: Vec<_> = set.data.iter().map(|(m, s)| (m.clone(), *s)).collect();

		members.sort_by(|a, b| descending(a, b));

		members
	}

	pub fn submitted_batches(&self) -> Vec<Batch> {
		self.lock().batches.clone()
	}

	pub fn delete_calls(&self) -> usize {
		self.delete_calls.load(Ordering::SeqCst)
	}

	fn lock(&self) -> MutexGuard<'_, State> {
		self.state.lock().unwrap_or_else(|err| err.into_inner())
	}

	async fn enter(&self, operation: &str) -> Result<()> {
		let latency = self.lock().latency;

		if let Some(latency) = latency {
			tokio::time::sleep(latency).await;
		}
		if self.unavailable.load(Ordering::SeqCst) {
			return Err(Error::Unavailable(format!("memory store is offline during {operation}")));
		}

		Ok(())
	}

	fn apply(&self, state: &mut State, command: Command, now: Instant) {
		match command {
			Command::SetWithTtl { key, value, ttl } => {
				if self.drop_value_writes.load(Ordering::SeqCst) {
					return;
				}

				state.values.insert(key, Expiring { data: value, expires_at: Some(now + ttl) });
			},
			Command::AddMember { key, member, score } => {
				let set = state
					.sets
					.entry(key)
					.or_insert_with(|| Expiring { data: HashMap::new(), expires_at: None });

				if !set.live(now) {
					set.data.clear();
					set.expires_at = None;
				}

				set.data.insert(member, score);
			},
			Command::RemoveRankRange { key, start, stop } => {
				let Some(set) = state.sets.get_mut(&key) else {
					return;
				};
				let mut ascending: Vec<_> =
					set.data.iter().map(|(m, s)| (m.clone(), *s)).collect();

				ascending.sort_by(|a, b| descending(b, a));

				if let Some((from, to)) = rank::resolve(ascending.len(), start, stop) {
					for (member, _) in &ascending[from..=to] {
						set.data.remove(member);
					}
				}
			},
			Command::Expire { key, ttl } => {
				if let Some(set) = state.sets.get_mut(&key) {
					set.expires_at = Some(now + ttl);
				}
				if let Some(value) = state.values.get_mut(&key) {
					value.expires_at = Some(now + ttl);
				}
			},
		}
	}
}
impl BackingStore for MemoryStore {
	fn ping(&self) -> BoxFuture<'_, Result<()>> {
		Box::pin(async move { self.enter("ping").await })
	}

	fn get_many<'a>(&'a self, keys: &'a [String]) -> BoxFuture<'a, Result<Vec<Option<String>>>> {
		Box::pin(async move {
			self.enter("get_many").await?;

			let now = Instant::now();
			let state = self.lock();

			Ok(keys
				.iter()
				.map(|key| {
					state.values.get(key).filter(|entry| entry.live(now)).map(|e| e.data.clone())
				})
				.collect())
		})
	}

	fn rev_range<'a>(
		&'a self,
		key: &'a str,
		start: isize,
		stop: isize,
	) -> BoxFuture<'a, Result<Vec<String>>> {
		Box::pin(async move {
			self.enter("rev_range").await?;

			let members = self.members(key);

			Ok(match rank::resolve(members.len(), start, stop) {
				Some((from, to)) => members[from..=to].iter().map(|(m, _)| m.clone()).collect(),
				None => Vec::new(),
			})
		})
	}

	fn cardinality<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<usize>> {
		Box::pin(async move {
			self.enter("cardinality").await?;

			Ok(self.members(key).len())
		})
	}

	fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move {
			self.enter("delete").await?;
			self.delete_calls.fetch_add(1, Ordering::SeqCst);

			if self.fail_deletes.load(Ordering::SeqCst) {
				return Err(Error::Unavailable(format!("injected failure deleting {key}")));
			}

			let mut state = self.lock();
			let value = state.values.remove(key).is_some();
			let set = state.sets.remove(key).is_some();

			Ok(value || set)
		})
	}

	fn remove_member<'a>(&'a self, key: &'a str, member: &'a str) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move {
			self.enter("remove_member").await?;

			if self.fail_member_removals.load(Ordering::SeqCst) {
				return Err(Error::Unavailable(format!("injected failure removing {member}")));
			}

			let mut state = self.lock();

			Ok(state.sets.get_mut(key).is_some_and(|set| set.data.remove(member).is_some()))
		})
	}

	fn submit(&self, batch: Batch) -> BoxFuture<'_, Result<()>> {
		Box::pin(async move {
			self.enter("submit").await?;

			let now = Instant::now();
			let mut state = self.lock();

			state.batches.push(batch.clone());

			for command in batch.into_commands() {
				self.apply(&mut state, command, now);
			}

			Ok(())
		})
	}
}

// Redis orders equal scores by member bytes.
fn descending(a: &(String, f64), b: &(String, f64)) -> CmpOrdering {
	b.1.total_cmp(&a.1).then_with(|| b.0.cmp(&a.0))
}
