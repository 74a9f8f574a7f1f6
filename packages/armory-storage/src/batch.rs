use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
	SetWithTtl { key: String, value: String, ttl: Duration },
	AddMember { key: String, member: String, score: f64 },
	/// Removes members whose ascending rank falls in `start..=stop`.
	RemoveRankRange { key: String, start: isize, stop: isize },
	Expire { key: String, ttl: Duration },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
	commands: Vec<Command>,
	atomic: bool,
}
impl Batch {
	pub fn new() -> Self {
		Self::default()
	}

	/// Asks the store to apply every command or none. Stores without transactions ignore this.
	pub fn atomic(mut self, atomic: bool) -> Self {
		self.atomic = atomic;

		self
	}

	pub fn is_atomic(&self) -> bool {
		self.atomic
	}

	pub fn set_with_ttl(
		mut self,
		key: impl Into<String>,
		value: impl Into<String>,
		ttl: Duration,
	) -> Self {
		self.commands.push(Command::SetWithTtl { key: key.into(), value: value.into(), ttl });

		self
	}

	pub fn add_member(
		mut self,
		key: impl Into<String>,
		member: impl Into<String>,
		score: f64,
	) -> Self {
		self.commands.push(Command::AddMember { key: key.into(), member: member.into(), score });

		self
	}

	pub fn remove_rank_range(mut self, key: impl Into<String>, start: isize, stop: isize) -> Self {
		self.commands.push(Command::RemoveRankRange { key: key.into(), start, stop });

		self
	}

	pub fn expire(mut self, key: impl Into<String>, ttl: Duration) -> Self {
		self.commands.push(Command::Expire { key: key.into(), ttl });

		self
	}

	pub fn commands(&self) -> &[Command] {
		&self.commands
	}

	pub fn into_commands(self) -> Vec<Command> {
		self.commands
	}

	pub fn is_empty(&self) -> bool {
		self.commands.is_empty()
	}
}
