use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	pub aggregator: Aggregator,
	pub ledger: Ledger,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
	pub redis: Redis,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Redis {
	/// `redis://[:password@]host:port[/db]`, or `rediss://` for TLS.
	pub url: String,
	pub connect_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Providers {
	pub oauth: OAuthProviderConfig,
	pub profile: ProfileProviderConfig,
	pub market: MarketProviderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OAuthProviderConfig {
	pub token_url: String,
	pub client_id: String,
	pub client_secret: String,
	pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProfileProviderConfig {
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketProviderConfig {
	/// Accepts the `{region}` placeholder.
	pub url: String,
	pub regions: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Aggregator {
	pub timeout_ms: u64,
	pub character: Vec<Endpoint>,
	pub guild: Vec<Endpoint>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Endpoint {
	pub name: String,
	#[serde(default = "default_protocol")]
	pub protocol: String,
	/// Accepts `{kind}`, `{region}`, `{realm}` and `{name}` placeholders.
	pub url: String,
	/// Replaces the caller's bearer token for this endpoint only.
	pub bearer_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Ledger {
	#[serde(default = "default_index_key")]
	pub index_key: String,
	#[serde(default = "default_max_entries")]
	pub max_entries: u32,
	#[serde(default = "default_retention_hours")]
	pub retention_hours: u32,
	#[serde(default = "default_ledger_timeout_ms")]
	pub timeout_ms: u64,
	#[serde(default = "default_ledger_mode")]
	pub mode: String,
}
impl Default for Ledger {
	fn default() -> Self {
		Self {
			index_key: default_index_key(),
			max_entries: default_max_entries(),
			retention_hours: default_retention_hours(),
			timeout_ms: default_ledger_timeout_ms(),
			mode: default_ledger_mode(),
		}
	}
}

fn default_protocol() -> String {
	"rest".to_string()
}

fn default_index_key() -> String {
	"recent_searches".to_string()
}

fn default_max_entries() -> u32 {
	50
}

fn default_retention_hours() -> u32 {
	24
}

fn default_ledger_timeout_ms() -> u64 {
	5_000
}

fn default_ledger_mode() -> String {
	"best_effort".to_string()
}
