pub mod aggregator;
pub mod ledger;
pub mod lookup;
pub mod summary;

mod error;

pub use aggregator::{
	AggregatedRecord, Aggregator, EndpointDescriptor, HttpProfileSource, ProfileSource, Protocol,
	SourceRequest,
};
pub use armory_providers::market::TokenPrice;
pub use error::{Error, FetchError, LedgerError, Result};
pub use ledger::{Clock, LedgerMode, LedgerSettings, RecencyLedger, SearchEntry, SystemClock};
pub use lookup::{LookupError, LookupKey, LookupKind};
pub use summary::{CharacterSummary, GuildProgress, GuildSummary, Rank};

use std::{future::Future, pin::Pin, sync::Arc};

use reqwest::Client;
use serde_json::{Map, Value};

use armory_config::{Config, OAuthProviderConfig};
use armory_providers::{market, oauth};
use armory_storage::BackingStore;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Source of the bearer token handed to every profile endpoint.
pub trait TokenProvider
where
	Self: Send + Sync,
{
	fn token(&self) -> BoxFuture<'_, armory_providers::Result<String>>;
}

/// Client-credentials exchange on every call; tokens are not cached.
pub struct OAuthTokenProvider {
	client: Client,
	cfg: OAuthProviderConfig,
}
impl OAuthTokenProvider {
	pub fn new(cfg: &OAuthProviderConfig) -> armory_providers::Result<Self> {
		Ok(Self { client: armory_providers::http_client(cfg.timeout_ms)?, cfg: cfg.clone() })
	}
}
impl TokenProvider for OAuthTokenProvider {
	fn token(&self) -> BoxFuture<'_, armory_providers::Result<String>> {
		Box::pin(oauth::fetch_access_token(&self.client, &self.cfg))
	}
}

#[derive(Clone)]
pub struct Collaborators {
	pub tokens: Arc<dyn TokenProvider>,
	pub source: Arc<dyn ProfileSource>,
	pub store: Arc<dyn BackingStore>,
	pub clock: Arc<dyn Clock>,
}

pub struct ArmoryService {
	aggregator: Aggregator,
	ledger: Arc<RecencyLedger>,
	tokens: Arc<dyn TokenProvider>,
	market_client: Client,
	market_url: String,
	market_regions: Vec<String>,
	default_headers: Map<String, Value>,
}
impl ArmoryService {
	pub fn new(cfg: &Config, store: Arc<dyn BackingStore>) -> Result<Self> {
		let tokens = OAuthTokenProvider::new(&cfg.providers.oauth).map_err(Error::Token)?;
		let source = HttpProfileSource::new(&cfg.providers.profile)
			.map_err(|err| Error::InvalidArgument { message: err.to_string() })?;

		Self::with_collaborators(
			cfg,
			Collaborators {
				tokens: Arc::new(tokens),
				source: Arc::new(source),
				store,
				clock: Arc::new(SystemClock),
			},
		)
	}

	pub fn with_collaborators(cfg: &Config, collaborators: Collaborators) -> Result<Self> {
		let Collaborators { tokens, source, store, clock } = collaborators;
		let aggregator = Aggregator::new(&cfg.aggregator, source)?;
		let settings = LedgerSettings::from_config(&cfg.ledger);
		let market_client = armory_providers::http_client(cfg.providers.profile.timeout_ms)
			.map_err(|err| Error::InvalidArgument { message: err.to_string() })?;

		Ok(Self {
			aggregator,
			ledger: Arc::new(RecencyLedger::with_clock(store, settings, clock)),
			tokens,
			market_client,
			market_url: cfg.providers.market.url.clone(),
			market_regions: cfg.providers.market.regions.clone(),
			default_headers: cfg.providers.profile.default_headers.clone(),
		})
	}

	pub fn ledger(&self) -> &RecencyLedger {
		&self.ledger
	}

	/// Aggregates every endpoint for the key, then records the lookup in the background.
	///
	/// The ledger write never delays or fails the lookup; its failures are only logged.
	pub async fn lookup(
		&self,
		kind: LookupKind,
		region: &str,
		realm: &str,
		name: &str,
	) -> Result<AggregatedRecord> {
		let key = LookupKey::new(kind, region, realm, name)?;
		let token = self.tokens.token().await.map_err(Error::Token)?;
		let record = self.aggregator.fetch_profile(&token, &key).await?;

		self.spawn_record(key);

		Ok(record)
	}

	pub async fn record_search(
		&self,
		kind: LookupKind,
		region: &str,
		realm: &str,
		name: &str,
	) -> Result<()> {
		let key = LookupKey::new(kind, region, realm, name)?;

		Ok(self.ledger.record(&key).await?)
	}

	pub async fn recent_searches(&self) -> Result<Vec<SearchEntry>> {
		Ok(self.ledger.list_recent().await?)
	}

	/// Prices for every configured region. Regions that fail are skipped unless all of them do.
	pub async fn token_prices(&self) -> Result<Vec<TokenPrice>> {
		let token = self.tokens.token().await.map_err(Error::Token)?;
		let mut prices = Vec::with_capacity(self.market_regions.len());
		let mut first_error = None;

		for region in &self.market_regions {
			let fetched = market::fetch_token_price(
				&self.market_client,
				&self.market_url,
				region,
				&token,
				&self.default_headers,
			)
			.await;

			match fetched {
				Ok(price) => prices.push(price),
				Err(err) => {
					tracing::warn!(%region, error = %err, "Token price lookup failed.");

					first_error.get_or_insert_with(|| aggregator::classify("market", err));
				},
			}
		}

		match first_error {
			Some(err) if prices.is_empty() => Err(err.into()),
			_ => Ok(prices),
		}
	}

	pub async fn health(&self) -> Result<()> {
		Ok(self.ledger.ping().await?)
	}

	fn spawn_record(&self, key: LookupKey) {
		let ledger = Arc::clone(&self.ledger);

		tokio::spawn(async move {
			if let Err(err) = ledger.record(&key).await {
				tracing::warn!(lookup = %key, error = %err, "Failed to record recent search.");
			}
		});
	}
}
