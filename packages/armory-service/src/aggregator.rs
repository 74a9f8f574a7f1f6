//! Concurrent fan-out of one lookup to every configured endpoint, merged under a best-effort
//! policy: any success wins, and only a total failure is reported.

use std::{sync::Arc, time::Duration};

use reqwest::Client;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::{task::JoinSet, time::Instant};

use crate::{
	BoxFuture,
	error::FetchError,
	lookup::{LookupKey, LookupKind},
};
use armory_config::{PROTOCOL_GRAPHQL, PROTOCOL_REST};
use armory_providers::{graphql, profile};

/// Open field map built from the partial responses of one lookup.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AggregatedRecord(Map<String, Value>);
impl AggregatedRecord {
	pub fn new() -> Self {
		Self::default()
	}

	/// Later partials overwrite earlier ones on key collision.
	pub fn merge(&mut self, partial: Map<String, Value>) {
		for (key, value) in partial {
			self.0.insert(key, value);
		}
	}

	pub fn get(&self, field: &str) -> Option<&Value> {
		self.0.get(field)
	}

	pub fn as_map(&self) -> &Map<String, Value> {
		&self.0
	}

	pub fn into_map(self) -> Map<String, Value> {
		self.0
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}
impl From<Map<String, Value>> for AggregatedRecord {
	fn from(map: Map<String, Value>) -> Self {
		Self(map)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
	Rest,
	Graphql,
}

#[derive(Debug, Clone)]
pub struct EndpointDescriptor {
	pub name: String,
	pub protocol: Protocol,
	pub url_template: String,
	pub bearer_token: Option<String>,
}
impl EndpointDescriptor {
	pub fn from_config(endpoint: &armory_config::Endpoint) -> Result<Self, FetchError> {
		let protocol = match endpoint.protocol.as_str() {
			PROTOCOL_REST => Protocol::Rest,
			PROTOCOL_GRAPHQL => Protocol::Graphql,
			other => {
				return Err(FetchError::InvalidArgument {
					message: format!("Endpoint {} has unknown protocol {other:?}.", endpoint.name),
				});
			},
		};

		Ok(Self {
			name: endpoint.name.clone(),
			protocol,
			url_template: endpoint.url.clone(),
			bearer_token: endpoint.bearer_token.clone(),
		})
	}

	/// Substitutes the key into the template. Every value is percent-encoded as a single path
	/// segment, so no field can add a path, query, fragment, or userinfo to the URL.
	pub fn render(&self, key: &LookupKey) -> String {
		self.url_template
			.replace("{kind}", key.kind().as_str())
			.replace("{region}", &urlencoding::encode(key.region()))
			.replace("{realm}", &urlencoding::encode(key.realm()))
			.replace("{name}", &urlencoding::encode(key.name()))
	}
}

/// One unit of fan-out work, owned so it can move into a spawned task.
#[derive(Debug, Clone)]
pub struct SourceRequest {
	pub endpoint: String,
	pub protocol: Protocol,
	pub url: String,
	pub token: String,
	pub key: LookupKey,
}

pub trait ProfileSource
where
	Self: Send + Sync,
{
	fn fetch(
		&self,
		req: SourceRequest,
	) -> BoxFuture<'_, armory_providers::Result<Map<String, Value>>>;
}

pub struct HttpProfileSource {
	client: Client,
	default_headers: Map<String, Value>,
}
impl HttpProfileSource {
	pub fn new(cfg: &armory_config::ProfileProviderConfig) -> armory_providers::Result<Self> {
		Ok(Self {
			client: armory_providers::http_client(cfg.timeout_ms)?,
			default_headers: cfg.default_headers.clone(),
		})
	}
}
impl ProfileSource for HttpProfileSource {
	fn fetch(
		&self,
		req: SourceRequest,
	) -> BoxFuture<'_, armory_providers::Result<Map<String, Value>>> {
		Box::pin(async move {
			match req.protocol {
				Protocol::Rest =>
					profile::fetch_object(&self.client, &req.url, &req.token, &self.default_headers)
						.await,
				Protocol::Graphql => {
					let vars = graphql::GuildVariables {
						name: req.key.name(),
						server_slug: req.key.realm(),
						server_region: req.key.region(),
					};

					graphql::fetch_guild(
						&self.client,
						&req.url,
						&req.token,
						&self.default_headers,
						vars,
					)
					.await
				},
			}
		})
	}
}

pub struct Aggregator {
	character: Vec<EndpointDescriptor>,
	guild: Vec<EndpointDescriptor>,
	timeout: Duration,
	source: Arc<dyn ProfileSource>,
}
impl Aggregator {
	pub fn new(
		cfg: &armory_config::Aggregator,
		source: Arc<dyn ProfileSource>,
	) -> Result<Self, FetchError> {
		let character = cfg
			.character
			.iter()
			.map(EndpointDescriptor::from_config)
			.collect::<Result<Vec<_>, _>>()?;
		let guild =
			cfg.guild.iter().map(EndpointDescriptor::from_config).collect::<Result<Vec<_>, _>>()?;

		Ok(Self { character, guild, timeout: Duration::from_millis(cfg.timeout_ms), source })
	}

	pub fn endpoints(&self, kind: LookupKind) -> &[EndpointDescriptor] {
		match kind {
			LookupKind::Character => &self.character,
			LookupKind::Guild => &self.guild,
		}
	}

	pub async fn fetch_profile(
		&self,
		token: &str,
		key: &LookupKey,
	) -> Result<AggregatedRecord, FetchError> {
		self.fetch_profile_until(token, key, Instant::now() + self.timeout).await
	}

	/// Dispatches one task per endpoint, each bounded by `deadline`.
	///
	/// Dropping the returned future aborts every task still in flight.
	pub async fn fetch_profile_until(
		&self,
		token: &str,
		key: &LookupKey,
		deadline: Instant,
	) -> Result<AggregatedRecord, FetchError> {
		if token.trim().is_empty() {
			return Err(FetchError::InvalidArgument {
				message: "Bearer token must be non-empty.".to_string(),
			});
		}

		let endpoints = self.endpoints(key.kind());

		if endpoints.is_empty() {
			return Err(FetchError::InvalidArgument {
				message: format!("No endpoints are configured for {} lookups.", key.kind()),
			});
		}

		let mut tasks = JoinSet::new();

		for endpoint in endpoints {
			let source = Arc::clone(&self.source);
			let req = SourceRequest {
				endpoint: endpoint.name.clone(),
				protocol: endpoint.protocol,
				url: endpoint.render(key),
				token: endpoint.bearer_token.clone().unwrap_or_else(|| token.to_string()),
				key: key.clone(),
			};

			tasks.spawn(async move {
				let name = req.endpoint.clone();
				let outcome = match tokio::time::timeout_at(deadline, source.fetch(req)).await {
					Ok(Ok(partial)) => Ok(partial),
					Ok(Err(err)) => Err(classify(&name, err)),
					Err(_) => Err(FetchError::Timeout { endpoint: name.clone() }),
				};

				(name, outcome)
			});
		}

		let mut record = AggregatedRecord::new();
		let mut succeeded = 0_usize;
		let mut first_error = None;

		while let Some(joined) = tasks.join_next().await {
			let (endpoint, outcome) = match joined {
				Ok(done) => done,
				Err(err) => {
					first_error.get_or_insert(FetchError::UpstreamFailure {
						endpoint: "unknown".to_string(),
						status: None,
						message: format!("Fetch task ended abnormally: {err}"),
					});

					continue;
				},
			};

			match outcome {
				Ok(partial) => {
					succeeded += 1;

					record.merge(partial);
				},
				Err(err) => {
					tracing::warn!(
						%endpoint,
						lookup = %key,
						error = %err,
						"Profile endpoint failed."
					);

					first_error.get_or_insert(err);
				},
			}
		}

		if succeeded > 0 {
			return Ok(record);
		}

		Err(first_error.unwrap_or_else(|| FetchError::UpstreamFailure {
			endpoint: "unknown".to_string(),
			status: None,
			message: "No endpoint produced a result.".to_string(),
		}))
	}
}

pub(crate) fn classify(endpoint: &str, err: armory_providers::Error) -> FetchError {
	let endpoint = endpoint.to_string();

	if err.is_unauthorized() {
		return FetchError::AuthFailure { endpoint, status: err.status().unwrap_or(401) };
	}
	if err.is_timeout() {
		return FetchError::Timeout { endpoint };
	}

	match err {
		armory_providers::Error::Decode { .. } | armory_providers::Error::InvalidResponse { .. } =>
			FetchError::DecodeFailure { endpoint, message: err.to_string() },
		armory_providers::Error::Graphql { ref message, .. } => {
			let status = message.to_lowercase().contains("not found").then_some(404);

			FetchError::UpstreamFailure { endpoint, status, message: err.to_string() }
		},
		other => FetchError::UpstreamFailure {
			endpoint,
			status: other.status(),
			message: other.to_string(),
		},
	}
}
