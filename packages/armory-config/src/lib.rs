mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Aggregator, Config, Endpoint, Ledger, MarketProviderConfig, OAuthProviderConfig,
	ProfileProviderConfig, Providers, Redis, Service, Storage,
};

use std::{collections::HashSet, env, fs, path::Path};

pub const PROTOCOL_REST: &str = "rest";
pub const PROTOCOL_GRAPHQL: &str = "graphql";
pub const LEDGER_MODE_BEST_EFFORT: &str = "best_effort";
pub const LEDGER_MODE_TRANSACTIONAL: &str = "transactional";

pub fn load(path: &Path) -> Result<Config> {
	load_with_env(path, |var| env::var(var).ok())
}

pub fn load_with_env<F>(path: &Path, lookup: F) -> Result<Config>
where
	F: Fn(&str) -> Option<String>,
{
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;
	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	apply_env_overrides(&mut cfg, lookup)?;
	normalize(&mut cfg);
	validate(&cfg)?;

	Ok(cfg)
}

/// Secrets and the store address may come from the process environment instead of the file.
pub fn apply_env_overrides<F>(cfg: &mut Config, lookup: F) -> Result<()>
where
	F: Fn(&str) -> Option<String>,
{
	let read = |var: &str| lookup(var).map(|v| v.trim().trim_matches('\'').to_string());

	if let Some(url) = read("REDIS_URL").filter(|v| !v.is_empty()) {
		if !url.starts_with("redis://") && !url.starts_with("rediss://") {
			return Err(Error::Override {
				var: "REDIS_URL",
				message: "expected a redis:// or rediss:// URL.".to_string(),
			});
		}

		cfg.storage.redis.url = url;
	}
	if let Some(id) = read("CLIENT_ID").filter(|v| !v.is_empty()) {
		cfg.providers.oauth.client_id = id;
	}
	if let Some(secret) = read("CLIENT_SECRET").filter(|v| !v.is_empty()) {
		cfg.providers.oauth.client_secret = secret;
	}
	if let Some(token) = read("WARCRAFTLOGS_API_TOKEN").filter(|v| !v.is_empty()) {
		for endpoint in cfg.aggregator.guild.iter_mut() {
			if endpoint.protocol == PROTOCOL_GRAPHQL {
				endpoint.bearer_token = Some(token.clone());
			}
		}
	}

	Ok(())
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.storage.redis.url.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.redis.url must be non-empty.".to_string(),
		});
	}
	if cfg.storage.redis.connect_timeout_ms == 0 {
		return Err(Error::Validation {
			message: "storage.redis.connect_timeout_ms must be greater than zero.".to_string(),
		});
	}

	let oauth = &cfg.providers.oauth;

	for (label, value) in [
		("providers.oauth.token_url", &oauth.token_url),
		("providers.oauth.client_id", &oauth.client_id),
		("providers.oauth.client_secret", &oauth.client_secret),
		("providers.market.url", &cfg.providers.market.url),
	] {
		if value.trim().is_empty() {
			return Err(Error::Validation { message: format!("{label} must be non-empty.") });
		}
	}

	if oauth.timeout_ms == 0 || cfg.providers.profile.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "Provider timeout_ms values must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.profile.default_headers.values().any(|value| !value.is_string()) {
		return Err(Error::Validation {
			message: "providers.profile.default_headers values must be strings.".to_string(),
		});
	}
	if cfg.aggregator.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "aggregator.timeout_ms must be greater than zero.".to_string(),
		});
	}

	validate_endpoints("aggregator.character", &cfg.aggregator.character)?;
	validate_endpoints("aggregator.guild", &cfg.aggregator.guild)?;

	let ledger = &cfg.ledger;

	if ledger.index_key.trim().is_empty() {
		return Err(Error::Validation {
			message: "ledger.index_key must be non-empty.".to_string(),
		});
	}
	if ledger.max_entries == 0 {
		return Err(Error::Validation {
			message: "ledger.max_entries must be greater than zero.".to_string(),
		});
	}
	if ledger.retention_hours == 0 {
		return Err(Error::Validation {
			message: "ledger.retention_hours must be greater than zero.".to_string(),
		});
	}
	if ledger.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "ledger.timeout_ms must be greater than zero.".to_string(),
		});
	}
	if !matches!(ledger.mode.as_str(), LEDGER_MODE_BEST_EFFORT | LEDGER_MODE_TRANSACTIONAL) {
		return Err(Error::Validation {
			message: "ledger.mode must be one of best_effort or transactional.".to_string(),
		});
	}

	Ok(())
}

fn validate_endpoints(label: &str, endpoints: &[Endpoint]) -> Result<()> {
	if endpoints.is_empty() {
		return Err(Error::Validation {
			message: format!("{label} must list at least one endpoint."),
		});
	}

	let mut seen = HashSet::new();

	for endpoint in endpoints {
		if endpoint.name.trim().is_empty() || endpoint.url.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("{label} endpoints must have a non-empty name and url."),
			});
		}
		if !seen.insert(endpoint.name.as_str()) {
			return Err(Error::Validation {
				message: format!("{label} endpoint name {:?} is duplicated.", endpoint.name),
			});
		}
		if !matches!(endpoint.protocol.as_str(), PROTOCOL_REST | PROTOCOL_GRAPHQL) {
			return Err(Error::Validation {
				message: format!(
					"{label} endpoint {:?} protocol must be one of rest or graphql.",
					endpoint.name
				),
			});
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	for endpoint in cfg.aggregator.character.iter_mut().chain(cfg.aggregator.guild.iter_mut()) {
		if endpoint.bearer_token.as_deref().map(|token| token.trim().is_empty()).unwrap_or(false) {
			endpoint.bearer_token = None;
		}
	}

	for region in cfg.providers.market.regions.iter_mut() {
		*region = region.trim().to_lowercase();
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn endpoint(name: &str, token: Option<&str>) -> Endpoint {
		Endpoint {
			name: name.to_string(),
			protocol: PROTOCOL_REST.to_string(),
			url: "https://{region}.example.test/{realm}/{name}".to_string(),
			bearer_token: token.map(str::to_string),
		}
	}

	#[test]
	fn blank_bearer_tokens_are_dropped() {
		let mut cfg: Config = toml::from_str(include_str!("../tests/fixtures/sample_config.toml"))
			.expect("Failed to parse sample config.");

		cfg.aggregator.character = vec![endpoint("profile", Some("  ")), endpoint("media", None)];
		cfg.providers.market.regions = vec![" EU ".to_string()];

		normalize(&mut cfg);

		assert!(cfg.aggregator.character.iter().all(|e| e.bearer_token.is_none()));
		assert_eq!(cfg.providers.market.regions, vec!["eu".to_string()]);
	}
}
