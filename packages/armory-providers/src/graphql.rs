use reqwest::Client;
use serde_json::{Map, Value};

use crate::{Error, Result};

pub const GUILD_QUERY: &str = "\
query GetGuild($name: String!, $serverSlug: String!, $serverRegion: String!) {
	guildData {
		guild(name: $name, serverSlug: $serverSlug, serverRegion: $serverRegion) {
			name
			attendance { data { players { name type } } }
			members { total }
			zoneRanking {
				progress {
					serverRank { number color }
					regionRank { number color }
					worldRank { number color }
				}
			}
		}
	}
}";

pub struct GuildVariables<'a> {
	pub name: &'a str,
	pub server_slug: &'a str,
	pub server_region: &'a str,
}

/// Runs the guild ranking query and returns its `data` object.
pub async fn fetch_guild(
	client: &Client,
	url: &str,
	token: &str,
	default_headers: &Map<String, Value>,
	vars: GuildVariables<'_>,
) -> Result<Map<String, Value>> {
	let body = serde_json::json!({
		"query": GUILD_QUERY,
		"variables": {
			"name": vars.name,
			"serverSlug": vars.server_slug,
			"serverRegion": vars.server_region,
		},
	});
	let res = client
		.post(url)
		.headers(crate::auth_headers(token, default_headers)?)
		.json(&body)
		.send()
		.await?;
	let envelope = crate::read_object(url, res).await?;

	parse_graphql_data(url, envelope)
}

fn parse_graphql_data(url: &str, mut envelope: Map<String, Value>) -> Result<Map<String, Value>> {
	let errors = envelope.get("errors").and_then(Value::as_array).cloned().unwrap_or_default();

	match envelope.remove("data") {
		Some(Value::Object(data)) if !data.is_empty() => {
			if !errors.is_empty() {
				tracing::warn!(
					%url,
					errors = errors.len(),
					"GraphQL response carried partial errors."
				);
			}

			Ok(data)
		},
		_ => match errors.first() {
			Some(first) => Err(Error::Graphql {
				url: url.to_string(),
				message: first
					.get("message")
					.and_then(Value::as_str)
					.unwrap_or("unnamed GraphQL error")
					.to_string(),
			}),
			None => Err(Error::InvalidResponse {
				message: format!("GraphQL query at {url} returned no data."),
			}),
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn object(value: Value) -> Map<String, Value> {
		value.as_object().cloned().expect("object")
	}

	#[test]
	fn returns_data_object() {
		let envelope = object(serde_json::json!({
			"data": { "guildData": { "guild": { "name": "Method" } } }
		}));
		let data = parse_graphql_data("u", envelope).expect("parse failed");

		assert!(data.contains_key("guildData"));
	}

	#[test]
	fn errors_without_data_fail() {
		let envelope = object(serde_json::json!({
			"data": null,
			"errors": [{ "message": "Guild not found" }]
		}));
		let err = parse_graphql_data("u", envelope).expect_err("expected failure");

		assert!(matches!(&err, Error::Graphql { message, .. } if message == "Guild not found"));
		assert!(err.to_string().contains("Guild not found"));
	}

	#[test]
	fn empty_envelope_is_invalid() {
		let err = parse_graphql_data("u", Map::new()).expect_err("expected failure");

		assert!(matches!(err, Error::InvalidResponse { .. }));
	}
}
