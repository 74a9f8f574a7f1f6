use reqwest::{Client, header::CONTENT_TYPE};
use serde_json::Value;

use crate::{Error, Result};

/// Exchanges client credentials for a bearer token.
pub async fn fetch_access_token(
	client: &Client,
	cfg: &armory_config::OAuthProviderConfig,
) -> Result<String> {
	if cfg.client_id.is_empty() || cfg.client_secret.is_empty() {
		return Err(Error::InvalidConfig {
			message: "OAuth client_id and client_secret must be set.".to_string(),
		});
	}

	let res = client
		.post(&cfg.token_url)
		.basic_auth(&cfg.client_id, Some(&cfg.client_secret))
		.header(CONTENT_TYPE, "application/x-www-form-urlencoded")
		.body("grant_type=client_credentials")
		.send()
		.await?;
	let body = crate::read_object(&cfg.token_url, res).await?;

	parse_access_token(&body)
}

fn parse_access_token(body: &serde_json::Map<String, Value>) -> Result<String> {
	body.get("access_token")
		.and_then(Value::as_str)
		.filter(|token| !token.is_empty())
		.map(str::to_string)
		.ok_or_else(|| Error::InvalidResponse {
			message: "Token response is missing access_token.".to_string(),
		})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn extracts_access_token() {
		let body = serde_json::json!({ "access_token": "abc", "expires_in": 86_399 });
		let body = body.as_object().expect("object");

		assert_eq!(parse_access_token(body).expect("parse failed"), "abc");
	}

	#[test]
	fn rejects_missing_or_empty_token() {
		let empty = serde_json::json!({ "access_token": "" });
		let missing = serde_json::json!({ "token_type": "bearer" });

		assert!(parse_access_token(empty.as_object().expect("object")).is_err());
		assert!(parse_access_token(missing.as_object().expect("object")).is_err());
	}
}
