use reqwest::Client;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::{Error, Result};

const COPPER_PER_GOLD: f64 = 10_000.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenPrice {
	pub region: String,
	/// Price in copper, as reported upstream.
	pub price: u64,
	pub gold: f64,
}

pub async fn fetch_token_price(
	client: &Client,
	url_template: &str,
	region: &str,
	token: &str,
	default_headers: &Map<String, Value>,
) -> Result<TokenPrice> {
	let url = url_template.replace("{region}", region);
	let body = crate::profile::fetch_object(client, &url, token, default_headers).await?;

	parse_token_price(region, &body)
}

fn parse_token_price(region: &str, body: &Map<String, Value>) -> Result<TokenPrice> {
	let price = body
		.get("price")
		.and_then(|v| v.as_u64().or_else(|| v.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)))
		.ok_or_else(|| Error::InvalidResponse {
			message: format!("Token price response for {region} has no valid price."),
		})?;

	Ok(TokenPrice { region: region.to_string(), price, gold: price as f64 / COPPER_PER_GOLD })
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn converts_copper_to_gold() {
		let body = serde_json::json!({ "last_updated_timestamp": 1, "price": 2_534_000 });
		let price = parse_token_price("eu", body.as_object().expect("object")).expect("parse");

		assert_eq!(price.price, 2_534_000);
		assert_eq!(price.gold, 253.4);
	}

	#[test]
	fn rejects_negative_price() {
		for price in [serde_json::json!(-5), serde_json::json!(-2.5), serde_json::json!("12")] {
			let body = serde_json::json!({ "price": price });
			let err = parse_token_price("us", body.as_object().expect("object"))
				.expect_err("negative price accepted");

			assert!(matches!(err, Error::InvalidResponse { .. }));
		}
	}
}
