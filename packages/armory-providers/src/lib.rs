pub mod graphql;
pub mod market;
pub mod oauth;
pub mod profile;

mod error;

pub use error::{Error, Result};

use std::time::Duration;

use reqwest::{
	Client, Response,
	header::{AUTHORIZATION, HeaderMap, HeaderName},
};
use serde_json::{Map, Value};

const MAX_ERROR_BODY_CHARS: usize = 512;

pub fn http_client(timeout_ms: u64) -> Result<Client> {
	Ok(Client::builder().timeout(Duration::from_millis(timeout_ms)).build()?)
}

pub fn auth_headers(token: &str, default_headers: &Map<String, Value>) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();

	headers.insert(AUTHORIZATION, format!("Bearer {token}").parse()?);

	for (key, value) in default_headers {
		let Some(raw) = value.as_str() else {
			return Err(Error::InvalidConfig {
				message: "Default header values must be strings.".to_string(),
			});
		};

		headers.insert(HeaderName::from_bytes(key.as_bytes())?, raw.parse()?);
	}

	Ok(headers)
}

/// Reads a successful response body as a JSON object.
pub(crate) async fn read_object(url: &str, res: Response) -> Result<Map<String, Value>> {
	let status = res.status();

	if !status.is_success() {
		let body = res.text().await.unwrap_or_default();

		return Err(Error::Status {
			url: url.to_string(),
			status: status.as_u16(),
			body: truncate(&body),
		});
	}

	let bytes = res.bytes().await?;

	parse_object(url, &bytes)
}

pub(crate) fn parse_object(url: &str, bytes: &[u8]) -> Result<Map<String, Value>> {
	let value: Value = serde_json::from_slice(bytes)
		.map_err(|source| Error::Decode { url: url.to_string(), source })?;

	match value {
		Value::Object(map) => Ok(map),
		other => Err(Error::InvalidResponse {
			message: format!(
				"Upstream {url} returned JSON {} instead of an object.",
				kind_of(&other)
			),
		}),
	}
}

fn kind_of(value: &Value) -> &'static str {
	match value {
		Value::Null => "null",
		Value::Bool(_) => "boolean",
		Value::Number(_) => "number",
		Value::String(_) => "string",
		Value::Array(_) => "array",
		Value::Object(_) => "object",
	}
}

fn truncate(body: &str) -> String {
	body.chars().take(MAX_ERROR_BODY_CHARS).collect()
}
