use reqwest::Client;
use serde_json::{Map, Value};

use crate::Result;

/// One bearer-authenticated GET that must answer with a JSON object.
pub async fn fetch_object(
	client: &Client,
	url: &str,
	token: &str,
	default_headers: &Map<String, Value>,
) -> Result<Map<String, Value>> {
	let res = client.get(url).headers(crate::auth_headers(token, default_headers)?).send().await?;

	tracing::debug!(%url, status = res.status().as_u16(), "Profile endpoint answered.");

	crate::read_object(url, res).await
}
