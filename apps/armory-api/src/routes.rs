use axum::{
	Json, Router,
	extract::{Query, State},
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::get,
};
use serde::{Deserialize, Serialize};

use crate::state::AppState;
use armory_service::{
	AggregatedRecord, CharacterSummary, Error, FetchError, GuildSummary, LookupKind, SearchEntry,
	TokenPrice,
};

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/character", get(character))
		.route("/v1/guild", get(guild))
		.route("/v1/recent_searches", get(recent_searches))
		.route("/v1/token_price", get(token_price))
		.with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct LookupQuery {
	#[serde(default)]
	pub region: String,
	#[serde(default)]
	pub realm: String,
	#[serde(default)]
	pub name: String,
}

#[derive(Debug, Serialize)]
pub struct LookupResponse<S> {
	pub summary: S,
	pub record: AggregatedRecord,
}

#[derive(Debug, Serialize)]
pub struct RecentSearchesResponse {
	pub searches: Vec<SearchEntry>,
}

#[derive(Debug, Serialize)]
pub struct TokenPriceResponse {
	pub prices: Vec<TokenPrice>,
}

#[derive(Debug, Serialize)]
struct HealthBody {
	status: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
}
impl ApiError {
	fn new(status: StatusCode, error_code: impl Into<String>, message: impl Into<String>) -> Self {
		Self { status, error_code: error_code.into(), message: message.into() }
	}
}
impl From<Error> for ApiError {
	fn from(err: Error) -> Self {
		let message = err.to_string();

		match err {
			Error::InvalidArgument { .. } | Error::Fetch(FetchError::InvalidArgument { .. }) =>
				Self::new(StatusCode::BAD_REQUEST, "invalid_request", message),
			Error::Fetch(fetch) if fetch.is_not_found() =>
				Self::new(StatusCode::NOT_FOUND, "not_found", message),
			Error::Fetch(FetchError::AuthFailure { .. }) =>
				Self::new(StatusCode::BAD_GATEWAY, "upstream_auth_failed", message),
			Error::Fetch(FetchError::Timeout { .. }) =>
				Self::new(StatusCode::GATEWAY_TIMEOUT, "upstream_timeout", message),
			Error::Fetch(_) => Self::new(StatusCode::BAD_GATEWAY, "upstream_failed", message),
			Error::Token(_) => Self::new(StatusCode::BAD_GATEWAY, "token_unavailable", message),
			Error::Ledger(_) =>
				Self::new(StatusCode::SERVICE_UNAVAILABLE, "recent_searches_unavailable", message),
		}
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		if self.status.is_server_error() {
			tracing::warn!(
				status = %self.status,
				error_code = %self.error_code,
				message = %self.message,
				"Request failed."
			);
		}

		let body = ErrorBody { error_code: self.error_code, message: self.message };

		(self.status, Json(body)).into_response()
	}
}

async fn health(State(state): State<AppState>) -> Response {
	match state.service.health().await {
		Ok(()) => Json(HealthBody { status: "ok" }).into_response(),
		Err(err) => {
			tracing::warn!(error = %err, "Health check failed.");

			(StatusCode::SERVICE_UNAVAILABLE, Json(HealthBody { status: "unavailable" }))
				.into_response()
		},
	}
}

async fn character(
	State(state): State<AppState>,
	Query(query): Query<LookupQuery>,
) -> Result<Json<LookupResponse<CharacterSummary>>, ApiError> {
	let record = lookup(&state, LookupKind::Character, &query).await?;

	Ok(Json(LookupResponse { summary: CharacterSummary::from(&record), record }))
}

async fn guild(
	State(state): State<AppState>,
	Query(query): Query<LookupQuery>,
) -> Result<Json<LookupResponse<GuildSummary>>, ApiError> {
	let record = lookup(&state, LookupKind::Guild, &query).await?;

	Ok(Json(LookupResponse { summary: GuildSummary::from(&record), record }))
}

async fn recent_searches(
	State(state): State<AppState>,
) -> Result<Json<RecentSearchesResponse>, ApiError> {
	let searches = state.service.recent_searches().await?;

	Ok(Json(RecentSearchesResponse { searches }))
}

async fn token_price(State(state): State<AppState>) -> Result<Json<TokenPriceResponse>, ApiError> {
	let prices = state.service.token_prices().await?;

	Ok(Json(TokenPriceResponse { prices }))
}

async fn lookup(
	state: &AppState,
	kind: LookupKind,
	query: &LookupQuery,
) -> Result<AggregatedRecord, Error> {
	state.service.lookup(kind, &query.region, &query.realm, &query.name).await
}
