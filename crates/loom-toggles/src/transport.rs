// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Network access to the toggles API.
//!
//! The caches only need two operations, expressed by [`Transport`]. The
//! shipped implementation, [`HttpTransport`], talks JSON over HTTP with Basic
//! auth (empty username, API key as password).

use async_trait::async_trait;
use loom_toggles_core::{IdentityPayload, StatePayload};
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::config::{ApiKey, ClientConfig};
use crate::error::{Result, TogglesError};

const INITIALIZE_PATH: [&str; 2] = ["sdk", "initialize"];
const IDENTITIES_PATH: [&str; 2] = ["sdk", "identities"];

/// Error bodies longer than this are truncated in [`TogglesError::Api`].
const MAX_ERROR_BODY: usize = 512;

/// The two fetches the caches depend on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
	/// Fetches the global flag and override snapshot.
	async fn fetch_state(&self) -> Result<StatePayload>;

	/// Fetches the override set for one identifier.
	async fn fetch_identity(&self, identifier: &str) -> Result<IdentityPayload>;
}

/// [`Transport`] over HTTP using reqwest.
#[derive(Debug, Clone)]
pub struct HttpTransport {
	base_url: Url,
	api_key: ApiKey,
	http_client: Client,
}

impl HttpTransport {
	pub fn new(config: &ClientConfig, api_key: ApiKey) -> Result<Self> {
		config.validate()?;

		let base_url = Url::parse(&config.base_url())
			.map_err(|e| TogglesError::InvalidConfig(format!("invalid base URL: {e}")))?;

		let http_client = Client::builder()
			.user_agent(user_agent())
			.timeout(config.request_timeout)
			.build()
			.map_err(|e| TogglesError::InvalidConfig(format!("failed to build HTTP client: {e}")))?;

		Ok(Self {
			base_url,
			api_key,
			http_client,
		})
	}

	pub fn base_url(&self) -> &Url {
		&self.base_url
	}

	fn endpoint<'s>(&self, segments: impl IntoIterator<Item = &'s str>) -> Result<Url> {
		let mut url = self.base_url.clone();
		url
			.path_segments_mut()
			.map_err(|_| TogglesError::InvalidConfig("base URL cannot carry a path".to_string()))?
			.pop_if_empty()
			.extend(segments);
		Ok(url)
	}

	async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
		debug!(url = %url, "sending toggles request");

		let response = self
			.http_client
			.get(url)
			.basic_auth("", Some(self.api_key.expose()))
			.header(ACCEPT, "application/json")
			.send()
			.await?;

		let status = response.status();
		let body = response.text().await?;
		decode_body(status, &body)
	}
}

#[async_trait]
impl Transport for HttpTransport {
	async fn fetch_state(&self) -> Result<StatePayload> {
		let url = self.endpoint(INITIALIZE_PATH)?;
		self.get_json(url).await
	}

	async fn fetch_identity(&self, identifier: &str) -> Result<IdentityPayload> {
		let url = self.endpoint(IDENTITIES_PATH.into_iter().chain([identifier]))?;
		self.get_json(url).await
	}
}

/// Returns the SDK User-Agent string: `loom-toggles/{version}`.
pub fn user_agent() -> String {
	format!("loom-toggles/{}", env!("CARGO_PKG_VERSION"))
}

/// Turns a response into a payload or the matching error.
///
/// A body that is not JSON is a parse failure whatever the status. An
/// `error` object in a JSON body wins over the HTTP status.
pub(crate) fn decode_body<T: DeserializeOwned>(status: StatusCode, body: &str) -> Result<T> {
	let value: Value = serde_json::from_str(body).map_err(|e| {
		debug!(status = status.as_u16(), body = %truncate(body), "response body is not JSON");
		TogglesError::Parse(e.to_string())
	})?;

	if let Some(error) = value.get("error").filter(|e| !e.is_null()) {
		return Err(api_error_from_envelope(status, error));
	}

	if !status.is_success() {
		return Err(TogglesError::Api {
			status: status.as_u16(),
			message: truncate(body),
		});
	}

	serde_json::from_value(value).map_err(|e| TogglesError::Parse(e.to_string()))
}

fn api_error_from_envelope(status: StatusCode, error: &Value) -> TogglesError {
	let reported = error
		.get("status")
		.or_else(|| error.get("code"))
		.and_then(Value::as_u64)
		.and_then(|code| u16::try_from(code).ok());

	let message = match error {
		Value::String(message) => message.clone(),
		_ => error
			.get("message")
			.and_then(Value::as_str)
			.unwrap_or_default()
			.to_string(),
	};

	TogglesError::Api {
		status: reported.unwrap_or_else(|| status.as_u16()),
		message,
	}
}

fn truncate(body: &str) -> String {
	match body.char_indices().nth(MAX_ERROR_BODY) {
		Some((idx, _)) => format!("{}...", &body[..idx]),
		None => body.to_string(),
	}
}
