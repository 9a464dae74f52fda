// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Toggles client for resolving flags against cached service state.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use loom_toggles_core::{local_override, EvaluationRequest, EvaluationResult, ResolutionContext};
use serde_json::Value;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::config::{ApiKey, ClientConfig, Protocol, ENV_API_KEY};
use crate::error::{Result, TogglesError};
use crate::identity_cache::IdentityCache;
use crate::state_cache::{RefreshOutcome, StateCache};
use crate::transport::{HttpTransport, Transport};

/// Builder for constructing a [`TogglesClient`].
pub struct TogglesClientBuilder {
	api_key: Option<String>,
	config: ClientConfig,
	transport: Option<Arc<dyn Transport>>,
}

impl TogglesClientBuilder {
	/// Creates a new builder with default settings.
	pub fn new() -> Self {
		Self {
			api_key: None,
			config: ClientConfig::default(),
			transport: None,
		}
	}

	/// Creates a builder from `LOOM_TOGGLES_*` environment variables.
	///
	/// A missing key is not an error here; [`build`](Self::build) reports it.
	pub fn from_env() -> Result<Self> {
		let config = ClientConfig::from_env()?;
		let api_key = ApiKey::from_env_var(ENV_API_KEY)?;

		Ok(Self {
			api_key: api_key.map(|key| key.expose().to_string()),
			config,
			transport: None,
		})
	}

	/// Sets the API key sent as the Basic auth password.
	pub fn api_key(mut self, key: impl Into<String>) -> Self {
		self.api_key = Some(key.into());
		self
	}

	/// Replaces the whole configuration.
	pub fn config(mut self, config: ClientConfig) -> Self {
		self.config = config;
		self
	}

	pub fn host(mut self, host: impl Into<String>) -> Self {
		self.config.host = host.into();
		self
	}

	pub fn port(mut self, port: u16) -> Self {
		self.config.port = port;
		self
	}

	pub fn protocol(mut self, protocol: Protocol) -> Self {
		self.config.protocol = protocol;
		self
	}

	/// Sets the timeout applied to each HTTP request.
	pub fn request_timeout(mut self, timeout: Duration) -> Self {
		self.config.request_timeout = timeout;
		self
	}

	/// Sets the maximum age of the global snapshot.
	pub fn state_ttl(mut self, ttl: Duration) -> Self {
		self.config.state_ttl = ttl;
		self
	}

	/// Sets the maximum age of a cached identity.
	pub fn identity_ttl(mut self, ttl: Duration) -> Self {
		self.config.identity_ttl = ttl;
		self
	}

	/// Uses `transport` instead of the HTTP transport.
	///
	/// No API key is required when a transport is supplied.
	pub fn transport<T: Transport + 'static>(mut self, transport: T) -> Self {
		self.transport = Some(Arc::new(transport));
		self
	}

	/// Builds the client and fetches the initial global state.
	pub async fn build(self) -> Result<TogglesClient> {
		let client = self.build_lazy()?;
		client.refresh().await?;
		info!(
			flags = client.cached_flag_count().await,
			"Toggles client initialized"
		);
		Ok(client)
	}

	/// Builds the client without fetching anything.
	///
	/// Every key is reported as not found until the first
	/// [`refresh`](TogglesClient::refresh). Must be called within a tokio
	/// runtime.
	pub fn build_lazy(self) -> Result<TogglesClient> {
		let transport: Arc<dyn Transport> = match self.transport {
			Some(transport) => transport,
			None => {
				let api_key = ApiKey::new(self.api_key.ok_or(TogglesError::MissingApiKey)?)?;
				Arc::new(HttpTransport::new(&self.config, api_key)?)
			}
		};

		if self.config.state_ttl.is_zero() || self.config.identity_ttl.is_zero() {
			return Err(TogglesError::InvalidConfig(
				"cache TTLs must be non-zero".to_string(),
			));
		}

		let runtime = Handle::try_current().map_err(|e| {
			TogglesError::InvalidConfig(format!("toggles client requires a tokio runtime: {e}"))
		})?;

		Ok(TogglesClient {
			inner: Arc::new(ClientInner {
				transport,
				state: StateCache::new(self.config.state_ttl),
				identities: IdentityCache::new(self.config.identity_ttl),
				config: self.config,
				runtime,
			}),
		})
	}
}

impl Default for TogglesClientBuilder {
	fn default() -> Self {
		Self::new()
	}
}

struct ClientInner {
	transport: Arc<dyn Transport>,
	state: StateCache,
	identities: IdentityCache,
	config: ClientConfig,
	runtime: Handle,
}

/// Client for resolving feature toggles.
///
/// Global state and identity overrides are cached and refreshed lazily when
/// an evaluation finds them stale; there is no background task. Cloning is
/// cheap and clones share caches.
#[derive(Clone)]
pub struct TogglesClient {
	inner: Arc<ClientInner>,
}

impl TogglesClient {
	/// Creates a new builder for constructing a TogglesClient.
	pub fn builder() -> TogglesClientBuilder {
		TogglesClientBuilder::new()
	}

	/// Resolves the value of a flag.
	pub async fn evaluate(&self, request: &EvaluationRequest) -> Result<Value> {
		self.evaluate_detailed(request).await.map(|result| result.value)
	}

	/// Resolves a flag and reports which precedence tier produced the value.
	///
	/// Existence is checked against the last-known state before anything is
	/// fetched. Call-site and identity overrides return without a global
	/// refresh.
	pub async fn evaluate_detailed(&self, request: &EvaluationRequest) -> Result<EvaluationResult> {
		let key = request.key.as_str();
		let transport = self.inner.transport.as_ref();

		if !self.inner.state.snapshot().await.contains_flag(key) {
			debug!(flag_key = key, "flag not in last-known state");
			return Err(TogglesError::FlagNotFound {
				flag_key: key.to_string(),
			});
		}

		let identity = self
			.inner
			.identities
			.resolve(request.identifier.as_deref(), transport)
			.await?;

		if let Some(result) = local_override(key, &request.overrides, identity.as_deref()) {
			debug!(flag_key = key, reason = ?result.reason, "flag resolved from local override");
			return Ok(result);
		}

		let outcome = self.inner.state.ensure_fresh(transport).await?;
		self.after_refresh(outcome).await;

		let snapshot = self.inner.state.snapshot().await;
		let result =
			ResolutionContext::new(&snapshot, &request.overrides, identity.as_deref()).resolve(key)?;

		debug!(flag_key = key, reason = ?result.reason, "flag resolved");
		Ok(result)
	}

	/// Resolves a boolean flag, returning `default` if the value is not a boolean.
	pub async fn get_bool(&self, request: &EvaluationRequest, default: bool) -> Result<bool> {
		let value = self.evaluate(request).await?;

		match value.as_bool() {
			Some(v) => Ok(v),
			None => {
				warn!(
					flag_key = %request.key,
					actual = %value,
					"Flag value is not a boolean, using default"
				);
				Ok(default)
			}
		}
	}

	/// Resolves a string flag, returning `default` if the value is not a string.
	pub async fn get_string(&self, request: &EvaluationRequest, default: &str) -> Result<String> {
		let value = self.evaluate(request).await?;

		match value.as_str() {
			Some(v) => Ok(v.to_string()),
			None => {
				warn!(
					flag_key = %request.key,
					actual = %value,
					"Flag value is not a string, using default"
				);
				Ok(default.to_string())
			}
		}
	}

	/// Resolves a numeric flag, returning `default` if the value is not a number.
	pub async fn get_number(&self, request: &EvaluationRequest, default: f64) -> Result<f64> {
		let value = self.evaluate(request).await?;

		match value.as_f64() {
			Some(v) => Ok(v),
			None => {
				warn!(
					flag_key = %request.key,
					actual = %value,
					"Flag value is not a number, using default"
				);
				Ok(default)
			}
		}
	}

	/// Fetches the global state now, regardless of its age.
	pub async fn refresh(&self) -> Result<()> {
		let outcome = self.inner.state.refresh(self.inner.transport.as_ref()).await?;
		self.after_refresh(outcome).await;
		Ok(())
	}

	async fn after_refresh(&self, outcome: RefreshOutcome) {
		if let RefreshOutcome::Refreshed { completed_at } = outcome {
			self.inner.identities.evict_stale(completed_at).await;
		}
	}

	/// Returns true once the global state has been fetched successfully.
	pub async fn is_initialized(&self) -> bool {
		self.inner.state.is_initialized().await
	}

	/// Returns the number of flags in the last-known state.
	pub async fn cached_flag_count(&self) -> usize {
		self.inner.state.snapshot().await.flag_count()
	}

	/// Returns the number of identities currently cached.
	pub async fn cached_identity_count(&self) -> usize {
		self.inner.identities.len().await
	}

	/// Wall-clock time of the last successful global refresh.
	pub async fn last_refreshed_at(&self) -> Option<DateTime<Utc>> {
		self.inner.state.last_refreshed_at().await
	}

	pub fn config(&self) -> &ClientConfig {
		&self.inner.config
	}

	pub(crate) fn runtime(&self) -> &Handle {
		&self.inner.runtime
	}
}
