// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Client configuration and API key handling.
//!
//! Configuration can be built in code through [`ClientConfig`] and the client
//! builder, or loaded from the environment:
//!
//! | Variable | Meaning | Default |
//! |----------|---------|---------|
//! | `LOOM_TOGGLES_API_KEY` | API key | required |
//! | `LOOM_TOGGLES_API_KEY_FILE` | File containing the API key | |
//! | `LOOM_TOGGLES_HOST` | Service host | `api.toggles.loom.dev` |
//! | `LOOM_TOGGLES_PORT` | Service port | `443` |
//! | `LOOM_TOGGLES_PROTOCOL` | `http` or `https` | `https` |
//! | `LOOM_TOGGLES_TIMEOUT_MS` | Per-request timeout | `60000` |

use std::path::PathBuf;
use std::time::Duration;
use std::{env, fmt, fs};

use zeroize::Zeroize;

use crate::error::{Result, TogglesError};

pub const DEFAULT_HOST: &str = "api.toggles.loom.dev";
pub const DEFAULT_PORT: u16 = 443;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(60_000);

/// Maximum age of the global flag snapshot before the next evaluation refreshes it.
pub const STATE_TTL: Duration = Duration::from_millis(60_000);
/// Maximum age of a cached identity before it is refetched.
pub const IDENTITY_TTL: Duration = Duration::from_millis(5_000);

pub const ENV_API_KEY: &str = "LOOM_TOGGLES_API_KEY";
pub const ENV_HOST: &str = "LOOM_TOGGLES_HOST";
pub const ENV_PORT: &str = "LOOM_TOGGLES_PORT";
pub const ENV_PROTOCOL: &str = "LOOM_TOGGLES_PROTOCOL";
pub const ENV_TIMEOUT_MS: &str = "LOOM_TOGGLES_TIMEOUT_MS";

const REDACTED: &str = "[REDACTED]";

/// The API key sent as the Basic auth password.
///
/// Debug and Display are redacted and the key is zeroized on drop; call
/// [`ApiKey::expose`] at the one place it goes on the wire.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct ApiKey {
	inner: String,
}

impl ApiKey {
	/// Wraps a key, rejecting empty or whitespace-only values.
	pub fn new(key: impl Into<String>) -> Result<Self> {
		let inner = key.into();
		if inner.trim().is_empty() {
			return Err(TogglesError::MissingApiKey);
		}
		Ok(Self { inner })
	}

	pub fn expose(&self) -> &str {
		&self.inner
	}

	/// Loads the key using the `VAR` / `VAR_FILE` convention.
	///
	/// `VAR_FILE` takes precedence; one trailing newline is stripped from file
	/// contents. Returns `Ok(None)` when neither variable is set.
	pub fn from_env_var(var: &str) -> Result<Option<Self>> {
		let file_var = format!("{var}_FILE");

		if let Ok(path_str) = env::var(&file_var) {
			if path_str.is_empty() {
				return Err(TogglesError::InvalidConfig(format!(
					"{file_var} is set but empty"
				)));
			}

			let path = PathBuf::from(&path_str);
			let content = fs::read_to_string(&path).map_err(|e| {
				TogglesError::InvalidConfig(format!(
					"failed to read API key file {}: {e}",
					path.display()
				))
			})?;
			let key = content.strip_suffix('\n').unwrap_or(&content);
			return Self::new(key).map(Some);
		}

		match env::var(var) {
			Ok(value) => Self::new(value).map(Some),
			Err(_) => Ok(None),
		}
	}
}

impl fmt::Debug for ApiKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("ApiKey").field(&REDACTED).finish()
	}
}

impl fmt::Display for ApiKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(REDACTED)
	}
}

/// URL scheme used to reach the service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Protocol {
	Http,
	#[default]
	Https,
}

impl Protocol {
	pub fn as_str(&self) -> &'static str {
		match self {
			Protocol::Http => "http",
			Protocol::Https => "https",
		}
	}
}

impl fmt::Display for Protocol {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl std::str::FromStr for Protocol {
	type Err = TogglesError;

	fn from_str(s: &str) -> Result<Self> {
		match s.trim().to_ascii_lowercase().as_str() {
			"http" => Ok(Protocol::Http),
			"https" => Ok(Protocol::Https),
			other => Err(TogglesError::InvalidConfig(format!(
				"unsupported protocol {other:?}, expected http or https"
			))),
		}
	}
}

/// Configuration for the toggles client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
	/// Service host name, without scheme.
	pub host: String,
	pub port: u16,
	pub protocol: Protocol,
	/// Timeout applied to every HTTP request.
	pub request_timeout: Duration,
	/// Maximum age of the global snapshot.
	pub state_ttl: Duration,
	/// Maximum age of a cached identity.
	pub identity_ttl: Duration,
}

impl Default for ClientConfig {
	fn default() -> Self {
		Self {
			host: DEFAULT_HOST.to_string(),
			port: DEFAULT_PORT,
			protocol: Protocol::default(),
			request_timeout: DEFAULT_REQUEST_TIMEOUT,
			state_ttl: STATE_TTL,
			identity_ttl: IDENTITY_TTL,
		}
	}
}

impl ClientConfig {
	/// Reads host, port, protocol and timeout overrides from the environment.
	///
	/// Unset variables keep their defaults; set but unparseable values are
	/// configuration errors.
	pub fn from_env() -> Result<Self> {
		let mut config = Self::default();

		if let Some(host) = non_empty_var(ENV_HOST) {
			config.host = host;
		}
		if let Some(port) = non_empty_var(ENV_PORT) {
			config.port = port
				.parse()
				.map_err(|_| TogglesError::InvalidConfig(format!("{ENV_PORT}={port:?} is not a port")))?;
		}
		if let Some(protocol) = non_empty_var(ENV_PROTOCOL) {
			config.protocol = protocol.parse()?;
		}
		if let Some(timeout) = non_empty_var(ENV_TIMEOUT_MS) {
			let millis: u64 = timeout.parse().map_err(|_| {
				TogglesError::InvalidConfig(format!("{ENV_TIMEOUT_MS}={timeout:?} is not a number"))
			})?;
			config.request_timeout = Duration::from_millis(millis);
		}

		Ok(config)
	}

	/// Scheme, host and port, without a trailing slash.
	pub fn base_url(&self) -> String {
		format!("{}://{}:{}", self.protocol, self.host, self.port)
	}

	pub fn validate(&self) -> Result<()> {
		if self.host.trim().is_empty() {
			return Err(TogglesError::InvalidConfig("host is empty".to_string()));
		}
		if self.host.contains("://") || self.host.contains('/') {
			return Err(TogglesError::InvalidConfig(format!(
				"host {:?} must not include a scheme or path",
				self.host
			)));
		}
		if self.port == 0 {
			return Err(TogglesError::InvalidConfig("port must be non-zero".to_string()));
		}
		if self.request_timeout.is_zero() {
			return Err(TogglesError::InvalidConfig(
				"request timeout must be non-zero".to_string(),
			));
		}
		Ok(())
	}
}

fn non_empty_var(var: &str) -> Option<String> {
	env::var(var).ok().filter(|value| !value.trim().is_empty())
}
