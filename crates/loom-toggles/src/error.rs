// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the toggles SDK.

use loom_toggles_core::{ResolveError, RuleIntegrityError};
use thiserror::Error;

/// Result type alias for the toggles SDK.
pub type Result<T> = std::result::Result<T, TogglesError>;

/// Boxed source for transport failures raised outside reqwest.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur in the toggles SDK.
#[derive(Error, Debug)]
pub enum TogglesError {
	/// API key is missing or empty.
	#[error("Missing API key")]
	MissingApiKey,

	/// A configuration value could not be used.
	#[error("Invalid configuration: {0}")]
	InvalidConfig(String),

	/// The requested flag is absent from the last-known state.
	#[error("Flag not found: {flag_key}")]
	FlagNotFound {
		/// The flag key that was not found.
		flag_key: String,
	},

	/// The request exceeded the configured timeout.
	#[error("Request timed out: {0}")]
	Timeout(#[source] BoxError),

	/// Connection or I/O failure talking to the service.
	#[error("Transport failure: {0}")]
	Transport(#[source] BoxError),

	/// The service answered with an error envelope or a non-success status.
	#[error("API error {status}: {message}")]
	Api {
		/// HTTP status code reported by the service.
		status: u16,
		/// Error message from the service, empty if none was given.
		message: String,
	},

	/// The response body was not the expected JSON.
	#[error("Failed to parse response: {0}")]
	Parse(String),

	/// The served configuration is internally inconsistent.
	#[error(transparent)]
	RuleIntegrity(#[from] RuleIntegrityError),
}

impl TogglesError {
	/// Returns true for errors raised while constructing a client.
	pub fn is_configuration_error(&self) -> bool {
		matches!(
			self,
			TogglesError::MissingApiKey | TogglesError::InvalidConfig(_)
		)
	}

	/// Returns true if the underlying request timed out.
	pub fn is_timeout(&self) -> bool {
		matches!(self, TogglesError::Timeout(_))
	}

	/// Returns true for network-level failures, timeouts included.
	pub fn is_transport_error(&self) -> bool {
		matches!(self, TogglesError::Timeout(_) | TogglesError::Transport(_))
	}
}

impl From<ResolveError> for TogglesError {
	fn from(err: ResolveError) -> Self {
		match err {
			ResolveError::FlagNotFound(flag_key) => TogglesError::FlagNotFound { flag_key },
			ResolveError::RuleIntegrity(err) => TogglesError::RuleIntegrity(err),
		}
	}
}

impl From<reqwest::Error> for TogglesError {
	fn from(err: reqwest::Error) -> Self {
		if err.is_timeout() {
			TogglesError::Timeout(Box::new(err))
		} else if err.is_decode() {
			TogglesError::Parse(err.to_string())
		} else {
			TogglesError::Transport(Box::new(err))
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use loom_toggles_core::FlagId;

	#[test]
	fn test_configuration_errors() {
		assert!(TogglesError::MissingApiKey.is_configuration_error());
		assert!(TogglesError::InvalidConfig("port".to_string()).is_configuration_error());
		assert!(!TogglesError::Parse("bad".to_string()).is_configuration_error());
	}

	#[test]
	fn test_timeout_is_a_transport_error() {
		let timeout = TogglesError::Timeout("deadline elapsed".into());
		assert!(timeout.is_timeout());
		assert!(timeout.is_transport_error());

		let io = TogglesError::Transport("connection reset".into());
		assert!(!io.is_timeout());
		assert!(io.is_transport_error());

		assert!(!TogglesError::Api {
			status: 503,
			message: String::new()
		}
		.is_transport_error());
	}

	#[test]
	fn test_resolve_errors_convert() {
		let err: TogglesError = ResolveError::FlagNotFound("tier".to_string()).into();
		assert!(matches!(err, TogglesError::FlagNotFound { flag_key } if flag_key == "tier"));

		let err: TogglesError = ResolveError::RuleIntegrity(RuleIntegrityError::UnknownFlagId {
			flag_key: "tier".to_string(),
			flag_id: FlagId::from(9u64),
		})
		.into();
		assert!(matches!(
			err,
			TogglesError::RuleIntegrity(RuleIntegrityError::UnknownFlagId { .. })
		));
	}

	#[test]
	fn test_api_error_display() {
		let err = TogglesError::Api {
			status: 401,
			message: "bad credentials".to_string(),
		};
		assert_eq!(err.to_string(), "API error 401: bad credentials");
	}
}
