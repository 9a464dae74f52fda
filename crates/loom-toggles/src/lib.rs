// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Feature Toggles Rust SDK for Loom.
//!
//! This crate resolves feature toggles locally from cached service state, so
//! most evaluations never touch the network.
//!
//! # Features
//!
//! - **Two caches**: global flags and overrides (60 s TTL), per-identity
//!   overrides (5 s TTL), both refreshed lazily on use
//! - **Override precedence**: call-site, identity, global, dynamic rule, default
//! - **Dynamic rules**: a flag's value can depend on another flag's value
//! - **Async or callback**: `evaluate` returns a future; `evaluate_with_callback`
//!   notifies on a spawned task
//! - **Type-safe getters**: boolean, string and number helpers with defaults
//!
//! # Example
//!
//! ```ignore
//! use loom_toggles::{EvaluationRequest, TogglesClient};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = TogglesClient::builder()
//!         .api_key("your-api-key")
//!         .build()
//!         .await?;
//!
//!     let request = EvaluationRequest::new("checkout.new_flow")
//!         .with_identifier("user-123")
//!         .with_override("region", json!("eu"));
//!
//!     let value = client.evaluate(&request).await?;
//!     let enabled = client.get_bool(&request, false).await?;
//!
//!     client.evaluate_with_callback(request, |result| {
//!         println!("resolved: {result:?}");
//!     });
//!
//!     Ok(())
//! }
//! ```

mod callback;
mod client;
mod config;
mod error;
mod identity_cache;
mod state_cache;
mod transport;

pub use client::{TogglesClient, TogglesClientBuilder};
pub use config::{
	ApiKey, ClientConfig, Protocol, DEFAULT_HOST, DEFAULT_PORT, DEFAULT_REQUEST_TIMEOUT,
	ENV_API_KEY, ENV_HOST, ENV_PORT, ENV_PROTOCOL, ENV_TIMEOUT_MS, IDENTITY_TTL, STATE_TTL,
};
pub use error::{BoxError, Result, TogglesError};
pub use identity_cache::IdentityCache;
pub use state_cache::{RefreshOutcome, StateCache};
pub use transport::{user_agent, HttpTransport, Transport};

// Re-export core types for convenience
pub use loom_toggles_core::{
	ComparisonOperator, DynamicRule, EvaluationReason, EvaluationRequest, EvaluationResult,
	Expression, Flag, FlagId, FlagPayload, Identity, IdentityPayload, Override, RuleIntegrityError,
	StatePayload, StateSnapshot,
};
