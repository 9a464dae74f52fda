// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Cache of the global flag and override snapshot.
//!
//! The snapshot is an immutable [`StateSnapshot`] behind an `Arc`; a refresh
//! builds a complete new one and swaps the reference, so readers see either
//! the old state or the new state and never a mix.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use loom_toggles_core::StateSnapshot;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::Result;
use crate::transport::Transport;

/// What [`StateCache::ensure_fresh`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
	/// The snapshot was within its TTL; nothing was fetched.
	Fresh,
	/// A new snapshot was fetched and installed at `completed_at`.
	Refreshed { completed_at: Instant },
}

#[derive(Debug)]
struct Current {
	snapshot: Arc<StateSnapshot>,
	refreshed_at: Option<Instant>,
	refreshed_at_utc: Option<DateTime<Utc>>,
}

/// Global snapshot plus its last-refresh time.
#[derive(Debug)]
pub struct StateCache {
	current: RwLock<Current>,
	refresh_lock: Mutex<()>,
	ttl: Duration,
}

impl StateCache {
	/// Creates an empty cache that is stale until the first refresh.
	pub fn new(ttl: Duration) -> Self {
		Self {
			current: RwLock::new(Current {
				snapshot: Arc::new(StateSnapshot::empty()),
				refreshed_at: None,
				refreshed_at_utc: None,
			}),
			refresh_lock: Mutex::new(()),
			ttl,
		}
	}

	/// The last-known snapshot, fresh or not.
	pub async fn snapshot(&self) -> Arc<StateSnapshot> {
		Arc::clone(&self.current.read().await.snapshot)
	}

	/// Returns true once a refresh has succeeded.
	pub async fn is_initialized(&self) -> bool {
		self.current.read().await.refreshed_at.is_some()
	}

	/// Wall-clock time of the last successful refresh.
	pub async fn last_refreshed_at(&self) -> Option<DateTime<Utc>> {
		self.current.read().await.refreshed_at_utc
	}

	pub async fn is_fresh(&self) -> bool {
		let refreshed_at = self.current.read().await.refreshed_at;
		self.within_ttl(refreshed_at, Instant::now())
	}

	fn within_ttl(&self, refreshed_at: Option<Instant>, now: Instant) -> bool {
		refreshed_at.is_some_and(|at| now.saturating_duration_since(at) < self.ttl)
	}

	/// Refreshes the snapshot if it is older than the TTL.
	///
	/// Concurrent callers that find the snapshot stale share one fetch: the
	/// first takes the refresh lock, the rest wait and re-check freshness.
	pub async fn ensure_fresh(&self, transport: &dyn Transport) -> Result<RefreshOutcome> {
		if self.is_fresh().await {
			return Ok(RefreshOutcome::Fresh);
		}

		let _guard = self.refresh_lock.lock().await;
		if self.is_fresh().await {
			debug!("toggle state refreshed by a concurrent caller");
			return Ok(RefreshOutcome::Fresh);
		}

		self.fetch_and_swap(transport).await
	}

	/// Refreshes the snapshot regardless of its age.
	pub async fn refresh(&self, transport: &dyn Transport) -> Result<RefreshOutcome> {
		let _guard = self.refresh_lock.lock().await;
		self.fetch_and_swap(transport).await
	}

	async fn fetch_and_swap(&self, transport: &dyn Transport) -> Result<RefreshOutcome> {
		let payload = transport.fetch_state().await?;
		let snapshot = StateSnapshot::from_payload(payload)?;
		let completed_at = Instant::now();

		let flags = snapshot.flag_count();
		let overrides = snapshot.override_count();

		{
			let mut current = self.current.write().await;
			current.snapshot = Arc::new(snapshot);
			current.refreshed_at = Some(completed_at);
			current.refreshed_at_utc = Some(Utc::now());
		}

		info!(flags, overrides, "toggle state refreshed");
		Ok(RefreshOutcome::Refreshed { completed_at })
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::STATE_TTL;
	use crate::error::TogglesError;
	use crate::transport::MockTransport;
	use loom_toggles_core::{Flag, FlagPayload, Override, StatePayload};
	use serde_json::json;

	fn payload(value: serde_json::Value) -> StatePayload {
		StatePayload {
			flags: vec![FlagPayload::from(Flag::new(1u64, "tier", value))],
			overrides: vec![Override::new("tier", json!("beta"))],
		}
	}

	#[tokio::test(start_paused = true)]
	async fn test_starts_empty_and_stale() {
		let cache = StateCache::new(STATE_TTL);
		assert!(!cache.is_initialized().await);
		assert!(!cache.is_fresh().await);
		assert_eq!(cache.snapshot().await.flag_count(), 0);
		assert!(cache.last_refreshed_at().await.is_none());
	}

	#[tokio::test(start_paused = true)]
	async fn test_refresh_installs_snapshot() {
		let mut transport = MockTransport::new();
		transport
			.expect_fetch_state()
			.times(1)
			.returning(|| Ok(payload(json!("free"))));

		let cache = StateCache::new(STATE_TTL);
		let outcome = cache.ensure_fresh(&transport).await.unwrap();

		assert!(matches!(outcome, RefreshOutcome::Refreshed { .. }));
		assert!(cache.is_initialized().await);
		assert!(cache.last_refreshed_at().await.is_some());
		let snapshot = cache.snapshot().await;
		assert_eq!(snapshot.flag("tier").unwrap().value, json!("free"));
		assert_eq!(snapshot.global_override("tier"), Some(&json!("beta")));
	}

	#[tokio::test(start_paused = true)]
	async fn test_fetches_once_within_ttl() {
		let mut transport = MockTransport::new();
		transport
			.expect_fetch_state()
			.times(2)
			.returning(|| Ok(payload(json!("free"))));

		let cache = StateCache::new(STATE_TTL);
		cache.ensure_fresh(&transport).await.unwrap();

		tokio::time::advance(STATE_TTL - Duration::from_millis(1)).await;
		assert_eq!(
			cache.ensure_fresh(&transport).await.unwrap(),
			RefreshOutcome::Fresh
		);

		tokio::time::advance(Duration::from_millis(1)).await;
		assert!(matches!(
			cache.ensure_fresh(&transport).await.unwrap(),
			RefreshOutcome::Refreshed { .. }
		));
	}

	#[tokio::test(start_paused = true)]
	async fn test_failed_refresh_keeps_previous_state() {
		let mut transport = MockTransport::new();
		let mut seq = mockall::Sequence::new();
		transport
			.expect_fetch_state()
			.times(1)
			.in_sequence(&mut seq)
			.returning(|| Ok(payload(json!("free"))));
		transport
			.expect_fetch_state()
			.times(1)
			.in_sequence(&mut seq)
			.returning(|| Err(TogglesError::Parse("expected value".to_string())));
		transport
			.expect_fetch_state()
			.times(1)
			.in_sequence(&mut seq)
			.returning(|| Ok(payload(json!("pro"))));

		let cache = StateCache::new(STATE_TTL);
		cache.ensure_fresh(&transport).await.unwrap();
		let before = cache.snapshot().await;

		tokio::time::advance(STATE_TTL).await;
		let result = cache.ensure_fresh(&transport).await;
		assert!(matches!(result, Err(TogglesError::Parse(_))));
		assert_eq!(*cache.snapshot().await, *before);
		assert!(!cache.is_fresh().await);

		// A failed refresh does not count as one; the next call retries.
		cache.ensure_fresh(&transport).await.unwrap();
		assert_eq!(cache.snapshot().await.flag("tier").unwrap().value, json!("pro"));
	}

	#[tokio::test(start_paused = true)]
	async fn test_bad_operator_rejects_refresh() {
		let mut transport = MockTransport::new();
		transport.expect_fetch_state().times(1).returning(|| {
			Ok(serde_json::from_value(json!({
				"flags": [{
					"id": 1,
					"key": "tier",
					"value": "free",
					"dynamic_rules": [
						{ "expression": { "flag_id": 1, "op": "like", "value": "x" }, "value": "y" }
					]
				}]
			}))
			.unwrap())
		});

		let cache = StateCache::new(STATE_TTL);
		let result = cache.ensure_fresh(&transport).await;

		assert!(matches!(result, Err(TogglesError::RuleIntegrity(_))));
		assert!(!cache.is_initialized().await);
	}

	#[tokio::test(start_paused = true)]
	async fn test_forced_refresh_ignores_ttl() {
		let mut transport = MockTransport::new();
		transport
			.expect_fetch_state()
			.times(2)
			.returning(|| Ok(payload(json!("free"))));

		let cache = StateCache::new(STATE_TTL);
		cache.ensure_fresh(&transport).await.unwrap();
		cache.refresh(&transport).await.unwrap();
	}
}
