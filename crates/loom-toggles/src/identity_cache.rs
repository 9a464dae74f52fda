// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Per-identifier override cache.
//!
//! Each identity is aged independently of the global snapshot. Entries are
//! replaced whole on refetch and stale entries are swept whenever the cache is
//! written and whenever the global snapshot refreshes, so memory stays bounded
//! without a background timer.

use std::collections::HashMap;
use std::sync::{self, Arc, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use loom_toggles_core::Identity;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::debug;

use crate::error::Result;
use crate::transport::Transport;

#[derive(Debug, Clone)]
struct CachedIdentity {
	identity: Arc<Identity>,
	fetched_at: Instant,
	fetched_at_utc: DateTime<Utc>,
}

/// Cache of identity override sets keyed by identifier.
#[derive(Debug)]
pub struct IdentityCache {
	entries: RwLock<HashMap<String, CachedIdentity>>,
	/// One lock per identifier with a fetch in progress.
	in_flight: sync::Mutex<HashMap<String, Arc<Mutex<()>>>>,
	ttl: Duration,
}

impl IdentityCache {
	pub fn new(ttl: Duration) -> Self {
		Self {
			entries: RwLock::new(HashMap::new()),
			in_flight: sync::Mutex::new(HashMap::new()),
			ttl,
		}
	}

	/// Returns the identity for `identifier`, fetching it if absent or stale.
	///
	/// A missing or empty identifier means no identity and no network call. A
	/// failed fetch leaves any previous entry in place.
	pub async fn resolve(
		&self,
		identifier: Option<&str>,
		transport: &dyn Transport,
	) -> Result<Option<Arc<Identity>>> {
		let Some(identifier) = identifier.filter(|id| !id.is_empty()) else {
			return Ok(None);
		};

		if let Some(identity) = self.fresh(identifier, Instant::now()).await {
			return Ok(Some(identity));
		}

		let flight = self.join_flight(identifier);
		let _permit = flight.lock.lock().await;

		if let Some(identity) = self.fresh(identifier, Instant::now()).await {
			debug!(identifier, "identity fetched by a concurrent caller");
			return Ok(Some(identity));
		}

		self.fetch_and_store(identifier, transport).await.map(Some)
	}

	async fn fetch_and_store(
		&self,
		identifier: &str,
		transport: &dyn Transport,
	) -> Result<Arc<Identity>> {
		let payload = transport.fetch_identity(identifier).await?;
		let identity = Arc::new(Identity::from_payload(identifier, payload));
		let fetched_at = Instant::now();

		let mut entries = self.entries.write().await;
		entries.insert(
			identifier.to_string(),
			CachedIdentity {
				identity: Arc::clone(&identity),
				fetched_at,
				fetched_at_utc: Utc::now(),
			},
		);
		let evicted = Self::sweep(&mut entries, self.ttl, fetched_at);

		debug!(
			identifier,
			overrides = identity.overrides.len(),
			evicted,
			"identity fetched"
		);
		Ok(identity)
	}

	async fn fresh(&self, identifier: &str, now: Instant) -> Option<Arc<Identity>> {
		self
			.entries
			.read()
			.await
			.get(identifier)
			.filter(|entry| now.saturating_duration_since(entry.fetched_at) < self.ttl)
			.map(|entry| Arc::clone(&entry.identity))
	}

	fn join_flight<'a>(&'a self, identifier: &'a str) -> Flight<'a> {
		let mut in_flight = self.in_flight_map();
		let lock = Arc::clone(in_flight.entry(identifier.to_string()).or_default());
		Flight {
			cache: self,
			identifier,
			lock,
		}
	}

	fn in_flight_map(&self) -> sync::MutexGuard<'_, HashMap<String, Arc<Mutex<()>>>> {
		self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// Drops every entry whose `fetched_at + ttl` is before `now`.
	///
	/// Returns the number of entries evicted.
	pub async fn evict_stale(&self, now: Instant) -> usize {
		let mut entries = self.entries.write().await;
		let evicted = Self::sweep(&mut entries, self.ttl, now);
		if evicted > 0 {
			debug!(evicted, remaining = entries.len(), "evicted stale identities");
		}
		evicted
	}

	fn sweep(entries: &mut HashMap<String, CachedIdentity>, ttl: Duration, now: Instant) -> usize {
		let before = entries.len();
		entries.retain(|_, entry| entry.fetched_at + ttl >= now);
		before - entries.len()
	}

	pub async fn contains(&self, identifier: &str) -> bool {
		self.entries.read().await.contains_key(identifier)
	}

	pub async fn len(&self) -> usize {
		self.entries.read().await.len()
	}

	pub async fn is_empty(&self) -> bool {
		self.entries.read().await.is_empty()
	}

	/// Wall-clock time `identifier` was last fetched, if cached.
	pub async fn fetched_at(&self, identifier: &str) -> Option<DateTime<Utc>> {
		self
			.entries
			.read()
			.await
			.get(identifier)
			.map(|entry| entry.fetched_at_utc)
	}
}

/// A caller's share of the in-flight lock for one identifier.
///
/// The last holder to drop removes the registry entry, whether it finished,
/// failed, found the entry fresh, or was cancelled mid-fetch.
struct Flight<'a> {
	cache: &'a IdentityCache,
	identifier: &'a str,
	lock: Arc<Mutex<()>>,
}

impl Drop for Flight<'_> {
	fn drop(&mut self) {
		let mut in_flight = self.cache.in_flight_map();
		// The registry holds one reference and this flight holds another.
		let is_last = in_flight.get(self.identifier).is_some_and(|current| {
			Arc::ptr_eq(current, &self.lock) && Arc::strong_count(&self.lock) == 2
		});
		if is_last {
			in_flight.remove(self.identifier);
		}
	}
}
