// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Immutable views of served toggle state.
//!
//! A [`StateSnapshot`] is built once per successful refresh and never mutated
//! afterwards. Caches swap whole snapshots, so flags and overrides from two
//! different refreshes can never be observed together.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::RuleIntegrityError;
use crate::flag::{Flag, FlagId, Override};
use crate::payload::{IdentityPayload, StatePayload};

/// Global flag and override state as of one refresh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateSnapshot {
	flags: HashMap<String, Flag>,
	keys_by_id: HashMap<FlagId, String>,
	overrides: HashMap<String, Value>,
}

impl StateSnapshot {
	/// A snapshot with no flags, used before the first refresh.
	pub fn empty() -> Self {
		Self::default()
	}

	pub fn new(flags: Vec<Flag>, overrides: Vec<Override>) -> Self {
		let mut snapshot = Self::empty();
		for flag in flags {
			snapshot.keys_by_id.insert(flag.id.clone(), flag.key.clone());
			snapshot.flags.insert(flag.key.clone(), flag);
		}
		for entry in overrides {
			snapshot.overrides.insert(entry.key, entry.value);
		}
		snapshot
	}

	/// Builds a snapshot from an initialize response, rejecting it whole if any
	/// rule uses an unsupported operator.
	pub fn from_payload(payload: StatePayload) -> Result<Self, RuleIntegrityError> {
		let flags = payload
			.flags
			.into_iter()
			.map(|flag| flag.into_flag())
			.collect::<Result<Vec<_>, _>>()?;
		Ok(Self::new(flags, payload.overrides))
	}

	pub fn flag(&self, key: &str) -> Option<&Flag> {
		self.flags.get(key)
	}

	pub fn flag_by_id(&self, id: &FlagId) -> Option<&Flag> {
		self.keys_by_id.get(id).and_then(|key| self.flags.get(key))
	}

	pub fn contains_flag(&self, key: &str) -> bool {
		self.flags.contains_key(key)
	}

	pub fn global_override(&self, key: &str) -> Option<&Value> {
		self.overrides.get(key)
	}

	pub fn flag_keys(&self) -> impl Iterator<Item = &str> {
		self.flags.keys().map(String::as_str)
	}

	pub fn flag_count(&self) -> usize {
		self.flags.len()
	}

	pub fn override_count(&self) -> usize {
		self.overrides.len()
	}
}

impl TryFrom<StatePayload> for StateSnapshot {
	type Error = RuleIntegrityError;

	fn try_from(payload: StatePayload) -> Result<Self, Self::Error> {
		Self::from_payload(payload)
	}
}

/// One end user's override set as known at fetch time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Identity {
	pub identifier: String,
	pub overrides: HashMap<String, Value>,
}

impl Identity {
	pub fn new(identifier: impl Into<String>, overrides: HashMap<String, Value>) -> Self {
		Self {
			identifier: identifier.into(),
			overrides,
		}
	}

	pub fn from_payload(identifier: impl Into<String>, payload: IdentityPayload) -> Self {
		Self::new(identifier, payload.overrides)
	}

	pub fn override_for(&self, key: &str) -> Option<&Value> {
		self.overrides.get(key)
	}
}
