// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::operator::ComparisonOperator;

/// Internal flag identifier, used only for rule cross-references.
///
/// The service emits ids either as strings or as integers; both deserialize
/// into the same textual form so `7` and `"7"` refer to the same flag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawFlagId")]
pub struct FlagId(pub String);

impl FlagId {
	pub fn new(id: impl Into<String>) -> Self {
		Self(id.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl std::fmt::Display for FlagId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl From<&str> for FlagId {
	fn from(id: &str) -> Self {
		Self(id.to_string())
	}
}

impl From<u64> for FlagId {
	fn from(id: u64) -> Self {
		Self(id.to_string())
	}
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawFlagId {
	Text(String),
	Number(serde_json::Number),
}

impl From<RawFlagId> for FlagId {
	fn from(raw: RawFlagId) -> Self {
		match raw {
			RawFlagId::Text(s) => FlagId(s),
			RawFlagId::Number(n) => FlagId(n.to_string()),
		}
	}
}

/// A feature toggle as held in a state snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flag {
	pub id: FlagId,
	/// Caller-facing key, unique within a snapshot.
	pub key: String,
	/// Value served when no override or rule applies.
	pub value: Value,
	/// Evaluated in order, first match wins.
	#[serde(default)]
	pub dynamic_rules: Vec<DynamicRule>,
}

impl Flag {
	pub fn new(id: impl Into<FlagId>, key: impl Into<String>, value: Value) -> Self {
		Self {
			id: id.into(),
			key: key.into(),
			value,
			dynamic_rules: Vec::new(),
		}
	}

	pub fn with_rule(mut self, rule: DynamicRule) -> Self {
		self.dynamic_rules.push(rule);
		self
	}

	pub fn has_rules(&self) -> bool {
		!self.dynamic_rules.is_empty()
	}
}

/// "If the referenced flag's value compares true against a constant, serve
/// `value` instead."
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicRule {
	pub expression: Expression,
	pub value: Value,
}

impl DynamicRule {
	pub fn new(flag_id: impl Into<FlagId>, op: ComparisonOperator, operand: Value, value: Value) -> Self {
		Self {
			expression: Expression {
				flag_id: flag_id.into(),
				op,
				value: operand,
			},
			value,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expression {
	pub flag_id: FlagId,
	pub op: ComparisonOperator,
	pub value: Value,
}

/// A global forced value for a flag key, independent of identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Override {
	pub key: String,
	pub value: Value,
}

impl Override {
	pub fn new(key: impl Into<String>, value: Value) -> Self {
		Self {
			key: key.into(),
			value,
		}
	}
}
