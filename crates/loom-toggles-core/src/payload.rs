// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Response bodies served by the toggles API.
//!
//! Operators arrive as free-form strings here and are only narrowed to
//! [`ComparisonOperator`] when a payload is converted into a snapshot, so an
//! unsupported operator surfaces as a [`RuleIntegrityError`] rather than a
//! parse failure.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RuleIntegrityError;
use crate::flag::{DynamicRule, Expression, Flag, FlagId, Override};
use crate::operator::ComparisonOperator;

/// Body of `GET /sdk/initialize`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatePayload {
	#[serde(default)]
	pub flags: Vec<FlagPayload>,
	#[serde(default)]
	pub overrides: Vec<Override>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlagPayload {
	pub id: FlagId,
	pub key: String,
	#[serde(default)]
	pub value: Value,
	#[serde(default)]
	pub dynamic_rules: Vec<RulePayload>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RulePayload {
	pub expression: ExpressionPayload,
	#[serde(default)]
	pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpressionPayload {
	pub flag_id: FlagId,
	pub op: String,
	#[serde(default)]
	pub value: Value,
}

/// Body of `GET /sdk/identities/{identifier}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentityPayload {
	#[serde(default)]
	pub overrides: HashMap<String, Value>,
}

impl FlagPayload {
	pub fn into_flag(self) -> Result<Flag, RuleIntegrityError> {
		let key = self.key;
		let dynamic_rules = self
			.dynamic_rules
			.into_iter()
			.map(|rule| {
				let op = rule
					.expression
					.op
					.parse::<ComparisonOperator>()
					.map_err(|unknown| RuleIntegrityError::UnknownOperator {
						flag_key: key.clone(),
						op: unknown.0,
					})?;
				Ok(DynamicRule {
					expression: Expression {
						flag_id: rule.expression.flag_id,
						op,
						value: rule.expression.value,
					},
					value: rule.value,
				})
			})
			.collect::<Result<Vec<_>, RuleIntegrityError>>()?;

		Ok(Flag {
			id: self.id,
			key,
			value: self.value,
			dynamic_rules,
		})
	}
}

impl From<Flag> for FlagPayload {
	fn from(flag: Flag) -> Self {
		Self {
			id: flag.id,
			key: flag.key,
			value: flag.value,
			dynamic_rules: flag
				.dynamic_rules
				.into_iter()
				.map(|rule| RulePayload {
					expression: ExpressionPayload {
						flag_id: rule.expression.flag_id,
						op: rule.expression.op.as_str().to_string(),
						value: rule.expression.value,
					},
					value: rule.value,
				})
				.collect(),
		}
	}
}
