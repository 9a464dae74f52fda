// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Flag resolution: the override precedence chain and dynamic rule matching.
//!
//! Precedence, highest first:
//!
//! 1. call-site override supplied with the request
//! 2. identity override fetched for the request's identifier
//! 3. global override from the state snapshot
//! 4. first matching dynamic rule on the flag
//! 5. the flag's own default value
//!
//! Tiers 1 and 2 need no global state and are checked by [`local_override`]
//! before the caller decides whether a refresh is due. [`ResolutionContext`]
//! walks the full chain against a snapshot.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ResolveError, Result, RuleIntegrityError};
use crate::flag::Flag;
use crate::snapshot::{Identity, StateSnapshot};

/// What the caller asks for.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRequest {
	pub key: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub identifier: Option<String>,
	#[serde(default)]
	pub overrides: HashMap<String, Value>,
}

impl EvaluationRequest {
	pub fn new(key: impl Into<String>) -> Self {
		Self {
			key: key.into(),
			identifier: None,
			overrides: HashMap::new(),
		}
	}

	pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
		self.identifier = Some(identifier.into());
		self
	}

	pub fn with_override(mut self, key: impl Into<String>, value: Value) -> Self {
		self.overrides.insert(key.into(), value);
		self
	}
}

/// Which precedence tier produced a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EvaluationReason {
	CallSiteOverride,
	IdentityOverride,
	GlobalOverride,
	RuleMatch { rule_index: usize },
	Default,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
	pub flag_key: String,
	pub value: Value,
	pub reason: EvaluationReason,
}

impl EvaluationResult {
	pub fn new(flag_key: impl Into<String>, value: Value, reason: EvaluationReason) -> Self {
		Self {
			flag_key: flag_key.into(),
			value,
			reason,
		}
	}
}

/// A dynamic rule that matched.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleMatch<'a> {
	pub rule_index: usize,
	pub value: &'a Value,
}

/// Checks the tiers that do not depend on global state.
pub fn local_override(
	key: &str,
	call_site: &HashMap<String, Value>,
	identity: Option<&Identity>,
) -> Option<EvaluationResult> {
	if let Some(value) = call_site.get(key) {
		return Some(EvaluationResult::new(
			key,
			value.clone(),
			EvaluationReason::CallSiteOverride,
		));
	}

	identity
		.and_then(|identity| identity.override_for(key))
		.map(|value| EvaluationResult::new(key, value.clone(), EvaluationReason::IdentityOverride))
}

/// Everything a resolution reads, borrowed for the duration of one evaluation.
#[derive(Debug, Clone, Copy)]
pub struct ResolutionContext<'a> {
	pub snapshot: &'a StateSnapshot,
	pub call_site: &'a HashMap<String, Value>,
	pub identity: Option<&'a Identity>,
}

impl<'a> ResolutionContext<'a> {
	pub fn new(
		snapshot: &'a StateSnapshot,
		call_site: &'a HashMap<String, Value>,
		identity: Option<&'a Identity>,
	) -> Self {
		Self {
			snapshot,
			call_site,
			identity,
		}
	}

	/// Resolves `key` through the full precedence chain.
	pub fn resolve(&self, key: &str) -> Result<EvaluationResult> {
		let flag = self
			.snapshot
			.flag(key)
			.ok_or_else(|| ResolveError::FlagNotFound(key.to_string()))?;

		if let Some(result) = local_override(key, self.call_site, self.identity) {
			return Ok(result);
		}

		if let Some(value) = self.snapshot.global_override(key) {
			return Ok(EvaluationResult::new(
				key,
				value.clone(),
				EvaluationReason::GlobalOverride,
			));
		}

		if flag.has_rules() {
			if let Some(matched) = self.match_rule(flag)? {
				return Ok(EvaluationResult::new(
					key,
					matched.value.clone(),
					EvaluationReason::RuleMatch {
						rule_index: matched.rule_index,
					},
				));
			}
		}

		Ok(EvaluationResult::new(
			key,
			flag.value.clone(),
			EvaluationReason::Default,
		))
	}

	/// The value a rule sees for `flag`: overrides and default only.
	///
	/// The dependency's own rules are never consulted, so rule chains cannot
	/// recurse.
	pub fn base_value(&self, flag: &'a Flag) -> &'a Value {
		self
			.call_site
			.get(&flag.key)
			.or_else(|| self.identity.and_then(|identity| identity.override_for(&flag.key)))
			.or_else(|| self.snapshot.global_override(&flag.key))
			.unwrap_or(&flag.value)
	}

	/// Returns the first rule on `target` whose expression holds.
	pub fn match_rule(
		&self,
		target: &'a Flag,
	) -> std::result::Result<Option<RuleMatch<'a>>, RuleIntegrityError> {
		for (rule_index, rule) in target.dynamic_rules.iter().enumerate() {
			let expression = &rule.expression;
			let dependency = self.snapshot.flag_by_id(&expression.flag_id).ok_or_else(|| {
				RuleIntegrityError::UnknownFlagId {
					flag_key: target.key.clone(),
					flag_id: expression.flag_id.clone(),
				}
			})?;

			let input = self.base_value(dependency);
			if expression.op.evaluate(input, &expression.value) {
				return Ok(Some(RuleMatch {
					rule_index,
					value: &rule.value,
				}));
			}
		}

		Ok(None)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::flag::{DynamicRule, FlagId, Override};
	use crate::operator::ComparisonOperator;
	use serde_json::json;

	fn tiered_snapshot() -> StateSnapshot {
		StateSnapshot::new(tiered_flags(), vec![])
	}

	fn tiered_flags() -> Vec<Flag> {
		vec![
			Flag::new(1u64, "seats", json!(15)),
			Flag::new(2u64, "tier", json!("free"))
				.with_rule(DynamicRule::new(
					1u64,
					ComparisonOperator::GreaterThan,
					json!(10),
					json!("A"),
				))
				.with_rule(DynamicRule::new(
					1u64,
					ComparisonOperator::GreaterThan,
					json!(0),
					json!("B"),
				)),
		]
	}

	#[test]
	fn first_matching_rule_wins() {
		let snapshot = tiered_snapshot();
		let call_site = HashMap::new();
		let ctx = ResolutionContext::new(&snapshot, &call_site, None);

		let result = ctx.resolve("tier").unwrap();
		assert_eq!(result.value, json!("A"));
		assert_eq!(result.reason, EvaluationReason::RuleMatch { rule_index: 0 });
	}

	#[test]
	fn later_rule_matches_when_earlier_does_not() {
		let snapshot = tiered_snapshot();
		let call_site = HashMap::from([("seats".to_string(), json!(3))]);
		let ctx = ResolutionContext::new(&snapshot, &call_site, None);

		let result = ctx.resolve("tier").unwrap();
		assert_eq!(result.value, json!("B"));
		assert_eq!(result.reason, EvaluationReason::RuleMatch { rule_index: 1 });
	}

	#[test]
	fn no_matching_rule_falls_back_to_default() {
		let snapshot = tiered_snapshot();
		let call_site = HashMap::from([("seats".to_string(), json!(-1))]);
		let ctx = ResolutionContext::new(&snapshot, &call_site, None);

		let result = ctx.resolve("tier").unwrap();
		assert_eq!(result.value, json!("free"));
		assert_eq!(result.reason, EvaluationReason::Default);
	}

	#[test]
	fn rule_inputs_see_identity_and_global_overrides() {
		let with_global = StateSnapshot::new(tiered_flags(), vec![Override::new("seats", json!(2))]);
		let call_site = HashMap::new();
		let ctx = ResolutionContext::new(&with_global, &call_site, None);
		assert_eq!(ctx.resolve("tier").unwrap().value, json!("B"));

		let identity = Identity::new("user-1", HashMap::from([("seats".to_string(), json!(50))]));
		let ctx = ResolutionContext::new(&with_global, &call_site, Some(&identity));
		assert_eq!(ctx.resolve("tier").unwrap().value, json!("A"));
	}

	#[test]
	fn rule_inputs_ignore_the_dependency_rules() {
		let snapshot = StateSnapshot::new(
			vec![
				Flag::new("a", "a", json!(1)).with_rule(DynamicRule::new(
					"b",
					ComparisonOperator::Equals,
					json!(1),
					json!(100),
				)),
				Flag::new("b", "b", json!(1)).with_rule(DynamicRule::new(
					"a",
					ComparisonOperator::Equals,
					json!(100),
					json!("never"),
				)),
			],
			vec![],
		);
		let call_site = HashMap::new();
		let ctx = ResolutionContext::new(&snapshot, &call_site, None);

		// `a` resolves to 100 through its rule, but `b` compares against a's
		// default of 1.
		assert_eq!(ctx.resolve("a").unwrap().value, json!(100));
		assert_eq!(ctx.resolve("b").unwrap().value, json!(1));
	}

	#[test]
	fn every_tier_in_order() {
		let snapshot = StateSnapshot::new(tiered_flags(), vec![Override::new("tier", json!("global"))]);
		let identity = Identity::new("user-1", HashMap::from([("tier".to_string(), json!("identity"))]));
		let call_site = HashMap::from([("tier".to_string(), json!("call-site"))]);

		let ctx = ResolutionContext::new(&snapshot, &call_site, Some(&identity));
		let result = ctx.resolve("tier").unwrap();
		assert_eq!(result.value, json!("call-site"));
		assert_eq!(result.reason, EvaluationReason::CallSiteOverride);

		let no_call_site = HashMap::new();
		let ctx = ResolutionContext::new(&snapshot, &no_call_site, Some(&identity));
		let result = ctx.resolve("tier").unwrap();
		assert_eq!(result.value, json!("identity"));
		assert_eq!(result.reason, EvaluationReason::IdentityOverride);

		let ctx = ResolutionContext::new(&snapshot, &no_call_site, None);
		let result = ctx.resolve("tier").unwrap();
		assert_eq!(result.value, json!("global"));
		assert_eq!(result.reason, EvaluationReason::GlobalOverride);

		let without_global = tiered_snapshot();
		let ctx = ResolutionContext::new(&without_global, &no_call_site, None);
		assert_eq!(ctx.resolve("tier").unwrap().value, json!("A"));

		let low_seats = HashMap::from([("seats".to_string(), json!(0))]);
		let ctx = ResolutionContext::new(&without_global, &low_seats, None);
		let result = ctx.resolve("tier").unwrap();
		assert_eq!(result.value, json!("free"));
		assert_eq!(result.reason, EvaluationReason::Default);
	}

	#[test]
	fn unknown_flag_is_not_found() {
		let snapshot = tiered_snapshot();
		let call_site = HashMap::from([("ghost".to_string(), json!(true))]);
		let ctx = ResolutionContext::new(&snapshot, &call_site, None);

		assert_eq!(
			ctx.resolve("ghost"),
			Err(ResolveError::FlagNotFound("ghost".to_string()))
		);
	}

	#[test]
	fn dangling_rule_reference_is_an_integrity_error() {
		let snapshot = StateSnapshot::new(
			vec![Flag::new(1u64, "tier", json!("free")).with_rule(DynamicRule::new(
				42u64,
				ComparisonOperator::Equals,
				json!(true),
				json!("gold"),
			))],
			vec![],
		);
		let call_site = HashMap::new();
		let ctx = ResolutionContext::new(&snapshot, &call_site, None);

		assert_eq!(
			ctx.resolve("tier"),
			Err(ResolveError::RuleIntegrity(RuleIntegrityError::UnknownFlagId {
				flag_key: "tier".to_string(),
				flag_id: FlagId::from(42u64),
			}))
		);
	}

	#[test]
	fn local_override_prefers_call_site() {
		let identity = Identity::new("u", HashMap::from([("tier".to_string(), json!("identity"))]));
		let call_site = HashMap::from([("tier".to_string(), json!("call-site"))]);

		let result = local_override("tier", &call_site, Some(&identity)).unwrap();
		assert_eq!(result.reason, EvaluationReason::CallSiteOverride);

		let result = local_override("tier", &HashMap::new(), Some(&identity)).unwrap();
		assert_eq!(result.reason, EvaluationReason::IdentityOverride);

		assert!(local_override("tier", &HashMap::new(), None).is_none());
	}

	#[test]
	fn request_deserializes_with_optional_fields() {
		let request: EvaluationRequest = serde_json::from_value(json!({ "key": "tier" })).unwrap();
		assert_eq!(request, EvaluationRequest::new("tier"));

		let request: EvaluationRequest = serde_json::from_value(json!({
			"key": "tier",
			"identifier": "user-1",
			"overrides": { "tier": "pro" }
		}))
		.unwrap();
		assert_eq!(
			request,
			EvaluationRequest::new("tier")
				.with_identifier("user-1")
				.with_override("tier", json!("pro"))
		);
	}
}
