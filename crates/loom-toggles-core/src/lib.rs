// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for the Loom toggles SDK.
//!
//! This crate holds everything about toggle resolution that does not touch the
//! network: the served state model, the comparison operators used by dynamic
//! rules, and the precedence chain that turns a request into a value. The
//! client SDK (`loom-toggles`) layers caching and transport on top.
//!
//! # Example
//!
//! ```
//! use std::collections::HashMap;
//!
//! use loom_toggles_core::{
//!     ComparisonOperator, DynamicRule, Flag, ResolutionContext, StateSnapshot,
//! };
//! use serde_json::json;
//!
//! let snapshot = StateSnapshot::new(
//!     vec![
//!         Flag::new(1u64, "seats", json!(15)),
//!         Flag::new(2u64, "tier", json!("free")).with_rule(DynamicRule::new(
//!             1u64,
//!             ComparisonOperator::GreaterThan,
//!             json!(10),
//!             json!("team"),
//!         )),
//!     ],
//!     vec![],
//! );
//!
//! let call_site = HashMap::new();
//! let ctx = ResolutionContext::new(&snapshot, &call_site, None);
//! assert_eq!(ctx.resolve("tier").unwrap().value, json!("team"));
//! ```

pub mod error;
pub mod evaluation;
pub mod flag;
pub mod operator;
pub mod payload;
pub mod snapshot;
pub mod value;

pub use error::{ResolveError, Result, RuleIntegrityError};
pub use evaluation::{
	local_override, EvaluationReason, EvaluationRequest, EvaluationResult, ResolutionContext,
	RuleMatch,
};
pub use flag::{DynamicRule, Expression, Flag, FlagId, Override};
pub use operator::{ComparisonOperator, UnknownOperator};
pub use payload::{ExpressionPayload, FlagPayload, IdentityPayload, RulePayload, StatePayload};
pub use snapshot::{Identity, StateSnapshot};
