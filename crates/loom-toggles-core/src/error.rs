// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;

use crate::flag::FlagId;

/// Defects in the served toggle configuration.
///
/// These are never user-recoverable: retrying the same evaluation against the
/// same snapshot fails the same way.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleIntegrityError {
	#[error("rule on flag {flag_key} references unknown flag id {flag_id}")]
	UnknownFlagId { flag_key: String, flag_id: FlagId },

	#[error("rule on flag {flag_key} uses unsupported operator {op:?}")]
	UnknownOperator { flag_key: String, op: String },
}

/// Errors produced while resolving a flag against a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
	#[error("flag not found: {0}")]
	FlagNotFound(String),

	#[error(transparent)]
	RuleIntegrity(#[from] RuleIntegrityError),
}

pub type Result<T> = std::result::Result<T, ResolveError>;
