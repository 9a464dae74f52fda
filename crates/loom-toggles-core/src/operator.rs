// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::value::{loose_cmp, loose_eq};

/// Comparison operators available to dynamic rule expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComparisonOperator {
	#[serde(rename = "==")]
	Equals,
	#[serde(rename = "!=")]
	NotEquals,
	#[serde(rename = "<")]
	LessThan,
	#[serde(rename = "<=")]
	LessThanOrEquals,
	#[serde(rename = ">")]
	GreaterThan,
	#[serde(rename = ">=")]
	GreaterThanOrEquals,
}

impl ComparisonOperator {
	pub const ALL: [ComparisonOperator; 6] = [
		ComparisonOperator::Equals,
		ComparisonOperator::NotEquals,
		ComparisonOperator::LessThan,
		ComparisonOperator::LessThanOrEquals,
		ComparisonOperator::GreaterThan,
		ComparisonOperator::GreaterThanOrEquals,
	];

	/// The wire symbol for this operator.
	pub fn as_str(&self) -> &'static str {
		match self {
			ComparisonOperator::Equals => "==",
			ComparisonOperator::NotEquals => "!=",
			ComparisonOperator::LessThan => "<",
			ComparisonOperator::LessThanOrEquals => "<=",
			ComparisonOperator::GreaterThan => ">",
			ComparisonOperator::GreaterThanOrEquals => ">=",
		}
	}

	/// Evaluates `actual <op> expected` with loose coercion.
	pub fn evaluate(&self, actual: &Value, expected: &Value) -> bool {
		match self {
			ComparisonOperator::Equals => loose_eq(actual, expected),
			ComparisonOperator::NotEquals => !loose_eq(actual, expected),
			ComparisonOperator::LessThan => {
				matches!(loose_cmp(actual, expected), Some(Ordering::Less))
			}
			ComparisonOperator::LessThanOrEquals => {
				matches!(
					loose_cmp(actual, expected),
					Some(Ordering::Less | Ordering::Equal)
				)
			}
			ComparisonOperator::GreaterThan => {
				matches!(loose_cmp(actual, expected), Some(Ordering::Greater))
			}
			ComparisonOperator::GreaterThanOrEquals => {
				matches!(
					loose_cmp(actual, expected),
					Some(Ordering::Greater | Ordering::Equal)
				)
			}
		}
	}
}

impl std::fmt::Display for ComparisonOperator {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Returned when an operator symbol is not one of the supported six.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownOperator(pub String);

impl std::str::FromStr for ComparisonOperator {
	type Err = UnknownOperator;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		ComparisonOperator::ALL
			.into_iter()
			.find(|op| op.as_str() == s)
			.ok_or_else(|| UnknownOperator(s.to_string()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn parses_all_wire_symbols() {
		for op in ComparisonOperator::ALL {
			assert_eq!(op.as_str().parse::<ComparisonOperator>(), Ok(op));
		}
	}

	#[test]
	fn rejects_unknown_symbols() {
		assert_eq!(
			"===".parse::<ComparisonOperator>(),
			Err(UnknownOperator("===".to_string()))
		);
		assert!("contains".parse::<ComparisonOperator>().is_err());
	}

	#[test]
	fn serde_uses_wire_symbols() {
		let op: ComparisonOperator = serde_json::from_value(json!(">=")).unwrap();
		assert_eq!(op, ComparisonOperator::GreaterThanOrEquals);
		assert_eq!(serde_json::to_value(ComparisonOperator::NotEquals).unwrap(), json!("!="));
	}

	#[test]
	fn relational_operators_on_numbers() {
		let fifteen = json!(15);
		assert!(ComparisonOperator::GreaterThan.evaluate(&fifteen, &json!(10)));
		assert!(!ComparisonOperator::LessThan.evaluate(&fifteen, &json!(10)));
		assert!(ComparisonOperator::GreaterThanOrEquals.evaluate(&fifteen, &json!(15)));
		assert!(ComparisonOperator::LessThanOrEquals.evaluate(&fifteen, &json!("15")));
	}

	#[test]
	fn incomparable_values_fail_every_relational_operator() {
		let word = json!("abc");
		let number = json!(3);
		assert!(!ComparisonOperator::LessThan.evaluate(&word, &number));
		assert!(!ComparisonOperator::LessThanOrEquals.evaluate(&word, &number));
		assert!(!ComparisonOperator::GreaterThan.evaluate(&word, &number));
		assert!(!ComparisonOperator::GreaterThanOrEquals.evaluate(&word, &number));
		assert!(ComparisonOperator::NotEquals.evaluate(&word, &number));
	}

	#[test]
	fn null_is_ordered_like_zero_but_not_equal_to_it() {
		let null = json!(null);
		assert!(ComparisonOperator::LessThanOrEquals.evaluate(&null, &json!(0)));
		assert!(ComparisonOperator::GreaterThanOrEquals.evaluate(&null, &json!(0)));
		assert!(!ComparisonOperator::Equals.evaluate(&null, &json!(0)));
	}
}
