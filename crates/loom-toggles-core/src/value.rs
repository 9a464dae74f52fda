// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Loose, coercing comparisons over JSON values.
//!
//! Rule constants are authored by hand in the dashboard and frequently differ in
//! JSON type from the flag value they are compared against (`"10"` vs `10`,
//! `true` vs `1`). These helpers coerce both sides before comparing.

use std::borrow::Cow;
use std::cmp::Ordering;

use serde_json::Value;

/// String form used when a structured value is compared with a primitive.
pub fn to_string_representation(value: &Value) -> String {
	match value {
		Value::String(s) => s.clone(),
		Value::Array(items) => items
			.iter()
			.map(|item| match item {
				Value::Null => String::new(),
				other => to_string_representation(other),
			})
			.collect::<Vec<_>>()
			.join(","),
		Value::Object(_) => "[object Object]".to_string(),
		other => other.to_string(),
	}
}

/// Numeric coercion. Returns NaN for values with no numeric reading.
pub fn to_number(value: &Value) -> f64 {
	match value {
		Value::Null => 0.0,
		Value::Bool(true) => 1.0,
		Value::Bool(false) => 0.0,
		Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
		Value::String(s) => parse_numeric(s),
		Value::Array(_) | Value::Object(_) => f64::NAN,
	}
}

fn parse_numeric(s: &str) -> f64 {
	let trimmed = s.trim();
	if trimmed.is_empty() {
		return 0.0;
	}
	trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

/// Equality with type coercion between primitives.
pub fn loose_eq(left: &Value, right: &Value) -> bool {
	match (left, right) {
		(Value::Null, Value::Null) => true,
		(Value::Null, _) | (_, Value::Null) => false,
		(Value::Number(_), Value::Number(_)) => to_number(left) == to_number(right),
		(Value::String(a), Value::String(b)) => a == b,
		(Value::Bool(a), Value::Bool(b)) => a == b,
		(Value::Bool(_), _) | (_, Value::Bool(_)) => {
			// Booleans drop to 0/1 and the comparison restarts.
			let (flag, other) = if left.is_boolean() {
				(left, right)
			} else {
				(right, left)
			};
			loose_eq(&Value::from(to_number(flag)), other)
		}
		(Value::Number(_), Value::String(_)) | (Value::String(_), Value::Number(_)) => {
			to_number(left) == to_number(right)
		}
		(Value::Array(_) | Value::Object(_), Value::Array(_) | Value::Object(_)) => left == right,
		(Value::Array(_) | Value::Object(_), primitive) | (primitive, Value::Array(_) | Value::Object(_)) => {
			let structured = if left.is_array() || left.is_object() {
				left
			} else {
				right
			};
			loose_eq(&Value::String(to_string_representation(structured)), primitive)
		}
	}
}

/// Relational ordering with coercion. `None` means the values are not
/// comparable and every relational operator evaluates to false.
///
/// Arrays and objects are compared through their string form.
pub fn loose_cmp(left: &Value, right: &Value) -> Option<Ordering> {
	let (left, right) = (to_primitive(left), to_primitive(right));
	if let (Value::String(a), Value::String(b)) = (left.as_ref(), right.as_ref()) {
		return Some(a.cmp(b));
	}
	to_number(&left).partial_cmp(&to_number(&right))
}

fn to_primitive(value: &Value) -> Cow<'_, Value> {
	match value {
		Value::Array(_) | Value::Object(_) => Cow::Owned(Value::String(to_string_representation(value))),
		primitive => Cow::Borrowed(primitive),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn numeric_strings_equal_numbers() {
		assert!(loose_eq(&json!("10"), &json!(10)));
		assert!(loose_eq(&json!(10.0), &json!(10)));
		assert!(!loose_eq(&json!("ten"), &json!(10)));
	}

	#[test]
	fn booleans_coerce_to_zero_or_one() {
		assert!(loose_eq(&json!(true), &json!(1)));
		assert!(loose_eq(&json!(false), &json!("0")));
		assert!(!loose_eq(&json!(true), &json!("true")));
	}

	#[test]
	fn null_only_equals_null() {
		assert!(loose_eq(&json!(null), &json!(null)));
		assert!(!loose_eq(&json!(null), &json!(0)));
		assert!(!loose_eq(&json!(""), &json!(null)));
	}

	#[test]
	fn arrays_compare_against_primitives_by_string_form() {
		assert!(loose_eq(&json!([1, 2]), &json!("1,2")));
		assert!(loose_eq(&json!(["a"]), &json!("a")));
		assert!(loose_eq(&json!([1, 2]), &json!([1, 2])));
	}

	#[test]
	fn strings_order_lexicographically() {
		assert_eq!(loose_cmp(&json!("b"), &json!("a")), Some(Ordering::Greater));
		assert_eq!(loose_cmp(&json!("10"), &json!("9")), Some(Ordering::Less));
	}

	#[test]
	fn mixed_types_order_numerically() {
		assert_eq!(loose_cmp(&json!("10"), &json!(9)), Some(Ordering::Greater));
		assert_eq!(loose_cmp(&json!(null), &json!(1)), Some(Ordering::Less));
		assert_eq!(loose_cmp(&json!(true), &json!(1)), Some(Ordering::Equal));
	}

	#[test]
	fn non_numeric_values_are_incomparable() {
		assert_eq!(loose_cmp(&json!("abc"), &json!(1)), None);
		assert_eq!(loose_cmp(&json!({"a": 1}), &json!(1)), None);
	}

	#[test]
	fn structured_values_order_by_string_form() {
		assert_eq!(loose_cmp(&json!([5]), &json!(10)), Some(Ordering::Less));
		assert_eq!(loose_cmp(&json!(["b"]), &json!("c")), Some(Ordering::Less));
		assert_eq!(loose_cmp(&json!("a"), &json!(["a"])), Some(Ordering::Equal));
		assert_eq!(loose_cmp(&json!([1, 2]), &json!(3)), None);
	}

	#[test]
	fn blank_strings_coerce_to_zero() {
		assert_eq!(to_number(&json!("  ")), 0.0);
		assert_eq!(to_number(&json!(" 42 ")), 42.0);
	}
}
