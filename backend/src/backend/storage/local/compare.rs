//! Loose value ordering for `order_by`.
//!
//! Emulates the relational `<` / `>` operators of a dynamically typed host:
//! numbers compare numerically, strings by UTF-16 code units, and mixed types
//! are coerced to primitives and then to numbers. Pairs that cannot be
//! compared (a missing field, a non-numeric string against a number) compare
//! as equal, so they keep their stored order under the stable sort below.

use serde_json::Value;
use std::cmp::Ordering;

/// Compare two optional field values (None = field absent)
pub fn loose_compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let (Some(a), Some(b)) = (a, b) else {
        return Ordering::Equal;
    };

    let pa = to_primitive(a);
    let pb = to_primitive(b);

    match (&pa, &pb) {
        (Primitive::Str(x), Primitive::Str(y)) => x.encode_utf16().cmp(y.encode_utf16()),
        _ => {
            let (x, y) = (pa.to_number(), pb.to_number());
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
    }
}

enum Primitive {
    Null,
    Bool(bool),
    Num(f64),
    Str(String),
}

impl Primitive {
    fn to_number(&self) -> f64 {
        match self {
            Primitive::Null => 0.0,
            Primitive::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Primitive::Num(n) => *n,
            Primitive::Str(s) => string_to_number(s),
        }
    }
}

fn to_primitive(value: &Value) -> Primitive {
    match value {
        Value::Null => Primitive::Null,
        Value::Bool(b) => Primitive::Bool(*b),
        Value::Number(n) => Primitive::Num(n.as_f64().unwrap_or(f64::NAN)),
        Value::String(s) => Primitive::Str(s.clone()),
        Value::Array(items) => Primitive::Str(
            items
                .iter()
                .map(|item| match item {
                    Value::Null => String::new(),
                    other => display_string(other),
                })
                .collect::<Vec<_>>()
                .join(","),
        ),
        Value::Object(_) => Primitive::Str("[object Object]".to_string()),
    }
}

fn display_string(value: &Value) -> String {
    match to_primitive(value) {
        Primitive::Null => "null".to_string(),
        Primitive::Bool(b) => b.to_string(),
        Primitive::Num(n) => number_to_string(n),
        Primitive::Str(s) => s,
    }
}

fn number_to_string(n: f64) -> String {
    if n == 0.0 {
        return "0".to_string();
    }
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n.abs() >= 1e21 {
        // Exponent form with an explicit sign, e.g. "1e+21"
        let formatted = format!("{:e}", n);
        return match formatted.split_once('e') {
            Some((mantissa, exponent)) if !exponent.starts_with('-') => format!("{}e+{}", mantissa, exponent),
            _ => formatted,
        };
    }
    format!("{}", n)
}

fn string_to_number(s: &str) -> f64 {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    match trimmed {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    if let Some(hex) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).map(|v| v as f64).unwrap_or(f64::NAN);
    }
    // Reject forms Rust accepts but the host language does not ("inf", "nan")
    if trimmed.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') {
        return f64::NAN;
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

/// Stable merge sort that tolerates comparators which are not a total order
///
/// `slice::sort_by` may panic on inconsistent comparisons, which the loose
/// ordering above produces for heterogeneous values.
pub fn stable_sort_by<T, F>(items: Vec<T>, mut compare: F) -> Vec<T>
where
    F: FnMut(&T, &T) -> Ordering,
{
    merge_sort(items, &mut compare)
}

fn merge_sort<T, F>(mut items: Vec<T>, compare: &mut F) -> Vec<T>
where
    F: FnMut(&T, &T) -> Ordering,
{
    if items.len() <= 1 {
        return items;
    }

    let right = items.split_off(items.len() / 2);
    let left = merge_sort(items, compare);
    let right = merge_sort(right, compare);

    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();

    loop {
        match (left.peek(), right.peek()) {
            (Some(l), Some(r)) => {
                // Take from the right only when strictly smaller: keeps ties stable
                if compare(r, l) == Ordering::Less {
                    merged.extend(right.next());
                } else {
                    merged.extend(left.next());
                }
            }
            (Some(_), None) => merged.extend(left.by_ref()),
            (None, Some(_)) => merged.extend(right.by_ref()),
            (None, None) => break,
        }
    }

    merged
}
