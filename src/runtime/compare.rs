//! Comparison semantics for resolved operands.
//!
//! Operands resolve to `Option<&Value>`: `None` is "undefined" (a missing
//! output path), distinct from JSON `null`. Equality, ordering and
//! truthiness follow the loose/strict rules scripts are written against:
//! `undefined == null`, `"1" == 1`, orderings involving undefined are false.

use std::cmp::Ordering;

use serde_json::Value;

use crate::dsl::Operator;

/// Walks a dot path (`output.hash`, `payload.items.0`). Missing segments
/// yield `None`, never an error.
pub fn get_value<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Applies `operator` to resolved operands.
pub fn compare(operator: Operator, a: Option<&Value>, b: Option<&Value>) -> bool {
    match operator {
        Operator::LooseEq => loose_eq(a, b),
        Operator::LooseNe => !loose_eq(a, b),
        Operator::StrictEq => strict_eq(a, b),
        Operator::StrictNe => !strict_eq(a, b),
        Operator::Gt => matches!(relate(a, b), Some(Ordering::Greater)),
        Operator::Gte => matches!(relate(a, b), Some(Ordering::Greater | Ordering::Equal)),
        Operator::Lt => matches!(relate(a, b), Some(Ordering::Less)),
        Operator::Lte => matches!(relate(a, b), Some(Ordering::Less | Ordering::Equal)),
        Operator::In => contains(b, a),
        Operator::NotIn => !contains(b, a),
        Operator::And => truthy(a) && truthy(b),
        Operator::Or => truthy(a) || truthy(b),
        Operator::Not => !truthy(a),
    }
}

pub fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

pub fn strict_eq(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(Value::Number(x)), Some(Value::Number(y))) => x.as_f64() == y.as_f64(),
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

pub fn loose_eq(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (a, b) {
        (None | Some(Value::Null), None | Some(Value::Null)) => true,
        (None | Some(Value::Null), _) | (_, None | Some(Value::Null)) => false,
        (Some(x), Some(y)) => loose_eq_values(x, y),
    }
}

fn loose_eq_values(x: &Value, y: &Value) -> bool {
    match (x, y) {
        (Value::Number(_), Value::Number(_))
        | (Value::String(_), Value::String(_))
        | (Value::Bool(_), Value::Bool(_)) => strict_eq(Some(x), Some(y)),
        (Value::Array(_) | Value::Object(_), Value::Array(_) | Value::Object(_)) => x == y,
        (Value::Bool(b), other) | (other, Value::Bool(b)) => {
            loose_eq_values(&Value::from(if *b { 1 } else { 0 }), other)
        }
        (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
            n.as_f64() == Some(string_to_number(s))
        }
        (Value::Array(_) | Value::Object(_), primitive) | (primitive, Value::Array(_) | Value::Object(_)) => {
            let coerced = Value::String(to_display_string(if x.is_array() || x.is_object() { x } else { y }));
            loose_eq_values(&coerced, primitive)
        }
        _ => false,
    }
}

/// Abstract relational comparison. `None` means "not comparable" (NaN or
/// undefined involved), which makes every ordering operator false.
fn relate(a: Option<&Value>, b: Option<&Value>) -> Option<Ordering> {
    let (a, b) = (to_primitive(a), to_primitive(b));
    if let (Some(Value::String(x)), Some(Value::String(y))) = (&a, &b) {
        return Some(x.encode_utf16().cmp(y.encode_utf16()));
    }
    let (x, y) = (to_number(a.as_ref()), to_number(b.as_ref()));
    x.partial_cmp(&y)
}

fn to_primitive(value: Option<&Value>) -> Option<Value> {
    match value {
        Some(v @ (Value::Array(_) | Value::Object(_))) => Some(Value::String(to_display_string(v))),
        other => other.cloned(),
    }
}

fn to_number(value: Option<&Value>) -> f64 {
    match value {
        None => f64::NAN,
        Some(Value::Null) => 0.0,
        Some(Value::Bool(b)) => f64::from(u8::from(*b)),
        Some(Value::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
        Some(Value::String(s)) => string_to_number(s),
        Some(v) => string_to_number(&to_display_string(v)),
    }
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
        return u64::from_str_radix(hex, 16).map(|n| n as f64).unwrap_or(f64::NAN);
    }
    // Rust also accepts "inf" / "nan" spellings which are not numbers here.
    if trimmed.chars().any(|c| c.is_alphabetic() && c != 'e' && c != 'E') {
        return f64::NAN;
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

fn to_display_string(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) if n.is_i64() || n.is_u64() => n.to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f == 0.0 => "0".to_string(),
            Some(f) if f.fract() == 0.0 && f.abs() < 1e21 => format!("{f:.0}"),
            _ => n.to_string(),
        },
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|v| if v.is_null() { String::new() } else { to_display_string(v) })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

/// Membership of `item` in `container`: array element, substring, or
/// object key. Anything else is never a member.
fn contains(container: Option<&Value>, item: Option<&Value>) -> bool {
    let Some(item) = item else {
        return false;
    };
    match container {
        Some(Value::Array(items)) => items.iter().any(|v| strict_eq(Some(v), Some(item))),
        Some(Value::String(haystack)) => item.as_str().is_some_and(|needle| haystack.contains(needle)),
        Some(Value::Object(map)) => map.contains_key(&to_display_string(item)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_value_walks_objects_and_arrays() {
        let record = json!({ "output": { "result": "success", "items": [10, 20] } });
        assert_eq!(get_value(&record, "output.result"), Some(&json!("success")));
        assert_eq!(get_value(&record, "output.items.1"), Some(&json!(20)));
    }

    #[test]
    fn test_get_value_soft_fails_on_missing_path() {
        let record = json!({ "output": { "result": "success" } });
        assert_eq!(get_value(&record, "output.hash"), None);
        assert_eq!(get_value(&record, "output.result.deeper"), None);
        assert_eq!(get_value(&record, "output.items.x"), None);
    }

    #[test]
    fn test_string_to_number() {
        assert_eq!(string_to_number(" 42 "), 42.0);
        assert_eq!(string_to_number(""), 0.0);
        assert_eq!(string_to_number("0x10"), 16.0);
        assert_eq!(string_to_number("1e3"), 1000.0);
        assert!(string_to_number("inf").is_nan());
        assert!(string_to_number("abc").is_nan());
    }

    #[test]
    fn test_display_string_of_containers() {
        assert_eq!(to_display_string(&json!([1, null, "a"])), "1,,a");
        assert_eq!(to_display_string(&json!({ "a": 1 })), "[object Object]");
        assert_eq!(to_display_string(&json!(2.0)), "2");
    }

    #[test]
    fn test_display_string_of_large_integers() {
        assert_eq!(to_display_string(&json!(1e20)), "100000000000000000000");
        assert_eq!(to_display_string(&json!(u64::MAX)), "18446744073709551615");
        assert_eq!(to_display_string(&json!(-0.0)), "0");
        assert!(compare(Operator::LooseEq, Some(&json!([1e20])), Some(&json!("100000000000000000000"))));
    }
}
