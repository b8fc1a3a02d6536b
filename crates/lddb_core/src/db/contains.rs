//! Structural JSON containment, exposed to SQL as `json_contains`.
//!
//! # Responsibility
//! - Decide whether one JSON value structurally contains another.
//! - Register the check as a deterministic SQLite scalar function so that
//!   reference lookups run as predicates inside the store.
//!
//! # Invariants
//! - Objects contain objects key-by-key, recursively.
//! - Arrays contain arrays when every needle element is contained by some
//!   haystack element; order and multiplicity are ignored.
//! - Only a top-level array may contain a bare scalar.
//! - SQL `NULL` or non-JSON input never matches and never errors.

use rusqlite::functions::{Context, FunctionFlags};
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde_json::{Number, Value};

/// SQL name of the registered containment function.
pub const JSON_CONTAINS_FN: &str = "json_contains";

/// Returns whether `haystack` structurally contains `needle`.
///
/// ```
/// use lddb_core::db::contains::json_contains;
/// use serde_json::json;
///
/// let doc = json!({"items": [{"@id": "/a"}, {"@id": "/b", "x": 1}]});
/// assert!(json_contains(&doc, &json!({"items": [{"@id": "/b"}]})));
/// assert!(!json_contains(&doc, &json!({"items": [{"@id": "/c"}]})));
/// ```
pub fn json_contains(haystack: &Value, needle: &Value) -> bool {
    match (haystack, needle) {
        (Value::Array(values), needle) if is_scalar(needle) => {
            values.iter().any(|value| scalar_eq(value, needle))
        }
        _ => contains_nested(haystack, needle),
    }
}

fn contains_nested(haystack: &Value, needle: &Value) -> bool {
    match (haystack, needle) {
        (Value::Object(hay), Value::Object(pins)) => pins.iter().all(|(key, pin)| {
            hay.get(key)
                .is_some_and(|value| contains_nested(value, pin))
        }),
        (Value::Array(hay), Value::Array(pins)) => pins
            .iter()
            .all(|pin| hay.iter().any(|value| contains_nested(value, pin))),
        (Value::Object(_), _) | (Value::Array(_), _) => false,
        (hay, pin) => scalar_eq(hay, pin),
    }
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}

fn scalar_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => numbers_eq(l, r),
        (Value::Null, Value::Null) => true,
        (Value::Bool(l), Value::Bool(r)) => l == r,
        (Value::String(l), Value::String(r)) => l == r,
        _ => false,
    }
}

/// Integers compare exactly; `f64` is used only when either side is a float.
fn numbers_eq(left: &Number, right: &Number) -> bool {
    if let (Some(l), Some(r)) = (left.as_i64(), right.as_i64()) {
        return l == r;
    }
    if let (Some(l), Some(r)) = (left.as_u64(), right.as_u64()) {
        return l == r;
    }
    if left.is_f64() || right.is_f64() {
        return matches!((left.as_f64(), right.as_f64()), (Some(l), Some(r)) if l == r);
    }
    false
}

/// Registers `json_contains(haystack_json, needle_json)` on `conn`.
///
/// Both arguments are JSON text, typically produced by the `->` operator.
/// The function returns `1` on containment and `0` otherwise.
pub fn register(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        JSON_CONTAINS_FN,
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx: &Context<'_>| {
            let Some(haystack) = json_arg(ctx.get_raw(0)) else {
                return Ok(false);
            };
            let Some(needle) = json_arg(ctx.get_raw(1)) else {
                return Ok(false);
            };
            Ok(json_contains(&haystack, &needle))
        },
    )
}

fn json_arg(raw: ValueRef<'_>) -> Option<Value> {
    match raw {
        ValueRef::Text(bytes) => serde_json::from_slice(bytes).ok(),
        ValueRef::Integer(value) => Some(Value::from(value)),
        ValueRef::Real(value) => Some(Value::from(value)),
        ValueRef::Null | ValueRef::Blob(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{json_contains, register};
    use rusqlite::Connection;
    use serde_json::json;

    #[test]
    fn object_containment_is_recursive_and_ignores_extra_keys() {
        let doc = json!({"@id": "/w", "instanceOf": {"@id": "/x", "label": "X"}});
        assert!(json_contains(&doc, &json!({"instanceOf": {"@id": "/x"}})));
        assert!(json_contains(&doc, &json!({})));
        assert!(!json_contains(&doc, &json!({"instanceOf": {"@id": "/y"}})));
        assert!(!json_contains(&doc, &json!({"missing": {"@id": "/x"}})));
    }

    #[test]
    fn array_containment_ignores_order_and_duplicates() {
        let doc = json!([{"@id": "/a"}, {"@id": "/b"}]);
        assert!(json_contains(&doc, &json!([{"@id": "/b"}, {"@id": "/a"}])));
        assert!(json_contains(&doc, &json!([{"@id": "/a"}, {"@id": "/a"}])));
        assert!(json_contains(&doc, &json!([])));
        assert!(!json_contains(&doc, &json!([{"@id": "/c"}])));
    }

    #[test]
    fn single_reference_does_not_match_reference_list_and_vice_versa() {
        let single = json!({"sameAs": {"@id": "/s"}});
        let list = json!({"sameAs": [{"@id": "/s"}]});
        assert!(!json_contains(&single, &list));
        assert!(!json_contains(&list, &single));
    }

    #[test]
    fn top_level_array_contains_scalar_but_nested_array_does_not() {
        assert!(json_contains(&json!(["a", "b"]), &json!("a")));
        assert!(!json_contains(&json!({"k": ["a"]}), &json!({"k": "a"})));
    }

    #[test]
    fn numbers_compare_by_value() {
        assert!(json_contains(&json!({"n": 1}), &json!({"n": 1.0})));
        assert!(!json_contains(&json!({"n": 1}), &json!({"n": "1"})));
    }

    #[test]
    fn large_integers_compare_exactly() {
        let big = 9_007_199_254_740_993_u64;
        assert!(json_contains(&json!({"n": big}), &json!({"n": big})));
        assert!(!json_contains(&json!({"n": big}), &json!({"n": big - 1})));
        assert!(!json_contains(
            &json!([-9_007_199_254_740_993_i64]),
            &json!(-9_007_199_254_740_992_i64)
        ));
        assert!(!json_contains(&json!({"n": u64::MAX}), &json!({"n": -1})));
    }

    #[test]
    fn registered_function_treats_null_and_garbage_as_no_match() {
        let conn = Connection::open_in_memory().unwrap();
        register(&conn).unwrap();

        let hit: bool = conn
            .query_row(
                "SELECT json_contains(?1 -> '$.entry', ?2);",
                [r#"{"entry": {"@id": "/a"}}"#, r#"{"@id": "/a"}"#],
                |row| row.get(0),
            )
            .unwrap();
        assert!(hit);

        let missing: bool = conn
            .query_row(
                "SELECT json_contains(?1 -> '$.entry', ?2);",
                [r#"{"other": 1}"#, r#"{"@id": "/a"}"#],
                |row| row.get(0),
            )
            .unwrap();
        assert!(!missing);

        let garbage: bool = conn
            .query_row(
                "SELECT json_contains('not json', ?1);",
                [r#"{"@id": "/a"}"#],
                |row| row.get(0),
            )
            .unwrap();
        assert!(!garbage);
    }
}
