//! Argument normalization for fingerprinting.
//!
//! Normalization is **best-effort**: it removes formatting-only differences
//! (key order, surrounding/duplicated whitespace, `10.0` vs `10`, explicit
//! `null`s) but never interprets meaning. Two argument sets that describe the
//! same real-world effect in different words still produce different
//! fingerprints. Swap in a custom [`ArgsNormalizer`] for tool-specific rules.

use serde_json::{Map, Number, Value};
use std::collections::BTreeSet;

/// Strategy turning raw tool arguments into a canonical form.
pub trait ArgsNormalizer: Send + Sync {
    fn normalize(&self, tool_name: &str, args: &Value) -> Value;
}

/// Default structural normalizer.
///
/// - object keys sorted, `null` members dropped
/// - strings trimmed, inner whitespace runs collapsed to one space
/// - integral floats folded to integers
/// - top-level fields listed in `ignored_fields` removed
///
/// Case, array order and every other value are preserved: an order id or an
/// amount always distinguishes two calls.
#[derive(Debug, Clone, Default)]
pub struct CanonicalArgsNormalizer {
    ignored_fields: BTreeSet<String>,
}

impl CanonicalArgsNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ignored_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignored_fields = fields.into_iter().map(Into::into).collect();
        self
    }
}

impl ArgsNormalizer for CanonicalArgsNormalizer {
    fn normalize(&self, _tool_name: &str, args: &Value) -> Value {
        match args {
            Value::Object(map) => {
                let filtered: Map<String, Value> = map
                    .iter()
                    .filter(|(k, _)| !self.ignored_fields.contains(k.trim()))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                normalize_value(&Value::Object(filtered))
            }
            other => normalize_value(other),
        }
    }
}

fn normalize_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.trim().to_string(), normalize_value(v)))
                .collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(entries.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.iter().map(normalize_value).collect()),
        Value::String(s) => Value::String(s.split_whitespace().collect::<Vec<_>>().join(" ")),
        Value::Number(n) => Value::Number(normalize_number(n)),
        other => other.clone(),
    }
}

fn normalize_number(n: &Number) -> Number {
    if n.is_i64() || n.is_u64() {
        return n.clone();
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 => {
            Number::from(f as i64)
        }
        _ => n.clone(),
    }
}

/// Serialize a value with object keys in sorted order, independent of how
/// `serde_json::Map` orders its entries.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                if let Some(v) = map.get(key) {
                    write_canonical(v, out);
                }
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
