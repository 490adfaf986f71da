//! Claim-map plumbing
//!
//! Grants travel inside the JWT payload as a flat, wire-cased JSON object:
//! every internal `snake_case` field becomes a `lowerCamel` key, every absent
//! field is omitted entirely (never emitted as `null`), recursively through
//! nested records and lists of records. This module holds the two pure string
//! transforms and the recursive tree walks that apply them, plus the lenient
//! deserializers used to rebuild typed records from untrusted payloads.

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

/// Convert an internal field name to its wire key: `room_join` -> `roomJoin`.
pub(crate) fn wire_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut capitalize = false;
    for ch in name.chars() {
        if ch == '_' {
            capitalize = true;
        } else if capitalize {
            out.extend(ch.to_uppercase());
            capitalize = false;
        } else {
            out.push(ch);
        }
    }
    out
}

/// Convert a wire key back to the internal field name: `roomJoin` -> `room_join`.
pub(crate) fn field_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for ch in name.chars() {
        if ch.is_ascii_uppercase() {
            out.push('_');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Rename every object key in the tree, recursing through nested objects and
/// list elements. Scalars pass through untouched.
pub(crate) fn rename_keys(value: Value, convert: &impl Fn(&str) -> String) -> Value {
    match value {
        Value::Object(map) => {
            let mut renamed = Map::with_capacity(map.len());
            for (key, inner) in map {
                renamed.insert(convert(&key), rename_keys(inner, convert));
            }
            Value::Object(renamed)
        }
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| rename_keys(item, convert))
                .collect(),
        ),
        other => other,
    }
}

/// Drop every null-valued key at every nesting depth. Null list elements are
/// dropped too, so a pruned tree never contains a null anywhere.
pub(crate) fn prune_nulls(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut pruned = Map::new();
            for (key, inner) in map {
                let inner = prune_nulls(inner);
                if !inner.is_null() {
                    pruned.insert(key, inner);
                }
            }
            Value::Object(pruned)
        }
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(prune_nulls)
                .filter(|item| !item.is_null())
                .collect(),
        ),
        other => other,
    }
}

/// Best-effort field deserializer: any shape mismatch (scalar where a record
/// was expected, wrong scalar type, explicit null) yields `None` instead of
/// failing the surrounding record. Claim payloads come from a party that is
/// only partially trusted until the signature checks out, so hydration must
/// never abort on a malformed field.
pub(crate) fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(T::deserialize(deserializer).ok())
}

/// Like [`lenient`], for lists of records: a non-list value yields `None`,
/// and malformed elements are dropped individually.
pub(crate) fn lenient_seq<'de, D, T>(deserializer: D) -> Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let Some(items) = Vec::<Value>::deserialize(deserializer).ok() else {
        return Ok(None);
    };
    Ok(Some(
        items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
    ))
}
