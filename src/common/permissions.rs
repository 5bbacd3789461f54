// src/common/permissions.rs

//! Field-level mutation contract shared by every update endpoint.
//!
//! Each entity declares which attributes are fixed after creation and which a
//! caller may change. `apply_patch` enforces both sets the same way for all of them.

use serde_json::{Map, Value};

use crate::{common::error::AppError, db::store::Document};

/// Always part of an entity's immutable set.
pub const BASE_IMMUTABLE_FIELDS: [&str; 3] = ["id", "createdAt", "createdBy"];

#[derive(Debug, Clone, Copy)]
pub struct FieldPermissions {
    pub entity: &'static str,
    pub immutable: &'static [&'static str],
    pub editable: &'static [&'static str],
}

impl FieldPermissions {
    pub fn is_immutable(&self, field: &str) -> bool {
        BASE_IMMUTABLE_FIELDS.contains(&field) || self.immutable.contains(&field)
    }

    pub fn is_editable(&self, field: &str) -> bool {
        !self.is_immutable(field) && self.editable.contains(&field)
    }

    /// Immutable keys in `patch` whose value differs from what is stored.
    pub fn attempted_immutable_updates(
        &self,
        stored: &Map<String, Value>,
        patch: &Map<String, Value>,
    ) -> Vec<String> {
        let mut rejected: Vec<String> = patch
            .iter()
            .filter(|(key, _)| self.is_immutable(key))
            .filter(|(key, value)| {
                let current = stored.get(key.as_str()).unwrap_or(&Value::Null);
                !loosely_equal(current, value)
            })
            .map(|(key, _)| key.clone())
            .collect();
        rejected.sort();
        rejected
    }
}

/// Type-agnostic comparison: numbers by value, everything else by string form.
fn loosely_equal(a: &Value, b: &Value) -> bool {
    if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        return x == y;
    }
    coerce(a) == coerce(b)
}

fn coerce(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Checks `patch` against `T::PERMISSIONS` and returns the patched record.
///
/// Nothing is applied when any immutable field would change. Keys that are in
/// neither set are ignored.
pub fn apply_patch<T: Document>(stored: &T, patch: &Map<String, Value>) -> Result<T, AppError> {
    let permissions = T::PERMISSIONS;

    let mut document = serde_json::to_value(stored)
        .map_err(|e| anyhow::anyhow!("failed to serialize {}: {}", permissions.entity, e))?;
    let fields = document
        .as_object_mut()
        .ok_or_else(|| anyhow::anyhow!("{} is not a JSON object", permissions.entity))?;

    let rejected = permissions.attempted_immutable_updates(fields, patch);
    if !rejected.is_empty() {
        return Err(AppError::ImmutableFields(rejected));
    }

    for (key, value) in patch {
        if permissions.is_editable(key) {
            fields.insert(key.clone(), value.clone());
        }
    }

    serde_json::from_value(document).map_err(|e| {
        AppError::InvalidInput(format!("invalid {} update: {}", permissions.entity, e))
    })
}

/// Convenience for callers that need to know whether a field was touched.
pub fn patch_touches(patch: &Map<String, Value>, fields: &[&str]) -> bool {
    fields.iter().any(|field| patch.contains_key(*field))
}
