//! Structural validation of untyped configuration documents.
//!
//! Checks run in a fixed order and stop at the first failure so callers
//! always see the most fundamental problem.

use serde_json::{Map, Value};

use crate::config::{CompositeConfig, ConfigError, RawTerritory};

/// Validates `raw` and, on success, decodes it into a [`CompositeConfig`].
///
/// The version value is only required to be present here; the exact
/// `"1.0"` check happens at load time.
pub fn validate_config(raw: &Value) -> Result<CompositeConfig, ConfigError> {
    let root = raw.as_object().ok_or(ConfigError::NotAnObject)?;

    if !root.get("version").is_some_and(is_present) {
        return Err(ConfigError::MissingVersion);
    }

    let has_atlas_id = root
        .get("metadata")
        .and_then(Value::as_object)
        .and_then(|m| m.get("atlasId"))
        .is_some_and(is_present);
    if !has_atlas_id {
        return Err(ConfigError::MissingAtlasId);
    }

    let territories = root
        .get("territories")
        .and_then(Value::as_array)
        .ok_or(ConfigError::MissingTerritories)?;
    if territories.is_empty() {
        return Err(ConfigError::NoTerritories);
    }

    for (index, territory) in territories.iter().enumerate() {
        check_territory(index, territory)?;
    }

    serde_json::from_value(raw.clone()).map_err(|e| ConfigError::Malformed(e.to_string()))
}

fn check_territory(index: usize, value: &Value) -> Result<(), ConfigError> {
    let empty = Map::new();
    let obj = value.as_object().unwrap_or(&empty);

    let Some(code) = obj.get("code").and_then(Value::as_str).filter(|c| !c.is_empty()) else {
        return Err(ConfigError::MissingTerritoryCode {
            index,
            territory: value.to_string(),
        });
    };

    let nested = obj
        .get("projection")
        .and_then(Value::as_object)
        .is_some_and(|p| has(p, "id") && has(p, "parameters"));
    let legacy = has(obj, "projectionId") && has(obj, "parameters");
    let by_family = has(obj, "projectionFamily") && has(obj, "parameters");
    if !(nested || legacy || by_family) {
        return Err(ConfigError::MissingProjection {
            code: code.to_string(),
            available_fields: obj.keys().cloned().collect(),
        });
    }

    let Some(bounds) = obj.get("bounds").filter(|b| !b.is_null()) else {
        return Err(ConfigError::MissingBounds {
            code: code.to_string(),
        });
    };
    if serde_json::from_value::<[[f64; 2]; 2]>(bounds.clone()).is_err() {
        return Err(ConfigError::InvalidBounds {
            code: code.to_string(),
        });
    }

    // Shape is known-good; decode once more to surface type errors per territory.
    serde_json::from_value::<RawTerritory>(value.clone())
        .map(|_| ())
        .map_err(|e| ConfigError::Malformed(format!("territory {code}: {e}")))
}

fn has(obj: &Map<String, Value>, key: &str) -> bool {
    obj.get(key).is_some_and(is_present)
}

fn is_present(v: &Value) -> bool {
    match v {
        Value::Null | Value::Bool(false) => false,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        _ => true,
    }
}
