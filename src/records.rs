//! Validates a record's shape against its series' schema (SPEC_FULL.md §4)
//! and extracts the key a delete targets.
//!
//! Small free functions pull one field at a time out of a `serde_json::Value`
//! and turn absence/type mismatch into a typed error, rather than a single
//! monolithic `Deserialize` impl, since shapes differ enough across series
//! (and within a series' optional fields) that a field-at-a-time approach
//! gives more precise errors. Validation failures never abort an update;
//! the driver turns them into `on_parse_error` callbacks and skips the
//! record.

use crate::error::ValidationError;
use crate::series::{Series, SeriesKey};
use serde_json::Value;

/// Validates a full add/change record's shape for `series`. Returns `Ok(())`
/// if every required field is present with the right shape; open-enum string
/// fields (pos/field/misc/dial/name-type/radical-position, SPEC_FULL.md §4)
/// accept any non-empty string and are not checked against a fixed set.
pub fn validate_add_or_change(series: Series, value: &Value) -> Result<(), ValidationError> {
    let obj = as_object(value)?;
    match series {
        Series::Words => validate_word(obj),
        Series::Kanji => validate_kanji(obj),
        Series::Names => validate_name(obj),
        Series::Radicals => validate_radical(obj),
    }
}

/// Extracts and validates the key a delete record targets. Delete records
/// carry only the key (SPEC_FULL.md §4), so nothing else is checked.
pub fn validate_delete(series: Series, value: &Value) -> Result<SeriesKey, ValidationError> {
    extract_key_from_object(series, as_object(value)?)
}

/// Extracts the key from a full add/change record, after it has already
/// passed [`validate_add_or_change`].
pub fn extract_key(series: Series, value: &Value) -> Result<SeriesKey, ValidationError> {
    extract_key_from_object(series, as_object(value)?)
}

fn as_object(value: &Value) -> Result<&serde_json::Map<String, Value>, ValidationError> {
    value.as_object().ok_or(ValidationError::WrongType { field: "<record>" })
}

fn extract_key_from_object(
    series: Series,
    obj: &serde_json::Map<String, Value>,
) -> Result<SeriesKey, ValidationError> {
    match series {
        Series::Radicals => {
            let id = required_string(obj, "id")?;
            Ok(SeriesKey::Str(id.to_string()))
        }
        Series::Kanji => {
            let id = required_u64(obj, "id")?;
            Ok(SeriesKey::Codepoint(id as u32))
        }
        Series::Words | Series::Names => {
            let id = required_u64(obj, "id")?;
            Ok(SeriesKey::Id(id as u32))
        }
    }
}

fn required(obj: &serde_json::Map<String, Value>, field: &'static str) -> Result<&Value, ValidationError> {
    obj.get(field).ok_or(ValidationError::MissingField(field))
}

fn required_u64(obj: &serde_json::Map<String, Value>, field: &'static str) -> Result<u64, ValidationError> {
    required(obj, field)?
        .as_u64()
        .ok_or(ValidationError::WrongType { field })
}

fn required_string<'a>(
    obj: &'a serde_json::Map<String, Value>,
    field: &'static str,
) -> Result<&'a str, ValidationError> {
    let s = required(obj, field)?
        .as_str()
        .ok_or(ValidationError::WrongType { field })?;
    if s.is_empty() {
        return Err(ValidationError::EmptyString(field));
    }
    Ok(s)
}

fn required_array<'a>(
    obj: &'a serde_json::Map<String, Value>,
    field: &'static str,
) -> Result<&'a Vec<Value>, ValidationError> {
    required(obj, field)?
        .as_array()
        .ok_or(ValidationError::WrongType { field })
}

fn required_u64_at_least(
    obj: &serde_json::Map<String, Value>,
    field: &'static str,
    min: i64,
) -> Result<u64, ValidationError> {
    let actual = required_u64(obj, field)?;
    if (actual as i64) < min {
        return Err(ValidationError::BelowMinimum {
            field,
            min,
            actual: actual as i64,
        });
    }
    Ok(actual)
}

/// `k`/`r` array entries may be a metadata object or the integer sentinel `0`
/// for partitioned snapshots (SPEC_FULL.md §4). Anything else is invalid.
fn validate_meta_entry(field: &'static str, entry: &Value) -> Result<(), ValidationError> {
    match entry {
        Value::Object(_) => Ok(()),
        Value::Number(n) if n.as_u64() == Some(0) => Ok(()),
        _ => Err(ValidationError::WrongType { field }),
    }
}

fn validate_string_array(field: &'static str, value: &Value) -> Result<(), ValidationError> {
    let array = value.as_array().ok_or(ValidationError::WrongType { field })?;
    for item in array {
        if item.as_str().is_none() {
            return Err(ValidationError::WrongType { field });
        }
    }
    Ok(())
}

fn validate_word(obj: &serde_json::Map<String, Value>) -> Result<(), ValidationError> {
    required_u64_at_least(obj, "id", 1)?;

    for entry in required_array(obj, "k")? {
        validate_meta_entry("k", entry)?;
    }
    for entry in required_array(obj, "r")? {
        validate_meta_entry("r", entry)?;
    }

    for sense in required_array(obj, "s")? {
        let sense = sense.as_object().ok_or(ValidationError::WrongType { field: "s" })?;
        if let Some(pos) = sense.get("pos") {
            validate_string_array("pos", pos)?;
        }
        if let Some(field) = sense.get("field") {
            validate_string_array("field", field)?;
        }
        if let Some(misc) = sense.get("misc") {
            validate_string_array("misc", misc)?;
        }
        if let Some(dial) = sense.get("dial") {
            validate_string_array("dial", dial)?;
        }
        let glosses = sense
            .get("gloss")
            .and_then(Value::as_array)
            .ok_or(ValidationError::MissingField("gloss"))?;
        for gloss in glosses {
            if !gloss.is_object() && !gloss.is_string() {
                return Err(ValidationError::WrongType { field: "gloss" });
            }
        }
    }

    Ok(())
}

fn validate_kanji(obj: &serde_json::Map<String, Value>) -> Result<(), ValidationError> {
    required_u64(obj, "id")?;

    let c = required_string(obj, "c")?;
    if c.chars().count() != 1 {
        return Err(ValidationError::WrongType { field: "c" });
    }

    let readings = required(obj, "r")?
        .as_object()
        .ok_or(ValidationError::WrongType { field: "r" })?;
    for key in ["on", "kun", "na"] {
        if let Some(value) = readings.get(key) {
            validate_string_array(key, value)?;
        }
    }

    validate_string_array("m", required(obj, "m")?)?;

    let rad = required(obj, "rad")?
        .as_object()
        .ok_or(ValidationError::WrongType { field: "rad" })?;
    required_u64(rad, "x")?;

    for stroke in required_array(obj, "strokes")? {
        let stroke = stroke.as_u64().ok_or(ValidationError::WrongType { field: "strokes" })?;
        if stroke < 1 {
            return Err(ValidationError::BelowMinimum {
                field: "strokes",
                min: 1,
                actual: stroke as i64,
            });
        }
    }

    Ok(())
}

fn validate_name(obj: &serde_json::Map<String, Value>) -> Result<(), ValidationError> {
    required_u64_at_least(obj, "id", 1)?;
    validate_string_array("k", required(obj, "k")?)?;

    let readings = required_array(obj, "r")?;
    if readings.is_empty() {
        return Err(ValidationError::EmptyString("r"));
    }
    for reading in readings {
        let reading = reading.as_str().ok_or(ValidationError::WrongType { field: "r" })?;
        if reading.is_empty() {
            return Err(ValidationError::EmptyString("r"));
        }
    }

    for translation in required_array(obj, "tr")? {
        let translation = translation
            .as_object()
            .ok_or(ValidationError::WrongType { field: "tr" })?;
        if let Some(ty) = translation.get("type") {
            validate_string_array("type", ty)?;
        }
        if let Some(det) = translation.get("det") {
            validate_string_array("det", det)?;
        }
    }

    Ok(())
}

fn validate_radical(obj: &serde_json::Map<String, Value>) -> Result<(), ValidationError> {
    required_string(obj, "id")?;
    required_u64(obj, "r")?;
    required_u64(obj, "s")?;
    validate_string_array("na", required(obj, "na")?)?;
    Ok(())
}
