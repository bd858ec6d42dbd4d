//! Value conversions applied by field descriptors.
//!
//! A [`Transform`] runs on the raw value when a field is read and on the caller's value
//! when it is written, so every transform here accepts both shapes: `to_int` turns `"4"`
//! into `4` and leaves `4` as `4`. Transforms that are not symmetric (hashing, for
//! example) do not fit this model; the stored value would be transformed again on read.

use bson::{Bson, DateTime};
use chrono::Utc;
use std::sync::Arc;

use crate::error::{ModelError, ModelResult};

/// A shared conversion function applied on both the read and write paths of a field.
pub type Transform = Arc<dyn Fn(Bson) -> ModelResult<Bson> + Send + Sync>;

// i64 spans [-2^63, 2^63)
const I64_RANGE: std::ops::Range<f64> = -9_223_372_036_854_775_808.0..9_223_372_036_854_775_808.0;

/// Returns the value unchanged.
pub fn identity(value: Bson) -> ModelResult<Bson> {
    Ok(value)
}

/// Converts strings, 32/64-bit integers and integral doubles to a 64-bit integer.
pub fn to_int(value: Bson) -> ModelResult<Bson> {
    match value {
        Bson::Int64(v) => Ok(Bson::Int64(v)),
        Bson::Int32(v) => Ok(Bson::Int64(v as i64)),
        Bson::Double(v) if v.fract() == 0.0 && I64_RANGE.contains(&v) => Ok(Bson::Int64(v as i64)),
        Bson::Double(v) if v.fract() == 0.0 => Err(ModelError::Transform(format!(
            "{v} is out of range for a 64-bit integer"
        ))),
        Bson::String(s) => s
            .trim()
            .parse::<i64>()
            .map(Bson::Int64)
            .map_err(|e| ModelError::Transform(format!("invalid integer {s:?}: {e}"))),
        other => Err(unsupported("an integer", &other)),
    }
}

/// Converts strings and numbers to a double.
pub fn to_double(value: Bson) -> ModelResult<Bson> {
    match value {
        Bson::Double(v) => Ok(Bson::Double(v)),
        Bson::Int32(v) => Ok(Bson::Double(v as f64)),
        Bson::Int64(v) => Ok(Bson::Double(v as f64)),
        Bson::String(s) => s
            .trim()
            .parse::<f64>()
            .map(Bson::Double)
            .map_err(|e| ModelError::Transform(format!("invalid number {s:?}: {e}"))),
        other => Err(unsupported("a double", &other)),
    }
}

/// Renders a value as a string. Object ids become their hex form.
pub fn to_string(value: Bson) -> ModelResult<Bson> {
    Ok(Bson::String(match value {
        Bson::String(s) => s,
        Bson::ObjectId(oid) => oid.to_hex(),
        Bson::Int32(v) => v.to_string(),
        Bson::Int64(v) => v.to_string(),
        Bson::Double(v) => v.to_string(),
        Bson::Boolean(v) => v.to_string(),
        Bson::DateTime(v) => v
            .try_to_rfc3339_string()
            .map_err(|e| ModelError::Transform(e.to_string()))?,
        other => other.to_string(),
    }))
}

/// Converts booleans, `"true"`/`"false"` strings and 0/1 integers to a boolean.
pub fn to_bool(value: Bson) -> ModelResult<Bson> {
    match value {
        Bson::Boolean(v) => Ok(Bson::Boolean(v)),
        Bson::Int32(v @ (0 | 1)) => Ok(Bson::Boolean(v == 1)),
        Bson::Int64(v @ (0 | 1)) => Ok(Bson::Boolean(v == 1)),
        Bson::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(Bson::Boolean(true)),
            "false" => Ok(Bson::Boolean(false)),
            _ => Err(ModelError::Transform(format!("invalid boolean {s:?}"))),
        },
        other => Err(unsupported("a boolean", &other)),
    }
}

/// Converts RFC 3339 strings and epoch milliseconds to a BSON datetime.
pub fn to_datetime(value: Bson) -> ModelResult<Bson> {
    match value {
        Bson::DateTime(v) => Ok(Bson::DateTime(v)),
        Bson::Int64(millis) => Ok(Bson::DateTime(DateTime::from_millis(millis))),
        Bson::String(s) => chrono::DateTime::parse_from_rfc3339(s.trim())
            .map(|parsed| Bson::DateTime(DateTime::from_chrono(parsed.with_timezone(&Utc))))
            .map_err(|e| ModelError::Transform(format!("invalid datetime {s:?}: {e}"))),
        other => Err(unsupported("a datetime", &other)),
    }
}

fn unsupported(target: &str, value: &Bson) -> ModelError {
    ModelError::Transform(format!(
        "cannot convert {:?} value to {target}",
        value.element_type()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::oid::ObjectId;

    #[test]
    fn to_int_accepts_both_raw_and_caller_shapes() {
        assert_eq!(to_int(Bson::String("4".into())).unwrap(), Bson::Int64(4));
        assert_eq!(to_int(Bson::Int32(4)).unwrap(), Bson::Int64(4));
        assert_eq!(to_int(Bson::Int64(4)).unwrap(), Bson::Int64(4));
        assert_eq!(to_int(Bson::Double(4.0)).unwrap(), Bson::Int64(4));
    }

    #[test]
    fn to_int_rejects_garbage() {
        assert!(matches!(
            to_int(Bson::String("four".into())),
            Err(ModelError::Transform(_))
        ));
        assert!(matches!(to_int(Bson::Double(4.5)), Err(ModelError::Transform(_))));
        assert!(matches!(to_int(Bson::Null), Err(ModelError::Transform(_))));
    }

    #[test]
    fn to_int_rejects_doubles_outside_i64() {
        assert!(matches!(to_int(Bson::Double(1e20)), Err(ModelError::Transform(_))));
        assert!(matches!(to_int(Bson::Double(-1e20)), Err(ModelError::Transform(_))));
        assert!(matches!(to_int(Bson::Double(f64::INFINITY)), Err(ModelError::Transform(_))));
        assert_eq!(
            to_int(Bson::Double(-9_223_372_036_854_775_808.0)).unwrap(),
            Bson::Int64(i64::MIN)
        );
    }

    #[test]
    fn to_string_renders_object_ids_as_hex() {
        let oid = ObjectId::parse_str("657072b56731c9e580e9dd6f").unwrap();

        assert_eq!(
            to_string(Bson::ObjectId(oid)).unwrap(),
            Bson::String("657072b56731c9e580e9dd6f".into())
        );
        assert_eq!(to_string(Bson::Int32(11)).unwrap(), Bson::String("11".into()));
    }

    #[test]
    fn to_bool_parses_strings_and_flags() {
        assert_eq!(to_bool(Bson::String("True".into())).unwrap(), Bson::Boolean(true));
        assert_eq!(to_bool(Bson::Int32(0)).unwrap(), Bson::Boolean(false));
        assert!(to_bool(Bson::Int32(2)).is_err());
    }

    #[test]
    fn to_datetime_parses_rfc3339() {
        let parsed = to_datetime(Bson::String("2019-07-03T18:00:00Z".into())).unwrap();

        assert_eq!(parsed, Bson::DateTime(DateTime::from_millis(1562176800000)));
        assert_eq!(to_datetime(parsed.clone()).unwrap(), parsed);
    }

    #[test]
    fn to_double_parses_strings() {
        assert_eq!(to_double(Bson::String("2.5".into())).unwrap(), Bson::Double(2.5));
        assert_eq!(to_double(Bson::Int32(2)).unwrap(), Bson::Double(2.0));
    }
}
