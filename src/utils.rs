use crate::error::{ResolverError, Result};
use serde::{de, Deserialize, Deserializer};

/// Identifier value meaning "no parent" (for `parent_tid`) or "not applicable" (for `uid`).
pub const NULL_ID: &str = "0";

/// The API is loosely typed: identifiers and amounts arrive as strings, numbers or null.
#[derive(Deserialize)]
#[serde(untagged)]
enum LooseScalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Null,
}

pub fn is_null_id(id: &str) -> bool {
    id.trim() == NULL_ID
}

/// Parses a whole-currency-unit amount. Empty text counts as zero.
pub fn parse_amount(field: &str, raw: &str) -> Result<i64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(0);
    }

    if let Ok(value) = trimmed.parse::<i64>() {
        return Ok(value);
    }

    match trimmed.parse::<f64>() {
        Ok(value) => amount_from_float(field, value),
        Err(_) => Err(ResolverError::InvalidValue {
            field: field.to_string(),
            value: raw.to_string(),
        }),
    }
}

fn amount_from_float(field: &str, value: f64) -> Result<i64> {
    // Values are integral currency units; 300.0 is accepted, 300.5 is not.
    if value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Ok(value as i64)
    } else {
        Err(ResolverError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
        })
    }
}

/// Reads `displayLevel` as a non-negative depth. Returns `None` for anything unparseable.
pub fn parse_display_level(raw: &str) -> Option<u32> {
    raw.trim().parse::<u32>().ok()
}

/// Reads a loosely typed identifier. `None` for null or blank input.
fn loose_identifier<E: de::Error>(value: LooseScalar) -> std::result::Result<Option<String>, E> {
    match value {
        LooseScalar::Text(s) => {
            let trimmed = s.trim();
            Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
        }
        LooseScalar::Int(i) => Ok(Some(i.to_string())),
        LooseScalar::Float(f) if f.fract() == 0.0 => Ok(Some((f as i64).to_string())),
        LooseScalar::Null => Ok(None),
        LooseScalar::Float(f) => Err(E::custom(format!("invalid identifier: {}", f))),
        LooseScalar::Bool(b) => Err(E::custom(format!("invalid identifier: {}", b))),
    }
}

/// A line item's own `tid`. Null or blank is rejected: it would collide with the root marker.
pub fn deserialize_tid<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    loose_identifier::<D::Error>(LooseScalar::deserialize(deserializer)?)?
        .ok_or_else(|| de::Error::custom("tid must not be null or empty"))
}

/// `parent_tid`: null or blank means the line item has no parent.
pub fn deserialize_parent_tid<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(loose_identifier::<D::Error>(LooseScalar::deserialize(deserializer)?)?
        .unwrap_or_else(|| NULL_ID.to_string()))
}

/// `uid`: null or blank stays empty and applicable. Only an explicit `"0"` is the inapplicable marker.
pub fn deserialize_uid<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(loose_identifier::<D::Error>(LooseScalar::deserialize(deserializer)?)?.unwrap_or_default())
}

/// Free text that the API sometimes sends as a number. `null` becomes empty.
pub fn deserialize_text<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match LooseScalar::deserialize(deserializer)? {
        LooseScalar::Text(s) => Ok(s.trim().to_string()),
        LooseScalar::Int(i) => Ok(i.to_string()),
        LooseScalar::Float(f) => Ok(f.to_string()),
        LooseScalar::Bool(b) => Ok(b.to_string()),
        LooseScalar::Null => Ok(String::new()),
    }
}

pub fn deserialize_amount<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match LooseScalar::deserialize(deserializer)? {
        LooseScalar::Int(i) => Ok(i),
        LooseScalar::Null => Ok(0),
        LooseScalar::Float(f) => amount_from_float("amount", f).map_err(de::Error::custom),
        LooseScalar::Text(s) => parse_amount("amount", &s).map_err(de::Error::custom),
        LooseScalar::Bool(b) => Err(de::Error::custom(format!("invalid amount: {}", b))),
    }
}

pub fn deserialize_flag<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match LooseScalar::deserialize(deserializer)? {
        LooseScalar::Bool(b) => Ok(b),
        LooseScalar::Null => Ok(false),
        LooseScalar::Int(i) => Ok(i != 0),
        LooseScalar::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" | "" => Ok(false),
            other => Err(de::Error::custom(format!("invalid flag: {}", other))),
        },
        LooseScalar::Float(f) => Err(de::Error::custom(format!("invalid flag: {}", f))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("valueAssigned", "1200").unwrap(), 1200);
        assert_eq!(parse_amount("valueAssigned", " -45 ").unwrap(), -45);
        assert_eq!(parse_amount("valueAssigned", "300.0").unwrap(), 300);
        assert_eq!(parse_amount("valueAssigned", "").unwrap(), 0);

        let err = parse_amount("valueAssigned", "12.5").unwrap_err();
        assert!(matches!(err, ResolverError::InvalidValue { .. }));
        assert!(parse_amount("valueAssigned", "abc").is_err());
    }

    #[derive(Debug, Deserialize)]
    struct Ids {
        #[serde(default, deserialize_with = "deserialize_tid")]
        tid: String,
        #[serde(default, deserialize_with = "deserialize_parent_tid")]
        parent: String,
        #[serde(default, deserialize_with = "deserialize_uid")]
        uid: String,
    }

    #[test]
    fn test_identifier_deserializers() {
        let ids: Ids =
            serde_json::from_str(r#"{"tid": " 42 ", "parent": null, "uid": ""}"#).unwrap();
        assert_eq!(ids.tid, "42");
        assert_eq!(ids.parent, "0");
        assert_eq!(ids.uid, "");

        let ids: Ids = serde_json::from_str(r#"{"tid": 7.0, "parent": "", "uid": " 0 "}"#).unwrap();
        assert_eq!(ids.tid, "7");
        assert_eq!(ids.parent, "0");
        assert_eq!(ids.uid, "0");

        assert!(serde_json::from_str::<Ids>(r#"{"tid": null}"#).is_err());
        assert!(serde_json::from_str::<Ids>(r#"{"tid": "  "}"#).is_err());
        assert!(serde_json::from_str::<Ids>(r#"{"tid": true}"#).is_err());
    }

    #[test]
    fn test_is_null_id() {
        assert!(is_null_id("0"));
        assert!(is_null_id(" 0"));
        assert!(!is_null_id("10"));
    }

    #[test]
    fn test_parse_display_level() {
        assert_eq!(parse_display_level("2"), Some(2));
        assert_eq!(parse_display_level(" 0 "), Some(0));
        assert_eq!(parse_display_level("-1"), None);
        assert_eq!(parse_display_level("top"), None);
    }
}
