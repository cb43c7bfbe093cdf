use anyhow::Result;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

/// Handles parsing timestamps from the formats found in raw dashboard records
pub struct TimestampParser;

impl TimestampParser {
    /// Parse a timestamp string into a DateTime<Utc>
    /// Handles Z suffix, offsets, naive datetimes and bare dates
    pub fn parse(timestamp_str: &str) -> Result<DateTime<Utc>> {
        let trimmed = timestamp_str.trim();

        // Handle both Z suffix and timezone info
        let timestamp = if trimmed.ends_with('Z') {
            trimmed.replace('Z', "+00:00")
        } else {
            trimmed.to_string()
        };

        if let Ok(dt) = DateTime::parse_from_rfc3339(&timestamp) {
            return Ok(dt.with_timezone(&Utc));
        }

        // Naive datetimes are assumed to be UTC
        for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(&timestamp, format) {
                return Ok(DateTime::from_naive_utc_and_offset(naive, Utc));
            }
        }

        if let Ok(date) = NaiveDate::parse_from_str(&timestamp, "%Y-%m-%d") {
            if let Some(naive) = date.and_hms_opt(0, 0, 0) {
                return Ok(naive.and_utc());
            }
        }

        anyhow::bail!("Failed to parse timestamp: {}", timestamp_str)
    }

    /// Best-effort conversion of an untyped JSON field.
    ///
    /// Strings go through [`TimestampParser::parse`], integers are read as
    /// epoch milliseconds. Anything else, including `null`, yields `None`.
    pub fn parse_value(value: Option<&Value>) -> Option<DateTime<Utc>> {
        match value? {
            Value::String(s) if !s.trim().is_empty() => Self::parse(s).ok(),
            Value::Number(n) => n
                .as_i64()
                .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_z_suffix() {
        let result = TimestampParser::parse("2024-01-01T12:00:00.000Z");
        assert!(result.is_ok());
    }

    #[test]
    fn test_parse_timezone() {
        let result = TimestampParser::parse("2024-01-01T12:00:00.000+02:00").unwrap();
        assert_eq!(result.to_rfc3339(), "2024-01-01T10:00:00+00:00");
    }

    #[test]
    fn test_parse_naive() {
        assert!(TimestampParser::parse("2024-01-01T12:00:00.000").is_ok());
        assert!(TimestampParser::parse("2024-01-01 12:00:00").is_ok());
    }

    #[test]
    fn test_parse_date_only() {
        let result = TimestampParser::parse("2024-03-05").unwrap();
        assert_eq!(result.to_rfc3339(), "2024-03-05T00:00:00+00:00");
    }

    #[test]
    fn test_parse_invalid() {
        assert!(TimestampParser::parse("invalid").is_err());
        assert!(TimestampParser::parse("2024-13-45").is_err());
    }

    #[test]
    fn test_parse_value_variants() {
        assert!(TimestampParser::parse_value(Some(&json!("2024-01-01T00:00:00Z"))).is_some());
        assert_eq!(
            TimestampParser::parse_value(Some(&json!(0))),
            Utc.timestamp_millis_opt(0).single()
        );
        assert!(TimestampParser::parse_value(Some(&json!(null))).is_none());
        assert!(TimestampParser::parse_value(Some(&json!(""))).is_none());
        assert!(TimestampParser::parse_value(Some(&json!({"nested": true}))).is_none());
        assert!(TimestampParser::parse_value(None).is_none());
    }
}
