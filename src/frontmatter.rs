//! Leading YAML metadata block of a note, plus the loose value semantics
//! the derived reports rely on (truthiness, date-ish strings).

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_yaml::Value;
use std::collections::BTreeMap;

/// String-keyed frontmatter values.
pub type Frontmatter = BTreeMap<String, Value>;

const DELIMITER: &str = "---";

/// Parse the `---` delimited block at the very start of `body`.
///
/// The body is left untouched. Anything that is not a well-formed mapping
/// (no block, unclosed block, invalid YAML, a scalar document) yields an
/// empty mapping.
pub fn extract_frontmatter(body: &str) -> Frontmatter {
    let Some(yaml) = frontmatter_block(body) else {
        return Frontmatter::new();
    };
    if yaml.trim().is_empty() {
        return Frontmatter::new();
    }
    match serde_yaml::from_str::<Frontmatter>(yaml) {
        Ok(map) => map,
        Err(e) => {
            tracing::debug!("Ignoring unparseable frontmatter: {}", e);
            Frontmatter::new()
        }
    }
}

/// Raw text between the opening and closing delimiter lines.
fn frontmatter_block(body: &str) -> Option<&str> {
    let mut lines = body.split_inclusive('\n');
    let first = lines.next()?;
    if first.trim_end() != DELIMITER {
        return None;
    }
    let start = first.len();
    let mut offset = start;
    for line in lines {
        if line.trim_end() == DELIMITER {
            return Some(&body[start..offset]);
        }
        offset += line.len();
    }
    None
}

/// JavaScript-style truthiness of an optional frontmatter value.
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Tagged(tagged)) => is_truthy(Some(&tagged.value)),
        Some(Value::Sequence(_)) | Some(Value::Mapping(_)) => true,
    }
}

/// Interpret a frontmatter value as a point in time.
///
/// Date-only and zone-less values are taken as UTC; integers are
/// milliseconds since the Unix epoch.
pub fn parse_date_value(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_date_str(s),
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        Value::Tagged(tagged) => parse_date_value(&tagged.value),
        _ => None,
    }
}

fn parse_date_str(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_extracts_leading_block() {
        let body = "---\npublish: true\nread: 2024-02-01\nthumbnail: https://x/y.jpg\n---\n# Dune\n";
        let fm = extract_frontmatter(body);
        assert_eq!(fm.get("publish"), Some(&Value::Bool(true)));
        assert_eq!(
            fm.get("read").and_then(Value::as_str),
            Some("2024-02-01")
        );
        assert_eq!(fm.len(), 3);
    }

    #[test]
    fn test_block_must_start_the_body() {
        let body = "# Title\n---\npublish: true\n---\n";
        assert!(extract_frontmatter(body).is_empty());
    }

    #[test]
    fn test_unclosed_or_invalid_block_is_empty() {
        assert!(extract_frontmatter("---\npublish: true\n# never closed").is_empty());
        assert!(extract_frontmatter("---\n: : [\n---\n").is_empty());
        assert!(extract_frontmatter("---\njust a scalar\n---\n").is_empty());
        assert!(extract_frontmatter("").is_empty());
    }

    #[test]
    fn test_crlf_block() {
        let fm = extract_frontmatter("---\r\npublish: yes-please\r\n---\r\nbody");
        assert!(is_truthy(fm.get("publish")));
    }

    #[test]
    fn test_truthiness() {
        assert!(!is_truthy(None));
        assert!(!is_truthy(Some(&Value::Null)));
        assert!(!is_truthy(Some(&Value::Bool(false))));
        assert!(!is_truthy(Some(&Value::from(0))));
        assert!(!is_truthy(Some(&Value::from(""))));
        assert!(is_truthy(Some(&Value::from("false"))));
        assert!(is_truthy(Some(&Value::from(2))));
        assert!(is_truthy(Some(&Value::Sequence(vec![]))));
    }

    #[test]
    fn test_date_values() {
        let day = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        assert_eq!(parse_date_value(&Value::from("2024-02-01")), Some(day));
        assert_eq!(
            parse_date_value(&Value::from("2024-02-01T08:30:00+10:00")),
            Some(Utc.with_ymd_and_hms(2024, 1, 31, 22, 30, 0).unwrap())
        );
        assert_eq!(
            parse_date_value(&Value::from("2024-02-01 08:30")),
            Some(Utc.with_ymd_and_hms(2024, 2, 1, 8, 30, 0).unwrap())
        );
        assert_eq!(parse_date_value(&Value::from("someday")), None);
        assert_eq!(parse_date_value(&Value::Bool(true)), None);
    }
}
