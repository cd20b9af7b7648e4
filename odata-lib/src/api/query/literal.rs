//! OData literal rendering.
//!
//! Typed values map straight onto their literal forms. Strings are quoted
//! unless they already look like a literal the service expects bare: a typed
//! literal (`datetime'2010-01-01T00:00'`, `Namespace.Color'Red'`) or an ISO
//! 8601 date/datetime, plain or percent-encoded. The datetime check is a shape
//! match, so arbitrary strings that decode into a date are emitted bare too.

use chrono::DateTime;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use chrono::SecondsFormat;

use crate::model::Value;

/// Renders a value as an OData literal.
pub fn prepare_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => if *b { "true" } else { "false" }.to_string(),
        Value::Int(n) => n.to_string(),
        Value::Long(n) => n.to_string(),
        Value::Float(n) => float_literal(*n),
        Value::Decimal(d) => d.to_string(),
        Value::String(s) => string_literal(s),
        Value::Guid(g) => g.to_string(),
        Value::DateTime(dt) => dt.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        Value::Date(d) => d.format("%Y-%m-%d").to_string(),
        Value::Json(json) => match json {
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => json.to_string(),
            scalar => prepare_value(&Value::from_json(scalar.clone())),
        },
        // Structured values only appear in 4.01 JSON-literal positions.
        Value::Record(_) | Value::Records(_) => {
            serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
        }
    }
}

/// Renders a string value, quoting it unless it is already a bare literal.
pub fn string_literal(s: &str) -> String {
    if is_typed_literal(s) || is_iso_datetime(s) {
        s.to_string()
    } else {
        escape_string(s)
    }
}

/// Escapes a string for use in OData queries.
///
/// OData strings are enclosed in single quotes, with internal single quotes doubled.
pub fn escape_string(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Returns `true` for `prefix'body'` literals where `prefix` is an identifier
/// or a dotted qualified name.
pub fn is_typed_literal(s: &str) -> bool {
    let Some(open) = s.find('\'') else {
        return false;
    };
    let prefix = &s[..open];
    let rest = &s[open + 1..];

    let starts_ok = prefix.chars().next().is_some_and(|c| c.is_ascii_alphabetic());
    let prefix_ok = starts_ok
        && prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_')
        && !prefix.ends_with('.');

    let Some(body) = rest.strip_suffix('\'') else {
        return false;
    };
    prefix_ok && quotes_doubled(body)
}

/// Every `'` inside a literal body must be escaped as `''`.
fn quotes_doubled(body: &str) -> bool {
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c == '\'' && chars.next() != Some('\'') {
            return false;
        }
    }
    true
}

/// Characters that end or alter a query option value.
pub(crate) const QUERY_RESERVED: &[char] = &['%', '&', '+', '#'];

/// Characters that end a path segment early.
pub(crate) const PATH_RESERVED: &[char] = &['%', '#', '?'];

/// Percent-encodes the `reserved` characters of `s`.
///
/// A `%` that already starts a `%XX` escape is kept, so pre-encoded literals
/// pass through unchanged. Everything else is left for the URL parser.
pub(crate) fn encode_reserved(s: &str, reserved: &[char]) -> String {
    let mut out = String::with_capacity(s.len());
    let mut buf = [0u8; 4];
    for (i, c) in s.char_indices() {
        let escaped = c == '%' && is_escape(&s[i..]);
        if reserved.contains(&c) && !escaped {
            out.push_str(&urlencoding::encode(c.encode_utf8(&mut buf)));
        } else {
            out.push(c);
        }
    }
    out
}

fn is_escape(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() >= 3 && bytes[1].is_ascii_hexdigit() && bytes[2].is_ascii_hexdigit()
}

/// Returns `true` if the string, after percent-decoding, has the shape of an
/// ISO 8601 date or datetime.
pub fn is_iso_datetime(s: &str) -> bool {
    match urlencoding::decode(s) {
        Ok(decoded) => has_iso_shape(decoded.trim()),
        Err(_) => has_iso_shape(s.trim()),
    }
}

fn has_iso_shape(s: &str) -> bool {
    let bytes = s.as_bytes();
    let date_shape = bytes.len() >= 10
        && bytes[..4].iter().all(u8::is_ascii_digit)
        && bytes[4] == b'-'
        && bytes[5..7].iter().all(u8::is_ascii_digit)
        && bytes[7] == b'-'
        && bytes[8..10].iter().all(u8::is_ascii_digit);
    if !date_shape {
        return false;
    }

    if bytes.len() == 10 {
        return NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok();
    }

    DateTime::parse_from_rfc3339(s).is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M").is_ok()
}

/// Floats always carry a decimal point or exponent so the service reads them
/// as Edm.Double.
fn float_literal(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "INF" } else { "-INF" }.to_string();
    }
    let s = n.to_string();
    if s.contains('.') || s.contains('e') || s.contains('E') {
        s
    } else {
        format!("{}.0", s)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;

    #[test]
    fn test_quoting_law() {
        assert_eq!(prepare_value(&Value::from("hello")), "'hello'");
        assert_eq!(prepare_value(&Value::from(5)), "5");
        assert_eq!(prepare_value(&Value::from(true)), "true");
        assert_eq!(prepare_value(&Value::from(false)), "false");
        assert_eq!(prepare_value(&Value::Null), "null");
    }

    #[test]
    fn test_escape_string() {
        assert_eq!(escape_string("O'Brien"), "'O''Brien'");
        assert_eq!(prepare_value(&Value::from("O'Brien")), "'O''Brien'");
    }

    #[test]
    fn test_numeric_strings_stay_quoted() {
        assert_eq!(prepare_value(&Value::from("42")), "'42'");
    }

    #[test]
    fn test_floats() {
        assert_eq!(prepare_value(&Value::from(2.0)), "2.0");
        assert_eq!(prepare_value(&Value::from(2.5)), "2.5");
        assert_eq!(prepare_value(&Value::Float(f64::NAN)), "NaN");
        assert_eq!(prepare_value(&Value::Float(f64::NEG_INFINITY)), "-INF");
    }

    #[test]
    fn test_typed_literals_pass_through() {
        assert_eq!(
            prepare_value(&Value::from("datetime'2010-01-01T00:00'")),
            "datetime'2010-01-01T00:00'"
        );
        assert_eq!(
            prepare_value(&Value::from("guid'c2a3c4a5-0000-4000-8000-000000000001'")),
            "guid'c2a3c4a5-0000-4000-8000-000000000001'"
        );
        assert_eq!(
            prepare_value(&Value::from("Microsoft.OData.SampleService.Models.TripPin.PersonGender'Female'")),
            "Microsoft.OData.SampleService.Models.TripPin.PersonGender'Female'"
        );
    }

    #[test]
    fn test_not_typed_literals() {
        assert!(!is_typed_literal("Bob's"));
        assert!(!is_typed_literal("'quoted'"));
        assert!(!is_typed_literal("1abc'x'"));
        assert!(!is_typed_literal("Name.'x'"));
        assert!(!is_typed_literal("two words'x'"));
        assert_eq!(prepare_value(&Value::from("Bob's")), "'Bob''s'");
    }

    #[test]
    fn test_encoded_datetime_is_bare_and_unchanged() {
        let encoded = "2020-01-01T00%3A00%3A00Z";
        assert!(is_iso_datetime(encoded));
        assert_eq!(prepare_value(&Value::from(encoded)), encoded);

        let with_offset = "2020-01-01T10%3A30%3A00%2B02%3A00";
        assert_eq!(prepare_value(&Value::from(with_offset)), with_offset);
    }

    #[test]
    fn test_plain_iso_date_is_bare() {
        assert_eq!(
            prepare_value(&Value::from("2020-01-01T00:00:00Z")),
            "2020-01-01T00:00:00Z"
        );
        assert_eq!(prepare_value(&Value::from("2020-01-01")), "2020-01-01");
        assert_eq!(
            prepare_value(&Value::from("2020-01-01T08:15")),
            "2020-01-01T08:15"
        );
    }

    #[test]
    fn test_date_like_but_invalid_is_quoted() {
        assert_eq!(prepare_value(&Value::from("2020-13-45")), "'2020-13-45'");
        assert_eq!(prepare_value(&Value::from("2020-01-01 tea")), "'2020-01-01 tea'");
        assert_eq!(prepare_value(&Value::from("20200101")), "'20200101'");
    }

    #[test]
    fn test_typed_temporal_values() {
        let dt = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        assert_eq!(prepare_value(&Value::from(dt)), "2024-03-01T10:00:00Z");

        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(prepare_value(&Value::from(date)), "2024-03-01");
    }

    #[test]
    fn test_guid_is_bare() {
        let id = Uuid::parse_str("c2a3c4a5-0000-4000-8000-000000000001").unwrap();
        assert_eq!(
            prepare_value(&Value::from(id)),
            "c2a3c4a5-0000-4000-8000-000000000001"
        );
    }

    #[test]
    fn test_typed_literal_with_stray_quotes_is_quoted() {
        assert!(!is_typed_literal("guid'x' or Secret eq 'y'"));
        assert_eq!(
            string_literal("guid'x' or Secret eq 'y'"),
            "'guid''x'' or Secret eq ''y'''"
        );
        assert!(!is_typed_literal("Bob's Diner'"));
        assert_eq!(string_literal("Bob's Diner'"), "'Bob''s Diner'''");
    }

    #[test]
    fn test_typed_literal_with_doubled_quotes() {
        assert!(is_typed_literal("Namespace.Color'O''Neil'"));
        assert!(is_typed_literal("binary''"));
    }

    #[test]
    fn test_encode_reserved() {
        assert_eq!(encode_reserved("Name eq 'C#'", QUERY_RESERVED), "Name eq 'C%23'");
        assert_eq!(encode_reserved("'A&B=1'", QUERY_RESERVED), "'A%26B=1'");
        assert_eq!(encode_reserved("'a+b'", QUERY_RESERVED), "'a%2Bb'");
        assert_eq!(encode_reserved("'100%'", QUERY_RESERVED), "'100%25'");
        assert_eq!(
            encode_reserved("2024-01-01T00%3A00%3A00Z", QUERY_RESERVED),
            "2024-01-01T00%3A00%3A00Z"
        );
        assert_eq!(encode_reserved("('a?b')", PATH_RESERVED), "('a%3Fb')");
    }
}
