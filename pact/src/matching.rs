//! Structural matching of observed HTTP traffic against contract expectations.
//!
//! Matching never short-circuits: every difference is collected as a
//! [`Mismatch`] carrying the location, the expectation and the actual value,
//! so a failed verification can be reported field by field.

use crate::contract::{Request, Response};
use crate::matcher::{Matcher, compile};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::collections::BTreeMap;
use std::fmt;

/// What part of the exchange a mismatch concerns.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum MismatchKind {
    /// HTTP method
    Method,
    /// Request path
    Path,
    /// Response status code
    Status,
    /// A header
    Header,
    /// The JSON body
    Body,
}

/// A single field-level difference.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Mismatch {
    /// Part of the exchange
    pub kind: MismatchKind,
    /// Location, e.g. `$.body[0].subject` or a header name
    pub path: String,
    /// Expected value or rule
    pub expected: String,
    /// Actual value
    pub actual: String,
}

impl Mismatch {
    fn new(
        kind: MismatchKind,
        path: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            path: path.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: expected {} but was {}",
            self.path, self.expected, self.actual
        )
    }
}

/// An HTTP request as received by the mock server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedRequest {
    /// HTTP method
    pub method: String,
    /// Request path without query
    pub path: String,
    /// Headers in arrival order
    pub headers: Vec<(String, String)>,
    /// Parsed body; non-JSON text is kept as a string, empty bodies are `None`
    pub body: Option<Value>,
}

/// An HTTP response as returned by the live provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedResponse {
    /// HTTP status code
    pub status: u16,
    /// Headers in arrival order
    pub headers: Vec<(String, String)>,
    /// Parsed body; non-JSON text is kept as a string, empty bodies are `None`
    pub body: Option<Value>,
}

/// Parse a raw body the way observed bodies are stored.
#[must_use]
pub fn parse_body(raw: &[u8]) -> Option<Value> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    Some(serde_json::from_slice(raw).unwrap_or_else(|_| {
        Value::String(String::from_utf8_lossy(raw).into_owned())
    }))
}

/// Compare an observed request with an expected one.
#[must_use]
pub fn match_request(expected: &Request, actual: &ObservedRequest) -> Vec<Mismatch> {
    let mut mismatches = Vec::new();

    if !expected.method.eq_ignore_ascii_case(&actual.method) {
        mismatches.push(Mismatch::new(
            MismatchKind::Method,
            "$.method",
            expected.method.to_uppercase(),
            actual.method.to_uppercase(),
        ));
    }
    if expected.path != actual.path {
        mismatches.push(Mismatch::new(
            MismatchKind::Path,
            "$.path",
            &expected.path,
            &actual.path,
        ));
    }
    match_headers(&expected.headers, &actual.headers, &mut mismatches);
    match_body(expected.body.as_ref(), actual.body.as_ref(), &mut mismatches);

    mismatches
}

/// Compare an observed response with an expected one.
#[must_use]
pub fn match_response(expected: &Response, actual: &ObservedResponse) -> Vec<Mismatch> {
    let mut mismatches = Vec::new();

    if expected.status != actual.status {
        mismatches.push(Mismatch::new(
            MismatchKind::Status,
            "$.status",
            expected.status.to_string(),
            actual.status.to_string(),
        ));
    }
    match_headers(&expected.headers, &actual.headers, &mut mismatches);
    match_body(expected.body.as_ref(), actual.body.as_ref(), &mut mismatches);

    mismatches
}

/// Compare a JSON value with a matcher, collecting body mismatches under `path`.
#[must_use]
pub fn match_value(expected: &Matcher, actual: &Value, path: &str) -> Vec<Mismatch> {
    let mut mismatches = Vec::new();
    compare(expected, actual, path, &mut mismatches);
    mismatches
}

fn match_body(expected: Option<&Matcher>, actual: Option<&Value>, out: &mut Vec<Mismatch>) {
    let Some(expected) = expected else {
        return;
    };
    match actual {
        Some(actual) => compare(expected, actual, "$.body", out),
        None => out.push(Mismatch::new(
            MismatchKind::Body,
            "$.body",
            expected.example().to_string(),
            "<empty>",
        )),
    }
}

fn match_headers(
    expected: &BTreeMap<String, Matcher>,
    actual: &[(String, String)],
    out: &mut Vec<Mismatch>,
) {
    for (name, matcher) in expected {
        let values: Vec<&str> = actual
            .iter()
            .filter(|(actual_name, _)| actual_name.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
            .collect();

        if values.is_empty() {
            out.push(Mismatch::new(
                MismatchKind::Header,
                name.as_str(),
                matcher.example_string(),
                "<missing>",
            ));
            continue;
        }

        let joined = values.join(", ");
        if !header_matches(name, matcher, &joined) {
            out.push(Mismatch::new(
                MismatchKind::Header,
                name.as_str(),
                describe(matcher),
                joined,
            ));
        }
    }
}

fn header_matches(name: &str, matcher: &Matcher, actual: &str) -> bool {
    match matcher {
        Matcher::Literal(Value::String(expected)) => {
            if expected.trim() == actual.trim() {
                return true;
            }
            // A bare media type matches regardless of parameters such as charset.
            name.eq_ignore_ascii_case("content-type")
                && !expected.contains(';')
                && media_type(expected) == media_type(actual)
        }
        other => {
            let mut scratch = Vec::new();
            compare(other, &Value::String(actual.to_string()), name, &mut scratch);
            scratch.is_empty()
        }
    }
}

fn media_type(value: &str) -> String {
    value
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn compare(expected: &Matcher, actual: &Value, path: &str, out: &mut Vec<Mismatch>) {
    match expected {
        Matcher::Literal(value @ (Value::Object(_) | Value::Array(_))) => {
            compare(&Matcher::from(value.clone()), actual, path, out);
        }
        Matcher::Literal(value) => {
            if !scalars_equal(value, actual) {
                out.push(body_mismatch(path, value.to_string(), actual));
            }
        }
        Matcher::Object(fields) => {
            let Value::Object(actual_fields) = actual else {
                out.push(body_mismatch(path, "an object", actual));
                return;
            };
            for (key, matcher) in fields {
                let field_path = format!("{path}.{key}");
                match actual_fields.get(key) {
                    Some(value) => compare(matcher, value, &field_path, out),
                    None => out.push(Mismatch::new(
                        MismatchKind::Body,
                        field_path,
                        matcher.example().to_string(),
                        "<missing>",
                    )),
                }
            }
        }
        Matcher::Array(items) => {
            let Value::Array(actual_items) = actual else {
                out.push(body_mismatch(path, "an array", actual));
                return;
            };
            if items.len() != actual_items.len() {
                out.push(body_mismatch(
                    path,
                    format!("an array of {} element(s)", items.len()),
                    actual,
                ));
                return;
            }
            for (i, (matcher, value)) in items.iter().zip(actual_items).enumerate() {
                compare(matcher, value, &format!("{path}[{i}]"), out);
            }
        }
        Matcher::Type(example) => compare_type(example, actual, path, out),
        Matcher::Regex { pattern, .. } => match (compile(pattern), actual) {
            (Ok(regex), Value::String(s)) if regex.is_match(s) => {}
            _ => out.push(body_mismatch(path, format!("a string matching /{pattern}/"), actual)),
        },
        Matcher::Include(substring) => match actual {
            Value::String(s) if s.contains(substring.as_str()) => {}
            _ => out.push(body_mismatch(
                path,
                format!("a string containing '{substring}'"),
                actual,
            )),
        },
        Matcher::EachLike { template, min } => {
            let Value::Array(actual_items) = actual else {
                out.push(body_mismatch(path, "an array", actual));
                return;
            };
            if actual_items.len() < *min {
                out.push(body_mismatch(
                    path,
                    format!("an array of at least {min} element(s)"),
                    actual,
                ));
            }
            for (i, value) in actual_items.iter().enumerate() {
                compare(template, value, &format!("{path}[{i}]"), out);
            }
        }
        Matcher::Integer(_) => {
            if !(actual.is_i64() || actual.is_u64()) {
                out.push(body_mismatch(path, "an integer", actual));
            }
        }
        Matcher::Decimal(_) => {
            if !actual.is_number() {
                out.push(body_mismatch(path, "a number", actual));
            }
        }
    }
}

fn compare_type(example: &Value, actual: &Value, path: &str, out: &mut Vec<Mismatch>) {
    match (example, actual) {
        (Value::Object(fields), Value::Object(actual_fields)) => {
            for (key, value) in fields {
                let field_path = format!("{path}.{key}");
                match actual_fields.get(key) {
                    Some(actual_value) => compare_type(value, actual_value, &field_path, out),
                    None => out.push(Mismatch::new(
                        MismatchKind::Body,
                        field_path,
                        value.to_string(),
                        "<missing>",
                    )),
                }
            }
        }
        (Value::Array(items), Value::Array(actual_items)) => {
            if items.len() != actual_items.len() {
                out.push(body_mismatch(
                    path,
                    format!("an array of {} element(s)", items.len()),
                    actual,
                ));
                return;
            }
            for (i, (item, value)) in items.iter().zip(actual_items).enumerate() {
                compare_type(item, value, &format!("{path}[{i}]"), out);
            }
        }
        (Value::String(_), Value::String(_))
        | (Value::Bool(_), Value::Bool(_))
        | (Value::Number(_), Value::Number(_))
        | (Value::Null, Value::Null) => {}
        _ => out.push(body_mismatch(path, format!("a value like {example}"), actual)),
    }
}

fn scalars_equal(expected: &Value, actual: &Value) -> bool {
    match (expected, actual) {
        (Value::Number(e), Value::Number(a)) => numbers_equal(e, a),
        _ => expected == actual,
    }
}

fn numbers_equal(expected: &Number, actual: &Number) -> bool {
    if let (Some(e), Some(a)) = (expected.as_i64(), actual.as_i64()) {
        return e == a;
    }
    if let (Some(e), Some(a)) = (expected.as_u64(), actual.as_u64()) {
        return e == a;
    }
    if expected.is_f64() || actual.is_f64() {
        return match (expected.as_f64(), actual.as_f64()) {
            (Some(e), Some(a)) => (e - a).abs() < f64::EPSILON,
            _ => false,
        };
    }
    // One side negative, the other above i64::MAX.
    false
}

fn body_mismatch(path: &str, expected: impl Into<String>, actual: &Value) -> Mismatch {
    Mismatch::new(MismatchKind::Body, path, expected, actual.to_string())
}

fn describe(matcher: &Matcher) -> String {
    match matcher {
        Matcher::Regex { pattern, .. } => format!("a value matching /{pattern}/"),
        Matcher::Include(substring) => format!("a value containing '{substring}'"),
        other => other.example_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_large_integer_literals_compare_exactly() {
        let expected = Matcher::from(json!(9_007_199_254_740_993_u64));
        let mismatches = match_value(&expected, &json!(9_007_199_254_740_992_u64), "$");
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].path, "$");

        assert!(match_value(&expected, &json!(9_007_199_254_740_993_u64), "$").is_empty());
        assert!(!match_value(&Matcher::from(json!(-1)), &json!(u64::MAX), "$").is_empty());
        assert!(match_value(&Matcher::from(json!(2)), &json!(2.0), "$").is_empty());
    }

    fn request(body: Option<Value>) -> Request {
        Request {
            method: "POST".to_string(),
            path: "/BulkUsers".to_string(),
            headers: BTreeMap::from([
                ("Authorization".to_string(), Matcher::from("Bearer valid-token-from-SF")),
                ("Content-Type".to_string(), Matcher::from("application/json")),
            ]),
            body: body.map(Matcher::from),
        }
    }

    fn observed(headers: &[(&str, &str)], body: Option<Value>) -> ObservedRequest {
        ObservedRequest {
            method: "post".to_string(),
            path: "/BulkUsers".to_string(),
            headers: headers
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            body,
        }
    }

    #[test]
    fn test_request_matches_case_insensitive_headers() {
        let actual = observed(
            &[
                ("authorization", "Bearer valid-token-from-SF"),
                ("content-type", "application/json; charset=utf-8"),
                ("accept", "application/json"),
            ],
            Some(json!([])),
        );
        assert!(match_request(&request(Some(json!([]))), &actual).is_empty());
    }

    #[test]
    fn test_missing_header_reported() {
        let actual = observed(&[("content-type", "application/json")], None);
        let mismatches = match_request(&request(None), &actual);
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].kind, MismatchKind::Header);
        assert_eq!(mismatches[0].path, "Authorization");
        assert_eq!(mismatches[0].actual, "<missing>");
    }

    #[test]
    fn test_content_type_with_parameters_is_compared_exactly() {
        let mut expected = request(None);
        expected.headers.insert(
            "Content-Type".to_string(),
            Matcher::from("application/json; charset=utf-8"),
        );
        let actual = observed(
            &[
                ("Authorization", "Bearer valid-token-from-SF"),
                ("Content-Type", "application/json; charset=latin1"),
            ],
            None,
        );
        assert_eq!(match_request(&expected, &actual).len(), 1);
    }

    #[test]
    fn test_object_matching_ignores_key_order_and_extra_keys() {
        let expected = Matcher::from(json!({"a": 1, "b": {"c": "x"}}));
        let actual = json!({"b": {"extra": true, "c": "x"}, "z": [1], "a": 1});
        assert!(match_value(&expected, &actual, "$").is_empty());
    }

    #[test]
    fn test_missing_key_reported_with_path() {
        let expected = Matcher::from(json!([{"displayName": "TestUser", "subject": null}]));
        let actual = json!([{"displayName": "TestUser"}]);
        let mismatches = match_value(&expected, &actual, "$.body");
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].path, "$.body[0].subject");
        assert_eq!(mismatches[0].expected, "null");
        assert_eq!(mismatches[0].actual, "<missing>");
    }

    #[test]
    fn test_literal_mismatch_reports_expected_and_actual() {
        let expected = Matcher::from(json!({"count": 2, "name": "a"}));
        let mismatches = match_value(&expected, &json!({"count": 3, "name": "a"}), "$");
        assert_eq!(
            mismatches,
            vec![Mismatch::new(MismatchKind::Body, "$.count", "2", "3")]
        );
    }

    #[test]
    fn test_numbers_compare_numerically() {
        assert!(match_value(&Matcher::from(json!(1)), &json!(1.0), "$").is_empty());
    }

    #[test]
    fn test_array_length_mismatch() {
        let mismatches = match_value(&Matcher::from(json!([1, 2])), &json!([1]), "$");
        assert_eq!(mismatches.len(), 1);
        assert!(mismatches[0].expected.contains("2 element"));
    }

    #[test]
    fn test_type_rule_tolerates_generated_values() {
        let expected = Matcher::like(json!("user-subject-id-123"));
        assert!(match_value(&expected, &json!("3f8a5c2e"), "$").is_empty());
        assert_eq!(match_value(&expected, &Value::Null, "$").len(), 1);
    }

    #[test]
    fn test_type_rule_on_objects_is_recursive() {
        let expected = Matcher::like(json!({"id": 1, "tags": ["a"]}));
        assert!(match_value(&expected, &json!({"id": 99, "tags": ["zz"], "x": 0}), "$").is_empty());
        let mismatches = match_value(&expected, &json!({"id": "1", "tags": ["zz"]}), "$");
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].path, "$.id");
    }

    #[test]
    fn test_each_like() {
        let expected = Matcher::each_like(Matcher::from(json!({"provider": "windows"})), 1);
        assert!(match_value(&expected, &json!([{"provider": "windows"}, {"provider": "windows"}]), "$").is_empty());
        assert_eq!(match_value(&expected, &json!([]), "$").len(), 1);
        let mismatches = match_value(&expected, &json!([{"provider": "windows"}, {"provider": "okta"}]), "$");
        assert_eq!(mismatches[0].path, "$[1].provider");
    }

    #[test]
    fn test_include_and_regex() {
        let include = Matcher::include("invalid-user");
        assert!(match_value(&include, &json!("User 'invalid-user' does not exist"), "$").is_empty());
        assert_eq!(match_value(&include, &json!("other"), "$").len(), 1);

        let regex = Matcher::regex(r"^\d{4}-\d{2}-\d{2}$", "2025-01-15");
        assert!(match_value(&regex, &json!("2026-10-16"), "$").is_empty());
        assert_eq!(match_value(&regex, &json!(20261016), "$").len(), 1);
    }

    #[test]
    fn test_integer_and_decimal() {
        assert!(match_value(&Matcher::integer(1), &json!(42), "$").is_empty());
        assert_eq!(match_value(&Matcher::integer(1), &json!(4.2), "$").len(), 1);
        assert!(match_value(&Matcher::decimal(1.0), &json!(4.2), "$").is_empty());
    }

    #[test]
    fn test_response_status_and_body() {
        let expected = Response {
            status: 400,
            headers: BTreeMap::new(),
            body: Some(Matcher::from(json!({"error": "InvalidWindowsUserName"}))),
        };
        let actual = ObservedResponse {
            status: 200,
            headers: Vec::new(),
            body: None,
        };
        let mismatches = match_response(&expected, &actual);
        assert_eq!(mismatches.len(), 2);
        assert_eq!(mismatches[0].kind, MismatchKind::Status);
        assert_eq!(mismatches[1].kind, MismatchKind::Body);
    }

    #[test]
    fn test_response_without_body_expectation_ignores_body() {
        let expected = Response {
            status: 401,
            headers: BTreeMap::new(),
            body: None,
        };
        let actual = ObservedResponse {
            status: 401,
            headers: vec![("www-authenticate".to_string(), "Bearer".to_string())],
            body: Some(json!({"detail": "nope"})),
        };
        assert!(match_response(&expected, &actual).is_empty());
    }

    #[test]
    fn test_parse_body() {
        assert_eq!(parse_body(b""), None);
        assert_eq!(parse_body(b"  \n"), None);
        assert_eq!(parse_body(b"[1]"), Some(json!([1])));
        assert_eq!(parse_body(b"plain text"), Some(json!("plain text")));
    }

    #[test]
    fn test_mismatch_display() {
        let mismatch = Mismatch::new(MismatchKind::Body, "$.body[0].subject", "\"a\"", "null");
        assert_eq!(mismatch.to_string(), "$.body[0].subject: expected \"a\" but was null");
    }
}
