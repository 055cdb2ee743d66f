//! Matching rules embedded in contract bodies and headers.
//!
//! A [`Matcher`] is either a literal JSON value (exact match) or a rule that
//! tolerates variable data such as generated identifiers and timestamps. Every
//! rule carries a concrete example so it can always be rendered to a literal:
//! the mock server returns examples, the verifier sends them.
//!
//! Rules are stored in place inside the JSON document as objects tagged with
//! `"pact:matcher:type"`:
//!
//! ```json
//! { "subject": { "pact:matcher:type": "type", "value": "user-subject-id-123" } }
//! ```

use crate::error::{PactError, PactResult};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use serde_json::{Map, Number, Value, json};
use std::collections::BTreeMap;

/// Key identifying a rule object inside a contract document.
pub const MATCHER_TYPE_KEY: &str = "pact:matcher:type";

/// A matching rule or literal value.
///
/// A `Literal` holding an object or array equals the structural
/// `Object`/`Array` form of the same value, which is also what it
/// deserializes back to.
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Scalar compared by equality
    Literal(Value),
    /// Object whose listed keys must all be present and match; extra keys are ignored
    Object(BTreeMap<String, Matcher>),
    /// Array compared element-wise, lengths must agree
    Array(Vec<Matcher>),
    /// Any value with the same JSON shape as the example
    Type(Value),
    /// String matching a regular expression
    Regex {
        /// Pattern the actual value must match
        pattern: String,
        /// Value rendered when a literal is needed
        example: String,
    },
    /// String containing the given substring
    Include(String),
    /// Array with at least `min` elements, each matching `template`
    EachLike {
        /// Rule applied to every element
        template: Box<Matcher>,
        /// Minimum number of elements
        min: usize,
    },
    /// Any integer
    Integer(i64),
    /// Any number
    Decimal(Number),
}

impl Matcher {
    /// Match any value shaped like `example`.
    #[must_use]
    pub fn like(example: Value) -> Self {
        Self::Type(example)
    }

    /// Match strings against `pattern`, rendering `example`.
    #[must_use]
    pub fn regex(pattern: impl Into<String>, example: impl Into<String>) -> Self {
        Self::Regex {
            pattern: pattern.into(),
            example: example.into(),
        }
    }

    /// Match strings that contain `substring`.
    #[must_use]
    pub fn include(substring: impl Into<String>) -> Self {
        Self::Include(substring.into())
    }

    /// Match arrays of at least `min` elements shaped like `template`.
    #[must_use]
    pub fn each_like(template: impl Into<Self>, min: usize) -> Self {
        Self::EachLike {
            template: Box::new(template.into()),
            min,
        }
    }

    /// Match any integer, rendering `example`.
    #[must_use]
    pub const fn integer(example: i64) -> Self {
        Self::Integer(example)
    }

    /// Match any number, rendering `example`.
    ///
    /// Non-finite values have no JSON representation and become a `null` literal.
    #[must_use]
    pub fn decimal(example: f64) -> Self {
        Number::from_f64(example).map_or(Self::Literal(Value::Null), Self::Decimal)
    }

    /// Render this matcher as the literal value it stands for.
    #[must_use]
    pub fn example(&self) -> Value {
        match self {
            Self::Literal(value) | Self::Type(value) => value.clone(),
            Self::Object(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(key, matcher)| (key.clone(), matcher.example()))
                    .collect(),
            ),
            Self::Array(items) => Value::Array(items.iter().map(Self::example).collect()),
            Self::Regex { example, .. } => Value::String(example.clone()),
            Self::Include(substring) => Value::String(substring.clone()),
            Self::EachLike { template, min } => {
                Value::Array(vec![template.example(); (*min).max(1)])
            }
            Self::Integer(example) => Value::from(*example),
            Self::Decimal(example) => Value::Number(example.clone()),
        }
    }

    /// Render this matcher as a header value.
    #[must_use]
    pub fn example_string(&self) -> String {
        match self.example() {
            Value::String(s) => s,
            other => other.to_string(),
        }
    }

    /// Check that every rule can be evaluated and that its example satisfies it.
    ///
    /// # Errors
    ///
    /// Returns [`PactError::InvalidMatcher`] naming the offending location.
    pub fn validate(&self, path: &str) -> PactResult<()> {
        match self {
            Self::Regex { pattern, example } => {
                let regex = compile(pattern)
                    .map_err(|reason| PactError::invalid_matcher(path, reason))?;
                if !regex.is_match(example) {
                    return Err(PactError::invalid_matcher(
                        path,
                        format!("example '{example}' does not match /{pattern}/"),
                    ));
                }
                Ok(())
            }
            Self::Object(fields) => fields
                .iter()
                .try_for_each(|(key, matcher)| matcher.validate(&format!("{path}.{key}"))),
            Self::Array(items) => items
                .iter()
                .enumerate()
                .try_for_each(|(i, matcher)| matcher.validate(&format!("{path}[{i}]"))),
            Self::EachLike { template, .. } => template.validate(&format!("{path}[*]")),
            Self::Literal(_)
            | Self::Type(_)
            | Self::Include(_)
            | Self::Integer(_)
            | Self::Decimal(_) => Ok(()),
        }
    }

    /// Encode this matcher into its in-document JSON form.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Literal(value) => value.clone(),
            Self::Object(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(key, matcher)| (key.clone(), matcher.to_json()))
                    .collect(),
            ),
            Self::Array(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Type(example) => json!({ MATCHER_TYPE_KEY: "type", "value": example }),
            Self::Regex { pattern, example } => {
                json!({ MATCHER_TYPE_KEY: "regex", "regex": pattern, "value": example })
            }
            Self::Include(substring) => json!({ MATCHER_TYPE_KEY: "include", "value": substring }),
            Self::EachLike { template, min } => {
                json!({ MATCHER_TYPE_KEY: "type", "min": min, "value": [template.to_json()] })
            }
            Self::Integer(example) => json!({ MATCHER_TYPE_KEY: "integer", "value": example }),
            Self::Decimal(example) => json!({ MATCHER_TYPE_KEY: "decimal", "value": example }),
        }
    }

    /// Decode a matcher from its in-document JSON form.
    ///
    /// # Errors
    ///
    /// Returns [`PactError::InvalidMatcher`] for unknown or incomplete rule objects.
    pub fn from_json(value: Value, path: &str) -> PactResult<Self> {
        match value {
            Value::Object(mut fields) => match fields.remove(MATCHER_TYPE_KEY) {
                Some(kind) => decode_rule(&kind, fields, path),
                None => fields
                    .into_iter()
                    .map(|(key, value)| {
                        let matcher = Self::from_json(value, &format!("{path}.{key}"))?;
                        Ok((key, matcher))
                    })
                    .collect::<PactResult<BTreeMap<_, _>>>()
                    .map(Self::Object),
            },
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| Self::from_json(item, &format!("{path}[{i}]")))
                .collect::<PactResult<Vec<_>>>()
                .map(Self::Array),
            scalar => Ok(Self::Literal(scalar)),
        }
    }
}

fn decode_rule(kind: &Value, mut fields: Map<String, Value>, path: &str) -> PactResult<Matcher> {
    let kind = kind
        .as_str()
        .ok_or_else(|| PactError::invalid_matcher(path, "matcher type must be a string"))?;
    let value = fields
        .remove("value")
        .ok_or_else(|| PactError::invalid_matcher(path, format!("'{kind}' rule has no value")))?;

    match kind {
        "type" => match fields.get("min") {
            Some(min) => {
                let min = min
                    .as_u64()
                    .and_then(|m| usize::try_from(m).ok())
                    .ok_or_else(|| PactError::invalid_matcher(path, "min must be a positive integer"))?;
                let template = match value {
                    Value::Array(mut items) if !items.is_empty() => items.swap_remove(0),
                    _ => {
                        return Err(PactError::invalid_matcher(
                            path,
                            "eachLike value must be a non-empty array",
                        ));
                    }
                };
                Ok(Matcher::each_like(
                    Matcher::from_json(template, &format!("{path}[*]"))?,
                    min,
                ))
            }
            None => Ok(Matcher::Type(value)),
        },
        "regex" => {
            let pattern = fields
                .remove("regex")
                .and_then(|p| p.as_str().map(str::to_string))
                .ok_or_else(|| PactError::invalid_matcher(path, "regex rule has no pattern"))?;
            let example = value
                .as_str()
                .ok_or_else(|| PactError::invalid_matcher(path, "regex example must be a string"))?;
            Ok(Matcher::regex(pattern, example))
        }
        "include" => value
            .as_str()
            .map(Matcher::include)
            .ok_or_else(|| PactError::invalid_matcher(path, "include value must be a string")),
        "integer" => value
            .as_i64()
            .map(Matcher::Integer)
            .ok_or_else(|| PactError::invalid_matcher(path, "integer example must be an integer")),
        "decimal" => match value {
            Value::Number(n) => Ok(Matcher::Decimal(n)),
            _ => Err(PactError::invalid_matcher(path, "decimal example must be a number")),
        },
        other => Err(PactError::invalid_matcher(
            path,
            format!("unknown matcher type '{other}'"),
        )),
    }
}

pub(crate) fn compile(pattern: &str) -> Result<Regex, String> {
    Regex::new(pattern).map_err(|e| e.to_string())
}

impl From<Value> for Matcher {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(fields) => Self::Object(
                fields
                    .into_iter()
                    .map(|(key, value)| (key, Self::from(value)))
                    .collect(),
            ),
            Value::Array(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            scalar => Self::Literal(scalar),
        }
    }
}

impl PartialEq for Matcher {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Literal(value @ (Value::Object(_) | Value::Array(_))), _) => {
                Self::from(value.clone()) == *other
            }
            (_, Self::Literal(value @ (Value::Object(_) | Value::Array(_)))) => {
                *self == Self::from(value.clone())
            }
            (Self::Literal(a), Self::Literal(b)) | (Self::Type(a), Self::Type(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => a == b,
            (
                Self::Regex { pattern, example },
                Self::Regex {
                    pattern: other_pattern,
                    example: other_example,
                },
            ) => pattern == other_pattern && example == other_example,
            (Self::Include(a), Self::Include(b)) => a == b,
            (
                Self::EachLike { template, min },
                Self::EachLike {
                    template: other_template,
                    min: other_min,
                },
            ) => min == other_min && template == other_template,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Decimal(a), Self::Decimal(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Matcher {}

impl From<&str> for Matcher {
    fn from(value: &str) -> Self {
        Self::Literal(Value::String(value.to_string()))
    }
}

impl From<String> for Matcher {
    fn from(value: String) -> Self {
        Self::Literal(Value::String(value))
    }
}

impl Serialize for Matcher {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Matcher {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_json(value, "$").map_err(de::Error::custom)
    }
}
