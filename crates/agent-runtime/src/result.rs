//! Role results and the output schema they are validated against

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Field name under which degraded results keep the model's raw text
pub const RAW_RESPONSE_FIELD: &str = "raw_response";

/// Lowest and highest admissible score
const SCORE_RANGE: (f64, f64) = (1.0, 10.0);

/// Why a role call produced a degraded result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradeCause {
    /// The reply held no parseable JSON object
    Unparseable,
    /// The reply parsed but lacked a required field
    MissingFields,
    /// The provider call failed
    Transport,
    /// The provider call exceeded its deadline
    Timeout,
    /// The call was cancelled before it completed
    Cancelled,
}

impl fmt::Display for DegradeCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Unparseable => "unparseable",
            Self::MissingFields => "missing fields",
            Self::Transport => "transport failure",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

/// Outcome of one role call
///
/// Serialises as the field map for structured results and as
/// `{"raw_response": ..., "degraded": ...}` for degraded ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RoleResult {
    /// Raw or error text kept in place of the structured payload
    Degraded {
        raw_response: String,
        degraded: DegradeCause,
    },
    /// Named fields produced by the role
    Structured(Map<String, Value>),
}

impl RoleResult {
    /// Wrap a validated field map
    pub fn structured(fields: Map<String, Value>) -> Self {
        Self::Structured(fields)
    }

    /// Wrap raw text that could not be used as structured output
    pub fn degraded(raw: impl Into<String>, cause: DegradeCause) -> Self {
        Self::Degraded {
            raw_response: raw.into(),
            degraded: cause,
        }
    }

    /// Build a structured result from a JSON object literal
    ///
    /// Non-object values are kept as degraded raw text.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::Structured(map),
            other => Self::degraded(other.to_string(), DegradeCause::Unparseable),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    pub fn degrade_cause(&self) -> Option<DegradeCause> {
        match self {
            Self::Degraded { degraded, .. } => Some(*degraded),
            Self::Structured(_) => None,
        }
    }

    /// Field map of a structured result
    pub fn fields(&self) -> Option<&Map<String, Value>> {
        match self {
            Self::Structured(map) => Some(map),
            Self::Degraded { .. } => None,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields()?.get(name)
    }

    /// A field rendered as display text
    ///
    /// Strings are returned as-is, lists are joined with `、`, numbers and
    /// other scalars use their JSON form. Empty strings count as absent.
    pub fn text(&self, name: &str) -> Option<String> {
        let rendered = match self.field(name)? {
            Value::Null => return None,
            Value::String(s) => s.trim().to_string(),
            Value::Array(items) => items
                .iter()
                .map(value_text)
                .collect::<Vec<_>>()
                .join("、"),
            other => other.to_string(),
        };
        (!rendered.is_empty()).then_some(rendered)
    }

    /// A score field clamped to [1, 10]
    ///
    /// Accepts JSON numbers and numeric strings such as `"8"` or `"7.5/10"`.
    pub fn score(&self, name: &str) -> Option<u8> {
        self.field(name).and_then(coerce_score)
    }

    /// A list field; a single string becomes a one-element list
    pub fn list(&self, name: &str) -> Vec<String> {
        match self.field(name) {
            Some(Value::Array(items)) => items
                .iter()
                .map(value_text)
                .filter(|s| !s.is_empty())
                .collect(),
            Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
            _ => Vec::new(),
        }
    }

    pub fn summary(&self) -> Option<String> {
        self.text("summary")
    }

    /// Text suitable for feeding to a later stage or rendering verbatim
    pub fn raw_text(&self) -> String {
        match self {
            Self::Degraded { raw_response, .. } => raw_response.clone(),
            Self::Structured(map) => serde_json::to_string_pretty(map).unwrap_or_default(),
        }
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

fn coerce_score(value: &Value) -> Option<u8> {
    let raw = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let head = s.trim().split('/').next()?.trim();
            head.parse::<f64>().ok()?
        }
        _ => return None,
    };
    if !raw.is_finite() {
        return None;
    }
    Some(raw.round().clamp(SCORE_RANGE.0, SCORE_RANGE.1) as u8)
}

/// Fields a role is expected to emit
///
/// `fields` lists everything the role prompt asks for; only `required` is
/// enforced. When `score` is set a numeric value is rewritten into the
/// [1, 10] range. A non-numeric score fails validation only when the score
/// field is required; otherwise it is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputSchema {
    pub fields: &'static [&'static str],
    pub required: &'static [&'static str],
    pub score: Option<&'static str>,
}

impl OutputSchema {
    /// Schema that accepts any JSON object
    pub const fn any() -> Self {
        Self {
            fields: &[],
            required: &[],
            score: None,
        }
    }

    /// Check a parsed payload, normalising the score field in place
    ///
    /// Returns the name of the first missing or invalid required field.
    pub fn validate(&self, fields: &mut Map<String, Value>) -> Result<(), &'static str> {
        for name in self.required {
            match fields.get(*name) {
                None | Some(Value::Null) => return Err(*name),
                Some(Value::String(s)) if s.trim().is_empty() => return Err(*name),
                Some(_) => {}
            }
        }
        if let Some(score_field) = self.score {
            let required = self.required.contains(&score_field);
            match fields.get(score_field).map(coerce_score) {
                Some(Some(score)) => {
                    fields.insert(score_field.to_string(), Value::from(score));
                }
                Some(None) | None if required => return Err(score_field),
                Some(None) => {
                    fields.remove(score_field);
                }
                None => {}
            }
        }
        Ok(())
    }
}
