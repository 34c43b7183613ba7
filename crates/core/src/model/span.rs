use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ReplayError, Result};
use crate::time::parse_instant;

/// Which JSON keys hold the fields the replay engine rewrites.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FieldLayout {
    /// `trace_id`, `span_id`, `parent_span_id`.
    #[default]
    Canonical,
    /// Trace ingest payloads: `trace_unique_id`, `span_unique_id`, `span_parent_id`.
    Ingest,
}

impl FieldLayout {
    pub fn trace_id_key(self) -> &'static str {
        match self {
            Self::Canonical => "trace_id",
            Self::Ingest => "trace_unique_id",
        }
    }

    pub fn span_id_key(self) -> &'static str {
        match self {
            Self::Canonical => "span_id",
            Self::Ingest => "span_unique_id",
        }
    }

    pub fn parent_span_id_key(self) -> &'static str {
        match self {
            Self::Canonical => "parent_span_id",
            Self::Ingest => "span_parent_id",
        }
    }

    pub fn start_time_key(self) -> &'static str {
        "start_time"
    }

    pub fn timestamp_key(self) -> &'static str {
        "timestamp"
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Canonical => "canonical",
            Self::Ingest => "ingest",
        }
    }
}

impl FromStr for FieldLayout {
    type Err = ReplayError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "canonical" | "default" => Ok(Self::Canonical),
            "ingest" | "keywordsai" => Ok(Self::Ingest),
            _ => Err(ReplayError::Parse(format!("unknown field layout: {s}"))),
        }
    }
}

/// One captured span, kept as its original JSON object so that key order,
/// `null` values and unknown payload fields round-trip untouched.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpanRecord(Map<String, Value>);

impl SpanRecord {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Replaces a field, keeping its position when it already exists.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Reads a string field. Absent and `null` both read as `None`; any other
    /// non-string value is rejected with the record's index.
    pub fn str_field(&self, index: usize, key: &str) -> Result<Option<&str>> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(ReplayError::malformed(
                index,
                key,
                format!("expected a string, found {}", json_kind(other)),
            )),
        }
    }

    /// Reads and parses a timestamp field; a value that does not parse is
    /// reported against this record and field.
    pub fn time_field(&self, index: usize, key: &str) -> Result<Option<DateTime<Utc>>> {
        self.str_field(index, key)?
            .map(|raw| {
                parse_instant(raw).map_err(|e| ReplayError::malformed(index, key, e.to_string()))
            })
            .transpose()
    }

    /// Lenient read used for display: non-string values are ignored.
    pub fn str_lossy(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }
}

impl From<Map<String, Value>> for SpanRecord {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for SpanRecord {
    type Error = ReplayError;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(ReplayError::Parse(format!(
                "span record must be a JSON object, found {}",
                json_kind(&other)
            ))),
        }
    }
}

/// Extracts span records from a document: either a bare array, or an object
/// wrapping the array under `results` or `data` as list endpoints return it.
pub fn records_from_document(doc: Value) -> Result<Vec<SpanRecord>> {
    let items = match doc {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("results").or_else(|| map.remove("data")) {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(ReplayError::Parse(
                    "expected a JSON array or an object with a `results` or `data` array"
                        .to_string(),
                ));
            }
        },
        other => {
            return Err(ReplayError::Parse(format!(
                "expected a JSON array of span records, found {}",
                json_kind(&other)
            )));
        }
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            SpanRecord::try_from(item)
                .map_err(|e| ReplayError::Parse(format!("record {index}: {e}")))
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
