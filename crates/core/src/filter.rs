use glob::Pattern;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ReplayError, Result};
use crate::model::span::SpanRecord;

/// `key=glob` filter over span fields. Dotted keys descend into nested
/// objects, so `metadata.model=gpt-4*` looks at `{"metadata": {"model": ..}}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttrFilter {
    pub key: String,
    pub value_glob: String,
}

impl AttrFilter {
    pub fn parse(input: &str) -> Result<Self> {
        let (key, value_glob) = input
            .split_once('=')
            .ok_or_else(|| ReplayError::Parse(format!("invalid where filter: {input}")))?;

        if key.trim().is_empty() || value_glob.trim().is_empty() {
            return Err(ReplayError::Parse(format!("invalid where filter: {input}")));
        }

        Pattern::new(value_glob.trim())
            .map_err(|e| ReplayError::Parse(format!("invalid glob in {input}: {e}")))?;

        Ok(Self {
            key: key.trim().to_string(),
            value_glob: value_glob.trim().to_string(),
        })
    }

    pub fn matches(&self, value: &str) -> bool {
        Pattern::new(&self.value_glob)
            .map(|p| p.matches(value))
            .unwrap_or(false)
    }

    pub fn matches_record(&self, record: &SpanRecord) -> bool {
        let mut parts = self.key.split('.');
        let Some(first) = parts.next() else {
            return false;
        };
        let mut current = record.get(first);
        for part in parts {
            current = current.and_then(|v| v.get(part));
        }

        match current {
            Some(Value::String(s)) => self.matches(s),
            Some(Value::Null) | None => false,
            Some(other) => self.matches(&other.to_string()),
        }
    }
}
