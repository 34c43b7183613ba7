use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ReplayError, Result};

/// Identifiers handed out by earlier replays into the same destination.
///
/// The registry is owned by the caller and passed into
/// [`crate::replay::reconstruct_with_registry`]; nothing in the engine keeps
/// ids between calls on its own.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedIds {
    #[serde(default)]
    trace_ids: BTreeSet<String>,
    #[serde(default)]
    span_ids: BTreeSet<String>,
}

impl IssuedIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .map_err(|e| ReplayError::Io(format!("failed reading {}: {e}", path.display())))?;
        serde_json::from_str(&raw)
            .map_err(|e| ReplayError::Parse(format!("failed parsing {}: {e}", path.display())))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                ReplayError::Io(format!("failed creating {}: {e}", parent.display()))
            })?;
        }
        let raw = serde_json::to_string_pretty(self)
            .map_err(|e| ReplayError::Io(format!("failed encoding registry: {e}")))?;
        fs::write(path, raw)
            .map_err(|e| ReplayError::Io(format!("failed writing {}: {e}", path.display())))
    }

    pub fn has_trace(&self, id: &str) -> bool {
        self.trace_ids.contains(id)
    }

    pub fn has_span(&self, id: &str) -> bool {
        self.span_ids.contains(id)
    }

    /// True when any of the given ids was already issued.
    pub fn collides<'a>(
        &self,
        trace_ids: impl IntoIterator<Item = &'a str>,
        span_ids: impl IntoIterator<Item = &'a str>,
    ) -> bool {
        trace_ids.into_iter().any(|id| self.has_trace(id))
            || span_ids.into_iter().any(|id| self.has_span(id))
    }

    pub fn record<'a>(
        &mut self,
        trace_ids: impl IntoIterator<Item = &'a str>,
        span_ids: impl IntoIterator<Item = &'a str>,
    ) {
        self.trace_ids.extend(trace_ids.into_iter().map(str::to_string));
        self.span_ids.extend(span_ids.into_iter().map(str::to_string));
    }

    pub fn trace_count(&self) -> usize {
        self.trace_ids.len()
    }

    pub fn span_count(&self) -> usize {
        self.span_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trace_ids.is_empty() && self.span_ids.is_empty()
    }
}
