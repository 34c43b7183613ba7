use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::span::{FieldLayout, SpanRecord};
use crate::time::parse_instant;

/// Shape of a captured span list, as seen before replaying it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TraceSummary {
    pub span_count: usize,
    pub trace_ids: Vec<String>,
    pub root_count: usize,
    /// Parent ids that name no span in the list.
    pub orphan_parents: Vec<String>,
    /// Field the reference instant was taken from, if any.
    pub reference_field: Option<String>,
    pub reference: Option<DateTime<Utc>>,
    pub latest: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
}

pub fn inspect(records: &[SpanRecord], layout: FieldLayout) -> Result<TraceSummary> {
    let mut trace_ids = BTreeSet::new();
    let mut span_ids = HashSet::new();
    let mut parents = Vec::new();
    let mut root_count = 0;
    let mut starts = Vec::new();
    let mut stamps = Vec::new();

    for (index, record) in records.iter().enumerate() {
        if let Some(trace_id) = record.str_field(index, layout.trace_id_key())? {
            trace_ids.insert(trace_id.to_string());
        }
        if let Some(span_id) = record.str_field(index, layout.span_id_key())? {
            span_ids.insert(span_id);
        }
        match record
            .str_field(index, layout.parent_span_id_key())?
            .filter(|p| !p.is_empty())
        {
            Some(parent) => parents.push(parent),
            None => root_count += 1,
        }
        if let Some(ts) = record.time_field(index, layout.start_time_key())? {
            starts.push(ts);
        }
        if let Some(ts) = record.time_field(index, layout.timestamp_key())? {
            stamps.push(ts);
        }
    }

    let orphan_parents = parents
        .into_iter()
        .filter(|p| !span_ids.contains(p))
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let (reference_field, reference) = match starts.iter().min() {
        Some(ts) => (Some(layout.start_time_key()), Some(*ts)),
        None => match stamps.iter().min() {
            Some(ts) => (Some(layout.timestamp_key()), Some(*ts)),
            None => (None, None),
        },
    };
    let latest = starts.iter().chain(stamps.iter()).max().copied();
    let duration_ms = reference
        .zip(latest)
        .map(|(first, last)| (last - first).num_milliseconds().max(0));

    Ok(TraceSummary {
        span_count: records.len(),
        trace_ids: trace_ids.into_iter().collect(),
        root_count,
        orphan_parents,
        reference_field: reference_field.map(str::to_string),
        reference,
        latest,
        duration_ms,
    })
}

/// Milliseconds between a span's `start_time` and `timestamp`, when both parse.
pub fn span_duration_ms(record: &SpanRecord, layout: FieldLayout) -> Option<i64> {
    let start = parse_instant(record.str_lossy(layout.start_time_key())?).ok()?;
    let end = parse_instant(record.str_lossy(layout.timestamp_key())?).ok()?;
    Some((end - start).num_milliseconds().max(0))
}
