use std::collections::{BTreeSet, HashSet};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ReplayError, Result};
use crate::ids::IdMapper;
use crate::model::span::{FieldLayout, SpanRecord};
use crate::registry::IssuedIds;
use crate::time::{format_instant, shift};

/// What to do when records in one list carry different trace ids.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TraceIdPolicy {
    /// Fail with a validation error naming the first disagreeing record.
    #[default]
    Reject,
    /// Trust the first record's trace id and write its mapping everywhere.
    First,
    /// Remap each distinct trace id on its own.
    PerTrace,
}

impl TraceIdPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Reject => "reject",
            Self::First => "first",
            Self::PerTrace => "per-trace",
        }
    }
}

impl FromStr for TraceIdPolicy {
    type Err = ReplayError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "reject" | "strict" => Ok(Self::Reject),
            "first" => Ok(Self::First),
            "per-trace" | "per_trace" | "group" => Ok(Self::PerTrace),
            _ => Err(ReplayError::Parse(format!("unknown trace id policy: {s}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayOptions {
    pub layout: FieldLayout,
    pub trace_id_policy: TraceIdPolicy,
    /// Replaces the run-time-derived seed when set.
    pub seed: Option<String>,
    /// Seeds tried against an [`IssuedIds`] registry before giving up.
    pub max_seed_attempts: u32,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            layout: FieldLayout::Canonical,
            trace_id_policy: TraceIdPolicy::Reject,
            seed: None,
            max_seed_attempts: 8,
        }
    }
}

impl ReplayOptions {
    pub fn mapper_for(&self, run_time: DateTime<Utc>) -> IdMapper {
        IdMapper::new(
            self.seed
                .clone()
                .unwrap_or_else(|| seed_for_run_time(run_time)),
        )
    }
}

/// The seed a run derives from its own time: the ISO-8601 form of `run_time`.
pub fn seed_for_run_time(run_time: DateTime<Utc>) -> String {
    format_instant(run_time)
}

/// Rebuilds `records` as a fresh trace, with default options.
///
/// Every identifier is remapped through one [`IdMapper`] per call, so parent
/// references stay attached to the spans they name, and every timestamp is
/// moved so that the earliest one lands on `run_time`. All other fields are
/// copied as they are. A call either returns a complete list or an error; it
/// never returns a partially rewritten one.
pub fn reconstruct(records: &[SpanRecord], run_time: DateTime<Utc>) -> Result<Vec<SpanRecord>> {
    reconstruct_with(records, run_time, &ReplayOptions::default())
}

pub fn reconstruct_with(
    records: &[SpanRecord],
    run_time: DateTime<Utc>,
    options: &ReplayOptions,
) -> Result<Vec<SpanRecord>> {
    let plan = ReplayPlan::build(records, options)?;
    let mapper = options.mapper_for(run_time);
    debug!(seed = mapper.seed(), records = records.len(), "replaying trace");
    plan.apply(records, run_time, &mapper)
}

/// Output of [`reconstruct_with_registry`]: the rebuilt records and the seed
/// that produced them, which differs from the base seed after a reseed.
#[derive(Debug, Clone, PartialEq)]
pub struct Replayed {
    pub records: Vec<SpanRecord>,
    pub seed: String,
}

/// Like [`reconstruct_with`], but reseeds the whole call until none of the new
/// trace or span ids appear in `issued`, then records the ids it handed out.
pub fn reconstruct_with_registry(
    records: &[SpanRecord],
    run_time: DateTime<Utc>,
    options: &ReplayOptions,
    issued: &mut IssuedIds,
) -> Result<Replayed> {
    let plan = ReplayPlan::build(records, options)?;
    let base = options.mapper_for(run_time);
    let attempts = options.max_seed_attempts.max(1);

    for attempt in 0..attempts {
        let mapper = base.attempt(attempt);
        let (trace_ids, span_ids) = plan.new_ids(&mapper);
        if issued.collides(
            trace_ids.iter().map(String::as_str),
            span_ids.iter().map(String::as_str),
        ) {
            warn!(
                attempt,
                seed = mapper.seed(),
                "remapped ids collide with previously issued ids, reseeding"
            );
            continue;
        }

        debug!(seed = mapper.seed(), records = records.len(), "replaying trace");
        let out = plan.apply(records, run_time, &mapper)?;
        issued.record(
            trace_ids.iter().map(String::as_str),
            span_ids.iter().map(String::as_str),
        );
        return Ok(Replayed {
            records: out,
            seed: mapper.seed().to_string(),
        });
    }

    Err(ReplayError::Collision(format!(
        "every seed derived from {:?} produced an already issued id ({attempts} attempts)",
        base.seed()
    )))
}

/// Fields of one record that the replay touches, read and parsed up front.
#[derive(Debug, Default)]
struct RecordPlan<'a> {
    trace_id: Option<&'a str>,
    span_id: Option<&'a str>,
    parent_span_id: Option<&'a str>,
    start_time: Option<DateTime<Utc>>,
    timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct ReplayPlan<'a> {
    layout: FieldLayout,
    policy: TraceIdPolicy,
    records: Vec<RecordPlan<'a>>,
    /// Trace id used for every record under the `reject` and `first` policies.
    primary_trace_id: Option<&'a str>,
    reference: Option<DateTime<Utc>>,
}

impl<'a> ReplayPlan<'a> {
    fn build(records: &'a [SpanRecord], options: &ReplayOptions) -> Result<Self> {
        let layout = options.layout;
        let plans = records
            .iter()
            .enumerate()
            .map(|(index, record)| read_record(index, record, layout))
            .collect::<Result<Vec<_>>>()?;

        let primary_trace_id = plans.iter().find_map(|p| p.trace_id);
        if options.trace_id_policy == TraceIdPolicy::Reject {
            check_single_trace(&plans, layout)?;
        }

        let reference = reference_instant(&plans);
        warn_orphans(&plans);
        debug!(
            records = plans.len(),
            reference = ?reference.map(format_instant),
            policy = options.trace_id_policy.as_str(),
            "prepared replay plan"
        );

        Ok(Self {
            layout,
            policy: options.trace_id_policy,
            records: plans,
            primary_trace_id,
            reference,
        })
    }

    fn map_trace_id(&self, original: &str, mapper: &IdMapper) -> String {
        match (self.policy, self.primary_trace_id) {
            (TraceIdPolicy::PerTrace, _) | (_, None) => mapper.map(original),
            (_, Some(primary)) => mapper.map(primary),
        }
    }

    /// Trace and span ids this plan would issue under `mapper`.
    fn new_ids(&self, mapper: &IdMapper) -> (BTreeSet<String>, BTreeSet<String>) {
        let trace_ids = self
            .records
            .iter()
            .filter_map(|p| p.trace_id)
            .map(|id| self.map_trace_id(id, mapper))
            .collect();
        let span_ids = self
            .records
            .iter()
            .filter_map(|p| p.span_id)
            .map(|id| mapper.map(id))
            .collect();
        (trace_ids, span_ids)
    }

    fn apply(
        &self,
        records: &[SpanRecord],
        run_time: DateTime<Utc>,
        mapper: &IdMapper,
    ) -> Result<Vec<SpanRecord>> {
        let layout = self.layout;
        records
            .iter()
            .zip(&self.records)
            .enumerate()
            .map(|(index, (record, plan))| -> Result<SpanRecord> {
                let mut out = record.clone();

                if let Some(trace_id) = plan.trace_id {
                    out.set(layout.trace_id_key(), self.map_trace_id(trace_id, mapper));
                }
                if let Some(span_id) = plan.span_id {
                    out.set(layout.span_id_key(), mapper.map(span_id));
                }
                if let Some(parent) = plan.parent_span_id {
                    out.set(layout.parent_span_id_key(), mapper.map(parent));
                }

                if let Some(reference) = self.reference {
                    let times = [
                        (layout.start_time_key(), plan.start_time),
                        (layout.timestamp_key(), plan.timestamp),
                    ];
                    for (key, original) in times {
                        let Some(original) = original else {
                            continue;
                        };
                        let shifted = shift(original, run_time, reference).ok_or_else(|| {
                            ReplayError::malformed(index, key, "shifted time is out of range")
                        })?;
                        out.set(key, format_instant(shifted));
                    }
                }

                Ok(out)
            })
            .collect()
    }
}

fn read_record<'a>(
    index: usize,
    record: &'a SpanRecord,
    layout: FieldLayout,
) -> Result<RecordPlan<'a>> {
    Ok(RecordPlan {
        trace_id: record.str_field(index, layout.trace_id_key())?,
        span_id: record.str_field(index, layout.span_id_key())?,
        parent_span_id: record
            .str_field(index, layout.parent_span_id_key())?
            .filter(|p| !p.is_empty()),
        start_time: record.time_field(index, layout.start_time_key())?,
        timestamp: record.time_field(index, layout.timestamp_key())?,
    })
}

fn check_single_trace(plans: &[RecordPlan<'_>], layout: FieldLayout) -> Result<()> {
    let mut first: Option<(usize, &str)> = None;
    for (index, plan) in plans.iter().enumerate() {
        let Some(trace_id) = plan.trace_id else {
            continue;
        };
        match first {
            None => first = Some((index, trace_id)),
            Some((first_index, expected)) if expected != trace_id => {
                return Err(ReplayError::Validation {
                    index,
                    field: layout.trace_id_key().to_string(),
                    message: format!(
                        "trace id {trace_id:?} differs from {expected:?} on record {first_index}"
                    ),
                });
            }
            Some(_) => {}
        }
    }
    Ok(())
}

/// Earliest `start_time`, or the earliest `timestamp` when no record has a
/// start time.
fn reference_instant(plans: &[RecordPlan<'_>]) -> Option<DateTime<Utc>> {
    plans
        .iter()
        .filter_map(|p| p.start_time)
        .min()
        .or_else(|| plans.iter().filter_map(|p| p.timestamp).min())
}

fn warn_orphans(plans: &[RecordPlan<'_>]) {
    let known: HashSet<&str> = plans.iter().filter_map(|p| p.span_id).collect();
    for (index, plan) in plans.iter().enumerate() {
        let Some(parent) = plan.parent_span_id else {
            continue;
        };
        if !known.contains(parent) {
            warn!(index, parent, "parent span is not in the list; edge kept as is");
        }
    }
}
