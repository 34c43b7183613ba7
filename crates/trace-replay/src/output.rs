use std::collections::HashMap;

use chrono::SecondsFormat;
use owo_colors::OwoColorize;
use replay_core::inspect::{TraceSummary, span_duration_ms};
use replay_core::{FieldLayout, SpanRecord};

pub fn print_summary_human(v: &TraceSummary, color: bool) {
    let traces = if v.trace_ids.is_empty() {
        "-".to_string()
    } else {
        v.trace_ids.join(",")
    };
    let header = format!(
        "TRACE {} duration={}ms spans={} roots={}",
        traces,
        v.duration_ms.unwrap_or(0),
        v.span_count,
        v.root_count
    );
    if color {
        println!("{}", header.bold());
    } else {
        println!("{header}");
    }

    match (&v.reference_field, v.reference) {
        (Some(field), Some(reference)) => println!(
            "reference={} field={}",
            reference.to_rfc3339_opts(SecondsFormat::Micros, true),
            field
        ),
        _ => println!("reference=- (no timestamps, ids only)"),
    }

    for orphan in &v.orphan_parents {
        let line = format!("orphan parent={orphan}");
        if color {
            println!("{}", line.yellow());
        } else {
            println!("{line}");
        }
    }
}

pub fn print_matches_human(records: &[(usize, &SpanRecord)], layout: FieldLayout) {
    for (index, record) in records {
        println!(
            "#{} span={} name={}",
            index,
            record.str_lossy(layout.span_id_key()).unwrap_or("-"),
            record.str_lossy("span_name").unwrap_or("-")
        );
    }
    println!("-- {} matches --", records.len());
}

pub fn print_span_tree(spans: &[SpanRecord], layout: FieldLayout, color: bool) {
    let mut children: HashMap<Option<&str>, Vec<&SpanRecord>> = HashMap::new();
    for span in spans {
        let parent = span
            .str_lossy(layout.parent_span_id_key())
            .filter(|p| !p.is_empty());
        children.entry(parent).or_default().push(span);
    }
    if let Some(roots) = children.get(&None) {
        for root in roots {
            print_node(root, &children, layout, color, 0);
        }
    }
}

fn print_node(
    span: &SpanRecord,
    children: &HashMap<Option<&str>, Vec<&SpanRecord>>,
    layout: FieldLayout,
    color: bool,
    depth: usize,
) {
    let indent = "  ".repeat(depth);
    let span_id = span.str_lossy(layout.span_id_key()).unwrap_or("-");
    let name = span.str_lossy("span_name").unwrap_or("span");
    let duration = span_duration_ms(span, layout)
        .map(|ms| format!("{ms}ms"))
        .unwrap_or_else(|| "-".to_string());

    if color {
        println!("{}{} {} ({})", indent, name.cyan(), span_id.dimmed(), duration);
    } else {
        println!("{indent}{name} {span_id} ({duration})");
    }

    // Duplicate span ids can form a loop.
    if depth > children.values().map(Vec::len).sum::<usize>() {
        return;
    }
    if let Some(kids) = children.get(&Some(span_id)) {
        for child in kids {
            print_node(child, children, layout, color, depth + 1);
        }
    }
}
