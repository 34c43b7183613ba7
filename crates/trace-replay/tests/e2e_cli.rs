use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use serde_json::Value;

fn bin() -> &'static str {
    env!("CARGO_BIN_EXE_trace-replay")
}

/// Runs the binary with configuration isolated to `temp`.
fn run(temp: &Path, args: &[&str]) -> Output {
    Command::new(bin())
        .args(args)
        .env("TRACE_REPLAY_CONFIG", temp.join("missing-config.toml"))
        .env_remove("TRACE_REPLAY_LAYOUT")
        .env_remove("TRACE_REPLAY_TRACE_ID_POLICY")
        .env_remove("TRACE_REPLAY_SEED")
        .env_remove("TRACE_REPLAY_REGISTRY")
        .env_remove("TRACE_REPLAY_MAX_SEED_ATTEMPTS")
        .env_remove("TRACE_REPLAY_PRETTY")
        .output()
        .unwrap()
}

fn write_fixture(temp: &Path, name: &str, spans: Vec<Value>) -> String {
    let path = temp.join(name);
    fs::write(&path, serde_json::to_string_pretty(&spans).unwrap()).unwrap();
    path.display().to_string()
}

fn stdout_json(output: &Output) -> Value {
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn remap_writes_replayed_trace_to_stdout() {
    let temp = tempfile::tempdir().unwrap();
    let input = write_fixture(
        temp.path(),
        "trace.json",
        testkit::sample_trace("4bf92f3577b34da6a3ce929d0e0e4736"),
    );

    let output = run(
        temp.path(),
        &["remap", &input, "--run-time", "2030-06-01T00:00:00Z"],
    );
    let spans = stdout_json(&output);
    let spans = spans.as_array().unwrap();

    assert_eq!(spans.len(), 4);
    let trace = spans[0]["trace_id"].as_str().unwrap();
    assert_ne!(trace, "4bf92f3577b34da6a3ce929d0e0e4736");
    assert!(spans.iter().all(|s| s["trace_id"] == trace));
    assert_eq!(spans[1]["parent_span_id"], spans[0]["span_id"]);
    assert_eq!(spans[0]["start_time"], "2030-06-01T00:00:00.000000Z");
    assert_eq!(spans[0]["timestamp"], "2030-06-01T00:00:01.800000Z");
    assert_eq!(spans[1]["model"], "gpt-4o-mini");
}

#[test]
fn remap_is_reproducible_for_a_fixed_run_time() {
    let temp = tempfile::tempdir().unwrap();
    let input = write_fixture(temp.path(), "trace.json", testkit::sample_trace("aa11"));
    let args = [
        "remap",
        input.as_str(),
        "--run-time",
        "2030-06-01T00:00:00Z",
        "--compact",
    ];

    let first = run(temp.path(), &args);
    let second = run(temp.path(), &args);
    assert_eq!(stdout_json(&first), stdout_json(&second));

    let later = run(
        temp.path(),
        &["remap", &input, "--run-time", "2030-06-01T00:00:01Z"],
    );
    assert_ne!(stdout_json(&first)[0]["trace_id"], stdout_json(&later)[0]["trace_id"]);
}

#[test]
fn remap_to_file_reports_and_updates_registry() {
    let temp = tempfile::tempdir().unwrap();
    let input = write_fixture(
        temp.path(),
        "ingest.json",
        testkit::sample_ingest_trace("aa11bb22cc33dd44"),
    );
    let out_path = temp.path().join("out.json");
    let registry = temp.path().join("state/issued.json");
    let out_arg = out_path.display().to_string();
    let registry_arg = registry.display().to_string();
    let args = [
        "--json",
        "remap",
        input.as_str(),
        "--layout",
        "ingest",
        "--seed",
        "demo",
        "--registry",
        registry_arg.as_str(),
        "-o",
        out_arg.as_str(),
    ];

    let report = stdout_json(&run(temp.path(), &args));
    assert_eq!(report["spans"], 4);
    assert_eq!(report["seed"], "demo");

    let first: Value = serde_json::from_str(&fs::read_to_string(&out_path).unwrap()).unwrap();
    assert_eq!(first[2]["span_parent_id"], first[0]["span_unique_id"]);

    let issued: Value = serde_json::from_str(&fs::read_to_string(&registry).unwrap()).unwrap();
    assert_eq!(issued["trace_ids"].as_array().unwrap().len(), 1);
    assert_eq!(issued["span_ids"].as_array().unwrap().len(), 4);

    // Same seed again: the registry forces fresh ids, and the report names
    // the seed that produced them.
    let report = stdout_json(&run(temp.path(), &args));
    assert_eq!(report["seed"], "demo#1");
    let second: Value = serde_json::from_str(&fs::read_to_string(&out_path).unwrap()).unwrap();
    assert_ne!(first[0]["trace_unique_id"], second[0]["trace_unique_id"]);

    let mapped = stdout_json(&run(
        temp.path(),
        &["--json", "map-id", "aa11bb22cc33dd44", "--seed", "demo#1"],
    ));
    assert_eq!(second[0]["trace_unique_id"], mapped["mapped"]);
}

#[test]
fn failed_output_write_leaves_registry_untouched() {
    let temp = tempfile::tempdir().unwrap();
    let input = write_fixture(temp.path(), "trace.json", testkit::sample_trace("aa11"));
    let registry = temp.path().join("issued.json");
    let registry_arg = registry.display().to_string();
    let out_arg = temp.path().join("no-such-dir/out.json").display().to_string();

    let output = run(
        temp.path(),
        &[
            "remap",
            input.as_str(),
            "--registry",
            registry_arg.as_str(),
            "-o",
            out_arg.as_str(),
        ],
    );
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed writing"), "stderr: {stderr}");
    assert!(!registry.exists(), "registry saved for ids never written");
}

#[test]
fn remap_rejects_mixed_trace_ids_with_location() {
    let temp = tempfile::tempdir().unwrap();
    let mut spans = testkit::untimed_trace("aa11");
    spans[1]["trace_id"] = Value::from("bb22");
    let input = write_fixture(temp.path(), "mixed.json", spans);

    let output = run(temp.path(), &["remap", &input]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("record 1"), "stderr: {stderr}");
    assert!(stderr.contains("trace_id"), "stderr: {stderr}");

    let tolerated = run(temp.path(), &["remap", &input, "--policy", "per-trace"]);
    let spans = stdout_json(&tolerated);
    assert_ne!(spans[0]["trace_id"], spans[1]["trace_id"]);
}

#[test]
fn remap_reports_bad_timestamp() {
    let temp = tempfile::tempdir().unwrap();
    let mut spans = testkit::sample_trace("aa11");
    spans[2]["start_time"] = Value::from("half past nine");
    let input = write_fixture(temp.path(), "bad.json", spans);

    let output = run(temp.path(), &["remap", &input]);
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("record 2, field start_time"), "stderr: {stderr}");
}

#[test]
fn inspect_json_summary() {
    let temp = tempfile::tempdir().unwrap();
    let input = write_fixture(temp.path(), "trace.json", testkit::sample_trace("aa11"));

    let summary = stdout_json(&run(temp.path(), &["--json", "inspect", &input]));
    assert_eq!(summary["span_count"], 4);
    assert_eq!(summary["root_count"], 1);
    assert_eq!(summary["duration_ms"], 1800);
    assert_eq!(summary["reference_field"], "start_time");
    assert_eq!(summary["trace_ids"][0], "aa11");
}

#[test]
fn inspect_human_tree_and_where() {
    let temp = tempfile::tempdir().unwrap();
    let input = write_fixture(temp.path(), "trace.json", testkit::sample_trace("aa11"));

    let output = run(temp.path(), &["inspect", &input]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("TRACE aa11 duration=1800ms spans=4 roots=1"));
    assert!(stdout.contains("agent.run a1b2c3d4e5f60001 (1800ms)"));
    assert!(stdout.contains("    retriever.fetch a1b2c3d4e5f60004 (650ms)"));

    let output = run(
        temp.path(),
        &["inspect", &input, "--where", "span_name=tool.*"],
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("#2 span=a1b2c3d4e5f60003 name=tool.search"));
    assert!(stdout.contains("-- 1 matches --"));
}

#[test]
fn map_id_prints_known_value() {
    let temp = tempfile::tempdir().unwrap();
    let output = run(temp.path(), &["map-id", "abc", "--seed", "k"]);
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "f78");
}
