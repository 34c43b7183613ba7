mod output;
mod telemetry;

use std::fs;
use std::io::{IsTerminal, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use replay_core::config::Config;
use replay_core::filter::AttrFilter;
use replay_core::ids::map_id;
use replay_core::inspect::inspect;
use replay_core::model::span::records_from_document;
use replay_core::registry::IssuedIds;
use replay_core::replay::{ReplayOptions, reconstruct_with, reconstruct_with_registry};
use replay_core::time::parse_time_or_relative;
use replay_core::{FieldLayout, SpanRecord};
use serde::Serialize;
use tracing::info;

use crate::output::{print_matches_human, print_span_tree, print_summary_human};
use crate::telemetry::{LogFormat, init_cli_tracing};

#[derive(Parser, Debug)]
#[command(name = "trace-replay")]
#[command(about = "Replay captured traces under fresh ids and a shifted timeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Remap ids and shift timestamps of a captured span list")]
    Remap {
        #[arg(help = "JSON file with span records, or - for stdin")]
        input: PathBuf,
        #[arg(short, long, help = "Write the replayed spans here instead of stdout")]
        output: Option<PathBuf>,
        #[arg(long, help = "Anchor instant: ISO-8601, `now`, or a duration ago (e.g. 5m)")]
        run_time: Option<String>,
        #[arg(long)]
        seed: Option<String>,
        #[arg(long, help = "reject | first | per-trace")]
        policy: Option<String>,
        #[arg(long, help = "canonical | ingest")]
        layout: Option<String>,
        #[arg(long, help = "File of previously issued ids to avoid")]
        registry: Option<PathBuf>,
        #[arg(long)]
        compact: bool,
    },
    #[command(about = "Summarise a captured span list without changing it")]
    Inspect {
        input: PathBuf,
        #[arg(long)]
        layout: Option<String>,
        #[arg(long = "where")]
        where_filters: Vec<String>,
    },
    #[command(about = "Print the replacement for a single identifier")]
    MapId {
        id: String,
        #[arg(long)]
        seed: String,
    },
}

#[derive(Debug, Serialize)]
struct RemapReport {
    spans: usize,
    output: String,
    seed: String,
    run_time: String,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_cli_tracing(LogFormat::from_env());

    match cli.command {
        Commands::Remap {
            input,
            output,
            run_time,
            seed,
            policy,
            layout,
            registry,
            compact,
        } => {
            let cfg = Config::load()?;
            let options = apply_flags(cfg.replay_options(), seed, policy, layout)?;
            let run_time = run_time
                .map(|v| parse_time_or_relative(&v))
                .transpose()?
                .unwrap_or_else(Utc::now);
            let records = load_records(&input)?;

            let pretty = cfg.pretty && !compact;
            let seed = match registry.or(cfg.registry_path) {
                Some(path) => {
                    let mut issued = IssuedIds::load(&path)?;
                    let replayed =
                        reconstruct_with_registry(&records, run_time, &options, &mut issued)?;
                    write_records(&replayed.records, output.as_deref(), pretty)?;
                    issued.save(&path)?;
                    info!(
                        registry = %path.display(),
                        traces = issued.trace_count(),
                        spans = issued.span_count(),
                        "updated issued id registry"
                    );
                    replayed.seed
                }
                None => {
                    let replayed = reconstruct_with(&records, run_time, &options)?;
                    write_records(&replayed, output.as_deref(), pretty)?;
                    options.mapper_for(run_time).seed().to_string()
                }
            };

            if let Some(path) = output {
                let report = RemapReport {
                    spans: records.len(),
                    output: path.display().to_string(),
                    seed,
                    run_time: replay_core::time::format_instant(run_time),
                };
                if cli.json {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                } else {
                    println!(
                        "wrote {} spans to {} seed={} run_time={}",
                        report.spans, report.output, report.seed, report.run_time
                    );
                }
            }
            Ok(())
        }
        Commands::Inspect {
            input,
            layout,
            where_filters,
        } => {
            let cfg = Config::load()?;
            let layout = match layout {
                Some(v) => v.parse::<FieldLayout>()?,
                None => cfg.layout,
            };
            let filters = where_filters
                .iter()
                .map(|f| AttrFilter::parse(f))
                .collect::<replay_core::Result<Vec<_>>>()?;
            let records = load_records(&input)?;

            if !filters.is_empty() {
                let matched: Vec<(usize, &SpanRecord)> = records
                    .iter()
                    .enumerate()
                    .filter(|(_, r)| filters.iter().all(|f| f.matches_record(r)))
                    .collect();
                if cli.json {
                    let indices: Vec<usize> = matched.iter().map(|(i, _)| *i).collect();
                    println!("{}", serde_json::to_string_pretty(&indices)?);
                } else {
                    print_matches_human(&matched, layout);
                }
                return Ok(());
            }

            let summary = inspect(&records, layout)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                let color = std::io::stdout().is_terminal();
                print_summary_human(&summary, color);
                print_span_tree(&records, layout, color);
            }
            Ok(())
        }
        Commands::MapId { id, seed } => {
            let mapped = map_id(&id, &seed);
            if cli.json {
                println!(
                    "{}",
                    serde_json::json!({"original": id, "seed": seed, "mapped": mapped})
                );
            } else {
                println!("{mapped}");
            }
            Ok(())
        }
    }
}

fn apply_flags(
    mut options: ReplayOptions,
    seed: Option<String>,
    policy: Option<String>,
    layout: Option<String>,
) -> anyhow::Result<ReplayOptions> {
    if let Some(seed) = seed {
        if seed.is_empty() {
            anyhow::bail!("--seed cannot be empty");
        }
        options.seed = Some(seed);
    }
    if let Some(policy) = policy {
        options.trace_id_policy = policy.parse()?;
    }
    if let Some(layout) = layout {
        options.layout = layout.parse()?;
    }
    Ok(options)
}

fn load_records(input: &Path) -> anyhow::Result<Vec<SpanRecord>> {
    let raw = if input == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed reading span records from stdin")?;
        buf
    } else {
        fs::read_to_string(input)
            .with_context(|| format!("failed reading {}", input.display()))?
    };
    parse_records(&raw).with_context(|| format!("invalid span records in {}", input.display()))
}

fn parse_records(raw: &str) -> anyhow::Result<Vec<SpanRecord>> {
    let doc: serde_json::Value = serde_json::from_str(raw)?;
    Ok(records_from_document(doc)?)
}

fn write_records(
    records: &[SpanRecord],
    output: Option<&Path>,
    pretty: bool,
) -> anyhow::Result<()> {
    let mut body = if pretty {
        serde_json::to_string_pretty(records)?
    } else {
        serde_json::to_string(records)?
    };
    body.push('\n');

    match output {
        Some(path) => fs::write(path, body)
            .with_context(|| format!("failed writing {}", path.display()))?,
        None => std::io::stdout()
            .lock()
            .write_all(body.as_bytes())
            .context("failed writing to stdout")?,
    }
    Ok(())
}
