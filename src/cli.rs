use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::archiver::config::load_config;
use crate::archiver::paths::resolve_paths;
use crate::commands::{self, CommandReport};
use crate::logging;

#[derive(Debug, Parser)]
#[command(
    name = "nad-archive",
    version,
    about = "Archive NAD traffic flows into long-term storage without re-submitting them"
)]
struct Cli {
    /// Directory holding the flow ledger, logs and locks.
    #[arg(long, global = true)]
    storage_dir: Option<PathBuf>,

    /// Print the report as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Query, deduplicate, submit and wait for one archival run.
    Save(SaveArgs),
    /// Inspect the local ledger of archived flows.
    Ledger(LedgerArgs),
    /// Show resolved paths and configuration.
    Status,
}

#[derive(Debug, Args)]
struct SaveArgs {
    /// Storage index the flows are archived into.
    #[arg(long)]
    target: String,
    /// Storage index the flows are read from.
    #[arg(long)]
    source: Option<String>,
    /// Query-language expression ANDed with the time window.
    #[arg(long)]
    filter: Option<String>,
    /// Look back this many hours from now.
    #[arg(long)]
    delta_hours: Option<u64>,
    /// Window start, epoch milliseconds.
    #[arg(long)]
    start: Option<i64>,
    /// Window end, epoch milliseconds.
    #[arg(long)]
    end: Option<i64>,
}

#[derive(Debug, Args)]
struct LedgerArgs {
    #[arg(long)]
    source: Option<String>,
    #[arg(long)]
    target: Option<String>,
    /// Check whether one flow id is archived for the pair.
    #[arg(long)]
    flow_id: Option<String>,
    /// Number of most recent entries to list.
    #[arg(long, default_value_t = 20)]
    limit: usize,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let cfg = load_config()?;
    let paths = resolve_paths(cli.storage_dir.as_deref())?;
    let _log_guard = logging::init(&paths.logs_dir, &cfg.logging.level)?;

    let report = match cli.command {
        Command::Save(args) => commands::save::run(
            &cfg,
            &paths,
            &commands::save::SaveOptions {
                target_index: args.target,
                source_index: args.source,
                filter: args.filter,
                delta_hours: args.delta_hours,
                start_time: args.start,
                end_time: args.end,
            },
        )?,
        Command::Ledger(args) => commands::ledger::run(
            &cfg,
            &paths,
            &commands::ledger::LedgerOptions {
                source_index: args.source,
                target_index: args.target,
                flow_id: args.flow_id,
                limit: args.limit,
            },
        )?,
        Command::Status => commands::status::run(&cfg, &paths)?,
    };

    print_report(&report, cli.json)?;
    if !report.ok {
        anyhow::bail!("{} reported {} issue(s)", report.command, report.issues.len());
    }
    Ok(())
}

fn print_report(report: &CommandReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print!("{}", report.render_text());
    }
    Ok(())
}
