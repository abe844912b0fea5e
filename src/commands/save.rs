use anyhow::{Context, Result};

use crate::archiver::config::ArchiverConfig;
use crate::archiver::ledger::Ledger;
use crate::archiver::orchestrator::{Orchestrator, RunOutcome, RunRequest};
use crate::archiver::paths::ArchivePaths;
use crate::archiver::poller::ThreadSleeper;
use crate::archiver::run_lock::PairLock;
use crate::archiver::submit::TaskState;
use crate::archiver::time_range::TimeSpec;
use crate::archiver::util::now_epoch_millis;
use crate::commands::CommandReport;
use crate::nad::transport::{HttpTransport, HttpTransportOptions};

#[derive(Debug, Clone, Default)]
pub struct SaveOptions {
    pub target_index: String,
    pub source_index: Option<String>,
    pub filter: Option<String>,
    pub delta_hours: Option<u64>,
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
}

pub fn run(cfg: &ArchiverConfig, paths: &ArchivePaths, opts: &SaveOptions) -> Result<CommandReport> {
    let time = TimeSpec {
        delta_hours: opts.delta_hours,
        start_time: opts.start_time,
        end_time: opts.end_time,
    };
    // Reject bad windows before touching the ledger or the network.
    time.resolve(now_epoch_millis())?;

    let target_index = opts.target_index.trim();
    if target_index.is_empty() {
        anyhow::bail!("target index cannot be empty");
    }
    let source_index = opts
        .source_index
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(cfg.query.source_index.as_str());

    let transport = HttpTransport::new(&HttpTransportOptions {
        base_url: cfg.nad.base_url.clone(),
        api_token: cfg.nad.api_token.clone(),
        verify_tls: cfg.nad.verify_tls,
        request_timeout_secs: cfg.nad.request_timeout_secs,
    })?;
    let ledger = Ledger::open(&paths.ledger_file)
        .with_context(|| format!("failed to open ledger {}", paths.ledger_file.display()))?;
    let _lock = PairLock::acquire(&paths.locks_dir, source_index, target_index)?;

    let request = RunRequest {
        filter: opts.filter.clone(),
        source_index: source_index.to_string(),
        target_index: target_index.to_string(),
        time,
    };
    let orchestrator = Orchestrator::new(&transport, &ledger, &ThreadSleeper, cfg.run_settings());
    let outcome = orchestrator.run(&request).inspect_err(|err| {
        tracing::error!(error = %err, "error during flow saving");
    })?;

    let mut report = CommandReport::new("save");
    report.detail(format!("source_index={source_index}"));
    report.detail(format!("target_index={target_index}"));
    report.detail(format!("start={}", outcome.time_range().start()));
    report.detail(format!("end={}", outcome.time_range().end()));
    report.detail(format!("ledger_file={}", ledger.path().display()));

    match &outcome {
        RunOutcome::NoFlows { .. } => {
            report.detail("queried=0");
            report.detail("result=no flows found matching the criteria");
        }
        RunOutcome::NothingNew { queried, .. } => {
            report.detail(format!("queried={queried}"));
            report.detail("new=0");
            report.detail("result=no new flows to save");
        }
        RunOutcome::Completed {
            queried,
            submitted,
            task,
            ..
        } => {
            report.detail(format!("queried={queried}"));
            report.detail(format!("new={}", submitted.len()));
            report.detail(format!("submitted={}", submitted.join(",")));
            report.detail(format!("task.id={}", task.task_id));
            report.detail(format!("task.state={}", task.state));
            if task.state != TaskState::Success {
                report.issue(format!(
                    "archival task {} finished with state {}",
                    task.task_id, task.state
                ));
            }
        }
    }

    Ok(report)
}
