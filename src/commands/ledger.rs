use anyhow::{Context, Result};

use crate::archiver::config::ArchiverConfig;
use crate::archiver::ledger::Ledger;
use crate::archiver::paths::ArchivePaths;
use crate::commands::CommandReport;

#[derive(Debug, Clone, Default)]
pub struct LedgerOptions {
    pub source_index: Option<String>,
    pub target_index: Option<String>,
    pub flow_id: Option<String>,
    pub limit: usize,
}

pub fn run(cfg: &ArchiverConfig, paths: &ArchivePaths, opts: &LedgerOptions) -> Result<CommandReport> {
    let mut report = CommandReport::new("ledger");
    report.detail(format!("ledger_file={}", paths.ledger_file.display()));

    if !paths.ledger_file.exists() {
        report.detail("ledger.present=false");
        report.detail("flows=0");
        return Ok(report);
    }

    let ledger = Ledger::open(&paths.ledger_file)
        .with_context(|| format!("failed to open ledger {}", paths.ledger_file.display()))?;
    let source = opts.source_index.as_deref();
    let target = opts.target_index.as_deref();

    if let Some(flow_id) = opts.flow_id.as_deref() {
        let Some(target) = target else {
            report.issue("--flow-id needs --target to name the pair");
            return Ok(report);
        };
        let source = source.unwrap_or(cfg.query.source_index.as_str());
        let archived = ledger.contains(flow_id, source, target)?;
        report.detail(format!(
            "flow={flow_id} source_index={source} target_index={target} archived={archived}"
        ));
        return Ok(report);
    }

    report.detail("ledger.present=true");
    report.detail(format!("flows={}", ledger.count(source, target)?));
    for pair in ledger.pairs()? {
        if source.is_some_and(|s| s != pair.source_index)
            || target.is_some_and(|t| t != pair.target_index)
        {
            continue;
        }
        report.detail(format!(
            "pair source_index={} target_index={} flows={}",
            pair.source_index, pair.target_index, pair.flows
        ));
    }
    for entry in ledger.entries(source, target, opts.limit)? {
        report.detail(format!(
            "entry flow={} start={} end={} source_index={} target_index={}",
            entry.flow_id,
            entry.start.as_deref().unwrap_or("-"),
            entry.end.as_deref().unwrap_or("-"),
            entry.source_index,
            entry.target_index
        ));
    }

    Ok(report)
}
