use anyhow::Result;

use crate::archiver::config::{ArchiverConfig, resolve_config_path};
use crate::archiver::paths::ArchivePaths;
use crate::commands::CommandReport;
use crate::env_loader::unknown_process_env_keys;

pub fn run(cfg: &ArchiverConfig, paths: &ArchivePaths) -> Result<CommandReport> {
    let mut report = CommandReport::new("status");

    report.detail(format!("build_id={}", env!("BUILD_UUID")));
    report.detail(format!("storage_dir={}", paths.storage_dir.display()));
    report.detail(format!("ledger_file={}", paths.ledger_file.display()));
    report.detail(format!("ledger.present={}", paths.ledger_file.exists()));
    report.detail(format!("logs_dir={}", paths.logs_dir.display()));
    report.detail(format!("locks_dir={}", paths.locks_dir.display()));
    match resolve_config_path() {
        Some(path) => report.detail(format!(
            "config_file={} present={}",
            path.display(),
            path.exists()
        )),
        None => report.detail("config_file=none"),
    }

    let base_url = cfg.nad.base_url.trim();
    report.detail(format!(
        "nad.base_url={}",
        if base_url.is_empty() { "-" } else { base_url }
    ));
    report.detail(format!(
        "nad.api_token={}",
        if cfg.nad.api_token.is_some() {
            "set"
        } else {
            "unset"
        }
    ));
    report.detail(format!("nad.verify_tls={}", cfg.nad.verify_tls));
    report.detail(format!(
        "nad.request_timeout_secs={}",
        cfg.nad.request_timeout_secs
    ));
    report.detail(format!("query.source_index={}", cfg.query.source_index));
    report.detail(format!("query.batch_size={}", cfg.query.batch_size));
    report.detail(format!("poll.interval_secs={}", cfg.poll.interval_secs));
    report.detail(format!(
        "poll.max_attempts={}",
        match cfg.poll.max_attempts {
            0 => "unbounded".to_string(),
            n => n.to_string(),
        }
    ));
    report.detail(format!("logging.level={}", cfg.logging.level));

    if base_url.is_empty() {
        report.issue("NAD base URL is not configured (NAD_ARCHIVE_BASE_URL or [nad].base_url)");
    }
    for key in unknown_process_env_keys() {
        report.issue(format!("unknown environment variable {key}"));
    }

    Ok(report)
}
