use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

pub const LOG_FILE_NAME: &str = "nad-archive.log";

/// Install the global subscriber: a daily-rolling file in `logs_dir` plus
/// stderr. `RUST_LOG` wins over `default_level`. A bare level such as
/// `debug` applies to this crate only; dependencies stay at `warn`.
///
/// Keep the returned guard alive until exit or buffered file lines are lost.
pub fn init(logs_dir: &Path, default_level: &str) -> Result<WorkerGuard> {
    fs::create_dir_all(logs_dir)
        .with_context(|| format!("failed to create {}", logs_dir.display()))?;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(scoped_directives(default_level)))
        .with_context(|| format!("invalid log level `{default_level}`"))?;

    let file_appender = tracing_appender::rolling::daily(logs_dir, LOG_FILE_NAME);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_filter(env_filter);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(EnvFilter::new(scoped_directives(console_level(default_level))));

    // A second init in the same process keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .try_init();

    Ok(guard)
}

/// Full directive strings (`a=debug,warn`) pass through untouched.
fn scoped_directives(level: &str) -> String {
    let level = level.trim();
    if level.contains('=') || level.contains(',') {
        return level.to_string();
    }
    let others = match level.to_ascii_lowercase().as_str() {
        "error" => "error",
        "off" => "off",
        _ => "warn",
    };
    format!("{}={level},{others}", env!("CARGO_CRATE_NAME"))
}

/// stderr stays at info or quieter so reports on stdout remain readable.
fn console_level(default_level: &str) -> &'static str {
    match default_level.trim().to_ascii_lowercase().as_str() {
        "error" => "error",
        "warn" => "warn",
        "off" => "off",
        _ => "info",
    }
}

#[cfg(test)]
mod tests {
    use super::{console_level, scoped_directives};
    use tracing_subscriber::EnvFilter;

    #[test]
    fn console_never_gets_more_verbose_than_info() {
        assert_eq!(console_level("debug"), "info");
        assert_eq!(console_level("trace"), "info");
        assert_eq!(console_level("WARN"), "warn");
        assert_eq!(console_level("error"), "error");
    }

    #[test]
    fn bare_level_is_scoped_to_this_crate() {
        assert_eq!(scoped_directives("debug"), "nad_archive=debug,warn");
        assert_eq!(scoped_directives(" info "), "nad_archive=info,warn");
        assert_eq!(scoped_directives("error"), "nad_archive=error,error");
        assert!(EnvFilter::try_new(scoped_directives("trace")).is_ok());
    }

    #[test]
    fn explicit_directives_pass_through() {
        assert_eq!(
            scoped_directives("nad_archive=trace,reqwest=debug"),
            "nad_archive=trace,reqwest=debug"
        );
        assert_eq!(scoped_directives("hyper=info"), "hyper=info");
    }
}
