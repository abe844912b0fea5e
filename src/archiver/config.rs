use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NadConfig {
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default = "default_verify_tls")]
    pub verify_tls: bool,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_verify_tls() -> bool {
    true
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for NadConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_token: None,
            verify_tls: default_verify_tls(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub source_index: String,
    pub batch_size: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            source_index: "2".to_string(),
            batch_size: 1_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub interval_secs: u64,
    /// Zero means poll until the task finishes.
    pub max_attempts: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            max_attempts: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "debug".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ArchiverConfig {
    pub nad: NadConfig,
    pub query: QueryConfig,
    pub poll: PollConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialArchiverConfig {
    nad: Option<NadConfig>,
    query: Option<QueryConfig>,
    poll: Option<PollConfig>,
    logging: Option<LoggingConfig>,
}

/// The knobs one orchestration run needs, detached from where they came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    pub batch_size: usize,
    pub poll_interval: Duration,
    pub max_poll_attempts: Option<u64>,
}

impl Default for RunSettings {
    fn default() -> Self {
        ArchiverConfig::default().run_settings()
    }
}

impl ArchiverConfig {
    pub fn run_settings(&self) -> RunSettings {
        RunSettings {
            batch_size: self.query.batch_size,
            poll_interval: Duration::from_secs(self.poll.interval_secs),
            max_poll_attempts: (self.poll.max_attempts > 0).then_some(self.poll.max_attempts),
        }
    }
}

fn env_or_u64(var: &str, fallback: u64) -> u64 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u64>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_usize(var: &str, fallback: usize) -> usize {
    match env::var(var) {
        Ok(v) => v.trim().parse::<usize>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_bool(var: &str, fallback: bool) -> bool {
    match env::var(var) {
        Ok(v) => {
            let trimmed = v.trim();
            match trimmed {
                "1" | "true" | "TRUE" | "yes" | "on" => true,
                "0" | "false" | "FALSE" | "no" | "off" => false,
                _ => fallback,
            }
        }
        Err(_) => fallback,
    }
}

fn env_or_string(var: &str, fallback: &str) -> String {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => fallback.to_string(),
    }
}

fn env_optional_string(var: &str, fallback: Option<String>) -> Option<String> {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => fallback,
    }
}

pub fn validate(cfg: &ArchiverConfig) -> Result<()> {
    if cfg.query.batch_size == 0 {
        return Err(anyhow!("invalid query batch size: must be >= 1"));
    }
    if cfg.query.source_index.trim().is_empty() {
        return Err(anyhow!("invalid default source index: cannot be empty"));
    }
    if cfg.poll.interval_secs == 0 {
        return Err(anyhow!("invalid poll interval: must be >= 1 second"));
    }
    if cfg.nad.request_timeout_secs == 0 {
        return Err(anyhow!("invalid request timeout: must be >= 1 second"));
    }
    let base_url = cfg.nad.base_url.trim();
    if !base_url.is_empty() && !base_url.starts_with("http://") && !base_url.starts_with("https://")
    {
        return Err(anyhow!(
            "invalid NAD base URL `{base_url}`: must start with http:// or https://"
        ));
    }
    EnvFilter::try_new(&cfg.logging.level)
        .map_err(|err| anyhow!("invalid log level `{}`: {err}", cfg.logging.level))?;
    Ok(())
}

pub fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(custom) = env::var("NAD_ARCHIVE_CONFIG_PATH") {
        let trimmed = custom.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }

    let config_dir = dirs::config_dir()?;
    Some(config_dir.join("nad-archive").join("config.toml"))
}

fn merge_file_config(base: &mut ArchiverConfig) -> Result<()> {
    let Some(path) = resolve_config_path() else {
        return Ok(());
    };
    if !path.exists() {
        return Ok(());
    }

    let raw = fs::read_to_string(&path)?;
    merge_toml(base, &raw)
        .map_err(|err| anyhow!("failed to parse nad-archive config {}: {err}", path.display()))
}

fn merge_toml(base: &mut ArchiverConfig, raw: &str) -> Result<(), toml::de::Error> {
    let parsed: PartialArchiverConfig = toml::from_str(raw)?;
    if let Some(nad) = parsed.nad {
        base.nad = nad;
    }
    if let Some(query) = parsed.query {
        base.query = query;
    }
    if let Some(poll) = parsed.poll {
        base.poll = poll;
    }
    if let Some(logging) = parsed.logging {
        base.logging = logging;
    }
    Ok(())
}

fn apply_env_overrides(cfg: &mut ArchiverConfig) {
    cfg.nad.base_url = env_or_string("NAD_ARCHIVE_BASE_URL", &cfg.nad.base_url);
    cfg.nad.api_token = env_optional_string("NAD_ARCHIVE_API_TOKEN", cfg.nad.api_token.take());
    cfg.nad.verify_tls = env_or_bool("NAD_ARCHIVE_VERIFY_TLS", cfg.nad.verify_tls);
    cfg.nad.request_timeout_secs = env_or_u64(
        "NAD_ARCHIVE_REQUEST_TIMEOUT_SECS",
        cfg.nad.request_timeout_secs,
    );
    cfg.query.source_index = env_or_string("NAD_ARCHIVE_SOURCE_INDEX", &cfg.query.source_index);
    cfg.query.batch_size = env_or_usize("NAD_ARCHIVE_BATCH_SIZE", cfg.query.batch_size);
    cfg.poll.interval_secs = env_or_u64("NAD_ARCHIVE_POLL_INTERVAL_SECS", cfg.poll.interval_secs);
    cfg.poll.max_attempts = env_or_u64("NAD_ARCHIVE_POLL_MAX_ATTEMPTS", cfg.poll.max_attempts);
    cfg.logging.level = env_or_string("NAD_ARCHIVE_LOG_LEVEL", &cfg.logging.level);
}

pub fn load_config() -> Result<ArchiverConfig> {
    let mut cfg = ArchiverConfig::default();
    merge_file_config(&mut cfg)?;
    apply_env_overrides(&mut cfg);
    validate(&cfg)?;
    Ok(cfg)
}
