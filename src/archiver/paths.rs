use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};

pub const DEFAULT_STORAGE_DIR_NAME: &str = "storage_output";
pub const DEFAULT_LEDGER_FILE_NAME: &str = "ptnad.db";

#[derive(Debug, Clone)]
pub struct ArchivePaths {
    pub storage_dir: PathBuf,
    pub ledger_file: PathBuf,
    pub logs_dir: PathBuf,
    pub locks_dir: PathBuf,
}

impl ArchivePaths {
    /// Everything lives under `storage_dir`.
    pub fn under(storage_dir: &Path) -> Self {
        Self {
            storage_dir: storage_dir.to_path_buf(),
            ledger_file: storage_dir.join(DEFAULT_LEDGER_FILE_NAME),
            logs_dir: storage_dir.to_path_buf(),
            locks_dir: storage_dir.join("locks"),
        }
    }
}

fn env_path(var: &str) -> Option<PathBuf> {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => Some(PathBuf::from(v.trim())),
        _ => None,
    }
}

/// `storage_override` (the `--storage-dir` flag) beats `NAD_ARCHIVE_HOME`,
/// which beats `./storage_output`.
pub fn resolve_paths(storage_override: Option<&Path>) -> Result<ArchivePaths> {
    let storage_dir = match storage_override {
        Some(dir) => dir.to_path_buf(),
        None => match env_path("NAD_ARCHIVE_HOME") {
            Some(dir) => dir,
            None => env::current_dir()
                .context("failed to resolve current directory")?
                .join(DEFAULT_STORAGE_DIR_NAME),
        },
    };

    let mut paths = ArchivePaths::under(&storage_dir);
    if let Some(ledger_file) = env_path("NAD_ARCHIVE_LEDGER_FILE") {
        paths.ledger_file = ledger_file;
    }
    if let Some(logs_dir) = env_path("NAD_ARCHIVE_LOGS_DIR") {
        paths.logs_dir = logs_dir;
    }
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn under_places_everything_in_storage_dir() {
        let paths = ArchivePaths::under(Path::new("/data/nad"));
        assert_eq!(paths.ledger_file, PathBuf::from("/data/nad/ptnad.db"));
        assert_eq!(paths.logs_dir, PathBuf::from("/data/nad"));
        assert_eq!(paths.locks_dir, PathBuf::from("/data/nad/locks"));
    }
}
