use crate::archiver::util::sanitize_component;
use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Exclusive advisory lock serializing archive runs for one
/// `(source_index, target_index)` pair. Released on drop.
#[derive(Debug)]
pub struct PairLock {
    file: File,
    path: PathBuf,
}

pub fn lock_path(locks_dir: &Path, source_index: &str, target_index: &str) -> PathBuf {
    locks_dir.join(format!(
        "{}__{}.lock",
        sanitize_component(source_index),
        sanitize_component(target_index)
    ))
}

impl PairLock {
    /// Block until the lock for the pair is free.
    pub fn acquire(locks_dir: &Path, source_index: &str, target_index: &str) -> Result<Self> {
        fs::create_dir_all(locks_dir)
            .with_context(|| format!("failed to create {}", locks_dir.display()))?;
        let path = lock_path(locks_dir, source_index, target_index);
        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .with_context(|| format!("failed to open {}", path.display()))?;

        if file.try_lock_exclusive().is_err() {
            tracing::info!(path = %path.display(), "another run holds the pair lock; waiting");
            file.lock_exclusive()
                .with_context(|| format!("failed to lock {}", path.display()))?;
        }

        file.set_len(0)?;
        writeln!(file, "{}", std::process::id())?;
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PairLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}
