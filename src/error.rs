use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("invalid time specification: {0}")]
    InvalidTimeSpec(String),
    #[error("flow query failed{}: {message}", status_suffix(.status))]
    Query { status: Option<u16>, message: String },
    #[error("ledger already holds flow {flow_id} for {source_index} -> {target_index}")]
    DuplicateEntry {
        flow_id: String,
        source_index: String,
        target_index: String,
    },
    #[error("failed to save flows{}: {body}", status_suffix(.status))]
    Submission { status: Option<u16>, body: String },
    #[error("failed to check task status{}: {body}", status_suffix(.status))]
    TaskStatus { status: Option<u16>, body: String },
    #[error("task {task_id} still {last_state} after {attempts} status checks")]
    PollTimeout {
        task_id: String,
        attempts: u64,
        last_state: String,
    },
    #[error("ledger error: {0}")]
    Ledger(#[from] rusqlite::Error),
    #[error("io error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (status {code})"),
        None => String::new(),
    }
}

impl ArchiveError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
