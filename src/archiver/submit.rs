use crate::archiver::time_range::TimeRange;
use crate::archiver::util::truncate_with_ellipsis;
use crate::error::ArchiveError;
use crate::nad::transport::Transport;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

pub const SAVE_ENDPOINT: &str = "sources/save";
const LOGGED_BODY_CHARS: usize = 2_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Started,
    Progress,
    Success,
    Failure,
    Other(String),
}

impl TaskState {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "PENDING" => Self::Pending,
            "STARTED" => Self::Started,
            "PROGRESS" => Self::Progress,
            "SUCCESS" => Self::Success,
            "FAILURE" => Self::Failure,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "PENDING",
            Self::Started => "STARTED",
            Self::Progress => "PROGRESS",
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
            Self::Other(raw) => raw,
        }
    }

    /// Anything outside PENDING/STARTED/PROGRESS is final.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending | Self::Started | Self::Progress)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle to an archival job running on the appliance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivalTask {
    pub task_id: String,
    pub state: TaskState,
}

#[derive(Debug, Deserialize)]
struct TaskBody {
    id: Value,
    #[serde(default)]
    state: Option<String>,
}

impl ArchivalTask {
    /// Decode a `{id, state, ...}` task body.
    pub fn from_body(text: &str) -> Result<Self, String> {
        let body: TaskBody =
            serde_json::from_str(text).map_err(|err| format!("invalid task body: {err}"))?;
        let task_id = match body.id {
            Value::String(s) if !s.trim().is_empty() => s,
            Value::Number(n) => n.to_string(),
            other => return Err(format!("task body has no usable id: {other}")),
        };
        let state = TaskState::parse(body.state.as_deref().unwrap_or_default());
        Ok(Self { task_id, state })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SaveRequest<'a> {
    pub id: &'a [String],
    pub source: [&'a str; 1],
    pub start: i64,
    pub end: i64,
    pub target: &'a str,
}

pub struct TaskSubmitter<'a> {
    transport: &'a dyn Transport,
}

impl<'a> TaskSubmitter<'a> {
    pub fn new(transport: &'a dyn Transport) -> Self {
        Self { transport }
    }

    /// Ask the appliance to copy `flow_ids` from `source_index` into
    /// `target_index`. Returns the freshly created task.
    pub fn submit(
        &self,
        flow_ids: &[String],
        source_index: &str,
        target_index: &str,
        time_range: &TimeRange,
    ) -> Result<ArchivalTask, ArchiveError> {
        if flow_ids.is_empty() {
            return Err(ArchiveError::Submission {
                status: None,
                body: "refusing to submit an empty flow list".to_string(),
            });
        }

        let request = SaveRequest {
            id: flow_ids,
            source: [source_index],
            start: time_range.start(),
            end: time_range.end(),
            target: target_index,
        };
        let payload = serde_json::to_value(&request).map_err(|err| ArchiveError::Submission {
            status: None,
            body: format!("failed to encode save request: {err}"),
        })?;
        tracing::info!(
            flows = flow_ids.len(),
            target_index,
            "sending save request to {SAVE_ENDPOINT}"
        );
        tracing::debug!(%payload, "save request payload");

        let response = self
            .transport
            .post_json(SAVE_ENDPOINT, &payload)
            .map_err(|err| ArchiveError::Submission {
                status: None,
                body: err.to_string(),
            })?;
        tracing::debug!(
            status = response.status,
            headers = ?response.headers,
            body = %truncate_with_ellipsis(&response.text, LOGGED_BODY_CHARS),
            "save response"
        );
        if !response.is_success() {
            tracing::error!(status = response.status, "save request rejected");
            return Err(ArchiveError::Submission {
                status: Some(response.status),
                body: response.text,
            });
        }

        let task = ArchivalTask::from_body(&response.text).map_err(|message| {
            ArchiveError::Submission {
                status: Some(response.status),
                body: message,
            }
        })?;
        tracing::info!(task_id = %task.task_id, state = %task.state, "archival task created");
        Ok(task)
    }
}
