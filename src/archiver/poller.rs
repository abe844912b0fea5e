use crate::archiver::submit::ArchivalTask;
use crate::archiver::util::truncate_with_ellipsis;
use crate::error::ArchiveError;
use crate::nad::transport::{Transport, path_segment};
use std::thread;
use std::time::Duration;

const LOGGED_BODY_CHARS: usize = 2_000;

pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// Blocks the calling thread.
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

pub struct TaskPoller<'a> {
    transport: &'a dyn Transport,
    sleeper: &'a dyn Sleeper,
    interval: Duration,
    max_attempts: Option<u64>,
}

impl<'a> TaskPoller<'a> {
    /// `max_attempts` of `None` keeps polling until the task finishes.
    pub fn new(
        transport: &'a dyn Transport,
        sleeper: &'a dyn Sleeper,
        interval: Duration,
        max_attempts: Option<u64>,
    ) -> Self {
        Self {
            transport,
            sleeper,
            interval,
            max_attempts,
        }
    }

    /// Re-fetch the task every `interval` until it leaves
    /// PENDING/STARTED/PROGRESS, then return it untouched.
    pub fn await_completion(&self, task: ArchivalTask) -> Result<ArchivalTask, ArchiveError> {
        let mut current = task;
        let mut attempts = 0u64;

        while !current.state.is_terminal() {
            if let Some(max) = self.max_attempts
                && attempts >= max
            {
                tracing::error!(
                    task_id = %current.task_id,
                    attempts,
                    state = %current.state,
                    "giving up on archival task"
                );
                return Err(ArchiveError::PollTimeout {
                    task_id: current.task_id,
                    attempts,
                    last_state: current.state.to_string(),
                });
            }

            tracing::info!(task_id = %current.task_id, state = %current.state, "checking task status");
            self.sleeper.sleep(self.interval);
            attempts += 1;
            current = self.fetch(&current.task_id)?;
            tracing::debug!(task_id = %current.task_id, state = %current.state, attempts, "task state");
        }

        tracing::info!(task_id = %current.task_id, state = %current.state, "task completed");
        Ok(current)
    }

    fn fetch(&self, task_id: &str) -> Result<ArchivalTask, ArchiveError> {
        let path = format!("tasks/{}", path_segment(task_id));
        let response = self
            .transport
            .get(&path)
            .map_err(|err| ArchiveError::TaskStatus {
                status: None,
                body: err.to_string(),
            })?;
        tracing::debug!(
            status = response.status,
            body = %truncate_with_ellipsis(&response.text, LOGGED_BODY_CHARS),
            "task status response"
        );
        if !response.is_success() {
            tracing::error!(status = response.status, task_id, "task status check failed");
            return Err(ArchiveError::TaskStatus {
                status: Some(response.status),
                body: response.text,
            });
        }
        ArchivalTask::from_body(&response.text).map_err(|message| ArchiveError::TaskStatus {
            status: Some(response.status),
            body: message,
        })
    }
}
