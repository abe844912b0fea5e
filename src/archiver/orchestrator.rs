use crate::archiver::config::RunSettings;
use crate::archiver::dedup::filter_new;
use crate::archiver::ledger::Ledger;
use crate::archiver::poller::{Sleeper, TaskPoller};
use crate::archiver::query::FlowQueryClient;
use crate::archiver::submit::{ArchivalTask, TaskSubmitter};
use crate::archiver::time_range::{TimeRange, TimeSpec};
use crate::archiver::util::now_epoch_millis;
use crate::error::ArchiveError;
use crate::nad::transport::Transport;

#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    pub filter: Option<String>,
    pub source_index: String,
    pub target_index: String,
    pub time: TimeSpec,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The query matched nothing; nothing was written or sent.
    NoFlows { time_range: TimeRange },
    /// Every queried flow was already in the ledger for this pair.
    NothingNew {
        time_range: TimeRange,
        queried: usize,
    },
    Completed {
        time_range: TimeRange,
        queried: usize,
        submitted: Vec<String>,
        task: ArchivalTask,
    },
}

impl RunOutcome {
    pub fn time_range(&self) -> &TimeRange {
        match self {
            Self::NoFlows { time_range }
            | Self::NothingNew { time_range, .. }
            | Self::Completed { time_range, .. } => time_range,
        }
    }

    pub fn task(&self) -> Option<&ArchivalTask> {
        match self {
            Self::Completed { task, .. } => Some(task),
            _ => None,
        }
    }
}

/// One query -> dedup -> submit -> poll pass for a `(source, target)` pair.
pub struct Orchestrator<'a> {
    transport: &'a dyn Transport,
    ledger: &'a Ledger,
    sleeper: &'a dyn Sleeper,
    settings: RunSettings,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        transport: &'a dyn Transport,
        ledger: &'a Ledger,
        sleeper: &'a dyn Sleeper,
        settings: RunSettings,
    ) -> Self {
        Self {
            transport,
            ledger,
            sleeper,
            settings,
        }
    }

    pub fn run(&self, request: &RunRequest) -> Result<RunOutcome, ArchiveError> {
        self.run_at(request, now_epoch_millis())
    }

    pub fn run_at(&self, request: &RunRequest, now_ms: i64) -> Result<RunOutcome, ArchiveError> {
        let time_range = request.time.resolve(now_ms)?;
        let filter = request
            .filter
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty());
        tracing::info!(
            start = time_range.start(),
            end = time_range.end(),
            filter = filter.unwrap_or_default(),
            source_index = %request.source_index,
            target_index = %request.target_index,
            "query flows"
        );

        let flows = FlowQueryClient::new(self.transport, self.settings.batch_size).query_flows(
            &time_range,
            &request.source_index,
            filter,
        )?;
        tracing::info!(received = flows.len(), "received flows");
        if flows.is_empty() {
            tracing::warn!("no flows found matching the criteria");
            return Ok(RunOutcome::NoFlows { time_range });
        }
        let queried = flows.len();

        let new_flows = filter_new(
            self.ledger,
            flows,
            &request.source_index,
            &request.target_index,
        )?;
        if new_flows.is_empty() {
            tracing::info!("no new flows to save");
            return Ok(RunOutcome::NothingNew {
                time_range,
                queried,
            });
        }

        let flow_ids: Vec<String> = new_flows.iter().filter_map(|flow| flow.id()).collect();
        tracing::info!(?flow_ids, "flow ids to save");
        let task = TaskSubmitter::new(self.transport).submit(
            &flow_ids,
            &request.source_index,
            &request.target_index,
            &time_range,
        )?;

        let poller = TaskPoller::new(
            self.transport,
            self.sleeper,
            self.settings.poll_interval,
            self.settings.max_poll_attempts,
        );
        let task = poller.await_completion(task)?;

        Ok(RunOutcome::Completed {
            time_range,
            queried,
            submitted: flow_ids,
            task,
        })
    }
}
