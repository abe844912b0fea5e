use crate::error::ArchiveError;
use serde::Serialize;

const MILLIS_PER_HOUR: i64 = 3_600_000;

/// Closed window `[start, end]` in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeRange {
    start: i64,
    end: i64,
}

impl TimeRange {
    pub fn new(start: i64, end: i64) -> Result<Self, ArchiveError> {
        if start > end {
            return Err(ArchiveError::InvalidTimeSpec(format!(
                "start_time {start} is after end_time {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// The `hours` leading up to `now_ms`.
    pub fn lookback(now_ms: i64, hours: u64) -> Result<Self, ArchiveError> {
        let span = i64::try_from(hours)
            .ok()
            .and_then(|h| h.checked_mul(MILLIS_PER_HOUR))
            .ok_or_else(|| {
                ArchiveError::InvalidTimeSpec(format!("delta_hours {hours} is out of range"))
            })?;
        Self::new(now_ms.saturating_sub(span), now_ms)
    }

    pub fn start(&self) -> i64 {
        self.start
    }

    pub fn end(&self) -> i64 {
        self.end
    }
}

/// Either a relative lookback or an absolute window; exactly one is allowed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeSpec {
    pub delta_hours: Option<u64>,
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
}

impl TimeSpec {
    pub fn resolve(&self, now_ms: i64) -> Result<TimeRange, ArchiveError> {
        match (self.delta_hours, self.start_time, self.end_time) {
            (Some(_), Some(_), _) | (Some(_), _, Some(_)) => Err(ArchiveError::InvalidTimeSpec(
                "can't use both delta_hours and start_time/end_time".to_string(),
            )),
            (Some(0), None, None) => Err(ArchiveError::InvalidTimeSpec(
                "delta_hours must be at least 1".to_string(),
            )),
            (Some(hours), None, None) => TimeRange::lookback(now_ms, hours),
            (None, Some(start), Some(end)) => TimeRange::new(start, end),
            (None, _, _) => Err(ArchiveError::InvalidTimeSpec(
                "specify either delta_hours or both start_time and end_time".to_string(),
            )),
        }
    }
}
