//! In-memory registry of executions.
//!
//! Each job owns a dedicated event channel: events are appended to a bounded
//! backlog and forwarded to every per-job listener, so a client that learns
//! the job id after the process already started still sees the whole run.
//! Terminated jobs stay in the registry until swept.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::CoreError;
use crate::event::RelayEvent;
use crate::types::{JobId, Timestamp};

use super::lock;
use super::slot::{EventReceiver, EventSender, SubscriberId};

/// Notice replayed in front of a backlog that lost its oldest events.
pub const BACKLOG_TRUNCATED_NOTICE: &str = "… earlier output dropped (backlog limit reached) …";

/// Lifecycle state of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobState {
    /// Registered, process not spawned yet.
    Starting,
    Running,
    Finished { exit_code: i32 },
    FailedToStart { message: String },
    Cancelled { exit_code: i32 },
    TimedOut { exit_code: i32 },
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Starting | Self::Running)
    }
}

/// Public view of a job.
#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    pub id: JobId,
    pub command_line: String,
    #[serde(flatten)]
    pub state: JobState,
    pub started_at: Timestamp,
    pub finished_at: Option<Timestamp>,
}

struct JobRecord {
    command_line: String,
    state: JobState,
    started_at: Timestamp,
    finished_at: Option<Timestamp>,
    /// Global subscriber attached when the job was started.
    observer: Option<SubscriberId>,
    backlog: VecDeque<RelayEvent>,
    truncated: bool,
    listeners: Vec<EventSender>,
    cancel: CancellationToken,
}

impl JobRecord {
    fn summary(&self, id: JobId) -> JobSummary {
        JobSummary {
            id,
            command_line: self.command_line.clone(),
            state: self.state.clone(),
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }
}

/// Thread-safe registry of all known jobs.
pub struct JobRegistry {
    jobs: Mutex<HashMap<JobId, JobRecord>>,
    backlog_limit: usize,
}

impl JobRegistry {
    /// Create a registry keeping at most `backlog_limit` events per job.
    pub fn new(backlog_limit: usize) -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            backlog_limit: backlog_limit.max(1),
        }
    }

    /// Register a new job in the `Starting` state.
    ///
    /// Returns its id and the token that cancels it.
    pub fn register(
        &self,
        command_line: String,
        observer: Option<SubscriberId>,
    ) -> (JobId, CancellationToken) {
        let id = uuid::Uuid::new_v4();
        let cancel = CancellationToken::new();
        let record = JobRecord {
            command_line,
            state: JobState::Starting,
            started_at: chrono::Utc::now(),
            finished_at: None,
            observer,
            backlog: VecDeque::new(),
            truncated: false,
            listeners: Vec::new(),
            cancel: cancel.clone(),
        };
        lock(&self.jobs).insert(id, record);
        (id, cancel)
    }

    /// Record an event for a job and forward it to its listeners.
    pub fn publish(&self, id: JobId, event: &RelayEvent) {
        let mut jobs = lock(&self.jobs);
        let Some(job) = jobs.get_mut(&id) else {
            return;
        };

        if job.backlog.len() >= self.backlog_limit {
            job.backlog.pop_front();
            job.truncated = true;
        }
        job.backlog.push_back(event.clone());
        job.listeners
            .retain(|listener| listener.send(event.clone()).is_ok());
    }

    pub fn mark_running(&self, id: JobId) {
        if let Some(job) = lock(&self.jobs).get_mut(&id) {
            job.state = JobState::Running;
        }
    }

    /// Move a job into a terminal state and end all its listener streams.
    pub fn finish(&self, id: JobId, state: JobState) {
        if let Some(job) = lock(&self.jobs).get_mut(&id) {
            job.state = state;
            job.finished_at = Some(chrono::Utc::now());
            job.listeners.clear();
        }
    }

    /// Open a per-job channel: the backlog is replayed first, then live
    /// events follow until the job terminates.
    pub fn subscribe(&self, id: JobId) -> Result<EventReceiver, CoreError> {
        let mut jobs = lock(&self.jobs);
        let job = jobs.get_mut(&id).ok_or(CoreError::NotFound { entity: "job", id })?;

        let (tx, rx) = mpsc::unbounded_channel();
        if job.truncated {
            let _ = tx.send(RelayEvent::info(BACKLOG_TRUNCATED_NOTICE));
        }
        for event in &job.backlog {
            let _ = tx.send(event.clone());
        }
        if !job.state.is_terminal() {
            job.listeners.push(tx);
        }
        Ok(rx)
    }

    /// Request cancellation of a job that has not terminated yet.
    pub fn cancel(&self, id: JobId) -> Result<(), CoreError> {
        let jobs = lock(&self.jobs);
        let job = jobs.get(&id).ok_or(CoreError::NotFound { entity: "job", id })?;
        if job.state.is_terminal() {
            return Err(CoreError::Conflict(format!("job {id} is not running")));
        }
        if job.cancel.is_cancelled() {
            return Err(CoreError::Conflict(format!("job {id} is already being cancelled")));
        }
        job.cancel.cancel();
        Ok(())
    }

    /// Cancel every live job that was started while `observer` was attached.
    pub fn cancel_observed_by(&self, observer: SubscriberId) -> usize {
        let jobs = lock(&self.jobs);
        let mut count = 0;
        for job in jobs.values() {
            if job.observer == Some(observer) && !job.state.is_terminal() {
                job.cancel.cancel();
                count += 1;
            }
        }
        count
    }

    /// Cancel every live job.
    pub fn cancel_all(&self) -> usize {
        let jobs = lock(&self.jobs);
        let mut count = 0;
        for job in jobs.values().filter(|job| !job.state.is_terminal()) {
            job.cancel.cancel();
            count += 1;
        }
        count
    }

    pub fn summary(&self, id: JobId) -> Option<JobSummary> {
        lock(&self.jobs).get(&id).map(|job| job.summary(id))
    }

    /// All jobs, most recently started first.
    pub fn list(&self) -> Vec<JobSummary> {
        let mut summaries: Vec<JobSummary> = lock(&self.jobs)
            .iter()
            .map(|(id, job)| job.summary(*id))
            .collect();
        summaries.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        summaries
    }

    pub fn running_count(&self) -> usize {
        lock(&self.jobs)
            .values()
            .filter(|job| !job.state.is_terminal())
            .count()
    }

    /// Drop terminated jobs that finished more than `retention` ago.
    pub fn sweep(&self, retention: Duration) -> usize {
        let retention =
            chrono::Duration::from_std(retention).unwrap_or_else(|_| chrono::Duration::days(365));
        let cutoff = chrono::Utc::now() - retention;
        let mut jobs = lock(&self.jobs);
        let before = jobs.len();
        jobs.retain(|_, job| match job.finished_at {
            Some(finished_at) => finished_at > cutoff,
            None => true,
        });
        before - jobs.len()
    }
}
