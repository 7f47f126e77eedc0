//! Process-output relay.
//!
//! [`ProcessRelay`] owns the global subscriber slot and the job registry.
//! Starting an execution registers a job and spawns a supervisor task that
//! runs the external executable and forwards its output as
//! [`RelayEvent`](crate::event::RelayEvent)s to the global subscriber and to
//! the job's own channel.

mod decoder;
pub mod jobs;
pub mod slot;
mod supervisor;

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;

pub use decoder::Utf8Chunker;
pub use jobs::{JobRegistry, JobState, JobSummary};
pub use slot::{SubscriberId, SubscriberSlot};

use crate::error::CoreError;
use crate::event::{display_command_line, RelayEvent};
use crate::types::JobId;

use slot::EventReceiver;

/// Default number of events kept per job for replay.
pub const DEFAULT_BACKLOG_LIMIT: usize = 10_000;

/// Default time a terminated job stays inspectable.
pub const DEFAULT_JOB_RETENTION: Duration = Duration::from_secs(300);

/// Errors raised while driving the child process.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("{program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to wait for process: {0}")]
    Wait(#[source] std::io::Error),
}

/// How the relay launches the external executable.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Path of the external executable.
    pub executable: PathBuf,
    /// Working directory of the child (inherits ours if `None`).
    pub working_dir: Option<PathBuf>,
    /// Kill a job that runs longer than this.
    pub exec_timeout: Option<Duration>,
    /// Cancel jobs when the subscriber that watched them disconnects.
    pub kill_on_disconnect: bool,
    /// How long terminated jobs remain in the registry.
    pub job_retention: Duration,
    /// Maximum events kept per job for replay.
    pub backlog_limit: usize,
}

impl RelayConfig {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            working_dir: None,
            exec_timeout: None,
            kill_on_disconnect: false,
            job_retention: DEFAULT_JOB_RETENTION,
            backlog_limit: DEFAULT_BACKLOG_LIMIT,
        }
    }
}

/// State shared between the relay handle, supervisor tasks and
/// subscriptions.
pub(crate) struct RelayShared {
    pub(crate) config: RelayConfig,
    pub(crate) slot: SubscriberSlot,
    pub(crate) jobs: JobRegistry,
}

impl RelayShared {
    /// Fan an event out to the global subscriber and the job's channel.
    pub(crate) fn emit(&self, job_id: JobId, event: RelayEvent) {
        let delivered = self.slot.send(&event);
        tracing::trace!(%job_id, kind = ?event.kind, delivered, "Relay event");
        self.jobs.publish(job_id, &event);
    }

    fn on_disconnect(&self, id: SubscriberId) {
        if !self.slot.detach(id) {
            return;
        }
        tracing::info!(subscriber_id = %id, "Subscriber disconnected");
        if self.config.kill_on_disconnect {
            let cancelled = self.jobs.cancel_observed_by(id);
            if cancelled > 0 {
                tracing::info!(subscriber_id = %id, cancelled, "Cancelled jobs of disconnected subscriber");
            }
        }
    }
}

/// Handle to the process relay. Cheap to clone.
#[derive(Clone)]
pub struct ProcessRelay {
    shared: Arc<RelayShared>,
}

impl ProcessRelay {
    pub fn new(config: RelayConfig) -> Self {
        let jobs = JobRegistry::new(config.backlog_limit);
        Self {
            shared: Arc::new(RelayShared {
                config,
                slot: SubscriberSlot::new(),
                jobs,
            }),
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.shared.config
    }

    /// Attach as the global subscriber, replacing any previous one.
    pub fn subscribe(&self) -> Subscription {
        let (id, rx) = self.shared.slot.attach();
        tracing::info!(subscriber_id = %id, "Subscriber attached");
        Subscription {
            rx,
            owner: Some((id, Arc::clone(&self.shared))),
        }
    }

    /// Open the dedicated channel of one job.
    pub fn subscribe_job(&self, id: JobId) -> Result<Subscription, CoreError> {
        let rx = self.shared.jobs.subscribe(id)?;
        Ok(Subscription { rx, owner: None })
    }

    /// Start the executable with `args` and return the new job's id.
    ///
    /// Returns immediately; the spawn outcome is reported through events.
    /// Must be called from within a Tokio runtime.
    pub fn start(&self, args: Vec<String>) -> JobId {
        let command_line = display_command_line(&self.shared.config.executable, &args);
        let observer = self.shared.slot.current_id();
        let (job_id, cancel) = self.shared.jobs.register(command_line, observer);
        tracing::info!(%job_id, ?args, "Execution requested");

        tokio::spawn(supervisor::supervise(
            Arc::clone(&self.shared),
            job_id,
            args,
            cancel,
        ));
        job_id
    }

    /// Kill a running job.
    pub fn cancel(&self, id: JobId) -> Result<(), CoreError> {
        self.shared.jobs.cancel(id)?;
        tracing::info!(job_id = %id, "Cancellation requested");
        Ok(())
    }

    pub fn job(&self, id: JobId) -> Option<JobSummary> {
        self.shared.jobs.summary(id)
    }

    pub fn jobs(&self) -> Vec<JobSummary> {
        self.shared.jobs.list()
    }

    pub fn running_jobs(&self) -> usize {
        self.shared.jobs.running_count()
    }

    pub fn has_subscriber(&self) -> bool {
        self.shared.slot.is_attached()
    }

    /// Remove terminated jobs older than the configured retention.
    pub fn sweep_finished(&self) -> usize {
        self.shared.jobs.sweep(self.shared.config.job_retention)
    }

    /// Cancel every running job and close the global subscriber.
    ///
    /// Per-job streams end as their jobs terminate.
    pub fn shutdown(&self) {
        let cancelled = self.shared.jobs.cancel_all();
        let closed = self.shared.slot.close().is_some();
        tracing::info!(cancelled, closed, "Relay shut down");
    }
}

/// A stream of relay events for one connection.
///
/// Dropping the global subscription detaches it from the slot, unless it
/// was already replaced or closed by the relay.
pub struct Subscription {
    rx: EventReceiver,
    owner: Option<(SubscriberId, Arc<RelayShared>)>,
}

impl Subscription {
    /// Id of the global attachment, `None` for per-job channels.
    pub fn subscriber_id(&self) -> Option<SubscriberId> {
        self.owner.as_ref().map(|(id, _)| *id)
    }

    /// Next event, or `None` once the stream was closed.
    pub async fn recv(&mut self) -> Option<RelayEvent> {
        self.rx.recv().await
    }

    pub fn poll_recv(&mut self, cx: &mut Context<'_>) -> Poll<Option<RelayEvent>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some((id, shared)) = self.owner.take() {
            shared.on_disconnect(id);
        }
    }
}

/// Lock a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
