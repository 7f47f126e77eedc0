//! Supervision of a single child process.
//!
//! Spawns the executable, pumps stdout and stderr as they arrive, waits for
//! exit (or cancellation/timeout) and reports the terminal state. The end
//! banner is emitted only after both output pipes reached EOF and the exit
//! status is known.

use std::future::pending;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::event::{EventKind, RelayEvent};
use crate::types::JobId;

use super::decoder::Utf8Chunker;
use super::jobs::JobState;
use super::{RelayConfig, RelayError, RelayShared};

/// Size of a single read from a child pipe.
const READ_CHUNK_BYTES: usize = 8 * 1024;

/// Exit code reported when the process was killed by a signal.
const SIGNAL_EXIT_CODE: i32 = -1;

/// How long output may keep flowing once the job was killed.
const DRAIN_AFTER_KILL: Duration = Duration::from_secs(2);

/// Why the supervisor stopped waiting on the child.
enum Ending {
    Exited,
    Cancelled,
    TimedOut(Duration),
}

/// Run one job to completion.
pub(crate) async fn supervise(
    shared: Arc<RelayShared>,
    job_id: JobId,
    args: Vec<String>,
    cancel: CancellationToken,
) {
    let mut child = match spawn_child(&shared.config, &args) {
        Ok(child) => child,
        Err(err) => {
            tracing::warn!(%job_id, error = %err, "Failed to start executable");
            shared.emit(job_id, RelayEvent::spawn_failure(&err));
            shared.jobs.finish(
                job_id,
                JobState::FailedToStart {
                    message: err.to_string(),
                },
            );
            shared.slot.close();
            return;
        }
    };

    shared.jobs.mark_running(job_id);
    if let Some(summary) = shared.jobs.summary(job_id) {
        shared.emit(job_id, RelayEvent::start_banner(&summary.command_line));
    }
    tracing::info!(%job_id, pid = ?child.id(), "Process started");

    let pumps: Vec<JoinHandle<()>> = [
        child
            .stdout
            .take()
            .map(|out| spawn_pump(Arc::clone(&shared), job_id, out, EventKind::Stdout)),
        child
            .stderr
            .take()
            .map(|err| spawn_pump(Arc::clone(&shared), job_id, err, EventKind::Stderr)),
    ]
    .into_iter()
    .flatten()
    .collect();

    let (ending, status) =
        match wait_for_exit(&mut child, &cancel, shared.config.exec_timeout).await {
            (Ending::Exited, Some(status)) => (Ending::Exited, status),
            (ending, _) => {
                let notice = match &ending {
                    Ending::TimedOut(limit) => format!("✖ Timed out after {limit:?}"),
                    _ => "✖ Cancellation requested".to_string(),
                };
                shared.emit(job_id, RelayEvent::info(notice));
                (ending, kill(&mut child).await)
            }
        };

    // Drain the pipes before the end banner so it follows the last chunk.
    // After a kill, a descendant that escaped the process group may still
    // hold a pipe open, so the drain is bounded.
    let drain_limit = match ending {
        Ending::Exited => None,
        Ending::Cancelled | Ending::TimedOut(_) => Some(DRAIN_AFTER_KILL),
    };
    for mut pump in pumps {
        let joined = match drain_limit {
            Some(limit) => match tokio::time::timeout(limit, &mut pump).await {
                Ok(joined) => joined,
                Err(_) => {
                    tracing::warn!(%job_id, "Output still open after kill, abandoning reader");
                    pump.abort();
                    continue;
                }
            },
            None => pump.await,
        };
        if let Err(e) = joined {
            tracing::warn!(%job_id, error = %e, "Output reader task failed");
        }
    }

    let exit_code = match status {
        Ok(status) => status.code().unwrap_or(SIGNAL_EXIT_CODE),
        Err(e) => {
            let err = RelayError::Wait(e);
            tracing::error!(%job_id, error = %err, "Lost track of child process");
            shared.emit(job_id, RelayEvent::stderr(err.to_string()));
            SIGNAL_EXIT_CODE
        }
    };
    let state = match ending {
        Ending::Exited => JobState::Finished { exit_code },
        Ending::Cancelled => JobState::Cancelled { exit_code },
        Ending::TimedOut(_) => JobState::TimedOut { exit_code },
    };

    shared.emit(job_id, RelayEvent::end_banner(exit_code));
    tracing::info!(%job_id, exit_code, state = ?state, "Process finished");

    shared.jobs.finish(job_id, state);
    if let Some(subscriber_id) = shared.slot.close() {
        tracing::debug!(%job_id, %subscriber_id, "Closed subscriber after job end");
    }
}

fn spawn_child(config: &RelayConfig, args: &[String]) -> Result<Child, RelayError> {
    let mut cmd = Command::new(&config.executable);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    // Own process group, so a kill also reaches the executable's children.
    #[cfg(unix)]
    cmd.process_group(0);

    if let Some(dir) = &config.working_dir {
        cmd.current_dir(dir);
    }

    cmd.spawn().map_err(|source| RelayError::Spawn {
        program: config.executable.display().to_string(),
        source,
    })
}

/// Wait for the child to exit, or for cancellation or the timeout to fire.
///
/// The exit status is only present for [`Ending::Exited`].
async fn wait_for_exit(
    child: &mut Child,
    cancel: &CancellationToken,
    timeout: Option<Duration>,
) -> (Ending, Option<std::io::Result<ExitStatus>>) {
    let deadline = async {
        match timeout {
            Some(limit) => {
                tokio::time::sleep(limit).await;
                limit
            }
            None => pending::<Duration>().await,
        }
    };

    tokio::select! {
        status = child.wait() => (Ending::Exited, Some(status)),
        () = cancel.cancelled() => (Ending::Cancelled, None),
        limit = deadline => (Ending::TimedOut(limit), None),
    }
}

/// Kill the child's whole process group and reap the child.
async fn kill(child: &mut Child) -> std::io::Result<ExitStatus> {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        kill_process_group(pid);
    }
    if let Err(e) = child.start_kill() {
        tracing::debug!(error = %e, "Kill signal not delivered");
    }
    child.wait().await
}

#[cfg(unix)]
fn kill_process_group(pid: u32) {
    let Ok(pgid) = libc::pid_t::try_from(pid) else {
        return;
    };
    // Safety: kill(2) with a negative pid only signals the group; no memory
    // is shared with the callee.
    let ret = unsafe { libc::kill(-pgid, libc::SIGKILL) };
    if ret != 0 {
        tracing::debug!(
            pgid,
            error = %std::io::Error::last_os_error(),
            "Process group kill failed"
        );
    }
}

/// Read a pipe chunk by chunk, emitting one event per decoded chunk.
fn spawn_pump<R>(
    shared: Arc<RelayShared>,
    job_id: JobId,
    mut reader: R,
    kind: EventKind,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut decoder = Utf8Chunker::new();
        let mut buf = vec![0u8; READ_CHUNK_BYTES];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    if let Some(data) = decoder.push(&buf[..n]) {
                        shared.emit(job_id, RelayEvent { kind, data });
                    }
                }
                Err(e) => {
                    tracing::debug!(%job_id, error = %e, "Pipe read failed");
                    break;
                }
            }
        }
        if let Some(data) = decoder.finish() {
            shared.emit(job_id, RelayEvent { kind, data });
        }
    })
}
