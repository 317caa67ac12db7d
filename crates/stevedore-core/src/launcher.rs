//! Job launching in attached and detached mode

use crate::{Job, JobId, LaunchMode, LogShipper, Result, RuntimeCli, TerminalStatus};
use std::sync::Arc;
use stevedore_ssh::{RemoteExecutor, RetryPolicy};
use tokio::sync::{mpsc, oneshot};

/// How a launch left the job attached to this process
pub enum LaunchOutcome {
    /// The remote runtime keeps the container alive on its own
    Detached,
    /// A dedicated session holds the job's channel open; the receiver
    /// resolves exactly once when that channel closes
    Attached {
        completion: oneshot::Receiver<TerminalStatus>,
    },
}

/// Starts jobs and resolves their native process id
pub struct JobLauncher {
    executor: Arc<dyn RemoteExecutor>,
    runtime: RuntimeCli,
    shipper: LogShipper,
    pid_retry: RetryPolicy,
}

impl JobLauncher {
    pub fn new(
        executor: Arc<dyn RemoteExecutor>,
        runtime: RuntimeCli,
        shipper: LogShipper,
        pid_retry: RetryPolicy,
    ) -> Self {
        Self {
            executor,
            runtime,
            shipper,
            pid_retry,
        }
    }

    /// Issue the job's launch command, then resolve its process id.
    ///
    /// Detached launches return as soon as the command has been issued on
    /// a short-lived connection. Attached launches keep a dedicated
    /// session open for the container's lifetime, streaming output into
    /// the job's log file.
    pub async fn launch(&self, job: &mut Job) -> Result<LaunchOutcome> {
        let outcome = match job.mode {
            LaunchMode::Detached => {
                let result = self.executor.exec_once(&job.command).await?;
                if !result.success() {
                    // The runtime may still have accepted the container;
                    // polling decides the job's fate either way.
                    tracing::warn!(
                        "Launch command for job {} exited with {:?}: {}",
                        job.id,
                        result.exit_code,
                        result.stderr_lossy().trim()
                    );
                }
                LaunchOutcome::Detached
            }
            LaunchMode::Attached => LaunchOutcome::Attached {
                completion: self.spawn_attached(job),
            },
        };

        match self.resolve_process_id(&job.id).await {
            Some(pid) => job.process_id = pid,
            None => {
                // Deliberate fallback: the launch identifier stands in for
                // the process id rather than failing the job.
                tracing::warn!(
                    "Process id for job {} never resolved, keeping launch identifier",
                    job.id
                );
            }
        }

        Ok(outcome)
    }

    /// Open a dedicated session, run the command with the channel held
    /// open, and ship output live. Completion fires only after all
    /// streamed output has landed in the log file.
    fn spawn_attached(&self, job: &Job) -> oneshot::Receiver<TerminalStatus> {
        let (chunk_tx, mut chunk_rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let (done_tx, done_rx) = oneshot::channel();

        let shipper = self.shipper.clone();
        let log_path = job.log_path.clone();
        let writer = tokio::spawn(async move {
            while let Some(chunk) = chunk_rx.recv().await {
                shipper.append(&log_path, &chunk).await;
            }
        });

        let executor = Arc::clone(&self.executor);
        let command = job.command.clone();
        let job_id = job.id.clone();
        tokio::spawn(async move {
            let status = match executor.exec_attached(&command, chunk_tx).await {
                Ok(output) => TerminalStatus {
                    exit_code: output.exit_code.map(|c| c as i32),
                    signal: output.signal,
                },
                Err(e) => {
                    tracing::warn!("Attached stream for job {} failed: {}", job_id, e);
                    TerminalStatus {
                        exit_code: None,
                        signal: None,
                    }
                }
            };
            let _ = writer.await;
            let _ = done_tx.send(status);
        });

        done_rx
    }

    /// Poll the runtime for the container's process id, absorbing the
    /// startup race where the container is accepted but not yet running
    async fn resolve_process_id(&self, id: &JobId) -> Option<String> {
        let command = self.runtime.inspect_pid(id);

        for attempt in 1..=self.pid_retry.attempts {
            match self.executor.exec_once(&command).await {
                Ok(output) if output.success() => {
                    let pid = output.stdout_lossy().trim().to_string();
                    // Pid 0 means created but not started yet
                    if pid.parse::<u64>().map(|p| p > 0).unwrap_or(false) {
                        tracing::debug!("Job {} runs as process {}", id, pid);
                        return Some(pid);
                    }
                }
                Ok(output) => {
                    tracing::debug!(
                        "Process id for job {} not inspectable yet (attempt {}/{}): {:?}",
                        id,
                        attempt,
                        self.pid_retry.attempts,
                        output.exit_code
                    );
                }
                Err(e) => {
                    tracing::debug!(
                        "Process id query for job {} failed (attempt {}/{}): {}",
                        id,
                        attempt,
                        self.pid_retry.attempts,
                        e
                    );
                }
            }
            if attempt < self.pid_retry.attempts {
                tokio::time::sleep(self.pid_retry.interval).await;
            }
        }

        None
    }
}
