//! Status polling state machine for detached jobs

use crate::{
    ContainerState, CoreError, JobId, JobRegistry, LogShipper, Result, RuntimeCli, TerminalStatus,
};
use chrono::Utc;
use std::sync::Arc;
use stevedore_ssh::RemoteExecutor;
use tokio::sync::Mutex;

/// Exit code recorded when the runtime reports a value that does not
/// parse as a number
pub const UNPARSABLE_EXIT_CODE: i32 = 3;

/// Drives one polling pass over all tracked jobs: status query, log
/// shipping, and terminal emission.
///
/// A pass runs jobs sequentially on the shared session, bracketed by an
/// explicit connect and close. Per-job failures are logged and do not
/// abort the rest of the pass.
pub struct StatusPoller {
    executor: Arc<dyn RemoteExecutor>,
    runtime: RuntimeCli,
    shipper: LogShipper,
}

impl StatusPoller {
    pub fn new(executor: Arc<dyn RemoteExecutor>, runtime: RuntimeCli, shipper: LogShipper) -> Self {
        Self {
            executor,
            runtime,
            shipper,
        }
    }

    /// One polling pass over every tracked job
    pub async fn poll(&self, registry: &Mutex<JobRegistry>) -> Result<()> {
        self.executor.connect().await?;

        let ids = registry.lock().await.tracked_ids();
        for id in ids {
            if let Err(e) = self.poll_job(&id, registry).await {
                tracing::warn!("Status check for job {} failed: {}", id, e);
            }
        }

        self.executor.close().await;
        Ok(())
    }

    async fn poll_job(&self, id: &JobId, registry: &Mutex<JobRegistry>) -> Result<()> {
        let status = self.executor.exec(&self.runtime.inspect_status(id)).await?;
        let state = ContainerState::from(status.stdout_lossy().trim());

        match state {
            ContainerState::Running => self.capture_running(id, registry).await,
            ContainerState::Exited | ContainerState::Dead => {
                self.finish_job(id, registry, state).await
            }
            other => {
                tracing::warn!("Unexpected container state for job {}: {}", id, other);
                Ok(())
            }
        }
    }

    /// Fetch the log range since the watermark up to now and append it.
    /// The watermark advances only when the append landed, so a failed
    /// write makes the next pass refetch the same range instead of
    /// leaving a gap.
    async fn capture_running(&self, id: &JobId, registry: &Mutex<JobRegistry>) -> Result<()> {
        let (log_path, since) = {
            let mut registry = registry.lock().await;
            let job = registry
                .job_mut(id)
                .ok_or_else(|| CoreError::JobNotFound(id.to_string()))?;
            job.running = true;
            (job.log_path.clone(), job.log_watermark)
        };

        let until = Utc::now();
        let logs = self
            .executor
            .exec(&self.runtime.logs(id, since, Some(until)))
            .await?;

        let mut combined = logs.stdout;
        combined.extend_from_slice(&logs.stderr);

        match self.shipper.append_strict(&log_path, &combined).await {
            Ok(()) => {
                if let Some(job) = registry.lock().await.job_mut(id) {
                    job.advance_watermark(until);
                }
            }
            Err(e) => {
                tracing::warn!("Failed to append logs for job {}: {}", id, e);
            }
        }

        Ok(())
    }

    /// Ship the remaining logs, resolve the exit code, and emit the
    /// terminal status
    async fn finish_job(
        &self,
        id: &JobId,
        registry: &Mutex<JobRegistry>,
        state: ContainerState,
    ) -> Result<()> {
        let (log_path, since) = {
            let registry = registry.lock().await;
            let job = registry
                .job(id)
                .ok_or_else(|| CoreError::JobNotFound(id.to_string()))?;
            (job.log_path.clone(), job.log_watermark)
        };

        // Remaining output with no upper bound; a fetch failure must not
        // keep the job from reaching its terminal state.
        match self.executor.exec(&self.runtime.logs(id, since, None)).await {
            Ok(logs) => {
                let mut combined = logs.stdout;
                combined.extend_from_slice(&logs.stderr);
                self.shipper.append(&log_path, &combined).await;
            }
            Err(e) => {
                tracing::warn!("Failed to fetch final logs for job {}: {}", id, e);
            }
        }

        let inspect = self
            .executor
            .exec(&self.runtime.inspect_exit_code(id))
            .await?;
        let exit_code = inspect
            .stdout_lossy()
            .trim()
            .parse::<i32>()
            .unwrap_or(UNPARSABLE_EXIT_CODE);

        tracing::info!("Job {} is {} with exit code {}", id, state, exit_code);

        let mut registry = registry.lock().await;
        registry.emit_terminal(
            id,
            TerminalStatus {
                exit_code: Some(exit_code),
                signal: None,
            },
        );
        registry.remove(id);
        Ok(())
    }
}
