//! Supervisor contract and its SSH-to-docker implementation

use crate::{
    CoreError, Job, JobId, JobLauncher, JobRegistry, LaunchMode, LaunchOutcome, LogShipper,
    ProxyDescriptor, ProxyResolver, Result, RuntimeCli, StatusPoller, TerminalStatus,
};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use stevedore_config::SupervisorConfig;
use stevedore_ssh::{ConnectionManager, RemoteExecutor, RetryPolicy};
use tokio::sync::{oneshot, Mutex};

/// Lifecycle operations the owning orchestrator drives.
///
/// An explicit contract rather than an inherited base class: the host
/// invokes `before_start`, then `deploy` per job and `detect_status`
/// ticks, then `stop_all` and `before_exit` on the way down.
#[async_trait]
pub trait JobSupervisor: Send + Sync {
    /// Establish the remote session before the first job is deployed
    async fn before_start(&self) -> Result<()>;

    /// Launch a job and start tracking it
    async fn deploy(&self, job: Job) -> Result<JobTicket>;

    /// One status-detection tick over all tracked jobs
    async fn detect_status(&self) -> Result<()>;

    /// Discover the published port for a tracked job
    async fn resolve_proxy(&self, id: &JobId) -> Result<Option<ProxyDescriptor>>;

    /// Stop every tracked job, best effort: one failure does not block
    /// the remaining jobs
    async fn stop_all(&self) -> Result<()>;

    /// Remove every tracked container before shutdown, best effort
    async fn before_exit(&self) -> Result<()>;
}

/// Handle returned from a deploy
pub struct JobTicket {
    pub job_id: JobId,
    /// Native process id, or the launch identifier when resolution never
    /// succeeded
    pub process_id: String,
    /// Resolves exactly once with the job's terminal status
    pub completion: oneshot::Receiver<TerminalStatus>,
}

/// Supervises containerized jobs on a remote host over SSH
pub struct DockerSshSupervisor {
    config: SupervisorConfig,
    executor: Arc<dyn RemoteExecutor>,
    runtime: RuntimeCli,
    launcher: JobLauncher,
    poller: StatusPoller,
    resolver: ProxyResolver,
    registry: Arc<Mutex<JobRegistry>>,
}

impl DockerSshSupervisor {
    pub fn new(config: SupervisorConfig) -> Result<Self> {
        let executor: Arc<dyn RemoteExecutor> = Arc::new(ConnectionManager::new(&config)?);
        Ok(Self::with_executor(config, executor))
    }

    /// Build against a caller-supplied executor. Used by tests to run the
    /// lifecycle machinery without a reachable host.
    pub fn with_executor(config: SupervisorConfig, executor: Arc<dyn RemoteExecutor>) -> Self {
        let runtime = RuntimeCli::new(config.runtime.binary.as_str());
        let shipper = LogShipper;
        let pid_retry = RetryPolicy::new(
            config.polling.pid_attempts,
            Duration::from_millis(config.polling.pid_interval_ms),
        );
        let proxy_retry = RetryPolicy::new(
            config.polling.proxy_attempts,
            Duration::from_millis(config.polling.proxy_interval_ms),
        );

        Self {
            launcher: JobLauncher::new(
                Arc::clone(&executor),
                runtime.clone(),
                shipper.clone(),
                pid_retry,
            ),
            poller: StatusPoller::new(Arc::clone(&executor), runtime.clone(), shipper),
            resolver: ProxyResolver::new(Arc::clone(&executor), runtime.clone(), proxy_retry),
            registry: Arc::new(Mutex::new(JobRegistry::new())),
            config,
            executor,
            runtime,
        }
    }

    fn detached(&self) -> bool {
        self.config.runtime.detach.enabled()
    }

    /// Ids of the jobs currently under supervision
    pub async fn tracked_jobs(&self) -> Vec<JobId> {
        self.registry.lock().await.tracked_ids()
    }
}

#[async_trait]
impl JobSupervisor for DockerSshSupervisor {
    async fn before_start(&self) -> Result<()> {
        self.executor.connect().await?;
        tracing::info!("Remote session established");
        Ok(())
    }

    async fn deploy(&self, mut job: Job) -> Result<JobTicket> {
        job.mode = if self.detached() {
            LaunchMode::Detached
        } else {
            LaunchMode::Attached
        };
        job.options.sanitize();
        if let Some(proxy) = job.proxy.as_mut() {
            if proxy.ip.is_none() {
                proxy.ip = self.config.proxy.host_ip.clone();
            }
        }

        tracing::info!("Deploying job {} in {} mode", job.id, job.mode);
        let outcome = self.launcher.launch(&mut job).await?;

        let job_id = job.id.clone();
        let process_id = job.process_id.clone();
        let (terminal_tx, terminal_rx) = oneshot::channel();

        match outcome {
            LaunchOutcome::Detached => {
                self.registry.lock().await.track(job, Some(terminal_tx));
            }
            LaunchOutcome::Attached { completion } => {
                // Tracked without a sender: the launch channel delivers the
                // terminal status, this task just untracks and forwards it.
                job.running = true;
                self.registry.lock().await.track(job, None);
                let registry = Arc::clone(&self.registry);
                let id = job_id.clone();
                tokio::spawn(async move {
                    if let Ok(status) = completion.await {
                        registry.lock().await.remove(&id);
                        let _ = terminal_tx.send(status);
                    }
                });
            }
        }

        Ok(JobTicket {
            job_id,
            process_id,
            completion: terminal_rx,
        })
    }

    async fn detect_status(&self) -> Result<()> {
        // Attached jobs get their terminal status straight from the launch
        // channel's close; polling only applies to detached supervision.
        if !self.detached() {
            return Ok(());
        }
        self.poller.poll(&self.registry).await
    }

    async fn resolve_proxy(&self, id: &JobId) -> Result<Option<ProxyDescriptor>> {
        let job = self
            .registry
            .lock()
            .await
            .job(id)
            .cloned()
            .ok_or_else(|| CoreError::JobNotFound(id.to_string()))?;
        Ok(self.resolver.resolve(&job).await)
    }

    async fn stop_all(&self) -> Result<()> {
        self.executor.connect().await?;
        let ids = self.registry.lock().await.tracked_ids();
        for id in ids {
            tracing::info!("Stopping job {}", id);
            if let Err(e) = self.executor.exec(&self.runtime.stop(&id)).await {
                tracing::warn!("Failed to stop job {}: {}", id, e);
            }
        }
        self.executor.close().await;
        Ok(())
    }

    async fn before_exit(&self) -> Result<()> {
        self.executor.connect().await?;
        tracing::info!("Cleaning up containers");
        let ids = self.registry.lock().await.tracked_ids();
        for id in ids {
            if let Err(e) = self.executor.exec(&self.runtime.remove(&id)).await {
                tracing::warn!("Failed to remove container for job {}: {}", id, e);
            }
        }
        self.executor.close().await;
        Ok(())
    }
}
