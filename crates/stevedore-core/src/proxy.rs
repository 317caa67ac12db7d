//! Published-port discovery for jobs that requested a proxy

use crate::{Job, ProxyDescriptor, RuntimeCli};
use std::sync::Arc;
use stevedore_ssh::{RemoteExecutor, RetryPolicy};

/// Polls the runtime's published-port mapping within a bounded window
pub struct ProxyResolver {
    executor: Arc<dyn RemoteExecutor>,
    runtime: RuntimeCli,
    retry: RetryPolicy,
}

impl ProxyResolver {
    pub fn new(executor: Arc<dyn RemoteExecutor>, runtime: RuntimeCli, retry: RetryPolicy) -> Self {
        Self {
            executor,
            runtime,
            retry,
        }
    }

    /// Discover the externally published port for a job's declared
    /// container port.
    ///
    /// Returns `None` without any remote call when the job declares no
    /// container port, and `None` when the mapping never appears within
    /// the attempt ceiling or no proxy host ip is configured. Both are
    /// normal "no proxy available" outcomes, not errors.
    pub async fn resolve(&self, job: &Job) -> Option<ProxyDescriptor> {
        let request = job.proxy.as_ref()?;
        let container_port = request.container_port?;

        tracing::info!(
            "Discovering published port for job {} (container port {})",
            job.id,
            container_port
        );

        let command = self.runtime.port(&job.id, container_port);
        let mut published: Option<u16> = None;

        for attempt in 1..=self.retry.attempts {
            tokio::time::sleep(self.retry.interval).await;

            match self.executor.exec_once(&command).await {
                Ok(output) if output.success() => {
                    match parse_published_port(&output.stdout_lossy()) {
                        Some(port) => {
                            published = Some(port);
                            break;
                        }
                        None => {
                            tracing::debug!(
                                "Unparsable port mapping for job {} (attempt {}/{}): {:?}",
                                job.id,
                                attempt,
                                self.retry.attempts,
                                output.stdout_lossy().trim()
                            );
                        }
                    }
                }
                Ok(_) => {
                    tracing::debug!(
                        "Port mapping for job {} not available yet (attempt {}/{})",
                        job.id,
                        attempt,
                        self.retry.attempts
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        "Port query for job {} failed (attempt {}/{}): {}",
                        job.id,
                        attempt,
                        self.retry.attempts,
                        e
                    );
                }
            }
        }

        let port = match published {
            Some(port) => port,
            None => {
                tracing::info!("No published port found for job {}, skipping proxy", job.id);
                return None;
            }
        };

        let ip = match request.ip.clone() {
            Some(ip) => ip,
            None => {
                tracing::info!("No proxy host ip configured, skipping proxy for job {}", job.id);
                return None;
            }
        };

        tracing::info!(
            "Job {} publishes container port {} at {}:{}",
            job.id,
            container_port,
            ip,
            port
        );

        Some(ProxyDescriptor {
            protocol: request.protocol.clone(),
            ip,
            port,
            path_rewrite: request.path_rewrite.clone(),
            entry_path: request.entry_path.clone(),
            container_port,
        })
    }
}

/// Parse the external port from the first `host:port` mapping line
fn parse_published_port(output: &str) -> Option<u16> {
    let line = output.lines().find(|l| !l.trim().is_empty())?;
    let (_, port) = line.trim().rsplit_once(':')?;
    port.parse().ok()
}
