//! Job model and related types

use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// Job identifier wrapper
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for JobId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// How a job is supervised after launch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchMode {
    /// A live channel is held for the job's full duration; completion
    /// arrives from that channel's close
    Attached,
    /// The job runs independently; completion is discovered by polling
    Detached,
}

impl std::fmt::Display for LaunchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Attached => write!(f, "attached"),
            Self::Detached => write!(f, "detached"),
        }
    }
}

/// Container state as reported by the remote runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    Created,
    Running,
    Paused,
    Restarting,
    Removing,
    Exited,
    Dead,
    Unknown,
}

impl std::fmt::Display for ContainerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Running => write!(f, "running"),
            Self::Paused => write!(f, "paused"),
            Self::Restarting => write!(f, "restarting"),
            Self::Removing => write!(f, "removing"),
            Self::Exited => write!(f, "exited"),
            Self::Dead => write!(f, "dead"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

impl From<&str> for ContainerState {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "created" => Self::Created,
            "running" => Self::Running,
            "paused" => Self::Paused,
            "restarting" => Self::Restarting,
            "removing" => Self::Removing,
            "exited" => Self::Exited,
            "dead" => Self::Dead,
            _ => Self::Unknown,
        }
    }
}

/// Resource options carried for the orchestrator's templating engine
#[derive(Debug, Clone, Default)]
pub struct JobOptions {
    /// CPU count requested for the container
    pub cpus: Option<u32>,
    /// Memory quantity, already humanized (e.g. "2g")
    pub memory: Option<String>,
    /// host:container volume mappings
    pub volume_mappings: Vec<String>,
}

impl JobOptions {
    /// Drop empty volume mappings left behind by templating
    pub fn sanitize(&mut self) {
        self.volume_mappings.retain(|m| !m.trim().is_empty());
    }
}

/// A proxy request attached to a job: which internal port should be
/// exposed, and how the front proxy should route to it
#[derive(Debug, Clone, Default)]
pub struct ProxyRequest {
    pub protocol: String,
    /// Externally visible ip; defaulted from the supervisor configuration
    /// when the orchestrator leaves it unset
    pub ip: Option<String>,
    /// Internal container port to expose; no port means no proxy
    pub container_port: Option<u16>,
    pub path_rewrite: Option<String>,
    pub entry_path: Option<String>,
}

/// Resolved proxy endpoint for a job, produced at most once
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyDescriptor {
    pub protocol: String,
    pub ip: String,
    /// Externally published port the runtime mapped to the container port
    pub port: u16,
    pub path_rewrite: Option<String>,
    pub entry_path: Option<String>,
    pub container_port: u16,
}

/// Terminal status of a job, delivered exactly once per job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalStatus {
    /// Exit code; `None` when the channel closed without reporting one
    pub exit_code: Option<i32>,
    /// Signal that terminated the job, if any
    pub signal: Option<String>,
}

/// One containerized unit of work tracked through launch, running and
/// terminal states
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    /// Launch command assembled by the orchestrator's templating engine
    pub command: String,
    pub mode: LaunchMode,
    /// Local file receiving the job's combined output
    pub log_path: PathBuf,
    pub options: JobOptions,
    pub proxy: Option<ProxyRequest>,
    /// End of the most recently captured log range; `None` until the
    /// first capture
    pub log_watermark: Option<DateTime<Utc>>,
    pub running: bool,
    /// Native process id on the remote host; starts as the launch
    /// identifier and is refined once discoverable
    pub process_id: String,
}

impl Job {
    pub fn new(id: JobId, command: impl Into<String>, log_path: impl Into<PathBuf>) -> Self {
        let process_id = id.0.clone();
        Self {
            id,
            command: command.into(),
            mode: LaunchMode::Detached,
            log_path: log_path.into(),
            options: JobOptions::default(),
            proxy: None,
            log_watermark: None,
            running: false,
            process_id,
        }
    }

    /// Move the watermark forward; earlier timestamps are ignored so the
    /// watermark never regresses
    pub(crate) fn advance_watermark(&mut self, until: DateTime<Utc>) {
        if self.log_watermark.map_or(true, |w| until >= w) {
            self.log_watermark = Some(until);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_container_state_parsing() {
        assert_eq!(ContainerState::from("running"), ContainerState::Running);
        assert_eq!(ContainerState::from("Exited"), ContainerState::Exited);
        assert_eq!(ContainerState::from("DEAD"), ContainerState::Dead);
        assert_eq!(ContainerState::from("gone"), ContainerState::Unknown);
        assert_eq!(ContainerState::from(""), ContainerState::Unknown);
    }

    #[test]
    fn test_new_job_defaults() {
        let job = Job::new(JobId::new("job-1"), "docker run img", "/tmp/job-1.log");
        assert_eq!(job.process_id, "job-1");
        assert!(job.log_watermark.is_none());
        assert!(!job.running);
        assert_eq!(job.mode, LaunchMode::Detached);
    }

    #[test]
    fn test_watermark_never_regresses() {
        let mut job = Job::new(JobId::new("job-1"), "docker run img", "/tmp/job-1.log");
        let earlier = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2024, 5, 1, 10, 5, 0).unwrap();

        job.advance_watermark(later);
        assert_eq!(job.log_watermark, Some(later));

        job.advance_watermark(earlier);
        assert_eq!(job.log_watermark, Some(later));
    }

    #[test]
    fn test_options_sanitize() {
        let mut options = JobOptions {
            cpus: Some(2),
            memory: Some("2g".to_string()),
            volume_mappings: vec![
                "/data:/data".to_string(),
                "".to_string(),
                "  ".to_string(),
                "/scratch:/scratch".to_string(),
            ],
        };
        options.sanitize();
        assert_eq!(options.volume_mappings, vec!["/data:/data", "/scratch:/scratch"]);
    }
}
