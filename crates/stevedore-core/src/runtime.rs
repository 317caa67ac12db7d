//! Command lines for the container runtime on the remote host
//!
//! The runtime binary path is configurable; everything here produces the
//! exact strings executed over the session.

use crate::JobId;
use chrono::{DateTime, SecondsFormat, Utc};

/// Builds remote runtime invocations for a configurable binary path
#[derive(Debug, Clone)]
pub struct RuntimeCli {
    binary: String,
}

impl RuntimeCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Query the native process id of a container
    pub fn inspect_pid(&self, id: &JobId) -> String {
        format!("{} inspect {} --format={{{{.State.Pid}}}}", self.binary, id)
    }

    /// Query the container state
    pub fn inspect_status(&self, id: &JobId) -> String {
        format!("{} inspect {} --format={{{{.State.Status}}}}", self.binary, id)
    }

    /// Query the container exit code
    pub fn inspect_exit_code(&self, id: &JobId) -> String {
        format!("{} inspect {} --format={{{{.State.ExitCode}}}}", self.binary, id)
    }

    /// Fetch logs for the given time range; either bound may be open
    pub fn logs(
        &self,
        id: &JobId,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> String {
        let mut command = format!("{} logs {}", self.binary, id);
        if let Some(since) = since {
            command.push_str(&format!(" --since {}", format_timestamp(since)));
        }
        if let Some(until) = until {
            command.push_str(&format!(" --until {}", format_timestamp(until)));
        }
        command
    }

    /// Query the published mapping of a container port
    pub fn port(&self, id: &JobId, container_port: u16) -> String {
        format!("{} port {} {}", self.binary, id, container_port)
    }

    pub fn stop(&self, id: &JobId) -> String {
        format!("{} stop {}", self.binary, id)
    }

    pub fn remove(&self, id: &JobId) -> String {
        format!("{} rm {}", self.binary, id)
    }
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}
