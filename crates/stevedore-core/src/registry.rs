//! Registry of actively tracked jobs

use crate::{Job, JobId, TerminalStatus};
use std::collections::BTreeMap;
use tokio::sync::oneshot;

struct TrackedJob {
    job: Job,
    /// One-shot terminal sender for jobs whose completion is discovered
    /// by polling; attached jobs deliver theirs from the launch channel
    terminal: Option<oneshot::Sender<TerminalStatus>>,
}

/// Jobs currently under supervision, keyed by job id.
///
/// Ordered by id so a polling pass visits jobs in a stable sequence.
/// Terminal status is emitted at most once per job: the sender is taken
/// out of the entry on first emission.
#[derive(Default)]
pub struct JobRegistry {
    jobs: BTreeMap<JobId, TrackedJob>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&mut self, job: Job, terminal: Option<oneshot::Sender<TerminalStatus>>) {
        self.jobs
            .insert(job.id.clone(), TrackedJob { job, terminal });
    }

    pub fn job(&self, id: &JobId) -> Option<&Job> {
        self.jobs.get(id).map(|t| &t.job)
    }

    pub fn job_mut(&mut self, id: &JobId) -> Option<&mut Job> {
        self.jobs.get_mut(id).map(|t| &mut t.job)
    }

    pub fn tracked_ids(&self) -> Vec<JobId> {
        self.jobs.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Deliver the terminal status for a job. Returns false when the job
    /// is unknown or its status was already emitted.
    pub fn emit_terminal(&mut self, id: &JobId, status: TerminalStatus) -> bool {
        match self.jobs.get_mut(id).and_then(|t| t.terminal.take()) {
            Some(sender) => sender.send(status).is_ok(),
            None => false,
        }
    }

    pub fn remove(&mut self, id: &JobId) -> Option<Job> {
        self.jobs.remove(id).map(|t| t.job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(id: &str) -> Job {
        Job::new(JobId::new(id), "docker run img", format!("/tmp/{}.log", id))
    }

    #[test]
    fn test_terminal_emitted_at_most_once() {
        let mut registry = JobRegistry::new();
        let (tx, mut rx) = oneshot::channel();
        registry.track(job("job-1"), Some(tx));

        let status = TerminalStatus {
            exit_code: Some(0),
            signal: None,
        };
        assert!(registry.emit_terminal(&JobId::new("job-1"), status.clone()));
        assert_eq!(rx.try_recv().unwrap(), status);

        // Second emission finds no sender
        assert!(!registry.emit_terminal(&JobId::new("job-1"), status));
    }

    #[test]
    fn test_emit_for_unknown_job() {
        let mut registry = JobRegistry::new();
        assert!(!registry.emit_terminal(
            &JobId::new("missing"),
            TerminalStatus {
                exit_code: Some(0),
                signal: None
            }
        ));
    }

    #[test]
    fn test_track_and_remove() {
        let mut registry = JobRegistry::new();
        registry.track(job("job-1"), None);
        registry.track(job("job-2"), None);
        assert_eq!(registry.len(), 2);

        let removed = registry.remove(&JobId::new("job-1")).unwrap();
        assert_eq!(removed.id, JobId::new("job-1"));
        assert_eq!(registry.len(), 1);
        assert!(registry.job(&JobId::new("job-1")).is_none());
        assert!(registry.job(&JobId::new("job-2")).is_some());
    }
}
