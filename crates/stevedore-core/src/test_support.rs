//! Test support utilities for stevedore-core
//!
//! Provides a scripted [`MockExecutor`] so the lifecycle machinery can be
//! exercised without a reachable SSH host: tests enqueue the outputs the
//! remote side would produce and assert on the recorded commands.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use stevedore_ssh::{ExecOutput, RemoteExecutor, Result as SshResult, SshError};
use tokio::sync::mpsc;

/// Records which methods were called on the mock, in order
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    Connect,
    Exec { command: String },
    ExecOnce { command: String },
    ExecAttached { command: String },
    Close,
}

/// Scripted behavior for one attached execution
pub struct AttachedScript {
    /// Output chunks streamed before the channel closes
    pub chunks: Vec<Vec<u8>>,
    pub result: SshResult<ExecOutput>,
}

/// Configurable mock remote executor.
///
/// `exec` and `exec_once` pop scripted results from separate queues; an
/// empty queue yields an error so an unexpected call fails the test
/// instead of silently succeeding.
#[derive(Default)]
pub struct MockExecutor {
    calls: Arc<Mutex<Vec<MockCall>>>,
    connect_results: Mutex<VecDeque<SshResult<()>>>,
    exec_results: Mutex<VecDeque<SshResult<ExecOutput>>>,
    exec_once_results: Mutex<VecDeque<SshResult<ExecOutput>>>,
    attached_script: Mutex<Option<AttachedScript>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a result for the next `exec` call on the shared session
    pub fn push_exec(&self, result: SshResult<ExecOutput>) {
        self.exec_results.lock().unwrap().push_back(result);
    }

    /// Queue a result for the next `exec_once` call
    pub fn push_exec_once(&self, result: SshResult<ExecOutput>) {
        self.exec_once_results.lock().unwrap().push_back(result);
    }

    /// Queue a failure for the next `connect` call
    pub fn push_connect_err(&self, error: SshError) {
        self.connect_results.lock().unwrap().push_back(Err(error));
    }

    /// Script the next attached execution
    pub fn set_attached(&self, script: AttachedScript) {
        *self.attached_script.lock().unwrap() = Some(script);
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Commands issued through `exec` and `exec_once`, in order
    pub fn commands(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                MockCall::Exec { command } | MockCall::ExecOnce { command } => Some(command),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: MockCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl RemoteExecutor for MockExecutor {
    async fn connect(&self) -> SshResult<()> {
        self.record(MockCall::Connect);
        self.connect_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(()))
    }

    async fn exec(&self, command: &str) -> SshResult<ExecOutput> {
        self.record(MockCall::Exec {
            command: command.to_string(),
        });
        self.exec_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(SshError::ExecError(format!(
                    "mock: no scripted result for exec of {:?}",
                    command
                )))
            })
    }

    async fn exec_once(&self, command: &str) -> SshResult<ExecOutput> {
        self.record(MockCall::ExecOnce {
            command: command.to_string(),
        });
        self.exec_once_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(SshError::ExecError(format!(
                    "mock: no scripted result for exec_once of {:?}",
                    command
                )))
            })
    }

    async fn exec_attached(
        &self,
        command: &str,
        output: mpsc::UnboundedSender<Vec<u8>>,
    ) -> SshResult<ExecOutput> {
        self.record(MockCall::ExecAttached {
            command: command.to_string(),
        });
        let script = self.attached_script.lock().unwrap().take();
        match script {
            Some(script) => {
                for chunk in script.chunks {
                    let _ = output.send(chunk);
                }
                script.result
            }
            None => Err(SshError::ExecError(
                "mock: no scripted attached execution".to_string(),
            )),
        }
    }

    async fn close(&self) {
        self.record(MockCall::Close);
    }
}

/// Build an [`ExecOutput`] with the given stdout and exit code
pub fn output(stdout: &str, exit_code: u32) -> ExecOutput {
    ExecOutput {
        stdout: stdout.as_bytes().to_vec(),
        stderr: Vec::new(),
        exit_code: Some(exit_code),
        signal: None,
    }
}
