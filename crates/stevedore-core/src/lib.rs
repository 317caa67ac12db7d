//! Core job-lifecycle supervision for stevedore
//!
//! This crate provides:
//! - The job model and the registry of actively tracked jobs
//! - Attached and detached job launching with process-id resolution
//! - The status polling state machine with incremental log shipping
//! - Published-port discovery with bounded polling
//! - The supervisor contract the owning orchestrator drives

mod error;
mod job;
mod launcher;
mod logship;
mod poller;
mod proxy;
mod registry;
mod runtime;
mod supervisor;

pub use error::*;
pub use job::*;
pub use launcher::*;
pub use logship::*;
pub use poller::*;
pub use proxy::*;
pub use registry::*;
pub use runtime::*;
pub use supervisor::*;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
