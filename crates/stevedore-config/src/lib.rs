//! Configuration parsing for stevedore
//!
//! This crate handles parsing of the supervisor configuration
//! (`~/.config/stevedore/config.toml`): remote host credentials, the
//! container runtime binary to drive on the remote side, proxy settings,
//! and the polling bounds used by the job lifecycle machinery.

mod error;
mod settings;

pub use error::*;
pub use settings::*;
