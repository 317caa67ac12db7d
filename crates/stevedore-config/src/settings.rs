//! Supervisor configuration
//!
//! Located at `~/.config/stevedore/config.toml`

use crate::{ConfigError, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;

/// Top-level supervisor configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    pub remote: RemoteConfig,
    pub runtime: RuntimeConfig,
    pub proxy: ProxyConfig,
    pub polling: PollingConfig,
}

/// Remote host and credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Remote host name or address
    pub host: String,
    /// SSH port
    pub port: u16,
    /// Remote user name
    pub username: String,
    /// Password authentication, used only when no key file is given
    pub password: Option<String>,
    /// Path to the private key file (takes precedence over the password)
    pub key_file: Option<String>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 22,
            username: String::new(),
            password: None,
            key_file: None,
        }
    }
}

impl RemoteConfig {
    /// Key file path with `~` expanded
    pub fn key_path(&self) -> Option<PathBuf> {
        self.key_file
            .as_deref()
            .map(|p| PathBuf::from(shellexpand::tilde(p).into_owned()))
    }

    /// Check that the fields required to open a session are present
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(ConfigError::Invalid("remote.host is not set".into()));
        }
        if self.username.is_empty() {
            return Err(ConfigError::Invalid("remote.username is not set".into()));
        }
        Ok(())
    }
}

/// Container runtime settings for the remote side
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Runtime binary invoked on the remote host
    pub binary: String,
    /// Run jobs detached from the supervising process.
    ///
    /// Orchestrators hand this over as a string, so both `true` and
    /// `"True"` are accepted.
    pub detach: DetachFlag,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            binary: "docker".to_string(),
            detach: DetachFlag(false),
        }
    }
}

/// Web proxy settings for jobs that publish a port
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Externally visible IP of the host fronting published ports
    pub host_ip: Option<String>,
}

/// Bounds and intervals for the fixed-interval polling loops.
///
/// Defaults reproduce the documented ceilings: connection ≈20s,
/// process-id resolution ≈5min, published-port discovery ≈1h.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Connection attempts before giving up
    pub connect_attempts: u32,
    /// Spacing between connection attempts, in milliseconds
    pub connect_interval_ms: u64,
    /// Per-attempt transport timeout, in milliseconds
    pub connect_timeout_ms: u64,
    /// Process-id resolution attempts after launch
    pub pid_attempts: u32,
    /// Spacing between process-id attempts, in milliseconds
    pub pid_interval_ms: u64,
    /// Published-port discovery attempts
    pub proxy_attempts: u32,
    /// Spacing between published-port attempts, in milliseconds
    pub proxy_interval_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            connect_attempts: 20,
            connect_interval_ms: 1_000,
            connect_timeout_ms: 10_000,
            pid_attempts: 1_000,
            pid_interval_ms: 300,
            proxy_attempts: 3_600,
            proxy_interval_ms: 1_000,
        }
    }
}

/// Detach flag that tolerates the stringly-typed form orchestrators send.
///
/// `true`, `"true"` and `"TRUE"` all enable detached mode; any other
/// string disables it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DetachFlag(pub bool);

impl DetachFlag {
    pub fn enabled(&self) -> bool {
        self.0
    }

    /// Parse the orchestrator-supplied form, case-insensitively
    pub fn from_str_value(value: &str) -> Self {
        Self(value.trim().eq_ignore_ascii_case("true"))
    }
}

impl From<bool> for DetachFlag {
    fn from(value: bool) -> Self {
        Self(value)
    }
}

impl<'de> Deserialize<'de> for DetachFlag {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum BoolOrString {
            Bool(bool),
            Str(String),
        }

        match BoolOrString::deserialize(deserializer)? {
            BoolOrString::Bool(b) => Ok(DetachFlag(b)),
            BoolOrString::Str(s) => Ok(DetachFlag::from_str_value(&s)),
        }
    }
}

impl SupervisorConfig {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.clone(),
            source: e,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            path: path.clone(),
            source: e,
        })?;

        tracing::debug!(
            "Loaded config from {:?}: remote={}@{}:{}",
            path,
            config.remote.username,
            config.remote.host,
            config.remote.port
        );

        Ok(config)
    }

    /// Save configuration to the default path
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        self.save_to(&path)
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
                path: path.clone(),
                source: e,
            })?;
        }

        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::WriteError {
            path: path.clone(),
            source: e,
        })
    }

    /// Get the default config file path
    pub fn config_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("", "", "stevedore").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SupervisorConfig::default();
        assert_eq!(config.remote.port, 22);
        assert_eq!(config.runtime.binary, "docker");
        assert!(!config.runtime.detach.enabled());
        assert_eq!(config.polling.connect_attempts, 20);
        assert_eq!(config.polling.pid_attempts, 1_000);
        assert_eq!(config.polling.proxy_attempts, 3_600);
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[remote]
host = "worker-01.internal"
username = "batch"
key_file = "~/.ssh/id_ed25519"

[runtime]
binary = "/usr/local/bin/docker"
detach = "True"

[proxy]
host_ip = "203.0.113.9"
"#;

        let config: SupervisorConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.remote.host, "worker-01.internal");
        assert_eq!(config.remote.port, 22);
        assert_eq!(config.runtime.binary, "/usr/local/bin/docker");
        assert!(config.runtime.detach.enabled());
        assert_eq!(config.proxy.host_ip.as_deref(), Some("203.0.113.9"));
    }

    #[test]
    fn test_detach_flag_forms() {
        assert!(DetachFlag::from_str_value("true").enabled());
        assert!(DetachFlag::from_str_value("TRUE").enabled());
        assert!(DetachFlag::from_str_value(" True ").enabled());
        assert!(!DetachFlag::from_str_value("false").enabled());
        assert!(!DetachFlag::from_str_value("yes").enabled());
        assert!(!DetachFlag::from_str_value("").enabled());

        let from_bool: DetachFlag = toml::from_str::<RuntimeConfig>("detach = true")
            .unwrap()
            .detach;
        assert!(from_bool.enabled());
        let from_str: DetachFlag = toml::from_str::<RuntimeConfig>(r#"detach = "false""#)
            .unwrap()
            .detach;
        assert!(!from_str.enabled());
    }

    #[test]
    fn test_key_path_expansion() {
        let remote = RemoteConfig {
            key_file: Some("/etc/keys/batch".to_string()),
            ..Default::default()
        };
        assert_eq!(remote.key_path(), Some(PathBuf::from("/etc/keys/batch")));

        let remote = RemoteConfig {
            key_file: Some("~/.ssh/id_rsa".to_string()),
            ..Default::default()
        };
        let expanded = remote.key_path().unwrap();
        assert!(!expanded.to_string_lossy().starts_with('~'));
    }

    #[test]
    fn test_validate_remote() {
        let mut remote = RemoteConfig::default();
        assert!(remote.validate().is_err());

        remote.host = "worker-01".to_string();
        assert!(remote.validate().is_err());

        remote.username = "batch".to_string();
        assert!(remote.validate().is_ok());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let config = SupervisorConfig::load_from(&path).unwrap();
        assert_eq!(config.remote.port, 22);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = SupervisorConfig::default();
        config.remote.host = "worker-02".to_string();
        config.remote.username = "batch".to_string();
        config.polling.connect_attempts = 3;
        config.save_to(&path).unwrap();

        let reloaded = SupervisorConfig::load_from(&path).unwrap();
        assert_eq!(reloaded.remote.host, "worker-02");
        assert_eq!(reloaded.polling.connect_attempts, 3);
    }
}
