//! # Relay Configuration
//!
//! Single YAML file (`relay.yaml`) with four sections:
//!
//! - **host**: repository host endpoint, owner, branch, timeouts
//! - **sync**: batch size, retry count and delays for file writes
//! - **workflow**: lifecycle variant, initial folder, tag settings
//! - **environments**: the promotion chain, in order
//!
//! Every field has a default, so an absent file yields a working
//! Dev → QA → Stage → Prod chain.
//!
//! ## Example
//!
//! ```yaml
//! host:
//!   owner: acme
//!   owner_is_org: true
//! sync:
//!   backoff: exponential
//!   jitter: 0.2
//! environments:
//!   - name: Dev
//!     api_url: https://configs.dev.acme.io/export
//!   - name: QA
//!   - name: Prod
//!     repo: prod-configs
//! ```

mod environment;
mod host;
mod sync;
mod workflow;

pub use environment::{default_repo_name, EnvironmentEntry};
pub use host::HostConfig;
pub use sync::{BackoffKind, SyncConfig};
pub use workflow::{EmptyFolderPolicy, TagStrategy, WorkflowConfig, WorkflowVariant};

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

use crate::domain::{Environment, EnvironmentRegistry, RepoRef};
use crate::error::ConfigError;

/// Config file looked up in the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "relay.yaml";

/// Complete relay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub host: HostConfig,

    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub workflow: WorkflowConfig,

    #[serde(default = "environment::default_environments")]
    pub environments: Vec<EnvironmentEntry>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: HostConfig::default(),
            sync: SyncConfig::default(),
            workflow: WorkflowConfig::default(),
            environments: environment::default_environments(),
        }
    }
}

impl RelayConfig {
    /// Load and validate configuration.
    ///
    /// An explicit path must exist. Without one, `relay.yaml` in the working
    /// directory is used when present, otherwise defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::FileNotFound {
                        path: path.display().to_string(),
                    });
                }
                Self::from_file(path)?
            }
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => {
                debug!("No config file, using defaults");
                Self::default()
            }
        };

        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        debug!(path = %path.display(), "Loading config");
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ParseError {
            message: format!("failed to read {}: {}", path.display(), e),
        })?;
        Self::from_yaml(&content)
    }

    /// Parse YAML without validating
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        // An empty document is a valid, all-default config
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })
    }

    /// Reject configurations no run could succeed with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.environments.is_empty() {
            return Err(ConfigError::MissingField {
                field: "environments".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for entry in &self.environments {
            let name = entry.name.trim();
            if name.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "environments[].name".to_string(),
                    value: format!("'{}'", entry.name),
                });
            }
            if !seen.insert(name.to_string()) {
                return Err(ConfigError::InvalidValue {
                    field: "environments[].name".to_string(),
                    value: format!("duplicate '{}'", name),
                });
            }
            if let Some(repo) = entry.repo_name(self.host.owner.as_deref()) {
                if RepoRef::parse(&repo).is_none() {
                    return Err(ConfigError::InvalidValue {
                        field: format!("environments[{}].repo", name),
                        value: format!("'{}' (expected owner/repo or set host.owner)", repo),
                    });
                }
            }
        }

        if self.sync.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "sync.batch_size".to_string(),
                value: "0".to_string(),
            });
        }

        if !(0.0..=1.0).contains(&self.sync.jitter) {
            return Err(ConfigError::InvalidValue {
                field: "sync.jitter".to_string(),
                value: self.sync.jitter.to_string(),
            });
        }

        if self.workflow.initial_folder.trim_matches('/').is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "workflow.initial_folder".to_string(),
                value: format!("'{}'", self.workflow.initial_folder),
            });
        }

        if self.workflow.tag_name.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "workflow.tag_name".to_string(),
            });
        }

        Ok(())
    }

    /// Build the environment registry in configured order
    pub fn build_registry(&self) -> EnvironmentRegistry {
        let owner = self.host.owner.as_deref();

        EnvironmentRegistry::from_environments(self.environments.iter().map(|entry| {
            let mut env = Environment::new(entry.name.trim());
            if let Some(repo) = entry.repo_name(owner) {
                env.set_repo_name(repo);
            }
            if let Some(api_url) = entry.api_url.as_deref().filter(|u| !u.trim().is_empty()) {
                env.api_url = Some(api_url.trim().to_string());
            }
            env
        }))
    }
}

/// Durations written the humantime way (`500ms`, `1s`, `2m 30s`)
pub(crate) mod duration_format {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        humantime::parse_duration(value.trim()).map_err(serde::de::Error::custom)
    }
}
