//! Repository host connection settings.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::duration_format;

/// Repository host configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// REST API base (GitHub Enterprise: `https://ghe.example.com/api/v3`)
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Browser base URL; derived from `api_url` when unset
    #[serde(default)]
    pub web_url: Option<String>,

    /// User or organisation owning the environment repositories
    #[serde(default)]
    pub owner: Option<String>,

    /// Create repositories under the organisation instead of the token's user
    #[serde(default)]
    pub owner_is_org: bool,

    /// Branch all commits are written to
    #[serde(default = "default_branch")]
    pub branch: String,

    /// Create repositories as private
    #[serde(default)]
    pub private: bool,

    /// Overrides the `relay/<version>` User-Agent
    #[serde(default)]
    pub user_agent: Option<String>,

    /// Whole-request timeout
    #[serde(default = "default_timeout", with = "duration_format")]
    pub timeout: Duration,

    #[serde(default = "default_connect_timeout", with = "duration_format")]
    pub connect_timeout: Duration,
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            web_url: None,
            owner: None,
            owner_is_org: false,
            branch: default_branch(),
            private: false,
            user_agent: None,
            timeout: default_timeout(),
            connect_timeout: default_connect_timeout(),
        }
    }
}
