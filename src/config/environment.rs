//! Environment chain configuration.

use serde::{Deserialize, Serialize};

/// One entry of the promotion chain, in order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentEntry {
    pub name: String,

    /// `owner/repo`, or a bare repository name qualified by `host.owner`.
    /// An empty string leaves the environment unprovisioned.
    #[serde(default)]
    pub repo: Option<String>,

    /// Endpoint serving the environment's raw artifacts
    #[serde(default)]
    pub api_url: Option<String>,
}

impl EnvironmentEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            repo: None,
            api_url: None,
        }
    }

    /// Repository identifier after owner qualification.
    ///
    /// With an owner, the last path segment of `repo` (or the default
    /// `config-<env>-repo`) is placed under that owner. Without one, `repo`
    /// is used as written.
    pub fn repo_name(&self, owner: Option<&str>) -> Option<String> {
        let configured = self.repo.as_deref().map(str::trim);
        if configured == Some("") {
            return None;
        }

        match owner.map(str::trim).filter(|o| !o.is_empty()) {
            Some(owner) => {
                let base = configured
                    .and_then(|r| r.rsplit('/').next())
                    .filter(|b| !b.is_empty())
                    .map(str::to_string)
                    .unwrap_or_else(|| default_repo_name(&self.name));
                Some(format!("{}/{}", owner, base))
            }
            None => configured.map(str::to_string),
        }
    }
}

/// `config-<env>-repo`
pub fn default_repo_name(environment: &str) -> String {
    format!("config-{}-repo", environment.to_lowercase())
}

pub(super) fn default_environments() -> Vec<EnvironmentEntry> {
    ["Dev", "QA", "Stage", "Prod"]
        .into_iter()
        .map(EnvironmentEntry::new)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_name_under_owner() {
        let entry = EnvironmentEntry::new("Stage");
        assert_eq!(
            entry.repo_name(Some("acme")).as_deref(),
            Some("acme/config-stage-repo")
        );
        assert_eq!(entry.repo_name(None), None);
    }

    #[test]
    fn test_owner_replaces_configured_owner() {
        let entry = EnvironmentEntry {
            repo: Some("someone/qa-configs".to_string()),
            ..EnvironmentEntry::new("QA")
        };
        assert_eq!(entry.repo_name(Some("acme")).as_deref(), Some("acme/qa-configs"));
        assert_eq!(entry.repo_name(None).as_deref(), Some("someone/qa-configs"));
    }

    #[test]
    fn test_empty_repo_is_unprovisioned() {
        let entry = EnvironmentEntry {
            repo: Some(String::new()),
            ..EnvironmentEntry::new("QA")
        };
        assert_eq!(entry.repo_name(Some("acme")), None);
    }
}
