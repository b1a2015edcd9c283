//! Environment domain types
//!
//! An environment is one stage of the promotion chain. Its lifecycle is a
//! state machine with explicit, validated transitions.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::PromotionError;

/// Lifecycle status of an environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum EnvironmentStatus {
    /// Nothing done yet in this run
    #[default]
    Pending,
    /// Repository exists
    Created,
    /// Artifacts committed to the repository
    XmlsAdded,
    /// First version tag cut
    V1Created,
    /// Folder promotion in flight
    Promoting,
    /// Workflow finished successfully
    Completed,
    /// Workflow failed; see `error_message`
    Error,
}

impl EnvironmentStatus {
    /// Wire name of the status
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Created => "created",
            Self::XmlsAdded => "xmlsAdded",
            Self::V1Created => "v1Created",
            Self::Promoting => "promoting",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    /// Whether the lifecycle allows moving from `self` to `next`.
    ///
    /// `promoting` and `error` are reachable from anywhere. Everything else
    /// must follow the provisioning chain, so an environment can never be
    /// versioned without having been created first.
    pub fn can_transition_to(&self, next: EnvironmentStatus) -> bool {
        use EnvironmentStatus::*;

        match (self, next) {
            (_, Promoting) | (_, Error) => true,
            (Pending, Created) => true,
            (Created, XmlsAdded) | (Created, Completed) => true,
            (XmlsAdded, V1Created) | (XmlsAdded, Completed) => true,
            // Direct workflow: ingestion completes, the tag is recorded on top
            (Completed, Completed) => true,
            (Promoting, Completed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for EnvironmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A parsed `owner/repo` pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// Parse `owner/repo`. Both sides must be non-empty and there must be
    /// exactly one separator.
    pub fn parse(value: &str) -> Option<Self> {
        let (owner, name) = value.trim().split_once('/')?;
        let (owner, name) = (owner.trim(), name.trim());
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return None;
        }
        Some(Self::new(owner, name))
    }

    /// Full `owner/repo` slug
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// One stage of the deployment chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    pub name: String,
    /// Raw `owner/repo` string as configured
    pub repo_name: Option<String>,
    /// Parsed repository; unset when `repo_name` is absent or malformed
    pub repo: Option<RepoRef>,
    /// Source-of-truth URL for raw artifacts
    pub api_url: Option<String>,
    /// HTML URL of the repository once ensured
    pub repo_url: Option<String>,
    pub status: EnvironmentStatus,
    pub artifact_count: usize,
    pub version: Option<String>,
    pub error_message: Option<String>,
    pub available_folders: Vec<String>,
    pub selected_folder: Option<String>,
    pub source_environment_name: Option<String>,
}

impl Environment {
    /// Create a pending environment with no repository
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            repo_name: None,
            repo: None,
            api_url: None,
            repo_url: None,
            status: EnvironmentStatus::Pending,
            artifact_count: 0,
            version: None,
            error_message: None,
            available_folders: Vec::new(),
            selected_folder: None,
            source_environment_name: None,
        }
    }

    /// Builder: set the `owner/repo` identifier
    pub fn with_repo(mut self, repo_name: impl Into<String>) -> Self {
        self.set_repo_name(repo_name);
        self
    }

    /// Builder: set the artifact API URL
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = Some(api_url.into());
        self
    }

    /// Store the raw identifier and its parsed form (if well-formed)
    pub fn set_repo_name(&mut self, repo_name: impl Into<String>) {
        let raw = repo_name.into();
        self.repo = RepoRef::parse(&raw);
        self.repo_name = Some(raw);
    }

    /// Whether a repository is configured and parseable
    pub fn has_repository(&self) -> bool {
        self.repo.is_some()
    }

    /// Parsed repository or a validation error naming the raw value
    pub fn require_repo(&self) -> Result<&RepoRef, PromotionError> {
        self.repo.as_ref().ok_or_else(|| match &self.repo_name {
            Some(raw) => PromotionError::Validation(format!(
                "Invalid repository '{}' for {}. Expected format: owner/repo",
                raw, self.name
            )),
            None => PromotionError::Validation(format!(
                "No repository configured for {}",
                self.name
            )),
        })
    }

    /// Move to `next`, rejecting transitions the lifecycle does not allow
    pub fn transition(&mut self, next: EnvironmentStatus) -> Result<(), PromotionError> {
        if !self.status.can_transition_to(next) {
            return Err(PromotionError::InvalidTransition {
                environment: self.name.clone(),
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        if next != EnvironmentStatus::Error {
            self.error_message = None;
        }
        Ok(())
    }

    /// Record a failure. Always allowed.
    pub fn fail(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.status = EnvironmentStatus::Error;
        self.error_message = Some(if message.trim().is_empty() {
            format!("{} failed without a message", self.name)
        } else {
            message
        });
    }

    /// Start a new run: back to `pending`, working state cleared
    pub fn reset(&mut self) {
        self.status = EnvironmentStatus::Pending;
        self.error_message = None;
        self.artifact_count = 0;
        self.version = None;
    }
}

/// Partial update merged by the registry
#[derive(Debug, Clone, Default)]
pub struct EnvironmentUpdate {
    pub repo_name: Option<String>,
    pub api_url: Option<String>,
    pub repo_url: Option<String>,
    pub status: Option<EnvironmentStatus>,
    pub artifact_count: Option<usize>,
    pub version: Option<String>,
    pub error_message: Option<String>,
    pub available_folders: Option<Vec<String>>,
    pub selected_folder: Option<String>,
    pub source_environment_name: Option<String>,
}

impl EnvironmentUpdate {
    pub fn repo(repo_name: impl Into<String>) -> Self {
        Self {
            repo_name: Some(repo_name.into()),
            ..Default::default()
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = Some(api_url.into());
        self
    }

    /// Merge into an environment. Only fields that are set are touched.
    pub fn apply_to(self, env: &mut Environment) {
        if let Some(repo_name) = self.repo_name {
            env.set_repo_name(repo_name);
        }
        if let Some(api_url) = self.api_url {
            env.api_url = Some(api_url);
        }
        if let Some(repo_url) = self.repo_url {
            env.repo_url = Some(repo_url);
        }
        if let Some(status) = self.status {
            env.status = status;
        }
        if let Some(count) = self.artifact_count {
            env.artifact_count = count;
        }
        if let Some(version) = self.version {
            env.version = Some(version);
        }
        if let Some(message) = self.error_message {
            env.error_message = Some(message);
        }
        if let Some(folders) = self.available_folders {
            env.available_folders = folders;
        }
        if let Some(folder) = self.selected_folder {
            env.selected_folder = Some(folder);
        }
        if let Some(source) = self.source_environment_name {
            env.source_environment_name = Some(source);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_ref_parse() {
        let repo = RepoRef::parse("acme/config-dev-repo").unwrap();
        assert_eq!(repo.owner, "acme");
        assert_eq!(repo.name, "config-dev-repo");
        assert_eq!(repo.slug(), "acme/config-dev-repo");
    }

    #[test]
    fn test_repo_ref_parse_malformed() {
        assert!(RepoRef::parse("no-slash").is_none());
        assert!(RepoRef::parse("/repo").is_none());
        assert!(RepoRef::parse("owner/").is_none());
        assert!(RepoRef::parse("a/b/c").is_none());
    }

    #[test]
    fn test_malformed_repo_keeps_raw_value() {
        let env = Environment::new("QA").with_repo("not-a-slug");
        assert_eq!(env.repo_name.as_deref(), Some("not-a-slug"));
        assert!(!env.has_repository());
        let err = env.require_repo().unwrap_err();
        assert!(err.to_string().contains("owner/repo"));
    }

    #[test]
    fn test_lifecycle_cannot_skip_created() {
        let mut env = Environment::new("Dev");
        assert!(env.transition(EnvironmentStatus::V1Created).is_err());
        assert!(env.transition(EnvironmentStatus::XmlsAdded).is_err());
        assert_eq!(env.status, EnvironmentStatus::Pending);

        env.transition(EnvironmentStatus::Created).unwrap();
        env.transition(EnvironmentStatus::XmlsAdded).unwrap();
        env.transition(EnvironmentStatus::V1Created).unwrap();
    }

    #[test]
    fn test_promoting_and_error_reachable_from_anywhere() {
        for status in [
            EnvironmentStatus::Pending,
            EnvironmentStatus::Created,
            EnvironmentStatus::Completed,
            EnvironmentStatus::Error,
        ] {
            assert!(status.can_transition_to(EnvironmentStatus::Promoting));
            assert!(status.can_transition_to(EnvironmentStatus::Error));
        }
        assert!(EnvironmentStatus::Promoting.can_transition_to(EnvironmentStatus::Completed));
    }

    #[test]
    fn test_fail_always_has_message() {
        let mut env = Environment::new("Prod");
        env.fail("  ");
        assert_eq!(env.status, EnvironmentStatus::Error);
        assert!(!env.error_message.unwrap().trim().is_empty());
    }

    #[test]
    fn test_update_merges_only_set_fields() {
        let mut env = Environment::new("QA").with_api_url("https://qa.example.com");
        EnvironmentUpdate::repo("acme/qa").apply_to(&mut env);
        assert_eq!(env.api_url.as_deref(), Some("https://qa.example.com"));
        assert_eq!(env.repo, Some(RepoRef::new("acme", "qa")));
    }

    #[test]
    fn test_status_serializes_camel_case() {
        let json = serde_json::to_string(&EnvironmentStatus::XmlsAdded).unwrap();
        assert_eq!(json, "\"xmlsAdded\"");
        assert_eq!(EnvironmentStatus::V1Created.to_string(), "v1Created");
    }
}
