//! Promotion results and per-environment outcomes

use serde::Serialize;

use crate::domain::environment::Environment;

/// Terminal value of a promotion attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionResult {
    pub success: bool,
    pub message: String,
    pub source_repo: Option<String>,
    pub target_repo: Option<String>,
    pub folder_name: String,
}

impl PromotionResult {
    pub fn success(
        source: &Environment,
        target: &Environment,
        folder: &str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            success: true,
            message: message.into(),
            source_repo: source.repo_name.clone(),
            target_repo: target.repo_name.clone(),
            folder_name: folder.to_string(),
        }
    }

    pub fn failure(
        source: Option<&Environment>,
        target: &Environment,
        folder: &str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            message: message.into(),
            source_repo: source.and_then(|s| s.repo_name.clone()),
            target_repo: target.repo_name.clone(),
            folder_name: folder.to_string(),
        }
    }
}

/// Per-file result of a batch commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed {
        filename: String,
        commit_sha: Option<String>,
        content_sha: Option<String>,
    },
    Failed {
        filename: String,
        error: String,
    },
}

impl CommitOutcome {
    pub fn filename(&self) -> &str {
        match self {
            Self::Committed { filename, .. } | Self::Failed { filename, .. } => filename,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Committed { .. })
    }
}

/// Summary of a batch commit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitTally {
    pub committed: usize,
    pub failed: usize,
}

impl CommitTally {
    pub fn of(outcomes: &[CommitOutcome]) -> Self {
        let committed = outcomes.iter().filter(|o| o.is_success()).count();
        Self {
            committed,
            failed: outcomes.len() - committed,
        }
    }

    pub fn total(&self) -> usize {
        self.committed + self.failed
    }
}

/// Names of the files that failed, comma separated
pub fn failed_files(outcomes: &[CommitOutcome]) -> String {
    outcomes
        .iter()
        .filter(|o| !o.is_success())
        .map(|o| o.filename())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result of one operation on one environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum EnvOutcome {
    Succeeded { environment: String, detail: String },
    Failed { environment: String, error: String },
    Skipped { environment: String, reason: String },
}

impl EnvOutcome {
    pub fn environment(&self) -> &str {
        match self {
            Self::Succeeded { environment, .. }
            | Self::Failed { environment, .. }
            | Self::Skipped { environment, .. } => environment,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Outcomes of a fanned-out operation, in registry order
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub operation: String,
    pub outcomes: Vec<EnvOutcome>,
}

impl RunReport {
    pub fn new(operation: impl Into<String>, outcomes: Vec<EnvOutcome>) -> Self {
        Self {
            operation: operation.into(),
            outcomes,
        }
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failure()).count()
    }

    pub fn all_succeeded(&self) -> bool {
        self.outcomes
            .iter()
            .all(|o| !o.is_failure())
    }

    pub fn get(&self, environment: &str) -> Option<&EnvOutcome> {
        self.outcomes.iter().find(|o| o.environment() == environment)
    }
}
