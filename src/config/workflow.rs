//! Lifecycle workflow settings.

use serde::{Deserialize, Serialize};

/// Which status ingestion and tagging leave an environment in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowVariant {
    /// created → xmlsAdded → v1Created
    #[default]
    Staged,
    /// created → completed, tag recorded on the completed environment
    Direct,
}

/// How a version is cut
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TagStrategy {
    /// Annotated tag object plus `refs/tags/<tag>`
    #[default]
    Annotated,
    /// Published release (the host creates the tag)
    Release,
}

/// Behaviour when promoting a folder with no files in the source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmptyFolderPolicy {
    /// Promotion fails naming the folder
    #[default]
    Fail,
    /// Commit `<folder>/.gitkeep` to the target and succeed
    Placeholder,
}

/// Workflow configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    #[serde(default)]
    pub variant: WorkflowVariant,

    /// Folder ingested artifacts are committed under
    #[serde(default = "default_initial_folder")]
    pub initial_folder: String,

    #[serde(default = "default_tag_name")]
    pub tag_name: String,

    #[serde(default = "default_tag_message")]
    pub tag_message: String,

    #[serde(default)]
    pub tag_strategy: TagStrategy,

    #[serde(default)]
    pub empty_folder_policy: EmptyFolderPolicy,
}

fn default_initial_folder() -> String {
    "V1".to_string()
}

fn default_tag_name() -> String {
    "v1.0.0".to_string()
}

fn default_tag_message() -> String {
    "Initial version".to_string()
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            variant: WorkflowVariant::default(),
            initial_folder: default_initial_folder(),
            tag_name: default_tag_name(),
            tag_message: default_tag_message(),
            tag_strategy: TagStrategy::default(),
            empty_folder_policy: EmptyFolderPolicy::default(),
        }
    }
}
