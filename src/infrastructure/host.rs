//! Repository host interface
//!
//! Typed surface over the remote host's repository, content and tagging
//! primitives. Modeled on the GitHub v3 REST API but host-agnostic: the
//! orchestration layer only talks to this trait.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::HostError;

/// Repository as returned by the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    #[serde(default)]
    pub full_name: Option<String>,
    /// API URL
    pub url: String,
    /// Browser URL
    pub html_url: String,
}

/// Parameters for repository creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateRepository {
    /// Organisation to create under; `None` means the authenticated user
    #[serde(skip)]
    pub owner: Option<String>,
    pub name: String,
    pub description: String,
    pub private: bool,
    pub auto_init: bool,
}

impl CreateRepository {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            owner: None,
            name: name.into(),
            description: description.into(),
            private: false,
            auto_init: true,
        }
    }

    pub fn in_org(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn private(mut self, private: bool) -> Self {
        self.private = private;
        self
    }
}

/// Kind of a content entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
    Symlink,
    Submodule,
    #[serde(other)]
    Other,
}

/// One entry of a directory listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentEntry {
    pub name: String,
    #[serde(default)]
    pub path: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    /// Inline base64 content (only present on single-file responses)
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub sha: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

impl ContentEntry {
    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Dir
    }
}

/// Result of a create-or-update file write
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommitResult {
    pub content_sha: Option<String>,
    pub commit_sha: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub sha: String,
}

/// Annotated tag object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagObject {
    pub sha: String,
    #[serde(default)]
    pub tag: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefResult {
    #[serde(rename = "ref")]
    pub ref_name: String,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub id: u64,
    pub tag_name: String,
    #[serde(default)]
    pub html_url: Option<String>,
}

/// Remote repository host
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RepositoryHost: Send + Sync {
    /// Browser URL of a repository, without a network call
    fn html_url(&self, owner: &str, repo: &str) -> String;

    /// Existence probe. "Not found" is `Ok(false)`, not an error.
    async fn repository_exists(&self, owner: &str, repo: &str) -> Result<bool, HostError>;

    /// Create a repository (with an initial commit when `auto_init` is set)
    async fn create_repository(&self, request: &CreateRepository) -> Result<Repository, HostError>;

    /// Entries directly under `path` (empty path = repository root)
    async fn list_contents(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
    ) -> Result<Vec<ContentEntry>, HostError>;

    /// Raw bytes behind a download URL
    async fn download(&self, url: &str) -> Result<Vec<u8>, HostError>;

    /// Create-or-update a file. `content_base64` is the encoded file body.
    async fn put_file(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        content_base64: &str,
        message: &str,
        branch: &str,
    ) -> Result<CommitResult, HostError>;

    /// Commits on the default branch, newest first
    async fn list_commits(&self, owner: &str, repo: &str) -> Result<Vec<Commit>, HostError>;

    /// Create an annotated tag object pointing at `object_sha`
    async fn create_tag_object(
        &self,
        owner: &str,
        repo: &str,
        tag: &str,
        message: &str,
        object_sha: &str,
    ) -> Result<TagObject, HostError>;

    /// Create a reference such as `refs/tags/v1.0.0`
    async fn create_ref(
        &self,
        owner: &str,
        repo: &str,
        ref_name: &str,
        sha: &str,
    ) -> Result<RefResult, HostError>;

    /// Create a published release (creates the tag implicitly)
    async fn create_release(
        &self,
        owner: &str,
        repo: &str,
        tag_name: &str,
        name: &str,
        body: &str,
    ) -> Result<Release, HostError>;
}

/// Base64 encoding used by the contents API
pub fn encode_content(content: &[u8]) -> String {
    STANDARD.encode(content)
}

/// Decode contents API base64, which may be wrapped across lines
pub fn decode_content(encoded: &str) -> Result<Vec<u8>, HostError> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD.decode(compact).map_err(|e| HostError::Decode {
        message: format!("invalid base64 content: {}", e),
    })
}
