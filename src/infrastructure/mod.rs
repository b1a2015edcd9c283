//! Infrastructure layer - external I/O adapters
//!
//! This module contains all code that interacts with external systems:
//! - Repository host (GitHub REST, or in memory for offline runs)
//! - Artifact sources (HTTP API, local directory)
//! - Token storage

pub mod artifact_source;
pub mod credentials;
pub mod github;
pub mod host;
pub mod memory;

// Re-export commonly used types
pub use artifact_source::ArtifactSource;
pub use credentials::{
    discover_token, CredentialStore, EnvCredentialStore, FileCredentialStore,
    MemoryCredentialStore,
};
pub use github::GitHubClient;
pub use host::RepositoryHost;
pub use memory::{FaultOp, InMemoryHost};
