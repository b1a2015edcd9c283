//! Domain layer - pure business logic
//!
//! This module contains business logic with no external I/O.
//! Types and functions here can be unit tested without mocking.

pub mod artifact;
pub mod environment;
pub mod promotion;
pub mod registry;
pub mod resolver;
pub mod version;

// Re-export commonly used types
pub use artifact::{ArtifactFormat, FileArtifact};
pub use environment::{Environment, EnvironmentStatus, EnvironmentUpdate, RepoRef};
pub use promotion::{CommitOutcome, CommitTally, EnvOutcome, PromotionResult, RunReport};
pub use registry::EnvironmentRegistry;
pub use resolver::SourceResolver;
