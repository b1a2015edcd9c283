//! Centralized error types for relay
//!
//! Uses thiserror for typed errors that can be matched on,
//! while still being compatible with anyhow for propagation.

use thiserror::Error;

/// Top-level error type for relay operations
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Repository host error: {0}")]
    Host(#[from] HostError),

    #[error("Promotion error: {0}")]
    Promotion(#[from] PromotionError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),
}

/// Errors returned by a repository host client
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    #[error("Repository host token not set. Pass --token, set GITHUB_TOKEN, or run `relay auth set`")]
    MissingCredential,

    #[error("Repository host token is invalid or expired")]
    AuthRejected,

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("Transient host failure: {message}")]
    Transient { message: String },

    #[error("Host rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Failed to decode host response: {message}")]
    Decode { message: String },
}

impl HostError {
    /// Whether a retry has a chance of succeeding
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }
}

/// Errors raised while driving an environment through its lifecycle
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PromotionError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("No source environment found for {target}")]
    NoSourceEnvironment { target: String },

    #[error("No files found in folder {folder}")]
    EmptyFolder { folder: String },

    #[error("No commits found in {repo}")]
    NoCommits { repo: String },

    #[error("{failed} of {total} files failed: {files}")]
    AggregateFailure {
        failed: usize,
        total: usize,
        files: String,
    },

    #[error("Environment {environment} cannot move from {from} to {to}")]
    InvalidTransition {
        environment: String,
        from: String,
        to: String,
    },

    #[error("Artifact source failed: {0}")]
    Source(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Host(#[from] HostError),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Required configuration missing: {field}")]
    MissingField { field: String },

    #[error("Invalid configuration value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Config file not found: {path}")]
    FileNotFound { path: String },

    #[error("Failed to parse config: {message}")]
    ParseError { message: String },
}

/// Credential store errors
#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("Credential store is read-only: {store}")]
    ReadOnly { store: String },

    #[error("Credential store I/O failed at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
