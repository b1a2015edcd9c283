//! Command implementations
//!
//! Each submodule exposes `execute` functions called from `main`. Shared
//! setup (config, host, context) lives here so every command builds its run
//! the same way.

pub mod auth;
pub mod inspect;
pub mod lifecycle;
pub mod promote;

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::RelayConfig;
use crate::domain::Environment;
use crate::infrastructure::artifact_source::DEFAULT_SAMPLE_COUNT;
use crate::infrastructure::{
    discover_token, ArtifactSource, CredentialStore, FileCredentialStore, GitHubClient,
    InMemoryHost, RepositoryHost,
};
use crate::observability::EventRecorder;
use crate::services::{CancelSignal, PromotionContext, PromotionOrchestrator};

/// Login used by the offline host when nothing better is configured
const OFFLINE_USER: &str = "relay";

/// Flags shared by every command
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub config: Option<PathBuf>,
    pub token: Option<String>,
    pub offline: bool,
    pub events: bool,
}

/// Where `ingest` and `run` take artifacts from
#[derive(Debug, Clone, Default)]
pub struct SourceOptions {
    pub from_dir: Option<PathBuf>,
    pub sample: Option<usize>,
}

impl SourceOptions {
    /// Source for one environment: explicit flags win, then the
    /// environment's API, then samples
    pub fn source_for(&self, env: &Environment) -> ArtifactSource {
        if let Some(path) = &self.from_dir {
            return ArtifactSource::Directory { path: path.clone() };
        }
        if let Some(count) = self.sample {
            return ArtifactSource::Sample { count };
        }
        ArtifactSource::for_environment(env, DEFAULT_SAMPLE_COUNT)
    }
}

pub fn load_config(options: &GlobalOptions) -> Result<RelayConfig> {
    let config = RelayConfig::load(options.config.as_deref())
        .context("Failed to load configuration")?;
    debug!(
        environments = config.environments.len(),
        api_url = %config.host.api_url,
        "Configuration loaded"
    );
    Ok(config)
}

/// Repository host for this run: GitHub, or in memory with `--offline`
pub fn connect_host(
    config: &RelayConfig,
    options: &GlobalOptions,
) -> Result<Arc<dyn RepositoryHost>> {
    if options.offline {
        let user = config
            .host
            .owner
            .clone()
            .or_else(|| {
                config
                    .build_registry()
                    .list()
                    .iter()
                    .find_map(|env| env.repo.as_ref().map(|r| r.owner.clone()))
            })
            .unwrap_or_else(|| OFFLINE_USER.to_string());
        info!(user = %user, "Using in-memory repository host");
        return Ok(Arc::new(InMemoryHost::new(user)));
    }

    let store = FileCredentialStore::default_location();
    let token = discover_token(
        options.token.clone(),
        store.as_ref().map(|s| s as &dyn CredentialStore),
    );
    if token.is_none() {
        debug!("No host token found; authenticated calls will fail");
    }

    let client = GitHubClient::new(&config.host, token).context("Failed to create GitHub client")?;
    Ok(Arc::new(client))
}

/// Full promotion context for one run
pub fn build_context(options: &GlobalOptions, cancel: CancelSignal) -> Result<PromotionContext> {
    let config = load_config(options)?;
    let host = connect_host(&config, options)?;

    let events = EventRecorder::new(options.events || EventRecorder::enabled_from_env());
    let orchestrator = PromotionOrchestrator::new(host, &config)
        .with_events(events)
        .with_cancel(cancel);

    let http = reqwest::Client::builder()
        .timeout(config.host.timeout)
        .connect_timeout(config.host.connect_timeout)
        .build()
        .context("Failed to create HTTP client")?;

    Ok(PromotionContext::new(config.build_registry(), orchestrator).with_http_client(http))
}
