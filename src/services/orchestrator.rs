//! Promotion orchestrator - drives one environment through its lifecycle
//!
//! Lifecycle:
//!
//! ```text
//! pending ─► created ─► xmlsAdded ─► v1Created        (staged)
//!                 └────► completed ─► completed        (direct)
//! any ─► promoting ─► completed | error
//! any ─► error
//! ```
//!
//! Every operation takes the environment by `&mut` and is the only writer
//! of its record for the duration of the call. Failures are recorded on the
//! environment (`status = error`, `error_message`) and returned; they never
//! touch other environments.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{
    EmptyFolderPolicy, HostConfig, RelayConfig, TagStrategy, WorkflowConfig, WorkflowVariant,
};
use crate::domain::promotion::{failed_files, CommitTally};
use crate::domain::{Environment, EnvironmentStatus, FileArtifact, PromotionResult, RepoRef};
use crate::error::{HostError, PromotionError};
use crate::infrastructure::host::{CreateRepository, RepositoryHost};
use crate::observability::EventRecorder;
use crate::services::cancel::CancelSignal;
use crate::services::folder_sync::FolderSync;

/// Commit message prefix for ingested artifacts
const INGEST_MESSAGE: &str = "Add configuration";

/// Result of a lifecycle step that ran or was not applicable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Done(String),
    Skipped(String),
}

pub struct PromotionOrchestrator {
    sync: FolderSync,
    workflow: WorkflowConfig,
    host: HostConfig,
    events: EventRecorder,
    cancel: CancelSignal,
}

impl PromotionOrchestrator {
    pub fn new(host: Arc<dyn RepositoryHost>, config: &RelayConfig) -> Self {
        Self {
            sync: FolderSync::new(host, config),
            workflow: config.workflow.clone(),
            host: config.host.clone(),
            events: EventRecorder::disabled(),
            cancel: CancelSignal::never(),
        }
    }

    pub fn with_events(mut self, events: EventRecorder) -> Self {
        self.events = events;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn folder_sync(&self) -> &FolderSync {
        &self.sync
    }

    pub fn workflow(&self) -> &WorkflowConfig {
        &self.workflow
    }

    pub fn events(&self) -> &EventRecorder {
        &self.events
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn set_status(&self, env: &mut Environment, next: EnvironmentStatus) -> Result<(), PromotionError> {
        let from = env.status;
        env.transition(next)?;
        debug!(environment = %env.name, %from, to = %next, "Status changed");
        self.events.status_changed(&env.name, from, next, None);
        Ok(())
    }

    fn record_failure(&self, env: &mut Environment, error: &PromotionError) {
        let from = env.status;
        env.fail(error.to_string());
        warn!(environment = %env.name, error = %error, "Environment failed");
        self.events
            .status_changed(&env.name, from, EnvironmentStatus::Error, env.error_message.as_deref());
    }

    /// Make sure the environment's repository exists, creating it when the
    /// probe says it does not. Starts a new run for the environment.
    pub async fn ensure_repository(&self, env: &mut Environment) -> Result<String, PromotionError> {
        env.reset();

        let result = self.try_ensure_repository(env).await;
        match result {
            Ok(url) => {
                env.repo_url = Some(url.clone());
                if let Err(e) = self.set_status(env, EnvironmentStatus::Created) {
                    self.record_failure(env, &e);
                    return Err(e);
                }
                Ok(url)
            }
            Err(e) => {
                self.record_failure(env, &e);
                Err(e)
            }
        }
    }

    async fn try_ensure_repository(&self, env: &Environment) -> Result<String, PromotionError> {
        let repo = env.require_repo()?;
        let host = self.sync.host();

        if host.repository_exists(&repo.owner, &repo.name).await? {
            info!(environment = %env.name, repo = %repo, "Repository already exists");
            return Ok(host.html_url(&repo.owner, &repo.name));
        }

        let mut request = CreateRepository::new(
            repo.name.clone(),
            format!("Configuration artifacts for the {} environment", env.name),
        )
        .private(self.host.private);
        if self.host.owner_is_org {
            request = request.in_org(repo.owner.clone());
        }

        let created = host.create_repository(&request).await?;
        info!(environment = %env.name, repo = %repo, url = %created.html_url, "Created repository");
        Ok(created.html_url)
    }

    /// Commit artifacts under the initial version folder.
    ///
    /// Skipped unless the environment is `created`. At least one file must
    /// land for the step to succeed.
    pub async fn ingest_artifacts(
        &self,
        env: &mut Environment,
        artifacts: Vec<FileArtifact>,
    ) -> Result<StepOutcome, PromotionError> {
        if env.status != EnvironmentStatus::Created {
            return Ok(StepOutcome::Skipped(format!(
                "status is {}, ingestion needs created",
                env.status
            )));
        }
        if self.is_cancelled() {
            return Ok(StepOutcome::Skipped("cancelled".to_string()));
        }

        let result = self.try_ingest(env, artifacts).await;
        match result {
            Ok((committed, total)) => {
                env.artifact_count = committed;
                let next = match self.workflow.variant {
                    WorkflowVariant::Staged => EnvironmentStatus::XmlsAdded,
                    WorkflowVariant::Direct => EnvironmentStatus::Completed,
                };
                if let Err(e) = self.set_status(env, next) {
                    self.record_failure(env, &e);
                    return Err(e);
                }
                Ok(StepOutcome::Done(format!(
                    "{} of {} artifacts committed to {}",
                    committed, total, self.workflow.initial_folder
                )))
            }
            Err(e) => {
                self.record_failure(env, &e);
                Err(e)
            }
        }
    }

    async fn try_ingest(
        &self,
        env: &Environment,
        artifacts: Vec<FileArtifact>,
    ) -> Result<(usize, usize), PromotionError> {
        let repo = env.require_repo()?;
        if artifacts.is_empty() {
            return Err(PromotionError::Validation(format!(
                "No artifacts to ingest for {}",
                env.name
            )));
        }

        let folder = self.workflow.initial_folder.as_str();
        let files: Vec<FileArtifact> = artifacts.into_iter().map(|a| a.in_folder(folder)).collect();

        let outcomes = self
            .sync
            .batch_commit(repo, &files, INGEST_MESSAGE, &self.cancel)
            .await;
        let tally = CommitTally::of(&outcomes);
        self.events
            .files_committed(&env.name, &repo.slug(), tally.committed, tally.failed);

        if tally.committed == 0 {
            return Err(PromotionError::AggregateFailure {
                failed: tally.failed,
                total: tally.total(),
                files: failed_files(&outcomes),
            });
        }
        if tally.failed > 0 {
            warn!(
                environment = %env.name,
                failed = tally.failed,
                files = %failed_files(&outcomes),
                "Some artifacts were not committed"
            );
        }
        Ok((tally.committed, tally.total()))
    }

    /// Pick up artifacts committed by an earlier run.
    ///
    /// A `created` environment whose initial folder already holds files
    /// moves on as if it had just been ingested, so a version can be cut
    /// without committing the artifacts again.
    pub async fn recover_ingested(
        &self,
        env: &mut Environment,
    ) -> Result<StepOutcome, PromotionError> {
        if env.status != EnvironmentStatus::Created {
            return Ok(StepOutcome::Skipped(format!(
                "status is {}, recovery needs created",
                env.status
            )));
        }

        let folder = self.workflow.initial_folder.trim_matches('/');
        let listing = match env.require_repo() {
            Ok(repo) => self.sync.list_folder_contents(repo, folder).await,
            Err(e) => {
                self.record_failure(env, &e);
                return Err(e);
            }
        };

        let count = match listing {
            Ok(entries) => entries.iter().filter(|e| e.is_file()).count(),
            Err(HostError::NotFound { .. }) => 0,
            Err(e) => {
                let e = PromotionError::from(e);
                self.record_failure(env, &e);
                return Err(e);
            }
        };
        if count == 0 {
            return Ok(StepOutcome::Skipped(format!("no artifacts in {}", folder)));
        }

        env.artifact_count = count;
        let next = match self.workflow.variant {
            WorkflowVariant::Staged => EnvironmentStatus::XmlsAdded,
            WorkflowVariant::Direct => EnvironmentStatus::Completed,
        };
        if let Err(e) = self.set_status(env, next) {
            self.record_failure(env, &e);
            return Err(e);
        }
        Ok(StepOutcome::Done(format!("{} artifacts in {}", count, folder)))
    }

    /// Cut a version on the latest commit. Needs prior ingestion.
    pub async fn cut_version(
        &self,
        env: &mut Environment,
        tag: &str,
        message: &str,
    ) -> Result<StepOutcome, PromotionError> {
        let ingested = match env.status {
            EnvironmentStatus::XmlsAdded => true,
            EnvironmentStatus::Completed => env.artifact_count > 0,
            _ => false,
        };
        if !ingested {
            return Ok(StepOutcome::Skipped(format!(
                "status is {}, versioning needs ingested artifacts",
                env.status
            )));
        }
        if self.is_cancelled() {
            return Ok(StepOutcome::Skipped("cancelled".to_string()));
        }

        let result = self.try_cut_version(env, tag, message).await;
        match result {
            Ok(detail) => {
                env.version = Some(tag.to_string());
                let next = match (env.status, self.workflow.variant) {
                    (EnvironmentStatus::XmlsAdded, WorkflowVariant::Staged) => {
                        EnvironmentStatus::V1Created
                    }
                    _ => EnvironmentStatus::Completed,
                };
                if let Err(e) = self.set_status(env, next) {
                    self.record_failure(env, &e);
                    return Err(e);
                }
                Ok(StepOutcome::Done(detail))
            }
            Err(e) => {
                self.record_failure(env, &e);
                Err(e)
            }
        }
    }

    async fn try_cut_version(
        &self,
        env: &Environment,
        tag: &str,
        message: &str,
    ) -> Result<String, PromotionError> {
        let repo = env.require_repo()?;
        if tag.trim().is_empty() {
            return Err(PromotionError::Validation("Tag name must not be empty".to_string()));
        }

        let host = self.sync.host();
        let (owner, name) = (repo.owner.as_str(), repo.name.as_str());
        let commits = self
            .sync
            .retry()
            .run(name, move || host.list_commits(owner, name))
            .await?;
        let head = commits
            .first()
            .map(|c| c.sha.clone())
            .ok_or_else(|| PromotionError::NoCommits { repo: repo.slug() })?;

        match self.workflow.tag_strategy {
            TagStrategy::Annotated => {
                let tag_object = host
                    .create_tag_object(owner, name, tag, message, &head)
                    .await?;
                let reference = host
                    .create_ref(owner, name, &format!("refs/tags/{}", tag), &tag_object.sha)
                    .await?;
                info!(environment = %env.name, tag, commit = %head, "Tagged");
                Ok(format!("{} at {}", reference.ref_name, short_sha(&head)))
            }
            TagStrategy::Release => {
                let release = host.create_release(owner, name, tag, tag, message).await?;
                info!(environment = %env.name, tag, release = release.id, "Released");
                Ok(format!(
                    "release {}{}",
                    release.tag_name,
                    release
                        .html_url
                        .map(|u| format!(" ({})", u))
                        .unwrap_or_default()
                ))
            }
        }
    }

    /// Folders that could be promoted into `env`: the source's folders,
    /// or none without a source. Recorded on the environment.
    pub async fn refresh_folders(&self, env: &mut Environment, source: Option<&Environment>) {
        match source {
            Some(source) => {
                env.available_folders = self.sync.list_folders(source).await;
                env.source_environment_name = Some(source.name.clone());
            }
            None => {
                env.available_folders = Vec::new();
                env.source_environment_name = None;
            }
        }
    }

    /// Copy `folder` from `source` into `target`.
    ///
    /// Input problems (blank folder, no source, unconfigured target) fail
    /// fast without touching the target's status. Once promotion starts the
    /// target ends `completed` or `error`.
    pub async fn promote(
        &self,
        target: &mut Environment,
        source: Option<&Environment>,
        folder: &str,
    ) -> PromotionResult {
        let folder = folder.trim().trim_matches('/');

        let precheck = if folder.is_empty() {
            Err(PromotionError::Validation("Please select a folder to promote".to_string()))
        } else if self.is_cancelled() {
            Err(PromotionError::Cancelled)
        } else {
            match source {
                None => Err(PromotionError::NoSourceEnvironment {
                    target: target.name.clone(),
                }),
                Some(source) => source.require_repo().and_then(|s| {
                    target
                        .require_repo()
                        .map(|t| (source, s.clone(), t.clone()))
                }),
            }
        };

        let (source, source_repo, target_repo) = match precheck {
            Ok(checked) => checked,
            Err(e) => {
                let message = e.to_string();
                self.events.promotion_finished(
                    &target.name,
                    source.map(|s| s.name.as_str()),
                    folder,
                    false,
                    &message,
                );
                return PromotionResult::failure(source, target, folder, message);
            }
        };

        if let Err(e) = self.set_status(target, EnvironmentStatus::Promoting) {
            self.record_failure(target, &e);
            return PromotionResult::failure(Some(source), target, folder, e.to_string());
        }
        target.selected_folder = Some(folder.to_string());
        target.source_environment_name = Some(source.name.clone());

        info!(source = %source.name, target = %target.name, folder, "Promoting folder");

        let result = self
            .try_promote(&source.name, &source_repo, &target_repo, &target.name, folder)
            .await
            .and_then(|committed| {
                target.artifact_count = committed;
                self.set_status(target, EnvironmentStatus::Completed)?;
                Ok(committed)
            });

        let outcome = match result {
            Ok(committed) => PromotionResult::success(
                source,
                target,
                folder,
                format!(
                    "Promoted {} files in {} from {} to {}",
                    committed, folder, source.name, target.name
                ),
            ),
            Err(e) => {
                self.record_failure(target, &e);
                PromotionResult::failure(Some(source), target, folder, e.to_string())
            }
        };

        self.events.promotion_finished(
            &target.name,
            Some(&source.name),
            folder,
            outcome.success,
            &outcome.message,
        );
        outcome
    }

    async fn try_promote(
        &self,
        source_name: &str,
        source_repo: &RepoRef,
        target_repo: &RepoRef,
        target_name: &str,
        folder: &str,
    ) -> Result<usize, PromotionError> {
        let mut files = self.sync.read_folder(source_repo, folder).await?;

        if files.is_empty() {
            match self.workflow.empty_folder_policy {
                EmptyFolderPolicy::Fail => {
                    return Err(PromotionError::EmptyFolder {
                        folder: folder.to_string(),
                    })
                }
                EmptyFolderPolicy::Placeholder => {
                    debug!(folder, "Empty folder, committing placeholder");
                    files.push(FileArtifact::new(format!("{}/.gitkeep", folder), Vec::new()));
                }
            }
        }

        let prefix = format!("Promote from {}", source_name);
        let outcomes = self
            .sync
            .batch_commit(target_repo, &files, &prefix, &self.cancel)
            .await;
        let tally = CommitTally::of(&outcomes);
        self.events
            .files_committed(target_name, &target_repo.slug(), tally.committed, tally.failed);

        if tally.failed > 0 {
            return Err(PromotionError::AggregateFailure {
                failed: tally.failed,
                total: tally.total(),
                files: failed_files(&outcomes),
            });
        }
        Ok(tally.committed)
    }
}

fn short_sha(sha: &str) -> &str {
    sha.get(..7).unwrap_or(sha)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::host::{Commit, MockRepositoryHost, Repository};
    use crate::infrastructure::memory::{FaultOp, InMemoryHost};
    use crate::observability::RelayEvent;

    fn config() -> RelayConfig {
        RelayConfig::default()
    }

    fn orchestrator(host: Arc<InMemoryHost>, config: &RelayConfig) -> PromotionOrchestrator {
        PromotionOrchestrator::new(host, config)
    }

    fn created(name: &str, repo: &str) -> Environment {
        let mut env = Environment::new(name).with_repo(repo);
        env.status = EnvironmentStatus::Created;
        env
    }

    #[tokio::test]
    async fn test_ensure_repository_creates_missing() {
        let host = Arc::new(InMemoryHost::new("acme"));
        let orchestrator = orchestrator(host.clone(), &config());
        let mut env = Environment::new("Dev").with_repo("acme/config-dev-repo");

        let url = orchestrator.ensure_repository(&mut env).await.unwrap();
        assert_eq!(env.status, EnvironmentStatus::Created);
        assert_eq!(env.repo_url.as_deref(), Some(url.as_str()));
        assert!(host.has_repository("acme", "config-dev-repo"));
    }

    #[tokio::test]
    async fn test_ensure_repository_twice_same_url() {
        let host = Arc::new(InMemoryHost::new("acme").with_repository("acme", "dev"));
        let orchestrator = orchestrator(host, &config());
        let mut env = Environment::new("Dev").with_repo("acme/dev");

        let first = orchestrator.ensure_repository(&mut env).await.unwrap();
        let second = orchestrator.ensure_repository(&mut env).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(env.status, EnvironmentStatus::Created);
    }

    #[tokio::test]
    async fn test_ensure_repository_creates_under_org() {
        let mut mock = MockRepositoryHost::new();
        mock.expect_repository_exists().returning(|_, _| Ok(false));
        mock.expect_create_repository()
            .withf(|request: &CreateRepository| {
                request.owner.as_deref() == Some("acme") && request.auto_init && request.private
            })
            .times(1)
            .returning(|request| {
                Ok(Repository {
                    name: request.name.clone(),
                    full_name: None,
                    url: "https://api.example.com/repos/acme/qa".to_string(),
                    html_url: "https://example.com/acme/qa".to_string(),
                })
            });

        let mut config = config();
        config.host.owner_is_org = true;
        config.host.private = true;
        let orchestrator = PromotionOrchestrator::new(Arc::new(mock), &config);
        let mut env = Environment::new("QA").with_repo("acme/qa");

        let url = orchestrator.ensure_repository(&mut env).await.unwrap();
        assert_eq!(url, "https://example.com/acme/qa");
    }

    #[tokio::test]
    async fn test_ensure_repository_records_auth_failure() {
        let host = Arc::new(InMemoryHost::new("acme"));
        host.fail_always(FaultOp::Exists, "acme/dev", HostError::AuthRejected);
        let orchestrator = orchestrator(host, &config());
        let mut env = Environment::new("Dev").with_repo("acme/dev");

        let err = orchestrator.ensure_repository(&mut env).await.unwrap_err();
        assert_eq!(err, PromotionError::Host(HostError::AuthRejected));
        assert_eq!(env.status, EnvironmentStatus::Error);
        assert!(env.error_message.unwrap().contains("invalid or expired"));
    }

    #[tokio::test]
    async fn test_ensure_repository_without_repo_is_validation_error() {
        let orchestrator = orchestrator(Arc::new(InMemoryHost::new("acme")), &config());
        let mut env = Environment::new("QA").with_repo("broken");
        let err = orchestrator.ensure_repository(&mut env).await.unwrap_err();
        assert!(matches!(err, PromotionError::Validation(_)));
        assert_eq!(env.status, EnvironmentStatus::Error);
    }

    #[tokio::test]
    async fn test_ingest_requires_created() {
        let host = Arc::new(InMemoryHost::new("acme").with_repository("acme", "dev"));
        let orchestrator = orchestrator(host.clone(), &config());
        let mut env = Environment::new("Dev").with_repo("acme/dev");

        let outcome = orchestrator
            .ingest_artifacts(&mut env, vec![FileArtifact::new("a.xml", "<a/>")])
            .await
            .unwrap();
        assert!(matches!(outcome, StepOutcome::Skipped(_)));
        assert_eq!(env.status, EnvironmentStatus::Pending);
        assert_eq!(host.total_attempts(FaultOp::Put), 0);
    }

    #[tokio::test]
    async fn test_ingest_commits_under_initial_folder() {
        let host = Arc::new(InMemoryHost::new("acme").with_repository("acme", "dev"));
        let orchestrator = orchestrator(host.clone(), &config());
        let mut env = created("Dev", "acme/dev");

        orchestrator
            .ingest_artifacts(
                &mut env,
                vec![
                    FileArtifact::new("a.xml", "<a/>"),
                    FileArtifact::new("b.xml", "<b/>"),
                ],
            )
            .await
            .unwrap();

        assert_eq!(env.status, EnvironmentStatus::XmlsAdded);
        assert_eq!(env.artifact_count, 2);
        assert_eq!(host.file("acme", "dev", "V1/b.xml").unwrap(), b"<b/>");
    }

    #[tokio::test]
    async fn test_ingest_direct_variant_completes() {
        let host = Arc::new(InMemoryHost::new("acme").with_repository("acme", "dev"));
        let mut config = config();
        config.workflow.variant = WorkflowVariant::Direct;
        let orchestrator = orchestrator(host, &config);
        let mut env = created("Dev", "acme/dev");

        orchestrator
            .ingest_artifacts(&mut env, vec![FileArtifact::new("a.xml", "<a/>")])
            .await
            .unwrap();
        assert_eq!(env.status, EnvironmentStatus::Completed);
    }

    #[tokio::test]
    async fn test_ingest_empty_list_is_error() {
        let host = Arc::new(InMemoryHost::new("acme").with_repository("acme", "dev"));
        let orchestrator = orchestrator(host, &config());
        let mut env = created("Dev", "acme/dev");

        assert!(orchestrator.ingest_artifacts(&mut env, Vec::new()).await.is_err());
        assert_eq!(env.status, EnvironmentStatus::Error);
    }

    #[tokio::test]
    async fn test_ingest_all_failed_is_error() {
        let host = Arc::new(InMemoryHost::new("acme").with_repository("acme", "dev"));
        host.fail_always(FaultOp::Put, "V1/", HostError::AuthRejected);
        let orchestrator = orchestrator(host, &config());
        let mut env = created("Dev", "acme/dev");

        let err = orchestrator
            .ingest_artifacts(&mut env, vec![FileArtifact::new("a.xml", "<a/>")])
            .await
            .unwrap_err();
        assert!(matches!(err, PromotionError::AggregateFailure { failed: 1, total: 1, .. }));
        assert_eq!(env.status, EnvironmentStatus::Error);
    }

    #[tokio::test]
    async fn test_ingest_partial_success_counts_committed() {
        let host = Arc::new(InMemoryHost::new("acme").with_repository("acme", "dev"));
        host.fail_always(FaultOp::Put, "b.xml", HostError::AuthRejected);
        let orchestrator = orchestrator(host, &config());
        let mut env = created("Dev", "acme/dev");

        orchestrator
            .ingest_artifacts(
                &mut env,
                vec![
                    FileArtifact::new("a.xml", "<a/>"),
                    FileArtifact::new("b.xml", "<b/>"),
                ],
            )
            .await
            .unwrap();
        assert_eq!(env.status, EnvironmentStatus::XmlsAdded);
        assert_eq!(env.artifact_count, 1);
    }

    #[tokio::test]
    async fn test_recover_ingested_from_earlier_run() {
        let host = Arc::new(
            InMemoryHost::new("acme")
                .with_repository("acme", "dev")
                .with_file("acme", "dev", "V1/a.xml", "<a/>")
                .with_file("acme", "dev", "V1/b.xml", "<b/>"),
        );
        let orchestrator = orchestrator(host, &config());
        let mut env = created("Dev", "acme/dev");

        let outcome = orchestrator.recover_ingested(&mut env).await.unwrap();
        assert!(matches!(outcome, StepOutcome::Done(_)));
        assert_eq!(env.status, EnvironmentStatus::XmlsAdded);
        assert_eq!(env.artifact_count, 2);

        orchestrator.cut_version(&mut env, "v1.0.0", "m").await.unwrap();
        assert_eq!(env.status, EnvironmentStatus::V1Created);
    }

    #[tokio::test]
    async fn test_recover_ingested_without_folder_skips() {
        let host = Arc::new(InMemoryHost::new("acme").with_repository("acme", "dev"));
        let orchestrator = orchestrator(host, &config());
        let mut env = created("Dev", "acme/dev");

        let outcome = orchestrator.recover_ingested(&mut env).await.unwrap();
        assert!(matches!(outcome, StepOutcome::Skipped(_)));
        assert_eq!(env.status, EnvironmentStatus::Created);
    }

    #[tokio::test]
    async fn test_cut_version_tags_head() {
        let host = Arc::new(
            InMemoryHost::new("acme")
                .with_repository("acme", "dev")
                .with_file("acme", "dev", "V1/a.xml", "<a/>"),
        );
        let orchestrator = orchestrator(host.clone(), &config());
        let mut env = created("Dev", "acme/dev");
        env.status = EnvironmentStatus::XmlsAdded;

        let outcome = orchestrator.cut_version(&mut env, "v1.0.0", "Initial").await.unwrap();
        assert!(matches!(outcome, StepOutcome::Done(ref d) if d.starts_with("refs/tags/v1.0.0")));
        assert_eq!(env.status, EnvironmentStatus::V1Created);
        assert_eq!(env.version.as_deref(), Some("v1.0.0"));
        assert!(host.reference("acme", "dev", "refs/tags/v1.0.0").is_some());
    }

    #[tokio::test]
    async fn test_cut_version_release_strategy() {
        let host = Arc::new(InMemoryHost::new("acme").with_repository("acme", "dev"));
        let mut config = config();
        config.workflow.tag_strategy = TagStrategy::Release;
        let orchestrator = orchestrator(host.clone(), &config);
        let mut env = created("Dev", "acme/dev");
        env.status = EnvironmentStatus::XmlsAdded;

        orchestrator.cut_version(&mut env, "v2.0.0", "Second").await.unwrap();
        assert_eq!(host.releases("acme", "dev")[0].tag_name, "v2.0.0");
    }

    #[tokio::test]
    async fn test_cut_version_empty_repository() {
        let host = Arc::new(InMemoryHost::new("acme").with_empty_repository("acme", "dev"));
        let orchestrator = orchestrator(host, &config());
        let mut env = created("Dev", "acme/dev");
        env.status = EnvironmentStatus::XmlsAdded;

        let err = orchestrator.cut_version(&mut env, "v1.0.0", "m").await.unwrap_err();
        assert!(err.to_string().contains("No commits found"));
        assert_eq!(env.status, EnvironmentStatus::Error);
        assert!(env.error_message.unwrap().contains("No commits found"));
    }

    #[tokio::test]
    async fn test_cut_version_before_ingestion_skipped() {
        let orchestrator = orchestrator(Arc::new(InMemoryHost::new("acme")), &config());
        let mut env = created("Dev", "acme/dev");
        let outcome = orchestrator.cut_version(&mut env, "v1.0.0", "m").await.unwrap();
        assert!(matches!(outcome, StepOutcome::Skipped(_)));
        assert_eq!(env.status, EnvironmentStatus::Created);
    }

    #[tokio::test]
    async fn test_cut_version_uses_commit_list() {
        let mut mock = MockRepositoryHost::new();
        mock.expect_list_commits().returning(|_, _| {
            Ok(vec![
                Commit { sha: "newest".into() },
                Commit { sha: "older".into() },
            ])
        });
        mock.expect_create_tag_object()
            .withf(|_, _, tag, _, object| tag == "v1.0.0" && object == "newest")
            .times(1)
            .returning(|_, _, tag, _, _| {
                Ok(crate::infrastructure::host::TagObject {
                    sha: "tagsha".into(),
                    tag: tag.to_string(),
                })
            });
        mock.expect_create_ref()
            .withf(|_, _, ref_name, sha| ref_name == "refs/tags/v1.0.0" && sha == "tagsha")
            .times(1)
            .returning(|_, _, ref_name, _| {
                Ok(crate::infrastructure::host::RefResult {
                    ref_name: ref_name.to_string(),
                    url: None,
                })
            });

        let orchestrator = PromotionOrchestrator::new(Arc::new(mock), &config());
        let mut env = created("Dev", "acme/dev");
        env.status = EnvironmentStatus::XmlsAdded;
        orchestrator.cut_version(&mut env, "v1.0.0", "m").await.unwrap();
    }

    #[tokio::test]
    async fn test_promote_copies_folder() {
        let host = Arc::new(
            InMemoryHost::new("acme")
                .with_repository("acme", "dev")
                .with_repository("acme", "qa")
                .with_file("acme", "dev", "V2/a.xml", "<a/>")
                .with_file("acme", "dev", "V2/b.xml", "<b/>"),
        );
        let (events, captured) = EventRecorder::capturing();
        let orchestrator = orchestrator(host.clone(), &config()).with_events(events);
        let source = Environment::new("Dev").with_repo("acme/dev");
        let mut target = created("QA", "acme/qa");

        let result = orchestrator.promote(&mut target, Some(&source), "V2").await;
        assert!(result.success, "{}", result.message);
        assert_eq!(result.source_repo.as_deref(), Some("acme/dev"));
        assert_eq!(result.folder_name, "V2");
        assert_eq!(target.status, EnvironmentStatus::Completed);
        assert_eq!(target.selected_folder.as_deref(), Some("V2"));
        assert_eq!(target.source_environment_name.as_deref(), Some("Dev"));
        assert_eq!(host.file("acme", "qa", "V2/b.xml").unwrap(), b"<b/>");

        let captured = captured.lock().unwrap();
        assert!(captured
            .iter()
            .any(|e| matches!(e, RelayEvent::PromotionFinished(p) if p.success)));
    }

    #[tokio::test]
    async fn test_promote_empty_folder_names_folder() {
        let host = Arc::new(
            InMemoryHost::new("acme")
                .with_repository("acme", "dev")
                .with_repository("acme", "qa"),
        );
        let orchestrator = orchestrator(host, &config());
        let source = Environment::new("Dev").with_repo("acme/dev");
        let mut target = created("QA", "acme/qa");

        let result = orchestrator.promote(&mut target, Some(&source), "V7").await;
        assert!(!result.success);
        assert!(result.message.contains("V7"));
        assert_eq!(target.status, EnvironmentStatus::Error);
    }

    #[tokio::test]
    async fn test_promote_empty_folder_placeholder_policy() {
        let host = Arc::new(
            InMemoryHost::new("acme")
                .with_repository("acme", "dev")
                .with_repository("acme", "qa"),
        );
        let mut config = config();
        config.workflow.empty_folder_policy = EmptyFolderPolicy::Placeholder;
        let orchestrator = orchestrator(host.clone(), &config);
        let source = Environment::new("Dev").with_repo("acme/dev");
        let mut target = created("QA", "acme/qa");

        let result = orchestrator.promote(&mut target, Some(&source), "V7").await;
        assert!(result.success);
        assert!(host.file("acme", "qa", "V7/.gitkeep").is_some());
    }

    #[tokio::test]
    async fn test_promote_without_source_fails_fast() {
        let host = Arc::new(InMemoryHost::new("acme"));
        let orchestrator = orchestrator(host.clone(), &config());
        let mut target = created("QA", "acme/qa");

        let result = orchestrator.promote(&mut target, None, "V1").await;
        assert!(!result.success);
        assert!(result.message.contains("No source environment found for QA"));
        assert_eq!(target.status, EnvironmentStatus::Created);
        assert_eq!(host.total_attempts(FaultOp::List), 0);
    }

    #[tokio::test]
    async fn test_promote_blank_folder_is_validation_error() {
        let orchestrator = orchestrator(Arc::new(InMemoryHost::new("acme")), &config());
        let source = Environment::new("Dev").with_repo("acme/dev");
        let mut target = created("QA", "acme/qa");

        let result = orchestrator.promote(&mut target, Some(&source), "  ").await;
        assert!(!result.success);
        assert!(result.message.starts_with("Invalid input"));
        assert_eq!(target.status, EnvironmentStatus::Created);
    }

    #[tokio::test(start_paused = true)]
    async fn test_promote_partial_failure_names_files() {
        let host = Arc::new(
            InMemoryHost::new("acme")
                .with_repository("acme", "dev")
                .with_repository("acme", "qa")
                .with_file("acme", "dev", "V1/a.xml", "<a/>")
                .with_file("acme", "dev", "V1/b.xml", "<b/>"),
        );
        host.fail_always(FaultOp::Put, "V1/b.xml", HostError::transient("502"));
        let orchestrator = orchestrator(host.clone(), &config());
        let source = Environment::new("Dev").with_repo("acme/dev");
        let mut target = created("QA", "acme/qa");

        let result = orchestrator.promote(&mut target, Some(&source), "V1").await;
        assert!(!result.success);
        assert!(result.message.contains("1 of 2 files failed"));
        assert!(result.message.contains("V1/b.xml"));
        assert_eq!(target.status, EnvironmentStatus::Error);
        assert!(host.file("acme", "qa", "V1/a.xml").is_some());
    }

    #[tokio::test]
    async fn test_lifecycle_never_versions_before_created() {
        let host = Arc::new(InMemoryHost::new("acme"));
        let orchestrator = orchestrator(host, &config());
        let mut env = Environment::new("Dev").with_repo("acme/dev");

        let outcome = orchestrator.cut_version(&mut env, "v1.0.0", "m").await.unwrap();
        assert!(matches!(outcome, StepOutcome::Skipped(_)));
        assert_ne!(env.status, EnvironmentStatus::V1Created);

        orchestrator.ensure_repository(&mut env).await.unwrap();
        orchestrator
            .ingest_artifacts(&mut env, vec![FileArtifact::new("a.xml", "<a/>")])
            .await
            .unwrap();
        orchestrator.cut_version(&mut env, "v1.0.0", "m").await.unwrap();
        assert_eq!(env.status, EnvironmentStatus::V1Created);
    }
}
