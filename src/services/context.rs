//! Promotion context - fans lifecycle operations out over the registry
//!
//! Owns the environment registry for one run together with the
//! orchestrator. Operations run concurrently across environments over
//! disjoint `&mut Environment` borrows, except `promote_all`, which follows
//! chain order. Every environment's result is folded into a `RunReport`
//! and one failure never aborts the others.

use futures::future::join_all;
use reqwest::Client;
use tracing::info;

use crate::domain::{
    EnvOutcome, Environment, EnvironmentRegistry, EnvironmentStatus, PromotionResult, RunReport,
    SourceResolver,
};
use crate::error::PromotionError;
use crate::infrastructure::ArtifactSource;
use crate::services::orchestrator::{PromotionOrchestrator, StepOutcome};

pub struct PromotionContext {
    registry: EnvironmentRegistry,
    orchestrator: PromotionOrchestrator,
    http: Client,
}

fn outcome(environment: &str, result: Result<StepOutcome, PromotionError>) -> EnvOutcome {
    let environment = environment.to_string();
    match result {
        Ok(StepOutcome::Done(detail)) => EnvOutcome::Succeeded { environment, detail },
        Ok(StepOutcome::Skipped(reason)) => EnvOutcome::Skipped { environment, reason },
        Err(e) => EnvOutcome::Failed {
            environment,
            error: e.to_string(),
        },
    }
}

fn skipped(env: &Environment, reason: impl Into<String>) -> EnvOutcome {
    EnvOutcome::Skipped {
        environment: env.name.clone(),
        reason: reason.into(),
    }
}

impl PromotionContext {
    pub fn new(registry: EnvironmentRegistry, orchestrator: PromotionOrchestrator) -> Self {
        Self {
            registry,
            orchestrator,
            http: Client::new(),
        }
    }

    /// Use a specific client for artifact API requests
    pub fn with_http_client(mut self, http: Client) -> Self {
        self.http = http;
        self
    }

    pub fn registry(&self) -> &EnvironmentRegistry {
        &self.registry
    }

    pub fn orchestrator(&self) -> &PromotionOrchestrator {
        &self.orchestrator
    }

    /// Nearest configured predecessor of `target`
    pub fn resolve_source(&self, target: &str) -> Option<&Environment> {
        SourceResolver::new(&self.registry).resolve(target)
    }

    /// Source snapshot for every environment, in chain order
    fn source_snapshots(&self) -> Vec<Option<Environment>> {
        let resolver = SourceResolver::new(&self.registry);
        self.registry
            .list()
            .iter()
            .map(|env| resolver.resolve(&env.name).cloned())
            .collect()
    }

    fn names(&self) -> Vec<String> {
        self.registry.list().iter().map(|e| e.name.clone()).collect()
    }

    fn finish(&self, report: RunReport) -> RunReport {
        info!(
            operation = %report.operation,
            succeeded = report.succeeded(),
            failed = report.failed(),
            "Run finished"
        );
        self.orchestrator.events().run_finished(&report);
        report
    }

    /// Populate `available_folders` and `source_environment_name` for every
    /// environment from its resolved source
    pub async fn refresh_folders(&mut self) {
        let sources = self.source_snapshots();
        let orchestrator = &self.orchestrator;

        join_all(
            self.registry
                .iter_mut()
                .zip(sources.iter())
                .map(|(env, source)| orchestrator.refresh_folders(env, source.as_ref())),
        )
        .await;
    }

    /// Ensure every configured repository exists
    pub async fn provision_all(&mut self) -> RunReport {
        self.orchestrator.events().run_started("provision", self.names());
        let orchestrator = &self.orchestrator;

        let outcomes = join_all(self.registry.iter_mut().map(|env| async move {
            if !env.has_repository() {
                return skipped(env, "no repository configured");
            }
            let result = orchestrator
                .ensure_repository(env)
                .await
                .map(StepOutcome::Done);
            outcome(&env.name, result)
        }))
        .await;

        self.finish(RunReport::new("provision", outcomes))
    }

    /// Fetch and commit artifacts for every `created` environment.
    ///
    /// `only` restricts the run to one environment; `source_for` picks where
    /// each environment's artifacts come from.
    pub async fn ingest_all<F>(&mut self, only: Option<&str>, source_for: F) -> RunReport
    where
        F: Fn(&Environment) -> ArtifactSource,
    {
        self.orchestrator.events().run_started("ingest", self.names());
        let orchestrator = &self.orchestrator;
        let http = &self.http;
        let source_for = &source_for;

        let outcomes = join_all(self.registry.iter_mut().map(|env| async move {
            if only.is_some_and(|name| name != env.name) {
                return skipped(env, "not selected");
            }
            let source = source_for(env);
            let result = ingest_one(orchestrator, http, env, source).await;
            outcome(&env.name, result)
        }))
        .await;

        self.finish(RunReport::new("ingest", outcomes))
    }

    /// Treat artifacts already in each `created` repository as ingested
    pub async fn recover_all(&mut self, only: Option<&str>) -> RunReport {
        let orchestrator = &self.orchestrator;

        let outcomes = join_all(self.registry.iter_mut().map(|env| async move {
            if only.is_some_and(|name| name != env.name) {
                return skipped(env, "not selected");
            }
            let result = orchestrator.recover_ingested(env).await;
            outcome(&env.name, result)
        }))
        .await;

        RunReport::new("recover", outcomes)
    }

    /// Cut `tag` on every ingested environment
    pub async fn cut_version_all(
        &mut self,
        only: Option<&str>,
        tag: &str,
        message: &str,
    ) -> RunReport {
        self.orchestrator.events().run_started("tag", self.names());
        let orchestrator = &self.orchestrator;

        let outcomes = join_all(self.registry.iter_mut().map(|env| async move {
            if only.is_some_and(|name| name != env.name) {
                return skipped(env, "not selected");
            }
            let result = orchestrator.cut_version(env, tag, message).await;
            outcome(&env.name, result)
        }))
        .await;

        self.finish(RunReport::new("tag", outcomes))
    }

    /// Promote `folder` into one environment from its resolved source
    pub async fn promote(
        &mut self,
        target: &str,
        folder: &str,
    ) -> Result<PromotionResult, PromotionError> {
        let source = self.resolve_source(target).cloned();
        let env = self.registry.get_mut(target).ok_or_else(|| {
            PromotionError::Validation(format!("Unknown environment '{}'", target))
        })?;

        Ok(self.orchestrator.promote(env, source.as_ref(), folder).await)
    }

    /// Promote `folder` into every environment after the first, each from
    /// its own resolved source.
    ///
    /// Targets run one after another in chain order, so a source that is
    /// itself a target in this run is complete before anything reads it.
    /// Targets whose source failed in this run are skipped.
    pub async fn promote_all(&mut self, folder: &str) -> RunReport {
        self.orchestrator.events().run_started("promote", self.names());
        let mut outcomes = Vec::new();
        let mut failed: Vec<String> = Vec::new();

        for (position, name) in self.names().into_iter().enumerate() {
            let source = self.resolve_source(&name).cloned();
            let Some(env) = self.registry.get_mut(&name) else {
                continue;
            };

            if position == 0 {
                outcomes.push(skipped(env, "first environment has no source"));
                continue;
            }
            if !env.has_repository() {
                outcomes.push(skipped(env, "no repository configured"));
                continue;
            }
            if let Some(source) = source.as_ref().filter(|s| failed.contains(&s.name)) {
                let reason = format!("source {} failed in this run", source.name);
                outcomes.push(skipped(env, reason));
                continue;
            }

            let result = self.orchestrator.promote(env, source.as_ref(), folder).await;
            if result.success {
                outcomes.push(EnvOutcome::Succeeded {
                    environment: name,
                    detail: result.message,
                });
            } else {
                failed.push(name.clone());
                outcomes.push(EnvOutcome::Failed {
                    environment: name,
                    error: result.message,
                });
            }
        }

        self.finish(RunReport::new("promote", outcomes))
    }

    /// Full lifecycle per environment: ensure repository, ingest artifacts,
    /// cut the configured version. Environments progress independently.
    pub async fn run_lifecycle<F>(&mut self, source_for: F) -> RunReport
    where
        F: Fn(&Environment) -> ArtifactSource,
    {
        self.orchestrator.events().run_started("run", self.names());
        let orchestrator = &self.orchestrator;
        let http = &self.http;
        let source_for = &source_for;

        let outcomes = join_all(self.registry.iter_mut().map(|env| async move {
            if !env.has_repository() {
                return skipped(env, "no repository configured");
            }
            let source = source_for(env);
            let result = lifecycle_one(orchestrator, http, env, source).await;
            outcome(&env.name, result)
        }))
        .await;

        self.finish(RunReport::new("run", outcomes))
    }
}

/// Ensure, ingest and version one environment, stopping at the first
/// step that fails or does not apply
async fn lifecycle_one(
    orchestrator: &PromotionOrchestrator,
    http: &Client,
    env: &mut Environment,
    source: ArtifactSource,
) -> Result<StepOutcome, PromotionError> {
    let workflow = orchestrator.workflow();

    orchestrator.ensure_repository(env).await?;
    if let StepOutcome::Skipped(reason) = ingest_one(orchestrator, http, env, source).await? {
        return Ok(StepOutcome::Skipped(reason));
    }

    match orchestrator
        .cut_version(env, &workflow.tag_name, &workflow.tag_message)
        .await?
    {
        StepOutcome::Done(_) => Ok(StepOutcome::Done(format!(
            "{} with {} artifacts ({})",
            env.status, env.artifact_count, workflow.tag_name
        ))),
        skipped => Ok(skipped),
    }
}

/// Fetch artifacts and ingest them. Environments that are not `created`
/// are skipped before anything is fetched.
async fn ingest_one(
    orchestrator: &PromotionOrchestrator,
    http: &Client,
    env: &mut Environment,
    source: ArtifactSource,
) -> Result<StepOutcome, PromotionError> {
    if env.status != EnvironmentStatus::Created {
        return Ok(StepOutcome::Skipped(format!(
            "status is {}, ingestion needs created",
            env.status
        )));
    }

    match source.fetch(http, &env.name).await {
        Ok(artifacts) => orchestrator.ingest_artifacts(env, artifacts).await,
        Err(e) => {
            env.fail(e.to_string());
            Err(e)
        }
    }
}
