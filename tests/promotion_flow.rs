//! End-to-end promotion runs against the in-memory host

use std::sync::Arc;

use relay::config::RelayConfig;
use relay::domain::{EnvOutcome, Environment, EnvironmentStatus};
use relay::infrastructure::host::encode_content;
use relay::infrastructure::{ArtifactSource, InMemoryHost, RepositoryHost};
use relay::observability::{EventRecorder, RelayEvent};
use relay::services::{cancel, PromotionContext, PromotionOrchestrator};

const CONFIG: &str = r#"
host:
  owner: acme
sync:
  inter_batch_delay: 0s
  retry_delay: 0s
environments:
  - name: Dev
  - name: QA
  - name: Stage
    repo: ""
  - name: Prod
    repo: prod-configs
"#;

fn context(host: Arc<InMemoryHost>, events: EventRecorder) -> PromotionContext {
    let config = RelayConfig::from_yaml(CONFIG).unwrap();
    config.validate().unwrap();
    let orchestrator = PromotionOrchestrator::new(host, &config).with_events(events);
    PromotionContext::new(config.build_registry(), orchestrator)
}

fn samples(_: &Environment) -> ArtifactSource {
    ArtifactSource::Sample { count: 7 }
}

#[tokio::test]
async fn test_full_lifecycle_then_promotion() {
    let host = Arc::new(InMemoryHost::new("acme"));
    let (events, captured) = EventRecorder::capturing();
    let mut context = context(host.clone(), events);

    let report = context.run_lifecycle(samples).await;
    assert_eq!(report.succeeded(), 3);
    assert!(matches!(report.get("Stage"), Some(EnvOutcome::Skipped { .. })));
    assert_eq!(host.files("acme", "config-dev-repo").len(), 8);
    assert_eq!(
        context.registry().get("Prod").unwrap().status,
        EnvironmentStatus::V1Created
    );

    // A new version lands in Dev and moves down the chain one hop at a time
    host.put_file(
        "acme",
        "config-dev-repo",
        "V2/app.xml",
        &encode_content("<app version=\"2\"/>".as_bytes()),
        "Add V2",
        "main",
    )
    .await
    .unwrap();

    let qa = context.promote("QA", "V2").await.unwrap();
    assert!(qa.success, "{}", qa.message);

    // Stage has no repository, so Prod reads from QA
    assert_eq!(context.resolve_source("Prod").unwrap().name, "QA");
    let prod = context.promote("Prod", "V2").await.unwrap();
    assert!(prod.success, "{}", prod.message);
    assert_eq!(prod.source_repo.as_deref(), Some("acme/config-qa-repo"));
    assert_eq!(
        host.file("acme", "prod-configs", "V2/app.xml").unwrap(),
        b"<app version=\"2\"/>"
    );

    context.refresh_folders().await;
    let prod = context.registry().get("Prod").unwrap();
    assert_eq!(prod.available_folders, vec!["V2", "V1"]);
    assert_eq!(prod.status, EnvironmentStatus::Completed);

    let captured = captured.lock().unwrap();
    assert!(captured
        .iter()
        .any(|e| matches!(e, RelayEvent::RunFinished(f) if f.operation == "run" && f.succeeded == 3)));
}

#[tokio::test]
async fn test_first_environment_cannot_be_promoted_into() {
    let host = Arc::new(InMemoryHost::new("acme"));
    let mut context = context(host, EventRecorder::disabled());

    assert!(context.resolve_source("Dev").is_none());
    let result = context.promote("Dev", "V1").await.unwrap();
    assert!(!result.success);
    assert_eq!(result.message, "No source environment found for Dev");
    assert_eq!(
        context.registry().get("Dev").unwrap().status,
        EnvironmentStatus::Pending
    );
}

#[tokio::test]
async fn test_cancelled_run_commits_nothing() {
    let host = Arc::new(InMemoryHost::new("acme"));
    let config = RelayConfig::from_yaml(CONFIG).unwrap();
    let (canceller, signal) = cancel::channel();
    let orchestrator = PromotionOrchestrator::new(host.clone(), &config).with_cancel(signal);
    let mut context = PromotionContext::new(config.build_registry(), orchestrator);

    canceller.cancel();
    let report = context.run_lifecycle(samples).await;

    assert_eq!(report.failed(), 0);
    assert_eq!(report.succeeded(), 0);
    // Repositories are still provisioned; only artifact writes stop
    assert!(host.has_repository("acme", "config-qa-repo"));
    assert_eq!(host.files("acme", "config-qa-repo"), vec!["README.md".to_string()]);
}
