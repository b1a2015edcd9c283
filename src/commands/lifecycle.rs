//! Lifecycle commands: `provision`, `ingest`, `tag`, `run`
//!
//! Each runs across every environment concurrently and prints one line per
//! environment. The command fails when any environment failed.

use anyhow::{bail, Result};

use crate::domain::RunReport;
use crate::services::PromotionContext;
use crate::ui;

use super::SourceOptions;

/// Print a report with the resulting environment table; error when anything failed
pub(super) fn print_and_check(context: &PromotionContext, report: RunReport) -> Result<()> {
    ui::print_report(&report);
    println!();
    ui::print_environments(context.registry().list());

    if report.failed() > 0 {
        bail!(
            "{} failed for {} of {} environments",
            report.operation,
            report.failed(),
            report.outcomes.len()
        );
    }
    Ok(())
}

fn require_known(context: &PromotionContext, environment: Option<&str>) -> Result<()> {
    if let Some(name) = environment {
        if context.registry().get(name).is_none() {
            bail!("Unknown environment '{}'", name);
        }
    }
    Ok(())
}

pub async fn provision(context: &mut PromotionContext) -> Result<()> {
    ui::print_header("Provisioning repositories");
    let report = context.provision_all().await;
    print_and_check(context, report)
}

/// Ensures repositories first, so ingestion always starts from `created`
pub async fn ingest(
    context: &mut PromotionContext,
    environment: Option<String>,
    sources: SourceOptions,
) -> Result<()> {
    require_known(context, environment.as_deref())?;
    ui::print_header("Ingesting artifacts");

    let provisioned = context.provision_all().await;
    if provisioned.failed() > 0 {
        ui::print_report(&provisioned);
    }

    let report = context
        .ingest_all(environment.as_deref(), |env| sources.source_for(env))
        .await;
    print_and_check(context, report)
}

/// Versions whatever an earlier `ingest` left in the initial folder
pub async fn tag(
    context: &mut PromotionContext,
    environment: Option<String>,
    tag: Option<String>,
    message: Option<String>,
) -> Result<()> {
    require_known(context, environment.as_deref())?;
    let workflow = context.orchestrator().workflow();
    let tag = tag.unwrap_or_else(|| workflow.tag_name.clone());
    let message = message.unwrap_or_else(|| workflow.tag_message.clone());

    ui::print_header(&format!("Tagging {}", tag));
    let provisioned = context.provision_all().await;
    if provisioned.failed() > 0 {
        ui::print_report(&provisioned);
    }
    context.recover_all(environment.as_deref()).await;

    let report = context
        .cut_version_all(environment.as_deref(), &tag, &message)
        .await;
    print_and_check(context, report)
}

pub async fn run(context: &mut PromotionContext, sources: SourceOptions) -> Result<()> {
    ui::print_header("Running environment lifecycle");
    let report = context.run_lifecycle(|env| sources.source_for(env)).await;
    print_and_check(context, report)
}
