//! Read-only commands: `envs`, `resolve`, `folders`

use anyhow::{bail, Result};
use colored::Colorize;

use crate::services::PromotionContext;
use crate::ui;

/// List the chain with each environment's repository
pub fn envs(context: &PromotionContext) -> Result<()> {
    ui::print_header("Environments");
    ui::print_environments(context.registry().list());

    let unconfigured = context
        .registry()
        .list()
        .iter()
        .filter(|env| !env.has_repository())
        .count();
    if unconfigured > 0 {
        println!();
        ui::print_info(&format!(
            "{} environment(s) have no repository; promotions fall back past them",
            unconfigured
        ));
    }
    Ok(())
}

/// Print the environment a promotion into `target` would read from
pub fn resolve(context: &PromotionContext, target: &str) -> Result<()> {
    if context.registry().get(target).is_none() {
        bail!("Unknown environment '{}'", target);
    }

    match context.resolve_source(target) {
        Some(source) => {
            println!(
                "{} ← {} ({})",
                target.bold(),
                source.name.bold(),
                source.repo_name.as_deref().unwrap_or("-")
            );
            Ok(())
        }
        None => bail!("No source environment found for {}", target),
    }
}

/// List the folders that could be promoted into `target`
pub async fn folders(context: &mut PromotionContext, target: &str) -> Result<()> {
    if context.registry().get(target).is_none() {
        bail!("Unknown environment '{}'", target);
    }

    context.refresh_folders().await;

    let env = context
        .registry()
        .get(target)
        .ok_or_else(|| anyhow::anyhow!("Unknown environment '{}'", target))?;
    let Some(source) = env.source_environment_name.as_deref() else {
        bail!("No source environment found for {}", target);
    };

    if env.available_folders.is_empty() {
        ui::print_warning(&format!("{} has no version folders", source));
        return Ok(());
    }

    println!("Folders in {} available for {}:", source.bold(), target.bold());
    for folder in &env.available_folders {
        println!("  {}", folder);
    }
    Ok(())
}
