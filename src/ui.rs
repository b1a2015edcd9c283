// Terminal UI utilities

use colored::{ColoredString, Colorize};

use crate::domain::{EnvOutcome, Environment, EnvironmentStatus, PromotionResult, RunReport};

pub fn print_header(title: &str) {
    println!();
    println!(
        "{}",
        "╔════════════════════════════════════════════════════════════╗".bright_blue()
    );
    println!("{}", format!("║  {:<58}║", title).bright_blue());
    println!(
        "{}",
        "╚════════════════════════════════════════════════════════════╝".bright_blue()
    );
    println!();
}

pub fn print_success(message: &str) {
    println!("{}", format!("✅ {}", message).bright_green().bold());
}

pub fn print_error(message: &str) {
    eprintln!("{}", format!("❌ {}", message).bright_red().bold());
}

pub fn print_info(message: &str) {
    println!("{}", format!("ℹ️  {}", message).bright_cyan());
}

pub fn print_warning(message: &str) {
    println!("{}", format!("⚠️  {}", message).bright_yellow());
}

fn status_label(status: EnvironmentStatus) -> ColoredString {
    let label = format!("{:<10}", status.name());
    match status {
        EnvironmentStatus::Pending => label.dimmed(),
        EnvironmentStatus::Created | EnvironmentStatus::Promoting => label.bright_cyan(),
        EnvironmentStatus::XmlsAdded => label.bright_blue(),
        EnvironmentStatus::V1Created | EnvironmentStatus::Completed => label.bright_green(),
        EnvironmentStatus::Error => label.bright_red(),
    }
}

/// One line per environment: name, status, repository and progress
pub fn print_environments(environments: &[Environment]) {
    for env in environments {
        let repo = env.repo_name.as_deref().unwrap_or("-");
        let mut line = format!(
            "  {:<8} {} {:<32}",
            env.name.bold(),
            status_label(env.status),
            repo
        );
        if env.artifact_count > 0 {
            line.push_str(&format!(" {} files", env.artifact_count));
        }
        if let Some(version) = &env.version {
            line.push_str(&format!(" @ {}", version));
        }
        println!("{}", line);

        if let Some(url) = &env.repo_url {
            println!("           {}", url.dimmed());
        }
        if let Some(error) = &env.error_message {
            println!("           {}", error.bright_red());
        }
    }
}

/// Per-environment outcomes followed by a summary line
pub fn print_report(report: &RunReport) {
    for outcome in &report.outcomes {
        match outcome {
            EnvOutcome::Succeeded { environment, detail } => {
                println!("  {} {:<8} {}", "✓".bright_green(), environment, detail)
            }
            EnvOutcome::Failed { environment, error } => {
                println!("  {} {:<8} {}", "✗".bright_red(), environment, error.bright_red())
            }
            EnvOutcome::Skipped { environment, reason } => {
                println!("  {} {:<8} {}", "-".dimmed(), environment, reason.dimmed())
            }
        }
    }

    println!();
    let skipped = report.outcomes.len() - report.succeeded() - report.failed();
    let summary = format!(
        "{}: {} succeeded, {} failed, {} skipped",
        report.operation,
        report.succeeded(),
        report.failed(),
        skipped
    );
    if report.failed() > 0 {
        print_error(&summary);
    } else {
        print_success(&summary);
    }
}

pub fn print_promotion(result: &PromotionResult) {
    if let (Some(source), Some(target)) = (&result.source_repo, &result.target_repo) {
        print_info(&format!("{} → {} ({})", source, target, result.folder_name));
    }
    if result.success {
        print_success(&result.message);
    } else {
        print_error(&result.message);
    }
}
