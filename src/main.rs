use anyhow::Result;
use clap::Parser;
use tracing::warn;

use relay::cli::{AuthCommands, Cli, Commands};
use relay::commands::{self, auth, inspect, lifecycle, promote, GlobalOptions, SourceOptions};
use relay::services::cancel;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging with LOGGING env var support
    // LOGGING=debug,info,warn,error or just LOGGING=debug
    let log_level = std::env::var("LOGGING")
        .or_else(|_| std::env::var("LOG_LEVEL"))
        .unwrap_or_else(|_| {
            if cli.verbose {
                "debug".to_string()
            } else {
                "info".to_string()
            }
        });

    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_ansi(false) // Disable ANSI escape codes for cleaner output
        .with_writer(std::io::stderr) // stdout carries results and RELAY_EVENT lines
        .init();

    let options = GlobalOptions {
        config: cli.config,
        token: cli.token,
        offline: cli.offline,
        events: cli.events,
    };

    // Auth commands never touch the repository host
    if let Commands::Auth { command } = &cli.command {
        return match command {
            AuthCommands::Set { token } => auth::set(token.clone()),
            AuthCommands::Clear => auth::clear(),
            AuthCommands::Status => auth::status(options.token.as_deref()),
        };
    }

    // Ctrl-C stops new batches; files already in flight finish
    let (canceller, signal) = cancel::channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing in-flight writes");
            canceller.cancel();
        }
    });

    let mut context = commands::build_context(&options, signal)?;

    match cli.command {
        Commands::Envs => inspect::envs(&context)?,
        Commands::Resolve { environment } => inspect::resolve(&context, &environment)?,
        Commands::Folders { environment } => inspect::folders(&mut context, &environment).await?,
        Commands::Provision => lifecycle::provision(&mut context).await?,
        Commands::Ingest {
            environment,
            from_dir,
            sample,
        } => {
            lifecycle::ingest(&mut context, environment, SourceOptions { from_dir, sample }).await?
        }
        Commands::Tag {
            environment,
            tag,
            message,
        } => lifecycle::tag(&mut context, environment, tag, message).await?,
        Commands::Promote {
            environment,
            folder,
        } => promote::execute(&mut context, &environment, &folder).await?,
        Commands::PromoteAll { folder } => promote::execute_all(&mut context, &folder).await?,
        Commands::Run { from_dir, sample } => {
            lifecycle::run(&mut context, SourceOptions { from_dir, sample }).await?
        }
        Commands::Auth { .. } => {}
    }

    Ok(())
}
