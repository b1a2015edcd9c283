//! CLI definitions for relay
//!
//! This module contains all CLI argument parsing structures using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "relay",
    version,
    about = "Promotes configuration artifacts through a chain of environments",
    long_about = "Provisions one repository per environment, ingests configuration artifacts,\ncuts version tags and promotes version folders from Dev through QA and Stage to Prod."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to relay.yaml (defaults to ./relay.yaml when present)
    #[arg(long, global = true, env = "RELAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Repository host token (falls back to the stored token)
    #[arg(long, global = true, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Use an in-memory repository host instead of the network
    #[arg(long, global = true)]
    pub offline: bool,

    /// Emit RELAY_EVENT JSON lines on stdout
    #[arg(long, global = true)]
    pub events: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List configured environments in chain order
    Envs,

    /// Show which environment a promotion into ENV reads from
    Resolve {
        /// Target environment
        environment: String,
    },

    /// List version folders available for promotion into ENV
    Folders {
        /// Target environment
        environment: String,
    },

    /// Create every configured repository that does not exist yet
    Provision,

    /// Commit artifacts under the initial version folder
    Ingest {
        /// Only ingest into this environment
        #[arg(long = "env")]
        environment: Option<String>,

        /// Read artifacts from a local directory instead of the configured API
        #[arg(long, conflicts_with = "sample")]
        from_dir: Option<PathBuf>,

        /// Generate N sample documents instead of calling the configured API
        #[arg(long, value_name = "N")]
        sample: Option<usize>,
    },

    /// Tag the latest commit of every ingested environment
    Tag {
        /// Only tag this environment
        #[arg(long = "env")]
        environment: Option<String>,

        /// Tag name (defaults to workflow.tag_name)
        #[arg(long)]
        tag: Option<String>,

        /// Tag message (defaults to workflow.tag_message)
        #[arg(long)]
        message: Option<String>,
    },

    /// Copy a version folder into ENV from its source environment
    Promote {
        /// Target environment
        environment: String,

        /// Version folder, e.g. V2
        folder: String,
    },

    /// Promote a version folder into every environment after the first
    PromoteAll {
        /// Version folder, e.g. V2
        folder: String,
    },

    /// Provision, ingest and tag every environment
    Run {
        /// Read artifacts from a local directory instead of the configured API
        #[arg(long, conflicts_with = "sample")]
        from_dir: Option<PathBuf>,

        /// Generate N sample documents instead of calling the configured API
        #[arg(long, value_name = "N")]
        sample: Option<usize>,
    },

    /// Manage the stored repository host token
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
}

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Store a token
    Set {
        /// Token value (read from stdin when omitted)
        token: Option<String>,
    },

    /// Remove the stored token
    Clear,

    /// Show where the token comes from
    Status,
}
