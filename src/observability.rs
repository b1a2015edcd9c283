//! # Run Observability
//!
//! Structured lifecycle events for promotion runs.
//!
//! ## Event Flow
//!
//! ```text
//! relay → JSON stdout (RELAY_EVENT: prefix) → log shipper → dashboards
//! ```
//!
//! Events are single-line JSON documents prefixed with `RELAY_EVENT:` so a
//! collector can pick them out of ordinary output. Emission is off unless
//! `--events` is passed or `RELAY_EVENTS=1` is set.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use uuid::Uuid;

use crate::domain::{EnvironmentStatus, RunReport};

/// Event prefix for collectors to identify structured events
const EVENT_PREFIX: &str = "RELAY_EVENT:";

/// Relay event types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum RelayEvent {
    /// A command started fanning out over environments
    RunStarted(RunStartedEvent),
    /// An environment moved to a new lifecycle status
    StatusChanged(StatusChangedEvent),
    /// A batch commit into one repository finished
    FilesCommitted(FilesCommittedEvent),
    /// A folder promotion reached its result
    PromotionFinished(PromotionFinishedEvent),
    /// A command finished
    RunFinished(RunFinishedEvent),
}

/// Common fields for all events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Timestamp in RFC3339 format
    pub timestamp: String,
    /// Identifies every event of one invocation
    pub run_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    /// CI job ID if running in CI
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ci_job_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStartedEvent {
    #[serde(flatten)]
    pub metadata: EventMetadata,
    pub operation: String,
    pub environments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChangedEvent {
    #[serde(flatten)]
    pub metadata: EventMetadata,
    pub environment: String,
    pub from: EnvironmentStatus,
    pub to: EnvironmentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilesCommittedEvent {
    #[serde(flatten)]
    pub metadata: EventMetadata,
    pub environment: String,
    pub repo: String,
    pub committed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionFinishedEvent {
    #[serde(flatten)]
    pub metadata: EventMetadata,
    pub environment: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub folder: String,
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunFinishedEvent {
    #[serde(flatten)]
    pub metadata: EventMetadata,
    pub operation: String,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_secs: f64,
}

/// Emit a structured event to stdout
pub fn emit_event(event: &RelayEvent) {
    match serde_json::to_string(event) {
        Ok(json) => {
            println!("{}{}", EVENT_PREFIX, json);
        }
        Err(e) => {
            tracing::error!("Failed to serialize event: {}", e);
        }
    }
}

#[derive(Clone)]
enum Sink {
    Disabled,
    Stdout,
    Capture(Arc<Mutex<Vec<RelayEvent>>>),
}

/// Event emitter for one run, shared by everything that reports on it
#[derive(Clone)]
pub struct EventRecorder {
    run_id: Uuid,
    start: Instant,
    sink: Sink,
}

impl EventRecorder {
    /// Recorder writing to stdout when `enabled`
    pub fn new(enabled: bool) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            start: Instant::now(),
            sink: if enabled { Sink::Stdout } else { Sink::Disabled },
        }
    }

    /// Recorder that emits nothing
    pub fn disabled() -> Self {
        Self::new(false)
    }

    /// Recorder keeping events in memory, returned alongside it
    pub fn capturing() -> (Self, Arc<Mutex<Vec<RelayEvent>>>) {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let recorder = Self {
            run_id: Uuid::new_v4(),
            start: Instant::now(),
            sink: Sink::Capture(buffer.clone()),
        };
        (recorder, buffer)
    }

    /// Whether `RELAY_EVENTS` asks for event output
    pub fn enabled_from_env() -> bool {
        std::env::var("RELAY_EVENTS")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false)
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    fn metadata(&self) -> EventMetadata {
        EventMetadata {
            timestamp: Utc::now().to_rfc3339(),
            run_id: self.run_id.to_string(),
            hostname: std::env::var("HOSTNAME").ok(),
            ci_job_id: std::env::var("GITHUB_RUN_ID")
                .ok()
                .or_else(|| std::env::var("CI_JOB_ID").ok()),
        }
    }

    fn record(&self, event: RelayEvent) {
        match &self.sink {
            Sink::Disabled => {}
            Sink::Stdout => emit_event(&event),
            Sink::Capture(buffer) => buffer
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .push(event),
        }
    }

    pub fn run_started(&self, operation: &str, environments: Vec<String>) {
        self.record(RelayEvent::RunStarted(RunStartedEvent {
            metadata: self.metadata(),
            operation: operation.to_string(),
            environments,
        }));
    }

    pub fn status_changed(
        &self,
        environment: &str,
        from: EnvironmentStatus,
        to: EnvironmentStatus,
        message: Option<&str>,
    ) {
        self.record(RelayEvent::StatusChanged(StatusChangedEvent {
            metadata: self.metadata(),
            environment: environment.to_string(),
            from,
            to,
            message: message.map(str::to_string),
        }));
    }

    pub fn files_committed(&self, environment: &str, repo: &str, committed: usize, failed: usize) {
        self.record(RelayEvent::FilesCommitted(FilesCommittedEvent {
            metadata: self.metadata(),
            environment: environment.to_string(),
            repo: repo.to_string(),
            committed,
            failed,
        }));
    }

    pub fn promotion_finished(
        &self,
        environment: &str,
        source: Option<&str>,
        folder: &str,
        success: bool,
        message: &str,
    ) {
        self.record(RelayEvent::PromotionFinished(PromotionFinishedEvent {
            metadata: self.metadata(),
            environment: environment.to_string(),
            source: source.map(str::to_string),
            folder: folder.to_string(),
            success,
            message: message.to_string(),
        }));
    }

    pub fn run_finished(&self, report: &RunReport) {
        let skipped = report.outcomes.len() - report.succeeded() - report.failed();
        self.record(RelayEvent::RunFinished(RunFinishedEvent {
            metadata: self.metadata(),
            operation: report.operation.clone(),
            succeeded: report.succeeded(),
            failed: report.failed(),
            skipped,
            duration_secs: self.start.elapsed().as_secs_f64(),
        }));
    }
}

impl Default for EventRecorder {
    fn default() -> Self {
        Self::disabled()
    }
}
