//! Artifact sources for ingestion
//!
//! An environment's artifacts come from its `api_url`, a local directory,
//! or generated sample documents. Everything returned is normalized (see
//! `FileArtifact::normalized`).

use reqwest::Client;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::domain::artifact::{generated_filename, sample_artifacts, ArtifactFormat, FileArtifact};
use crate::domain::Environment;
use crate::error::{HostError, PromotionError};

/// Fields tried, in order, for the content of an API item
const CONTENT_FIELDS: &[&str] = &["xml", "xmlContent", "content"];
/// Fields tried, in order, for the filename of an API item
const NAME_FIELDS: &[&str] = &["name", "filename"];

/// Number of sample documents generated when nothing else is configured
pub const DEFAULT_SAMPLE_COUNT: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactSource {
    /// JSON endpoint returning one item or an array of items
    Api { url: String },
    /// Files under a local directory, recursively
    Directory { path: PathBuf },
    /// Generated sample documents
    Sample { count: usize },
}

impl ArtifactSource {
    /// Default source for an environment: its API when configured,
    /// otherwise samples
    pub fn for_environment(env: &Environment, sample_count: usize) -> Self {
        match env.api_url.as_deref() {
            Some(url) => Self::Api {
                url: url.to_string(),
            },
            None => Self::Sample {
                count: sample_count,
            },
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Api { url } => url.clone(),
            Self::Directory { path } => path.display().to_string(),
            Self::Sample { count } => format!("{} sample documents", count),
        }
    }

    /// Produce the artifacts for `environment`
    pub async fn fetch(
        &self,
        client: &Client,
        environment: &str,
    ) -> Result<Vec<FileArtifact>, PromotionError> {
        let artifacts = match self {
            Self::Api { url } => fetch_api(client, url).await?,
            Self::Directory { path } => read_directory(path)?,
            Self::Sample { count } => sample_artifacts(environment, *count),
        };

        info!(
            environment,
            source = %self.describe(),
            count = artifacts.len(),
            "Fetched artifacts"
        );
        Ok(artifacts)
    }
}

async fn fetch_api(client: &Client, url: &str) -> Result<Vec<FileArtifact>, PromotionError> {
    debug!(url, "Fetching artifacts");

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| HostError::transient(format!("failed to fetch {}: {}", url, e)))?;

    let status = response.status();
    if !status.is_success() {
        return Err(PromotionError::Source(format!(
            "Failed to fetch artifacts from {}: HTTP {}",
            url, status
        )));
    }

    let payload: Value = response
        .json()
        .await
        .map_err(|e| PromotionError::Source(format!("Invalid JSON from {}: {}", url, e)))?;

    normalize_payload(payload)
}

/// Turn an API payload into artifacts.
///
/// Accepted item shapes:
/// - a string of raw XML (name generated)
/// - `{filename, content}`
/// - `{name|filename, xml|xmlContent|content}`
pub fn normalize_payload(payload: Value) -> Result<Vec<FileArtifact>, PromotionError> {
    let items = match payload {
        Value::Array(items) => items,
        item @ (Value::Object(_) | Value::String(_)) => vec![item],
        _ => {
            return Err(PromotionError::Source(
                "Invalid API response format".to_string(),
            ))
        }
    };

    let mut artifacts = items
        .into_iter()
        .enumerate()
        .map(|(index, item)| normalize_item(index, item))
        .collect::<Result<Vec<_>, _>>()?;

    dedupe_filenames(&mut artifacts);
    Ok(artifacts)
}

fn normalize_item(index: usize, item: Value) -> Result<FileArtifact, PromotionError> {
    match item {
        Value::String(content) => Ok(FileArtifact::normalized(generated_filename(), content)),
        Value::Object(fields) => {
            let text = |keys: &[&str]| {
                keys.iter()
                    .filter_map(|k| fields.get(*k).and_then(Value::as_str))
                    .find(|v| !v.trim().is_empty())
                    .map(str::to_string)
            };

            let content = text(CONTENT_FIELDS).ok_or_else(|| {
                PromotionError::Source(format!(
                    "No XML content found in API response item {}",
                    index
                ))
            })?;
            let filename = text(NAME_FIELDS).unwrap_or_else(generated_filename);

            Ok(FileArtifact::normalized(filename, content))
        }
        other => Err(PromotionError::Source(format!(
            "Unsupported API response item {}: {}",
            index, other
        ))),
    }
}

/// Generated names share a millisecond timestamp; suffix repeats
fn dedupe_filenames(artifacts: &mut [FileArtifact]) {
    let mut seen: HashMap<String, usize> = HashMap::new();

    for artifact in artifacts.iter_mut() {
        let count = seen.entry(artifact.filename.clone()).or_insert(0);
        *count += 1;
        if *count > 1 {
            let renamed = match artifact.filename.rsplit_once('.') {
                Some((stem, ext)) => format!("{}-{}.{}", stem, count, ext),
                None => format!("{}-{}", artifact.filename, count),
            };
            artifact.filename = renamed;
        }
    }
}

/// Recognized files under `root`, sorted by path. Hidden entries are skipped.
pub fn read_directory(root: &Path) -> Result<Vec<FileArtifact>, PromotionError> {
    if !root.is_dir() {
        return Err(PromotionError::Source(format!(
            "{} is not a directory",
            root.display()
        )));
    }

    let mut artifacts = Vec::new();
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));

    for entry in walker {
        let entry = entry.map_err(|e| PromotionError::Source(e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| PromotionError::Source(e.to_string()))?
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");

        if ArtifactFormat::from_filename(&relative).is_none() {
            debug!(file = %relative, "Skipping unrecognized file");
            continue;
        }

        let content = std::fs::read(entry.path()).map_err(|e| {
            PromotionError::Source(format!("Failed to read {}: {}", entry.path().display(), e))
        })?;
        artifacts.push(FileArtifact::normalized(relative, content));
    }

    Ok(artifacts)
}
