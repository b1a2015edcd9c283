//! Folder synchronization between repositories
//!
//! Reads folders out of a source repository and writes files into a target
//! repository in batches. Writes inside a batch run concurrently; batches
//! run one after another with a pause in between. Every input file yields
//! exactly one `CommitOutcome`, in input order, whatever happens to its
//! siblings.

use futures::future::join_all;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::RelayConfig;
use crate::domain::promotion::{CommitOutcome, CommitTally};
use crate::domain::version::order_folders;
use crate::domain::{Environment, FileArtifact, RepoRef};
use crate::error::{HostError, PromotionError};
use crate::infrastructure::host::{decode_content, encode_content, ContentEntry, RepositoryHost};
use crate::services::cancel::CancelSignal;
use crate::services::retry::RetryPolicy;

/// Error recorded for files skipped because the run was cancelled
pub const CANCELLED: &str = "cancelled";

pub struct FolderSync {
    host: Arc<dyn RepositoryHost>,
    branch: String,
    batch_size: usize,
    inter_batch_delay: Duration,
    retry: RetryPolicy,
}

impl FolderSync {
    pub fn new(host: Arc<dyn RepositoryHost>, config: &RelayConfig) -> Self {
        Self {
            host,
            branch: config.host.branch.clone(),
            batch_size: config.sync.batch_size.max(1),
            inter_batch_delay: config.sync.inter_batch_delay,
            retry: RetryPolicy::from_config(&config.sync),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn host(&self) -> &Arc<dyn RepositoryHost> {
        &self.host
    }

    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Top-level folders of an environment's repository, version folders
    /// newest first. Any failure yields an empty list.
    pub async fn list_folders(&self, env: &Environment) -> Vec<String> {
        let Some(repo) = env.repo.as_ref() else {
            return Vec::new();
        };

        match self.host.list_contents(&repo.owner, &repo.name, "").await {
            Ok(entries) => order_folders(
                entries
                    .into_iter()
                    .filter(ContentEntry::is_dir)
                    .map(|e| e.name)
                    .collect(),
            ),
            Err(e) => {
                warn!(environment = %env.name, repo = %repo, error = %e, "Could not list folders");
                Vec::new()
            }
        }
    }

    /// Entries directly under `path`
    pub async fn list_folder_contents(
        &self,
        repo: &RepoRef,
        path: &str,
    ) -> Result<Vec<ContentEntry>, HostError> {
        self.host.list_contents(&repo.owner, &repo.name, path).await
    }

    /// Bytes of a file entry: inline content when present, otherwise its
    /// download URL
    pub async fn download_file(&self, entry: &ContentEntry) -> Result<Vec<u8>, HostError> {
        if let Some(inline) = entry.content.as_deref().filter(|c| !c.trim().is_empty()) {
            return decode_content(inline);
        }

        let url = entry.download_url.as_deref().ok_or_else(|| HostError::Decode {
            message: format!("{} has neither content nor a download URL", entry.path),
        })?;

        let host = &self.host;
        self.retry
            .run(&entry.path, move || host.download(url))
            .await
    }

    /// Every file under `folder`, including nested directories, with paths
    /// relative to the repository root. A missing folder reads as empty.
    pub async fn read_folder(
        &self,
        repo: &RepoRef,
        folder: &str,
    ) -> Result<Vec<FileArtifact>, PromotionError> {
        let mut pending = vec![folder.trim_matches('/').to_string()];
        let mut files = Vec::new();

        while let Some(path) = pending.pop() {
            let entries = match self.list_folder_contents(repo, &path).await {
                Ok(entries) => entries,
                Err(HostError::NotFound { .. }) => {
                    debug!(repo = %repo, path = %path, "Folder not found");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            for entry in entries {
                if entry.is_dir() {
                    pending.push(entry.path);
                } else if entry.is_file() {
                    files.push(entry);
                }
            }
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));

        let artifacts: Vec<FileArtifact> = stream::iter(files)
            .map(|entry| async move {
                let content = self.download_file(&entry).await?;
                Ok::<_, HostError>(FileArtifact::new(entry.path, content))
            })
            .buffered(self.batch_size)
            .try_collect()
            .await?;

        Ok(artifacts)
    }

    /// Write `files` into `repo`, `batch_size` at a time.
    ///
    /// Each write is retried on transient failure and then recorded, never
    /// aborting its siblings. Cancellation is observed between batches;
    /// files not attempted are reported as failed with `"cancelled"`.
    pub async fn batch_commit(
        &self,
        repo: &RepoRef,
        files: &[FileArtifact],
        message_prefix: &str,
        cancel: &CancelSignal,
    ) -> Vec<CommitOutcome> {
        let mut outcomes = Vec::with_capacity(files.len());

        for (index, batch) in files.chunks(self.batch_size).enumerate() {
            if index > 0 {
                let mut signal = cancel.clone();
                tokio::select! {
                    _ = tokio::time::sleep(self.inter_batch_delay) => {}
                    _ = signal.cancelled() => {}
                }
            }

            if cancel.is_cancelled() {
                let done = outcomes.len();
                warn!(repo = %repo, skipped = files.len() - done, "Cancelled before all batches were written");
                outcomes.extend(files[done..].iter().map(|file| {
                    CommitOutcome::Failed {
                        filename: file.filename.clone(),
                        error: CANCELLED.to_string(),
                    }
                }));
                break;
            }

            debug!(repo = %repo, batch = index + 1, files = batch.len(), "Writing batch");
            let results = join_all(
                batch
                    .iter()
                    .map(|file| self.commit_file(repo, file, message_prefix)),
            )
            .await;
            outcomes.extend(results);
        }

        let tally = CommitTally::of(&outcomes);
        info!(
            repo = %repo,
            committed = tally.committed,
            failed = tally.failed,
            "Batch commit finished"
        );
        outcomes
    }

    async fn commit_file(&self, repo: &RepoRef, file: &FileArtifact, prefix: &str) -> CommitOutcome {
        let host = &self.host;
        let branch = self.branch.as_str();
        let path = file.filename.as_str();
        let encoded = encode_content(&file.content);
        let message = format!("{}: {}", prefix, file.filename);
        let (encoded, message) = (encoded.as_str(), message.as_str());

        let result = self
            .retry
            .run(path, move || {
                host.put_file(&repo.owner, &repo.name, path, encoded, message, branch)
            })
            .await;

        match result {
            Ok(commit) => CommitOutcome::Committed {
                filename: file.filename.clone(),
                commit_sha: commit.commit_sha,
                content_sha: commit.content_sha,
            },
            Err(e) => {
                warn!(repo = %repo, file = path, error = %e, "File write failed");
                CommitOutcome::Failed {
                    filename: file.filename.clone(),
                    error: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::host::{CommitResult, MockRepositoryHost};
    use crate::infrastructure::memory::{FaultOp, InMemoryHost};
    use crate::services::cancel;
    use std::sync::Mutex;
    use tokio::time::Instant;

    fn repo() -> RepoRef {
        RepoRef::new("acme", "qa")
    }

    fn files(count: usize) -> Vec<FileArtifact> {
        (1..=count)
            .map(|i| FileArtifact::new(format!("V1/file-{}.xml", i), format!("<n>{}</n>", i)))
            .collect()
    }

    fn sync(host: Arc<dyn RepositoryHost>) -> FolderSync {
        FolderSync::new(host, &RelayConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_seven_files_two_batches_one_delay() {
        let calls: Arc<Mutex<Vec<(String, Instant)>>> = Arc::new(Mutex::new(Vec::new()));
        let recorded = calls.clone();
        let start = Instant::now();

        let mut mock = MockRepositoryHost::new();
        mock.expect_put_file()
            .times(7)
            .returning(move |_, _, path, _, _, _| {
                recorded.lock().unwrap().push((path.to_string(), Instant::now()));
                Ok(CommitResult::default())
            });

        let outcomes = sync(Arc::new(mock))
            .batch_commit(&repo(), &files(7), "Add", &CancelSignal::never())
            .await;

        assert_eq!(outcomes.len(), 7);
        assert!(outcomes.iter().all(CommitOutcome::is_success));
        assert_eq!(start.elapsed(), Duration::from_secs(1));

        let calls = calls.lock().unwrap();
        let first_batch = calls.iter().filter(|(_, at)| *at == start).count();
        let second_batch = calls
            .iter()
            .filter(|(_, at)| at.duration_since(start) == Duration::from_secs(1))
            .count();
        assert_eq!((first_batch, second_batch), (5, 2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_batch_has_no_delay() {
        let host = Arc::new(InMemoryHost::new("acme").with_repository("acme", "qa"));
        let start = Instant::now();
        let outcomes = sync(host)
            .batch_commit(&repo(), &files(5), "Add", &CancelSignal::never())
            .await;
        assert_eq!(outcomes.len(), 5);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_commit_message_and_branch() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let record = seen.clone();

        let mut mock = MockRepositoryHost::new();
        mock.expect_put_file()
            .times(1)
            .returning(move |owner, repo, path, content, message, branch| {
                record.lock().unwrap().push(format!(
                    "{}/{} {} {} [{}] {}",
                    owner, repo, path, branch, message, content
                ));
                Ok(CommitResult::default())
            });

        let outcomes = sync(Arc::new(mock))
            .batch_commit(&repo(), &files(1), "Promote from Dev", &CancelSignal::never())
            .await;
        assert!(outcomes[0].is_success());
        assert_eq!(
            seen.lock().unwrap()[0],
            format!(
                "acme/qa V1/file-1.xml main [Promote from Dev: V1/file-1.xml] {}",
                encode_content(b"<n>1</n>")
            )
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_outcomes_in_input_order_despite_failures() {
        let host = Arc::new(InMemoryHost::new("acme").with_repository("acme", "qa"));
        host.fail_always(FaultOp::Put, "file-2.xml", HostError::AuthRejected);
        host.fail_times(FaultOp::Put, "file-6.xml", 2, HostError::transient("502"));

        let input = files(7);
        let outcomes = sync(host.clone())
            .batch_commit(&repo(), &input, "Add", &CancelSignal::never())
            .await;

        let names: Vec<_> = outcomes.iter().map(CommitOutcome::filename).collect();
        let expected: Vec<_> = input.iter().map(|f| f.filename.as_str()).collect();
        assert_eq!(names, expected);

        assert!(!outcomes[1].is_success());
        assert!(outcomes[5].is_success());
        assert_eq!(CommitTally::of(&outcomes).failed, 1);
        // Permanent failures are not retried, transient ones are
        assert_eq!(host.attempts(FaultOp::Put, "V1/file-2.xml"), 1);
        assert_eq!(host.attempts(FaultOp::Put, "V1/file-6.xml"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_recorded() {
        let host = Arc::new(InMemoryHost::new("acme").with_repository("acme", "qa"));
        host.fail_always(FaultOp::Put, "file-1.xml", HostError::transient("503"));

        let outcomes = sync(host.clone())
            .batch_commit(&repo(), &files(2), "Add", &CancelSignal::never())
            .await;
        match &outcomes[0] {
            CommitOutcome::Failed { error, .. } => assert!(error.contains("503")),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(outcomes[1].is_success());
        assert_eq!(host.attempts(FaultOp::Put, "V1/file-1.xml"), 4);
    }

    #[tokio::test]
    async fn test_committed_content_decodes_to_original() {
        let host = Arc::new(InMemoryHost::new("acme").with_repository("acme", "qa"));
        let body = "<name>Zürich – 東京 ✓</name>".as_bytes().to_vec();
        let file = FileArtifact::new("V1/intl.xml", body.clone());

        sync(host.clone())
            .batch_commit(&repo(), &[file], "Add", &CancelSignal::never())
            .await;
        assert_eq!(host.file("acme", "qa", "V1/intl.xml").unwrap(), body);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let host = Arc::new(InMemoryHost::new("acme").with_repository("acme", "qa"));
        let (canceller, signal) = cancel::channel();
        canceller.cancel();

        let outcomes = sync(host.clone())
            .batch_commit(&repo(), &files(3), "Add", &signal)
            .await;
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes
            .iter()
            .all(|o| matches!(o, CommitOutcome::Failed { error, .. } if error == CANCELLED)));
        assert_eq!(host.total_attempts(FaultOp::Put), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_between_batches() {
        let (canceller, signal) = cancel::channel();
        let canceller = Arc::new(canceller);
        let trip = canceller.clone();

        let mut mock = MockRepositoryHost::new();
        mock.expect_put_file()
            .times(5)
            .returning(move |_, _, _, _, _, _| {
                trip.cancel();
                Ok(CommitResult::default())
            });

        let outcomes = sync(Arc::new(mock))
            .batch_commit(&repo(), &files(7), "Add", &signal)
            .await;
        assert_eq!(outcomes.len(), 7);
        assert_eq!(CommitTally::of(&outcomes).committed, 5);
        assert_eq!(outcomes[6].filename(), "V1/file-7.xml");
    }

    #[tokio::test]
    async fn test_list_folders_orders_versions() {
        let host = Arc::new(
            InMemoryHost::new("acme")
                .with_repository("acme", "dev")
                .with_file("acme", "dev", "V1/a.xml", "a")
                .with_file("acme", "dev", "V10/a.xml", "a")
                .with_file("acme", "dev", "V2/a.xml", "a")
                .with_file("acme", "dev", "shared/a.xml", "a"),
        );
        let env = Environment::new("Dev").with_repo("acme/dev");
        assert_eq!(
            sync(host).list_folders(&env).await,
            vec!["V10", "V2", "V1", "shared"]
        );
    }

    #[tokio::test]
    async fn test_list_folders_swallows_errors() {
        let host = Arc::new(InMemoryHost::new("acme"));
        let sync = sync(host);
        assert!(sync
            .list_folders(&Environment::new("Dev").with_repo("acme/missing"))
            .await
            .is_empty());
        assert!(sync.list_folders(&Environment::new("QA")).await.is_empty());
    }

    #[tokio::test]
    async fn test_read_folder_recurses() {
        let host = Arc::new(
            InMemoryHost::new("acme")
                .with_repository("acme", "dev")
                .with_file("acme", "dev", "V1/b.xml", "b")
                .with_file("acme", "dev", "V1/nested/a.xml", "a")
                .with_file("acme", "dev", "V2/c.xml", "c"),
        );
        let artifacts = sync(host)
            .read_folder(&RepoRef::new("acme", "dev"), "V1")
            .await
            .unwrap();
        let names: Vec<_> = artifacts.iter().map(|a| a.filename.as_str()).collect();
        assert_eq!(names, vec!["V1/b.xml", "V1/nested/a.xml"]);
        assert_eq!(artifacts[1].content, b"a");
    }

    #[tokio::test]
    async fn test_download_prefers_inline_content() {
        let sync = sync(Arc::new(MockRepositoryHost::new()));
        let entry = ContentEntry {
            name: "a.xml".into(),
            path: "V1/a.xml".into(),
            kind: crate::infrastructure::host::EntryKind::File,
            content: Some(encode_content(b"inline")),
            download_url: None,
            sha: None,
            size: None,
        };
        assert_eq!(sync.download_file(&entry).await.unwrap(), b"inline");
    }
}
