//! In-process repository host
//!
//! Keeps repositories, files, commits and refs in memory. Backs
//! `relay --offline` dry runs and the orchestration tests. Faults can be
//! injected per operation to exercise retry and partial-failure paths.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};

use crate::error::HostError;
use crate::infrastructure::host::{
    decode_content, Commit, CommitResult, ContentEntry, CreateRepository, EntryKind, RefResult,
    Release, Repository, RepositoryHost, TagObject,
};

const DOWNLOAD_SCHEME: &str = "memory://";

/// Host operation a fault applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultOp {
    Exists,
    Create,
    List,
    Download,
    Put,
    Commits,
    TagObject,
    Ref,
    Release,
}

#[derive(Debug, Clone)]
struct Fault {
    op: FaultOp,
    /// Matched against the repository slug, file path, or URL
    target: String,
    /// `None` fails forever
    remaining: Option<usize>,
    error: HostError,
}

#[derive(Debug, Default)]
struct RepoState {
    files: BTreeMap<String, Vec<u8>>,
    /// Newest last
    commits: Vec<String>,
    refs: BTreeMap<String, String>,
    tags: Vec<TagObject>,
    releases: Vec<Release>,
}

#[derive(Debug, Default)]
struct HostState {
    repos: BTreeMap<String, RepoState>,
    faults: Vec<Fault>,
    attempts: HashMap<(FaultOp, String), usize>,
    sequence: u64,
}

impl HostState {
    fn next_sha(&mut self) -> String {
        self.sequence += 1;
        format!("{:040x}", self.sequence)
    }

    /// Count the attempt and return an injected error if one matches
    fn check(&mut self, op: FaultOp, target: &str) -> Result<(), HostError> {
        *self.attempts.entry((op, target.to_string())).or_insert(0) += 1;

        let fault = self
            .faults
            .iter_mut()
            .find(|f| f.op == op && target.contains(&f.target) && f.remaining != Some(0));

        match fault {
            Some(fault) => {
                if let Some(remaining) = fault.remaining.as_mut() {
                    *remaining -= 1;
                }
                Err(fault.error.clone())
            }
            None => Ok(()),
        }
    }

    fn repo_mut(&mut self, owner: &str, repo: &str) -> Result<&mut RepoState, HostError> {
        let slug = format!("{}/{}", owner, repo);
        self.repos
            .get_mut(&slug)
            .ok_or_else(|| HostError::not_found(slug))
    }
}

/// Repository host held entirely in memory
pub struct InMemoryHost {
    /// Login used for repositories created without an organisation
    user: String,
    state: Mutex<HostState>,
}

impl InMemoryHost {
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            state: Mutex::new(HostState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, HostState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Builder: an existing repository with one initial commit
    pub fn with_repository(self, owner: &str, repo: &str) -> Self {
        {
            let mut state = self.state();
            let sha = state.next_sha();
            let entry = state.repos.entry(format!("{}/{}", owner, repo)).or_default();
            entry.files.insert("README.md".to_string(), b"# repository\n".to_vec());
            entry.commits.push(sha);
        }
        self
    }

    /// Builder: an existing repository without any commit
    pub fn with_empty_repository(self, owner: &str, repo: &str) -> Self {
        self.state()
            .repos
            .entry(format!("{}/{}", owner, repo))
            .or_default();
        self
    }

    /// Builder: a file in an existing repository
    pub fn with_file(self, owner: &str, repo: &str, path: &str, content: impl Into<Vec<u8>>) -> Self {
        {
            let mut state = self.state();
            let sha = state.next_sha();
            let entry = state.repos.entry(format!("{}/{}", owner, repo)).or_default();
            entry.files.insert(path.trim_matches('/').to_string(), content.into());
            entry.commits.push(sha);
        }
        self
    }

    /// Fail the next `times` calls of `op` whose target contains `target`
    pub fn fail_times(&self, op: FaultOp, target: &str, times: usize, error: HostError) {
        self.state().faults.push(Fault {
            op,
            target: target.to_string(),
            remaining: Some(times),
            error,
        });
    }

    /// Fail every call of `op` whose target contains `target`
    pub fn fail_always(&self, op: FaultOp, target: &str, error: HostError) {
        self.state().faults.push(Fault {
            op,
            target: target.to_string(),
            remaining: None,
            error,
        });
    }

    /// Number of calls made for `op` against exactly `target`
    pub fn attempts(&self, op: FaultOp, target: &str) -> usize {
        self.state()
            .attempts
            .get(&(op, target.to_string()))
            .copied()
            .unwrap_or(0)
    }

    /// Total calls made for `op`
    pub fn total_attempts(&self, op: FaultOp) -> usize {
        self.state()
            .attempts
            .iter()
            .filter(|((o, _), _)| *o == op)
            .map(|(_, count)| *count)
            .sum()
    }

    pub fn has_repository(&self, owner: &str, repo: &str) -> bool {
        self.state().repos.contains_key(&format!("{}/{}", owner, repo))
    }

    /// Stored bytes of a file
    pub fn file(&self, owner: &str, repo: &str, path: &str) -> Option<Vec<u8>> {
        self.state()
            .repos
            .get(&format!("{}/{}", owner, repo))
            .and_then(|r| r.files.get(path.trim_matches('/')).cloned())
    }

    /// Paths of all files, sorted
    pub fn files(&self, owner: &str, repo: &str) -> Vec<String> {
        self.state()
            .repos
            .get(&format!("{}/{}", owner, repo))
            .map(|r| r.files.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Reference target, e.g. `refs/tags/v1.0.0`
    pub fn reference(&self, owner: &str, repo: &str, ref_name: &str) -> Option<String> {
        self.state()
            .repos
            .get(&format!("{}/{}", owner, repo))
            .and_then(|r| r.refs.get(ref_name).cloned())
    }

    pub fn releases(&self, owner: &str, repo: &str) -> Vec<Release> {
        self.state()
            .repos
            .get(&format!("{}/{}", owner, repo))
            .map(|r| r.releases.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl RepositoryHost for InMemoryHost {
    fn html_url(&self, owner: &str, repo: &str) -> String {
        format!("memory://{}/{}", owner, repo)
    }

    async fn repository_exists(&self, owner: &str, repo: &str) -> Result<bool, HostError> {
        let slug = format!("{}/{}", owner, repo);
        let mut state = self.state();
        state.check(FaultOp::Exists, &slug)?;
        Ok(state.repos.contains_key(&slug))
    }

    async fn create_repository(&self, request: &CreateRepository) -> Result<Repository, HostError> {
        let owner = request.owner.clone().unwrap_or_else(|| self.user.clone());
        let slug = format!("{}/{}", owner, request.name);

        let mut state = self.state();
        state.check(FaultOp::Create, &slug)?;

        if state.repos.contains_key(&slug) {
            return Err(HostError::Rejected {
                status: 422,
                message: "name already exists on this account".to_string(),
            });
        }

        let mut repo = RepoState::default();
        if request.auto_init {
            repo.files.insert(
                "README.md".to_string(),
                format!("# {}\n\n{}\n", request.name, request.description).into_bytes(),
            );
            repo.commits.push(state.next_sha());
        }
        state.repos.insert(slug.clone(), repo);

        Ok(Repository {
            name: request.name.clone(),
            full_name: Some(slug),
            url: format!("memory://api/repos/{}/{}", owner, request.name),
            html_url: self.html_url(&owner, &request.name),
        })
    }

    async fn list_contents(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
    ) -> Result<Vec<ContentEntry>, HostError> {
        let prefix = path.trim_matches('/');
        let target = format!("{}/{}/{}", owner, repo, prefix);

        let mut state = self.state();
        state.check(FaultOp::List, &target)?;
        let files = &state.repo_mut(owner, repo)?.files;

        let mut dirs = BTreeSet::new();
        let mut entries = Vec::new();

        for (file_path, content) in files.iter() {
            let relative = if prefix.is_empty() {
                file_path.as_str()
            } else {
                match file_path.strip_prefix(prefix).and_then(|r| r.strip_prefix('/')) {
                    Some(rest) => rest,
                    None => continue,
                }
            };

            match relative.split_once('/') {
                Some((dir, _)) => {
                    dirs.insert(dir.to_string());
                }
                None => entries.push(ContentEntry {
                    name: relative.to_string(),
                    path: file_path.clone(),
                    kind: EntryKind::File,
                    content: None,
                    download_url: Some(format!(
                        "{}{}/{}/{}",
                        DOWNLOAD_SCHEME, owner, repo, file_path
                    )),
                    sha: None,
                    size: Some(content.len() as u64),
                }),
            }
        }

        if !prefix.is_empty() && dirs.is_empty() && entries.is_empty() {
            return Err(HostError::not_found(target));
        }

        let mut listing: Vec<ContentEntry> = dirs
            .into_iter()
            .map(|dir| ContentEntry {
                path: if prefix.is_empty() {
                    dir.clone()
                } else {
                    format!("{}/{}", prefix, dir)
                },
                name: dir,
                kind: EntryKind::Dir,
                content: None,
                download_url: None,
                sha: None,
                size: None,
            })
            .collect();
        listing.extend(entries);
        Ok(listing)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, HostError> {
        let mut state = self.state();
        state.check(FaultOp::Download, url)?;

        let location = url
            .strip_prefix(DOWNLOAD_SCHEME)
            .ok_or_else(|| HostError::not_found(url))?;
        let mut parts = location.splitn(3, '/');
        let (owner, repo, path) = match (parts.next(), parts.next(), parts.next()) {
            (Some(o), Some(r), Some(p)) => (o, r, p),
            _ => return Err(HostError::not_found(url)),
        };

        state
            .repo_mut(owner, repo)?
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| HostError::not_found(url))
    }

    async fn put_file(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        content_base64: &str,
        _message: &str,
        _branch: &str,
    ) -> Result<CommitResult, HostError> {
        let path = path.trim_matches('/');
        let mut state = self.state();
        state.check(FaultOp::Put, path)?;

        let content = decode_content(content_base64)?;
        let commit_sha = state.next_sha();
        let content_sha = state.next_sha();

        let repo_state = state.repo_mut(owner, repo)?;
        repo_state.files.insert(path.to_string(), content);
        repo_state.commits.push(commit_sha.clone());

        Ok(CommitResult {
            content_sha: Some(content_sha),
            commit_sha: Some(commit_sha),
        })
    }

    async fn list_commits(&self, owner: &str, repo: &str) -> Result<Vec<Commit>, HostError> {
        let mut state = self.state();
        state.check(FaultOp::Commits, &format!("{}/{}", owner, repo))?;

        Ok(state
            .repo_mut(owner, repo)?
            .commits
            .iter()
            .rev()
            .map(|sha| Commit { sha: sha.clone() })
            .collect())
    }

    async fn create_tag_object(
        &self,
        owner: &str,
        repo: &str,
        tag: &str,
        _message: &str,
        object_sha: &str,
    ) -> Result<TagObject, HostError> {
        let mut state = self.state();
        state.check(FaultOp::TagObject, &format!("{}/{}", owner, repo))?;

        let sha = state.next_sha();
        let repo_state = state.repo_mut(owner, repo)?;
        if !repo_state.commits.iter().any(|c| c == object_sha) {
            return Err(HostError::Rejected {
                status: 422,
                message: format!("object {} does not exist", object_sha),
            });
        }

        let tag = TagObject {
            sha,
            tag: tag.to_string(),
        };
        repo_state.tags.push(tag.clone());
        Ok(tag)
    }

    async fn create_ref(
        &self,
        owner: &str,
        repo: &str,
        ref_name: &str,
        sha: &str,
    ) -> Result<RefResult, HostError> {
        let mut state = self.state();
        state.check(FaultOp::Ref, &format!("{}/{}", owner, repo))?;

        let repo_state = state.repo_mut(owner, repo)?;
        if repo_state.refs.contains_key(ref_name) {
            return Err(HostError::Rejected {
                status: 422,
                message: "Reference already exists".to_string(),
            });
        }
        repo_state.refs.insert(ref_name.to_string(), sha.to_string());

        Ok(RefResult {
            ref_name: ref_name.to_string(),
            url: None,
        })
    }

    async fn create_release(
        &self,
        owner: &str,
        repo: &str,
        tag_name: &str,
        _name: &str,
        _body: &str,
    ) -> Result<Release, HostError> {
        let html_url = format!("{}/releases/tag/{}", self.html_url(owner, repo), tag_name);
        let mut state = self.state();
        state.check(FaultOp::Release, &format!("{}/{}", owner, repo))?;

        let repo_state = state.repo_mut(owner, repo)?;
        let head = repo_state.commits.last().cloned().ok_or_else(|| HostError::Rejected {
            status: 422,
            message: "Repository is empty".to_string(),
        })?;

        let release = Release {
            id: repo_state.releases.len() as u64 + 1,
            tag_name: tag_name.to_string(),
            html_url: Some(html_url),
        };
        repo_state.releases.push(release.clone());
        repo_state.refs.insert(format!("refs/tags/{}", tag_name), head);
        Ok(release)
    }
}
