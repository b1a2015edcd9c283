//! GitHub REST v3 client
//!
//! Implements `RepositoryHost` over `reqwest`. Every request carries the
//! bearer token; when no token is configured the call fails with
//! `HostError::MissingCredential` before anything touches the network.
//!
//! Status mapping:
//! - 401 → `AuthRejected`
//! - 404 → `NotFound`
//! - 429, 5xx, rate-limited 403, connect/timeout errors → `Transient`
//! - any other non-success → `Rejected`

use async_trait::async_trait;
use reqwest::header::{HeaderMap, ACCEPT, USER_AGENT};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::HostConfig;
use crate::error::HostError;
use crate::infrastructure::host::{
    Commit, CommitResult, ContentEntry, CreateRepository, RefResult, Release, Repository,
    RepositoryHost, TagObject,
};

const GITHUB_ACCEPT: &str = "application/vnd.github.v3+json";

/// Client for a GitHub (or GitHub Enterprise) API endpoint
pub struct GitHubClient {
    client: Client,
    api_url: String,
    web_url: String,
    user_agent: String,
    token: Option<String>,
}

/// Contents API responds with an array for directories and an object for files
#[derive(Deserialize)]
#[serde(untagged)]
enum ContentsResponse {
    Many(Vec<ContentEntry>),
    One(ContentEntry),
}

#[derive(Serialize)]
struct PutFileRequest<'a> {
    message: &'a str,
    content: &'a str,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

#[derive(Deserialize)]
struct PutFileResponse {
    content: Option<ShaOnly>,
    commit: Option<ShaOnly>,
}

#[derive(Deserialize)]
struct ShaOnly {
    sha: String,
}

#[derive(Serialize)]
struct CreateTagRequest<'a> {
    tag: &'a str,
    message: &'a str,
    object: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
}

#[derive(Serialize)]
struct CreateRefRequest<'a> {
    #[serde(rename = "ref")]
    ref_name: &'a str,
    sha: &'a str,
}

#[derive(Serialize)]
struct CreateReleaseRequest<'a> {
    tag_name: &'a str,
    name: &'a str,
    body: &'a str,
    draft: bool,
    prerelease: bool,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

impl GitHubClient {
    /// Create a client for the configured endpoint
    pub fn new(config: &HostConfig, token: Option<String>) -> Result<Self, HostError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| HostError::transient(format!("failed to build HTTP client: {}", e)))?;

        let api_url = config.api_url.trim_end_matches('/').to_string();
        let web_url = config
            .web_url
            .clone()
            .unwrap_or_else(|| derive_web_url(&api_url));

        Ok(Self {
            client,
            api_url,
            web_url: web_url.trim_end_matches('/').to_string(),
            user_agent: config
                .user_agent
                .clone()
                .unwrap_or_else(|| concat!("relay/", env!("CARGO_PKG_VERSION")).to_string()),
            token: token.filter(|t| !t.trim().is_empty()),
        })
    }

    /// Base API URL
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn token(&self) -> Result<&str, HostError> {
        self.token.as_deref().ok_or(HostError::MissingCredential)
    }

    fn request(&self, method: Method, url: &str) -> Result<RequestBuilder, HostError> {
        let token = self.token()?;
        Ok(self
            .client
            .request(method, url)
            .bearer_auth(token)
            .header(ACCEPT, GITHUB_ACCEPT)
            .header(USER_AGENT, &self.user_agent)
            .header("X-GitHub-Api-Version", "2022-11-28"))
    }

    fn repo_url(&self, owner: &str, repo: &str) -> String {
        format!(
            "{}/repos/{}/{}",
            self.api_url,
            urlencoding::encode(owner),
            urlencoding::encode(repo)
        )
    }

    fn contents_url(&self, owner: &str, repo: &str, path: &str) -> String {
        let path = encode_path(path);
        if path.is_empty() {
            format!("{}/contents", self.repo_url(owner, repo))
        } else {
            format!("{}/contents/{}", self.repo_url(owner, repo), path)
        }
    }

    async fn send(&self, builder: RequestBuilder, resource: &str) -> Result<Response, HostError> {
        let response = builder.send().await.map_err(map_transport_error)?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await.unwrap_or_default();
        debug!(%status, resource, "Host request failed");
        Err(map_status(status, &headers, &body, resource))
    }

    async fn json<T: DeserializeOwned>(response: Response) -> Result<T, HostError> {
        response.json().await.map_err(|e| HostError::Decode {
            message: e.to_string(),
        })
    }

    async fn put_contents(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        content_base64: &str,
        message: &str,
        branch: &str,
        sha: Option<&str>,
    ) -> Result<CommitResult, HostError> {
        let url = self.contents_url(owner, repo, path);
        let body = PutFileRequest {
            message,
            content: content_base64,
            branch,
            sha,
        };

        let response = self
            .send(self.request(Method::PUT, &url)?.json(&body), path)
            .await?;
        let parsed: PutFileResponse = Self::json(response).await?;

        Ok(CommitResult {
            content_sha: parsed.content.map(|c| c.sha),
            commit_sha: parsed.commit.map(|c| c.sha),
        })
    }

    /// Blob SHA of an existing file on `branch`, if any
    async fn existing_sha(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        branch: &str,
    ) -> Result<Option<String>, HostError> {
        let url = self.contents_url(owner, repo, path);
        let builder = self.request(Method::GET, &url)?.query(&[("ref", branch)]);

        match self.send(builder, path).await {
            Ok(response) => match Self::json::<ContentsResponse>(response).await? {
                ContentsResponse::One(entry) => Ok(entry.sha),
                ContentsResponse::Many(_) => Ok(None),
            },
            Err(HostError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl RepositoryHost for GitHubClient {
    fn html_url(&self, owner: &str, repo: &str) -> String {
        format!("{}/{}/{}", self.web_url, owner, repo)
    }

    async fn repository_exists(&self, owner: &str, repo: &str) -> Result<bool, HostError> {
        let url = self.repo_url(owner, repo);
        match self
            .send(self.request(Method::GET, &url)?, &format!("{}/{}", owner, repo))
            .await
        {
            Ok(_) => Ok(true),
            Err(HostError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn create_repository(&self, request: &CreateRepository) -> Result<Repository, HostError> {
        let url = match &request.owner {
            Some(org) => format!("{}/orgs/{}/repos", self.api_url, urlencoding::encode(org)),
            None => format!("{}/user/repos", self.api_url),
        };

        let response = self
            .send(self.request(Method::POST, &url)?.json(request), &request.name)
            .await?;
        Self::json(response).await
    }

    async fn list_contents(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
    ) -> Result<Vec<ContentEntry>, HostError> {
        let url = self.contents_url(owner, repo, path);
        let resource = format!("{}/{}/{}", owner, repo, path.trim_matches('/'));
        let response = self.send(self.request(Method::GET, &url)?, &resource).await?;

        Ok(match Self::json::<ContentsResponse>(response).await? {
            ContentsResponse::Many(entries) => entries,
            ContentsResponse::One(entry) => vec![entry],
        })
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, HostError> {
        let response = self.send(self.request(Method::GET, url)?, url).await?;
        let bytes = response.bytes().await.map_err(map_transport_error)?;
        Ok(bytes.to_vec())
    }

    async fn put_file(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        content_base64: &str,
        message: &str,
        branch: &str,
    ) -> Result<CommitResult, HostError> {
        let first = self
            .put_contents(owner, repo, path, content_base64, message, branch, None)
            .await;

        // The host refuses to overwrite without the current blob SHA
        if !matches!(first, Err(HostError::Rejected { status: 409 | 422, .. })) {
            return first;
        }

        match self.existing_sha(owner, repo, path, branch).await? {
            Some(sha) => {
                debug!(path, "Updating existing file");
                let second = self
                    .put_contents(owner, repo, path, content_base64, message, branch, Some(&sha))
                    .await;
                branch_conflict(second)
            }
            None => branch_conflict(first),
        }
    }

    async fn list_commits(&self, owner: &str, repo: &str) -> Result<Vec<Commit>, HostError> {
        let url = format!("{}/commits", self.repo_url(owner, repo));
        let builder = self.request(Method::GET, &url)?.query(&[("per_page", "1")]);

        match self.send(builder, &format!("{}/{}", owner, repo)).await {
            Ok(response) => Self::json(response).await,
            // Empty repositories answer 409 "Git Repository is empty."
            Err(HostError::Rejected { status: 409, .. }) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    async fn create_tag_object(
        &self,
        owner: &str,
        repo: &str,
        tag: &str,
        message: &str,
        object_sha: &str,
    ) -> Result<TagObject, HostError> {
        let url = format!("{}/git/tags", self.repo_url(owner, repo));
        let body = CreateTagRequest {
            tag,
            message,
            object: object_sha,
            kind: "commit",
        };
        let response = self
            .send(self.request(Method::POST, &url)?.json(&body), tag)
            .await?;
        Self::json(response).await
    }

    async fn create_ref(
        &self,
        owner: &str,
        repo: &str,
        ref_name: &str,
        sha: &str,
    ) -> Result<RefResult, HostError> {
        let url = format!("{}/git/refs", self.repo_url(owner, repo));
        let body = CreateRefRequest { ref_name, sha };
        let response = self
            .send(self.request(Method::POST, &url)?.json(&body), ref_name)
            .await?;
        Self::json(response).await
    }

    async fn create_release(
        &self,
        owner: &str,
        repo: &str,
        tag_name: &str,
        name: &str,
        body: &str,
    ) -> Result<Release, HostError> {
        let url = format!("{}/releases", self.repo_url(owner, repo));
        let request = CreateReleaseRequest {
            tag_name,
            name,
            body,
            draft: false,
            prerelease: false,
        };
        let response = self
            .send(self.request(Method::POST, &url)?.json(&request), tag_name)
            .await?;
        Self::json(response).await
    }
}

/// `https://api.github.com` → `https://github.com`,
/// `https://ghe.example.com/api/v3` → `https://ghe.example.com`
fn derive_web_url(api_url: &str) -> String {
    if let Some(rest) = api_url.strip_prefix("https://api.") {
        return format!("https://{}", rest);
    }
    api_url
        .strip_suffix("/api/v3")
        .unwrap_or(api_url)
        .to_string()
}

/// Percent-encode each path segment, keeping the separators
fn encode_path(path: &str) -> String {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn map_transport_error(error: reqwest::Error) -> HostError {
    if error.is_decode() {
        HostError::Decode {
            message: error.to_string(),
        }
    } else {
        HostError::transient(error.to_string())
    }
}

fn map_status(status: StatusCode, headers: &HeaderMap, body: &str, resource: &str) -> HostError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unexpected response")
                .to_string()
        });

    let rate_limited = headers
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == "0")
        .unwrap_or(false)
        || message.to_lowercase().contains("rate limit");

    match status {
        StatusCode::UNAUTHORIZED => HostError::AuthRejected,
        StatusCode::NOT_FOUND => HostError::not_found(resource),
        StatusCode::TOO_MANY_REQUESTS => HostError::transient(format!("rate limited: {}", message)),
        StatusCode::FORBIDDEN if rate_limited => {
            HostError::transient(format!("rate limited: {}", message))
        }
        s if s.is_server_error() => HostError::transient(format!("{}: {}", s.as_u16(), message)),
        s => HostError::Rejected {
            status: s.as_u16(),
            message,
        },
    }
}

/// A 409 on a contents write that is not about a missing SHA means the
/// branch head moved under a concurrent write; the write can be repeated
fn branch_conflict(result: Result<CommitResult, HostError>) -> Result<CommitResult, HostError> {
    match result {
        Err(HostError::Rejected {
            status: 409,
            message,
        }) => Err(HostError::transient(format!("branch conflict: {}", message))),
        other => other,
    }
}
