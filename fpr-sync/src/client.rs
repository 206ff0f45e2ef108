#![doc = "HTTP implementation of the core `SscClient` contract: token handling, typed responses, pagination."]
//
//! # Service client (CLI <-> Core)
//!
//! This module wires the [`SscClient`] trait from `fpr-sync-core` to the real REST service.
//!
//! - Construct [`SscHttpClient`] with [`SscHttpClient::connect`]; it performs the single
//!   credential-acquisition step shared by all flows (token as-is, or username/password exchange).
//! - Every response body is decoded into a typed envelope; a 2xx body missing required fields is a
//!   `MalformedResponse`, never a panic or index error.
//! - Artifact uploads are streamed from disk with a known length, never buffered whole.
//! - Total and connect timeouts come from [`ServiceConfig`], so a stalled connection cannot hang a pass.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::AUTHORIZATION;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use fpr_sync_core::config::{Credential, ServiceConfig};
use fpr_sync_core::contract::{Application, ArtifactStream, CommitState, SscClient, Version};
use fpr_sync_core::{Result, SyncError};

pub const TOKENS_PATH: &str = "/api/v1/tokens";
pub const PROJECTS_PATH: &str = "/api/v1/projects";
pub const PROJECT_VERSIONS_PATH: &str = "/api/v1/projectVersions";
pub const DOWNLOAD_PATH: &str = "/download/currentStateFprDownload.html";
/// Server-side filter selecting versions left in the "finish later" state.
pub const PENDING_COMMIT_QUERY: &str = "committed:false";
const TOKEN_TYPE: &str = "UnifiedLoginToken";

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Deserialize)]
struct Page<T> {
    data: Vec<T>,
    #[serde(default)]
    count: Option<usize>,
}

#[derive(Deserialize)]
struct ProjectDto {
    id: i64,
    name: String,
}

#[derive(Deserialize)]
struct VersionDto {
    id: i64,
    name: String,
    #[serde(default)]
    project: Option<ProjectDto>,
    #[serde(default)]
    committed: Option<bool>,
}

#[derive(Deserialize)]
struct TokenDto {
    token: String,
}

#[derive(Serialize)]
struct NewResource<'a> {
    name: &'a str,
    description: &'a str,
}

#[derive(Serialize)]
struct CommitUpdate {
    committed: bool,
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    #[serde(rename = "type")]
    token_type: &'a str,
}

impl From<ProjectDto> for Application {
    fn from(dto: ProjectDto) -> Self {
        Application {
            id: dto.id,
            name: dto.name,
        }
    }
}

impl VersionDto {
    /// `scope` is the application id the request was scoped to, if any.
    fn into_version(self, endpoint: &str, scope: Option<i64>) -> Result<Version> {
        let (application_id, application_name) = match (self.project, scope) {
            (Some(project), _) => (project.id, Some(project.name)),
            (None, Some(id)) => (id, None),
            (None, None) => {
                return Err(SyncError::malformed(
                    endpoint,
                    format!("version {} has no parent project", self.id),
                ))
            }
        };
        Ok(Version {
            id: self.id,
            name: self.name,
            application_id,
            application_name,
            commit_state: CommitState::from_committed_flag(self.committed),
        })
    }
}

pub struct SscHttpClient {
    http: Client,
    base_url: String,
    authorization: String,
    page_size: u32,
}

impl SscHttpClient {
    /// Builds the HTTP client and obtains the token used for every later call.
    pub async fn connect(service: &ServiceConfig, credential: &Credential) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(service.timeout_secs))
            .connect_timeout(Duration::from_secs(service.connect_timeout_secs))
            .build()
            .map_err(|source| transport("client setup", source))?;
        let base_url = service.base_url.trim_end_matches('/').to_string();

        let token = match credential {
            Credential::Token(token) => token.clone(),
            Credential::Password { username, password } => {
                exchange_token(&http, &base_url, username, password).await?
            }
        };
        tracing::info!(
            base_url = %base_url,
            page_size = service.page_size,
            timeout_secs = service.timeout_secs,
            "Initialized SscHttpClient"
        );
        Ok(SscHttpClient {
            http,
            base_url,
            authorization: format!("{} {}", service.auth_scheme, token),
            page_size: service.page_size.max(1),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, endpoint: &str, request: RequestBuilder) -> Result<Response> {
        let response = request
            .header(AUTHORIZATION, &self.authorization)
            .send()
            .await
            .map_err(|source| transport(endpoint, source))?;
        check_status(endpoint, response)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let response = self.send(path, self.http.get(self.url(path)).query(query)).await?;
        decode(path, response).await
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let response = self.send(path, self.http.post(self.url(path)).json(body)).await?;
        decode(path, response).await
    }

    /// Follows `start`/`limit` pages until `count` items arrived or a page comes back empty.
    async fn get_all<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let mut items: Vec<T> = Vec::new();
        loop {
            let mut params = query.to_vec();
            params.push(("start", items.len().to_string()));
            params.push(("limit", self.page_size.to_string()));
            let page: Page<T> = self.get_json(path, &params).await?;
            let received = page.data.len();
            items.extend(page.data);
            let total = page.count.unwrap_or(items.len());
            tracing::debug!(path, received, fetched = items.len(), total, "Fetched page");
            if received == 0 || items.len() >= total {
                return Ok(items);
            }
        }
    }
}

fn name_query(name: &str) -> (&'static str, String) {
    ("q", format!("name:\"{}\"", name.replace('"', "\\\"")))
}

fn versions_path(application_id: i64) -> String {
    format!("{PROJECTS_PATH}/{application_id}/versions")
}

fn transport(endpoint: &str, source: reqwest::Error) -> SyncError {
    SyncError::Transport {
        endpoint: endpoint.to_string(),
        source,
    }
}

fn check_status(endpoint: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        tracing::debug!(endpoint, status = status.as_u16(), "Service rejected request");
        Err(SyncError::Status {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
        })
    }
}

async fn decode<T: DeserializeOwned>(endpoint: &str, response: Response) -> Result<T> {
    let body = response
        .text()
        .await
        .map_err(|source| transport(endpoint, source))?;
    serde_json::from_str(&body).map_err(|e| SyncError::malformed(endpoint, e.to_string()))
}

async fn exchange_token(
    http: &Client,
    base_url: &str,
    username: &str,
    password: &str,
) -> Result<String> {
    let response = http
        .post(format!("{base_url}{TOKENS_PATH}"))
        .basic_auth(username, Some(password))
        .json(&TokenRequest {
            token_type: TOKEN_TYPE,
        })
        .send()
        .await
        .map_err(|source| transport(TOKENS_PATH, source))?;
    let status = response.status();
    if status.as_u16() == 401 || status.as_u16() == 403 {
        return Err(SyncError::Auth(format!(
            "credentials for '{username}' rejected (HTTP {status})"
        )));
    }
    let response = check_status(TOKENS_PATH, response)?;
    let envelope: Envelope<TokenDto> = decode(TOKENS_PATH, response).await?;
    if envelope.data.token.is_empty() {
        return Err(SyncError::Auth("service returned an empty token".into()));
    }
    tracing::info!(username, "Obtained service token");
    Ok(envelope.data.token)
}

#[async_trait]
impl SscClient for SscHttpClient {
    async fn find_applications(&self, name: &str) -> Result<Vec<Application>> {
        let found: Vec<ProjectDto> = self.get_all(PROJECTS_PATH, &[name_query(name)]).await?;
        Ok(found
            .into_iter()
            .filter(|p| p.name == name)
            .map(Application::from)
            .collect())
    }

    async fn create_application(&self, name: &str, description: &str) -> Result<Application> {
        tracing::info!(application = name, "Creating application");
        let created: Envelope<ProjectDto> = self
            .post_json(PROJECTS_PATH, &NewResource { name, description })
            .await?;
        Ok(created.data.into())
    }

    async fn find_versions(&self, application_id: i64, name: &str) -> Result<Vec<Version>> {
        let path = versions_path(application_id);
        let found: Vec<VersionDto> = self.get_all(&path, &[name_query(name)]).await?;
        found
            .into_iter()
            .filter(|v| v.name == name)
            .map(|v| v.into_version(&path, Some(application_id)))
            .collect()
    }

    async fn create_version(
        &self,
        application_id: i64,
        name: &str,
        description: &str,
    ) -> Result<Version> {
        let path = versions_path(application_id);
        tracing::info!(application_id, version = name, "Creating version");
        let created: Envelope<VersionDto> = self
            .post_json(&path, &NewResource { name, description })
            .await?;
        created.data.into_version(&path, Some(application_id))
    }

    async fn list_applications(&self) -> Result<Vec<Application>> {
        let all: Vec<ProjectDto> = self.get_all(PROJECTS_PATH, &[]).await?;
        tracing::info!(count = all.len(), "Listed applications");
        Ok(all.into_iter().map(Application::from).collect())
    }

    async fn list_versions(&self, application_id: i64) -> Result<Vec<Version>> {
        let path = versions_path(application_id);
        let all: Vec<VersionDto> = self.get_all(&path, &[]).await?;
        all.into_iter()
            .map(|v| v.into_version(&path, Some(application_id)))
            .collect()
    }

    async fn upload_artifact(&self, version_id: i64, file_path: &Path) -> Result<()> {
        let path = format!("{PROJECT_VERSIONS_PATH}/{version_id}/artifacts");
        let file = tokio::fs::File::open(file_path)
            .await
            .map_err(|e| SyncError::io(file_path, e))?;
        let length = file
            .metadata()
            .await
            .map_err(|e| SyncError::io(file_path, e))?
            .len();
        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "artifact.fpr".to_string());
        tracing::debug!(version_id, file = %file_path.display(), length, "Streaming artifact upload");
        let part = Part::stream_with_length(Body::from(file), length)
            .file_name(file_name)
            .mime_str("application/octet-stream")
            .map_err(|source| transport(&path, source))?;
        let form = Form::new().part("file", part);
        self.send(&path, self.http.post(self.url(&path)).multipart(form))
            .await?;
        Ok(())
    }

    async fn download_artifact(&self, version_id: i64) -> Result<ArtifactStream> {
        let request = self
            .http
            .get(self.url(DOWNLOAD_PATH))
            .query(&[("id", version_id.to_string())]);
        let response = self.send(DOWNLOAD_PATH, request).await?;
        let stream = response.bytes_stream().map(|chunk| {
            chunk
                .map(|bytes| bytes.to_vec())
                .map_err(|source| transport(DOWNLOAD_PATH, source))
        });
        Ok(stream.boxed())
    }

    async fn list_pending_versions(&self) -> Result<Vec<Version>> {
        let pending: Vec<VersionDto> = self
            .get_all(
                PROJECT_VERSIONS_PATH,
                &[("q", PENDING_COMMIT_QUERY.to_string())],
            )
            .await?;
        tracing::info!(count = pending.len(), "Listed versions pending commit");
        pending
            .into_iter()
            .map(|v| v.into_version(PROJECT_VERSIONS_PATH, None))
            .collect()
    }

    async fn commit_version(&self, version_id: i64) -> Result<()> {
        let path = format!("{PROJECT_VERSIONS_PATH}/{version_id}");
        let request = self
            .http
            .post(self.url(&path))
            .json(&CommitUpdate { committed: true });
        self.send(&path, request).await?;
        Ok(())
    }
}
