//! GitLab REST API (v4) implementation of [`SourceHost`]

use async_trait::async_trait;
use regex::Regex;
use reqwest::header::{HeaderMap, LINK};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::MirrorOptions;
use crate::discovery::{encode_path, MirrorRecord, RepositoryRef, Shorthand, SourceHost};
use crate::error::HostError;

const HOST: &str = "GitLab";

/// Timeout applied to every HTTP request
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

const PROJECTS_QUERY: &str = "projects?visibility=public&owned=true&archived=false";

/// GitLab project as returned by the API
#[derive(Debug, Deserialize)]
pub(crate) struct ProjectPayload {
    pub id: u64,
    pub path: String,
    pub path_with_namespace: String,
    #[serde(default)]
    pub description: Option<String>,
    pub web_url: String,
    #[serde(default)]
    pub namespace: Option<NamespacePayload>,
    #[serde(default)]
    pub owner: Option<UserPayload>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NamespacePayload {
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserPayload {
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MirrorPayload {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "enabled_default")]
    pub enabled: bool,
}

fn enabled_default() -> bool {
    true
}

impl From<ProjectPayload> for RepositoryRef {
    fn from(project: ProjectPayload) -> Self {
        let namespace = project
            .namespace
            .map(|ns| ns.path)
            .or_else(|| {
                project
                    .path_with_namespace
                    .rsplit_once('/')
                    .map(|(ns, _)| ns.to_string())
            })
            .unwrap_or_default();

        RepositoryRef {
            id: Some(project.id),
            full_name: project.path_with_namespace,
            slug: project.path,
            namespace,
            owner: project.owner.map(|o| o.username),
            description: project.description,
            web_url: project.web_url,
            fork: false,
        }
    }
}

/// Mirrors without a URL carry nothing we can match on
pub(crate) fn mirror_records(payloads: Vec<MirrorPayload>) -> Vec<MirrorRecord> {
    payloads
        .into_iter()
        .filter_map(|m| {
            m.url.map(|url| MirrorRecord {
                url,
                enabled: m.enabled,
            })
        })
        .collect()
}

/// Extract the `rel="next"` target from a `Link` header
pub fn next_link(headers: &HeaderMap) -> Option<String> {
    static NEXT: OnceLock<Regex> = OnceLock::new();
    let re = NEXT.get_or_init(|| {
        Regex::new(r#"<([^>]+)>\s*;\s*rel="?next"?"#).expect("static regex is valid")
    });

    headers
        .get_all(LINK)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .find_map(|link| re.captures(link.trim()).map(|c| c[1].to_string()))
}

#[derive(Serialize)]
struct CreateMirrorBody<'a> {
    url: &'a str,
    enabled: bool,
}

/// GitLab API client authenticated with a personal token
pub struct GitLabApi {
    client: Client,
    api_base: String,
    token: String,
}

impl GitLabApi {
    /// Create a client for the instance at `base_url` (e.g. https://gitlab.com)
    pub fn new(base_url: &str, token: &str) -> Result<Self, HostError> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(concat!("mirrormaker/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| transport_error(&e))?;

        Ok(Self {
            client,
            api_base: format!("{}/api/v4", base_url.trim_end_matches('/')),
            token: token.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path)
    }

    async fn send_get(&self, url: &str) -> Result<Response, HostError> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;
        check_status(response).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, HostError> {
        let response = self.send_get(&self.url(path)).await?;
        decode(response).await
    }

    /// GET a listing and follow `next` links until exhausted
    async fn get_paginated<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, HostError> {
        let mut items = Vec::new();
        let mut next = Some(self.url(path));

        while let Some(url) = next {
            let response = self.send_get(&url).await?;
            next = next_link(response.headers());
            let page: Vec<T> = decode(response).await?;
            items.extend(page);
        }

        Ok(items)
    }

    /// Username of the authenticated user
    pub async fn current_username(&self) -> Result<String, HostError> {
        let user: UserPayload = self.get_json("user").await?;
        Ok(user.username)
    }
}

#[async_trait]
impl SourceHost for GitLabApi {
    async fn list_repositories(&self) -> Result<Vec<RepositoryRef>, HostError> {
        debug!("Fetching public GitLab repositories");
        let projects: Vec<ProjectPayload> =
            self.get_paginated(&format!("{}&per_page=100", PROJECTS_QUERY)).await?;

        info!("Found {} public GitLab repositories", projects.len());
        Ok(projects.into_iter().map(RepositoryRef::from).collect())
    }

    async fn get_repository(&self, shorthand: &Shorthand) -> Result<RepositoryRef, HostError> {
        let path = match &shorthand.namespace {
            Some(_) => shorthand.to_string(),
            None => shorthand.with_namespace(&self.current_username().await?),
        };

        debug!("Fetching GitLab repository: {}", path);
        match self
            .get_json::<ProjectPayload>(&format!("projects/{}", encode_path(&path)))
            .await
        {
            Ok(project) => Ok(project.into()),
            Err(HostError::Status { status: 404, .. }) => {
                Err(HostError::NotFound { host: HOST, what: path })
            }
            Err(e) => Err(e),
        }
    }

    async fn list_mirrors(&self, repo: &RepositoryRef) -> Result<Vec<MirrorRecord>, HostError> {
        debug!("Fetching mirrors for repository: {}", repo.full_name);
        let mirrors: Vec<MirrorPayload> = self
            .get_json(&format!("projects/{}/remote_mirrors", repo.project_key()))
            .await?;

        let mirrors = mirror_records(mirrors);
        debug!("Found {} mirrors for {}", mirrors.len(), repo.full_name);
        Ok(mirrors)
    }

    async fn create_mirror(
        &self,
        repo: &RepositoryRef,
        url: &str,
        options: &MirrorOptions,
    ) -> Result<(), HostError> {
        let endpoint = self.url(&format!("projects/{}/remote_mirrors", repo.project_key()));
        let body = CreateMirrorBody {
            url,
            enabled: options.enabled,
        };

        info!("Creating mirror for repository: {}", repo.full_name);
        let response = self
            .client
            .post(&endpoint)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;
        check_status(response).await?;

        info!("Mirror created for {}", repo.full_name);
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "GitLab API"
    }
}

fn transport_error(error: &reqwest::Error) -> HostError {
    HostError::Unreachable {
        host: HOST,
        reason: error.to_string(),
    }
}

async fn check_status(response: Response) -> Result<Response, HostError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(HostError::from_status(HOST, status.as_u16(), body))
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, HostError> {
    let bytes = response.bytes().await.map_err(|e| transport_error(&e))?;
    serde_json::from_slice(&bytes).map_err(|e| HostError::Malformed {
        host: HOST,
        reason: e.to_string(),
    })
}
