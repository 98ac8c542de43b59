use async_trait::async_trait;
use octocrab::models::Repository;
use octocrab::{Octocrab, Page};
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::discovery::{NewRepository, RepositoryRef, TargetHost};
use crate::error::HostError;
use crate::gitlab::HTTP_TIMEOUT;

const HOST: &str = "GitHub";

/// GitHub client wrapper for the mirror destination side
pub struct GitHubClient {
    client: Octocrab,
    /// Bound for each single request
    timeout: Duration,
}

impl GitHubClient {
    /// Create a client against `api_url` authenticated with a personal token
    pub fn new(api_url: &str, token: &str) -> Result<Self, HostError> {
        let client = Octocrab::builder()
            .base_uri(api_url)
            .map_err(map_error)?
            .personal_token(token.to_string())
            .build()
            .map_err(map_error)?;

        Ok(Self {
            client,
            timeout: HTTP_TIMEOUT,
        })
    }

    /// Override the per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run one API call under the per-request timeout
    async fn call<T>(
        &self,
        request: impl Future<Output = octocrab::Result<T>>,
    ) -> Result<T, HostError> {
        match timeout(self.timeout, request).await {
            Ok(result) => result.map_err(map_error),
            Err(_) => Err(HostError::Unreachable {
                host: HOST,
                reason: format!("request timed out after {:?}", self.timeout),
            }),
        }
    }
}

/// Convert octocrab Repository to our RepositoryRef
pub fn repository_ref(repo: &Repository) -> RepositoryRef {
    let owner = repo.owner.as_ref().map(|o| o.login.clone());
    let full_name = repo.full_name.clone().unwrap_or_else(|| {
        format!("{}/{}", owner.as_deref().unwrap_or_default(), repo.name)
    });
    let namespace = owner.clone().unwrap_or_else(|| {
        full_name
            .rsplit_once('/')
            .map(|(ns, _)| ns.to_string())
            .unwrap_or_default()
    });

    RepositoryRef {
        id: Some(repo.id.0),
        full_name,
        slug: repo.name.clone(),
        namespace,
        owner,
        description: repo.description.clone(),
        web_url: repo
            .html_url
            .as_ref()
            .map(|u| u.to_string())
            .unwrap_or_default(),
        fork: repo.fork.unwrap_or(false),
    }
}

/// Drop forks: a fork can never stand in for an original
pub fn without_forks(repos: Vec<RepositoryRef>) -> Vec<RepositoryRef> {
    repos
        .into_iter()
        .filter(|repo| {
            if repo.fork {
                debug!("Excluding fork repository: {}", repo.full_name);
            }
            !repo.fork
        })
        .collect()
}

fn map_error(error: octocrab::Error) -> HostError {
    match error {
        octocrab::Error::GitHub { source, .. } => {
            HostError::from_status(HOST, source.status_code.as_u16(), source.message.clone())
        }
        other => HostError::Unreachable {
            host: HOST,
            reason: other.to_string(),
        },
    }
}

#[async_trait]
impl TargetHost for GitHubClient {
    async fn list_public_repositories(&self) -> Result<Vec<RepositoryRef>, HostError> {
        debug!("Fetching public GitHub repositories");

        let mut page: Page<Repository> = self
            .call(
                self.client
                    .get("/user/repos", Some(&[("type", "public"), ("per_page", "100")])),
            )
            .await?;

        // Each page gets its own timeout
        let mut repositories = Vec::new();
        loop {
            repositories.extend(page.items.iter().map(repository_ref));
            let next = self.call(self.client.get_page::<Repository>(&page.next)).await?;
            match next {
                Some(next) => page = next,
                None => break,
            }
        }

        let repos = without_forks(repositories);
        info!("Found {} public GitHub repositories", repos.len());
        Ok(repos)
    }

    async fn create_repository(&self, request: &NewRepository) -> Result<RepositoryRef, HostError> {
        info!("Creating GitHub repository: {}", request.name);
        let created: Repository = self
            .call(self.client.post("/user/repos", Some(request)))
            .await?;
        Ok(repository_ref(&created))
    }
}
