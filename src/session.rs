//! Immutable per-run context
//!
//! Credentials and mirror options are resolved once from the merged
//! [`Config`] and handed to every component that needs them.

use std::fmt;

use crate::backend::Backend;
use crate::config::{Config, MirrorOptions};
use crate::discovery::RepositoryRef;
use crate::error::RunError;
use crate::reconcile::effective_username;

#[derive(Clone)]
pub struct Session {
    github_token: String,
    gitlab_token: Option<String>,
    target_username: Option<String>,
    web_host: String,
    mirror: MirrorOptions,
    dry_run: bool,
}

impl Session {
    /// Resolve the session for the selected backend
    ///
    /// The GitHub token is always required (the target snapshot is read through
    /// the API). The GitLab token is required when the API backend is in use.
    pub fn new(config: &Config, backend: Backend) -> Result<Self, RunError> {
        let github_token = config.github.token.clone().ok_or(RunError::MissingToken {
            host: "GitHub",
            flag: "github-token",
            env: "GITHUB_TOKEN",
        })?;

        if backend == Backend::NativeApi && config.gitlab.token.is_none() {
            return Err(RunError::MissingToken {
                host: "GitLab",
                flag: "gitlab-token",
                env: "GITLAB_TOKEN",
            });
        }

        Ok(Self {
            github_token,
            gitlab_token: config.gitlab.token.clone(),
            target_username: config.github.username.clone(),
            web_host: config.github.web_host.clone(),
            mirror: config.mirror.clone(),
            dry_run: config.dry_run,
        })
    }

    pub fn github_token(&self) -> &str {
        &self.github_token
    }

    pub fn gitlab_token(&self) -> Option<&str> {
        self.gitlab_token.as_deref()
    }

    /// Explicitly configured GitHub username, if any
    pub fn target_username(&self) -> Option<&str> {
        self.target_username.as_deref()
    }

    pub fn mirror_options(&self) -> &MirrorOptions {
        &self.mirror
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    /// Authenticated destination URL for the mirror of `repo`
    pub fn mirror_url(&self, repo: &RepositoryRef) -> String {
        let user = effective_username(repo, self.target_username());
        format!(
            "https://{user}:{token}@{host}/{user}/{slug}.git",
            user = user,
            token = self.github_token,
            host = self.web_host,
            slug = repo.slug
        )
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("github_token", &"***")
            .field("gitlab_token", &self.gitlab_token.as_ref().map(|_| "***"))
            .field("target_username", &self.target_username)
            .field("web_host", &self.web_host)
            .field("mirror", &self.mirror)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}
