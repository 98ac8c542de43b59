//! Sync Engine - orchestrates one mirroring run
//!
//! Snapshots both hosts, builds the action plan and applies it. Snapshot
//! failures are fatal for the run; everything after that is contained per
//! repository by the reconciliation engine and the executor.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::backend::{self, Backend};
use crate::config::Config;
use crate::discovery::{RepositoryRef, Shorthand, SourceHost, TargetHost};
use crate::error::{HostError, RunError};
use crate::executor::{ApplySummary, Executor};
use crate::github::GitHubClient;
use crate::gitlab::GitLabApi;
use crate::glab::GlabCli;
use crate::reconcile::{self, ActionDecision};
use crate::session::Session;

/// Results from a complete run
#[derive(Debug, Clone)]
pub struct SyncSummary {
    pub plan: Vec<ActionDecision>,
    /// `None` for a dry run
    pub applied: Option<ApplySummary>,
    pub duration: Duration,
}

/// The engine for one run: fixed backend, fixed session, fixed hosts
pub struct SyncEngine {
    session: Session,
    backend: Backend,
    api: Arc<dyn SourceHost>,
    cli: Option<Arc<dyn SourceHost>>,
    target: Arc<dyn TargetHost>,
}

impl SyncEngine {
    /// Assemble an engine from already-selected parts
    pub fn new(
        session: Session,
        backend: Backend,
        api: Arc<dyn SourceHost>,
        cli: Option<Arc<dyn SourceHost>>,
        target: Arc<dyn TargetHost>,
    ) -> Self {
        Self {
            session,
            backend,
            api,
            cli,
            target,
        }
    }

    /// Select the backend, validate credentials and build the real clients
    pub async fn from_config(config: &Config) -> Result<Self, RunError> {
        let cli_path = config.expanded_cli_path().unwrap_or_else(|e| {
            warn!("{:#}; using cli_path as given", e);
            config.cli_path.clone()
        });
        let glab = Arc::new(GlabCli::new(
            cli_path,
            Duration::from_secs(config.cli_timeout),
        ));

        let backend = backend::select(config.backend, glab.as_ref()).await;
        let session = Session::new(config, backend)?;

        let api = GitLabApi::new(&config.gitlab.url, session.gitlab_token().unwrap_or_default())
            .map_err(|source| RunError::Setup { host: "GitLab", source })?;
        let target = GitHubClient::new(&config.github.api_url, session.github_token())
            .map_err(|source| RunError::Setup { host: "GitHub", source })?;

        let cli: Option<Arc<dyn SourceHost>> = match backend {
            Backend::ExternalCli => Some(glab as Arc<dyn SourceHost>),
            Backend::NativeApi => None,
        };

        Ok(Self::new(session, backend, Arc::new(api), cli, Arc::new(target)))
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Source-host implementation for reads in this run
    fn source(&self) -> &dyn SourceHost {
        match (&self.backend, &self.cli) {
            (Backend::ExternalCli, Some(cli)) => cli.as_ref(),
            _ => self.api.as_ref(),
        }
    }

    /// GitLab snapshot: one repository or the full listing
    async fn source_snapshot(&self, single: Option<&Shorthand>) -> Result<Vec<RepositoryRef>, RunError> {
        match single {
            Some(shorthand) => {
                info!("Getting GitLab repository: {}", shorthand);
                let repo = self
                    .source()
                    .get_repository(shorthand)
                    .await
                    .map_err(|source| snapshot_error(format!("GitLab repository {}", shorthand), source))?;
                Ok(vec![repo])
            }
            None => {
                info!("Getting public GitLab repositories");
                self.source()
                    .list_repositories()
                    .await
                    .map_err(|source| snapshot_error("public GitLab repositories".to_string(), source))
            }
        }
    }

    /// Build the action plan (no side effects)
    pub async fn plan(&self, single: Option<&Shorthand>) -> Result<Vec<ActionDecision>, RunError> {
        let sources = self.source_snapshot(single).await?;
        if sources.is_empty() {
            info!("There are no public repositories in your GitLab account.");
            return Ok(Vec::new());
        }

        info!("Getting public GitHub repositories");
        let targets = self
            .target
            .list_public_repositories()
            .await
            .map_err(|source| snapshot_error("public GitHub repositories".to_string(), source))?;

        info!("Checking mirror status of {} repositories", sources.len());
        Ok(reconcile::plan(
            &sources,
            &targets,
            self.source(),
            self.session.target_username(),
        )
        .await)
    }

    /// Apply a plan built by [`SyncEngine::plan`]
    pub async fn apply(&self, plan: &[ActionDecision]) -> ApplySummary {
        let executor = Executor::new(
            self.api.as_ref(),
            self.cli.as_deref(),
            self.target.as_ref(),
            &self.session,
        );
        executor.apply(plan, self.session.dry_run(), self.backend).await
    }

    /// Plan and apply in one go
    pub async fn run(&self, single: Option<&Shorthand>) -> Result<SyncSummary, RunError> {
        let start_time = Instant::now();

        let plan = self.plan(single).await?;
        let applied = self.apply(&plan).await;
        let applied = (!self.session.dry_run()).then_some(applied);

        let summary = SyncSummary {
            plan,
            applied,
            duration: start_time.elapsed(),
        };
        info!(
            "Run completed in {:.2}s for {} repositories",
            summary.duration.as_secs_f64(),
            summary.plan.len()
        );
        Ok(summary)
    }
}

fn snapshot_error(what: String, source: HostError) -> RunError {
    RunError::Snapshot { what, source }
}
