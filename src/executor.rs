//! Action executor
//!
//! Applies an action plan in order. Every repository is isolated: a failure
//! is logged with the repository name and the run moves on. Nothing is rolled
//! back; the next run re-derives whatever is still missing.

use tracing::{debug, error, info, warn};

use crate::backend::Backend;
use crate::discovery::{NewRepository, RepositoryRef, SourceHost, TargetHost};
use crate::error::HostError;
use crate::reconcile::ActionDecision;
use crate::session::Session;

/// Counters from one apply pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplySummary {
    pub repos_created: usize,
    pub mirrors_created: usize,
    /// Mirrors set up through the API after the CLI failed
    pub fallbacks: usize,
    /// (repository, error) for every repository that failed
    pub failures: Vec<(String, String)>,
}

/// Creates missing GitHub repositories and GitLab mirrors
pub struct Executor<'a> {
    native: &'a dyn SourceHost,
    cli: Option<&'a dyn SourceHost>,
    target: &'a dyn TargetHost,
    session: &'a Session,
}

impl<'a> Executor<'a> {
    pub fn new(
        native: &'a dyn SourceHost,
        cli: Option<&'a dyn SourceHost>,
        target: &'a dyn TargetHost,
        session: &'a Session,
    ) -> Self {
        Self {
            native,
            cli,
            target,
            session,
        }
    }

    /// Apply the plan; a dry run performs no calls at all
    pub async fn apply(&self, plan: &[ActionDecision], dry_run: bool, backend: Backend) -> ApplySummary {
        let mut summary = ApplySummary::default();

        if dry_run {
            info!("Run without the --dry-run flag to create missing repositories and mirrors.");
            return summary;
        }

        for decision in plan {
            let repo = &decision.repo;

            if decision.create_target_repo {
                debug!("Creating GitHub repo for {}", repo.full_name);
                match self
                    .target
                    .create_repository(&NewRepository::mirror_of(repo))
                    .await
                {
                    Ok(created) => {
                        info!("GitHub repository created: {}", created.full_name);
                        summary.repos_created += 1;
                    }
                    Err(e) => {
                        error!("Error creating GitHub repository for {}: {}", repo.full_name, e);
                        summary.failures.push((repo.full_name.clone(), e.to_string()));
                        continue;
                    }
                }
            }

            if decision.create_mirror {
                debug!("Setting up mirror for {}", repo.full_name);
                match self.create_mirror(repo, backend, &mut summary).await {
                    Ok(()) => summary.mirrors_created += 1,
                    Err(e) => {
                        error!("Error setting up mirror for {}: {}", repo.full_name, e);
                        summary.failures.push((repo.full_name.clone(), e.to_string()));
                    }
                }
            }
        }

        summary
    }

    /// CLI first when selected, then the API exactly once; never the reverse
    async fn create_mirror(
        &self,
        repo: &RepositoryRef,
        backend: Backend,
        summary: &mut ApplySummary,
    ) -> Result<(), HostError> {
        let url = self.session.mirror_url(repo);
        let options = self.session.mirror_options();

        if let (Backend::ExternalCli, Some(cli)) = (backend, self.cli) {
            match cli.create_mirror(repo, &url, options).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(
                        "{} failed to set up mirror for {}: {}; falling back to {}",
                        cli.backend_name(),
                        repo.full_name,
                        e,
                        self.native.backend_name()
                    );
                    summary.fallbacks += 1;
                }
            }
        }

        self.native.create_mirror(repo, &url, options).await
    }
}
