//! mirrormaker - Mirror public GitLab repositories to GitHub
//!
//! mirrormaker reconciles the public repositories of a GitLab account with a
//! GitHub account: it creates missing GitHub repositories and configures
//! GitLab push mirrors pointing at them. Runs are idempotent; a second run
//! over an unchanged world plans nothing.
//!
//! ## Core Features
//!
//! - **Two GitLab backends**: the REST API or the `glab` CLI, with per-action
//!   fallback from the CLI to the API
//! - **Dry runs**: print the plan without touching either host
//! - **Configuration Management**: YAML file layered under flags and
//!   `MIRRORMAKER_*` environment variables
//!
//! ## Modules
//!
//! - [`config`]: Configuration layers and persistence
//! - [`discovery`]: Repository records and the host traits
//! - [`gitlab`] / [`glab`]: the two source-host backends
//! - [`github`]: the target host
//! - [`reconcile`]: action planning
//! - [`executor`]: applying a plan
//! - [`sync`]: one complete run

pub mod backend;
pub mod config;
pub mod discovery;
pub mod error;
pub mod executor;
pub mod github;
pub mod gitlab;
pub mod glab;
pub mod reconcile;
pub mod report;
pub mod session;
pub mod sync;

pub use backend::Backend;
pub use config::{Config, ConfigLayer, MirrorDirection, MirrorOptions};
pub use discovery::{MirrorRecord, NewRepository, RepositoryRef, Shorthand, SourceHost, TargetHost};
pub use error::{HostError, RunError};
pub use executor::ApplySummary;
pub use github::GitHubClient;
pub use gitlab::GitLabApi;
pub use glab::GlabCli;
pub use reconcile::ActionDecision;
pub use session::Session;
pub use sync::{SyncEngine, SyncSummary};
