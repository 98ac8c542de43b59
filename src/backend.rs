//! Backend selection for GitLab operations
//!
//! The backend is chosen once, before any reconciliation work, and stays fixed
//! for the whole run. The only other switch is the per-action fallback from
//! the CLI to the API in the executor.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Execution strategy for source-host operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub enum Backend {
    /// GitLab REST API
    #[default]
    #[serde(rename = "api")]
    NativeApi,
    /// glab CLI subprocess
    #[serde(rename = "cli")]
    ExternalCli,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::NativeApi => f.write_str("GitLab API"),
            Backend::ExternalCli => f.write_str("glab CLI"),
        }
    }
}

/// Liveness check for the external CLI
#[async_trait]
pub trait CliProbe: Send + Sync {
    async fn is_available(&self) -> bool;
}

/// Pick the backend for this run
///
/// Requesting the CLI only sticks if the probe succeeds; otherwise the run is
/// downgraded to the API with a warning.
pub async fn select(requested: Backend, probe: &dyn CliProbe) -> Backend {
    match requested {
        Backend::NativeApi => Backend::NativeApi,
        Backend::ExternalCli => {
            if probe.is_available().await {
                info!("Using glab CLI for GitLab operations");
                Backend::ExternalCli
            } else {
                warn!("glab CLI is not available, falling back to the GitLab API");
                Backend::NativeApi
            }
        }
    }
}
