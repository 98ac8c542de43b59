//! Error types shared by the host clients and the sync engine.
//!
//! [`HostError`] describes a single failed call against a host (HTTP or CLI).
//! Whether it is fatal depends on where it happens: the engine contains it
//! per repository, and only the snapshot listings turn it into a [`RunError`].

use thiserror::Error;

/// Failure of a single call against the source or target host
#[derive(Debug, Error)]
pub enum HostError {
    /// Network or transport failure (connection refused, timeout, ...)
    #[error("{host} is unreachable: {reason}")]
    Unreachable { host: &'static str, reason: String },

    /// 401/403-class rejection of the credentials
    #[error("{host} rejected the credentials (HTTP {status})")]
    Auth { host: &'static str, status: u16 },

    /// A specific repository could not be resolved
    #[error("{host}: repository '{what}' not found")]
    NotFound { host: &'static str, what: String },

    /// Any other non-2xx response
    #[error("{host} returned HTTP {status}: {body}")]
    Status {
        host: &'static str,
        status: u16,
        body: String,
    },

    /// The host answered with a shape we don't understand
    #[error("unexpected response from {host}: {reason}")]
    Malformed { host: &'static str, reason: String },

    /// The external CLI exited unsuccessfully
    #[error("{program} exited with {code}: {stderr}")]
    Cli {
        program: String,
        code: String,
        stderr: String,
    },
}

impl HostError {
    /// Map a non-2xx HTTP status into the taxonomy
    pub fn from_status(host: &'static str, status: u16, body: impl Into<String>) -> Self {
        match status {
            401 | 403 => Self::Auth { host, status },
            _ => Self::Status {
                host,
                status,
                body: body.into(),
            },
        }
    }
}

/// The single error type that aborts a run
#[derive(Debug, Error)]
pub enum RunError {
    #[error("missing {host} token; pass --{flag} or set MIRRORMAKER_{env}")]
    MissingToken {
        host: &'static str,
        flag: &'static str,
        env: &'static str,
    },

    #[error("failed to fetch {what}")]
    Snapshot {
        what: String,
        #[source]
        source: HostError,
    },

    #[error("failed to set up the {host} client")]
    Setup {
        host: &'static str,
        #[source]
        source: HostError,
    },
}
