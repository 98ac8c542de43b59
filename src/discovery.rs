//! Repository discovery abstraction layer
//!
//! Host-agnostic repository and mirror records plus the two capability traits
//! the engine works against: [`SourceHost`] (where mirrors are configured) and
//! [`TargetHost`] (where mirror destinations live). Host JSON is converted into
//! these records at the client boundary, nothing loosely typed travels inward.

use async_trait::async_trait;
use std::fmt;

use crate::config::MirrorOptions;
use crate::error::HostError;

/// Snapshot of a repository on one host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryRef {
    /// Host id, if known
    pub id: Option<u64>,

    /// Path with namespace (e.g. "group/project"), unique per host
    pub full_name: String,

    /// Short name / path segment (e.g. "project")
    pub slug: String,

    /// Namespace path (GitLab) or owner login (GitHub)
    pub namespace: String,

    /// Owner username, when the host reports one
    pub owner: Option<String>,

    pub description: Option<String>,

    pub web_url: String,

    /// Whether the repository is a fork
    pub fork: bool,
}

impl RepositoryRef {
    /// Username a mirror of this repository lands under when none is configured
    ///
    /// Namespace path first, owner username second.
    pub fn fallback_owner(&self) -> &str {
        if !self.namespace.is_empty() {
            &self.namespace
        } else {
            self.owner.as_deref().unwrap_or_default()
        }
    }

    /// Key used to address the project in API paths (id or encoded path)
    pub fn project_key(&self) -> String {
        match self.id {
            Some(id) => id.to_string(),
            None => encode_path(&self.full_name),
        }
    }
}

/// A push mirror configured on a source repository
#[derive(Clone, PartialEq, Eq)]
pub struct MirrorRecord {
    /// Destination URL, possibly carrying credentials
    pub url: String,
    pub enabled: bool,
}

impl fmt::Debug for MirrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MirrorRecord")
            .field("url", &redact_url(&self.url))
            .field("enabled", &self.enabled)
            .finish()
    }
}

impl fmt::Display for MirrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&redact_url(&self.url))
    }
}

/// Replace the userinfo part of a URL so it can be logged
pub fn redact_url(url: &str) -> String {
    let (scheme, rest) = match url.find("://") {
        Some(pos) => url.split_at(pos + 3),
        None => ("", url),
    };
    let authority_end = rest.find('/').unwrap_or(rest.len());
    match rest[..authority_end].rfind('@') {
        Some(at) => format!("{}***@{}", scheme, &rest[at + 1..]),
        None => url.to_string(),
    }
}

/// Percent-encode the slashes of a project path for use as a single API segment
pub fn encode_path(path: &str) -> String {
    path.replace('/', "%2F")
}

/// Repository identifier given as "name" or "namespace/name"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shorthand {
    /// Explicit namespace; `None` means the authenticated user
    pub namespace: Option<String>,
    pub name: String,
}

impl Shorthand {
    pub fn parse(input: &str) -> Self {
        let input = input.trim().trim_matches('/');
        match input.rsplit_once('/') {
            Some((namespace, name)) => Self {
                namespace: Some(namespace.to_string()),
                name: name.to_string(),
            },
            None => Self {
                namespace: None,
                name: input.to_string(),
            },
        }
    }

    /// Full path, using `default_namespace` for a bare name
    pub fn with_namespace(&self, default_namespace: &str) -> String {
        match &self.namespace {
            Some(namespace) => format!("{}/{}", namespace, self.name),
            None => format!("{}/{}", default_namespace, self.name),
        }
    }
}

impl fmt::Display for Shorthand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(namespace) => write!(f, "{}/{}", namespace, self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// Host where repositories originate and mirrors are configured
///
/// Implemented by the GitLab API client and by the glab CLI wrapper; both
/// must return the same logical shapes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SourceHost: Send + Sync {
    /// Public, owned, non-archived repositories of the authenticated user
    async fn list_repositories(&self) -> Result<Vec<RepositoryRef>, HostError>;

    /// Resolve a single repository from a shorthand
    async fn get_repository(&self, shorthand: &Shorthand) -> Result<RepositoryRef, HostError>;

    /// Mirrors currently configured on a repository
    async fn list_mirrors(&self, repo: &RepositoryRef) -> Result<Vec<MirrorRecord>, HostError>;

    /// Configure a push mirror of `repo` pointing at `url`
    async fn create_mirror(
        &self,
        repo: &RepositoryRef,
        url: &str,
        options: &MirrorOptions,
    ) -> Result<(), HostError>;

    /// Backend name for display/logging
    fn backend_name(&self) -> &'static str;
}

/// Parameters for creating the destination repository
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct NewRepository {
    pub name: String,
    pub description: String,
    pub homepage: String,
    pub private: bool,
    pub has_wiki: bool,
    pub has_projects: bool,
}

impl NewRepository {
    /// Marker appended to the description of every created repository
    pub const MIRROR_MARKER: &'static str = "[mirror]";

    /// Public repository named after the source slug
    pub fn mirror_of(source: &RepositoryRef) -> Self {
        let description = source.description.as_deref().unwrap_or_default();
        Self {
            name: source.slug.clone(),
            description: format!("{} {}", description, Self::MIRROR_MARKER),
            homepage: source.web_url.clone(),
            private: false,
            has_wiki: false,
            has_projects: false,
        }
    }
}

/// Host where mirror destinations are created
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TargetHost: Send + Sync {
    /// Public, non-fork repositories of the authenticated user
    async fn list_public_repositories(&self) -> Result<Vec<RepositoryRef>, HostError>;

    async fn create_repository(&self, request: &NewRepository) -> Result<RepositoryRef, HostError>;
}
