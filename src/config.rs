use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::backend::Backend;

/// Merged run configuration for mirrormaker
///
/// Built once per run by [`Config::merge`]: built-in defaults, then the
/// persisted file, then per-run overrides (flags and `MIRRORMAKER_*`).
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    /// Requested backend for GitLab operations
    #[serde(default)]
    pub backend: Backend,

    /// Path to the glab executable
    #[serde(default = "default_cli_path")]
    pub cli_path: String,

    /// Timeout for a single glab invocation in seconds
    #[serde(default = "default_cli_timeout")]
    pub cli_timeout: u64,

    /// Options applied when configuring a mirror
    #[serde(default)]
    pub mirror: MirrorOptions,

    /// GitLab (source host) settings
    #[serde(default)]
    pub gitlab: GitLabConfig,

    /// GitHub (target host) settings
    #[serde(default)]
    pub github: GitHubConfig,

    /// Verbose logging
    #[serde(default)]
    pub verbose: bool,

    /// Print the plan without creating anything
    #[serde(default)]
    pub dry_run: bool,
}

/// Direction of a configured mirror
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MirrorDirection {
    #[default]
    Push,
    Pull,
}

impl MirrorDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            MirrorDirection::Push => "push",
            MirrorDirection::Pull => "pull",
        }
    }
}

/// Mirror options passed to the glab backend
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct MirrorOptions {
    #[serde(default)]
    pub direction: MirrorDirection,

    /// Allow divergent refs on the mirror
    #[serde(default)]
    pub allow_divergence: bool,

    /// Mirror protected branches only
    #[serde(default)]
    pub protected_branches_only: bool,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// GitLab configuration
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct GitLabConfig {
    /// Personal access token
    pub token: Option<String>,

    /// Base URL of the GitLab instance
    #[serde(default = "default_gitlab_url")]
    pub url: String,
}

/// GitHub configuration
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct GitHubConfig {
    /// Personal access token
    pub token: Option<String>,

    /// Owner of the mirrors (defaults to the GitLab namespace if null)
    pub username: Option<String>,

    /// REST API base URL
    #[serde(default = "default_github_api_url")]
    pub api_url: String,

    /// Host used in mirror destination URLs
    #[serde(default = "default_github_web_host")]
    pub web_host: String,
}

/// One configuration layer where every value is optional
///
/// Used for both the persisted file and the per-run overrides. A saved
/// [`Config`] reads back as a layer with every field set.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ConfigLayer {
    pub backend: Option<Backend>,
    pub cli_path: Option<String>,
    pub cli_timeout: Option<u64>,
    pub mirror: MirrorLayer,
    pub gitlab: GitLabLayer,
    pub github: GitHubLayer,
    pub verbose: Option<bool>,
    pub dry_run: Option<bool>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct MirrorLayer {
    pub direction: Option<MirrorDirection>,
    pub allow_divergence: Option<bool>,
    pub protected_branches_only: Option<bool>,
    pub enabled: Option<bool>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct GitLabLayer {
    pub token: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct GitHubLayer {
    pub token: Option<String>,
    pub username: Option<String>,
    pub api_url: Option<String>,
    pub web_host: Option<String>,
}

// Default value functions
fn default_true() -> bool {
    true
}
fn default_cli_path() -> String {
    "glab".to_string()
}
fn default_cli_timeout() -> u64 {
    120
}
fn default_gitlab_url() -> String {
    "https://gitlab.com".to_string()
}
fn default_github_api_url() -> String {
    "https://api.github.com".to_string()
}
fn default_github_web_host() -> String {
    "github.com".to_string()
}

// Default implementations
impl Default for MirrorOptions {
    fn default() -> Self {
        Self {
            direction: MirrorDirection::default(),
            allow_divergence: false,
            protected_branches_only: false,
            enabled: default_true(),
        }
    }
}

impl Default for GitLabConfig {
    fn default() -> Self {
        Self {
            token: None,
            url: default_gitlab_url(),
        }
    }
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            username: None,
            api_url: default_github_api_url(),
            web_host: default_github_web_host(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            cli_path: default_cli_path(),
            cli_timeout: default_cli_timeout(),
            mirror: MirrorOptions::default(),
            gitlab: GitLabConfig::default(),
            github: GitHubConfig::default(),
            verbose: false,
            dry_run: false,
        }
    }
}

/// Empty strings in a layer mean "not set" (tokens are often saved as "")
fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.trim().is_empty()).cloned()
}

impl Config {
    /// Merge the three configuration layers, highest precedence last
    pub fn merge(file: &ConfigLayer, overrides: &ConfigLayer) -> Self {
        let mut config = Self::default();
        config.apply(file);
        config.apply(overrides);
        config
    }

    /// Overlay every value set in `layer` onto this config
    pub fn apply(&mut self, layer: &ConfigLayer) {
        if let Some(backend) = layer.backend {
            self.backend = backend;
        }
        if let Some(path) = non_empty(&layer.cli_path) {
            self.cli_path = path;
        }
        if let Some(timeout) = layer.cli_timeout {
            self.cli_timeout = timeout;
        }

        let mirror = &layer.mirror;
        if let Some(direction) = mirror.direction {
            self.mirror.direction = direction;
        }
        if let Some(value) = mirror.allow_divergence {
            self.mirror.allow_divergence = value;
        }
        if let Some(value) = mirror.protected_branches_only {
            self.mirror.protected_branches_only = value;
        }
        if let Some(value) = mirror.enabled {
            self.mirror.enabled = value;
        }

        if let Some(token) = non_empty(&layer.gitlab.token) {
            self.gitlab.token = Some(token);
        }
        if let Some(url) = non_empty(&layer.gitlab.url) {
            self.gitlab.url = url;
        }

        if let Some(token) = non_empty(&layer.github.token) {
            self.github.token = Some(token);
        }
        if let Some(username) = non_empty(&layer.github.username) {
            self.github.username = Some(username);
        }
        if let Some(url) = non_empty(&layer.github.api_url) {
            self.github.api_url = url;
        }
        if let Some(host) = non_empty(&layer.github.web_host) {
            self.github.web_host = host;
        }

        if let Some(verbose) = layer.verbose {
            self.verbose = verbose;
        }
        if let Some(dry_run) = layer.dry_run {
            self.dry_run = dry_run;
        }
    }

    /// Load the persisted layer from a file; a missing file is an empty layer
    pub fn load_layer(path: &Path) -> Result<ConfigLayer> {
        if !path.exists() {
            tracing::debug!("Config file {:?} not found, using defaults", path);
            return Ok(ConfigLayer::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        if content.trim().is_empty() {
            return Ok(ConfigLayer::default());
        }

        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        // The file holds tokens
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
                .with_context(|| format!("Failed to restrict permissions on {:?}", path))?;
        }

        Ok(())
    }

    /// Get the default configuration file path (XDG compliant)
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = config_dir().context("Failed to get user config directory")?;

        Ok(config_dir.join("mirrormaker").join("config.yml"))
    }

    /// glab path with `~` and environment variables expanded
    pub fn expanded_cli_path(&self) -> Result<String> {
        Ok(shellexpand::full(&self.cli_path)
            .context("Failed to expand cli_path")?
            .into_owned())
    }
}
