//! glab CLI implementation of [`SourceHost`]
//!
//! Every operation shells out to `glab`, either through its generic `api`
//! passthrough or through `glab repo mirror`. Output is parsed into the same
//! records the API client produces.

use async_trait::async_trait;
use regex::Regex;
use serde::de::DeserializeOwned;
use std::io;
use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::process::Command as AsyncCommand;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::backend::CliProbe;
use crate::config::MirrorOptions;
use crate::discovery::{encode_path, redact_url, MirrorRecord, RepositoryRef, Shorthand, SourceHost};
use crate::error::HostError;
use crate::gitlab::{mirror_records, MirrorPayload, ProjectPayload, UserPayload};

const HOST: &str = "glab";

const PROJECTS_QUERY: &str = "projects?visibility=public&owned=true&archived=false";

/// Captured result of one CLI invocation
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Exit code, `None` when killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs the external program with a list of arguments
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, args: &[String]) -> io::Result<CommandOutput>;

    /// Program name for display/logging
    fn program(&self) -> &str;
}

/// Spawns a real subprocess with a timeout
pub struct ProcessRunner {
    program: String,
    timeout: Duration,
}

impl ProcessRunner {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, args: &[String]) -> io::Result<CommandOutput> {
        let shown: Vec<String> = args.iter().map(|a| redact_url(a)).collect();
        debug!("Running command: {} {}", self.program, shown.join(" "));

        let child = AsyncCommand::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = timeout(self.timeout, child).await.map_err(|_| {
            io::Error::new(
                io::ErrorKind::TimedOut,
                format!("{} timed out after {}s", self.program, self.timeout.as_secs()),
            )
        })??;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }

    fn program(&self) -> &str {
        &self.program
    }
}

/// GitLab operations through the glab CLI
pub struct GlabCli<R: CommandRunner = ProcessRunner> {
    runner: R,
}

impl GlabCli<ProcessRunner> {
    /// glab at `path`, each invocation bounded by `timeout`
    pub fn new(path: impl Into<String>, timeout: Duration) -> Self {
        Self::with_runner(ProcessRunner::new(path, timeout))
    }
}

impl<R: CommandRunner> GlabCli<R> {
    pub fn with_runner(runner: R) -> Self {
        Self { runner }
    }

    async fn run(&self, args: Vec<String>) -> Result<CommandOutput, HostError> {
        self.runner
            .run(&args)
            .await
            .map_err(|e| HostError::Unreachable {
                host: HOST,
                reason: format!("failed to execute {}: {}", self.runner.program(), e),
            })
    }

    fn failure(&self, output: &CommandOutput) -> HostError {
        let stderr = output.stderr.clone();
        if let Some(status @ (401 | 403)) = http_status(&stderr) {
            return HostError::Auth { host: HOST, status };
        }
        HostError::Cli {
            program: self.runner.program().to_string(),
            code: output
                .code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string()),
            stderr,
        }
    }

    /// `glab api <path> [--paginate]`
    async fn api(&self, path: &str, paginate: bool) -> Result<String, HostError> {
        let mut args = vec!["api".to_string(), path.to_string()];
        if paginate {
            args.push("--paginate".to_string());
        }

        let output = self.run(args).await?;
        if !output.success() {
            return Err(self.failure(&output));
        }
        Ok(output.stdout)
    }

    async fn current_username(&self) -> Result<String, HostError> {
        let user: UserPayload = parse_json(&self.api("user", false).await?)?;
        Ok(user.username)
    }
}

/// HTTP status glab reports in its error output
///
/// glab prints API failures as `404 Project Not Found (HTTP 404)` or
/// `401 Unauthorized`. Bare numbers (ids, paths) are not statuses.
pub fn http_status(stderr: &str) -> Option<u16> {
    static STATUS: OnceLock<Regex> = OnceLock::new();
    let re = STATUS.get_or_init(|| {
        Regex::new(r"\(HTTP (\d{3})\)|\b(4\d\d|5\d\d) (?:Unauthorized|Forbidden|(?:\w+ )?Not Found)\b")
            .expect("static regex is valid")
    });

    let captures = re.captures(stderr)?;
    captures
        .get(1)
        .or_else(|| captures.get(2))
        .and_then(|m| m.as_str().parse().ok())
}

/// Arguments for `glab repo mirror`
pub fn mirror_args(full_name: &str, url: &str, options: &MirrorOptions) -> Vec<String> {
    let mut args: Vec<String> = ["repo", "mirror", full_name, "--url", url]
        .iter()
        .map(|s| s.to_string())
        .collect();

    if options.allow_divergence {
        args.push("--allow-divergence".to_string());
    }
    if options.protected_branches_only {
        args.push("--protected-branches-only".to_string());
    }
    args.push("--direction".to_string());
    args.push(options.direction.as_str().to_string());
    if options.enabled {
        args.push("--enabled".to_string());
    }

    args
}

fn parse_json<T: DeserializeOwned>(stdout: &str) -> Result<T, HostError> {
    serde_json::from_str(stdout).map_err(|e| HostError::Malformed {
        host: HOST,
        reason: e.to_string(),
    })
}

/// Parse paginated output: one or more JSON arrays back to back
pub fn parse_json_pages<T: DeserializeOwned>(stdout: &str) -> Result<Vec<T>, HostError> {
    let mut items = Vec::new();
    for page in serde_json::Deserializer::from_str(stdout).into_iter::<Vec<T>>() {
        let page = page.map_err(|e| HostError::Malformed {
            host: HOST,
            reason: e.to_string(),
        })?;
        items.extend(page);
    }
    Ok(items)
}

#[async_trait]
impl<R: CommandRunner> SourceHost for GlabCli<R> {
    async fn list_repositories(&self) -> Result<Vec<RepositoryRef>, HostError> {
        debug!("Fetching public GitLab repositories with glab");
        let stdout = self.api(PROJECTS_QUERY, true).await?;
        let projects: Vec<ProjectPayload> = parse_json_pages(&stdout)?;

        info!("Found {} public GitLab repositories", projects.len());
        Ok(projects.into_iter().map(RepositoryRef::from).collect())
    }

    async fn get_repository(&self, shorthand: &Shorthand) -> Result<RepositoryRef, HostError> {
        let path = match &shorthand.namespace {
            Some(_) => shorthand.to_string(),
            None => shorthand.with_namespace(&self.current_username().await?),
        };

        match self.api(&format!("projects/{}", encode_path(&path)), false).await {
            Ok(stdout) => Ok(parse_json::<ProjectPayload>(&stdout)?.into()),
            Err(HostError::Cli { stderr, .. }) if http_status(&stderr) == Some(404) => {
                Err(HostError::NotFound { host: HOST, what: path })
            }
            Err(e) => Err(e),
        }
    }

    async fn list_mirrors(&self, repo: &RepositoryRef) -> Result<Vec<MirrorRecord>, HostError> {
        let stdout = self
            .api(&format!("projects/{}/remote_mirrors", repo.project_key()), false)
            .await?;
        let mirrors: Vec<MirrorPayload> = parse_json_pages(&stdout)?;
        Ok(mirror_records(mirrors))
    }

    async fn create_mirror(
        &self,
        repo: &RepositoryRef,
        url: &str,
        options: &MirrorOptions,
    ) -> Result<(), HostError> {
        let output = self.run(mirror_args(&repo.full_name, url, options)).await?;
        if !output.success() {
            return Err(self.failure(&output));
        }

        info!("Set up mirror for {} with glab", repo.full_name);
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "glab CLI"
    }
}

#[async_trait]
impl<R: CommandRunner> CliProbe for GlabCli<R> {
    async fn is_available(&self) -> bool {
        match self.runner.run(&["--version".to_string()]).await {
            Ok(output) if output.success() => {
                debug!("{} available: {}", self.runner.program(), output.stdout);
                true
            }
            Ok(output) => {
                warn!(
                    "{} --version exited with {:?}: {}",
                    self.runner.program(),
                    output.code,
                    output.stderr
                );
                false
            }
            Err(e) => {
                debug!("Error checking {}: {}", self.runner.program(), e);
                false
            }
        }
    }
}
