use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mirrormaker::config::{GitHubLayer, GitLabLayer, MirrorLayer};
use mirrormaker::report::{apply_summary, summary_table};
use mirrormaker::{Backend, Config, ConfigLayer, MirrorDirection, Shorthand, SyncEngine};

#[derive(Parser)]
#[command(name = "mirrormaker")]
#[command(about = "Mirror public GitLab repositories to GitHub")]
#[command(version)]
struct Cli {
    /// Repository to mirror (`name` or `namespace/name`); all public repositories if omitted
    repo: Option<String>,

    /// GitHub personal access token
    #[arg(long, env = "MIRRORMAKER_GITHUB_TOKEN", hide_env_values = true)]
    github_token: Option<String>,

    /// GitLab personal access token
    #[arg(long, env = "MIRRORMAKER_GITLAB_TOKEN", hide_env_values = true)]
    gitlab_token: Option<String>,

    /// GitHub username that owns the mirrors (defaults to the GitLab namespace)
    #[arg(long, env = "MIRRORMAKER_GITHUB_USER")]
    github_user: Option<String>,

    /// Print the plan without creating anything
    #[arg(long, env = "MIRRORMAKER_DRY_RUN")]
    dry_run: bool,

    #[arg(long, conflicts_with = "dry_run")]
    no_dry_run: bool,

    /// Verbose logging
    #[arg(short, long, env = "MIRRORMAKER_VERBOSE")]
    verbose: bool,

    /// Use the glab CLI for GitLab operations
    #[arg(long, env = "MIRRORMAKER_USE_GLAB")]
    use_glab: bool,

    #[arg(long, conflicts_with = "use_glab")]
    no_use_glab: bool,

    /// Path to the glab executable
    #[arg(long, env = "MIRRORMAKER_GLAB_PATH")]
    glab_path: Option<String>,

    /// Mirror direction passed to glab
    #[arg(long, value_enum, env = "MIRRORMAKER_GLAB_MIRROR_DIRECTION")]
    glab_mirror_direction: Option<MirrorDirection>,

    /// Allow divergent refs on the mirror
    #[arg(long, env = "MIRRORMAKER_GLAB_ALLOW_DIVERGENCE")]
    glab_allow_divergence: bool,

    #[arg(long, conflicts_with = "glab_allow_divergence")]
    no_glab_allow_divergence: bool,

    /// Mirror protected branches only
    #[arg(long, env = "MIRRORMAKER_GLAB_PROTECTED_BRANCHES_ONLY")]
    glab_protected_branches_only: bool,

    #[arg(long, conflicts_with = "glab_protected_branches_only")]
    no_glab_protected_branches_only: bool,

    /// Persist the merged configuration to the config file
    #[arg(long)]
    save_config: bool,

    /// Configuration file path (defaults to XDG config location)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

/// `--flag` / `--no-flag` pair; neither means "not set on this run"
fn flag_pair(yes: bool, no: bool) -> Option<bool> {
    match (yes, no) {
        (_, true) => Some(false),
        (true, false) => Some(true),
        (false, false) => None,
    }
}

impl Cli {
    /// Per-run override layer built from flags and environment
    fn overrides(&self) -> ConfigLayer {
        ConfigLayer {
            backend: flag_pair(self.use_glab, self.no_use_glab).map(|use_glab| {
                if use_glab {
                    Backend::ExternalCli
                } else {
                    Backend::NativeApi
                }
            }),
            cli_path: self.glab_path.clone(),
            cli_timeout: None,
            mirror: MirrorLayer {
                direction: self.glab_mirror_direction,
                allow_divergence: flag_pair(self.glab_allow_divergence, self.no_glab_allow_divergence),
                protected_branches_only: flag_pair(
                    self.glab_protected_branches_only,
                    self.no_glab_protected_branches_only,
                ),
                enabled: None,
            },
            gitlab: GitLabLayer {
                token: self.gitlab_token.clone(),
                url: None,
            },
            github: GitHubLayer {
                token: self.github_token.clone(),
                username: self.github_user.clone(),
                api_url: None,
                web_host: None,
            },
            verbose: self.verbose.then_some(true),
            dry_run: flag_pair(self.dry_run, self.no_dry_run),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => Config::default_config_path()?,
    };
    let file_layer = Config::load_layer(&config_path)?;
    let config = Config::merge(&file_layer, &cli.overrides());

    init_logging(config.verbose)?;
    info!("Starting mirrormaker v{}", env!("CARGO_PKG_VERSION"));

    if cli.save_config {
        config.save(&config_path)?;
        info!("Configuration saved to: {:?}", config_path);
    }

    let single = cli.repo.as_deref().map(Shorthand::parse);
    cmd_sync(&config, single.as_ref()).await
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    Ok(())
}

/// Plan, print and apply one run
async fn cmd_sync(config: &Config, single: Option<&Shorthand>) -> Result<()> {
    let engine = SyncEngine::from_config(config).await?;
    info!("Using {} for GitLab operations", engine.backend());

    let plan = engine.plan(single).await?;
    if plan.is_empty() {
        return Ok(());
    }

    println!("{}", summary_table(&plan));

    let applied = engine.apply(&plan).await;
    if !config.dry_run {
        println!("\n{}", apply_summary(&applied));
    }

    Ok(())
}
