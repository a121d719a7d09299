//! stitch - Main Entry Point

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use stitch_engine::config::CONFIG_FILE;
use stitch_engine::{sweep_orphaned_workspaces, BuildOutcome, DevServer, ProjectConfig, WorkspaceManager};
use tracing_subscriber::EnvFilter;

/// Build component-based static sites.
#[derive(Parser, Debug)]
#[command(name = "stitch", version)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build the site once into the target directory
    Build(ProjectArgs),

    /// Build, serve the target directory, and rebuild on change
    Dev {
        #[command(flatten)]
        project: ProjectArgs,

        #[arg(long)]
        host: Option<String>,

        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run a sandbox wrapper program (used internally by builds)
    #[command(hide = true)]
    Sandbox { file: PathBuf },
}

#[derive(Args, Debug)]
struct ProjectArgs {
    /// Project directory holding stitch.json
    #[arg(long, default_value = ".")]
    project: PathBuf,

    /// Config file (default: <project>/stitch.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Source directory
    #[arg(short, long)]
    source: Option<PathBuf>,

    /// Target directory
    #[arg(short, long)]
    target: Option<PathBuf>,

    /// Ask the bundler to minify
    #[arg(long)]
    minify: bool,
}

impl ProjectArgs {
    /// Config file values with command-line flags on top
    fn load(&self) -> Result<ProjectConfig> {
        let mut config = match &self.config {
            Some(path) => ProjectConfig::load(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => ProjectConfig::discover(&self.project)
                .with_context(|| format!("loading {}", self.project.join(CONFIG_FILE).display()))?,
        };
        config.build = config.build.relative_to(&self.project);
        if let Some(source) = &self.source {
            config.build.source_dir = source.clone();
        }
        if let Some(target) = &self.target {
            config.build.target_dir = target.clone();
        }
        if self.minify {
            config.build.minify = true;
        }
        Ok(config)
    }
}

fn init_logging(verbose: bool, sandbox: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if sandbox {
        // Captured by the host build
        builder.with_writer(std::io::stderr).with_ansi(false).without_time().init();
    } else {
        builder.init();
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, matches!(cli.command, Commands::Sandbox { .. }));

    match cli.command {
        Commands::Build(project) => build(project),
        Commands::Dev { project, host, port } => dev(project, host, port),
        Commands::Sandbox { file } => {
            stitch_js::run_file(&file).with_context(|| format!("sandbox program {}", file.display()))
        }
    }
}

fn build(project: ProjectArgs) -> Result<()> {
    let config = project.load()?;
    sweep_orphaned_workspaces(&config.build.workspace_root())?;

    match smol::block_on(WorkspaceManager::new(config.build).build())? {
        BuildOutcome::Built(_) => Ok(()),
        BuildOutcome::Skipped => bail!("nothing was built"),
    }
}

fn dev(project: ProjectArgs, host: Option<String>, port: Option<u16>) -> Result<()> {
    let mut config = project.load()?;
    if let Some(host) = host {
        config.dev.host = host;
    }
    if let Some(port) = port {
        config.dev.port = port;
    }

    let (stop, stopped) = smol::channel::bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = stop.try_send(());
    })
    .context("installing Ctrl-C handler")?;

    smol::block_on(async {
        let server = DevServer::new(config.build, config.dev).start().await?;
        tracing::info!("Press Ctrl-C to stop");
        server
            .serve_until(async {
                let _ = stopped.recv().await;
            })
            .await
    })?;
    Ok(())
}
