//! Main CLI application structure

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use super::output::Output;
use super::{exchange, node, query};
use crate::domain::NodeType;
use crate::storage::{Config, FsAdapter, LoadResult, OutputFormat, ProjectStore};

/// Environment variable holding the log filter (e.g. `hwtrack=debug`)
pub const LOG_ENV: &str = "HWTRACK_LOG";

#[derive(Parser)]
#[command(name = "hwt")]
#[command(author, version, about = "Local-first hardware project tracker")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Project directory
    #[arg(long, short = 'p', global = true, default_value = ".")]
    pub project: PathBuf,

    /// Output format (defaults to the global config's default_format)
    #[arg(long, short = 'f', global = true)]
    pub format: Option<OutputFormat>,

    /// Enable debug logging on stderr
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new project
    Init {
        /// Path to initialize (defaults to --project)
        path: Option<PathBuf>,
    },

    /// Create a node
    ///
    /// Examples:
    ///   hwt new task "Route the 5V rail" --tag power
    ///   hwt new module "Buck converter" --parent psu-board-1a2b3c4
    New {
        /// Node type (decision, component, task, note, subsystem, assembly, module)
        node_type: NodeType,

        /// Node title
        title: String,

        /// Containing subsystem, assembly or module
        #[arg(long)]
        parent: Option<String>,

        /// Tag (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// Validate every file and the dependency graph
    Check,

    /// Show blocked tasks
    Blocked,

    /// Show tasks ready to work on
    Ready,

    /// Show the longest chain of incomplete dependent tasks
    CriticalPath,

    /// Make a task depend on another node
    Depend {
        /// Task that will wait
        task: String,

        /// Node that must be finished first
        dependency: String,
    },

    /// Export the project
    #[command(subcommand)]
    Export(exchange::ExportCommands),

    /// Import a project into a new directory
    #[command(subcommand)]
    Import(exchange::ImportCommands),
}

/// Shared state for one command invocation
pub struct Session {
    pub root: PathBuf,
    pub output: Output,
    pub config: Config,
    pub store: ProjectStore<FsAdapter>,
}

impl Session {
    /// Loads the project, reporting skipped files as warnings
    pub fn load(&self) -> Result<LoadResult> {
        let result = self
            .store
            .load(&self.root)
            .with_context(|| format!("Failed to load project at {}", self.root.display()))?;
        if !self.output.is_json() {
            self.output.parse_errors(&result.parse_errors);
        }
        Ok(result)
    }
}

/// Makes a path absolute so the last segment names the project
pub fn resolve_path(path: &Path) -> Result<PathBuf> {
    if path.exists() {
        return path
            .canonicalize()
            .with_context(|| format!("Failed to resolve path: {}", path.display()));
    }
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    Ok(cwd.join(path))
}

fn init_tracing(verbose: bool, log_level: Option<&str>) {
    let fallback = || EnvFilter::new(log_level.unwrap_or("warn"));
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| fallback())
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Main entry point for the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let global = Config::load_global()?;
    init_tracing(cli.verbose, global.log_level.as_deref());

    let format = cli.format.unwrap_or(global.default_format);
    let root = match &cli.command {
        Commands::Init { path: Some(path) } => resolve_path(path)?,
        _ => resolve_path(&cli.project)?,
    };
    tracing::debug!(root = %root.display(), "Starting");

    let config = Config {
        project: Config::load_project_config(&root)?,
        global,
    };
    let session = Session {
        root,
        output: Output::new(format),
        config,
        store: ProjectStore::new(FsAdapter::new()),
    };

    match cli.command {
        Commands::Init { .. } => node::init(&session),
        Commands::New {
            node_type,
            title,
            parent,
            tags,
        } => node::create(&session, node_type, &title, parent, tags),
        Commands::Check => node::check(&session),
        Commands::Depend { task, dependency } => node::depend(&session, &task, &dependency),
        Commands::Blocked => query::blocked(&session),
        Commands::Ready => query::ready(&session),
        Commands::CriticalPath => query::critical_path(&session),
        Commands::Export(cmd) => exchange::export(&session, cmd),
        Commands::Import(cmd) => exchange::import(&session, cmd),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_new_with_tags() {
        let cli = Cli::try_parse_from([
            "hwt", "-p", "/tmp/x", "new", "task", "Wire it", "--tag", "a", "--tag", "b",
        ])
        .unwrap();
        match cli.command {
            Commands::New {
                node_type, tags, ..
            } => {
                assert_eq!(node_type, NodeType::Task);
                assert_eq!(tags, vec!["a", "b"]);
            }
            _ => panic!("expected new"),
        }
        assert_eq!(cli.project, PathBuf::from("/tmp/x"));
    }

    #[test]
    fn rejects_unknown_node_type() {
        assert!(Cli::try_parse_from(["hwt", "new", "gizmo", "X"]).is_err());
    }

    #[test]
    fn format_is_optional() {
        let cli = Cli::try_parse_from(["hwt", "ready"]).unwrap();
        assert_eq!(cli.format, None);
        let cli = Cli::try_parse_from(["hwt", "-f", "json", "ready"]).unwrap();
        assert_eq!(cli.format, Some(OutputFormat::Json));
    }
}
