//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use couchpack_core::pipeline::{BuildConfig, BuildResult, ProgressReporter, build_all};
use couchpack_loader::{Bundle, LoadInput, LoadKind, default_loader};
use couchpack_shared::{ProjectConfig, init_config, load_config, resolve_config_path};
use serde_json::{Map, Value};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// couchpack: build CouchDB design documents from directory trees.
#[derive(Parser)]
#[command(
    name = "couchpack",
    version,
    about = "Assemble CouchDB design documents from views, lists, shows and attachments on disk.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ./couchpack.toml, then ~/.couchpack/couchpack.toml).
    #[arg(short, long, env = "COUCHPACK_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Project root (defaults to the current directory).
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Build design documents and write them to the output directory.
    Build {
        /// Only build this design document.
        #[arg(long)]
        ddoc: Option<String>,

        /// Assemble and validate without writing.
        #[arg(long)]
        dry_run: bool,
    },

    /// Load a single path and print the resulting JSON.
    Inspect {
        /// Path to load, relative to the project root.
        path: String,

        /// Load kind: files, modules, json, or attachments.
        #[arg(short, long)]
        kind: Option<String>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "couchpack=info",
        1 => "couchpack=debug",
        _ => "couchpack=trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) fn run(cli: Cli) -> Result<()> {
    let root = match cli.root {
        Some(root) => root,
        None => std::env::current_dir()
            .map_err(|e| eyre!("cannot determine working directory: {e}"))?,
    };
    let config = cli.config.as_deref();

    match cli.command {
        Command::Build { ddoc, dry_run } => cmd_build(&root, config, ddoc, dry_run),
        Command::Inspect { path, kind } => cmd_inspect(&root, config, &path, kind.as_deref()),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(&root),
            ConfigAction::Show => cmd_config_show(&root, config),
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn cmd_build(root: &Path, config: Option<&Path>, only: Option<String>, dry_run: bool) -> Result<()> {
    let project = load_config(config, root)?;
    let build_config = BuildConfig {
        root: root.to_path_buf(),
        project,
        only,
        dry_run,
    };

    info!(root = %root.display(), dry_run, "building design documents");

    let results = build_all(&build_config, default_loader(), &CliProgress)?;

    println!();
    println!("  Built {} design document(s)", results.len());
    if dry_run {
        println!("  (dry run, nothing written)");
    }
    println!();
    Ok(())
}

fn cmd_inspect(root: &Path, config: Option<&Path>, path: &str, kind: Option<&str>) -> Result<()> {
    let project = load_config(config, root)?;
    let input = match kind {
        Some(kind) => LoadInput::tagged(kind.parse::<LoadKind>()?, path),
        None => LoadInput::from(path),
    };

    let mut extra = Map::new();
    extra.insert("locals".to_string(), Value::Object(project.locals));

    let mut bundle = Bundle::default();
    default_loader().load_in(root, &mut bundle, &input, Some(&extra))?;
    println!("{}", serde_json::to_string_pretty(&bundle)?);
    Ok(())
}

fn cmd_config_init(root: &Path) -> Result<()> {
    let path = init_config(root)?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(root: &Path, config: Option<&Path>) -> Result<()> {
    match resolve_config_path(config, root) {
        Some(path) => println!("# {}", path.display()),
        None => println!("# no config file found, showing defaults"),
    }
    let config: ProjectConfig = load_config(config, root)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// Prints one line per built design document.
struct CliProgress;

impl ProgressReporter for CliProgress {
    fn started(&self, name: &str) {
        println!("  building _design/{name}");
    }

    fn built(&self, result: &BuildResult) {
        match &result.output_path {
            Some(path) => println!(
                "  wrote {} ({} attachments)",
                path.display(),
                result.attachment_count
            ),
            None => println!(
                "  checked _design/{} ({} attachments)",
                result.name, result.attachment_count
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_build_flags() {
        let cli = Cli::try_parse_from(["couchpack", "-vv", "build", "--ddoc", "blog", "--dry-run"])
            .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Build { ddoc, dry_run } => {
                assert_eq!(ddoc.as_deref(), Some("blog"));
                assert!(dry_run);
            }
            _ => panic!("expected build"),
        }
    }

    #[test]
    fn parses_inspect_with_kind() {
        let cli = Cli::try_parse_from(["couchpack", "inspect", "views", "--kind", "modules"])
            .unwrap();
        match cli.command {
            Command::Inspect { path, kind } => {
                assert_eq!(path, "views");
                assert_eq!(kind.as_deref(), Some("modules"));
            }
            _ => panic!("expected inspect"),
        }
    }

    #[test]
    fn global_config_flag_after_subcommand() {
        let cli = Cli::try_parse_from(["couchpack", "config", "show", "--config", "alt.toml"])
            .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("alt.toml")));
        assert!(matches!(
            cli.command,
            Command::Config {
                action: ConfigAction::Show
            }
        ));
    }
}
