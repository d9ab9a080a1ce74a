use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};

use tvm::activate::use_version;
use tvm::http::HttpClient;
use tvm::install::{InstallOutcome, install_all};
use tvm::platform::Platform;
use tvm::release::ReleaseClient;
use tvm::remove::{RemoveScope, remove};
use tvm::runtime::{RealRuntime, Runtime};
use tvm::store::VersionStore;
use tvm::version::Version;

/// tvm - Terraform Version Manager
///
/// Install specific Terraform versions, switch between them, and clean up
/// old ones. Installed versions live under the store root (default ~/.tvm),
/// and the selected one is exposed through the `active` symlink.
///
/// Examples:
///   tvm install 1.6.4        # Install Terraform 1.6.4
///   tvm use 1.6.4            # Make 1.6.4 the active version
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Store root directory (overrides the default ~/.tvm; also via TVM_ROOT)
    #[arg(
        long = "root",
        short = 'r',
        env = "TVM_ROOT",
        value_name = "PATH",
        global = true
    )]
    pub store_root: Option<PathBuf>,

    /// Release server URL (defaults to https://releases.hashicorp.com/terraform)
    #[arg(long = "releases-url", value_name = "URL", global = true)]
    pub releases_url: Option<String>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Install one or more Terraform versions
    Install(InstallArgs),

    /// Select the active Terraform version
    Use(UseArgs),

    /// List installed versions
    List,

    /// Remove installed versions
    Remove {
        #[command(subcommand)]
        scope: RemoveCommand,
    },
}

#[derive(clap::Args, Debug)]
pub struct InstallArgs {
    /// Exact versions to install, e.g. "1.6.4"
    #[arg(value_name = "VERSION", required = true)]
    pub versions: Vec<String>,
}

#[derive(clap::Args, Debug)]
pub struct UseArgs {
    /// The version to activate
    #[arg(value_name = "VERSION")]
    pub version: String,
}

#[derive(clap::Subcommand, Debug)]
enum RemoveCommand {
    /// Remove every version except the active one
    Unused,

    /// Remove every installed version
    All {
        /// Also remove the active link if a version is currently active
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let runtime = RealRuntime;

    let root = match cli.store_root {
        Some(path) => path,
        None => default_store_root(&runtime)?,
    };
    let store = VersionStore::new(&runtime, root);

    match cli.command {
        Commands::Install(args) => {
            let versions = parse_versions(&args.versions)?;
            let platform = Platform::detect();
            let http = HttpClient::default();
            let fetcher = match cli.releases_url {
                Some(url) => ReleaseClient::with_base_url(http, url),
                None => ReleaseClient::new(http),
            };

            let reports = install_all(&store, &fetcher, &platform, &versions).await;
            let mut failures = 0;
            for report in &reports {
                match &report.result {
                    Ok(InstallOutcome::Installed) => {
                        println!("Installed terraform {}", report.version);
                    }
                    Ok(InstallOutcome::AlreadyInstalled) => {
                        println!("terraform {} is already installed", report.version);
                    }
                    Err(e) => {
                        eprintln!("terraform {}: {}", report.version, e);
                        failures += 1;
                    }
                }
            }
            if failures > 0 {
                std::process::exit(1);
            }
        }
        Commands::Use(args) => {
            let version: Version = args
                .version
                .parse()
                .with_context(|| format!("Cannot parse version '{}'", args.version))?;
            use_version(&store, &version)?;
            println!("terraform {} is now active", version);
            warn_if_root_not_on_path(&runtime, store.root());
        }
        Commands::List => {
            let entries = tvm::list::list(&store)?;
            if entries.is_empty() {
                println!("No versions installed.");
            } else {
                println!("{:<8} {:<15}", "ACTIVE", "VERSION");
                for entry in entries {
                    let marker = if entry.is_active { "  *" } else { "" };
                    println!("{:<8} {:<15}", marker, entry.version.to_string());
                }
            }
        }
        Commands::Remove { scope } => {
            let scope = match scope {
                RemoveCommand::Unused => RemoveScope::Unused,
                RemoveCommand::All { force } => RemoveScope::All { force },
            };
            let reports = remove(&store, scope)?;
            if reports.is_empty() {
                println!("Nothing to remove.");
            }
            let mut failures = 0;
            for report in &reports {
                match &report.result {
                    Ok(()) => println!("Removed terraform {}", report.version),
                    Err(e) => {
                        eprintln!("terraform {}: {}", report.version, e);
                        failures += 1;
                    }
                }
            }
            if failures > 0 {
                std::process::exit(1);
            }
        }
    }
    Ok(())
}

/// Default store root: ~/.tvm
fn default_store_root<R: Runtime>(runtime: &R) -> Result<PathBuf> {
    let home_dir = runtime
        .home_dir()
        .context("Could not find home directory")?;
    Ok(home_dir.join(".tvm"))
}

fn parse_versions(tokens: &[String]) -> Result<Vec<Version>> {
    tokens
        .iter()
        .map(|t| {
            t.parse::<Version>()
                .with_context(|| format!("Cannot parse version '{}'", t))
        })
        .collect()
}

/// Remind the user to put the store root on PATH so the active link
/// resolves from their shell.
fn warn_if_root_not_on_path<R: Runtime>(runtime: &R, root: &Path) {
    let Ok(path) = runtime.env_var("PATH") else {
        return;
    };
    if std::env::split_paths(&path).any(|entry| entry == root) {
        return;
    }
    println!();
    println!("Warning: the store root is not on PATH.");
    println!("Add it to use the active Terraform version directly:");
    println!("\texport PATH=\"{}:$PATH\"", root.display());
}
