//! `codemanager` binary.

use anyhow::{Context, Result};
use clap::Parser;
use codemanager_cli::commands::{self, Cli, Commands};
use codemanager_cli::{Manifest, Settings};
use codemanager_directory_watcher::StopOutcome;
use std::path::PathBuf;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let settings = cli.settings()?;
    run(settings, cli.command).await
}

/// Log to stderr so command output on stdout stays clean. `RUST_LOG`
/// overrides the default level.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(settings: Settings, command: Commands) -> Result<()> {
    let message = match command {
        Commands::Watch { root, .. } => return watch(settings, root).await,
        Commands::AddFile { paths } => {
            blocking(move || {
                let outcome = commands::add_files(&settings, &paths)?;
                Ok(format!(
                    "Files added: {}. Skipped (already present): {}. Not found: {}.",
                    outcome.added,
                    outcome.skipped,
                    outcome.failed.len()
                ))
            })
            .await?
        }
        Commands::AddFolder {
            paths,
            exts,
            no_recursive,
        } => {
            blocking(move || {
                let recursive = settings.recursive && !no_recursive;
                let outcome =
                    commands::add_folders(&settings, &paths, exts.as_deref(), recursive)?;
                Ok(format!(
                    "Folders added: {}. Skipped (already present): {}. Not found: {}.",
                    outcome.added,
                    outcome.skipped,
                    outcome.failed.len()
                ))
            })
            .await?
        }
        Commands::RemoveFile { path } => {
            blocking(move || Ok(format!("Removed: {}", commands::remove_file(&settings, &path)?)))
                .await?
        }
        Commands::RemoveFolder { path } => {
            blocking(move || {
                Ok(format!(
                    "Removed: {}",
                    commands::remove_folder(&settings, &path)?
                ))
            })
            .await?
        }
        Commands::List => {
            blocking(move || Ok(commands::render_listing(&Manifest::load(&settings.manifest))))
                .await?
        }
        Commands::Compile => {
            blocking(move || {
                Ok(match commands::compile(&settings)? {
                    Some(report) => format!(
                        "Compiled {} files ({} bytes) in {}ms into {}",
                        report.files_written,
                        report.codefile_bytes,
                        report.duration_ms,
                        settings.output_dir().display()
                    ),
                    None => "Nothing to compile. Add files or folders first.".to_string(),
                })
            })
            .await?
        }
    };

    println!("{message}");
    Ok(())
}

/// Run a synchronous command handler off the async runtime.
async fn blocking<F>(f: F) -> Result<String>
where
    F: FnOnce() -> Result<String> + Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}

async fn watch(settings: Settings, root: PathBuf) -> Result<()> {
    let mut controller = tokio::task::spawn_blocking(move || {
        commands::start_watch(&settings, &root)
    })
    .await??;

    println!("Watching for changes. Press Ctrl-C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;

    let outcome = tokio::task::spawn_blocking(move || controller.stop()).await?;
    if outcome == StopOutcome::TimedOut {
        warn!("Watcher did not shut down cleanly");
    }
    Ok(())
}
