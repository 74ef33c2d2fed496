//! Command-line definitions and the synchronous command handlers.

use std::path::{Path, PathBuf};

use chrono::Local;
use clap::{Parser, Subcommand, ValueEnum};
use codemanager_codefile::{
    ATOMIC_TEMP_PREFIX, ArtifactPaths, CompileReport, Compiler, parse_extension_list,
};
use codemanager_directory_watcher::{BackendKind, ChangeBatch, WatcherController};
use tracing::{info, warn};

use crate::error::Result;
use crate::manifest::Manifest;
use crate::settings::Settings;
use crate::tracked::build_tracked_set;

#[derive(Parser, Debug)]
#[command(name = "codemanager")]
#[command(about = "Track files and folders and compile them into one codefile")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Settings file (TOML)
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Manifest location
    #[arg(long, value_name = "FILE", global = true)]
    pub manifest: Option<PathBuf>,

    /// Directory the artifacts are written to
    #[arg(short, long, value_name = "DIR", global = true)]
    pub output_dir: Option<PathBuf>,

    /// Skip files larger than this
    #[arg(long, value_name = "BYTES", global = true)]
    pub max_bytes: Option<u64>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Track files (comma-separated or repeated)
    AddFile {
        #[arg(required = true, value_delimiter = ',')]
        paths: Vec<String>,
    },
    /// Track folders (comma-separated or repeated)
    AddFolder {
        #[arg(required = true, value_delimiter = ',')]
        paths: Vec<String>,

        /// Comma-separated extension filter (defaults to the configured list)
        #[arg(long, value_name = "EXTS")]
        exts: Option<String>,

        /// Only include direct children
        #[arg(long)]
        no_recursive: bool,
    },
    /// Stop tracking a file (exact path as listed)
    RemoveFile { path: String },
    /// Stop tracking a folder (exact path as listed)
    RemoveFolder { path: String },
    /// Show the tracked set
    List,
    /// Compile the tracked set now
    Compile,
    /// Compile a root and recompile it on every change until Ctrl-C
    Watch {
        root: PathBuf,

        /// Quiet interval before a rebuild, in milliseconds
        #[arg(long, value_name = "MS")]
        debounce_ms: Option<u64>,

        /// Notification backend
        #[arg(long, value_enum)]
        backend: Option<BackendArg>,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendArg {
    Auto,
    Native,
    Polling,
}

impl From<BackendArg> for BackendKind {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Auto => BackendKind::Auto,
            BackendArg::Native => BackendKind::Native,
            BackendArg::Polling => BackendKind::Polling,
        }
    }
}

impl Cli {
    /// Load the settings file and apply command-line overrides.
    pub fn settings(&self) -> Result<Settings> {
        let mut settings = Settings::load(self.config.as_deref())?;
        if let Some(manifest) = &self.manifest {
            settings.manifest = manifest.clone();
        }
        if let Some(output_dir) = &self.output_dir {
            settings.output_dir = Some(output_dir.clone());
        }
        if let Some(max_bytes) = self.max_bytes {
            settings.max_bytes = max_bytes;
        }
        if let Commands::Watch {
            debounce_ms,
            backend,
            ..
        } = &self.command
        {
            if let Some(ms) = debounce_ms {
                settings.watch.debounce_ms = *ms;
            }
            if let Some(backend) = backend {
                settings.watch.backend = (*backend).into();
            }
        }
        Ok(settings)
    }
}

/// Counts reported by the add commands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddOutcome {
    pub added: usize,
    pub skipped: usize,
    pub failed: Vec<String>,
}

/// Track each of `raws` as a file.
pub fn add_files(settings: &Settings, raws: &[String]) -> Result<AddOutcome> {
    let mut manifest = Manifest::load(&settings.manifest);
    let mut outcome = AddOutcome::default();
    for raw in raws.iter().map(String::as_str).map(str::trim).filter(|r| !r.is_empty()) {
        match manifest.add_file(raw) {
            Ok(true) => outcome.added += 1,
            Ok(false) => outcome.skipped += 1,
            Err(e) => {
                warn!("{e}");
                outcome.failed.push(raw.to_string());
            }
        }
    }
    manifest.save(&settings.manifest)?;
    Ok(outcome)
}

/// Track each of `raws` as a folder with the given extension filter.
pub fn add_folders(
    settings: &Settings,
    raws: &[String],
    exts: Option<&str>,
    recursive: bool,
) -> Result<AddOutcome> {
    let exts = exts.map_or_else(|| settings.default_folder_exts.clone(), parse_extension_list);
    let mut manifest = Manifest::load(&settings.manifest);
    let mut outcome = AddOutcome::default();
    for raw in raws.iter().map(String::as_str).map(str::trim).filter(|r| !r.is_empty()) {
        match manifest.add_folder(raw, &exts, recursive) {
            Ok(true) => outcome.added += 1,
            Ok(false) => outcome.skipped += 1,
            Err(e) => {
                warn!("{e}");
                outcome.failed.push(raw.to_string());
            }
        }
    }
    manifest.save(&settings.manifest)?;
    Ok(outcome)
}

/// Untrack a file. Returns the number of entries removed.
pub fn remove_file(settings: &Settings, raw: &str) -> Result<usize> {
    let mut manifest = Manifest::load(&settings.manifest);
    let removed = manifest.remove_file(raw);
    manifest.save(&settings.manifest)?;
    Ok(removed)
}

/// Untrack a folder. Returns the number of entries removed.
pub fn remove_folder(settings: &Settings, raw: &str) -> Result<usize> {
    let mut manifest = Manifest::load(&settings.manifest);
    let removed = manifest.remove_folder(raw);
    manifest.save(&settings.manifest)?;
    Ok(removed)
}

/// Human-readable listing of the manifest.
pub fn render_listing(manifest: &Manifest) -> String {
    if manifest.is_empty() {
        return "Manifest is empty. Add files or folders first.".to_string();
    }

    let mut lines = vec!["Files:".to_string()];
    if manifest.files.is_empty() {
        lines.push("  (none)".to_string());
    }
    lines.extend(manifest.files.iter().map(|f| format!("  {}", f.path)));

    lines.push("Folders:".to_string());
    if manifest.folders.is_empty() {
        lines.push("  (none)".to_string());
    }
    lines.extend(manifest.folders.iter().map(|f| {
        let exts = if f.exts.is_empty() {
            "(all)".to_string()
        } else {
            f.exts.join(",")
        };
        format!("  {}  |  exts={exts}  |  recursive={}", f.path, f.recursive)
    }));

    if let Some(at) = &manifest.last_compiled {
        lines.push(format!("Last compiled: {at}"));
    }
    lines.join("\n")
}

fn compiler(settings: &Settings) -> Compiler {
    Compiler::new(ArtifactPaths::in_dir(settings.output_dir())).with_write_mode(settings.write_mode)
}

/// Compile the tracked set. Returns `None` when nothing is tracked.
pub fn compile(settings: &Settings) -> Result<Option<CompileReport>> {
    let mut manifest = Manifest::load(&settings.manifest);
    let tracked = build_tracked_set(&manifest, settings);
    if tracked.is_empty() {
        return Ok(None);
    }

    let report = compiler(settings).compile_paths(
        &tracked.files,
        &tracked.structure_roots,
        &settings.exclude_dirs,
        settings.max_bytes,
    )?;

    manifest.mark_compiled(Local::now());
    manifest.save(&settings.manifest)?;
    Ok(Some(report))
}

/// One line of the recent-change log.
pub fn batch_log_line(batch: &ChangeBatch, report: &CompileReport) -> String {
    let time = batch.emitted_at.with_timezone(&Local).format("%H:%M:%S");
    let first = batch
        .paths
        .first()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    let more = if batch.len() > 1 {
        format!(" (+{} more)", batch.len() - 1)
    } else {
        String::new()
    };
    format!(
        "[{time}] batch #{}: {first}{more} -> {} files, {} bytes",
        batch.sequence, report.files_written, report.codefile_bytes
    )
}

/// Compile `root` once, then start a controller that recompiles it on every
/// batch.
pub fn start_watch(settings: &Settings, root: &Path) -> Result<WatcherController> {
    let filter = settings.filter_config().compile()?;
    let compiler = compiler(settings);

    let report = compiler.compile_root(root, &filter)?;
    println!(
        "Compiled {} files into {}",
        report.files_written,
        compiler.paths().codefile.display()
    );

    let ignored = [&compiler.paths().codefile, &compiler.paths().structure]
        .into_iter()
        .map(|p| dunce::canonicalize(p).unwrap_or_else(|_| p.clone()))
        .collect::<Vec<_>>();

    let output_dir = compiler.paths().output_dir();
    let output_dir = dunce::canonicalize(output_dir).unwrap_or_else(|_| output_dir.to_path_buf());

    let mut controller = WatcherController::new()
        .with_ignored_paths(ignored)
        .with_ignored_prefix(output_dir, ATOMIC_TEMP_PREFIX)
        .with_error_hook(|e| eprintln!("[{}] {e}", Local::now().format("%H:%M:%S")));

    let watch_root = root.to_path_buf();
    let watch_filter = filter.clone();
    controller.start(root, filter, settings.watch.clone(), move |batch| {
        let report = compiler.compile_root(&watch_root, &watch_filter)?;
        println!("{}", batch_log_line(batch, &report));
        Ok(())
    })?;

    info!("Watching {} for changes", root.display());
    Ok(controller)
}
