//! CLI binary for docx2vault.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `Settings` / `ReconcileConfig` and prints reports.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use docx2vault::{
    captions, clean_documents, convert_document, markdown_files_in, BatchProgressCallback,
    CleanOptions, FsVault, ProgressCallback, ReconcileConfig, ReconcileWarning, Reconciler,
    ReconciliationReport, Settings, Vault,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress bar over documents. Documents finish out of order when
/// `--concurrency` is above 1, so each line names its file.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} files  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        let bar = ProgressBar::new(0);
        bar.set_style(style);
        bar.set_prefix("Cleaning");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total: usize) {
        self.bar.set_length(total as u64);
    }

    fn on_document_start(&self, path: &str, _total: usize) {
        self.bar.set_message(path.to_string());
    }

    fn on_document_complete(&self, path: &str, _total: usize, report: &ReconciliationReport) {
        let mark = if report.is_clean() { green("✓") } else { yellow("⚠") };
        self.bar.println(format!("  {mark} {path}  {}", dim(&summary(report))));
        self.bar.inc(1);
    }

    fn on_document_error(&self, path: &str, _total: usize, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!("  {} {path}  {}", red("✗"), red(error)));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total: usize, success_count: usize) {
        self.bar.finish_and_clear();
        let failed = self.errors.load(Ordering::SeqCst);
        if failed == 0 {
            eprintln!("{} {} files cleaned", green("✔"), bold(&success_count.to_string()));
        } else {
            eprintln!(
                "{} {}/{} files cleaned  ({} failed)",
                red("✘"),
                bold(&success_count.to_string()),
                total,
                red(&failed.to_string())
            );
        }
    }
}

fn summary(report: &ReconciliationReport) -> String {
    format!(
        "{} linked, {} not found, {} unused, {} warnings",
        report.renames.len(),
        report.unresolved_placeholders,
        report.unused_assets,
        report.warnings.len()
    )
}

fn print_warnings(warnings: &[ReconcileWarning]) {
    for w in warnings {
        eprintln!("    {} {}", yellow("warning:"), w);
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert a Word document into a vault
  docx2vault convert Report.docx --vault ~/Notes

  # Re-run the link repair on notes that were converted earlier
  docx2vault clean Report.md Minutes.md --vault ~/Notes

  # Every Markdown file in the vault root, without writing anything
  docx2vault clean --vault ~/Notes --dry-run --json

  # English and German captions, German not-found label first
  docx2vault clean Report.md --vault ~/Notes --locale de --locale en

LAYOUT:
  Report.docx is converted to {vault}/Report.md, with its images extracted
  to {vault}/{media-folder}/Report-images/media/. Each generated caption is
  replaced, in document order, by ![Report-img{n}.ext](relative/path).

ENVIRONMENT VARIABLES:
  DOCX2VAULT_VAULT         Vault root directory
  DOCX2VAULT_SETTINGS      JSON settings file
  DOCX2VAULT_MEDIA_FOLDER  Media folder inside the vault (default: media)
  DOCX2VAULT_CONVERTER     pandoc executable (default: pandoc)
  RUST_LOG                 Overrides -v / -q log filtering
"#;

/// Import Word documents into a Markdown vault with working image links.
#[derive(Parser, Debug)]
#[command(
    name = "docx2vault",
    version,
    about = "Import Word documents into a Markdown vault with working image links",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Vault root directory.
    #[arg(long, global = true, env = "DOCX2VAULT_VAULT")]
    vault: Option<PathBuf>,

    /// JSON settings file. Missing file means defaults.
    #[arg(long, global = true, env = "DOCX2VAULT_SETTINGS")]
    settings: Option<PathBuf>,

    /// Media folder inside the vault, overrides the settings file.
    #[arg(long, global = true, env = "DOCX2VAULT_MEDIA_FOLDER")]
    media_folder: Option<String>,

    /// Caption locale to recognise (de, en, fr). Repeatable; the first one
    /// supplies the not-found label. Default: all built-in locales.
    #[arg(long = "locale", global = true, value_name = "CODE")]
    locales: Vec<String>,

    /// Output structured JSON reports instead of text.
    #[arg(long, global = true, env = "DOCX2VAULT_JSON")]
    json: bool,

    /// Disable progress bar and spinner.
    #[arg(long, global = true, env = "DOCX2VAULT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "DOCX2VAULT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "DOCX2VAULT_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a .docx into the vault, then repair its image links.
    Convert {
        /// The Word document to import.
        input: PathBuf,

        /// pandoc executable name or path, overrides the settings file.
        #[arg(long, env = "DOCX2VAULT_CONVERTER")]
        converter: Option<String>,

        /// Converter timeout in seconds, overrides the settings file.
        #[arg(long, env = "DOCX2VAULT_CONVERTER_TIMEOUT")]
        timeout: Option<u64>,
    },

    /// Repair image links in Markdown files already in the vault.
    Clean {
        /// Vault-relative Markdown files. Default: every .md in the vault root.
        files: Vec<String>,

        /// Report what would change without writing.
        #[arg(long)]
        dry_run: bool,

        /// Number of files processed at once.
        #[arg(short, long, env = "DOCX2VAULT_CONCURRENCY", default_value_t = 4)]
        concurrency: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let common = &cli.common;

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar already reports each file, so INFO lines would
    // only duplicate it.
    let show_progress = !common.quiet && !common.no_progress && !common.json;
    let filter = if common.verbose {
        "debug"
    } else if common.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let vault_root = common
        .vault
        .clone()
        .context("No vault given: pass --vault or set DOCX2VAULT_VAULT")?;
    let vault = Arc::new(
        FsVault::open(&vault_root)
            .with_context(|| format!("Cannot open vault at {}", vault_root.display()))?,
    );
    let mut settings = load_settings(common)?;
    let reconciler = Reconciler::new(build_config(common)?).context("Invalid configuration")?;

    match cli.command {
        Command::Convert {
            input,
            converter,
            timeout,
        } => {
            if let Some(converter) = converter {
                settings.converter_path = converter;
            }
            if let Some(secs) = timeout {
                settings.converter_timeout_secs = secs;
            }

            let spinner = show_progress.then(|| {
                let s = ProgressBar::new_spinner();
                s.set_style(
                    ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner())
                        .tick_strings(TICKS),
                );
                s.set_prefix("Converting");
                s.set_message(input.display().to_string());
                s.enable_steady_tick(Duration::from_millis(80));
                s
            });

            let start = Instant::now();
            let result = convert_document(Arc::clone(&vault), &input, &settings, &reconciler).await;
            if let Some(s) = spinner {
                s.finish_and_clear();
            }
            let outcome = result.with_context(|| format!("Conversion of {} failed", input.display()))?;

            if common.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&outcome).context("Failed to serialise report")?
                );
            } else if !common.quiet {
                eprintln!(
                    "{}  {}  {}  {}ms",
                    if outcome.report.is_clean() { green("✔") } else { yellow("⚠") },
                    bold(&outcome.path),
                    dim(&summary(&outcome.report)),
                    start.elapsed().as_millis()
                );
                print_warnings(&outcome.report.warnings);
            }
        }

        Command::Clean {
            files,
            dry_run,
            concurrency,
        } => {
            let files = if files.is_empty() {
                markdown_files_in(vault.root())?
            } else {
                files
            };
            if files.is_empty() {
                anyhow::bail!("No Markdown files found in {}", vault_root.display());
            }

            let progress: Option<ProgressCallback> = show_progress
                .then(|| CliProgressCallback::new() as Arc<dyn BatchProgressCallback>);
            let options = CleanOptions { dry_run };
            let batch = clean_documents(
                Arc::clone(&vault),
                &files,
                &settings,
                &reconciler,
                &options,
                concurrency,
                progress,
            )
            .await;

            if common.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&batch).context("Failed to serialise report")?
                );
            } else if !common.quiet {
                for doc in &batch.documents {
                    if !show_progress {
                        eprintln!("{}  {}", doc.path, dim(&summary(&doc.report)));
                    }
                    print_warnings(&doc.report.warnings);
                }
                if !show_progress {
                    for (path, error) in &batch.failures {
                        eprintln!("{} {path}: {error}", red("✗"));
                    }
                }
                if dry_run {
                    let pending = batch
                        .documents
                        .iter()
                        .filter(|d| !d.report.renames.is_empty() || d.report.unresolved_placeholders > 0)
                        .count();
                    eprintln!("{}", dim(&format!("dry run: {pending} files would change")));
                }
            }

            if batch.failed() > 0 {
                anyhow::bail!("{} of {} files failed", batch.failed(), files.len());
            }
        }
    }

    Ok(())
}

/// Settings file first, then flag overrides.
fn load_settings(common: &CommonArgs) -> Result<Settings> {
    let mut settings = match &common.settings {
        Some(path) => Settings::load(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => Settings::default(),
    };
    if let Some(folder) = &common.media_folder {
        settings.media_folder = folder.clone();
    }
    settings.fill_blanks();
    Ok(settings)
}

/// Map `--locale` flags to a `ReconcileConfig`.
fn build_config(common: &CommonArgs) -> Result<ReconcileConfig> {
    let mut builder = ReconcileConfig::builder();
    if !common.locales.is_empty() {
        let locales = common
            .locales
            .iter()
            .map(|code| {
                captions::locale_by_code(code).with_context(|| {
                    format!(
                        "Unknown caption locale '{code}' (known: {})",
                        captions::BUILTIN_LOCALES
                            .iter()
                            .map(|l| &*l.code)
                            .collect::<Vec<_>>()
                            .join(", ")
                    )
                })
            })
            .collect::<Result<Vec<_>>>()?;
        builder = builder.locales(locales);
    }
    builder.build().context("Invalid configuration")
}
