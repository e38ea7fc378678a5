//! Reconciliation entry points.
//!
//! [`Reconciler::reconcile`] is the pure core: text and a directory listing
//! in, rewritten text and a report out. It never touches the file system.
//!
//! The document-level functions wrap it with vault I/O:
//!
//! * [`clean_document`]: reconcile one Markdown file already in the vault
//! * [`clean_documents`]: the same over many files, a few at a time
//! * [`convert_document`]: run the converter on a `.docx`, then reconcile
//!
//! Every recoverable problem ends up in the report; only invalid input or
//! failed I/O on the document itself is returned as an error.

use crate::config::{ReconcileConfig, Settings};
use crate::converter::{self, ConverterJob};
use crate::error::{ReconcileError, ReconcileWarning};
use crate::output::{BatchOutcome, DocumentOutcome, ReconciliationResult};
use crate::pipeline::inventory::MediaInventory;
use crate::pipeline::paths;
use crate::pipeline::rewrite::{LinkRewriter, ResolvedPlaceholder};
use crate::pipeline::scan::{self, PlaceholderScanner, PlaceholderShape, ReferenceDefinition};
use crate::progress::BatchProgressCallback;
use crate::vault::Vault;
use futures::stream::{self, StreamExt};
use std::collections::{BTreeSet, HashMap};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Per-document inputs to a reconciliation pass.
#[derive(Debug, Clone, Copy)]
pub struct DocumentContext<'a> {
    /// Document name without extension; prefix of every renamed image.
    pub base_name: &'a str,
    /// Vault-relative folder the images live in, e.g. `media/Report-images/media`.
    pub media_dir: &'a str,
    /// Vault root that absolute paths are made relative to.
    pub vault_root: &'a Path,
}

/// A compiled, reusable reconciliation engine.
///
/// Holds no per-document state; one instance can serve any number of
/// documents, from any number of threads.
#[derive(Debug, Clone)]
pub struct Reconciler {
    config: ReconcileConfig,
    scanner: PlaceholderScanner,
}

impl Reconciler {
    pub fn new(config: ReconcileConfig) -> Result<Self, ReconcileError> {
        let scanner = PlaceholderScanner::from_config(&config)?;
        Ok(Self { config, scanner })
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    pub fn scanner(&self) -> &PlaceholderScanner {
        &self.scanner
    }

    /// Run one reconciliation pass over `text`.
    ///
    /// Steps: scan placeholders, build the inventory from `listing`,
    /// relativise reference-style paths, rewrite, then relativise any
    /// absolute link targets left in the text.
    ///
    /// # Errors
    /// Only [`ReconcileError::InvalidInput`] for an empty base name or
    /// vault root. Everything else is reported, not raised.
    pub fn reconcile<S: AsRef<str>>(
        &self,
        text: &str,
        listing: &[S],
        ctx: &DocumentContext<'_>,
    ) -> Result<ReconciliationResult, ReconcileError> {
        let inventory = MediaInventory::build(listing, &self.config.extensions);
        self.reconcile_inventory(text, &inventory, ctx)
    }

    /// Like [`Reconciler::reconcile`], with the inventory already built.
    pub fn reconcile_inventory(
        &self,
        text: &str,
        inventory: &MediaInventory,
        ctx: &DocumentContext<'_>,
    ) -> Result<ReconciliationResult, ReconcileError> {
        if ctx.base_name.trim().is_empty() {
            return Err(ReconcileError::InvalidInput("base name must not be empty".into()));
        }
        if ctx.vault_root.as_os_str().is_empty() {
            return Err(ReconcileError::InvalidInput("vault root must not be empty".into()));
        }

        let mut warnings: Vec<ReconcileWarning> = Vec::new();
        let placeholders = self.resolve_placeholders(text, ctx, &mut warnings);
        debug!(
            "Found {} placeholders and {} media files for '{}'",
            placeholders.len(),
            inventory.len(),
            ctx.base_name
        );

        let rewriter = LinkRewriter {
            base_name: ctx.base_name,
            media_dir: ctx.media_dir,
            not_found_alt: self.config.not_found_alt(),
            validate_pairing: self.config.validate_pairing,
        };
        let mut result = rewriter.rewrite(text, &placeholders, inventory.assets());

        let pairing_warnings = std::mem::take(&mut result.report.warnings);
        for w in warnings.into_iter().chain(pairing_warnings) {
            result.report.push_warning(w);
        }

        if self.config.normalize_stray_links {
            let (text, failures) = paths::normalize_stray_links(&result.text, ctx.vault_root);
            result.text = text;
            for e in failures {
                warn!("{}", e);
                result.report.push_warning(e.into());
            }
        }

        Ok(result)
    }

    /// Scan `text` and resolve every placeholder's link target.
    ///
    /// An inline caption without a target is joined to the reference
    /// definition its label names: it takes the definition's path, and the
    /// definition line is deleted with it. A caption-labelled definition
    /// consumed that way no longer counts as a placeholder of its own.
    fn resolve_placeholders(
        &self,
        text: &str,
        ctx: &DocumentContext<'_>,
        warnings: &mut Vec<ReconcileWarning>,
    ) -> Vec<ResolvedPlaceholder> {
        let matches: Vec<_> = self.scanner.scan(text).collect();
        let definitions = scan::reference_definitions(text);
        let mut by_label: HashMap<&str, &ReferenceDefinition> = HashMap::new();
        for def in &definitions {
            // First definition of a label wins.
            by_label.entry(def.key.as_str()).or_insert(def);
        }

        let mut resolve = |path: &str| match paths::normalize(path, ctx.vault_root) {
            Ok(relative) => relative,
            Err(e) => {
                warn!("{}", e);
                warnings.push(e.into());
                path.to_string()
            }
        };

        let mut joined: Vec<Option<&ReferenceDefinition>> = Vec::with_capacity(matches.len());
        for m in &matches {
            let def = m
                .reference_label(text)
                .and_then(|label| by_label.get(scan::label_key(label).as_str()).copied())
                .filter(|def| def.line.end <= m.span.start || def.line.start >= m.span.end);
            joined.push(def);
        }
        let consumed: Vec<Range<usize>> = joined.iter().flatten().map(|def| def.line.clone()).collect();

        let mut placeholders = Vec::with_capacity(matches.len());
        for (m, def) in matches.iter().zip(joined) {
            if m.shape == PlaceholderShape::ReferenceStyleCaption
                && consumed.iter().any(|line| line.contains(&m.span.start))
            {
                continue;
            }
            let resolved = ResolvedPlaceholder::from_match(m, text);
            let resolved = match (def, m.shape, m.target_str(text)) {
                (Some(def), _, _) => {
                    let path = def.target_str(text);
                    resolved
                        .with_target(resolve(path))
                        .with_definition(def.line.clone(), path)
                }
                (None, PlaceholderShape::ReferenceStyleCaption, Some(path)) => {
                    resolved.with_target(resolve(path))
                }
                _ => resolved,
            };
            placeholders.push(resolved);
        }
        placeholders
    }
}

/// One-shot reconciliation with a freshly compiled engine.
///
/// Prefer [`Reconciler`] when processing more than one document.
pub fn reconcile<S: AsRef<str>>(
    text: &str,
    listing: &[S],
    ctx: &DocumentContext<'_>,
    config: &ReconcileConfig,
) -> Result<ReconciliationResult, ReconcileError> {
    Reconciler::new(config.clone())?.reconcile(text, listing, ctx)
}

// ── Document-level operations ────────────────────────────────────────────

/// Options for [`clean_document`] and [`clean_documents`].
#[derive(Debug, Clone, Default)]
pub struct CleanOptions {
    /// Compute the result but leave files untouched.
    pub dry_run: bool,
}

/// Reconcile one Markdown file stored in `vault`.
///
/// The base name is the file stem and the media folder is
/// [`Settings::media_dir_for`] of it. An unreadable media folder produces a
/// warning and not-found markers, not an error. The file is rewritten only
/// if its text changed.
pub fn clean_document<V: Vault + ?Sized>(
    vault: &V,
    doc_path: &str,
    settings: &Settings,
    reconciler: &Reconciler,
    options: &CleanOptions,
) -> Result<DocumentOutcome, ReconcileError> {
    let start = Instant::now();
    let path = Path::new(doc_path);
    let is_markdown = path
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("md"));
    if !is_markdown {
        return Err(ReconcileError::NotMarkdown {
            path: doc_path.to_string(),
        });
    }
    let base_name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .ok_or_else(|| ReconcileError::InvalidInput(format!("'{doc_path}' has no file name")))?;

    let text = vault.read_text(doc_path)?;
    let media_dir = settings.media_dir_for(&base_name);
    let (inventory, listing_warning) = MediaInventory::from_listing_result(
        &media_dir,
        vault.list_directory(&media_dir),
        &reconciler.config().extensions,
    );

    let ctx = DocumentContext {
        base_name: &base_name,
        media_dir: &media_dir,
        vault_root: vault.root(),
    };
    let mut result = reconciler.reconcile_inventory(&text, &inventory, &ctx)?;
    if let Some(w) = listing_warning {
        result.report.warnings.insert(0, w);
    }

    let changed = result.text != text;
    let written = changed && !options.dry_run;
    if written {
        vault.write_text(doc_path, &result.text)?;
    }

    info!(
        "Cleaned '{}': {} linked, {} unresolved, {} unused, {} warnings ({}ms{})",
        doc_path,
        result.report.renames.len(),
        result.report.unresolved_placeholders,
        result.report.unused_assets,
        result.report.warnings.len(),
        start.elapsed().as_millis(),
        if written { "" } else { ", not written" }
    );

    Ok(DocumentOutcome {
        path: doc_path.to_string(),
        written,
        report: result.report,
    })
}

/// Reconcile several documents with at most `concurrency` in flight.
///
/// Duplicate paths are processed once, so no file has two writers.
/// A fatal error on one document is recorded in
/// [`BatchOutcome::failures`] and the rest carry on.
pub async fn clean_documents<V>(
    vault: Arc<V>,
    doc_paths: &[String],
    settings: &Settings,
    reconciler: &Reconciler,
    options: &CleanOptions,
    concurrency: usize,
    progress: Option<Arc<dyn BatchProgressCallback>>,
) -> BatchOutcome
where
    V: Vault + Send + Sync + 'static,
{
    let unique: Vec<String> = doc_paths
        .iter()
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let total = unique.len();
    if unique.len() < doc_paths.len() {
        debug!("Dropped {} duplicate paths", doc_paths.len() - unique.len());
    }
    if let Some(ref cb) = progress {
        cb.on_batch_start(total);
    }

    let results: Vec<(String, Result<DocumentOutcome, ReconcileError>)> =
        stream::iter(unique.into_iter().map(|doc_path| {
            let vault = Arc::clone(&vault);
            let settings = settings.clone();
            let reconciler = reconciler.clone();
            let options = options.clone();
            let progress = progress.clone();
            async move {
                if let Some(ref cb) = progress {
                    cb.on_document_start(&doc_path, total);
                }
                let job_path = doc_path.clone();
                let result = tokio::task::spawn_blocking(move || {
                    clean_document(vault.as_ref(), &job_path, &settings, &reconciler, &options)
                })
                .await
                .unwrap_or_else(|e| Err(ReconcileError::Internal(format!("worker panicked: {e}"))));

                if let Some(ref cb) = progress {
                    match &result {
                        Ok(outcome) => cb.on_document_complete(&doc_path, total, &outcome.report),
                        Err(e) => cb.on_document_error(&doc_path, total, &e.to_string()),
                    }
                }
                (doc_path, result)
            }
        }))
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut outcome = BatchOutcome::default();
    for (path, result) in results {
        match result {
            Ok(doc) => outcome.documents.push(doc),
            Err(e) => {
                warn!("Failed to clean '{}': {}", path, e);
                outcome.failures.push((path, e.to_string()));
            }
        }
    }
    outcome.documents.sort_by(|a, b| a.path.cmp(&b.path));
    outcome.failures.sort();

    if let Some(ref cb) = progress {
        cb.on_batch_complete(total, outcome.succeeded());
    }
    outcome
}

/// Convert a `.docx` file into the vault and reconcile the result.
///
/// The Markdown lands at `{stem}.md` in the vault root and the images under
/// [`Settings::extraction_dir_for`] of the stem.
pub async fn convert_document<V>(
    vault: Arc<V>,
    input: &Path,
    settings: &Settings,
    reconciler: &Reconciler,
) -> Result<DocumentOutcome, ReconcileError>
where
    V: Vault + Send + Sync + 'static,
{
    let start = Instant::now();
    info!("Starting conversion: {}", input.display());

    let job = ConverterJob::for_vault(input, vault.root(), settings)?;
    converter::run(&job, settings).await?;
    info!(
        "Converter finished in {}ms: {}",
        start.elapsed().as_millis(),
        job.output.display()
    );

    let doc_path = job.markdown_rel_path();
    let settings = settings.clone();
    let reconciler = reconciler.clone();
    tokio::task::spawn_blocking(move || {
        clean_document(
            vault.as_ref(),
            &doc_path,
            &settings,
            &reconciler,
            &CleanOptions::default(),
        )
    })
    .await
    .map_err(|e| ReconcileError::Internal(format!("worker panicked: {e}")))?
}

/// Paths in the vault root that a batch clean would consider by default.
pub fn markdown_files_in(root: &Path) -> Result<Vec<String>, ReconcileError> {
    let entries = std::fs::read_dir(root).map_err(|e| ReconcileError::ReadFailed {
        path: root.to_path_buf(),
        source: e,
    })?;
    let mut files: Vec<String> = entries
        .filter_map(Result::ok)
        .map(|e| PathBuf::from(e.file_name()))
        .filter(|p| p.extension().is_some_and(|e| e.eq_ignore_ascii_case("md")))
        .map(|p| p.to_string_lossy().into_owned())
        .collect();
    files.sort();
    Ok(files)
}
