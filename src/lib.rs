//! # docx2vault
//!
//! Import Word documents into a Markdown vault with working image links.
//!
//! ## Why this crate?
//!
//! When a `.docx` is converted to Markdown, images without real alt text
//! arrive as machine-generated captions such as
//! `Ein Bild, das Text enthält. Automatisch generierte Beschreibung`,
//! sometimes as inline images and sometimes as reference definitions that
//! carry an absolute path from the converting machine. Neither renders
//! inside a vault. This crate finds those placeholders, pairs them in
//! document order with the images the converter extracted, and rewrites
//! each one into a relative link with a predictable name.
//!
//! ## Pipeline Overview
//!
//! ```text
//! .docx
//!  │
//!  ├─ 1. Convert    pandoc → {stem}.md + media/{stem}-images/media/*
//!  ├─ 2. Scan       find caption placeholders, both shapes, in order
//!  ├─ 3. Inventory  list the media folder, keep raster images
//!  ├─ 4. Rewrite    pair FIFO, emit ![{stem}-img{n}.ext](relative/path)
//!  ├─ 5. Normalise  make remaining absolute link targets vault-relative
//!  └─ 6. Write      atomically, only if the text changed
//! ```
//!
//! Steps 2 to 5 are pure and available on their own via [`Reconciler`].
//!
//! ## Quick Start
//!
//! ```rust
//! use docx2vault::{DocumentContext, ReconcileConfig, Reconciler};
//! use std::path::Path;
//!
//! let reconciler = Reconciler::new(ReconcileConfig::default()).unwrap();
//! let text = "Intro ![Ein Bild. Automatisch generierte Beschreibung] end";
//! let ctx = DocumentContext {
//!     base_name: "Report",
//!     media_dir: "media/Report-images/media",
//!     vault_root: Path::new("/vault"),
//! };
//! let result = reconciler.reconcile(text, &["image1.png"], &ctx).unwrap();
//! assert_eq!(
//!     result.text,
//!     "Intro ![Report-img1.png](media/Report-images/media/image1.png) end"
//! );
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docx2vault` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! docx2vault = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod captions;
pub mod config;
pub mod converter;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod reconcile;
pub mod vault;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{CaptionLocale, ReconcileConfig, ReconcileConfigBuilder, Settings, RASTER_EXTENSIONS};
pub use error::{PathResolutionError, ReconcileError, ReconcileWarning};
pub use output::{BatchOutcome, DocumentOutcome, ReconciliationReport, ReconciliationResult, Rename};
pub use pipeline::inventory::{MediaAsset, MediaInventory};
pub use pipeline::scan::{PlaceholderMatch, PlaceholderScanner, PlaceholderShape};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use reconcile::{
    clean_document, clean_documents, convert_document, markdown_files_in, reconcile, CleanOptions,
    DocumentContext, Reconciler,
};
pub use vault::{FsVault, MemoryVault, Vault};
