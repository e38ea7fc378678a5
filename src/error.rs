//! Error types for the docx2vault library.
//!
//! Two distinct types reflect two distinct failure modes:
//!
//! * [`ReconcileError`], **fatal**: the operation cannot proceed at all
//!   (empty base name, file is not Markdown, converter missing, write
//!   failed). Returned as `Err(ReconcileError)`.
//!
//! * [`ReconcileWarning`], **non-fatal**: something about one document
//!   could not be resolved (media folder unreadable, a path outside the
//!   vault), but a result was still produced. Stored inside
//!   [`crate::output::ReconciliationReport::warnings`].
//!
//! Running out of media files, or having media files left over, is neither:
//! those are plain counters on the report.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the docx2vault library.
#[derive(Debug, Error)]
pub enum ReconcileError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// A required parameter was missing or empty.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The document to clean is not a Markdown file.
    #[error("'{path}' is not a Markdown file (expected a .md extension)")]
    NotMarkdown { path: String },

    /// The document handed to the converter is not a supported type.
    #[error("'{path}' is not a .docx document")]
    UnsupportedInput { path: PathBuf },

    /// The file exists but its content is not valid UTF-8.
    #[error("'{path}' is not valid UTF-8 text")]
    NotUtf8 { path: PathBuf },

    /// The file does not exist inside the vault.
    #[error("File not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// Reading the file failed for a reason other than absence.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output Markdown file.
    #[error("Failed to write '{path}': {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Converter errors ──────────────────────────────────────────────────
    /// The converter executable could not be started.
    #[error("Document converter '{program}' could not be started: {source}\nInstall pandoc or set --converter to its full path.")]
    ConverterNotFound {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The converter ran but exited unsuccessfully.
    #[error("Document converter exited with {status}: {stderr}")]
    ConverterFailed { status: String, stderr: String },

    /// The converter did not finish within the configured timeout.
    #[error("Document converter timed out after {secs}s")]
    ConverterTimeout { secs: u64 },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The settings file exists but could not be read or parsed.
    #[error("Failed to load settings from '{path}': {reason}")]
    SettingsLoad { path: PathBuf, reason: String },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// An absolute path that cannot be expressed relative to the vault root.
///
/// The path is kept verbatim in the output text when this happens.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("cannot express '{path}' relative to '{root}': {reason}")]
pub struct PathResolutionError {
    pub path: String,
    pub root: String,
    pub reason: String,
}

/// A non-fatal problem found while reconciling one document.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ReconcileWarning {
    /// The media directory was missing or unreadable; treated as empty.
    #[error("media directory '{dir}' could not be read: {reason}")]
    InventoryRead { dir: String, reason: String },

    /// An absolute path could not be made vault-relative.
    #[error(transparent)]
    PathResolution(#[from] PathResolutionError),

    /// A placeholder named a file different from the one it was paired with.
    ///
    /// Pairing is positional; this flags documents where extraction order
    /// and document order appear to disagree.
    #[error("placeholder {placeholder} references '{referenced}' but was paired with '{paired}'")]
    PairingMismatch {
        placeholder: usize,
        referenced: String,
        paired: String,
    },
}
