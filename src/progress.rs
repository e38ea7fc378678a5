//! Progress-callback trait for batch clean events.
//!
//! Pass an [`Arc<dyn BatchProgressCallback>`] to
//! [`crate::reconcile::clean_documents`] to hear about each document as it
//! is reconciled.
//!
//! # Why callbacks instead of channels?
//!
//! The library does not know whether the host draws a progress bar, logs
//! lines, or feeds a UI. A callback lets each host do its own thing. The
//! trait is `Send + Sync` because documents are processed concurrently.
//!
//! # Example
//!
//! ```rust
//! use docx2vault::{BatchProgressCallback, ReconciliationReport};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct Linked(AtomicUsize);
//!
//! impl BatchProgressCallback for Linked {
//!     fn on_document_complete(&self, _path: &str, _total: usize, report: &ReconciliationReport) {
//!         self.0.fetch_add(report.renames.len(), Ordering::SeqCst);
//!     }
//! }
//!
//! let cb = Linked(AtomicUsize::new(0));
//! cb.on_document_complete("a.md", 1, &ReconciliationReport::default());
//! assert_eq!(cb.0.load(Ordering::SeqCst), 0);
//! ```

use crate::output::ReconciliationReport;
use std::sync::Arc;

/// Called by the batch cleaner as it processes documents.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
///
/// # Thread safety
///
/// `on_document_start`, `on_document_complete` and `on_document_error` may
/// be called concurrently. Protect shared state with `Mutex` or atomics.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once, with the number of distinct documents.
    fn on_batch_start(&self, total: usize) {
        let _ = total;
    }

    /// Called just before a document is read.
    fn on_document_start(&self, path: &str, total: usize) {
        let _ = (path, total);
    }

    /// Called when a document was reconciled, whether or not it changed.
    fn on_document_complete(&self, path: &str, total: usize, report: &ReconciliationReport) {
        let _ = (path, total, report);
    }

    /// Called when a document failed with a fatal error.
    fn on_document_error(&self, path: &str, total: usize, error: &str) {
        let _ = (path, total, error);
    }

    /// Called once after every document has been attempted.
    fn on_batch_complete(&self, total: usize, success_count: usize) {
        let _ = (total, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias for the type [`crate::reconcile::clean_documents`] takes.
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;
