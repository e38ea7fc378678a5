//! Result types returned by a reconciliation pass.

use crate::error::ReconcileWarning;
use serde::Serialize;

/// An image that was paired with a placeholder and given a display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rename {
    /// File name on disk. The link still points at this name.
    pub original_name: String,
    /// `{base}-img{n}{ext}`, used as the link's alt text.
    pub new_name: String,
}

/// What a reconciliation pass did, beyond the rewritten text.
///
/// Always satisfies
/// `unresolved_placeholders + renames.len() == placeholders_found` and
/// `unused_assets + renames.len() == assets_found`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationReport {
    /// Pairings in document order.
    pub renames: Vec<Rename>,
    /// Placeholders that got a not-found marker because media ran out.
    pub unresolved_placeholders: usize,
    /// Images left over after every placeholder was served.
    pub unused_assets: usize,
    pub placeholders_found: usize,
    pub assets_found: usize,
    /// Non-fatal problems, in the order they were met.
    pub warnings: Vec<ReconcileWarning>,
}

impl ReconciliationReport {
    /// `true` when every placeholder and every asset found a partner and
    /// nothing was worth warning about.
    pub fn is_clean(&self) -> bool {
        self.unresolved_placeholders == 0 && self.unused_assets == 0 && self.warnings.is_empty()
    }

    pub(crate) fn push_warning(&mut self, warning: ReconcileWarning) {
        if !self.warnings.contains(&warning) {
            self.warnings.push(warning);
        }
    }
}

/// Rewritten text plus the report describing the rewrite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationResult {
    pub text: String,
    pub report: ReconciliationReport,
}

/// Per-document outcome of a document-level operation.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentOutcome {
    /// Vault-relative path of the Markdown file.
    pub path: String,
    /// Whether the file on disk was rewritten.
    pub written: bool,
    pub report: ReconciliationReport,
}

/// Result of cleaning several documents.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchOutcome {
    /// Documents that were reconciled, sorted by path.
    pub documents: Vec<DocumentOutcome>,
    /// Documents that failed fatally, as `(path, message)`, sorted by path.
    pub failures: Vec<(String, String)>,
}

impl BatchOutcome {
    pub fn succeeded(&self) -> usize {
        self.documents.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}
