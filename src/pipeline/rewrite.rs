//! Link rewriting: turn placeholders into real image links.
//!
//! Placeholders and assets are consumed in lockstep, first placeholder with
//! first asset, and so on. Each placeholder becomes either
//!
//! ```text
//! ![Report-img1.png](media/Report-images/media/image1.png)   asset available
//! ![Bild nicht gefunden]()                                    media exhausted
//! ```
//!
//! A placeholder joined to a reference definition line takes that line
//! with it: the link is written where the caption was, and the definition
//! is deleted.
//!
//! The output is rebuilt from the untouched segments between placeholders
//! interleaved with the replacements, so earlier replacements can never
//! shift the offsets of later ones. Bytes outside placeholder spans are
//! copied verbatim, except for trailing blank lines left behind by deleted
//! definitions.

use crate::error::ReconcileWarning;
use crate::output::{ReconciliationReport, ReconciliationResult, Rename};
use crate::pipeline::inventory::{file_name, MediaAsset};
use crate::pipeline::scan::{PlaceholderMatch, PlaceholderShape};
use std::ops::Range;
use tracing::debug;

/// A placeholder whose target, if any, has already been resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPlaceholder {
    pub span: Range<usize>,
    pub shape: PlaceholderShape,
    /// Link target to emit instead of `media_dir/original_name`.
    pub target: Option<String>,
    /// File name the placeholder itself points at, if it names one.
    pub referenced_name: Option<String>,
    /// Reference definition line folded into this placeholder, deleted on rewrite.
    pub definition: Option<Range<usize>>,
}

impl ResolvedPlaceholder {
    /// Wrap a scanner match, keeping no target of its own.
    pub fn from_match(m: &PlaceholderMatch, text: &str) -> Self {
        Self {
            span: m.span.clone(),
            shape: m.shape,
            target: None,
            referenced_name: referenced_name(m.target_str(text)),
            definition: None,
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Fold in the definition on `line` whose destination is `target`.
    pub fn with_definition(mut self, line: Range<usize>, target: &str) -> Self {
        self.referenced_name = referenced_name(Some(target));
        self.definition = Some(line);
        self
    }
}

fn referenced_name(target: Option<&str>) -> Option<String> {
    let name = file_name(target?.trim());
    name.contains('.').then(|| name.to_string())
}

/// Rewrites placeholders for one document.
#[derive(Debug, Clone)]
pub struct LinkRewriter<'a> {
    pub base_name: &'a str,
    /// Vault-relative folder holding the assets, `/`-separated.
    pub media_dir: &'a str,
    pub not_found_alt: &'a str,
    pub validate_pairing: bool,
}

impl LinkRewriter<'_> {
    /// Replace every placeholder in `text`, pairing them FIFO with `assets`.
    ///
    /// `placeholders` must be in increasing offset order and disjoint, as
    /// produced by [`crate::pipeline::scan::PlaceholderScanner::scan`].
    /// Definition lines may be shared between placeholders but must not
    /// overlap any placeholder span.
    pub fn rewrite(
        &self,
        text: &str,
        placeholders: &[ResolvedPlaceholder],
        assets: &[MediaAsset],
    ) -> ReconciliationResult {
        let mut report = ReconciliationReport {
            placeholders_found: placeholders.len(),
            assets_found: assets.len(),
            ..Default::default()
        };
        let mut pending = assets.iter();
        let mut edits = Vec::with_capacity(placeholders.len());
        let mut definitions: Vec<Range<usize>> = Vec::new();

        for (index, placeholder) in placeholders.iter().enumerate() {
            let replacement = match pending.next() {
                Some(asset) => {
                    let renamed = asset.renamed(self.base_name);
                    let target = placeholder
                        .target
                        .clone()
                        .unwrap_or_else(|| self.asset_target(asset));
                    if self.validate_pairing {
                        if let Some(referenced) = &placeholder.referenced_name {
                            if referenced != &asset.original_name {
                                report.push_warning(ReconcileWarning::PairingMismatch {
                                    placeholder: index,
                                    referenced: referenced.clone(),
                                    paired: asset.original_name.clone(),
                                });
                            }
                        }
                    }
                    let link = image_link(&renamed.new_name, &target);
                    report.renames.push(Rename {
                        original_name: asset.original_name.clone(),
                        new_name: renamed.new_name,
                    });
                    link
                }
                None => {
                    report.unresolved_placeholders += 1;
                    format!("![{}]()", self.not_found_alt)
                }
            };
            edits.push((placeholder.span.clone(), replacement));
            if let Some(line) = &placeholder.definition {
                if !definitions.contains(line) {
                    definitions.push(line.clone());
                }
            }
        }

        report.unused_assets = pending.count();
        debug!(
            "Rewrote {} placeholders: {} linked, {} unresolved, {} assets unused",
            report.placeholders_found,
            report.renames.len(),
            report.unresolved_placeholders,
            report.unused_assets
        );

        let removed_definitions = !definitions.is_empty();
        edits.extend(definitions.into_iter().map(|line| (line, String::new())));
        edits.sort_by_key(|(span, _)| span.start);

        let mut text = splice(text, edits);
        if removed_definitions {
            trim_trailing_blank_lines(&mut text);
        }
        ReconciliationResult { text, report }
    }

    fn asset_target(&self, asset: &MediaAsset) -> String {
        let dir = self.media_dir.trim_end_matches('/');
        if dir.is_empty() {
            asset.original_name.clone()
        } else {
            format!("{}/{}", dir, asset.original_name)
        }
    }
}

/// `![alt](target)`, angle-bracketing targets that contain whitespace.
pub fn image_link(alt: &str, target: &str) -> String {
    if target.chars().any(char::is_whitespace) {
        format!("![{alt}](<{target}>)")
    } else {
        format!("![{alt}]({target})")
    }
}

/// Collapse trailing whitespace to a single line break.
fn trim_trailing_blank_lines(text: &mut String) {
    let kept = text.trim_end().len();
    if kept > 0 && kept < text.len() {
        text.truncate(kept);
        text.push('\n');
    }
}

/// Rebuild `text` with each `(span, replacement)` applied.
///
/// Spans must be ordered and disjoint.
pub(crate) fn splice(text: &str, edits: impl IntoIterator<Item = (Range<usize>, String)>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for (span, replacement) in edits {
        debug_assert!(span.start >= cursor, "edits must be ordered and disjoint");
        out.push_str(&text[cursor..span.start]);
        out.push_str(&replacement);
        cursor = span.end;
    }
    out.push_str(&text[cursor..]);
    out
}
