//! Placeholder scanning: find converter-generated image captions.
//!
//! A word processor stores a generated description for every image that
//! lacks alt text, and the converter writes that description into the
//! Markdown in one of two shapes depending on its link settings:
//!
//! ```text
//! InlineCaption           ![Ein Bild, das Text enthält. Automatisch generierte Beschreibung](media/image1.png){width="3in" height="2in"}
//! ReferenceStyleCaption   [Ein Bild, das Text enthält. Automatisch generierte Beschreibung]: C:\Vault\media\image1.png {width="3in" height="2in"}
//! ```
//!
//! Both shapes are compiled into one alternation so matches come out in a
//! single left-to-right pass, strictly ordered and never overlapping. The
//! free text before the marker phrase is matched lazily and may not cross a
//! `]` or a line break, so an ordinary caption followed later on the line by
//! a generated one cannot be swallowed into a single match.
//!
//! With reference links the converter writes each image twice, a shortcut
//! in the body and a definition at the end:
//!
//! ```text
//! ![Ein Bild. Automatisch generierte Beschreibung]
//!
//!   [Ein Bild. Automatisch generierte Beschreibung]: </my vault/media/image1.png> {width="1in" height="1in"}
//! ```
//!
//! Both halves are reported by [`PlaceholderScanner::scan`]; joining them
//! into one image is left to the caller, using [`reference_definitions`]
//! and [`label_key`].

use crate::config::{CaptionLocale, ReconcileConfig};
use crate::error::ReconcileError;
use once_cell::sync::Lazy;
use regex::{CaptureMatches, Captures, Regex};
use std::ops::Range;

/// `width="…"` / `height="…"` pairs in either order, one or more.
const SIZE_ATTRS: &str =
    r#"(?:width|height)="[^"\n]*"(?:[ \t]+(?:width|height)="[^"\n]*")*"#;

/// Which of the two placeholder syntaxes a match came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum PlaceholderShape {
    /// `![caption](target?)(size?)`
    InlineCaption,
    /// `[caption]: /absolute/path {size}`
    ReferenceStyleCaption,
}

/// One placeholder found in the source text. All spans are byte offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderMatch {
    /// The whole placeholder, replaced wholesale by the rewriter.
    pub span: Range<usize>,
    pub shape: PlaceholderShape,
    /// Caption text between the first pair of brackets.
    pub label: Range<usize>,
    /// Label of a full reference, `![caption][label]`.
    pub reference: Option<Range<usize>>,
    /// Link target carried by the placeholder: the absolute file path for
    /// reference-style captions, the (often empty) target for inline ones.
    pub target: Option<Range<usize>>,
    /// The width/height attribute block, delimiters included.
    pub size: Option<Range<usize>>,
}

impl PlaceholderMatch {
    /// The matched text.
    pub fn as_str<'t>(&self, text: &'t str) -> &'t str {
        &text[self.span.clone()]
    }

    /// The captured target, if any and non-empty.
    pub fn target_str<'t>(&self, text: &'t str) -> Option<&'t str> {
        self.target
            .clone()
            .map(|r| &text[r])
            .filter(|t| !t.trim().is_empty())
    }

    /// Label of the definition an inline caption without a target points at.
    ///
    /// `![caption]` and `![caption][]` use the caption itself,
    /// `![caption][label]` uses `label`. `None` for reference-style captions
    /// and inline captions that carry a `(target)`.
    pub fn reference_label<'t>(&self, text: &'t str) -> Option<&'t str> {
        if self.shape != PlaceholderShape::InlineCaption || self.target.is_some() {
            return None;
        }
        let explicit = self
            .reference
            .clone()
            .map(|r| &text[r])
            .filter(|l| !l.trim().is_empty());
        Some(explicit.unwrap_or(&text[self.label.clone()]))
    }
}

/// Compiled scanner for a fixed set of caption locales.
#[derive(Debug, Clone)]
pub struct PlaceholderScanner {
    pattern: Regex,
}

impl PlaceholderScanner {
    /// Compile a scanner recognising every marker phrase in `locales`.
    pub fn new(locales: &[CaptionLocale]) -> Result<Self, ReconcileError> {
        if locales.is_empty() {
            return Err(ReconcileError::InvalidConfig(
                "at least one caption locale is required".into(),
            ));
        }
        let markers = locales
            .iter()
            .map(|l| regex::escape(l.marker.trim()))
            .collect::<Vec<_>>()
            .join("|");

        let inline = format!(
            r#"!\[(?P<inline_label>[^\]\n]*?(?:{markers}))\](?:\((?:<(?P<inline_target_angled>[^>\n]*)>|(?P<inline_target>[^()\s]*))\)|\[(?P<inline_ref>[^\]\n]*)\])?(?:[ \t]*(?P<inline_size>\({SIZE_ATTRS}\)|\{{{SIZE_ATTRS}\}}))?"#
        );
        let reference = format!(
            r#"\[(?P<ref_label>[^\]\n]*?(?:{markers}))\]:[ \t]*(?:<(?P<ref_path_angled>[^>\n]*)>|(?P<ref_path>\S+))[ \t]*(?P<ref_size>\{{{SIZE_ATTRS}\}})"#
        );
        // Up to three spaces of indentation belong to the line, not the placeholder.
        let pattern = Regex::new(&format!(
            r"(?m)(?P<inline>{inline})|^[ \t]{{0,3}}(?P<reference>{reference})"
        ))
        .map_err(|e| ReconcileError::InvalidConfig(format!("caption pattern: {e}")))?;

        Ok(Self { pattern })
    }

    pub fn from_config(config: &ReconcileConfig) -> Result<Self, ReconcileError> {
        Self::new(&config.locales)
    }

    /// Lazily yield every placeholder in `text`, in document order.
    ///
    /// Scanning never mutates `text`; calling it again yields the same
    /// sequence.
    pub fn scan<'r, 't>(&'r self, text: &'t str) -> Placeholders<'r, 't> {
        Placeholders {
            inner: self.pattern.captures_iter(text),
        }
    }

    /// Whether `text` contains at least one placeholder.
    pub fn has_placeholders(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }
}

/// Iterator returned by [`PlaceholderScanner::scan`].
pub struct Placeholders<'r, 't> {
    inner: CaptureMatches<'r, 't>,
}

impl Iterator for Placeholders<'_, '_> {
    type Item = PlaceholderMatch;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().and_then(|caps| to_match(&caps))
    }
}

fn to_match(caps: &Captures<'_>) -> Option<PlaceholderMatch> {
    let span = |name: &str| caps.name(name).map(|m| m.range());

    if let Some(whole) = span("inline") {
        return Some(PlaceholderMatch {
            span: whole,
            shape: PlaceholderShape::InlineCaption,
            label: span("inline_label")?,
            reference: span("inline_ref"),
            target: span("inline_target_angled").or_else(|| span("inline_target")),
            size: span("inline_size"),
        });
    }
    let whole = span("reference")?;
    Some(PlaceholderMatch {
        span: whole,
        shape: PlaceholderShape::ReferenceStyleCaption,
        label: span("ref_label")?,
        reference: None,
        target: span("ref_path_angled").or_else(|| span("ref_path")),
        size: span("ref_size"),
    })
}

// ── Reference definitions ────────────────────────────────────────────────────

/// Any link reference definition line, whatever its label.
///
/// The converter falls back to numeric labels (`![caption][2]`) when two
/// images share a caption, so definitions are looked up independently of
/// the caption markers.
static RE_DEFINITION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^[ \t]{0,3}\[(?P<label>[^\]\n]+)\]:[ \t]*(?:<(?P<angled>[^>\n]*)>|(?P<plain>\S+))[^\n]*\n?",
    )
    .unwrap()
});

/// One `[label]: target ...` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceDefinition {
    /// Normalised with [`label_key`].
    pub key: String,
    /// The whole line, indentation and line break included.
    pub line: Range<usize>,
    /// The link destination, without angle brackets.
    pub target: Range<usize>,
}

impl ReferenceDefinition {
    pub fn target_str<'t>(&self, text: &'t str) -> &'t str {
        &text[self.target.clone()]
    }
}

/// Every reference definition in `text`, in document order.
pub fn reference_definitions(text: &str) -> Vec<ReferenceDefinition> {
    RE_DEFINITION
        .captures_iter(text)
        .filter_map(|caps| {
            let line = caps.get(0)?.range();
            let label = caps.name("label")?.as_str();
            let target = caps.name("angled").or_else(|| caps.name("plain"))?.range();
            Some(ReferenceDefinition {
                key: label_key(label),
                line,
                target,
            })
        })
        .collect()
}

/// Labels match case-insensitively, with runs of whitespace collapsed.
pub fn label_key(label: &str) -> String {
    label
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::captions;

    fn scanner() -> PlaceholderScanner {
        PlaceholderScanner::new(&[captions::GERMAN, captions::ENGLISH]).unwrap()
    }

    #[test]
    fn test_inline_bare() {
        let text = "Intro\n![Ein Bild, das Text enthält. Automatisch generierte Beschreibung]\nOutro";
        let found: Vec<_> = scanner().scan(text).collect();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].shape, PlaceholderShape::InlineCaption);
        assert!(found[0].as_str(text).starts_with("![Ein Bild"));
        assert!(found[0].as_str(text).ends_with("Beschreibung]"));
        assert_eq!(found[0].target, None);
    }

    #[test]
    fn test_inline_with_target_and_braced_size() {
        let text = r#"![Ein Bild, das Diagramm enthält. Automatisch generierte Beschreibung](media/image1.png){width="6.3in" height="2.1in"} tail"#;
        let found: Vec<_> = scanner().scan(text).collect();
        assert_eq!(found.len(), 1);
        let m = &found[0];
        assert_eq!(m.target_str(text), Some("media/image1.png"));
        assert_eq!(&text[m.size.clone().unwrap()], r#"{width="6.3in" height="2.1in"}"#);
        assert_eq!(&text[m.span.end..], " tail");
    }

    #[test]
    fn test_inline_with_empty_target_and_parenthesised_size() {
        let text = r#"![A picture containing text Description automatically generated]() (width="1in" height="2in")"#;
        let found: Vec<_> = scanner().scan(text).collect();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].span, 0..text.len());
        assert_eq!(found[0].target_str(text), None);
        assert_eq!(&text[found[0].size.clone().unwrap()], r#"(width="1in" height="2in")"#);
    }

    #[test]
    fn test_inline_size_block_directly_as_target() {
        let text = r#"![x Automatisch generierte Beschreibung](width="1in" height="2in")"#;
        let found: Vec<_> = scanner().scan(text).collect();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].span, 0..text.len());
        assert!(found[0].size.is_some());
    }

    #[test]
    fn test_reference_style() {
        let text = "Body\n\n[Ein Bild, das Text enthält. Automatisch generierte Beschreibung]: C:\\Vault\\media\\image1.png {width=\"3in\" height=\"2in\"}\n";
        let found: Vec<_> = scanner().scan(text).collect();
        assert_eq!(found.len(), 1);
        let m = &found[0];
        assert_eq!(m.shape, PlaceholderShape::ReferenceStyleCaption);
        assert_eq!(m.target_str(text), Some("C:\\Vault\\media\\image1.png"));
        assert!(m.as_str(text).ends_with("height=\"2in\"}"));
    }

    #[test]
    fn test_reference_style_angled_path_with_spaces() {
        let text = "[x Automatisch generierte Beschreibung]: </my vault/media/image 1.png> {height=\"2in\" width=\"3in\"}";
        let found: Vec<_> = scanner().scan(text).collect();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].target_str(text), Some("/my vault/media/image 1.png"));
    }

    #[test]
    fn test_reference_style_requires_size_block() {
        let text = "[x Automatisch generierte Beschreibung]: /vault/media/image1.png\n";
        assert_eq!(scanner().scan(text).count(), 0);
    }

    #[test]
    fn test_ordinary_captions_ignored() {
        let text = "![A chart of sales](chart.png)\n[link]: /abs/path.png {width=\"1in\"}\n![Automatisch erstellt]";
        assert_eq!(scanner().scan(text).count(), 0);
        assert!(!scanner().has_placeholders(text));
    }

    #[test]
    fn test_does_not_swallow_preceding_caption() {
        let text = "![real caption](a.png) ![b Automatisch generierte Beschreibung]";
        let found: Vec<_> = scanner().scan(text).collect();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].as_str(text), "![b Automatisch generierte Beschreibung]");
    }

    #[test]
    fn test_matches_ordered_and_disjoint() {
        let text = "![a Automatisch generierte Beschreibung] mid ![b Description automatically generated]\n\
                    [c Automatisch generierte Beschreibung]: /v/c.png {width=\"1in\" height=\"1in\"}";
        let found: Vec<_> = scanner().scan(text).collect();
        assert_eq!(found.len(), 3);
        for pair in found.windows(2) {
            assert!(pair[0].span.end <= pair[1].span.start);
        }
        assert_eq!(found[2].shape, PlaceholderShape::ReferenceStyleCaption);
    }

    #[test]
    fn test_scan_is_restartable() {
        let s = scanner();
        let text = "![a Automatisch generierte Beschreibung] ![b Automatisch generierte Beschreibung]";
        let first: Vec<_> = s.scan(text).collect();
        let second: Vec<_> = s.scan(text).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_inline_angled_target_with_spaces() {
        let text = r#"A ![x Automatisch generierte Beschreibung](</my vault/media/Q R-images/media/image1.png>){width="1in" height="1in"} B"#;
        let found: Vec<_> = scanner().scan(text).collect();
        assert_eq!(found.len(), 1);
        let m = &found[0];
        assert_eq!(m.target_str(text), Some("/my vault/media/Q R-images/media/image1.png"));
        assert_eq!(&text[..m.span.start], "A ");
        assert_eq!(&text[m.span.end..], " B");
    }

    #[test]
    fn test_indented_definition_span_starts_at_bracket() {
        let text = "Body\n\n   [x Automatisch generierte Beschreibung]: /v/a.png {width=\"1in\"}\n";
        let found: Vec<_> = scanner().scan(text).collect();
        assert_eq!(found.len(), 1);
        assert!(found[0].as_str(text).starts_with("[x "));
        assert_eq!(&text[found[0].span.start - 3..found[0].span.start], "   ");
        assert_eq!(&text[found[0].label.clone()], "x Automatisch generierte Beschreibung");
    }

    #[test]
    fn test_reference_label() {
        let text = "![a Automatisch generierte Beschreibung] ![b Automatisch generierte Beschreibung][2] \
                    ![c Automatisch generierte Beschreibung][] ![d Automatisch generierte Beschreibung]()";
        let labels: Vec<_> = scanner().scan(text).map(|m| m.reference_label(text)).collect();
        assert_eq!(
            labels,
            vec![
                Some("a Automatisch generierte Beschreibung"),
                Some("2"),
                Some("c Automatisch generierte Beschreibung"),
                None,
            ]
        );
    }

    #[test]
    fn test_reference_definitions() {
        let text = "![x]\n\n  [Ein  Bild]: </my vault/a.png> {width=\"1in\"}\n[2]: /v/b.png\nnot [a]: def\n";
        let defs = reference_definitions(text);
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].key, "ein bild");
        assert_eq!(defs[0].target_str(text), "/my vault/a.png");
        assert_eq!(&text[defs[0].line.clone()], "  [Ein  Bild]: </my vault/a.png> {width=\"1in\"}\n");
        assert_eq!(defs[1].key, "2");
        assert_eq!(defs[1].target_str(text), "/v/b.png");
    }

    #[test]
    fn test_label_key() {
        assert_eq!(label_key("  Ein Bild,\tdas  Text "), "ein bild, das text");
    }

    #[test]
    fn test_marker_is_literal_not_regex() {
        let s = PlaceholderScanner::new(&[CaptionLocale::custom("xx", "auto (gen.)", "?")]).unwrap();
        assert_eq!(s.scan("![pic auto (gen.)]").count(), 1);
        assert_eq!(s.scan("![pic auto gen]").count(), 0);
    }
}
