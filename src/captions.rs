//! Built-in caption phrases emitted by word processors for images without alt text.
//!
//! When a document has no real alt text, the word processor stores a
//! machine-generated description such as
//! `Ein Bild, das Text enthält. Automatisch generierte Beschreibung`.
//! The converter carries it into the Markdown as the image caption. Only the
//! trailing marker phrase is stable across images, so that is what the
//! scanner keys on; the free text before it varies per image.
//!
//! Every phrase lives here so adding a locale touches exactly one table.

use crate::config::CaptionLocale;
use std::borrow::Cow;

/// Failure label used when no locale is configured.
pub const DEFAULT_NOT_FOUND_ALT: &str = "Bild nicht gefunden";

/// German. Default locale.
pub const GERMAN: CaptionLocale = CaptionLocale {
    code: Cow::Borrowed("de"),
    marker: Cow::Borrowed("Automatisch generierte Beschreibung"),
    not_found_alt: Cow::Borrowed(DEFAULT_NOT_FOUND_ALT),
};

pub const ENGLISH: CaptionLocale = CaptionLocale {
    code: Cow::Borrowed("en"),
    marker: Cow::Borrowed("Description automatically generated"),
    not_found_alt: Cow::Borrowed("Image not found"),
};

pub const FRENCH: CaptionLocale = CaptionLocale {
    code: Cow::Borrowed("fr"),
    marker: Cow::Borrowed("Description générée automatiquement"),
    not_found_alt: Cow::Borrowed("Image introuvable"),
};

/// All built-in locales, default first.
pub const BUILTIN_LOCALES: &[CaptionLocale] = &[GERMAN, ENGLISH, FRENCH];

/// Look up a built-in locale by its language code (case-insensitive).
pub fn locale_by_code(code: &str) -> Option<CaptionLocale> {
    BUILTIN_LOCALES
        .iter()
        .find(|l| l.code.eq_ignore_ascii_case(code))
        .cloned()
}
