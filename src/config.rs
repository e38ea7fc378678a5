//! Configuration types for caption reconciliation.
//!
//! Two layers:
//!
//! * [`ReconcileConfig`] controls the engine itself: which caption phrases
//!   count as placeholders, which file extensions count as media, and which
//!   optional passes run. Built via [`ReconcileConfigBuilder`].
//! * [`Settings`] holds the user-facing knobs around the engine (media
//!   folder name, converter executable). Persisted as JSON and passed in
//!   explicitly; nothing here has a process-wide lifetime.

use crate::captions;
use crate::error::ReconcileError;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::path::Path;

/// Raster formats a converter extracts and a Markdown renderer can display.
pub const RASTER_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "tif", "tiff", "webp"];

/// One language's machine-generated caption phrasing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptionLocale {
    /// Language code, e.g. `"de"`.
    pub code: Cow<'static, str>,
    /// The fixed phrase that closes every generated caption.
    pub marker: Cow<'static, str>,
    /// Alt text of the marker left behind when no media file is available.
    pub not_found_alt: Cow<'static, str>,
}

impl CaptionLocale {
    /// A locale not shipped with the crate.
    pub fn custom(
        code: impl Into<String>,
        marker: impl Into<String>,
        not_found_alt: impl Into<String>,
    ) -> Self {
        Self {
            code: Cow::Owned(code.into()),
            marker: Cow::Owned(marker.into()),
            not_found_alt: Cow::Owned(not_found_alt.into()),
        }
    }
}

/// Configuration for one reconciliation pass.
///
/// # Example
/// ```rust
/// use docx2vault::{captions, ReconcileConfig};
///
/// let config = ReconcileConfig::builder()
///     .locales(vec![captions::ENGLISH])
///     .normalize_stray_links(false)
///     .build()
///     .unwrap();
/// assert_eq!(config.not_found_alt(), "Image not found");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Recognised caption phrasings. The first one supplies the not-found
    /// label. Default: all built-in locales, German first.
    pub locales: Vec<CaptionLocale>,

    /// Lower-case file extensions (without the dot) accepted as media.
    /// Default: [`RASTER_EXTENSIONS`].
    pub extensions: Vec<String>,

    /// Rewrite absolute targets of ordinary image links and link reference
    /// definitions to vault-relative paths after the caption pass.
    /// Default: true.
    pub normalize_stray_links: bool,

    /// Warn when a placeholder names a file other than the one it was
    /// paired with. Default: true.
    pub validate_pairing: bool,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            locales: captions::BUILTIN_LOCALES.to_vec(),
            extensions: RASTER_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            normalize_stray_links: true,
            validate_pairing: true,
        }
    }
}

impl ReconcileConfig {
    /// Create a new builder for `ReconcileConfig`.
    pub fn builder() -> ReconcileConfigBuilder {
        ReconcileConfigBuilder {
            config: Self::default(),
        }
    }

    /// Alt text used for placeholders left without a media file.
    pub fn not_found_alt(&self) -> &str {
        self.locales
            .first()
            .map(|l| &*l.not_found_alt)
            .unwrap_or(captions::DEFAULT_NOT_FOUND_ALT)
    }
}

/// Builder for [`ReconcileConfig`].
#[derive(Debug)]
pub struct ReconcileConfigBuilder {
    config: ReconcileConfig,
}

impl ReconcileConfigBuilder {
    pub fn locales(mut self, locales: Vec<CaptionLocale>) -> Self {
        self.config.locales = locales;
        self
    }

    /// Append a locale after the ones already configured.
    pub fn add_locale(mut self, locale: CaptionLocale) -> Self {
        self.config.locales.push(locale);
        self
    }

    pub fn extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.config.extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
            .collect();
        self
    }

    pub fn normalize_stray_links(mut self, v: bool) -> Self {
        self.config.normalize_stray_links = v;
        self
    }

    pub fn validate_pairing(mut self, v: bool) -> Self {
        self.config.validate_pairing = v;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ReconcileConfig, ReconcileError> {
        let c = &self.config;
        if c.locales.is_empty() {
            return Err(ReconcileError::InvalidConfig(
                "at least one caption locale is required".into(),
            ));
        }
        if let Some(l) = c.locales.iter().find(|l| l.marker.trim().is_empty()) {
            return Err(ReconcileError::InvalidConfig(format!(
                "caption locale '{}' has an empty marker phrase",
                l.code
            )));
        }
        // A not-found marker must not read as a caption on the next pass.
        for l in &c.locales {
            if let Some(m) = c
                .locales
                .iter()
                .find(|m| l.not_found_alt.ends_with(m.marker.trim()))
            {
                return Err(ReconcileError::InvalidConfig(format!(
                    "not-found label of caption locale '{}' ends with the marker phrase of '{}'",
                    l.code, m.code
                )));
            }
        }
        if c.extensions.iter().all(|e| e.is_empty()) {
            return Err(ReconcileError::InvalidConfig(
                "at least one media extension is required".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Settings ─────────────────────────────────────────────────────────────

/// User-facing settings around the engine, stored as JSON.
///
/// Missing fields fall back to their defaults, so an older settings file
/// keeps loading after new fields are added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Folder, relative to the vault root, that receives extracted media.
    /// Default: `"media"`.
    pub media_folder: String,

    /// Converter executable name or absolute path. Default: `"pandoc"`.
    pub converter_path: String,

    /// Upper bound on one converter run, in seconds. Default: 300.
    pub converter_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            media_folder: "media".to_string(),
            converter_path: "pandoc".to_string(),
            converter_timeout_secs: 300,
        }
    }
}

impl Settings {
    /// Load settings from a JSON file.
    ///
    /// A missing file yields the defaults; a malformed one is an error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ReconcileError> {
        let path = path.as_ref();
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No settings file at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ReconcileError::SettingsLoad {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })
            }
        };
        let mut settings: Settings =
            serde_json::from_str(&raw).map_err(|e| ReconcileError::SettingsLoad {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        settings.fill_blanks();
        Ok(settings)
    }

    /// Persist settings as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ReconcileError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ReconcileError::Internal(format!("serialise settings: {e}")))?;
        std::fs::write(path, json).map_err(|e| ReconcileError::WriteFailed {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Blank strings mean "use the default", matching the settings form.
    pub fn fill_blanks(&mut self) {
        let defaults = Self::default();
        if self.media_folder.trim().is_empty() {
            self.media_folder = defaults.media_folder;
        }
        if self.converter_path.trim().is_empty() {
            self.converter_path = defaults.converter_path;
        }
    }

    /// Folder handed to the converter for media extraction.
    pub fn extraction_dir_for(&self, base_name: &str) -> String {
        format!("{}/{}-images", self.media_folder.trim_end_matches('/'), base_name)
    }

    /// Folder the extracted images end up in, and that links point at.
    ///
    /// The converter nests extracted files one level deeper, under `media/`.
    pub fn media_dir_for(&self, base_name: &str) -> String {
        format!("{}/media", self.extraction_dir_for(base_name))
    }
}
