//! Vault access: the only place the library touches stored documents.
//!
//! The reconciliation engine itself is pure. Reading a document, listing
//! its media folder, and writing the result back go through the [`Vault`]
//! trait, so the same document-level operations run against a directory on
//! disk ([`FsVault`]) or an in-memory map ([`MemoryVault`]).
//!
//! All paths passed to a vault are relative to its root and `/`-separated.

use crate::error::ReconcileError;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Mutex;
use tracing::debug;

/// Capability set the document-level operations need from storage.
pub trait Vault {
    /// Absolute root every relative path is resolved against.
    fn root(&self) -> &Path;

    /// Read a UTF-8 text file.
    fn read_text(&self, path: &str) -> Result<String, ReconcileError>;

    /// Replace a text file's content, creating parent folders as needed.
    fn write_text(&self, path: &str, text: &str) -> Result<(), ReconcileError>;

    /// File names (not paths) directly inside a folder, in a stable order.
    fn list_directory(&self, path: &str) -> io::Result<Vec<String>>;
}

// ── FsVault ──────────────────────────────────────────────────────────────────

/// A vault backed by a directory on disk.
#[derive(Debug, Clone)]
pub struct FsVault {
    root: PathBuf,
}

impl FsVault {
    /// Open `root` as a vault. The directory must exist.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, ReconcileError> {
        let root = root.as_ref();
        let root = std::fs::canonicalize(root).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ReconcileError::FileNotFound {
                path: root.to_path_buf(),
            },
            _ => ReconcileError::ReadFailed {
                path: root.to_path_buf(),
                source: e,
            },
        })?;
        Ok(Self { root })
    }

    /// Resolve a vault-relative path, refusing anything that leaves the vault.
    pub fn resolve(&self, rel: &str) -> Result<PathBuf, ReconcileError> {
        let rel_path = Path::new(rel);
        let escapes = rel_path.components().any(|c| {
            matches!(
                c,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });
        if rel.is_empty() || escapes {
            return Err(ReconcileError::InvalidInput(format!(
                "'{rel}' is not a path inside the vault"
            )));
        }
        Ok(self.root.join(rel_path))
    }
}

impl Vault for FsVault {
    fn root(&self) -> &Path {
        &self.root
    }

    fn read_text(&self, path: &str) -> Result<String, ReconcileError> {
        let full = self.resolve(path)?;
        let bytes = std::fs::read(&full).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ReconcileError::FileNotFound { path: full.clone() },
            _ => ReconcileError::ReadFailed {
                path: full.clone(),
                source: e,
            },
        })?;
        String::from_utf8(bytes).map_err(|_| ReconcileError::NotUtf8 { path: full })
    }

    /// Atomic: the new content is written to a temporary file next to the
    /// target and renamed over it, so readers never see a partial file.
    fn write_text(&self, path: &str, text: &str) -> Result<(), ReconcileError> {
        let full = self.resolve(path)?;
        let write_err = |source: io::Error| ReconcileError::WriteFailed {
            path: full.clone(),
            source,
        };
        let parent = full.parent().unwrap_or(self.root.as_path());
        std::fs::create_dir_all(parent).map_err(write_err)?;

        let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(write_err)?;
        tmp.write_all(text.as_bytes()).map_err(write_err)?;
        tmp.persist(&full).map_err(|e| write_err(e.error))?;
        debug!("Wrote {} bytes to {}", text.len(), full.display());
        Ok(())
    }

    fn list_directory(&self, path: &str) -> io::Result<Vec<String>> {
        let full = self
            .resolve(path)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&full)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort_by(|a, b| natural_cmp(a, b));
        Ok(names)
    }
}

// ── MemoryVault ──────────────────────────────────────────────────────────────

/// A vault held entirely in memory.
///
/// Folders exist implicitly whenever a file lives below them. Listings use
/// the same natural order as [`FsVault`].
#[derive(Debug, Default)]
pub struct MemoryVault {
    root: PathBuf,
    files: Mutex<BTreeMap<String, String>>,
    writes: AtomicUsize,
}

impl MemoryVault {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    /// Add or replace a file without counting it as a write.
    pub fn insert(&self, path: impl Into<String>, text: impl Into<String>) {
        self.lock().insert(path.into(), text.into());
    }

    pub fn get(&self, path: &str) -> Option<String> {
        self.lock().get(path).cloned()
    }

    /// Number of successful [`Vault::write_text`] calls so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(AtomicOrdering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        // A poisoned map is still a consistent map; no write is left half-done.
        self.files.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Vault for MemoryVault {
    fn root(&self) -> &Path {
        &self.root
    }

    fn read_text(&self, path: &str) -> Result<String, ReconcileError> {
        self.get(path).ok_or_else(|| ReconcileError::FileNotFound {
            path: self.root.join(path),
        })
    }

    fn write_text(&self, path: &str, text: &str) -> Result<(), ReconcileError> {
        self.lock().insert(path.to_string(), text.to_string());
        self.writes.fetch_add(1, AtomicOrdering::SeqCst);
        Ok(())
    }

    fn list_directory(&self, path: &str) -> io::Result<Vec<String>> {
        let prefix = format!("{}/", path.trim_end_matches('/'));
        let files = self.lock();
        let mut found = false;
        let mut names: Vec<String> = Vec::new();
        for key in files.keys().filter(|k| k.starts_with(&prefix)) {
            found = true;
            let rest = &key[prefix.len()..];
            if !rest.contains('/') {
                names.push(rest.to_string());
            }
        }
        if !found {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such folder: {path}"),
            ));
        }
        names.sort_by(|a, b| natural_cmp(a, b));
        Ok(names)
    }
}

// ── Ordering ─────────────────────────────────────────────────────────────────

/// Compare names so embedded numbers sort by value: `image9` < `image10`.
///
/// Digit runs compare numerically (ties broken by length, so `01` > `1`),
/// everything else compares case-insensitively and then byte-wise.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let (mut x, mut y) = (a, b);
    loop {
        match (x.chars().next(), y.chars().next()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(cx), Some(cy)) if cx.is_ascii_digit() && cy.is_ascii_digit() => {
                let (dx, rx) = split_digits(x);
                let (dy, ry) = split_digits(y);
                let (tx, ty) = (dx.trim_start_matches('0'), dy.trim_start_matches('0'));
                let ord = tx
                    .len()
                    .cmp(&ty.len())
                    .then_with(|| tx.cmp(ty))
                    .then_with(|| dx.len().cmp(&dy.len()));
                if ord != Ordering::Equal {
                    return ord;
                }
                x = rx;
                y = ry;
            }
            (Some(cx), Some(cy)) => {
                let ord = cx.to_lowercase().cmp(cy.to_lowercase());
                if ord != Ordering::Equal {
                    return ord;
                }
                x = &x[cx.len_utf8()..];
                y = &y[cy.len_utf8()..];
            }
        }
    }
}

fn split_digits(s: &str) -> (&str, &str) {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    s.split_at(end)
}
