//! Path normalisation: absolute file-system paths → vault-relative link paths.
//!
//! Converters that run with reference links embed the absolute path of each
//! extracted image, in the host's own separator style. Links inside a vault
//! must be relative to the vault root and slash-separated to render on every
//! platform.
//!
//! Both inputs are slash-normalised before comparison, so a Windows path
//! such as `C:\Vault\media\a.png` relativises against `C:\Vault` on any
//! host. A path that would need `..` to reach, or that sits on another
//! drive, is left as it is and reported.

use crate::error::PathResolutionError;
use crate::pipeline::rewrite::splice;
use once_cell::sync::Lazy;
use pathdiff::diff_paths;
use regex::Regex;
use std::path::{Component, Path};

/// Express `absolute` relative to `root`, using `/` separators.
pub fn normalize(absolute: &str, root: &Path) -> Result<String, PathResolutionError> {
    let root_str = to_forward_slashes(&root.to_string_lossy());
    let fail = |reason: &str| PathResolutionError {
        path: absolute.to_string(),
        root: root_str.clone(),
        reason: reason.to_string(),
    };

    let path_str = to_forward_slashes(absolute);
    if !looks_absolute(&path_str) {
        return Err(fail("path is not absolute"));
    }

    let relative = diff_paths(Path::new(&path_str), Path::new(&root_str))
        .ok_or_else(|| fail("path and root are not comparable"))?;

    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            Component::ParentDir => return Err(fail("path lies outside the root")),
            Component::RootDir | Component::Prefix(_) => {
                return Err(fail("path is on a different root"))
            }
        }
    }
    if parts.is_empty() {
        return Err(fail("path is the root itself"));
    }
    Ok(parts.join("/"))
}

/// `true` for `/x`, `\\server\x`, and drive paths like `C:\x` or `C:/x`.
pub fn looks_absolute(path: &str) -> bool {
    let bytes = path.as_bytes();
    match bytes {
        [b'/' | b'\\', ..] => true,
        [drive, b':', b'/' | b'\\', ..] => drive.is_ascii_alphabetic(),
        _ => false,
    }
}

fn to_forward_slashes(path: &str) -> String {
    path.replace('\\', "/")
}

// ── Stray links ──────────────────────────────────────────────────────────────
//
// Ordinary image links and link reference definitions can also carry an
// absolute path when the converter wrote them. Only the target span is
// touched; everything else on the line stays byte-identical.

static RE_LINK_TARGET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)!\[[^\]\n]*\]\((?:<(?P<image_angled>[^>\n]+)>|(?P<image>[^)\s]+))|^[ \t]{0,3}\[[^\]\n]+\]:[ \t]*(?:<(?P<def_angled>[^>\n]+)>|(?P<def>\S+))",
    )
    .unwrap()
});

/// Rewrite absolute link targets in `text` to root-relative ones.
///
/// Targets that cannot be relativised are kept and returned as errors.
pub fn normalize_stray_links(text: &str, root: &Path) -> (String, Vec<PathResolutionError>) {
    let mut edits = Vec::new();
    let mut failures = Vec::new();

    for caps in RE_LINK_TARGET.captures_iter(text) {
        let Some(target) = ["image_angled", "image", "def_angled", "def"]
            .iter()
            .find_map(|name| caps.name(name))
        else {
            continue;
        };
        if !looks_absolute(target.as_str()) {
            continue;
        }
        match normalize(target.as_str(), root) {
            Ok(relative) => edits.push((target.range(), relative)),
            Err(e) => failures.push(e),
        }
    }

    if edits.is_empty() {
        return (text.to_string(), failures);
    }
    (splice(text, edits), failures)
}
