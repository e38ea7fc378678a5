//! External document converter: `.docx` in, Markdown plus extracted media out.
//!
//! ## Why shell out?
//!
//! Word documents are zip archives of OOXML parts; turning them into
//! faithful Markdown is pandoc's job, not ours. We only decide where the
//! outputs land and give the run a time limit. Pandoc writes extracted
//! images into a `media/` folder below the directory passed to
//! `--extract-media`, which is why [`crate::config::Settings::media_dir_for`]
//! nests one level deeper than the extraction directory.
//!
//! The input is checked for the zip signature (`PK\x03\x04`) first so that a
//! renamed text file fails with a clear error instead of pandoc's.

use crate::config::Settings;
use crate::error::ReconcileError;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tracing::{debug, info};

const ZIP_MAGIC: [u8; 4] = *b"PK\x03\x04";

/// Fixed pandoc options: ATX headings, no hard wrapping, reference-style
/// links so image paths appear once per definition, and no HTML comments.
const CONVERTER_FLAGS: &[&str] = &[
    "-f",
    "docx+styles",
    "-t",
    "markdown",
    "--wrap=none",
    "--markdown-headings=atx",
    "--reference-links",
    "--strip-comments",
];

/// One planned converter run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConverterJob {
    /// Source `.docx` file.
    pub input: PathBuf,
    /// Markdown file to produce, `{vault}/{stem}.md`.
    pub output: PathBuf,
    /// Directory handed to `--extract-media`.
    pub extraction_dir: PathBuf,
    /// Document stem; the base name for reconciliation.
    pub base_name: String,
}

impl ConverterJob {
    /// Plan a conversion of `input` into the vault at `root`.
    ///
    /// Checks that the input exists, has a `.docx` extension and starts
    /// with a zip signature. Nothing is written yet.
    pub fn for_vault(input: &Path, root: &Path, settings: &Settings) -> Result<Self, ReconcileError> {
        let is_docx = input
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("docx"));
        if !is_docx {
            return Err(ReconcileError::UnsupportedInput {
                path: input.to_path_buf(),
            });
        }
        check_signature(input)?;

        let base_name = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ReconcileError::InvalidInput(format!("'{}' has no file name", input.display())))?;

        let job = Self {
            input: input.to_path_buf(),
            output: root.join(format!("{base_name}.md")),
            extraction_dir: root.join(settings.extraction_dir_for(&base_name)),
            base_name,
        };
        debug!("Planned conversion: {:?}", job);
        Ok(job)
    }

    /// Vault-relative path of the produced Markdown file.
    pub fn markdown_rel_path(&self) -> String {
        format!("{}.md", self.base_name)
    }

    /// Full argument list, input first, in the order pandoc receives it.
    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![self.input.clone().into_os_string(), "-o".into()];
        args.push(self.output.clone().into_os_string());
        args.extend(CONVERTER_FLAGS.iter().map(OsString::from));
        let mut extract = OsString::from("--extract-media=");
        extract.push(&self.extraction_dir);
        args.push(extract);
        args
    }
}

fn check_signature(input: &Path) -> Result<(), ReconcileError> {
    use std::io::Read;

    let mut file = std::fs::File::open(input).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ReconcileError::FileNotFound {
            path: input.to_path_buf(),
        },
        _ => ReconcileError::ReadFailed {
            path: input.to_path_buf(),
            source: e,
        },
    })?;
    let mut magic = [0u8; 4];
    if file.read_exact(&mut magic).is_err() || magic != ZIP_MAGIC {
        return Err(ReconcileError::UnsupportedInput {
            path: input.to_path_buf(),
        });
    }
    Ok(())
}

/// Run the converter for `job`, bounded by `settings.converter_timeout_secs`.
///
/// The extraction directory is created first. On timeout the child process
/// is killed.
pub async fn run(job: &ConverterJob, settings: &Settings) -> Result<(), ReconcileError> {
    tokio::fs::create_dir_all(&job.extraction_dir)
        .await
        .map_err(|e| ReconcileError::WriteFailed {
            path: job.extraction_dir.clone(),
            source: e,
        })?;

    let program = settings.converter_path.as_str();
    info!("Running {} on {}", program, job.input.display());

    let child = tokio::process::Command::new(program)
        .args(job.args())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| ReconcileError::ConverterNotFound {
            program: program.to_string(),
            source: e,
        })?;

    let secs = settings.converter_timeout_secs;
    let output = tokio::time::timeout(Duration::from_secs(secs), child.wait_with_output())
        .await
        .map_err(|_| ReconcileError::ConverterTimeout { secs })?
        .map_err(|e| ReconcileError::Internal(format!("waiting for converter: {e}")))?;

    if !output.status.success() {
        return Err(ReconcileError::ConverterFailed {
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}
