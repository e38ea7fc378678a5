//! Integration tests for the reconciliation engine and the vault-level
//! operations built on it.
//!
//! Disk-backed cases run against a throwaway vault in a `TempDir`.

use docx2vault::{
    clean_document, clean_documents, reconcile, BatchProgressCallback, CleanOptions,
    DocumentContext, FsVault, MemoryVault, ReconcileConfig, ReconcileError, ReconcileWarning,
    Reconciler, ReconciliationReport, Rename, Settings, Vault,
};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ── Test helpers ─────────────────────────────────────────────────────────────

const CAPTION_A: &str = "![Ein Bild, das Text enthält. Automatisch generierte Beschreibung]";
const CAPTION_B: &str =
    "![Ein Bild, das Diagramm enthält. Automatisch generierte Beschreibung](){width=\"6.3in\" height=\"3.1in\"}";

fn ctx(root: &Path) -> DocumentContext<'_> {
    DocumentContext {
        base_name: "Report",
        media_dir: "media/Report-images/media",
        vault_root: root,
    }
}

fn engine() -> Reconciler {
    Reconciler::new(ReconcileConfig::default()).unwrap()
}

fn tempvault() -> (tempfile::TempDir, FsVault) {
    let dir = tempfile::tempdir().unwrap();
    let vault = FsVault::open(dir.path()).unwrap();
    (dir, vault)
}

fn add_images(vault: &FsVault, base: &str, names: &[&str]) {
    let media = vault.root().join(Settings::default().media_dir_for(base));
    std::fs::create_dir_all(&media).unwrap();
    for name in names {
        std::fs::write(media.join(name), b"\x89PNG").unwrap();
    }
}

// ── Pure engine ──────────────────────────────────────────────────────────────

#[test]
fn test_two_inline_captions_paired_in_order() {
    let text = format!("# Report\n\n{CAPTION_A}\n\nSome text.\n\n{CAPTION_B}\n");
    let result = reconcile(
        &text,
        &["imgA.png", "imgB.jpg"],
        &ctx(Path::new("/vault")),
        &ReconcileConfig::default(),
    )
    .unwrap();

    assert_eq!(
        result.text,
        "# Report\n\n![Report-img1.png](media/Report-images/media/imgA.png)\n\nSome text.\n\n\
         ![Report-img2.jpg](media/Report-images/media/imgB.jpg)\n"
    );
    assert_eq!(
        result.report.renames,
        vec![
            Rename {
                original_name: "imgA.png".into(),
                new_name: "Report-img1.png".into(),
            },
            Rename {
                original_name: "imgB.jpg".into(),
                new_name: "Report-img2.jpg".into(),
            },
        ]
    );
    assert_eq!(result.report.unresolved_placeholders, 0);
    assert_eq!(result.report.unused_assets, 0);
}

#[test]
fn test_no_placeholders_leaves_text_and_counts_assets() {
    let text = "# Plain\n\n![a real caption](media/a.png)\n";
    let listing = ["image1.png", "image2.png", "notes.txt", "image3.jpeg"];
    let result = engine()
        .reconcile(text, &listing, &ctx(Path::new("/vault")))
        .unwrap();

    assert_eq!(result.text, text);
    assert!(result.report.renames.is_empty());
    assert_eq!(result.report.unused_assets, 3);
    assert_eq!(result.report.assets_found, 3);
}

#[test]
fn test_rerun_on_clean_output_is_noop() {
    let text = format!("{CAPTION_A} and {CAPTION_B} and {CAPTION_A}");
    let root = Path::new("/vault");
    let first = engine().reconcile(&text, &["a.png"], &ctx(root)).unwrap();
    assert_eq!(first.report.unresolved_placeholders, 2);

    let second = engine()
        .reconcile(&first.text, &[] as &[&str], &ctx(root))
        .unwrap();
    assert_eq!(second.text, first.text);
    assert!(second.report.renames.is_empty());
    assert_eq!(second.report.unresolved_placeholders, 0);
    assert_eq!(second.report.unused_assets, 0);
}

#[test]
fn test_reference_style_paths_made_relative() {
    let text = "Intro\n\n\
        [Ein Bild, das Text enthält. Automatisch generierte Beschreibung]: /vault/media/x/img1.png {width=\"6in\" height=\"2in\"}\n\n\
        [Ein Bild. Automatisch generierte Beschreibung]: /other/img2.png {width=\"1in\" height=\"1in\"}\n";
    let result = engine()
        .reconcile(text, &["img1.png", "img2.png"], &ctx(Path::new("/vault")))
        .unwrap();

    assert_eq!(
        result.text,
        "Intro\n\n![Report-img1.png](media/x/img1.png)\n\n![Report-img2.png](/other/img2.png)\n"
    );
    assert_eq!(result.report.warnings.len(), 1);
    match &result.report.warnings[0] {
        ReconcileWarning::PathResolution(e) => assert_eq!(e.path, "/other/img2.png"),
        other => panic!("unexpected warning: {other:?}"),
    }
}

#[test]
fn test_reference_links_output_counts_each_image_once() {
    let text = "# Report\n\n\
        ![Ein Bild, das Text enthält. Automatisch generierte Beschreibung]\n\n\
        Some text.\n\n\
        ![Ein Bild, das Diagramm enthält. Automatisch generierte Beschreibung]\n\n  \
        [Ein Bild, das Text enthält. Automatisch generierte Beschreibung]: /vault/media/Report-images/media/image1.png {width=\"6in\" height=\"2in\"}\n  \
        [Ein Bild, das Diagramm enthält. Automatisch generierte Beschreibung]: /vault/media/Report-images/media/image2.png {width=\"6in\" height=\"3in\"}\n";
    let result = engine()
        .reconcile(text, &["image1.png", "image2.png"], &ctx(Path::new("/vault")))
        .unwrap();

    assert_eq!(
        result.text,
        "# Report\n\n\
         ![Report-img1.png](media/Report-images/media/image1.png)\n\n\
         Some text.\n\n\
         ![Report-img2.png](media/Report-images/media/image2.png)\n"
    );
    let r = &result.report;
    assert_eq!(r.placeholders_found, 2);
    assert_eq!(r.unresolved_placeholders, 0);
    assert_eq!(r.renames.len(), 2);
    assert!(r.is_clean(), "{r:?}");
    assert!(!result.text.contains("Bild nicht gefunden"));
}

#[test]
fn test_english_captions_with_english_label() {
    let config = ReconcileConfig::builder()
        .locales(vec![docx2vault::captions::ENGLISH])
        .build()
        .unwrap();
    let text = "![A picture containing text. Description automatically generated] \
                ![Ein Bild. Automatisch generierte Beschreibung]";
    let result = reconcile(text, &[] as &[&str], &ctx(Path::new("/vault")), &config).unwrap();

    // only the English caption is recognised
    assert_eq!(
        result.text,
        "![Image not found]() ![Ein Bild. Automatisch generierte Beschreibung]"
    );
    assert_eq!(result.report.placeholders_found, 1);
}

#[test]
fn test_report_serialises_to_json() {
    let result = engine()
        .reconcile(CAPTION_A, &["image1.png"], &ctx(Path::new("/vault")))
        .unwrap();
    let json = serde_json::to_value(&result.report).unwrap();
    assert_eq!(json["renames"][0]["new_name"], "Report-img1.png");
    assert_eq!(json["unresolved_placeholders"], 0);
}

// ── Disk-backed vault ────────────────────────────────────────────────────────

#[test]
fn test_clean_document_on_disk() {
    let (_dir, vault) = tempvault();
    add_images(&vault, "Report", &["image10.png", "image2.png", "image1.png"]);
    vault
        .write_text("Report.md", &format!("{CAPTION_A}\n{CAPTION_A}\n{CAPTION_A}\n"))
        .unwrap();

    let outcome = clean_document(
        &vault,
        "Report.md",
        &Settings::default(),
        &engine(),
        &CleanOptions::default(),
    )
    .unwrap();

    assert!(outcome.written);
    assert_eq!(
        vault.read_text("Report.md").unwrap(),
        "![Report-img1.png](media/Report-images/media/image1.png)\n\
         ![Report-img2.png](media/Report-images/media/image2.png)\n\
         ![Report-img3.png](media/Report-images/media/image10.png)\n"
    );
}

#[test]
fn test_clean_document_reference_style_against_real_root() {
    let (_dir, vault) = tempvault();
    add_images(&vault, "Report", &["image1.png"]);
    let absolute = vault
        .root()
        .join("media/Report-images/media/image1.png")
        .display()
        .to_string();
    vault
        .write_text(
            "Report.md",
            &format!(
                "[x. Automatisch generierte Beschreibung]: {absolute} {{width=\"2in\" height=\"1in\"}}\n"
            ),
        )
        .unwrap();

    let outcome = clean_document(
        &vault,
        "Report.md",
        &Settings::default(),
        &engine(),
        &CleanOptions::default(),
    )
    .unwrap();

    assert!(outcome.report.is_clean(), "{:?}", outcome.report);
    assert_eq!(
        vault.read_text("Report.md").unwrap(),
        "![Report-img1.png](media/Report-images/media/image1.png)\n"
    );
}

#[test]
fn test_clean_document_converter_shaped_output() {
    let (_dir, vault) = tempvault();
    add_images(&vault, "Quarterly Report", &["image1.png"]);
    let absolute = vault
        .root()
        .join("media/Quarterly Report-images/media/image1.png")
        .display()
        .to_string();
    vault
        .write_text(
            "Quarterly Report.md",
            &format!(
                "# Imported\n\n![Ein Bild. Automatisch generierte Beschreibung]\n\n  \
                 [Ein Bild. Automatisch generierte Beschreibung]: <{absolute}> {{width=\"1in\" height=\"1in\"}}\n"
            ),
        )
        .unwrap();

    let outcome = clean_document(
        &vault,
        "Quarterly Report.md",
        &Settings::default(),
        &engine(),
        &CleanOptions::default(),
    )
    .unwrap();

    assert_eq!(outcome.report.renames.len(), 1);
    assert_eq!(outcome.report.unresolved_placeholders, 0);
    assert!(outcome.report.is_clean(), "{:?}", outcome.report);
    let text = vault.read_text("Quarterly Report.md").unwrap();
    assert_eq!(
        text,
        "# Imported\n\n![Quarterly Report-img1.png](<media/Quarterly Report-images/media/image1.png>)\n"
    );
    assert!(!text.contains("]:"));
}

#[test]
fn test_clean_document_custom_media_folder() {
    let (_dir, vault) = tempvault();
    let settings = Settings {
        media_folder: "attachments".into(),
        ..Settings::default()
    };
    let media = vault.root().join("attachments/Report-images/media");
    std::fs::create_dir_all(&media).unwrap();
    std::fs::write(media.join("image1.png"), b"").unwrap();
    vault.write_text("Report.md", CAPTION_A).unwrap();

    clean_document(&vault, "Report.md", &settings, &engine(), &CleanOptions::default()).unwrap();
    assert_eq!(
        vault.read_text("Report.md").unwrap(),
        "![Report-img1.png](attachments/Report-images/media/image1.png)"
    );
}

#[test]
fn test_clean_document_missing_file() {
    let (_dir, vault) = tempvault();
    let err = clean_document(
        &vault,
        "Absent.md",
        &Settings::default(),
        &engine(),
        &CleanOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, ReconcileError::FileNotFound { .. }));
}

// ── Batch ────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Recorder {
    started: AtomicUsize,
    completed: Mutex<Vec<String>>,
    failed: Mutex<Vec<String>>,
    finished: AtomicUsize,
}

impl BatchProgressCallback for Recorder {
    fn on_batch_start(&self, total: usize) {
        self.started.store(total, Ordering::SeqCst);
    }

    fn on_document_complete(&self, path: &str, _total: usize, _report: &ReconciliationReport) {
        self.completed.lock().unwrap().push(path.to_string());
    }

    fn on_document_error(&self, path: &str, _total: usize, _error: &str) {
        self.failed.lock().unwrap().push(path.to_string());
    }

    fn on_batch_complete(&self, _total: usize, success_count: usize) {
        self.finished.store(success_count, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn test_clean_documents_in_memory() {
    let vault = Arc::new(MemoryVault::new("/vault"));
    vault.insert("A.md", CAPTION_A);
    vault.insert("media/A-images/media/image1.png", "");
    vault.insert("B.md", format!("{CAPTION_A} {CAPTION_A}"));
    vault.insert("media/B-images/media/image1.jpg", "");
    vault.insert("C.md", "nothing here");

    let recorder = Arc::new(Recorder::default());
    let paths: Vec<String> = ["B.md", "A.md", "C.md", "A.md", "Missing.md"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    let batch = clean_documents(
        Arc::clone(&vault),
        &paths,
        &Settings::default(),
        &engine(),
        &CleanOptions::default(),
        3,
        Some(Arc::clone(&recorder) as Arc<dyn BatchProgressCallback>),
    )
    .await;

    assert_eq!(batch.succeeded(), 3);
    assert_eq!(batch.failed(), 1);
    assert_eq!(batch.failures[0].0, "Missing.md");
    let order: Vec<&str> = batch.documents.iter().map(|d| d.path.as_str()).collect();
    assert_eq!(order, vec!["A.md", "B.md", "C.md"]);

    assert_eq!(
        vault.get("A.md").unwrap(),
        "![A-img1.png](media/A-images/media/image1.png)"
    );
    assert_eq!(
        vault.get("B.md").unwrap(),
        "![B-img1.jpg](media/B-images/media/image1.jpg) ![Bild nicht gefunden]()"
    );
    // A.md was listed twice but written once; C.md had nothing to change
    assert_eq!(vault.write_count(), 2);

    assert_eq!(recorder.started.load(Ordering::SeqCst), 4);
    assert_eq!(recorder.completed.lock().unwrap().len(), 3);
    assert_eq!(*recorder.failed.lock().unwrap(), vec!["Missing.md".to_string()]);
    assert_eq!(recorder.finished.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_clean_documents_dry_run_on_disk() {
    let (_dir, vault) = tempvault();
    add_images(&vault, "Report", &["image1.png"]);
    vault.write_text("Report.md", CAPTION_A).unwrap();
    let vault = Arc::new(vault);

    let batch = clean_documents(
        Arc::clone(&vault),
        &["Report.md".to_string()],
        &Settings::default(),
        &engine(),
        &CleanOptions { dry_run: true },
        1,
        None,
    )
    .await;

    assert_eq!(batch.succeeded(), 1);
    assert!(!batch.documents[0].written);
    assert_eq!(batch.documents[0].report.renames.len(), 1);
    assert_eq!(vault.read_text("Report.md").unwrap(), CAPTION_A);
}
