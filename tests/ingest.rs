//! Ingestion tests over real files: DOCX fixtures built in-memory, corrupt
//! inputs, and unsupported extensions.

use std::fs;
use std::io::Write;

use tempfile::TempDir;

use brdgen::pipeline::load_documents;

/// Minimal docx (ZIP with word/document.xml) containing the given paragraphs.
fn minimal_docx(paragraphs: &[&str]) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        let body: String = paragraphs
            .iter()
            .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
            .collect();
        let xml = format!(
            "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{}</w:body></w:document>",
            body
        );
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap();
    }
    buf
}

#[test]
fn test_docx_ingestion_extracts_cleaned_text() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("assessment.docx");
    fs::write(
        &path,
        minimal_docx(&[
            "Objective: migrate 3 legacy interfaces to S/4HANA by Q3.",
            "Risk: data mapping gaps.",
        ]),
    )
    .unwrap();

    let (documents, skipped) = load_documents(&[path.clone()]);
    assert_eq!(documents.len(), 1);
    assert_eq!(skipped, 0);

    let doc = &documents[0];
    assert_eq!(doc.source_path, path);
    assert!(doc.raw_text.contains("migrate 3 legacy interfaces"));
    assert!(doc.raw_text.contains("data mapping gaps"));
    // Paragraph breaks are normalized to single spaces.
    assert!(!doc.raw_text.contains('\n'));
}

#[test]
fn test_corrupt_pdf_skipped_batch_continues() {
    let tmp = TempDir::new().unwrap();
    let bad = tmp.path().join("bad.pdf");
    fs::write(&bad, b"not a valid pdf").unwrap();
    let good = tmp.path().join("good.docx");
    fs::write(&good, minimal_docx(&["Usable assessment content."])).unwrap();

    let (documents, skipped) = load_documents(&[bad, good]);
    assert_eq!(documents.len(), 1);
    assert_eq!(skipped, 1);
    assert!(documents[0].raw_text.contains("Usable assessment content."));
}

#[test]
fn test_unknown_extension_skipped_with_warning() {
    let tmp = TempDir::new().unwrap();
    let notes = tmp.path().join("notes.md");
    fs::write(&notes, "# markdown").unwrap();

    let (documents, skipped) = load_documents(&[notes]);
    assert!(documents.is_empty());
    assert_eq!(skipped, 1);
}

#[test]
fn test_each_document_gets_unique_id() {
    let tmp = TempDir::new().unwrap();
    let a = tmp.path().join("a.docx");
    let b = tmp.path().join("b.docx");
    fs::write(&a, minimal_docx(&["Document A."])).unwrap();
    fs::write(&b, minimal_docx(&["Document B."])).unwrap();

    let (documents, _) = load_documents(&[a, b]);
    assert_eq!(documents.len(), 2);
    assert_ne!(documents[0].id, documents[1].id);
}
