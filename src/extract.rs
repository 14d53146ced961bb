//! Text extraction for assessment documents (PDF, DOCX).
//!
//! Dispatch is by file extension; anything else is [`BrdError::UnsupportedFormat`],
//! which the batch pipeline downgrades to a warning + skip. Extraction never
//! panics on malformed input — every failure is an error the caller can
//! isolate to that one document.

use std::io::Read;
use std::path::Path;

use uuid::Uuid;

use crate::error::{BrdError, Result};
use crate::models::Document;

/// Maximum decompressed bytes read from a single ZIP entry (zip-bomb guard).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Read a file and extract its cleaned text as a [`Document`].
pub fn extract_document(path: &Path) -> Result<Document> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let raw = match ext.as_str() {
        "pdf" | "docx" | "doc" => std::fs::read(path).map_err(|e| BrdError::ExtractionFailure {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?,
        _ => return Err(BrdError::UnsupportedFormat(path.to_path_buf())),
    };

    let text = match ext.as_str() {
        "pdf" => extract_pdf(&raw),
        // Legacy .doc is attempted through the OOXML path, matching the
        // loader behavior this pipeline replaces; true binary .doc fails
        // extraction and is skipped.
        "docx" | "doc" => extract_docx(&raw),
        _ => unreachable!(),
    }
    .map_err(|detail| BrdError::ExtractionFailure {
        path: path.to_path_buf(),
        detail,
    })?;

    Ok(Document {
        id: Uuid::new_v4().to_string(),
        source_path: path.to_path_buf(),
        raw_text: clean_text(&text),
    })
}

fn extract_pdf(bytes: &[u8]) -> std::result::Result<String, String> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| e.to_string())
}

/// Pull the `<w:t>` runs out of `word/document.xml`, inserting a newline at
/// each paragraph end so downstream cleanup sees paragraph boundaries.
fn extract_docx(bytes: &[u8]) -> std::result::Result<String, String> {
    let mut archive =
        zip::ZipArchive::new(std::io::Cursor::new(bytes)).map_err(|e| e.to_string())?;

    let mut doc_xml = Vec::new();
    {
        let entry = archive
            .by_name("word/document.xml")
            .map_err(|_| "word/document.xml not found".to_string())?;
        entry
            .take(MAX_XML_ENTRY_BYTES)
            .read_to_end(&mut doc_xml)
            .map_err(|e| e.to_string())?;
        if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
            return Err("word/document.xml exceeds size limit".to_string());
        }
    }

    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(doc_xml.as_slice());
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    if let Ok(quick_xml::events::Event::Text(te)) = reader.read_event_into(&mut buf)
                    {
                        out.push_str(te.unescape().unwrap_or_default().as_ref());
                    }
                }
            }
            Ok(quick_xml::events::Event::End(e)) => {
                if e.local_name().as_ref() == b"p" {
                    out.push('\n');
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(e.to_string()),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

/// Clean and normalize extracted text.
///
/// Strips control characters and collapses whitespace runs to single
/// spaces. Chunk reassembly guarantees hold "up to whitespace
/// normalization" precisely because this runs before chunking.
pub fn clean_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    for ch in text.chars() {
        if ch.is_control() {
            pending_space = true;
            continue;
        }
        if ch.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space && !out.is_empty() {
            out.push(' ');
        }
        pending_space = false;
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

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
    fn test_docx_paragraph_text_extracted() {
        let bytes = minimal_docx(&["First paragraph.", "Second paragraph."]);
        let text = extract_docx(&bytes).unwrap();
        assert!(text.contains("First paragraph."));
        assert!(text.contains("Second paragraph."));
    }

    #[test]
    fn test_invalid_zip_is_an_error() {
        assert!(extract_docx(b"not a zip").is_err());
    }

    #[test]
    fn test_invalid_pdf_is_an_error() {
        assert!(extract_pdf(b"not a pdf").is_err());
    }

    #[test]
    fn test_unsupported_extension_rejected() {
        let err = extract_document(Path::new("notes.txt")).unwrap_err();
        assert!(matches!(err, BrdError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_clean_text_collapses_whitespace() {
        assert_eq!(
            clean_text("a\u{0000}b   c\n\n\nd\t e"),
            "a b c d e".to_string()
        );
    }

    #[test]
    fn test_clean_text_trims_edges() {
        assert_eq!(clean_text("  hello  "), "hello");
    }
}
