//! Overlapping fixed-size text chunker.
//!
//! Splits document text into segments of at most `max_size` characters where
//! consecutive segments share exactly `overlap` characters. Concatenating
//! chunk texts while dropping each chunk's leading `overlap` characters
//! reconstructs the source text, so nothing is lost at boundaries.
//!
//! Offsets and sizes are counted in characters, not bytes, so multi-byte
//! input never splits a code point.

use crate::config::ChunkProfile;
use crate::models::{Chunk, Document};

/// Split a document into overlapping chunks under the given profile.
///
/// Documents no longer than `max_size` produce exactly one chunk. The
/// profile invariant `overlap < max_size` is enforced at config load.
pub fn split(document: &Document, profile: &ChunkProfile) -> Vec<Chunk> {
    let chars: Vec<char> = document.raw_text.chars().collect();
    let len = chars.len();
    let step = profile.max_size - profile.overlap;

    let mut chunks = Vec::new();
    let mut start = 0usize;
    loop {
        let end = (start + profile.max_size).min(len);
        chunks.push(Chunk {
            document_id: document.id.clone(),
            sequence_index: chunks.len(),
            text: chars[start..end].iter().collect(),
            char_span: (start, end),
        });
        if end == len {
            break;
        }
        start += step;
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn doc(text: &str) -> Document {
        Document {
            id: "doc1".to_string(),
            source_path: PathBuf::from("doc1.pdf"),
            raw_text: text.to_string(),
        }
    }

    fn profile(max_size: usize, overlap: usize) -> ChunkProfile {
        ChunkProfile { max_size, overlap }
    }

    #[test]
    fn test_short_document_single_chunk() {
        let chunks = split(&doc("short text"), &profile(500, 50));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].char_span, (0, 10));
        assert_eq!(chunks[0].text, "short text");
    }

    #[test]
    fn test_exact_max_size_single_chunk() {
        let text = "x".repeat(500);
        let chunks = split(&doc(&text), &profile(500, 50));
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn test_spans_cover_document_without_gaps() {
        let text: String = (0..1237).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let chunks = split(&doc(&text), &profile(512, 128));

        assert_eq!(chunks[0].char_span.0, 0);
        assert_eq!(chunks.last().unwrap().char_span.1, 1237);
        for pair in chunks.windows(2) {
            assert!(
                pair[1].char_span.0 <= pair[0].char_span.1,
                "gap between chunks {} and {}",
                pair[0].sequence_index,
                pair[1].sequence_index
            );
        }
    }

    #[test]
    fn test_consecutive_chunks_overlap_exactly() {
        let text = "y".repeat(2000);
        let overlap = 128;
        let chunks = split(&doc(&text), &profile(512, overlap));
        for pair in chunks.windows(2) {
            let shared = pair[0].char_span.1 - pair[1].char_span.0;
            assert_eq!(shared, overlap);
        }
    }

    #[test]
    fn test_chunk_count_formula() {
        // count = ceil((L - overlap) / (max_size - overlap)) for L > max_size
        for (len, max_size, overlap) in [(1237, 512, 128), (501, 500, 50), (2000, 500, 50)] {
            let text = "z".repeat(len);
            let chunks = split(&doc(&text), &profile(max_size, overlap));
            let expected = (len - overlap).div_ceil(max_size - overlap);
            assert_eq!(chunks.len(), expected, "L={} max={} ov={}", len, max_size, overlap);
        }
    }

    #[test]
    fn test_dedup_concatenation_reconstructs_source() {
        let text: String = (0..777).map(|i| char::from(b'A' + (i % 26) as u8)).collect();
        let overlap = 50;
        let chunks = split(&doc(&text), &profile(200, overlap));

        let mut rebuilt = chunks[0].text.clone();
        for chunk in &chunks[1..] {
            rebuilt.extend(chunk.text.chars().skip(overlap));
        }
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn test_sequence_order_matches_span_order() {
        let text = "w".repeat(3000);
        let chunks = split(&doc(&text), &profile(512, 128));
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.sequence_index, i);
        }
        for pair in chunks.windows(2) {
            assert!(pair[0].char_span.0 < pair[1].char_span.0);
        }
    }

    #[test]
    fn test_multibyte_text_not_split_mid_codepoint() {
        let text = "é".repeat(600);
        let chunks = split(&doc(&text), &profile(500, 50));
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text.chars().count(), 500);
        assert!(chunks.iter().all(|c| c.text.chars().all(|ch| ch == 'é')));
    }
}
