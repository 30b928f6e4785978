//! Recursive-separator text chunker with overlapping windows.
//!
//! Splits document text into [`Chunk`]s of at most `chunk_size` characters.
//! Each chunk after the first begins with the last `overlap` characters of
//! its predecessor, so a sentence cut at a boundary is still retrievable in
//! full from one of the two neighbours.
//!
//! # Algorithm
//!
//! 1. If the remaining text fits in `chunk_size`, emit it and stop.
//! 2. Otherwise look at the window `[start, start + chunk_size)` and pick the
//!    end position right after the last paragraph break (`\n\n`) in it.
//! 3. If there is none, try a line break (`\n`), then a space.
//! 4. If no separator qualifies, hard-split at `start + chunk_size`.
//! 5. The next window starts at `end - overlap`.
//!
//! A candidate end must lie beyond `start + overlap`, otherwise the next
//! window would not advance. A line or word break that sits inside a
//! stronger separator (the first newline of a `\n\n`) is not a candidate.
//!
//! Chunks are never trimmed: dropping the first `overlap` characters of
//! every chunk but the first and concatenating reproduces the input exactly.
//!
//! # Example
//!
//! ```rust
//! use docqa_core::chunk::split_text;
//!
//! let pieces = split_text("Alpha beta gamma delta", 10, 2);
//! assert!(pieces.iter().all(|p| p.chars().count() <= 10));
//! assert!(pieces[1].starts_with(&pieces[0][pieces[0].len() - 2..]));
//! ```

use serde::Deserialize;

use crate::models::{source_basename, Chunk, ChunkMetadata, Document};

/// Separators tried in priority order. The implicit last resort is a
/// character split.
pub const SEPARATORS: [&str; 3] = ["\n\n", "\n", " "];

/// Chunking bounds, in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ChunkConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

fn default_chunk_size() -> usize {
    1000
}

fn default_overlap() -> usize {
    200
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
        }
    }
}

/// Split `text` into overlapping windows of at most `chunk_size` characters.
///
/// Returns borrowed slices in document order. Empty input yields no chunks.
/// `overlap` is clamped below `chunk_size`; a `chunk_size` of 0 is treated
/// as 1.
pub fn split_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<&str> {
    let chunk_size = chunk_size.max(1);
    let overlap = overlap.min(chunk_size - 1);

    // bounds[k] is the byte offset of character k; the last entry is text.len().
    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_len = bounds.len() - 1;

    if char_len == 0 {
        return Vec::new();
    }

    let mut pieces = Vec::new();
    let mut start = 0usize;

    loop {
        let limit = start + chunk_size;
        if limit >= char_len {
            pieces.push(&text[bounds[start]..]);
            break;
        }

        let end = find_break(text, &bounds, start, start + overlap + 1, limit);
        pieces.push(&text[bounds[start]..bounds[end]]);
        start = end - overlap;
    }

    pieces
}

/// Character position to end the current window at, in `[min_end, limit]`.
fn find_break(text: &str, bounds: &[usize], start: usize, min_end: usize, limit: usize) -> usize {
    let window_start = bounds[start];
    let window = &text[window_start..bounds[limit]];

    for (rank, sep) in SEPARATORS.iter().enumerate() {
        for (pos, _) in window.rmatch_indices(sep) {
            // Separators are ASCII, so the byte after one is always a char boundary.
            let end_byte = window_start + pos + sep.len();
            let Ok(end) = bounds.binary_search(&end_byte) else {
                continue;
            };
            if end < min_end {
                break;
            }
            if !inside_stronger_separator(text.as_bytes(), end_byte, &SEPARATORS[..rank]) {
                return end;
            }
        }
    }

    limit
}

/// True when `at` falls strictly inside an occurrence of one of `stronger`,
/// e.g. between the two newlines of a paragraph break.
fn inside_stronger_separator(bytes: &[u8], at: usize, stronger: &[&str]) -> bool {
    stronger.iter().any(|sep| {
        let sep = sep.as_bytes();
        (1..sep.len()).any(|back| at >= back && bytes[at - back..].starts_with(sep))
    })
}

/// Chunk one document, numbering chunks from `first_index`.
///
/// Ids are `"<basename>_chunk_<index>"`, so callers chunking the pages of a
/// single file pass the running index to keep ids unique per file.
pub fn chunk_document(doc: &Document, first_index: usize, config: &ChunkConfig) -> Vec<Chunk> {
    let basename = source_basename(&doc.source);

    split_text(&doc.text, config.chunk_size, config.overlap)
        .into_iter()
        .enumerate()
        .map(|(offset, text)| {
            let index = first_index + offset;
            Chunk {
                id: chunk_id(&basename, index),
                text: text.to_string(),
                metadata: ChunkMetadata {
                    source: doc.source.clone(),
                    page: doc.page.unwrap_or(0),
                    chunk_index: index,
                },
            }
        })
        .collect()
}

pub fn chunk_id(basename: &str, index: usize) -> String {
    format!("{}_chunk_{}", basename, index)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reconstruct(pieces: &[&str], overlap: usize) -> String {
        let mut out = String::new();
        for (i, p) in pieces.iter().enumerate() {
            if i == 0 {
                out.push_str(p);
            } else {
                out.extend(p.chars().skip(overlap));
            }
        }
        out
    }

    fn tail(s: &str, n: usize) -> String {
        let count = s.chars().count();
        s.chars().skip(count - n).collect()
    }

    fn head(s: &str, n: usize) -> String {
        s.chars().take(n).collect()
    }

    #[test]
    fn test_small_text_single_chunk() {
        let pieces = split_text("Hello, world!", 1000, 200);
        assert_eq!(pieces, vec!["Hello, world!"]);
    }

    #[test]
    fn test_empty_text() {
        assert!(split_text("", 1000, 200).is_empty());
    }

    #[test]
    fn test_prefers_paragraph_break() {
        let text = "First paragraph here.\n\nSecond paragraph is a little longer.";
        let pieces = split_text(text, 40, 5);
        assert_eq!(pieces[0], "First paragraph here.\n\n");
    }

    #[test]
    fn test_falls_back_to_line_then_word() {
        let text = "line one is here\nline two is here too";
        let pieces = split_text(text, 25, 3);
        assert_eq!(pieces[0], "line one is here\n");

        let words = "alpha beta gamma delta epsilon";
        let pieces = split_text(words, 12, 2);
        assert!(pieces[0].ends_with(' '));
    }

    #[test]
    fn test_paragraph_break_straddling_window_edge() {
        let text = "aaaa bbbbbb\n\ncccc dddd eeee";
        let pieces = split_text(text, 12, 2);
        assert_eq!(
            pieces,
            vec!["aaaa ", "a bbbbbb\n\n", "\n\ncccc dddd ", "d eeee"]
        );
        assert_eq!(reconstruct(&pieces, 2), text);
    }

    #[test]
    fn test_no_chunk_ends_between_paragraph_newlines() {
        // 999-char paragraph: the default window ends on its first newline.
        let first = format!("{}abcd", "abcd ".repeat(199));
        let second = "second paragraph ".repeat(30);
        let text = format!("{}\n\n{}", first, second);
        assert_eq!(first.len(), 999);

        let pieces = split_text(&text, 1000, 200);
        assert_eq!(pieces.len(), 2);
        assert!(pieces[0].ends_with("abcd "));
        assert!(pieces[1].contains("abcd\n\nsecond paragraph"));
        for pair in pieces.windows(2) {
            assert!(!(pair[0].ends_with('\n') && pair[1].chars().nth(200) == Some('\n')));
        }
        assert_eq!(reconstruct(&pieces, 200), text);
    }

    #[test]
    fn test_oversized_unit_is_character_split() {
        let text = "x".repeat(2500);
        let pieces = split_text(&text, 1000, 200);
        assert_eq!(pieces.len(), 3);
        assert_eq!(pieces[0].len(), 1000);
        assert_eq!(pieces[1].len(), 1000);
    }

    #[test]
    fn test_lossless_and_exact_overlap() {
        let text = (0..120)
            .map(|i| format!("Sentence number {} talks about topic {}.", i, i % 7))
            .collect::<Vec<_>>()
            .chunks(5)
            .map(|group| group.join(" "))
            .collect::<Vec<_>>()
            .join("\n\n");

        for (size, overlap) in [(1000, 200), (300, 50), (64, 16), (10, 0)] {
            let pieces = split_text(&text, size, overlap);
            assert!(pieces.len() > 1);
            for p in &pieces {
                assert!(p.chars().count() <= size, "chunk over {} chars", size);
            }
            for pair in pieces.windows(2) {
                assert_eq!(head(pair[1], overlap), tail(pair[0], overlap));
            }
            assert_eq!(reconstruct(&pieces, overlap), text);
        }
    }

    #[test]
    fn test_multibyte_utf8_chars() {
        let text = "┌──────────────────┐\n│ Hello world      │\n└──────────────────┘";
        let pieces = split_text(text, 7, 2);
        for p in &pieces {
            assert!(p.chars().count() <= 7);
        }
        assert_eq!(reconstruct(&pieces, 2), text);
    }

    #[test]
    fn test_overlap_clamped_below_chunk_size() {
        let pieces = split_text("abcdefghij", 3, 10);
        assert_eq!(reconstruct(&pieces, 2), "abcdefghij");
    }

    #[test]
    fn test_chunk_document_ids_and_metadata() {
        let doc = Document::new("a ".repeat(30), "/data/guide.txt").with_page(4);
        let config = ChunkConfig {
            chunk_size: 20,
            overlap: 4,
        };
        let chunks = chunk_document(&doc, 7, &config);
        assert!(chunks.len() > 1);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.id, format!("guide.txt_chunk_{}", 7 + i));
            assert_eq!(c.metadata.chunk_index, 7 + i);
            assert_eq!(c.metadata.page, 4);
            assert_eq!(c.metadata.source, "/data/guide.txt");
        }
    }

    #[test]
    fn test_deterministic() {
        let text = "Alpha\n\nBeta\n\nGamma\n\nDelta";
        assert_eq!(split_text(text, 8, 2), split_text(text, 8, 2));
    }
}
