//! Document chunking strategies.
//!
//! This module provides the [`Chunker`] trait and two implementations:
//!
//! - [`RecursiveChunker`]: splits at paragraph, line, sentence, then word
//!   boundaries and packs the pieces into overlapping windows
//! - [`FixedSizeChunker`]: plain character windows with configurable overlap
//!
//! Lengths are measured in characters, never bytes, and chunks never split a
//! code point. Every chunk is a contiguous slice of the document, so removing
//! each chunk's overlap with its predecessor and concatenating the rest gives
//! back the original text.

use crate::document::{Chunk, Document};

/// Separators tried in order by [`RecursiveChunker`].
pub const DEFAULT_SEPARATORS: &[&str] = &["\n\n", "\n", ". ", "! ", "? ", " "];

/// A strategy for splitting documents into chunks.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks in document order.
    ///
    /// Returns an empty `Vec` if the document has empty text.
    fn chunk(&self, document: &Document) -> Vec<Chunk>;
}

/// Splits text hierarchically and merges the pieces into overlapping chunks.
///
/// The text is first cut into units no longer than `chunk_size`: by
/// paragraphs (`\n\n`), then lines, then sentence ends (`. `, `! `, `? `),
/// then words, and finally at character boundaries for a single word that is
/// still too long. Separators stay attached to the preceding unit. Units are
/// then packed greedily into chunks; each new chunk starts with the trailing
/// whole words of the previous one, up to `chunk_overlap` characters, even
/// when the units themselves are whole sentences or paragraphs.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::RecursiveChunker;
///
/// let chunker = RecursiveChunker::new(500, 50);
/// let chunks = chunker.chunk(&document);
/// ```
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl RecursiveChunker {
    /// Create a new `RecursiveChunker` using [`DEFAULT_SEPARATORS`].
    ///
    /// # Arguments
    ///
    /// * `chunk_size`: maximum number of characters per chunk
    /// * `chunk_overlap`: maximum number of characters shared by consecutive chunks
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    /// Replace the separator hierarchy, coarsest first.
    pub fn with_separators<I, S>(mut self, separators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.separators =
            separators.into_iter().map(Into::into).filter(|s: &String| !s.is_empty()).collect();
        self
    }
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        let text = &document.text;
        if text.is_empty() {
            return Vec::new();
        }

        let separators: Vec<&str> = self.separators.iter().map(String::as_str).collect();
        let mut units = Vec::new();
        split_units(text, 0, text.len(), self.chunk_size, &separators, &mut units);

        let ranges = merge_units(text, &units, self.chunk_size, self.chunk_overlap);
        to_chunks(text, ranges)
    }
}

/// Splits text into fixed-size character windows with configurable overlap.
///
/// Windows advance by `chunk_size - chunk_overlap` characters; the last window
/// ends exactly at the end of the text.
#[derive(Debug, Clone)]
pub struct FixedSizeChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl FixedSizeChunker {
    /// Create a new `FixedSizeChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size`: maximum number of characters per chunk
    /// * `chunk_overlap`: number of overlapping characters between consecutive chunks
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self { chunk_size: chunk_size.max(1), chunk_overlap }
    }
}

impl Chunker for FixedSizeChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        let text = &document.text;
        if text.is_empty() {
            return Vec::new();
        }

        // Byte offset of every character start, plus the end of the text.
        let boundaries: Vec<usize> =
            text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len())).collect();
        let char_count = boundaries.len() - 1;
        let step = self.chunk_size.saturating_sub(self.chunk_overlap).max(1);

        let mut ranges = Vec::new();
        let mut start = 0;
        loop {
            let end = (start + self.chunk_size).min(char_count);
            ranges.push((boundaries[start], boundaries[end]));
            if end == char_count {
                break;
            }
            start += step;
        }

        to_chunks(text, ranges)
    }
}

/// A contiguous byte range of the text with its length in characters.
#[derive(Debug, Clone, Copy)]
struct Unit {
    start: usize,
    end: usize,
    chars: usize,
}

/// Cut `text[start..end]` into units of at most `max_chars` characters,
/// preferring the coarsest separator that applies.
fn split_units(
    text: &str,
    start: usize,
    end: usize,
    max_chars: usize,
    separators: &[&str],
    out: &mut Vec<Unit>,
) {
    let piece = &text[start..end];
    let chars = piece.chars().count();
    if chars <= max_chars {
        out.push(Unit { start, end, chars });
        return;
    }

    let Some((separator, remaining)) = separators.split_first() else {
        split_by_chars(text, start, end, max_chars, out);
        return;
    };

    if !piece.contains(separator) {
        split_units(text, start, end, max_chars, remaining, out);
        return;
    }

    let mut segment_start = start;
    for (pos, _) in piece.match_indices(separator) {
        let segment_end = start + pos + separator.len();
        split_units(text, segment_start, segment_end, max_chars, remaining, out);
        segment_start = segment_end;
    }
    if segment_start < end {
        split_units(text, segment_start, end, max_chars, remaining, out);
    }
}

/// Last resort for a single run with no separator: cut at character boundaries.
fn split_by_chars(text: &str, start: usize, end: usize, max_chars: usize, out: &mut Vec<Unit>) {
    let mut piece_start = start;
    let mut count = 0;
    for (offset, _) in text[start..end].char_indices() {
        if count == max_chars {
            out.push(Unit { start: piece_start, end: start + offset, chars: count });
            piece_start = start + offset;
            count = 0;
        }
        count += 1;
    }
    if count > 0 {
        out.push(Unit { start: piece_start, end, chars: count });
    }
}

/// Greedily pack contiguous units into windows of at most `max_chars`
/// characters. Each new window starts with the trailing words of the previous
/// one, up to `overlap` characters.
fn merge_units(text: &str, units: &[Unit], max_chars: usize, overlap: usize) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    let mut window: Option<(usize, usize)> = None;
    let mut window_chars = 0;

    for unit in units {
        if let Some((start, end)) = window {
            if window_chars + unit.chars > max_chars {
                ranges.push((start, end));
                let budget = overlap.min(max_chars - unit.chars);
                let (tail_start, tail_chars) = overlap_tail(text, start, end, budget);
                window = Some((tail_start, end));
                window_chars = tail_chars;
            }
        }
        let start = window.map_or(unit.start, |(start, _)| start);
        window = Some((start, unit.end));
        window_chars += unit.chars;
    }

    if let Some(range) = window {
        ranges.push(range);
    }

    ranges
}

/// The longest suffix of `text[start..end]` that begins at a word boundary and
/// holds at most `budget` characters, as `(byte offset, chars)`. An empty
/// suffix is `(end, 0)`.
fn overlap_tail(text: &str, start: usize, end: usize, budget: usize) -> (usize, usize) {
    let mut best = (end, 0);
    let mut chars = 0;
    for (offset, _) in text[start..end].char_indices().rev() {
        chars += 1;
        if chars > budget {
            break;
        }
        let position = start + offset;
        if position > start && text[..position].chars().next_back().is_some_and(char::is_whitespace)
        {
            best = (position, chars);
        }
    }
    best
}

fn to_chunks(text: &str, ranges: Vec<(usize, usize)>) -> Vec<Chunk> {
    ranges
        .into_iter()
        .enumerate()
        .map(|(index, (start, end))| Chunk { index, text: text[start..end].to_string(), start, end })
        .collect()
}
