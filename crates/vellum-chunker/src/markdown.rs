//! `markdown-simple`: the only chunker implemented in this crate.
//!
//! Splits normalized markdown into an ordered, dense sequence of
//! [`ChunkDraft`]s. A new chunk starts whenever a line begins with `#` (any
//! heading level) or the current chunk has accumulated 20 non-empty lines;
//! the trailing residual becomes the final chunk. Chunks are trimmed and
//! empty chunks are dropped, so the algorithm is pure and deterministic:
//! the same input, chunker name, and version always produce the same chunk
//! ids (the id is derived from the ordinal, not from chunk content).

use vellum_data::ChunkDraft;

/// Default cap on non-empty lines per chunk before a heading forces a split.
pub const DEFAULT_MAX_LINES_PER_CHUNK: usize = 20;

/// `markdown-simple` chunker, parameterized only by the line-count ceiling
/// (the heading-triggered split is unconditional).
#[derive(Debug, Clone, Copy)]
pub struct MarkdownChunker {
    max_lines_per_chunk: usize,
}

impl MarkdownChunker {
    #[must_use]
    pub const fn new(max_lines_per_chunk: usize) -> Self {
        Self { max_lines_per_chunk }
    }

    /// Split `text` into ordered chunk drafts.
    #[must_use]
    pub fn chunk(&self, text: &str) -> Vec<ChunkDraft> {
        chunk_markdown(text, self.max_lines_per_chunk)
    }
}

impl Default for MarkdownChunker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINES_PER_CHUNK)
    }
}

fn flush_chunk(current: &mut Vec<&str>, start: usize, end: usize, ordinal: &mut i32, drafts: &mut Vec<ChunkDraft>) {
    let joined = current.join("\n");
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        drafts.push(ChunkDraft { ordinal: *ordinal, text: trimmed.to_string(), start_line: start, end_line: end });
        *ordinal += 1;
    }
    current.clear();
}

/// Split `text` into ordered, dense-ordinal [`ChunkDraft`]s per the
/// `markdown-simple` contract.
#[must_use]
pub fn chunk_markdown(text: &str, max_lines_per_chunk: usize) -> Vec<ChunkDraft> {
    let lines: Vec<&str> = text.lines().collect();

    let mut drafts = Vec::new();
    let mut ordinal = 0_i32;
    let mut current_start = 0_usize;
    let mut current: Vec<&str> = Vec::new();
    let mut non_empty_count = 0_usize;

    for (index, line) in lines.iter().enumerate() {
        let starts_heading = line.trim_start().starts_with('#');
        let would_overflow = non_empty_count >= max_lines_per_chunk;

        if (starts_heading || would_overflow) && !current.is_empty() {
            flush_chunk(&mut current, current_start, index.saturating_sub(1), &mut ordinal, &mut drafts);
            non_empty_count = 0;
        }

        if current.is_empty() {
            current_start = index;
        }
        current.push(line);
        if !line.trim().is_empty() {
            non_empty_count += 1;
        }
    }

    if !current.is_empty() {
        let end = lines.len().saturating_sub(1);
        flush_chunk(&mut current, current_start, end, &mut ordinal, &mut drafts);
    }

    tracing::debug!(chunk_count = drafts.len(), "chunked markdown document");
    drafts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_headings() {
        let text = "# One\nbody one\n# Two\nbody two";
        let chunks = chunk_markdown(text, 20);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "# One\nbody one");
        assert_eq!(chunks[1].text, "# Two\nbody two");
    }

    #[test]
    fn splits_on_line_count_ceiling() {
        let text = (0..25).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n");
        let chunks = chunk_markdown(&text, 20);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text.lines().count(), 20);
        assert_eq!(chunks[1].text.lines().count(), 5);
    }

    #[test]
    fn assigns_dense_ordinals_from_zero() {
        let text = "# A\nx\n# B\ny\n# C\nz";
        let chunks = chunk_markdown(text, 20);
        let ordinals: Vec<i32> = chunks.iter().map(|c| c.ordinal).collect();
        assert_eq!(ordinals, vec![0, 1, 2]);
    }

    #[test]
    fn trims_and_skips_empty_chunks() {
        let text = "  \n\n# Heading\n  body  \n\n  \n";
        let chunks = chunk_markdown(text, 20);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "# Heading\n  body");
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        assert!(chunk_markdown("", 20).is_empty());
        assert!(chunk_markdown("   \n  \n", 20).is_empty());
    }

    #[test]
    fn is_deterministic_for_identical_input() {
        let text = "# A\none\ntwo\n# B\nthree";
        let a = chunk_markdown(text, 20);
        let b = chunk_markdown(text, 20);
        assert_eq!(a.len(), b.len());
        for (left, right) in a.iter().zip(b.iter()) {
            assert_eq!(left.ordinal, right.ordinal);
            assert_eq!(left.text, right.text);
        }
    }

    #[test]
    fn default_chunker_matches_configured_twenty_line_ceiling() {
        let chunker = MarkdownChunker::default();
        let text = (0..25).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n");
        let chunks = chunker.chunk(&text);
        assert_eq!(chunks.len(), 2);
    }
}
