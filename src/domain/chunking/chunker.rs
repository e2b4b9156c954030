use serde::{Deserialize, Serialize};

/// A `[start, end)` range of a document, counted in characters (Unicode scalar values).
///
/// Boundary identity is part of the chunk cache key: index K of a plan must always denote
/// the same range for the same content, so everything here is deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkBoundary {
    pub start: usize,
    pub end: usize,
}

impl ChunkBoundary {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkerConfig {
    /// Nominal chunk size; a hard cut happens here when no sentence boundary is found
    pub max_chunk_chars: usize,
    /// How far past the nominal cut we may look for a sentence boundary
    pub lookahead_chars: usize,
}

impl ChunkerConfig {
    pub fn new(max_chunk_chars: usize) -> Self {
        let max_chunk_chars = max_chunk_chars.max(1);
        Self {
            max_chunk_chars,
            lookahead_chars: max_chunk_chars / 10,
        }
    }

    pub fn with_lookahead(mut self, lookahead_chars: usize) -> Self {
        self.lookahead_chars = lookahead_chars;
        self
    }
}

/// Split text into contiguous, non-overlapping ranges covering `[0, len)`.
///
/// Each window searches backward from `nominal cut + lookahead` for the last sentence end
/// (`.`, `!` or `?` followed by whitespace, or a newline) lying beyond half the maximum
/// size. Without one the window is hard-cut at the maximum size, possibly mid-word.
pub fn split_into_chunks(text: &str, config: ChunkerConfig) -> Vec<ChunkBoundary> {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    let max = config.max_chunk_chars.max(1);

    let mut boundaries = Vec::with_capacity(len / max + 1);
    let mut start = 0;

    while start < len {
        if len - start <= max {
            boundaries.push(ChunkBoundary { start, end: len });
            break;
        }

        let nominal_cut = start + max;
        let window_end = (nominal_cut + config.lookahead_chars).min(len);
        let min_cut = start + max / 2;

        let end = find_sentence_cut(&chars, min_cut, window_end).unwrap_or(nominal_cut);
        boundaries.push(ChunkBoundary { start, end });
        start = end;
    }

    boundaries
}

/// Materialize the text of every chunk in plan order
pub fn chunk_texts(text: &str, boundaries: &[ChunkBoundary]) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    boundaries
        .iter()
        .map(|b| {
            let end = b.end.min(chars.len());
            let start = b.start.min(end);
            chars[start..end].iter().collect()
        })
        .collect()
}

/// Last cut position in `(min_cut, window_end]` that directly follows a sentence end
fn find_sentence_cut(chars: &[char], min_cut: usize, window_end: usize) -> Option<usize> {
    (min_cut + 1..=window_end)
        .rev()
        .find(|&cut| is_sentence_cut(chars, cut))
}

fn is_sentence_cut(chars: &[char], cut: usize) -> bool {
    let Some(&previous) = cut.checked_sub(1).and_then(|i| chars.get(i)) else {
        return false;
    };

    if previous == '\n' {
        return true;
    }

    previous.is_whitespace()
        && cut >= 2
        && matches!(chars[cut - 2], '.' | '!' | '?')
}
