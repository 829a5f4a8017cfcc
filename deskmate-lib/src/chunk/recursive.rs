use crate::chunk::{Chunk, ChunkMetadata, Chunker};
use crate::{Error, Result};

/// Boundaries tried when snapping a window end, strongest first.
const SEPARATORS: [&str; 6] = ["\n\n", "\n", ". ", "? ", "! ", " "];

/// Sliding-window chunker that snaps window ends to natural boundaries
///
/// Good for: prose extracted from PDFs and plain text files
///
/// Each window holds at most `max_size` characters. The end of a window moves
/// back to the strongest boundary found in the last quarter of the window;
/// without one the window is cut hard at `max_size`. The next window starts
/// `overlap` characters before the previous end.
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    max_size: usize,
    overlap: usize,
}

impl RecursiveChunker {
    /// Create a chunker for windows of `max_size` characters sharing `overlap`.
    ///
    /// # Errors
    /// [`Error::Config`] if `max_size` is zero or `overlap >= max_size`; such
    /// settings would never advance through the text.
    pub fn new(max_size: usize, overlap: usize) -> Result<Self> {
        if max_size == 0 {
            return Err(Error::Config("chunk size must be at least 1".to_string()));
        }
        if overlap >= max_size {
            return Err(Error::Config(format!(
                "chunk overlap ({overlap}) must be smaller than chunk size ({max_size})"
            )));
        }
        Ok(Self { max_size, overlap })
    }

    #[must_use]
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    #[must_use]
    pub fn overlap(&self) -> usize {
        self.overlap
    }

    fn lookback(&self) -> usize {
        (self.max_size / 4).max(1)
    }

    /// Char-index ranges of every window, in document order.
    fn windows(&self, chars: &[char]) -> Vec<(usize, usize)> {
        let len = chars.len();
        let mut windows = Vec::new();
        if len == 0 {
            return windows;
        }

        let mut start = 0;
        loop {
            let hard_end = (start + self.max_size).min(len);
            if hard_end == len {
                windows.push((start, len));
                return windows;
            }

            // an end at or before start + overlap would not advance the window
            let floor = (start + self.overlap).max(hard_end.saturating_sub(self.lookback()));
            let end = snap(chars, floor, hard_end).unwrap_or(hard_end);

            windows.push((start, end));
            start = end - self.overlap;
        }
    }
}

/// Latest split point in `(floor, hi]` that directly follows a separator.
fn snap(chars: &[char], floor: usize, hi: usize) -> Option<usize> {
    SEPARATORS.iter().find_map(|sep| {
        let sep: Vec<char> = sep.chars().collect();
        (floor + 1..=hi)
            .rev()
            .find(|&end| end >= sep.len() && chars[end - sep.len()..end] == sep[..])
    })
}

impl Chunker for RecursiveChunker {
    fn name(&self) -> &str {
        "recursive"
    }

    fn chunk(&self, content: &str, mut metadata: ChunkMetadata) -> Vec<Chunk> {
        let chars: Vec<char> = content.chars().collect();
        // byte offset of every char index, plus the end of the text
        let offsets: Vec<usize> = content
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(content.len()))
            .collect();

        let windows = self.windows(&chars);
        metadata.total_chunks = Some(windows.len());

        windows
            .into_iter()
            .map(|(start, end)| {
                let mut m = metadata.clone();
                m.position = offsets[start];
                Chunk::new(&content[offsets[start]..offsets[end]], m)
            })
            .collect()
    }
}
