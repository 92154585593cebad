/// Word-window parameters for splitting transcripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConfig {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 2000,
            overlap: 50,
        }
    }
}

impl ChunkConfig {
    /// Distance between consecutive window starts, never zero.
    pub fn stride(&self) -> usize {
        self.chunk_size.saturating_sub(self.overlap).max(1)
    }
}

/// Split whitespace-delimited text into overlapping word windows.
///
/// Windows start at 0, `stride`, `2 * stride`, ... while the start is below the word count, so
/// every word lands in at least one chunk and neighbours share `overlap` words.
pub fn chunk_words<'a>(words: &[&'a str], config: ChunkConfig) -> Vec<Vec<&'a str>> {
    let size = config.chunk_size.max(1);
    let stride = config.stride();

    (0..words.len())
        .step_by(stride)
        .map(|start| words[start..(start + size).min(words.len())].to_vec())
        .collect()
}

pub fn chunk_transcript(text: &str, config: ChunkConfig) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    chunk_words(&words, config)
        .into_iter()
        .map(|chunk| chunk.join(" "))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(n: usize) -> String {
        (0..n).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(chunk_transcript("   \n ", ChunkConfig::default()).is_empty());
    }

    #[test]
    fn short_text_is_one_chunk() {
        let chunks = chunk_transcript("a  b\tc\nd", ChunkConfig::default());
        assert_eq!(chunks, vec!["a b c d".to_string()]);
    }

    #[test]
    fn default_window_over_4100_words() {
        let text = numbered(4100);
        let chunks = chunk_transcript(&text, ChunkConfig::default());
        // Starts at 0, 1950, 3900.
        assert_eq!(chunks.len(), 3);
        assert!(chunks[0].starts_with("w0 "));
        assert!(chunks[1].starts_with("w1950 "));
        assert!(chunks[2].starts_with("w3900 "));
        assert!(chunks[2].ends_with("w4099"));
    }

    #[test]
    fn windows_cover_every_word_with_exact_overlap() {
        let config = ChunkConfig {
            chunk_size: 7,
            overlap: 2,
        };
        for n in 0..60 {
            let text = numbered(n);
            let words: Vec<&str> = text.split_whitespace().collect();
            let chunks = chunk_words(&words, config);

            let mut seen = vec![false; n];
            for (i, chunk) in chunks.iter().enumerate() {
                let start = i * config.stride();
                for (offset, word) in chunk.iter().enumerate() {
                    assert_eq!(*word, words[start + offset]);
                    seen[start + offset] = true;
                }
            }
            assert!(seen.iter().all(|s| *s), "word skipped for n={n}");

            for i in 0..chunks.len().saturating_sub(1) {
                let (prev, next) = (&chunks[i], &chunks[i + 1]);
                let prev_end = i * config.stride() + prev.len();
                let shared = prev_end - (i + 1) * config.stride();
                // Only the tail can be short.
                if i + 2 < chunks.len() {
                    assert_eq!(shared, config.overlap);
                }
                assert_eq!(&prev[prev.len() - shared..], &next[..shared]);
            }
        }
    }

    #[test]
    fn overlap_not_smaller_than_size_still_advances() {
        let config = ChunkConfig {
            chunk_size: 3,
            overlap: 5,
        };
        let chunks = chunk_transcript("a b c d", config);
        assert_eq!(chunks, vec!["a b c", "b c d", "c d", "d"]);
    }
}
