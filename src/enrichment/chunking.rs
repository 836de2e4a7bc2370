//! Token-bounded overlapping chunks of scraped text

/// Rough characters-per-token ratio used for estimates.
pub const CHARS_PER_TOKEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConfig {
    pub max_tokens: usize,
    pub overlap_tokens: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_tokens: 1500,
            overlap_tokens: 125,
        }
    }
}

impl ChunkConfig {
    pub fn new(max_tokens: usize, overlap_tokens: usize) -> Self {
        Self {
            max_tokens,
            overlap_tokens,
        }
    }

    fn max_chars(&self) -> usize {
        (self.max_tokens * CHARS_PER_TOKEN).max(1)
    }

    fn overlap_chars(&self) -> usize {
        (self.overlap_tokens * CHARS_PER_TOKEN).min(self.max_chars().saturating_sub(1))
    }
}

pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// Splits `text` into chunks of at most `max_tokens`, each overlapping the
/// previous one by `overlap_tokens`. A chunk is cut after the last sentence
/// end when one falls in its final 30%.
pub fn chunk_text(text: &str, config: &ChunkConfig) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let size = config.max_chars();
    if chars.len() <= size {
        return if text.trim().is_empty() {
            Vec::new()
        } else {
            vec![text.to_string()]
        };
    }

    let overlap = config.overlap_chars();
    let min_cut = size * 7 / 10;
    let mut chunks = Vec::new();
    let mut start = 0;

    loop {
        let mut end = (start + size).min(chars.len());
        if end < chars.len() {
            let window = &chars[start..end];
            if let Some(cut) = window
                .iter()
                .rposition(|c| matches!(c, '.' | '!' | '?' | '\n'))
                .filter(|&i| i > min_cut)
            {
                end = start + cut + 1;
            }
        }

        chunks.push(chars[start..end].iter().collect());
        if end >= chars.len() {
            break;
        }
        start = end.saturating_sub(overlap).max(start + 1);
    }

    chunks
}

/// Number of chunks `text` would be split into.
pub fn estimate_chunks(text: &str, config: &ChunkConfig) -> usize {
    chunk_text(text, config).len()
}

/// The last `max_chars` characters of `text`.
pub fn tail(text: &str, max_chars: usize) -> &str {
    let count = text.chars().count();
    if count <= max_chars {
        return text;
    }
    let skip = count - max_chars;
    let byte = text.char_indices().nth(skip).map(|(i, _)| i).unwrap_or(0);
    &text[byte..]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny() -> ChunkConfig {
        // 40 chars per chunk, 8 chars overlap
        ChunkConfig::new(10, 2)
    }

    #[test]
    fn test_short_text_is_one_chunk() {
        assert_eq!(chunk_text("Short page.", &tiny()), vec!["Short page."]);
        assert!(chunk_text("   ", &tiny()).is_empty());
    }

    #[test]
    fn test_chunks_overlap_and_cover_text() {
        let text = "a".repeat(100);
        let chunks = chunk_text(&text, &tiny());

        assert!(chunks.iter().all(|c| c.chars().count() <= 40));
        // 0..40, 32..72, 64..100
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].len(), 36);
    }

    #[test]
    fn test_breaks_on_late_sentence_end() {
        let text = format!("{}. {}", "x".repeat(33), "y".repeat(60));
        let chunks = chunk_text(&text, &tiny());
        assert!(chunks[0].ends_with('.'));
        assert_eq!(chunks[0].len(), 34);
    }

    #[test]
    fn test_ignores_early_sentence_end() {
        let text = format!("{}. {}", "x".repeat(5), "y".repeat(80));
        let chunks = chunk_text(&text, &tiny());
        assert_eq!(chunks[0].len(), 40);
    }

    #[test]
    fn test_multibyte_text() {
        let text = "µ".repeat(90);
        let chunks = chunk_text(&text, &tiny());
        assert!(chunks.iter().all(|c| c.chars().count() <= 40));
        assert_eq!(estimate_chunks(&text, &tiny()), chunks.len());
    }

    #[test]
    fn test_estimates_and_tail() {
        assert_eq!(estimate_tokens("abcdefghi"), 3);
        assert_eq!(tail("hello world", 5), "world");
        assert_eq!(tail("µµµ", 2), "µµ");
        assert_eq!(tail("hi", 5), "hi");
    }
}
