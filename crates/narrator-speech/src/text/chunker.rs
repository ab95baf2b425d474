//! Paragraph/sentence/clause chunking for synthesis
//!
//! Splits text into ordered chunks no longer than a character budget.
//! Paragraphs that fit are kept whole; longer ones are packed sentence by
//! sentence, and a sentence that alone exceeds the budget is packed clause
//! by clause. A clause that still does not fit is emitted oversized rather
//! than cut mid-word.

use crate::{SpeechError, SpeechResult, TextChunk};
use serde::{Deserialize, Serialize};

/// Hard ceiling on chunk length. The synthesis model counts tokens, not
/// characters, and starts truncating well before a naive character budget.
pub const DEFAULT_CHUNK_CEILING: usize = 250;

/// Average speaking rate used by [`estimate_reading_time`]
pub const DEFAULT_WORDS_PER_MINUTE: u32 = 150;

/// Chunker configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkerConfig {
    /// Upper bound applied to every requested `max_chars`
    pub ceiling: usize,
}

impl ChunkerConfig {
    pub fn with_ceiling(mut self, ceiling: usize) -> Self {
        self.ceiling = ceiling;
        self
    }

    pub fn validate(&self) -> SpeechResult<()> {
        if self.ceiling == 0 {
            return Err(SpeechError::Configuration(
                "chunk ceiling must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            ceiling: DEFAULT_CHUNK_CEILING,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Effective chunk budget for a requested `max_chars`
    pub fn limit_for(&self, max_chars: usize) -> usize {
        max_chars.min(self.config.ceiling).max(1)
    }

    /// Split `text` into ordered chunks of at most
    /// `min(max_chars, ceiling)` characters.
    ///
    /// Empty input yields no chunks. `max_chars == 0` is a configuration
    /// error.
    pub fn chunk(&self, text: &str, max_chars: usize) -> SpeechResult<Vec<TextChunk>> {
        if max_chars == 0 {
            return Err(SpeechError::Configuration(
                "max_chars must be greater than zero".to_string(),
            ));
        }
        let limit = self.limit_for(max_chars);

        let mut emitter = ChunkEmitter::default();
        let mut paragraphs = 0;
        for paragraph in split_paragraphs(text) {
            paragraphs += 1;
            if char_len(&paragraph) <= limit {
                emitter.emit(&paragraph);
                continue;
            }

            let mut packer = Packer::new(limit);
            for sentence in split_sentences(&paragraph) {
                if char_len(sentence) <= limit {
                    packer.push(sentence, &mut emitter);
                } else {
                    for clause in split_clauses(sentence) {
                        packer.push(clause, &mut emitter);
                    }
                }
            }
            packer.finish(&mut emitter);
        }

        log::debug!(
            "Chunked {} paragraph(s) into {} chunk(s) (limit {} chars)",
            paragraphs,
            emitter.chunks.len(),
            limit
        );
        Ok(emitter.chunks)
    }
}

/// Split `text` with the default ceiling
pub fn chunk_text(text: &str, max_chars: usize) -> SpeechResult<Vec<TextChunk>> {
    Chunker::default().chunk(text, max_chars)
}

/// Estimated speaking time in minutes
pub fn estimate_reading_time(text: &str, words_per_minute: u32) -> f64 {
    if words_per_minute == 0 {
        return 0.0;
    }
    text.split_whitespace().count() as f64 / words_per_minute as f64
}

#[derive(Default)]
struct ChunkEmitter {
    chunks: Vec<TextChunk>,
}

impl ChunkEmitter {
    fn emit(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        let index = self.chunks.len();
        self.chunks.push(TextChunk::new(index, text.to_string()));
    }
}

/// Accumulates units into a buffer and flushes whenever the next unit
/// would push it past the limit.
struct Packer {
    limit: usize,
    buffer: String,
    buffer_len: usize,
}

impl Packer {
    fn new(limit: usize) -> Self {
        Self {
            limit,
            buffer: String::new(),
            buffer_len: 0,
        }
    }

    fn push(&mut self, unit: &str, emitter: &mut ChunkEmitter) {
        let unit = unit.trim();
        if unit.is_empty() {
            return;
        }
        let unit_len = char_len(unit);

        if self.buffer.is_empty() {
            self.buffer.push_str(unit);
            self.buffer_len = unit_len;
        } else if self.buffer_len + 1 + unit_len <= self.limit {
            self.buffer.push(' ');
            self.buffer.push_str(unit);
            self.buffer_len += 1 + unit_len;
        } else {
            emitter.emit(&self.buffer);
            self.buffer.clear();
            self.buffer.push_str(unit);
            self.buffer_len = unit_len;
        }
    }

    fn finish(self, emitter: &mut ChunkEmitter) {
        emitter.emit(&self.buffer);
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Paragraphs separated by a blank line, with inner whitespace collapsed.
fn split_paragraphs(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split("\n\n")
        .map(|p| p.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|p| !p.is_empty())
}

/// Sentences end right after `.`, `!` or `?` when whitespace follows; the
/// punctuation stays with the sentence it closes.
fn split_sentences(paragraph: &str) -> Vec<&str> {
    split_after(paragraph, |c| matches!(c, '.' | '!' | '?'))
}

/// Clauses end right after a comma followed by whitespace.
fn split_clauses(sentence: &str) -> Vec<&str> {
    split_after(sentence, |c| c == ',')
}

fn split_after(text: &str, is_boundary: impl Fn(char) -> bool) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        let next_is_space = chars.peek().is_some_and(|&(_, next)| next.is_whitespace());
        if is_boundary(c) && next_is_space {
            let end = idx + c.len_utf8();
            parts.push(&text[start..end]);
            start = end;
        }
    }
    if start < text.len() {
        parts.push(&text[start..]);
    }

    parts
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}
