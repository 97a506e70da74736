//! Splitting a document into embedding-sized chunks.

use std::sync::OnceLock;

use regex::Regex;

const MIN_CHUNK_CHARS: usize = 50;
const WINDOW_CHARS: usize = 500;
const WINDOW_OVERLAP: usize = 100;
const MAX_CHUNK_CHARS: usize = 1000;
const OVERSIZE_STRIDE: usize = 800;

fn header_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^#{1,3}\s").expect("valid header regex"))
}

fn blank_lines() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n\n+").expect("valid paragraph regex"))
}

/// Chunks `text` for embedding.
///
/// Markdown sections (`#` to `###`) are preferred, then blank-line
/// paragraphs, then overlapping fixed windows. Chunks of 50 characters or
/// fewer are dropped and chunks over 1000 characters are re-split.
pub fn chunk_document(text: &str) -> Vec<String> {
    let mut chunks = Vec::new();

    let sections = split_sections(text);
    if sections.len() > 1 {
        chunks = keep_substantial(sections.into_iter());
    }
    if chunks.is_empty() {
        chunks = keep_substantial(blank_lines().split(text));
    }
    if chunks.is_empty() {
        let stride = WINDOW_CHARS - WINDOW_OVERLAP;
        chunks = keep_substantial(windows(text, WINDOW_CHARS, stride).into_iter());
    }

    chunks
        .into_iter()
        .flat_map(|chunk| {
            if chunk.chars().count() > MAX_CHUNK_CHARS {
                keep_substantial(windows(&chunk, MAX_CHUNK_CHARS, OVERSIZE_STRIDE).into_iter())
            } else {
                vec![chunk]
            }
        })
        .collect()
}

/// Splits before every line that starts a level 1-3 markdown header.
fn split_sections(text: &str) -> Vec<&str> {
    let mut sections = Vec::new();
    let mut start = 0;
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        if offset > start && header_line().is_match(line) {
            sections.push(&text[start..offset]);
            start = offset;
        }
        offset += line.len();
    }
    if start < text.len() {
        sections.push(&text[start..]);
    }
    sections
}

fn windows(text: &str, size: usize, stride: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    (0..chars.len())
        .step_by(stride)
        .map(|i| chars[i..(i + size).min(chars.len())].iter().collect())
        .collect()
}

fn keep_substantial<S: AsRef<str>>(parts: impl Iterator<Item = S>) -> Vec<String> {
    parts
        .map(|p| p.as_ref().trim().to_string())
        .filter(|p| p.chars().count() > MIN_CHUNK_CHARS)
        .collect()
}
