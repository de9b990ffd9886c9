//! Text chunking for corpus ingestion.
//!
//! Documents are split into overlapping chunks so retrieval works on focused
//! passages instead of whole files. Splits prefer paragraph boundaries, then
//! line boundaries, and only fall back to a hard cut for pathological runs
//! of unbroken text.

/// Target chunk size in characters.
pub const CHUNK_SIZE: usize = 800;
/// Characters of trailing context carried into the next chunk.
pub const CHUNK_OVERLAP: usize = 150;

/// Splits `text` into chunks of roughly `CHUNK_SIZE` characters with
/// `CHUNK_OVERLAP` characters of overlap. Empty/whitespace input yields no
/// chunks.
pub fn chunk_text(text: &str) -> Vec<String> {
    chunk_with(text, CHUNK_SIZE, CHUNK_OVERLAP)
}

pub fn chunk_with(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }
    if text.len() <= size {
        return vec![text.to_string()];
    }

    let chars: Vec<char> = text.chars().collect();
    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < chars.len() {
        let hard_end = (start + size).min(chars.len());
        let end = if hard_end == chars.len() {
            hard_end
        } else {
            best_break(&chars, start, hard_end)
        };

        let chunk: String = chars[start..end].iter().collect();
        let trimmed = chunk.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }

        if end == chars.len() {
            break;
        }
        // Step back by the overlap, but always make forward progress.
        start = end.saturating_sub(overlap).max(start + 1);
    }

    chunks
}

/// Finds the best split point in `[start, hard_end)`: the last paragraph
/// break, else the last newline, else the last space, else the hard cut.
fn best_break(chars: &[char], start: usize, hard_end: usize) -> usize {
    let window = &chars[start..hard_end];

    let mut last_para = None;
    let mut last_newline = None;
    let mut last_space = None;
    for (i, pair) in window.windows(2).enumerate() {
        if pair[0] == '\n' && pair[1] == '\n' {
            last_para = Some(i);
        }
    }
    for (i, c) in window.iter().enumerate() {
        if *c == '\n' {
            last_newline = Some(i);
        } else if c.is_whitespace() {
            last_space = Some(i);
        }
    }

    // Ignore break points in the first half of the window; tiny chunks churn
    // the overlap loop without adding retrieval value.
    let min_pos = window.len() / 2;
    let pick = [last_para, last_newline, last_space]
        .into_iter()
        .flatten()
        .find(|p| *p >= min_pos);

    match pick {
        Some(p) => start + p + 1,
        None => hard_end,
    }
}
