//! Outbound message chunking.
//!
//! Mesh frames carry roughly 200 usable bytes, so any longer reply has to be
//! split before it reaches the transport. [`chunk`] is a pure function: same
//! input, same chunks, no shared state. Cut preference per chunk is sentence
//! boundary (when it falls past the midpoint, so we never emit a tiny
//! fragment), then last space, then a hard byte cut on a UTF-8 boundary. The
//! hard cut guarantees forward progress on pathological input with no
//! whitespace at all.

/// Sentence terminators considered acceptable cut points.
const SENTENCE_BREAKS: [&str; 3] = [". ", "! ", "? "];

/// Split `text` into ordered chunks of at most `max_len` bytes each.
///
/// Chunk boundaries are trimmed of surrounding whitespace. Runs in
/// O(len / max_len) iterations; each iteration consumes at least one byte.
/// When `max_len` is narrower than a single character's UTF-8 encoding that
/// character is emitted as its own chunk, so termination holds for every
/// input even though such a chunk exceeds `max_len`.
pub fn chunk(text: &str, max_len: usize) -> Vec<String> {
    assert!(max_len > 0, "max_len must be positive");
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        rest = rest.trim_start();
        if rest.len() <= max_len {
            if !rest.is_empty() {
                chunks.push(rest.to_string());
            }
            break;
        }

        // Longest prefix that fits without splitting a codepoint.
        let mut end = max_len;
        while end > 0 && !rest.is_char_boundary(end) {
            end -= 1;
        }
        if end == 0 {
            // max_len is narrower than the first character's UTF-8 width.
            // Emit that character whole so the loop always moves forward.
            if let Some(ch) = rest.chars().next() {
                let width = ch.len_utf8();
                chunks.push(rest[..width].to_string());
                rest = &rest[width..];
            }
            continue;
        }
        let prefix = &rest[..end];

        let cut = sentence_cut(prefix)
            .filter(|&c| c >= end / 2)
            .or_else(|| prefix.rfind(' ').filter(|&c| c > 0))
            .unwrap_or(end);

        let piece = rest[..cut].trim();
        if !piece.is_empty() {
            chunks.push(piece.to_string());
        }
        rest = &rest[cut..];
    }
    chunks
}

/// Byte offset just past the last sentence terminator in `prefix`, if any.
fn sentence_cut(prefix: &str) -> Option<usize> {
    SENTENCE_BREAKS
        .iter()
        .filter_map(|brk| prefix.rfind(brk).map(|pos| pos + 1))
        .max()
}
