//! Log sanitizing for radio-sourced text.
//!
//! Inbound packets are attacker-controlled strings; escaping control
//! characters keeps every log record on a single line.

/// Escape `s` for single-line logging. Newlines, carriage returns, tabs and
/// backslashes become their two-character escapes, other control characters
/// become `\xNN`, and anything past the preview cap is dropped behind an
/// ellipsis.
pub fn escape_log(s: &str) -> String {
    const MAX_PREVIEW: usize = 200;
    let mut out = String::with_capacity(s.len().min(MAX_PREVIEW) + 8);
    for (count, ch) in s.chars().enumerate() {
        if count >= MAX_PREVIEW {
            out.push('…');
            break;
        }
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                use std::fmt::Write;
                let _ = write!(&mut out, "\\x{:02X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}
