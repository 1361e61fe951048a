//! String utilities for the domain layer.

/// Collapse generated text into a single line.
///
/// Newlines become spaces, runs of spaces are squeezed and the result is trimmed.
pub fn one_line(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_was_space = false;
    for c in s.chars() {
        let c = if c == '\n' || c == '\r' { ' ' } else { c };
        if c == ' ' {
            if last_was_space {
                continue;
            }
            last_was_space = true;
        } else {
            last_was_space = false;
        }
        out.push(c);
    }
    out.trim().to_string()
}

/// Truncate a string to at most `max_chars` characters (not bytes).
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_line_joins_lines() {
        assert_eq!(one_line("hello\nworld"), "hello world");
        assert_eq!(one_line("  a  \n\n  b  "), "a b");
        assert_eq!(one_line("line\r\nbreak"), "line break");
    }

    #[test]
    fn test_one_line_keeps_plain_text() {
        assert_eq!(one_line("already fine"), "already fine");
        assert_eq!(one_line(""), "");
    }

    #[test]
    fn test_truncate_chars_ascii() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("hello world", 5), "hello");
    }

    #[test]
    fn test_truncate_chars_multibyte() {
        assert_eq!(truncate_chars("日本語テスト", 3), "日本語");
        assert_eq!(truncate_chars("日本語", 3), "日本語");
        assert_eq!(truncate_chars("Hello、世界", 6), "Hello、");
    }
}
