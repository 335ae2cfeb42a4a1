//! Utility functions for GenomeGPT services.

/// Truncate a string to at most `max_chars` characters, appending "..." if truncated.
///
/// Works on character boundaries, so multi-byte UTF-8 input is safe.
pub fn truncate_with_ellipsis(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => {
            let truncated = &s[..idx];
            format!("{}...", truncated.trim_end())
        }
        None => s.to_string(),
    }
}

/// Redact secret-looking substrings before text is logged or returned to a client.
pub fn sanitize_for_log(s: &str) -> String {
    let patterns: &[(&str, &str)] = &[
        (r"(?i)(api[_-]?key|apikey)[=:]\s*\S{20,}", "$1=***REDACTED***"),
        (r"(?i)(token|secret|bearer)\s*[=:]?\s*[A-Za-z0-9_\-\.]{10,}", "$1 ***REDACTED***"),
        (r"gsk_[a-zA-Z0-9]{20,}", "***REDACTED_API_KEY***"),
        (r"sk-[a-zA-Z0-9_\-]{20,}", "***REDACTED_API_KEY***"),
    ];

    let mut result = s.to_string();
    for (pattern, replacement) in patterns {
        if let Ok(re) = regex::Regex::new(pattern) {
            result = re.replace_all(&result, *replacement).to_string();
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("hello", 10, "hello" ; "short input untouched")]
    #[test_case("hello world", 5, "hello..." ; "ascii truncated")]
    #[test_case("😀😀😀😀", 2, "😀😀..." ; "multibyte truncated")]
    #[test_case("", 10, "" ; "empty input")]
    fn test_truncate_with_ellipsis(input: &str, max: usize, expected: &str) {
        assert_eq!(truncate_with_ellipsis(input, max), expected);
    }

    #[test]
    fn test_sanitize_groq_key() {
        let input = "Invalid API Key provided: gsk_abcdefghijklmnopqrstuvwxyz0123";
        let output = sanitize_for_log(input);
        assert!(!output.contains("gsk_abcdefghijklmnopqrstuvwxyz0123"));
        assert!(output.contains("REDACTED"));
    }

    #[test]
    fn test_sanitize_bearer_header() {
        let output = sanitize_for_log("Authorization: Bearer abcdef0123456789xyz");
        assert!(!output.contains("abcdef0123456789xyz"));
    }

    #[test]
    fn test_sanitize_leaves_plain_text() {
        let input = "API error (429): Rate limit reached for model";
        assert_eq!(sanitize_for_log(input), input);
    }
}
