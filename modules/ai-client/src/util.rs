/// Truncate a string to at most `max_bytes` bytes at a character boundary.
pub fn truncate_to_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) && end > 0 {
        end -= 1;
    }
    &s[..end]
}

/// Strip a surrounding markdown code fence from a model response.
///
/// Drops the opening fence line (with any language tag) and trailing
/// blank or fence lines. Text without a leading fence is only trimmed.
pub fn strip_code_blocks(response: &str) -> &str {
    let trimmed = response.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }
    let body = match trimmed.find('\n') {
        Some(idx) => &trimmed[idx + 1..],
        None => return "",
    };
    let mut end = body.len();
    loop {
        let head = body[..end].trim_end();
        let last_line_start = head.rfind('\n').map(|i| i + 1).unwrap_or(0);
        let last_line = head[last_line_start..].trim();
        if last_line.starts_with("```") {
            end = last_line_start;
            continue;
        }
        return head;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_to_char_boundary() {
        let text = "Hello 世界";
        let truncated = truncate_to_char_boundary(text, 8);
        assert!(truncated.len() <= 8);
        assert!(text.starts_with(truncated));
    }

    #[test]
    fn test_truncate_within_bounds() {
        let text = "Hello";
        assert_eq!(truncate_to_char_boundary(text, 100), "Hello");
    }

    #[test]
    fn test_strip_code_blocks() {
        assert_eq!(strip_code_blocks("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_blocks("```\n{}\n```"), "{}");
        assert_eq!(strip_code_blocks("{}"), "{}");
    }

    #[test]
    fn test_strip_code_blocks_keeps_inner_lines() {
        let fenced = "```json\n{\"facts\": [\n  \"a\"\n]}\n```\n";
        assert_eq!(strip_code_blocks(fenced), "{\"facts\": [\n  \"a\"\n]}");
    }

    #[test]
    fn test_strip_code_blocks_unterminated_fence() {
        assert_eq!(strip_code_blocks("```json\n{\"facts\": []}"), "{\"facts\": []}");
        assert_eq!(strip_code_blocks("```"), "");
    }
}
