//! Canonicalization: spec §4.2 step 3-4.

/// Normalize line endings, strip a leading BOM, collapse ≥3 blank lines to 2,
/// trim trailing whitespace per line, and ensure exactly one trailing
/// newline. Returns the canonical markdown plus whether output truncation
/// (step 4, `max_output_chars`) occurred.
pub fn canonicalize(raw: &str, max_output_chars: usize) -> (String, bool) {
    let without_bom = raw.strip_prefix('\u{feff}').unwrap_or(raw);
    let normalized = without_bom.replace("\r\n", "\n").replace('\r', "\n");

    let mut lines: Vec<&str> = Vec::new();
    let mut blank_run = 0;
    for line in normalized.split('\n') {
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            blank_run += 1;
            if blank_run <= 2 {
                lines.push("");
            }
        } else {
            blank_run = 0;
            lines.push(trimmed);
        }
    }
    // Drop trailing blank lines accumulated from the final split segment.
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }

    let mut out = lines.join("\n");
    out.push('\n');

    let truncated = out.chars().count() > max_output_chars;
    if truncated {
        out = out.chars().take(max_output_chars).collect();
        if !out.ends_with('\n') {
            out.push('\n');
        }
    }

    (out, truncated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_bom_and_normalizes_crlf() {
        let (out, truncated) = canonicalize("\u{feff}line one\r\nline two\r\n", 10_000);
        assert_eq!(out, "line one\nline two\n");
        assert!(!truncated);
    }

    #[test]
    fn collapses_long_blank_runs() {
        let (out, _) = canonicalize("a\n\n\n\n\nb\n", 10_000);
        assert_eq!(out, "a\n\n\nb\n");
    }

    #[test]
    fn trims_trailing_whitespace_and_ensures_single_newline() {
        let (out, _) = canonicalize("hello   \nworld\t\n\n\n\n\n\n", 10_000);
        assert_eq!(out, "hello\nworld\n");
    }

    #[test]
    fn flags_truncation_when_over_budget() {
        let input = "x".repeat(100);
        let (out, truncated) = canonicalize(&input, 10);
        assert!(truncated);
        assert!(out.chars().count() <= 11);
    }
}
