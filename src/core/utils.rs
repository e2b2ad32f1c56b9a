//! Small shared helpers.

use crate::core::config;

/// Replaces characters that are unsafe in filenames (or awkward in shell
/// commands) with underscores.
pub fn escape_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0' => '_',
            c if c.is_whitespace() => '_',
            c => c,
        })
        .collect()
}

/// Builds the filename-safe title part of an output file stem: sanitized and
/// truncated so the job token stays the authoritative unique part.
pub fn title_stem(title: &str) -> String {
    let safe = escape_filename(title.trim());
    let truncated: String = safe.chars().take(config::limits::MAX_TITLE_STEM_CHARS).collect();
    if truncated.is_empty() {
        "media".to_string()
    } else {
        truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_filename_strips_separators() {
        assert_eq!(escape_filename("a/b\\c:d"), "a_b_c_d");
        assert_eq!(escape_filename("hello world"), "hello_world");
    }

    #[test]
    fn test_title_stem_truncates() {
        let long = "x".repeat(200);
        assert_eq!(title_stem(&long).chars().count(), 48);
    }

    #[test]
    fn test_title_stem_empty_falls_back() {
        assert_eq!(title_stem("   "), "media");
    }
}
