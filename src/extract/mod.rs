//! Source extraction: line ranges, comment-delimited regions, and symbols
//!
//! The file plugin narrows an embedded file to a region of interest through
//! one of three selectors: an inclusive line range, a named
//! comment-delimited region, or a language-aware code symbol.

pub mod comments;
pub mod symbols;

use regex::Regex;
use std::sync::OnceLock;

use comments::{mask_strings, CommentStyle, ScanState};

/// Default region marker templates; `{tag}` is replaced by the region name.
pub const DEFAULT_REGION_START: &str = "md.start: {tag}";
pub const DEFAULT_REGION_END: &str = "md.end: {tag}";

fn line_range_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?:(\d+)\.\.(\d+)|(\d+)\.\.|\.\.(\d+)|(\d+))$").unwrap())
}

/// A parsed inclusive line range (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRange {
    pub start: Option<usize>,
    pub end: Option<usize>,
}

/// Parse a line-range expression: `N`, `M..N`, `N..`, or `..N`.
///
/// Dash syntax (`M-N`) is rejected.
pub fn parse_line_range(range: &str) -> Option<LineRange> {
    let trimmed = range.trim();
    let captures = line_range_pattern().captures(trimmed)?;

    let group = |i: usize| {
        captures
            .get(i)
            .and_then(|m| m.as_str().parse::<usize>().ok())
    };

    if let (Some(start), Some(end)) = (group(1), group(2)) {
        if start == 0 || end < start {
            return None;
        }
        return Some(LineRange {
            start: Some(start),
            end: Some(end),
        });
    }
    if let Some(start) = group(3) {
        if start == 0 {
            return None;
        }
        return Some(LineRange {
            start: Some(start),
            end: None,
        });
    }
    if let Some(end) = group(4) {
        if end == 0 {
            return None;
        }
        return Some(LineRange {
            start: None,
            end: Some(end),
        });
    }
    if let Some(single) = group(5) {
        if single == 0 {
            return None;
        }
        return Some(LineRange {
            start: Some(single),
            end: Some(single),
        });
    }
    None
}

/// Whether `range` is a syntactically valid line-range expression.
pub fn is_valid_line_range(range: &str) -> bool {
    parse_line_range(range).is_some()
}

/// Extract an inclusive line range from content. Out-of-range boundaries
/// clamp to the file. Returns the selected lines joined with newlines, or
/// `None` for invalid syntax or an empty selection.
pub fn extract_lines(content: &str, range: &str) -> Option<String> {
    let parsed = parse_line_range(range)?;
    let normalized = content.replace("\r\n", "\n");
    let lines: Vec<&str> = normalized.split('\n').collect();

    let start = parsed.start.unwrap_or(1).max(1);
    let end = parsed.end.unwrap_or(lines.len()).min(lines.len());
    if start > end {
        return None;
    }

    Some(lines[start - 1..end].join("\n"))
}

/// Extract a named comment-delimited region.
///
/// Markers are built from the templates by substituting `{tag}` and matched
/// case-insensitively after removing all whitespace. When a comment style
/// is supplied, marker text inside string literals is invisible — only the
/// code/comment portion of each line is searched.
pub fn extract_region(
    content: &str,
    tag: &str,
    start_template: &str,
    end_template: &str,
    style: Option<&CommentStyle>,
) -> Option<String> {
    let start_marker = normalize_marker(&start_template.replace("{tag}", tag.trim()));
    let end_marker = normalize_marker(&end_template.replace("{tag}", tag.trim()));

    let normalized = content.replace("\r\n", "\n");
    let lines: Vec<&str> = normalized.split('\n').collect();
    let mut state = ScanState::default();

    let mut start_index: Option<usize> = None;
    let mut end_index: Option<usize> = None;

    for (i, line) in lines.iter().enumerate() {
        let visible = match style {
            Some(style) => mask_strings(line, &mut state, style),
            None => (*line).to_string(),
        };
        let clean = normalize_marker(&visible);
        if start_index.is_none() && clean.contains(&start_marker) {
            start_index = Some(i + 1);
        } else if start_index.is_some() && clean.contains(&end_marker) {
            end_index = Some(i);
            break;
        }
    }

    let (start, end) = (start_index?, end_index?);
    if start > end {
        return None;
    }
    Some(lines[start..end].join("\n"))
}

/// Lowercase and remove all whitespace for marker comparison.
fn normalize_marker(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATA: &str = "alpha\nbeta\ngamma\ndelta\n";

    #[test]
    fn test_parse_line_range_forms() {
        assert_eq!(
            parse_line_range("2..3"),
            Some(LineRange {
                start: Some(2),
                end: Some(3)
            })
        );
        assert_eq!(
            parse_line_range("2.."),
            Some(LineRange {
                start: Some(2),
                end: None
            })
        );
        assert_eq!(
            parse_line_range("..3"),
            Some(LineRange {
                start: None,
                end: Some(3)
            })
        );
        assert_eq!(
            parse_line_range("4"),
            Some(LineRange {
                start: Some(4),
                end: Some(4)
            })
        );
    }

    #[test]
    fn test_dash_syntax_rejected() {
        assert!(!is_valid_line_range("2-3"));
        assert!(!is_valid_line_range("L2-3"));
        assert!(!is_valid_line_range("2..3..4"));
        assert!(!is_valid_line_range(""));
    }

    #[test]
    fn test_inverted_or_zero_ranges_rejected() {
        assert!(!is_valid_line_range("3..2"));
        assert!(!is_valid_line_range("0"));
        assert!(!is_valid_line_range("0..2"));
    }

    #[test]
    fn test_extract_lines_inclusive_range() {
        assert_eq!(extract_lines(DATA, "2..3").unwrap(), "beta\ngamma");
    }

    #[test]
    fn test_extract_lines_open_ranges() {
        assert_eq!(extract_lines(DATA, "3..").unwrap(), "gamma\ndelta\n");
        assert_eq!(extract_lines(DATA, "..2").unwrap(), "alpha\nbeta");
        assert_eq!(extract_lines(DATA, "2").unwrap(), "beta");
    }

    #[test]
    fn test_extract_lines_clamps_to_file() {
        assert_eq!(extract_lines(DATA, "3..99").unwrap(), "gamma\ndelta\n");
    }

    #[test]
    fn test_extract_region_basic() {
        let content = "before\n// md.start: demo\none\ntwo\n// md.end: demo\nafter\n";
        let extracted = extract_region(
            content,
            "demo",
            DEFAULT_REGION_START,
            DEFAULT_REGION_END,
            None,
        )
        .unwrap();
        assert_eq!(extracted, "one\ntwo");
    }

    #[test]
    fn test_extract_region_case_and_whitespace_insensitive() {
        let content = "x\n#   MD.START:Demo\nbody\n# md.end:   demo\ny\n";
        let extracted = extract_region(
            content,
            "demo",
            DEFAULT_REGION_START,
            DEFAULT_REGION_END,
            None,
        )
        .unwrap();
        assert_eq!(extracted, "body");
    }

    #[test]
    fn test_extract_region_missing_marker() {
        let content = "// md.start: demo\nbody\n";
        assert!(extract_region(
            content,
            "demo",
            DEFAULT_REGION_START,
            DEFAULT_REGION_END,
            None
        )
        .is_none());
    }

    #[test]
    fn test_extract_region_marker_in_string_is_literal_text() {
        let style = CommentStyle::c_family();
        let content = concat!(
            "var fake = \"md.start: demo\";\n",
            "// md.start: demo\n",
            "real\n",
            "// md.end: demo\n",
        );
        let extracted = extract_region(
            content,
            "demo",
            DEFAULT_REGION_START,
            DEFAULT_REGION_END,
            Some(&style),
        )
        .unwrap();
        assert_eq!(extracted, "real");
    }

    #[test]
    fn test_extract_region_custom_templates() {
        let content = "<!-- region: intro -->\nhello\n<!-- endregion: intro -->\n";
        let extracted = extract_region(
            content,
            "intro",
            "region: {tag}",
            "endregion: {tag}",
            None,
        )
        .unwrap();
        assert_eq!(extracted, "hello");
    }
}
