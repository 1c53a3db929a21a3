//! Source-language string/comment state machine and comment filtering
//!
//! A line-oriented scanner shared by the brace counter, region extraction,
//! and the comment filter. It must not treat a `#` inside `"..."` as a
//! comment, nor a `{` inside `/* ... */` as a block opener.

/// How a language delimits comments and string literals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentStyle {
    pub line_comment: Option<&'static str>,
    pub block_comment_start: Option<&'static str>,
    pub block_comment_end: Option<&'static str>,
    pub string_delimiters: &'static [char],
}

impl CommentStyle {
    /// C-family comments: `//`, `/* */`, double and single quoted strings.
    pub const fn c_family() -> Self {
        Self {
            line_comment: Some("//"),
            block_comment_start: Some("/*"),
            block_comment_end: Some("*/"),
            string_delimiters: &['"', '\''],
        }
    }

    /// Python comments: `#`, double and single quoted strings.
    pub const fn python() -> Self {
        Self {
            line_comment: Some("#"),
            block_comment_start: None,
            block_comment_end: None,
            string_delimiters: &['"', '\''],
        }
    }
}

/// Tracks comment and string state across lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanState {
    pub in_block_comment: bool,
    pub in_string: bool,
    pub string_char: Option<char>,
}

fn starts_with_at(chars: &[char], i: usize, needle: &str) -> bool {
    let needle: Vec<char> = needle.chars().collect();
    chars.len() >= i + needle.len() && chars[i..i + needle.len()] == needle[..]
}

/// Return the "real code" portion of a line: characters outside strings and
/// comments. Mutates `state` to carry block comments and strings across
/// lines. Used by the brace counter.
pub fn scan_code(line: &str, state: &mut ScanState, style: &CommentStyle) -> String {
    let chars: Vec<char> = line.chars().collect();
    let mut real = String::new();
    let mut i = 0;

    while i < chars.len() {
        if state.in_block_comment {
            if let Some(end) = style.block_comment_end {
                if starts_with_at(&chars, i, end) {
                    state.in_block_comment = false;
                    i += end.chars().count();
                    continue;
                }
            }
            i += 1;
            continue;
        }

        if state.in_string {
            if chars[i] == '\\' {
                i += 2;
            } else {
                if Some(chars[i]) == state.string_char {
                    state.in_string = false;
                    state.string_char = None;
                }
                i += 1;
            }
            continue;
        }

        if let Some(lc) = style.line_comment {
            if starts_with_at(&chars, i, lc) {
                break;
            }
        }

        if let Some(start) = style.block_comment_start {
            if starts_with_at(&chars, i, start) {
                state.in_block_comment = true;
                i += start.chars().count();
                continue;
            }
        }

        if style.string_delimiters.contains(&chars[i]) {
            state.in_string = true;
            state.string_char = Some(chars[i]);
            i += 1;
            continue;
        }

        real.push(chars[i]);
        i += 1;
    }

    real
}

/// Return the line with string-literal contents blanked out but comment
/// text preserved. Region markers live in comments, so the region scanner
/// must see comment text while marker-lookalikes inside strings stay
/// invisible.
pub fn mask_strings(line: &str, state: &mut ScanState, style: &CommentStyle) -> String {
    let chars: Vec<char> = line.chars().collect();
    let mut masked = String::new();
    let mut i = 0;

    while i < chars.len() {
        if state.in_block_comment {
            if let Some(end) = style.block_comment_end {
                if starts_with_at(&chars, i, end) {
                    state.in_block_comment = false;
                    masked.push_str(end);
                    i += end.chars().count();
                    continue;
                }
            }
            masked.push(chars[i]);
            i += 1;
            continue;
        }

        if state.in_string {
            if chars[i] == '\\' {
                masked.push(' ');
                if i + 1 < chars.len() {
                    masked.push(' ');
                }
                i += 2;
            } else {
                if Some(chars[i]) == state.string_char {
                    state.in_string = false;
                    state.string_char = None;
                    masked.push(chars[i]);
                } else {
                    masked.push(' ');
                }
                i += 1;
            }
            continue;
        }

        if let Some(lc) = style.line_comment {
            if starts_with_at(&chars, i, lc) {
                // rest of line is comment text: keep it visible
                masked.extend(&chars[i..]);
                break;
            }
        }

        if let Some(start) = style.block_comment_start {
            if starts_with_at(&chars, i, start) {
                state.in_block_comment = true;
                masked.push_str(start);
                i += start.chars().count();
                continue;
            }
        }

        if style.string_delimiters.contains(&chars[i]) {
            state.in_string = true;
            state.string_char = Some(chars[i]);
            masked.push(chars[i]);
            i += 1;
            continue;
        }

        masked.push(chars[i]);
        i += 1;
    }

    masked
}

/// Filter a single line. Returns `None` when the whole line should be
/// dropped (comment-only or inside a block comment), otherwise the line
/// with any trailing comment stripped.
fn strip_line_comment(line: &str, state: &mut ScanState, style: &CommentStyle) -> Option<String> {
    if !state.in_block_comment && line.trim().is_empty() {
        return Some(line.to_string());
    }

    let chars: Vec<char> = line.chars().collect();
    let mut real = String::new();
    let mut i = 0;

    while i < chars.len() {
        if state.in_block_comment {
            if let Some(end) = style.block_comment_end {
                if starts_with_at(&chars, i, end) {
                    state.in_block_comment = false;
                    i += end.chars().count();
                    continue;
                }
            }
            i += 1;
            continue;
        }

        if state.in_string {
            if chars[i] == '\\' {
                real.push(chars[i]);
                if i + 1 < chars.len() {
                    real.push(chars[i + 1]);
                }
                i += 2;
            } else {
                if Some(chars[i]) == state.string_char {
                    state.in_string = false;
                    state.string_char = None;
                }
                real.push(chars[i]);
                i += 1;
            }
            continue;
        }

        if let Some(lc) = style.line_comment {
            if starts_with_at(&chars, i, lc) {
                break;
            }
        }

        if let Some(start) = style.block_comment_start {
            if starts_with_at(&chars, i, start) {
                state.in_block_comment = true;
                i += start.chars().count();
                continue;
            }
        }

        if style.string_delimiters.contains(&chars[i]) {
            state.in_string = true;
            state.string_char = Some(chars[i]);
        }
        real.push(chars[i]);
        i += 1;
    }

    let filtered = real.trim_end().to_string();
    if filtered.trim().is_empty() {
        None
    } else {
        Some(filtered)
    }
}

/// Remove comments from code content using the given comment style.
///
/// Full-line comments are dropped. Trailing inline comments are stripped.
/// Blank lines are preserved. String literals containing comment-like
/// sequences are not mangled.
pub fn filter_comments(content: &str, style: &CommentStyle) -> String {
    let normalized = content.replace("\r\n", "\n");
    let mut state = ScanState::default();
    let mut result: Vec<String> = Vec::new();
    for line in normalized.split('\n') {
        if let Some(filtered) = strip_line_comment(line, &mut state, style) {
            result.push(filtered);
        }
    }
    result.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_code_skips_line_comment() {
        let style = CommentStyle::c_family();
        let mut state = ScanState::default();
        let real = scan_code("int x = 1; // { not a brace", &mut state, &style);
        assert!(real.contains("int x = 1;"));
        assert!(!real.contains('{'));
    }

    #[test]
    fn test_scan_code_skips_strings() {
        let style = CommentStyle::c_family();
        let mut state = ScanState::default();
        let real = scan_code(r#"var s = "{ inside }"; {"#, &mut state, &style);
        let opens = real.matches('{').count();
        assert_eq!(opens, 1);
        assert!(!state.in_string);
    }

    #[test]
    fn test_scan_code_tracks_block_comment_across_lines() {
        let style = CommentStyle::c_family();
        let mut state = ScanState::default();
        let real = scan_code("start /* comment {", &mut state, &style);
        assert!(!real.contains('{'));
        assert!(state.in_block_comment);
        let real = scan_code("still { comment */ end }", &mut state, &style);
        assert!(!state.in_block_comment);
        assert!(real.contains('}'));
        assert!(!real.contains('{'));
    }

    #[test]
    fn test_scan_code_handles_escaped_quote() {
        let style = CommentStyle::c_family();
        let mut state = ScanState::default();
        scan_code(r#"var s = "a \" b";"#, &mut state, &style);
        assert!(!state.in_string);
    }

    #[test]
    fn test_mask_strings_keeps_comment_text() {
        let style = CommentStyle::c_family();
        let mut state = ScanState::default();
        let masked = mask_strings("// md.start: demo", &mut state, &style);
        assert!(masked.contains("md.start: demo"));
    }

    #[test]
    fn test_mask_strings_blanks_string_contents() {
        let style = CommentStyle::c_family();
        let mut state = ScanState::default();
        let masked = mask_strings(r#"var s = "md.start: demo";"#, &mut state, &style);
        assert!(!masked.contains("md.start"));
        assert!(masked.contains("var s = "));
    }

    #[test]
    fn test_filter_comments_drops_full_line_comments() {
        let style = CommentStyle::c_family();
        let code = "// header\nint x = 1; // trailing\n\n/* block */\nint y = 2;\n";
        let filtered = filter_comments(code, &style);
        assert_eq!(filtered, "int x = 1;\n\nint y = 2;\n");
    }

    #[test]
    fn test_filter_comments_preserves_comment_like_strings() {
        let style = CommentStyle::c_family();
        let code = "var url = \"http://example.com\";";
        let filtered = filter_comments(code, &style);
        assert_eq!(filtered, code);
    }

    #[test]
    fn test_filter_comments_python_hash() {
        let style = CommentStyle::python();
        let code = "# top\nx = 1  # trailing\ns = \"#nothash\"\n";
        let filtered = filter_comments(code, &style);
        assert_eq!(filtered, "x = 1\ns = \"#nothash\"\n");
    }
}
