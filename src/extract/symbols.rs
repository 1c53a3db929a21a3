//! Language-aware code symbol extraction
//!
//! Extracts named symbols (class, method, function) from source files using
//! regex-based declaration matching and block extraction. Layered bottom to
//! top: the string/comment scanner (shared with the comment filter), block
//! extraction strategies (brace-delimited, indentation-delimited, and
//! rest-of-file), declarative per-language configs, and the public API
//! `language_config_for` / `extract_symbol`.

use regex::Regex;
use std::path::Path;

use crate::extract::comments::{scan_code, CommentStyle, ScanState};

/// Block extraction strategy for a symbol kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStyle {
    /// Track `{`/`}` nesting from the declaration line.
    Brace,
    /// Block is the indented suite following the declaration (Python).
    Indent,
    /// Block extends to the end of the file (C# file-scoped namespace).
    RestOfFile,
}

/// A regex pattern for matching one symbol kind within a language.
///
/// `regex_template` carries a `{name}` placeholder for the symbol name.
#[derive(Debug, Clone)]
pub struct SymbolPattern {
    pub kind: &'static str,
    pub regex_template: &'static str,
    pub block_style: BlockStyle,
}

/// Complete language definition for symbol extraction.
#[derive(Debug, Clone)]
pub struct LanguageConfig {
    pub name: &'static str,
    pub extensions: &'static [&'static str],
    pub comment_style: CommentStyle,
    pub patterns: &'static [SymbolPattern],
}

const C_CPP_PATTERNS: &[SymbolPattern] = &[
    SymbolPattern {
        kind: "namespace",
        regex_template: r"^\s*namespace\s+{name}\b",
        block_style: BlockStyle::Brace,
    },
    SymbolPattern {
        kind: "class",
        regex_template: r"^\s*class\s+{name}\b",
        block_style: BlockStyle::Brace,
    },
    SymbolPattern {
        kind: "struct",
        regex_template: r"^\s*(?:typedef\s+)?struct\s+{name}\b",
        block_style: BlockStyle::Brace,
    },
    SymbolPattern {
        kind: "enum",
        regex_template: r"^\s*(?:typedef\s+)?enum\s+(?:class\s+)?{name}\b",
        block_style: BlockStyle::Brace,
    },
    SymbolPattern {
        kind: "function",
        regex_template: r"^\s*\S+[\s\*]+(?:\w+::)*{name}\s*\(",
        block_style: BlockStyle::Brace,
    },
];

const CSHARP_PATTERNS: &[SymbolPattern] = &[
    SymbolPattern {
        kind: "namespace_file_scoped",
        regex_template: r"^\s*namespace\s+{name}\s*;",
        block_style: BlockStyle::RestOfFile,
    },
    SymbolPattern {
        kind: "namespace",
        regex_template: r"^\s*namespace\s+{name}\b",
        block_style: BlockStyle::Brace,
    },
    SymbolPattern {
        kind: "class",
        regex_template: r"^\s*(?:public\s+|private\s+|protected\s+|internal\s+)?(?:static\s+)?(?:abstract\s+)?(?:partial\s+)?class\s+{name}\b",
        block_style: BlockStyle::Brace,
    },
    SymbolPattern {
        kind: "struct",
        regex_template: r"^\s*(?:public\s+|private\s+|protected\s+|internal\s+)?(?:readonly\s+)?struct\s+{name}\b",
        block_style: BlockStyle::Brace,
    },
    SymbolPattern {
        kind: "interface",
        regex_template: r"^\s*(?:public\s+|private\s+|protected\s+|internal\s+)?interface\s+{name}\b",
        block_style: BlockStyle::Brace,
    },
    SymbolPattern {
        kind: "enum",
        regex_template: r"^\s*(?:public\s+|private\s+|protected\s+|internal\s+)?enum\s+{name}\b",
        block_style: BlockStyle::Brace,
    },
    SymbolPattern {
        kind: "method",
        regex_template: r"^\s*(?:public\s+|private\s+|protected\s+|internal\s+)?(?:static\s+)?(?:abstract\s+)?(?:virtual\s+)?(?:override\s+)?(?:async\s+)?\S+\s+{name}\s*[\(<]",
        block_style: BlockStyle::Brace,
    },
];

const JAVA_PATTERNS: &[SymbolPattern] = &[
    SymbolPattern {
        kind: "class",
        regex_template: r"^\s*(?:public\s+|private\s+|protected\s+)?(?:static\s+)?(?:abstract\s+)?class\s+{name}\b",
        block_style: BlockStyle::Brace,
    },
    SymbolPattern {
        kind: "interface",
        regex_template: r"^\s*(?:public\s+|private\s+|protected\s+)?interface\s+{name}\b",
        block_style: BlockStyle::Brace,
    },
    SymbolPattern {
        kind: "enum",
        regex_template: r"^\s*(?:public\s+|private\s+|protected\s+)?enum\s+{name}\b",
        block_style: BlockStyle::Brace,
    },
    SymbolPattern {
        kind: "method",
        regex_template: r"^\s*(?:public\s+|private\s+|protected\s+)?(?:static\s+)?(?:abstract\s+)?\S+\s+{name}\s*\(",
        block_style: BlockStyle::Brace,
    },
];

const PYTHON_PATTERNS: &[SymbolPattern] = &[
    SymbolPattern {
        kind: "class",
        regex_template: r"^\s*class\s+{name}\b",
        block_style: BlockStyle::Indent,
    },
    SymbolPattern {
        kind: "function",
        regex_template: r"^\s*(?:async\s+)?def\s+{name}\s*\(",
        block_style: BlockStyle::Indent,
    },
];

const C_CPP_CONFIG: LanguageConfig = LanguageConfig {
    name: "C/C++",
    extensions: &["c", "cpp", "h", "hpp", "cc", "cxx"],
    comment_style: CommentStyle::c_family(),
    patterns: C_CPP_PATTERNS,
};

const CSHARP_CONFIG: LanguageConfig = LanguageConfig {
    name: "C#",
    extensions: &["cs"],
    comment_style: CommentStyle::c_family(),
    patterns: CSHARP_PATTERNS,
};

const JAVA_CONFIG: LanguageConfig = LanguageConfig {
    name: "Java",
    extensions: &["java"],
    comment_style: CommentStyle::c_family(),
    patterns: JAVA_PATTERNS,
};

const PYTHON_CONFIG: LanguageConfig = LanguageConfig {
    name: "Python",
    extensions: &["py"],
    comment_style: CommentStyle::python(),
    patterns: PYTHON_PATTERNS,
};

const ALL_CONFIGS: &[&LanguageConfig] =
    &[&C_CPP_CONFIG, &CSHARP_CONFIG, &JAVA_CONFIG, &PYTHON_CONFIG];

/// Return the language config for a file path, or `None` if unsupported.
pub fn language_config_for(file_path: &Path) -> Option<&'static LanguageConfig> {
    let ext = file_path.extension()?.to_str()?;
    ALL_CONFIGS
        .iter()
        .find(|config| config.extensions.contains(&ext))
        .copied()
}

// ---------------------------------------------------------------------------
// Block extraction
// ---------------------------------------------------------------------------

/// Find the closing line of a brace-delimited block starting at `start_idx`.
///
/// Tracks nesting depth with the string/comment scanner so braces inside
/// literals and comments do not count. Returns the inclusive end line index,
/// or `None` when no matching closing brace exists.
fn extract_block_brace(lines: &[String], start_idx: usize, style: &CommentStyle) -> Option<usize> {
    let mut depth: i64 = 0;
    let mut found_opening = false;
    let mut state = ScanState::default();

    for (line_idx, line) in lines.iter().enumerate().skip(start_idx) {
        let real = scan_code(line, &mut state, style);
        for ch in real.chars() {
            match ch {
                '{' => {
                    depth += 1;
                    found_opening = true;
                }
                '}' => depth -= 1,
                _ => {}
            }
        }
        if found_opening && depth == 0 {
            return Some(line_idx);
        }
    }

    None
}

/// Block extends from the declaration's indented suite to the last line
/// more deeply indented than the declaration (trailing blanks excluded).
fn extract_block_indent(lines: &[String], start_idx: usize) -> Option<usize> {
    let decl_indent = indent_width(&lines[start_idx]);
    let mut end = start_idx;

    for (line_idx, line) in lines.iter().enumerate().skip(start_idx + 1) {
        if line.trim().is_empty() {
            continue;
        }
        if indent_width(line) <= decl_indent {
            break;
        }
        end = line_idx;
    }

    if end == start_idx {
        // declaration with no suite (e.g. single-line stub)
        return Some(start_idx);
    }
    Some(end)
}

fn indent_width(line: &str) -> usize {
    line.chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .map(|c| if c == '\t' { 4 } else { 1 })
        .sum()
}

fn extract_block(
    lines: &[String],
    start_idx: usize,
    style: &CommentStyle,
    block_style: BlockStyle,
) -> Option<usize> {
    match block_style {
        BlockStyle::Brace => extract_block_brace(lines, start_idx, style),
        BlockStyle::Indent => extract_block_indent(lines, start_idx),
        BlockStyle::RestOfFile => Some(lines.len().saturating_sub(1)),
    }
}

/// Line index of the opening `{` of a block, scanning from `start_idx`.
fn find_block_start(lines: &[String], start_idx: usize, style: &CommentStyle) -> Option<usize> {
    let mut state = ScanState::default();
    for (line_idx, line) in lines.iter().enumerate().skip(start_idx) {
        let real = scan_code(line, &mut state, style);
        if real.contains('{') {
            return Some(line_idx);
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Signature matching (overload disambiguation)
// ---------------------------------------------------------------------------

const PARAM_MODIFIERS: &[&str] = &["ref ", "out ", "in ", "params ", "this ", "final "];

/// Split a parameter string on commas, respecting angle-bracket nesting.
fn split_params(param_string: &str) -> Vec<String> {
    if param_string.trim().is_empty() {
        return Vec::new();
    }

    let mut params = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;

    for ch in param_string.chars() {
        match ch {
            '<' => {
                depth += 1;
                current.push(ch);
            }
            '>' => {
                depth -= 1;
                current.push(ch);
            }
            ',' if depth == 0 => {
                params.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }

    let last = current.trim();
    if !last.is_empty() {
        params.push(last.to_string());
    }
    params
}

/// Extract the type from a single `type name` or `type` parameter string.
fn extract_type_name(param: &str) -> String {
    let param = param.trim();
    let mut angle_depth = 0i32;
    let mut last_space: Option<usize> = None;

    for (i, ch) in param.char_indices() {
        match ch {
            '<' => angle_depth += 1,
            '>' => angle_depth -= 1,
            ' ' if angle_depth == 0 => last_space = Some(i),
            _ => {}
        }
    }

    match last_space {
        Some(i) if i > 0 => param[..i].to_string(),
        _ => param.to_string(),
    }
}

fn finalize_params(collected: &str) -> Vec<String> {
    let param_str = collected.trim();
    if param_str.is_empty() {
        return Vec::new();
    }

    let mut types = Vec::new();
    for p in split_params(param_str) {
        let mut p = p.trim().to_string();
        if p.is_empty() {
            continue;
        }
        if let Some(eq) = p.find('=') {
            p = p[..eq].trim().to_string();
        }
        let lower = p.to_lowercase();
        for modifier in PARAM_MODIFIERS {
            if lower.starts_with(modifier) {
                p = p[modifier.len()..].trim().to_string();
                break;
            }
        }
        types.push(extract_type_name(&p));
    }
    types
}

/// Extract parameter types from a declaration starting at `decl_idx`.
///
/// Scans forward up to ten lines to collect the full parameter list.
/// Returns `None` when the list cannot be parsed.
fn extract_param_types(lines: &[String], decl_idx: usize) -> Option<Vec<String>> {
    let mut collected = String::new();
    let mut found_open = false;
    let mut depth = 0i32;

    for line in lines.iter().skip(decl_idx).take(10) {
        for ch in line.chars() {
            if !found_open {
                if ch == '(' {
                    found_open = true;
                    depth = 1;
                }
            } else {
                match ch {
                    '(' => {
                        depth += 1;
                        collected.push(ch);
                    }
                    ')' => {
                        depth -= 1;
                        if depth == 0 {
                            return Some(finalize_params(&collected));
                        }
                        collected.push(ch);
                    }
                    _ => collected.push(ch),
                }
            }
        }
    }

    None
}

/// Case-insensitive type match with suffix matching for namespaced types
/// (`String` matches `System.String`).
fn match_signature(requested: &[String], declared: &[String]) -> bool {
    if requested.len() != declared.len() {
        return false;
    }
    requested.iter().zip(declared.iter()).all(|(req, decl)| {
        let req = req.trim().to_lowercase();
        let decl = decl.trim().to_lowercase();
        req == decl || decl.ends_with(&format!(".{req}"))
    })
}

// ---------------------------------------------------------------------------
// Spec parsing
// ---------------------------------------------------------------------------

/// Parsed symbol specification from user input.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SymbolSpec {
    /// Dot-separated name components.
    parts: Vec<String>,
    /// Parameter-type signature text, when parentheses were given.
    signature: Option<String>,
    has_parens: bool,
}

/// Parse a possibly dotted or overloaded symbol specification.
///
/// `MyClass.MyMethod(string, int)` yields parts `[MyClass, MyMethod]` with
/// signature `string, int`.
fn parse_symbol_spec(symbol_name: &str) -> SymbolSpec {
    let name = symbol_name.trim();

    if name.ends_with(')') {
        let chars: Vec<char> = name.chars().collect();
        let mut depth = 0i32;
        for i in (0..chars.len()).rev() {
            match chars[i] {
                ')' => depth += 1,
                '(' => {
                    depth -= 1;
                    if depth == 0 && i > 0 {
                        let sig: String = chars[i + 1..chars.len() - 1].iter().collect();
                        let head: String = chars[..i].iter().collect();
                        return SymbolSpec {
                            parts: head.split('.').map(str::to_string).collect(),
                            signature: Some(sig),
                            has_parens: true,
                        };
                    }
                    break;
                }
                _ => {}
            }
        }
    }

    SymbolSpec {
        parts: name.split('.').map(str::to_string).collect(),
        signature: None,
        has_parens: false,
    }
}

// ---------------------------------------------------------------------------
// Symbol search
// ---------------------------------------------------------------------------

fn requested_params(signature: Option<&str>, has_parens: bool) -> Option<Vec<String>> {
    match (has_parens, signature) {
        (true, Some(sig)) if !sig.trim().is_empty() => Some(split_params(sig)),
        (true, _) => Some(Vec::new()),
        (false, _) => None,
    }
}

fn count_braces(real: &str) -> i64 {
    real.chars().fold(0i64, |acc, ch| match ch {
        '{' => acc + 1,
        '}' => acc - 1,
        _ => acc,
    })
}

struct FoundBlock {
    start_idx: usize,
    end_idx: usize,
    block_style: BlockStyle,
}

fn try_match_at_line(
    lines: &[String],
    line_idx: usize,
    pattern: &SymbolPattern,
    regex: &Regex,
    requested: Option<&[String]>,
    config: &LanguageConfig,
) -> Option<usize> {
    if !regex.is_match(&lines[line_idx]) {
        return None;
    }
    if let Some(requested) = requested {
        let declared = extract_param_types(lines, line_idx)?;
        if !match_signature(requested, &declared) {
            return None;
        }
    }
    extract_block(lines, line_idx, &config.comment_style, pattern.block_style)
}

/// Search for a symbol declaration within a line range.
///
/// When `restrict_depth` is set, only declarations at brace depth zero
/// within the range match (direct members of the enclosing scope).
fn find_symbol_in_range(
    lines: &[String],
    name: &str,
    config: &LanguageConfig,
    range_start: usize,
    range_end: usize,
    signature: Option<&str>,
    has_parens: bool,
    restrict_depth: bool,
) -> Option<FoundBlock> {
    let requested = requested_params(signature, has_parens);
    let escaped = regex::escape(name);

    for pattern in config.patterns {
        let regex = match Regex::new(&pattern.regex_template.replace("{name}", &escaped)) {
            Ok(regex) => regex,
            Err(_) => continue,
        };
        let mut scan_state = ScanState::default();
        let mut depth = 0i64;

        for line_idx in range_start..=range_end.min(lines.len().saturating_sub(1)) {
            let at_depth = if restrict_depth {
                let real = scan_code(&lines[line_idx], &mut scan_state, &config.comment_style);
                let here = depth == 0;
                depth += count_braces(&real);
                here
            } else {
                true
            };

            if at_depth {
                if let Some(end_idx) = try_match_at_line(
                    lines,
                    line_idx,
                    pattern,
                    &regex,
                    requested.as_deref(),
                    config,
                ) {
                    return Some(FoundBlock {
                        start_idx: line_idx,
                        end_idx,
                        block_style: pattern.block_style,
                    });
                }
            }
        }
    }

    None
}

fn sig_and_parens(spec: &SymbolSpec, is_last: bool) -> (Option<&str>, bool) {
    if is_last {
        (spec.signature.as_deref(), spec.has_parens)
    } else {
        (None, false)
    }
}

/// Find the symbol at `spec.parts[i]`, greedily coalescing subsequent parts
/// so that a dotted name declared verbatim (`NS.Class`) is preferred over
/// descending one part at a time.
fn find_with_coalescing(
    lines: &[String],
    spec: &SymbolSpec,
    i: usize,
    config: &LanguageConfig,
    range_start: usize,
    range_end: usize,
) -> Option<(usize, FoundBlock)> {
    let restrict = i > 0;
    let mut part = spec.parts[i].clone();
    let (sig, parens) = sig_and_parens(spec, i == spec.parts.len() - 1);
    if let Some(found) =
        find_symbol_in_range(lines, &part, config, range_start, range_end, sig, parens, restrict)
    {
        return Some((i, found));
    }

    for j in i + 1..spec.parts.len() {
        part = format!("{part}.{}", spec.parts[j]);
        let (sig, parens) = sig_and_parens(spec, j == spec.parts.len() - 1);
        if let Some(found) = find_symbol_in_range(
            lines,
            &part,
            config,
            range_start,
            range_end,
            sig,
            parens,
            restrict,
        ) {
            return Some((j, found));
        }
    }

    None
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Extract a named code symbol from source content.
///
/// Supports dot notation for scoped lookup (`MyClass.MyMethod`) and an
/// optional parameter signature for overload disambiguation
/// (`MyMethod(string, int)`). Returns the extracted lines joined with
/// newlines, or `None` when the symbol is not found.
pub fn extract_symbol(content: &str, symbol_name: &str, config: &LanguageConfig) -> Option<String> {
    let normalized = content.replace("\r\n", "\n");
    let lines: Vec<String> = normalized.split('\n').map(str::to_string).collect();
    if lines.is_empty() {
        return None;
    }

    let spec = parse_symbol_spec(symbol_name);
    let mut range_start = 0usize;
    let mut range_end = lines.len() - 1;
    let mut i = 0usize;

    while i < spec.parts.len() {
        let (matched, found) =
            find_with_coalescing(&lines, &spec, i, config, range_start, range_end)?;
        i = matched;

        if i < spec.parts.len() - 1 {
            match found.block_style {
                BlockStyle::Brace => {
                    let brace_line =
                        find_block_start(&lines, found.start_idx, &config.comment_style)?;
                    range_start = brace_line + 1;
                }
                BlockStyle::Indent | BlockStyle::RestOfFile => {
                    range_start = found.start_idx + 1;
                }
            }
            range_end = found.end_idx;
        } else {
            return Some(lines[found.start_idx..=found.end_idx].join("\n"));
        }
        i += 1;
    }

    None
}
