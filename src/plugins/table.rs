//! Table plugin: renders CSV, TSV, or JSON sources as Markdown tables
//!
//! Input validation parses the source into rows once and hands them to the
//! transform as the node's artifact. The transform pipeline applies
//! filter, select, order_by, then offset/limit, and renders with optional
//! date formatting, null replacement, and cell truncation.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::Path;
use std::sync::OnceLock;

use crate::document::Directive;
use crate::planner::PlanNode;
use crate::plugins::{InputValidation, Piece, Plugin, PluginConfig, PluginContext};
use crate::status::Status;

const SELECT_KEY: &str = "select";
const ORDER_BY_KEY: &str = "order_by";
const LIMIT_KEY: &str = "limit";
const OFFSET_KEY: &str = "offset";
const FILTER_KEY: &str = "filter";
const DATE_FORMAT_KEY: &str = "date_format";
const NULL_STRING_KEY: &str = "null_string";
const MAX_CELL_LENGTH_KEY: &str = "max_cell_length";

const DEFAULT_LIMIT: i64 = -1;
const DEFAULT_OFFSET: i64 = 0;
const DEFAULT_MAX_CELL_LENGTH: i64 = 0;

const SUPPORTED_EXTENSIONS: [&str; 3] = ["csv", "tsv", "json"];

const NO_RESULTS_NOTE: &str = "> [!NOTE]\n> no results\n";

fn select_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^\s*(\w+)(?:\s+as\s+(\w+))?\s*$").unwrap())
}

fn order_by_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^\s*(\w+)(?:\s+(asc|desc))?\s*$").unwrap())
}

fn filter_op_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(!=|<=|>=|<|>|=)\s*(.+)$").unwrap())
}

/// Parsed tabular data carried as the plan node's artifact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct TableArtifact {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

pub struct TablePlugin;

impl Plugin for TablePlugin {
    fn name(&self) -> &'static str {
        "table plugin"
    }

    fn directive_type(&self) -> &'static str {
        "table"
    }

    fn validate_directive(&self, directive: &Directive, _config: &PluginConfig) -> Vec<Status> {
        if !directive.has_source() {
            return vec![Status::error("'table' directive requires a source")];
        }

        let mut errors = Vec::new();
        let ext = extension_of(&directive.source);
        if !SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
            errors.push(Status::error(format!(
                "unsupported table format '{ext}' (expected csv, tsv, or json)"
            )));
        }

        for key in [LIMIT_KEY, OFFSET_KEY, MAX_CELL_LENGTH_KEY] {
            if let Err(status) = directive.int_option(key, 0) {
                errors.push(status);
            }
        }

        if let Some(filter) = directive.option(FILTER_KEY) {
            errors.extend(validate_filter(filter));
        }

        errors
    }

    fn validate_input(
        &self,
        directive: &Directive,
        content: &str,
        _config: &PluginConfig,
    ) -> Option<InputValidation> {
        let ext = extension_of(&directive.source);
        let parsed = match ext.as_str() {
            "csv" => parse_delimited(content, ','),
            "tsv" => parse_delimited(content, '\t'),
            "json" => match parse_json_rows(content) {
                Ok(artifact) => artifact,
                Err(errors) => return Some(InputValidation::with_errors(errors)),
            },
            other => {
                return Some(InputValidation::with_errors(vec![Status::error(format!(
                    "unsupported table format '{other}'"
                ))]));
            }
        };

        if parsed.rows.is_empty() {
            return Some(InputValidation::with_errors(vec![Status::error(
                "table source contains no rows",
            )]));
        }

        let mut errors = Vec::new();
        if let Some(select) = directive.option(SELECT_KEY) {
            errors.extend(validate_select(&parsed.headers, select));
        }
        if let Some(order_by) = directive.option(ORDER_BY_KEY) {
            errors.extend(validate_order_by(order_by));
        }
        if !errors.is_empty() {
            return Some(InputValidation::with_errors(errors));
        }

        match serde_json::to_value(&parsed) {
            Ok(value) => Some(InputValidation::with_artifact(value)),
            Err(exc) => Some(InputValidation::with_errors(vec![Status::error(format!(
                "failed to serialise table rows: {exc}"
            ))])),
        }
    }

    fn transform(&self, node: &PlanNode, _parent: &[Piece], _ctx: &mut PluginContext) -> String {
        if node.document.is_none() {
            return String::new();
        }

        let artifact: TableArtifact = match &node.artifact {
            Some(value) => match serde_json::from_value(value.clone()) {
                Ok(artifact) => artifact,
                Err(_) => return NO_RESULTS_NOTE.to_string(),
            },
            None => return NO_RESULTS_NOTE.to_string(),
        };

        let directive = &node.directive;
        let limit = directive.int_option(LIMIT_KEY, DEFAULT_LIMIT).unwrap_or(DEFAULT_LIMIT);
        let offset = directive
            .int_option(OFFSET_KEY, DEFAULT_OFFSET)
            .unwrap_or(DEFAULT_OFFSET)
            .max(0);
        let max_cell_length = directive
            .int_option(MAX_CELL_LENGTH_KEY, DEFAULT_MAX_CELL_LENGTH)
            .unwrap_or(DEFAULT_MAX_CELL_LENGTH)
            .max(0) as usize;
        let date_format = directive.option(DATE_FORMAT_KEY).unwrap_or("");
        let null_string = directive.option(NULL_STRING_KEY).unwrap_or("");

        let mut headers = artifact.headers;
        let mut rows = artifact.rows;

        if let Some(filter) = directive.option(FILTER_KEY) {
            if let Ok(filter_map) =
                serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(filter)
            {
                rows = apply_filter(&headers, rows, &filter_map);
            }
        }

        if let Some(select) = directive.option(SELECT_KEY).filter(|s| !s.is_empty()) {
            (headers, rows) = apply_select(&headers, rows, select);
        }

        if let Some(order_by) = directive.option(ORDER_BY_KEY).filter(|s| !s.is_empty()) {
            rows = apply_order_by(&headers, rows, order_by);
        }

        let rows: Vec<Vec<String>> = rows.into_iter().skip(offset as usize).collect();
        let rows: Vec<Vec<String>> = if limit >= 0 {
            rows.into_iter().take(limit as usize).collect()
        } else {
            rows
        };

        if rows.is_empty() {
            return NO_RESULTS_NOTE.to_string();
        }

        render_table(&headers, &rows, date_format, null_string, max_cell_length)
    }
}

fn extension_of(source: &str) -> String {
    Path::new(source)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Minimal quote-aware delimited parser (RFC 4180 quoting rules).
fn parse_delimited(content: &str, delimiter: char) -> TableArtifact {
    let mut records: Vec<Vec<String>> = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = content.chars().peekable();

    while let Some(ch) = chars.next() {
        if in_quotes {
            if ch == '"' {
                if chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(ch);
            }
        } else if ch == '"' && field.is_empty() {
            in_quotes = true;
        } else if ch == delimiter {
            record.push(std::mem::take(&mut field));
        } else if ch == '\n' || ch == '\r' {
            if ch == '\r' && chars.peek() == Some(&'\n') {
                chars.next();
            }
            record.push(std::mem::take(&mut field));
            if !(record.len() == 1 && record[0].is_empty()) {
                records.push(std::mem::take(&mut record));
            }
            record.clear();
        } else {
            field.push(ch);
        }
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }

    if records.is_empty() {
        return TableArtifact {
            headers: Vec::new(),
            rows: Vec::new(),
        };
    }

    let headers = records.remove(0);
    let width = headers.len();
    let rows = records
        .into_iter()
        .map(|mut row| {
            row.resize(width, String::new());
            row
        })
        .collect();

    TableArtifact { headers, rows }
}

/// Parse a JSON array of objects into rows. Headers are the union of keys
/// in first-seen order.
fn parse_json_rows(content: &str) -> Result<TableArtifact, Vec<Status>> {
    let data: serde_json::Value = serde_json::from_str(content)
        .map_err(|exc| vec![Status::error(format!("invalid JSON table source: {exc}"))])?;

    let array = match data {
        serde_json::Value::Array(array) => array,
        other => {
            return Err(vec![Status::error(format!(
                "JSON table source must be an array of objects, got {}",
                json_type_name(&other)
            ))]);
        }
    };

    let mut headers: Vec<String> = Vec::new();
    let mut objects = Vec::with_capacity(array.len());
    for row in array {
        match row {
            serde_json::Value::Object(object) => {
                for key in object.keys() {
                    if !headers.contains(key) {
                        headers.push(key.clone());
                    }
                }
                objects.push(object);
            }
            _ => {
                return Err(vec![Status::error(
                    "JSON table source must contain only objects",
                )]);
            }
        }
    }

    let rows = objects
        .into_iter()
        .map(|object| {
            headers
                .iter()
                .map(|header| object.get(header).map(json_value_to_string).unwrap_or_default())
                .collect()
        })
        .collect();

    Ok(TableArtifact { headers, rows })
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

fn json_value_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Option validation
// ---------------------------------------------------------------------------

fn validate_filter(filter: &str) -> Vec<Status> {
    match serde_json::from_str::<serde_json::Value>(filter) {
        Ok(serde_json::Value::Object(_)) => Vec::new(),
        Ok(_) => vec![Status::error(
            "'filter' must be a mapping of column names to conditions",
        )],
        Err(_) => vec![Status::error("'filter' must be a valid JSON mapping")],
    }
}

fn validate_select(headers: &[String], select: &str) -> Vec<Status> {
    if select.is_empty() {
        return Vec::new();
    }
    let mut errors = Vec::new();
    for part in select.split(',') {
        match select_pattern().captures(part) {
            None => errors.push(Status::error(format!(
                "invalid select expression '{}'",
                part.trim()
            ))),
            Some(captures) => {
                let column = captures.get(1).map(|m| m.as_str()).unwrap_or("");
                if !headers.iter().any(|h| h == column) {
                    errors.push(Status::error(format!(
                        "column '{column}' not found (available: {})",
                        headers.join(", ")
                    )));
                }
            }
        }
    }
    errors
}

fn validate_order_by(order_by: &str) -> Vec<Status> {
    if order_by.is_empty() {
        return Vec::new();
    }
    order_by
        .split(',')
        .filter(|part| !order_by_pattern().is_match(part))
        .map(|part| Status::error(format!("invalid order_by expression '{}'", part.trim())))
        .collect()
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

fn column_index(headers: &[String], column: &str) -> Option<usize> {
    headers.iter().position(|h| h == column)
}

/// Keep rows matching every filter condition (all keys are ANDed).
fn apply_filter(
    headers: &[String],
    rows: Vec<Vec<String>>,
    filter_map: &serde_json::Map<String, serde_json::Value>,
) -> Vec<Vec<String>> {
    rows.into_iter()
        .filter(|row| {
            filter_map.iter().all(|(column, condition)| {
                let value = column_index(headers, column)
                    .and_then(|i| row.get(i))
                    .map(String::as_str)
                    .unwrap_or("");
                let condition = match condition {
                    serde_json::Value::String(s) => s.clone(),
                    other => json_value_to_string(other),
                };
                evaluate_condition(value, &condition)
            })
        })
        .collect()
}

fn evaluate_condition(row_value: &str, condition: &str) -> bool {
    let (operator, target) = match filter_op_pattern().captures(condition) {
        Some(captures) => (
            captures.get(1).map(|m| m.as_str()).unwrap_or("="),
            captures.get(2).map(|m| m.as_str().trim()).unwrap_or(""),
        ),
        None => ("=", condition),
    };

    // numeric comparison when both sides parse
    if let (Ok(left), Ok(right)) = (row_value.parse::<f64>(), target.parse::<f64>()) {
        return compare(operator, left.partial_cmp(&right));
    }
    compare(operator, Some(row_value.cmp(target)))
}

fn compare(operator: &str, ordering: Option<Ordering>) -> bool {
    let ordering = match ordering {
        Some(ordering) => ordering,
        None => return false,
    };
    match operator {
        "=" => ordering == Ordering::Equal,
        "!=" => ordering != Ordering::Equal,
        "<" => ordering == Ordering::Less,
        "<=" => ordering != Ordering::Greater,
        ">" => ordering == Ordering::Greater,
        ">=" => ordering != Ordering::Less,
        _ => false,
    }
}

/// Project and rename columns per the select expression
/// (`col_a, col_b as b`). Syntax and column existence were checked by
/// input validation.
fn apply_select(
    headers: &[String],
    rows: Vec<Vec<String>>,
    select: &str,
) -> (Vec<String>, Vec<Vec<String>>) {
    let mut column_map: Vec<(usize, String)> = Vec::new();
    for part in select.split(',') {
        if let Some(captures) = select_pattern().captures(part) {
            let column = captures.get(1).map(|m| m.as_str()).unwrap_or("");
            let alias = captures
                .get(2)
                .map(|m| m.as_str().to_string())
                .unwrap_or_else(|| column.to_string());
            if let Some(index) = column_index(headers, column) {
                column_map.push((index, alias));
            }
        }
    }

    let new_headers: Vec<String> = column_map.iter().map(|(_, alias)| alias.clone()).collect();
    let new_rows = rows
        .into_iter()
        .map(|row| {
            column_map
                .iter()
                .map(|(index, _)| row.get(*index).cloned().unwrap_or_default())
                .collect()
        })
        .collect();

    (new_headers, new_rows)
}

/// Stable multi-column sort per the order_by expression
/// (`col_a desc, col_b`). Later specs have lower priority.
fn apply_order_by(headers: &[String], rows: Vec<Vec<String>>, order_by: &str) -> Vec<Vec<String>> {
    let mut specs: Vec<(usize, bool)> = Vec::new();
    for part in order_by.split(',') {
        if let Some(captures) = order_by_pattern().captures(part) {
            let column = captures.get(1).map(|m| m.as_str()).unwrap_or("");
            let descending = captures
                .get(2)
                .map(|m| m.as_str().eq_ignore_ascii_case("desc"))
                .unwrap_or(false);
            if let Some(index) = column_index(headers, column) {
                specs.push((index, descending));
            }
        }
    }

    let mut result = rows;
    for (index, descending) in specs.into_iter().rev() {
        result.sort_by(|a, b| {
            let left = a.get(index).map(String::as_str).unwrap_or("");
            let right = b.get(index).map(String::as_str).unwrap_or("");
            let ordering = sort_key_cmp(left, right);
            if descending {
                ordering.reverse()
            } else {
                ordering
            }
        });
    }
    result
}

/// Numeric values sort before strings when mixed; within each group the
/// natural order applies.
fn sort_key_cmp(left: &str, right: &str) -> Ordering {
    match (left.parse::<f64>(), right.parse::<f64>()) {
        (Ok(l), Ok(r)) => l.partial_cmp(&r).unwrap_or(Ordering::Equal),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => left.cmp(right),
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn render_table(
    headers: &[String],
    rows: &[Vec<String>],
    date_format: &str,
    null_string: &str,
    max_cell_length: usize,
) -> String {
    let mut lines = Vec::with_capacity(rows.len() + 2);
    lines.push(format!("| {} |", headers.join(" | ")));
    lines.push(format!(
        "| {} |",
        headers.iter().map(|_| "---").collect::<Vec<_>>().join(" | ")
    ));
    for row in rows {
        let cells: Vec<String> = (0..headers.len())
            .map(|i| {
                let value = row.get(i).map(String::as_str).unwrap_or("");
                format_cell(value, date_format, null_string, max_cell_length)
            })
            .collect();
        lines.push(format!("| {} |", cells.join(" | ")));
    }
    lines.join("\n") + "\n"
}

fn format_cell(value: &str, date_format: &str, null_string: &str, max_cell_length: usize) -> String {
    if value.is_empty() {
        return null_string.to_string();
    }

    let mut value = value.to_string();
    if !date_format.is_empty() {
        if let Some(formatted) = format_date(&value, date_format) {
            value = formatted;
        }
    }

    value = value.replace('|', "\\|").replace('\n', " ").replace('\r', "");

    if max_cell_length > 0 && value.chars().count() > max_cell_length {
        value = value.chars().take(max_cell_length - 1).collect::<String>() + "\u{2026}";
    }

    value
}

/// Parse ISO 8601 / RFC 3339 date text and reformat with a strftime
/// pattern. Unparseable values and invalid patterns pass through
/// unchanged.
fn format_date(value: &str, date_format: &str) -> Option<String> {
    use std::fmt::Write;

    let mut formatted = String::new();
    let result = if let Ok(datetime) = DateTime::parse_from_rfc3339(value) {
        write!(formatted, "{}", datetime.format(date_format))
    } else if let Ok(datetime) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
        write!(formatted, "{}", datetime.format(date_format))
    } else if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        write!(formatted, "{}", date.format(date_format))
    } else {
        return None;
    };

    result.ok().map(|_| formatted)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact_from(directive: &Directive, content: &str) -> InputValidation {
        TablePlugin
            .validate_input(directive, content, &PluginConfig::default())
            .unwrap()
    }

    fn transform_with(directive: Directive, content: &str) -> String {
        let validation = artifact_from(&directive, content);
        assert!(validation.errors.is_empty(), "{:?}", validation.errors);

        let node = PlanNode {
            directive,
            status: Vec::new(),
            document: Some(crate::document::Document::new("/data.csv", Vec::new())),
            children: Some(Vec::new()),
            artifact: validation.artifact,
        };

        let mut cache = crate::file_cache::FileCache::new(
            1024,
            1024 * 1024,
            vec![std::path::PathBuf::from("/")],
            crate::file_cache::WriteMode::Overwrite,
            0,
        )
        .unwrap();
        let (registry, _) = crate::plugins::registry::build_registry(&[]);
        let config = PluginConfig::default();
        let mut ctx = PluginContext::new(
            &mut cache,
            &registry,
            &config,
            None,
            std::path::PathBuf::new(),
            0,
        );
        TablePlugin.transform(&node, &[], &mut ctx)
    }

    const CSV: &str = "name,age,city\nAda,36,London\nBrian,41,Cambridge\nGrace,45,Arlington\n";

    #[test]
    fn test_validate_requires_source_and_known_format() {
        let errors =
            TablePlugin.validate_directive(&Directive::new("table", ""), &PluginConfig::default());
        assert!(errors[0].description.contains("requires a source"));

        let errors = TablePlugin.validate_directive(
            &Directive::new("table", "/d.xml"),
            &PluginConfig::default(),
        );
        assert!(errors[0].description.contains("unsupported table format"));
    }

    #[test]
    fn test_csv_renders_markdown_table() {
        let directive = Directive::new("table", "/data.csv");
        let output = transform_with(directive, CSV);
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[0], "| name | age | city |");
        assert_eq!(lines[1], "| --- | --- | --- |");
        assert_eq!(lines[2], "| Ada | 36 | London |");
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn test_select_with_alias() {
        let directive = Directive::new("table", "/data.csv").with_option("select", "name as who, age");
        let output = transform_with(directive, CSV);
        assert!(output.starts_with("| who | age |\n"));
        assert!(output.contains("| Ada | 36 |"));
        assert!(!output.contains("London"));
    }

    #[test]
    fn test_order_by_desc_numeric() {
        let directive = Directive::new("table", "/data.csv").with_option("order_by", "age desc");
        let output = transform_with(directive, CSV);
        let lines: Vec<&str> = output.lines().collect();
        assert!(lines[2].contains("Grace"));
        assert!(lines[4].contains("Ada"));
    }

    #[test]
    fn test_filter_numeric_comparison() {
        let directive =
            Directive::new("table", "/data.csv").with_option("filter", r#"{"age": "> 40"}"#);
        let output = transform_with(directive, CSV);
        assert!(!output.contains("Ada"));
        assert!(output.contains("Brian"));
        assert!(output.contains("Grace"));
    }

    #[test]
    fn test_limit_and_offset() {
        let directive = Directive::new("table", "/data.csv")
            .with_option("limit", "1")
            .with_option("offset", "1");
        let output = transform_with(directive, CSV);
        assert!(!output.contains("Ada"));
        assert!(output.contains("Brian"));
        assert!(!output.contains("Grace"));
    }

    #[test]
    fn test_filter_to_empty_renders_note() {
        let directive =
            Directive::new("table", "/data.csv").with_option("filter", r#"{"age": "> 99"}"#);
        let output = transform_with(directive, CSV);
        assert_eq!(output, NO_RESULTS_NOTE);
    }

    #[test]
    fn test_json_rows_and_null_string() {
        let json = r#"[{"a": "1", "b": null}, {"a": "2", "b": "x"}]"#;
        let directive = Directive::new("table", "/d.json").with_option("null_string", "n/a");
        let output = transform_with(directive, json);
        assert!(output.contains("| 1 | n/a |"));
        assert!(output.contains("| 2 | x |"));
    }

    #[test]
    fn test_json_must_be_array_of_objects() {
        let directive = Directive::new("table", "/d.json");
        let validation = artifact_from(&directive, r#"{"a": 1}"#);
        assert!(!validation.errors.is_empty());
        assert!(validation.errors[0].description.contains("array of objects"));
    }

    #[test]
    fn test_select_unknown_column_is_input_error() {
        let directive = Directive::new("table", "/data.csv").with_option("select", "ghost");
        let validation = artifact_from(&directive, CSV);
        assert!(validation.errors[0].description.contains("column 'ghost' not found"));
    }

    #[test]
    fn test_empty_source_is_input_error() {
        let directive = Directive::new("table", "/data.csv");
        let validation = artifact_from(&directive, "name,age\n");
        assert!(validation.errors[0].description.contains("no rows"));
    }

    #[test]
    fn test_quoted_csv_fields() {
        let csv = "name,quote\nAda,\"Hello, world\"\n";
        let directive = Directive::new("table", "/data.csv");
        let output = transform_with(directive, csv);
        assert!(output.contains("| Ada | Hello, world |"));
    }

    #[test]
    fn test_cell_escaping_and_truncation() {
        let csv = "text\nlong|piped value here\n";
        let directive = Directive::new("table", "/data.csv").with_option("max_cell_length", "8");
        let output = transform_with(directive, csv);
        assert!(output.contains("long\\|p\u{2026}"));
    }

    #[test]
    fn test_date_format_option() {
        let csv = "when\n2024-03-05\n";
        let directive = Directive::new("table", "/data.csv").with_option("date_format", "%d/%m/%Y");
        let output = transform_with(directive, csv);
        assert!(output.contains("| 05/03/2024 |"));
    }

    #[test]
    fn test_tsv_delimiter() {
        let tsv = "a\tb\n1\t2\n";
        let directive = Directive::new("table", "/d.tsv");
        let output = transform_with(directive, tsv);
        assert!(output.contains("| 1 | 2 |"));
    }
}
