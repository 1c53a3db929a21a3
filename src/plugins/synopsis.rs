//! Synopsis plugin: extractive summary rendered as a blockquote
//!
//! Strips Markdown syntax, splits the text into sentence blocks, scores
//! sentences with either normalised word-frequency or Luhn's
//! significant-word cluster algorithm, and re-emits the top sentences in
//! document order. Earlier blocks are weighted higher.

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::document::Directive;
use crate::planner::PlanNode;
use crate::plugins::{stopwords, Piece, Plugin, PluginConfig, PluginContext};
use crate::status::Status;

pub const MAX_SENTENCES_KEY: &str = "max_sentences";
pub const ALGORITHM_KEY: &str = "algorithm";
pub const LANGUAGE_KEY: &str = "language";
pub const SECTIONS_KEY: &str = "sections";

pub const DEFAULT_MAX_SENTENCES: i64 = 3;
pub const DEFAULT_SECTIONS: i64 = 0;

const VALID_ALGORITHMS: [&str; 2] = ["frequency", "luhn"];
pub const VALID_LANGUAGES: [&str; 2] = ["en", "nl"];

const LUHN_WINDOW: usize = 5;
const MIN_SENTENCE_WORDS: usize = 3;

const NO_CONTENT_NOTE: &str = "> [!NOTE]\n> no content to summarise\n";

fn word_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[a-z]+").unwrap())
}

pub struct SynopsisPlugin;

impl Plugin for SynopsisPlugin {
    fn name(&self) -> &'static str {
        "synopsis plugin"
    }

    fn directive_type(&self) -> &'static str {
        "synopsis"
    }

    fn validate_directive(&self, directive: &Directive, _config: &PluginConfig) -> Vec<Status> {
        let mut statuses = Vec::new();
        statuses.extend(validate_int_min(
            directive,
            MAX_SENTENCES_KEY,
            DEFAULT_MAX_SENTENCES,
            1,
        ));
        statuses.extend(validate_enum(directive, ALGORITHM_KEY, &VALID_ALGORITHMS));
        statuses.extend(validate_enum(directive, LANGUAGE_KEY, &VALID_LANGUAGES));
        statuses.extend(validate_int_min(directive, SECTIONS_KEY, DEFAULT_SECTIONS, 0));
        statuses
    }

    fn transform(&self, node: &PlanNode, parent: &[Piece], ctx: &mut PluginContext) -> String {
        let text = extract_text(node, parent, ctx);
        let max_sentences = node
            .directive
            .int_option(MAX_SENTENCES_KEY, DEFAULT_MAX_SENTENCES)
            .unwrap_or(DEFAULT_MAX_SENTENCES)
            .max(1) as usize;
        let algorithm = node.directive.option(ALGORITHM_KEY).unwrap_or("frequency");
        let language = node.directive.option(LANGUAGE_KEY).unwrap_or("en");
        let sections = node
            .directive
            .int_option(SECTIONS_KEY, DEFAULT_SECTIONS)
            .unwrap_or(DEFAULT_SECTIONS)
            .max(0) as usize;

        let cleaned = clean_text(&text);
        let blocks = split_into_blocks(&cleaned, sections);
        if blocks.is_empty() {
            return NO_CONTENT_NOTE.to_string();
        }

        let (sentences, block_indices) = flatten_blocks(blocks);
        let stopword_list = stopwords::for_language(language);
        let raw_scores = if algorithm == "luhn" {
            score_luhn(&sentences, stopword_list)
        } else {
            score_frequency(&sentences, stopword_list)
        };
        let weighted: Vec<(f64, usize)> = raw_scores
            .into_iter()
            .map(|(score, i)| (score * (1.0 / (1 + block_indices[i]) as f64), i))
            .collect();
        let selected = select_top(&weighted, max_sentences);

        let summary: Vec<&str> = selected.iter().map(|i| sentences[*i].as_str()).collect();
        format!("> {}\n", summary.join(" "))
    }
}

/// Text to summarise: the source file's content, or the parent document's
/// string fragments when no source is given.
pub fn extract_text(node: &PlanNode, parent: &[Piece], ctx: &mut PluginContext) -> String {
    if node.directive.has_source() {
        let (content, _) = ctx
            .file_cache
            .get_file(std::path::Path::new(&node.directive.source));
        return content.map(|c| c.to_string()).unwrap_or_default();
    }
    parent
        .iter()
        .filter_map(Piece::as_text)
        .collect::<String>()
}

pub fn validate_int_min(directive: &Directive, key: &str, default: i64, min: i64) -> Vec<Status> {
    match directive.int_option(key, default) {
        Err(status) => vec![status],
        Ok(value) if value < min => vec![Status::error(format!(
            "option '{key}' must be >= {min}, got {value}"
        ))],
        Ok(_) => Vec::new(),
    }
}

pub fn validate_enum(directive: &Directive, key: &str, valid: &[&str]) -> Vec<Status> {
    match directive.option(key) {
        Some(value) if !valid.contains(&value) => vec![Status::error(format!(
            "option '{key}' must be one of {}, got '{value}'",
            valid.join(", ")
        ))],
        _ => Vec::new(),
    }
}

// ---------------------------------------------------------------------------
// Text preparation
// ---------------------------------------------------------------------------

/// Strip Markdown syntax unsuitable for summarisation: code blocks,
/// tables, formatting markers, links, and list bullets.
pub fn clean_text(text: &str) -> String {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    static HEADING: OnceLock<Regex> = OnceLock::new();
    static BOLD: OnceLock<Regex> = OnceLock::new();
    static UNDERSCORE: OnceLock<Regex> = OnceLock::new();
    static IMAGE: OnceLock<Regex> = OnceLock::new();
    static LINK: OnceLock<Regex> = OnceLock::new();
    static BULLET: OnceLock<Regex> = OnceLock::new();
    static NUMBERED: OnceLock<Regex> = OnceLock::new();
    static BLOCKQUOTE: OnceLock<Regex> = OnceLock::new();
    static SPACES: OnceLock<Regex> = OnceLock::new();

    let fence = FENCE.get_or_init(|| Regex::new(r"(?s)```+.*?```+").unwrap());
    let heading = HEADING.get_or_init(|| Regex::new(r"(?m)^#{1,6}\s+").unwrap());
    let bold = BOLD.get_or_init(|| Regex::new(r"\*{1,3}([^*]*)\*{1,3}").unwrap());
    let underscore = UNDERSCORE.get_or_init(|| Regex::new(r"_{1,3}([^_]*)_{1,3}").unwrap());
    let image = IMAGE.get_or_init(|| Regex::new(r"!\[[^\]]*\]\([^\)]*\)").unwrap());
    let link = LINK.get_or_init(|| Regex::new(r"\[([^\]]+)\]\([^\)]+\)").unwrap());
    let bullet = BULLET.get_or_init(|| Regex::new(r"(?m)^\s*[-*+]\s+").unwrap());
    let numbered = NUMBERED.get_or_init(|| Regex::new(r"(?m)^\s*\d+\.\s+").unwrap());
    let blockquote = BLOCKQUOTE.get_or_init(|| Regex::new(r"(?m)^>\s?").unwrap());
    let spaces = SPACES.get_or_init(|| Regex::new(r"[ \t]+").unwrap());

    let text = fence.replace_all(text, "");
    let text: String = text
        .lines()
        .filter(|line| !line.trim_start().starts_with('|'))
        .collect::<Vec<_>>()
        .join("\n");
    let text = blockquote.replace_all(&text, "");
    let text = heading.replace_all(&text, "");
    let text = bold.replace_all(&text, "$1");
    let text = underscore.replace_all(&text, "$1");
    let text = image.replace_all(&text, "");
    let text = link.replace_all(&text, "$1");
    let text = bullet.replace_all(&text, "");
    let text = numbered.replace_all(&text, "");
    // collapse horizontal whitespace only; newlines remain sentence
    // boundaries
    spaces.replace_all(&text, " ").trim().to_string()
}

/// Split cleaned text on blank lines into blocks of sentences. A non-zero
/// `max_blocks` caps how many leading blocks participate.
pub fn split_into_blocks(text: &str, max_blocks: usize) -> Vec<Vec<String>> {
    static BLANKS: OnceLock<Regex> = OnceLock::new();
    let blanks = BLANKS.get_or_init(|| Regex::new(r"\n{2,}").unwrap());

    let raw_blocks: Vec<&str> = blanks.split(text).collect();
    let capped: Vec<&str> = if max_blocks > 0 {
        raw_blocks.into_iter().take(max_blocks).collect()
    } else {
        raw_blocks
    };

    capped
        .into_iter()
        .map(block_to_sentences)
        .filter(|sentences| !sentences.is_empty())
        .collect()
}

/// Split a block on punctuation boundaries and newlines, filtering out
/// short fragments.
fn block_to_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '\n' {
            push_sentence(&mut sentences, &mut current);
            continue;
        }
        current.push(ch);
        if matches!(ch, '.' | '!' | '?') && chars.peek().map_or(true, |next| next.is_whitespace()) {
            push_sentence(&mut sentences, &mut current);
        }
    }
    push_sentence(&mut sentences, &mut current);
    sentences
}

fn push_sentence(sentences: &mut Vec<String>, current: &mut String) {
    let sentence = current.trim().to_string();
    current.clear();
    if tokenize(&sentence).len() >= MIN_SENTENCE_WORDS {
        sentences.push(sentence);
    }
}

/// Lowercase ASCII word tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    word_pattern()
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect()
}

pub fn flatten_blocks(blocks: Vec<Vec<String>>) -> (Vec<String>, Vec<usize>) {
    let mut sentences = Vec::new();
    let mut block_indices = Vec::new();
    for (block_idx, block_sentences) in blocks.into_iter().enumerate() {
        block_indices.extend(std::iter::repeat(block_idx).take(block_sentences.len()));
        sentences.extend(block_sentences);
    }
    (sentences, block_indices)
}

/// Up to `max_sentences` indices in original document order, ranked by
/// score (ties broken by position).
pub fn select_top(scores: &[(f64, usize)], max_sentences: usize) -> Vec<usize> {
    let mut ranked: Vec<&(f64, usize)> = scores.iter().collect();
    ranked.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.1.cmp(&b.1))
    });
    let mut top: Vec<usize> = ranked.iter().take(max_sentences).map(|(_, i)| *i).collect();
    top.sort_unstable();
    top
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

pub fn build_word_freq(
    tokenized: &[Vec<String>],
    stopword_list: &[&str],
) -> HashMap<String, usize> {
    let mut word_freq = HashMap::new();
    for words in tokenized {
        for word in words {
            if !stopword_list.contains(&word.as_str()) {
                *word_freq.entry(word.clone()).or_insert(0) += 1;
            }
        }
    }
    word_freq
}

/// Score sentences by the sum of significant word frequencies, normalised
/// by sentence length.
fn score_frequency(sentences: &[String], stopword_list: &[&str]) -> Vec<(f64, usize)> {
    let tokenized: Vec<Vec<String>> = sentences.iter().map(|s| tokenize(s)).collect();
    let word_freq = build_word_freq(&tokenized, stopword_list);

    tokenized
        .iter()
        .enumerate()
        .map(|(i, words)| {
            if words.is_empty() {
                return (0.0, i);
            }
            let total: usize = words
                .iter()
                .filter(|w| !stopword_list.contains(&w.as_str()))
                .map(|w| word_freq.get(w).copied().unwrap_or(0))
                .sum();
            (total as f64 / words.len() as f64, i)
        })
        .collect()
}

/// Score sentences with Luhn's significant-word cluster algorithm.
fn score_luhn(sentences: &[String], stopword_list: &[&str]) -> Vec<(f64, usize)> {
    let tokenized: Vec<Vec<String>> = sentences.iter().map(|s| tokenize(s)).collect();
    let word_freq = build_word_freq(&tokenized, stopword_list);
    let significant = significant_words(&word_freq);

    if significant.is_empty() {
        return (0..sentences.len()).map(|i| (0.0, i)).collect();
    }

    tokenized
        .iter()
        .enumerate()
        .map(|(i, words)| {
            let is_sig: Vec<bool> = words.iter().map(|w| significant.contains(w)).collect();
            (best_cluster_score(&is_sig), i)
        })
        .collect()
}

/// Words with above-average frequency.
fn significant_words(word_freq: &HashMap<String, usize>) -> Vec<String> {
    if word_freq.is_empty() {
        return Vec::new();
    }
    let avg = word_freq.values().sum::<usize>() as f64 / word_freq.len() as f64;
    word_freq
        .iter()
        .filter(|(_, freq)| **freq as f64 > avg)
        .map(|(word, _)| word.clone())
        .collect()
}

/// Highest-scoring significant-word cluster in a sentence.
fn best_cluster_score(is_sig: &[bool]) -> f64 {
    let sig_positions: Vec<usize> = is_sig
        .iter()
        .enumerate()
        .filter(|(_, sig)| **sig)
        .map(|(i, _)| i)
        .collect();
    if sig_positions.is_empty() {
        return 0.0;
    }
    (0..sig_positions.len())
        .map(|start| score_cluster(&sig_positions, start))
        .fold(0.0, f64::max)
}

/// Score the cluster extending rightward from `sig_positions[start]`.
fn score_cluster(sig_positions: &[usize], start: usize) -> f64 {
    let mut end = start;
    while end + 1 < sig_positions.len()
        && sig_positions[end + 1] - sig_positions[end] - 1 <= LUHN_WINDOW
    {
        end += 1;
    }
    let sig_count = end - start + 1;
    let cluster_len = sig_positions[end] - sig_positions[start] + 1;
    (sig_count * sig_count) as f64 / cluster_len as f64
}
