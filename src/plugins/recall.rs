//! Recall plugin: retrieves the sentences most relevant to a query
//!
//! Shares the synopsis plugin's text preparation and rendering, but ranks
//! sentences by overlap with the required `query` option instead of by
//! corpus statistics. Selected sentences are re-emitted in document order
//! as a blockquote.

use crate::document::Directive;
use crate::planner::PlanNode;
use crate::plugins::synopsis::{
    clean_text, extract_text, flatten_blocks, select_top, split_into_blocks, tokenize,
    validate_enum, validate_int_min, DEFAULT_MAX_SENTENCES, DEFAULT_SECTIONS, LANGUAGE_KEY,
    MAX_SENTENCES_KEY, SECTIONS_KEY, VALID_LANGUAGES,
};
use crate::plugins::{stopwords, Piece, Plugin, PluginConfig, PluginContext};
use crate::status::Status;

pub const QUERY_KEY: &str = "query";

const NO_MATCH_NOTE: &str = "> [!NOTE]\n> no matching content\n";

pub struct RecallPlugin;

impl Plugin for RecallPlugin {
    fn name(&self) -> &'static str {
        "recall plugin"
    }

    fn directive_type(&self) -> &'static str {
        "recall"
    }

    fn validate_directive(&self, directive: &Directive, _config: &PluginConfig) -> Vec<Status> {
        let mut statuses = Vec::new();

        if directive.option(QUERY_KEY).map_or(true, str::is_empty) {
            statuses.push(Status::error("'recall' directive requires a 'query' option"));
        }

        statuses.extend(validate_int_min(
            directive,
            MAX_SENTENCES_KEY,
            DEFAULT_MAX_SENTENCES,
            1,
        ));
        statuses.extend(validate_enum(directive, LANGUAGE_KEY, &VALID_LANGUAGES));
        statuses.extend(validate_int_min(directive, SECTIONS_KEY, DEFAULT_SECTIONS, 0));
        statuses
    }

    fn transform(&self, node: &PlanNode, parent: &[Piece], ctx: &mut PluginContext) -> String {
        let text = extract_text(node, parent, ctx);
        let query = node.directive.option(QUERY_KEY).unwrap_or("");
        let max_sentences = node
            .directive
            .int_option(MAX_SENTENCES_KEY, DEFAULT_MAX_SENTENCES)
            .unwrap_or(DEFAULT_MAX_SENTENCES)
            .max(1) as usize;
        let language = node.directive.option(LANGUAGE_KEY).unwrap_or("en");
        let sections = node
            .directive
            .int_option(SECTIONS_KEY, DEFAULT_SECTIONS)
            .unwrap_or(DEFAULT_SECTIONS)
            .max(0) as usize;

        let cleaned = clean_text(&text);
        let blocks = split_into_blocks(&cleaned, sections);
        if blocks.is_empty() {
            return NO_MATCH_NOTE.to_string();
        }

        let (sentences, block_indices) = flatten_blocks(blocks);
        let stopword_list = stopwords::for_language(language);
        let query_terms: Vec<String> = tokenize(query)
            .into_iter()
            .filter(|t| !stopword_list.contains(&t.as_str()))
            .collect();
        if query_terms.is_empty() {
            return NO_MATCH_NOTE.to_string();
        }

        let scores: Vec<(f64, usize)> = sentences
            .iter()
            .enumerate()
            .map(|(i, sentence)| {
                let raw = score_against_query(sentence, &query_terms);
                // small positional decay so earlier blocks win ties
                (raw * (1.0 / (1.0 + 0.01 * block_indices[i] as f64)), i)
            })
            .collect();

        let selected: Vec<usize> = select_top(&scores, max_sentences)
            .into_iter()
            .filter(|i| scores[*i].0 > 0.0)
            .collect();
        if selected.is_empty() {
            return NO_MATCH_NOTE.to_string();
        }

        let recalled: Vec<&str> = selected.iter().map(|i| sentences[*i].as_str()).collect();
        format!("> {}\n", recalled.join(" "))
    }
}

/// Fraction of query terms present in the sentence, normalised by sentence
/// length so short focused sentences outrank long rambling ones.
fn score_against_query(sentence: &str, query_terms: &[String]) -> f64 {
    let words = tokenize(sentence);
    if words.is_empty() {
        return 0.0;
    }
    let hits = query_terms.iter().filter(|t| words.contains(t)).count();
    if hits == 0 {
        return 0.0;
    }
    let coverage = hits as f64 / query_terms.len() as f64;
    let density = hits as f64 / words.len() as f64;
    coverage + density
}
