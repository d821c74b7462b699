use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub mod config;
pub mod envelope;
pub mod error;
pub mod messages;
pub mod normalize;

pub use error::{Error, Result};
pub use messages::{Language, Messages};

// ---------------------------------------------------------------------------
// Data structures
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyword {
    pub word: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Structure {
    pub sentence_count: usize,
    pub has_questions: bool,
    pub average_sentence_length: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub prompt_quality_score: u32,
    /// Unicode scalar values in the trimmed prompt. An emoji counts once, not
    /// as two UTF-16 units.
    pub char_count: usize,
    pub word_count: usize,
    pub keywords: Vec<Keyword>,
    pub structure: Structure,
    pub suggestions: Vec<String>,
}

/// Which length hint, if any, the length scorer attached to its sub-score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthHint {
    Missing,
    TooShort,
    TooLong,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LengthEvaluation {
    pub score: u32,
    pub hint: Option<LengthHint>,
}

// ---------------------------------------------------------------------------
// Hyperparameters
// ---------------------------------------------------------------------------

struct Hyperparameters {
    ideal_min_words: usize,
    ideal_max_words: usize,
    in_band_score: u32,
    short_scale: f64,
    short_floor: u32,
    long_exponent: f64,
    long_floor: u32,
    keyword_max_ignored_len: usize,
    keyword_limit: usize,
    diversity_per_token: usize,
    diversity_cap: usize,
    multi_sentence_score: u32,
    single_sentence_score: u32,
    detail_bonus: u32,
    no_detail_bonus: u32,
    score_floor: u32,
    score_max: u32,
}

static HP: Hyperparameters = Hyperparameters {
    ideal_min_words: 20,
    ideal_max_words: 80,
    in_band_score: 95,
    short_scale: 60.0,
    short_floor: 10,
    long_exponent: 0.4,
    long_floor: 30,
    keyword_max_ignored_len: 3,
    keyword_limit: 8,
    diversity_per_token: 2,
    diversity_cap: 30,
    multi_sentence_score: 25,
    single_sentence_score: 10,
    detail_bonus: 20,
    no_detail_bonus: 5,
    score_floor: 5,
    score_max: 100,
};

// ---------------------------------------------------------------------------
// Compiled patterns
// ---------------------------------------------------------------------------

static NON_WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9\s]").unwrap());

// A run of non-terminators, optionally closed by one or more terminators.
static SENTENCE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^.!?]+[.!?]*").unwrap());

static DETAIL_TERM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"style|lighting|color|texture|detail").unwrap());

static STYLE_TERM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"style|lighting|color|composition").unwrap());

static CAMERA_TERM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"camera|lens|angle|render").unwrap());

// ---------------------------------------------------------------------------
// Stopwords
// ---------------------------------------------------------------------------

// English and Spanish function words.
static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "the", "and", "or", "a", "an", "of", "to", "in", "on", "with", "for", "una", "un", "de",
        "el", "la", "los", "las", "y", "o", "para", "con",
    ]
    .into_iter()
    .collect()
});

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn normalize_prompt(prompt: Option<&str>) -> &str {
    prompt.unwrap_or("").trim()
}

/// Whitespace-delimited word count, punctuation left in place.
pub(crate) fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

fn any_token_matches(tokens: &[String], pattern: &Regex) -> bool {
    tokens.iter().any(|t| pattern.is_match(t))
}

fn deduplicate(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut unique = Vec::new();
    for item in items {
        if seen.insert(item.clone()) {
            unique.push(item);
        }
    }
    unique
}

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

/// Lower-cases the trimmed text, blanks out everything that is not an ASCII
/// letter, digit or whitespace, and splits on whitespace runs.
///
/// Accented and non-Latin letters are stripped along with punctuation.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.trim().to_lowercase();
    NON_WORD_RE
        .replace_all(&lowered, " ")
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

pub fn analyze_structure(text: &str) -> Structure {
    let text = text.trim();
    let sentence_count = SENTENCE_RE.find_iter(text).count();
    let average_sentence_length = if sentence_count > 0 {
        (word_count(text) as f64 / sentence_count as f64).round() as usize
    } else {
        0
    };

    Structure {
        sentence_count,
        has_questions: text.contains('?'),
        average_sentence_length,
    }
}

/// Maps a word count onto a 0-100 sub-score: flat inside the 20-80 word band,
/// linear below it, decaying with the 0.4 power of the overshoot ratio above.
pub fn score_length(word_count: usize) -> LengthEvaluation {
    if word_count == 0 {
        return LengthEvaluation {
            score: 0,
            hint: Some(LengthHint::Missing),
        };
    }

    if word_count < HP.ideal_min_words {
        let scaled = (word_count as f64 / HP.ideal_min_words as f64 * HP.short_scale).round();
        return LengthEvaluation {
            score: (scaled as u32).max(HP.short_floor),
            hint: Some(LengthHint::TooShort),
        };
    }

    if word_count > HP.ideal_max_words {
        let ratio = HP.ideal_max_words as f64 / word_count as f64;
        let scaled = (ratio.powf(HP.long_exponent) * 100.0).round();
        return LengthEvaluation {
            score: (scaled as u32).max(HP.long_floor),
            hint: Some(LengthHint::TooLong),
        };
    }

    LengthEvaluation {
        score: HP.in_band_score,
        hint: None,
    }
}

/// Ranks tokens longer than three characters that are not stop words by
/// frequency. Ties keep first-seen order.
pub fn extract_keywords(tokens: &[String]) -> Vec<Keyword> {
    let mut keywords: Vec<Keyword> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for token in tokens {
        if token.len() <= HP.keyword_max_ignored_len || STOPWORDS.contains(token.as_str()) {
            continue;
        }
        match index.get(token.as_str()) {
            Some(&i) => keywords[i].count += 1,
            None => {
                index.insert(token.as_str(), keywords.len());
                keywords.push(Keyword {
                    word: token.clone(),
                    count: 1,
                });
            }
        }
    }

    // stable: ties stay in first-seen order
    keywords.sort_by(|a, b| b.count.cmp(&a.count));
    keywords.truncate(HP.keyword_limit);
    keywords
}

pub fn compute_score(length: &LengthEvaluation, structure: &Structure, tokens: &[String]) -> u32 {
    let distinct: HashSet<&str> = tokens.iter().map(String::as_str).collect();
    let diversity = (distinct.len() * HP.diversity_per_token).min(HP.diversity_cap) as u32;
    let structural = if structure.sentence_count > 1 {
        HP.multi_sentence_score
    } else {
        HP.single_sentence_score
    };
    let detail = if any_token_matches(tokens, &DETAIL_TERM_RE) {
        HP.detail_bonus
    } else {
        HP.no_detail_bonus
    };

    let raw = (length.score + diversity + structural + detail).min(HP.score_max);
    raw.max(HP.score_floor)
}

pub fn build_suggestions(
    length: &LengthEvaluation,
    structure: &Structure,
    tokens: &[String],
    language: Language,
) -> Vec<String> {
    let messages = language.messages();
    let mut suggestions = Vec::new();

    if let Some(hint) = length.hint {
        suggestions.push(messages.length_hint(hint).to_string());
    }
    if structure.sentence_count <= 1 {
        suggestions.push(messages.split_sentences.to_string());
    }
    if !any_token_matches(tokens, &STYLE_TERM_RE) {
        suggestions.push(messages.describe_style.to_string());
    }
    if !any_token_matches(tokens, &CAMERA_TERM_RE) {
        suggestions.push(messages.camera_terms.to_string());
    }

    deduplicate(suggestions)
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Analyzes a prompt with the English suggestion catalogue. An absent prompt
/// is treated as empty.
pub fn analyze<'a>(prompt: impl Into<Option<&'a str>>) -> AnalysisResult {
    analyze_with(prompt, Language::default())
}

pub fn analyze_with<'a>(prompt: impl Into<Option<&'a str>>, language: Language) -> AnalysisResult {
    let text = normalize_prompt(prompt.into());

    if text.is_empty() {
        return AnalysisResult {
            prompt_quality_score: 0,
            char_count: 0,
            word_count: 0,
            keywords: vec![],
            structure: Structure::default(),
            suggestions: vec![language.messages().empty_prompt.to_string()],
        };
    }

    // Text with no ASCII word characters still runs the pipeline with zero tokens.
    let tokens = tokenize(text);
    let length = score_length(tokens.len());
    let structure = analyze_structure(text);
    let keywords = extract_keywords(&tokens);
    let suggestions = build_suggestions(&length, &structure, &tokens, language);
    let prompt_quality_score = compute_score(&length, &structure, &tokens);

    AnalysisResult {
        prompt_quality_score,
        char_count: text.chars().count(),
        word_count: tokens.len(),
        keywords,
        structure,
        suggestions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deduplicate_keeps_first_occurrence_order() {
        let items = ["split", "style", "split", "camera", "style", "split"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(deduplicate(items), vec!["split", "style", "camera"]);
    }

    #[test]
    fn deduplicate_leaves_distinct_items_alone() {
        let items: Vec<String> = vec!["a".into(), "b".into()];
        assert_eq!(deduplicate(items.clone()), items);
        assert!(deduplicate(vec![]).is_empty());
    }
}
