//! Extractive summaries.
//!
//! Sentences are scored against the article title and the document's most
//! frequent keywords, then the best ones are returned in reading order.

use std::collections::{HashMap, HashSet};

const KEYWORD_COUNT: usize = 10;
const IDEAL_SENTENCE_WORDS: f64 = 20.0;

const STOPWORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and", "any",
    "are", "as", "at", "be", "because", "been", "before", "being", "below", "between", "both",
    "but", "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each", "few",
    "for", "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers",
    "herself", "him", "himself", "his", "how", "i", "if", "in", "into", "is", "it", "its",
    "itself", "just", "me", "more", "most", "my", "myself", "no", "nor", "not", "now", "of",
    "off", "on", "once", "only", "or", "other", "our", "ours", "ourselves", "out", "over", "own",
    "said", "same", "says", "she", "should", "so", "some", "such", "than", "that", "the",
    "their", "theirs", "them", "themselves", "then", "there", "these", "they", "this", "those",
    "through", "to", "too", "under", "until", "up", "very", "was", "we", "were", "what", "when",
    "where", "which", "while", "who", "whom", "why", "will", "with", "would", "you", "your",
    "yours", "yourself", "yourselves",
];

// Tokens ending in '.' that do not close a sentence.
const ABBREVIATIONS: &[&str] = &[
    "mr", "mrs", "ms", "dr", "prof", "sr", "jr", "st", "vs", "etc", "inc", "ltd", "co", "corp",
    "gov", "gen", "sen", "rep", "jan", "feb", "mar", "apr", "jun", "jul", "aug", "sep",
    "sept", "oct", "nov", "dec",
];

/// Pick up to `max_sentences` representative sentences from `text`.
pub fn summarize(title: &str, text: &str, max_sentences: usize) -> String {
    let sentences = split_sentences(text);
    if sentences.is_empty() || max_sentences == 0 {
        return String::new();
    }
    if sentences.len() <= max_sentences {
        return sentences.join(" ");
    }

    let keywords = keywords(text);
    let title_words: Vec<String> = content_words(title);
    let total = sentences.len();

    let mut scored: Vec<(usize, f64)> = sentences
        .iter()
        .enumerate()
        .map(|(index, sentence)| {
            let words = words(sentence);
            let title = title_score(&title_words, &words);
            let frequency = (summation_score(&words, &keywords)
                + density_score(&words, &keywords))
                / 2.0
                * 10.0;
            let length = length_score(words.len());
            let position = position_score(index, total);
            let score = (title * 1.5 + frequency * 2.0 + length + position) / 4.0;
            (index, score)
        })
        .collect();

    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    scored.truncate(max_sentences);
    scored.sort_by_key(|(index, _)| *index);

    scored
        .into_iter()
        .map(|(index, _)| sentences[index].as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Break text into sentences. Paragraph breaks always end a sentence.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();

    for paragraph in text.split("\n\n") {
        let paragraph = paragraph.split_whitespace().collect::<Vec<_>>().join(" ");
        let tokens: Vec<&str> = paragraph.split(' ').filter(|t| !t.is_empty()).collect();

        let mut current: Vec<&str> = Vec::new();
        for (i, &token) in tokens.iter().enumerate() {
            current.push(token);
            let next = tokens.get(i + 1);
            if ends_sentence(token, next.copied()) {
                sentences.push(current.join(" "));
                current.clear();
            }
        }
        if !current.is_empty() {
            sentences.push(current.join(" "));
        }
    }

    sentences
}

fn ends_sentence(token: &str, next: Option<&str>) -> bool {
    let trimmed = token.trim_end_matches(['"', '\'', ')', '\u{201d}', '\u{2019}']);
    let Some(last) = trimmed.chars().last() else {
        return false;
    };
    if !matches!(last, '.' | '!' | '?') {
        return false;
    }

    if last == '.' {
        let stem = trimmed.trim_end_matches('.').to_lowercase();
        let bare = stem.trim_start_matches(['"', '\'', '(', '\u{201c}']);
        if ABBREVIATIONS.contains(&bare) {
            return false;
        }
        // Initials such as "J." or "U.S."
        if bare.split('.').all(|part| part.chars().count() <= 1) {
            return false;
        }
    }

    match next {
        None => true,
        Some(next) => next
            .chars()
            .next()
            .map(|c| c.is_uppercase() || c.is_ascii_digit() || !c.is_alphanumeric())
            .unwrap_or(true),
    }
}

/// Lowercased alphanumeric words.
fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '\'')
        .map(|w| w.trim_matches('\'').to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

fn is_stopword(word: &str) -> bool {
    STOPWORDS.contains(&word)
}

fn content_words(text: &str) -> Vec<String> {
    words(text).into_iter().filter(|w| !is_stopword(w)).collect()
}

/// The most frequent non-stopwords, weighted by their share of the text.
fn keywords(text: &str) -> HashMap<String, f64> {
    let all = words(text);
    let total = all.len().max(1) as f64;

    let mut counts: HashMap<String, usize> = HashMap::new();
    for word in all.into_iter().filter(|w| !is_stopword(w)) {
        *counts.entry(word).or_insert(0) += 1;
    }

    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(KEYWORD_COUNT);

    ranked
        .into_iter()
        .map(|(word, count)| (word, count as f64 / total * 1.5 + 1.0))
        .collect()
}

fn title_score(title_words: &[String], sentence_words: &[String]) -> f64 {
    if title_words.is_empty() {
        return 0.0;
    }
    let title: HashSet<&String> = title_words.iter().collect();
    let hits = sentence_words
        .iter()
        .filter(|w| !is_stopword(w) && title.contains(w))
        .count();
    hits as f64 / title_words.len() as f64
}

fn summation_score(words: &[String], keywords: &HashMap<String, f64>) -> f64 {
    if words.is_empty() {
        return 0.0;
    }
    let sum: f64 = words.iter().filter_map(|w| keywords.get(w)).sum();
    sum / words.len() as f64 / 10.0
}

/// Rewards keywords that appear close to each other.
fn density_score(words: &[String], keywords: &HashMap<String, f64>) -> f64 {
    let hits: Vec<(usize, f64)> = words
        .iter()
        .enumerate()
        .filter_map(|(i, w)| keywords.get(w).map(|score| (i, *score)))
        .collect();

    if hits.is_empty() {
        return 0.0;
    }

    let mut sum = 0.0;
    for pair in hits.windows(2) {
        let (first_pos, first_score) = pair[0];
        let (second_pos, second_score) = pair[1];
        let distance = (second_pos - first_pos) as f64;
        sum += first_score * second_score / (distance * distance);
    }

    let k = hits.len() as f64;
    sum / (k * (k + 1.0))
}

fn length_score(word_count: usize) -> f64 {
    let score = 1.0 - (IDEAL_SENTENCE_WORDS - word_count as f64).abs() / IDEAL_SENTENCE_WORDS;
    score.max(0.0)
}

fn position_score(index: usize, total: usize) -> f64 {
    let normalized = (index + 1) as f64 / total as f64;
    match normalized {
        x if x <= 0.1 => 0.17,
        x if x <= 0.2 => 0.23,
        x if x <= 0.3 => 0.14,
        x if x <= 0.4 => 0.08,
        x if x <= 0.5 => 0.05,
        x if x <= 0.6 => 0.04,
        x if x <= 0.7 => 0.06,
        x if x <= 0.8 => 0.04,
        x if x <= 0.9 => 0.04,
        x if x <= 1.0 => 0.15,
        _ => 0.0,
    }
}
