use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;

use crate::models::{normalize_text, Filter};

/// Numeric episode constraint: a bound word followed by a number, with an
/// optional unit word. Matched over the normalized text; the last match wins
/// when the input names more than one bound.
static EPISODE_BOUND_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:under|less than|fewer than)\s+(\d+)(?:\s+(?:episodes?|eps?))?")
        .expect("episode bound pattern must compile")
});

static HIDDEN_GEM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bhidden\s+gems?\b").expect("hidden gem pattern must compile"));

/// Multi-word noun phrases recognized as single descriptor tokens. A matched
/// phrase consumes its constituent words so they are not counted twice.
const COMPOUND_DESCRIPTORS: &[&[&str]] = &[
    &["slice", "of", "life"],
    &["coming", "of", "age"],
    &["post", "apocalyptic"],
    &["martial", "arts"],
    &["science", "fiction"],
    &["time", "travel"],
    &["battle", "royale"],
    &["magical", "girl"],
];

/// Words that carry no descriptive content on their own: determiners,
/// pronouns, prepositions, auxiliaries, request verbs, and the domain filler
/// words every query contains. Tokens consumed by the pattern rules
/// (bound words, unit words, "hidden gem") are listed here too.
static FUNCTION_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "an", "the", "this", "that", "these", "those", "i", "me", "my", "we", "our", "you",
        "your", "it", "its", "they", "them", "their", "some", "any", "no", "not", "and", "or",
        "but", "with", "without", "about", "for", "of", "in", "on", "at", "to", "from", "by",
        "as", "so", "too", "very", "really", "quite", "want", "wants", "wanted", "like", "likes",
        "liked", "love", "loves", "loved", "need", "needs", "watch", "watching", "watched",
        "looking", "look", "find", "give", "show", "shows", "recommend", "suggest", "please",
        "maybe", "something", "anything", "stuff", "thing", "things", "is", "are", "was", "were",
        "be", "been", "being", "am", "do", "does", "did", "have", "has", "had", "can", "could",
        "would", "should", "will", "anime", "series", "movie", "movies", "title", "titles",
        "episode", "episodes", "ep", "eps", "season", "seasons", "under", "over", "less",
        "fewer", "more", "than", "max", "maximum", "hidden", "gem", "gems",
    ]
    .into_iter()
    .collect()
});

/// Derives a structured filter from free text
///
/// Never fails: malformed or empty input yields an empty filter, which the
/// assembler treats as "no constraints, return top-ranked defaults".
pub fn parse(text: &str) -> Filter {
    let normalized = normalize_text(text);
    if normalized.is_empty() {
        return Filter::default();
    }

    let episode_bound = EPISODE_BOUND_RE
        .captures_iter(&normalized)
        .last()
        .and_then(|captures| captures[1].parse::<u32>().ok());
    let hidden_gem = HIDDEN_GEM_RE.is_match(&normalized);

    let tokens: Vec<&str> = normalized.unicode_words().collect();
    let mut descriptors: Vec<String> = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        if let Some(phrase) = match_compound(&tokens[i..]) {
            push_unique(&mut descriptors, phrase.join(" "));
            i += phrase.len();
            continue;
        }
        if is_descriptor_candidate(tokens[i]) {
            push_unique(&mut descriptors, tokens[i].to_string());
        }
        i += 1;
    }

    Filter {
        descriptors,
        episode_bound,
        hidden_gem,
    }
}

/// Longest compound phrase starting at the head of the token slice, if any
fn match_compound(tokens: &[&str]) -> Option<&'static [&'static str]> {
    COMPOUND_DESCRIPTORS
        .iter()
        .filter(|phrase| tokens.len() >= phrase.len() && phrase.iter().zip(tokens).all(|(p, t)| p == t))
        .max_by_key(|phrase| phrase.len())
        .copied()
}

fn is_descriptor_candidate(token: &str) -> bool {
    token.len() > 1
        && !token.chars().any(|c| c.is_ascii_digit())
        && !FUNCTION_WORDS.contains(token)
}

fn push_unique(descriptors: &mut Vec<String>, token: String) {
    if !descriptors.iter().any(|d| *d == token) {
        descriptors.push(token);
    }
}
