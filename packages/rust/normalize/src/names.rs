//! Occupation name standardization.
//!
//! Passes run in order: collapse whitespace, strip disallowed punctuation,
//! trim dangling separators, then resolve known aliases.

use std::sync::LazyLock;

use regex::Regex;

/// Known spellings that map onto a canonical occupation name.
///
/// Keys are compared case-insensitively after the other passes have run.
const ALIASES: &[(&str, &str)] = &[
    ("software developers, applications", "Software Developers"),
    ("software developers, systems software", "Software Developers"),
    ("software developers and programmers", "Software Developers"),
    ("customer service reps", "Customer Service Representatives"),
    ("registered nurse", "Registered Nurses"),
    ("rns", "Registered Nurses"),
    ("interpreters & translators", "Interpreters and Translators"),
    (
        "web developers and digital interface designers",
        "Web and Digital Interface Designers",
    ),
    ("data scientist", "Data Scientists"),
    ("computer and mathematical occupations", "Computer and Mathematical"),
    ("sales and related occupations", "Sales and Related"),
    (
        "office and administrative support occupations",
        "Office and Administrative Support",
    ),
];

/// Run the full standardization pipeline on one raw name.
pub fn standardize(raw: &str) -> String {
    let mut name = collapse_whitespace(raw);
    name = strip_disallowed(&name);
    name = trim_separators(&name);
    resolve_alias(&name).map_or(name, str::to_string)
}

/// Trim and collapse internal whitespace runs to a single space.
pub fn collapse_whitespace(raw: &str) -> String {
    static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
    WS_RE.replace_all(raw.trim(), " ").into_owned()
}

/// Apply the whitespace and punctuation passes to free text, so it can be
/// searched for standardized names.
pub fn clean_text(raw: &str) -> String {
    strip_disallowed(&collapse_whitespace(raw))
}

/// Lowercased spellings that [`standardize`] maps onto `canonical`.
pub fn aliases_of(canonical: &str) -> impl Iterator<Item = &'static str> {
    let canonical = canonical.to_lowercase();
    ALIASES
        .iter()
        .filter(move |(_, target)| target.to_lowercase() == canonical)
        .map(|(alias, _)| *alias)
}

/// Remove characters that never belong in an occupation name
/// (footnote markers, asterisks, bullets, quotes).
fn strip_disallowed(name: &str) -> String {
    static DISALLOWED_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[^\p{L}\p{N} ,&/()'\-.]").expect("valid regex"));
    collapse_whitespace(&DISALLOWED_RE.replace_all(name, ""))
}

fn trim_separators(name: &str) -> String {
    name.trim_matches(|c: char| matches!(c, ',' | '.' | '-' | '/' | ' '))
        .to_string()
}

fn resolve_alias(name: &str) -> Option<&'static str> {
    let lower = name.to_lowercase();
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == lower)
        .map(|(_, canonical)| *canonical)
}
