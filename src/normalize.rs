//! camelCase key renaming for the secondary JSON artifact.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

const TRANSLITERATIONS: &[(char, char)] = &[
    ('ž', 'z'),
    ('č', 'c'),
    ('š', 's'),
    ('Ž', 'Z'),
    ('Č', 'C'),
    ('Š', 'S'),
];

fn parenthesized() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\([^)]*\)").expect("valid regex"))
}

fn disallowed() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-zA-Z0-9\s_]").expect("valid regex"))
}

pub fn transliterate(text: &str) -> String {
    text.chars()
        .map(|c| {
            TRANSLITERATIONS
                .iter()
                .find(|(from, _)| *from == c)
                .map(|(_, to)| *to)
                .unwrap_or(c)
        })
        .collect()
}

/// `"Število prebivalcev (2020)"` becomes `"SteviloPrebivalcev"`.
///
/// The first word is kept as-is and every following word is capitalized.
pub fn to_camel_case(text: &str) -> String {
    let text = transliterate(text);
    let text = parenthesized().replace_all(&text, "");
    let text = disallowed().replace_all(&text, "");
    let text = text.replace('_', " ");

    let mut words = text.split_whitespace();
    let Some(first) = words.next() else {
        return String::new();
    };

    let mut out = first.to_string();
    for word in words {
        out.push_str(&capitalize(word));
    }
    out
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Renames every object key below `value`; values are left untouched.
pub fn normalize_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut renamed = Map::with_capacity(map.len());
            for (key, inner) in map {
                renamed.insert(to_camel_case(&key), normalize_keys(inner));
            }
            Value::Object(renamed)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(normalize_keys).collect()),
        other => other,
    }
}
