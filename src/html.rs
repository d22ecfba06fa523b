//! Text helpers shared by the index and detail page parsers.

use crate::error::{HarvestError, Result};
use scraper::{ElementRef, Selector};

/// Builds a `tag.class` selector, e.g. `table.wikitable`.
pub fn class_selector(tag: &str, class: &str) -> Result<Selector> {
    let css = format!("{}.{}", tag, class.trim());
    Selector::parse(&css).map_err(|e| HarvestError::Config {
        message: format!("Invalid class marker '{}': {}", class, e),
    })
}

pub fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| HarvestError::Config {
        message: format!("Invalid selector '{}': {}", css, e),
    })
}

/// Collapses every whitespace run to a single space and trims the ends.
pub fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// All text nodes of `element`, each trimmed, empty ones dropped, joined by `separator`.
pub fn joined_text(element: &ElementRef<'_>, separator: &str) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(separator)
}

/// Whitespace-collapsed text of an element with single-space separators.
pub fn spaced_text(element: &ElementRef<'_>) -> String {
    normalize_ws(&joined_text(element, " "))
}

/// Drops footnote markers: everything from the first `[` onward.
pub fn strip_footnotes(s: &str) -> &str {
    match s.find('[') {
        Some(pos) => s[..pos].trim_end(),
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    #[test]
    fn test_normalize_ws() {
        assert_eq!(normalize_ws("  Novo \n  mesto\t"), "Novo mesto");
        assert_eq!(normalize_ws(""), "");
    }

    #[test]
    fn test_strip_footnotes() {
        assert_eq!(strip_footnotes("Example[1][2]"), "Example");
        assert_eq!(strip_footnotes("Example [1] [2]"), "Example");
        assert_eq!(strip_footnotes("[3]"), "");
        assert_eq!(strip_footnotes("Plain"), "Plain");
    }

    #[test]
    fn test_spaced_text_joins_nodes() {
        let doc = Html::parse_fragment("<div>Grb <b>in</b>\n  <i>zastava</i></div>");
        let div = doc.select(&selector("div").unwrap()).next().unwrap();
        assert_eq!(spaced_text(&div), "Grb in zastava");
        assert_eq!(joined_text(&div, ""), "Grbinzastava");
    }

    #[test]
    fn test_class_selector_matches_multi_class_tables() {
        let doc = Html::parse_document(
            r#"<table class="wikitable sortable"><tr><td>x</td></tr></table>"#,
        );
        let sel = class_selector("table", "wikitable").unwrap();
        assert_eq!(doc.select(&sel).count(), 1);
    }
}
