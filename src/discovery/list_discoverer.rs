use crate::discovery::record::EntityRecord;
use crate::error::{HarvestError, Result};
use crate::fetcher::PageFetcher;
use crate::html;
use scraper::Html;
use tracing::{debug, info};
use url::Url;

/// 0-based index of the column whose anchor points at the detail page.
pub const LINK_COLUMN: usize = 1;

/// Reads the municipality index page into `EntityRecord`s.
pub struct ListDiscoverer {
    fetcher: PageFetcher,
    table_class: String,
}

impl ListDiscoverer {
    pub fn new<S: Into<String>>(fetcher: PageFetcher, table_class: S) -> Self {
        Self {
            fetcher,
            table_class: table_class.into(),
        }
    }

    pub async fn discover(&self, index_url: &str) -> Result<Vec<EntityRecord>> {
        let base = Url::parse(index_url).map_err(|_| HarvestError::InvalidUrl {
            url: index_url.to_string(),
        })?;

        let body = self.fetcher.fetch_html(index_url).await?;
        let records = parse_index(&body, &base, &self.table_class)?;

        info!(url = %index_url, records = records.len(), "Discovered entities");
        Ok(records)
    }
}

/// Parses the first `table.<table_class>` of an index page.
///
/// The first row's `th` cells name the attributes; every later row becomes a
/// record. Cells beyond the last header are ignored.
pub fn parse_index(body: &str, index_url: &Url, table_class: &str) -> Result<Vec<EntityRecord>> {
    let document = Html::parse_document(body);
    let table_selector = html::class_selector("table", table_class)?;
    let row_selector = html::selector("tr")?;
    let header_selector = html::selector("th")?;
    let cell_selector = html::selector("td, th")?;
    let link_selector = html::selector("a")?;

    let table = document
        .select(&table_selector)
        .next()
        .ok_or_else(|| HarvestError::Parse {
            message: format!("no table with class '{}' on {}", table_class, index_url),
        })?;

    let mut rows = table.select(&row_selector);
    let header_row = rows.next().ok_or_else(|| HarvestError::Parse {
        message: format!("table '{}' has no rows", table_class),
    })?;

    let headers: Vec<String> = header_row
        .select(&header_selector)
        .map(|th| html::joined_text(&th, ""))
        .collect();
    debug!(?headers, "Index table headers");

    let mut records = Vec::new();
    for row in rows {
        let mut record = EntityRecord::new();

        for (i, cell) in row.select(&cell_selector).enumerate() {
            if let Some(header) = headers.get(i) {
                let text = html::spaced_text(&cell);
                record.insert(header.clone(), html::strip_footnotes(&text).trim());
            }

            if i == LINK_COLUMN {
                let url = cell
                    .select(&link_selector)
                    .next()
                    .and_then(|a| a.value().attr("href"))
                    .and_then(|href| resolve_link(href, index_url));
                record.set_url(url);
            }
        }

        if record.is_empty() {
            continue;
        }
        records.push(record);
    }

    Ok(records)
}

/// Resolves an index-page `href` to an absolute URL.
///
/// Absolute links pass through unchanged and origin-relative paths are
/// appended to the site origin. Protocol-relative links borrow the scheme;
/// anything else is joined against the index page itself.
pub fn resolve_link(href: &str, index_url: &Url) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }

    if Url::parse(href).is_ok() {
        return Some(href.to_string());
    }

    if href.starts_with("//") {
        return Some(format!("{}:{}", index_url.scheme(), href));
    }

    if href.starts_with('/') {
        return Some(format!("{}{}", index_url.origin().ascii_serialization(), href));
    }

    index_url.join(href).ok().map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDEX: &str = "https://sl.wikipedia.org/wiki/Seznam_ob%C4%8Din_v_Sloveniji";

    fn index_url() -> Url {
        Url::parse(INDEX).unwrap()
    }

    fn page(rows: &str) -> String {
        format!(
            r#"<html><body>
            <table class="navbox"><tr><th>Ignore</th></tr><tr><td>me</td></tr></table>
            <table class="wikitable sortable">
              <tr><th>Št.</th><th>Občina</th><th>Pokrajina</th></tr>
              {}
            </table></body></html>"#,
            rows
        )
    }

    #[test]
    fn test_parse_rows_in_order() {
        let body = page(
            r#"<tr><td>1</td><td><a href="/wiki/Ob%C4%8Dina_Ajdov%C5%A1%C4%8Dina">Ajdovščina</a></td><td>Primorska</td></tr>
               <tr><td>2</td><td><a href="/wiki/Ob%C4%8Dina_Apa%C4%8De">Apače</a></td><td>Štajerska</td></tr>
               <tr><td>3</td><td><a href="https://en.wikipedia.org/wiki/Bled">Bled</a></td><td>Gorenjska</td></tr>"#,
        );

        let records = parse_index(&body, &index_url(), "wikitable").unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].get("Občina"), Some("Ajdovščina"));
        assert_eq!(records[1].get("Pokrajina"), Some("Štajerska"));
        assert_eq!(
            records[0].url(),
            Some("https://sl.wikipedia.org/wiki/Ob%C4%8Dina_Ajdov%C5%A1%C4%8Dina")
        );
        assert_eq!(records[2].url(), Some("https://en.wikipedia.org/wiki/Bled"));
    }

    #[test]
    fn test_footnotes_are_stripped() {
        let body = page(
            r#"<tr><td>1</td><td><a href="/wiki/X">Example<sup>[1]</sup><sup>[2]</sup></a></td><td>Example[1][2]</td></tr>"#,
        );

        let records = parse_index(&body, &index_url(), "wikitable").unwrap();
        assert_eq!(records[0].get("Občina"), Some("Example"));
        assert_eq!(records[0].get("Pokrajina"), Some("Example"));
    }

    #[test]
    fn test_missing_link_yields_null_url() {
        let body = page(r#"<tr><td>1</td><td>Brez povezave</td><td>Koroška</td></tr>"#);

        let records = parse_index(&body, &index_url(), "wikitable").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].url(), None);

        let json = serde_json::to_value(&records[0]).unwrap();
        assert!(json.get("url").unwrap().is_null());
    }

    #[test]
    fn test_empty_rows_are_skipped() {
        let body = page(
            r#"<tr><td>1</td><td><a href="/wiki/A">A</a></td><td>Gorenjska</td></tr>
               <tr><td> </td><td></td><td>[1]</td></tr>
               <tr></tr>
               <tr><td>2</td><td><a href="/wiki/B">B</a></td><td>Dolenjska</td></tr>"#,
        );

        let records = parse_index(&body, &index_url(), "wikitable").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].get("Občina"), Some("B"));
    }

    #[test]
    fn test_extra_cells_are_dropped() {
        let body = page(r#"<tr><td>1</td><td>A</td><td>Notranjska</td><td>extra</td></tr>"#);

        let records = parse_index(&body, &index_url(), "wikitable").unwrap();
        assert_eq!(records[0].attributes().len(), 3);
        assert!(records[0]
            .attributes()
            .values()
            .all(|v| v.as_str() != "extra"));
    }

    #[test]
    fn test_headers_concatenate_nodes() {
        let body = r#"<table class="wikitable">
            <tr><th>Površina<br/>(km<sup>2</sup>)</th><th>Občina</th></tr>
            <tr><td>12</td><td>Bled</td></tr></table>"#;

        let records = parse_index(body, &index_url(), "wikitable").unwrap();
        assert_eq!(records[0].get("Površina(km2)"), Some("12"));
    }

    #[test]
    fn test_missing_table_is_parse_error() {
        let result = parse_index("<html><p>nothing</p></html>", &index_url(), "wikitable");
        assert!(matches!(result, Err(HarvestError::Parse { .. })));
    }

    #[test]
    fn test_resolve_link() {
        let base = index_url();
        assert_eq!(
            resolve_link("/wiki/Foo", &base).as_deref(),
            Some("https://sl.wikipedia.org/wiki/Foo")
        );
        assert_eq!(
            resolve_link("https://example.org/a", &base).as_deref(),
            Some("https://example.org/a")
        );
        assert_eq!(
            resolve_link("//upload.wikimedia.org/x.png", &base).as_deref(),
            Some("https://upload.wikimedia.org/x.png")
        );
        assert_eq!(
            resolve_link("Bled", &base).as_deref(),
            Some("https://sl.wikipedia.org/wiki/Bled")
        );
        assert_eq!(resolve_link("  ", &base), None);
    }
}
