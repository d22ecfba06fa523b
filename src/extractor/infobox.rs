use crate::error::Result;
use crate::html;
use scraper::Html;
use serde::Serialize;
use url::Url;

/// Only this row of the infobox is ever examined (the flag/emblem row).
pub const TARGET_ROW_INDEX: usize = 2;

/// An infobox shorter than this is reported as degraded.
pub const MIN_INFOBOX_ROWS: usize = TARGET_ROW_INDEX + 1;

const DEFAULT_IMAGE_EXTENSION: &str = "png";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageRole {
    Flag,
    Emblem,
}

impl ImageRole {
    /// With several images the first is the flag; every other one, and a
    /// lone image, is the emblem.
    pub fn for_position(index: usize, total: usize) -> Self {
        if index == 0 && total > 1 {
            ImageRole::Flag
        } else {
            ImageRole::Emblem
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub position: usize,
    pub role: ImageRole,
    /// `None` when the `img` had no usable `src`.
    pub url: Option<Url>,
}

impl ImageRef {
    /// `<stem>.<ext>`, with the extension taken from the URL path.
    pub fn file_name(&self, flag_stem: &str, emblem_stem: &str) -> String {
        let stem = match self.role {
            ImageRole::Flag => flag_stem,
            ImageRole::Emblem => emblem_stem,
        };
        let extension = self
            .url
            .as_ref()
            .and_then(extension_of)
            .unwrap_or_else(|| DEFAULT_IMAGE_EXTENSION.to_string());
        format!("{}.{}", stem, extension)
    }
}

fn extension_of(url: &Url) -> Option<String> {
    let last = url.path_segments()?.next_back()?;
    let (_, ext) = last.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    let plausible = !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric());
    plausible.then_some(ext)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InfoboxState {
    NotFound,
    InsufficientRows { rows: usize },
    Found { text: String, images: Vec<ImageRef> },
}

impl InfoboxState {
    /// The text persisted to the entity's content file.
    pub fn summary(&self, url: &str) -> String {
        match self {
            InfoboxState::NotFound => format!("Infobox table not found at {}.", url),
            InfoboxState::InsufficientRows { .. } => format!(
                "Infobox table found at {}, but it has less than {} rows.",
                url, MIN_INFOBOX_ROWS
            ),
            InfoboxState::Found { text, .. } => {
                format!("Third row of infobox from {}: {}", url, text)
            }
        }
    }

    pub fn images(&self) -> &[ImageRef] {
        match self {
            InfoboxState::Found { images, .. } => images,
            _ => &[],
        }
    }
}

/// Finds the first `table.<infobox_class>` on a detail page and classifies it.
///
/// Image sources are resolved against `page_url`.
pub fn classify_infobox(body: &str, page_url: &Url, infobox_class: &str) -> Result<InfoboxState> {
    let document = Html::parse_document(body);
    let table_selector = html::class_selector("table", infobox_class)?;
    let row_selector = html::selector("tr")?;
    let img_selector = html::selector("img")?;

    let Some(table) = document.select(&table_selector).next() else {
        return Ok(InfoboxState::NotFound);
    };

    let rows: Vec<_> = table.select(&row_selector).collect();
    if rows.len() < MIN_INFOBOX_ROWS {
        return Ok(InfoboxState::InsufficientRows { rows: rows.len() });
    }

    let row = rows[TARGET_ROW_INDEX];
    let text = html::spaced_text(&row);

    let sources: Vec<Option<&str>> = row
        .select(&img_selector)
        .map(|img| img.value().attr("src").map(str::trim).filter(|s| !s.is_empty()))
        .collect();
    let total = sources.len();

    let images = sources
        .into_iter()
        .enumerate()
        .map(|(position, src)| ImageRef {
            position,
            role: ImageRole::for_position(position, total),
            url: src.and_then(|s| page_url.join(s).ok()),
        })
        .collect();

    Ok(InfoboxState::Found { text, images })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "https://sl.wikipedia.org/wiki/Ob%C4%8Dina_Bled";

    fn page_url() -> Url {
        Url::parse(PAGE).unwrap()
    }

    fn infobox(rows: &str) -> String {
        format!(
            r#"<html><body><table class="infobox vcard">{}</table></body></html>"#,
            rows
        )
    }

    #[test]
    fn test_missing_infobox() {
        let state = classify_infobox("<html><table class='wikitable'></table></html>", &page_url(), "infobox").unwrap();
        assert_eq!(state, InfoboxState::NotFound);
        assert_eq!(
            state.summary(PAGE),
            format!("Infobox table not found at {}.", PAGE)
        );
    }

    #[test]
    fn test_two_rows_is_insufficient_not_missing() {
        let body = infobox("<tr><th>Občina Bled</th></tr><tr><td>Grb</td></tr>");
        let state = classify_infobox(&body, &page_url(), "infobox").unwrap();
        assert_eq!(state, InfoboxState::InsufficientRows { rows: 2 });
        assert!(state.summary(PAGE).contains("less than 3 rows"));
        assert!(state.images().is_empty());
    }

    #[test]
    fn test_third_row_text_is_collapsed() {
        let body = infobox(
            "<tr><th>Občina Bled</th></tr><tr><td>map</td></tr>
             <tr><td>  Zastava \n </td><td><b>Grb</b>   občine</td></tr>
             <tr><td>Sedež</td></tr>",
        );
        let state = classify_infobox(&body, &page_url(), "infobox").unwrap();
        match &state {
            InfoboxState::Found { text, images } => {
                assert_eq!(text, "Zastava Grb občine");
                assert!(images.is_empty());
            }
            other => panic!("unexpected state {other:?}"),
        }
        assert_eq!(
            state.summary(PAGE),
            format!("Third row of infobox from {}: Zastava Grb občine", PAGE)
        );
    }

    #[test]
    fn test_two_images_are_flag_then_emblem() {
        let body = infobox(
            r#"<tr><th>x</th></tr><tr><td>y</td></tr>
               <tr><td><img src="//upload.wikimedia.org/flag.svg.png"></td>
                   <td><img src="/static/Grb_Bled.PNG"></td></tr>"#,
        );
        let state = classify_infobox(&body, &page_url(), "infobox").unwrap();
        let images = state.images();

        assert_eq!(images.len(), 2);
        assert_eq!(images[0].role, ImageRole::Flag);
        assert_eq!(images[1].role, ImageRole::Emblem);
        assert_eq!(
            images[0].url.as_ref().unwrap().as_str(),
            "https://upload.wikimedia.org/flag.svg.png"
        );
        assert_eq!(
            images[1].url.as_ref().unwrap().as_str(),
            "https://sl.wikipedia.org/static/Grb_Bled.PNG"
        );
        assert_eq!(images[0].file_name("zastava", "grb"), "zastava.png");
        assert_eq!(images[1].file_name("zastava", "grb"), "grb.png");
    }

    #[test]
    fn test_single_image_is_emblem() {
        let body = infobox(
            r#"<tr><th>x</th></tr><tr><td>y</td></tr>
               <tr><td><img src="https://upload.wikimedia.org/grb.jpg"></td></tr>"#,
        );
        let state = classify_infobox(&body, &page_url(), "infobox").unwrap();
        let images = state.images();

        assert_eq!(images.len(), 1);
        assert_eq!(images[0].role, ImageRole::Emblem);
        assert_eq!(images[0].file_name("zastava", "grb"), "grb.jpg");
    }

    #[test]
    fn test_image_without_src_keeps_position() {
        let body = infobox(
            r#"<tr><th>x</th></tr><tr><td>y</td></tr>
               <tr><td><img alt="broken"></td><td><img src="/grb"></td></tr>"#,
        );
        let state = classify_infobox(&body, &page_url(), "infobox").unwrap();
        let images = state.images();

        assert_eq!(images[0].url, None);
        assert_eq!(images[0].role, ImageRole::Flag);
        assert_eq!(images[1].role, ImageRole::Emblem);
        assert_eq!(images[1].file_name("zastava", "grb"), "grb.png");
    }

    #[test]
    fn test_role_positions() {
        assert_eq!(ImageRole::for_position(0, 1), ImageRole::Emblem);
        assert_eq!(ImageRole::for_position(0, 3), ImageRole::Flag);
        assert_eq!(ImageRole::for_position(1, 3), ImageRole::Emblem);
        assert_eq!(ImageRole::for_position(2, 3), ImageRole::Emblem);
    }
}
