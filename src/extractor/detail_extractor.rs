use crate::config::Config;
use crate::discovery::EntityRecord;
use crate::extractor::infobox::{classify_infobox, ImageRole, InfoboxState};
use crate::extractor::output_manager::{sanitize_entity_name, OutputManager, UNKNOWN_ENTITY};
use crate::fetcher::PageFetcher;
use serde::Serialize;
use tracing::{debug, info, warn};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Extracted,
    TableNotFound,
    InsufficientRows,
    FetchFailed,
    ParseFailed,
    WriteFailed,
    Aborted,
    Skipped,
}

impl OutcomeStatus {
    /// Content was written, but it describes a missing or short infobox.
    pub fn is_degraded(&self) -> bool {
        matches!(self, OutcomeStatus::TableNotFound | OutcomeStatus::InsufficientRows)
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            OutcomeStatus::FetchFailed
                | OutcomeStatus::ParseFailed
                | OutcomeStatus::WriteFailed
                | OutcomeStatus::Aborted
        )
    }
}

impl From<&InfoboxState> for OutcomeStatus {
    fn from(state: &InfoboxState) -> Self {
        match state {
            InfoboxState::NotFound => OutcomeStatus::TableNotFound,
            InfoboxState::InsufficientRows { .. } => OutcomeStatus::InsufficientRows,
            InfoboxState::Found { .. } => OutcomeStatus::Extracted,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SavedImage {
    pub role: ImageRole,
    pub file_name: String,
    pub url: String,
    pub bytes: u64,
}

/// What happened to one entity. Never an error: failures are recorded here.
#[derive(Debug, Clone, Serialize)]
pub struct DetailOutcome {
    pub name: String,
    pub directory: String,
    pub url: Option<String>,
    pub status: OutcomeStatus,
    pub images: Vec<SavedImage>,
    pub image_errors: Vec<String>,
    pub error: Option<String>,
}

impl DetailOutcome {
    fn new(name: String, directory: String, url: Option<&str>) -> Self {
        Self {
            name,
            directory,
            url: url.map(str::to_string),
            status: OutcomeStatus::Skipped,
            images: Vec::new(),
            image_errors: Vec::new(),
            error: None,
        }
    }

    pub fn skipped<S: Into<String>, D: Into<String>>(name: S, directory: D) -> Self {
        Self::new(name.into(), directory.into(), None)
    }

    /// An entity whose task ended without producing an outcome.
    pub fn aborted<S: Into<String>, D: Into<String>>(
        name: S,
        directory: D,
        url: Option<&str>,
        error: String,
    ) -> Self {
        Self::new(name.into(), directory.into(), url).fail(OutcomeStatus::Aborted, error)
    }

    fn fail(mut self, status: OutcomeStatus, error: String) -> Self {
        self.status = status;
        self.error = Some(error);
        self
    }
}

/// Fetches one detail page, extracts the infobox's third row and its images,
/// and persists them under the entity's own directory.
pub struct DetailExtractor {
    fetcher: PageFetcher,
    output: OutputManager,
    infobox_class: String,
    display_name_attribute: String,
    name_prefixes: Vec<String>,
    flag_stem: String,
    emblem_stem: String,
}

impl DetailExtractor {
    pub fn new(fetcher: PageFetcher, output: OutputManager, config: &Config) -> Self {
        Self {
            fetcher,
            output,
            infobox_class: config.source.infobox_class.clone(),
            display_name_attribute: config.source.display_name_attribute.clone(),
            name_prefixes: config.source.name_prefixes.clone(),
            flag_stem: config.output.flag_stem.clone(),
            emblem_stem: config.output.emblem_stem.clone(),
        }
    }

    pub fn output(&self) -> &OutputManager {
        &self.output
    }

    pub fn display_name<'a>(&self, record: &'a EntityRecord) -> Option<&'a str> {
        record.display_name(&self.display_name_attribute)
    }

    pub fn directory_name(&self, record: &EntityRecord) -> String {
        sanitize_entity_name(self.display_name(record), &self.name_prefixes)
    }

    pub async fn extract(&self, record: &EntityRecord) -> DetailOutcome {
        let name = self.display_name(record).unwrap_or(UNKNOWN_ENTITY).to_string();
        let outcome = DetailOutcome::new(name, self.directory_name(record), record.url());

        let Some(url) = record.url() else {
            warn!(entity = %outcome.name, "Record has no detail URL, skipping");
            return outcome;
        };

        let entity_dir = match self.output.prepare_entity_dir(&outcome.directory) {
            Ok(dir) => dir,
            Err(e) => {
                warn!(url = %url, error = %e, "Cannot prepare entity directory");
                return outcome.fail(OutcomeStatus::WriteFailed, e.to_string());
            }
        };

        let page_url = match Url::parse(url) {
            Ok(u) => u,
            Err(e) => {
                warn!(url = %url, error = %e, "Detail URL is not absolute");
                return outcome.fail(OutcomeStatus::FetchFailed, format!("Invalid URL {}: {}", url, e));
            }
        };

        let body = match self.fetcher.fetch_html(url).await {
            Ok(body) => body,
            Err(e) => {
                warn!(url = %url, error = %e, "Error fetching detail page");
                return outcome.fail(OutcomeStatus::FetchFailed, e.to_string());
            }
        };

        let state = match classify_infobox(&body, &page_url, &self.infobox_class) {
            Ok(state) => state,
            Err(e) => {
                warn!(url = %url, error = %e, "Error processing detail page");
                return outcome.fail(OutcomeStatus::ParseFailed, e.to_string());
            }
        };

        let mut outcome = outcome;
        match &state {
            InfoboxState::NotFound => warn!(url = %url, "Infobox table not found"),
            InfoboxState::InsufficientRows { rows } => {
                warn!(url = %url, rows = *rows, "Infobox table has too few rows")
            }
            InfoboxState::Found { images, .. } => {
                debug!(url = %url, images = images.len(), "Infobox row extracted")
            }
        }

        for image in state.images() {
            let Some(image_url) = image.url.as_ref() else {
                debug!(url = %url, position = image.position, "Image without source, skipping");
                continue;
            };

            let file_name = image.file_name(&self.flag_stem, &self.emblem_stem);
            let dest = entity_dir.join(&file_name);

            match self.fetcher.download_to(image_url.as_str(), &dest).await {
                Ok(bytes) => {
                    info!(url = %image_url, dest = %dest.display(), bytes, "Downloaded image");
                    outcome.images.push(SavedImage {
                        role: image.role,
                        file_name,
                        url: image_url.to_string(),
                        bytes,
                    });
                }
                Err(e) => {
                    warn!(url = %image_url, error = %e, "Error downloading image");
                    outcome.image_errors.push(e.to_string());
                }
            }
        }

        let summary = state.summary(url);
        match self.output.write_content(&entity_dir, &summary) {
            Ok(path) => {
                info!(url = %url, path = %path.display(), "Content saved");
                outcome.status = OutcomeStatus::from(&state);
                outcome
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Error writing content file");
                outcome.fail(OutcomeStatus::WriteFailed, e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn extractor(root: &std::path::Path) -> DetailExtractor {
        let config = Config::default();
        let fetcher = PageFetcher::new(Duration::from_secs(5), "TestBrowser/1.0").unwrap();
        let output = OutputManager::new(root.to_path_buf(), "content.txt").unwrap();
        DetailExtractor::new(fetcher, output, &config)
    }

    fn record(name: &str, url: Option<String>) -> EntityRecord {
        EntityRecord::new()
            .with_attribute("Občina", name)
            .with_url(url)
    }

    #[tokio::test]
    async fn test_extracts_row_and_images() {
        let server = MockServer::start().await;
        let body = r#"<table class="infobox"><tr><th>Občina Bled</th></tr><tr><td>x</td></tr>
            <tr><td><img src="/img/zastava.png"> Zastava</td><td><img src="/img/grb.png"> Grb</td></tr></table>"#;
        Mock::given(method("GET"))
            .and(path("/wiki/Bled"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/img/zastava.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"flag".to_vec()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/img/grb.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"emblem".to_vec()))
            .mount(&server)
            .await;

        let root = TempDir::new().unwrap();
        let url = format!("{}/wiki/Bled", server.uri());
        let outcome = extractor(root.path())
            .extract(&record("Občina Bled", Some(url.clone())))
            .await;

        assert_eq!(outcome.status, OutcomeStatus::Extracted);
        assert_eq!(outcome.directory, "Bled");
        assert_eq!(outcome.images.len(), 2);

        let dir = root.path().join("Bled");
        assert_eq!(
            std::fs::read_to_string(dir.join("content.txt")).unwrap(),
            format!("Third row of infobox from {}: Zastava Grb", url)
        );
        assert_eq!(std::fs::read(dir.join("zastava.png")).unwrap(), b"flag");
        assert_eq!(std::fs::read(dir.join("grb.png")).unwrap(), b"emblem");
    }

    #[tokio::test]
    async fn test_image_failure_does_not_abort_entity() {
        let server = MockServer::start().await;
        let body = r#"<table class="infobox"><tr><td>a</td></tr><tr><td>b</td></tr>
            <tr><td><img src="/img/missing.png">Grb</td></tr></table>"#;
        Mock::given(method("GET"))
            .and(path("/wiki/Kranj"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/img/missing.png"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let root = TempDir::new().unwrap();
        let outcome = extractor(root.path())
            .extract(&record("Kranj", Some(format!("{}/wiki/Kranj", server.uri()))))
            .await;

        assert_eq!(outcome.status, OutcomeStatus::Extracted);
        assert_eq!(outcome.image_errors.len(), 1);
        assert!(root.path().join("Kranj").join("content.txt").exists());
        assert!(!root.path().join("Kranj").join("grb.png").exists());
    }

    #[tokio::test]
    async fn test_fetch_failure_writes_no_content() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let root = TempDir::new().unwrap();
        let outcome = extractor(root.path())
            .extract(&record("Občina Piran", Some(format!("{}/wiki/Piran", server.uri()))))
            .await;

        assert_eq!(outcome.status, OutcomeStatus::FetchFailed);
        assert!(outcome.error.is_some());
        assert!(root.path().join("Piran").is_dir());
        assert!(!root.path().join("Piran").join("content.txt").exists());
    }

    #[tokio::test]
    async fn test_missing_infobox_is_degraded_content() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<p>no tables</p>"))
            .mount(&server)
            .await;

        let root = TempDir::new().unwrap();
        let url = format!("{}/wiki/Izola", server.uri());
        let outcome = extractor(root.path())
            .extract(&record("Izola", Some(url.clone())))
            .await;

        assert_eq!(outcome.status, OutcomeStatus::TableNotFound);
        assert!(outcome.status.is_degraded());
        assert_eq!(
            std::fs::read_to_string(root.path().join("Izola").join("content.txt")).unwrap(),
            format!("Infobox table not found at {}.", url)
        );
    }

    #[tokio::test]
    async fn test_directory_exists_before_url_is_used() {
        let root = TempDir::new().unwrap();
        let outcome = extractor(root.path())
            .extract(&record("Občina Ptuj", Some("/wiki/Ptuj".to_string())))
            .await;

        assert_eq!(outcome.status, OutcomeStatus::FetchFailed);
        assert!(root.path().join("Ptuj").is_dir());
        assert!(!root.path().join("Ptuj").join("content.txt").exists());
    }

    #[tokio::test]
    async fn test_record_without_url_is_skipped() {
        let root = TempDir::new().unwrap();
        let outcome = extractor(root.path()).extract(&record("Bovec", None)).await;

        assert_eq!(outcome.status, OutcomeStatus::Skipped);
        assert!(!root.path().join("Bovec").exists());
    }
}
