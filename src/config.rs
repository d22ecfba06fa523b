use crate::error::{HarvestError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub const DEFAULT_INDEX_URL: &str = "https://sl.wikipedia.org/wiki/Seznam_ob%C4%8Din_v_Sloveniji";

/// Browser-like identification; the image host rejects unidentified clients.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

const MAX_CONCURRENCY: usize = 32;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub output: OutputConfig,
    pub batch: BatchConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SourceConfig {
    pub index_url: String,
    pub list_table_class: String,
    pub infobox_class: String,
    pub display_name_attribute: String,
    pub name_prefixes: Vec<String>,
    pub image_user_agent: String,
    pub timeout: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    pub base_directory: PathBuf,
    pub snapshot_file: PathBuf,
    pub normalized_file: PathBuf,
    pub content_file: String,
    pub flag_stem: String,
    pub emblem_stem: String,
    pub generate_report: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BatchConfig {
    pub concurrency: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            output: OutputConfig::default(),
            batch: BatchConfig::default(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            index_url: DEFAULT_INDEX_URL.to_string(),
            list_table_class: "wikitable".to_string(),
            infobox_class: "infobox".to_string(),
            display_name_attribute: "Občina".to_string(),
            name_prefixes: vec!["Občina ".to_string()],
            image_user_agent: BROWSER_USER_AGENT.to_string(),
            timeout: 30,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            base_directory: PathBuf::from("municipality_content"),
            snapshot_file: PathBuf::from("municipalities-data.json"),
            normalized_file: PathBuf::from("output.json"),
            content_file: "content.txt".to_string(),
            flag_stem: "zastava".to_string(),
            emblem_stem: "grb".to_string(),
            generate_report: true,
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        // Sequential unless asked otherwise
        Self { concurrency: 1 }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(HarvestError::Config {
                message: format!("Configuration file not found: {}", path.display()),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| HarvestError::Config {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| HarvestError::Config {
            message: format!("Failed to parse config file {}: {}", path.display(), e),
        })?;

        Ok(config)
    }

    pub fn load_with_defaults<P: AsRef<Path>>(config_path: Option<P>) -> Result<Self> {
        match config_path {
            Some(path) => Self::load_from_file(path),
            None => {
                let default_paths = ["obcine.toml", "obcine.config.toml", ".obcine.toml"];

                for default_path in &default_paths {
                    if Path::new(default_path).exists() {
                        return Self::load_from_file(default_path);
                    }
                }

                Ok(Self::default())
            }
        }
    }

    pub fn merge_with_cli_args(&mut self, cli_args: &CliOverrides) {
        if let Some(ref index_url) = cli_args.index_url {
            self.source.index_url = index_url.clone();
        }

        if let Some(ref output_dir) = cli_args.output_dir {
            self.output.base_directory = output_dir.clone();
        }

        if let Some(ref snapshot) = cli_args.snapshot_file {
            self.output.snapshot_file = snapshot.clone();
        }

        if let Some(concurrency) = cli_args.concurrency {
            self.batch.concurrency = concurrency;
        }

        if let Some(timeout) = cli_args.timeout {
            self.source.timeout = timeout;
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self).map_err(|e| HarvestError::Config {
            message: format!("Failed to serialize config: {}", e),
        })?;

        std::fs::write(path, content).map_err(|e| HarvestError::Config {
            message: format!("Failed to write config file {}: {}", path.display(), e),
        })?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let index = Url::parse(&self.source.index_url).map_err(|_| HarvestError::InvalidUrl {
            url: self.source.index_url.clone(),
        })?;

        if !matches!(index.scheme(), "http" | "https") {
            return Err(HarvestError::InvalidUrl {
                url: self.source.index_url.clone(),
            });
        }

        if self.source.list_table_class.trim().is_empty()
            || self.source.infobox_class.trim().is_empty()
        {
            return Err(HarvestError::Config {
                message: "Table class markers must not be empty".to_string(),
            });
        }

        crate::html::class_selector("table", &self.source.list_table_class)?;
        crate::html::class_selector("table", &self.source.infobox_class)?;

        if self.source.timeout == 0 {
            return Err(HarvestError::Config {
                message: "Request timeout must be greater than 0".to_string(),
            });
        }

        if self.batch.concurrency == 0 || self.batch.concurrency > MAX_CONCURRENCY {
            return Err(HarvestError::Config {
                message: format!(
                    "Concurrency must be between 1 and {} (got {})",
                    MAX_CONCURRENCY, self.batch.concurrency
                ),
            });
        }

        if self.output.content_file.trim().is_empty()
            || self.output.flag_stem.trim().is_empty()
            || self.output.emblem_stem.trim().is_empty()
        {
            return Err(HarvestError::Config {
                message: "Output file names must not be empty".to_string(),
            });
        }

        if self.output.flag_stem == self.output.emblem_stem {
            return Err(HarvestError::Config {
                message: "Flag and emblem file stems must differ".to_string(),
            });
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.source.timeout)
    }

    pub fn create_sample_config() -> String {
        let sample_config = Self::default();
        toml::to_string_pretty(&sample_config).unwrap_or_else(|_| String::new())
    }
}

#[derive(Debug, Default)]
pub struct CliOverrides {
    pub index_url: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub snapshot_file: Option<PathBuf>,
    pub concurrency: Option<usize>,
    pub timeout: Option<u64>,
}

impl CliOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_index_url(mut self, index_url: Option<String>) -> Self {
        self.index_url = index_url;
        self
    }

    pub fn with_output_dir(mut self, output_dir: Option<PathBuf>) -> Self {
        self.output_dir = output_dir;
        self
    }

    pub fn with_snapshot_file(mut self, snapshot_file: Option<PathBuf>) -> Self {
        self.snapshot_file = snapshot_file;
        self
    }

    pub fn with_concurrency(mut self, concurrency: Option<usize>) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<u64>) -> Self {
        self.timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.source.list_table_class, "wikitable");
        assert_eq!(config.source.infobox_class, "infobox");
        assert_eq!(config.output.content_file, "content.txt");
        assert_eq!(config.batch.concurrency, 1);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.batch.concurrency = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.source.index_url = "ftp://example.org/list".to_string();
        assert!(matches!(
            config.validate(),
            Err(HarvestError::InvalidUrl { .. })
        ));

        let mut config = Config::default();
        config.output.emblem_stem = config.output.flag_stem.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_file_operations() {
        let mut config = Config::default();
        config.batch.concurrency = 4;
        let temp_file = NamedTempFile::new().unwrap();

        config.save_to_file(temp_file.path()).unwrap();

        let loaded = Config::load_from_file(temp_file.path()).unwrap();
        assert_eq!(loaded.batch.concurrency, 4);
        assert_eq!(loaded.source.display_name_attribute, "Občina");
    }

    #[test]
    fn test_partial_config_file_uses_defaults() {
        let temp_file = NamedTempFile::new().unwrap();
        std::fs::write(temp_file.path(), "[batch]\nconcurrency = 2\n").unwrap();

        let loaded = Config::load_from_file(temp_file.path()).unwrap();
        assert_eq!(loaded.batch.concurrency, 2);
        assert_eq!(loaded.output.flag_stem, "zastava");
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = Config::default();

        let overrides = CliOverrides::new()
            .with_timeout(Some(5))
            .with_concurrency(Some(3))
            .with_output_dir(Some(PathBuf::from("out")));

        config.merge_with_cli_args(&overrides);

        assert_eq!(config.source.timeout, 5);
        assert_eq!(config.batch.concurrency, 3);
        assert_eq!(config.output.base_directory, PathBuf::from("out"));
        assert_eq!(config.source.index_url, DEFAULT_INDEX_URL);
    }

    #[test]
    fn test_sample_config_generation() {
        let sample = Config::create_sample_config();
        assert!(sample.contains("[source]"));
        assert!(sample.contains("[output]"));
        assert!(sample.contains("[batch]"));
    }
}
