use crate::batch::BatchProgress;
use crate::error::{HarvestError, Result};
use crate::extractor::DetailOutcome;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Directory name used when an entity has no display name.
pub const UNKNOWN_ENTITY: &str = "Unknown";

const METADATA_DIR: &str = ".obcine";

#[derive(Debug, Clone, Serialize)]
pub struct HarvestReport {
    pub source: String,
    pub summary: HarvestSummary,
    pub entities: Vec<DetailOutcome>,
    pub harvest_time: DateTime<Utc>,
    pub errors: Vec<String>,
    pub config_used: ConfigSnapshot,
}

#[derive(Debug, Clone, Serialize)]
pub struct HarvestSummary {
    pub total_entities: usize,
    pub extracted: usize,
    pub degraded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub images_saved: usize,
    pub images_failed: usize,
    pub directory_collisions: usize,
    pub duration: Duration,
    pub cancelled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigSnapshot {
    pub index_url: String,
    pub infobox_class: String,
    pub display_name_attribute: String,
    pub concurrency: usize,
    pub timeout_secs: u64,
}

impl From<&BatchProgress> for HarvestSummary {
    fn from(progress: &BatchProgress) -> Self {
        Self {
            total_entities: progress.total,
            extracted: progress.extracted,
            degraded: progress.degraded,
            failed: progress.failed,
            skipped: progress.skipped,
            images_saved: progress.images_saved,
            images_failed: progress.images_failed,
            directory_collisions: progress.collisions,
            duration: progress.elapsed(),
            cancelled: progress.cancelled,
        }
    }
}

impl HarvestReport {
    pub fn has_failures(&self) -> bool {
        self.summary.failed > 0
    }
}

/// Owns the output root; every entity gets its own subdirectory below it.
pub struct OutputManager {
    base_path: PathBuf,
    content_file: String,
}

impl OutputManager {
    pub fn new<S: Into<String>>(base_path: PathBuf, content_file: S) -> Result<Self> {
        let manager = Self {
            base_path,
            content_file: content_file.into(),
        };

        manager.validate_paths()?;
        Ok(manager)
    }

    pub fn initialize(&self) -> Result<()> {
        fs::create_dir_all(&self.base_path).map_err(HarvestError::Io)?;
        fs::create_dir_all(self.get_metadata_dir()).map_err(HarvestError::Io)?;
        Ok(())
    }

    pub fn get_output_directory(&self) -> &Path {
        &self.base_path
    }

    pub fn get_metadata_dir(&self) -> PathBuf {
        self.base_path.join(METADATA_DIR)
    }

    pub fn entity_directory(&self, dir_name: &str) -> PathBuf {
        self.base_path.join(dir_name)
    }

    /// Creates (if needed) and returns the entity's directory.
    pub fn prepare_entity_dir(&self, dir_name: &str) -> Result<PathBuf> {
        let dir = self.entity_directory(dir_name);
        fs::create_dir_all(&dir).map_err(|e| HarvestError::Permission {
            path: format!("Cannot create {}: {}", dir.display(), e),
        })?;
        Ok(dir)
    }

    /// Writes the content summary, replacing whatever was there.
    pub fn write_content(&self, entity_dir: &Path, content: &str) -> Result<PathBuf> {
        let path = entity_dir.join(&self.content_file);
        fs::write(&path, content).map_err(HarvestError::Io)?;
        Ok(path)
    }

    pub fn create_harvest_report(
        &self,
        source: &str,
        progress: &BatchProgress,
        config: &ConfigSnapshot,
    ) -> Result<HarvestReport> {
        let report = HarvestReport {
            source: source.to_string(),
            summary: HarvestSummary::from(progress),
            entities: progress.outcomes.clone(),
            harvest_time: Utc::now(),
            errors: progress.errors.clone(),
            config_used: config.clone(),
        };

        self.save_report_json(&report)?;
        self.save_report_text(&report)?;

        Ok(report)
    }

    fn save_report_json(&self, report: &HarvestReport) -> Result<()> {
        let report_path = self.get_metadata_dir().join("harvest_report.json");
        let json_content =
            serde_json::to_string_pretty(report).map_err(|e| HarvestError::Config {
                message: format!("Failed to serialize report to JSON: {}", e),
            })?;

        fs::write(&report_path, json_content).map_err(HarvestError::Io)?;

        Ok(())
    }

    fn save_report_text(&self, report: &HarvestReport) -> Result<()> {
        let report_path = self.get_metadata_dir().join("harvest_report.txt");
        let mut file = fs::File::create(&report_path).map_err(HarvestError::Io)?;

        writeln!(file, "Municipality Harvest Report")?;
        writeln!(file, "===========================")?;
        writeln!(file)?;
        writeln!(file, "Source: {}", report.source)?;
        writeln!(
            file,
            "Harvested at: {}",
            report.harvest_time.format("%Y-%m-%d %H:%M:%S UTC")
        )?;
        writeln!(file, "Duration: {:?}", report.summary.duration)?;
        writeln!(file)?;

        writeln!(file, "Entities:")?;
        writeln!(file, "  Total:     {}", report.summary.total_entities)?;
        writeln!(file, "  Extracted: {}", report.summary.extracted)?;
        writeln!(file, "  Degraded:  {}", report.summary.degraded)?;
        writeln!(file, "  Failed:    {}", report.summary.failed)?;
        writeln!(file, "  Skipped:   {}", report.summary.skipped)?;
        writeln!(
            file,
            "  Images:    {} saved, {} failed",
            report.summary.images_saved, report.summary.images_failed
        )?;
        if report.summary.directory_collisions > 0 {
            writeln!(
                file,
                "  Directory collisions (last write wins): {}",
                report.summary.directory_collisions
            )?;
        }
        if report.summary.cancelled {
            writeln!(file, "  Run was cancelled before all entities were processed")?;
        }
        writeln!(file)?;

        writeln!(file, "Configuration used:")?;
        writeln!(file, "  Index URL: {}", report.config_used.index_url)?;
        writeln!(file, "  Infobox class: {}", report.config_used.infobox_class)?;
        writeln!(
            file,
            "  Display name attribute: {}",
            report.config_used.display_name_attribute
        )?;
        writeln!(file, "  Concurrency: {}", report.config_used.concurrency)?;
        writeln!(file, "  Timeout: {}s", report.config_used.timeout_secs)?;
        writeln!(file)?;

        if !report.errors.is_empty() {
            writeln!(file, "Errors encountered:")?;
            for error in &report.errors {
                writeln!(file, "  - {}", error)?;
            }
            writeln!(file)?;
        }

        Ok(())
    }

    fn validate_paths(&self) -> Result<()> {
        if !self.base_path.exists() {
            fs::create_dir_all(&self.base_path).map_err(|e| HarvestError::Permission {
                path: format!(
                    "Cannot create output directory {}: {}",
                    self.base_path.display(),
                    e
                ),
            })?;
        }

        let test_file = self.base_path.join(".obcine_write_test");
        match fs::File::create(&test_file) {
            Ok(_) => {
                let _ = fs::remove_file(&test_file);
            }
            Err(e) => {
                return Err(HarvestError::Permission {
                    path: format!(
                        "No write permission for directory {}: {}",
                        self.base_path.display(),
                        e
                    ),
                });
            }
        }

        Ok(())
    }
}

/// Derives a filesystem-safe directory name from an entity's display name.
///
/// Every occurrence of a prefix marker (e.g. `"Občina "`) is removed, then
/// whitespace and path separators become `_`. Distinct names may map to the
/// same directory.
pub fn sanitize_entity_name(display_name: Option<&str>, prefixes: &[String]) -> String {
    let mut name = display_name.unwrap_or(UNKNOWN_ENTITY).to_string();

    for prefix in prefixes.iter().filter(|p| !p.is_empty()) {
        name = name.replace(prefix.as_str(), "");
    }

    let sanitized: String = name
        .chars()
        .map(|ch| match ch {
            '/' | '\\' => '_',
            c if c.is_whitespace() => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    match sanitized.as_str() {
        "" | "." | ".." => UNKNOWN_ENTITY.to_string(),
        _ => sanitized,
    }
}
