pub mod batch;
pub mod cli;
pub mod config;
pub mod discovery;
pub mod error;
pub mod extractor;
pub mod fetcher;
pub mod html;
pub mod normalize;
pub mod snapshot;
pub mod ui;

// Public API re-exports
pub use cli::{Cli, OutputFormat, Stage};
pub use config::{BatchConfig, CliOverrides, Config, OutputConfig, SourceConfig};
pub use error::{HarvestError, Result, UserFriendlyError};

pub use batch::{BatchProgress, BatchRunner};
pub use discovery::{EntityRecord, ListDiscoverer};
pub use extractor::{
    ConfigSnapshot, DetailExtractor, DetailOutcome, HarvestReport, OutcomeStatus, OutputManager,
};
pub use fetcher::PageFetcher;
pub use normalize::{normalize_keys, to_camel_case};
pub use ui::{GracefulShutdown, OutputFormatter, OutputMode, ProgressManager};

use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// What a pipeline run produced.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub discovered: Option<usize>,
    pub progress: Option<BatchProgress>,
    pub report: Option<HarvestReport>,
}

impl RunSummary {
    pub fn has_failures(&self) -> bool {
        self.progress.as_ref().is_some_and(BatchProgress::has_failures)
    }
}

/// Main library interface: discovery, detail harvesting, and the helpers
/// around them.
pub struct Harvester {
    config: Config,
    output_formatter: OutputFormatter,
    progress_manager: ProgressManager,
    shutdown: GracefulShutdown,
}

impl Harvester {
    pub fn new(config: Config, output_mode: OutputMode, verbose: u8, quiet: bool) -> Result<Self> {
        let shutdown = GracefulShutdown::new()?;
        Ok(Self::with_shutdown(config, output_mode, verbose, quiet, shutdown))
    }

    /// Same as `new`, without installing a Ctrl+C handler.
    pub fn new_for_test(config: Config, output_mode: OutputMode, verbose: u8, quiet: bool) -> Self {
        Self::with_shutdown(
            config,
            output_mode,
            verbose,
            quiet,
            GracefulShutdown::new_for_test(),
        )
    }

    fn with_shutdown(
        config: Config,
        output_mode: OutputMode,
        verbose: u8,
        quiet: bool,
        shutdown: GracefulShutdown,
    ) -> Self {
        let output_formatter = OutputFormatter::new(output_mode, verbose, quiet);
        let progress_manager = ProgressManager::new(output_formatter.wants_progress());

        Self {
            config,
            output_formatter,
            progress_manager,
            shutdown,
        }
    }

    pub fn from_cli(cli_args: &Cli) -> Result<Self> {
        let config = cli_args.load_config()?;
        Self::new(
            config,
            output_mode_for(&cli_args.output_format),
            cli_args.verbosity_level(),
            cli_args.quiet,
        )
    }

    /// Runs the selected stages. `Stage::All` feeds discovery's records
    /// straight into the detail stage after the snapshot is written.
    pub async fn run(&self, stage: Stage) -> Result<RunSummary> {
        let mut summary = RunSummary::default();

        let records = if stage.runs_discovery() {
            let records = self.discover().await?;
            summary.discovered = Some(records.len());
            records
        } else {
            self.load_records()?
        };

        if stage.runs_details() {
            let (progress, report) = self.harvest_details(&records).await?;
            summary.progress = Some(progress);
            summary.report = report;
        }

        Ok(summary)
    }

    /// Fetches the index page, then writes the snapshot and its
    /// normalized-keys twin.
    pub async fn discover(&self) -> Result<Vec<EntityRecord>> {
        self.shutdown.check_shutdown()?;
        self.output_formatter
            .start_operation("Discovering municipalities");

        let spinner = self.progress_manager.create_spinner("Fetching index page");
        let discoverer = ListDiscoverer::new(
            self.fetcher()?,
            self.config.source.list_table_class.as_str(),
        );
        let discovered = discoverer.discover(&self.config.source.index_url).await;
        spinner.finish_and_clear();
        let records = discovered?;

        self.shutdown.check_shutdown()?;

        let output = &self.config.output;
        snapshot::save_snapshot(&output.snapshot_file, &records)?;
        snapshot::save_normalized(&output.normalized_file, &records)?;

        self.output_formatter.print_discovery_summary(
            records.len(),
            &output.snapshot_file,
            &output.normalized_file,
        );

        Ok(records)
    }

    pub fn load_records(&self) -> Result<Vec<EntityRecord>> {
        snapshot::load_snapshot(&self.config.output.snapshot_file)
    }

    /// Harvests every record into the output tree.
    ///
    /// Per-entity failures are counted, never returned. A cancelled run
    /// still writes its report before yielding `HarvestError::Cancelled`.
    pub async fn harvest_details(
        &self,
        records: &[EntityRecord],
    ) -> Result<(BatchProgress, Option<HarvestReport>)> {
        self.shutdown.check_shutdown()?;

        let output_manager = self.setup_output_directory()?;
        let extractor = Arc::new(DetailExtractor::new(
            self.fetcher()?,
            output_manager,
            &self.config,
        ));
        let runner = BatchRunner::new(
            Arc::clone(&extractor),
            self.config.batch.concurrency,
            self.shutdown.clone(),
        );

        self.output_formatter.start_operation(&format!(
            "Harvesting {} municipalities",
            records.len()
        ));

        let entity_progress = self
            .progress_manager
            .create_entity_progress(records.len() as u64);
        let update: &(dyn Fn(&BatchProgress) + Sync) = &|progress| {
            ui::progress::update_entity_progress(&entity_progress, progress);
        };

        let progress = runner.run(records, Some(update)).await;

        ui::progress::finish_progress_with_summary(
            &entity_progress,
            &format!("Harvested {} municipalities", progress.processed),
            progress.elapsed(),
        );

        let report = if self.config.output.generate_report {
            let source = self.config.output.snapshot_file.display().to_string();
            Some(extractor.output().create_harvest_report(
                &source,
                &progress,
                &self.create_config_snapshot(),
            )?)
        } else {
            None
        };

        self.output_formatter.print_harvest_summary(&progress);

        if progress.cancelled {
            return Err(HarvestError::Cancelled);
        }

        Ok((progress, report))
    }

    /// Sorted distinct values of `attribute` across the snapshot.
    pub fn distinct(&self, attribute: &str) -> Result<Vec<String>> {
        let records = self.load_records()?;
        Ok(snapshot::distinct_values(&records, attribute))
    }

    /// Describes what `run(stage)` would do, without side effects.
    pub fn plan(&self, stage: Stage) -> Vec<String> {
        let source = &self.config.source;
        let output = &self.config.output;
        let mut steps = Vec::new();

        if stage.runs_discovery() {
            steps.push(format!(
                "Fetch {} and read table.{}",
                source.index_url, source.list_table_class
            ));
            steps.push(format!("Write snapshot {}", output.snapshot_file.display()));
            steps.push(format!(
                "Write normalized snapshot {}",
                output.normalized_file.display()
            ));
        } else {
            steps.push(format!("Read snapshot {}", output.snapshot_file.display()));
        }

        if stage.runs_details() {
            steps.push(format!(
                "Visit every detail page ({} at a time, {}s timeout) and read table.{}",
                self.config.batch.concurrency, source.timeout, source.infobox_class
            ));
            steps.push(format!(
                "Write {}/<municipality>/{} plus {}/{} images",
                output.base_directory.display(),
                output.content_file,
                output.flag_stem,
                output.emblem_stem
            ));
        }

        steps
    }

    fn fetcher(&self) -> Result<PageFetcher> {
        PageFetcher::from_config(&self.config)
    }

    fn setup_output_directory(&self) -> Result<OutputManager> {
        let manager = OutputManager::new(
            self.config.output.base_directory.clone(),
            self.config.output.content_file.clone(),
        )?;
        manager.initialize()?;

        info!(path = %manager.get_output_directory().display(), "Output directory ready");
        self.output_formatter.info(&format!(
            "Initialized output directory: {}",
            manager.get_output_directory().display()
        ));

        Ok(manager)
    }

    fn create_config_snapshot(&self) -> ConfigSnapshot {
        ConfigSnapshot {
            index_url: self.config.source.index_url.clone(),
            infobox_class: self.config.source.infobox_class.clone(),
            display_name_attribute: self.config.source.display_name_attribute.clone(),
            concurrency: self.config.batch.concurrency,
            timeout_secs: self.config.source.timeout,
        }
    }

    pub fn generate_sample_config<P: AsRef<Path>>(output_path: P) -> Result<()> {
        let sample_config = Config::create_sample_config();
        std::fs::write(output_path.as_ref(), sample_config).map_err(HarvestError::Io)?;
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn output_formatter(&self) -> &OutputFormatter {
        &self.output_formatter
    }

    pub fn progress_manager(&self) -> &ProgressManager {
        &self.progress_manager
    }

    pub fn is_running(&self) -> bool {
        self.shutdown.is_running()
    }

    pub fn request_shutdown(&self) {
        self.shutdown.request_shutdown();
    }

    pub fn handle_error(&self, error: &HarvestError) {
        self.output_formatter.print_user_friendly_error(error);
    }
}

pub fn output_mode_for(format: &OutputFormat) -> OutputMode {
    match format {
        OutputFormat::Human => OutputMode::Human,
        OutputFormat::Json => OutputMode::Json,
        OutputFormat::Plain => OutputMode::Plain,
    }
}
