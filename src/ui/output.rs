use crate::batch::BatchProgress;
use crate::error::{HarvestError, UserFriendlyError};
use crate::extractor::HarvestReport;
use console::{style, Emoji, Term};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputMode {
    Human,
    Json,
    Plain,
}

static CHECKMARK: Emoji = Emoji("✅ ", "+ ");
static CROSS: Emoji = Emoji("❌ ", "x ");
static INFO: Emoji = Emoji("ℹ️  ", "i ");
static GLOBE: Emoji = Emoji("🌐 ", "> ");
static SPARKLES: Emoji = Emoji("✨ ", "* ");

pub struct OutputFormatter {
    term: Term,
    mode: OutputMode,
    use_colors: bool,
    verbose_level: u8,
    quiet: bool,
}

impl OutputFormatter {
    pub fn new(mode: OutputMode, verbose: u8, quiet: bool) -> Self {
        let term = Term::stdout();
        let use_colors = match mode {
            OutputMode::Human => term.features().colors_supported() && !quiet,
            _ => false,
        };

        Self {
            term,
            mode,
            use_colors,
            verbose_level: if quiet { 0 } else { verbose },
            quiet,
        }
    }

    /// Progress bars only make sense on an interactive terminal in human mode.
    pub fn wants_progress(&self) -> bool {
        self.mode == OutputMode::Human && !self.quiet && self.term.is_term()
    }

    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Human => self.print_human_message(MessageType::Success, message),
            OutputMode::Json => self.print_json_message("success", message),
            OutputMode::Plain => println!("SUCCESS: {}", message),
        }
    }

    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Human => self.print_human_message(MessageType::Error, message),
            OutputMode::Json => self.print_json_message("error", message),
            OutputMode::Plain => eprintln!("ERROR: {}", message),
        }
    }

    pub fn info(&self, message: &str) {
        if self.should_show_message(1) {
            match self.mode {
                OutputMode::Human => self.print_human_message(MessageType::Info, message),
                OutputMode::Json => self.print_json_message("info", message),
                OutputMode::Plain => println!("INFO: {}", message),
            }
        }
    }

    pub fn start_operation(&self, operation: &str) {
        if self.should_show_message(0) {
            match self.mode {
                OutputMode::Human => {
                    if self.use_colors {
                        println!("{}{}", GLOBE, style(operation).bold());
                    } else {
                        println!("> {}", operation);
                    }
                }
                OutputMode::Json => self.print_json_message("operation_start", operation),
                OutputMode::Plain => println!("STARTING: {}", operation),
            }
        }
    }

    pub fn print_user_friendly_error(&self, error: &HarvestError) {
        self.error(&error.user_message());

        if let Some(suggestion) = error.suggestion() {
            match self.mode {
                OutputMode::Human => {
                    eprintln!();
                    if self.use_colors {
                        eprintln!(
                            "{}{}",
                            INFO,
                            style(format!("Suggestion: {}", suggestion)).cyan()
                        );
                    } else {
                        eprintln!("Suggestion: {}", suggestion);
                    }
                }
                OutputMode::Json => {
                    self.print_json_object(&serde_json::json!({
                        "type": "suggestion",
                        "message": suggestion
                    }));
                }
                OutputMode::Plain => eprintln!("SUGGESTION: {}", suggestion),
            }
        }
    }

    pub fn print_discovery_summary(&self, entities: usize, snapshot: &Path, normalized: &Path) {
        if self.quiet {
            return;
        }

        match self.mode {
            OutputMode::Human => {
                self.success(&format!("Discovered {} municipalities", entities));
                println!("  Snapshot:   {}", snapshot.display());
                println!("  Normalized: {}", normalized.display());
            }
            OutputMode::Json => self.print_json_object(&serde_json::json!({
                "type": "discovery",
                "entities": entities,
                "snapshot": snapshot.display().to_string(),
                "normalized": normalized.display().to_string(),
            })),
            OutputMode::Plain => {
                println!("DISCOVERED: {}", entities);
                println!("Snapshot: {}", snapshot.display());
                println!("Normalized: {}", normalized.display());
            }
        }
    }

    pub fn print_harvest_summary(&self, progress: &BatchProgress) {
        if self.quiet {
            return;
        }

        match self.mode {
            OutputMode::Human => self.print_human_summary(progress),
            OutputMode::Json => self.print_json_summary(progress),
            OutputMode::Plain => self.print_plain_summary(progress),
        }
    }

    pub fn print_harvest_report(&self, report: &HarvestReport) {
        match self.mode {
            OutputMode::Human => self.print_human_report(report),
            OutputMode::Json => {
                let json_output =
                    serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string());
                println!("{}", json_output);
            }
            OutputMode::Plain => self.print_plain_report(report),
        }
    }

    /// Lists the distinct values of one attribute, one per line.
    pub fn print_distinct_values(&self, attribute: &str, values: &[String]) {
        match self.mode {
            OutputMode::Json => self.print_json_object(&serde_json::json!({
                "type": "distinct",
                "attribute": attribute,
                "values": values,
            })),
            _ => {
                for value in values {
                    println!("{}", value);
                }
            }
        }
    }

    pub fn print_header(&self, title: &str) {
        if self.quiet {
            return;
        }

        match self.mode {
            OutputMode::Human => {
                println!();
                if self.use_colors {
                    println!("{} {}", SPARKLES, style(title).bold().cyan());
                } else {
                    println!("=== {} ===", title);
                }
                println!();
            }
            OutputMode::Json => {
                self.print_json_object(&serde_json::json!({
                    "type": "header",
                    "title": title
                }));
            }
            OutputMode::Plain => println!("=== {} ===", title),
        }
    }

    pub fn print_separator(&self) {
        if self.quiet {
            return;
        }

        match self.mode {
            OutputMode::Human => {
                if self.use_colors {
                    println!("{}", style("─".repeat(60)).dim());
                } else {
                    println!("{}", "-".repeat(60));
                }
            }
            OutputMode::Plain => println!("{}", "-".repeat(60)),
            OutputMode::Json => {}
        }
    }

    fn should_show_message(&self, min_verbose_level: u8) -> bool {
        !self.quiet && self.verbose_level >= min_verbose_level
    }

    fn print_human_message(&self, msg_type: MessageType, message: &str) {
        #[allow(clippy::type_complexity)]
        let (emoji, color_fn): (Emoji, Box<dyn Fn(&str) -> console::StyledObject<&str>>) =
            match msg_type {
                MessageType::Success => (CHECKMARK, Box::new(|msg| style(msg).green().bold())),
                MessageType::Error => (CROSS, Box::new(|msg| style(msg).red().bold())),
                MessageType::Info => (INFO, Box::new(|msg| style(msg).cyan())),
            };

        if self.use_colors {
            match msg_type {
                MessageType::Error => eprintln!("{}{}", emoji, color_fn(message)),
                _ => println!("{}{}", emoji, color_fn(message)),
            }
        } else {
            let prefix = match msg_type {
                MessageType::Success => "+",
                MessageType::Error => "x",
                MessageType::Info => "i",
            };

            match msg_type {
                MessageType::Error => eprintln!("{} {}", prefix, message),
                _ => println!("{} {}", prefix, message),
            }
        }
    }

    fn print_json_message(&self, level: &str, message: &str) {
        self.print_json_object(&serde_json::json!({
            "type": "message",
            "level": level,
            "message": message,
            "timestamp": chrono::Utc::now().to_rfc3339()
        }));
    }

    fn print_json_object(&self, obj: &serde_json::Value) {
        println!(
            "{}",
            serde_json::to_string(obj).unwrap_or_else(|_| "{}".to_string())
        );
    }

    fn highlight(&self, value: String) -> String {
        if self.use_colors {
            style(value).cyan().bold().to_string()
        } else {
            value
        }
    }

    fn print_human_summary(&self, progress: &BatchProgress) {
        println!();
        self.print_separator();

        let headline = if progress.cancelled {
            "Harvest cancelled"
        } else {
            "Harvest completed!"
        };
        if self.use_colors {
            let styled = if progress.cancelled {
                style(headline).yellow().bold()
            } else {
                style(headline).green().bold()
            };
            println!("{} {}", styled, CHECKMARK);
        } else {
            println!("+ {}", headline);
        }

        println!();
        println!(
            "  Municipalities:  {}",
            self.highlight(format!("{}/{}", progress.processed, progress.total))
        );
        println!("  Extracted:       {}", self.highlight(progress.extracted.to_string()));
        if progress.degraded > 0 {
            println!("  Degraded:        {}", progress.degraded);
        }
        if progress.skipped > 0 {
            println!("  Skipped:         {}", progress.skipped);
        }
        if progress.failed > 0 {
            println!("  Failed:          {}", progress.failed);
        }
        println!(
            "  Images:          {} ({})",
            self.highlight(progress.images_saved.to_string()),
            format_bytes(image_bytes(progress))
        );
        if progress.images_failed > 0 {
            println!("  Image failures:  {}", progress.images_failed);
        }
        if progress.collisions > 0 {
            println!("  Dir collisions:  {}", progress.collisions);
        }
        println!(
            "  Time taken:      {}",
            self.highlight(format_duration(progress.elapsed()))
        );

        self.print_separator();
    }

    fn print_json_summary(&self, progress: &BatchProgress) {
        let summary = serde_json::json!({
            "type": "summary",
            "total": progress.total,
            "processed": progress.processed,
            "extracted": progress.extracted,
            "degraded": progress.degraded,
            "failed": progress.failed,
            "skipped": progress.skipped,
            "images_saved": progress.images_saved,
            "images_failed": progress.images_failed,
            "image_bytes": image_bytes(progress),
            "collisions": progress.collisions,
            "cancelled": progress.cancelled,
            "duration_ms": progress.elapsed().as_millis(),
            "timestamp": chrono::Utc::now().to_rfc3339()
        });

        println!(
            "{}",
            serde_json::to_string_pretty(&summary).unwrap_or_else(|_| "{}".to_string())
        );
    }

    fn print_plain_summary(&self, progress: &BatchProgress) {
        if progress.cancelled {
            println!("CANCELLED: Municipality harvest");
        } else {
            println!("COMPLETED: Municipality harvest");
        }
        println!("Processed: {}/{}", progress.processed, progress.total);
        println!("Extracted: {}", progress.extracted);
        println!("Degraded: {}", progress.degraded);
        println!("Failed: {}", progress.failed);
        println!("Skipped: {}", progress.skipped);
        println!("Images: {}", progress.images_saved);
        println!("Duration: {:?}", progress.elapsed());
    }

    fn print_human_report(&self, report: &HarvestReport) {
        self.print_header("Harvest Report");

        println!("Source: {}", report.source);
        println!(
            "Harvested at: {}",
            report.harvest_time.format("%Y-%m-%d %H:%M UTC")
        );
        println!();

        let troubled: Vec<_> = report
            .entities
            .iter()
            .filter(|e| e.status.is_failure() || e.status.is_degraded())
            .collect();
        if !troubled.is_empty() {
            println!("Municipalities needing attention:");
            for entity in troubled {
                println!("  {} ({:?})", entity.name, entity.status);
            }
            println!();
        }

        if !report.errors.is_empty() {
            println!("Issues encountered:");
            for error in &report.errors {
                println!("  - {}", error);
            }
        }
    }

    fn print_plain_report(&self, report: &HarvestReport) {
        println!("REPORT: Harvest completed");
        println!("Source: {}", report.source);
        println!("Entities: {}", report.summary.total_entities);
        println!("Failed: {}", report.summary.failed);
        println!("Duration: {:?}", report.summary.duration);

        if !report.errors.is_empty() {
            println!("Errors: {}", report.errors.len());
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum MessageType {
    Success,
    Error,
    Info,
}

fn image_bytes(progress: &BatchProgress) -> u64 {
    progress
        .outcomes
        .iter()
        .flat_map(|o| o.images.iter())
        .map(|i| i.bytes)
        .sum()
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

pub(crate) fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs > 0 {
        format!("{}s", secs)
    } else {
        format!("{}ms", duration.as_millis())
    }
}
