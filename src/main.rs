use clap::Parser;
use obcine::{Cli, HarvestError, Harvester, OutputFormatter, RunSummary, UserFriendlyError};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    let exit_code = run().await;
    process::exit(exit_code);
}

async fn run() -> i32 {
    let cli = Cli::parse();
    setup_logging(&cli);

    if cli.generate_config {
        return handle_generate_config(&cli);
    }

    let harvester = match Harvester::from_cli(&cli) {
        Ok(harvester) => harvester,
        Err(e) => {
            print_startup_error(&cli, &e);
            return exit_code_for(&e);
        }
    };

    if let Some(ref attribute) = cli.distinct {
        return handle_distinct(&harvester, attribute);
    }

    if cli.dry_run {
        return handle_dry_run(&cli, &harvester);
    }

    match harvester.run(cli.stage).await {
        Ok(summary) => {
            if let Some(ref report) = summary.report {
                if cli.verbosity_level() > 0 {
                    harvester.output_formatter().print_harvest_report(report);
                }
            }

            completed_exit_code(&summary)
        }
        Err(e) => {
            tracing::error!(error = %e, "Harvest aborted");
            harvester.handle_error(&e);
            exit_code_for(&e)
        }
    }
}

/// A finished batch exits 0; per-entity failures live in the report and logs.
fn completed_exit_code(summary: &RunSummary) -> i32 {
    if summary.has_failures() {
        tracing::warn!("Some municipalities failed; see the harvest report for details");
    }
    0
}

fn exit_code_for(error: &HarvestError) -> i32 {
    match error {
        HarvestError::Cancelled => 130,
        HarvestError::Fetch { .. } | HarvestError::HttpStatus { .. } => 3,
        HarvestError::Parse { .. } => 4,
        HarvestError::Snapshot { .. } => 5,
        _ => 1,
    }
}

fn handle_generate_config(cli: &Cli) -> i32 {
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from("obcine.toml"));

    match Harvester::generate_sample_config(&config_path) {
        Ok(()) => {
            println!(
                "Generated sample configuration file: {}",
                config_path.display()
            );
            println!("\nTo use this configuration:");
            println!("  obcine --config {}", config_path.display());
            0
        }
        Err(e) => {
            eprintln!(
                "Failed to generate configuration file: {}",
                e.user_message()
            );
            if let Some(suggestion) = e.suggestion() {
                eprintln!("Suggestion: {}", suggestion);
            }
            1
        }
    }
}

fn handle_distinct(harvester: &Harvester, attribute: &str) -> i32 {
    match harvester.distinct(attribute) {
        Ok(values) => {
            harvester
                .output_formatter()
                .print_distinct_values(attribute, &values);
            0
        }
        Err(e) => {
            harvester.handle_error(&e);
            exit_code_for(&e)
        }
    }
}

fn handle_dry_run(cli: &Cli, harvester: &Harvester) -> i32 {
    let formatter = harvester.output_formatter();

    formatter.info("DRY RUN MODE - nothing will be fetched or written");
    formatter.print_separator();

    let config = harvester.config();
    formatter.info("Configuration that would be used:");
    println!("  Index URL: {}", config.source.index_url);
    println!("  Snapshot: {}", config.output.snapshot_file.display());
    println!("  Output root: {}", config.output.base_directory.display());
    println!("  Concurrency: {}", config.batch.concurrency);
    println!("  Timeout: {} seconds", config.source.timeout);

    formatter.print_separator();
    formatter.info(&format!("Plan for stage {:?}:", cli.stage));
    for (i, step) in harvester.plan(cli.stage).iter().enumerate() {
        println!("  {}. {}", i + 1, step);
    }

    formatter.print_separator();
    formatter.success("Dry run completed successfully");
    0
}

fn print_startup_error(cli: &Cli, error: &HarvestError) {
    let formatter = OutputFormatter::new(
        obcine::output_mode_for(&cli.output_format),
        0,
        false,
    );
    formatter.print_user_friendly_error(error);
}

/// `RUST_LOG` wins; otherwise `-v` raises the crate's level.
fn setup_logging(cli: &Cli) {
    let default_filter = if cli.quiet {
        "obcine=error"
    } else {
        match cli.verbose {
            0 => "obcine=warn",
            1 => "obcine=info",
            2 => "obcine=debug",
            _ => "obcine=trace,reqwest=debug",
        }
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init();
}
