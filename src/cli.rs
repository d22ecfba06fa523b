use crate::config::{CliOverrides, Config};
use crate::error::Result;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "obcine")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Harvest Slovenian municipality data from Wikipedia")]
#[command(
    long_about = "obcine reads the list of Slovenian municipalities from Wikipedia, stores it \
                  as a JSON snapshot, then visits every municipality page and saves the \
                  infobox flag/emblem row and images into one directory per municipality."
)]
#[command(after_help = "EXAMPLES:\n  \
    obcine\n  \
    obcine --stage discover --snapshot data/municipalities.json\n  \
    obcine --stage details --concurrency 4 --output content\n  \
    obcine --distinct Pokrajina\n  \
    obcine --generate-config --config obcine.toml")]
pub struct Cli {
    /// Index page listing the municipalities
    #[arg(long, value_parser = validate_index_url)]
    pub index_url: Option<String>,

    /// Which part of the pipeline to run
    #[arg(long, value_enum, default_value_t = Stage::All)]
    pub stage: Stage,

    /// Snapshot file written by discovery and read by the detail stage
    #[arg(long)]
    pub snapshot: Option<PathBuf>,

    /// Output root for per-municipality directories
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Configuration file path
    #[arg(short, long, help = "Path to TOML configuration file")]
    pub config: Option<PathBuf>,

    /// Number of municipalities processed at once
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..=32))]
    pub concurrency: Option<u16>,

    /// HTTP request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Print the distinct values of one attribute from the snapshot and exit
    #[arg(long, value_name = "ATTRIBUTE")]
    pub distinct: Option<String>,

    /// Output format for results
    #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
    pub output_format: OutputFormat,

    /// Verbose output level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress non-essential output)
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Show what would be done without touching the network
    #[arg(long)]
    pub dry_run: bool,

    /// Write a sample configuration file (to --config, or obcine.toml)
    #[arg(long)]
    pub generate_config: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Stage {
    /// Discover, then harvest details
    All,
    /// Index page to snapshot only
    Discover,
    /// Snapshot to output tree only
    Details,
}

impl Stage {
    pub fn runs_discovery(&self) -> bool {
        matches!(self, Stage::All | Stage::Discover)
    }

    pub fn runs_details(&self) -> bool {
        matches!(self, Stage::All | Stage::Details)
    }
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable colored output
    Human,
    /// JSON formatted output
    Json,
    /// Plain text output
    Plain,
}

impl Cli {
    pub fn load_config(&self) -> Result<Config> {
        let mut config = Config::load_with_defaults(self.config.as_ref())?;

        let overrides = self.create_cli_overrides();
        config.merge_with_cli_args(&overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn create_cli_overrides(&self) -> CliOverrides {
        CliOverrides::new()
            .with_index_url(self.index_url.clone())
            .with_output_dir(self.output.clone())
            .with_snapshot_file(self.snapshot.clone())
            .with_concurrency(self.concurrency.map(usize::from))
            .with_timeout(self.timeout)
    }

    pub fn verbosity_level(&self) -> u8 {
        if self.quiet {
            0
        } else {
            self.verbose
        }
    }
}

pub fn validate_index_url(s: &str) -> std::result::Result<String, String> {
    let url = Url::parse(s).map_err(|_| "Invalid URL format. Please provide a valid URL.".to_string())?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(format!("Unsupported URL scheme '{}'; use http or https", other)),
    }

    if url.host_str().is_none() {
        return Err("URL must include a valid hostname".to_string());
    }

    Ok(s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["obcine"]).unwrap();
        assert_eq!(cli.stage, Stage::All);
        assert!(cli.stage.runs_discovery());
        assert!(cli.stage.runs_details());
        assert!(cli.index_url.is_none());
        assert_eq!(cli.verbosity_level(), 0);
    }

    #[test]
    fn test_stage_and_overrides() {
        let cli = Cli::try_parse_from([
            "obcine",
            "--stage",
            "details",
            "--snapshot",
            "data.json",
            "--concurrency",
            "4",
            "--timeout",
            "10",
            "-o",
            "out",
        ])
        .unwrap();

        assert!(!cli.stage.runs_discovery());
        let overrides = cli.create_cli_overrides();
        assert_eq!(overrides.snapshot_file, Some(PathBuf::from("data.json")));
        assert_eq!(overrides.concurrency, Some(4));
        assert_eq!(overrides.timeout, Some(10));
        assert_eq!(overrides.output_dir, Some(PathBuf::from("out")));
    }

    #[test]
    fn test_concurrency_bounds() {
        assert!(Cli::try_parse_from(["obcine", "--concurrency", "0"]).is_err());
        assert!(Cli::try_parse_from(["obcine", "--concurrency", "33"]).is_err());
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["obcine", "-q", "-v"]).is_err());
    }

    #[test]
    fn test_index_url_validation() {
        assert!(validate_index_url("https://sl.wikipedia.org/wiki/Seznam").is_ok());
        assert!(validate_index_url("http://127.0.0.1:8080/list").is_ok());
        assert!(validate_index_url("ftp://example.org/list").is_err());
        assert!(validate_index_url("not-a-url").is_err());
    }
}
