//! Command-line interface for PIE.

use crate::coordinator::{DEFAULT_MAX_PAGES, DEFAULT_OUTPUT_DIR, RunConfig};
use crate::error::{Error, Result};
use crate::metadata::DEFAULT_METADATA_FILE;
use crate::terminal::parse_size;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Application version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name.
pub const NAME: &str = "pie";

#[derive(Debug, Parser)]
#[command(name = NAME)]
#[command(about = "PDF Image Extractor - pull embedded images out of PDF collections")]
#[command(version = VERSION)]
pub struct Cli {
    /// Show debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Extract images from every PDF under a directory
    Extract(ExtractArgs),

    /// Show the recorded metadata of extracted images
    Info(InfoArgs),
}

#[derive(Debug, Clone, Args)]
pub struct ExtractArgs {
    /// Directory searched recursively for PDF files
    pub source: PathBuf,

    /// Directory extracted images are written to
    #[arg(short, long, env = "PIE_OUTPUT_DIR", default_value = DEFAULT_OUTPUT_DIR)]
    pub output_dir: PathBuf,

    /// Minimum image size to keep, in bytes or with a K/M suffix
    #[arg(short = 's', long, value_parser = parse_size, default_value = "1000K")]
    pub min_size: u64,

    /// Skip documents with more pages than this
    #[arg(
        short = 'p',
        long,
        default_value_t = DEFAULT_MAX_PAGES,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub max_pages: u32,

    /// Number of worker threads (default: CPU cores, at most 4)
    #[arg(short, long, env = "PIE_JOBS", value_parser = parse_jobs)]
    pub jobs: Option<usize>,

    /// Metadata index file
    #[arg(short, long, env = "PIE_METADATA", default_value = DEFAULT_METADATA_FILE)]
    pub metadata: PathBuf,
}

impl ExtractArgs {
    /// The run these arguments describe.
    pub fn run_config(&self) -> RunConfig {
        let config = RunConfig::new(&self.source)
            .with_output_dir(&self.output_dir)
            .with_metadata_path(&self.metadata)
            .with_min_size(self.min_size)
            .with_max_pages(self.max_pages);
        match self.jobs {
            Some(jobs) => config.with_jobs(jobs),
            None => config,
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct InfoArgs {
    /// Image ids or paths of extracted images
    #[arg(required = true)]
    pub images: Vec<String>,

    /// Metadata index file
    #[arg(short, long, env = "PIE_METADATA", default_value = DEFAULT_METADATA_FILE)]
    pub metadata: PathBuf,
}

/// Parse a jobs value (positive integer).
fn parse_jobs(value: &str) -> Result<usize> {
    let invalid = |reason: String| Error::InvalidArgument {
        argument: String::from("--jobs"),
        reason,
    };
    match value.parse::<usize>() {
        Ok(0) => Err(invalid(String::from("Number of jobs must be at least 1"))),
        Ok(n) => Ok(n),
        Err(_) => Err(invalid(format!("'{}' is not a valid number", value))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use clap::error::ErrorKind;

    fn extract(args: &[&str]) -> ExtractArgs {
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Command::Extract(args) => args,
            other => panic!("expected extract, got {:?}", other),
        }
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_extract_defaults() {
        let args = extract(&["pie", "extract", "docs/"]);
        assert_eq!(args.source, PathBuf::from("docs/"));
        assert_eq!(args.min_size, 1_024_000);
        assert_eq!(args.max_pages, 50);

        let config = args.run_config();
        assert_eq!(config.min_size_bytes, RunConfig::default().min_size_bytes);
        assert_eq!(config.max_pages, RunConfig::default().max_pages);
    }

    #[test]
    fn test_parse_extract_options() {
        let args = extract(&[
            "pie", "extract", "docs", "-o", "/out", "-s", "10000", "-p", "7", "-j", "2", "-m",
            "/meta.json",
        ]);
        let config = args.run_config();
        assert_eq!(config.output_dir, PathBuf::from("/out"));
        assert_eq!(config.min_size_bytes, 10_000);
        assert_eq!(config.max_pages, 7);
        assert_eq!(config.jobs, Some(2));
        assert_eq!(config.metadata_path, PathBuf::from("/meta.json"));
    }

    #[test]
    fn test_parse_size_suffix() {
        let args = extract(&["pie", "extract", "docs", "--min-size", "2M"]);
        assert_eq!(args.min_size, 2 * 1024 * 1024);
    }

    #[test]
    fn test_parse_invalid_size() {
        let result = Cli::try_parse_from(["pie", "extract", "docs", "-s", "lots"]);
        assert_eq!(result.unwrap_err().kind(), ErrorKind::ValueValidation);
    }

    #[test]
    fn test_parse_jobs_zero() {
        let result = Cli::try_parse_from(["pie", "extract", "docs", "-j", "0"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_max_pages_zero() {
        let result = Cli::try_parse_from(["pie", "extract", "docs", "-p", "0"]);
        assert_eq!(result.unwrap_err().kind(), ErrorKind::ValueValidation);
        assert_eq!(extract(&["pie", "extract", "docs", "-p", "1"]).max_pages, 1);
    }

    #[test]
    fn test_parse_jobs_invalid() {
        assert!(parse_jobs("abc").is_err());
        assert!(parse_jobs("0").is_err());
        assert_eq!(parse_jobs("8").unwrap(), 8);
    }

    #[test]
    fn test_parse_info() {
        let cli = Cli::try_parse_from(["pie", "info", "abc", "out/def.png", "-m", "m.json"]).unwrap();
        match cli.command {
            Command::Info(args) => {
                assert_eq!(args.images, vec!["abc", "out/def.png"]);
                assert_eq!(args.metadata, PathBuf::from("m.json"));
            }
            other => panic!("expected info, got {:?}", other),
        }
    }

    #[test]
    fn test_info_requires_images() {
        assert!(Cli::try_parse_from(["pie", "info"]).is_err());
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::try_parse_from(["pie", "extract", "docs", "-v"]).unwrap();
        assert!(cli.verbose);
        let cli = Cli::try_parse_from(["pie", "-q", "extract", "docs"]).unwrap();
        assert!(cli.quiet);
    }

    #[test]
    fn test_quiet_and_verbose_conflict() {
        let result = Cli::try_parse_from(["pie", "-q", "-v", "extract", "docs"]);
        assert_eq!(result.unwrap_err().kind(), ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_missing_subcommand() {
        assert!(Cli::try_parse_from(["pie"]).is_err());
    }

    #[test]
    fn test_help_and_version() {
        let help = Cli::try_parse_from(["pie", "--help"]).unwrap_err();
        assert_eq!(help.kind(), ErrorKind::DisplayHelp);
        let version = Cli::try_parse_from(["pie", "--version"]).unwrap_err();
        assert_eq!(version.kind(), ErrorKind::DisplayVersion);
    }
}
