//! PIE - PDF Image Extractor
//!
//! Pulls embedded images out of a directory of PDFs and keeps a JSON index
//! describing where each one came from.

use clap::Parser;
use pie::cli::{Cli, Command, ExtractArgs, InfoArgs};
use pie::coordinator::Coordinator;
use pie::metadata::{ImageRecord, MetadataIndex};
use pie::terminal::{
    ProgressBar, Styled, format_size, print_error, print_info, print_success, print_summary,
    print_warning, stdout_supports_color,
};
use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// How often the progress bar is redrawn.
const PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Extract(ref args) => extract(args, cli.quiet),
        Command::Info(ref args) => info(args),
    }
}

/// Log to stderr. `RUST_LOG` wins; otherwise `-v` shows debug output and the
/// default is warnings only.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "pie=debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(filter)
        .init();
}

fn extract(args: &ExtractArgs, quiet: bool) -> ExitCode {
    let config = args.run_config();
    if !quiet {
        print_info(&format!(
            "Extracting from {} with {} worker(s)",
            config.source_dir.display(),
            config.effective_jobs()
        ));
    }

    let coordinator = Coordinator::new(config);
    let mut bar = ProgressBar::new();
    let show_bar = !quiet && bar.is_enabled();
    let watcher = show_bar.then(|| {
        coordinator
            .progress()
            .watch(PROGRESS_INTERVAL, move |snapshot| bar.update(snapshot))
    });

    let result = coordinator.run();

    if let Some(watcher) = watcher {
        watcher.stop();
        println!();
    }

    match result {
        Ok(report) => {
            if !quiet {
                if report.progress.total_files == 0 {
                    print_warning("No PDF files found");
                } else {
                    print_success(&format!(
                        "Index saved to {}",
                        coordinator.config().metadata_path.display()
                    ));
                }
            }
            print_summary(&report, quiet);
            ExitCode::SUCCESS
        }
        Err(e) => {
            print_error(&e.to_string());
            ExitCode::from(1)
        }
    }
}

fn info(args: &InfoArgs) -> ExitCode {
    let index = MetadataIndex::load(&args.metadata);
    let mut missing = 0;

    for query in &args.images {
        let found = index
            .get(query)
            .map(|record| (query.as_str(), record))
            .or_else(|| index.get_by_image_path(Path::new(query)));

        match found {
            Some((id, record)) => print_record(id, record),
            None => {
                print_error(&format!("No record for '{}' in {}", query, args.metadata.display()));
                missing += 1;
            }
        }
    }

    if missing > 0 {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}

fn print_record(id: &str, record: &ImageRecord) {
    let color = stdout_supports_color();
    println!("{}", Styled::with_color_support(id, color).bold());
    println!("  Source:    {}", record.pdf_path.display());
    println!("  File name: {}", record.file_name);
    println!("  Page:      {}", record.page_number);
    println!("  Index:     {}", record.image_index);
    println!("  Type:      {}", record.image_type);
    println!("  Size:      {}", format_size(record.size_bytes));
    println!("  Path:      {}", record.path.display());
    println!("  Extracted: {}", record.extraction_date);
}
