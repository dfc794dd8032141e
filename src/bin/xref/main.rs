//! xref CLI tool
//!
//! Validates every markdown file below a directory and exits non-zero when the number of errors
//! exceeds a threshold. Meant for CI.
//!
//! Directories and non-markdown files are indexed as entities so links to them resolve. External
//! urls are checked unless web IO is disabled in the configuration. Validation waits for all
//! network work, but gives up after one minute.

use clap::Parser;
use std::{path::PathBuf, process::ExitCode, time::Duration};
use xref_core::{
    config::Config, pending::CancellationToken, report::ValidationReport,
    validator::MarkdownContextValidator, XrefError,
};

const VALIDATION_DEADLINE: Duration = Duration::from_secs(60);

#[derive(Parser)]
#[command(name = "xref")]
#[command(author, version, about = "Validate cross-references in a tree of markdown documents", long_about = None)]
struct Cli {
    /// Root directory of the documents (default: current directory)
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Configuration file path (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of errors tolerated before exiting with a failure code
    #[arg(short, long, default_value_t = 0)]
    threshold: usize,

    /// Count warnings as errors
    #[arg(long)]
    warnings_as_errors: bool,

    /// Skip checking external urls
    #[arg(long)]
    offline: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

fn print_report(report: &ValidationReport) {
    for (file, warnings) in report.warnings_by_file() {
        if file.is_empty() {
            println!("(context)");
        } else {
            println!("{file}");
        }
        for warning in warnings {
            let location = if warning.location.is_whole_file {
                String::new()
            } else {
                format!(
                    "{}:{} ",
                    warning.location.start_line + 1,
                    warning.location.start_column
                )
            };
            println!(
                "  {}{:?} {}: {}",
                location, warning.severity, warning.id, warning.message
            );
        }
    }
    println!(
        "\n{} errors, {} warnings, {} suggestions",
        report.error_count(),
        report.warning_count(),
        report.suggestion_count()
    );
}

fn run(cli: Cli) -> Result<ExitCode, XrefError> {
    let root = cli.path.canonicalize()?;
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    config.root_directory = root.clone();
    if cli.offline {
        config.web_io.enabled = false;
    }

    let validator = MarkdownContextValidator::new(config)?;
    validator.index_directory(&root)?;

    let cancellation = CancellationToken::with_timeout(VALIDATION_DEADLINE);
    let report = validator.validate_fully(Some(&cancellation));
    if !report.is_complete {
        eprintln!("Failed to validate within a minute, some external urls were not checked");
    }

    if cli.json {
        println!("{}", report.to_json()?);
    } else {
        print_report(&report);
    }

    let mut errors = report.error_count();
    if cli.warnings_as_errors {
        errors += report.warning_count();
    }
    if errors > cli.threshold {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
