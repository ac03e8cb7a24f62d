use std::error::Error;
use std::path::PathBuf;
use std::process;

use alert_report::{load_summary, ReportConfig, ReportError, ReportGenerator};
use clap::error::ErrorKind;
use clap::Parser;
use log::info;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "Usage: alert-report <input_json> <output_pdf>";

/// Generates a PDF security report from a JSON alert summary.
///
/// Charts are written to a `charts` directory next to the output PDF.
#[derive(Parser)]
#[command(author, version, about = "Generate a PDF report from an alert summary")]
struct Cli {
    /// Path to the JSON alert summary.
    input: PathBuf,
    /// Path of the PDF to write.
    output: PathBuf,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                let _ = err.print();
                process::exit(0);
            }
            _ => {
                eprintln!("{}", err);
                eprintln!("{}", USAGE);
                process::exit(1);
            }
        },
    };

    init_logging();

    if let Err(err) = run(&cli) {
        eprintln!("Error: {}", err);
        print_error_sources(&err);
        process::exit(1);
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> Result<(), ReportError> {
    info!("Reading alert summary from {}", cli.input.display());
    let summary = load_summary(&cli.input)?;
    let outcome = ReportGenerator::new(ReportConfig::default()).generate(&summary, &cli.output)?;
    println!(
        "Generated {} ({} bytes)",
        outcome.pdf_path.display(),
        outcome.bytes
    );
    Ok(())
}

fn print_error_sources(mut error: &(dyn Error + 'static)) {
    while let Some(source) = error.source() {
        eprintln!("  caused by: {}", source);
        error = source;
    }
}
