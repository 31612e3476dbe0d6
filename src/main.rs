//! polish-epub - EPUB archive normalizer

use std::fs;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use polish_epub::config::{DEFAULT_JPEG_QUALITY, DEFAULT_MAX_DIMENSION, DEFAULT_MAX_IMAGE_BYTES, DEFAULT_SERIES};
use polish_epub::{PolishConfig, Polisher, Report};

#[derive(Parser)]
#[command(name = "polish-epub")]
#[command(version, about = "Normalize a generated EPUB into a compliant archive", long_about = None)]
#[command(after_help = "EXAMPLES:
    polish-epub                             Polish book.epub in place
    polish-epub draft.epub book.epub        Write the polished copy to book.epub
    polish-epub book.epub --series-position 3 --json")]
struct Cli {
    /// Input EPUB
    #[arg(value_name = "INPUT", default_value = "book.epub")]
    input: String,

    /// Output EPUB (defaults to overwriting INPUT)
    #[arg(value_name = "OUTPUT")]
    output: Option<String>,

    /// Series the book belongs to (empty to declare none)
    #[arg(long, default_value = DEFAULT_SERIES)]
    series: String,

    /// Position of the book within the series
    #[arg(long, value_name = "N")]
    series_position: Option<u32>,

    /// Stylesheet to install instead of the built-in one
    #[arg(long, value_name = "FILE")]
    stylesheet: Option<String>,

    /// Recompress images larger than this many bytes
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_MAX_IMAGE_BYTES)]
    max_image_bytes: usize,

    /// Longest side of recompressed images, in pixels
    #[arg(long, value_name = "PX", default_value_t = DEFAULT_MAX_DIMENSION)]
    max_dimension: u32,

    /// JPEG quality of recompressed images
    #[arg(long, value_name = "1-100", default_value_t = DEFAULT_JPEG_QUALITY,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    jpeg_quality: u8,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Only log warnings
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    fn output(&self) -> &str {
        self.output.as_deref().unwrap_or(&self.input)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.quiet);

    match run(&cli) {
        Ok(report) => {
            if cli.json {
                match serde_json::to_string_pretty(&report) {
                    Ok(json) => println!("{json}"),
                    Err(e) => {
                        eprintln!("error: {e}");
                        return ExitCode::FAILURE;
                    }
                }
            } else if !cli.quiet {
                print_summary(&cli, &report);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(quiet: bool) {
    let default = if quiet { "warn" } else { "polish_epub=info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run(cli: &Cli) -> Result<Report, String> {
    let stylesheet = match &cli.stylesheet {
        Some(path) => Some(fs::read_to_string(path).map_err(|e| format!("{path}: {e}"))?),
        None => None,
    };

    let config = PolishConfig {
        stylesheet,
        series: (!cli.series.is_empty()).then(|| cli.series.clone()),
        series_position: cli.series_position,
        max_image_bytes: cli.max_image_bytes,
        max_dimension: cli.max_dimension,
        jpeg_quality: cli.jpeg_quality,
    };

    Polisher::new()
        .with_config(config)
        .polish_file(&cli.input, cli.output())
        .map_err(|e| e.to_string())
}

fn print_summary(cli: &Cli, report: &Report) {
    println!("Polished: {}", cli.output());
    println!("Title: {}", report.title);
    if let Some(start) = &report.start_reading {
        println!("Start reading: {start}");
    }
    println!("Renamed: {}", report.renamed.len());
    println!("Recompressed: {}", report.recompressed.len());
    if !report.warnings.is_empty() {
        println!("Warnings: {}", report.warnings.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["polish-epub"]).unwrap();
        assert_eq!(cli.input, "book.epub");
        assert_eq!(cli.output(), "book.epub");
        assert_eq!(cli.series, DEFAULT_SERIES);
        assert_eq!(cli.max_image_bytes, DEFAULT_MAX_IMAGE_BYTES);
    }

    #[test]
    fn test_output_defaults_to_input() {
        let cli = Cli::try_parse_from(["polish-epub", "draft.epub"]).unwrap();
        assert_eq!(cli.output(), "draft.epub");

        let cli = Cli::try_parse_from(["polish-epub", "draft.epub", "final.epub"]).unwrap();
        assert_eq!(cli.output(), "final.epub");
    }

    #[test]
    fn test_jpeg_quality_range() {
        assert!(Cli::try_parse_from(["polish-epub", "--jpeg-quality", "0"]).is_err());
        let cli = Cli::try_parse_from(["polish-epub", "--jpeg-quality", "90"]).unwrap();
        assert_eq!(cli.jpeg_quality, 90);
    }
}
