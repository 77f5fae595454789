use clap::Parser;
use rayon::prelude::*;
use stegascan::{AnalysisReport, DetectorConfig, analyze_with};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "stegascan",
    version = "0.1.0",
    about = "Detect hidden data in raster images"
)]
struct Args {
    /// Path to the image(s) to analyse
    #[arg(short, long, required = true, num_args = 1..)]
    file: Vec<PathBuf>,

    /// JSON file overriding thresholds and voting policy
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the JSON report here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => DetectorConfig::from_path(path)?,
        None => DetectorConfig::default(),
    };

    let results: Vec<_> = args
        .file
        .par_iter()
        .map(|path| (path, analyze_with(path, &config)))
        .collect();

    let mut reports: Vec<AnalysisReport> = Vec::with_capacity(results.len());
    let mut failures = 0;
    for (path, result) in results {
        match result {
            Ok(report) => {
                if args.verbose {
                    log::info!(
                        "\nScanned file Details: Path: {:?}, Size: {} bytes, Type: {:?}, Verdict: {}",
                        path,
                        report.file_size,
                        report.mime_type,
                        report.conclusion,
                    );
                }
                reports.push(report);
            }
            Err(e) => {
                eprintln!("{}: {e}", path.display());
                failures += 1;
            }
        }
    }

    let json = match reports.as_slice() {
        [report] => serde_json::to_string_pretty(report)?,
        _ => serde_json::to_string_pretty(&reports)?,
    };
    match &args.output {
        Some(path) => std::fs::write(path, json)?,
        None => println!("{json}"),
    }

    if failures > 0 {
        return Err(format!("{failures} file(s) could not be analysed").into());
    }
    Ok(())
}
