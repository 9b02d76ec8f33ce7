use std::fs;
use std::path::PathBuf;

use anyhow::{ensure, Context, Result};
use clap::Parser;

use freshscan::{Config, RequestPipeline, Upload};

/// Classify one produce photo and print the response envelope. Stands in for
/// the HTTP upload boundary, which hands the pipeline the same thing: a
/// filename and the raw bytes.
#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Image file to classify.
    input: PathBuf,

    #[command(flatten)]
    config: Config,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    ensure!(cli.input.exists(), "input file does not exist");

    let filename = cli
        .input
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default()
        .to_string();
    let bytes = fs::read(&cli.input)
        .with_context(|| format!("failed to read input: {}", cli.input.display()))?;

    let pipeline = RequestPipeline::new(cli.config)?;
    let envelope = pipeline.handle(&Upload { filename, bytes });

    println!("{}", serde_json::to_string_pretty(&envelope)?);
    Ok(())
}
