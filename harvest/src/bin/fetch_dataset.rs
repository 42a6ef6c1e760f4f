use camino::Utf8PathBuf as PathBuf;
use clap::Parser;
use eyre::{Context, Result};
use harvest_core::dataset::fetch_dataset;

#[derive(Parser)]
#[command(version, about = "Save the first valid lines of a remote NDJSON file", long_about = None)]
struct Cli {
    #[arg(short, long)]
    config: Option<String>,
    /// Source URL, overrides the config file
    #[arg(long)]
    url: Option<String>,
    #[arg(short, long)]
    output: Option<String>,
    #[arg(long)]
    max_lines: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    harvest::telemetry::init()?;

    let mut config = harvest::load_config(args.config.as_deref()).await?.dataset;
    if let Some(url) = args.url {
        config.source_url = url;
    }
    if let Some(output) = args.output {
        config.output_path = PathBuf::from(output);
    }
    if let Some(max_lines) = args.max_lines {
        config.max_lines = max_lines;
    }

    let summary = fetch_dataset(&config)
        .await
        .wrap_err("dataset download failed")?;
    println!(
        "Success! Saved {} lines to '{}'.",
        summary.stats.lines_saved, summary.output_path
    );
    Ok(())
}
