use camino::Utf8PathBuf as PathBuf;
use clap::Parser;
use eyre::{Context, Result};
use harvest_core::{
    processing::ImageDownloader,
    scrape::{run_session, WebDriverPage},
};
use tracing::info;

#[derive(Parser)]
#[command(version, about = "Download and crop every thumbnail of a video playlist", long_about = None)]
struct Cli {
    #[arg(short, long)]
    config: Option<String>,
    /// Playlist URL, overrides the config file
    #[arg(long)]
    url: Option<String>,
    #[arg(short, long)]
    output_dir: Option<String>,
    /// WebDriver endpoint (chromedriver, geckodriver, ...)
    #[arg(long)]
    webdriver: Option<String>,
    #[arg(long)]
    headless: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    harvest::telemetry::init()?;

    let mut config = harvest::load_config(args.config.as_deref()).await?.scrape;
    if let Some(url) = args.url {
        config.playlist_url = url;
    }
    if let Some(output_dir) = args.output_dir {
        config.output_dir = PathBuf::from(output_dir);
    }
    if let Some(webdriver) = args.webdriver {
        config.webdriver_url = webdriver;
    }
    if args.headless {
        config.headless = true;
    }

    let downloader =
        ImageDownloader::new(&config.download).wrap_err("could not build HTTP client")?;
    info!("Connecting to WebDriver at {}", config.webdriver_url);
    let page = WebDriverPage::connect(&config.webdriver_url, config.browser, config.headless).await?;
    let summary = run_session(&page, &downloader, &config)
        .await
        .wrap_err("scrape failed")?;
    println!(
        "Scraping complete. Downloaded {} thumbnails to '{}'.",
        summary.downloaded(),
        config.output_dir
    );
    if summary.crop_failed() > 0 || summary.skipped() > 0 {
        println!(
            "{} could not be cropped, {} skipped.",
            summary.crop_failed(),
            summary.skipped()
        );
    }
    Ok(())
}
