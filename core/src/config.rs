use std::time::Duration;

use camino::{Utf8Path as Path, Utf8PathBuf as PathBuf};
use eyre::{bail, eyre, Context, Result};
use serde::Deserialize;

use crate::processing::crop::AspectRatio;

const DEFAULT_DATA_URL: &str =
    "https://storage.googleapis.com/quickdraw_dataset/full/simplified/flower.ndjson";
const DEFAULT_DATA_OUTPUT: &str = "flower_data_local.ndjson";
const DEFAULT_MAX_LINES: usize = 500;

const DEFAULT_PLAYLIST_URL: &str =
    "https://www.youtube.com/playlist?list=PL3-sRm8xAzY9gpXTMGVHJWy_FMD67NBed";
const DEFAULT_THUMBNAIL_SELECTOR: &str = "ytd-playlist-video-renderer ytd-thumbnail img";
const DEFAULT_ROW_SELECTOR: &str = "ytd-playlist-video-renderer";
const DEFAULT_OUTPUT_DIR: &str = "youtube_thumbnails";
const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:4444";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlDataset {
    url: Option<String>,
    output: Option<String>,
    max_lines: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlScroll {
    pause_ms: Option<u64>,
    stall_threshold: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlAttribute {
    name: Option<String>,
    attempts: Option<u32>,
    interval_ms: Option<u64>,
    placeholder_prefix: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlDownload {
    timeout_ms: Option<u64>,
    chunk_size: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlNetworkIdle {
    idle_ms: Option<u64>,
    poll_ms: Option<u64>,
    timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlScrape {
    playlist_url: Option<String>,
    thumbnail_selector: Option<String>,
    row_selector: Option<String>,
    output_dir: Option<String>,
    webdriver_url: Option<String>,
    browser: Option<Browser>,
    headless: Option<bool>,
    aspect_ratio: Option<String>,
    #[serde(rename = "Scroll")]
    scroll: Option<TomlScroll>,
    #[serde(rename = "Attribute")]
    attribute: Option<TomlAttribute>,
    #[serde(rename = "Download")]
    download: Option<TomlDownload>,
    #[serde(rename = "NetworkIdle")]
    network_idle: Option<TomlNetworkIdle>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlConfig {
    #[serde(rename = "Dataset")]
    dataset: Option<TomlDataset>,
    #[serde(rename = "Scrape")]
    scrape: Option<TomlScrape>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chrome,
    Firefox,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetConfig {
    pub source_url: String,
    pub output_path: PathBuf,
    /// Ceiling on the number of valid lines written
    pub max_lines: usize,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        DatasetConfig {
            source_url: DEFAULT_DATA_URL.to_owned(),
            output_path: DEFAULT_DATA_OUTPUT.into(),
            max_lines: DEFAULT_MAX_LINES,
        }
    }
}

/// Scroll-until-stable heuristic: stop after `stall_threshold` consecutive scrolls
/// that did not grow the row count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrollSettings {
    pub pause: Duration,
    pub stall_threshold: u32,
}

impl Default for ScrollSettings {
    fn default() -> Self {
        ScrollSettings {
            pause: Duration::from_secs(2),
            stall_threshold: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributePolling {
    pub name: String,
    pub attempts: u32,
    pub interval: Duration,
    /// Values starting with this are lazy-load stand-ins, not real URLs
    pub placeholder_prefix: String,
}

impl Default for AttributePolling {
    fn default() -> Self {
        AttributePolling {
            name: "src".to_owned(),
            attempts: 5,
            interval: Duration::from_secs(1),
            placeholder_prefix: "data:".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSettings {
    pub timeout: Duration,
    /// Largest single write to the destination file
    pub chunk_size: usize,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        DownloadSettings {
            timeout: Duration::from_secs(10),
            chunk_size: 8192,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkIdle {
    /// How long the resource count must stay unchanged
    pub idle_window: Duration,
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for NetworkIdle {
    fn default() -> Self {
        NetworkIdle {
            idle_window: Duration::from_millis(500),
            poll_interval: Duration::from_millis(100),
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeConfig {
    pub playlist_url: String,
    pub thumbnail_selector: String,
    pub row_selector: String,
    pub output_dir: PathBuf,
    pub webdriver_url: String,
    pub browser: Browser,
    pub headless: bool,
    pub aspect_ratio: AspectRatio,
    pub scroll: ScrollSettings,
    pub attribute: AttributePolling,
    pub download: DownloadSettings,
    pub network_idle: NetworkIdle,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        ScrapeConfig {
            playlist_url: DEFAULT_PLAYLIST_URL.to_owned(),
            thumbnail_selector: DEFAULT_THUMBNAIL_SELECTOR.to_owned(),
            row_selector: DEFAULT_ROW_SELECTOR.to_owned(),
            output_dir: DEFAULT_OUTPUT_DIR.into(),
            webdriver_url: DEFAULT_WEBDRIVER_URL.to_owned(),
            browser: Browser::default(),
            headless: false,
            aspect_ratio: AspectRatio::WIDESCREEN,
            scroll: ScrollSettings::default(),
            attribute: AttributePolling::default(),
            download: DownloadSettings::default(),
            network_idle: NetworkIdle::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub dataset: DatasetConfig,
    pub scrape: ScrapeConfig,
}

pub async fn read_config(path: &Path) -> Result<Config> {
    let toml_str = tokio::fs::read_to_string(path)
        .await
        .context(format!("Error reading config file {}", path))?;
    // relative paths in the config file are relative to its directory
    let config_dir = path.parent().unwrap_or(Path::new("."));
    parse_config(&toml_str, config_dir)
}

pub fn parse_config(toml_str: &str, config_dir: &Path) -> Result<Config> {
    let toml_config: TomlConfig = toml::from_str(toml_str).context("Error parsing config file")?;
    let dataset = match toml_config.dataset {
        None => DatasetConfig::default(),
        Some(toml_dataset) => dataset_config(toml_dataset, config_dir),
    };
    let scrape = match toml_config.scrape {
        None => ScrapeConfig::default(),
        Some(toml_scrape) => scrape_config(toml_scrape, config_dir)?,
    };
    Ok(Config { dataset, scrape })
}

fn dataset_config(toml_value: TomlDataset, config_dir: &Path) -> DatasetConfig {
    let defaults = DatasetConfig::default();
    DatasetConfig {
        source_url: toml_value.url.unwrap_or(defaults.source_url),
        output_path: toml_value
            .output
            .map(|output| resolve(config_dir, &output))
            .unwrap_or(defaults.output_path),
        max_lines: toml_value.max_lines.unwrap_or(defaults.max_lines),
    }
}

fn scrape_config(toml_value: TomlScrape, config_dir: &Path) -> Result<ScrapeConfig> {
    let defaults = ScrapeConfig::default();
    let aspect_ratio = toml_value
        .aspect_ratio
        .map(|s| s.parse::<AspectRatio>())
        .transpose()?
        .unwrap_or(defaults.aspect_ratio);
    let scroll = toml_value
        .scroll
        .map(|toml_scroll| ScrollSettings {
            pause: toml_scroll
                .pause_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.scroll.pause),
            stall_threshold: toml_scroll
                .stall_threshold
                .unwrap_or(defaults.scroll.stall_threshold),
        })
        .unwrap_or(defaults.scroll);
    let attribute = match toml_value.attribute {
        None => defaults.attribute,
        Some(toml_attribute) => {
            let fallback = AttributePolling::default();
            AttributePolling {
                name: toml_attribute.name.unwrap_or(fallback.name),
                attempts: toml_attribute.attempts.unwrap_or(fallback.attempts),
                interval: toml_attribute
                    .interval_ms
                    .map(Duration::from_millis)
                    .unwrap_or(fallback.interval),
                placeholder_prefix: toml_attribute
                    .placeholder_prefix
                    .unwrap_or(fallback.placeholder_prefix),
            }
        }
    };
    let download = toml_value
        .download
        .map(|toml_download| DownloadSettings {
            timeout: toml_download
                .timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.download.timeout),
            chunk_size: toml_download
                .chunk_size
                .unwrap_or(defaults.download.chunk_size),
        })
        .unwrap_or(defaults.download.clone());
    if download.chunk_size == 0 {
        bail!("Download chunk_size must be greater than zero");
    }
    let network_idle = toml_value
        .network_idle
        .map(|toml_idle| NetworkIdle {
            idle_window: toml_idle
                .idle_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.network_idle.idle_window),
            poll_interval: toml_idle
                .poll_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.network_idle.poll_interval),
            timeout: toml_idle
                .timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.network_idle.timeout),
        })
        .unwrap_or(defaults.network_idle.clone());
    Ok(ScrapeConfig {
        playlist_url: toml_value.playlist_url.unwrap_or(defaults.playlist_url),
        thumbnail_selector: toml_value
            .thumbnail_selector
            .unwrap_or(defaults.thumbnail_selector),
        row_selector: toml_value.row_selector.unwrap_or(defaults.row_selector),
        output_dir: toml_value
            .output_dir
            .map(|dir| resolve(config_dir, &dir))
            .unwrap_or(defaults.output_dir),
        webdriver_url: toml_value.webdriver_url.unwrap_or(defaults.webdriver_url),
        browser: toml_value.browser.unwrap_or(defaults.browser),
        headless: toml_value.headless.unwrap_or(defaults.headless),
        aspect_ratio,
        scroll,
        attribute,
        download,
        network_idle,
    })
}

fn resolve(config_dir: &Path, path: &str) -> PathBuf {
    let path = PathBuf::from(path);
    if path.is_absolute() {
        path
    } else {
        config_dir.join(path)
    }
}

impl std::str::FromStr for AspectRatio {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        let (width, height) = s
            .split_once(':')
            .ok_or_else(|| eyre!("aspect ratio '{}' is not of the form W:H", s))?;
        let width: u32 = width
            .trim()
            .parse()
            .wrap_err("invalid aspect ratio width")?;
        let height: u32 = height
            .trim()
            .parse()
            .wrap_err("invalid aspect ratio height")?;
        if width == 0 || height == 0 {
            bail!("aspect ratio '{}' has a zero component", s);
        }
        Ok(AspectRatio { width, height })
    }
}
