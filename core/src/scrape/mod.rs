use camino::Utf8PathBuf as PathBuf;
use tracing::{info, instrument, warn};

use crate::{
    config::ScrapeConfig,
    model::{PlaylistItem, Size},
    processing::{crop_to_aspect, CropOutcome, ImageDownloader},
};

mod attribute;
mod load;
mod page;
#[cfg(test)]
mod test_page;

pub use attribute::{is_acceptable, locate_thumbnails, poll_attribute, strip_query};
pub use load::{load_page, stabilize, wait_for_network_idle};
pub use page::{PageDriver, WebDriverPage};

#[derive(thiserror::Error, Debug)]
pub enum ScrapeError {
    #[error("could not create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("browser error: {0}")]
    Page(#[source] eyre::Report),
    #[error("no images found matching '{selector}', check that the playlist is public")]
    NoThumbnails { selector: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Attribute stayed empty or a placeholder for the whole polling budget
    NoAttribute,
    DownloadFailed(String),
    /// The file was downloaded but could not be decoded or re-encoded
    CropFailed { path: PathBuf, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Cropped { path: PathBuf, from: Size, to: Size },
    LeftUncropped { path: PathBuf, size: Size },
    Skipped(SkipReason),
}

impl ItemOutcome {
    /// Path of the image left on disk, if any.
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            ItemOutcome::Cropped { path, .. }
            | ItemOutcome::LeftUncropped { path, .. }
            | ItemOutcome::Skipped(SkipReason::CropFailed { path, .. }) => Some(path),
            ItemOutcome::Skipped(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemReport {
    pub ordinal: usize,
    pub outcome: ItemOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeSummary {
    /// Row count after scrolling stabilized
    pub rows_loaded: usize,
    pub items: Vec<ItemReport>,
}

impl ScrapeSummary {
    /// Items whose file is on disk, including ones that could not be cropped.
    pub fn downloaded(&self) -> usize {
        self.items
            .iter()
            .filter(|item| item.outcome.path().is_some())
            .count()
    }

    /// Downloaded items left as fetched because decoding or re-encoding failed.
    pub fn crop_failed(&self) -> usize {
        self.items
            .iter()
            .filter(|item| {
                matches!(
                    item.outcome,
                    ItemOutcome::Skipped(SkipReason::CropFailed { .. })
                )
            })
            .count()
    }

    /// Items that produced no file. Together with `downloaded` this covers every item.
    pub fn skipped(&self) -> usize {
        self.items
            .iter()
            .filter(|item| item.outcome.path().is_none())
            .count()
    }
}

/// Runs a scrape and closes the browser session afterwards, whatever the result.
pub async fn run_session<P: PageDriver>(
    page: &P,
    downloader: &ImageDownloader,
    config: &ScrapeConfig,
) -> Result<ScrapeSummary, ScrapeError> {
    let result = scrape_thumbnails(page, downloader, config).await;
    if let Err(err) = page.close().await {
        warn!("{:#}", err);
    }
    result
}

#[instrument(skip_all, fields(url = %config.playlist_url))]
pub async fn scrape_thumbnails<P: PageDriver>(
    page: &P,
    downloader: &ImageDownloader,
    config: &ScrapeConfig,
) -> Result<ScrapeSummary, ScrapeError> {
    tokio::fs::create_dir_all(&config.output_dir)
        .await
        .map_err(|source| ScrapeError::OutputDir {
            path: config.output_dir.clone(),
            source,
        })?;
    load_page(page, &config.playlist_url, &config.network_idle)
        .await
        .map_err(ScrapeError::Page)?;
    let rows_loaded = stabilize(page, &config.row_selector, &config.scroll)
        .await
        .map_err(ScrapeError::Page)?;
    let elements = locate_thumbnails(page, &config.thumbnail_selector)
        .await
        .map_err(ScrapeError::Page)?;
    if elements.is_empty() {
        return Err(ScrapeError::NoThumbnails {
            selector: config.thumbnail_selector.clone(),
        });
    }

    let mut items = Vec::with_capacity(elements.len());
    for (idx, element) in elements.iter().enumerate() {
        let ordinal = idx + 1;
        let outcome = process_element(page, downloader, config, ordinal, element).await;
        items.push(ItemReport { ordinal, outcome });
    }
    let summary = ScrapeSummary { rows_loaded, items };
    info!(
        "Scraping complete. Downloaded {} thumbnails to '{}' ({} left uncropped after errors), skipped {}",
        summary.downloaded(),
        config.output_dir,
        summary.crop_failed(),
        summary.skipped()
    );
    Ok(summary)
}

#[instrument(skip(page, downloader, config, element))]
async fn process_element<P: PageDriver>(
    page: &P,
    downloader: &ImageDownloader,
    config: &ScrapeConfig,
    ordinal: usize,
    element: &P::Element,
) -> ItemOutcome {
    let Some(src) = poll_attribute(page, element, &config.attribute).await else {
        warn!(
            "Skipping item {}: '{}' is still a placeholder or empty after {} attempts",
            ordinal, config.attribute.name, config.attribute.attempts
        );
        return ItemOutcome::Skipped(SkipReason::NoAttribute);
    };
    let item = PlaylistItem::new(ordinal, &src);
    let path = config.output_dir.join(item.file_name());
    if let Err(err) = downloader.download(&item.source_url, &path).await {
        warn!("Failed to download {}: {}", item.source_url, err);
        return ItemOutcome::Skipped(SkipReason::DownloadFailed(err.to_string()));
    }
    info!("Downloaded: {}", path);
    match crop_to_aspect(&path, config.aspect_ratio).await {
        Ok(CropOutcome::Cropped { from, to }) => {
            info!("Cropped image from {} to {}", from, to);
            ItemOutcome::Cropped { path, from, to }
        }
        Ok(CropOutcome::LeftUncropped { size }) => {
            info!(
                "Skipping crop, {} is already {}:{} or wider",
                size, config.aspect_ratio.width, config.aspect_ratio.height
            );
            ItemOutcome::LeftUncropped { path, size }
        }
        Err(err) => {
            warn!("Error processing image {}: {}", path, err);
            ItemOutcome::Skipped(SkipReason::CropFailed {
                path,
                reason: err.to_string(),
            })
        }
    }
}
