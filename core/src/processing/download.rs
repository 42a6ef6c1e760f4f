use camino::Utf8Path as Path;
use futures::StreamExt;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, instrument};

use crate::config::DownloadSettings;

#[derive(thiserror::Error, Debug)]
pub enum DownloadError {
    #[error("empty URL provided for download")]
    EmptyUrl,
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("error writing to destination file: {0}")]
    Write(#[from] std::io::Error),
}

/// Fetches single images to disk with a per-request timeout.
#[derive(Debug, Clone)]
pub struct ImageDownloader {
    client: reqwest::Client,
    chunk_size: usize,
}

impl ImageDownloader {
    pub fn new(settings: &DownloadSettings) -> Result<Self, DownloadError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()?;
        Ok(ImageDownloader {
            client,
            chunk_size: settings.chunk_size.max(1),
        })
    }

    /// Streams `url` into `dest`, replacing whatever is there.
    /// On error nothing is left at `dest`.
    #[instrument(skip(self))]
    pub async fn download(&self, url: &str, dest: &Path) -> Result<(), DownloadError> {
        if url.is_empty() {
            return Err(DownloadError::EmptyUrl);
        }
        let result = self.fetch_to_file(url, dest).await;
        if result.is_err() {
            match tokio::fs::remove_file(dest).await {
                Ok(()) => debug!("removed partial download {}", dest),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => debug!("could not remove partial download {}: {}", dest, err),
            }
        }
        result
    }

    async fn fetch_to_file(&self, url: &str, dest: &Path) -> Result<(), DownloadError> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        let mut dl_stream = response.bytes_stream();
        let mut out_file = tokio::fs::File::create(dest).await?;
        while let Some(bytes) = dl_stream.next().await {
            write_chunked(&mut out_file, &bytes?, self.chunk_size).await?;
        }
        out_file.flush().await?;
        Ok(())
    }
}

/// Writes `bytes` in pieces of at most `chunk_size`.
async fn write_chunked<W: AsyncWrite + Unpin>(
    out: &mut W,
    bytes: &[u8],
    chunk_size: usize,
) -> std::io::Result<()> {
    for chunk in bytes.chunks(chunk_size) {
        out.write_all(chunk).await?;
    }
    Ok(())
}
