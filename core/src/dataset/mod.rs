use camino::Utf8PathBuf as PathBuf;
use futures::TryStreamExt;
use tracing::{info, instrument};

use crate::config::DatasetConfig;

mod lines;

pub use lines::{copy_valid_lines, is_valid_json, LineStats};

#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("error connecting to {url}: {source}")]
    Connect {
        url: String,
        source: reqwest::Error,
    },
    #[error("error reading from source stream: {0}")]
    Read(#[source] std::io::Error),
    #[error("line {line} is not valid UTF-8")]
    Decode { line: usize },
    #[error("could not open output file {path}: {source}")]
    CreateOutput {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("error writing output: {0}")]
    Write(#[source] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSummary {
    pub output_path: PathBuf,
    pub stats: LineStats,
}

#[instrument(skip(config), fields(url = %config.source_url))]
pub async fn fetch_dataset(config: &DatasetConfig) -> Result<FetchSummary, FetchError> {
    info!("Starting download of {}", config.source_url);
    let connect_err = |source| FetchError::Connect {
        url: config.source_url.clone(),
        source,
    };
    let response = reqwest::get(config.source_url.as_str())
        .await
        .map_err(connect_err)?
        .error_for_status()
        .map_err(connect_err)?;
    let stream = response.bytes_stream().map_err(|e| {
        let kind = if e.is_timeout() {
            std::io::ErrorKind::TimedOut
        } else {
            std::io::ErrorKind::Other
        };
        std::io::Error::new(kind, e)
    });
    let reader = tokio_util::io::StreamReader::new(stream);

    let out_file = tokio::fs::File::create(&config.output_path)
        .await
        .map_err(|source| FetchError::CreateOutput {
            path: config.output_path.clone(),
            source,
        })?;
    let mut out_buf = tokio::io::BufWriter::new(out_file);
    let stats = copy_valid_lines(reader, &mut out_buf, config.max_lines).await?;
    info!(
        "Saved {} lines to '{}' ({} malformed lines skipped)",
        stats.lines_saved, config.output_path, stats.lines_skipped
    );
    Ok(FetchSummary {
        output_path: config.output_path.clone(),
        stats,
    })
}
