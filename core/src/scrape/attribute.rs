use eyre::Result;
use tokio::time::sleep;
use tracing::{debug, info};

use super::page::PageDriver;
use crate::config::AttributePolling;

pub async fn locate_thumbnails<P: PageDriver>(page: &P, selector: &str) -> Result<Vec<P::Element>> {
    let elements = page.locate(selector).await?;
    info!(
        "Found {} potential thumbnail elements matching '{}'",
        elements.len(),
        selector
    );
    Ok(elements)
}

/// A lazy-loaded attribute is usable once it is non-empty and no longer a placeholder.
pub fn is_acceptable(value: &str, placeholder_prefix: &str) -> bool {
    !value.is_empty() && !value.starts_with(placeholder_prefix)
}

pub fn strip_query(url: &str) -> &str {
    match url.split_once('?') {
        Some((base, _query)) => base,
        None => url,
    }
}

/// Reads the attribute up to `attempts` times, sleeping `interval` between reads.
/// Returns None if no acceptable value showed up. Read errors count as a failed attempt.
pub async fn poll_attribute<P: PageDriver>(
    page: &P,
    element: &P::Element,
    polling: &AttributePolling,
) -> Option<String> {
    for attempt in 1..=polling.attempts {
        match page.attribute(element, &polling.name).await {
            Ok(Some(value)) if is_acceptable(&value, &polling.placeholder_prefix) => {
                return Some(value);
            }
            Ok(_) => {}
            Err(err) => debug!("attempt {} reading '{}' failed: {:#}", attempt, polling.name, err),
        }
        if attempt < polling.attempts {
            sleep(polling.interval).await;
        }
    }
    None
}
