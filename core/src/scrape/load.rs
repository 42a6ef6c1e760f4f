use eyre::{Context, Result};
use serde::Deserialize;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, instrument, warn};

use super::page::{PageDriver, LOAD_STATE, SCROLL_TO_BOTTOM};
use crate::config::{NetworkIdle, ScrollSettings};

#[derive(Debug, Deserialize)]
struct LoadState(String, u64);

/// Navigates to `url` and waits once for the network to go quiet.
#[instrument(skip(page, idle))]
pub async fn load_page<P: PageDriver>(page: &P, url: &str, idle: &NetworkIdle) -> Result<()> {
    info!("Navigating to {}", url);
    page.goto(url).await?;
    if !wait_for_network_idle(page, idle).await? {
        warn!(
            "Network did not go idle within {:?}, continuing anyway",
            idle.timeout
        );
    }
    Ok(())
}

/// Polls until the document has finished loading and no new resources were
/// requested for `idle_window`. Returns false if `timeout` passed first.
pub async fn wait_for_network_idle<P: PageDriver>(page: &P, idle: &NetworkIdle) -> Result<bool> {
    let deadline = Instant::now() + idle.timeout;
    let mut total_resources: u64 = 0;
    let mut last_resources: Option<u64> = None;
    let mut quiet_since = Instant::now();
    loop {
        let value = page.execute(LOAD_STATE).await?;
        let LoadState(ready_state, new_resources) =
            serde_json::from_value(value).wrap_err("unexpected page load state")?;
        total_resources += new_resources;
        let now = Instant::now();
        if ready_state == "complete" && last_resources == Some(total_resources) {
            if now.duration_since(quiet_since) >= idle.idle_window {
                debug!("network idle with {} resources loaded", total_resources);
                return Ok(true);
            }
        } else {
            last_resources = (ready_state == "complete").then_some(total_resources);
            quiet_since = now;
        }
        if now >= deadline {
            return Ok(false);
        }
        sleep(idle.poll_interval).await;
    }
}

/// Scrolls to the bottom until `stall_threshold` consecutive scrolls load no new
/// rows, and returns the last row count seen.
#[instrument(skip(page, settings))]
pub async fn stabilize<P: PageDriver>(
    page: &P,
    row_selector: &str,
    settings: &ScrollSettings,
) -> Result<usize> {
    info!("Scrolling to load all playlist rows...");
    let mut last_count = 0;
    let mut stalled = 0;
    while stalled < settings.stall_threshold {
        page.execute(SCROLL_TO_BOTTOM).await?;
        sleep(settings.pause).await;
        let count = page.count(row_selector).await?;
        if count > last_count {
            info!("Loaded {} rows so far...", count);
            last_count = count;
            stalled = 0;
        } else {
            stalled += 1;
            info!(
                "No new rows loaded in this attempt. Attempts remaining: {}",
                settings.stall_threshold - stalled
            );
        }
    }
    info!("Finished scrolling. Total rows found: {}", last_count);
    Ok(last_count)
}
