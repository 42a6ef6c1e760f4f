use async_trait::async_trait;
use eyre::{Context, Result};
use fantoccini::{elements::Element, Client, ClientBuilder, Locator};
use serde_json::{json, Value};

use crate::config::Browser;

pub const SCROLL_TO_BOTTOM: &str = "window.scrollTo(0, document.body.scrollHeight);";
/// Returns the ready state and the number of resource entries since the last call.
/// The timing buffer is emptied each time so it never fills up and stops counting.
pub const LOAD_STATE: &str = "const entries = performance.getEntriesByType('resource').length; \
     performance.clearResourceTimings(); \
     return [document.readyState, entries];";

/// The parts of a rendered page the scraper needs.
#[async_trait]
pub trait PageDriver: Send + Sync {
    type Element: Send + Sync;

    async fn goto(&self, url: &str) -> Result<()>;

    /// Runs `script` in the page and returns what it `return`s.
    async fn execute(&self, script: &str) -> Result<Value>;

    async fn locate(&self, selector: &str) -> Result<Vec<Self::Element>>;

    async fn count(&self, selector: &str) -> Result<usize> {
        Ok(self.locate(selector).await?.len())
    }

    /// Current value of `name`, None if the element has no such attribute.
    async fn attribute(&self, element: &Self::Element, name: &str) -> Result<Option<String>>;

    async fn close(&self) -> Result<()>;
}

/// A browser session driven over the WebDriver protocol.
pub struct WebDriverPage {
    client: Client,
}

impl WebDriverPage {
    pub async fn connect(webdriver_url: &str, browser: Browser, headless: bool) -> Result<Self> {
        let mut builder = ClientBuilder::native();
        builder.capabilities(capabilities(browser, headless));
        let client = builder
            .connect(webdriver_url)
            .await
            .wrap_err_with(|| format!("could not start a browser session at {}", webdriver_url))?;
        Ok(WebDriverPage { client })
    }
}

fn capabilities(browser: Browser, headless: bool) -> serde_json::Map<String, Value> {
    let mut caps = serde_json::Map::new();
    match browser {
        Browser::Chrome => {
            let args: Vec<&str> = if headless { vec!["--headless=new"] } else { vec![] };
            caps.insert("browserName".to_owned(), json!("chrome"));
            caps.insert("goog:chromeOptions".to_owned(), json!({ "args": args }));
        }
        Browser::Firefox => {
            let args: Vec<&str> = if headless { vec!["-headless"] } else { vec![] };
            caps.insert("browserName".to_owned(), json!("firefox"));
            caps.insert("moz:firefoxOptions".to_owned(), json!({ "args": args }));
        }
    }
    caps
}

#[async_trait]
impl PageDriver for WebDriverPage {
    type Element = Element;

    async fn goto(&self, url: &str) -> Result<()> {
        self.client
            .goto(url)
            .await
            .wrap_err_with(|| format!("error navigating to {}", url))
    }

    async fn execute(&self, script: &str) -> Result<Value> {
        self.client
            .execute(script, Vec::new())
            .await
            .wrap_err("error running script in page")
    }

    async fn locate(&self, selector: &str) -> Result<Vec<Element>> {
        self.client
            .find_all(Locator::Css(selector))
            .await
            .wrap_err_with(|| format!("error locating elements matching '{}'", selector))
    }

    async fn attribute(&self, element: &Element, name: &str) -> Result<Option<String>> {
        element
            .attr(name)
            .await
            .wrap_err_with(|| format!("error reading attribute '{}'", name))
    }

    async fn close(&self) -> Result<()> {
        self.client
            .clone()
            .close()
            .await
            .wrap_err("error closing browser session")
    }
}
