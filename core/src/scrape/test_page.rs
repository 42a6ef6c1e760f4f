use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Mutex,
};

use async_trait::async_trait;
use eyre::{bail, Result};
use serde_json::{json, Value};

use super::page::{PageDriver, LOAD_STATE, SCROLL_TO_BOTTOM};

/// Thumbnail element whose attribute reads follow a script; the last value repeats.
pub struct ScriptedElement {
    values: Vec<Option<String>>,
    failing: bool,
    reads: AtomicUsize,
}

impl ScriptedElement {
    pub fn new(values: Vec<Option<String>>) -> Self {
        ScriptedElement {
            values,
            failing: false,
            reads: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        ScriptedElement {
            values: Vec::new(),
            failing: true,
            reads: AtomicUsize::new(0),
        }
    }

    fn read(&self) -> Result<Option<String>> {
        let n = self.reads.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            bail!("stale element reference");
        }
        Ok(self
            .values
            .get(n.min(self.values.len().saturating_sub(1)))
            .cloned()
            .flatten())
    }
}

enum Resources {
    /// `per_check` new entries on each of the first `checks` load-state checks
    Settling { per_check: u64, checks: u64 },
    NeverSettling,
}

/// In-memory page: row counts grow per scroll as scripted, elements are indices.
pub struct ScriptedPage {
    row_counts: Vec<usize>,
    resources: Resources,
    fail_navigation: bool,
    elements: Vec<ScriptedElement>,
    scrolls: AtomicUsize,
    load_checks: AtomicUsize,
    visited: Mutex<Vec<String>>,
    closed: AtomicBool,
}

impl ScriptedPage {
    pub fn new() -> Self {
        ScriptedPage {
            row_counts: Vec::new(),
            resources: Resources::Settling {
                per_check: 0,
                checks: 0,
            },
            fail_navigation: false,
            elements: Vec::new(),
            scrolls: AtomicUsize::new(0),
            load_checks: AtomicUsize::new(0),
            visited: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Row count seen after the n-th scroll; the last entry repeats.
    pub fn with_row_counts(self, row_counts: Vec<usize>) -> Self {
        ScriptedPage { row_counts, ..self }
    }

    pub fn with_resources_settling_after(self, checks: u64) -> Self {
        self.with_resource_bursts(1, checks)
    }

    pub fn with_resource_bursts(self, per_check: u64, checks: u64) -> Self {
        ScriptedPage {
            resources: Resources::Settling { per_check, checks },
            ..self
        }
    }

    pub fn with_resources_never_settling(self) -> Self {
        ScriptedPage {
            resources: Resources::NeverSettling,
            ..self
        }
    }

    pub fn failing_navigation(self) -> Self {
        ScriptedPage {
            fail_navigation: true,
            ..self
        }
    }

    pub fn with_elements(self, elements: Vec<ScriptedElement>) -> Self {
        ScriptedPage { elements, ..self }
    }

    pub fn scrolls(&self) -> usize {
        self.scrolls.load(Ordering::SeqCst)
    }

    pub fn visited(&self) -> Vec<String> {
        self.visited.lock().unwrap().clone()
    }

    pub fn attribute_reads(&self, element: usize) -> usize {
        self.elements[element].reads.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageDriver for ScriptedPage {
    type Element = usize;

    async fn goto(&self, url: &str) -> Result<()> {
        if self.fail_navigation {
            bail!("net::ERR_NAME_NOT_RESOLVED");
        }
        self.visited.lock().unwrap().push(url.to_owned());
        Ok(())
    }

    async fn execute(&self, script: &str) -> Result<Value> {
        match script {
            SCROLL_TO_BOTTOM => {
                self.scrolls.fetch_add(1, Ordering::SeqCst);
                Ok(Value::Null)
            }
            LOAD_STATE => {
                let checks = self.load_checks.fetch_add(1, Ordering::SeqCst) as u64;
                // entries since the previous check, the script clears the buffer
                let new_entries = match self.resources {
                    Resources::Settling { per_check, checks: settle } if checks < settle => {
                        per_check
                    }
                    Resources::Settling { .. } => 0,
                    Resources::NeverSettling => 1,
                };
                Ok(json!(["complete", new_entries]))
            }
            other => bail!("unexpected script: {}", other),
        }
    }

    async fn locate(&self, _selector: &str) -> Result<Vec<usize>> {
        Ok((0..self.elements.len()).collect())
    }

    async fn count(&self, _selector: &str) -> Result<usize> {
        let scrolls = self.scrolls();
        if scrolls == 0 || self.row_counts.is_empty() {
            return Ok(0);
        }
        Ok(self.row_counts[(scrolls - 1).min(self.row_counts.len() - 1)])
    }

    async fn attribute(&self, element: &usize, _name: &str) -> Result<Option<String>> {
        self.elements[*element].read()
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
