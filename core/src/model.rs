use crate::scrape::strip_query;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// One thumbnail found on the playlist page, in DOM enumeration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistItem {
    /// 1-based position among the located thumbnail elements
    pub ordinal: usize,
    /// Image URL with any query component removed
    pub source_url: String,
}

impl PlaylistItem {
    pub fn new(ordinal: usize, raw_url: &str) -> Self {
        PlaylistItem {
            ordinal,
            source_url: strip_query(raw_url).to_owned(),
        }
    }

    /// Files are keyed by ordinal so names stay unique within a run.
    pub fn file_name(&self) -> String {
        format!("{}_thumbnail.jpg", self.ordinal)
    }
}
