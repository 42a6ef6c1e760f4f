pub mod crop;
pub mod download;

pub use crop::{crop_to_aspect, AspectRatio, CropError, CropOutcome};
pub use download::{DownloadError, ImageDownloader};
