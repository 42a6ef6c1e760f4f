use std::{any::Any, panic::AssertUnwindSafe};

use camino::{Utf8Path as Path, Utf8PathBuf as PathBuf};
use eyre::Result;
use image::{ColorType, DynamicImage, GenericImageView, ImageFormat};
use tracing::instrument;

use crate::model::Size;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AspectRatio {
    pub width: u32,
    pub height: u32,
}

impl AspectRatio {
    pub const WIDESCREEN: AspectRatio = AspectRatio {
        width: 16,
        height: 9,
    };

    /// Height matching this ratio at `width`, rounded down.
    pub fn height_for_width(&self, width: u32) -> u32 {
        let height = u64::from(width) * u64::from(self.height) / u64::from(self.width);
        u32::try_from(height).unwrap_or(u32::MAX)
    }
}

/// Region to keep, in pixel coordinates of the source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Returns the centered crop for an image that is taller than `ratio` at its width,
/// or None if it already fits. When the excess is odd the extra row comes off the bottom.
pub fn crop_box(width: u32, height: u32, ratio: AspectRatio) -> Option<CropBox> {
    let target_height = ratio.height_for_width(width);
    if height <= target_height {
        return None;
    }
    let excess = height - target_height;
    Some(CropBox {
        x: 0,
        y: excess / 2,
        width,
        height: target_height,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CropOutcome {
    Cropped { from: Size, to: Size },
    LeftUncropped { size: Size },
}

#[derive(thiserror::Error, Debug)]
pub enum CropError {
    #[error("error reading image file: {0}")]
    Io(#[from] std::io::Error),
    #[error("error processing image: {0}")]
    Image(#[from] image::ImageError),
    #[error("image codec panicked: {0}")]
    Panicked(String),
    #[error("crop task died")]
    TaskDied,
}

/// Crops the image at `path` to `ratio` in place.
/// Decoding and encoding happen on the rayon pool.
#[instrument(level = "debug")]
pub async fn crop_to_aspect(path: &Path, ratio: AspectRatio) -> Result<CropOutcome, CropError> {
    let path: PathBuf = path.to_owned();
    on_rayon(move || crop_in_place(&path, ratio)).await
}

/// Runs `f` on the rayon pool. A panic inside `f` becomes `CropError::Panicked`
/// instead of taking the process down with it.
async fn on_rayon<T, F>(f: F) -> Result<T, CropError>
where
    F: FnOnce() -> Result<T, CropError> + Send + 'static,
    T: Send + 'static,
{
    let (tx, rx) = tokio::sync::oneshot::channel();
    rayon::spawn(move || {
        let res = std::panic::catch_unwind(AssertUnwindSafe(f))
            .unwrap_or_else(|panic| Err(CropError::Panicked(panic_message(&*panic))));
        // receiver only goes away if the caller was dropped
        let _ = tx.send(res);
    });
    rx.await.map_err(|_| CropError::TaskDied)?
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_owned()
    }
}

fn crop_in_place(path: &Path, ratio: AspectRatio) -> Result<CropOutcome, CropError> {
    let img = image::io::Reader::open(path)?
        .with_guessed_format()?
        .decode()?;
    let (width, height) = img.dimensions();
    let size = Size { width, height };
    let Some(crop) = crop_box(size.width, size.height, ratio) else {
        return Ok(CropOutcome::LeftUncropped { size });
    };
    let cropped = img.crop_imm(crop.x, crop.y, crop.width, crop.height);
    let format = ImageFormat::from_path(path).unwrap_or(ImageFormat::Jpeg);
    let cropped = match (format, cropped.color()) {
        (ImageFormat::Jpeg, ColorType::Rgb8 | ColorType::L8) => cropped,
        (ImageFormat::Jpeg, _) => DynamicImage::ImageRgb8(cropped.to_rgb8()),
        _ => cropped,
    };
    cropped.save_with_format(path, format)?;
    Ok(CropOutcome::Cropped {
        from: size,
        to: Size {
            width: crop.width,
            height: crop.height,
        },
    })
}
