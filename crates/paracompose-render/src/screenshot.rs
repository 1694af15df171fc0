//! Exporting composited frames as image files.

use std::path::Path;

use image::{imageops, RgbImage};
use paracompose_core::image_buffer::ImageBuffer;

/// Converts a frame to an `image` buffer with a top-left origin.
fn to_rgb_image(frame: &ImageBuffer) -> Result<RgbImage, ScreenshotError> {
    if frame.is_empty() {
        return Err(ScreenshotError::InvalidImageData);
    }
    let img = RgbImage::from_raw(frame.width(), frame.height(), frame.pixels().to_vec())
        .ok_or(ScreenshotError::InvalidImageData)?;
    // Frames are stored bottom row first.
    Ok(imageops::flip_vertical(&img))
}

/// Saves a frame to an image file.
///
/// # Arguments
/// * `filename` - Output filename (supports .png, .jpg, .jpeg)
/// * `frame` - RGB frame, origin bottom-left
///
/// # Errors
/// Returns an error if the file cannot be written or format is unsupported.
pub fn save_image(filename: impl AsRef<Path>, frame: &ImageBuffer) -> Result<(), ScreenshotError> {
    let path = filename.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    let format = match extension.as_str() {
        "png" => image::ImageFormat::Png,
        "jpg" | "jpeg" => image::ImageFormat::Jpeg,
        _ => return Err(ScreenshotError::UnsupportedFormat(extension)),
    };

    to_rgb_image(frame)?.save_with_format(path, format)?;
    log::debug!("saved {}x{} frame to {}", frame.width(), frame.height(), path.display());
    Ok(())
}

/// Encodes a frame as PNG in memory.
pub fn encode_png(frame: &ImageBuffer) -> Result<Vec<u8>, ScreenshotError> {
    let img = to_rgb_image(frame)?;
    let mut buffer = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buffer, image::ImageFormat::Png)?;
    Ok(buffer.into_inner())
}

/// Error type for screenshot operations.
#[derive(Debug, thiserror::Error)]
pub enum ScreenshotError {
    #[error("Failed to save image: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Image encoding error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid image data")]
    InvalidImageData,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_png_flips_rows() {
        let mut frame = ImageBuffer::new(3, 2);
        frame.set_pixel(0, 0, [255, 0, 0]);
        let png = encode_png(&frame).unwrap();

        let decoded = image::load_from_memory(&png).unwrap().to_rgb8();
        assert_eq!(decoded.dimensions(), (3, 2));
        // Bottom-left of the frame is the last row of the file.
        assert_eq!(decoded.get_pixel(0, 1).0, [255, 0, 0]);
        assert_eq!(decoded.get_pixel(0, 0).0, [0, 0, 0]);
    }

    #[test]
    fn test_empty_frame_rejected() {
        assert!(matches!(
            encode_png(&ImageBuffer::default()),
            Err(ScreenshotError::InvalidImageData)
        ));
    }

    #[test]
    fn test_unsupported_extension() {
        let frame = ImageBuffer::new(1, 1);
        assert!(matches!(
            save_image("frame.bmp", &frame),
            Err(ScreenshotError::UnsupportedFormat(ext)) if ext == "bmp"
        ));
    }
}
