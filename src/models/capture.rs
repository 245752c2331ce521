// Data structures for camera frames

use image::RgbaImage;
use std::path::PathBuf;

/// A captured camera frame
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub index: u64,
    pub timestamp: i64,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>, // RGBA8, row-major
}

impl RawFrame {
    pub fn from_image(index: u64, timestamp: i64, image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            index,
            timestamp,
            width,
            height,
            data: image.into_raw(),
        }
    }

    /// Copy the pixel data into an image buffer
    pub fn to_image(&self) -> CaptureResult<RgbaImage> {
        RgbaImage::from_raw(self.width, self.height, self.data.clone()).ok_or_else(|| {
            CaptureError::InvalidFrame(format!(
                "{} bytes for a {}x{} RGBA frame",
                self.data.len(),
                self.width,
                self.height
            ))
        })
    }
}

/// Error types for frame capture operations
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("Frame source not found: {0}")]
    SourceNotFound(PathBuf),

    #[error("No frames found in {0}")]
    NoFrames(PathBuf),

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type CaptureResult<T> = Result<T, CaptureError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_image_conversion() {
        let image = RgbaImage::from_pixel(4, 3, image::Rgba([1, 2, 3, 255]));
        let frame = RawFrame::from_image(7, 1000, image);
        assert_eq!(frame.width, 4);
        assert_eq!(frame.height, 3);
        assert_eq!(frame.data.len(), 4 * 3 * 4);

        let back = frame.to_image().unwrap();
        assert_eq!(back.get_pixel(3, 2).0, [1, 2, 3, 255]);
    }

    #[test]
    fn test_frame_with_short_buffer_is_invalid() {
        let frame = RawFrame {
            index: 0,
            timestamp: 0,
            width: 10,
            height: 10,
            data: vec![0; 12],
        };
        assert!(matches!(frame.to_image(), Err(CaptureError::InvalidFrame(_))));
    }
}
