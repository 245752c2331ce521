// Frame source backed by a directory of still images

use super::FrameSource;
use crate::models::capture::{CaptureError, CaptureResult, RawFrame};
use image::imageops::{self, FilterType};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

pub struct ImageSequenceSource {
    pending: VecDeque<PathBuf>,
    size: u32,
    flip: bool,
    next_index: u64,
}

impl ImageSequenceSource {
    /// Open a directory of frames, read in file name order
    ///
    /// # Arguments
    /// * `size` - frames are resized to `size` x `size` pixels
    /// * `flip` - mirror frames horizontally, like a selfie camera
    pub fn open(dir: &Path, size: u32, flip: bool) -> CaptureResult<Self> {
        if !dir.is_dir() {
            return Err(CaptureError::SourceNotFound(dir.to_path_buf()));
        }

        let mut frames = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && Self::is_image(&path) {
                frames.push(path);
            }
        }

        if frames.is_empty() {
            return Err(CaptureError::NoFrames(dir.to_path_buf()));
        }

        frames.sort();
        info!("Found {} frame(s) in {:?}", frames.len(), dir);

        Ok(Self {
            pending: frames.into(),
            size,
            flip,
            next_index: 0,
        })
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    fn is_image(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
            .unwrap_or(false)
    }
}

impl FrameSource for ImageSequenceSource {
    fn next_frame(&mut self) -> CaptureResult<Option<RawFrame>> {
        let path = match self.pending.pop_front() {
            Some(path) => path,
            None => return Ok(None),
        };

        debug!("Reading frame {:?}", path);
        let image = image::open(&path)?.to_rgba8();

        let mut image = if image.dimensions() != (self.size, self.size) {
            imageops::resize(&image, self.size, self.size, FilterType::Triangle)
        } else {
            image
        };

        if self.flip {
            imageops::flip_horizontal_in_place(&mut image);
        }

        let frame = RawFrame::from_image(
            self.next_index,
            chrono::Utc::now().timestamp_millis(),
            image,
        );
        self.next_index += 1;

        Ok(Some(frame))
    }

    fn frame_size(&self) -> u32 {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("pose_signal_frames_{}", name));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// 4 pixels wide: left half red, right half blue
    fn write_frame(dir: &Path, name: &str, height: u32) {
        let mut image = RgbaImage::new(4, height);
        for (x, _, pixel) in image.enumerate_pixels_mut() {
            *pixel = if x < 2 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 255])
            };
        }
        image.save(dir.join(name)).unwrap();
    }

    #[test]
    fn test_missing_directory() {
        let result = ImageSequenceSource::open(Path::new("/nonexistent/pose_signal"), 8, false);
        assert!(matches!(result, Err(CaptureError::SourceNotFound(_))));
    }

    #[test]
    fn test_directory_without_images() {
        let dir = temp_dir("empty");
        std::fs::write(dir.join("notes.txt"), "not a frame").unwrap();

        let result = ImageSequenceSource::open(&dir, 8, false);
        assert!(matches!(result, Err(CaptureError::NoFrames(_))));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_frames_in_name_order_and_resized() {
        let dir = temp_dir("ordered");
        write_frame(&dir, "frame_002.png", 2);
        write_frame(&dir, "frame_001.png", 2);

        let mut source = ImageSequenceSource::open(&dir, 4, false).unwrap();
        assert_eq!(source.remaining(), 2);
        assert_eq!(source.frame_size(), 4);

        let first = source.next_frame().unwrap().unwrap();
        assert_eq!(first.index, 0);
        assert_eq!((first.width, first.height), (4, 4));

        let second = source.next_frame().unwrap().unwrap();
        assert_eq!(second.index, 1);
        assert!(source.next_frame().unwrap().is_none());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_flip_mirrors_frame() {
        let dir = temp_dir("flip");
        write_frame(&dir, "frame.png", 4);

        let mut source = ImageSequenceSource::open(&dir, 4, true).unwrap();
        let frame = source.next_frame().unwrap().unwrap();
        let image = frame.to_image().unwrap();

        // Red started on the left, so after mirroring it is on the right
        assert_eq!(image.get_pixel(0, 0).0, [0, 0, 255, 255]);
        assert_eq!(image.get_pixel(3, 0).0, [255, 0, 0, 255]);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
