// Camera frame sources
// Each source yields square RGBA frames in capture order

pub mod image_sequence;

pub use image_sequence::ImageSequenceSource;

use crate::models::capture::{CaptureResult, RawFrame};

pub trait FrameSource: Send {
    /// Next frame, or `None` once the source is exhausted
    fn next_frame(&mut self) -> CaptureResult<Option<RawFrame>>;

    /// Side length of the frames in pixels
    fn frame_size(&self) -> u32;
}
