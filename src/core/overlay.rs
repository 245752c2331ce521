// Overlay renderer - draws the pose and the signal status onto a frame

use crate::models::capture::{CaptureResult, RawFrame};
use crate::models::pose::{BodyPart, Pose, Position, SKELETON};
use crate::models::signal::Signal;
use image::{Rgba, RgbaImage};
use std::path::PathBuf;
use tracing::debug;

const KEYPOINT_COLOR: Rgba<u8> = Rgba([0, 255, 255, 255]); // aqua
const KEYPOINT_RADIUS: i64 = 3;
const SKELETON_HALF_WIDTH: i64 = 1;
const HIGH_COLOR: Rgba<u8> = Rgba([0, 128, 0, 255]); // green
const LOW_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]); // red
const NOSE_BOX_COLOR: Rgba<u8> = Rgba([128, 0, 128, 255]); // purple

/// Status light: circle of diameter 20 centred at (20, 20)
const INDICATOR_CENTER: (i64, i64) = (20, 20);
const INDICATOR_RADIUS: i64 = 10;

/// Side of the box that follows the nose
const NOSE_BOX_SIZE: i64 = 100;

/// Off-frame band positions are clamped into, wider than any shape drawn
const CLAMP_MARGIN: i64 = NOSE_BOX_SIZE;

pub struct OverlayRenderer {
    min_part_confidence: f32,
    output_dir: Option<PathBuf>,
}

impl OverlayRenderer {
    /// # Arguments
    /// * `min_part_confidence` - keypoints scoring below this are not drawn
    /// * `output_dir` - annotated frames are saved here as PNG when set
    pub fn new(min_part_confidence: f32, output_dir: Option<PathBuf>) -> CaptureResult<Self> {
        if let Some(dir) = &output_dir {
            std::fs::create_dir_all(dir)?;
        }

        Ok(Self {
            min_part_confidence,
            output_dir,
        })
    }

    pub fn render(&self, frame: &RawFrame, pose: &Pose, signal: Signal) -> CaptureResult<RgbaImage> {
        let mut image = frame.to_image()?;

        for keypoint in &pose.keypoints {
            if !keypoint.is_visible(self.min_part_confidence) {
                continue;
            }
            if let Some((x, y)) = to_pixel(&image, &keypoint.position) {
                fill_circle(&mut image, x, y, KEYPOINT_RADIUS, KEYPOINT_COLOR);
            }
        }

        for (from, to) in SKELETON {
            let (a, b) = match (pose.keypoint(from), pose.keypoint(to)) {
                (Some(a), Some(b)) => (a, b),
                _ => continue,
            };
            if !a.is_visible(self.min_part_confidence) || !b.is_visible(self.min_part_confidence) {
                continue;
            }
            if let Some((from, to)) = clip_segment(&image, &a.position, &b.position) {
                draw_line(&mut image, from, to, KEYPOINT_COLOR);
            }
        }

        let indicator = if signal.is_high() { HIGH_COLOR } else { LOW_COLOR };
        fill_circle(
            &mut image,
            INDICATOR_CENTER.0,
            INDICATOR_CENTER.1,
            INDICATOR_RADIUS,
            indicator,
        );

        let nose = BodyPart::Nose.as_str();
        for keypoint in pose.keypoints.iter().filter(|k| k.part == nose) {
            if let Some((x, y)) = to_pixel(&image, &keypoint.position) {
                let left = x - NOSE_BOX_SIZE / 2;
                let top = y - NOSE_BOX_SIZE / 2;
                fill_rect(&mut image, left, top, NOSE_BOX_SIZE, NOSE_BOX_SIZE, NOSE_BOX_COLOR);
            }
        }

        Ok(image)
    }

    /// Render and, when an output directory is configured, save the frame
    pub fn render_and_save(
        &self,
        frame: &RawFrame,
        pose: &Pose,
        signal: Signal,
    ) -> CaptureResult<Option<PathBuf>> {
        let image = self.render(frame, pose, signal)?;

        let dir = match &self.output_dir {
            Some(dir) => dir,
            None => return Ok(None),
        };

        let path = dir.join(format!("frame_{:06}.png", frame.index));
        image.save(&path)?;
        debug!("Saved overlay {:?}", path);

        Ok(Some(path))
    }
}

/// Pixel coordinates of a position, clamped to a band around the frame wide
/// enough that anything drawn at a clamped point stays off-frame.
/// Non-finite positions yield `None`.
fn to_pixel(image: &RgbaImage, position: &Position) -> Option<(i64, i64)> {
    if !position.x.is_finite() || !position.y.is_finite() {
        return None;
    }

    let margin = CLAMP_MARGIN as f32;
    let x = position.x.clamp(-margin, image.width() as f32 + margin);
    let y = position.y.clamp(-margin, image.height() as f32 + margin);
    Some((x.round() as i64, y.round() as i64))
}

/// Liang-Barsky clip of a segment to the frame, padded by the line half width
fn clip_segment(
    image: &RgbaImage,
    from: &Position,
    to: &Position,
) -> Option<((i64, i64), (i64, i64))> {
    let coords = [from.x, from.y, to.x, to.y];
    if coords.iter().any(|c| !c.is_finite()) {
        return None;
    }

    let pad = (SKELETON_HALF_WIDTH + 1) as f64;
    let (x_min, y_min) = (-pad, -pad);
    let (x_max, y_max) = (image.width() as f64 + pad, image.height() as f64 + pad);

    let (x0, y0) = (from.x as f64, from.y as f64);
    let (dx, dy) = (to.x as f64 - x0, to.y as f64 - y0);

    let mut t0 = 0.0f64;
    let mut t1 = 1.0f64;
    for (p, q) in [(-dx, x0 - x_min), (dx, x_max - x0), (-dy, y0 - y_min), (dy, y_max - y0)] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }

        let r = q / p;
        if p < 0.0 {
            if r > t1 {
                return None;
            }
            t0 = t0.max(r);
        } else {
            if r < t0 {
                return None;
            }
            t1 = t1.min(r);
        }
    }

    let point = |t: f64| ((x0 + t * dx).round() as i64, (y0 + t * dy).round() as i64);
    Some((point(t0), point(t1)))
}

fn put_pixel_clipped(image: &mut RgbaImage, x: i64, y: i64, color: Rgba<u8>) {
    if x >= 0 && y >= 0 && x < image.width() as i64 && y < image.height() as i64 {
        image.put_pixel(x as u32, y as u32, color);
    }
}

fn fill_circle(image: &mut RgbaImage, cx: i64, cy: i64, radius: i64, color: Rgba<u8>) {
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= radius * radius {
                put_pixel_clipped(image, cx + dx, cy + dy, color);
            }
        }
    }
}

fn fill_rect(image: &mut RgbaImage, x: i64, y: i64, width: i64, height: i64, color: Rgba<u8>) {
    let x0 = x.max(0);
    let y0 = y.max(0);
    let x1 = (x + width).min(image.width() as i64);
    let y1 = (y + height).min(image.height() as i64);

    for py in y0..y1 {
        for px in x0..x1 {
            image.put_pixel(px as u32, py as u32, color);
        }
    }
}

// Bresenham, thickened by stamping a small square on each step.
// Endpoints are expected to be clipped to the frame already.
fn draw_line(image: &mut RgbaImage, from: (i64, i64), to: (i64, i64), color: Rgba<u8>) {
    let (mut x, mut y) = from;
    let dx = (to.0 - x).abs();
    let dy = -(to.1 - y).abs();
    let sx = if x < to.0 { 1 } else { -1 };
    let sy = if y < to.1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        for oy in -SKELETON_HALF_WIDTH..=SKELETON_HALF_WIDTH {
            for ox in -SKELETON_HALF_WIDTH..=SKELETON_HALF_WIDTH {
                put_pixel_clipped(image, x + ox, y + oy, color);
            }
        }

        if x == to.0 && y == to.1 {
            break;
        }

        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}
