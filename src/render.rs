// Render module: canvas overlay and emotion indicator

use crate::models::{BoundingBox, Detection, Emotion};
use image::{imageops, Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use tracing::debug;

/// Box stroke color (#3B82F6)
pub const STROKE_COLOR: Rgb<u8> = Rgb([59, 130, 246]);
/// Label tag fill color, blended at `TAG_ALPHA`
pub const TAG_COLOR: Rgb<u8> = Rgb([59, 130, 246]);
pub const TAG_ALPHA: f32 = 0.7;
pub const TAG_WIDTH: u32 = 150;
pub const TAG_HEIGHT: u32 = 30;
/// Label text size in canvas pixels
pub const LABEL_FONT_SIZE: f32 = 16.0;

/// Text drawn on top of the label tag, in canvas coordinates
#[derive(Clone, Debug, PartialEq)]
pub struct OverlayLabel {
    pub text: String,
    /// Left edge of the text
    pub x: f32,
    /// Text baseline
    pub y: f32,
}

/// Offscreen drawing surface holding the last captured frame plus its overlay
pub struct Canvas {
    image: RgbImage,
    label: Option<OverlayLabel>,
    revision: u64,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbImage::new(width.max(1), height.max(1)),
            label: None,
            revision: 0,
        }
    }

    /// Resizes the surface, discarding its contents
    pub fn resize(&mut self, width: u32, height: u32) {
        *self = Self {
            revision: self.revision + 1,
            ..Self::new(width, height)
        };
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn label(&self) -> Option<&OverlayLabel> {
        self.label.as_ref()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Bumped on every change so the UI knows when to re-upload
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Paints a captured frame over the whole surface, stretching it if needed
    pub fn draw_frame(&mut self, frame: &RgbImage) {
        if frame.dimensions() == self.image.dimensions() {
            self.image.copy_from_slice(frame.as_raw());
        } else {
            let (width, height) = self.image.dimensions();
            self.image = imageops::resize(frame, width, height, imageops::FilterType::Triangle);
        }
        self.label = None;
        self.revision += 1;
    }

    /// Draws the bounding box, the tag above it, and records the label text
    pub fn draw_detection(&mut self, bbox: &BoundingBox, text: String) {
        self.stroke_box(bbox);
        self.fill_tag(bbox.x, bbox.y - f64::from(TAG_HEIGHT));
        self.label = Some(OverlayLabel {
            text,
            x: (bbox.x + 5.0) as f32,
            y: (bbox.y - 10.0) as f32,
        });
        self.revision += 1;
    }

    fn stroke_box(&mut self, bbox: &BoundingBox) {
        let width = bbox.width.round();
        let height = bbox.height.round();
        if !(width >= 1.0 && height >= 1.0 && bbox.x.is_finite() && bbox.y.is_finite()) {
            debug!("Skipping degenerate box {:?}", bbox);
            return;
        }

        let (canvas_w, canvas_h) = self.image.dimensions();
        let (canvas_w, canvas_h) = (f64::from(canvas_w), f64::from(canvas_h));
        let left = bbox.x.round();
        let top = bbox.y.round();
        let right = left + width;
        let bottom = top + height;
        if right <= 0.0 || bottom <= 0.0 || left >= canvas_w || top >= canvas_h {
            return;
        }

        // Edges pulled in to just past the canvas stay invisible, and keep the math in i32
        let left = left.max(-2.0) as i32;
        let top = top.max(-2.0) as i32;
        let right = right.min(canvas_w + 2.0) as i32;
        let bottom = bottom.min(canvas_h + 2.0) as i32;
        let (width, height) = ((right - left) as u32, (bottom - top) as u32);

        // Two nested one-pixel outlines give a 2px stroke inside the box
        draw_hollow_rect_mut(&mut self.image, Rect::at(left, top).of_size(width, height), STROKE_COLOR);
        if width > 2 && height > 2 {
            draw_hollow_rect_mut(
                &mut self.image,
                Rect::at(left + 1, top + 1).of_size(width - 2, height - 2),
                STROKE_COLOR,
            );
        }
    }

    fn fill_tag(&mut self, left: f64, top: f64) {
        let (canvas_w, canvas_h) = self.image.dimensions();
        let (max_x, max_y) = (f64::from(canvas_w), f64::from(canvas_h));
        let (left, top) = (left.round(), top.round());

        // Float clamps saturate instead of overflowing; NaN casts to 0
        let x0 = left.clamp(0.0, max_x) as u32;
        let y0 = top.clamp(0.0, max_y) as u32;
        let x1 = (left + f64::from(TAG_WIDTH)).clamp(0.0, max_x) as u32;
        let y1 = (top + f64::from(TAG_HEIGHT)).clamp(0.0, max_y) as u32;

        for y in y0..y1 {
            for x in x0..x1 {
                let pixel = self.image.get_pixel_mut(x, y);
                for (channel, tint) in pixel.0.iter_mut().zip(TAG_COLOR.0) {
                    let blended = f32::from(tint) * TAG_ALPHA + f32::from(*channel) * (1.0 - TAG_ALPHA);
                    *channel = blended.round() as u8;
                }
            }
        }
    }
}

/// The on-screen "current emotion" readout
#[derive(Debug, Default)]
pub struct Indicator {
    current: Option<Emotion>,
}

impl Indicator {
    pub fn current(&self) -> Option<Emotion> {
        self.current
    }

    pub fn set(&mut self, emotion: Emotion) {
        self.current = Some(emotion);
    }

    pub fn clear(&mut self) {
        self.current = None;
    }
}

/// Applies one detection to the display
///
/// Returns `false` and changes nothing when the emotion name is not one of the known set.
pub fn render_detection(canvas: &mut Canvas, indicator: &mut Indicator, detection: &Detection) -> bool {
    let Some(emotion) = detection.matched_emotion() else {
        debug!("Ignoring unknown emotion {:?}", detection.emotion);
        return false;
    };

    indicator.set(emotion);

    let emoji = detection.emoji.as_deref().unwrap_or(emotion.emoji());
    canvas.draw_detection(&detection.bbox, format!("{emoji} {}", detection.emotion));
    true
}
