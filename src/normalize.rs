//! Animation normalization - crops every frame of a strip to shared bounds
//!
//! A strip with `N` frames is cut into `N` slices of `width / N` pixels. The
//! visible content of all slices is enclosed in one union box, and every
//! slice is re-cut at that same box. Using the union rather than each
//! frame's own box keeps the motion between frames intact while trimming
//! the transparent margin common to all of them.

use image::{Rgba, RgbaImage};

/// Transparent color used for areas the source never covers
const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Inclusive pixel rectangle, relative to the frame it was measured in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub min_x: u32,
    pub max_x: u32,
    pub min_y: u32,
    pub max_y: u32,
}

impl Bounds {
    pub fn width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    pub fn height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }

    /// Smallest box holding both
    pub fn union(self, other: Bounds) -> Bounds {
        Bounds {
            min_x: self.min_x.min(other.min_x),
            max_x: self.max_x.max(other.max_x),
            min_y: self.min_y.min(other.min_y),
            max_y: self.max_y.max(other.max_y),
        }
    }

    pub fn contains(&self, other: &Bounds) -> bool {
        self.min_x <= other.min_x
            && self.max_x >= other.max_x
            && self.min_y <= other.min_y
            && self.max_y >= other.max_y
    }
}

/// Result of normalizing one animation strip.
#[derive(Debug, Clone)]
pub struct NormalizedStrip {
    pub image: RgbaImage,
    /// Shared frame box, `None` when the strip had nothing visible
    pub bounds: Option<Bounds>,
}

impl NormalizedStrip {
    /// Dimensions to record for the animation: `(frame_width * N, height)`
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// Width of one slice when `image_width` is cut into `frames` slices.
///
/// Remainder columns past `frames * slice_width` belong to no frame.
pub fn slice_width(image_width: u32, frames: u32) -> u32 {
    image_width / frames.max(1)
}

/// Visible-content box of the slice starting at column `x0`, in slice
/// coordinates.
pub fn content_bounds(image: &RgbaImage, x0: u32, width: u32, alpha_threshold: u8) -> Option<Bounds> {
    let mut bounds: Option<Bounds> = None;

    for x in 0..width {
        for y in 0..image.height() {
            if image.get_pixel(x0 + x, y)[3] > alpha_threshold {
                let point = Bounds { min_x: x, max_x: x, min_y: y, max_y: y };
                bounds = Some(match bounds {
                    Some(b) => b.union(point),
                    None => point,
                });
            }
        }
    }

    bounds
}

/// Per-slice content boxes; slices with nothing visible yield `None`.
pub fn frame_bounds(image: &RgbaImage, frames: u32, alpha_threshold: u8) -> Vec<Option<Bounds>> {
    let frames = frames.max(1);
    let width = slice_width(image.width(), frames);
    (0..frames).map(|i| content_bounds(image, i * width, width, alpha_threshold)).collect()
}

/// Union of every slice's content box.
pub fn union_bounds(image: &RgbaImage, frames: u32, alpha_threshold: u8) -> Option<Bounds> {
    frame_bounds(image, frames, alpha_threshold).into_iter().flatten().reduce(Bounds::union)
}

/// Crop every frame of the strip to the animation's union box.
///
/// The output is `frames * union.width()` by `union.height()`. When no frame
/// has visible content the original image is returned unchanged.
pub fn normalize_animation(image: &RgbaImage, frames: u32, alpha_threshold: u8) -> NormalizedStrip {
    let frames = frames.max(1);
    let source_width = slice_width(image.width(), frames);

    let Some(bounds) = union_bounds(image, frames, alpha_threshold) else {
        return NormalizedStrip { image: image.clone(), bounds: None };
    };

    let frame_width = bounds.width();
    let frame_height = bounds.height();
    let mut output = RgbaImage::from_pixel(frames * frame_width, frame_height, TRANSPARENT);

    for i in 0..frames {
        let source_x = i * source_width;
        let dest_x = i * frame_width;

        for y in 0..frame_height {
            let sy = bounds.min_y + y;
            if sy >= image.height() {
                continue;
            }
            for x in 0..frame_width {
                let sx = bounds.min_x + x;
                if sx >= source_width {
                    continue;
                }
                output.put_pixel(dest_x + x, y, *image.get_pixel(source_x + sx, sy));
            }
        }
    }

    NormalizedStrip { image: output, bounds: Some(bounds) }
}

/// Mirror each frame left-right in place.
///
/// Frame order and boundaries are kept; remainder columns past the last
/// frame are copied untouched.
pub fn flip_frames(image: &RgbaImage, frames: u32) -> RgbaImage {
    let frames = frames.max(1);
    let width = slice_width(image.width(), frames);
    let mut output = image.clone();

    for i in 0..frames {
        let x0 = i * width;
        for y in 0..image.height() {
            for x in 0..width {
                output.put_pixel(x0 + width - 1 - x, y, *image.get_pixel(x0 + x, y));
            }
        }
    }

    output
}
