//! Frame count detection for horizontal spritesheet strips.
//!
//! Frames in a hand-authored strip are separated by fully transparent
//! columns, but spacing is irregular: stray pixels leave thin slivers and
//! touching poses merge into one wide block. Detection works on column
//! occupancy only:
//!
//! 1. Mark every column holding at least one visible pixel
//! 2. Collapse the columns into opaque runs ("blocks")
//! 3. Estimate the typical frame width with outliers rejected
//! 4. Drop slivers, split over-wide blocks, count the rest as one frame each

use image::RgbaImage;
use serde::Serialize;
use std::path::Path;

use crate::config::DetectionConfig;
use crate::error::SheetError;

/// How a single opaque block contributes to the frame count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// Sliver too thin to be a pose
    Noise,
    /// One frame
    Standard,
    /// Several touching frames, holding this many
    Merged(u32),
}

impl BlockKind {
    pub fn frames(self) -> u32 {
        match self {
            BlockKind::Noise => 0,
            BlockKind::Standard => 1,
            BlockKind::Merged(n) => n,
        }
    }
}

/// Full result of analyzing one strip, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameDetection {
    /// Width of each opaque run, left to right
    pub blocks: Vec<u32>,
    /// Robust typical frame width, 0.0 when no usable block exists
    pub average_width: f64,
    /// Detected frame count, always at least 1
    pub frames: u32,
}

/// Count the frames in a horizontal strip.
///
/// Pure and deterministic: identical pixels always give the same count.
/// Empty or fully transparent images count as a single frame.
pub fn detect_frames(image: &RgbaImage, config: &DetectionConfig) -> u32 {
    analyze_strip(image, config).frames
}

/// Run detection and keep the intermediate block widths and average.
pub fn analyze_strip(image: &RgbaImage, config: &DetectionConfig) -> FrameDetection {
    let columns = scan_columns(image, config.alpha_threshold);
    let blocks = opaque_runs(&columns);

    if blocks.is_empty() {
        return FrameDetection { blocks, average_width: 0.0, frames: 1 };
    }

    let average_width = robust_average_width(&blocks, config);
    if average_width == 0.0 {
        return FrameDetection { blocks, average_width, frames: 1 };
    }

    let frames = count_frames(&blocks, average_width, config);
    FrameDetection { blocks, average_width, frames }
}

/// Decode a PNG and count its frames.
pub fn detect_frames_in_file(path: &Path, config: &DetectionConfig) -> Result<u32, SheetError> {
    analyze_file(path, config).map(|d| d.frames)
}

/// Decode a PNG and run the full analysis on it.
pub fn analyze_file(path: &Path, config: &DetectionConfig) -> Result<FrameDetection, SheetError> {
    let image = image::open(path).map_err(|e| SheetError::unreadable(path, e))?.to_rgba8();
    let detection = analyze_strip(&image, config);
    log::debug!(
        "{}: {}x{}, blocks {:?}, average {:.1}px -> {} frames",
        path.display(),
        image.width(),
        image.height(),
        detection.blocks,
        detection.average_width,
        detection.frames
    );
    Ok(detection)
}

/// One flag per column: does it hold a pixel with alpha above the threshold?
pub fn scan_columns(image: &RgbaImage, alpha_threshold: u8) -> Vec<bool> {
    let (width, height) = image.dimensions();
    (0..width)
        .map(|x| (0..height).any(|y| image.get_pixel(x, y)[3] > alpha_threshold))
        .collect()
}

/// Lengths of consecutive `true` runs. A run reaching the last column still
/// counts.
pub fn opaque_runs(columns: &[bool]) -> Vec<u32> {
    let mut runs = Vec::new();
    let mut current = 0u32;

    for &opaque in columns {
        if opaque {
            current += 1;
        } else if current > 0 {
            runs.push(current);
            current = 0;
        }
    }

    if current > 0 {
        runs.push(current);
    }

    runs
}

/// Typical block width with outliers removed.
///
/// Blocks under `min_block_width` are ignored entirely. The mean of the rest
/// is recomputed over the blocks within `stddev_multiplier` population
/// standard deviations of it. Returns 0.0 when no block is wide enough.
pub fn robust_average_width(blocks: &[u32], config: &DetectionConfig) -> f64 {
    let widths: Vec<f64> = blocks
        .iter()
        .filter(|&&w| w >= config.min_block_width)
        .map(|&w| w as f64)
        .collect();

    if widths.is_empty() {
        return 0.0;
    }

    let mean = widths.iter().sum::<f64>() / widths.len() as f64;
    let variance = widths.iter().map(|w| (w - mean) * (w - mean)).sum::<f64>() / widths.len() as f64;
    let cutoff = config.stddev_multiplier * variance.sqrt();

    let kept: Vec<f64> = widths.iter().copied().filter(|w| (w - mean).abs() <= cutoff).collect();
    if kept.is_empty() {
        mean
    } else {
        kept.iter().sum::<f64>() / kept.len() as f64
    }
}

/// Decide what one block contributes given the typical width.
pub fn classify_block(width: u32, average_width: f64, config: &DetectionConfig) -> BlockKind {
    let w = width as f64;
    if width < config.min_block_width || w < average_width * config.residual_factor {
        BlockKind::Noise
    } else if w > average_width * config.large_block_factor {
        BlockKind::Merged(((w / average_width).floor() as u32).max(1))
    } else {
        BlockKind::Standard
    }
}

/// Sum block contributions, never reporting fewer than one frame.
pub fn count_frames(blocks: &[u32], average_width: f64, config: &DetectionConfig) -> u32 {
    let total: u32 = blocks
        .iter()
        .map(|&w| {
            let kind = classify_block(w, average_width, config);
            log::trace!("block {}px -> {:?}", w, kind);
            kind.frames()
        })
        .sum();
    total.max(1)
}
