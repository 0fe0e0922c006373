//! Detect command implementation (frame count of a single image)

use std::path::Path;
use std::process::ExitCode;

use crate::config::DetectionConfig;
use crate::detect::analyze_file;

use super::{print_json, report, EXIT_SUCCESS};

/// Analyze one PNG strip and print its frame count
pub fn run_detect(image: &Path, config: &DetectionConfig, json: bool) -> ExitCode {
    let detection = match analyze_file(image, config) {
        Ok(d) => d,
        Err(e) => return report(&e),
    };

    if json {
        return print_json(&detection);
    }

    println!("{}: {} frames", image.display(), detection.frames);
    println!("  blocks: {:?}", detection.blocks);
    println!("  typical width: {:.1}px", detection.average_width);
    ExitCode::from(EXIT_SUCCESS)
}
