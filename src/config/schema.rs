//! Configuration schema types for `sheetsmith.toml`
//!
//! Defines the structure and validation rules for the storage root, the frame
//! detector tuning constants, import behavior and logging.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Storage section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory holding every stored sprite folder and the catalog
    #[serde(default = "default_root")]
    pub root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { root: default_root() }
    }
}

fn default_root() -> PathBuf {
    PathBuf::from("sprite-storage")
}

/// Tuning constants for frame detection and content bounds.
///
/// The same `alpha_threshold` decides what counts as visible both when
/// counting frames and when cropping an animation to its union bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// A pixel is visible when its alpha is strictly above this value
    #[serde(default = "default_alpha_threshold")]
    pub alpha_threshold: u8,
    /// Opaque runs narrower than this are noise
    #[serde(default = "default_min_block_width")]
    pub min_block_width: u32,
    /// Runs narrower than this fraction of the robust average are noise
    #[serde(default = "default_residual_factor")]
    pub residual_factor: f64,
    /// Runs wider than this multiple of the robust average hold several frames
    #[serde(default = "default_large_block_factor")]
    pub large_block_factor: f64,
    /// Outlier cutoff, in standard deviations from the first-pass mean
    #[serde(default = "default_stddev_multiplier")]
    pub stddev_multiplier: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            alpha_threshold: default_alpha_threshold(),
            min_block_width: default_min_block_width(),
            residual_factor: default_residual_factor(),
            large_block_factor: default_large_block_factor(),
            stddev_multiplier: default_stddev_multiplier(),
        }
    }
}

fn default_alpha_threshold() -> u8 {
    10
}

fn default_min_block_width() -> u32 {
    5
}

fn default_residual_factor() -> f64 {
    0.3
}

fn default_large_block_factor() -> f64 {
    1.9
}

fn default_stddev_multiplier() -> f64 {
    2.0
}

/// Import section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Top-level archive folders starting with this prefix are tool metadata
    #[serde(default = "default_reserved_prefix")]
    pub reserved_prefix: String,
    /// Crop every imported image to its animation's union bounds
    #[serde(default)]
    pub normalize: bool,
    /// Display scale given to newly imported sprites
    #[serde(default = "default_scale")]
    pub default_scale: f32,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            reserved_prefix: default_reserved_prefix(),
            normalize: false,
            default_scale: default_scale(),
        }
    }
}

fn default_reserved_prefix() -> String {
    "__".to_string()
}

fn default_scale() -> f32 {
    1.0
}

/// Logging section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// One of off, error, warn, info, debug, trace
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_level() }
    }
}

fn default_level() -> String {
    "info".to_string()
}

/// Root configuration structure for `sheetsmith.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SheetConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default, rename = "import")]
    pub import_config: ImportConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Validation error for configuration
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    /// Path to the invalid field (e.g., "detection.residual_factor")
    pub field: String,
    /// Error message
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sheetsmith.toml: '{}' {}", self.field, self.message)
    }
}

const LOG_LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];

impl SheetConfig {
    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();
        let mut push = |field: &str, message: &str| {
            errors.push(ConfigValidationError {
                field: field.to_string(),
                message: message.to_string(),
            });
        };

        if self.storage.root.as_os_str().is_empty() {
            push("storage.root", "must be a non-empty path");
        }

        let detection = &self.detection;
        if detection.min_block_width == 0 {
            push("detection.min_block_width", "must be at least 1");
        }
        if !is_positive(detection.residual_factor) {
            push("detection.residual_factor", "must be a positive number");
        }
        if !is_positive(detection.large_block_factor) {
            push("detection.large_block_factor", "must be a positive number");
        }
        if detection.residual_factor >= detection.large_block_factor {
            push("detection.residual_factor", "must be smaller than large_block_factor");
        }
        if !is_positive(detection.stddev_multiplier) {
            push("detection.stddev_multiplier", "must be a positive number");
        }

        if self.import_config.reserved_prefix.is_empty() {
            push("import.reserved_prefix", "must be a non-empty string");
        }
        if !is_positive(self.import_config.default_scale) {
            push("import.default_scale", "must be a positive number");
        }

        if !LOG_LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            push("logging.level", "must be one of off, error, warn, info, debug, trace");
        }

        errors
    }

    /// Check if the configuration is valid
    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }
}

/// Finite and strictly greater than zero
fn is_positive<F: Into<f64>>(value: F) -> bool {
    let value = value.into();
    value.is_finite() && value > 0.0
}
