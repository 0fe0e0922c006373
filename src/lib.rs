//! Sheetsmith - Library for ingesting and normalizing spritesheet strips
//!
//! This library provides functionality to:
//! - Extract sprite archives (one folder per sprite, one subfolder per animation type)
//! - Detect how many frames a horizontal strip holds
//! - Crop every frame of an animation to one shared, minimal box
//! - Keep stored images and catalog metadata consistent under a storage root

pub mod archive;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod detect;
pub mod error;
pub mod logging;
pub mod models;
pub mod normalize;
pub mod store;

pub use catalog::Catalog;
pub use config::SheetConfig;
pub use error::SheetError;
