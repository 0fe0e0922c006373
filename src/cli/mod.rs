//! Command-line interface implementation
//!
//! This module provides the CLI entry point and dispatches to submodules
//! for specific command implementations.

mod animation;
mod detect;
mod import;
mod show;
mod sprite;

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;

use crate::catalog::Catalog;
use crate::config::{load_config, merge_cli_overrides, CliOverrides, SheetConfig};
use crate::error::SheetError;
use crate::logging::init_logging;

/// Exit codes
pub(crate) const EXIT_SUCCESS: u8 = 0;
pub(crate) const EXIT_ERROR: u8 = 1;
pub(crate) const EXIT_INVALID_ARGS: u8 = 2;

/// Sheetsmith - import spritesheet archives, detect frames and normalize animations
#[derive(Parser)]
#[command(name = "sheetsmith")]
#[command(about = "Sheetsmith - import spritesheet archives, detect frames and normalize animations")]
#[command(version)]
pub struct Cli {
    /// Path to sheetsmith.toml (default: search upward from the current directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Storage root, overriding the config file
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Log debug detail to stderr
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Import a zip archive holding one sprite folder with IDLE/WALK/ATTACK images
    Import {
        /// Archive to import
        archive: PathBuf,

        /// Crop every imported image to its animation's shared frame box
        #[arg(long)]
        normalize: bool,
    },
    /// List every sprite in the catalog
    List,
    /// List the animations of one sprite
    Animations {
        /// Sprite name
        sprite: String,
    },
    /// Re-crop a stored animation so every frame shares the tightest box
    Rebuild {
        /// Animation id
        id: u64,
    },
    /// Mirror every frame of a stored animation left-right
    Flip {
        /// Animation id
        id: u64,
    },
    /// Rename a sprite and/or change its display scale
    Rename {
        /// Current name
        old: String,
        /// New name (may equal the current name to change only the scale)
        new: String,

        /// New display scale
        #[arg(long)]
        scale: Option<f32>,
    },
    /// Remove a sprite and its stored images
    Delete {
        /// Sprite name
        name: String,
    },
    /// Copy a stored file out of the catalog
    Read {
        /// Path relative to the storage root, e.g. knight/IDLE/1.png
        path: String,

        /// Destination file (default: write to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Count the frames of a single PNG strip without storing it
    Detect {
        /// Image to analyze
        image: PathBuf,
    },
}

/// Parse arguments, set up config and logging, run the command
pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let config = match resolve_config(&cli) {
        Ok(config) => config,
        Err(code) => return code,
    };

    if let Err(e) = init_logging(&config.logging.level) {
        eprintln!("Error: {}", e);
        return ExitCode::from(EXIT_ERROR);
    }

    let json = cli.json;
    match cli.command {
        Commands::Detect { image } => detect::run_detect(&image, &config.detection, json),
        Commands::Import { archive, .. } => with_catalog(&config, |c| import::run_import(c, &archive, json)),
        Commands::List => with_catalog(&config, |c| show::run_list(c, json)),
        Commands::Animations { sprite } => with_catalog(&config, |c| show::run_animations(c, &sprite, json)),
        Commands::Rebuild { id } => with_catalog(&config, |c| animation::run_rebuild(c, id, json)),
        Commands::Flip { id } => with_catalog(&config, |c| animation::run_flip(c, id, json)),
        Commands::Rename { old, new, scale } => {
            with_catalog(&config, |c| sprite::run_rename(c, &old, &new, scale, json))
        }
        Commands::Delete { name } => with_catalog(&config, |c| sprite::run_delete(c, &name)),
        Commands::Read { path, output } => {
            with_catalog(&config, |c| sprite::run_read(c, &path, output.as_deref()))
        }
    }
}

/// Open the stored catalog and run one command against it.
fn with_catalog(config: &SheetConfig, command: impl FnOnce(&Catalog) -> ExitCode) -> ExitCode {
    match Catalog::open(config) {
        Ok(catalog) => command(&catalog),
        Err(e) => report(&e),
    }
}

/// Load sheetsmith.toml and apply command-line overrides.
fn resolve_config(cli: &Cli) -> Result<SheetConfig, ExitCode> {
    let mut config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            return Err(ExitCode::from(EXIT_INVALID_ARGS));
        }
    };

    let log_level = if cli.verbose {
        Some("debug".to_string())
    } else if cli.quiet {
        Some("error".to_string())
    } else {
        None
    };
    let normalize = match &cli.command {
        Commands::Import { normalize: true, .. } => Some(true),
        _ => None,
    };

    let overrides = CliOverrides { root: cli.root.clone(), log_level, normalize };
    merge_cli_overrides(&mut config, &overrides);
    Ok(config)
}

/// Print an error with its stable kind and pick the exit code.
pub(crate) fn report(err: &SheetError) -> ExitCode {
    eprintln!("error[{}]: {}", err.kind(), err);
    ExitCode::from(exit_code(err))
}

fn exit_code(err: &SheetError) -> u8 {
    match err {
        SheetError::InvalidRequest(_) => EXIT_INVALID_ARGS,
        _ => EXIT_ERROR,
    }
}

/// Print `value` as pretty JSON.
pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(text) => {
            println!("{}", text);
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => {
            eprintln!("Error: Failed to serialize output: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}
