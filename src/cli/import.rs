//! Import command implementation

use std::path::Path;
use std::process::ExitCode;

use crate::catalog::Catalog;

use super::{print_json, report, EXIT_INVALID_ARGS, EXIT_SUCCESS};

/// Execute the import command
pub fn run_import(catalog: &Catalog, archive: &Path, json: bool) -> ExitCode {
    let bytes = match std::fs::read(archive) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error: Cannot read archive '{}': {}", archive.display(), e);
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
    };

    let summary = match catalog.import_archive(&bytes) {
        Ok(summary) => summary,
        Err(e) => return report(&e),
    };

    if json {
        return print_json(&summary);
    }

    println!("Imported: {} (id {}, {} animations)", summary.name, summary.id, summary.animation_count);
    for info in catalog.list_animations(&summary.name) {
        println!(
            "  [{}] {} #{}: {} frames, {}x{}",
            info.id, info.animation_type, info.sequence_index, info.frames, info.width, info.height
        );
    }
    ExitCode::from(EXIT_SUCCESS)
}
