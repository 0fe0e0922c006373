//! Sprite maintenance commands (rename, delete, read)

use std::io::Write;
use std::path::Path;
use std::process::ExitCode;

use crate::catalog::Catalog;

use super::{print_json, report, EXIT_ERROR, EXIT_SUCCESS};

/// Rename a sprite and/or change its scale
pub fn run_rename(catalog: &Catalog, old: &str, new: &str, scale: Option<f32>, json: bool) -> ExitCode {
    match catalog.rename_sprite(old, new, scale) {
        Ok(summary) if json => print_json(&summary),
        Ok(summary) => {
            println!("Renamed: {} -> {} (scale {})", old, summary.name, summary.scale);
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => report(&e),
    }
}

/// Delete a sprite
pub fn run_delete(catalog: &Catalog, name: &str) -> ExitCode {
    match catalog.delete_sprite(name) {
        Ok(()) => {
            println!("Deleted: {}", name);
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => report(&e),
    }
}

/// Copy a stored file to `output`, or to stdout
pub fn run_read(catalog: &Catalog, path: &str, output: Option<&Path>) -> ExitCode {
    let bytes = match catalog.read_asset(path) {
        Ok(bytes) => bytes,
        Err(e) => return report(&e),
    };

    let written = match output {
        Some(out) => std::fs::write(out, &bytes).map(|_| {
            eprintln!(
                "Wrote {} ({} bytes, {})",
                out.display(),
                bytes.len(),
                catalog.asset_content_type(path)
            );
        }),
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&bytes).and_then(|_| stdout.flush())
        }
    };

    match written {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            eprintln!("Error: Failed to write output: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}
