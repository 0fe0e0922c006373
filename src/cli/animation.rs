//! Animation maintenance commands (rebuild, flip)

use std::process::ExitCode;

use crate::catalog::Catalog;
use crate::error::SheetError;
use crate::models::AnimationInfo;

use super::show::describe;
use super::{print_json, report, EXIT_SUCCESS};

/// Re-normalize a stored animation
pub fn run_rebuild(catalog: &Catalog, id: u64, json: bool) -> ExitCode {
    finish("Rebuilt", catalog.rebuild_animation(id), json)
}

/// Mirror every frame of a stored animation
pub fn run_flip(catalog: &Catalog, id: u64, json: bool) -> ExitCode {
    finish("Flipped", catalog.flip_animation(id), json)
}

fn finish(verb: &str, result: Result<AnimationInfo, SheetError>, json: bool) -> ExitCode {
    match result {
        Ok(info) if json => print_json(&info),
        Ok(info) => {
            println!("{}: {}", verb, describe(&info).trim_start());
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => report(&e),
    }
}
