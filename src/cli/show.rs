//! Listing commands (list, animations)

use std::process::ExitCode;

use crate::catalog::Catalog;
use crate::error::SheetError;
use crate::models::AnimationInfo;

use super::{print_json, report, EXIT_SUCCESS};

/// List every sprite with its preview animation
pub fn run_list(catalog: &Catalog, json: bool) -> ExitCode {
    let sprites = catalog.list_sprites();
    if json {
        return print_json(&sprites);
    }

    if sprites.is_empty() {
        println!("No sprites in {}", catalog.root().display());
        return ExitCode::from(EXIT_SUCCESS);
    }

    for sprite in &sprites {
        let preview = match &sprite.preview {
            Some(p) => format!("{} ({} frames, {}x{})", p.image_url, p.frames, p.width, p.height),
            None => "no IDLE preview".to_string(),
        };
        println!(
            "{:>4}  {:<20} scale {:<5} {} animations, {}",
            sprite.id, sprite.name, sprite.scale, sprite.animation_count, preview
        );
    }
    ExitCode::from(EXIT_SUCCESS)
}

/// List the animations of one sprite
pub fn run_animations(catalog: &Catalog, sprite_name: &str, json: bool) -> ExitCode {
    if catalog.sprite(sprite_name).is_none() {
        return report(&SheetError::AssetNotFound(format!("sprite '{}'", sprite_name)));
    }

    let animations = catalog.list_animations(sprite_name);
    if json {
        return print_json(&animations);
    }

    for info in &animations {
        println!("{}", describe(info));
    }
    ExitCode::from(EXIT_SUCCESS)
}

/// One-line description of an animation
pub(crate) fn describe(info: &AnimationInfo) -> String {
    format!(
        "{:>4}  {:<6} #{:<3} {:>3} frames  {}x{}  {}",
        info.id,
        info.animation_type,
        info.sequence_index,
        info.frames,
        info.width,
        info.height,
        info.image_url
    )
}
