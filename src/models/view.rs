//! Read-only views handed to the API layer.

use serde::Serialize;

use super::animation::{Animation, AnimationType};
use super::sprite::Sprite;

/// Everything a client needs to play one spritesheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnimationInfo {
    pub id: u64,
    pub sprite_name: String,
    /// Relative to the storage root, `<sprite>/<TYPE>/<index>.png`
    pub image_url: String,
    pub width: u32,
    pub height: u32,
    pub frames: u32,
    pub scale: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_rate: Option<u32>,
    #[serde(rename = "type")]
    pub animation_type: AnimationType,
    pub sequence_index: u32,
}

impl AnimationInfo {
    pub fn new(sprite: &Sprite, animation: &Animation) -> Self {
        Self {
            id: animation.id,
            sprite_name: sprite.name.clone(),
            image_url: animation.image_path(&sprite.name),
            width: animation.width,
            height: animation.height,
            frames: animation.frames,
            scale: sprite.scale,
            frame_rate: animation.frame_rate,
            animation_type: animation.animation_type,
            sequence_index: animation.sequence_index,
        }
    }
}

/// One row of the sprite listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpriteSummary {
    pub id: u64,
    pub name: String,
    pub scale: f32,
    pub animation_count: usize,
    /// IDLE sheet #1, when the sprite has one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<AnimationInfo>,
}

impl From<&Sprite> for SpriteSummary {
    fn from(sprite: &Sprite) -> Self {
        Self {
            id: sprite.id,
            name: sprite.name.clone(),
            scale: sprite.scale,
            animation_count: sprite.animations.len(),
            preview: sprite.preview().map(|a| AnimationInfo::new(sprite, a)),
        }
    }
}
