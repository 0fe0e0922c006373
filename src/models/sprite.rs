//! Sprite-related types.

use serde::{Deserialize, Serialize};

use super::animation::{Animation, AnimationType};

/// A named character with its spritesheet animations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sprite {
    pub id: u64,
    /// Unique across the catalog; also the storage folder name
    pub name: String,
    /// Display multiplier
    pub scale: f32,
    #[serde(default)]
    pub animations: Vec<Animation>,
}

impl Sprite {
    pub fn new(id: u64, name: impl Into<String>, scale: f32) -> Self {
        Self { id, name: name.into(), scale, animations: Vec::new() }
    }

    /// Attach an animation, pointing its back-reference at this sprite.
    pub fn add_animation(&mut self, mut animation: Animation) {
        animation.sprite_id = self.id;
        self.animations.push(animation);
    }

    pub fn animation(&self, id: u64) -> Option<&Animation> {
        self.animations.iter().find(|a| a.id == id)
    }

    pub fn animation_mut(&mut self, id: u64) -> Option<&mut Animation> {
        self.animations.iter_mut().find(|a| a.id == id)
    }

    /// The animation shown in listings: IDLE sheet #1, if any.
    pub fn preview(&self) -> Option<&Animation> {
        self.animations
            .iter()
            .find(|a| a.animation_type == AnimationType::Idle && a.sequence_index == 1)
    }

    /// Animation types present, in canonical order
    pub fn animation_types(&self) -> Vec<AnimationType> {
        AnimationType::ALL
            .into_iter()
            .filter(|t| self.animations.iter().any(|a| a.animation_type == *t))
            .collect()
    }
}

/// Check that a name can be used as a single storage folder.
pub fn validate_sprite_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("sprite name must not be empty".to_string());
    }
    if name.starts_with('.') {
        return Err(format!("sprite name '{}' must not start with '.'", name));
    }
    if name.contains(['/', '\\']) || name.contains('\0') {
        return Err(format!("sprite name '{}' must not contain path separators", name));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anim(id: u64, animation_type: AnimationType, sequence_index: u32) -> Animation {
        Animation {
            id,
            sprite_id: 0,
            animation_type,
            sequence_index,
            frames: 1,
            width: 10,
            height: 10,
            frame_rate: None,
        }
    }

    #[test]
    fn test_add_animation_sets_back_reference() {
        let mut sprite = Sprite::new(9, "slime", 1.0);
        sprite.add_animation(anim(1, AnimationType::Walk, 1));
        assert_eq!(sprite.animations[0].sprite_id, 9);
        assert!(sprite.animation(1).is_some());
        assert!(sprite.animation(2).is_none());
    }

    #[test]
    fn test_preview_is_first_idle() {
        let mut sprite = Sprite::new(1, "slime", 1.0);
        sprite.add_animation(anim(1, AnimationType::Walk, 1));
        sprite.add_animation(anim(2, AnimationType::Idle, 2));
        assert!(sprite.preview().is_none());

        sprite.add_animation(anim(3, AnimationType::Idle, 1));
        assert_eq!(sprite.preview().map(|a| a.id), Some(3));
    }

    #[test]
    fn test_animation_types_in_canonical_order() {
        let mut sprite = Sprite::new(1, "slime", 1.0);
        sprite.add_animation(anim(1, AnimationType::Attack, 1));
        sprite.add_animation(anim(2, AnimationType::Idle, 1));
        sprite.add_animation(anim(3, AnimationType::Idle, 2));
        assert_eq!(sprite.animation_types(), vec![AnimationType::Idle, AnimationType::Attack]);
    }

    #[test]
    fn test_validate_sprite_name() {
        assert!(validate_sprite_name("knight").is_ok());
        assert!(validate_sprite_name("dark knight 2").is_ok());
        assert!(validate_sprite_name("").is_err());
        assert!(validate_sprite_name("   ").is_err());
        assert!(validate_sprite_name("..").is_err());
        assert!(validate_sprite_name(".hidden").is_err());
        assert!(validate_sprite_name("a/b").is_err());
        assert!(validate_sprite_name("a\\b").is_err());
    }
}
