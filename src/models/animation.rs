//! Animation-related types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Category of motion a spritesheet belongs to.
///
/// The serialized form is the upper-case folder name used both inside
/// imported archives and in the storage layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AnimationType {
    Idle,
    Walk,
    Attack,
}

impl AnimationType {
    /// All recognized types, in the order folders are processed
    pub const ALL: [AnimationType; 3] = [AnimationType::Idle, AnimationType::Walk, AnimationType::Attack];

    /// Folder name for this type (`IDLE`, `WALK`, `ATTACK`)
    pub fn folder_name(self) -> &'static str {
        match self {
            AnimationType::Idle => "IDLE",
            AnimationType::Walk => "WALK",
            AnimationType::Attack => "ATTACK",
        }
    }
}

impl fmt::Display for AnimationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.folder_name())
    }
}

impl FromStr for AnimationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AnimationType::ALL
            .into_iter()
            .find(|t| t.folder_name() == s)
            .ok_or_else(|| format!("unknown animation type '{}'", s))
    }
}

/// One spritesheet image of a sprite.
///
/// `width` and `height` describe the stored image; each of the `frames`
/// occupies `width / frames` pixels of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Animation {
    pub id: u64,
    /// Owning sprite (lookup only, the sprite owns this animation)
    pub sprite_id: u64,
    #[serde(rename = "type")]
    pub animation_type: AnimationType,
    /// 1-based position among same-type images, from filename order
    pub sequence_index: u32,
    pub frames: u32,
    pub width: u32,
    pub height: u32,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub frame_rate: Option<u32>,
}

impl Animation {
    /// Path of the stored image relative to the storage root
    pub fn image_path(&self, sprite_name: &str) -> String {
        format!("{}/{}/{}.png", sprite_name, self.animation_type, self.sequence_index)
    }

    /// Width of one frame in the stored image
    pub fn frame_width(&self) -> u32 {
        self.width / self.frames.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn walk() -> Animation {
        Animation {
            id: 4,
            sprite_id: 1,
            animation_type: AnimationType::Walk,
            sequence_index: 2,
            frames: 6,
            width: 192,
            height: 40,
            frame_rate: None,
        }
    }

    #[test]
    fn test_type_round_trip_names() {
        for t in AnimationType::ALL {
            assert_eq!(t.folder_name().parse::<AnimationType>().unwrap(), t);
        }
        assert!("idle".parse::<AnimationType>().is_err());
        assert!("RUN".parse::<AnimationType>().is_err());
    }

    #[test]
    fn test_type_serializes_upper_case() {
        assert_eq!(serde_json::to_string(&AnimationType::Attack).unwrap(), "\"ATTACK\"");
    }

    #[test]
    fn test_image_path() {
        assert_eq!(walk().image_path("knight"), "knight/WALK/2.png");
    }

    #[test]
    fn test_frame_width() {
        assert_eq!(walk().frame_width(), 32);
        let degenerate = Animation { frames: 0, ..walk() };
        assert_eq!(degenerate.frame_width(), 192);
    }

    #[test]
    fn test_serde_uses_type_key_and_skips_missing_rate() {
        let json = serde_json::to_value(walk()).unwrap();
        assert_eq!(json["type"], "WALK");
        assert!(json.get("frame_rate").is_none());

        let back: Animation = serde_json::from_value(json).unwrap();
        assert_eq!(back, walk());
    }
}
