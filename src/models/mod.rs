//! Data models for sprites, their animations and the views built from them.

mod animation;
mod sprite;
mod view;

pub use animation::{Animation, AnimationType};
pub use sprite::{validate_sprite_name, Sprite};
pub use view::{AnimationInfo, SpriteSummary};
