//! On-disk catalog of sprites and animations.
//!
//! Stored as JSON in `.sheetsmith-catalog.json` at the storage root:
//!
//! ```json
//! {
//!   "version": 1,
//!   "next_sprite_id": 3,
//!   "next_animation_id": 9,
//!   "sprites": [
//!     {
//!       "id": 1,
//!       "name": "knight",
//!       "scale": 1.0,
//!       "animations": [
//!         { "id": 1, "sprite_id": 1, "type": "IDLE", "sequence_index": 1,
//!           "frames": 4, "width": 128, "height": 32 }
//!       ]
//!     }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::models::{Animation, Sprite};

/// Current catalog format version.
const CATALOG_VERSION: u32 = 1;

/// Catalog filename inside the storage root.
pub const CATALOG_FILENAME: &str = ".sheetsmith-catalog.json";

/// Error during catalog persistence.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CatalogError {
    /// IO error
    #[error("Catalog IO error: {0}")]
    Io(#[from] std::io::Error),
    /// JSON parsing error
    #[error("Catalog JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// Version mismatch
    #[error("Catalog version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

/// Every sprite known to the catalog plus id counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogManifest {
    pub version: u32,
    pub next_sprite_id: u64,
    pub next_animation_id: u64,
    #[serde(default)]
    pub sprites: Vec<Sprite>,
}

impl Default for CatalogManifest {
    fn default() -> Self {
        Self { version: CATALOG_VERSION, next_sprite_id: 1, next_animation_id: 1, sprites: Vec::new() }
    }
}

impl CatalogManifest {
    /// Load a catalog from a file.
    ///
    /// Returns `Ok(None)` if the file doesn't exist.
    pub fn load(path: &Path) -> Result<Option<Self>, CatalogError> {
        if !path.exists() {
            return Ok(None);
        }

        let file = File::open(path)?;
        let manifest: CatalogManifest = serde_json::from_reader(BufReader::new(file))?;

        if manifest.version != CATALOG_VERSION {
            return Err(CatalogError::VersionMismatch {
                expected: CATALOG_VERSION,
                found: manifest.version,
            });
        }

        Ok(Some(manifest))
    }

    /// Load from the default location in the storage root, empty if absent.
    pub fn load_from_dir(root: &Path) -> Result<Self, CatalogError> {
        Ok(Self::load(&root.join(CATALOG_FILENAME))?.unwrap_or_default())
    }

    /// Save through a sibling temp file and rename, so a crash never leaves
    /// a truncated catalog behind.
    pub fn save(&self, path: &Path) -> Result<(), CatalogError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp = path.with_extension("json.tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            serde_json::to_writer_pretty(&mut writer, self)?;
            writer.flush()?;
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn save_to_dir(&self, root: &Path) -> Result<(), CatalogError> {
        self.save(&root.join(CATALOG_FILENAME))
    }

    pub fn allocate_sprite_id(&mut self) -> u64 {
        let id = self.next_sprite_id;
        self.next_sprite_id += 1;
        id
    }

    pub fn allocate_animation_id(&mut self) -> u64 {
        let id = self.next_animation_id;
        self.next_animation_id += 1;
        id
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sprite(name).is_some()
    }

    pub fn sprite(&self, name: &str) -> Option<&Sprite> {
        self.sprites.iter().find(|s| s.name == name)
    }

    pub fn sprite_mut(&mut self, name: &str) -> Option<&mut Sprite> {
        self.sprites.iter_mut().find(|s| s.name == name)
    }

    /// Find an animation and its owning sprite.
    pub fn animation(&self, id: u64) -> Option<(&Sprite, &Animation)> {
        self.sprites.iter().find_map(|s| s.animation(id).map(|a| (s, a)))
    }

    pub fn animation_mut(&mut self, id: u64) -> Option<&mut Animation> {
        self.sprites.iter_mut().find_map(|s| s.animation_mut(id))
    }

    /// Remove a sprite by name, returning it.
    pub fn remove(&mut self, name: &str) -> Option<Sprite> {
        let index = self.sprites.iter().position(|s| s.name == name)?;
        Some(self.sprites.remove(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AnimationType;
    use tempfile::TempDir;

    fn sample() -> CatalogManifest {
        let mut manifest = CatalogManifest::default();
        let sprite_id = manifest.allocate_sprite_id();
        let mut sprite = Sprite::new(sprite_id, "knight", 1.5);
        for index in 1..=2 {
            let id = manifest.allocate_animation_id();
            sprite.add_animation(Animation {
                id,
                sprite_id: 0,
                animation_type: AnimationType::Walk,
                sequence_index: index,
                frames: 4,
                width: 64,
                height: 16,
                frame_rate: None,
            });
        }
        manifest.sprites.push(sprite);
        manifest
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let temp = TempDir::new().unwrap();
        assert!(CatalogManifest::load(&temp.path().join(CATALOG_FILENAME)).unwrap().is_none());
        let manifest = CatalogManifest::load_from_dir(temp.path()).unwrap();
        assert!(manifest.sprites.is_empty());
        assert_eq!(manifest.next_sprite_id, 1);
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let manifest = sample();
        manifest.save_to_dir(temp.path()).unwrap();
        assert!(!temp.path().join(".sheetsmith-catalog.json.tmp").exists());

        let loaded = CatalogManifest::load_from_dir(temp.path()).unwrap();
        assert_eq!(loaded, manifest);
        assert_eq!(loaded.next_animation_id, 3);
    }

    #[test]
    fn test_version_mismatch() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CATALOG_FILENAME);
        fs::write(&path, r#"{"version": 99, "next_sprite_id": 1, "next_animation_id": 1}"#).unwrap();
        let result = CatalogManifest::load(&path);
        assert!(matches!(result, Err(CatalogError::VersionMismatch { expected: 1, found: 99 })));
    }

    #[test]
    fn test_corrupt_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CATALOG_FILENAME);
        fs::write(&path, "{ nope").unwrap();
        assert!(matches!(CatalogManifest::load(&path), Err(CatalogError::Json(_))));
    }

    #[test]
    fn test_lookups() {
        let mut manifest = sample();
        assert!(manifest.contains("knight"));
        assert!(!manifest.contains("slime"));

        let (sprite, animation) = manifest.animation(2).unwrap();
        assert_eq!(sprite.name, "knight");
        assert_eq!(animation.sequence_index, 2);
        assert!(manifest.animation(42).is_none());

        manifest.animation_mut(1).unwrap().width = 40;
        assert_eq!(manifest.sprite("knight").unwrap().animations[0].width, 40);

        let removed = manifest.remove("knight").unwrap();
        assert_eq!(removed.animations.len(), 2);
        assert!(manifest.remove("knight").is_none());
    }
}
