//! The sprite catalog: import, query and maintain stored spritesheets.
//!
//! A [`Catalog`] owns the [`AssetStore`] and the persisted
//! [`CatalogManifest`]. Every mutation is applied to a copy of the manifest,
//! saved, and only then swapped in, so a failed save leaves the in-memory
//! catalog untouched. Image files touched before the save are put back.
//!
//! Lock order is the store's per-name locks first, then catalog state. The
//! state lock is only held for lookups and commits, never across image
//! decoding or encoding. Imports hold it only to reserve the name and to
//! commit; the copy/decode/detect work in between runs in parallel.

mod manifest;

pub use manifest::{CatalogError, CatalogManifest, CATALOG_FILENAME};

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use image::RgbaImage;
use rayon::prelude::*;

use crate::archive::{extract_archive, ExtractedArchive};
use crate::config::SheetConfig;
use crate::detect::detect_frames;
use crate::error::SheetError;
use crate::models::{validate_sprite_name, Animation, AnimationInfo, Sprite, SpriteSummary};
use crate::normalize::{flip_frames, normalize_animation};
use crate::store::{content_type, AssetStore, StoredImage};

/// Catalog contents plus names whose import is in flight.
#[derive(Debug, Default)]
struct CatalogState {
    manifest: CatalogManifest,
    reserved: HashSet<String>,
}

/// Geometry measured for one stored image during import.
#[derive(Debug, Clone, Copy)]
struct Measured {
    frames: u32,
    width: u32,
    height: u32,
}

/// Sprite catalog bound to one storage root.
#[derive(Debug)]
pub struct Catalog {
    config: SheetConfig,
    store: AssetStore,
    state: Mutex<CatalogState>,
}

impl Catalog {
    /// Open the catalog at `config.storage.root`, creating the root and
    /// starting empty when no manifest exists yet.
    pub fn open(config: &SheetConfig) -> Result<Self, SheetError> {
        let store = AssetStore::open(&config.storage.root)?;
        let manifest = CatalogManifest::load_from_dir(store.root())?;
        log::info!(
            "opened catalog at {} ({} sprites)",
            store.root().display(),
            manifest.sprites.len()
        );

        Ok(Self {
            config: config.clone(),
            store,
            state: Mutex::new(CatalogState { manifest, reserved: HashSet::new() }),
        })
    }

    pub fn config(&self) -> &SheetConfig {
        &self.config
    }

    /// Absolute storage root
    pub fn root(&self) -> &Path {
        self.store.root()
    }

    // ------------------------------------------------------------------
    // Import
    // ------------------------------------------------------------------

    /// Import a zip archive holding one sprite folder.
    ///
    /// All-or-nothing: on any failure the sprite folder is removed and the
    /// catalog is unchanged. Images that cannot be decoded are recorded as
    /// single-frame animations instead of failing the import.
    pub fn import_archive(&self, bytes: &[u8]) -> Result<SpriteSummary, SheetError> {
        let extracted = extract_archive(bytes, &self.config.import_config.reserved_prefix)?;
        let name = extracted.sprite_name().to_string();
        validate_sprite_name(&name).map_err(SheetError::InvalidArchiveStructure)?;

        let _reservation = self.reserve(&name)?;
        log::info!("importing sprite '{}' ({} files)", name, extracted.file_count());

        match self.ingest(&extracted, &name) {
            Ok(summary) => Ok(summary),
            Err(e) => {
                log::warn!("import of '{}' failed, cleaning up: {}", name, e);
                self.store.with_sprite(&name, || self.store.delete_folder(&name));
                Err(e)
            }
        }
    }

    fn reserve(&self, name: &str) -> Result<Reservation<'_>, SheetError> {
        let mut state = self.lock_state();
        if state.manifest.contains(name) || state.reserved.contains(name) {
            return Err(SheetError::DuplicateSpriteName(name.to_string()));
        }
        state.reserved.insert(name.to_string());
        Ok(Reservation { state: &self.state, name: name.to_string() })
    }

    fn ingest(&self, extracted: &ExtractedArchive, name: &str) -> Result<SpriteSummary, SheetError> {
        let stored = self
            .store
            .with_sprite(name, || self.store.store_cleanly(extracted.sprite_root(), name))?;
        let measured = stored
            .par_iter()
            .map(|image| self.measure(image))
            .collect::<Result<Vec<_>, SheetError>>()?;

        let mut state = self.lock_state();
        let scale = self.config.import_config.default_scale;
        let sprite = self.commit(&mut state, |manifest| {
            let mut sprite = Sprite::new(manifest.allocate_sprite_id(), name, scale);
            for (image, m) in stored.iter().zip(&measured) {
                sprite.add_animation(Animation {
                    id: manifest.allocate_animation_id(),
                    sprite_id: 0,
                    animation_type: image.animation_type,
                    sequence_index: image.sequence_index,
                    frames: m.frames,
                    width: m.width,
                    height: m.height,
                    frame_rate: None,
                });
            }
            manifest.sprites.push(sprite.clone());
            Ok(sprite)
        })?;

        log::info!("imported '{}' with {} animations", name, sprite.animations.len());
        Ok(SpriteSummary::from(&sprite))
    }

    /// Detect frames for one stored image, normalizing it in place when
    /// configured.
    fn measure(&self, image: &StoredImage) -> Result<Measured, SheetError> {
        let decoded = match image::open(&image.path) {
            Ok(decoded) => decoded.to_rgba8(),
            Err(e) => {
                log::warn!(
                    "unreadable image '{}' ({} #{}), recording 1 frame: {}",
                    image.original_name,
                    image.animation_type,
                    image.sequence_index,
                    e
                );
                let (width, height) = image::image_dimensions(&image.path).unwrap_or((0, 0));
                return Ok(Measured { frames: 1, width, height });
            }
        };

        let frames = detect_frames(&decoded, &self.config.detection);
        log::debug!("{}: {} frames", image.original_name, frames);

        if !self.config.import_config.normalize {
            let (width, height) = decoded.dimensions();
            return Ok(Measured { frames, width, height });
        }

        let strip = normalize_animation(&decoded, frames, self.config.detection.alpha_threshold);
        if strip.bounds.is_some() {
            self.store.write_image(&image.path, &strip.image)?;
        }
        let (width, height) = strip.dimensions();
        Ok(Measured { frames, width, height })
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Summaries of every sprite, in import order.
    pub fn list_sprites(&self) -> Vec<SpriteSummary> {
        self.lock_state().manifest.sprites.iter().map(SpriteSummary::from).collect()
    }

    /// Animations of one sprite; empty when the sprite is unknown.
    pub fn list_animations(&self, sprite_name: &str) -> Vec<AnimationInfo> {
        let state = self.lock_state();
        match state.manifest.sprite(sprite_name) {
            Some(sprite) => sprite.animations.iter().map(|a| AnimationInfo::new(sprite, a)).collect(),
            None => Vec::new(),
        }
    }

    pub fn sprite(&self, sprite_name: &str) -> Option<SpriteSummary> {
        self.lock_state().manifest.sprite(sprite_name).map(SpriteSummary::from)
    }

    pub fn animation(&self, animation_id: u64) -> Option<AnimationInfo> {
        let state = self.lock_state();
        state.manifest.animation(animation_id).map(|(s, a)| AnimationInfo::new(s, a))
    }

    /// Bytes of a stored file addressed relative to the storage root.
    pub fn read_asset(&self, relative_path: &str) -> Result<Vec<u8>, SheetError> {
        self.store.read(relative_path)
    }

    /// Content type to serve `relative_path` with.
    pub fn asset_content_type(&self, relative_path: &str) -> &'static str {
        content_type(Path::new(relative_path))
    }

    // ------------------------------------------------------------------
    // Image maintenance
    // ------------------------------------------------------------------

    /// Re-run normalization on a stored animation with its recorded frame
    /// count. Running it twice leaves the image bit-identical.
    pub fn rebuild_animation(&self, animation_id: u64) -> Result<AnimationInfo, SheetError> {
        let alpha = self.config.detection.alpha_threshold;
        self.rewrite_animation(animation_id, "rebuild", |image, frames| {
            normalize_animation(image, frames, alpha).image
        })
    }

    /// Mirror every frame of a stored animation left-right.
    pub fn flip_animation(&self, animation_id: u64) -> Result<AnimationInfo, SheetError> {
        self.rewrite_animation(animation_id, "flip", flip_frames)
    }

    /// Apply `transform` to a stored image and record its new size.
    ///
    /// Runs under the owning sprite's name lock. A sprite renamed between
    /// the lookup and taking the lock is looked up again.
    fn rewrite_animation(
        &self,
        animation_id: u64,
        action: &str,
        transform: impl Fn(&RgbaImage, u32) -> RgbaImage,
    ) -> Result<AnimationInfo, SheetError> {
        loop {
            let sprite_name = self
                .lock_state()
                .manifest
                .animation(animation_id)
                .map(|(s, _)| s.name.clone())
                .ok_or_else(|| animation_not_found(animation_id))?;

            let rewritten = self.store.with_sprite(&sprite_name, || {
                self.rewrite_locked(animation_id, &sprite_name, action, &transform)
            })?;
            match rewritten {
                Some(info) => return Ok(info),
                None => log::debug!("animation {} moved during {}, retrying", animation_id, action),
            }
        }
    }

    /// Body of [`Catalog::rewrite_animation`]; `Ok(None)` when the animation
    /// no longer belongs to `sprite_name`.
    fn rewrite_locked(
        &self,
        animation_id: u64,
        sprite_name: &str,
        action: &str,
        transform: &impl Fn(&RgbaImage, u32) -> RgbaImage,
    ) -> Result<Option<AnimationInfo>, SheetError> {
        let animation = match self.lock_state().manifest.animation(animation_id) {
            Some((sprite, animation)) if sprite.name == sprite_name => animation.clone(),
            Some(_) => return Ok(None),
            None => return Err(animation_not_found(animation_id)),
        };

        let path = self.store.image_path(sprite_name, animation.animation_type, animation.sequence_index);
        let original = read_stored(&path, &animation.image_path(sprite_name))?;
        let decoded = image::load_from_memory(&original)
            .map_err(|e| SheetError::unreadable(&path, e))?
            .to_rgba8();

        let output = transform(&decoded, animation.frames);
        let changed = output != decoded;
        if changed {
            self.store.write_image(&path, &output)?;
        }
        let (width, height) = output.dimensions();

        let mut state = self.lock_state();
        let committed = self.commit(&mut state, |manifest| {
            let entry = manifest
                .animation_mut(animation_id)
                .ok_or_else(|| animation_not_found(animation_id))?;
            entry.width = width;
            entry.height = height;
            Ok(())
        });

        if let Err(e) = committed {
            if changed {
                if let Err(restore) = self.store.write_bytes(&path, &original) {
                    log::error!("failed to restore {}: {}", path.display(), restore);
                }
            }
            return Err(e);
        }

        log::info!(
            "{} of animation {} ({}/{} #{}): {}x{}",
            action,
            animation_id,
            sprite_name,
            animation.animation_type,
            animation.sequence_index,
            width,
            height
        );
        state
            .manifest
            .animation(animation_id)
            .map(|(s, a)| Some(AnimationInfo::new(s, a)))
            .ok_or_else(|| animation_not_found(animation_id))
    }

    // ------------------------------------------------------------------
    // Sprite maintenance
    // ------------------------------------------------------------------

    /// Rename a sprite and optionally change its scale.
    ///
    /// Keeping both the name and the scale is a no-op: nothing is moved and
    /// nothing is written.
    pub fn rename_sprite(
        &self,
        old_name: &str,
        new_name: &str,
        new_scale: Option<f32>,
    ) -> Result<SpriteSummary, SheetError> {
        validate_sprite_name(new_name).map_err(SheetError::InvalidRequest)?;
        if let Some(scale) = new_scale {
            if !scale.is_finite() || scale <= 0.0 {
                return Err(SheetError::InvalidRequest(format!("scale must be positive, got {}", scale)));
            }
        }

        self.store.with_sprites(&[old_name, new_name], || {
            let mut state = self.lock_state();
            let current = state
                .manifest
                .sprite(old_name)
                .ok_or_else(|| SheetError::AssetNotFound(format!("sprite '{}'", old_name)))?;
            let scale = new_scale.unwrap_or(current.scale);

            if old_name == new_name && scale == current.scale {
                log::debug!("rename of '{}' changes nothing", old_name);
                return Ok(SpriteSummary::from(current));
            }

            let moved = if old_name != new_name {
                if state.manifest.contains(new_name) || state.reserved.contains(new_name) {
                    return Err(SheetError::DuplicateSpriteName(new_name.to_string()));
                }
                self.store.rename_folder(old_name, new_name)?
            } else {
                false
            };

            let renamed = self.commit(&mut state, |manifest| {
                let sprite = manifest
                    .sprite_mut(old_name)
                    .ok_or_else(|| SheetError::AssetNotFound(format!("sprite '{}'", old_name)))?;
                sprite.name = new_name.to_string();
                sprite.scale = scale;
                Ok(SpriteSummary::from(&*sprite))
            });

            if renamed.is_err() && moved {
                if let Err(e) = self.store.rename_folder(new_name, old_name) {
                    log::error!("failed to move '{}' back to '{}': {}", new_name, old_name, e);
                }
            }

            let summary = renamed?;
            log::info!("renamed '{}' -> '{}' (scale {})", old_name, new_name, scale);
            Ok(summary)
        })
    }

    /// Remove a sprite from the catalog, then delete its folder.
    ///
    /// A folder that cannot be deleted is logged and left behind; the
    /// catalog entry stays removed. For a name the catalog does not know, a
    /// leftover folder is still removed before reporting `AssetNotFound`,
    /// unless an import of that name is in flight.
    pub fn delete_sprite(&self, sprite_name: &str) -> Result<(), SheetError> {
        let not_found = || SheetError::AssetNotFound(format!("sprite '{}'", sprite_name));
        if validate_sprite_name(sprite_name).is_err() {
            return Err(not_found());
        }

        self.store.with_sprite(sprite_name, || {
            let mut state = self.lock_state();
            if !state.manifest.contains(sprite_name) {
                let importing = state.reserved.contains(sprite_name);
                drop(state);
                if !importing && self.store.sprite_dir(sprite_name).exists() {
                    log::warn!("removing orphan folder of unknown sprite '{}'", sprite_name);
                    self.store.delete_folder(sprite_name);
                }
                return Err(not_found());
            }

            self.commit(&mut state, |manifest| {
                manifest.remove(sprite_name);
                Ok(())
            })?;
            drop(state);
            log::info!("deleted sprite '{}' from catalog", sprite_name);

            self.store.delete_folder(sprite_name);
            Ok(())
        })
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn lock_state(&self) -> MutexGuard<'_, CatalogState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `change` to a copy of the manifest, save it, then swap it in.
    fn commit<T>(
        &self,
        state: &mut CatalogState,
        change: impl FnOnce(&mut CatalogManifest) -> Result<T, SheetError>,
    ) -> Result<T, SheetError> {
        let mut next = state.manifest.clone();
        let value = change(&mut next)?;
        next.save_to_dir(self.store.root())?;
        state.manifest = next;
        Ok(value)
    }
}

/// Name reservation for an in-flight import, released on drop.
struct Reservation<'a> {
    state: &'a Mutex<CatalogState>,
    name: String,
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.reserved.remove(&self.name);
    }
}

fn animation_not_found(animation_id: u64) -> SheetError {
    SheetError::AssetNotFound(format!("animation {}", animation_id))
}

fn read_stored(path: &Path, relative: &str) -> Result<Vec<u8>, SheetError> {
    fs::read(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => SheetError::AssetNotFound(relative.to_string()),
        _ => SheetError::storage(format!("reading '{}'", relative), e),
    })
}
