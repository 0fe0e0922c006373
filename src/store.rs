//! Permanent storage of sprite images.
//!
//! Layout under the storage root:
//!
//! ```text
//! <root>/<sprite>/<TYPE>/<sequence>.png
//! ```
//!
//! with `sequence` counting from 1 in the filename order of the source
//! folder. Folder-level operations on one sprite are serialized through a
//! per-name lock; different sprites never contend. The folder operations
//! themselves do not lock: callers wrap them in [`AssetStore::with_sprite`]
//! or [`AssetStore::with_sprites`].
//!
//! Only `.png` files below a visible (non-dot) path are readable by
//! relative path, which keeps the catalog file and in-progress `*.png.tmp`
//! writes private.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use glob::{glob_with, MatchOptions, Pattern};
use image::{ImageFormat, RgbaImage};

use crate::error::SheetError;
use crate::models::AnimationType;

/// One image copied into the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    pub animation_type: AnimationType,
    pub sequence_index: u32,
    /// Absolute path of the stored copy
    pub path: PathBuf,
    /// File name it had in the archive
    pub original_name: String,
}

/// Registry of per-sprite-name locks.
#[derive(Debug, Default)]
pub struct NameLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl NameLocks {
    /// Shared lock handle for `name`, created on first use.
    fn handle(&self, name: &str) -> Arc<Mutex<()>> {
        let mut locks = lock(&self.locks);
        Arc::clone(locks.entry(name.to_string()).or_default())
    }

    /// Run `f` while holding the locks of every name, acquired in sorted
    /// order so two callers locking the same pair cannot deadlock.
    pub fn with_locked<T>(&self, names: &[&str], f: impl FnOnce() -> T) -> T {
        let mut sorted: Vec<&str> = names.to_vec();
        sorted.sort_unstable();
        sorted.dedup();

        let result = {
            let handles: Vec<_> = sorted.iter().map(|n| self.handle(n)).collect();
            let _guards: Vec<_> = handles.iter().map(|h| lock(h.as_ref())).collect();
            f()
        };
        self.release(&sorted);
        result
    }

    /// Forget the locks nobody else holds a handle to.
    fn release(&self, names: &[&str]) {
        let mut locks = lock(&self.locks);
        for name in names {
            if locks.get(*name).is_some_and(|h| Arc::strong_count(h) == 1) {
                locks.remove(*name);
            }
        }
    }

    /// Number of names currently tracked
    pub fn len(&self) -> usize {
        lock(&self.locks).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owner of the storage root.
#[derive(Debug)]
pub struct AssetStore {
    root: PathBuf,
    locks: NameLocks,
}

impl AssetStore {
    /// Open the store, creating the root directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, SheetError> {
        let root = root.into();
        if !root.exists() {
            fs::create_dir_all(&root)
                .map_err(|e| SheetError::storage(format!("creating '{}'", root.display()), e))?;
            log::info!("created storage root {}", root.display());
        }
        let root = root
            .canonicalize()
            .map_err(|e| SheetError::storage(format!("opening '{}'", root.display()), e))?;
        Ok(Self { root, locks: NameLocks::default() })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn sprite_dir(&self, sprite_name: &str) -> PathBuf {
        self.root.join(sprite_name)
    }

    pub fn image_path(&self, sprite_name: &str, animation_type: AnimationType, sequence_index: u32) -> PathBuf {
        self.sprite_dir(sprite_name)
            .join(animation_type.folder_name())
            .join(format!("{}.png", sequence_index))
    }

    /// Run `f` holding the lock of one sprite name.
    pub fn with_sprite<T>(&self, sprite_name: &str, f: impl FnOnce() -> T) -> T {
        self.locks.with_locked(&[sprite_name], f)
    }

    /// Run `f` holding the locks of several sprite names.
    pub fn with_sprites<T>(&self, sprite_names: &[&str], f: impl FnOnce() -> T) -> T {
        self.locks.with_locked(sprite_names, f)
    }

    /// Names with a live lock entry
    pub fn locked_names(&self) -> usize {
        self.locks.len()
    }

    /// Copy every recognized animation folder of `source_dir` into the store
    /// as `<sprite>/<TYPE>/1.png, 2.png, …`.
    ///
    /// Any existing folder for the sprite is removed first. Returns the stored
    /// images grouped by type in canonical order, each group in filename order.
    pub fn store_cleanly(&self, source_dir: &Path, sprite_name: &str) -> Result<Vec<StoredImage>, SheetError> {
        let target = self.sprite_dir(sprite_name);
        if target.exists() {
            log::debug!("removing existing folder {}", target.display());
            fs::remove_dir_all(&target)
                .map_err(|e| SheetError::storage(format!("clearing '{}'", sprite_name), e))?;
        }
        fs::create_dir_all(&target)
            .map_err(|e| SheetError::storage(format!("creating '{}'", sprite_name), e))?;

        let mut stored = Vec::new();
        for animation_type in AnimationType::ALL {
            let source = source_dir.join(animation_type.folder_name());
            if !source.is_dir() {
                log::debug!("{}: no {} folder", sprite_name, animation_type);
                continue;
            }

            let images = list_images(&source)?;
            if images.is_empty() {
                log::debug!("{}: {} folder has no png files", sprite_name, animation_type);
                continue;
            }

            let type_dir = target.join(animation_type.folder_name());
            fs::create_dir_all(&type_dir).map_err(|e| {
                SheetError::storage(format!("creating '{}/{}'", sprite_name, animation_type), e)
            })?;

            for (i, image) in images.iter().enumerate() {
                let sequence_index = i as u32 + 1;
                let path = type_dir.join(format!("{}.png", sequence_index));
                fs::copy(image, &path).map_err(|e| {
                    SheetError::storage(format!("copying '{}'", image.display()), e)
                })?;
                stored.push(StoredImage {
                    animation_type,
                    sequence_index,
                    path,
                    original_name: file_name(image),
                });
            }
            log::debug!("{}: copied {} {} images", sprite_name, images.len(), animation_type);
        }

        log::info!("stored {} images for '{}'", stored.len(), sprite_name);
        Ok(stored)
    }

    /// Move a sprite folder to a new name.
    ///
    /// Returns `Ok(false)` without touching anything when the source folder
    /// does not exist. Refuses to overwrite an existing destination.
    pub fn rename_folder(&self, old_name: &str, new_name: &str) -> Result<bool, SheetError> {
        let old_path = self.sprite_dir(old_name);
        let new_path = self.sprite_dir(new_name);

        if !old_path.exists() {
            log::warn!("no folder to rename for '{}'", old_name);
            return Ok(false);
        }
        if new_path.exists() {
            return Err(SheetError::DuplicateSpriteName(new_name.to_string()));
        }

        fs::rename(&old_path, &new_path).map_err(|e| {
            SheetError::storage(format!("renaming '{}' to '{}'", old_name, new_name), e)
        })?;
        log::info!("renamed folder '{}' -> '{}'", old_name, new_name);
        Ok(true)
    }

    /// Remove a sprite folder. Failures are logged and reported as `false`.
    pub fn delete_folder(&self, sprite_name: &str) -> bool {
        let path = self.sprite_dir(sprite_name);
        if !path.exists() {
            log::warn!("no folder to delete for '{}'", sprite_name);
            return false;
        }
        match fs::remove_dir_all(&path) {
            Ok(()) => {
                log::info!("deleted folder {}", path.display());
                true
            }
            Err(e) => {
                log::error!("failed to delete folder {}: {}", path.display(), e);
                false
            }
        }
    }

    /// Map a relative request path to a file under the root.
    ///
    /// Absolute paths, `..` components and dot-prefixed names are rejected
    /// rather than resolved.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, SheetError> {
        let candidate = Path::new(relative);
        let plain = candidate.components().all(|c| match c {
            Component::Normal(name) => !name.to_string_lossy().starts_with('.'),
            Component::CurDir => true,
            _ => false,
        });
        if relative.is_empty() || !plain {
            return Err(SheetError::AssetNotFound(relative.to_string()));
        }

        let path = self.root.join(candidate);
        if !path.starts_with(&self.root) {
            return Err(SheetError::AssetNotFound(relative.to_string()));
        }
        Ok(path)
    }

    /// Read a stored image by relative path.
    pub fn read(&self, relative: &str) -> Result<Vec<u8>, SheetError> {
        let path = self.resolve(relative)?;
        if content_type(&path) != "image/png" || !path.is_file() {
            return Err(SheetError::AssetNotFound(relative.to_string()));
        }
        fs::read(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => SheetError::AssetNotFound(relative.to_string()),
            _ => SheetError::storage(format!("reading '{}'", relative), e),
        })
    }

    /// Write a PNG through a sibling temp file so readers never see a
    /// half-written image.
    pub fn write_image(&self, path: &Path, image: &RgbaImage) -> Result<(), SheetError> {
        let tmp = path.with_extension("png.tmp");
        image
            .save_with_format(&tmp, ImageFormat::Png)
            .map_err(|e| SheetError::storage(format!("writing '{}'", tmp.display()), io::Error::other(e)))?;
        fs::rename(&tmp, path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            SheetError::storage(format!("replacing '{}'", path.display()), e)
        })
    }

    /// Restore raw bytes previously read from `path`.
    pub fn write_bytes(&self, path: &Path, bytes: &[u8]) -> Result<(), SheetError> {
        fs::write(path, bytes).map_err(|e| SheetError::storage(format!("restoring '{}'", path.display()), e))
    }
}

/// `.png` files directly inside `dir` (extension matched case-insensitively),
/// sorted by file name.
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>, SheetError> {
    let pattern = format!("{}/*.png", Pattern::escape(&dir.to_string_lossy()));
    let options = MatchOptions { case_sensitive: false, ..MatchOptions::new() };

    let mut images: Vec<PathBuf> = glob_with(&pattern, options)
        .map_err(|e| SheetError::storage(format!("listing '{}'", dir.display()), io::Error::other(e)))?
        .filter_map(Result::ok)
        .filter(|p| p.is_file())
        .collect();

    images.sort_by_key(|p| file_name(p));
    Ok(images)
}

fn file_name(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
}

/// Content type served for a stored file.
pub fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase()).as_deref() {
        Some("png") => "image/png",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use tempfile::TempDir;

    fn setup() -> (TempDir, AssetStore) {
        let temp = TempDir::new().unwrap();
        let store = AssetStore::open(temp.path().join("storage")).unwrap();
        (temp, store)
    }

    fn source_tree(temp: &TempDir, files: &[&str]) -> PathBuf {
        let root = temp.path().join("upload").join("knight");
        for file in files {
            let path = root.join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, file.as_bytes()).unwrap();
        }
        root
    }

    #[test]
    fn test_open_creates_root() {
        let (temp, store) = setup();
        assert!(temp.path().join("storage").is_dir());
        assert!(store.root().is_absolute());
    }

    #[test]
    fn test_store_cleanly_renames_in_filename_order() {
        let (temp, store) = setup();
        let source = source_tree(
            &temp,
            &["IDLE/b_second.png", "IDLE/a_first.PNG", "IDLE/notes.txt", "WALK/z.png", "JUMP/x.png"],
        );

        let stored = store.store_cleanly(&source, "knight").unwrap();
        let summary: Vec<_> = stored
            .iter()
            .map(|s| (s.animation_type, s.sequence_index, s.original_name.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (AnimationType::Idle, 1, "a_first.PNG"),
                (AnimationType::Idle, 2, "b_second.png"),
                (AnimationType::Walk, 1, "z.png"),
            ]
        );

        let idle_1 = store.image_path("knight", AnimationType::Idle, 1);
        assert_eq!(fs::read(idle_1).unwrap(), b"IDLE/a_first.PNG");
        assert!(!store.sprite_dir("knight").join("JUMP").exists());
        assert!(!store.sprite_dir("knight").join("ATTACK").exists());
    }

    #[test]
    fn test_store_cleanly_replaces_existing_folder() {
        let (temp, store) = setup();
        let stale = store.sprite_dir("knight").join("ATTACK");
        fs::create_dir_all(&stale).unwrap();
        fs::write(stale.join("1.png"), b"old").unwrap();

        let source = source_tree(&temp, &["IDLE/a.png"]);
        store.store_cleanly(&source, "knight").unwrap();
        assert!(!stale.exists());
        assert!(store.image_path("knight", AnimationType::Idle, 1).is_file());
    }

    #[test]
    fn test_rename_folder() {
        let (temp, store) = setup();
        let source = source_tree(&temp, &["IDLE/a.png"]);
        store.store_cleanly(&source, "knight").unwrap();

        assert!(store.rename_folder("knight", "paladin").unwrap());
        assert!(!store.sprite_dir("knight").exists());
        assert!(store.image_path("paladin", AnimationType::Idle, 1).is_file());
    }

    #[test]
    fn test_rename_missing_folder_is_noop() {
        let (_temp, store) = setup();
        assert!(!store.rename_folder("ghost", "spirit").unwrap());
        assert!(!store.sprite_dir("spirit").exists());
    }

    #[test]
    fn test_rename_onto_existing_folder_refused() {
        let (_temp, store) = setup();
        fs::create_dir_all(store.sprite_dir("a")).unwrap();
        fs::create_dir_all(store.sprite_dir("b")).unwrap();
        let err = store.rename_folder("a", "b").unwrap_err();
        assert_eq!(err.kind(), "duplicate_sprite_name");
        assert!(store.sprite_dir("a").exists());
    }

    #[test]
    fn test_delete_folder_best_effort() {
        let (temp, store) = setup();
        let source = source_tree(&temp, &["IDLE/a.png"]);
        store.store_cleanly(&source, "knight").unwrap();

        assert!(store.delete_folder("knight"));
        assert!(!store.sprite_dir("knight").exists());
        assert!(!store.delete_folder("knight"));
    }

    #[test]
    fn test_resolve_rejects_escapes() {
        let (_temp, store) = setup();
        assert_eq!(store.resolve("knight/IDLE/1.png").unwrap(), store.root().join("knight/IDLE/1.png"));
        for bad in ["", "../secret", "knight/../../etc/passwd", "/etc/passwd"] {
            assert_eq!(store.resolve(bad).unwrap_err().kind(), "asset_not_found", "{}", bad);
        }
    }

    #[test]
    fn test_hidden_and_temp_files_not_readable() {
        let (temp, store) = setup();
        let source = source_tree(&temp, &["IDLE/a.png"]);
        store.store_cleanly(&source, "knight").unwrap();
        fs::write(store.root().join(".sheetsmith-catalog.json"), b"{}").unwrap();
        fs::write(store.sprite_dir("knight").join("IDLE/2.png.tmp"), b"partial").unwrap();
        fs::create_dir_all(store.sprite_dir("knight").join(".cache")).unwrap();
        fs::write(store.sprite_dir("knight").join(".cache/1.png"), b"x").unwrap();

        let hidden = [
            ".sheetsmith-catalog.json",
            "./.sheetsmith-catalog.json",
            "knight/IDLE/2.png.tmp",
            "knight/.cache/1.png",
        ];
        for hidden in hidden {
            assert_eq!(store.read(hidden).unwrap_err().kind(), "asset_not_found", "{}", hidden);
        }
        assert!(store.read("./knight/IDLE/1.png").is_ok());
    }

    #[test]
    fn test_read_missing_and_directory() {
        let (temp, store) = setup();
        let source = source_tree(&temp, &["IDLE/a.png"]);
        store.store_cleanly(&source, "knight").unwrap();

        assert_eq!(store.read("knight/IDLE/1.png").unwrap(), b"IDLE/a.png");
        assert_eq!(store.read("knight/IDLE/2.png").unwrap_err().kind(), "asset_not_found");
        assert_eq!(store.read("knight/IDLE").unwrap_err().kind(), "asset_not_found");
    }

    #[test]
    fn test_write_image_replaces_file() {
        let (_temp, store) = setup();
        fs::create_dir_all(store.sprite_dir("knight")).unwrap();
        let path = store.sprite_dir("knight").join("1.png");
        fs::write(&path, b"old").unwrap();

        let image = RgbaImage::from_pixel(3, 2, image::Rgba([1, 2, 3, 255]));
        store.write_image(&path, &image).unwrap();

        let back = image::open(&path).unwrap().to_rgba8();
        assert_eq!(back.dimensions(), (3, 2));
        assert!(!path.with_extension("png.tmp").exists());
    }

    #[test]
    fn test_list_images_with_special_characters() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("weird [name]");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("2.png"), b"").unwrap();
        fs::write(dir.join("10.png"), b"").unwrap();
        fs::create_dir(dir.join("folder.png")).unwrap();

        let names: Vec<_> = list_images(&dir).unwrap().iter().map(|p| file_name(p)).collect();
        assert_eq!(names, vec!["10.png", "2.png"]);
    }

    #[test]
    fn test_content_type() {
        assert_eq!(content_type(Path::new("a/IDLE/1.png")), "image/png");
        assert_eq!(content_type(Path::new("a/IDLE/1.PNG")), "image/png");
        assert_eq!(content_type(Path::new("a/blob")), "application/octet-stream");
    }

    #[test]
    fn test_name_locks_serialize_same_name() {
        let locks = Arc::new(NameLocks::default());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let workers: Vec<_> = (0..8)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let inside = Arc::clone(&inside);
                let max_seen = Arc::clone(&max_seen);
                thread::spawn(move || {
                    locks.with_locked(&["knight"], || {
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        max_seen.fetch_max(now, Ordering::SeqCst);
                        thread::sleep(std::time::Duration::from_millis(2));
                        inside.fetch_sub(1, Ordering::SeqCst);
                    })
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_name_locks_same_pair_any_order() {
        let locks = NameLocks::default();
        let value = locks.with_locked(&["b", "a", "b"], || 7);
        assert_eq!(value, 7);
    }

    #[test]
    fn test_name_locks_forget_released_names() {
        let locks = NameLocks::default();
        for i in 0..50 {
            let name = format!("upload-{}", i);
            locks.with_locked(&[name.as_str(), "shared"], || assert_eq!(locks.len(), 2));
        }
        assert!(locks.is_empty());
    }

    #[test]
    fn test_name_locks_keep_names_still_waited_on() {
        let locks = Arc::new(NameLocks::default());
        let (entered_tx, entered_rx) = std::sync::mpsc::channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();

        let holder = {
            let locks = Arc::clone(&locks);
            thread::spawn(move || {
                locks.with_locked(&["knight"], || {
                    entered_tx.send(()).unwrap();
                    release_rx.recv().unwrap();
                })
            })
        };
        entered_rx.recv().unwrap();

        let waiter = {
            let locks = Arc::clone(&locks);
            thread::spawn(move || locks.with_locked(&["knight"], || 1))
        };
        thread::sleep(std::time::Duration::from_millis(20));
        release_tx.send(()).unwrap();

        holder.join().unwrap();
        assert_eq!(waiter.join().unwrap(), 1);
        assert!(locks.is_empty());
    }
}
