//! Archive extraction into a private temporary directory.
//!
//! An uploaded sprite archive must hold exactly one top-level folder, named
//! after the sprite. Folders whose names begin with the reserved prefix
//! (`__MACOSX` and friends) are archiver metadata and do not count. Every
//! entry must stay inside the extraction directory; a single escaping entry
//! rejects the whole archive.

use std::fs;
use std::io::{self, Cursor};
use std::path::{Component, Path, PathBuf};

use tempfile::TempDir;
use zip::ZipArchive;

use crate::error::SheetError;

/// Prefix of the temporary extraction directories
const TEMP_PREFIX: &str = "sprite_upload_";

/// An extracted archive. Dropping it deletes the extraction directory.
#[derive(Debug)]
pub struct ExtractedArchive {
    dir: TempDir,
    sprite_root: PathBuf,
    sprite_name: String,
    file_count: usize,
}

impl ExtractedArchive {
    /// Name of the single top-level folder
    pub fn sprite_name(&self) -> &str {
        &self.sprite_name
    }

    /// Path of the single top-level folder
    pub fn sprite_root(&self) -> &Path {
        &self.sprite_root
    }

    /// Temporary directory everything was extracted to
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Number of regular files written
    pub fn file_count(&self) -> usize {
        self.file_count
    }
}

/// Extract a zip archive into the system temp directory and locate its
/// sprite folder.
///
/// The temporary directory is removed on every failure path and when the
/// returned value is dropped.
pub fn extract_archive(bytes: &[u8], reserved_prefix: &str) -> Result<ExtractedArchive, SheetError> {
    extract_archive_in(&std::env::temp_dir(), bytes, reserved_prefix)
}

/// Like [`extract_archive`], with the extraction directory created under
/// `parent`.
pub fn extract_archive_in(
    parent: &Path,
    bytes: &[u8],
    reserved_prefix: &str,
) -> Result<ExtractedArchive, SheetError> {
    if bytes.is_empty() {
        return Err(SheetError::InvalidArchiveStructure("archive is empty".to_string()));
    }

    let dir = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .tempdir_in(parent)
        .map_err(|e| SheetError::storage("creating extraction directory", e))?;
    log::debug!("extracting archive ({} bytes) to {}", bytes.len(), dir.path().display());

    let file_count = unpack(bytes, dir.path())?;
    let sprite_root = find_sprite_root(dir.path(), reserved_prefix)?;
    let sprite_name = sprite_root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| SheetError::InvalidArchiveStructure("root folder has no name".to_string()))?;

    log::debug!("extracted {} files, sprite folder '{}'", file_count, sprite_name);
    Ok(ExtractedArchive { dir, sprite_root, sprite_name, file_count })
}

/// Write every entry under `dest`, refusing entries that would escape it.
fn unpack(bytes: &[u8], dest: &Path) -> Result<usize, SheetError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| SheetError::InvalidArchiveStructure(format!("not a readable zip archive: {}", e)))?;
    let mut file_count = 0;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| {
            SheetError::InvalidArchiveStructure(format!("unreadable entry #{}: {}", i, e))
        })?;

        let name = entry.name().to_string();
        let out_path = match entry.enclosed_name() {
            Some(relative) if is_plain_relative(&relative) => dest.join(relative),
            _ => {
                return Err(SheetError::InvalidArchiveStructure(format!(
                    "entry '{}' escapes the archive root",
                    name
                )))
            }
        };

        if entry.is_dir() {
            fs::create_dir_all(&out_path)
                .map_err(|e| SheetError::storage(format!("creating '{}'", name), e))?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| SheetError::storage(format!("creating parent of '{}'", name), e))?;
        }

        let mut out_file = fs::File::create(&out_path)
            .map_err(|e| SheetError::storage(format!("writing '{}'", name), e))?;
        io::copy(&mut entry, &mut out_file)
            .map_err(|e| SheetError::storage(format!("extracting '{}'", name), e))?;
        file_count += 1;
    }

    Ok(file_count)
}

fn is_plain_relative(path: &Path) -> bool {
    path.components().all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Find the only top-level folder not starting with `reserved_prefix`.
pub fn find_sprite_root(dir: &Path, reserved_prefix: &str) -> Result<PathBuf, SheetError> {
    let entries =
        fs::read_dir(dir).map_err(|e| SheetError::storage("listing extracted archive", e))?;

    let mut folders = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| SheetError::storage("listing extracted archive", e))?;
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        if is_dir && !entry.file_name().to_string_lossy().starts_with(reserved_prefix) {
            folders.push(entry.path());
        }
    }

    if folders.len() != 1 {
        log::warn!("archive has {} root folders, expected exactly 1", folders.len());
        return Err(SheetError::InvalidArchiveStructure(format!(
            "expected a single root folder, found {}",
            folders.len()
        )));
    }

    Ok(folders.remove(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn build_zip(entries: &[(&str, Option<&[u8]>)]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut zip = ZipWriter::new(&mut cursor);
            let options = SimpleFileOptions::default();
            for (name, contents) in entries {
                match contents {
                    Some(bytes) => {
                        zip.start_file(*name, options).unwrap();
                        zip.write_all(bytes).unwrap();
                    }
                    None => zip.add_directory(*name, options).unwrap(),
                }
            }
            zip.finish().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_extract_single_root() {
        let bytes = build_zip(&[
            ("knight/", None),
            ("knight/IDLE/", None),
            ("knight/IDLE/a.png", Some(b"one")),
            ("knight/WALK/b.png", Some(b"two")),
        ]);

        let extracted = extract_archive(&bytes, "__").unwrap();
        assert_eq!(extracted.sprite_name(), "knight");
        assert_eq!(extracted.file_count(), 2);
        assert!(extracted.sprite_root().join("IDLE/a.png").is_file());
        assert!(extracted.sprite_root().join("WALK/b.png").is_file());
    }

    #[test]
    fn test_reserved_folders_ignored() {
        let bytes = build_zip(&[
            ("__MACOSX/knight/._a.png", Some(b"meta")),
            ("knight/IDLE/a.png", Some(b"one")),
            (".DS_Store", Some(b"junk")),
        ]);

        let extracted = extract_archive(&bytes, "__").unwrap();
        assert_eq!(extracted.sprite_name(), "knight");
    }

    #[test]
    fn test_two_roots_rejected() {
        let bytes = build_zip(&[("knight/IDLE/a.png", Some(b"1")), ("slime/IDLE/a.png", Some(b"2"))]);
        let err = extract_archive(&bytes, "__").unwrap_err();
        assert_eq!(err.kind(), "invalid_archive_structure");
    }

    #[test]
    fn test_no_root_rejected() {
        let bytes = build_zip(&[("loose.png", Some(b"1"))]);
        let err = extract_archive(&bytes, "__").unwrap_err();
        assert!(matches!(err, SheetError::InvalidArchiveStructure(_)));
    }

    #[test]
    fn test_path_traversal_rejected() {
        let bytes = build_zip(&[("knight/IDLE/a.png", Some(b"1")), ("../evil.png", Some(b"x"))]);
        let err = extract_archive(&bytes, "__").unwrap_err();
        assert!(matches!(err, SheetError::InvalidArchiveStructure(ref m) if m.contains("escapes")));
    }

    #[test]
    fn test_nested_traversal_rejected() {
        let bytes = build_zip(&[("knight/../../evil.png", Some(b"x"))]);
        assert!(extract_archive(&bytes, "__").is_err());
    }

    #[test]
    fn test_empty_and_garbage_rejected() {
        assert_eq!(extract_archive(&[], "__").unwrap_err().kind(), "invalid_archive_structure");
        assert_eq!(
            extract_archive(b"definitely not a zip", "__").unwrap_err().kind(),
            "invalid_archive_structure"
        );
    }

    #[test]
    fn test_temp_dir_removed_on_drop() {
        let bytes = build_zip(&[("knight/IDLE/a.png", Some(b"1"))]);
        let extracted = extract_archive(&bytes, "__").unwrap();
        let path = extracted.path().to_path_buf();
        assert!(path.exists());
        drop(extracted);
        assert!(!path.exists());
    }

    #[test]
    fn test_temp_dir_removed_on_failure() {
        let parent = TempDir::new().unwrap();
        let rejected = [
            build_zip(&[("knight/IDLE/a.png", Some(b"1")), ("../evil.png", Some(b"x"))]),
            build_zip(&[("knight/IDLE/a.png", Some(b"1")), ("slime/IDLE/a.png", Some(b"2"))]),
            build_zip(&[("loose.png", Some(b"1"))]),
        ];

        for bytes in &rejected {
            assert!(extract_archive_in(parent.path(), bytes, "__").is_err());
            let leftovers: Vec<_> = fs::read_dir(parent.path()).unwrap().collect();
            assert!(leftovers.is_empty(), "extraction directory left behind: {:?}", leftovers);
        }

        let bytes = build_zip(&[("knight/IDLE/a.png", Some(b"1"))]);
        let extracted = extract_archive_in(parent.path(), &bytes, "__").unwrap();
        assert!(extracted.path().starts_with(parent.path()));
        assert!(extracted.path().file_name().unwrap().to_string_lossy().starts_with(TEMP_PREFIX));
    }

    #[test]
    fn test_find_sprite_root_counts_only_directories() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("readme.txt"), b"hi").unwrap();
        fs::create_dir(temp.path().join("__MACOSX")).unwrap();
        fs::create_dir(temp.path().join("hero")).unwrap();
        assert_eq!(find_sprite_root(temp.path(), "__").unwrap(), temp.path().join("hero"));

        fs::create_dir(temp.path().join("villain")).unwrap();
        assert!(find_sprite_root(temp.path(), "__").is_err());
    }
}
