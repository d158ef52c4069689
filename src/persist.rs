//! Writing extracted images to disk.

use crate::error::{Error, Result};
use crate::formats::ImageFormat;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Output path for an extracted image: `<dir>/<id>.<ext>`.
pub fn image_path(output_dir: &Path, id: &str, format: ImageFormat) -> PathBuf {
    output_dir.join(format!("{}.{}", id, format.extension()))
}

/// Write `data` to `path` byte for byte, replacing any existing file.
pub fn write_image(data: &[u8], path: &Path) -> Result<()> {
    let mut file = fs::File::create(path).map_err(|e| Error::io_with_path(e, path))?;
    file.write_all(data)
        .map_err(|e| Error::io_with_path(e, path))?;
    file.flush().map_err(|e| Error::io_with_path(e, path))?;
    Ok(())
}

/// Write `data` through a sibling temp file that is renamed over `path`.
///
/// A crash mid-write leaves the previous file intact.
pub fn write_atomic(data: &[u8], path: &Path) -> Result<()> {
    let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
    temp_name.push(".pie_tmp");
    let temp_path = path.with_file_name(temp_name);

    let result = (|| -> Result<()> {
        let mut file =
            fs::File::create(&temp_path).map_err(|e| Error::io_with_path(e, &temp_path))?;
        file.write_all(data)
            .map_err(|e| Error::io_with_path(e, &temp_path))?;
        file.sync_all()
            .map_err(|e| Error::io_with_path(e, &temp_path))?;
        fs::rename(&temp_path, path).map_err(|e| Error::io_with_path(e, path))
    })();

    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_path() {
        let path = image_path(Path::new("/out"), "abc", ImageFormat::Png);
        assert_eq!(path, PathBuf::from("/out/abc.png"));
        let path = image_path(Path::new("/out"), "abc", ImageFormat::Jpeg);
        assert_eq!(path, PathBuf::from("/out/abc.jpeg"));
    }

    #[test]
    fn test_write_image_exact_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("img.png");
        let data: Vec<u8> = (0..=255).collect();

        write_image(&data, &path).unwrap();
        assert_eq!(fs::read(&path).unwrap(), data);

        // Overwrites.
        write_image(&[1, 2, 3], &path).unwrap();
        assert_eq!(fs::read(&path).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_write_image_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("img.png");
        let err = write_image(&[1], &path).unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn test_write_atomic_replaces_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        fs::write(&path, b"old").unwrap();

        write_atomic(b"new", &path).unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"new");
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".pie_tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_write_atomic_failure_keeps_original() {
        let dir = tempfile::tempdir().unwrap();
        // Target is a directory, so the rename fails.
        let path = dir.path().join("taken");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("keep"), b"x").unwrap();

        assert!(write_atomic(b"data", &path).is_err());
        assert!(path.join("keep").exists());
        assert!(!dir.path().join("taken.pie_tmp").exists());
    }
}
