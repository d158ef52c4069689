//! The persisted image index.
//!
//! The index is a single JSON object mapping each image id to its
//! [`ImageRecord`]. Runs only ever add to it: records from earlier runs are
//! carried over untouched.

use crate::error::{Error, Result};
use crate::formats::ImageFormat;
use crate::persist;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Default location of the index, relative to the working directory.
pub const DEFAULT_METADATA_FILE: &str = "images_metadata.json";

/// Timestamp format of `extraction_date`.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Metadata for one extracted image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Absolute path of the source document.
    #[serde(default, serialize_with = "serialize_lossy")]
    pub pdf_path: PathBuf,
    /// Display name of the source document.
    pub file_name: String,
    /// 1-based page number.
    pub page_number: u32,
    /// 1-based position of the image on its page.
    pub image_index: u32,
    pub image_type: ImageFormat,
    #[serde(default)]
    pub size_bytes: u64,
    /// Where the image was written.
    #[serde(serialize_with = "serialize_lossy")]
    pub path: PathBuf,
    /// Local time the image was written, `YYYY-MM-DD HH:MM:SS`.
    #[serde(default)]
    pub extraction_date: String,
}

/// Paths that are not valid UTF-8 are written with replacement characters
/// instead of failing the whole index.
fn serialize_lossy<S>(path: &Path, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&path.to_string_lossy())
}

/// Mapping from image id to record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataIndex {
    records: BTreeMap<String, ImageRecord>,
    /// Set when an unparsable index could not be backed up; saving over it
    /// would lose the only copy.
    #[serde(skip)]
    unpreserved: Option<PathBuf>,
}

impl MetadataIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the index at `path`.
    ///
    /// A missing file is an empty index. A file that cannot be parsed is also
    /// treated as empty; it is copied to `<path>.corrupt` first so the next
    /// save does not destroy it.
    pub fn load(path: &Path) -> Self {
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No metadata index at {}, starting empty", path.display());
                return Self::new();
            }
            Err(e) => {
                warn!("Cannot read metadata index {}: {}", path.display(), e);
                return Self::new();
            }
        };

        match serde_json::from_slice::<MetadataIndex>(&data) {
            Ok(index) => {
                debug!("Loaded {} record(s) from {}", index.len(), path.display());
                index
            }
            Err(e) => {
                let backup = corrupt_path(path);
                warn!(
                    "Ignoring unparsable metadata index {}: {} (kept as {})",
                    path.display(),
                    e,
                    backup.display()
                );
                let mut index = Self::new();
                if let Err(e) = fs::copy(path, &backup) {
                    warn!("Cannot preserve {}: {}", path.display(), e);
                    index.unpreserved = Some(path.to_path_buf());
                }
                index
            }
        }
    }

    /// Serialize the whole index to `path`, replacing it atomically.
    ///
    /// Refuses to replace an unparsable index that [`MetadataIndex::load`]
    /// could not back up.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(original) = &self.unpreserved {
            if original == path {
                return Err(Error::Io {
                    path: Some(path.to_path_buf()),
                    source: io::Error::other(format!(
                        "unparsable index was not backed up to {}",
                        corrupt_path(path).display()
                    )),
                });
            }
        }
        let mut data = serde_json::to_vec_pretty(self)?;
        data.push(b'\n');
        persist::write_atomic(&data, path)
    }

    /// Fold `incoming` into this index. Incoming records win on id collision.
    pub fn merge(&mut self, incoming: MetadataIndex) {
        self.records.extend(incoming.records);
    }

    /// Insert a single record.
    pub fn insert(&mut self, id: impl Into<String>, record: ImageRecord) {
        self.records.insert(id.into(), record);
    }

    /// Look up a record by image id.
    pub fn get(&self, id: &str) -> Option<&ImageRecord> {
        self.records.get(id)
    }

    /// Look up a record by the path of an extracted image; the file stem is
    /// the id.
    pub fn get_by_image_path(&self, image_path: &Path) -> Option<(&str, &ImageRecord)> {
        let id = image_path.file_stem()?.to_str()?;
        self.records
            .get_key_value(id)
            .map(|(id, record)| (id.as_str(), record))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ImageRecord)> {
        self.records.iter().map(|(id, record)| (id.as_str(), record))
    }
}

impl FromIterator<(String, ImageRecord)> for MetadataIndex {
    fn from_iter<I: IntoIterator<Item = (String, ImageRecord)>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
            unpreserved: None,
        }
    }
}

impl IntoIterator for MetadataIndex {
    type Item = (String, ImageRecord);
    type IntoIter = std::collections::btree_map::IntoIter<String, ImageRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

/// Merge `incoming` into `existing`, returning the union.
pub fn merge(mut existing: MetadataIndex, incoming: MetadataIndex) -> MetadataIndex {
    existing.merge(incoming);
    existing
}

/// Where an unparsable index is preserved.
pub fn corrupt_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".corrupt");
    path.with_file_name(name)
}

/// Current local time in the index timestamp format.
pub fn timestamp_now() -> String {
    chrono::Local::now().format(DATE_FORMAT).to_string()
}

/// Validate that a path can hold the index. Used before a run starts so a bad
/// path is reported up front.
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => {
            fs::create_dir_all(parent).map_err(|e| Error::io_with_path(e, parent))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(page: u32, index: u32) -> ImageRecord {
        ImageRecord {
            pdf_path: PathBuf::from("/docs/paper.pdf"),
            file_name: String::from("paper.pdf"),
            page_number: page,
            image_index: index,
            image_type: ImageFormat::Png,
            size_bytes: 50_000,
            path: PathBuf::from(format!("out/{}-{}.png", page, index)),
            extraction_date: String::from("2024-05-01 12:30:00"),
        }
    }

    #[test]
    fn test_load_missing_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let index = MetadataIndex::load(&dir.path().join("none.json"));
        assert!(index.is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta.json");

        let mut index = MetadataIndex::new();
        index.insert("id-1", record(1, 1));
        index.insert("id-2", record(3, 2));
        index.save(&path).unwrap();

        let loaded = MetadataIndex::load(&path);
        assert_eq!(loaded, index);
    }

    #[test]
    fn test_json_layout() {
        let mut index = MetadataIndex::new();
        index.insert("abc", record(2, 1));

        let value = serde_json::to_value(&index).unwrap();
        let entry = &value["abc"];
        assert_eq!(entry["pdf_path"], "/docs/paper.pdf");
        assert_eq!(entry["file_name"], "paper.pdf");
        assert_eq!(entry["page_number"], 2);
        assert_eq!(entry["image_index"], 1);
        assert_eq!(entry["image_type"], "PNG");
        assert_eq!(entry["size_bytes"], 50_000);
        assert_eq!(entry["path"], "out/2-1.png");
        assert_eq!(entry["extraction_date"], "2024-05-01 12:30:00");
    }

    #[test]
    fn test_load_older_records_without_new_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta.json");
        fs::write(
            &path,
            r#"{"old-id": {"file_name": "a.pdf", "page_number": 1, "image_index": 2,
                "image_type": "JPEG", "path": "extracted_images/old-id.jpeg"}}"#,
        )
        .unwrap();

        let index = MetadataIndex::load(&path);
        let rec = index.get("old-id").unwrap();
        assert_eq!(rec.image_type, ImageFormat::Jpeg);
        assert_eq!(rec.size_bytes, 0);
        assert!(rec.extraction_date.is_empty());
    }

    #[test]
    fn test_load_corrupt_is_empty_and_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta.json");
        fs::write(&path, b"{ not json").unwrap();

        let index = MetadataIndex::load(&path);
        assert!(index.is_empty());
        assert!(path.exists());
        assert_eq!(fs::read(corrupt_path(&path)).unwrap(), b"{ not json");
    }

    #[test]
    fn test_unbacked_corrupt_index_is_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta.json");
        fs::write(&path, b"{ not json").unwrap();
        // A directory in the way makes the backup copy fail.
        fs::create_dir(corrupt_path(&path)).unwrap();

        let mut index = MetadataIndex::load(&path);
        assert!(index.is_empty());
        index.insert("id-1", record(1, 1));

        assert!(index.save(&path).is_err());
        assert_eq!(fs::read(&path).unwrap(), b"{ not json");
        // Elsewhere is fine.
        index.save(&dir.path().join("other.json")).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_paths_saved_lossily() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta.json");
        let mut rec = record(1, 1);
        rec.pdf_path = PathBuf::from(OsStr::from_bytes(b"/docs/caf\xe9.pdf"));
        rec.file_name = String::from("caf\u{FFFD}.pdf");

        let mut index = MetadataIndex::new();
        index.insert("id-1", rec);
        index.save(&path).unwrap();

        let loaded = MetadataIndex::load(&path);
        let saved = loaded.get("id-1").unwrap();
        assert_eq!(saved.pdf_path, PathBuf::from("/docs/caf\u{FFFD}.pdf"));
        assert_eq!(saved.file_name, "caf\u{FFFD}.pdf");
    }

    #[test]
    fn test_merge_is_union_incoming_wins() {
        let mut existing = MetadataIndex::new();
        existing.insert("a", record(1, 1));
        existing.insert("b", record(1, 2));

        let mut incoming = MetadataIndex::new();
        incoming.insert("b", record(9, 9));
        incoming.insert("c", record(2, 1));

        let merged = merge(existing, incoming);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged.get("a").unwrap().page_number, 1);
        assert_eq!(merged.get("b").unwrap().page_number, 9);
        assert!(merged.contains("c"));
    }

    #[test]
    fn test_get_by_image_path() {
        let mut index = MetadataIndex::new();
        index.insert("1234-abcd", record(1, 1));

        let (id, rec) = index
            .get_by_image_path(Path::new("extracted_images/1234-abcd.png"))
            .unwrap();
        assert_eq!(id, "1234-abcd");
        assert_eq!(rec.page_number, 1);
        assert!(index.get_by_image_path(Path::new("other.png")).is_none());
    }

    #[test]
    fn test_timestamp_format() {
        let ts = timestamp_now();
        assert!(chrono::NaiveDateTime::parse_from_str(&ts, DATE_FORMAT).is_ok());
    }

    #[test]
    fn test_ensure_parent_dir_creates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/dir/meta.json");
        ensure_parent_dir(&path).unwrap();
        assert!(dir.path().join("nested/dir").is_dir());
        ensure_parent_dir(Path::new("meta.json")).unwrap();
    }
}
