//! Blob storage for submission files and derived document artifacts.
//!
//! Files are keyed by (area, item id, path, filename). Submission plugin
//! areas are keyed by submission id; derived artifact areas ("combined",
//! "pageimages", "pageimagesreadonly", "feedbackdocuments") are keyed by
//! grade id.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

use chrono::{DateTime, Utc};

use crate::error::DocumentError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileKey {
    pub area: String,
    pub item_id: i64,
    pub path: String,
    pub filename: String,
}

impl FileKey {
    pub fn new(area: &str, item_id: i64, filename: &str) -> Self {
        Self {
            area: area.to_string(),
            item_id,
            path: "/".to_string(),
            filename: filename.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredFile {
    pub key: FileKey,
    pub bytes: Vec<u8>,
    pub modified: DateTime<Utc>,
}

impl StoredFile {
    pub fn extension(&self) -> Option<&str> {
        Path::new(&self.key.filename)
            .extension()
            .and_then(|e| e.to_str())
    }
}

pub trait FileStorage: Send + Sync {
    fn put(
        &self,
        key: FileKey,
        bytes: Vec<u8>,
        modified: DateTime<Utc>,
    ) -> Result<(), DocumentError>;
    fn get(&self, key: &FileKey) -> Result<Option<StoredFile>, DocumentError>;
    /// Every file in an area for one item, in no particular order.
    fn list(&self, area: &str, item_id: i64) -> Result<Vec<StoredFile>, DocumentError>;
    fn delete_area(&self, area: &str, item_id: i64) -> Result<(), DocumentError>;
    fn copy(&self, from: &FileKey, to: FileKey) -> Result<(), DocumentError> {
        let file = self
            .get(from)?
            .ok_or_else(|| DocumentError::NotFound(format!("file {}", from.filename)))?;
        self.put(to, file.bytes, file.modified)
    }
}

/// In-memory storage.
#[derive(Default)]
pub struct MemoryStorage {
    files: Mutex<HashMap<FileKey, StoredFile>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FileStorage for MemoryStorage {
    fn put(
        &self,
        key: FileKey,
        bytes: Vec<u8>,
        modified: DateTime<Utc>,
    ) -> Result<(), DocumentError> {
        let file = StoredFile {
            key: key.clone(),
            bytes,
            modified,
        };
        self.files
            .lock()
            .map_err(|_| DocumentError::Storage("storage lock poisoned".into()))?
            .insert(key, file);
        Ok(())
    }

    fn get(&self, key: &FileKey) -> Result<Option<StoredFile>, DocumentError> {
        Ok(self
            .files
            .lock()
            .map_err(|_| DocumentError::Storage("storage lock poisoned".into()))?
            .get(key)
            .cloned())
    }

    fn list(&self, area: &str, item_id: i64) -> Result<Vec<StoredFile>, DocumentError> {
        Ok(self
            .files
            .lock()
            .map_err(|_| DocumentError::Storage("storage lock poisoned".into()))?
            .values()
            .filter(|f| f.key.area == area && f.key.item_id == item_id)
            .cloned()
            .collect())
    }

    fn delete_area(&self, area: &str, item_id: i64) -> Result<(), DocumentError> {
        self.files
            .lock()
            .map_err(|_| DocumentError::Storage("storage lock poisoned".into()))?
            .retain(|k, _| !(k.area == area && k.item_id == item_id));
        Ok(())
    }
}

/// Storage under `<root>/<area>/<item_id>/<filename>` on disk. Modification
/// times come from filesystem metadata.
pub struct DiskStorage {
    root: PathBuf,
}

impl DiskStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Storage rooted at the configured storage directory.
    pub fn from_config() -> Self {
        Self::new(&common::config::Config::get().storage_root)
    }

    fn dir_for(&self, area: &str, item_id: i64) -> PathBuf {
        self.root.join(area).join(item_id.to_string())
    }

    fn path_for(&self, key: &FileKey) -> PathBuf {
        self.dir_for(&key.area, key.item_id).join(&key.filename)
    }

    fn modified_of(path: &Path) -> Result<DateTime<Utc>, DocumentError> {
        let meta = fs::metadata(path)?;
        let mtime = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        Ok(DateTime::<Utc>::from(mtime))
    }
}

impl FileStorage for DiskStorage {
    fn put(
        &self,
        key: FileKey,
        bytes: Vec<u8>,
        _modified: DateTime<Utc>,
    ) -> Result<(), DocumentError> {
        let path = self.path_for(&key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, bytes)?;
        Ok(())
    }

    fn get(&self, key: &FileKey) -> Result<Option<StoredFile>, DocumentError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path)?;
        let modified = Self::modified_of(&path)?;
        Ok(Some(StoredFile {
            key: key.clone(),
            bytes,
            modified,
        }))
    }

    fn list(&self, area: &str, item_id: i64) -> Result<Vec<StoredFile>, DocumentError> {
        let dir = self.dir_for(area, item_id);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let filename = entry.file_name().to_string_lossy().to_string();
            let key = FileKey::new(area, item_id, &filename);
            if let Some(file) = self.get(&key)? {
                files.push(file);
            }
        }
        Ok(files)
    }

    fn delete_area(&self, area: &str, item_id: i64) -> Result<(), DocumentError> {
        let dir = self.dir_for(area, item_id);
        if dir.exists() {
            fs::remove_dir_all(dir)?;
        }
        Ok(())
    }
}
