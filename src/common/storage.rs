//! Local object storage for a single node
//!
//! Objects live at `root/bucket/filename`. The filesystem store is what a
//! node serves from; the in-memory store backs tests and demos.

use crate::common::key::ObjectKey;
use crate::common::Result;
use bytes::Bytes;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

/// Size and timestamps of a stored object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    pub size: u64,
    pub created: Option<SystemTime>,
    pub modified: Option<SystemTime>,
}

/// Trait for node-local object storage backends
pub trait LocalStore: Send + Sync {
    fn contains(&self, key: &ObjectKey) -> bool;
    fn read(&self, key: &ObjectKey) -> Result<Option<Bytes>>;
    fn write(&self, key: &ObjectKey, data: &[u8]) -> Result<()>;
    /// Returns whether something was removed
    fn delete(&self, key: &ObjectKey) -> Result<bool>;
    fn metadata(&self, key: &ObjectKey) -> Result<Option<ObjectMeta>>;
}

/// Filesystem store rooted at a directory
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Open a store, creating the root directory if needed
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn path_of(&self, key: &ObjectKey) -> PathBuf {
        self.root.join(key.bucket()).join(key.filename())
    }
}

impl LocalStore for FsStore {
    fn contains(&self, key: &ObjectKey) -> bool {
        self.path_of(key).is_file()
    }

    fn read(&self, key: &ObjectKey) -> Result<Option<Bytes>> {
        match std::fs::read(self.path_of(key)) {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, key: &ObjectKey, data: &[u8]) -> Result<()> {
        let bucket_dir = self.root.join(key.bucket());
        std::fs::create_dir_all(&bucket_dir)?;

        // Write beside the target and rename so readers never see a partial object.
        // The temp name stays short so any filename the OS accepts also works here.
        let tmp = bucket_dir.join(format!(".fileio-tmp-{:08x}", rand::random::<u32>()));
        std::fs::write(&tmp, data)?;
        if let Err(e) = std::fs::rename(&tmp, self.path_of(key)) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    fn delete(&self, key: &ObjectKey) -> Result<bool> {
        match std::fs::remove_file(self.path_of(key)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn metadata(&self, key: &ObjectKey) -> Result<Option<ObjectMeta>> {
        match std::fs::metadata(self.path_of(key)) {
            Ok(m) if m.is_file() => Ok(Some(ObjectMeta {
                size: m.len(),
                created: m.created().ok(),
                modified: m.modified().ok(),
            })),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory store
pub struct MemStore {
    map: Mutex<HashMap<ObjectKey, (Bytes, SystemTime)>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self {
            map: Mutex::new(HashMap::new()),
        }
    }

    fn map(&self) -> std::sync::MutexGuard<'_, HashMap<ObjectKey, (Bytes, SystemTime)>> {
        self.map.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalStore for MemStore {
    fn contains(&self, key: &ObjectKey) -> bool {
        self.map().contains_key(key)
    }
    fn read(&self, key: &ObjectKey) -> Result<Option<Bytes>> {
        Ok(self.map().get(key).map(|(data, _)| data.clone()))
    }
    fn write(&self, key: &ObjectKey, data: &[u8]) -> Result<()> {
        self.map()
            .insert(key.clone(), (Bytes::copy_from_slice(data), SystemTime::now()));
        Ok(())
    }
    fn delete(&self, key: &ObjectKey) -> Result<bool> {
        Ok(self.map().remove(key).is_some())
    }
    fn metadata(&self, key: &ObjectKey) -> Result<Option<ObjectMeta>> {
        Ok(self.map().get(key).map(|(data, at)| ObjectMeta {
            size: data.len() as u64,
            created: Some(*at),
            modified: Some(*at),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn key(s: &str) -> ObjectKey {
        s.parse().unwrap()
    }

    #[test]
    fn test_fs_store() {
        let dir = tempdir().unwrap();
        let store = FsStore::open(dir.path().join("storage")).unwrap();

        assert!(!store.contains(&key("b1:x.txt")));
        assert!(store.read(&key("b1:x.txt")).unwrap().is_none());

        store.write(&key("b1:x.txt"), b"hello").unwrap();
        assert!(store.contains(&key("b1:x.txt")));
        assert_eq!(store.read(&key("b1:x.txt")).unwrap().unwrap(), &b"hello"[..]);
        assert_eq!(store.metadata(&key("b1:x.txt")).unwrap().unwrap().size, 5);
        assert!(dir.path().join("storage/b1/x.txt").is_file());

        assert!(store.delete(&key("b1:x.txt")).unwrap());
        assert!(!store.delete(&key("b1:x.txt")).unwrap());
        assert!(store.metadata(&key("b1:x.txt")).unwrap().is_none());
    }

    #[test]
    fn test_fs_store_overwrite_leaves_no_temp_files() {
        let dir = tempdir().unwrap();
        let store = FsStore::open(dir.path()).unwrap();
        store.write(&key("b:f"), b"one").unwrap();
        store.write(&key("b:f"), b"two").unwrap();
        assert_eq!(store.read(&key("b:f")).unwrap().unwrap(), &b"two"[..]);
        let entries = std::fs::read_dir(dir.path().join("b")).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn test_fs_store_long_filename() {
        let dir = tempdir().unwrap();
        let store = FsStore::open(dir.path()).unwrap();
        let name = "n".repeat(250);
        let k = ObjectKey::new("b", name.clone()).unwrap();

        store.write(&k, b"long").unwrap();
        assert!(dir.path().join("b").join(&name).is_file());
        assert_eq!(store.read(&k).unwrap().unwrap(), &b"long"[..]);
    }

    #[test]
    fn test_bucket_directory_is_not_an_object() {
        let dir = tempdir().unwrap();
        let store = FsStore::open(dir.path()).unwrap();
        std::fs::create_dir_all(dir.path().join("b").join("sub")).unwrap();
        assert!(!store.contains(&key("b:sub")));
        assert!(store.metadata(&key("b:sub")).unwrap().is_none());
    }

    #[test]
    fn test_mem_store() {
        let store = MemStore::new();
        store.write(&key("b:f"), b"data").unwrap();
        assert!(store.contains(&key("b:f")));
        assert_eq!(store.metadata(&key("b:f")).unwrap().unwrap().size, 4);
        assert!(store.delete(&key("b:f")).unwrap());
        assert!(!store.contains(&key("b:f")));
    }
}
