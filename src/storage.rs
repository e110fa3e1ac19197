//! Key/value blob storage.
//!
//! The pipeline never talks to network storage; it persists reference
//! profiles through a [`BlobStore`], and [`LocalBlobStore`] maps keys such
//! as `no2/_saturation_metrics.csv` onto files under a root directory.

use std::io;
use std::path::{Path, PathBuf};

/// Operations the pipeline needs from a blob store. Keys use `/` as the
/// separator regardless of platform.
pub trait BlobStore {
    /// Where the store lives, for messages.
    fn location(&self) -> String;

    /// Keys of the objects under `prefix`, sorted. Directory markers are not
    /// listed.
    fn list(&self, prefix: &str) -> io::Result<Vec<String>>;

    fn exists(&self, key: &str) -> bool;

    fn read(&self, key: &str) -> io::Result<Vec<u8>>;

    /// Write an object. Readers never observe a partially written object.
    fn write(&self, key: &str, bytes: &[u8]) -> io::Result<()>;

    fn delete(&self, key: &str) -> io::Result<()>;

    fn rename(&self, from: &str, to: &str) -> io::Result<()>;

    fn copy(&self, from: &str, to: &str) -> io::Result<()>;

    /// Create an empty "directory" marker.
    fn create_dir(&self, key: &str) -> io::Result<()>;
}

/// Blob store backed by a local directory.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem path of a key.
    pub fn path_of(&self, key: &str) -> PathBuf {
        key.split('/')
            .filter(|s| !s.is_empty())
            .fold(self.root.clone(), |p, s| p.join(s))
    }

    fn ensure_parent(path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    fn collect(&self, dir: &Path, out: &mut Vec<String>) -> io::Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                self.collect(&path, out)?;
            } else if let Ok(rel) = path.strip_prefix(&self.root) {
                let key: Vec<String> = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                out.push(key.join("/"));
            }
        }
        Ok(())
    }
}

impl BlobStore for LocalBlobStore {
    fn location(&self) -> String {
        self.root.display().to_string()
    }

    fn list(&self, prefix: &str) -> io::Result<Vec<String>> {
        let mut keys = Vec::new();
        if self.root.is_dir() {
            self.collect(&self.root, &mut keys)?;
        }
        keys.retain(|k| k.starts_with(prefix) && !k.ends_with(".tmp"));
        keys.sort();
        Ok(keys)
    }

    fn exists(&self, key: &str) -> bool {
        self.path_of(key).is_file()
    }

    fn read(&self, key: &str) -> io::Result<Vec<u8>> {
        std::fs::read(self.path_of(key))
    }

    fn write(&self, key: &str, bytes: &[u8]) -> io::Result<()> {
        let path = self.path_of(key);
        Self::ensure_parent(&path)?;

        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, &path)
    }

    fn delete(&self, key: &str) -> io::Result<()> {
        std::fs::remove_file(self.path_of(key))
    }

    fn rename(&self, from: &str, to: &str) -> io::Result<()> {
        let target = self.path_of(to);
        Self::ensure_parent(&target)?;
        std::fs::rename(self.path_of(from), target)
    }

    fn copy(&self, from: &str, to: &str) -> io::Result<()> {
        let target = self.path_of(to);
        Self::ensure_parent(&target)?;
        std::fs::copy(self.path_of(from), target).map(|_| ())
    }

    fn create_dir(&self, key: &str) -> io::Result<()> {
        std::fs::create_dir_all(self.path_of(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_read_list() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());

        store.write("no2/a.csv", b"x,1\n").unwrap();
        store.write("no2/b.bin", &[1, 2, 3]).unwrap();
        store.write("nh3/a.csv", b"y").unwrap();

        assert!(store.exists("no2/a.csv"));
        assert!(!store.exists("no2/missing.csv"));
        assert_eq!(store.read("no2/b.bin").unwrap(), vec![1, 2, 3]);
        assert_eq!(
            store.list("no2/").unwrap(),
            vec!["no2/a.csv".to_string(), "no2/b.bin".to_string()]
        );
    }

    #[test]
    fn test_rename_copy_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());

        store.write("staging/x", b"payload").unwrap();
        store.copy("staging/x", "backup/x").unwrap();
        store.rename("staging/x", "final/x").unwrap();

        assert!(!store.exists("staging/x"));
        assert_eq!(store.read("final/x").unwrap(), b"payload".to_vec());
        assert!(store.exists("backup/x"));

        store.delete("backup/x").unwrap();
        assert!(!store.exists("backup/x"));
    }

    #[test]
    fn test_create_dir_is_not_listed() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());
        store.create_dir("empty/").unwrap();
        assert!(store.path_of("empty").is_dir());
        assert!(store.list("").unwrap().is_empty());
    }
}
