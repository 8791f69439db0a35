//! Filesystem store: one directory per database, one file per key.
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

use super::ModelStore;

const ENTRY_EXTENSION: &str = "json";

pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create store root: {}", root.display()))?;
        Ok(Self { root })
    }

    fn db_dir(&self, db_name: &str) -> Result<PathBuf> {
        Ok(self.root.join(checked_segment(db_name)?))
    }

    fn entry_path(&self, db_name: &str, key: &str) -> Result<PathBuf> {
        Ok(self
            .db_dir(db_name)?
            .join(format!("{}.{}", checked_segment(key)?, ENTRY_EXTENSION)))
    }
}

/// Reject names that would escape the store root.
fn checked_segment(name: &str) -> Result<&str> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(anyhow!("Invalid storage name '{}'", name));
    }
    Ok(name)
}

impl ModelStore for FsStore {
    fn put(&self, db_name: &str, key: &str, bytes: &[u8]) -> Result<()> {
        let dir = self.db_dir(db_name)?;
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create database dir: {}", dir.display()))?;
        let path = self.entry_path(db_name, key)?;
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        file.write_all(bytes)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    fn get(&self, db_name: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.entry_path(db_name, key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    fn remove(&self, db_name: &str, key: &str) -> Result<()> {
        let path = self.entry_path(db_name, key)?;
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to remove {}", path.display()))
            }
        }
        // Drop the database directory once its last entry is gone.
        let dir = self.db_dir(db_name)?;
        if let Ok(mut entries) = fs::read_dir(&dir) {
            if entries.next().is_none() {
                let _ = fs::remove_dir(&dir);
            }
        }
        Ok(())
    }

    fn keys(&self, db_name: &str) -> Result<Vec<String>> {
        let dir = self.db_dir(db_name)?;
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to list {}", dir.display()))
            }
        };
        let mut keys = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                keys.push(stem.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fs_store_put_get_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path()).unwrap();

        store.put("db", "alpha", b"{}").unwrap();
        store.put("db", "beta", b"[]").unwrap();
        assert_eq!(store.keys("db").unwrap(), vec!["alpha", "beta"]);
        assert_eq!(store.get("db", "alpha").unwrap(), Some(b"{}".to_vec()));

        store.remove("db", "alpha").unwrap();
        store.remove("db", "beta").unwrap();
        assert!(store.get("db", "alpha").unwrap().is_none());
        assert!(!dir.path().join("db").exists());
    }

    #[test]
    fn test_fs_store_rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path()).unwrap();
        assert!(store.put("../outside", "k", b"x").is_err());
        assert!(store.put("db", "a/b", b"x").is_err());
    }
}
