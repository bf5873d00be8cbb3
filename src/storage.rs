use std::collections::BTreeSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::error::{PatchError, Result};

/// Out-of-line storage for values too large to inline in the source.
pub trait ExternalStore {
    fn load(&self, location: &str) -> Result<Vec<u8>>;

    fn store(&mut self, location: &str, data: &[u8]) -> Result<()>;

    /// Every location currently held by the store.
    fn list(&self) -> Result<BTreeSet<String>>;

    fn delete(&mut self, location: &str) -> Result<()>;

    fn contains(&self, location: &str) -> Result<bool> {
        Ok(self.list()?.contains(location))
    }
}

fn lookup_error(location: &str, reason: impl ToString) -> PatchError {
    PatchError::StorageLookup {
        location: location.to_string(),
        reason: reason.to_string(),
    }
}

fn read_blob(path: &Path, location: &str) -> Result<Vec<u8>> {
    if !path.is_file() {
        return Err(lookup_error(location, "no such entry"));
    }
    fs::read(path).map_err(|e| lookup_error(location, e))
}

fn write_blob(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| PatchError::io(parent, &e))?;
    }
    fs::write(path, data).map_err(|e| PatchError::io(path, &e))
}

fn remove_blob(path: &Path, location: &str) -> Result<()> {
    if !path.is_file() {
        return Err(lookup_error(location, "no such entry"));
    }
    fs::remove_file(path).map_err(|e| PatchError::io(path, &e))
}

/// Content-addressed store: `<root>/<blake3 hex>.<suffix>`
#[derive(Debug, Clone)]
pub struct HashStore {
    root: PathBuf,
}

impl HashStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location `data` is stored under.
    pub fn location_for(data: &[u8], suffix: &str) -> String {
        format!("{}{}", blake3::hash(data).to_hex(), suffix)
    }

    /// Store `data` and return its location.
    pub fn put(&mut self, data: &[u8], suffix: &str) -> Result<String> {
        let location = Self::location_for(data, suffix);
        self.store(&location, data)?;
        Ok(location)
    }

    fn path_of(&self, location: &str) -> Result<PathBuf> {
        let valid = location.len() >= 64
            && location
                .get(..64)
                .is_some_and(|hash| hash.chars().all(|c| c.is_ascii_hexdigit()))
            && !location.contains(['/', '\\']);
        if !valid {
            return Err(lookup_error(location, "not a content hash location"));
        }
        Ok(self.root.join(location))
    }
}

impl ExternalStore for HashStore {
    fn load(&self, location: &str) -> Result<Vec<u8>> {
        read_blob(&self.path_of(location)?, location)
    }

    fn store(&mut self, location: &str, data: &[u8]) -> Result<()> {
        let path = self.path_of(location)?;
        let expected = blake3::hash(data).to_hex();
        if !location.starts_with(expected.as_str()) {
            return Err(PatchError::Request(format!(
                "{location} does not name the content hash {expected}"
            )));
        }
        debug!(%location, bytes = data.len(), "storing external value");
        write_blob(&path, data)
    }

    fn list(&self) -> Result<BTreeSet<String>> {
        if !self.root.is_dir() {
            return Ok(BTreeSet::new());
        }
        let entries = fs::read_dir(&self.root).map_err(|e| PatchError::io(&self.root, &e))?;
        let mut locations = BTreeSet::new();
        for entry in entries {
            let entry = entry.map_err(|e| PatchError::io(&self.root, &e))?;
            if let Some(name) = entry.file_name().to_str() {
                if self.path_of(name).is_ok() {
                    locations.insert(name.to_string());
                }
            }
        }
        Ok(locations)
    }

    fn delete(&mut self, location: &str) -> Result<()> {
        remove_blob(&self.path_of(location)?, location)
    }

    fn contains(&self, location: &str) -> Result<bool> {
        Ok(self.path_of(location).is_ok_and(|path| path.is_file()))
    }
}

/// Identifier-addressed store: `<root>/<module>/<name>.<suffix>`
///
/// Locations are relative paths made of plain components, so every value
/// lands under `root`.
#[derive(Debug, Clone)]
pub struct CallSiteStore {
    root: PathBuf,
}

impl CallSiteStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_of(&self, location: &str) -> Result<PathBuf> {
        let relative = Path::new(location);
        let plain = !location.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !plain {
            return Err(lookup_error(location, "location escapes the store root"));
        }
        Ok(self.root.join(relative))
    }
}

impl ExternalStore for CallSiteStore {
    fn load(&self, location: &str) -> Result<Vec<u8>> {
        read_blob(&self.path_of(location)?, location)
    }

    fn store(&mut self, location: &str, data: &[u8]) -> Result<()> {
        debug!(%location, bytes = data.len(), "storing call-site value");
        write_blob(&self.path_of(location)?, data)
    }

    fn list(&self) -> Result<BTreeSet<String>> {
        let mut locations = BTreeSet::new();
        if !self.root.is_dir() {
            return Ok(locations);
        }
        for entry in WalkDir::new(&self.root) {
            let entry = entry.map_err(|e| PatchError::Io {
                path: e.path().unwrap_or(&self.root).to_path_buf(),
                message: e.to_string(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Ok(relative) = entry.path().strip_prefix(&self.root) {
                let parts: Vec<_> = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                locations.insert(parts.join("/"));
            }
        }
        Ok(locations)
    }

    fn delete(&mut self, location: &str) -> Result<()> {
        remove_blob(&self.path_of(location)?, location)
    }

    fn contains(&self, location: &str) -> Result<bool> {
        Ok(self.path_of(location).is_ok_and(|path| path.is_file()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = HashStore::new(dir.path());

        let location = store.put(b"[1, 2, 3]", ".json").unwrap();

        assert!(location.ends_with(".json"));
        assert!(store.contains(&location).unwrap());
        assert_eq!(store.load(&location).unwrap(), b"[1, 2, 3]");
        assert_eq!(store.list().unwrap().into_iter().collect::<Vec<_>>(), vec![
            location.clone()
        ]);

        store.delete(&location).unwrap();
        assert!(!store.contains(&location).unwrap());
    }

    #[test]
    fn test_hash_store_rejects_wrong_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = HashStore::new(dir.path());
        let location = HashStore::location_for(b"a", ".txt");

        let result = store.store(&location, b"b");

        assert!(matches!(result, Err(PatchError::Request(_))));
    }

    #[test]
    fn test_missing_entry_is_lookup_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = HashStore::new(dir.path());
        let location = HashStore::location_for(b"never stored", ".txt");

        assert!(matches!(
            store.load(&location),
            Err(PatchError::StorageLookup { .. })
        ));
    }

    #[test]
    fn test_call_site_store_layout() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = CallSiteStore::new(dir.path());

        store.store("test_math/test_sum-0.json", b"6").unwrap();
        store.store("test_math/test_sum-1.json", b"7").unwrap();

        assert!(dir.path().join("test_math/test_sum-0.json").is_file());
        let listed = store.list().unwrap();
        assert!(listed.contains("test_math/test_sum-1.json"));
        assert_eq!(listed.len(), 2);
        assert_eq!(store.load("test_math/test_sum-1.json").unwrap(), b"7");
    }

    #[test]
    fn test_hash_store_without_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = HashStore::new(dir.path());

        let location = store.put(b"abc", "").unwrap();

        assert_eq!(location.len(), 64);
        assert_eq!(store.load(&location).unwrap(), b"abc");
        assert!(store.list().unwrap().contains(&location));
    }

    #[test]
    fn test_call_site_store_lists_nested_entries() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = CallSiteStore::new(dir.path());

        store.store("top.json", b"1").unwrap();
        store.store("pkg/mod/deep/test_x-0.json", b"2").unwrap();
        fs::create_dir_all(dir.path().join("empty/dir")).unwrap();

        let listed: Vec<_> = store.list().unwrap().into_iter().collect();

        assert_eq!(listed, vec!["pkg/mod/deep/test_x-0.json", "top.json"]);
    }

    #[test]
    fn test_call_site_store_stays_under_root() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = CallSiteStore::new(dir.path().join("values"));

        assert!(store.store("../escape.txt", b"x").is_err());
        assert!(store.store("/abs.txt", b"x").is_err());
    }
}
