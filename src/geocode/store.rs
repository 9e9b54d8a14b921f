// src/geocode/store.rs

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::GeoPoint;

/// Durable home of the geocode cache: one JSON file holding the whole
/// query → coordinates map, rewritten after every new resolution.
///
/// The store reports failures explicitly; deciding to degrade (treat a
/// missing or corrupt file as an empty cache, ignore a failed write) is the
/// caller's call, not the store's.
pub struct CacheStore {
    path: PathBuf,
}

impl CacheStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted map. A file that does not exist yet loads as an
    /// empty map; anything else that goes wrong is an error.
    pub fn load(&self) -> Result<HashMap<String, GeoPoint>> {
        let bytes = match fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("reading cache {}", self.path.display()))
            }
        };
        serde_json::from_slice(&bytes)
            .with_context(|| format!("decoding cache {}", self.path.display()))
    }

    /// Rewrite the whole map.
    pub fn save(&self, map: &HashMap<String, GeoPoint>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating cache dir {}", parent.display()))?;
            }
        }
        let bytes = serde_json::to_vec(map).context("encoding geocode cache")?;
        fs::write(&self.path, bytes)
            .with_context(|| format!("writing cache {}", self.path.display()))
    }

    /// Delete the durable entry entirely. Clearing a cache that was never
    /// written is not an error.
    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => {
                Err(e).with_context(|| format!("removing cache {}", self.path.display()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn point(lat: f64, lon: f64, label: &str) -> GeoPoint {
        GeoPoint {
            lat,
            lon,
            label: label.to_string(),
        }
    }

    #[test]
    fn missing_file_loads_as_empty_map() {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::new(dir.path().join("cache.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn save_then_load_round_trips_the_map() {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::new(dir.path().join("cache.json"));

        let mut map = HashMap::new();
        map.insert("Roma".to_string(), point(41.89, 12.49, "Roma, Italia"));
        store.save(&map).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded["Roma"].label, "Roma, Italia");
    }

    #[test]
    fn corrupt_file_is_an_explicit_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(&path, b"not json").unwrap();
        assert!(CacheStore::new(&path).load().is_err());
    }

    #[test]
    fn clear_removes_the_file_and_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::new(dir.path().join("cache.json"));
        store.save(&HashMap::new()).unwrap();
        assert!(store.path().exists());

        store.clear().unwrap();
        assert!(!store.path().exists());
        store.clear().unwrap();
    }
}
