//! Local key-value storage and the user override store built on top of it.
//!
//! `LocalStore` is a single JSON file mapping string keys to string values. Every
//! `set_item`/`remove_item` rewrites the file immediately. `UserOverrideStore` keeps
//! all overrides as one serialized mapping under a fixed key.
//!
//! Reads fail soft: a missing or corrupt file, or a corrupt mapping, reads as empty
//! and is logged.

use crate::errors::StoreError;
use crate::model::{OverrideEntry, OverrideMap, SlideIndex, UserMediaInfo};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

/// Key holding the serialized override mapping.
pub const STORAGE_KEY: &str = "slideshowMediaFiles";

/// File-backed string key-value store.
#[derive(Debug)]
pub struct LocalStore {
    path: PathBuf,
    items: BTreeMap<String, String>,
}

impl LocalStore {
    /// Opens the store at `path`. A missing or unreadable file yields an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let items = match std::fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str::<BTreeMap<String, String>>(&text) {
                Ok(items) => {
                    debug!("Opened local store {:?} with {} item(s)", path, items.len());
                    items
                }
                Err(e) => {
                    warn!("Local store {:?} is corrupt, starting empty: {}", path, e);
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Local store {:?} does not exist yet", path);
                BTreeMap::new()
            }
            Err(e) => {
                warn!("Failed to read local store {:?}, starting empty: {}", path, e);
                BTreeMap::new()
            }
        };
        Self { path, items }
    }

    pub fn get_item(&self, key: &str) -> Option<&str> {
        self.items.get(key).map(String::as_str)
    }

    #[must_use = "writing the store can fail; the Result must be handled"]
    pub fn set_item(&mut self, key: &str, value: String) -> Result<(), StoreError> {
        self.items.insert(key.to_string(), value);
        self.flush()
    }

    #[must_use = "writing the store can fail; the Result must be handled"]
    pub fn remove_item(&mut self, key: &str) -> Result<(), StoreError> {
        if self.items.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }

    /// Writes the whole map through a temporary file in the same directory.
    fn flush(&self) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;
        let payload = serde_json::to_vec_pretty(&self.items)?;
        let mut temp_file = NamedTempFile::new_in(&dir)?;
        temp_file.write_all(&payload)?;
        temp_file.flush()?;
        temp_file.persist(&self.path)?;
        debug!("Flushed {} item(s) to {:?}", self.items.len(), self.path);
        Ok(())
    }
}

/// Persisted mapping from slide to user-supplied media.
///
/// The mapping is read once when the store is built; afterwards the in-memory map is
/// the source of truth and every mutation writes it back whole. Entries that failed
/// validation are carried through writes untouched.
#[derive(Debug)]
pub struct UserOverrideStore {
    local: LocalStore,
    overrides: OverrideMap,
    skipped: BTreeMap<String, serde_json::Value>,
}

impl UserOverrideStore {
    pub fn new(local: LocalStore) -> Self {
        let (overrides, skipped) = parse_mapping(local.get_item(STORAGE_KEY));
        Self { local, overrides, skipped }
    }

    /// Opens the local store at `path` and loads the mapping from it.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::new(LocalStore::open(path))
    }

    /// Every valid override. Never fails; bad data read as empty at load time.
    pub fn load_all(&self) -> OverrideMap {
        self.overrides.clone()
    }

    /// Inserts or replaces the entry for `index` and writes the mapping back.
    #[must_use = "writing the store can fail; the Result must be handled"]
    pub fn add_or_replace(
        &mut self,
        index: SlideIndex,
        entry: OverrideEntry,
    ) -> Result<(), StoreError> {
        let previous = self.overrides.insert(index, entry);
        let shadowed = self.skipped.remove(&index.to_string());
        if let Err(e) = self.save() {
            match previous {
                Some(previous) => self.overrides.insert(index, previous),
                None => self.overrides.remove(&index),
            };
            if let Some(value) = shadowed {
                self.skipped.insert(index.to_string(), value);
            }
            return Err(e);
        }
        info!("Saved user media for slide {}", index);
        Ok(())
    }

    /// Removes the entry for `index`, if any, and writes the mapping back.
    #[must_use = "writing the store can fail; the Result must be handled"]
    pub fn remove(&mut self, index: SlideIndex) -> Result<(), StoreError> {
        let Some(previous) = self.overrides.remove(&index) else {
            debug!("No user media stored for slide {}", index);
            return Ok(());
        };
        if let Err(e) = self.save() {
            self.overrides.insert(index, previous);
            return Err(e);
        }
        info!("Removed user media for slide {}", index);
        Ok(())
    }

    pub fn has_user_media(&self) -> bool {
        !self.overrides.is_empty()
    }

    /// Summaries for display.
    pub fn user_media_info(&self) -> Vec<UserMediaInfo> {
        self.overrides
            .iter()
            .map(|(slide, entry)| UserMediaInfo {
                slide: *slide,
                kind: entry.kind,
                file_name: entry.file_name.clone().unwrap_or_else(|| "Unknown".to_string()),
                timestamp: entry.timestamp,
            })
            .collect()
    }

    fn save(&mut self) -> Result<(), StoreError> {
        let mut serialized: BTreeMap<String, serde_json::Value> = self.skipped.clone();
        for (index, entry) in &self.overrides {
            serialized.insert(index.to_string(), serde_json::to_value(entry)?);
        }
        let blob = serde_json::to_string(&serialized)?;
        self.local.set_item(STORAGE_KEY, blob)
    }
}

/// Splits the raw mapping into valid overrides and entries kept only for write-back.
fn parse_mapping(raw: Option<&str>) -> (OverrideMap, BTreeMap<String, serde_json::Value>) {
    let mut overrides = OverrideMap::new();
    let mut skipped = BTreeMap::new();
    let Some(raw) = raw else {
        info!("No user uploaded media found in local store");
        return (overrides, skipped);
    };
    let parsed: BTreeMap<String, serde_json::Value> = match serde_json::from_str(raw) {
        Ok(map) => map,
        Err(e) => {
            warn!("User media mapping under '{}' is corrupt, ignoring it: {}", STORAGE_KEY, e);
            return (overrides, skipped);
        }
    };
    info!("Loading user uploaded media files... {} entries found", parsed.len());

    for (key, value) in parsed {
        let Some(index) = key.trim().parse::<u32>().ok().and_then(SlideIndex::new) else {
            warn!("Skipping user media with invalid slide key '{}'", key);
            skipped.insert(key, value);
            continue;
        };
        let entry: OverrideEntry = match serde_json::from_value(value.clone()) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping malformed user media for slide {}: {}", index, e);
                skipped.insert(key, value);
                continue;
            }
        };
        if entry.source_reference().is_none() {
            warn!("No valid URL for slide {}", index);
            skipped.insert(key, value);
            continue;
        }
        debug!("Loaded user media for slide {} ({})", index, entry.kind);
        overrides.insert(index, entry);
    }
    (overrides, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MediaKind;

    fn idx(n: u32) -> SlideIndex {
        SlideIndex::new(n).unwrap()
    }

    #[test]
    fn missing_store_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = UserOverrideStore::open(dir.path().join("store.json"));
        assert!(store.load_all().is_empty());
        assert!(!store.has_user_media());
    }

    #[test]
    fn add_persists_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let mut store = UserOverrideStore::open(&path);
        store
            .add_or_replace(idx(2), OverrideEntry::with_url(MediaKind::Image, "blob:x", Some("x.png".into())))
            .expect("write succeeds");

        let reopened = UserOverrideStore::open(&path);
        let overrides = reopened.load_all();
        assert_eq!(overrides.len(), 1);
        assert_eq!(overrides[&idx(2)].url.as_deref(), Some("blob:x"));

        let raw: BTreeMap<String, String> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let mapping: serde_json::Value = serde_json::from_str(&raw[STORAGE_KEY]).unwrap();
        assert_eq!(mapping["2"]["type"], "image");
        assert_eq!(mapping["2"]["fileName"], "x.png");
    }

    #[test]
    fn replace_keeps_one_entry_per_slide() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = UserOverrideStore::open(dir.path().join("store.json"));
        store.add_or_replace(idx(1), OverrideEntry::with_url(MediaKind::Image, "a.png", None)).unwrap();
        store.add_or_replace(idx(1), OverrideEntry::with_url(MediaKind::Video, "b.mp4", None)).unwrap();
        let overrides = store.load_all();
        assert_eq!(overrides.len(), 1);
        assert_eq!(overrides[&idx(1)].kind, MediaKind::Video);
    }

    #[test]
    fn remove_writes_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let mut store = UserOverrideStore::open(&path);
        store.add_or_replace(idx(1), OverrideEntry::with_url(MediaKind::Image, "a.png", None)).unwrap();
        store.add_or_replace(idx(3), OverrideEntry::with_url(MediaKind::Image, "c.png", None)).unwrap();
        store.remove(idx(1)).unwrap();
        store.remove(idx(9)).unwrap();

        let overrides = UserOverrideStore::open(&path).load_all();
        assert_eq!(overrides.keys().copied().collect::<Vec<_>>(), vec![idx(3)]);
    }

    #[test]
    fn corrupt_mapping_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let mut local = LocalStore::open(&path);
        local.set_item(STORAGE_KEY, "{not json".to_string()).unwrap();
        let store = UserOverrideStore::new(LocalStore::open(&path));
        assert!(store.load_all().is_empty());
    }

    #[test]
    fn corrupt_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "]]]").unwrap();
        let store = UserOverrideStore::open(&path);
        assert!(store.load_all().is_empty());
    }

    #[test]
    fn invalid_entries_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let mapping = r#"{
            "0": {"type": "image", "url": "zero.png"},
            "two": {"type": "image", "url": "two.png"},
            "3": {"type": "image"},
            "4": {"type": "audio", "url": "four.mp3"},
            "5": {"type": "video", "data": "data:video/mp4;base64,AAAA", "timestamp": 5}
        }"#;
        LocalStore::open(&path).set_item(STORAGE_KEY, mapping.to_string()).unwrap();

        let overrides = UserOverrideStore::open(&path).load_all();
        assert_eq!(overrides.len(), 1);
        assert_eq!(overrides[&idx(5)].source_reference(), Some("data:video/mp4;base64,AAAA"));
    }

    #[test]
    fn user_media_info_defaults_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = UserOverrideStore::open(dir.path().join("nested").join("store.json"));
        store.add_or_replace(idx(4), OverrideEntry::with_url(MediaKind::Video, "v.mp4", None)).unwrap();
        let info = store.user_media_info();
        assert_eq!(info.len(), 1);
        assert_eq!(info[0].file_name, "Unknown");
        assert!(info[0].timestamp > 0);
    }

    #[test]
    fn skipped_entries_survive_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let mapping = r#"{"two": {"type": "image", "url": "two.png"}, "3": {"type": "image"}}"#;
        LocalStore::open(&path).set_item(STORAGE_KEY, mapping.to_string()).unwrap();

        let mut store = UserOverrideStore::open(&path);
        store.add_or_replace(idx(1), OverrideEntry::with_url(MediaKind::Video, "a.mp4", None)).unwrap();

        let raw: BTreeMap<String, String> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let written: serde_json::Value = serde_json::from_str(&raw[STORAGE_KEY]).unwrap();
        assert_eq!(written["two"]["url"], "two.png");
        assert_eq!(written["3"]["type"], "image");
        assert_eq!(written["1"]["url"], "a.mp4");

        // A valid entry for the same slide takes the malformed one's place.
        store.add_or_replace(idx(3), OverrideEntry::with_url(MediaKind::Image, "c.png", None)).unwrap();
        let reopened = UserOverrideStore::open(&path).load_all();
        assert_eq!(reopened.keys().copied().collect::<Vec<_>>(), vec![idx(1), idx(3)]);
        assert_eq!(reopened[&idx(3)].url.as_deref(), Some("c.png"));
    }

    #[test]
    fn mapping_is_read_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let mut store = UserOverrideStore::open(&path);
        store.add_or_replace(idx(1), OverrideEntry::with_url(MediaKind::Image, "a.png", None)).unwrap();

        std::fs::write(&path, "{}").unwrap();
        assert_eq!(store.load_all().len(), 1);
        assert!(store.has_user_media());

        store.add_or_replace(idx(2), OverrideEntry::with_url(MediaKind::Image, "b.png", None)).unwrap();
        let reopened = UserOverrideStore::open(&path).load_all();
        assert_eq!(reopened.keys().copied().collect::<Vec<_>>(), vec![idx(1), idx(2)]);
    }
}
