//! URL-keyed waveform cache with a best-effort durable layer.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::{debug, warn};

use super::WaveformError;

/// Durable key prefix for waveform entries.
const KEY_PREFIX: &str = "waveform_";

/// Key under which the waveform for `url` is persisted.
pub fn cache_key(url: &str) -> String {
    format!("{}{}", KEY_PREFIX, url)
}

/// String key-value storage that survives the process.
pub trait DurableStore: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<String>, WaveformError>;
    fn save(&self, key: &str, value: &str) -> Result<(), WaveformError>;
}

/// Process-local store, mostly for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_raw(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }
}

impl DurableStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<String>, WaveformError> {
        Ok(self.raw(key))
    }

    fn save(&self, key: &str, value: &str) -> Result<(), WaveformError> {
        self.insert_raw(key, value);
        Ok(())
    }
}

/// One JSON file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Use `dir` for entries, creating it if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, WaveformError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{:016x}.json", fnv1a(key.as_bytes())))
    }
}

impl DurableStore for FileStore {
    fn load(&self, key: &str) -> Result<Option<String>, WaveformError> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn save(&self, key: &str, value: &str) -> Result<(), WaveformError> {
        std::fs::write(self.path_for(key), value)?;
        Ok(())
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in bytes {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

fn parse_entry(raw: &str) -> Result<Vec<f32>, WaveformError> {
    let values: Vec<f32> = serde_json::from_str(raw)?;
    if let Some(bad) = values
        .iter()
        .find(|value| !value.is_finite() || **value < 0.0 || **value > 1.0)
    {
        return Err(WaveformError::InvalidData(format!(
            "amplitude {} outside [0, 1]",
            bad
        )));
    }
    Ok(values)
}

/// Waveform previews keyed by URL.
///
/// Entries are never evicted. Writes are last-write-wins per URL; share one
/// cache between consumers with `Arc<WaveformCache>`.
pub struct WaveformCache {
    memory: Mutex<HashMap<String, Vec<f32>>>,
    store: Option<Box<dyn DurableStore>>,
}

impl WaveformCache {
    /// Cache without a durable layer.
    pub fn in_memory() -> Self {
        Self {
            memory: Mutex::new(HashMap::new()),
            store: None,
        }
    }

    /// Cache backed by `store`.
    pub fn with_store(store: Box<dyn DurableStore>) -> Self {
        Self {
            memory: Mutex::new(HashMap::new()),
            store: Some(store),
        }
    }

    /// Look up `url` in memory, then in the durable store.
    ///
    /// Durable entries that fail to parse or hold out-of-range values are
    /// ignored.
    pub fn get(&self, url: &str) -> Option<Vec<f32>> {
        if let Some(hit) = self.memory.lock().unwrap().get(url) {
            return Some(hit.clone());
        }
        let store = self.store.as_ref()?;
        let raw = match store.load(&cache_key(url)) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                warn!("waveform store read failed for {}: {}", url, err);
                return None;
            }
        };
        match parse_entry(&raw) {
            Ok(values) => {
                debug!("waveform for {} restored from durable store", url);
                self.memory
                    .lock()
                    .unwrap()
                    .insert(url.to_string(), values.clone());
                Some(values)
            }
            Err(err) => {
                warn!("ignoring cached waveform for {}: {}", url, err);
                None
            }
        }
    }

    /// Store `values` for `url`. Values are clamped to `[0, 1]`.
    pub fn put(&self, url: &str, values: &[f32]) {
        let values: Vec<f32> = values
            .iter()
            .map(|v| if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 })
            .collect();
        if let Some(store) = &self.store {
            match serde_json::to_string(&values) {
                Ok(raw) => {
                    if let Err(err) = store.save(&cache_key(url), &raw) {
                        warn!("waveform store write failed for {}: {}", url, err);
                    }
                }
                Err(err) => warn!("failed to serialize waveform for {}: {}", url, err),
            }
        }
        self.memory.lock().unwrap().insert(url.to_string(), values);
    }

    /// Return the cached waveform or compute, store and return it.
    pub fn get_or_compute<F>(&self, url: &str, compute: F) -> Result<Vec<f32>, WaveformError>
    where
        F: FnOnce() -> Result<Vec<f32>, WaveformError>,
    {
        if let Some(hit) = self.get(url) {
            return Ok(hit);
        }
        let values = compute()?;
        self.put(url, &values);
        Ok(self.get(url).unwrap_or(values))
    }

    /// Entries currently held in memory.
    pub fn len(&self) -> usize {
        self.memory.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    struct SharedStore(Arc<MemoryStore>);

    impl DurableStore for SharedStore {
        fn load(&self, key: &str) -> Result<Option<String>, WaveformError> {
            self.0.load(key)
        }

        fn save(&self, key: &str, value: &str) -> Result<(), WaveformError> {
            self.0.save(key, value)
        }
    }

    #[test]
    fn durable_entries_use_prefixed_keys() {
        let backing = Arc::new(MemoryStore::new());
        let cache = WaveformCache::with_store(Box::new(SharedStore(backing.clone())));
        cache.put("https://cdn/a.mp3", &[0.0, 0.5, 1.5]);

        let raw = backing.raw("waveform_https://cdn/a.mp3").unwrap();
        let stored: Vec<f32> = serde_json::from_str(&raw).unwrap();
        assert_eq!(stored, vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn fresh_cache_restores_from_durable_store() {
        let backing = Arc::new(MemoryStore::new());
        backing.insert_raw(&cache_key("a"), "[0.1,0.9]");
        let cache = WaveformCache::with_store(Box::new(SharedStore(backing)));
        assert!(cache.is_empty());
        assert_eq!(cache.get("a"), Some(vec![0.1, 0.9]));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn corrupt_durable_entries_are_ignored() {
        let backing = Arc::new(MemoryStore::new());
        backing.insert_raw(&cache_key("broken"), "{not json");
        backing.insert_raw(&cache_key("range"), "[0.5, 2.0]");
        let cache = WaveformCache::with_store(Box::new(SharedStore(backing)));
        assert_eq!(cache.get("broken"), None);
        assert_eq!(cache.get("range"), None);
    }

    #[test]
    fn compute_runs_once_per_url() {
        let cache = WaveformCache::in_memory();
        let calls = AtomicUsize::new(0);
        for _ in 0..3 {
            let values = cache
                .get_or_compute("track", || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(vec![0.25, 1.0])
                })
                .unwrap();
            assert_eq!(values, vec![0.25, 1.0]);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn compute_errors_are_not_cached() {
        let cache = WaveformCache::in_memory();
        let result = cache.get_or_compute("bad", || {
            Err(WaveformError::InvalidData("empty".to_string()))
        });
        assert!(result.is_err());
        assert!(cache.get("bad").is_none());
    }

    #[test]
    fn file_store_round_trips_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        {
            let cache = WaveformCache::with_store(Box::new(FileStore::new(dir.path()).unwrap()));
            cache.put("file:///music/demo.wav", &[0.3, 0.6]);
        }
        let cache = WaveformCache::with_store(Box::new(FileStore::new(dir.path()).unwrap()));
        assert_eq!(cache.get("file:///music/demo.wav"), Some(vec![0.3, 0.6]));
        assert_eq!(cache.get("file:///music/other.wav"), None);
    }
}
