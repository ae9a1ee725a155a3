//! Series cache: one JSON document per (series, limit, sort order).
//!
//! Layout: `{cache_dir}/{SERIES}_{limit}_{sort}.json`
//!
//! Features:
//! - Atomic writes (write to .tmp, rename into place)
//! - Parse + invariant validation on read
//! - Quarantine for corrupt files ({filename}.quarantined)
//! - Scoped clearing (everything, or one series)
//!
//! The observation window is deliberately not part of the key, so requests
//! that differ only by window share an entry.

use super::provider::FetchError;
use crate::domain::{FetchOptions, SeriesResult, SortOrder};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

const ENTRY_EXT: &str = ".json";
const QUARANTINE_EXT: &str = ".json.quarantined";

/// Deterministic address of a cached series result.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    series_id: String,
    limit: u32,
    sort_order: SortOrder,
}

impl CacheKey {
    pub fn new(series_id: impl Into<String>, options: &FetchOptions) -> Self {
        Self {
            series_id: series_id.into(),
            limit: options.limit,
            sort_order: options.sort_order,
        }
    }

    pub fn series_id(&self) -> &str {
        &self.series_id
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn sort_order(&self) -> SortOrder {
        self.sort_order
    }

    /// File stem: `{series}_{limit}_{sort}`.
    pub fn file_stem(&self) -> String {
        format!("{}_{}_{}", self.series_id, self.limit, self.sort_order)
    }

    /// Inverse of [`CacheKey::file_stem`]. Series ids may themselves contain `_`.
    pub fn parse(stem: &str) -> Option<Self> {
        let mut parts = stem.rsplitn(3, '_');
        let sort_order = parts.next()?.parse::<SortOrder>().ok()?;
        let limit = parts.next()?.parse::<u32>().ok()?;
        let series_id = parts.next().filter(|s| !s.is_empty())?;
        Some(Self {
            series_id: series_id.to_string(),
            limit,
            sort_order,
        })
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_stem())
    }
}

/// Which entries a clear operation removes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClearScope {
    All,
    Series(String),
}

impl ClearScope {
    pub fn matches(&self, key: &CacheKey) -> bool {
        match self {
            ClearScope::All => true,
            ClearScope::Series(id) => key.series_id == *id,
        }
    }
}

/// Key/value persistence for series results.
///
/// Stores never judge freshness; that is the fetcher's call.
pub trait CacheStore: Send + Sync {
    /// True iff an entry for `key` is present.
    fn exists(&self, key: &CacheKey) -> bool;

    /// Load the entry for `key`. Unparseable or invalid content is `CorruptCacheEntry`.
    fn read(&self, key: &CacheKey) -> Result<SeriesResult, FetchError>;

    /// Persist `result` under `key`, replacing any previous entry.
    fn write(&self, key: &CacheKey, result: &SeriesResult) -> Result<(), FetchError>;

    /// Remove all entries in `scope`, returning how many were removed.
    fn clear(&self, scope: &ClearScope) -> Result<usize, FetchError>;
}

fn decode_entry(key: &CacheKey, content: &str) -> Result<SeriesResult, FetchError> {
    let corrupt = |reason: String| FetchError::CorruptCacheEntry {
        key: key.file_stem(),
        reason,
    };
    let result: SeriesResult = serde_json::from_str(content).map_err(|e| corrupt(e.to_string()))?;
    result.validate().map_err(corrupt)?;
    if result.series_id() != key.series_id() {
        return Err(corrupt(format!(
            "entry holds series {}, expected {}",
            result.series_id(),
            key.series_id()
        )));
    }
    Ok(result)
}

fn encode_entry(result: &SeriesResult) -> Result<String, FetchError> {
    serde_json::to_string_pretty(result)
        .map_err(|e| FetchError::Cache(format!("entry serialization: {e}")))
}

// ── On-disk JSON cache ──────────────────────────────────────────────

/// Summary of one file in the cache directory.
#[derive(Debug, Clone)]
pub struct CacheEntryInfo {
    pub key: CacheKey,
    pub bytes: u64,
    /// `None` when the entry could not be decoded.
    pub count: Option<usize>,
    pub retrieved_at: Option<DateTime<Utc>>,
    pub quarantined: bool,
}

/// The JSON file cache.
pub struct JsonFileCache {
    cache_dir: PathBuf,
}

impl JsonFileCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    /// Root directory of the cache.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Path to the entry for a key: `{cache_dir}/{stem}.json`
    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.cache_dir.join(format!("{}{ENTRY_EXT}", key.file_stem()))
    }

    fn quarantine_path(&self, key: &CacheKey) -> PathBuf {
        self.cache_dir
            .join(format!("{}{QUARANTINE_EXT}", key.file_stem()))
    }

    /// Unique per process so concurrent writers never share a temp file.
    fn tmp_path(&self, key: &CacheKey) -> PathBuf {
        self.cache_dir.join(format!(
            "{}{ENTRY_EXT}.{}.tmp",
            key.file_stem(),
            std::process::id()
        ))
    }

    /// Cache files in the directory, with their decoded keys.
    fn scan(&self) -> Result<Vec<(PathBuf, CacheKey, bool)>, FetchError> {
        let entries = match fs::read_dir(&self.cache_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(FetchError::Cache(format!("read dir: {e}"))),
        };

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| FetchError::Cache(format!("dir entry: {e}")))?;
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            let (stem, quarantined) = if let Some(stem) = name.strip_suffix(QUARANTINE_EXT) {
                (stem, true)
            } else if let Some(stem) = name.strip_suffix(ENTRY_EXT) {
                (stem, false)
            } else {
                continue;
            };

            // Skip files that aren't ours
            if let Some(key) = CacheKey::parse(stem) {
                files.push((path, key, quarantined));
            }
        }
        Ok(files)
    }

    /// List every entry (including quarantined files), sorted by key.
    pub fn entries(&self) -> Result<Vec<CacheEntryInfo>, FetchError> {
        let mut infos: Vec<CacheEntryInfo> = self
            .scan()?
            .into_iter()
            .map(|(path, key, quarantined)| {
                let bytes = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
                let decoded = if quarantined {
                    None
                } else {
                    fs::read_to_string(&path)
                        .ok()
                        .and_then(|content| decode_entry(&key, &content).ok())
                };
                CacheEntryInfo {
                    key,
                    bytes,
                    count: decoded.as_ref().map(|r| r.count()),
                    retrieved_at: decoded.as_ref().map(|r| r.retrieved_at()),
                    quarantined,
                }
            })
            .collect();
        infos.sort_by(|a, b| a.key.cmp(&b.key).then(a.quarantined.cmp(&b.quarantined)));
        Ok(infos)
    }
}

impl CacheStore for JsonFileCache {
    fn exists(&self, key: &CacheKey) -> bool {
        self.entry_path(key).is_file()
    }

    fn read(&self, key: &CacheKey) -> Result<SeriesResult, FetchError> {
        let path = self.entry_path(key);
        let content = fs::read_to_string(&path)
            .map_err(|e| FetchError::Cache(format!("read {}: {e}", path.display())))?;

        decode_entry(key, &content).map_err(|e| {
            // Quarantine the corrupt file so the next fetch is a miss
            log::warn!("quarantining corrupt cache file {}: {e}", path.display());
            let _ = fs::rename(&path, self.quarantine_path(key));
            e
        })
    }

    fn write(&self, key: &CacheKey, result: &SeriesResult) -> Result<(), FetchError> {
        fs::create_dir_all(&self.cache_dir)
            .map_err(|e| FetchError::Cache(format!("failed to create dir: {e}")))?;

        let content = encode_entry(result)?;
        let path = self.entry_path(key);
        let tmp_path = self.tmp_path(key);

        let write_tmp = || -> std::io::Result<()> {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(content.as_bytes())?;
            file.sync_all()
        };
        write_tmp().map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            FetchError::Cache(format!("write {}: {e}", tmp_path.display()))
        })?;

        // Atomic rename
        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            FetchError::Cache(format!("atomic rename failed: {e}"))
        })?;

        log::debug!("cached {key} at {}", path.display());
        Ok(())
    }

    fn clear(&self, scope: &ClearScope) -> Result<usize, FetchError> {
        let mut removed = 0;
        for (path, key, _) in self.scan()? {
            if !scope.matches(&key) {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(FetchError::Cache(format!(
                        "remove {}: {e}",
                        path.display()
                    )))
                }
            }
        }
        Ok(removed)
    }
}

// ── In-memory cache ─────────────────────────────────────────────────

/// Cache held in process memory. Entries are stored serialized, like on disk.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<CacheKey, String>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store raw content under a key, bypassing serialization.
    pub fn insert_raw(&self, key: CacheKey, content: impl Into<String>) {
        self.guard().insert(key, content.into());
    }

    pub fn len(&self) -> usize {
        self.guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries are whole serialized strings, so a panic while the lock was held
    /// cannot leave one half-written; recover the map instead of failing.
    fn guard(&self) -> MutexGuard<'_, HashMap<CacheKey, String>> {
        self.entries.lock().unwrap_or_else(|poisoned| {
            log::warn!("memory cache lock poisoned; continuing with current contents");
            poisoned.into_inner()
        })
    }
}

impl CacheStore for MemoryCache {
    fn exists(&self, key: &CacheKey) -> bool {
        self.guard().contains_key(key)
    }

    fn read(&self, key: &CacheKey) -> Result<SeriesResult, FetchError> {
        let entries = self.guard();
        let content = entries
            .get(key)
            .ok_or_else(|| FetchError::Cache(format!("no cached entry for {key}")))?;
        decode_entry(key, content)
    }

    fn write(&self, key: &CacheKey, result: &SeriesResult) -> Result<(), FetchError> {
        let content = encode_entry(result)?;
        self.guard().insert(key.clone(), content);
        Ok(())
    }

    fn clear(&self, scope: &ClearScope) -> Result<usize, FetchError> {
        let mut entries = self.guard();
        let before = entries.len();
        entries.retain(|key, _| !scope.matches(key));
        Ok(before - entries.len())
    }
}

// ── Disabled cache ──────────────────────────────────────────────────

/// Cache that stores nothing: every lookup misses, every write is dropped.
pub struct DisabledCache;

impl CacheStore for DisabledCache {
    fn exists(&self, _key: &CacheKey) -> bool {
        false
    }

    fn read(&self, key: &CacheKey) -> Result<SeriesResult, FetchError> {
        Err(FetchError::Cache(format!("cache disabled; no entry for {key}")))
    }

    fn write(&self, _key: &CacheKey, _result: &SeriesResult) -> Result<(), FetchError> {
        Ok(())
    }

    fn clear(&self, _scope: &ClearScope) -> Result<usize, FetchError> {
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ErrorKind;
    use crate::domain::Observation;
    use chrono::{NaiveDate, TimeZone};
    use tempfile::TempDir;

    fn key(series: &str) -> CacheKey {
        CacheKey::new(series, &FetchOptions::default())
    }

    fn sample_result(series: &str) -> SeriesResult {
        SeriesResult::new(
            series,
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            vec![
                Observation::new(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(), "5.0"),
                Observation::new(NaiveDate::from_ymd_opt(2020, 3, 1).unwrap(), "5.2"),
            ],
        )
    }

    #[test]
    fn key_excludes_window() {
        let narrow = FetchOptions::default()
            .with_window(NaiveDate::from_ymd_opt(2020, 1, 1), NaiveDate::from_ymd_opt(2020, 6, 1));
        assert_eq!(CacheKey::new("SLOAS", &narrow), key("SLOAS"));
        assert_eq!(key("SLOAS").file_stem(), "SLOAS_1000_asc");
    }

    #[test]
    fn key_parse_roundtrip_with_underscores() {
        let opts = FetchOptions::default()
            .with_limit(3)
            .with_sort_order(SortOrder::Descending);
        let k = CacheKey::new("DGS10_X", &opts);
        assert_eq!(CacheKey::parse(&k.file_stem()), Some(k));
        assert_eq!(CacheKey::parse("notakey"), None);
        assert_eq!(CacheKey::parse("_1000_asc"), None);
        assert_eq!(CacheKey::parse("A_big_asc"), None);
    }

    #[test]
    fn write_and_read_roundtrip() {
        let dir = TempDir::new().unwrap();
        let cache = JsonFileCache::new(dir.path().join("cache"));

        assert!(!cache.exists(&key("SLOAS")));
        cache.write(&key("SLOAS"), &sample_result("SLOAS")).unwrap();

        assert!(cache.exists(&key("SLOAS")));
        assert_eq!(cache.read(&key("SLOAS")).unwrap(), sample_result("SLOAS"));
        assert!(dir.path().join("cache/SLOAS_1000_asc.json").is_file());
    }

    #[test]
    fn write_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let cache = JsonFileCache::new(dir.path());
        cache.write(&key("A"), &sample_result("A")).unwrap();
        cache.write(&key("A"), &sample_result("A")).unwrap();

        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["A_1000_asc.json".to_string()]);
    }

    #[test]
    fn corrupt_entry_is_reported_and_quarantined() {
        let dir = TempDir::new().unwrap();
        let cache = JsonFileCache::new(dir.path());
        fs::write(dir.path().join("SLOAS_1000_asc.json"), "{\"series_id\": \"SLO").unwrap();

        let err = cache.read(&key("SLOAS")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptCacheEntry);
        assert!(!cache.exists(&key("SLOAS")));
        assert!(dir.path().join("SLOAS_1000_asc.json.quarantined").is_file());
    }

    #[test]
    fn entry_for_another_series_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let cache = JsonFileCache::new(dir.path());
        let misplaced = encode_entry(&sample_result("UNRATE")).unwrap();
        fs::write(dir.path().join("SLOAS_1000_asc.json"), misplaced).unwrap();

        let err = cache.read(&key("SLOAS")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptCacheEntry);
        assert!(err.to_string().contains("UNRATE"));
        assert!(dir.path().join("SLOAS_1000_asc.json.quarantined").is_file());
    }

    #[test]
    fn clear_series_leaves_other_series_alone() {
        let dir = TempDir::new().unwrap();
        let cache = JsonFileCache::new(dir.path());
        let desc = FetchOptions::default().with_sort_order(SortOrder::Descending);

        cache.write(&key("SLOAS"), &sample_result("SLOAS")).unwrap();
        cache
            .write(&CacheKey::new("SLOAS", &desc), &sample_result("SLOAS"))
            .unwrap();
        cache.write(&key("SLOAS_X"), &sample_result("SLOAS_X")).unwrap();
        cache.write(&key("UNRATE"), &sample_result("UNRATE")).unwrap();

        let removed = cache.clear(&ClearScope::Series("SLOAS".into())).unwrap();
        assert_eq!(removed, 2);
        assert!(!cache.exists(&key("SLOAS")));
        assert!(!cache.exists(&CacheKey::new("SLOAS", &desc)));
        assert!(cache.exists(&key("SLOAS_X")));
        assert!(cache.exists(&key("UNRATE")));
    }

    #[test]
    fn clear_all_and_missing_dir_are_fine() {
        let dir = TempDir::new().unwrap();
        let cache = JsonFileCache::new(dir.path().join("never-created"));
        assert_eq!(cache.clear(&ClearScope::All).unwrap(), 0);

        cache.write(&key("A"), &sample_result("A")).unwrap();
        cache.write(&key("B"), &sample_result("B")).unwrap();
        fs::write(cache.cache_dir().join("notes.txt"), "keep me").unwrap();

        assert_eq!(cache.clear(&ClearScope::All).unwrap(), 2);
        assert!(cache.cache_dir().join("notes.txt").is_file());
    }

    #[test]
    fn entries_lists_decoded_and_quarantined() {
        let dir = TempDir::new().unwrap();
        let cache = JsonFileCache::new(dir.path());
        cache.write(&key("A"), &sample_result("A")).unwrap();
        fs::write(dir.path().join("B_1000_asc.json.quarantined"), "garbage").unwrap();

        let entries = cache.entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].key.series_id(), "A");
        assert_eq!(entries[0].count, Some(2));
        assert!(!entries[0].quarantined);
        assert_eq!(entries[1].key.series_id(), "B");
        assert!(entries[1].quarantined);
        assert_eq!(entries[1].count, None);
    }

    #[test]
    fn memory_cache_behaves_like_disk() {
        let cache = MemoryCache::new();
        cache.write(&key("A"), &sample_result("A")).unwrap();
        assert!(cache.exists(&key("A")));
        assert_eq!(cache.read(&key("A")).unwrap(), sample_result("A"));

        cache.insert_raw(key("B"), "not json");
        assert_eq!(cache.read(&key("B")).unwrap_err().kind(), ErrorKind::CorruptCacheEntry);

        assert_eq!(cache.clear(&ClearScope::Series("A".into())).unwrap(), 1);
        assert!(!cache.exists(&key("A")));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn memory_cache_survives_poisoned_lock() {
        let cache = MemoryCache::new();
        cache.write(&key("A"), &sample_result("A")).unwrap();

        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _held = cache.entries.lock().unwrap();
            panic!("writer crashed while holding the lock");
        }));
        assert!(cache.entries.is_poisoned());

        assert!(cache.exists(&key("A")));
        cache.insert_raw(key("B"), "not json");
        assert_eq!(cache.len(), 2);
        cache.write(&key("C"), &sample_result("C")).unwrap();
        assert_eq!(cache.read(&key("C")).unwrap(), sample_result("C"));
    }

    #[test]
    fn disabled_cache_never_hits() {
        let cache = DisabledCache;
        cache.write(&key("A"), &sample_result("A")).unwrap();
        assert!(!cache.exists(&key("A")));
        assert!(cache.read(&key("A")).is_err());
        assert_eq!(cache.clear(&ClearScope::All).unwrap(), 0);
    }
}
