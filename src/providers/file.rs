//! File Provider
//!
//! One JSON record per key under a directory. Writes go through a temporary
//! file renamed over the target, so readers never observe a partial record.
//! Expired records are removed when read and by a periodic directory sweep;
//! unreadable records are deleted and reported as misses.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::registry::ProviderFactory;
use crate::cache::TagIndex;
use crate::config::{CacheConfig, FileConfig};
use crate::error::{CacheError, Result};
use crate::providers::{AtomicSupport, Provider, ProviderCounters, TagSupport};
use crate::tasks::spawn_sweep_task;

/// Version written into every record.
const RECORD_VERSION: u32 = 1;

/// Sanitized names longer than this are replaced by a digest of the key.
const MAX_FILE_STEM: usize = 200;

// == File Record ==
/// On-disk layout of one cache entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct FileRecord {
    v: u32,
    key: String,
    value: Value,
    /// None = never expires
    expiration: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tags: Vec<String>,
}

impl FileRecord {
    fn new(key: &str, value: Value, ttl: Option<Duration>, tags: &[String]) -> Self {
        let now = Utc::now();
        Self {
            v: RECORD_VERSION,
            key: key.to_string(),
            value,
            expiration: ttl.and_then(|ttl| deadline(now, ttl)),
            created_at: now,
            tags: tags.to_vec(),
        }
    }

    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expiration, Some(at) if now >= at)
    }

    fn ttl_remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.expiration.map(|at| (at - now).to_std().unwrap_or(Duration::ZERO))
    }
}

/// Absolute expiry for `ttl`. None when it falls outside the calendar range,
/// which the record stores as never expiring.
fn deadline(now: DateTime<Utc>, ttl: Duration) -> Option<DateTime<Utc>> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
}

// == File Naming ==
/// Maps a key to a file stem.
///
/// `[A-Za-z0-9_-]` is kept, every other byte becomes `%XX`. Stems over
/// [`MAX_FILE_STEM`] bytes become `~` followed by the SHA-256 hex digest of
/// the key; `~` never survives sanitization, so the two forms cannot collide.
pub fn file_stem(key: &str) -> String {
    let mut stem = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-' {
            stem.push(byte as char);
        } else {
            stem.push_str(&format!("%{byte:02X}"));
        }
    }

    if stem.len() > MAX_FILE_STEM {
        format!("~{}", hex::encode(Sha256::digest(key.as_bytes())))
    } else {
        stem
    }
}

// == File Provider ==
pub struct FileProvider {
    dir: Arc<CacheDir>,
    sweeper: StdMutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

/// Directory state shared with the sweep task.
struct CacheDir {
    path: PathBuf,
    suffix: String,
    mode: u32,
    gc_interval: Duration,
    /// Serializes all filesystem access and owns the tag index
    tags: Mutex<TagIndex>,
    expirations: AtomicU64,
}

impl FileProvider {
    // == Open ==
    /// Creates the directory if needed and rebuilds the tag index from the
    /// records already on disk. No background work is started.
    pub async fn open(config: &FileConfig) -> Result<Self> {
        tokio::fs::create_dir_all(&config.dir_path)
            .await
            .map_err(|e| {
                CacheError::Config(format!(
                    "cannot create cache directory {}: {e}",
                    config.dir_path.display()
                ))
            })?;

        let dir = CacheDir {
            path: config.dir_path.clone(),
            suffix: config.file_suffix.clone(),
            mode: config.file_mode,
            gc_interval: config.gc_interval,
            tags: Mutex::new(TagIndex::new()),
            expirations: AtomicU64::new(0),
        };

        let indexed = dir.rebuild_index().await?;
        debug!(dir = %dir.path.display(), indexed, "File provider opened");

        Ok(Self {
            dir: Arc::new(dir),
            sweeper: StdMutex::new(None),
            closed: AtomicBool::new(false),
        })
    }

    /// Full path of the file backing `key`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.path_for(key)
    }

    // == Start Sweeper ==
    /// Starts the periodic directory sweep. Calling it twice keeps the first task.
    pub fn start_sweeper(&self) {
        let mut slot = self.sweeper.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_some() || self.closed.load(Ordering::Acquire) {
            return;
        }

        let dir = self.dir.clone();
        *slot = Some(spawn_sweep_task("file", self.dir.gc_interval, move || {
            let dir = dir.clone();
            async move { dir.sweep().await }
        }));
    }

    /// Runs one directory sweep now. Returns the number of files removed.
    pub async fn sweep(&self) -> Result<usize> {
        self.ensure_open()?;
        self.dir.sweep().await
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(CacheError::Operation("file provider is closed".to_string()));
        }
        Ok(())
    }

    fn stop_sweeper(&self) {
        let handle = self.sweeper.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }
}

impl Drop for FileProvider {
    fn drop(&mut self) {
        self.stop_sweeper();
    }
}

impl CacheDir {
    fn path_for(&self, key: &str) -> PathBuf {
        self.path.join(format!("{}{}", file_stem(key), self.suffix))
    }

    fn is_cache_file(&self, name: &str) -> bool {
        name.ends_with(&self.suffix) && !name.starts_with('.')
    }

    // == Record IO ==
    /// Reads the record at `path`. Missing files are None; undecodable
    /// files are deleted and also reported as None.
    async fn read_record(&self, path: &Path) -> Result<Option<FileRecord>> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_slice::<FileRecord>(&bytes) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                warn!(path = %path.display(), "Removing corrupted cache file: {}", e);
                remove_if_present(path).await?;
                Ok(None)
            }
        }
    }

    /// Returns the live record for `key`, removing it if it has expired.
    async fn load_live(&self, tags: &mut TagIndex, key: &str) -> Result<Option<FileRecord>> {
        let path = self.path_for(key);
        let Some(record) = self.read_record(&path).await? else {
            tags.remove_key(key);
            return Ok(None);
        };

        if record.key != key {
            return Ok(None);
        }

        if record.is_expired(Utc::now()) {
            remove_if_present(&path).await?;
            tags.remove_key(key);
            self.expirations.fetch_add(1, Ordering::Relaxed);
            debug!(key, "Removed expired cache file");
            return Ok(None);
        }

        Ok(Some(record))
    }

    /// Writes `record` to a temporary file in the cache directory.
    async fn write_temp(&self, record: &FileRecord) -> Result<PathBuf> {
        let bytes = serde_json::to_vec(record)?;
        let tmp = self
            .path
            .join(format!(".{}.{}.tmp", file_stem(&record.key), uuid::Uuid::new_v4().simple()));

        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        options.mode(self.mode);

        let written = async {
            let mut file = options.open(&tmp).await?;
            file.write_all(&bytes).await?;
            file.flush().await?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                tokio::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(self.mode))
                    .await?;
            }
            Ok::<_, std::io::Error>(())
        }
        .await;

        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(CacheError::Operation(format!(
                "cannot write cache file for {}: {e}",
                record.key
            )));
        }
        Ok(tmp)
    }

    /// Replaces the record for its key.
    async fn write_record(&self, record: &FileRecord) -> Result<()> {
        let tmp = self.write_temp(record).await?;
        if let Err(e) = tokio::fs::rename(&tmp, self.path_for(&record.key)).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(CacheError::Operation(format!(
                "cannot store cache file for {}: {e}",
                record.key
            )));
        }
        Ok(())
    }

    /// Publishes the record only if no file exists for its key.
    async fn create_record(&self, record: &FileRecord) -> Result<bool> {
        let tmp = self.write_temp(record).await?;
        let linked = tokio::fs::hard_link(&tmp, self.path_for(&record.key)).await;
        let _ = tokio::fs::remove_file(&tmp).await;

        match linked {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(CacheError::Operation(format!(
                "cannot create cache file for {}: {e}",
                record.key
            ))),
        }
    }

    async fn store(&self, tags: &mut TagIndex, record: FileRecord) -> Result<()> {
        self.write_record(&record).await?;
        tags.remove_key(&record.key);
        tags.register(&record.key, &record.tags);
        Ok(())
    }

    async fn remove(&self, tags: &mut TagIndex, key: &str) -> Result<bool> {
        if self.load_live(tags, key).await?.is_none() {
            return Ok(false);
        }
        remove_if_present(&self.path_for(key)).await?;
        tags.remove_key(key);
        Ok(true)
    }

    /// Confirms the directory still exists and accepts new files.
    async fn check_writable(&self) -> Result<()> {
        let marker = self.path.join(format!(".health.{}.tmp", uuid::Uuid::new_v4().simple()));
        let created = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&marker)
            .await;

        match created {
            Ok(_) => remove_if_present(&marker).await,
            Err(e) => Err(CacheError::Operation(format!(
                "cache directory {} is not writable: {e}",
                self.path.display()
            ))),
        }
    }

    // == Directory Walks ==
    async fn cache_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.path).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            if entry.file_type().await?.is_file() && self.is_cache_file(&name.to_string_lossy()) {
                files.push(entry.path());
            }
        }
        Ok(files)
    }

    async fn rebuild_index(&self) -> Result<usize> {
        let mut tags = self.tags.lock().await;
        tags.clear();

        let now = Utc::now();
        let mut indexed = 0;
        for path in self.cache_files().await? {
            let Some(record) = self.read_record(&path).await? else {
                continue;
            };
            if record.is_expired(now) {
                remove_if_present(&path).await?;
                self.expirations.fetch_add(1, Ordering::Relaxed);
            } else if !record.tags.is_empty() {
                tags.register(&record.key, &record.tags);
                indexed += 1;
            }
        }
        Ok(indexed)
    }

    /// Removes expired and corrupted files. Returns how many were removed.
    async fn sweep(&self) -> Result<usize> {
        let mut tags = self.tags.lock().await;

        let now = Utc::now();
        let mut removed = 0;
        for path in self.cache_files().await? {
            match self.read_record(&path).await? {
                None => removed += 1,
                Some(record) if record.is_expired(now) => {
                    remove_if_present(&path).await?;
                    tags.remove_key(&record.key);
                    self.expirations.fetch_add(1, Ordering::Relaxed);
                    removed += 1;
                }
                Some(_) => {}
            }
        }
        Ok(removed)
    }

    async fn clear(&self) -> Result<usize> {
        let mut tags = self.tags.lock().await;
        let files = self.cache_files().await?;
        for path in &files {
            remove_if_present(path).await?;
        }
        tags.clear();
        Ok(files.len())
    }
}

async fn remove_if_present(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl Provider for FileProvider {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn get(&self, key: &str) -> Result<Option<Value>> {
        self.ensure_open()?;
        let mut tags = self.dir.tags.lock().await;
        Ok(self.dir.load_live(&mut tags, key).await?.map(|r| r.value))
    }

    async fn get_multi(&self, keys: &[String]) -> Result<HashMap<String, Value>> {
        self.ensure_open()?;
        let mut tags = self.dir.tags.lock().await;

        let mut found = HashMap::with_capacity(keys.len());
        for key in keys {
            if let Some(record) = self.dir.load_live(&mut tags, key).await? {
                found.insert(key.clone(), record.value);
            }
        }
        Ok(found)
    }

    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<()> {
        self.ensure_open()?;
        let record = FileRecord::new(key, value, ttl, &[]);
        let mut tags = self.dir.tags.lock().await;
        self.dir.store(&mut tags, record).await
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.ensure_open()?;
        let mut tags = self.dir.tags.lock().await;
        self.dir.remove(&mut tags, key).await
    }

    async fn delete_multi(&self, keys: &[String]) -> Result<usize> {
        self.ensure_open()?;
        let mut tags = self.dir.tags.lock().await;

        let mut removed = 0;
        for key in keys {
            if self.dir.remove(&mut tags, key).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.ensure_open()?;
        let mut tags = self.dir.tags.lock().await;
        Ok(self.dir.load_live(&mut tags, key).await?.is_some())
    }

    async fn flush(&self) -> Result<()> {
        self.ensure_open()?;
        let removed = self.dir.clear().await?;
        debug!(removed, "File provider flushed");
        Ok(())
    }

    async fn get_ttl(&self, key: &str) -> Result<Option<Duration>> {
        self.ensure_open()?;
        let mut tags = self.dir.tags.lock().await;
        match self.dir.load_live(&mut tags, key).await? {
            Some(record) => Ok(record.ttl_remaining(Utc::now())),
            None => Err(CacheError::NotFound(key.to_string())),
        }
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.stop_sweeper();
        info!(dir = %self.dir.path.display(), "File provider closed");
        Ok(())
    }

    async fn counters(&self) -> ProviderCounters {
        ProviderCounters {
            evictions: 0,
            expirations: self.dir.expirations.load(Ordering::Relaxed),
            entries: None,
        }
    }

    async fn reset_counters(&self) {
        self.dir.expirations.store(0, Ordering::Relaxed);
    }

    async fn health_check(&self) -> Result<()> {
        self.ensure_open()?;
        self.dir.check_writable().await
    }

    fn tagging(&self) -> Option<&dyn TagSupport> {
        Some(self)
    }

    fn atomic(&self) -> Option<&dyn AtomicSupport> {
        Some(self)
    }
}

#[async_trait]
impl TagSupport for FileProvider {
    async fn set_with_tags(
        &self,
        key: &str,
        value: Value,
        tags: &[String],
        ttl: Option<Duration>,
    ) -> Result<()> {
        self.ensure_open()?;
        let record = FileRecord::new(key, value, ttl, tags);
        let mut index = self.dir.tags.lock().await;
        self.dir.store(&mut index, record).await
    }

    async fn keys_by_tag(&self, tag: &str) -> Result<Vec<String>> {
        self.ensure_open()?;
        let mut index = self.dir.tags.lock().await;

        let mut live = Vec::new();
        for key in index.keys_for(tag) {
            if self.dir.load_live(&mut index, &key).await?.is_some() {
                live.push(key);
            }
        }
        Ok(live)
    }

    async fn delete_by_tag(&self, tag: &str) -> Result<usize> {
        self.ensure_open()?;
        let mut index = self.dir.tags.lock().await;

        let mut removed = 0;
        for key in index.take_tag(tag) {
            let Some(record) = self.dir.load_live(&mut index, &key).await? else {
                continue;
            };
            if record.tags.iter().any(|t| t == tag) {
                remove_if_present(&self.dir.path_for(&key)).await?;
                removed += 1;
            } else {
                index.register(&key, &record.tags);
            }
        }
        Ok(removed)
    }
}

#[async_trait]
impl AtomicSupport for FileProvider {
    async fn set_if_absent(&self, key: &str, value: Value, ttl: Duration) -> Result<bool> {
        self.ensure_open()?;
        let record = FileRecord::new(key, value, Some(ttl), &[]);
        let mut tags = self.dir.tags.lock().await;

        if self.dir.load_live(&mut tags, key).await?.is_some() {
            return Ok(false);
        }
        self.dir.create_record(&record).await
    }

    async fn delete_if_equals(&self, key: &str, expected: &Value) -> Result<bool> {
        self.ensure_open()?;
        let mut tags = self.dir.tags.lock().await;

        match self.dir.load_live(&mut tags, key).await? {
            Some(record) if &record.value == expected => {
                remove_if_present(&self.dir.path_for(key)).await?;
                tags.remove_key(key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn expire_if_equals(&self, key: &str, expected: &Value, ttl: Duration) -> Result<bool> {
        self.ensure_open()?;
        let mut tags = self.dir.tags.lock().await;

        match self.dir.load_live(&mut tags, key).await? {
            Some(mut record) if &record.value == expected => {
                record.expiration = deadline(Utc::now(), ttl);
                self.dir.write_record(&record).await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

// == Factory ==
/// Opens a [`FileProvider`] and starts its directory sweep.
#[derive(Debug, Default)]
pub struct FileProviderFactory;

#[async_trait]
impl ProviderFactory for FileProviderFactory {
    async fn create(&self, config: &CacheConfig) -> Result<Arc<dyn Provider>> {
        let provider = FileProvider::open(&config.file).await?;
        provider.start_sweeper();
        info!(dir = %config.file.dir_path.display(), "File provider ready");
        Ok(Arc::new(provider))
    }
}
