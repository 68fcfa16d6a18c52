//! Parameter-addressed cache for expensive intermediate artefacts.
//!
//! An entry is a bincode file under the cache directory whose name is derived
//! from a [`CacheKey`]. Changing any parameter, or the size/mtime of an input
//! file registered with [`CacheKey::file`], addresses a different entry.

use crate::libs::error::{GofmError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    name: String,
    params: Vec<(String, String)>,
}

impl CacheKey {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            params: vec![],
        }
    }

    pub fn param(mut self, key: &str, value: impl ToString) -> Self {
        self.params.push((key.to_string(), value.to_string()));
        self
    }

    /// Fingerprint an input file by byte length and modification time
    pub fn file(self, path: &str) -> Result<Self> {
        let meta = std::fs::metadata(path).map_err(|_| GofmError::MissingInput {
            path: PathBuf::from(path),
        })?;
        let mtime = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Ok(self.param(path, format!("{}@{}", meta.len(), mtime)))
    }

    /// ```
    /// use gofm::libs::cache::CacheKey;
    /// let key = CacheKey::new("gene2go")
    ///     .param("aspect", "biological_process")
    ///     .param("evidence", "IDA+IMP");
    /// assert_eq!(key.file_name().len(), "gene2go-".len() + 16 + ".bin".len());
    /// assert_ne!(key.file_name(), CacheKey::new("gene2go").file_name());
    /// ```
    pub fn file_name(&self) -> String {
        let mut joined = self.name.clone();
        for (k, v) in &self.params {
            joined.push('\0');
            joined.push_str(k);
            joined.push('=');
            joined.push_str(v);
        }
        format!("{}-{:016x}.bin", self.name, fxhash::hash64(&joined))
    }
}

#[derive(Debug, Clone)]
pub struct Cache {
    dir: Option<PathBuf>,
}

impl Cache {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: Some(dir.as_ref().to_path_buf()),
        }
    }

    /// A cache that never stores anything
    pub fn disabled() -> Self {
        Self { dir: None }
    }

    pub fn path_of(&self, key: &CacheKey) -> Option<PathBuf> {
        self.dir.as_ref().map(|d| d.join(key.file_name()))
    }

    /// Return the cached value for `key`, or compute, store and return it.
    ///
    /// An unreadable entry is treated as absent and overwritten.
    pub fn get_or_compute<T, F>(&self, key: &CacheKey, compute: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T>,
    {
        let Some(path) = self.path_of(key) else {
            return compute();
        };

        if path.is_file() {
            match crate::libs::io::load_bincode::<T>(&path) {
                Ok(value) => {
                    debug!("cache hit: {}", path.display());
                    return Ok(value);
                }
                Err(e) => warn!("discarding unreadable cache entry {}: {}", path.display(), e),
            }
        } else {
            debug!("cache miss: {}", path.display());
        }

        let value = compute()?;
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .map_err(|e| GofmError::Cache(format!("{}: {}", dir.display(), e)))?;
        }
        crate::libs::io::save_bincode(&value, &path)?;
        Ok(value)
    }
}
