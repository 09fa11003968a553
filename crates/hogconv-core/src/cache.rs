//! Incremental conversion cache.
//!
//! The record maps each strategy identifier to the raw submission content it was last
//! converted from. It travels as an opaque JSON blob through a [`KeyValueStore`] owned by
//! the caller. Reuse is decided on byte equality of content only.

use crate::error::{ConvertError, ConvertResult};
use crate::loader::Submission;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// Store key under which the cache blob lives.
pub const CACHE_KEY: &str = "hogconv.sync_cache";
pub const CACHE_VERSION: u32 = 1;

/// String-keyed get/set store supplied by the surrounding session.
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: String) -> ConvertResult<()>;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> ConvertResult<()> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }
}

/// Flat JSON object on disk; every `set` rewrites the file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl JsonFileStore {
    /// Open `path`, starting empty if the file does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> ConvertResult<Self> {
        let path = path.into();
        let values = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).map_err(|e| ConvertError::Store {
                message: format!("{}: {e}", path.display()),
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(ConvertError::path_access(&path, e)),
        };
        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> ConvertResult<()> {
        let raw = serde_json::to_string_pretty(&self.values).map_err(|e| ConvertError::Store {
            message: e.to_string(),
        })?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, raw).map_err(|e| ConvertError::path_access(&tmp, e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| ConvertError::path_access(&self.path, e))
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> ConvertResult<()> {
        self.values.insert(key.to_string(), value);
        self.persist()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub version: u32,
    /// Config fingerprint the entries were produced under.
    pub fingerprint: String,
    /// Identifier -> raw content at the last successful conversion.
    pub entries: BTreeMap<String, String>,
}

impl CacheRecord {
    pub fn new(fingerprint: impl Into<String>) -> Self {
        Self {
            version: CACHE_VERSION,
            fingerprint: fingerprint.into(),
            entries: BTreeMap::new(),
        }
    }

    pub fn from_blob(blob: &str) -> ConvertResult<Self> {
        serde_json::from_str(blob).map_err(|e| ConvertError::Cache {
            message: format!("unreadable cache record: {e}"),
        })
    }

    pub fn to_blob(&self) -> ConvertResult<String> {
        serde_json::to_string(self).map_err(|e| ConvertError::Cache {
            message: e.to_string(),
        })
    }

    /// Read the record from `store`. A missing or unreadable blob means "no prior record".
    pub fn load(store: &dyn KeyValueStore) -> Option<Self> {
        let blob = store.get(CACHE_KEY)?;
        match Self::from_blob(&blob) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring cache record");
                None
            }
        }
    }

    pub fn save(&self, store: &mut dyn KeyValueStore) -> ConvertResult<()> {
        store.set(CACHE_KEY, self.to_blob()?)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheDecision {
    /// Identical content was converted before; reuse its matrix.
    Unchanged,
    Changed,
}

/// Compares submissions against a prior record and builds the next one.
#[derive(Debug)]
pub struct CacheDiff {
    prior: BTreeMap<String, String>,
    next: CacheRecord,
}

impl CacheDiff {
    /// A prior record made under another fingerprint or version is discarded whole.
    pub fn new(prior: Option<CacheRecord>, fingerprint: &str) -> Self {
        let prior = match prior {
            Some(record) if record.version == CACHE_VERSION && record.fingerprint == fingerprint => {
                record.entries
            }
            Some(record) => {
                tracing::info!(
                    entries = record.entries.len(),
                    "cache fingerprint changed, reprocessing everything"
                );
                BTreeMap::new()
            }
            None => BTreeMap::new(),
        };
        Self {
            prior,
            next: CacheRecord::new(fingerprint),
        }
    }

    pub fn decide(&self, submission: &Submission) -> CacheDecision {
        match self.prior.get(&submission.identifier) {
            Some(content) if *content == submission.content => CacheDecision::Unchanged,
            _ => CacheDecision::Changed,
        }
    }

    /// Remember `content` as the latest successfully converted version of `id`.
    pub fn record(&mut self, id: &str, content: &str) {
        self.next.entries.insert(id.to_string(), content.to_string());
    }

    pub fn finish(self) -> CacheRecord {
        self.next
    }
}
