//! Hash records binding a cache directory to its governing inputs.
//!
//! A [`HashRecord`] maps field names (`"lmaxqe"`, `"clscmb tt"`, ...) to
//! string digests. Spectra are digested with [`cl_hash`]; integers are stored
//! in decimal. Records are persisted as pretty-printed JSON with sorted keys.
use crate::cache::errors::{CacheError, CacheResult};
use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::{collections::BTreeMap, fs, path::Path};

/// SHA-256 hex digest of the little-endian bytes of `cl`.
pub fn cl_hash(cl: ArrayView1<f64>) -> String {
    let mut hasher = Sha256::new();
    for v in cl.iter() {
        hasher.update(v.to_le_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Field-name → digest map of a cache directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HashRecord {
    fields: BTreeMap<String, String>,
}

impl HashRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, digest: impl Into<String>) {
        self.fields.insert(field.into(), digest.into());
    }

    /// Digest `cl` under `field`.
    pub fn insert_cl(&mut self, field: impl Into<String>, cl: ArrayView1<f64>) {
        self.insert(field, cl_hash(cl));
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Read a record written by [`HashRecord::save`].
    pub fn load(path: &Path) -> CacheResult<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn save(&self, path: &Path) -> CacheResult<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Compare `stored` against `current` field by field.
///
/// # Errors
/// - [`CacheError::HashMismatch`] on the first differing field (in sorted
///   order). A field present on one side only counts as a mismatch.
pub fn hash_check(stored: &HashRecord, current: &HashRecord) -> CacheResult<()> {
    let absent = || "<absent>".to_string();
    for (field, digest) in stored.fields.iter() {
        match current.get(field) {
            Some(cur) if cur == digest => {}
            cur => {
                return Err(CacheError::HashMismatch {
                    field: field.clone(),
                    stored: digest.clone(),
                    current: cur.map_or_else(absent, str::to_string),
                });
            }
        }
    }
    if let Some(field) = current.fields.keys().find(|k| !stored.fields.contains_key(*k)) {
        return Err(CacheError::HashMismatch {
            field: field.clone(),
            stored: absent(),
            current: current.fields[field].clone(),
        });
    }
    Ok(())
}
