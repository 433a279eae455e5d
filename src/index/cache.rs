//! On-disk caches for the KB and name indexes.
//!
//! A cache file is a JSON blob holding a content fingerprint next to the
//! payload. The fingerprint is checked on load and a mismatch invalidates
//! the cache, so a cache built from a different KB snapshot is rebuilt
//! instead of silently served.

use crate::error::{Error, Result};
use crate::kb::MemoryKb;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::UNIX_EPOCH;

#[derive(Serialize, Deserialize)]
struct CacheFile<T> {
    fingerprint: String,
    data: T,
}

/// Load a cached value if the file exists and its fingerprint matches.
pub fn load<T: DeserializeOwned>(path: &Path, fingerprint: &str) -> Option<T> {
    let bytes = fs::read(path).ok()?;
    let file: CacheFile<T> = match serde_json::from_slice(&bytes) {
        Ok(file) => file,
        Err(err) => {
            log::warn!("Ignoring unreadable cache {}: {err}", path.display());
            return None;
        }
    };
    if file.fingerprint != fingerprint {
        log::warn!(
            "Stale cache {} (fingerprint {} != {fingerprint}), rebuilding",
            path.display(),
            file.fingerprint
        );
        return None;
    }
    Some(file.data)
}

/// Persist a value with its fingerprint.
pub fn store<T: Serialize>(path: &Path, fingerprint: &str, data: &T) -> Result<()> {
    let file = CacheFile {
        fingerprint: fingerprint.to_string(),
        data,
    };
    let bytes = serde_json::to_vec(&file).map_err(|e| Error::cache(e.to_string()))?;
    fs::write(path, bytes)?;
    Ok(())
}

/// Fingerprint of source files: size and mtime of each, in order.
pub fn file_fingerprint(paths: &[&Path]) -> Result<String> {
    let mut parts = Vec::with_capacity(paths.len());
    for path in paths {
        let meta = fs::metadata(path)?;
        let mtime = meta
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        parts.push(format!("{}:{}", meta.len(), mtime));
    }
    Ok(parts.join(","))
}

/// Fingerprint of a loaded KB: entity and name counts.
#[must_use]
pub fn kb_fingerprint(kb: &MemoryKb) -> String {
    format!("kb:{}:{}", kb.len(), kb.name_count())
}
