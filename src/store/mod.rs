//! Flat-file persistence primitives.
//!
//! Three independent JSON artifacts: the seen-fingerprint set, the bounded
//! published-post ledger, and the single-day aggregate cache. Each is read
//! fully on load and rewritten fully on save; saves go through a
//! write-temp-then-rename so a crash mid-write cannot corrupt the live file.

pub mod daily;
pub mod ledger;
pub mod seen;

pub use daily::DailyCache;
pub use ledger::{Ledger, PublishedPost};
pub use seen::SeenStore;

use std::fs;
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::StoreError;

/// Load a JSON artifact, degrading to `Default` on absence or corruption.
/// A malformed file is a warning, never a fatal error.
pub(crate) fn load_json<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return T::default(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "store read failed, starting empty");
            return T::default();
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "malformed store file, starting empty");
            T::default()
        }
    }
}

/// Atomically replace `path` with the serialized value.
pub(crate) fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let tmp = path.with_extension("json.tmp");
    let raw = serde_json::to_string_pretty(value)?;
    fs::write(&tmp, raw)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn load_missing_file_yields_default() {
        let dir = TempDir::new().unwrap();
        let v: Vec<String> = load_json(&dir.path().join("nope.json"));
        assert!(v.is_empty());
    }

    #[test]
    fn load_malformed_file_yields_default() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json!").unwrap();
        let v: Vec<String> = load_json(&path);
        assert!(v.is_empty());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("x.json");
        save_json(&path, &vec!["a".to_string(), "b".to_string()]).unwrap();
        let v: Vec<String> = load_json(&path);
        assert_eq!(v, vec!["a", "b"]);
        // No temp file left behind.
        assert!(!path.with_extension("json.tmp").exists());
    }
}
